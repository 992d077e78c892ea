use chatbot_core::{ChatMessage, ChatRole, Theme};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use crate::app::{App, InputMode, SettingsField};
use crate::markdown::{markdown_to_lines, MarkdownStyle};

struct Palette {
    window_bg: Color,
    header_bg: Color,
    text: Color,
    muted: Color,
    user: Color,
    assistant: Color,
    code: Color,
    panel_bg: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                window_bg: Color::Rgb(26, 32, 44),
                header_bg: Color::Rgb(37, 99, 235),
                text: Color::White,
                muted: Color::DarkGray,
                user: Color::Cyan,
                assistant: Color::Yellow,
                code: Color::LightYellow,
                panel_bg: Color::Rgb(55, 65, 81),
            },
            Theme::Light => Self {
                window_bg: Color::White,
                header_bg: Color::Rgb(59, 130, 246),
                text: Color::Black,
                muted: Color::Gray,
                user: Color::Blue,
                assistant: Color::Magenta,
                code: Color::Red,
                panel_bg: Color::Rgb(229, 231, 235),
            },
        }
    }

    fn markdown(&self) -> MarkdownStyle {
        MarkdownStyle {
            text: self.text,
            accent: self.user,
            code: self.code,
            muted: self.muted,
        }
    }
}

/// Bottom-right rectangle of at most `width` x `height` inside `area`.
fn anchor_bottom_right(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + area.width - width,
        area.y + area.height - height,
        width,
        height,
    )
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let palette = Palette::for_theme(app.theme);

    if !app.chat_open {
        render_launcher(&palette, frame, area);
        return;
    }

    // Floating window: 80 columns wide, 80% of the height
    let height = (area.height.saturating_mul(8) / 10).max(12);
    let window = anchor_bottom_right(area, 80, height);
    frame.render_widget(Clear, window);
    frame.render_widget(Block::default().style(Style::default().bg(palette.window_bg)), window);

    let settings_height = if app.settings_open { 6 } else { 0 };
    let status_height = if app.status.is_some() { 1 } else { 0 };
    let [header_area, settings_area, chat_area, status_area, input_area, footer_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(settings_height),
            Constraint::Min(3),
            Constraint::Length(status_height),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(window);

    render_header(app, &palette, frame, header_area);
    if app.settings_open {
        render_settings(app, &palette, frame, settings_area);
    }
    render_chat(app, &palette, frame, chat_area);
    if let Some(status) = &app.status {
        let status = Paragraph::new(Span::styled(format!(" {}", status), Style::default().fg(palette.muted).italic()));
        frame.render_widget(status, status_area);
    }
    render_input(app, &palette, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_launcher(palette: &Palette, frame: &mut Frame, area: Rect) {
    let button_area = anchor_bottom_right(area, 10, 3);
    frame.render_widget(Clear, button_area);
    let button = Paragraph::new(Line::from(" Chat ").centered())
        .style(Style::default().bg(palette.header_bg).fg(Color::White).bold())
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(button, button_area);

    let hint_area = Rect::new(area.x, area.y + area.height.saturating_sub(1), area.width.saturating_sub(11), 1);
    let hint = Paragraph::new(Line::from(vec![
        Span::styled(" c ", Style::default().bg(Color::DarkGray).fg(Color::White)),
        Span::raw(" open chat "),
        Span::styled(" q ", Style::default().bg(Color::DarkGray).fg(Color::White)),
        Span::raw(" quit "),
    ]));
    frame.render_widget(hint, hint_area);
}

fn render_header(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(format!(" {} ", app.heading), Style::default().fg(Color::White).bold()),
        Span::styled(
            format!("[{}]", app.settings.model),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(palette.header_bg));
    frame.render_widget(header, area);
}

fn render_settings(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.muted))
        .title(" Settings (j/k field, h/l adjust, s close) ")
        .style(Style::default().bg(palette.panel_bg).fg(palette.text));

    let rows: Vec<Line> = SettingsField::ALL
        .iter()
        .map(|field| {
            let (label, value) = match field {
                SettingsField::Model => ("Select Model", app.settings.model.clone()),
                SettingsField::Temperature => ("Temperature", format!("{:.1}", app.settings.temperature)),
                SettingsField::MaxTokens => ("Max Tokens", app.settings.max_tokens.to_string()),
                SettingsField::TopP => ("Top P", format!("{:.1}", app.settings.top_p)),
            };
            let selected = *field == app.settings_field;
            let marker = if selected { "> " } else { "  " };
            let value_style = if selected {
                Style::default().fg(palette.user).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(palette.text)
            };
            Line::from(vec![
                Span::raw(marker),
                Span::styled(format!("{:<14}", label), Style::default().fg(palette.muted)),
                Span::styled(format!("< {} >", value), value_style),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(rows).block(block), area);
}

/// Styled lines for one message, as drawn in the chat pane.
fn message_lines(app: &App, palette: &Palette, index: usize, msg: &ChatMessage) -> Vec<Line<'static>> {
    let (label, color) = match msg.role {
        ChatRole::User => ("You:", palette.user),
        ChatRole::Assistant => ("AI:", palette.assistant),
    };
    let mut label_style = Style::default().fg(color).add_modifier(Modifier::BOLD);
    let label = if app.selected_message == Some(index) {
        label_style = label_style.add_modifier(Modifier::REVERSED);
        format!("> {} ", label)
    } else {
        label.to_string()
    };

    let mut lines = vec![Line::from(Span::styled(label, label_style))];

    let streaming_placeholder = index + 1 == app.snapshot.transcript.len()
        && app.snapshot.loading
        && msg.role == ChatRole::Assistant
        && msg.content.is_empty();
    if streaming_placeholder {
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
        )));
    } else {
        match msg.role {
            ChatRole::User => lines.extend(
                msg.content
                    .split('\n')
                    .map(|l| Line::styled(l.to_string(), Style::default().fg(palette.text))),
            ),
            ChatRole::Assistant => lines.extend(markdown_to_lines(&msg.content, palette.markdown())),
        }
    }
    lines.push(Line::default());
    lines
}

/// Rows `lines` occupy once wrapped to `width` columns.
fn wrapped_height(lines: &[Line<'static>], width: u16) -> u16 {
    let count = Paragraph::new(lines.to_vec())
        .wrap(Wrap { trim: false })
        .line_count(width);
    u16::try_from(count).unwrap_or(u16::MAX)
}

fn render_chat(app: &mut App, palette: &Palette, frame: &mut Frame, area: Rect) {
    // Inner size minus borders, for scroll calculations
    let inner_width = area.width.saturating_sub(2);
    app.chat_height = area.height.saturating_sub(2);

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.muted));

    let transcript = app.snapshot.transcript.clone();
    if transcript.is_empty() {
        app.chat_scroll = 0;
        app.chat_max_scroll = 0;
        let hint = Paragraph::new(Span::styled(
            "Type a message to start chatting...",
            Style::default().fg(palette.muted),
        ))
        .block(chat_block);
        frame.render_widget(hint, area);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    let mut offsets: Vec<u16> = Vec::with_capacity(transcript.len());
    let mut total: u16 = 0;
    for (i, msg) in transcript.iter().enumerate() {
        let message = message_lines(app, palette, i, msg);
        offsets.push(total);
        total = total.saturating_add(wrapped_height(&message, inner_width));
        lines.extend(message);
    }

    app.chat_max_scroll = total.saturating_sub(app.chat_height);
    if app.follow_tail {
        app.chat_scroll = app.chat_max_scroll;
    } else if app.reveal_selected {
        if let Some(offset) = app.selected_message.and_then(|i| offsets.get(i)) {
            app.chat_scroll = (*offset).min(app.chat_max_scroll);
        }
        app.reveal_selected = false;
    } else {
        app.chat_scroll = app.chat_scroll.min(app.chat_max_scroll);
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, palette: &Palette, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { palette.user } else { palette.muted };
    let title = if app.is_loading() { " ... " } else { " Send (Enter) " };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title)
        .style(Style::default().bg(palette.panel_bg));

    // Horizontal scrolling keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 || cursor_pos < inner_width {
        0
    } else {
        cursor_pos - inner_width + 1
    };

    let (visible_text, text_style) = if app.input.is_empty() && !editing {
        ("Type your message...".to_string(), Style::default().fg(palette.muted))
    } else {
        (
            app.input.chars().skip(scroll_offset).take(inner_width).collect(),
            Style::default().fg(palette.text),
        )
    };

    let input = Paragraph::new(visible_text).style(text_style).block(input_block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" CHAT ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INPUT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![Span::styled(mode_text, mode_style)];
    let hints: &[(&str, &str)] = match app.input_mode {
        InputMode::Editing => &[(" Enter ", " send "), (" Esc ", " done ")],
        InputMode::Normal => &[
            (" i ", " type "),
            (" j/k ", " scroll "),
            (" J/K ", " select "),
            (" y ", " copy "),
            (" s ", " settings "),
            (" t ", " theme "),
            (" c ", " close "),
            (" q ", " quit "),
        ],
    };
    for (key, label) in hints {
        spans.push(Span::styled(*key, key_style));
        spans.push(Span::styled(*label, label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
