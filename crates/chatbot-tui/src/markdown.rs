//! Markdown to styled terminal lines.
//!
//! Mirrors `chatbot_core::render` for the terminal: same parser, same
//! syntect theme for fenced code, but the output is ratatui `Line`s.

use chatbot_core::render::{syntax_for_fence, CODE_THEME, SYNTAX_SET, THEME_SET};
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use syntect::easy::HighlightLines;
use syntect::util::LinesWithEndings;

/// Colors the renderer needs from the active theme.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownStyle {
    pub text: Color,
    pub accent: Color,
    pub code: Color,
    pub muted: Color,
}

pub fn highlight_code(code: &str, lang: &str, fallback: Color) -> Vec<Line<'static>> {
    let plain = |code: &str| -> Vec<Line<'static>> {
        code.lines()
            .map(|l| Line::styled(l.to_string(), Style::default().fg(fallback)))
            .collect()
    };

    let Some(syntax) = syntax_for_fence(lang) else {
        return plain(code);
    };
    let Some(theme) = THEME_SET.themes.get(CODE_THEME) else {
        return plain(code);
    };

    let mut h = HighlightLines::new(syntax, theme);
    let mut lines = Vec::new();
    for line in LinesWithEndings::from(code) {
        match h.highlight_line(line, &SYNTAX_SET) {
            Ok(regions) => {
                let spans: Vec<Span<'static>> = regions
                    .into_iter()
                    .map(|(style, text)| {
                        let fg = style.foreground;
                        Span::styled(
                            text.trim_end_matches(|c: char| c == '\n' || c == '\r').to_string(),
                            Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b)),
                        )
                    })
                    .collect();
                lines.push(Line::from(spans));
            }
            Err(e) => {
                tracing::debug!(error = %e, "highlighting failed, falling back to plain text");
                return plain(code);
            }
        }
    }
    lines
}

struct LineWriter {
    palette: MarkdownStyle,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    list_depth: usize,
    code: Option<(String, String)>,
}

impl LineWriter {
    fn new(palette: MarkdownStyle) -> Self {
        Self {
            palette,
            lines: Vec::new(),
            spans: Vec::new(),
            styles: Vec::new(),
            list_depth: 0,
            code: None,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .iter()
            .fold(Style::default().fg(self.palette.text), |acc, s| acc.patch(*s))
    }

    fn text(&mut self, text: &str) {
        let style = self.style();
        self.spans.push(Span::styled(text.to_string(), style));
    }

    fn flush(&mut self) {
        if !self.spans.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.spans)));
        }
    }

    fn blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|l| l.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn event(&mut self, event: Event) {
        if let Some((_, code)) = self.code.as_mut() {
            match event {
                Event::Text(text) => {
                    code.push_str(&text);
                    return;
                }
                Event::End(TagEnd::CodeBlock) => {}
                _ => return,
            }
        }

        match event {
            Event::Start(Tag::Heading { .. }) => {
                self.flush();
                self.styles
                    .push(Style::default().fg(self.palette.accent).add_modifier(Modifier::BOLD));
            }
            Event::End(TagEnd::Heading(_)) => {
                self.styles.pop();
                self.blank();
            }
            Event::End(TagEnd::Paragraph) => {
                if self.list_depth == 0 {
                    self.blank();
                } else {
                    self.flush();
                }
            }
            Event::Start(Tag::Emphasis) => self.styles.push(Style::default().add_modifier(Modifier::ITALIC)),
            Event::Start(Tag::Strong) => self.styles.push(Style::default().add_modifier(Modifier::BOLD)),
            Event::Start(Tag::Strikethrough) => {
                self.styles.push(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Event::Start(Tag::Link { .. }) => {
                self.styles.push(Style::default().add_modifier(Modifier::UNDERLINED))
            }
            Event::Start(Tag::BlockQuote(_)) => {
                self.flush();
                self.styles
                    .push(Style::default().fg(self.palette.muted).add_modifier(Modifier::ITALIC));
            }
            Event::End(TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link) => {
                self.styles.pop();
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                self.styles.pop();
                self.blank();
            }
            Event::Start(Tag::List(_)) => {
                self.flush();
                self.list_depth += 1;
            }
            Event::End(TagEnd::List(_)) => {
                self.flush();
                self.list_depth = self.list_depth.saturating_sub(1);
                if self.list_depth == 0 {
                    self.blank();
                }
            }
            Event::Start(Tag::Item) => {
                self.flush();
                let indent = "  ".repeat(self.list_depth.saturating_sub(1));
                self.spans.push(Span::styled(
                    format!("{}• ", indent),
                    Style::default().fg(self.palette.accent),
                ));
            }
            Event::End(TagEnd::Item) => self.flush(),
            Event::Start(Tag::CodeBlock(kind)) => {
                self.flush();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info.to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some((lang, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, code)) = self.code.take() {
                    self.lines.extend(highlight_code(&code, &lang, self.palette.code));
                }
                self.blank();
            }
            Event::Code(code) => {
                let style = self.style().fg(self.palette.code);
                self.spans.push(Span::styled(code.to_string(), style));
            }
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                // Raw HTML blocks can span lines
                let mut parts = text.split('\n').peekable();
                while let Some(part) = parts.next() {
                    if !part.is_empty() {
                        self.text(part);
                    }
                    if parts.peek().is_some() {
                        self.flush();
                    }
                }
            }
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::styled("────────", Style::default().fg(self.palette.muted)));
                self.blank();
            }
            Event::TaskListMarker(done) => self.text(if done { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

pub fn markdown_to_lines(markdown: &str, palette: MarkdownStyle) -> Vec<Line<'static>> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let mut writer = LineWriter::new(palette);
    for event in Parser::new_ext(markdown, options) {
        writer.event(event);
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PALETTE: MarkdownStyle = MarkdownStyle {
        text: Color::White,
        accent: Color::Cyan,
        code: Color::Yellow,
        muted: Color::DarkGray,
    };

    fn plain(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn paragraphs_are_separated_by_blank_lines() {
        let lines = markdown_to_lines("first\nline\n\nsecond", PALETTE);
        assert_eq!(plain(&lines), vec!["first line", "", "second"]);
    }

    #[test]
    fn bold_text_gets_bold_modifier() {
        let lines = markdown_to_lines("a **b**", PALETTE);
        let bold = &lines[0].spans[1];
        assert_eq!(bold.content, "b");
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn list_items_get_bullets() {
        let lines = markdown_to_lines("- one\n- two\n", PALETTE);
        assert_eq!(plain(&lines), vec!["• one", "• two"]);
    }

    #[test]
    fn code_block_keeps_its_lines() {
        let lines = markdown_to_lines("```rust\nlet x = 1;\nlet y = 2;\n```\n", PALETTE);
        assert_eq!(plain(&lines), vec!["let x = 1;", "let y = 2;"]);
    }

    #[test]
    fn unknown_language_code_is_plain() {
        let lines = highlight_code("a\nb\n", "nosuchlang", Color::Yellow);
        assert_eq!(plain(&lines), vec!["a", "b"]);
        assert_eq!(lines[0].style.fg, Some(Color::Yellow));
    }
}
