//! Markdown to HTML for message bodies.
//!
//! Fenced code blocks tagged with a language syntect knows are highlighted
//! with inline styles. Raw HTML in the source is escaped, never passed through.

use lazy_static::lazy_static;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};

lazy_static! {
    pub static ref SYNTAX_SET: SyntaxSet = SyntaxSet::load_defaults_newlines();
    pub static ref THEME_SET: ThemeSet = ThemeSet::load_defaults();
}

pub const CODE_THEME: &str = "base16-ocean.dark";

/// Syntax for a fence info string such as `rust` or `python title="x"`.
pub fn syntax_for_fence(info: &str) -> Option<&'static SyntaxReference> {
    let lang = info.split_whitespace().next()?;
    SYNTAX_SET.find_syntax_by_token(lang)
}

fn highlight_block(code: &str, syntax: &SyntaxReference) -> Option<String> {
    let theme = THEME_SET.themes.get(CODE_THEME)?;
    highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme).ok()
}

pub fn render_markdown(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let parser = Parser::new_ext(markdown, options);

    let mut events: Vec<Event> = Vec::new();
    let mut capture: Option<(CowStr, &'static SyntaxReference, String)> = None;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => match syntax_for_fence(&info) {
                Some(syntax) => capture = Some((info, syntax, String::new())),
                None => events.push(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info)))),
            },
            Event::Text(text) if capture.is_some() => {
                if let Some((_, _, code)) = capture.as_mut() {
                    code.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) if capture.is_some() => {
                if let Some((info, syntax, code)) = capture.take() {
                    match highlight_block(&code, syntax) {
                        Some(markup) => events.push(Event::Html(markup.into())),
                        None => {
                            events.push(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))));
                            events.push(Event::Text(code.into()));
                            events.push(Event::End(TagEnd::CodeBlock));
                        }
                    }
                }
            }
            Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
            other => events.push(other),
        }
    }

    let mut out = String::new();
    html::push_html(&mut out, events.into_iter());
    out
}
