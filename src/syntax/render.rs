//! Output renderers
//!
//! Turns a [`Highlighted`] token stream back into text: HTML with
//! nested `hljs-` class spans, ANSI-styled terminal text, or a JSON dump
//! of the spans.

use std::fmt::Write;

use crossterm::style::StyledContent;

use super::engine::{Highlighted, Token, TokenKind};
use super::style::Style;
use crate::error::Result;

/// Output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Html,
    Ansi,
    Spans,
}

impl Format {
    /// Parse a format name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "html" => Some(Format::Html),
            "ansi" | "term" | "terminal" => Some(Format::Ansi),
            "spans" | "json" => Some(Format::Spans),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Ansi => "ansi",
            Format::Spans => "spans",
        }
    }
}

/// Render highlighted text in the given format
pub fn render(format: Format, text: &str, highlighted: &Highlighted) -> Result<String> {
    match format {
        Format::Html => Ok(to_html(text, highlighted)),
        Format::Ansi => Ok(to_ansi(text, highlighted)),
        Format::Spans => Ok(serde_json::to_string_pretty(highlighted)?),
    }
}

/// Render as HTML, one `<span class="hljs-…">` per classified span
pub fn to_html(text: &str, highlighted: &Highlighted) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    // Whether each open region wrote a span tag
    let mut open: Vec<bool> = Vec::new();

    for token in &highlighted.tokens {
        while open.len() > token.depth {
            if open.pop() == Some(true) {
                out.push_str("</span>");
            }
        }
        match token.kind {
            TokenKind::Region => {
                if let Some(class) = &token.class {
                    let _ = write!(out, "<span class=\"hljs-{}\">", escape_html(class.name()));
                }
                open.push(token.class.is_some());
            }
            TokenKind::Text => {
                let lexeme = escape_html(&text[token.range()]);
                match &token.class {
                    Some(class) => {
                        let _ = write!(out, "<span class=\"hljs-{}\">{}</span>", escape_html(class.name()), lexeme);
                    }
                    None => out.push_str(&lexeme),
                }
            }
        }
    }
    for wrote in open.into_iter().rev() {
        if wrote {
            out.push_str("</span>");
        }
    }
    out
}

/// Render with ANSI escape sequences
///
/// Each leaf takes its own class style, or the style of the innermost
/// styled region around it.
pub fn to_ansi(text: &str, highlighted: &Highlighted) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    let mut regions: Vec<Style> = Vec::new();

    for token in &highlighted.tokens {
        regions.truncate(token.depth);
        let inherited = regions.last().copied().unwrap_or_default();
        let style = class_style(token).filter(|s| !s.is_default()).unwrap_or(inherited);
        match token.kind {
            TokenKind::Region => regions.push(style),
            TokenKind::Text => {
                let lexeme = &text[token.range()];
                if style.is_default() {
                    out.push_str(lexeme);
                } else {
                    let _ = write!(out, "{}", StyledContent::new(style.to_content_style(), lexeme));
                }
            }
        }
    }
    out
}

fn class_style(token: &Token) -> Option<Style> {
    token.class.as_ref().map(|class| class.default_style())
}

/// Escape text for HTML element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
