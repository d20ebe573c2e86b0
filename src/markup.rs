//! Markup dialects for text sent through Telegram.
//!
//! Every piece of dynamic text goes through [`ParseMode::escape`]; headings go
//! through [`ParseMode::bold`] or [`ParseMode::italic`], which escape their
//! content before wrapping it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The parse mode a bot sends its messages with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// No formatting at all
    #[default]
    Plain,
    /// Telegram MarkdownV2
    Markdown,
    /// Telegram HTML
    Html,
}

/// Characters MarkdownV2 treats as markup, plus the escape character itself.
/// Reference: https://core.telegram.org/bots/api#markdownv2-style
const MARKDOWNV2_SPECIAL_CHARS: [char; 19] = [
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

impl ParseMode {
    /// Escape text so it renders literally in this dialect.
    pub fn escape(&self, text: &str) -> String {
        match self {
            ParseMode::Plain => text.to_string(),
            ParseMode::Markdown => escape_markdownv2(text),
            ParseMode::Html => escape_html(text),
        }
    }

    pub fn bold(&self, text: &str) -> String {
        match self {
            ParseMode::Plain => text.to_string(),
            ParseMode::Markdown => format!("*{}*", escape_markdownv2(text)),
            ParseMode::Html => format!("<b>{}</b>", escape_html(text)),
        }
    }

    pub fn italic(&self, text: &str) -> String {
        match self {
            ParseMode::Plain => text.to_string(),
            ParseMode::Markdown => format!("_{}_", escape_markdownv2(text)),
            ParseMode::Html => format!("<i>{}</i>", escape_html(text)),
        }
    }
}

impl FromStr for ParseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "plain" | "default" | "none" => Ok(ParseMode::Plain),
            "markdown" | "markdownv2" => Ok(ParseMode::Markdown),
            "html" => Ok(ParseMode::Html),
            other => Err(format!("Unknown parse mode: '{}'", other)),
        }
    }
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseMode::Plain => f.write_str("plain"),
            ParseMode::Markdown => f.write_str("markdown"),
            ParseMode::Html => f.write_str("html"),
        }
    }
}

/// Escape every MarkdownV2 special character.
pub fn escape_markdownv2(text: &str) -> String {
    let mut result = String::with_capacity(text.len() * 2);

    for c in text.chars() {
        if MARKDOWNV2_SPECIAL_CHARS.contains(&c) {
            result.push('\\');
        }
        result.push(c);
    }

    result
}

/// Escape the characters HTML mode interprets.
pub fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + text.len() / 4);

    for c in text.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            _ => result.push(c),
        }
    }

    result
}
