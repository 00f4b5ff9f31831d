//! Markup escaping for substituted values.

use sceneflow_core::ParseMode;

const MARKDOWN_SPECIAL: &str = r"_*[]()~`>#+-=|{}.!";

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKDOWN_SPECIAL.contains(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Escape for the given mode; `None` leaves the text unchanged.
pub fn escape(text: &str, mode: Option<ParseMode>) -> String {
    match mode {
        Some(ParseMode::Html) => escape_html(text),
        Some(ParseMode::Markdown) => escape_markdown(text),
        None => text.to_owned(),
    }
}
