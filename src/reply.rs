//! Bot reply parsing.
//!
//! Replies arrive as plain text with two inline markup forms: image URLs on
//! the trusted image host and double-backtick quick-reply labels. Parsing
//! splits a raw reply into an ordered display sequence; it never fails, and
//! anything that does not match degrades to literal text.

use std::sync::OnceLock;

use regex::Regex;

/// Only absolute URLs under this host become image cards.
pub const IMAGE_HOST: &str = "https://i.postimg.cc/";

fn image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"{}\S+", regex::escape(IMAGE_HOST))).unwrap())
}

fn action_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"``(.*?)``").unwrap())
}

/// One renderable unit of a parsed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayItem {
    /// An image card for a trusted-host URL.
    Image { url: String },
    /// A text bubble with zero or more quick-reply actions.
    TextWithActions { text: String, actions: Vec<String> },
}

/// The three extraction products of one raw reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReply {
    /// Reply text with image URLs and action spans removed, trimmed.
    pub text: String,
    /// Trusted-host image URLs in order of appearance.
    pub images: Vec<String>,
    /// Quick-reply labels in order of appearance.
    pub actions: Vec<String>,
}

impl ParsedReply {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.images.is_empty() && self.actions.is_empty()
    }

    /// Build the ordered display sequence: every image first, then one text
    /// bubble when there is any text or at least one action.
    pub fn into_items(self) -> Vec<DisplayItem> {
        let mut items: Vec<DisplayItem> = self
            .images
            .into_iter()
            .map(|url| DisplayItem::Image { url })
            .collect();
        if !self.text.is_empty() || !self.actions.is_empty() {
            items.push(DisplayItem::TextWithActions {
                text: self.text,
                actions: self.actions,
            });
        }
        items
    }
}

/// Parse one raw reply. Pure: the same input always yields the same output.
///
/// Both extraction passes run against the original text. A URL is a maximal
/// run of non-whitespace starting with the trusted host prefix; a label is
/// the (non-greedy) text strictly between a pair of double backticks.
/// Cleanup removes action spans first, then the first remaining occurrence
/// of each extracted URL, then trims the leading and trailing whitespace.
pub fn parse(raw: &str) -> ParsedReply {
    let images: Vec<String> = image_regex()
        .find_iter(raw)
        .map(|m| m.as_str().to_string())
        .collect();

    let actions: Vec<String> = action_regex()
        .captures_iter(raw)
        .map(|cap| cap[1].to_string())
        .collect();

    let mut clean = action_regex().replace_all(raw, "").into_owned();
    for url in &images {
        clean = clean.replacen(url.as_str(), "", 1);
    }
    let text = clean.trim().to_string();

    ParsedReply {
        text,
        images,
        actions,
    }
}
