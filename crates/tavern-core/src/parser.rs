//! Splits a model reply into the visible answer and its `<think>` reasoning.

use regex::Regex;
use std::sync::LazyLock;

/// First `<think>...</think>` span, shortest match, newlines included.
static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("valid think-block regex"));

/// A message split into what the user sees and the model's hidden reasoning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedContent {
    pub display_text: String,
    pub reasoning: Option<String>,
}

/// Extract the first reasoning block from `raw`.
///
/// Only the first block is removed; any later block stays in the display
/// text. A block with nothing between its markers is not recognised. Partial
/// text with an unclosed `<think>` is returned as-is (trimmed), so this is
/// safe to call on every streamed chunk.
pub fn parse_content(raw: &str) -> ParsedContent {
    if let Some(caps) = THINK_BLOCK.captures(raw) {
        let (span, interior) = match (caps.get(0), caps.get(1)) {
            (Some(span), Some(interior)) => (span, interior.as_str()),
            _ => return plain(raw),
        };

        if interior.is_empty() {
            return plain(raw);
        }

        let mut display = String::with_capacity(raw.len() - span.len());
        display.push_str(&raw[..span.start()]);
        display.push_str(&raw[span.end()..]);

        return ParsedContent {
            display_text: display.trim().to_string(),
            reasoning: Some(interior.trim().to_string()),
        };
    }

    plain(raw)
}

fn plain(raw: &str) -> ParsedContent {
    ParsedContent {
        display_text: raw.trim().to_string(),
        reasoning: None,
    }
}
