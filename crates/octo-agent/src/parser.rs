//! Tool-call parser — extracts `<tool_call:NAME ...>` markup from model output.
//!
//! Two shapes are recognized anywhere in free text:
//!
//! ```text
//! <tool_call:read_file path="src/main.rs" />
//! <tool_call:write_file path="notes.txt">any body, may span lines</tool_call:write_file>
//! ```
//!
//! Attribute values are any run of non-`"` characters; there is no escaping.
//! Malformed or unterminated markup is skipped silently.

use std::ops::Range;
use std::sync::LazyLock;

use octo_core::config::ParseOrder;
use regex::Regex;

use crate::tools::base::ToolParams;

/// Parameter key holding the body of a content-bearing call.
pub const CONTENT_KEY: &str = "content";

static OPEN_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<tool_call:(\w+)((?:\s+\w[\w-]*="[^"]*")*)\s*>"#).expect("open tag regex")
});

static SELF_CLOSING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<tool_call:(\w+)((?:\s+\w[\w-]*="[^"]*")*)\s*/>"#).expect("self-closing regex")
});

static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w[\w-]*)="([^"]*)""#).expect("attribute regex"));

/// A tool invocation found in model output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCall {
    /// Capability name, e.g. `"read_file"`.
    pub name: String,
    /// Attributes, plus `content` for the content-bearing form.
    pub params: ToolParams,
    /// The exact markup the call was parsed from.
    pub raw_text: String,
}

impl ToolCall {
    /// Look up a parameter by key.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Parse tool calls in the default two-pass order.
///
/// All content-bearing calls come first, then all self-closing calls, each
/// group in order of appearance.
pub fn parse_tool_calls(text: &str) -> Vec<ToolCall> {
    parse_tool_calls_with_order(text, ParseOrder::TwoPass)
}

/// Parse tool calls, choosing how the two markup shapes are interleaved.
pub fn parse_tool_calls_with_order(text: &str, order: ParseOrder) -> Vec<ToolCall> {
    let content_calls = scan_content_calls(text);
    let self_closing = scan_self_closing_calls(text, &content_calls);

    let mut located: Vec<(Range<usize>, ToolCall)> = content_calls;
    located.extend(self_closing);

    if order == ParseOrder::Document {
        located.sort_by_key(|(span, _)| span.start);
    }

    located.into_iter().map(|(_, call)| call).collect()
}

/// Find `<tool_call:NAME ...>BODY</tool_call:NAME>` spans.
///
/// Each opening tag pairs with the nearest following closing tag of the
/// same name. An opening tag without one yields nothing.
fn scan_content_calls(text: &str) -> Vec<(Range<usize>, ToolCall)> {
    let mut calls = Vec::new();
    let mut pos = 0;

    while let Some(caps) = OPEN_TAG_RE.captures_at(text, pos) {
        let Some(open) = caps.get(0) else { break };
        let name = &caps[1];
        let closing = format!("</tool_call:{name}>");

        match text[open.end()..].find(&closing) {
            Some(offset) => {
                let body_end = open.end() + offset;
                let end = body_end + closing.len();

                let mut params = parse_attributes(&caps[2]);
                params.insert(CONTENT_KEY.to_string(), text[open.end()..body_end].to_string());

                calls.push((
                    open.start()..end,
                    ToolCall {
                        name: name.to_string(),
                        params,
                        raw_text: text[open.start()..end].to_string(),
                    },
                ));
                pos = end;
            }
            // '<' is one byte, so this stays on a char boundary.
            None => pos = open.start() + 1,
        }
    }

    calls
}

/// Find `<tool_call:NAME ... />` spans outside any content-bearing body.
fn scan_self_closing_calls(
    text: &str,
    content_calls: &[(Range<usize>, ToolCall)],
) -> Vec<(Range<usize>, ToolCall)> {
    SELF_CLOSING_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let nested = content_calls
                .iter()
                .any(|(span, _)| span.contains(&whole.start()));
            if nested {
                return None;
            }
            Some((
                whole.range(),
                ToolCall {
                    name: caps[1].to_string(),
                    params: parse_attributes(&caps[2]),
                    raw_text: whole.as_str().to_string(),
                },
            ))
        })
        .collect()
}

/// Parse `key="value"` pairs. Later duplicates overwrite earlier ones.
fn parse_attributes(attrs: &str) -> ToolParams {
    let mut params = ToolParams::new();
    for caps in ATTR_RE.captures_iter(attrs) {
        params.insert(caps[1].to_string(), caps[2].to_string());
    }
    params
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
