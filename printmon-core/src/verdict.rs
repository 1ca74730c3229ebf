//! Verdict extraction from classifier replies.
//!
//! The classifier is told to answer with nothing but a JSON object such as
//! `{"status": "fail", "reason": "spaghetti"}`. Models rarely comply exactly,
//! so the parser tries, in order:
//!
//! 1. each `choices[*]` entry's text (`message.content`, else `text`), parsed
//!    directly as a JSON object;
//! 2. the substring from the first `{` to the last `}` of that text;
//! 3. the reply itself, when it is an object carrying a `status` key.
//!
//! Anything else is "no verdict", which the voting sequence records as an
//! inconclusive vote. Parsing never fails loudly.

use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

/// The structured answer extracted from a classifier reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    fields: Map<String, Value>,
}

impl Verdict {
    pub fn from_object(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// The `status` field, when it is a string.
    pub fn status(&self) -> Option<&str> {
        self.fields.get("status").and_then(Value::as_str)
    }

    /// Only an exact `"fail"` status counts as evidence of failure.
    pub fn is_fail(&self) -> bool {
        self.status() == Some("fail")
    }

    pub fn reason(&self) -> Option<&str> {
        self.fields.get("reason").and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.fields) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:?}", self.fields),
        }
    }
}

/// Extract a verdict from an opaque classifier reply.
pub fn parse_reply(reply: &Value) -> Option<Verdict> {
    if let Some(choices) = reply.get("choices").and_then(Value::as_array) {
        for (idx, choice) in choices.iter().enumerate() {
            let Some(text) = choice_text(choice) else {
                continue;
            };
            let text = text.trim();

            if let Some(verdict) = parse_object(text) {
                return Some(verdict);
            }
            if let Some(verdict) = extract_json_block(text).and_then(parse_object) {
                debug!(choice = idx, "Verdict recovered from surrounding text");
                return Some(verdict);
            }
        }
    }

    match reply {
        Value::Object(map) if map.contains_key("status") => Some(Verdict::from_object(map.clone())),
        _ => None,
    }
}

/// Text of one choice: `message.content` when non-empty, otherwise `text`.
///
/// Content given as an array of parts has its `text` parts concatenated.
fn choice_text(choice: &Value) -> Option<String> {
    let content = choice.get("message").and_then(|m| m.get("content"));
    let from_message = match content {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Array(parts)) => {
            let joined: String = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
            Some(joined)
        }
        _ => None,
    };

    from_message
        .filter(|s| !s.is_empty())
        .or_else(|| choice.get("text").and_then(Value::as_str).map(String::from))
        .filter(|s| !s.is_empty())
}

fn parse_object(text: &str) -> Option<Verdict> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(Verdict::from_object(map)),
        _ => None,
    }
}

/// First `{` to last `}`.
fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end > start {
        Some(&text[start..=end])
    } else {
        None
    }
}
