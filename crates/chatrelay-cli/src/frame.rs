//! Lenient decoding of server frames.
//!
//! The relay sends `{"type":"chunk","content":...}` / `{"type":"done"}`, but
//! the client also understands the other common streaming shapes so it can
//! point at compatible servers.

use serde_json::Value;

const DONE_TYPES: &[&str] = &["done", "end", "complete", "stop", "finished", "final"];

/// What one text frame contributes to the current reply
#[derive(Debug, Default, PartialEq)]
pub struct Decoded {
    /// Text to append, never empty
    pub chunk: Option<String>,
    /// Whether the reply is complete
    pub done: bool,
}

/// JSON scalars such as `42` or `"hi"` are shown verbatim, like any other
/// non-object frame.
pub fn decode_frame(raw: &str) -> Decoded {
    match serde_json::from_str::<Value>(raw) {
        Ok(payload) if payload.is_object() => decode_json(&payload),
        _ => decode_plain(raw),
    }
}

fn decode_json(payload: &Value) -> Decoded {
    let kind = ["type", "event", "status"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_lowercase();
    let done = payload.get("done").and_then(Value::as_bool) == Some(true)
        || DONE_TYPES.contains(&kind.as_str());

    let chunk = ["content", "text", "message"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
        .or_else(|| payload.pointer("/delta/content").and_then(Value::as_str))
        .or_else(|| {
            payload
                .pointer("/choices/0/delta/content")
                .and_then(Value::as_str)
        })
        .filter(|text| !text.is_empty())
        .map(str::to_string);

    Decoded { chunk, done }
}

fn decode_plain(raw: &str) -> Decoded {
    let trimmed = raw.trim();
    if trimmed == "[DONE]" || trimmed.eq_ignore_ascii_case("done") {
        return Decoded {
            chunk: None,
            done: true,
        };
    }

    Decoded {
        chunk: (!raw.is_empty()).then(|| raw.to_string()),
        done: false,
    }
}
