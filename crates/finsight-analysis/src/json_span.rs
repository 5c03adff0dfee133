//! Pulls the first `{...}` object out of free-form language-model output.

use serde_json::{Map, Value};

/// The first top-level balanced `{...}` span in `text`.
///
/// Braces inside JSON string literals (including escaped quotes) do not count
/// toward the depth. Returns `None` when there is no opening brace or the span
/// never closes.
#[must_use]
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0_usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + c.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse the first balanced span as a JSON object.
///
/// Only the first span is tried; a span that is not valid JSON, or is valid
/// JSON but not an object, yields `None`.
#[must_use]
pub fn parse_first_object(text: &str) -> Option<Map<String, Value>> {
    let span = first_balanced_object(text)?;
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
