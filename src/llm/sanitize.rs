//! Normalization of JSON produced by language models.
//!
//! Models wrap JSON in markdown fences, surround it with prose, emit
//! trailing commas, typographic quotes, or Python literals. Everything here
//! is a pure string transform; callers decide what to do when the result
//! still does not parse.

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Parse `raw` as `T`, retrying once on the sanitized text
pub fn parse_lenient<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Ok(value);
    }

    let cleaned = sanitize_json(trimmed);
    serde_json::from_str::<T>(&cleaned).map_err(|e| {
        anyhow!(
            "Unparseable model output ({}): {}",
            e,
            crate::models::action::truncate(trimmed, 200)
        )
    })
}

pub fn sanitize_json(raw: &str) -> String {
    let unfenced = strip_code_fences(raw);
    let extracted = extract_json_block(unfenced);
    normalize_tokens(extracted)
}

/// Content of the first fenced block, or the input when there is none
pub fn strip_code_fences(raw: &str) -> &str {
    let Some(open) = raw.find("```") else {
        return raw;
    };
    let after_open = &raw[open + 3..];
    // Skip the language tag line
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(after_open.len());
    let body = &after_open[body_start..];
    match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    }
}

/// The JSON payload embedded in `raw`.
///
/// Every `{` or `[` is tried as a start in text order. The first balanced
/// region that parses as an object, or as an array holding objects or
/// arrays, wins; a bare `[3]` in prose only wins when nothing structured
/// follows. Brackets inside strings are ignored. With no parseable region
/// the first one is returned, running to the end of the input when
/// unterminated.
pub fn extract_json_block(raw: &str) -> &str {
    let starts: Vec<usize> = raw.match_indices(['{', '[']).map(|(i, _)| i).collect();
    let Some(&first) = starts.first() else {
        return raw.trim();
    };

    let mut scalar_fallback: Option<&str> = None;
    for &start in &starts {
        let Some(block) = balanced_from(raw, start) else {
            continue;
        };
        match serde_json::from_str::<Value>(&normalize_tokens(block)) {
            Ok(value) if is_structured(&value) => return block,
            Ok(_) if scalar_fallback.is_none() => scalar_fallback = Some(block),
            _ => {}
        }
    }

    scalar_fallback
        .or_else(|| balanced_from(raw, first))
        .unwrap_or_else(|| raw[first..].trim())
}

/// Balanced region opening at `start`, or `None` when it never closes
fn balanced_from(raw: &str, start: usize) -> Option<&str> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape = false;

    for (offset, c) in raw[start..].char_indices() {
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' || c == '\u{201D}' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' | '\u{201C}' | '\u{201D}' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return None;
                }
                if stack.is_empty() {
                    let end = start + offset + c.len_utf8();
                    return Some(&raw[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}

fn is_structured(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().any(|v| v.is_object() || v.is_array()),
        _ => false,
    }
}

/// Rewrite typographic string delimiters, drop trailing commas and map
/// `True`/`False`/`None` to JSON literals. String contents are left alone.
pub fn normalize_tokens(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut smart_open = false;
    let mut escape = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            if escape {
                escape = false;
                out.push(c);
            } else if c == '\\' {
                escape = true;
                out.push(c);
            } else if smart_open && c == '\u{201D}' {
                in_string = false;
                out.push('"');
            } else if smart_open && c == '"' {
                out.push_str("\\\"");
            } else if !smart_open && c == '"' {
                in_string = false;
                out.push(c);
            } else {
                out.push(c);
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                smart_open = false;
                out.push(c);
            }
            '\u{201C}' | '\u{201D}' => {
                in_string = true;
                smart_open = true;
                out.push('"');
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }

    out
}
