//! Recovers tool calls that a model wrote into its text as
//! `<tool_call>{"name": ..., "arguments": {...}}</tool_call>` blocks.

use crate::traits::ToolCall;
use serde_json::Value;

const TAG_PAIRS: &[(&str, &str)] = &[
    ("<tool_call>", "</tool_call>"),
    ("<function_call>", "</function_call>"),
];

/// Splits `text` into the prose outside tool-call tags and the calls inside them.
pub fn extract_tagged_calls(text: &str) -> (String, Vec<ToolCall>) {
    let mut prose = Vec::new();
    let mut calls = Vec::new();
    let mut rest = text;

    while let Some((start, open, close)) = first_open_tag(rest) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(close) else {
            break;
        };

        let before = rest[..start].trim();
        if !before.is_empty() {
            prose.push(before.to_string());
        }
        calls.extend(json_objects(&after_open[..end]).iter().filter_map(call_from_value));
        rest = &after_open[end + close.len()..];
    }

    if !rest.trim().is_empty() {
        prose.push(rest.trim().to_string());
    }
    (prose.join("\n"), calls)
}

fn first_open_tag(text: &str) -> Option<(usize, &'static str, &'static str)> {
    TAG_PAIRS
        .iter()
        .filter_map(|(open, close)| text.find(open).map(|i| (i, *open, *close)))
        .min_by_key(|(i, _, _)| *i)
}

/// Every balanced top-level `{...}` in `text` that parses as JSON.
fn json_objects(text: &str) -> Vec<Value> {
    let mut values = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(s) = start.take()
                    && let Ok(value) = serde_json::from_str(&text[s..=i])
                {
                    values.push(value);
                }
            }
            _ => {}
        }
    }
    values
}

/// Ids are derived from the call so a replayed transcript keeps them stable.
fn call_from_value(value: &Value) -> Option<ToolCall> {
    let name = value.get("name")?.as_str()?;
    let arguments = value
        .get("arguments")
        .or_else(|| value.get("parameters"))
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));
    let digest = md5::compute(format!("{name}:{arguments}").as_bytes());
    Some(ToolCall::new(format!("call_{digest:x}"), name, arguments))
}
