//! Human-readable text from tool results.
//!
//! Tool results reach the client in three historical shapes: clean JSON
//! objects, JSON objects stringified once more, and malformed or truncated
//! JSON. Everything here degrades through those shapes and never fails.

pub mod scanner;

use rehydrate_core::DEFAULT_WRAP_COLUMN;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StructuredResult {
    pub command: Option<String>,
    pub title: Option<String>,
    pub output: Option<String>,
}

impl StructuredResult {
    fn is_empty(&self) -> bool {
        self.command.is_none() && self.title.is_none() && self.output.is_none()
    }

    fn non_empty(self) -> Option<Self> {
        (!self.is_empty()).then_some(self)
    }
}

/// Render an arbitrary tool-result value as text.
///
/// Objects are searched for `output`, then `result`, then `stdout` before
/// falling back to their JSON text. Null and empty values are absent.
pub fn render_output(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => (!s.is_empty()).then(|| s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            if items.is_empty() {
                return None;
            }
            let lines = items
                .iter()
                .map(|item| render_output(item).unwrap_or_else(|| item.to_string()))
                .collect::<Vec<_>>();
            Some(lines.join("\n"))
        }
        Value::Object(map) => {
            if map.is_empty() {
                return None;
            }
            ["output", "result", "stdout"]
                .into_iter()
                .find_map(|key| map.get(key).and_then(render_output))
                .or_else(|| Some(value.to_string()))
        }
    }
}

/// Recover `command`, `title` and `output` from a serialized tool result.
///
/// Tries, in order: a JSON object; a JSON string holding a JSON object (one
/// level only); the character scanner over the raw text.
pub fn parse_structured(result: &str) -> Option<StructuredResult> {
    match serde_json::from_str::<Value>(result) {
        Ok(Value::Object(map)) => return from_object(&map),
        Ok(Value::String(inner)) => {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(&inner) {
                return from_object(&map);
            }
        }
        Ok(_) | Err(_) => {}
    }
    from_scan(result)
}

fn from_object(map: &Map<String, Value>) -> Option<StructuredResult> {
    let metadata = map.get("metadata").and_then(Value::as_object);
    let args = map.get("args").and_then(Value::as_object);

    let command = command_value(map.get("command"))
        .or_else(|| metadata.and_then(|m| command_value(m.get("command"))))
        .or_else(|| args.and_then(|a| command_value(a.get("command"))));
    let title = string_value(map.get("title"))
        .or_else(|| string_value(map.get("summary")))
        .or_else(|| metadata.and_then(|m| string_value(m.get("title"))))
        .or_else(|| args.and_then(|a| string_value(a.get("title"))));
    let output = map.get("output").and_then(render_output);

    StructuredResult {
        command,
        title,
        output,
    }
    .non_empty()
}

fn from_scan(text: &str) -> Option<StructuredResult> {
    let fields = scanner::scan(text);
    StructuredResult {
        command: fields.command,
        title: fields.title.or(fields.summary),
        output: fields.output,
    }
    .non_empty()
}

fn string_value(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Commands arrive either as a shell string or as an argv array.
fn command_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(parts) => {
            let argv = parts.iter().filter_map(Value::as_str).collect::<Vec<_>>();
            (!argv.is_empty()).then(|| argv.join(" "))
        }
        _ => None,
    }
}

/// Build the one-glance summary shown under a tool call.
///
/// Priority: error (prefixed by `$ command` when known), then command with
/// output, then output alone, then command alone. Body text is hard-wrapped
/// at `wrap_column` characters.
pub fn build_simplified_text(
    args: &Map<String, Value>,
    result: Option<&str>,
    error: Option<&str>,
    wrap_column: usize,
) -> Option<String> {
    let parsed = result.and_then(parse_structured);
    let command = command_value(args.get("command"))
        .or_else(|| command_value(args.get("cmd")))
        .or_else(|| parsed.as_ref().and_then(|p| p.command.clone()));
    let output = match &parsed {
        Some(p) => p.output.clone(),
        None => result
            .filter(|r| !r.trim().is_empty())
            .map(str::to_string),
    };

    if let Some(error) = error.filter(|e| !e.trim().is_empty()) {
        let body = hard_wrap(error, wrap_column);
        return Some(match command {
            Some(cmd) => format!("$ {cmd}\n{body}"),
            None => body,
        });
    }

    match (command, output) {
        (Some(cmd), Some(out)) => Some(format!("$ {cmd}\n{}", hard_wrap(&out, wrap_column))),
        (None, Some(out)) => Some(hard_wrap(&out, wrap_column)),
        (Some(cmd), None) => Some(format!("$ {cmd}")),
        (None, None) => None,
    }
}

pub fn build_simplified_text_default(
    args: &Map<String, Value>,
    result: Option<&str>,
    error: Option<&str>,
) -> Option<String> {
    build_simplified_text(args, result, error, DEFAULT_WRAP_COLUMN)
}

/// Split every line into fixed-width chunks of `column` chars. No word
/// boundary handling; a column of zero disables wrapping.
fn hard_wrap(text: &str, column: usize) -> String {
    let text = text.trim_end_matches(['\n', '\r']);
    if column == 0 {
        return text.to_string();
    }
    let mut wrapped = Vec::new();
    for line in text.split('\n') {
        let chars = line.chars().collect::<Vec<_>>();
        if chars.len() <= column {
            wrapped.push(line.to_string());
            continue;
        }
        for chunk in chars.chunks(column) {
            wrapped.push(chunk.iter().collect::<String>());
        }
    }
    wrapped.join("\n")
}
