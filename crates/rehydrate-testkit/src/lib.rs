//! Builders for raw history fixtures and the legacy tool-result corpus.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rehydrate_core::{RawHistoryMessage, RawPayload, Role, SerializedEncoding};
use serde_json::{Value, json};

pub const BASE_TIME: &str = "2026-01-15T10:00:00Z";

/// `BASE_TIME` shifted by `seconds`, formatted as RFC 3339.
pub fn at(seconds: i64) -> String {
    let base = DateTime::parse_from_rfc3339(BASE_TIME).expect("BASE_TIME is RFC 3339");
    (base + Duration::seconds(seconds))
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn structured(id: &str, role: Role, created_at: &str, text: &str) -> RawHistoryMessage {
    RawHistoryMessage {
        id: id.to_string(),
        role,
        created_at: created_at.to_string(),
        payload: RawPayload::Structured {
            text: text.to_string(),
            blocks: None,
        },
    }
}

pub fn structured_with_blocks(
    id: &str,
    role: Role,
    created_at: &str,
    text: &str,
    blocks: Vec<Value>,
) -> RawHistoryMessage {
    RawHistoryMessage {
        id: id.to_string(),
        role,
        created_at: created_at.to_string(),
        payload: RawPayload::Structured {
            text: text.to_string(),
            blocks: Some(blocks),
        },
    }
}

pub fn serialized(
    id: &str,
    role: Role,
    created_at: &str,
    value: &str,
    encoding: SerializedEncoding,
) -> RawHistoryMessage {
    RawHistoryMessage {
        id: id.to_string(),
        role,
        created_at: created_at.to_string(),
        payload: RawPayload::Serialized {
            value: value.to_string(),
            encoding,
        },
    }
}

pub fn user(id: &str, created_at: &str, text: &str) -> RawHistoryMessage {
    structured(id, Role::User, created_at, text)
}

pub fn assistant(id: &str, created_at: &str, text: &str) -> RawHistoryMessage {
    structured(id, Role::Assistant, created_at, text)
}

pub fn text_block(text: &str) -> Value {
    json!({"type": "text", "text": text})
}

pub fn tool_use(id: &str, name: &str, args: Value) -> Value {
    json!({"type": "tool-use", "toolCallId": id, "toolName": name, "args": args})
}

pub fn tool_result(id: &str, output: &str) -> Value {
    json!({"type": "tool-result", "toolCallId": id, "output": output})
}

pub fn tool_error(id: &str, output: &str) -> Value {
    json!({"type": "tool-result", "toolCallId": id, "output": output, "isError": true})
}

/// One captured tool result and the fields an extractor should recover.
#[derive(Debug, Clone)]
pub struct LegacyResultFixture {
    pub name: &'static str,
    pub raw: String,
    pub command: Option<&'static str>,
    pub title: Option<&'static str>,
    pub output: Option<&'static str>,
}

impl LegacyResultFixture {
    pub fn expects_nothing(&self) -> bool {
        self.command.is_none() && self.title.is_none() && self.output.is_none()
    }
}

/// Tool results in every shape older backends emitted them.
pub fn legacy_tool_result_corpus() -> Vec<LegacyResultFixture> {
    let stringified = json!({"command": "pwd", "output": "/repo"}).to_string();
    vec![
        LegacyResultFixture {
            name: "clean-object",
            raw: r#"{"command":"ls","output":"a\nb"}"#.to_string(),
            command: Some("ls"),
            title: None,
            output: Some("a\nb"),
        },
        LegacyResultFixture {
            name: "metadata-command",
            raw: r##"{"title":"Read file","metadata":{"command":"cat README.md"},"output":"# Readme"}"##
                .to_string(),
            command: Some("cat README.md"),
            title: Some("Read file"),
            output: Some("# Readme"),
        },
        LegacyResultFixture {
            name: "argv-and-array-output",
            raw: r#"{"command":["rg","todo"],"output":["a.rs:1","b.rs:2"]}"#.to_string(),
            command: Some("rg todo"),
            title: None,
            output: Some("a.rs:1\nb.rs:2"),
        },
        LegacyResultFixture {
            name: "stringified-object",
            raw: Value::String(stringified).to_string(),
            command: Some("pwd"),
            title: None,
            output: Some("/repo"),
        },
        LegacyResultFixture {
            name: "truncated-object",
            raw: r#"{"command":"cargo test","output":"running 12 tests\ntest a ... ok"#
                .to_string(),
            command: Some("cargo test"),
            title: None,
            output: Some("running 12 tests\ntest a ... ok"),
        },
        LegacyResultFixture {
            name: "truncated-stringified-object",
            raw: r#""{\"title\":\"Search\",\"output\":\"src/lib.rs:1"#.to_string(),
            command: None,
            title: Some("Search"),
            output: Some("src/lib.rs:1"),
        },
        LegacyResultFixture {
            name: "truncated-summary",
            raw: r#"{"summary":"Applied patch","files":["#.to_string(),
            command: None,
            title: Some("Applied patch"),
            output: None,
        },
        LegacyResultFixture {
            name: "truncated-unicode",
            raw: r#"{"output":"na\u00efve \u2713"#.to_string(),
            command: None,
            title: None,
            output: Some("na\u{ef}ve \u{2713}"),
        },
        LegacyResultFixture {
            name: "plain-text",
            raw: "just some output".to_string(),
            command: None,
            title: None,
            output: None,
        },
    ]
}
