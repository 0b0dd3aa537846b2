use crate::escape::decode;
use crate::extract::render_output;
use chrono::{DateTime, NaiveDateTime};
use rehydrate_core::{
    Block, DropReason, HydratedMessage, HydratedPayload, MessageOrdering, RawHistoryMessage,
    RawPayload, SerializedEncoding, dedupe_key,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Exactly one of these is produced for every raw message.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    Accepted(HydratedMessage),
    Dropped { id: String, reason: DropReason },
    Duplicate { dedupe_key: String },
}

#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext<'a> {
    pub fallback_index: u64,
    pub seen_message_ids: &'a BTreeSet<String>,
}

/// Seam between the chunk hydrator and payload normalization.
pub trait Normalizer {
    fn normalize(&self, raw: &RawHistoryMessage, ctx: NormalizeContext<'_>) -> NormalizeOutcome;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PayloadNormalizer;

impl Normalizer for PayloadNormalizer {
    fn normalize(&self, raw: &RawHistoryMessage, ctx: NormalizeContext<'_>) -> NormalizeOutcome {
        normalize(raw, ctx)
    }
}

pub fn normalize(raw: &RawHistoryMessage, ctx: NormalizeContext<'_>) -> NormalizeOutcome {
    let dedupe_key = dedupe_key(raw.role, &raw.id);
    // Checked first so redeliveries never consume a fallback slot.
    if ctx.seen_message_ids.contains(&raw.id) {
        return NormalizeOutcome::Duplicate { dedupe_key };
    }

    let Some(timestamp_ms) = parse_created_at(&raw.created_at) else {
        return NormalizeOutcome::Dropped {
            id: raw.id.clone(),
            reason: DropReason::InvalidCreatedAt,
        };
    };

    let payload = match normalize_payload(&raw.payload) {
        Ok(payload) => payload,
        Err(reason) => {
            return NormalizeOutcome::Dropped {
                id: raw.id.clone(),
                reason,
            };
        }
    };

    NormalizeOutcome::Accepted(HydratedMessage {
        id: raw.id.clone(),
        role: raw.role,
        created_at: raw.created_at.clone(),
        payload,
        ordering: MessageOrdering {
            timestamp_ms,
            fallback_index: ctx.fallback_index,
        },
        dedupe_key,
    })
}

/// Milliseconds since the epoch for an RFC 3339 timestamp. A timestamp
/// without an offset is read as UTC.
pub fn parse_created_at(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

pub fn normalize_payload(payload: &RawPayload) -> Result<HydratedPayload, DropReason> {
    match payload {
        RawPayload::Structured { text, blocks } => Ok(assemble(
            decode(text).into_owned(),
            blocks.as_deref().map(parse_blocks).unwrap_or_default(),
        )),
        RawPayload::Serialized {
            value,
            encoding: SerializedEncoding::PlainText | SerializedEncoding::JsonEscaped,
        } => Ok(assemble(decode(value).into_owned(), Vec::new())),
        RawPayload::Serialized {
            value,
            encoding: SerializedEncoding::Json,
        } => normalize_json(value),
    }
}

fn normalize_json(value: &str) -> Result<HydratedPayload, DropReason> {
    let parsed = serde_json::from_str::<Value>(value).map_err(|_| DropReason::DecodeFailed)?;
    match parsed {
        Value::Object(map) => Ok(from_object(&map)),
        // One level of double encoding: the string may itself hold the object.
        Value::String(inner) => match serde_json::from_str::<Value>(&inner) {
            Ok(Value::Object(map)) => Ok(from_object(&map)),
            _ => Ok(assemble(decode(&inner).into_owned(), Vec::new())),
        },
        _ => Err(DropReason::DecodeFailed),
    }
}

fn from_object(map: &Map<String, Value>) -> HydratedPayload {
    let text = map
        .get("text")
        .and_then(Value::as_str)
        .map(|text| decode(text).into_owned())
        .unwrap_or_default();
    let blocks = map
        .get("blocks")
        .and_then(Value::as_array)
        .map(|entries| parse_blocks(entries))
        .unwrap_or_default();
    assemble(text, blocks)
}

/// Prepend a text block when the message carries text but no text block.
fn assemble(text: String, mut blocks: Vec<Block>) -> HydratedPayload {
    if !text.is_empty() && !blocks.iter().any(Block::is_text) {
        blocks.insert(0, Block::Text { text: text.clone() });
    }
    HydratedPayload { text, blocks }
}

fn parse_blocks(entries: &[Value]) -> Vec<Block> {
    entries.iter().filter_map(parse_block).collect()
}

/// Malformed or unrecognized entries yield `None` and are skipped.
pub fn parse_block(entry: &Value) -> Option<Block> {
    RawBlock::deserialize(entry).ok().and_then(RawBlock::into_block)
}

/// Legacy blocks may carry their own `id`/`name` next to `toolCallId`/
/// `toolName`, so each pair is read separately and coalesced.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum RawBlock {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolUse {
        #[serde(default)]
        tool_call_id: Option<String>,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        tool_name: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        args: Option<Value>,
    },
    #[serde(rename_all = "camelCase")]
    ToolResult {
        #[serde(default)]
        tool_call_id: Option<String>,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        tool_name: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        output: Option<Value>,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        is_error: Option<Value>,
        #[serde(default)]
        error: Option<Value>,
    },
}

impl RawBlock {
    fn into_block(self) -> Option<Block> {
        match self {
            Self::Text { text } => Some(Block::Text { text }),
            Self::ToolUse {
                tool_call_id,
                id,
                tool_name,
                name,
                args,
            } => Some(Block::ToolUse {
                tool_call_id: first_present([tool_call_id, id])?,
                tool_name: first_present([tool_name, name])?,
                args: coerce_args(args),
            }),
            Self::ToolResult {
                tool_call_id,
                id,
                tool_name,
                name,
                output,
                result,
                is_error,
                error,
            } => {
                let output = first_present([output, result])
                    .as_ref()
                    .and_then(render_output)
                    .map(|text| decode(&text).into_owned());
                let is_error = first_present([is_error, error]).is_some_and(|flag| truthy(&flag));
                Some(Block::ToolResult {
                    tool_call_id: first_present([tool_call_id, id])?,
                    tool_name: first_present([tool_name, name]),
                    output,
                    is_error,
                })
            }
        }
    }
}

/// First non-absent candidate wins.
fn first_present<T, const N: usize>(candidates: [Option<T>; N]) -> Option<T> {
    candidates.into_iter().flatten().next()
}

fn truthy(flag: &Value) -> bool {
    match flag {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Tool-use args default to an empty map. Some backends stored them as a
/// JSON-encoded string.
fn coerce_args(args: Option<Value>) -> Map<String, Value> {
    match args {
        Some(Value::Object(map)) => map,
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    }
}
