use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub type Result<T> = anyhow::Result<T>;

/// Column limit used when hard-wrapping simplified tool output.
pub const DEFAULT_WRAP_COLUMN: usize = 120;

pub fn runtime_dir(workspace: &Path) -> PathBuf {
    workspace.join(".rehydrate")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable `role:id` key used to suppress duplicate deliveries across chunks.
pub fn dedupe_key(role: Role, id: &str) -> String {
    format!("{}:{id}", role.as_str())
}

// ── Raw payloads as delivered by the backend ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHistoryMessage {
    pub id: String,
    pub role: Role,
    /// Untrusted; validated by the normalizer.
    pub created_at: String,
    pub payload: RawPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RawPayload {
    Structured {
        text: String,
        /// Raw block entries are kept untyped so one malformed entry can be
        /// skipped without rejecting the whole message.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        blocks: Option<Vec<serde_json::Value>>,
    },
    Serialized {
        value: String,
        encoding: SerializedEncoding,
    },
}

/// Which legacy backend produced a serialized payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SerializedEncoding {
    Json,
    JsonEscaped,
    PlainText,
}

// ── Canonical hydrated form ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Block {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolUse {
        tool_call_id: String,
        tool_name: String,
        args: serde_json::Map<String, serde_json::Value>,
    },
    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        is_error: bool,
    },
}

impl Block {
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HydratedPayload {
    pub text: String,
    pub blocks: Vec<Block>,
}

/// Sort key for hydrated history. Field order matters: the derived `Ord`
/// compares `timestamp_ms` first and breaks ties with `fallback_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageOrdering {
    pub timestamp_ms: i64,
    pub fallback_index: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydratedMessage {
    pub id: String,
    pub role: Role,
    pub created_at: String,
    pub payload: HydratedPayload,
    pub ordering: MessageOrdering,
    pub dedupe_key: String,
}

/// Cursor threaded through every chunk of one reconnect session.
///
/// Callers hand a reference to the hydrator and receive a fresh value back;
/// an older cursor held elsewhere is never touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationState {
    seen_message_ids: BTreeSet<String>,
    next_fallback_index: u64,
}

impl HydrationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen_message_ids.contains(id)
    }

    pub fn seen_message_ids(&self) -> &BTreeSet<String> {
        &self.seen_message_ids
    }

    pub fn next_fallback_index(&self) -> u64 {
        self.next_fallback_index
    }

    pub fn mark_seen(&mut self, id: impl Into<String>) {
        self.seen_message_ids.insert(id.into());
    }

    /// Consume the current fallback slot and return it.
    pub fn advance(&mut self) -> u64 {
        let slot = self.next_fallback_index;
        self.next_fallback_index += 1;
        slot
    }
}

// ── UI-facing projection ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Complete,
    Error,
}

impl ToolCallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayToolCall {
    pub id: String,
    pub name: String,
    pub args: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simplified_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DisplayContentBlock {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolCall { tool_call_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<DisplayToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_blocks: Option<Vec<DisplayContentBlock>>,
    pub is_streaming: bool,
    pub created_at: String,
}

// ── Diagnostics ──

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DropReason {
    #[error("invalid-created-at")]
    InvalidCreatedAt,
    #[error("decode-failed")]
    DecodeFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedMessage {
    pub id: String,
    pub reason: DropReason,
}

/// Counts-and-reasons summary of one chunk application, for telemetry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydrationReport {
    pub accepted: usize,
    pub duplicates: usize,
    pub dropped: Vec<DroppedMessage>,
    pub total_messages: usize,
}

impl HydrationReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && self.duplicates == 0
    }
}

// ── Configuration ──

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub display: DisplayConfig,
    pub telemetry: TelemetryConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Hard-wrap column for simplified tool output.
    pub wrap_column: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            wrap_column: DEFAULT_WRAP_COLUMN,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub verbose: bool,
}

impl AppConfig {
    pub fn user_settings_path() -> Option<PathBuf> {
        let home = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())?;
        Some(Path::new(&home).join(".rehydrate/settings.json"))
    }

    pub fn project_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.json")
    }

    pub fn project_local_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.local.json")
    }

    pub fn legacy_toml_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("config.toml")
    }

    pub fn load(workspace: &Path) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;

        let legacy = Self::legacy_toml_path(workspace);
        if legacy.exists() {
            let raw = fs::read_to_string(legacy)?;
            let legacy_cfg: AppConfig = toml::from_str(&raw)?;
            merge_json_value(&mut merged, &serde_json::to_value(legacy_cfg)?);
        }

        let mut paths = Vec::new();
        if let Some(user) = Self::user_settings_path() {
            paths.push(user);
        }
        paths.push(Self::project_settings_path(workspace));
        paths.push(Self::project_local_settings_path(workspace));

        for path in paths {
            if !path.exists() {
                continue;
            }
            let raw = fs::read_to_string(path)?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            merge_json_value(&mut merged, &value);
        }

        Ok(serde_json::from_value(merged)?)
    }

    pub fn save(&self, workspace: &Path) -> Result<()> {
        let path = Self::project_settings_path(workspace);
        fs::create_dir_all(
            path.parent()
                .ok_or_else(|| anyhow::anyhow!("invalid config path"))?,
        )?;
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

fn merge_json_value(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_obj), serde_json::Value::Object(overlay_obj)) => {
            for (key, overlay_value) in overlay_obj {
                if let Some(base_value) = base_obj.get_mut(key) {
                    merge_json_value(base_value, overlay_value);
                } else {
                    base_obj.insert(key.clone(), overlay_value.clone());
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}
