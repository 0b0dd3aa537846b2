use crate::extract::build_simplified_text;
use indexmap::IndexMap;
use rehydrate_core::{
    Block, DEFAULT_WRAP_COLUMN, DisplayConfig, DisplayContentBlock, DisplayMessage,
    DisplayToolCall, HydratedMessage, ToolCallStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionOptions {
    pub wrap_column: usize,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            wrap_column: DEFAULT_WRAP_COLUMN,
        }
    }
}

impl From<&DisplayConfig> for ProjectionOptions {
    fn from(cfg: &DisplayConfig) -> Self {
        Self {
            wrap_column: cfg.wrap_column,
        }
    }
}

pub fn project(hydrated: &HydratedMessage) -> DisplayMessage {
    project_with(hydrated, &ProjectionOptions::default())
}

/// Map a hydrated message onto the display model.
///
/// Tool results are folded into the tool call that shares their
/// `tool_call_id`; block position plays no part in the pairing.
pub fn project_with(hydrated: &HydratedMessage, options: &ProjectionOptions) -> DisplayMessage {
    let blocks = &hydrated.payload.blocks;

    let mut calls: IndexMap<&str, DisplayToolCall> = IndexMap::new();
    for block in blocks {
        if let Block::ToolUse {
            tool_call_id,
            tool_name,
            args,
        } = block
        {
            calls
                .entry(tool_call_id.as_str())
                .or_insert_with(|| DisplayToolCall {
                    id: tool_call_id.clone(),
                    name: tool_name.clone(),
                    args: args.clone(),
                    result: None,
                    status: ToolCallStatus::Pending,
                    simplified_text: None,
                });
        }
    }

    for block in blocks {
        if let Block::ToolResult {
            tool_call_id,
            output,
            is_error,
            ..
        } = block
            && let Some(call) = calls.get_mut(tool_call_id.as_str())
            && call.status == ToolCallStatus::Pending
        {
            call.result = output.clone();
            call.status = if *is_error {
                ToolCallStatus::Error
            } else {
                ToolCallStatus::Complete
            };
        }
    }

    for call in calls.values_mut() {
        let (result, error) = match call.status {
            ToolCallStatus::Pending => (None, None),
            ToolCallStatus::Complete => (call.result.as_deref(), None),
            ToolCallStatus::Error => (None, call.result.as_deref()),
        };
        call.simplified_text = build_simplified_text(&call.args, result, error, options.wrap_column);
    }

    let content_blocks = blocks
        .iter()
        .map(|block| match block {
            Block::Text { text } => DisplayContentBlock::Text { text: text.clone() },
            Block::ToolUse { tool_call_id, .. } | Block::ToolResult { tool_call_id, .. } => {
                DisplayContentBlock::ToolCall {
                    tool_call_id: tool_call_id.clone(),
                }
            }
        })
        .collect::<Vec<_>>();

    DisplayMessage {
        id: hydrated.id.clone(),
        role: hydrated.role,
        content: hydrated.payload.text.clone(),
        tool_calls: (!calls.is_empty()).then(|| calls.into_values().collect()),
        content_blocks: (!content_blocks.is_empty()).then_some(content_blocks),
        is_streaming: false,
        created_at: hydrated.created_at.clone(),
    }
}
