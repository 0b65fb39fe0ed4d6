// crates/shared/src/events/mod.rs
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    ToolCall {
        call_id: String,
        tool: String,
        args: serde_json::Value,
    },
    ToolResult {
        call_id: String,
        tool: String,
        result: String,
        is_error: bool,
        truncated: bool,
    },
    StreamChunk {
        content: String,
    },
    ResponseComplete {
        content: String,
    },
    Error {
        message: String,
    },
}
