// crates/shared/src/messages/mod.rs
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A model-issued request to run one tool.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome of one [`ToolCallRequest`], correlated by `call_id`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(call_id: impl Into<String>, tool_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: format!("Error: {}", description.into()),
            is_error: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

/// Where the loop goes after a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Final(String),
    ToolCallsPending(Vec<ToolCallRequest>),
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn assistant_with_calls(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls,
            tool_call_id: None,
            tool_name: None,
        }
    }

    pub fn tool(result: &ToolResult) -> Self {
        Self {
            role: Role::Tool,
            content: Some(result.content.clone()),
            tool_calls: Vec::new(),
            tool_call_id: Some(result.call_id.clone()),
            tool_name: Some(result.tool_name.clone()),
        }
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Replaces empty or repeated tool call ids with ones from `fresh_id`,
    /// so every call in the message can be answered by exactly one result.
    /// Returns how many ids were replaced.
    pub fn ensure_unique_call_ids(&mut self, mut fresh_id: impl FnMut() -> String) -> usize {
        let mut seen: HashSet<String> = HashSet::with_capacity(self.tool_calls.len());
        let mut replaced = 0;

        for call in &mut self.tool_calls {
            if call.id.is_empty() || seen.contains(&call.id) {
                call.id = loop {
                    let candidate = fresh_id();
                    if !seen.contains(&candidate) {
                        break candidate;
                    }
                };
                replaced += 1;
            }
            seen.insert(call.id.clone());
        }
        replaced
    }

    /// Any tool call marks the message non-final, whatever text rides along.
    pub fn route(&self) -> Route {
        if self.has_tool_calls() {
            Route::ToolCallsPending(self.tool_calls.clone())
        } else {
            Route::Final(self.text().to_string())
        }
    }
}
