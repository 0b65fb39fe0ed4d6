// crates/engine/src/task/conversation.rs
use switchboard_shared::{Message, Role, ToolCallRequest, ToolResult};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("No assistant tool calls are awaiting results")]
    NoPendingToolCalls,

    #[error("Tool result '{0}' does not answer any call in the preceding assistant message")]
    UncorrelatedToolResult(String),

    #[error("Expected an assistant message, got {0}")]
    UnexpectedRole(&'static str),
}

/// Append-only message history. Messages are never edited, reordered or
/// removed once pushed; `reset` is the only way back to an empty turn.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    system_prompt: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        let mut conversation = Self::default();
        if !prompt.trim().is_empty() {
            conversation.messages.push(Message::system(prompt.clone()));
            conversation.system_prompt = Some(prompt);
        }
        conversation
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, message: Message) -> Result<(), ConversationError> {
        if message.role != Role::Assistant {
            return Err(ConversationError::UnexpectedRole(message.role.as_str()));
        }
        self.messages.push(message);
        Ok(())
    }

    /// Tool calls of the newest assistant message that still lack results.
    pub fn pending_tool_calls(&self) -> Vec<ToolCallRequest> {
        let Some((index, assistant)) = self.last_assistant() else {
            return Vec::new();
        };

        let answered: Vec<&str> = self.messages[index + 1..]
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();

        assistant
            .tool_calls
            .iter()
            .filter(|call| !answered.contains(&call.id.as_str()))
            .cloned()
            .collect()
    }

    /// Appends one tool message per result, in the given order. The batch is
    /// checked first, so either every result is appended or none is.
    pub fn push_tool_results(&mut self, results: &[ToolResult]) -> Result<(), ConversationError> {
        let pending = self.pending_tool_calls();
        if pending.is_empty() {
            return Err(ConversationError::NoPendingToolCalls);
        }

        let mut seen: Vec<&str> = Vec::with_capacity(results.len());
        for result in results {
            let known = pending.iter().any(|call| call.id == result.call_id);
            if !known || seen.contains(&result.call_id.as_str()) {
                return Err(ConversationError::UncorrelatedToolResult(result.call_id.clone()));
            }
            seen.push(&result.call_id);
        }

        self.messages.extend(results.iter().map(Message::tool));
        Ok(())
    }

    /// Drops everything except the system prompt.
    pub fn reset(&mut self) {
        self.messages.clear();
        if let Some(prompt) = &self.system_prompt {
            self.messages.push(Message::system(prompt.clone()));
        }
    }

    fn last_assistant(&self) -> Option<(usize, &Message)> {
        let (index, message) = self
            .messages
            .iter()
            .enumerate()
            .rev()
            .find(|(_, m)| m.role != Role::Tool)?;

        (message.role == Role::Assistant).then_some((index, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn call(id: &str, name: &str) -> ToolCallRequest {
        ToolCallRequest::new(id, name, Map::new())
    }

    fn conversation_with_calls(ids: &[&str]) -> Conversation {
        let mut conversation = Conversation::with_system_prompt("be helpful");
        conversation.push_user("Multiply 5 by 7 then add 3");
        conversation
            .push_assistant(Message::assistant_with_calls(
                None,
                ids.iter().map(|id| call(id, "multiply")).collect(),
            ))
            .unwrap();
        conversation
    }

    #[test]
    fn results_append_in_order() {
        let mut conversation = conversation_with_calls(&["c1", "c2"]);
        conversation
            .push_tool_results(&[
                ToolResult::success("c1", "multiply", "35"),
                ToolResult::success("c2", "multiply", "6"),
            ])
            .unwrap();

        let tail: Vec<_> = conversation.messages()[3..]
            .iter()
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(tail, vec!["c1", "c2"]);
        assert!(conversation.pending_tool_calls().is_empty());
    }

    #[test]
    fn uncorrelated_result_appends_nothing() {
        let mut conversation = conversation_with_calls(&["c1"]);
        let before = conversation.len();

        let err = conversation
            .push_tool_results(&[
                ToolResult::success("c1", "multiply", "35"),
                ToolResult::success("zzz", "multiply", "0"),
            ])
            .unwrap_err();

        assert_eq!(err, ConversationError::UncorrelatedToolResult("zzz".to_string()));
        assert_eq!(conversation.len(), before);
    }

    #[test]
    fn duplicate_result_ids_are_rejected() {
        let mut conversation = conversation_with_calls(&["c1", "c2"]);
        let err = conversation
            .push_tool_results(&[
                ToolResult::success("c1", "multiply", "35"),
                ToolResult::success("c1", "multiply", "35"),
            ])
            .unwrap_err();
        assert!(matches!(err, ConversationError::UncorrelatedToolResult(_)));
    }

    #[test]
    fn results_need_a_preceding_assistant_call() {
        let mut conversation = Conversation::new();
        conversation.push_user("hello");
        let err = conversation
            .push_tool_results(&[ToolResult::success("c1", "add", "1")])
            .unwrap_err();
        assert_eq!(err, ConversationError::NoPendingToolCalls);
    }

    #[test]
    fn only_the_latest_assistant_counts() {
        let mut conversation = conversation_with_calls(&["old"]);
        conversation
            .push_tool_results(&[ToolResult::success("old", "multiply", "35")])
            .unwrap();
        conversation
            .push_assistant(Message::assistant_with_calls(None, vec![call("new", "add")]))
            .unwrap();

        let err = conversation
            .push_tool_results(&[ToolResult::success("old", "add", "38")])
            .unwrap_err();
        assert_eq!(err, ConversationError::UncorrelatedToolResult("old".to_string()));
    }

    #[test]
    fn push_assistant_rejects_other_roles() {
        let mut conversation = Conversation::new();
        let err = conversation.push_assistant(Message::user("hi")).unwrap_err();
        assert_eq!(err, ConversationError::UnexpectedRole("user"));
    }

    #[test]
    fn reset_keeps_system_prompt() {
        let mut conversation = conversation_with_calls(&["c1"]);
        conversation.reset();
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].role, Role::System);

        let mut blank = Conversation::with_system_prompt("   ");
        blank.push_user("x");
        blank.reset();
        assert!(blank.is_empty());
    }
}
