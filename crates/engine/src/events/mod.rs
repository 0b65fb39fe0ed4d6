// crates/engine/src/events/mod.rs
use tokio::sync::mpsc;
pub use switchboard_shared::events::ChatEvent;

const DISPLAY_LIMIT: usize = 500;

/// Cheap, cloneable handle for emitting loop events to whoever is listening.
/// A disabled sender drops everything.
#[derive(Clone, Debug, Default)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<ChatEvent>>,
}

impl EventSender {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    fn send(&self, event: ChatEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event); // receiver may be gone
        }
    }

    pub fn tool_call(&self, call_id: &str, tool: &str, args: serde_json::Value) {
        self.send(ChatEvent::ToolCall {
            call_id: call_id.to_string(),
            tool: tool.to_string(),
            args,
        });
    }

    pub fn tool_result(&self, call_id: &str, tool: &str, result: &str, is_error: bool) {
        let total = result.chars().count();
        let truncated = total > DISPLAY_LIMIT;
        let display_result = if truncated {
            let head: String = result.chars().take(DISPLAY_LIMIT).collect();
            format!("{}... ({} chars total)", head, total)
        } else {
            result.to_string()
        };

        self.send(ChatEvent::ToolResult {
            call_id: call_id.to_string(),
            tool: tool.to_string(),
            result: display_result,
            is_error,
            truncated,
        });
    }

    pub fn stream_chunk(&self, content: String) {
        self.send(ChatEvent::StreamChunk { content });
    }

    pub fn complete(&self, content: &str) {
        self.send(ChatEvent::ResponseComplete {
            content: content.to_string(),
        });
    }

    pub fn error(&self, message: String) {
        self.send(ChatEvent::Error { message });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_results_are_truncated_for_display() {
        let (events, mut rx) = EventSender::channel();
        events.tool_result("c1", "fetch_page", &"x".repeat(600), false);

        match rx.try_recv().unwrap() {
            ChatEvent::ToolResult { result, truncated, .. } => {
                assert!(truncated);
                assert!(result.ends_with("... (600 chars total)"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn disabled_sender_drops_events() {
        let events = EventSender::disabled();
        events.complete("done");
        events.error("ignored".to_string());
    }
}
