// crates/engine/src/model/mod.rs
//! Model adapters: the boundary between the chat loop and a remote LLM.

pub mod ollama;

use async_trait::async_trait;
use switchboard_shared::{Message, ToolDescriptor};
use thiserror::Error;

pub use ollama::OllamaAdapter;

/// Fresh id for a tool call the model left unnamed or named twice.
pub(crate) fn synthesize_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

#[derive(Debug, Error)]
pub enum ModelError {
    /// Transport, HTTP status or auth failure talking to the model.
    #[error("Model unavailable: {0}")]
    Unavailable(String),

    /// The model answered, but not in a shape we can use.
    #[error("Malformed model response: {0}")]
    Protocol(String),
}

/// One remote completion call. Implementations never retry.
///
/// The returned message is always assistant-authored. If it carries any
/// tool call it is non-final, whatever text accompanies it.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    async fn complete(&self, history: &[Message], tools: &[ToolDescriptor]) -> Result<Message, ModelError>;

    /// Model identifier, for logs.
    fn model(&self) -> &str;
}
