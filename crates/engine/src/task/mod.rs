// crates/engine/src/task/mod.rs
//! The chat loop: user turn in, model and tools in alternation, final
//! answer out.
//!
//! ```text
//! AwaitingUser --input--> AwaitingModel --no tool calls--> Final --> AwaitingUser
//!                              ^    |
//!                              |    +--tool calls--> AwaitingTools
//!                              +-----------results---------+
//! ```

pub mod conversation;
pub mod dispatcher;

use std::future::Future;
use std::sync::Arc;

use switchboard_shared::Route;
use thiserror::Error;
use tokio::sync::watch;

use crate::events::EventSender;
use crate::model::{synthesize_call_id, ModelAdapter, ModelError};
pub use conversation::{Conversation, ConversationError};
pub use dispatcher::Dispatcher;

pub const DEFAULT_MAX_ROUNDS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingUser,
    AwaitingModel,
    AwaitingTools,
    Final,
}

#[derive(Debug, Error)]
pub enum LoopError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Conversation(#[from] ConversationError),

    #[error("Stopped after {max_rounds} model rounds without a final answer")]
    RoundLimitExceeded { max_rounds: u32 },

    #[error("Turn cancelled")]
    Cancelled,

    #[error("A turn is already in progress")]
    TurnInProgress,

    #[error("No turn in progress")]
    Idle,
}

/// Owns one conversation and drives it through the model/tool loop.
pub struct ChatLoop {
    model: Arc<dyn ModelAdapter>,
    dispatcher: Dispatcher,
    conversation: Conversation,
    state: LoopState,
    max_rounds: u32,
    rounds: u32,
    events: EventSender,
    shutdown: Option<watch::Receiver<bool>>,
}

impl ChatLoop {
    pub fn new(model: Arc<dyn ModelAdapter>, dispatcher: Dispatcher) -> Self {
        Self {
            model,
            dispatcher,
            conversation: Conversation::new(),
            state: LoopState::AwaitingUser,
            max_rounds: DEFAULT_MAX_ROUNDS,
            rounds: 0,
            events: EventSender::disabled(),
            shutdown: None,
        }
    }

    /// Replaces the history with one that starts from `prompt`.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.conversation = Conversation::with_system_prompt(prompt);
        self
    }

    pub fn max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    /// Once the receiver reads `true`, in-flight model and tool calls are
    /// dropped and the turn ends with [`LoopError::Cancelled`].
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn reset(&mut self) {
        self.conversation.reset();
        self.state = LoopState::AwaitingUser;
        self.rounds = 0;
    }

    /// Runs one user turn to completion and returns the final answer.
    /// The loop is back in `AwaitingUser` afterwards, whatever the outcome.
    pub async fn run_turn(&mut self, input: &str) -> Result<String, LoopError> {
        self.submit(input)?;

        let outcome = loop {
            match self.step().await {
                Ok(LoopState::Final) => {
                    let content = self
                        .conversation
                        .last()
                        .map(|m| m.text().to_string())
                        .unwrap_or_default();
                    break Ok(content);
                }
                Ok(_) => continue,
                Err(err) => break Err(err),
            }
        };

        self.state = LoopState::AwaitingUser;

        match &outcome {
            Ok(content) => self.events.complete(content),
            Err(err) => self.events.error(err.to_string()),
        }
        outcome
    }

    /// `AwaitingUser` + input: append the user message.
    pub fn submit(&mut self, input: &str) -> Result<(), LoopError> {
        match self.state {
            LoopState::AwaitingUser | LoopState::Final => {
                self.conversation.push_user(input);
                self.rounds = 0;
                self.state = LoopState::AwaitingModel;
                Ok(())
            }
            LoopState::AwaitingModel | LoopState::AwaitingTools => Err(LoopError::TurnInProgress),
        }
    }

    /// Performs exactly one transition and returns the new state.
    pub async fn step(&mut self) -> Result<LoopState, LoopError> {
        let next = match self.state {
            LoopState::AwaitingUser | LoopState::Final => return Err(LoopError::Idle),
            LoopState::AwaitingModel => self.call_model().await?,
            LoopState::AwaitingTools => self.run_tools().await?,
        };
        self.state = next;
        Ok(next)
    }

    async fn call_model(&mut self) -> Result<LoopState, LoopError> {
        if self.rounds >= self.max_rounds {
            tracing::warn!(max_rounds = self.max_rounds, "round limit reached");
            return Err(LoopError::RoundLimitExceeded {
                max_rounds: self.max_rounds,
            });
        }
        self.rounds += 1;

        let tools = self.dispatcher.registry().descriptors();
        tracing::debug!(round = self.rounds, model = self.model.model(), "calling model");

        let mut reply = cancellable(
            self.shutdown.clone(),
            self.model.complete(self.conversation.messages(), &tools),
        )
        .await??;

        let replaced = reply.ensure_unique_call_ids(synthesize_call_id);
        if replaced > 0 {
            tracing::warn!(replaced, "model repeated tool call ids");
        }

        let next = match reply.route() {
            Route::Final(_) => LoopState::Final,
            Route::ToolCallsPending(calls) => {
                tracing::debug!(calls = calls.len(), "model requested tools");
                LoopState::AwaitingTools
            }
        };

        self.conversation.push_assistant(reply)?;
        Ok(next)
    }

    async fn run_tools(&mut self) -> Result<LoopState, LoopError> {
        let calls = self.conversation.pending_tool_calls();
        if calls.is_empty() {
            return Err(ConversationError::NoPendingToolCalls.into());
        }

        let results = cancellable(self.shutdown.clone(), self.dispatcher.dispatch(&calls)).await?;
        self.conversation.push_tool_results(&results)?;
        Ok(LoopState::AwaitingModel)
    }
}

/// Races `fut` against the shutdown signal. An already-fired signal wins
/// before `fut` is polled.
async fn cancellable<F: Future>(shutdown: Option<watch::Receiver<bool>>, fut: F) -> Result<F::Output, LoopError> {
    tokio::select! {
        biased;
        _ = cancelled(shutdown) => Err(LoopError::Cancelled),
        output = fut => Ok(output),
    }
}

async fn cancelled(shutdown: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = shutdown {
        if rx.wait_for(|&stop| stop).await.is_ok() {
            return;
        }
    }
    // no signal source, or its sender is gone
    std::future::pending::<()>().await
}
