// crates/engine/src/task/dispatcher.rs
use std::sync::Arc;

use futures_util::future::join_all;
use serde_json::Value;
use switchboard_shared::{ToolCallRequest, ToolError, ToolRegistry, ToolResult};
use tracing::Instrument;

use crate::events::EventSender;

/// Runs the tool calls of one assistant message against the registry.
///
/// Every request yields exactly one [`ToolResult`], in request order.
/// Failures (unknown tool, bad arguments, a tool returning an error) become
/// error results for the model to read; nothing here aborts the batch.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    parallel: bool,
    events: EventSender,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            parallel: true,
            events: EventSender::disabled(),
        }
    }

    /// Run independent calls of a batch concurrently. Result order is
    /// request order either way.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub async fn dispatch(&self, requests: &[ToolCallRequest]) -> Vec<ToolResult> {
        if self.parallel && requests.len() > 1 {
            join_all(requests.iter().map(|request| self.dispatch_one(request))).await
        } else {
            let mut results = Vec::with_capacity(requests.len());
            for request in requests {
                results.push(self.dispatch_one(request).await);
            }
            results
        }
    }

    async fn dispatch_one(&self, request: &ToolCallRequest) -> ToolResult {
        let span = tracing::debug_span!("tool_call", tool = %request.name, call_id = %request.id);

        async {
            self.events
                .tool_call(&request.id, &request.name, Value::Object(request.arguments.clone()));

            let result = match self.invoke(request).await {
                Ok(output) => ToolResult::success(&request.id, &request.name, render(output)),
                Err(err) => {
                    tracing::warn!(error = %err, "tool call failed");
                    ToolResult::error(&request.id, &request.name, err.to_string())
                }
            };

            self.events
                .tool_result(&result.call_id, &result.tool_name, &result.content, result.is_error);
            result
        }
        .instrument(span)
        .await
    }

    async fn invoke(&self, request: &ToolCallRequest) -> Result<Value, ToolError> {
        let spec = self
            .registry
            .resolve(&request.name)
            .map_err(|_| ToolError::UnknownTool(request.name.clone()))?;

        spec.schema
            .validate(&request.arguments)
            .map_err(|reason| ToolError::InvalidArguments {
                tool: request.name.clone(),
                reason,
            })?;

        (spec.handler)(request.arguments.clone())
            .await
            .map_err(|err| ToolError::Invocation {
                tool: request.name.clone(),
                reason: format!("{:#}", err),
            })
    }
}

/// Strings go through as-is; everything else is JSON-encoded.
fn render(output: Value) -> String {
    match output {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
