// crates/engine/src/model/ollama.rs
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use switchboard_shared::{Message, Role, ToolCallRequest, ToolDescriptor};

use super::{synthesize_call_id, ModelAdapter, ModelError};
use crate::events::EventSender;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDescriptor]>,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct WireMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct WireToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct WireFunctionCall {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize, Debug)]
struct StreamChunk {
    #[serde(default)]
    message: WireMessage,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Adapter for an Ollama-compatible `/api/chat` endpoint.
pub struct OllamaAdapter {
    client: Client,
    model: String,
    url: String,
    streaming: bool,
    events: EventSender,
}

impl OllamaAdapter {
    pub fn new(model: impl Into<String>, url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build model HTTP client")?;

        Ok(Self {
            client,
            model: model.into(),
            url: url.into(),
            streaming: false,
            events: EventSender::disabled(),
        })
    }

    pub fn streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Streamed text chunks are forwarded here as they arrive.
    pub fn with_events(mut self, events: EventSender) -> Self {
        self.events = events;
        self
    }

    async fn send(&self, history: &[Message], tools: &[ToolDescriptor]) -> Result<reqwest::Response, ModelError> {
        let request = ChatRequest {
            model: &self.model,
            messages: history.iter().map(to_wire).collect(),
            stream: self.streaming,
            tools: if tools.is_empty() { None } else { Some(tools) },
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Unavailable(format!("request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Unavailable(format!("{} returned {}: {}", self.url, status, body.trim())));
        }

        Ok(response)
    }

    async fn execute_standard(&self, history: &[Message], tools: &[ToolDescriptor]) -> Result<Message, ModelError> {
        let response = self.send(history, tools).await?;

        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Unavailable(format!("failed to read response body: {}", e)))?;

        decode_response(&body)
    }

    async fn execute_streaming(&self, history: &[Message], tools: &[ToolDescriptor]) -> Result<Message, ModelError> {
        let response = self.send(history, tools).await?;

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();
        let mut accumulator = StreamAccumulator::default();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| ModelError::Unavailable(format!("stream interrupted: {}", e)))?;
            buffer.extend_from_slice(&bytes);

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
                if let Some(text) = accumulator.push_line(&String::from_utf8_lossy(&line))? {
                    self.events.stream_chunk(text);
                }
            }
        }

        if !buffer.is_empty() {
            if let Some(text) = accumulator.push_line(&String::from_utf8_lossy(&buffer))? {
                self.events.stream_chunk(text);
            }
        }

        accumulator.finish()
    }
}

#[async_trait]
impl ModelAdapter for OllamaAdapter {
    async fn complete(&self, history: &[Message], tools: &[ToolDescriptor]) -> Result<Message, ModelError> {
        tracing::debug!(model = %self.model, messages = history.len(), tools = tools.len(), "model request");

        if self.streaming {
            self.execute_streaming(history, tools).await
        } else {
            self.execute_standard(history, tools).await
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Collects newline-delimited chunks into one assistant message.
#[derive(Default)]
struct StreamAccumulator {
    content: String,
    tool_calls: Vec<WireToolCall>,
    done: bool,
}

impl StreamAccumulator {
    /// Returns the text delta carried by the line, if any.
    fn push_line(&mut self, line: &str) -> Result<Option<String>, ModelError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let chunk: StreamChunk = serde_json::from_str(line)
            .map_err(|e| ModelError::Protocol(format!("bad stream chunk: {}", e)))?;

        if let Some(error) = chunk.error {
            return Err(ModelError::Unavailable(format!("model reported an error: {}", error)));
        }

        if let Some(calls) = chunk.message.tool_calls {
            self.tool_calls.extend(calls);
        }
        self.done |= chunk.done;

        match chunk.message.content {
            Some(text) if !text.is_empty() => {
                self.content.push_str(&text);
                Ok(Some(text))
            }
            _ => Ok(None),
        }
    }

    fn finish(self) -> Result<Message, ModelError> {
        if !self.done {
            return Err(ModelError::Unavailable(
                "model stream ended before the response was done".to_string(),
            ));
        }

        decode_message(WireMessage {
            role: Role::Assistant.as_str().to_string(),
            content: Some(self.content),
            tool_calls: Some(self.tool_calls),
            tool_name: None,
        })
    }
}

fn decode_response(body: &str) -> Result<Message, ModelError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ModelError::Protocol(format!("unexpected response body: {}", e)))?;

    if let Some(error) = parsed.error {
        return Err(ModelError::Unavailable(format!("model reported an error: {}", error)));
    }
    let message = parsed
        .message
        .ok_or_else(|| ModelError::Protocol("response has no message".to_string()))?;

    decode_message(message)
}

fn to_wire(message: &Message) -> WireMessage {
    let tool_calls = if message.tool_calls.is_empty() {
        None
    } else {
        Some(
            message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: Some(call.id.clone()),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: Value::Object(call.arguments.clone()),
                    },
                })
                .collect(),
        )
    };

    WireMessage {
        role: message.role.as_str().to_string(),
        content: Some(message.text().to_string()),
        tool_calls,
        tool_name: message.tool_name.clone(),
    }
}

fn decode_message(wire: WireMessage) -> Result<Message, ModelError> {
    if !wire.role.is_empty() && wire.role != Role::Assistant.as_str() {
        return Err(ModelError::Protocol(format!("expected assistant message, got role '{}'", wire.role)));
    }

    let tool_calls = wire
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(decode_tool_call)
        .collect::<Result<Vec<_>, _>>()?;

    let content = wire.content.filter(|c| !c.is_empty());

    let mut message = Message::assistant_with_calls(content, tool_calls);
    let replaced = message.ensure_unique_call_ids(synthesize_call_id);
    if replaced > 0 {
        tracing::debug!(replaced, "assigned tool call ids");
    }
    Ok(message)
}

fn decode_tool_call(call: WireToolCall) -> Result<ToolCallRequest, ModelError> {
    let name = call.function.name.trim().to_string();
    if name.is_empty() {
        return Err(ModelError::Protocol("tool call without a function name".to_string()));
    }

    let arguments = decode_arguments(&name, call.function.arguments)?;
    // missing ids are filled in by decode_message
    Ok(ToolCallRequest::new(call.id.unwrap_or_default(), name, arguments))
}

/// Arguments arrive either as an object or as a JSON-encoded object string.
fn decode_arguments(tool: &str, raw: Value) -> Result<Map<String, Value>, ModelError> {
    match raw {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::String(text) if text.trim().is_empty() => Ok(Map::new()),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ModelError::Protocol(format!(
                "arguments for '{}' must be an object, got {}",
                tool, other
            ))),
            Err(e) => Err(ModelError::Protocol(format!(
                "unparseable arguments for '{}': {}",
                tool, e
            ))),
        },
        other => Err(ModelError::Protocol(format!(
            "arguments for '{}' must be an object, got {}",
            tool, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchboard_shared::ToolResult;

    fn wire(value: Value) -> WireMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn plain_reply_is_final() {
        let msg = decode_message(wire(json!({ "role": "assistant", "content": "38" }))).unwrap();
        assert_eq!(msg.text(), "38");
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn object_arguments_and_missing_ids() {
        let msg = decode_message(wire(json!({
            "role": "assistant",
            "content": "",
            "tool_calls": [
                { "function": { "name": "multiply", "arguments": { "a": 5, "b": 7 } } },
                { "function": { "name": "add", "arguments": { "a": 35, "b": 3 } } }
            ]
        })))
        .unwrap();

        assert_eq!(msg.content, None);
        assert_eq!(msg.tool_calls.len(), 2);
        assert_eq!(msg.tool_calls[0].name, "multiply");
        assert_eq!(msg.tool_calls[0].arguments["b"], json!(7));
        assert!(msg.tool_calls[0].id.starts_with("call_"));
        assert_ne!(msg.tool_calls[0].id, msg.tool_calls[1].id);
    }

    #[test]
    fn string_encoded_arguments_are_parsed() {
        let msg = decode_message(wire(json!({
            "role": "assistant",
            "tool_calls": [
                { "id": "abc", "function": { "name": "search", "arguments": "{\"query\": \"langgraph\"}" } }
            ]
        })))
        .unwrap();

        assert_eq!(msg.tool_calls[0].id, "abc");
        assert_eq!(msg.tool_calls[0].arguments["query"], json!("langgraph"));
    }

    #[test]
    fn garbage_arguments_are_protocol_errors() {
        let err = decode_message(wire(json!({
            "role": "assistant",
            "tool_calls": [ { "function": { "name": "add", "arguments": "{a: 1" } } ]
        })))
        .unwrap_err();
        assert!(matches!(err, ModelError::Protocol(ref m) if m.contains("add")));

        let err = decode_message(wire(json!({
            "role": "assistant",
            "tool_calls": [ { "function": { "name": "add", "arguments": [1, 2] } } ]
        })))
        .unwrap_err();
        assert!(matches!(err, ModelError::Protocol(_)));

        let err = decode_message(wire(json!({
            "role": "assistant",
            "tool_calls": [ { "function": { "name": "", "arguments": {} } } ]
        })))
        .unwrap_err();
        assert!(matches!(err, ModelError::Protocol(_)));
    }

    #[test]
    fn stream_chunks_accumulate() {
        let mut acc = StreamAccumulator::default();
        assert_eq!(
            acc.push_line(r#"{"message":{"role":"assistant","content":"The answer "},"done":false}"#).unwrap(),
            Some("The answer ".to_string())
        );
        assert_eq!(acc.push_line("   ").unwrap(), None);
        acc.push_line(r#"{"message":{"role":"assistant","content":"is 38"},"done":false}"#).unwrap();
        acc.push_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#).unwrap();

        let msg = acc.finish().unwrap();
        assert_eq!(msg.text(), "The answer is 38");
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn stream_tool_calls_are_collected() {
        let mut acc = StreamAccumulator::default();
        acc.push_line(
            r#"{"message":{"role":"assistant","content":"","tool_calls":[{"function":{"name":"add","arguments":{"a":1,"b":2}}}]},"done":false}"#,
        )
        .unwrap();
        acc.push_line(r#"{"message":{"role":"assistant","content":""},"done":true}"#).unwrap();

        let msg = acc.finish().unwrap();
        assert_eq!(msg.tool_calls.len(), 1);
        assert_eq!(msg.tool_calls[0].name, "add");
    }

    #[test]
    fn bad_stream_line_is_protocol_error() {
        let mut acc = StreamAccumulator::default();
        assert!(matches!(acc.push_line("not json"), Err(ModelError::Protocol(_))));
    }

    #[test]
    fn history_maps_to_wire_roles() {
        let call = ToolCallRequest::new("c1", "add", json!({ "a": 1, "b": 2 }).as_object().cloned().unwrap());
        let assistant = Message::assistant_with_calls(None, vec![call]);
        let tool = Message::tool(&ToolResult::success("c1", "add", "3"));

        let wire_assistant = serde_json::to_value(to_wire(&assistant)).unwrap();
        assert_eq!(wire_assistant["role"], json!("assistant"));
        assert_eq!(wire_assistant["content"], json!(""));
        assert_eq!(wire_assistant["tool_calls"][0]["function"]["arguments"]["b"], json!(2));

        let wire_tool = serde_json::to_value(to_wire(&tool)).unwrap();
        assert_eq!(wire_tool["role"], json!("tool"));
        assert_eq!(wire_tool["tool_name"], json!("add"));
        assert_eq!(wire_tool["content"], json!("3"));
    }

    #[tokio::test]
    async fn request_failures_are_unavailable() {
        // rejected while building the request, before any connection
        let adapter = OllamaAdapter::new("qwen3:8b", "not a url", Duration::from_secs(2)).unwrap();
        let err = adapter.complete(&[Message::user("hi")], &[]).await.unwrap_err();
        assert!(matches!(err, ModelError::Unavailable(ref m) if m.contains("not a url")));
    }

    #[test]
    fn repeated_ids_in_one_reply_are_made_unique() {
        let msg = decode_message(wire(json!({
            "role": "assistant",
            "tool_calls": [
                { "id": "call_0", "function": { "name": "add", "arguments": { "a": 1, "b": 2 } } },
                { "id": "call_0", "function": { "name": "add", "arguments": { "a": 3, "b": 4 } } }
            ]
        })))
        .unwrap();

        assert_eq!(msg.tool_calls[0].id, "call_0");
        assert_ne!(msg.tool_calls[1].id, "call_0");
        assert!(msg.tool_calls[1].id.starts_with("call_"));
        assert_eq!(msg.tool_calls[1].arguments["a"], json!(3));
    }

    #[test]
    fn error_line_in_stream_is_unavailable() {
        let mut acc = StreamAccumulator::default();
        acc.push_line(r#"{"message":{"role":"assistant","content":"The answer "},"done":false}"#).unwrap();

        let err = acc
            .push_line(r#"{"error":"model runner has unexpectedly stopped"}"#)
            .unwrap_err();
        assert!(matches!(err, ModelError::Unavailable(ref m) if m.contains("unexpectedly stopped")));
    }

    #[test]
    fn stream_without_done_marker_is_rejected() {
        let mut acc = StreamAccumulator::default();
        acc.push_line(r#"{"message":{"role":"assistant","content":"The answer is 3"},"done":false}"#).unwrap();

        assert!(matches!(acc.finish(), Err(ModelError::Unavailable(_))));
    }

    #[test]
    fn error_body_in_standard_mode_is_unavailable() {
        let err = decode_response(r#"{"error":"model 'nope' not found"}"#).unwrap_err();
        assert!(matches!(err, ModelError::Unavailable(ref m) if m.contains("not found")));

        let err = decode_response(r#"{"done":true}"#).unwrap_err();
        assert!(matches!(err, ModelError::Protocol(_)));
    }
}
