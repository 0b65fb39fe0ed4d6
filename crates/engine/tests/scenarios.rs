// crates/engine/tests/scenarios.rs
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use switchboard_engine::{ChatEvent, ChatLoop, Dispatcher, EventSender, LoopError, ModelAdapter, ModelError};
use switchboard_shared::toolbelts::Arithmetic;
use switchboard_shared::{Message, Role, ToolCallRequest, ToolDescriptor, ToolRegistry};

type Reply = Box<dyn Fn(&[Message]) -> Result<Message, ModelError> + Send + Sync>;

/// Model double that decides its reply from the history it is shown.
struct FnModel {
    reply: Reply,
    histories: Mutex<Vec<Vec<Message>>>,
    offered: Mutex<Vec<String>>,
}

impl FnModel {
    fn new(reply: impl Fn(&[Message]) -> Result<Message, ModelError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            histories: Mutex::new(Vec::new()),
            offered: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.histories.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelAdapter for FnModel {
    async fn complete(&self, history: &[Message], tools: &[ToolDescriptor]) -> Result<Message, ModelError> {
        self.histories.lock().unwrap().push(history.to_vec());
        *self.offered.lock().unwrap() = tools.iter().map(|t| t.name().to_string()).collect();
        (self.reply)(history)
    }

    fn model(&self) -> &str {
        "fn-model"
    }
}

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn tool_messages_this_turn(history: &[Message]) -> Vec<&Message> {
    let start = history.iter().rposition(|m| m.role == Role::User).unwrap_or(0);
    history[start..].iter().filter(|m| m.role == Role::Tool).collect()
}

fn arithmetic_loop(model: Arc<FnModel>, events: EventSender) -> ChatLoop {
    let mut registry = ToolRegistry::new();
    Arc::new(Arithmetic).register_into(&mut registry).unwrap();

    let dispatcher = Dispatcher::new(Arc::new(registry)).with_events(events.clone());
    ChatLoop::new(model, dispatcher)
        .system_prompt("You are my AI assistant, please answer my query to the best of your ability.")
        .with_events(events)
}

#[tokio::test]
async fn multiply_then_add_reaches_38() {
    let model = FnModel::new(|history| {
        let tools = tool_messages_this_turn(history);
        Ok(match tools.len() {
            0 => Message::assistant_with_calls(
                None,
                vec![ToolCallRequest::new("m1", "multiply", args(json!({ "a": 5, "b": 7 })))],
            ),
            1 => {
                let product: i64 = tools[0].text().parse().unwrap();
                Message::assistant_with_calls(
                    None,
                    vec![ToolCallRequest::new("a1", "add", args(json!({ "a": product, "b": 3 })))],
                )
            }
            _ => Message::assistant(format!("The result is {}.", tools[1].text())),
        })
    });

    let (events, mut rx) = EventSender::channel();
    let mut chat = arithmetic_loop(Arc::clone(&model), events);

    let answer = chat.run_turn("Multiply 5 by 7 then add 3").await.unwrap();
    assert!(answer.contains("38"), "answer was {:?}", answer);
    assert_eq!(model.calls(), 3);
    assert_eq!(*model.offered.lock().unwrap(), vec!["multiply", "add"]);

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.last(), Some(ChatEvent::ResponseComplete { content }) if content.contains("38")));
    assert_eq!(
        seen.iter().filter(|e| matches!(e, ChatEvent::ToolCall { .. })).count(),
        2
    );
}

#[tokio::test]
async fn unknown_tool_is_reported_and_the_loop_continues() {
    let model = FnModel::new(|history| {
        let tools = tool_messages_this_turn(history);
        Ok(match tools.first() {
            None => Message::assistant_with_calls(
                None,
                vec![ToolCallRequest::new("d1", "divide", args(json!({ "a": 10, "b": 2 })))],
            ),
            Some(result) => Message::assistant(format!("I could not divide: {}", result.text())),
        })
    });

    let mut chat = arithmetic_loop(Arc::clone(&model), EventSender::disabled());
    let answer = chat.run_turn("Divide 10 by 2").await.unwrap();

    let messages = chat.conversation().messages();
    let tool_msg = messages.iter().find(|m| m.role == Role::Tool).unwrap();
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("d1"));
    assert!(tool_msg.text().contains("divide"));
    assert!(tool_msg.text().starts_with("Error:"));
    assert!(answer.contains("divide"));
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn two_calls_in_one_reply_yield_two_tool_messages() {
    let model = FnModel::new(|history| {
        Ok(if tool_messages_this_turn(history).is_empty() {
            Message::assistant_with_calls(
                Some("Computing both.".to_string()),
                vec![
                    ToolCallRequest::new("m1", "multiply", args(json!({ "a": 5, "b": 7 }))),
                    ToolCallRequest::new("a1", "add", args(json!({ "a": 35, "b": 3 }))),
                ],
            )
        } else {
            Message::assistant("done")
        })
    });

    let mut chat = arithmetic_loop(Arc::clone(&model), EventSender::disabled());
    chat.run_turn("Multiply 5 by 7 then add 3").await.unwrap();

    let histories = model.histories.lock().unwrap();
    let second_call = &histories[1];
    let tail: Vec<(Role, Option<&str>)> = second_call
        .iter()
        .skip(2)
        .map(|m| (m.role, m.tool_call_id.as_deref()))
        .collect();
    assert_eq!(
        tail,
        vec![
            (Role::Assistant, None),
            (Role::Tool, Some("m1")),
            (Role::Tool, Some("a1")),
        ]
    );
    assert_eq!(second_call[3].text(), "35");
    assert_eq!(second_call[4].text(), "38");
}

#[tokio::test]
async fn protocol_errors_end_the_turn() {
    let model = FnModel::new(|_| Err(ModelError::Protocol("unparseable arguments for 'add'".to_string())));
    let mut chat = arithmetic_loop(Arc::clone(&model), EventSender::disabled());

    let err = chat.run_turn("add things").await.unwrap_err();
    assert!(matches!(err, LoopError::Model(ModelError::Protocol(_))));
    assert!(err.to_string().contains("Malformed model response"));

    // history keeps the system prompt and user turn only
    assert_eq!(chat.conversation().len(), 2);
}
