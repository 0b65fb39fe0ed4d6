// crates/engine/src/lib.rs
pub mod config;
pub mod events;
pub mod model;
pub mod setup;
pub mod task;

pub use config::Config;
pub use events::{ChatEvent, EventSender};
pub use model::{ModelAdapter, ModelError, OllamaAdapter};
pub use task::{ChatLoop, Conversation, Dispatcher, LoopError, LoopState};
