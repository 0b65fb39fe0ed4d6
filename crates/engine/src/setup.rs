// crates/engine/src/setup.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use switchboard_shared::toolbelts::{Arithmetic, WebSearch};
use switchboard_shared::ToolRegistry;
use tokio::sync::watch;

use crate::config::Config;
use crate::events::EventSender;
use crate::model::{ModelAdapter, OllamaAdapter};
use crate::task::{ChatLoop, Dispatcher};

/// Registry with every toolbelt the config enables.
pub fn build_registry(config: &Config) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    Arc::new(Arithmetic)
        .register_into(&mut registry)
        .context("failed to register arithmetic tools")?;

    match &config.search.api_key {
        Some(key) => {
            let search = WebSearch::new(key.clone(), config.search.max_results)?;
            Arc::new(search)
                .register_into(&mut registry)
                .context("failed to register web search tools")?;
        }
        None => tracing::info!("TAVILY_API_KEY not set, web search disabled"),
    }

    Ok(registry)
}

pub fn build_model(config: &Config, events: EventSender) -> Result<Arc<dyn ModelAdapter>> {
    let adapter = OllamaAdapter::new(&config.model, &config.model_url, config.request_timeout())?
        .streaming(config.streaming)
        .with_events(events);
    Ok(Arc::new(adapter))
}

pub fn build_chat_loop(
    config: &Config,
    model: Arc<dyn ModelAdapter>,
    registry: Arc<ToolRegistry>,
    events: EventSender,
    shutdown: watch::Receiver<bool>,
) -> ChatLoop {
    let dispatcher = Dispatcher::new(registry)
        .parallel(config.parallel_tools)
        .with_events(events.clone());

    ChatLoop::new(model, dispatcher)
        .system_prompt(config.system_prompt.clone())
        .max_rounds(config.max_rounds)
        .with_events(events)
        .with_shutdown(shutdown)
}
