// crates/envoy/src/main.rs
mod ui;

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use switchboard_engine::config::Config;
use switchboard_engine::{setup, EventSender};
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "switchboard", version, about = "Chat with a local model that can call tools")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model id for this run, overriding the config
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat (default)
    Chat,
    /// Send a single message and print the answer
    Ask {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// List the tools the model can call
    Tools,
    /// Show or change configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let command = match cli.command.unwrap_or(Command::Chat) {
        Command::Config { action } => {
            return match action.unwrap_or(ConfigAction::Show) {
                ConfigAction::Show => show_config(cli.config.as_deref()),
                ConfigAction::Set { key, value } => set_config(cli.config.as_deref(), &key, &value),
            };
        }
        other => other,
    };

    let mut config = Config::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(model) = &cli.model {
        config.set("model", model)?;
    }

    let registry = Arc::new(setup::build_registry(&config)?);
    tracing::debug!(tools = registry.len(), model = %config.model, "tools registered");

    if let Command::Tools = command {
        ui::print_tools(&registry, &mut io::stdout())?;
        return Ok(());
    }

    let (events, mut rx) = EventSender::channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let model = setup::build_model(&config, events.clone())?;
    let mut chat = setup::build_chat_loop(&config, model, registry, events, shutdown_rx.clone());

    match command {
        Command::Ask { message } => ui::ask_once(&mut chat, &mut rx, &message.join(" "), &mut io::stdout()).await,
        _ => {
            println!("Switchboard chat ({}). Type 'quit' to exit.\n", config.model);
            let stdin = BufReader::new(tokio::io::stdin());
            ui::run_session(&mut chat, &mut rx, shutdown_rx, stdin, &mut io::stdout()).await
        }
    }
}

fn show_config(path: Option<&Path>) -> Result<()> {
    let config = Config::load(path).context("failed to load config")?;
    let location = match path {
        Some(p) => p.to_path_buf(),
        None => Config::default_path()?,
    };

    println!("Config file: {}", location.display());
    for (key, value) in config.entries() {
        println!("  {} = {}", key, value);
    }
    let search = if config.search.api_key.is_some() { "enabled" } else { "disabled (TAVILY_API_KEY not set)" };
    println!("  web search: {}", search);
    Ok(())
}

/// Persists one key. Environment overrides are not applied, so they never
/// leak into the file.
fn set_config(path: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => Config::default_path()?,
    };

    let mut config = Config::load_from(&path)?;
    config.set(key, value)?;
    config.validate()?;
    config.save_to(&path)?;

    println!("{} updated in {}", key, path.display());
    Ok(())
}
