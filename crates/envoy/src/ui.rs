// crates/envoy/src/ui.rs
use std::io::{self, Write};

use anyhow::{Context, Result};
use switchboard_engine::{ChatEvent, ChatLoop, LoopError};
use switchboard_shared::{ToolRegistry, ToolSpec};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};

const EXIT_TOKENS: &[&str] = &["quit", "exit", "q"];

pub fn is_exit_token(input: &str) -> bool {
    let input = input.trim();
    EXIT_TOKENS.iter().any(|token| input.eq_ignore_ascii_case(token))
}

/// Interactive session: one user turn per input line until an exit token,
/// EOF or Ctrl+C.
pub async fn run_session<R, W>(
    chat: &mut ChatLoop,
    events: &mut mpsc::UnboundedReceiver<ChatEvent>,
    mut shutdown: watch::Receiver<bool>,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        write!(out, "You: ")?;
        out.flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read input")?,
            _ = interrupted(&mut shutdown) => None,
        };

        let Some(line) = line else {
            writeln!(out)?;
            writeln!(out, "Goodbye!")?;
            return Ok(());
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit_token(input) {
            writeln!(out, "Goodbye!")?;
            return Ok(());
        }

        writeln!(out)?;
        let turn = drive_turn(chat, events, input, out).await?;

        match turn.outcome {
            Ok(answer) => {
                print_answer(turn.streamed, &answer, out)?;
                writeln!(out)?;
            }
            Err(LoopError::Cancelled) => {
                writeln!(out, "\nCancelled. Goodbye!")?;
                return Ok(());
            }
            Err(err @ LoopError::RoundLimitExceeded { .. }) => {
                tracing::warn!(error = %err, "turn abandoned");
                writeln!(out, "Error: {}\n", err)?;
            }
            Err(err) => return Err(err).context("chat session ended"),
        }
    }
}

/// Single turn for `switchboard ask`.
pub async fn ask_once<W: Write>(
    chat: &mut ChatLoop,
    events: &mut mpsc::UnboundedReceiver<ChatEvent>,
    message: &str,
    out: &mut W,
) -> Result<()> {
    let turn = drive_turn(chat, events, message, out).await?;
    let answer = turn.outcome?;
    print_answer(turn.streamed, &answer, out)?;
    Ok(())
}

pub fn print_tools<W: Write>(registry: &ToolRegistry, out: &mut W) -> io::Result<()> {
    if registry.is_empty() {
        return writeln!(out, "No tools registered.");
    }

    for belt in registry.toolbelts() {
        writeln!(out, "{}:", belt.description)?;
        for name in &belt.tools {
            if let Ok(spec) = registry.resolve(name) {
                print_tool(&spec, out)?;
            }
        }
    }

    let mut loose = registry.loose_specs().peekable();
    if loose.peek().is_some() {
        writeln!(out, "Other tools:")?;
        for spec in loose {
            print_tool(spec, out)?;
        }
    }
    Ok(())
}

fn print_tool<W: Write>(spec: &ToolSpec, out: &mut W) -> io::Result<()> {
    writeln!(out, "  {} - {}", spec.name(), spec.description())?;
    for param in &spec.schema.parameters {
        let required = if param.required { "required" } else { "optional" };
        writeln!(
            out,
            "      {} ({}, {}): {}",
            param.name,
            param.param_type.json_name(),
            required,
            param.description
        )?;
    }
    Ok(())
}

struct Turn {
    outcome: Result<String, LoopError>,
    /// The final round arrived as stream chunks and is already on screen.
    streamed: bool,
}

fn print_answer<W: Write>(streamed: bool, answer: &str, out: &mut W) -> io::Result<()> {
    if streamed {
        writeln!(out)
    } else {
        writeln!(out, "Assistant: {}", answer)
    }
}

/// Runs one turn while rendering its events as they arrive.
async fn drive_turn<W: Write>(
    chat: &mut ChatLoop,
    events: &mut mpsc::UnboundedReceiver<ChatEvent>,
    input: &str,
    out: &mut W,
) -> io::Result<Turn> {
    let mut view = EventView::default();

    let outcome = {
        let turn = chat.run_turn(input);
        tokio::pin!(turn);

        loop {
            tokio::select! {
                outcome = &mut turn => break outcome,
                Some(event) = events.recv() => view.render(&event, out)?,
            }
        }
    };

    while let Ok(event) = events.try_recv() {
        view.render(&event, out)?;
    }

    Ok(Turn {
        outcome,
        streamed: view.streamed_since_tools,
    })
}

#[derive(Default)]
struct EventView {
    mid_line: bool,
    streamed_since_tools: bool,
}

impl EventView {
    fn render<W: Write>(&mut self, event: &ChatEvent, out: &mut W) -> io::Result<()> {
        match event {
            ChatEvent::ToolCall { tool, args, .. } => {
                self.end_line(out)?;
                writeln!(out, "[tool] {}({})", tool, args)?;
            }
            ChatEvent::ToolResult {
                result,
                is_error,
                truncated,
                ..
            } => {
                self.end_line(out)?;
                if *is_error {
                    writeln!(out, "   ! {}", result)?;
                } else if *truncated {
                    writeln!(out, "   = {} [truncated]", result.lines().next().unwrap_or(""))?;
                } else {
                    writeln!(out, "   = {}", result)?;
                }
            }
            ChatEvent::StreamChunk { content } => {
                if !self.mid_line {
                    write!(out, "Assistant: ")?;
                    self.mid_line = true;
                }
                write!(out, "{}", content)?;
                out.flush()?;
                self.streamed_since_tools = true;
            }
            // the turn outcome carries these
            ChatEvent::ResponseComplete { .. } | ChatEvent::Error { .. } => {}
        }
        Ok(())
    }

    fn end_line<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        self.streamed_since_tools = false;
        if self.mid_line {
            self.mid_line = false;
            writeln!(out)?;
        }
        Ok(())
    }
}

async fn interrupted(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|&stop| stop).await.is_err() {
        std::future::pending::<()>().await
    }
}
