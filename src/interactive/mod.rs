//! User-facing surfaces around the agent loop
//!
//! Provides:
//! - The interactive debugging console (`sleuth debug`)
//! - Running one investigation with streamed progress
//! - Signal handling (Ctrl+C cancels the running investigation)

pub mod console;
pub mod signals;

pub use console::{Console, ConsoleInput, StdinConfirmer};
pub use signals::SignalHandler;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::agent::{AgentEvent, AgentLoop, AgentTranscript, Confirmer};
use crate::debugger::DebuggerSession;
use crate::transport::Transport;
use crate::{Config, Result};

/// Per-investigation overrides
#[derive(Default)]
pub struct InvestigationOptions<'a> {
    pub max_turns: Option<usize>,
    pub unattended: bool,
    pub confirmer: Option<&'a dyn Confirmer>,
    pub cancel: Option<watch::Receiver<bool>>,
    /// Debugger output produced before the investigation, oldest first
    pub history: Vec<String>,
}

/// Run one investigation, printing turn summaries as they happen, and save
/// the transcript when configured to
pub async fn investigate(
    config: &Config,
    session: &mut dyn DebuggerSession,
    transport: &dyn Transport,
    goal: &str,
    options: InvestigationOptions<'_>,
) -> Result<AgentTranscript> {
    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(rx));

    let transcript = {
        let mut agent = AgentLoop::new(config, transport)?
            .with_events(tx)
            .with_unattended(options.unattended || config.agent.unattended);
        if let Some(max_turns) = options.max_turns {
            agent = agent.with_max_turns(max_turns);
        }
        if let Some(confirmer) = options.confirmer {
            agent = agent.with_confirmer(confirmer);
        }
        if let Some(cancel) = options.cancel {
            agent = agent.with_cancel(cancel);
        }
        for output in options.history {
            agent.record_output(output);
        }
        agent.run(session, goal).await
    };

    // The agent (and its sender) is gone, so the printer drains and stops
    if let Err(e) = printer.await {
        warn!("Event printer failed: {}", e);
    }

    if config.transcripts.save {
        let dir = config.transcript_dir();
        match transcript.save(&dir) {
            Ok(path) => info!("Transcript saved to {}", path.display()),
            Err(e) => warn!("Failed to save transcript: {}", e),
        }
    }

    Ok(transcript)
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<AgentEvent>) {
    while let Some(event) = rx.recv().await {
        println!("{}", render_event(&event));
    }
}

/// Human-readable rendering of a progress event
pub fn render_event(event: &AgentEvent) -> String {
    match event {
        AgentEvent::Started { id, goal } => {
            format!("Investigating: {}\n(transcript {})", goal, id)
        }
        AgentEvent::Turn {
            number,
            turn,
            analysis,
            next_step,
        } => {
            let mut text = String::new();
            if let Some(analysis) = analysis {
                text.push_str(&format!("  analysis: {}\n", analysis));
            }
            if let Some(next_step) = next_step {
                text.push_str(&format!("  next: {}\n", next_step));
            }
            text.push_str(&format!("[turn {}] {}", number, turn.summary_line()));
            text
        }
        AgentEvent::Finished {
            status,
            reason,
            summary,
        } => {
            let mut text = format!("Investigation {}", status);
            if let Some(reason) = reason {
                text.push_str(&format!(": {}", reason));
            }
            if let Some(summary) = summary {
                text.push_str(&format!("\n\nConclusion:\n{}", summary));
            }
            text
        }
    }
}
