//! Autonomous investigation loop
//!
//! Each turn:
//! 1. Build a prompt from the goal, the transcript window and the latest snapshot
//! 2. Ask the transport for the next action
//! 3. Gate the proposed command (asking a human when needed)
//! 4. Execute it and take a fresh snapshot
//!
//! The loop ends when the AI concludes, a limit is hit, the debugger dies or
//! the user cancels. [`AgentLoop::run`] never fails: every ending is a
//! terminal [`TranscriptStatus`] with a reason.

mod action;
mod prompt;
pub mod transcript;

pub use action::{parse_reply, ParsedReply, ProposedAction};
pub use prompt::PromptBuilder;
pub use transcript::{AgentTranscript, TranscriptStatus, Turn};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::context::{ContextExtractor, ExtractOptions, OutputLog, SessionSnapshot};
use crate::debugger::DebuggerSession;
use crate::executor::{CommandExecutor, ExecutionError};
use crate::gate::{GateContext, GateDecision, SafetyGate};
use crate::transport::{Prompt, Transport};
use crate::{Config, Result};

const UNATTENDED_REASON: &str = "requires confirmation (unattended mode)";

/// Asks a human whether a command may run
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// Return `true` to run the command
    async fn confirm(&self, command: &str, reason: &str) -> Result<bool>;
}

/// Progress of an investigation
#[derive(Debug, Clone)]
pub enum AgentEvent {
    Started {
        id: String,
        goal: String,
    },
    Turn {
        /// 1-based turn number
        number: usize,
        turn: Turn,
        analysis: Option<String>,
        next_step: Option<String>,
    },
    Finished {
        status: TranscriptStatus,
        reason: Option<String>,
        summary: Option<String>,
    },
}

/// Loop limits and prompt shape
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub max_turns: usize,
    pub max_consecutive_malformed: usize,
    pub max_consecutive_denials: usize,
    pub unattended: bool,
    pub transport_timeout: Duration,
    pub prompt: PromptBuilder,
}

impl AgentOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_turns: config.agent.max_turns,
            max_consecutive_malformed: config.agent.max_consecutive_malformed.max(1),
            max_consecutive_denials: config.agent.max_consecutive_denials.max(1),
            unattended: config.agent.unattended,
            transport_timeout: config.transport.timeout,
            prompt: PromptBuilder {
                window: config.agent.transcript_window,
                summary_lines: config.agent.summary_lines,
                observation_limit: config.context.output_byte_limit,
            },
        }
    }
}

/// Why a suspension point did not produce a value
enum Interrupted {
    Cancelled,
    Failed(String),
}

/// Drives one investigation at a time against a debugger session
pub struct AgentLoop<'a> {
    options: AgentOptions,
    gate: SafetyGate,
    extractor: ContextExtractor,
    executor: CommandExecutor,
    transport: &'a dyn Transport,
    confirmer: Option<&'a dyn Confirmer>,
    events: Option<mpsc::UnboundedSender<AgentEvent>>,
    cancel: Option<watch::Receiver<bool>>,
    output_log: OutputLog,
}

impl<'a> AgentLoop<'a> {
    /// Create a loop from configuration. Fails only on an invalid policy.
    pub fn new(config: &Config, transport: &'a dyn Transport) -> Result<Self> {
        Ok(Self {
            options: AgentOptions::from_config(config),
            gate: SafetyGate::new(&config.policy)?,
            extractor: ContextExtractor::new(ExtractOptions::from(&config.context)),
            executor: CommandExecutor::new(config.debugger.command_timeout),
            transport,
            confirmer: None,
            events: None,
            cancel: None,
            output_log: OutputLog::new(config.context.recent_output),
        })
    }

    /// Ask this confirmer for commands that need approval (interactive mode)
    pub fn with_confirmer(mut self, confirmer: &'a dyn Confirmer) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    /// Stream progress events
    pub fn with_events(mut self, events: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Cancel the investigation when `true` is sent
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.options.max_turns = max_turns;
        self
    }

    pub fn with_unattended(mut self, unattended: bool) -> Self {
        self.options.unattended = unattended;
        self
    }

    /// Record debugger output produced before the investigation (setup commands)
    pub fn record_output(&mut self, output: impl Into<String>) {
        self.output_log.push(output);
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    /// Run an investigation to a terminal status
    pub async fn run(
        &mut self,
        session: &mut dyn DebuggerSession,
        goal: &str,
    ) -> AgentTranscript {
        let mut transcript = AgentTranscript::new(goal, self.options.max_turns);
        info!(
            "Starting investigation {} (max {} turns): {}",
            transcript.id, transcript.max_turns, goal
        );
        self.emit(AgentEvent::Started {
            id: transcript.id.clone(),
            goal: goal.to_string(),
        });

        let mut snapshot = self.extractor.extract(session, &self.output_log).await;
        self.drive(session, &mut transcript, &mut snapshot).await;

        info!(
            "Investigation {} finished: {} after {} turns",
            transcript.id,
            transcript.status(),
            transcript.turn_count
        );
        self.emit(AgentEvent::Finished {
            status: transcript.status(),
            reason: transcript.reason.clone(),
            summary: transcript.summary.clone(),
        });
        transcript
    }

    async fn drive(
        &mut self,
        session: &mut dyn DebuggerSession,
        transcript: &mut AgentTranscript,
        snapshot: &mut Arc<SessionSnapshot>,
    ) {
        let mut malformed = 0;
        let mut denials = 0;

        loop {
            if self.cancel_requested() {
                transcript.finish(TranscriptStatus::AbortedCancelled, "cancelled by user");
                return;
            }
            if transcript.turn_count >= transcript.max_turns {
                transcript.finish(
                    TranscriptStatus::AbortedLimit,
                    format!("reached the limit of {} turns", transcript.max_turns),
                );
                return;
            }

            let prompt = self.options.prompt.build(transcript, &**snapshot);
            let reply = match self.ask(&prompt).await {
                Ok(reply) => reply,
                Err(Interrupted::Cancelled) => {
                    transcript.finish(TranscriptStatus::AbortedCancelled, "cancelled by user");
                    return;
                }
                Err(Interrupted::Failed(reason)) => {
                    warn!("{}", reason);
                    transcript.finish(TranscriptStatus::AbortedError, reason);
                    return;
                }
            };

            let ParsedReply {
                action,
                analysis,
                next_step,
            } = parse_reply(&reply);
            let notes = (analysis, next_step);

            match action.clone() {
                ProposedAction::Malformed { .. } => {
                    malformed += 1;
                    debug!("Malformed reply ({} in a row)", malformed);
                    self.record(transcript, Turn::new(action), notes);
                    if malformed >= self.options.max_consecutive_malformed {
                        transcript.finish(
                            TranscriptStatus::AbortedError,
                            "repeated malformed replies",
                        );
                        return;
                    }
                }

                ProposedAction::Conclude { summary } => {
                    self.record(transcript, Turn::new(action), notes);
                    transcript.conclude(&summary);
                    return;
                }

                ProposedAction::Command { text } => {
                    malformed = 0;
                    let context = GateContext {
                        turn_count: transcript.turn_count,
                        target_exited: snapshot.target_exited(),
                    };
                    let decision = self.gate.classify(&text, &context);
                    info!("Turn {}: `{}` -> {}", transcript.turn_count + 1, text, decision);

                    let verdict = match &decision {
                        GateDecision::Allow => Ok(()),
                        GateDecision::Deny { reason } => Err(reason.clone()),
                        GateDecision::NeedsConfirmation { reason } => {
                            match self.confirmer.filter(|_| !self.options.unattended) {
                                None => Err(UNATTENDED_REASON.to_string()),
                                Some(confirmer) => {
                                    match self.confirm(confirmer, &text, reason).await {
                                        Ok(true) => Ok(()),
                                        Ok(false) => Err("refused by user".to_string()),
                                        Err(Interrupted::Cancelled) => {
                                            transcript.finish(
                                                TranscriptStatus::AbortedCancelled,
                                                "cancelled by user",
                                            );
                                            return;
                                        }
                                        Err(Interrupted::Failed(e)) => {
                                            Err(format!("confirmation failed: {}", e))
                                        }
                                    }
                                }
                            }
                        }
                    };

                    let turn = Turn::new(action);
                    match verdict {
                        Err(reason) => {
                            denials += 1;
                            let turn = turn
                                .with_decision(GateDecision::Deny {
                                    reason: reason.clone(),
                                })
                                .with_observation(format!("denied: {}", reason));
                            self.record(transcript, turn, notes);
                            if denials >= self.options.max_consecutive_denials {
                                transcript.finish(
                                    TranscriptStatus::AbortedUnsafe,
                                    format!("{} consecutive commands denied", denials),
                                );
                                return;
                            }
                        }
                        Ok(()) => {
                            denials = 0;
                            let turn = turn.with_decision(decision).with_execution(&text);
                            match self.executor.execute(session, &text).await {
                                Ok(observation) => {
                                    self.output_log
                                        .push(format!("(gdb) {}\n{}", text, observation.output));
                                    self.record(
                                        transcript,
                                        turn.with_observation(observation.to_string()),
                                        notes,
                                    );
                                    *snapshot =
                                        self.extractor.extract(session, &self.output_log).await;
                                }
                                Err(ExecutionError::Rejected(msg)) => {
                                    self.output_log
                                        .push(format!("(gdb) {}\nerror: {}", text, msg));
                                    self.record(
                                        transcript,
                                        turn.with_observation(format!("error: {}", msg)),
                                        notes,
                                    );
                                }
                                Err(e) => {
                                    warn!("Execution failed: {}", e);
                                    self.record(
                                        transcript,
                                        turn.with_observation(format!("error: {}", e)),
                                        notes,
                                    );
                                    transcript.finish(TranscriptStatus::AbortedError, e.to_string());
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    fn record(
        &self,
        transcript: &mut AgentTranscript,
        turn: Turn,
        (analysis, next_step): (Option<String>, Option<String>),
    ) {
        transcript.record(turn.clone());
        self.emit(AgentEvent::Turn {
            number: transcript.turn_count,
            turn,
            analysis,
            next_step,
        });
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is watching
            let _ = events.send(event);
        }
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Call the transport under the timeout, racing cancellation
    async fn ask(&mut self, prompt: &Prompt) -> std::result::Result<String, Interrupted> {
        let transport = self.transport;
        let limit = self.options.transport_timeout;
        debug!("Prompt: {} segments, {} bytes", prompt.segments.len(), prompt.len());

        let call = tokio::time::timeout(limit, transport.complete(prompt));
        let result = match self.cancel.as_mut() {
            Some(cancel) => tokio::select! {
                result = call => result,
                _ = cancelled(cancel) => return Err(Interrupted::Cancelled),
            },
            None => call.await,
        };

        match result {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(Interrupted::Failed(format!("transport error: {}", e))),
            Err(_) => Err(Interrupted::Failed(format!(
                "transport timed out after {:?}",
                limit
            ))),
        }
    }

    /// Wait for a human decision, racing cancellation
    async fn confirm(
        &mut self,
        confirmer: &dyn Confirmer,
        command: &str,
        reason: &str,
    ) -> std::result::Result<bool, Interrupted> {
        let decision = confirmer.confirm(command, reason);
        let result = match self.cancel.as_mut() {
            Some(cancel) => tokio::select! {
                result = decision => result,
                _ = cancelled(cancel) => return Err(Interrupted::Cancelled),
            },
            None => decision.await,
        };
        result.map_err(|e| Interrupted::Failed(e.to_string()))
    }
}

/// Resolve once cancellation is requested; never if the sender is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
