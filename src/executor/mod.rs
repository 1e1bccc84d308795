//! Command execution against the debugger session
//!
//! Runs one approved command under the configured timeout and turns the raw
//! debugger output into an [`Observation`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::debugger::{DebuggerSession, StopReason};
use crate::Error;

/// What a command did to the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// The target is running (or was never started) and did not stop
    StillRunning,
    HitBreakpoint,
    Stepped,
    ProcessExited(Option<i32>),
    ReceivedSignal(String),
    /// The command did not resume the target
    NoChange,
    /// The command exceeded its time budget and the target was interrupted
    Timeout,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::StillRunning => write!(f, "still running"),
            Outcome::HitBreakpoint => write!(f, "hit breakpoint"),
            Outcome::Stepped => write!(f, "stepped"),
            Outcome::ProcessExited(Some(code)) => write!(f, "process exited with code {}", code),
            Outcome::ProcessExited(None) => write!(f, "process exited"),
            Outcome::ReceivedSignal(name) => write!(f, "received signal {}", name),
            Outcome::NoChange => write!(f, "no change"),
            Outcome::Timeout => write!(f, "timed out"),
        }
    }
}

/// Result of running one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub command: String,
    /// Everything the debugger and target printed
    pub output: String,
    pub outcome: Outcome,
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let output = self.output.trim_end();
        if output.is_empty() {
            write!(f, "[{}] (no output)", self.outcome)
        } else {
            write!(f, "[{}]\n{}", self.outcome, output)
        }
    }
}

/// Why a command could not produce an observation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// The debugger refused the command (syntax error, no such symbol, ...)
    #[error("debugger rejected the command: {0}")]
    Rejected(String),

    #[error("debugger session is no longer alive")]
    SessionDead,

    /// A timed-out command could not be stopped
    #[error("failed to interrupt the target: {0}")]
    InterruptFailed(String),
}

/// Runs commands one at a time with a timeout
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `command` and describe what happened. Errors are reported, never retried.
    pub async fn execute(
        &self,
        session: &mut dyn DebuggerSession,
        command: &str,
    ) -> std::result::Result<Observation, ExecutionError> {
        if !session.is_alive() {
            return Err(ExecutionError::SessionDead);
        }

        debug!("Executing: {}", command);
        let result = tokio::time::timeout(self.timeout, session.run(command)).await;
        let raw = match result {
            Ok(Ok(raw)) => raw,
            Ok(Err(Error::DebuggerRejected(msg))) => return Err(ExecutionError::Rejected(msg)),
            Ok(Err(Error::SessionClosed)) => return Err(ExecutionError::SessionDead),
            Ok(Err(e)) => {
                if session.is_alive() {
                    return Err(ExecutionError::Rejected(e.to_string()));
                }
                return Err(ExecutionError::SessionDead);
            }
            Err(_) => {
                warn!(
                    "Command '{}' exceeded {:?}, interrupting target",
                    command, self.timeout
                );
                return match session.interrupt().await {
                    Ok(()) => Ok(Observation {
                        command: command.to_string(),
                        output: format!(
                            "command did not complete within {:?}; the target was interrupted",
                            self.timeout
                        ),
                        outcome: Outcome::Timeout,
                    }),
                    Err(Error::SessionClosed) => Err(ExecutionError::SessionDead),
                    Err(e) => Err(ExecutionError::InterruptFailed(e.to_string())),
                };
            }
        };

        let outcome = match raw.stop {
            Some(StopReason::Breakpoint) => Outcome::HitBreakpoint,
            Some(StopReason::Step) => Outcome::Stepped,
            Some(StopReason::Exited { code }) => Outcome::ProcessExited(code),
            Some(StopReason::Signal { name }) => Outcome::ReceivedSignal(name),
            Some(StopReason::None) => Outcome::NoChange,
            None if raw.running => Outcome::StillRunning,
            None => Outcome::NoChange,
        };

        Ok(Observation {
            command: command.to_string(),
            output: raw.text,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::{DebuggerState, RawOutput};
    use crate::Result;
    use async_trait::async_trait;

    #[derive(Default)]
    struct StubSession {
        reply: Option<Result<RawOutput>>,
        hang: bool,
        interrupt_fails: bool,
        dead: bool,
        interrupts: usize,
    }

    #[async_trait]
    impl DebuggerSession for StubSession {
        async fn run(&mut self, _command: &str) -> Result<RawOutput> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.reply.take().unwrap_or_else(|| Ok(RawOutput::default()))
        }

        async fn current_state(&mut self) -> Result<DebuggerState> {
            Ok(DebuggerState::default())
        }

        fn is_alive(&mut self) -> bool {
            !self.dead
        }

        async fn interrupt(&mut self) -> Result<()> {
            self.interrupts += 1;
            if self.interrupt_fails {
                Err(Error::Debugger("still running".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn executor() -> CommandExecutor {
        CommandExecutor::new(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_outcomes_from_stop_reasons() {
        let cases = [
            (Some(StopReason::Breakpoint), false, Outcome::HitBreakpoint),
            (Some(StopReason::Step), false, Outcome::Stepped),
            (
                Some(StopReason::Exited { code: Some(1) }),
                false,
                Outcome::ProcessExited(Some(1)),
            ),
            (
                Some(StopReason::Signal {
                    name: "SIGSEGV".to_string(),
                }),
                false,
                Outcome::ReceivedSignal("SIGSEGV".to_string()),
            ),
            (None, true, Outcome::StillRunning),
            (None, false, Outcome::NoChange),
        ];

        for (stop, running, expected) in cases {
            let mut session = StubSession {
                reply: Some(Ok(RawOutput {
                    text: "out\n".to_string(),
                    stop,
                    running,
                })),
                ..Default::default()
            };
            let observation = executor().execute(&mut session, "continue").await.unwrap();
            assert_eq!(observation.outcome, expected);
            assert_eq!(observation.output, "out\n");
        }
    }

    #[tokio::test]
    async fn test_rejected_command() {
        let mut session = StubSession {
            reply: Some(Err(Error::DebuggerRejected(
                "No symbol \"foo\" in current context.".to_string(),
            ))),
            ..Default::default()
        };
        let err = executor().execute(&mut session, "print foo").await.unwrap_err();
        assert!(matches!(err, ExecutionError::Rejected(msg) if msg.contains("foo")));
    }

    #[tokio::test]
    async fn test_dead_session() {
        let mut session = StubSession {
            dead: true,
            ..Default::default()
        };
        assert_eq!(
            executor().execute(&mut session, "bt").await.unwrap_err(),
            ExecutionError::SessionDead
        );
    }

    #[tokio::test]
    async fn test_timeout_interrupts() {
        let mut session = StubSession {
            hang: true,
            ..Default::default()
        };
        let observation = executor().execute(&mut session, "continue").await.unwrap();
        assert_eq!(observation.outcome, Outcome::Timeout);
        assert_eq!(session.interrupts, 1);
    }

    #[tokio::test]
    async fn test_failed_interrupt() {
        let mut session = StubSession {
            hang: true,
            interrupt_fails: true,
            ..Default::default()
        };
        let err = executor().execute(&mut session, "continue").await.unwrap_err();
        assert!(matches!(err, ExecutionError::InterruptFailed(_)));
    }
}
