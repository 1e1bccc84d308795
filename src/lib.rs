//! Sleuth: autonomous AI investigations inside a debugging session
//!
//! A tight Rust binary that lets an AI drive GDB on its own:
//! - **Context extraction**: live debugger state becomes an immutable snapshot
//! - **Safety gate**: every proposed command is classified before it may run
//! - **Agent loop**: propose, gate, execute, observe, until a conclusion or a limit
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Agent Loop                 │
//! │  prompt → transport → proposed action   │
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             Safety Gate                 │
//! │  allow / needs-confirmation / deny      │
//! └────────────────────┬────────────────────┘
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   Command Executor → Debugger Session   │
//! │  observation → fresh snapshot → loop    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The debugger and the AI service are reached only through the
//! [`DebuggerSession`] and [`Transport`] traits.

pub mod agent;
pub mod config;
pub mod context;
pub mod debugger;
pub mod executor;
pub mod gate;
pub mod interactive;
pub mod transport;

// Re-exports for convenience
pub use agent::{AgentEvent, AgentLoop, AgentTranscript, ProposedAction, TranscriptStatus};
pub use config::Config;
pub use context::{ContextExtractor, OutputLog, SessionSnapshot};
pub use debugger::{DebuggerSession, DebuggerState, GdbSession, StopReason};
pub use executor::{CommandExecutor, ExecutionError, Observation, Outcome};
pub use gate::{GateContext, GateDecision, SafetyGate};
pub use transport::{Prompt, Role, Transport, TransportError};

/// Crate-level error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Debugger error: {0}")]
    Debugger(String),

    #[error("Debugger rejected command: {0}")]
    DebuggerRejected(String),

    #[error("Debugger session is closed")]
    SessionClosed,

    #[error("MI parse error: {0}")]
    MiParse(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
