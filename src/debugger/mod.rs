//! Debugger session abstraction
//!
//! The agent core talks to the debugger only through [`DebuggerSession`].
//! Supports:
//! - GDB via the Machine Interface ([`GdbSession`])

mod gdb;
pub mod mi;

pub use gdb::{GdbSession, Target};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Result;

/// Why the target is currently stopped
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    /// Stopped at a breakpoint or watchpoint
    Breakpoint,
    /// Stopped because the target received a signal
    Signal { name: String },
    /// Stopped after a step, next, finish or until
    Step,
    /// The target process has exited
    Exited { code: Option<i32> },
    /// No stop recorded (not started, or stopped for another reason)
    #[default]
    None,
}

impl StopReason {
    /// Whether the target process is gone
    pub fn is_exited(&self) -> bool {
        matches!(self, StopReason::Exited { .. })
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Breakpoint => write!(f, "breakpoint"),
            StopReason::Signal { name } => write!(f, "signal {}", name),
            StopReason::Step => write!(f, "step"),
            StopReason::Exited { code: Some(code) } => write!(f, "exited with code {}", code),
            StopReason::Exited { code: None } => write!(f, "exited"),
            StopReason::None => write!(f, "none"),
        }
    }
}

/// A source position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Source file (absent without line info)
    pub file: Option<String>,
    /// Line number (absent without line info)
    pub line: Option<u32>,
    /// Function name (absent without symbols)
    pub function: Option<String>,
    /// Program counter
    pub address: Option<String>,
}

/// One frame of the call stack as reported by the debugger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Frame level (0 = innermost)
    pub level: u32,
    /// Where the frame is
    pub location: Location,
    /// Argument names and values
    pub arguments: Vec<Variable>,
}

/// A named value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    /// Rendered value (absent when optimized out or unreadable)
    pub value: Option<String>,
    /// Type name, when known
    pub type_name: Option<String>,
}

/// A breakpoint as listed by the debugger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    pub number: String,
    pub enabled: bool,
    /// Human-readable location (function, file:line or address)
    pub location: String,
    pub hits: u32,
}

/// A thread of the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    /// Debugger thread number
    pub id: String,
    /// System identity, e.g. `Thread 0x7ffff7d8a740 (LWP 4242)`
    pub target_id: String,
    pub name: Option<String>,
    /// `stopped` or `running`
    pub state: String,
    /// Innermost frame, when the thread is stopped
    pub location: Option<Location>,
    /// Whether this is the selected thread
    pub current: bool,
}

/// Raw debugger state, as much of it as the debugger could provide
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebuggerState {
    /// Current location (absent when there is no live frame)
    pub location: Option<Location>,
    /// Call stack, innermost first
    pub frames: Vec<Frame>,
    /// Locals of the selected frame
    pub locals: Vec<Variable>,
    /// Numbered source lines around the current line (absent without line info)
    pub source: Option<Vec<(u32, String)>>,
    /// Thread list (absent when it could not be read)
    pub threads: Option<Vec<Thread>>,
    /// Why the target last stopped
    pub stop_reason: StopReason,
    /// Register name/value pairs (absent when unavailable)
    pub registers: Option<Vec<(String, String)>>,
    /// Breakpoint table (absent when it could not be read)
    pub breakpoints: Option<Vec<Breakpoint>>,
    /// Files, sections and functions of the loaded program when no
    /// process is live
    pub target_info: Option<String>,
}

/// Output of a single debugger command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawOutput {
    /// Everything the debugger and the target printed
    pub text: String,
    /// Stop event observed while the command ran
    pub stop: Option<StopReason>,
    /// The target was left running when the command returned
    pub running: bool,
}

/// A live debugger session
///
/// Only the command executor submits commands, one at a time. `current_state`
/// must not change debugger or target state.
#[async_trait]
pub trait DebuggerSession: Send {
    /// Run a console command and wait for it to complete
    async fn run(&mut self, command: &str) -> Result<RawOutput>;

    /// Query the current state without side effects
    async fn current_state(&mut self) -> Result<DebuggerState>;

    /// Whether the debugger process is still usable
    fn is_alive(&mut self) -> bool;

    /// Stop a running target (used to enforce command timeouts)
    async fn interrupt(&mut self) -> Result<()>;
}
