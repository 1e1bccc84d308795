//! Configuration loading and management
//!
//! One immutable [`Config`] is loaded at startup and passed explicitly into the
//! agent loop, the safety gate and the context extractor.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// AI transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Debugger process configuration
    #[serde(default)]
    pub debugger: DebuggerConfig,

    /// Agent loop limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// Safety gate policy
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Snapshot extraction budgets
    #[serde(default)]
    pub context: ContextConfig,

    /// Transcript settings
    #[serde(default)]
    pub transcripts: TranscriptConfig,
}

impl Config {
    /// Load configuration from file or default locations
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(|| {
            // Try .sleuth/config.toml in current directory
            let local = PathBuf::from(".sleuth/config.toml");
            if local.exists() {
                return Some(local);
            }

            // Try ~/.sleuth/config.toml
            dirs::home_dir().map(|h| h.join(".sleuth/config.toml"))
        });

        match config_path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(&p)?;
                Self::parse(&content)
            }
            Some(p) if path.is_some() => Err(Error::Config(format!(
                "Config file not found: {}",
                p.display()
            ))),
            _ => Ok(Config::default()),
        }
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the agent loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_turns == 0 {
            return Err(Error::Config("agent.max_turns must be at least 1".to_string()));
        }
        if self.agent.max_consecutive_malformed == 0 || self.agent.max_consecutive_denials == 0 {
            return Err(Error::Config(
                "agent thresholds must be at least 1".to_string(),
            ));
        }
        if self.context.recent_output == 0 {
            return Err(Error::Config(
                "context.recent_output must be at least 1".to_string(),
            ));
        }
        if self.debugger.command_timeout.is_zero() || self.transport.timeout.is_zero() {
            return Err(Error::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Get transcript directory path (with `~` expanded)
    pub fn transcript_dir(&self) -> PathBuf {
        expand_path(&self.transcripts.directory)
    }
}

/// Expand `~` and environment variables in a configured path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => path.to_path_buf(),
    }
}

/// AI transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Which transport to use (gemini, openai)
    #[serde(default = "default_transport_kind")]
    pub kind: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL (provider default when absent)
    #[serde(default)]
    pub api_base: Option<String>,

    /// API key (can also be in environment)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Upper bound for a single completion call
    #[serde(default = "default_transport_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Attempts per completion, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the first retry (doubles per attempt)
    #[serde(default = "default_initial_backoff", with = "duration_serde")]
    pub initial_backoff: Duration,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per reply
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_transport_kind() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}

fn default_transport_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_output_tokens() -> u32 {
    4000
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: default_transport_kind(),
            model: default_model(),
            api_base: None,
            api_key: None,
            timeout: default_transport_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

/// Debugger process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebuggerConfig {
    /// Path to the gdb binary (defaults to "gdb" in PATH)
    #[serde(default = "default_gdb")]
    pub gdb: PathBuf,

    /// Whether gdb reads ~/.gdbinit
    #[serde(default)]
    pub load_gdbinit: bool,

    /// Upper bound for a single debugger command
    #[serde(default = "default_command_timeout", with = "duration_serde")]
    pub command_timeout: Duration,

    /// How long to wait for the target to stop after an interrupt
    #[serde(default = "default_interrupt_grace", with = "duration_serde")]
    pub interrupt_grace: Duration,

    /// Registers included in snapshots (names not present on the target are skipped)
    #[serde(default = "default_registers")]
    pub registers: Vec<String>,
}

fn default_gdb() -> PathBuf {
    PathBuf::from("gdb")
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_interrupt_grace() -> Duration {
    Duration::from_secs(3)
}

fn default_registers() -> Vec<String> {
    ["pc", "sp", "rip", "rsp", "rbp", "rax", "rdi", "rsi", "eip", "esp", "lr"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            gdb: default_gdb(),
            load_gdbinit: false,
            command_timeout: default_command_timeout(),
            interrupt_grace: default_interrupt_grace(),
            registers: default_registers(),
        }
    }
}

/// Agent loop limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Turn ceiling for one investigation
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Number of most recent turns sent verbatim
    #[serde(default = "default_transcript_window")]
    pub transcript_window: usize,

    /// Maximum one-line summaries of turns older than the window
    #[serde(default = "default_summary_lines")]
    pub summary_lines: usize,

    /// Consecutive unparseable replies before aborting
    #[serde(default = "default_threshold")]
    pub max_consecutive_malformed: usize,

    /// Consecutive denied commands before aborting
    #[serde(default = "default_threshold")]
    pub max_consecutive_denials: usize,

    /// Treat confirmation-required commands as denied instead of asking
    #[serde(default)]
    pub unattended: bool,
}

fn default_max_turns() -> usize {
    10
}

fn default_transcript_window() -> usize {
    6
}

fn default_summary_lines() -> usize {
    20
}

fn default_threshold() -> usize {
    3
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            transcript_window: default_transcript_window(),
            summary_lines: default_summary_lines(),
            max_consecutive_malformed: default_threshold(),
            max_consecutive_denials: default_threshold(),
            unattended: false,
        }
    }
}

/// Safety gate policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Turns during which state-changing commands run without confirmation
    #[serde(default = "default_confirmation_free_turns")]
    pub confirmation_free_turns: usize,

    /// Commands that are never executed
    #[serde(default = "default_deny_rules")]
    pub deny: Vec<DenyRule>,

    /// Additional command words treated as read-only inspection
    #[serde(default)]
    pub read_only_commands: Vec<String>,
}

fn default_confirmation_free_turns() -> usize {
    6
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            confirmation_free_turns: default_confirmation_free_turns(),
            deny: default_deny_rules(),
            read_only_commands: Vec::new(),
        }
    }
}

/// A denylist entry: a case-insensitive regular expression and the reason shown
/// to the AI when it matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenyRule {
    /// Regular expression matched against the trimmed command
    pub pattern: String,
    /// Why the command is refused
    pub reason: String,
}

impl DenyRule {
    fn new(pattern: &str, reason: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Default denylist
pub fn default_deny_rules() -> Vec<DenyRule> {
    vec![
        DenyRule::new(r"^(quit|q|exit)\b", "ends the debugging session"),
        DenyRule::new(r"^(kill|k)\b", "terminates the debugged process"),
        DenyRule::new(r"^(detach|disconnect)\b", "detaches from the target"),
        DenyRule::new(r"^attach\b", "attaches to an unrelated process"),
        DenyRule::new(r"^(shell\b|!|pipe\b|\|)", "shell escape"),
        DenyRule::new(
            r"^(rm|rmdir|mv|cp|dd|shred|truncate|chmod|chown|mkfs\S*)\b",
            "destructive filesystem command",
        ),
        DenyRule::new(
            r"^(dump|append|restore|gcore|generate-core-file|save)\b",
            "writes files on the host",
        ),
        DenyRule::new(
            r"^set\s+(log\w*|history\s+(filename|save)|trace-commands)\b",
            "writes files on the host",
        ),
        DenyRule::new(
            r"^(source|python|py|python-interactive|pi|guile|define|document|alias)\b",
            "runs or defines arbitrary scripts",
        ),
        DenyRule::new(r"^(handle|signal|queue-signal)\b", "alters signal delivery"),
        DenyRule::new(
            r"^(cd|file|exec-file|symbol-file|add-symbol-file|target|core-file)\b",
            "changes the debugging target",
        ),
    ]
}

/// Snapshot extraction budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Byte budget for a single rendered value
    #[serde(default = "default_value_byte_limit")]
    pub value_byte_limit: usize,

    /// Byte budget for a single command output
    #[serde(default = "default_output_byte_limit")]
    pub output_byte_limit: usize,

    /// Maximum stack frames per snapshot
    #[serde(default = "default_max_frames")]
    pub max_frames: usize,

    /// Maximum threads listed per snapshot
    #[serde(default = "default_max_threads")]
    pub max_threads: usize,

    /// Number of recent debugger outputs kept
    #[serde(default = "default_recent_output")]
    pub recent_output: usize,
}

fn default_value_byte_limit() -> usize {
    256
}

fn default_output_byte_limit() -> usize {
    4096
}

fn default_max_frames() -> usize {
    16
}

fn default_max_threads() -> usize {
    16
}

fn default_recent_output() -> usize {
    5
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            value_byte_limit: default_value_byte_limit(),
            output_byte_limit: default_output_byte_limit(),
            max_frames: default_max_frames(),
            max_threads: default_max_threads(),
            recent_output: default_recent_output(),
        }
    }
}

/// Transcript configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    /// Directory to store transcripts
    #[serde(default = "default_transcript_dir")]
    pub directory: PathBuf,

    /// Whether finished investigations are saved
    #[serde(default = "default_true")]
    pub save: bool,
}

fn default_transcript_dir() -> PathBuf {
    PathBuf::from(".sleuth/transcripts")
}

fn default_true() -> bool {
    true
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            directory: default_transcript_dir(),
            save: true,
        }
    }
}

/// Initialize .sleuth directory
pub fn init() -> Result<()> {
    let sleuth_dir = PathBuf::from(".sleuth");

    if !sleuth_dir.exists() {
        std::fs::create_dir_all(&sleuth_dir)?;
    }

    // Create transcripts directory
    let transcripts_dir = sleuth_dir.join("transcripts");
    if !transcripts_dir.exists() {
        std::fs::create_dir_all(&transcripts_dir)?;
    }

    // Create default config if it doesn't exist
    let config_path = sleuth_dir.join("config.toml");
    if !config_path.exists() {
        let config_str = toml::to_string_pretty(&Config::default())
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(&config_path, config_str)?;
    }

    Ok(())
}

// Custom serde module for Duration using humantime
mod duration_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
