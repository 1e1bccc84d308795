//! Investigation transcripts
//!
//! Every investigation produces an [`AgentTranscript`]: the goal, each turn
//! the agent took, and how the run ended. Transcripts are stored as JSON in
//! the configured transcript directory for later review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::ProposedAction;
use crate::gate::GateDecision;
use crate::{Error, Result};

/// Lifecycle status of an investigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranscriptStatus {
    Running,
    Concluded,
    AbortedLimit,
    AbortedError,
    AbortedUnsafe,
    AbortedCancelled,
}

impl TranscriptStatus {
    /// Terminal states have no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TranscriptStatus::Running)
    }
}

impl fmt::Display for TranscriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TranscriptStatus::Running => "running",
            TranscriptStatus::Concluded => "concluded",
            TranscriptStatus::AbortedLimit => "aborted-limit",
            TranscriptStatus::AbortedError => "aborted-error",
            TranscriptStatus::AbortedUnsafe => "aborted-unsafe",
            TranscriptStatus::AbortedCancelled => "aborted-cancelled",
        };
        write!(f, "{}", s)
    }
}

/// One step of an investigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// What the AI asked for
    pub action: ProposedAction,
    /// Gate verdict (commands only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<GateDecision>,
    /// The command that actually ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_command: Option<String>,
    /// What came back: command output, a denial or an error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(action: ProposedAction) -> Self {
        Self {
            action,
            decision: None,
            executed_command: None,
            observation: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_decision(mut self, decision: GateDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn with_execution(mut self, command: &str) -> Self {
        self.executed_command = Some(command.to_string());
        self
    }

    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.observation = Some(observation.into());
        self
    }

    /// One-line description used when the turn leaves the prompt window
    pub fn summary_line(&self) -> String {
        let first_line = |s: &str| s.lines().next().unwrap_or_default().to_string();
        match (&self.action, &self.decision) {
            (ProposedAction::Command { text }, Some(GateDecision::Deny { reason })) => {
                format!("`{}` denied: {}", text, reason)
            }
            (ProposedAction::Command { text }, _) if self.executed_command.is_some() => {
                let result = self
                    .observation
                    .as_deref()
                    .map(first_line)
                    .unwrap_or_default();
                format!("ran `{}` -> {}", text, result)
            }
            (ProposedAction::Command { text }, _) => format!(
                "`{}` not run: {}",
                text,
                self.observation.as_deref().map(first_line).unwrap_or_default()
            ),
            (ProposedAction::Conclude { .. }, _) => "concluded".to_string(),
            (ProposedAction::Malformed { .. }, _) => "unparseable reply".to_string(),
        }
    }
}

/// The working record of one investigation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTranscript {
    pub id: String,
    pub goal: String,
    pub turns: Vec<Turn>,
    status: TranscriptStatus,
    pub turn_count: usize,
    pub max_turns: usize,
    /// Final conclusion (set when concluded)
    #[serde(default)]
    pub summary: Option<String>,
    /// Why the run ended
    #[serde(default)]
    pub reason: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl AgentTranscript {
    pub fn new(goal: &str, max_turns: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            goal: goal.to_string(),
            turns: Vec::new(),
            status: TranscriptStatus::Running,
            turn_count: 0,
            max_turns,
            summary: None,
            reason: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn status(&self) -> TranscriptStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Append a turn; ignored once the transcript is terminal
    pub fn record(&mut self, turn: Turn) {
        if self.is_finished() {
            return;
        }
        self.turns.push(turn);
        self.turn_count += 1;
    }

    /// Move to a terminal status. The first terminal status sticks.
    pub fn finish(&mut self, status: TranscriptStatus, reason: impl Into<String>) {
        if self.is_finished() || !status.is_terminal() {
            return;
        }
        self.status = status;
        self.reason = Some(reason.into());
        self.ended_at = Some(Utc::now());
    }

    /// Finish as concluded with the AI's summary
    pub fn conclude(&mut self, summary: &str) {
        if self.is_finished() {
            return;
        }
        self.summary = Some(summary.to_string());
        self.finish(TranscriptStatus::Concluded, "investigation concluded");
    }

    /// Number of commands that were actually executed
    pub fn executed_commands(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.executed_command.is_some())
            .count()
    }

    /// Path of this transcript in `dir`
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", self.id))
    }

    /// Save as pretty JSON into `dir`, creating it if needed
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = self.path_in(dir);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

/// Load a transcript by ID
pub fn load(dir: &Path, id: &str) -> Result<AgentTranscript> {
    let path = dir.join(format!("{}.json", id));

    if !path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Transcript not found: {}", id),
        )));
    }

    let content = std::fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}

/// List transcripts in `dir`, oldest first
pub fn list(dir: &Path) -> Result<Vec<AgentTranscript>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut transcripts: Vec<AgentTranscript> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            match std::fs::read_to_string(&path)
                .map_err(Error::from)
                .and_then(|c| serde_json::from_str::<AgentTranscript>(&c).map_err(Error::from))
            {
                Ok(transcript) => transcripts.push(transcript),
                Err(e) => tracing::warn!("Skipping {}: {}", path.display(), e),
            }
        }
    }

    transcripts.sort_by_key(|t| t.started_at);
    Ok(transcripts)
}

impl fmt::Display for AgentTranscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Investigation {}", self.id)?;
        writeln!(f, "Goal: {}", self.goal)?;
        writeln!(f, "Started: {}", self.started_at)?;
        writeln!(
            f,
            "Status: {} ({}/{} turns)",
            self.status, self.turn_count, self.max_turns
        )?;
        if let Some(reason) = &self.reason {
            writeln!(f, "Reason: {}", reason)?;
        }

        for (i, turn) in self.turns.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "--- Turn {} ({}) ---", i + 1, turn.action)?;
            if let Some(decision) = &turn.decision {
                writeln!(f, "Gate: {}", decision)?;
            }
            if let Some(observation) = &turn.observation {
                writeln!(f, "{}", observation.trim_end())?;
            }
            if let ProposedAction::Malformed { raw } = &turn.action {
                writeln!(f, "Reply: {}", raw.trim_end())?;
            }
        }

        if let Some(summary) = &self.summary {
            writeln!(f)?;
            writeln!(f, "Conclusion:\n{}", summary)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(text: &str) -> ProposedAction {
        ProposedAction::Command {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_record_counts_turns() {
        let mut transcript = AgentTranscript::new("find the crash", 10);
        transcript.record(Turn::new(command("bt")).with_execution("bt"));
        transcript.record(Turn::new(ProposedAction::Malformed { raw: "??".into() }));

        assert_eq!(transcript.turn_count, 2);
        assert_eq!(transcript.turn_count, transcript.turns.len());
        assert_eq!(transcript.executed_commands(), 1);
    }

    #[test]
    fn test_terminal_status_sticks() {
        let mut transcript = AgentTranscript::new("goal", 10);
        transcript.finish(TranscriptStatus::AbortedUnsafe, "too many denials");
        transcript.finish(TranscriptStatus::Concluded, "late");
        transcript.conclude("late summary");
        transcript.finish(TranscriptStatus::Running, "revive");
        transcript.record(Turn::new(command("bt")));

        assert_eq!(transcript.status(), TranscriptStatus::AbortedUnsafe);
        assert_eq!(transcript.reason.as_deref(), Some("too many denials"));
        assert!(transcript.summary.is_none());
        assert!(transcript.turns.is_empty());
        assert!(transcript.ended_at.is_some());
    }

    #[test]
    fn test_summary_lines() {
        let denied = Turn::new(command("kill")).with_decision(GateDecision::Deny {
            reason: "terminates the debugged process".into(),
        });
        assert_eq!(
            denied.summary_line(),
            "`kill` denied: terminates the debugged process"
        );

        let ran = Turn::new(command("bt"))
            .with_decision(GateDecision::Allow)
            .with_execution("bt")
            .with_observation("[no change]\n#0 crash () at a.c:4");
        assert_eq!(ran.summary_line(), "ran `bt` -> [no change]");
    }

    #[test]
    fn test_save_load_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut transcript = AgentTranscript::new("why does it crash", 5);
        transcript.record(
            Turn::new(command("bt"))
                .with_decision(GateDecision::Allow)
                .with_execution("bt")
                .with_observation("#0 crash ()"),
        );
        transcript.conclude("null pointer");

        let path = transcript.save(dir.path()).unwrap();
        assert!(path.exists());

        let loaded = load(dir.path(), &transcript.id).unwrap();
        assert_eq!(loaded.status(), TranscriptStatus::Concluded);
        assert_eq!(loaded.turns, transcript.turns);
        assert_eq!(loaded.summary.as_deref(), Some("null pointer"));

        let all = list(dir.path()).unwrap();
        assert_eq!(all.len(), 1);
        assert!(load(dir.path(), "missing").is_err());
    }

    #[test]
    fn test_status_serializes_kebab_case() {
        let json = serde_json::to_string(&TranscriptStatus::AbortedCancelled).unwrap();
        assert_eq!(json, "\"aborted-cancelled\"");
    }
}
