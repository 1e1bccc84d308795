//! Prompt construction for each agent turn

use super::transcript::{AgentTranscript, Turn};
use super::ProposedAction;
use crate::context::{RenderedText, SessionSnapshot};
use crate::gate::GateDecision;
use crate::transport::{Prompt, Role};

const SYSTEM_INSTRUCTIONS: &str = "\
You are a debugging agent driving a GDB session. You investigate a goal by \
running one GDB command per reply, reading its output, and deciding what to do \
next.

Reply with exactly one action block.

To run a GDB command:
```gdb-command
<one GDB command>
```

When the investigation is finished:
```complete
<your conclusion: root cause, evidence, and suggested fix>
```

You may add these optional blocks before the action block:
```analysis
<what you learned so far>
```
```next-step
<what you plan to check next>
```

Rules:
1. Put exactly one command on one line in a gdb-command block.
2. Commands that end the session, kill or detach the process, run shell or \
script commands, or write files are refused.
3. Prefer inspection (backtrace, print, info, x, list, frame) over resuming \
the target.
4. Once the target has exited, only post-mortem inspection is possible.
5. Keep analysis short and conclude as soon as the evidence is sufficient.";

const POST_MORTEM_NOTICE: &str = "\
The target process has exited. Only post-mortem inspection is possible: \
commands that resume, step, restart or modify the target will be refused.";

const CORRECTIVE_NOTICE: &str = "\
Your previous reply could not be understood. Reply with exactly one \
```gdb-command``` block containing a single command, or one ```complete``` \
block with your conclusion.";

/// Builds the prompt for the next turn from the transcript and latest snapshot
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    /// Turns sent verbatim
    pub window: usize,
    /// Maximum lines summarizing older turns
    pub summary_lines: usize,
    /// Byte budget for each observation in the window
    pub observation_limit: usize,
}

impl PromptBuilder {
    pub fn build(&self, transcript: &AgentTranscript, snapshot: &SessionSnapshot) -> Prompt {
        let mut prompt = Prompt::new();
        prompt.push(Role::System, SYSTEM_INSTRUCTIONS);
        prompt.push(Role::User, format!("Goal: {}", transcript.goal));

        let split = transcript.turns.len().saturating_sub(self.window);
        let (evicted, window) = transcript.turns.split_at(split);

        if !evicted.is_empty() {
            prompt.push(Role::User, self.summarize(evicted));
        }

        for turn in window {
            prompt.push(Role::Assistant, assistant_text(turn));
            prompt.push(Role::User, self.observation_text(turn));
        }

        let mut current = format!("Current debugging context:\n{}", snapshot);
        if snapshot.target_exited() {
            current.push('\n');
            current.push_str(POST_MORTEM_NOTICE);
        }
        if matches!(
            transcript.turns.last().map(|t| &t.action),
            Some(ProposedAction::Malformed { .. })
        ) {
            current.push('\n');
            current.push_str(CORRECTIVE_NOTICE);
        }
        current.push_str(&format!(
            "\nThis is turn {} of {}.",
            transcript.turn_count + 1,
            transcript.max_turns
        ));
        prompt.push(Role::User, current);

        prompt
    }

    /// One line per evicted turn, oldest collapsed into a count
    fn summarize(&self, evicted: &[Turn]) -> String {
        let mut text = String::from("Earlier turns (summarized):\n");
        let keep = if evicted.len() <= self.summary_lines {
            evicted.len()
        } else {
            self.summary_lines.saturating_sub(1)
        };
        let omitted = evicted.len() - keep;
        if omitted > 0 {
            text.push_str(&format!("({} earlier turns omitted)\n", omitted));
        }
        for (i, turn) in evicted.iter().enumerate().skip(omitted) {
            text.push_str(&format!("{}. {}\n", i + 1, turn.summary_line()));
        }
        text
    }

    fn observation_text(&self, turn: &Turn) -> String {
        match (&turn.action, &turn.decision) {
            (ProposedAction::Malformed { .. }, _) => "(reply not understood)".to_string(),
            (ProposedAction::Command { .. }, Some(GateDecision::Deny { reason })) => {
                format!("Command refused: {}", reason)
            }
            (ProposedAction::Command { text }, _) => {
                let observation = turn.observation.as_deref().unwrap_or("(no output)");
                let rendered = RenderedText::new(observation, self.observation_limit);
                if turn.executed_command.is_some() {
                    format!("Output of `{}`:\n{}", text, rendered)
                } else {
                    format!("`{}` was not run: {}", text, rendered)
                }
            }
            (ProposedAction::Conclude { .. }, _) => String::new(),
        }
    }
}

fn assistant_text(turn: &Turn) -> String {
    match &turn.action {
        ProposedAction::Command { text } => format!("```gdb-command\n{}\n```", text),
        ProposedAction::Conclude { summary } => format!("```complete\n{}\n```", summary),
        ProposedAction::Malformed { raw } => RenderedText::new(raw, 512).to_string(),
    }
}
