//! Debugging context extraction
//!
//! Turns the live debugger state into an immutable [`SessionSnapshot`] that is
//! rendered into every agent prompt. Extraction never fails: whatever the
//! debugger cannot provide is recorded as an [`ExtractionGap`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ContextConfig;
use crate::debugger::{
    Breakpoint, DebuggerSession, DebuggerState, Location, StopReason, Thread,
};

/// Text that may have been cut to a byte budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedText {
    /// The kept prefix (the whole text when not truncated)
    pub text: String,
    /// Whether anything was cut
    pub truncated: bool,
    /// Length of the original text in bytes
    pub original_len: usize,
}

impl RenderedText {
    /// Cut `text` to at most `limit` bytes on a character boundary
    pub fn new(text: &str, limit: usize) -> Self {
        if text.len() <= limit {
            return Self {
                text: text.to_string(),
                truncated: false,
                original_len: text.len(),
            };
        }

        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            text: text[..end].to_string(),
            truncated: true,
            original_len: text.len(),
        }
    }
}

impl fmt::Display for RenderedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.truncated {
            write!(
                f,
                "{}...truncated ({} bytes total)",
                self.text, self.original_len
            )
        } else {
            write!(f, "{}", self.text)
        }
    }
}

/// Bounded log of recent debugger outputs, oldest evicted first
#[derive(Debug, Clone)]
pub struct OutputLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl OutputLog {
    /// Create a log holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, output: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(output.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Information the extractor could not obtain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExtractionGap {
    /// The state query itself failed
    StateUnavailable(String),
    /// There is no live process (not started, exited, or core-less)
    NoProcess,
    /// The current frame has no symbol information
    NoSymbols,
    /// The current frame has no line information
    NoLineInfo,
    /// More frames exist than were kept
    FramesTruncated { shown: usize, total: usize },
    RegistersUnavailable,
    BreakpointsUnavailable,
    /// The current line is known but its source file could not be read
    SourceUnavailable,
    ThreadsUnavailable,
    ThreadsTruncated { shown: usize, total: usize },
}

impl fmt::Display for ExtractionGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionGap::StateUnavailable(msg) => write!(f, "debugger state unavailable ({})", msg),
            ExtractionGap::NoProcess => write!(f, "no live process"),
            ExtractionGap::NoSymbols => write!(f, "no debug symbols for the current frame"),
            ExtractionGap::NoLineInfo => write!(f, "no line information for the current frame"),
            ExtractionGap::FramesTruncated { shown, total } => {
                write!(f, "only {} of {} stack frames shown", shown, total)
            }
            ExtractionGap::RegistersUnavailable => write!(f, "registers unavailable"),
            ExtractionGap::BreakpointsUnavailable => write!(f, "breakpoint list unavailable"),
            ExtractionGap::SourceUnavailable => write!(f, "source file unavailable"),
            ExtractionGap::ThreadsUnavailable => write!(f, "thread list unavailable"),
            ExtractionGap::ThreadsTruncated { shown, total } => {
                write!(f, "only {} of {} threads shown", shown, total)
            }
        }
    }
}

/// One rendered stack frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackFrame {
    pub function: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub arguments: Vec<(String, RenderedText)>,
}

/// A local variable's rendered value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalValue {
    /// Absent when the debugger reported no value at all
    pub value: Option<RenderedText>,
    pub type_name: Option<String>,
}

/// Immutable picture of the debugging session at one point in time
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub location: Option<Location>,
    pub stack_frames: Vec<StackFrame>,
    pub locals: BTreeMap<String, LocalValue>,
    /// Numbered listing around the current line, `>` marking it
    pub source: Option<RenderedText>,
    pub threads: Option<Vec<Thread>>,
    pub stop_reason: StopReason,
    pub registers: Option<BTreeMap<String, String>>,
    pub breakpoints: Option<Vec<Breakpoint>>,
    pub target_info: Option<RenderedText>,
    pub recent_output: Vec<RenderedText>,
    pub gaps: Vec<ExtractionGap>,
    pub captured_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Whether the target process has exited
    pub fn target_exited(&self) -> bool {
        self.stop_reason.is_exited()
    }

    /// Compare everything except the capture time
    pub fn same_state(&self, other: &SessionSnapshot) -> bool {
        self.location == other.location
            && self.stack_frames == other.stack_frames
            && self.locals == other.locals
            && self.source == other.source
            && self.threads == other.threads
            && self.stop_reason == other.stop_reason
            && self.registers == other.registers
            && self.breakpoints == other.breakpoints
            && self.target_info == other.target_info
            && self.recent_output == other.recent_output
            && self.gaps == other.gaps
    }
}

fn or_unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("??")
}

impl fmt::Display for SessionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Stop reason: {}", self.stop_reason)?;

        match &self.location {
            Some(loc) => {
                write!(f, "Location: {}", or_unknown(&loc.function))?;
                if let (Some(file), Some(line)) = (&loc.file, loc.line) {
                    write!(f, " at {}:{}", file, line)?;
                }
                if let Some(addr) = &loc.address {
                    write!(f, " ({})", addr)?;
                }
                writeln!(f)?;
            }
            None => writeln!(f, "Location: unknown")?,
        }

        if !self.stack_frames.is_empty() {
            writeln!(f, "Stack:")?;
            for (level, frame) in self.stack_frames.iter().enumerate() {
                let args: Vec<String> = frame
                    .arguments
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect();
                write!(
                    f,
                    "  #{} {} ({})",
                    level,
                    or_unknown(&frame.function),
                    args.join(", ")
                )?;
                if let (Some(file), Some(line)) = (&frame.file, frame.line) {
                    write!(f, " at {}:{}", file, line)?;
                }
                writeln!(f)?;
            }
        }

        if !self.locals.is_empty() {
            writeln!(f, "Locals:")?;
            for (name, local) in &self.locals {
                match &local.value {
                    Some(value) => write!(f, "  {} = {}", name, value)?,
                    None => write!(f, "  {} = <no value>", name)?,
                }
                if let Some(ty) = &local.type_name {
                    write!(f, " ({})", ty)?;
                }
                writeln!(f)?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f, "Source:\n{}", source.to_string().trim_end())?;
        }

        if let Some(threads) = &self.threads {
            if threads.len() > 1 {
                writeln!(f, "Threads:")?;
                for thread in threads {
                    write!(
                        f,
                        "{} {} {}",
                        if thread.current { "*" } else { " " },
                        thread.id,
                        thread.target_id
                    )?;
                    if let Some(name) = &thread.name {
                        write!(f, " \"{}\"", name)?;
                    }
                    write!(f, " {}", thread.state)?;
                    if let Some(loc) = &thread.location {
                        write!(f, " in {}", or_unknown(&loc.function))?;
                        if let (Some(file), Some(line)) = (&loc.file, loc.line) {
                            write!(f, " at {}:{}", file, line)?;
                        }
                    }
                    writeln!(f)?;
                }
            }
        }

        if let Some(registers) = &self.registers {
            let rendered: Vec<String> = registers
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect();
            writeln!(f, "Registers: {}", rendered.join(" "))?;
        }

        if let Some(breakpoints) = &self.breakpoints {
            if breakpoints.is_empty() {
                writeln!(f, "Breakpoints: none")?;
            } else {
                writeln!(f, "Breakpoints:")?;
                for bp in breakpoints {
                    writeln!(
                        f,
                        "  {} [{}] {} (hit {} times)",
                        bp.number,
                        if bp.enabled { "enabled" } else { "disabled" },
                        bp.location,
                        bp.hits
                    )?;
                }
            }
        }

        if let Some(info) = &self.target_info {
            writeln!(f, "Target info:\n{}", info)?;
        }

        if !self.recent_output.is_empty() {
            writeln!(f, "Recent debugger output (oldest first):")?;
            for output in &self.recent_output {
                writeln!(f, "---\n{}", output.to_string().trim_end())?;
            }
        }

        if !self.gaps.is_empty() {
            let gaps: Vec<String> = self.gaps.iter().map(|g| g.to_string()).collect();
            writeln!(f, "Missing information: {}", gaps.join("; "))?;
        }

        Ok(())
    }
}

/// Budgets applied while extracting
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub value_byte_limit: usize,
    pub output_byte_limit: usize,
    pub max_frames: usize,
    pub max_threads: usize,
}

impl From<&ContextConfig> for ExtractOptions {
    fn from(config: &ContextConfig) -> Self {
        Self {
            value_byte_limit: config.value_byte_limit,
            output_byte_limit: config.output_byte_limit,
            max_frames: config.max_frames.max(1),
            max_threads: config.max_threads.max(1),
        }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

/// Builds snapshots from a debugger session
#[derive(Debug, Clone, Default)]
pub struct ContextExtractor {
    options: ExtractOptions,
}

impl ContextExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Take a snapshot of the session. Only queries state; never runs commands.
    pub async fn extract(
        &self,
        session: &mut dyn DebuggerSession,
        recent_output: &OutputLog,
    ) -> Arc<SessionSnapshot> {
        let state = session.current_state().await.map_err(|e| e.to_string());
        if let Err(e) = &state {
            warn!("State query failed: {}", e);
        }
        Arc::new(self.build(state, recent_output))
    }

    /// Build a snapshot from a state query result
    pub fn build(
        &self,
        state: std::result::Result<DebuggerState, String>,
        recent_output: &OutputLog,
    ) -> SessionSnapshot {
        let mut gaps = Vec::new();
        let state = match state {
            Ok(state) => state,
            Err(msg) => {
                gaps.push(ExtractionGap::StateUnavailable(msg));
                DebuggerState::default()
            }
        };
        let value_limit = self.options.value_byte_limit;

        let live = state.location.is_some() || !state.frames.is_empty();
        if !live && gaps.is_empty() {
            gaps.push(ExtractionGap::NoProcess);
        }
        if let Some(loc) = &state.location {
            if loc.function.is_none() {
                gaps.push(ExtractionGap::NoSymbols);
            } else if loc.file.is_none() || loc.line.is_none() {
                gaps.push(ExtractionGap::NoLineInfo);
            }
        }

        let total_frames = state.frames.len();
        if total_frames > self.options.max_frames {
            gaps.push(ExtractionGap::FramesTruncated {
                shown: self.options.max_frames,
                total: total_frames,
            });
        }
        let stack_frames = state
            .frames
            .iter()
            .take(self.options.max_frames)
            .map(|frame| StackFrame {
                function: frame.location.function.clone(),
                file: frame.location.file.clone(),
                line: frame.location.line,
                arguments: frame
                    .arguments
                    .iter()
                    .map(|arg| {
                        let value = arg.value.as_deref().unwrap_or("<no value>");
                        (arg.name.clone(), RenderedText::new(value, value_limit))
                    })
                    .collect(),
            })
            .collect();

        let mut locals = BTreeMap::new();
        for var in &state.locals {
            // Shadowed names: the innermost declaration comes first
            locals.entry(var.name.clone()).or_insert_with(|| LocalValue {
                value: var.value.as_deref().map(|v| RenderedText::new(v, value_limit)),
                type_name: var.type_name.clone(),
            });
        }

        let output_limit = self.options.output_byte_limit;
        let current_line = state.location.as_ref().and_then(|loc| loc.line);
        let source = state.source.as_ref().map(|lines| {
            let listing: String = lines
                .iter()
                .map(|(number, text)| {
                    let marker = if Some(*number) == current_line { ">" } else { " " };
                    format!("{} {:>4}  {}\n", marker, number, text)
                })
                .collect();
            RenderedText::new(&listing, output_limit)
        });
        let has_line_info = state
            .location
            .as_ref()
            .is_some_and(|loc| loc.file.is_some() && loc.line.is_some());
        if has_line_info && source.is_none() {
            gaps.push(ExtractionGap::SourceUnavailable);
        }

        let threads = state.threads.map(|mut threads| {
            if threads.len() > self.options.max_threads {
                gaps.push(ExtractionGap::ThreadsTruncated {
                    shown: self.options.max_threads,
                    total: threads.len(),
                });
                threads.truncate(self.options.max_threads);
            }
            threads
        });
        if live && threads.is_none() {
            gaps.push(ExtractionGap::ThreadsUnavailable);
        }

        let registers = state
            .registers
            .map(|regs| regs.into_iter().collect::<BTreeMap<_, _>>());
        if live && registers.is_none() {
            gaps.push(ExtractionGap::RegistersUnavailable);
        }
        if state.breakpoints.is_none() {
            gaps.push(ExtractionGap::BreakpointsUnavailable);
        }

        let snapshot = SessionSnapshot {
            location: state.location,
            stack_frames,
            locals,
            source,
            threads,
            stop_reason: state.stop_reason,
            registers,
            breakpoints: state.breakpoints,
            target_info: state
                .target_info
                .as_deref()
                .map(|info| RenderedText::new(info, output_limit)),
            recent_output: recent_output
                .iter()
                .map(|out| RenderedText::new(out, output_limit))
                .collect(),
            gaps,
            captured_at: Utc::now(),
        };
        debug!(
            "Snapshot: stop={}, frames={}, gaps={}",
            snapshot.stop_reason,
            snapshot.stack_frames.len(),
            snapshot.gaps.len()
        );
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::{Frame, RawOutput, Variable};
    use crate::{Error, Result};
    use async_trait::async_trait;

    struct FixedSession {
        state: Option<DebuggerState>,
        state_queries: usize,
    }

    #[async_trait]
    impl DebuggerSession for FixedSession {
        async fn run(&mut self, _command: &str) -> Result<RawOutput> {
            panic!("extraction must not run commands");
        }

        async fn current_state(&mut self) -> Result<DebuggerState> {
            self.state_queries += 1;
            self.state
                .clone()
                .ok_or_else(|| Error::Debugger("no state".to_string()))
        }

        fn is_alive(&mut self) -> bool {
            true
        }

        async fn interrupt(&mut self) -> Result<()> {
            panic!("extraction must not interrupt");
        }
    }

    fn location(function: Option<&str>, line: Option<u32>) -> Location {
        Location {
            file: line.map(|_| "crash.c".to_string()),
            line,
            function: function.map(str::to_string),
            address: Some("0x401136".to_string()),
        }
    }

    fn stopped_state() -> DebuggerState {
        DebuggerState {
            location: Some(location(Some("crash"), Some(4))),
            frames: vec![
                Frame {
                    level: 0,
                    location: location(Some("crash"), Some(4)),
                    arguments: vec![Variable {
                        name: "p".to_string(),
                        value: Some("0x0".to_string()),
                        type_name: None,
                    }],
                },
                Frame {
                    level: 1,
                    location: location(Some("main"), Some(10)),
                    arguments: vec![],
                },
            ],
            locals: vec![
                Variable {
                    name: "i".to_string(),
                    value: Some("3".to_string()),
                    type_name: Some("int".to_string()),
                },
                Variable {
                    name: "i".to_string(),
                    value: Some("99".to_string()),
                    type_name: Some("int".to_string()),
                },
            ],
            stop_reason: StopReason::Signal {
                name: "SIGSEGV".to_string(),
            },
            source: Some(vec![
                (3, "int crash(int *p) {".to_string()),
                (4, "    return *p;".to_string()),
                (5, "}".to_string()),
            ]),
            threads: Some(vec![thread("1", true)]),
            registers: Some(vec![("rip".to_string(), "0x401136".to_string())]),
            breakpoints: Some(vec![]),
            target_info: None,
        }
    }

    fn thread(id: &str, current: bool) -> Thread {
        Thread {
            id: id.to_string(),
            target_id: format!("Thread 0x7ffff7d8a740 (LWP 424{})", id),
            name: None,
            state: "stopped".to_string(),
            location: Some(location(Some("crash"), Some(4))),
            current,
        }
    }

    #[test]
    fn test_truncation_is_marked_and_utf8_safe() {
        let rendered = RenderedText::new("ééé", 3);
        assert!(rendered.truncated);
        assert_eq!(rendered.text, "é");
        assert_eq!(rendered.to_string(), "é...truncated (6 bytes total)");

        let short = RenderedText::new("abc", 3);
        assert!(!short.truncated);
        assert_eq!(short.to_string(), "abc");
    }

    #[test]
    fn test_output_log_evicts_oldest() {
        let mut log = OutputLog::new(3);
        for i in 0..10 {
            log.push(format!("out {}", i));
            assert!(log.len() <= log.capacity());
        }
        let kept: Vec<&str> = log.iter().collect();
        assert_eq!(kept, vec!["out 7", "out 8", "out 9"]);
    }

    #[tokio::test]
    async fn test_extract_stopped_state() {
        let mut session = FixedSession {
            state: Some(stopped_state()),
            state_queries: 0,
        };
        let mut log = OutputLog::new(2);
        log.push("Program received signal SIGSEGV");

        let snapshot = ContextExtractor::default().extract(&mut session, &log).await;

        assert_eq!(session.state_queries, 1);
        assert_eq!(snapshot.stack_frames.len(), 2);
        assert_eq!(snapshot.stack_frames[0].arguments[0].1.text, "0x0");
        // The first (innermost) binding of a shadowed name wins
        assert_eq!(snapshot.locals["i"].value.as_ref().unwrap().text, "3");
        assert!(snapshot.gaps.is_empty());
        assert_eq!(snapshot.recent_output.len(), 1);

        let rendered = snapshot.to_string();
        assert!(rendered.contains("Stop reason: signal SIGSEGV"));
        assert!(rendered.contains("#1 main () at crash.c:10"));
        assert!(rendered.contains("Registers: rip=0x401136"));
        assert!(rendered.contains("Source:\n     3  int crash(int *p) {\n>    4      return *p;\n"));
        // A single thread adds nothing over the location
        assert!(!rendered.contains("Threads:"));
    }

    #[test]
    fn test_source_and_thread_gaps() {
        let extractor = ContextExtractor::default();
        let state = DebuggerState {
            source: None,
            threads: None,
            ..stopped_state()
        };
        let snapshot = extractor.build(Ok(state), &OutputLog::new(1));
        assert_eq!(
            snapshot.gaps,
            vec![ExtractionGap::SourceUnavailable, ExtractionGap::ThreadsUnavailable]
        );
        assert!(!snapshot.to_string().contains("Source:"));

        // Without line info there is no file to read; the line gap says so
        let no_lines = DebuggerState {
            location: Some(location(Some("crash"), None)),
            source: None,
            ..stopped_state()
        };
        let snapshot = extractor.build(Ok(no_lines), &OutputLog::new(1));
        assert_eq!(snapshot.gaps, vec![ExtractionGap::NoLineInfo]);
    }

    #[test]
    fn test_thread_list_rendered_and_bounded() {
        let extractor = ContextExtractor::new(ExtractOptions {
            max_threads: 2,
            ..Default::default()
        });
        let mut worker = thread("2", false);
        worker.name = Some("worker".to_string());
        worker.state = "running".to_string();
        worker.location = None;
        let state = DebuggerState {
            threads: Some(vec![thread("1", true), worker, thread("3", false)]),
            ..stopped_state()
        };

        let snapshot = extractor.build(Ok(state), &OutputLog::new(1));
        assert_eq!(snapshot.threads.as_ref().unwrap().len(), 2);
        assert!(snapshot
            .gaps
            .contains(&ExtractionGap::ThreadsTruncated { shown: 2, total: 3 }));

        let rendered = snapshot.to_string();
        assert!(rendered.contains(
            "Threads:\n* 1 Thread 0x7ffff7d8a740 (LWP 4241) stopped in crash at crash.c:4\n"
        ));
        assert!(rendered.contains("  2 Thread 0x7ffff7d8a740 (LWP 4242) \"worker\" running\n"));
    }

    #[tokio::test]
    async fn test_failed_query_becomes_gap() {
        let mut session = FixedSession {
            state: None,
            state_queries: 0,
        };
        let snapshot = ContextExtractor::default()
            .extract(&mut session, &OutputLog::new(1))
            .await;

        assert!(snapshot.location.is_none());
        assert!(matches!(snapshot.gaps[0], ExtractionGap::StateUnavailable(_)));
    }

    #[test]
    fn test_missing_symbols_and_process_are_gaps() {
        let extractor = ContextExtractor::default();
        let log = OutputLog::new(1);

        let no_symbols = DebuggerState {
            location: Some(location(None, None)),
            breakpoints: Some(vec![]),
            registers: Some(vec![]),
            threads: Some(vec![]),
            ..Default::default()
        };
        let snapshot = extractor.build(Ok(no_symbols), &log);
        assert_eq!(snapshot.gaps, vec![ExtractionGap::NoSymbols]);

        let exited = DebuggerState {
            stop_reason: StopReason::Exited { code: Some(0) },
            target_info: Some("Symbols from \"/tmp/a.out\".".to_string()),
            breakpoints: Some(vec![]),
            ..Default::default()
        };
        let snapshot = extractor.build(Ok(exited), &log);
        assert!(snapshot.target_exited());
        assert_eq!(snapshot.gaps, vec![ExtractionGap::NoProcess]);
        assert!(snapshot.to_string().contains("Target info:"));
    }

    #[test]
    fn test_frames_and_values_respect_budgets() {
        let extractor = ContextExtractor::new(ExtractOptions {
            value_byte_limit: 4,
            output_byte_limit: 8,
            max_frames: 1,
            max_threads: 4,
        });
        let mut log = OutputLog::new(1);
        log.push("0123456789");

        let snapshot = extractor.build(Ok(stopped_state()), &log);
        assert_eq!(snapshot.stack_frames.len(), 1);
        assert!(snapshot.gaps.contains(&ExtractionGap::FramesTruncated { shown: 1, total: 2 }));
        assert_eq!(
            snapshot.recent_output[0].to_string(),
            "01234567...truncated (10 bytes total)"
        );
    }

    #[tokio::test]
    async fn test_unchanged_state_yields_equal_snapshots() {
        let mut session = FixedSession {
            state: Some(stopped_state()),
            state_queries: 0,
        };
        let log = OutputLog::new(3);
        let extractor = ContextExtractor::default();

        let first = extractor.extract(&mut session, &log).await;
        let second = extractor.extract(&mut session, &log).await;

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(first.same_state(&second));
    }
}
