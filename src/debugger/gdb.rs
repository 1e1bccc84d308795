//! GDB session driven over the Machine Interface
//!
//! Spawns `gdb --interpreter=mi2` and wraps console commands in
//! `-interpreter-exec console`, so the user and the agent type ordinary GDB
//! commands while state queries use structured MI records.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::mi::{self, lookup, AsyncKind, Record, ResultClass, StreamKind, Value};
use super::{
    Breakpoint, DebuggerSession, DebuggerState, Frame, Location, RawOutput, StopReason, Thread,
    Variable,
};
use crate::config::DebuggerConfig;
use crate::{Error, Result};

const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_FRAMES: usize = 64;

/// What to load into the debugger
#[derive(Debug, Clone, Default)]
pub struct Target {
    /// Executable to debug
    pub program: Option<PathBuf>,
    /// Arguments passed to the program on `run`
    pub args: Vec<String>,
    /// Core file for post-mortem sessions
    pub core: Option<PathBuf>,
}

/// Reply to one MI command
#[derive(Debug, Default)]
struct Reply {
    class: Option<ResultClass>,
    results: Vec<(String, Value)>,
    output: String,
    stop: Option<StopReason>,
    running: bool,
}

impl Reply {
    fn is_error(&self) -> bool {
        self.class == Some(ResultClass::Error)
    }

    fn error_message(&self) -> String {
        lookup(&self.results, "msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string()
    }

    fn get(&self, name: &str) -> Option<&Value> {
        lookup(&self.results, name)
    }
}

/// A running gdb process
pub struct GdbSession {
    child: Child,
    stdin: ChildStdin,
    records: mpsc::UnboundedReceiver<Record>,
    next_token: u64,
    closed: bool,
    last_stop: StopReason,
    register_filter: Vec<String>,
    register_names: Option<Vec<String>>,
    max_frames: usize,
    interrupt_grace: Duration,
    startup_output: String,
}

impl GdbSession {
    /// Spawn gdb for the given target and wait until it accepts commands
    pub async fn spawn(config: &DebuggerConfig, target: &Target) -> Result<Self> {
        let mut command = Command::new(&config.gdb);
        command.arg("--interpreter=mi2").arg("--quiet");
        if !config.load_gdbinit {
            command.arg("-nx");
        }
        if let Some(core) = &target.core {
            command.arg(format!("--core={}", core.display()));
        }
        if let Some(program) = &target.program {
            if target.args.is_empty() {
                command.arg(program);
            } else {
                command.arg("--args").arg(program).args(&target.args);
            }
        }

        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Keep terminal Ctrl+C away from gdb and the target
        #[cfg(unix)]
        command.process_group(0);

        debug!("Running: {:?}", command);
        let mut child = command.spawn().map_err(|e| {
            Error::Debugger(format!(
                "Failed to spawn {}: {}",
                config.gdb.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Debugger("Failed to capture gdb stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Debugger("Failed to capture gdb stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Debugger("Failed to capture gdb stderr".to_string()))?;

        let (tx, records) = mpsc::unbounded_channel();

        let stdout_tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let record = match mi::parse_line(&line) {
                    Ok(record) => record,
                    Err(e) => {
                        debug!("Unparseable MI line ({}): {}", e, line);
                        Record::Other(line)
                    }
                };
                if stdout_tx.send(record).is_err() {
                    break;
                }
            }
            debug!("gdb stdout closed");
        });

        // The target shares gdb's stderr
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(Record::Other(line)).is_err() {
                    break;
                }
            }
        });

        let mut session = Self {
            child,
            stdin,
            records,
            next_token: 1,
            closed: false,
            last_stop: StopReason::None,
            register_filter: config.registers.clone(),
            register_names: None,
            max_frames: DEFAULT_MAX_FRAMES,
            interrupt_grace: config.interrupt_grace,
            startup_output: String::new(),
        };

        let startup = tokio::time::timeout(STARTUP_TIMEOUT, session.wait_for_prompt())
            .await
            .map_err(|_| Error::Debugger("gdb did not start in time".to_string()))??;
        session.startup_output = startup;

        session.configure().await?;

        info!(
            "Started gdb (pid {:?}) for {}",
            session.child.id(),
            target
                .program
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "no program".to_string())
        );

        Ok(session)
    }

    /// Limit the frames returned by `current_state`
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames.max(1);
        self
    }

    /// Console output gdb printed while loading the target
    pub fn startup_output(&self) -> &str {
        &self.startup_output
    }

    /// Ask gdb to exit, killing it if it does not
    pub async fn shutdown(mut self) -> Result<()> {
        if self.is_alive() {
            let _ = self.send("-gdb-exit").await;
            match tokio::time::timeout(Duration::from_secs(2), self.child.wait()).await {
                Ok(status) => debug!("gdb exited: {:?}", status),
                Err(_) => {
                    warn!("gdb did not exit, killing it");
                    self.child.kill().await?;
                }
            }
        }
        Ok(())
    }

    async fn configure(&mut self) -> Result<()> {
        let reply = self.request("-gdb-set mi-async on").await?;
        if reply.is_error() {
            // Older gdb spells it target-async
            let reply = self.request("-gdb-set target-async on").await?;
            if reply.is_error() {
                warn!("gdb does not support async execution: {}", reply.error_message());
            }
        }
        for setting in ["pagination off", "confirm off", "width 0", "height 0"] {
            let reply = self.request(&format!("-gdb-set {}", setting)).await?;
            if reply.is_error() {
                warn!("Failed to set {}: {}", setting, reply.error_message());
            }
        }
        Ok(())
    }

    async fn next_record(&mut self) -> Result<Record> {
        match self.records.recv().await {
            Some(record) => Ok(record),
            None => {
                self.closed = true;
                Err(Error::SessionClosed)
            }
        }
    }

    async fn wait_for_prompt(&mut self) -> Result<String> {
        let mut output = String::new();
        loop {
            match self.next_record().await? {
                Record::Prompt => return Ok(output),
                Record::Stream {
                    kind: StreamKind::Console | StreamKind::Target,
                    text,
                } => output.push_str(&text),
                _ => {}
            }
        }
    }

    async fn send(&mut self, command: &str) -> Result<u64> {
        let token = self.next_token;
        self.next_token += 1;

        debug!("-> {}{}", token, command);
        let line = format!("{}{}\n", token, command);
        if let Err(e) = self.stdin.write_all(line.as_bytes()).await {
            self.closed = true;
            debug!("Write to gdb failed: {}", e);
            return Err(Error::SessionClosed);
        }
        self.stdin.flush().await.map_err(|_| Error::SessionClosed)?;
        Ok(token)
    }

    /// Send an MI command and collect everything up to its result record
    async fn request(&mut self, command: &str) -> Result<Reply> {
        let token = self.send(command).await?;
        let mut reply = Reply::default();

        loop {
            match self.next_record().await? {
                Record::Result {
                    token: Some(t),
                    class,
                    results,
                } if t == token => {
                    if class == ResultClass::Running {
                        reply.running = true;
                    }
                    reply.class = Some(class);
                    reply.results = results;
                    return Ok(reply);
                }
                record => self.absorb(record, &mut reply),
            }
        }
    }

    /// Fold an unrelated record into the reply being collected
    fn absorb(&mut self, record: Record, reply: &mut Reply) {
        match record {
            Record::Stream {
                kind: StreamKind::Console | StreamKind::Target,
                text,
            } => reply.output.push_str(&text),
            Record::Stream {
                kind: StreamKind::Log,
                text,
            } => debug!("gdb log: {}", text.trim_end()),
            Record::Other(line) => {
                reply.output.push_str(&line);
                reply.output.push('\n');
            }
            Record::Async {
                kind: AsyncKind::Exec,
                class,
                results,
                ..
            } => match class.as_str() {
                "running" => reply.running = true,
                "stopped" => {
                    let stop = stop_reason(&results);
                    self.last_stop = stop.clone();
                    reply.stop = Some(stop);
                    reply.running = false;
                }
                _ => {}
            },
            Record::Result { token, .. } => debug!("Ignoring stale result for token {:?}", token),
            Record::Async { .. } | Record::Prompt => {}
        }
    }

    /// Wait for the target to stop, collecting its output meanwhile
    async fn wait_for_stop(&mut self, reply: &mut Reply) -> Result<()> {
        while reply.stop.is_none() {
            let record = self.next_record().await?;
            self.absorb(record, reply);
        }
        Ok(())
    }

    /// Run a read-only console command and return its output
    async fn capture(&mut self, command: &str) -> Result<Option<String>> {
        let reply = self
            .request(&format!("-interpreter-exec console {}", mi::quote(command)))
            .await?;
        if reply.is_error() {
            return Ok(None);
        }
        Ok(Some(reply.output))
    }

    async fn frames(&mut self) -> Result<Option<Vec<Frame>>> {
        let high = self.max_frames - 1;
        let reply = self.request(&format!("-stack-list-frames 0 {}", high)).await?;
        if reply.is_error() {
            return Ok(None);
        }

        let mut frames: Vec<Frame> = reply
            .get("stack")
            .map(Value::items)
            .unwrap_or_default()
            .iter()
            .filter_map(|item| item.get("frame"))
            .map(|frame| Frame {
                level: frame
                    .get_str("level")
                    .and_then(|l| l.parse().ok())
                    .unwrap_or(0),
                location: location_from(frame),
                arguments: Vec::new(),
            })
            .collect();

        let reply = self
            .request(&format!("-stack-list-arguments --all-values 0 {}", high))
            .await?;
        if !reply.is_error() {
            for item in reply.get("stack-args").map(Value::items).unwrap_or_default() {
                let Some(frame) = item.get("frame") else { continue };
                let level: Option<u32> = frame.get_str("level").and_then(|l| l.parse().ok());
                let args = frame.get("args").map(Value::items).unwrap_or_default();
                if let Some(target) = frames.iter_mut().find(|f| Some(f.level) == level) {
                    target.arguments = args.iter().filter_map(variable_from).collect();
                }
            }
        }

        Ok(Some(frames))
    }

    async fn locals(&mut self) -> Result<Vec<Variable>> {
        // --simple-values carries types; --all-values carries aggregate values
        let typed = self.request("-stack-list-variables --simple-values").await?;
        if typed.is_error() {
            return Ok(Vec::new());
        }
        let mut locals: Vec<Variable> = typed
            .get("variables")
            .map(Value::items)
            .unwrap_or_default()
            .iter()
            .filter_map(variable_from)
            .collect();

        let full = self.request("-stack-list-variables --all-values").await?;
        if !full.is_error() {
            let values = full.get("variables").map(Value::items).unwrap_or_default();
            for (local, value) in locals.iter_mut().zip(values) {
                if local.value.is_none() && value.get_str("name") == Some(local.name.as_str()) {
                    local.value = value.get_str("value").map(str::to_string);
                }
            }
        }
        Ok(locals)
    }

    async fn registers(&mut self) -> Result<Option<Vec<(String, String)>>> {
        if self.register_names.is_none() {
            let reply = self.request("-data-list-register-names").await?;
            if reply.is_error() {
                return Ok(None);
            }
            let names = reply
                .get("register-names")
                .map(Value::items)
                .unwrap_or_default()
                .iter()
                .map(|n| n.as_str().unwrap_or_default().to_string())
                .collect();
            self.register_names = Some(names);
        }

        let names = self.register_names.clone().unwrap_or_default();
        let wanted: Vec<usize> = names
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty() && self.register_filter.contains(name))
            .map(|(i, _)| i)
            .collect();
        if wanted.is_empty() {
            return Ok(None);
        }

        let indices: Vec<String> = wanted.iter().map(|i| i.to_string()).collect();
        let reply = self
            .request(&format!("-data-list-register-values x {}", indices.join(" ")))
            .await?;
        if reply.is_error() {
            return Ok(None);
        }

        let registers = reply
            .get("register-values")
            .map(Value::items)
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| {
                let number: usize = entry.get_str("number")?.parse().ok()?;
                let name = names.get(number)?.clone();
                Some((name, entry.get_str("value")?.to_string()))
            })
            .collect();
        Ok(Some(registers))
    }

    async fn threads(&mut self) -> Result<Option<Vec<Thread>>> {
        let reply = self.request("-thread-info").await?;
        if reply.is_error() {
            return Ok(None);
        }
        Ok(Some(threads_from(&reply.results)))
    }

    /// `info files`, `info sections` and `info functions`, whichever gdb answers
    async fn program_info(&mut self) -> Result<Option<String>> {
        let mut parts = Vec::new();
        for command in ["info files", "info sections", "info functions"] {
            if let Some(output) = self.capture(command).await? {
                if !output.trim().is_empty() {
                    parts.push(output.trim_end().to_string());
                }
            }
        }
        Ok((!parts.is_empty()).then(|| parts.join("\n\n")))
    }

    async fn breakpoints(&mut self) -> Result<Option<Vec<Breakpoint>>> {
        let reply = self.request("-break-list").await?;
        if reply.is_error() {
            return Ok(None);
        }
        let body = reply
            .get("BreakpointTable")
            .and_then(|table| table.get("body"))
            .map(Value::items)
            .unwrap_or_default();

        Ok(Some(
            body.iter()
                .filter_map(|item| item.get("bkpt"))
                .map(breakpoint_from)
                .collect(),
        ))
    }
}

#[async_trait]
impl DebuggerSession for GdbSession {
    async fn run(&mut self, command: &str) -> Result<RawOutput> {
        if self.closed {
            return Err(Error::SessionClosed);
        }

        // Drop anything that arrived between commands (async target output)
        let mut reply = Reply::default();
        while let Ok(record) = self.records.try_recv() {
            self.absorb(record, &mut reply);
        }
        let mut text = std::mem::take(&mut reply.output);

        let mut reply = self
            .request(&format!("-interpreter-exec console {}", mi::quote(command)))
            .await?;
        if reply.is_error() {
            return Err(Error::DebuggerRejected(reply.error_message()));
        }

        let background = command.trim_end().ends_with('&');
        if reply.running && reply.stop.is_none() && !background {
            self.wait_for_stop(&mut reply).await?;
        }

        text.push_str(&reply.output);
        Ok(RawOutput {
            text,
            running: reply.running && reply.stop.is_none(),
            stop: reply.stop,
        })
    }

    async fn current_state(&mut self) -> Result<DebuggerState> {
        let mut state = DebuggerState {
            stop_reason: self.last_stop.clone(),
            ..Default::default()
        };

        let frame = self.request("-stack-info-frame").await?;
        if frame.is_error() {
            // No live frame: describe the loaded program instead
            state.target_info = self.program_info().await?;
            state.breakpoints = self.breakpoints().await?;
            return Ok(state);
        }

        state.location = frame.get("frame").map(location_from);
        state.frames = self.frames().await?.unwrap_or_default();
        state.locals = self.locals().await?;
        state.source = match &state.location {
            Some(Location {
                file: Some(file),
                line: Some(line),
                ..
            }) => source_excerpt(Path::new(file), *line, SOURCE_RADIUS).await,
            _ => None,
        };
        state.threads = self.threads().await?;
        state.registers = self.registers().await?;
        state.breakpoints = self.breakpoints().await?;
        Ok(state)
    }

    fn is_alive(&mut self) -> bool {
        !self.closed && matches!(self.child.try_wait(), Ok(None))
    }

    async fn interrupt(&mut self) -> Result<()> {
        let mut reply = self.request("-exec-interrupt").await?;
        if reply.is_error() {
            // Nothing running means nothing to stop
            debug!("Interrupt rejected: {}", reply.error_message());
            return Ok(());
        }

        let grace = self.interrupt_grace;
        match tokio::time::timeout(grace, self.wait_for_stop(&mut reply)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Debugger(format!(
                "target did not stop within {:?} of an interrupt",
                grace
            ))),
        }
    }
}

/// Lines read on each side of the current line
const SOURCE_RADIUS: u32 = 5;

/// Read the lines around `line` straight from the source file, so gdb's own
/// `list` position is left untouched
async fn source_excerpt(path: &Path, line: u32, radius: u32) -> Option<Vec<(u32, String)>> {
    let text = match tokio::fs::read(path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!("Source {} unreadable: {}", path.display(), e);
            return None;
        }
    };
    let first = line.saturating_sub(radius).max(1);
    let last = line.saturating_add(radius);
    let lines: Vec<(u32, String)> = (1u32..)
        .zip(text.lines())
        .skip_while(|(n, _)| *n < first)
        .take_while(|(n, _)| *n <= last)
        .map(|(n, l)| (n, l.to_string()))
        .collect();
    (!lines.is_empty()).then_some(lines)
}

fn threads_from(results: &[(String, Value)]) -> Vec<Thread> {
    let current = lookup(results, "current-thread-id").and_then(Value::as_str);
    lookup(results, "threads")
        .map(Value::items)
        .unwrap_or_default()
        .iter()
        .filter_map(|thread| {
            let id = thread.get_str("id")?.to_string();
            Some(Thread {
                current: current == Some(id.as_str()),
                target_id: thread.get_str("target-id").unwrap_or_default().to_string(),
                name: thread.get_str("name").map(str::to_string),
                state: thread.get_str("state").unwrap_or("unknown").to_string(),
                location: thread.get("frame").map(location_from),
                id,
            })
        })
        .collect()
}

fn non_placeholder(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty() && *v != "??").map(str::to_string)
}

fn location_from(frame: &Value) -> Location {
    Location {
        file: non_placeholder(frame.get_str("fullname").or_else(|| frame.get_str("file"))),
        line: frame.get_str("line").and_then(|l| l.parse().ok()),
        function: non_placeholder(frame.get_str("func")),
        address: non_placeholder(frame.get_str("addr")),
    }
}

fn variable_from(value: &Value) -> Option<Variable> {
    Some(Variable {
        name: value.get_str("name")?.to_string(),
        value: value.get_str("value").map(str::to_string),
        type_name: value.get_str("type").map(str::to_string),
    })
}

fn breakpoint_from(bkpt: &Value) -> Breakpoint {
    let location = match (bkpt.get_str("func"), bkpt.get_str("file"), bkpt.get_str("line")) {
        (Some(func), Some(file), Some(line)) => format!("{} at {}:{}", func, file, line),
        _ => bkpt
            .get_str("what")
            .or_else(|| bkpt.get_str("original-location"))
            .or_else(|| bkpt.get_str("addr"))
            .unwrap_or("<unknown>")
            .to_string(),
    };
    Breakpoint {
        number: bkpt.get_str("number").unwrap_or_default().to_string(),
        enabled: bkpt.get_str("enabled") == Some("y"),
        location,
        hits: bkpt
            .get_str("times")
            .and_then(|t| t.parse().ok())
            .unwrap_or(0),
    }
}

/// Map the results of a `*stopped` record to a stop reason
fn stop_reason(results: &[(String, Value)]) -> StopReason {
    let reason = lookup(results, "reason").and_then(Value::as_str);
    match reason {
        Some(
            "breakpoint-hit"
            | "watchpoint-trigger"
            | "read-watchpoint-trigger"
            | "access-watchpoint-trigger"
            | "watchpoint-scope",
        ) => StopReason::Breakpoint,
        Some("end-stepping-range" | "function-finished" | "location-reached") => StopReason::Step,
        Some("signal-received") => StopReason::Signal {
            name: lookup(results, "signal-name")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        },
        Some("exited-normally") => StopReason::Exited { code: Some(0) },
        // gdb reports exit codes in octal
        Some("exited") => StopReason::Exited {
            code: lookup(results, "exit-code")
                .and_then(Value::as_str)
                .and_then(|c| i32::from_str_radix(c, 8).ok()),
        },
        Some("exited-signalled") => StopReason::Exited { code: None },
        _ => StopReason::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(line: &str) -> Vec<(String, Value)> {
        match mi::parse_line(line).unwrap() {
            Record::Async { results, .. } => results,
            other => panic!("expected async record, got {:?}", other),
        }
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(
            stop_reason(&results(r#"*stopped,reason="breakpoint-hit",bkptno="1""#)),
            StopReason::Breakpoint
        );
        assert_eq!(
            stop_reason(&results(r#"*stopped,reason="end-stepping-range""#)),
            StopReason::Step
        );
        assert_eq!(
            stop_reason(&results(
                r#"*stopped,reason="signal-received",signal-name="SIGSEGV""#
            )),
            StopReason::Signal {
                name: "SIGSEGV".to_string()
            }
        );
        assert_eq!(
            stop_reason(&results(r#"*stopped,reason="exited",exit-code="012""#)),
            StopReason::Exited { code: Some(10) }
        );
        assert_eq!(
            stop_reason(&results(r#"*stopped,reason="exited-normally""#)),
            StopReason::Exited { code: Some(0) }
        );
        assert_eq!(stop_reason(&results("*stopped")), StopReason::None);
    }

    #[test]
    fn test_location_without_symbols() {
        let frame = match mi::parse_line(r#"^done,frame={level="0",addr="0x0000000000401126",func="??"}"#)
            .unwrap()
        {
            Record::Result { results, .. } => lookup(&results, "frame").cloned().unwrap(),
            other => panic!("unexpected {:?}", other),
        };
        let location = location_from(&frame);
        assert_eq!(location.function, None);
        assert_eq!(location.file, None);
        assert_eq!(location.line, None);
        assert_eq!(location.address.as_deref(), Some("0x0000000000401126"));
    }

    #[test]
    fn test_breakpoint_rendering() {
        let line = r#"^done,BreakpointTable={nr_rows="2",body=[bkpt={number="1",type="breakpoint",enabled="y",addr="0x1139",func="main",file="a.c",line="4",times="2"},bkpt={number="2",type="hw watchpoint",enabled="n",what="counter",times="0"}]}"#;
        let Record::Result { results, .. } = mi::parse_line(line).unwrap() else {
            panic!("expected result record");
        };
        let body = lookup(&results, "BreakpointTable").unwrap().get("body").unwrap();
        let bps: Vec<Breakpoint> = body
            .items()
            .iter()
            .filter_map(|i| i.get("bkpt"))
            .map(breakpoint_from)
            .collect();

        assert_eq!(bps[0].location, "main at a.c:4");
        assert!(bps[0].enabled);
        assert_eq!(bps[0].hits, 2);
        assert_eq!(bps[1].location, "counter");
        assert!(!bps[1].enabled);
    }

    #[test]
    fn test_thread_list() {
        let line = r#"^done,threads=[{id="2",target-id="Thread 0x7ffff7a00640 (LWP 4243)",name="worker",frame={level="0",addr="0x0000000000401180",func="spin",args=[],file="crash.c",fullname="/src/crash.c",line="12"},state="stopped",core="1"},{id="1",target-id="Thread 0x7ffff7d8a740 (LWP 4242)",state="running"}],current-thread-id="2""#;
        let Record::Result { results, .. } = mi::parse_line(line).unwrap() else {
            panic!("expected result record");
        };
        let threads = threads_from(&results);

        assert_eq!(threads.len(), 2);
        assert!(threads[0].current);
        assert_eq!(threads[0].name.as_deref(), Some("worker"));
        let location = threads[0].location.as_ref().unwrap();
        assert_eq!(location.function.as_deref(), Some("spin"));
        assert_eq!(location.file.as_deref(), Some("/src/crash.c"));
        assert_eq!(location.line, Some(12));

        assert!(!threads[1].current);
        assert_eq!(threads[1].state, "running");
        assert_eq!(threads[1].target_id, "Thread 0x7ffff7d8a740 (LWP 4242)");
        assert!(threads[1].location.is_none());
    }

    #[tokio::test]
    async fn test_source_excerpt_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crash.c");
        let body: String = (1..=20).map(|n| format!("line {}\n", n)).collect();
        std::fs::write(&path, body).unwrap();

        let middle = source_excerpt(&path, 10, 2).await.unwrap();
        assert_eq!(
            middle,
            vec![
                (8, "line 8".to_string()),
                (9, "line 9".to_string()),
                (10, "line 10".to_string()),
                (11, "line 11".to_string()),
                (12, "line 12".to_string()),
            ]
        );

        let start = source_excerpt(&path, 1, 2).await.unwrap();
        assert_eq!(start.first().map(|(n, _)| *n), Some(1));
        assert_eq!(start.len(), 3);

        let end = source_excerpt(&path, 20, 5).await.unwrap();
        assert_eq!(end.last().map(|(n, _)| *n), Some(20));

        assert!(source_excerpt(&path, 40, 2).await.is_none());
        assert!(source_excerpt(&dir.path().join("gone.c"), 3, 2).await.is_none());
    }
}
