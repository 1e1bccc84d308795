//! Command safety gate
//!
//! Classifies a proposed debugger command before it may run:
//! - Deny: matches a denylist rule (abbreviations included), calls a host
//!   shell or filesystem function, or would drive an exited target
//! - Allow: read-only inspection, or state changes early in an investigation
//! - NeedsConfirmation: late state changes and anything unrecognized
//!
//! The gate holds only the compiled, immutable policy. `classify` is pure.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::PolicyConfig;
use crate::{Error, Result};

/// Outcome of classifying a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// Run without asking
    Allow,
    /// Never run
    Deny { reason: String },
    /// Run only after a human approves
    NeedsConfirmation { reason: String },
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateDecision::Allow => write!(f, "allow"),
            GateDecision::Deny { reason } => write!(f, "deny ({})", reason),
            GateDecision::NeedsConfirmation { reason } => {
                write!(f, "needs confirmation ({})", reason)
            }
        }
    }
}

/// What the gate knows about the investigation
#[derive(Debug, Clone, Copy, Default)]
pub struct GateContext {
    /// Turns recorded so far
    pub turn_count: usize,
    /// Whether the latest snapshot reports an exited target
    pub target_exited: bool,
}

/// Broad effect of a debugger command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    /// Only inspects state
    ReadOnly,
    /// Resumes, steps or restarts the target
    ExecutionControl,
    /// Writes target memory or registers, or calls into the target
    Mutation,
    /// Creates, removes or edits breakpoints and watchpoints
    Breakpoint,
    Unknown,
}

/// Kind of a known command word
#[derive(Clone, Copy)]
enum Word {
    Class(CommandClass),
    /// Read-only unless the expression has side effects
    Expression,
    /// `set`: assignment or a debugger setting
    Set,
    /// `frame`/`thread`: selection, or `apply` to run other commands
    Selection,
}

use CommandClass::{Breakpoint, ExecutionControl, Mutation, ReadOnly};

/// Known command words with the shortest abbreviation gdb accepts for each
const COMMANDS: &[(&str, usize, Word)] = &[
    // Inspection
    ("backtrace", 4, Word::Class(ReadOnly)),
    ("bt", 2, Word::Class(ReadOnly)),
    ("where", 5, Word::Class(ReadOnly)),
    ("info", 1, Word::Class(ReadOnly)),
    ("x", 1, Word::Class(ReadOnly)),
    ("list", 1, Word::Class(ReadOnly)),
    ("up", 2, Word::Class(ReadOnly)),
    ("down", 3, Word::Class(ReadOnly)),
    ("disassemble", 5, Word::Class(ReadOnly)),
    ("ptype", 2, Word::Class(ReadOnly)),
    ("whatis", 4, Word::Class(ReadOnly)),
    ("show", 3, Word::Class(ReadOnly)),
    ("help", 1, Word::Class(ReadOnly)),
    ("echo", 4, Word::Class(ReadOnly)),
    ("pwd", 3, Word::Class(ReadOnly)),
    ("select-frame", 12, Word::Class(ReadOnly)),
    ("frame", 1, Word::Selection),
    ("thread", 2, Word::Selection),
    ("print", 1, Word::Expression),
    ("inspect", 3, Word::Expression),
    ("output", 3, Word::Expression),
    ("printf", 6, Word::Expression),
    // Execution control
    ("continue", 1, Word::Class(ExecutionControl)),
    ("next", 1, Word::Class(ExecutionControl)),
    ("step", 1, Word::Class(ExecutionControl)),
    ("stepi", 5, Word::Class(ExecutionControl)),
    ("si", 2, Word::Class(ExecutionControl)),
    ("nexti", 5, Word::Class(ExecutionControl)),
    ("ni", 2, Word::Class(ExecutionControl)),
    ("finish", 3, Word::Class(ExecutionControl)),
    ("until", 1, Word::Class(ExecutionControl)),
    ("advance", 3, Word::Class(ExecutionControl)),
    ("run", 1, Word::Class(ExecutionControl)),
    ("start", 5, Word::Class(ExecutionControl)),
    ("starti", 6, Word::Class(ExecutionControl)),
    ("jump", 1, Word::Class(ExecutionControl)),
    ("rc", 2, Word::Class(ExecutionControl)),
    ("rn", 2, Word::Class(ExecutionControl)),
    ("rs", 2, Word::Class(ExecutionControl)),
    ("rsi", 3, Word::Class(ExecutionControl)),
    ("rni", 3, Word::Class(ExecutionControl)),
    // Mutation
    ("call", 4, Word::Class(Mutation)),
    ("return", 3, Word::Class(Mutation)),
    ("set", 3, Word::Set),
    // Breakpoints
    ("break", 1, Word::Class(Breakpoint)),
    ("tbreak", 2, Word::Class(Breakpoint)),
    ("hbreak", 2, Word::Class(Breakpoint)),
    ("watch", 2, Word::Class(Breakpoint)),
    ("rwatch", 2, Word::Class(Breakpoint)),
    ("awatch", 2, Word::Class(Breakpoint)),
    ("delete", 1, Word::Class(Breakpoint)),
    ("disable", 3, Word::Class(Breakpoint)),
    ("enable", 2, Word::Class(Breakpoint)),
    ("condition", 4, Word::Class(Breakpoint)),
    ("ignore", 2, Word::Class(Breakpoint)),
    ("clear", 2, Word::Class(Breakpoint)),
    ("dprintf", 7, Word::Class(Breakpoint)),
];

/// Classifies proposed commands against the configured policy
#[derive(Debug, Clone)]
pub struct SafetyGate {
    deny: Vec<(Regex, String)>,
    confirmation_free_turns: usize,
    read_only_extra: Vec<String>,
}

impl SafetyGate {
    /// Compile the policy. Invalid deny patterns are a configuration error.
    pub fn new(policy: &PolicyConfig) -> Result<Self> {
        let deny = policy
            .deny
            .iter()
            .map(|rule| {
                RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (re, rule.reason.clone()))
                    .map_err(|e| {
                        Error::Config(format!("invalid deny pattern '{}': {}", rule.pattern, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            deny,
            confirmation_free_turns: policy.confirmation_free_turns,
            read_only_extra: policy
                .read_only_commands
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
        })
    }

    /// Decide whether `command` may run
    pub fn classify(&self, command: &str, context: &GateContext) -> GateDecision {
        let command = command.trim();

        let expanded = expand_abbreviation(command);
        for text in std::iter::once(command).chain(expanded.as_deref()) {
            if let Some((_, reason)) = self.deny.iter().find(|(re, _)| re.is_match(text)) {
                return GateDecision::Deny {
                    reason: reason.clone(),
                };
            }
        }

        if let Some(reason) = forbidden_call(command) {
            return GateDecision::Deny {
                reason: reason.to_string(),
            };
        }

        if command.contains(['\n', '\r']) {
            return GateDecision::Deny {
                reason: "only one command may run at a time".to_string(),
            };
        }

        let class = self.command_class(command);
        debug!("Command '{}' classified as {:?}", command, class);

        match class {
            ExecutionControl | Mutation if context.target_exited => GateDecision::Deny {
                reason: "target process has exited; only post-mortem inspection is possible"
                    .to_string(),
            },
            ExecutionControl | Mutation | Breakpoint => {
                if context.turn_count < self.confirmation_free_turns {
                    GateDecision::Allow
                } else {
                    let what = match class {
                        ExecutionControl => "resumes or steps the target",
                        Mutation => "modifies target state",
                        _ => "changes breakpoints",
                    };
                    GateDecision::NeedsConfirmation {
                        reason: format!(
                            "{} after {} autonomous turns",
                            what, self.confirmation_free_turns
                        ),
                    }
                }
            }
            ReadOnly => GateDecision::Allow,
            CommandClass::Unknown => GateDecision::NeedsConfirmation {
                reason: "unrecognized command".to_string(),
            },
        }
    }

    /// Work out what kind of command this is
    pub fn command_class(&self, command: &str) -> CommandClass {
        let (word, rest) = split_command(command.trim());
        if word.is_empty() {
            return CommandClass::Unknown;
        }
        if self.read_only_extra.iter().any(|extra| *extra == word) {
            return ReadOnly;
        }
        if word.starts_with("reverse-") {
            return ExecutionControl;
        }

        match lookup_word(&word) {
            Some(Word::Class(class)) => class,
            Some(Word::Expression) => {
                if has_side_effects(rest) {
                    Mutation
                } else {
                    ReadOnly
                }
            }
            Some(Word::Set) => {
                let sub = rest.split_whitespace().next().unwrap_or_default();
                let is_var = matches!(sub, "var" | "variable")
                    || sub.starts_with('$')
                    || sub.starts_with('{');
                if is_var || has_side_effects(rest) {
                    Mutation
                } else {
                    // Debugger settings
                    CommandClass::Unknown
                }
            }
            Some(Word::Selection) => {
                if rest.trim_start().starts_with("apply") {
                    CommandClass::Unknown
                } else {
                    ReadOnly
                }
            }
            None => CommandClass::Unknown,
        }
    }
}

/// Split off the lowercased command word, dropping any `/fmt` suffix
fn split_command(command: &str) -> (String, &str) {
    let end = command
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(command.len());
    let word = command[..end].to_lowercase();

    let mut rest = &command[end..];
    if let Some(after_slash) = rest.strip_prefix('/') {
        let fmt_end = after_slash
            .find(char::is_whitespace)
            .unwrap_or(after_slash.len());
        rest = &after_slash[fmt_end..];
    }
    (word, rest)
}

/// Commands named by the default denylist, with the shortest abbreviation
/// gdb accepts for each
const HOST_COMMANDS: &[(&str, usize)] = &[
    ("quit", 1),
    ("kill", 1),
    ("detach", 3),
    ("disconnect", 4),
    ("attach", 2),
    ("shell", 3),
    ("pipe", 3),
    ("dump", 2),
    ("append", 4),
    ("restore", 5),
    ("gcore", 2),
    ("generate-core-file", 2),
    ("save", 2),
    ("source", 2),
    ("python", 2),
    ("guile", 2),
    ("define", 3),
    ("document", 3),
    ("alias", 2),
    ("handle", 2),
    ("signal", 3),
    ("queue-signal", 3),
    ("cd", 2),
    ("file", 3),
    ("exec-file", 5),
    ("exit", 4),
    ("symbol-file", 3),
    ("add-symbol-file", 5),
    ("target", 3),
    ("core-file", 4),
];

/// Spell out an abbreviated command word, so `qui` is matched as `quit`
fn expand_abbreviation(command: &str) -> Option<String> {
    let end = command
        .find(|c: char| c.is_whitespace() || c == '/')
        .unwrap_or(command.len());
    let word = command[..end].to_lowercase();
    let (name, _) = HOST_COMMANDS
        .iter()
        .find(|(name, min)| word.len() >= *min && name.starts_with(word.as_str()))?;
    (*name != word).then(|| format!("{}{}", name, &command[end..]))
}

const SHELL_FUNCTIONS: &[&str] = &[
    "$_shell",
    "system",
    "popen",
    "execl",
    "execlp",
    "execle",
    "execv",
    "execvp",
    "execvpe",
    "execve",
    "fexecve",
    "fork",
    "vfork",
    "posix_spawn",
    "posix_spawnp",
];

const FILESYSTEM_FUNCTIONS: &[&str] = &[
    "unlink",
    "unlinkat",
    "remove",
    "rename",
    "renameat",
    "renameat2",
    "rmdir",
    "truncate",
    "ftruncate",
];

/// Convenience functions that only compute a value
const PURE_FUNCTIONS: &[&str] = &[
    "$_strlen",
    "$_streq",
    "$_regex",
    "$_memeq",
    "$_as_string",
    "$_isvoid",
    "$_creal",
    "$_cimag",
    "$_gdb_setting",
    "$_gdb_setting_str",
    "$_gdb_maint_setting",
    "$_gdb_maint_setting_str",
    "$_caller_is",
    "$_caller_matches",
    "$_any_caller_is",
    "$_any_caller_matches",
];

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | ':')
}

/// Find a call to a host shell or filesystem function anywhere outside
/// string literals: in `print`/`call` expressions, `set var` right-hand
/// sides, breakpoint conditions and `dprintf` arguments alike
fn forbidden_call(command: &str) -> Option<&'static str> {
    let chars: Vec<char> = command.chars().collect();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == '\\' {
                i += 1;
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        if c == '"' || c == '\'' {
            quote = Some(c);
            i += 1;
            continue;
        }
        if !is_ident_char(c) {
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && is_ident_char(chars[i]) {
            i += 1;
        }
        let before: String = chars[..start].iter().collect();
        let before = before.trim_end();
        if before.ends_with('.') || before.ends_with("->") {
            // Member functions
            continue;
        }
        // A direct call, or a name wrapped in a cast before being called
        let called = matches!(
            chars[i..].iter().find(|c| !c.is_whitespace()),
            Some('(' | ')')
        );
        if called {
            let ident: String = chars[start..i].iter().collect();
            if let Some(reason) = host_function(&ident) {
                return Some(reason);
            }
        }
    }
    None
}

fn host_function(ident: &str) -> Option<&'static str> {
    let name = match ident.rsplit_once("::") {
        Some(("" | "std", name)) => name,
        Some(_) => return None,
        None => ident,
    };
    if SHELL_FUNCTIONS.contains(&name) {
        Some("shell escape")
    } else if FILESYSTEM_FUNCTIONS.contains(&name) {
        Some("destructive filesystem command")
    } else {
        None
    }
}

fn lookup_word(word: &str) -> Option<Word> {
    if let Some((_, _, kind)) = COMMANDS.iter().find(|(name, _, _)| *name == word) {
        return Some(*kind);
    }
    COMMANDS
        .iter()
        .find(|(name, min, _)| word.len() >= *min && name.starts_with(word))
        .map(|(_, _, kind)| *kind)
}

const NON_CALL_KEYWORDS: &[&str] = &["sizeof", "alignof", "_Alignof", "typeof", "decltype"];

/// Whether an expression assigns, increments or calls a function
fn has_side_effects(expr: &str) -> bool {
    let chars: Vec<char> = expr.chars().collect();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == '\\' {
                i += 1;
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        let prev = i.checked_sub(1).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();
        match c {
            '"' | '\'' => quote = Some(c),
            '=' => {
                let shift_assign = matches!(prev, Some('<') | Some('>'))
                    && i >= 2
                    && chars[i - 2] == prev.unwrap_or_default();
                let comparison = matches!(prev, Some('=' | '!' | '<' | '>')) || next == Some('=');
                if shift_assign || !comparison {
                    return true;
                }
                if next == Some('=') {
                    // Skip the second half of ==
                    i += 1;
                }
            }
            '+' | '-' if next == Some(c) => return true,
            '(' if is_call(&chars[..i]) => return true,
            _ => {}
        }
        i += 1;
    }
    false
}

/// Whether the text before a `(` ends in a function name
fn is_call(before: &[char]) -> bool {
    let mut end = before.len();
    while end > 0 && before[end - 1].is_whitespace() {
        end -= 1;
    }
    let mut start = end;
    while start > 0 && (before[start - 1].is_alphanumeric() || matches!(before[start - 1], '_' | '$' | ':'))
    {
        start -= 1;
    }
    if start == end {
        return false;
    }
    let ident: String = before[start..end].iter().collect();
    if ident.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return false;
    }
    !NON_CALL_KEYWORDS.contains(&ident.as_str()) && !PURE_FUNCTIONS.contains(&ident.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> SafetyGate {
        SafetyGate::new(&PolicyConfig::default()).unwrap()
    }

    fn ctx(turn_count: usize) -> GateContext {
        GateContext {
            turn_count,
            target_exited: false,
        }
    }

    fn is_deny(decision: &GateDecision) -> bool {
        matches!(decision, GateDecision::Deny { .. })
    }

    #[test]
    fn test_denylist_wins_in_every_context() {
        let gate = gate();
        let commands = [
            "quit",
            "q",
            "kill",
            "detach",
            "shell ls",
            "!ls",
            "rm -rf /tmp",
            "dump memory out.bin 0 100",
            "gcore",
            "set logging on",
            "source evil.gdb",
            "python import os",
            "define foo",
            "handle SIGSEGV nostop",
            "signal SIGKILL",
            "file /bin/sh",
            "target remote :1234",
            "  QUIT  ",
            "qui",
            "kil",
            "det",
            "disconn",
            "sou evil.gdb",
            "pyth import os",
            "shel ls",
            "gener core",
            "gc /tmp/core",
            "tar ext :1234",
            "set log on",
        ];
        for command in commands {
            for context in [
                ctx(0),
                ctx(100),
                GateContext {
                    turn_count: 0,
                    target_exited: true,
                },
            ] {
                assert!(
                    is_deny(&gate.classify(command, &context)),
                    "{} should be denied",
                    command
                );
            }
        }
    }

    #[test]
    fn test_destructive_filesystem_reason() {
        assert_eq!(
            gate().classify("rm -rf /tmp", &ctx(0)),
            GateDecision::Deny {
                reason: "destructive filesystem command".to_string()
            }
        );
    }

    #[test]
    fn test_abbreviations_keep_their_reason() {
        let gate = gate();
        assert_eq!(
            gate.classify("kil", &ctx(0)),
            GateDecision::Deny {
                reason: "terminates the debugged process".to_string()
            }
        );
        assert_eq!(
            gate.classify("pyth import os", &ctx(0)),
            GateDecision::Deny {
                reason: "runs or defines arbitrary scripts".to_string()
            }
        );
        // Abbreviations of other commands are left alone
        assert_eq!(gate.classify("fin", &ctx(0)), GateDecision::Allow);
        assert_eq!(gate.classify("si", &ctx(0)), GateDecision::Allow);
        assert_eq!(gate.classify("disas", &ctx(0)), GateDecision::Allow);
        assert_eq!(gate.classify("del 2", &ctx(0)), GateDecision::Allow);
    }

    #[test]
    fn test_host_calls_denied_in_expressions() {
        let gate = gate();
        let shell = [
            "call system(\"rm -rf /tmp/x\")",
            "print system(\"rm -rf ~\")",
            "p $_shell(\"rm -rf ~\")",
            "output $_shell(\"rm -rf ~\")",
            "printf \"%d\\n\", system(\"id\")",
            "p (FILE *) popen(\"sh\", \"r\")",
            "call execve(path, argv, envp)",
            "p (system)(\"ls\")",
            "p ::system(\"ls\")",
            "set var rc = system(\"ls\")",
            "break crash.c:4 if system(\"touch /tmp/x\")",
            "tbreak main if fork() == 0",
            "dprintf crash.c:4,\"%d\\n\",system(\"ls\")",
            "thread apply all p system(\"ls\")",
        ];
        let filesystem = [
            "condition 1 unlink(\"f\")",
            "call remove(\"data.db\")",
            "p rename(\"a\", \"b\")",
            "watch truncate(\"log\", 0)",
        ];
        for (commands, reason) in [
            (&shell[..], "shell escape"),
            (&filesystem[..], "destructive filesystem command"),
        ] {
            for command in commands {
                for context in [
                    ctx(0),
                    ctx(100),
                    GateContext {
                        turn_count: 0,
                        target_exited: true,
                    },
                ] {
                    assert_eq!(
                        gate.classify(command, &context),
                        GateDecision::Deny {
                            reason: reason.to_string()
                        },
                        "{} should be denied",
                        command
                    );
                }
            }
        }
    }

    #[test]
    fn test_host_function_names_without_calls() {
        let gate = gate();
        assert_eq!(gate.classify("break system", &ctx(0)), GateDecision::Allow);
        assert_eq!(gate.classify("info symbol unlink", &ctx(100)), GateDecision::Allow);
        assert_eq!(gate.classify("p \"system(1)\"", &ctx(100)), GateDecision::Allow);
        assert_eq!(gate.classify("disas remove", &ctx(100)), GateDecision::Allow);
        // Member functions and other namespaces are ordinary calls
        assert_eq!(gate.command_class("p list.remove(3)"), Mutation);
        assert_eq!(gate.classify("p list.remove(3)", &ctx(0)), GateDecision::Allow);
        assert_eq!(gate.classify("call cache::remove(k)", &ctx(0)), GateDecision::Allow);
    }

    #[test]
    fn test_convenience_function_calls() {
        let gate = gate();
        assert_eq!(gate.command_class("p $_strlen(s)"), ReadOnly);
        assert_eq!(gate.command_class("p $_streq(a, \"x\")"), ReadOnly);
        assert_eq!(gate.command_class("p $_caller_is(\"main\")"), ReadOnly);
        // Anything else may run code
        assert_eq!(gate.command_class("p $fn(1)"), Mutation);
        assert_eq!(gate.command_class("p $_unknown_helper(1)"), Mutation);
        assert!(matches!(
            gate.classify("p $fn(1)", &ctx(100)),
            GateDecision::NeedsConfirmation { .. }
        ));
    }

    #[test]
    fn test_read_only_always_allowed() {
        let gate = gate();
        for command in [
            "backtrace",
            "bt full",
            "back 5",
            "where",
            "info locals",
            "i r",
            "print p",
            "p/x $rip",
            "x/16xw $sp",
            "list crash",
            "frame 1",
            "up",
            "disas",
            "ptype struct node",
            "whatis p",
            "show version",
            "p a == b",
            "p a <= b",
            "print sizeof(struct node)",
            "p $_strlen(s)",
            "p \"a=b\"",
        ] {
            assert_eq!(
                gate.classify(command, &ctx(1000)),
                GateDecision::Allow,
                "{} should be allowed",
                command
            );
        }
    }

    #[test]
    fn test_command_classes() {
        let gate = gate();
        assert_eq!(gate.command_class("c"), ExecutionControl);
        assert_eq!(gate.command_class("cont"), ExecutionControl);
        assert_eq!(gate.command_class("si"), ExecutionControl);
        assert_eq!(gate.command_class("fin"), ExecutionControl);
        assert_eq!(gate.command_class("reverse-step"), ExecutionControl);
        assert_eq!(gate.command_class("set var x = 3"), Mutation);
        assert_eq!(gate.command_class("set $rax = 0"), Mutation);
        assert_eq!(gate.command_class("set {int}0x601040 = 1"), Mutation);
        assert_eq!(gate.command_class("print x = 5"), Mutation);
        assert_eq!(gate.command_class("p x += 1"), Mutation);
        assert_eq!(gate.command_class("p x <<= 1"), Mutation);
        assert_eq!(gate.command_class("p i++"), Mutation);
        assert_eq!(gate.command_class("p free(ptr)"), Mutation);
        assert_eq!(gate.command_class("call abort()"), Mutation);
        assert_eq!(gate.command_class("b main"), Breakpoint);
        assert_eq!(gate.command_class("tbreak crash.c:4"), Breakpoint);
        assert_eq!(gate.command_class("watch *p"), Breakpoint);
        assert_eq!(gate.command_class("d 1"), Breakpoint);
        assert_eq!(gate.command_class("set print pretty on"), CommandClass::Unknown);
        assert_eq!(gate.command_class("thread apply all bt"), CommandClass::Unknown);
        assert_eq!(gate.command_class("frobnicate"), CommandClass::Unknown);
    }

    #[test]
    fn test_state_changes_need_confirmation_after_free_turns() {
        let gate = gate();
        assert_eq!(gate.classify("continue", &ctx(0)), GateDecision::Allow);
        assert_eq!(gate.classify("next", &ctx(5)), GateDecision::Allow);
        assert!(matches!(
            gate.classify("next", &ctx(6)),
            GateDecision::NeedsConfirmation { .. }
        ));
        assert!(matches!(
            gate.classify("break main", &ctx(6)),
            GateDecision::NeedsConfirmation { .. }
        ));
    }

    #[test]
    fn test_unknown_fails_closed() {
        assert_eq!(
            gate().classify("frobnicate now", &ctx(0)),
            GateDecision::NeedsConfirmation {
                reason: "unrecognized command".to_string()
            }
        );
    }

    #[test]
    fn test_exited_target_denies_execution_control() {
        let gate = gate();
        let exited = GateContext {
            turn_count: 0,
            target_exited: true,
        };
        for command in ["continue", "run", "step", "set var x = 1"] {
            match gate.classify(command, &exited) {
                GateDecision::Deny { reason } => assert!(reason.contains("exited")),
                other => panic!("{} should be denied, got {:?}", command, other),
            }
        }
        assert_eq!(gate.classify("bt", &exited), GateDecision::Allow);
        assert_eq!(gate.classify("info registers", &exited), GateDecision::Allow);
    }

    #[test]
    fn test_multiline_denied() {
        assert!(is_deny(&gate().classify("bt\nquit", &ctx(0))));
    }

    #[test]
    fn test_configured_policy() {
        let policy = PolicyConfig {
            confirmation_free_turns: 0,
            deny: vec![crate::config::DenyRule {
                pattern: "^bt".to_string(),
                reason: "no backtraces".to_string(),
            }],
            read_only_commands: vec!["frobnicate".to_string()],
        };
        let gate = SafetyGate::new(&policy).unwrap();

        assert_eq!(
            gate.classify("BT", &ctx(0)),
            GateDecision::Deny {
                reason: "no backtraces".to_string()
            }
        );
        assert_eq!(gate.classify("frobnicate", &ctx(0)), GateDecision::Allow);
        assert!(matches!(
            gate.classify("step", &ctx(0)),
            GateDecision::NeedsConfirmation { .. }
        ));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let policy = PolicyConfig {
            deny: vec![crate::config::DenyRule {
                pattern: "(".to_string(),
                reason: "broken".to_string(),
            }],
            ..Default::default()
        };
        assert!(matches!(SafetyGate::new(&policy), Err(Error::Config(_))));
    }
}
