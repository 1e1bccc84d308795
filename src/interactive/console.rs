//! Interactive debugging console
//!
//! Plain lines go straight to gdb. Lines starting with `/` are console
//! commands:
//!
//! - `/agent [--max-turns N] [--unattended] <goal>` runs an investigation
//! - `/context` prints what the agent would see right now
//! - `/help`, `/exit`

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::signals::SignalHandler;
use super::{investigate, InvestigationOptions};
use crate::agent::Confirmer;
use crate::context::{ContextExtractor, ExtractOptions, OutputLog};
use crate::debugger::DebuggerSession;
use crate::executor::{CommandExecutor, ExecutionError, Outcome};
use crate::transport::Transport;
use crate::{Config, Result};

const HELP: &str = "\
Console commands:
  /agent [--max-turns N] [--unattended] <goal>   investigate a goal autonomously
  /context                                      show the current debugging context
  /help                                         show this help
  /exit                                         leave the console
Anything else is sent to gdb.
Ctrl+C cancels a running investigation; press it twice to exit.";

const AGENT_USAGE: &str = "Usage: /agent [--max-turns N] [--unattended] <goal>";

/// Stdin lines shared between the console and the confirmer
pub type SharedInput = Arc<Mutex<Lines<BufReader<Stdin>>>>;

pub fn stdin_lines() -> SharedInput {
    Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()))
}

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    /// A gdb command
    Gdb(String),
    Agent {
        goal: String,
        max_turns: Option<usize>,
        unattended: bool,
    },
    Context,
    Help,
    Exit,
    Empty,
}

impl ConsoleInput {
    /// Parse a line. Errors are usage messages for the user.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(ConsoleInput::Empty);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(ConsoleInput::Gdb(line.to_string()));
        };

        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or_default().to_lowercase();
        let raw_args = parts.next().unwrap_or("").trim();

        match name.as_str() {
            "agent" | "a" => Self::parse_agent(raw_args),
            "context" | "ctx" => Ok(ConsoleInput::Context),
            "help" | "h" | "?" => Ok(ConsoleInput::Help),
            "exit" | "quit" | "q" => Ok(ConsoleInput::Exit),
            _ => Err(format!("Unknown command: /{} (type /help)", name)),
        }
    }

    fn parse_agent(raw_args: &str) -> std::result::Result<Self, String> {
        let args = shell_words::split(raw_args)
            .unwrap_or_else(|_| raw_args.split_whitespace().map(String::from).collect());

        let mut max_turns = None;
        let mut unattended = false;
        let mut args = args.into_iter().peekable();
        while let Some(flag) = args.next_if(|a| a.starts_with("--")) {
            match flag.as_str() {
                "--unattended" => unattended = true,
                "--max-turns" => {
                    let value = args.next().ok_or_else(|| AGENT_USAGE.to_string())?;
                    let n = value
                        .parse::<usize>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| format!("Invalid --max-turns value: {}", value))?;
                    max_turns = Some(n);
                }
                _ => return Err(format!("Unknown option: {}\n{}", flag, AGENT_USAGE)),
            }
        }

        let goal = args.collect::<Vec<_>>().join(" ");
        if goal.trim().is_empty() {
            return Err(AGENT_USAGE.to_string());
        }
        Ok(ConsoleInput::Agent {
            goal,
            max_turns,
            unattended,
        })
    }
}

/// Asks on the terminal before running a command that needs approval
pub struct StdinConfirmer {
    input: SharedInput,
}

impl StdinConfirmer {
    pub fn new(input: SharedInput) -> Self {
        Self { input }
    }
}

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, command: &str, reason: &str) -> Result<bool> {
        print!("Run `{}`? ({}) [y/N] ", command, reason);
        std::io::stdout().flush()?;

        let mut input = self.input.lock().await;
        let answer = input.next_line().await?.unwrap_or_default();
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

/// The `sleuth debug` console
pub struct Console<'a> {
    config: &'a Config,
    session: &'a mut dyn DebuggerSession,
    transport: &'a dyn Transport,
    signals: &'a SignalHandler,
    executor: CommandExecutor,
    extractor: ContextExtractor,
    history: OutputLog,
    input: SharedInput,
}

impl<'a> Console<'a> {
    pub fn new(
        config: &'a Config,
        session: &'a mut dyn DebuggerSession,
        transport: &'a dyn Transport,
        signals: &'a SignalHandler,
    ) -> Self {
        Self {
            config,
            session,
            transport,
            signals,
            executor: CommandExecutor::new(config.debugger.command_timeout),
            extractor: ContextExtractor::new(ExtractOptions::from(&config.context)),
            history: OutputLog::new(config.context.recent_output),
            input: stdin_lines(),
        }
    }

    /// Read and dispatch lines until `/exit`, end of input or gdb exits
    pub async fn run(&mut self) -> Result<()> {
        println!("sleuth console (type /help for commands)");

        loop {
            print!("(sleuth) ");
            std::io::stdout().flush()?;

            let line = {
                let mut input = self.input.lock().await;
                input.next_line().await?
            };
            let Some(line) = line else {
                debug!("End of input");
                break;
            };

            let input = match ConsoleInput::parse(&line) {
                Ok(input) => input,
                Err(msg) => {
                    eprintln!("{}", msg);
                    continue;
                }
            };

            match input {
                ConsoleInput::Empty => {}
                ConsoleInput::Help => println!("{}", HELP),
                ConsoleInput::Exit => break,
                ConsoleInput::Context => {
                    let snapshot = self.extractor.extract(self.session, &self.history).await;
                    println!("{}", snapshot);
                }
                ConsoleInput::Gdb(command) => self.run_gdb(&command).await,
                ConsoleInput::Agent {
                    goal,
                    max_turns,
                    unattended,
                } => self.run_agent(&goal, max_turns, unattended).await?,
            }

            if !self.session.is_alive() {
                println!("gdb has exited");
                break;
            }
        }
        Ok(())
    }

    async fn run_gdb(&mut self, command: &str) {
        match self.executor.execute(self.session, command).await {
            Ok(observation) => {
                if !observation.output.is_empty() {
                    println!("{}", observation.output.trim_end());
                }
                if observation.outcome != Outcome::NoChange {
                    println!("[{}]", observation.outcome);
                }
                self.history
                    .push(format!("(gdb) {}\n{}", command, observation.output));
            }
            Err(ExecutionError::Rejected(msg)) => {
                eprintln!("{}", msg);
                self.history.push(format!("(gdb) {}\nerror: {}", command, msg));
            }
            Err(e) => {
                warn!("Command failed: {}", e);
                eprintln!("{}", e);
            }
        }
    }

    async fn run_agent(
        &mut self,
        goal: &str,
        max_turns: Option<usize>,
        unattended: bool,
    ) -> Result<()> {
        self.signals.reset();
        let confirmer = StdinConfirmer::new(self.input.clone());
        let options = InvestigationOptions {
            max_turns,
            unattended,
            confirmer: Some(&confirmer),
            cancel: Some(self.signals.subscribe()),
            history: self.history.iter().map(String::from).collect(),
        };

        let transcript =
            investigate(self.config, self.session, self.transport, goal, options).await?;
        debug!(
            "Investigation {} ended as {}",
            transcript.id,
            transcript.status()
        );
        self.signals.reset();
        Ok(())
    }
}
