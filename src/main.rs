//! sleuth CLI
//!
//! Autonomous AI investigations inside a gdb session.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sleuth::agent::transcript;
use sleuth::debugger::Target;
use sleuth::interactive::{self, signals, Console, InvestigationOptions, SignalHandler};
use sleuth::{CommandExecutor, Config, GdbSession, Result, TranscriptStatus};

/// Exit status for investigations that did not conclude
const UNCONCLUDED_EXIT_CODE: i32 = 2;

#[derive(Parser)]
#[command(name = "sleuth")]
#[command(author, version, about = "Autonomous AI investigations inside gdb")]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Debug a program in the interactive console
    Debug {
        /// Program to debug
        program: PathBuf,

        /// Core file to inspect post-mortem
        #[arg(long)]
        core: Option<PathBuf>,

        /// Arguments for the program
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Run one investigation and exit
    Investigate {
        /// Program to debug
        program: PathBuf,

        /// What to find out
        #[arg(long, short)]
        goal: String,

        /// Core file to inspect post-mortem
        #[arg(long)]
        core: Option<PathBuf>,

        /// gdb commands to run before the investigation (repeatable)
        #[arg(long = "setup", value_name = "CMD")]
        setup: Vec<String>,

        /// Override the configured turn limit
        #[arg(long)]
        max_turns: Option<usize>,

        /// Ask on the terminal before commands that need confirmation
        #[arg(long)]
        interactive: bool,

        /// Arguments for the program
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Initialize .sleuth directory
    Init,

    /// Show current configuration
    Config,

    /// List saved transcripts
    Transcripts,

    /// Show a transcript
    Show {
        /// Transcript ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Load config
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Debug {
            program,
            core,
            args,
        } => {
            signals::install_panic_handler();
            let target = Target {
                program: Some(program),
                args,
                core,
            };
            let transport = sleuth::transport::create_transport(&config)?;
            let mut session = start_gdb(&config, &target).await?;
            if !session.startup_output().trim().is_empty() {
                println!("{}", session.startup_output().trim_end());
            }

            let signal_handler = SignalHandler::new();
            signal_handler.install()?;

            Console::new(&config, &mut session, &*transport, &signal_handler)
                .run()
                .await?;

            session.shutdown().await?;
        }

        Commands::Investigate {
            program,
            goal,
            core,
            setup,
            max_turns,
            interactive,
            args,
        } => {
            let target = Target {
                program: Some(program),
                args,
                core,
            };
            let transport = sleuth::transport::create_transport(&config)?;
            let mut session = start_gdb(&config, &target).await?;

            let signal_handler = SignalHandler::new();
            signal_handler.install()?;

            let mut history = Vec::new();
            if !session.startup_output().trim().is_empty() {
                history.push(session.startup_output().to_string());
            }
            let executor = CommandExecutor::new(config.debugger.command_timeout);
            for command in &setup {
                info!("Setup: {}", command);
                let observation = executor.execute(&mut session, command).await.map_err(|e| {
                    sleuth::Error::Command(format!("setup command `{}` failed: {}", command, e))
                })?;
                history.push(format!("(gdb) {}\n{}", command, observation.output));
            }

            let confirmer = interactive::StdinConfirmer::new(interactive::console::stdin_lines());
            let options = InvestigationOptions {
                max_turns,
                unattended: !interactive,
                confirmer: interactive.then_some(&confirmer as &dyn sleuth::agent::Confirmer),
                cancel: Some(signal_handler.subscribe()),
                history,
            };

            let transcript =
                interactive::investigate(&config, &mut session, &*transport, &goal, options)
                    .await?;

            if let Err(e) = session.shutdown().await {
                warn!("gdb did not shut down cleanly: {}", e);
            }

            if transcript.status() != TranscriptStatus::Concluded {
                std::process::exit(UNCONCLUDED_EXIT_CODE);
            }
        }

        Commands::Init => {
            sleuth::config::init()?;
            info!("Initialized .sleuth directory");
        }

        Commands::Config => match toml::to_string_pretty(&config) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("Failed to serialize config: {}", e),
        },

        Commands::Transcripts => {
            let transcripts = transcript::list(&config.transcript_dir())?;
            if transcripts.is_empty() {
                println!("No transcripts in {}", config.transcript_dir().display());
            }
            for t in transcripts {
                println!(
                    "{} | {} | {} | {}/{} turns | {}",
                    t.id,
                    t.started_at.format("%Y-%m-%d %H:%M"),
                    t.status(),
                    t.turn_count,
                    t.max_turns,
                    t.goal
                );
            }
        }

        Commands::Show { id } => {
            let transcript = transcript::load(&config.transcript_dir(), &id)?;
            println!("{}", transcript);
        }
    }

    Ok(())
}

async fn start_gdb(config: &Config, target: &Target) -> Result<GdbSession> {
    info!("Starting {}", config.debugger.gdb.display());
    let session = GdbSession::spawn(&config.debugger, target).await?;
    // Fetch past the display limit so truncation is reported
    Ok(session.with_max_frames(config.context.max_frames.saturating_mul(4)))
}
