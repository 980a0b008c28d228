//! Application entry point for the HUD agent.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse the command line and load [`AppConfig`] (default on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. `hud relay`: serve the HTTP relay until Ctrl-C.
//!    `hud session`: wire camera, microphone, speech and backends into a
//!    [`Session`], then read commands from stdin until `quit` or Ctrl-C.
//!    `hud config`: print (and optionally persist) the effective settings.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use hud_agent::{
    announce::{Announcer, CommandSpeechSink, SilentSpeechSink, SpeechSink},
    client::HttpBackend,
    config::AppConfig,
    device::{camera_from_config, CpalMicrophone, ResourceBroker},
    recognize::{HttpRecognizer, SpeechRecognizer},
    server,
    session::Session,
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "hud", version, about = "Assistive HUD session and relay")]
struct Cli {
    /// Settings file (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP relay (search, gesture, price oracle).
    Relay {
        /// Override the configured port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run an interactive HUD session driven from stdin.
    Session,
    /// Print the effective settings as TOML.
    Config {
        /// Also write them to the settings file.
        #[arg(long)]
        write: bool,
    },
}

const HELP: &str = "commands: voice | abort | gesture | stop | describe | status | quit";

// ---------------------------------------------------------------------------
// Session wiring
// ---------------------------------------------------------------------------

fn build_session(config: &AppConfig) -> Session {
    let broker = ResourceBroker::new(
        camera_from_config(&config.camera),
        Arc::new(CpalMicrophone::new(config.speech.listen_secs)),
    );

    let sink: Arc<dyn SpeechSink> = match CommandSpeechSink::from_config(&config.speech) {
        Some(sink) => Arc::new(sink),
        None => {
            log::info!("No TTS command configured; announcements are text-only");
            Arc::new(SilentSpeechSink)
        }
    };

    let recognizer: Option<Arc<dyn SpeechRecognizer>> = if config.speech.recognition_enabled {
        Some(Arc::new(HttpRecognizer::from_config(&config.speech)))
    } else {
        log::info!("Speech recognition disabled in config");
        None
    };

    Session::new(
        config.session.clone(),
        broker,
        Announcer::new(sink),
        Arc::new(HttpBackend::from_config(&config.session)),
        recognizer,
    )
}

/// Long-running controllers are spawned so `abort` and `stop` stay
/// responsive while they run.
async fn dispatch(session: &Session, line: &str) -> bool {
    match line {
        "voice" => {
            let s = session.clone();
            tokio::spawn(async move { s.start_voice().await });
        }
        "abort" => session.abort_voice(),
        "gesture" => {
            let s = session.clone();
            tokio::spawn(async move { s.start_gesture().await });
        }
        "stop" => session.stop_gesture().await,
        "describe" => {
            let s = session.clone();
            tokio::spawn(async move { s.describe_scene().await });
        }
        "status" => println!(
            "status: {} | voice: {} | gesture: {} ({} ticks)",
            session.status(),
            session.voice_phase().label(),
            if session.is_gesture_active() { "on" } else { "off" },
            session.gesture_ticks()
        ),
        "quit" | "exit" => return false,
        "" => {}
        other => println!("unknown command {other:?}; {HELP}"),
    }
    true
}

async fn run_session(config: AppConfig) -> Result<()> {
    let session = build_session(&config);

    let mut updates = session.subscribe();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let text = updates.borrow_and_update().clone();
            println!("» {text}");
        }
    });

    println!("» {}", session.status());
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if !dispatch(&session, line.trim()).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    log::info!("Shutting down session");
    session.shutdown().await;
    printer.abort();
    Ok(())
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("HUD agent starting up");

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        }),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    match cli.command {
        Command::Relay { port } => {
            if let Some(port) = port {
                config.relay.port = port;
            }
            runtime.block_on(server::serve(&config))
        }
        Command::Session => runtime.block_on(run_session(config)),
        Command::Config { write } => {
            print!("{}", toml::to_string_pretty(&config)?);
            if write {
                match &cli.config {
                    Some(path) => config.save_to(path)?,
                    None => config.save()?,
                }
                log::info!("Settings written");
            }
            Ok(())
        }
    }
}
