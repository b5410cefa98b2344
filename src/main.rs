//! # Padstream
//!
//! Print a joystick's button, D-pad and stick events, one line per event.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

use padstream::backend::evdev::EvdevBackend;
use padstream::config::Config;
use padstream::normalizer::{has_device, Session};
use padstream::output::{format_event, OutputFormat};

/// Exit status when no joystick is connected
const EXIT_NO_DEVICE: u8 = 2;

/// Message shown when no joystick is connected
const NO_DEVICE_MESSAGE: &str = "No joystick found.";

#[derive(Debug, Parser)]
#[command(name = "padstream", version, about = "Stream normalized joystick events to stdout")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit left stick events
    #[arg(long)]
    left: bool,

    /// Emit right stick events
    #[arg(long)]
    right: bool,

    /// Left stick axis indices
    #[arg(long, value_name = "X,Y", value_parser = parse_axes)]
    left_axes: Option<[usize; 2]>,

    /// Right stick axis indices, (2,3) or (3,4) depending on the controller
    #[arg(long, value_name = "X,Y", value_parser = parse_axes)]
    right_axes: Option<[usize; 2]>,

    /// Rest between poll iterations in milliseconds
    #[arg(long, value_name = "MS")]
    rest_ms: Option<u64>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Command-line flags override the file
    fn apply(&self, config: &mut Config) {
        if self.left {
            config.left_stick.enabled = true;
        }
        if self.right {
            config.right_stick.enabled = true;
        }
        if let Some(axes) = self.left_axes {
            config.left_stick.axes = axes;
        }
        if let Some(axes) = self.right_axes {
            config.right_stick.axes = axes;
        }
        if let Some(rest_ms) = self.rest_ms {
            config.stream.rest_ms = rest_ms;
        }
    }

    fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Parse an axis pair written as `X,Y`
fn parse_axes(value: &str) -> std::result::Result<[usize; 2], String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{}'", value))?;
    let x = x.trim().parse::<usize>().map_err(|e| format!("invalid x axis '{}': {}", x, e))?;
    let y = y.trim().parse::<usize>().map_err(|e| format!("invalid y axis '{}': {}", y, e))?;
    Ok([x, y])
}

/// Main entry point for Padstream
///
/// 1. Set up logging on stderr and load configuration
/// 2. Check that a joystick is present, exit with status 2 if not
/// 3. Pull event batches until Ctrl+C, printing each event
/// 4. Close the session, which releases the device
///
/// Backend errors during streaming end the program with the backend's message.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so stdout only carries events
    let (log_writer, _log_guard) = tracing_appender::non_blocking(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(log_writer)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    cli.apply(&mut config);
    config.validate()?;
    debug!("Configuration: {:?}", config);

    info!("Padstream v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut backend = EvdevBackend::new()?;
    if !has_device(&mut backend)? {
        eprintln!("{}", NO_DEVICE_MESSAGE);
        return Ok(ExitCode::from(EXIT_NO_DEVICE));
    }

    let mut session = match Session::start(backend, config.session_config()) {
        Ok(session) => session,
        Err(e) if e.is_no_device() => {
            eprintln!("{}", NO_DEVICE_MESSAGE);
            return Ok(ExitCode::from(EXIT_NO_DEVICE));
        }
        Err(e) => return Err(e.into()),
    };

    let format = cli.output_format();
    let mut stdout = std::io::stdout().lock();
    let mut event_count: u64 = 0;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Streaming events from {}. Press Ctrl+C to exit", session.device().name);

    loop {
        tokio::select! {
            batch = session.next_batch() => {
                let batch = batch?;
                if batch.is_empty() {
                    continue;
                }
                let now = Utc::now();
                for event in &batch {
                    writeln!(stdout, "{}", format_event(event, format, now))?;
                }
                stdout.flush()?;
                event_count += batch.len() as u64;
            }

            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    session.close();
    info!("Total events: {}", event_count);

    Ok(ExitCode::SUCCESS)
}
