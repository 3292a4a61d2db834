use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use emg_rover::fixtures::{read_wav, ReplayProcessor};
use emg_rover::{AppConfig, AppContext, Calibration};

#[derive(Parser, Debug)]
#[command(
    name = "emg_rover",
    about = "EMG effort-to-motion pipeline: capture, calibrate, and drive a rover over TCP"
)]
struct Cli {
    /// Override the config file path (defaults to assets/emg_rover.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Live capture from the default input device, effort snapshots on stdout
    Run {
        /// Connect the TCP state publisher at startup
        #[arg(long)]
        connect: bool,
        /// Start from a random heading instead of theta = 0
        #[arg(long)]
        random_heading: bool,
    },
    /// Drive a WAV recording through the offline pipeline, JSON lines on stdout
    Replay {
        /// Mono WAV of raw EMG
        wav: PathBuf,
        /// Derive the MVC calibration from this recording first
        #[arg(long)]
        calibrate_from: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Run {
            connect,
            random_heading,
        } => run_live(config, connect, random_heading).await,
        Commands::Replay {
            wav,
            calibrate_from,
        } => run_replay(config, &wav, calibrate_from.as_deref()),
    }
}

async fn run_live(config: AppConfig, connect: bool, random_heading: bool) -> Result<ExitCode> {
    let ctx = AppContext::new(config);

    if random_heading {
        ctx.reset_pose_random_heading()?;
    }

    if connect {
        // Degraded mode is acceptable; the control loop runs regardless.
        if let Err(err) = ctx.connect_output() {
            tracing::warn!("Publisher unavailable, running disconnected: {}", err);
        }
    }

    ctx.start().context("starting capture session")?;
    let mut updates = ctx.effort_stream().await;

    loop {
        tokio::select! {
            update = updates.next() => {
                match update {
                    Some(update) => println!("{}", serde_json::to_string(&update)?),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received, stopping");
                break;
            }
        }
    }

    ctx.stop().context("stopping capture session")?;
    Ok(ExitCode::from(0))
}

fn run_replay(
    config: AppConfig,
    wav: &std::path::Path,
    calibrate_from: Option<&std::path::Path>,
) -> Result<ExitCode> {
    let processor = ReplayProcessor::new(config);

    let calibration = match calibrate_from {
        Some(path) => {
            let (samples, sample_rate) = read_wav(path)?;
            processor
                .calibration_from(&samples, sample_rate)
                .with_context(|| format!("calibrating from {}", path.display()))?
        }
        None => Calibration::new(),
    };

    let (samples, sample_rate) = read_wav(wav)?;
    let updates = processor
        .run(&samples, sample_rate, &calibration)
        .with_context(|| format!("replaying {}", wav.display()))?;

    for update in updates {
        println!("{}", serde_json::to_string(&update)?);
    }

    Ok(ExitCode::from(0))
}
