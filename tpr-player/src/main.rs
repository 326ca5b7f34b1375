//! Session replay player (tpr-player) - Main entry point
//!
//! Plays a recording directory (or an explicit list of data files) and
//! prints operator messages and progress to the console. Playback is
//! controlled with single-letter commands on stdin.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tpr_common::config::{
    resolve_config_path, resolve_recording_dir, CONFIG_ENV_VAR, RECORDING_DIR_ENV_VAR,
};
use tpr_common::human_time::format_progress;
use tpr_player::config::PlayerConfig;
use tpr_player::{Notification, PlaybackSession, Recording};

/// Command-line arguments for tpr-player
#[derive(Parser, Debug)]
#[command(name = "tpr-player")]
#[command(about = "Replay captured remote-session recordings")]
#[command(version)]
struct Args {
    /// Recording directory containing tp-rdp.tpr and tp-rdp-N.tpd files
    recording_dir: Option<PathBuf>,

    /// Explicit data files in play order (instead of a directory)
    #[arg(long, num_args = 1..)]
    files: Vec<PathBuf>,

    /// Playback speed factor (overrides config)
    #[arg(short, long)]
    speed: Option<f64>,

    /// Collapse idle gaps longer than the idle cap
    #[arg(long)]
    skip_idle: bool,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Operator command read from stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlCommand {
    Pause,
    Resume,
    Stop,
    Faster,
    Slower,
    ToggleSkipIdle,
}

impl ControlCommand {
    fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "p" | "pause" => Some(ControlCommand::Pause),
            "r" | "resume" => Some(ControlCommand::Resume),
            "s" | "q" | "stop" | "quit" => Some(ControlCommand::Stop),
            "+" => Some(ControlCommand::Faster),
            "-" => Some(ControlCommand::Slower),
            "i" | "idle" => Some(ControlCommand::ToggleSkipIdle),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let mut config = PlayerConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing (stderr, so stdout stays with playback output)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tpr_player={}", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(speed) = args.speed {
        config.playback.speed = speed;
    }
    if args.skip_idle {
        config.playback.skip_idle = true;
    }
    let options = config.session_options().context("Invalid playback settings")?;

    let recording = if args.files.is_empty() {
        let dir = resolve_recording_dir(
            args.recording_dir.as_deref(),
            RECORDING_DIR_ENV_VAR,
            config.recording_dir.as_deref(),
        )?;
        info!("Recording directory: {}", dir.display());
        Recording::open(&dir).context("Failed to open recording")?
    } else {
        Recording::from_files(args.files.clone())
    };
    let total_ms = recording.total_ms();

    let (tx, mut notifications) = mpsc::unbounded_channel::<Notification>();
    let mut session =
        PlaybackSession::new(recording, tx, options).context("Failed to create playback session")?;
    session.start().context("Failed to start playback")?;

    let (cmd_tx, mut commands) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match ControlCommand::parse(&line) {
                Some(cmd) => {
                    if cmd_tx.send(cmd).await.is_err() {
                        break;
                    }
                }
                None => eprintln!("commands: p(ause) r(esume) s(top) + - i(dle skip)"),
            }
        }
    });

    let mut packets: u64 = 0;
    loop {
        tokio::select! {
            notification = notifications.recv() => {
                match notification {
                    Some(Notification::Data(packet)) => {
                        packets += 1;
                        if packet.is_keyframe() {
                            debug!("Key frame at {}ms", packet.offset_ms);
                        }
                    }
                    Some(Notification::Message(text)) => println!("{}", text),
                    Some(Notification::Error(text)) => eprintln!("error: {}", text),
                    Some(Notification::Progress(ms)) => {
                        println!("[{}]", format_progress(ms, total_ms));
                    }
                    Some(Notification::End) | None => break,
                }
            }
            Some(cmd) = commands.recv() => {
                apply_command(&session, cmd);
                if cmd == ControlCommand::Stop {
                    break;
                }
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping playback");
                break;
            }
        }
    }

    // stop() joins both worker threads
    let report = tokio::task::spawn_blocking(move || session.stop())
        .await
        .context("Playback shutdown task failed")??;

    info!(
        "Playback {}: {} packet(s) presented",
        report.state, packets
    );
    Ok(())
}

fn apply_command(session: &PlaybackSession, cmd: ControlCommand) {
    match cmd {
        ControlCommand::Pause => session.pause(),
        ControlCommand::Resume => session.resume(),
        ControlCommand::Stop => {}
        ControlCommand::Faster | ControlCommand::Slower => {
            let speed = if cmd == ControlCommand::Faster {
                session.speed() * 2.0
            } else {
                session.speed() / 2.0
            };
            match session.set_speed(speed) {
                Ok(()) => println!("speed: {}x", speed),
                Err(e) => warn!("{}", e),
            }
        }
        ControlCommand::ToggleSkipIdle => {
            let skip_idle = !session.skip_idle();
            session.set_skip_idle(skip_idle);
            println!("skip idle: {}", if skip_idle { "on" } else { "off" });
        }
    }
}
