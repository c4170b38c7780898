mod detector;
mod loopback;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use facecall_client::{CaptureDevice, select_capture_format};
use facecall_core::IceServerConfig;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "facecall")]
#[command(about = "Peer-to-peer video calls with live face-landmark overlay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call yourself: a host and a guest negotiate in-process and stream
    /// synthetic camera frames through the landmark pipeline
    Loopback {
        /// Seconds to keep the call up once connected
        #[arg(short, long, default_value_t = 5)]
        duration: u64,

        #[arg(long, default_value_t = 30)]
        fps: u32,

        #[arg(long, default_value_t = 640)]
        width: u32,

        #[arg(long, default_value_t = 480)]
        height: u32,

        /// Use the default public STUN servers instead of host candidates only
        #[arg(long)]
        stun: bool,

        /// Extra ICE server URL (repeatable)
        #[arg(long = "ice-server")]
        ice_servers: Vec<String>,

        /// Route call audio to the loudspeaker
        #[arg(long)]
        speaker: bool,
    },

    /// Pick the capture format from a JSON list of camera devices
    SelectFormat {
        /// File holding a JSON array of capture devices
        devices: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("facecall=info,facecall_client=info,webrtc=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Loopback {
            duration,
            fps,
            width,
            height,
            stun,
            ice_servers,
            speaker,
        } => {
            let mut servers = if stun {
                facecall_core::utils::default_ice_servers()
            } else {
                Vec::new()
            };
            if !ice_servers.is_empty() {
                servers.push(IceServerConfig::stun(ice_servers));
            }

            let options = loopback::LoopbackOptions {
                duration_secs: duration,
                fps,
                width,
                height,
                ice_servers: servers,
                speaker,
            };
            loopback::run(options).await?;
        }
        Commands::SelectFormat { devices } => {
            let raw = fs::read_to_string(&devices)
                .with_context(|| format!("Failed to read {}", devices.display()))?;
            let devices: Vec<CaptureDevice> =
                serde_json::from_str(&raw).context("Invalid device list")?;

            let selection = select_capture_format(&devices)?;
            println!(
                "{} {} {}x{} @ {} fps",
                "📷".green(),
                selection.device_id.bold(),
                selection.format.width,
                selection.format.height,
                selection.fps
            );
        }
    }

    Ok(())
}
