// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use qr_checkin::QualityTier;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "qr-checkin")]
#[command(about = "Scan check-in QR codes from a camera")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/qr-checkin/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List,

    /// Scan one code from the camera
    Scan {
        /// Device id to use (from 'qr-checkin list')
        #[arg(short, long)]
        device: Option<String>,

        /// Quality tier: low, medium or high
        #[arg(short, long)]
        quality: Option<QualityTier>,

        /// Context (attraction) id attached to the report
        #[arg(short, long)]
        context: Option<u64>,

        /// Switch the torch on while scanning
        #[arg(short, long)]
        torch: bool,

        /// Scan from image files instead of a camera
        #[arg(short, long = "image")]
        images: Vec<PathBuf>,
    },

    /// Decode a QR code from an image file
    Decode {
        /// Image file
        image: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=qr_checkin=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = qr_checkin::ScannerConfig::load_or_default(cli.config.as_deref());

    match cli.command {
        Commands::List => cli::list_cameras(config),
        Commands::Scan {
            device,
            quality,
            context,
            torch,
            images,
        } => cli::scan(
            config,
            cli::ScanArgs {
                device,
                quality,
                context,
                torch,
                images,
            },
        ),
        Commands::Decode { image } => cli::decode_image(config, &image),
    }
}
