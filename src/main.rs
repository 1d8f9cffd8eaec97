//! Command-line harness
//!
//! Dispatches on file extension: images get one probability on stdout,
//! videos get one scored JPEG per frame written next to the input.

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use nsfwscan::config::Config;
use nsfwscan::engine::ensemble::Ensemble;
use nsfwscan::scan::{self, InputKind};

#[derive(Parser)]
#[command(
    name = "nsfwscan",
    about = "NSFW probability scoring for images and videos",
    version
)]
struct Cli {
    /// Image or video file to scan.
    input: std::path::PathBuf,

    /// Path to a TOML configuration file.
    #[arg(long, default_value_t = Config::default_path().to_string())]
    config: String,
}

fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        info!("using default config ({e})");
        Config::default()
    });

    // Reject unsupported inputs before the expensive model load.
    let kind = scan::classify(&cli.input)?;
    let mut ensemble = Ensemble::from_config(&config)?;

    match kind {
        InputKind::Image => {
            let probability = scan::scan_image(&mut ensemble, &cli.input)?;
            println!("NSFW probability: {probability:.2}");
        }
        InputKind::Video => {
            let report = scan::scan_video(&mut ensemble, &config, &cli.input)?;
            println!(
                "{} frame(s) scored, {} skipped",
                report.processed, report.skipped
            );
        }
    }

    Ok(())
}
