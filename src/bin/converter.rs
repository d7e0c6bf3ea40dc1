//! converter - translates SIS3316 NGM binary files into event files
//!
//! Usage:
//!   converter run1.bin run2.bin                 # Convert with defaults
//!   converter -f config.toml -o ./data *.bin    # Config file + output dir

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sis3316_rs::common::ByteSource;
use sis3316_rs::config::{Config, DaqConfig};
use sis3316_rs::converter::{ConvertSummary, Converter};
use sis3316_rs::sink::FileSink;

#[derive(Parser)]
#[command(name = "converter")]
#[command(about = "Convert SIS3316 NGM binary files to sorted event files")]
#[command(version)]
struct Cli {
    /// Input .bin files to convert
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Path to configuration file
    #[arg(short = 'f', long = "config")]
    config_file: Option<String>,

    /// Output directory for converted files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Override number of digitizer cards
    #[arg(long)]
    cards: Option<u16>,

    /// Override channels per card
    #[arg(long)]
    channels: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sis3316_rs=info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config_file {
        Some(path) => Config::load(path).with_context(|| format!("loading config {}", path))?,
        None => Config::default(),
    };
    if let Some(cards) = cli.cards {
        config.daq.cards = cards;
    }
    if let Some(channels) = cli.channels {
        config.daq.channels_per_card = channels;
    }
    config.validate()?;

    let output_dir = cli
        .output
        .unwrap_or_else(|| PathBuf::from(&config.output.directory));

    let mut failures = 0usize;
    for input in &cli.inputs {
        match convert_file(input, &output_dir, &config.daq) {
            Ok(summary) => {
                println!(
                    "{}: {} events in {:.1} s ({} spills, {} dropped)",
                    input.display(),
                    summary.events,
                    summary.elapsed.as_secs_f64(),
                    summary.spills,
                    summary.spills_dropped
                );
            }
            Err(err) => {
                warn!(input = %input.display(), error = %err, "conversion failed");
                eprintln!("Error converting {}: {:#}", input.display(), err);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} files failed", failures, cli.inputs.len());
    }
    Ok(())
}

fn convert_file(input: &Path, output_dir: &Path, daq: &DaqConfig) -> anyhow::Result<ConvertSummary> {
    // Wrong extension means the user almost certainly passed the wrong file
    if input.extension().and_then(|e| e.to_str()) != Some("bin") {
        bail!("input file {} does not end in .bin", input.display());
    }

    let stem = input
        .file_stem()
        .context("input path has no file name")?
        .to_string_lossy();
    let output_path = output_dir.join(format!("{}.evt", stem));

    info!(input = %input.display(), output = %output_path.display(), "converting");

    let mut src = ByteSource::open(input).with_context(|| format!("opening {}", input.display()))?;

    let out_file = File::create(&output_path)
        .with_context(|| format!("creating {}", output_path.display()))?;
    let mut sink = FileSink::new(BufWriter::with_capacity(64 * 1024, out_file))?;

    let summary = Converter::new(daq).convert(&mut src, &mut sink)?;
    sink.finish()?;

    Ok(summary)
}
