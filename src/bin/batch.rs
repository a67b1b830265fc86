//! Batch runner: plays many battles without drawing and writes one JSON
//! record per battle.
//!
//! Usage:
//!   cargo run --release --bin batch -- --battles 20 --threads 4 --round-ms 20

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use skirmish::battle::{self, log_summary, summarize};
use skirmish::config::ConfigOverrides;
use skirmish::controller::ShutdownSignal;
use tracing::info;

/// Runs many skirmish battles and records the results as JSONL
#[derive(Parser, Debug)]
#[command(name = "batch")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Number of battles to play
    #[arg(short, long, default_value = "10")]
    battles: usize,

    /// Battles played at the same time
    #[arg(long, default_value = "4")]
    threads: usize,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = args.overrides.resolve().context("invalid configuration")?;
    let shutdown = ShutdownSignal::new();
    let handler_signal = shutdown.clone();
    ctrlc::set_handler(move || handler_signal.trigger())
        .context("failed to install interrupt handler")?;

    info!(battles = args.battles, threads = args.threads, "starting batch");
    let start = Instant::now();
    let records = battle::run_battles(&config, args.battles, args.threads, &shutdown)?;
    info!(
        battles = records.len(),
        elapsed_s = start.elapsed().as_secs_f64(),
        "all battles finished"
    );

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            battle::write_jsonl(&records, &mut writer)?;
            info!(records = records.len(), path = %path.display(), "wrote records");
        }
        None => {
            let stdout = io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            battle::write_jsonl(&records, &mut writer)?;
            writer.flush()?;
        }
    }

    log_summary(&summarize(&records, config.teams), &config.glyphs());
    Ok(())
}
