//! Skirmish: runs one battle and draws it on stdout.
//!
//! Frames go to stdout, logs to stderr (`RUST_LOG`, default `info`). Ctrl-C
//! stops the battle through the regular END cascade.

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use skirmish::battle::run_battle;
use skirmish::config::ConfigOverrides;
use skirmish::controller::ShutdownSignal;
use skirmish::monitor::{FrameSink, TextSink};
use tracing::info;

/// Concurrent team battle simulator
#[derive(Parser, Debug)]
#[command(name = "skirmish")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Do not draw frames
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = args.overrides.resolve().context("invalid configuration")?;
    info!(
        height = config.grid_height,
        width = config.grid_width,
        teams = config.teams,
        units = config.units_per_team,
        round_ms = config.round_duration_ms,
        "starting battle"
    );

    let shutdown = ShutdownSignal::new();
    let handler_signal = shutdown.clone();
    ctrlc::set_handler(move || handler_signal.trigger())
        .context("failed to install interrupt handler")?;

    let sink: Option<Box<dyn FrameSink>> = if args.quiet {
        None
    } else {
        Some(Box::new(TextSink::new(io::stdout())))
    };
    let record = run_battle(&config, 0, &shutdown, sink)?;

    match record.winner_glyph {
        Some(glyph) => println!("Team {} wins after {} rounds", glyph, record.rounds),
        None if record.interrupted => println!("Battle interrupted after {} rounds", record.rounds),
        None => println!("No winner after {} rounds", record.rounds),
    }
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
