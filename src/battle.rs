//! Battle wiring and batch runs.
//!
//! [`run_battle`] builds a world, spawns one leader thread per team (each
//! with its unit threads), optionally attaches a monitor, and drives the
//! turn controller to the end. [`run_battles`] plays many independent
//! battles, concurrently on a rayon pool when more than one thread is
//! requested, and reports each finished battle through a callback.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::agent::{spawn_leader, LeaderLink};
use crate::board::{SharedWorld, World};
use crate::config::SimConfig;
use crate::controller::{ShutdownSignal, TurnController};
use crate::error::SimError;
use crate::monitor::{FrameSink, Monitor};

/// Summary of one finished battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BattleRecord {
    pub battle_id: usize,
    pub seed: u64,
    /// Winning team, `None` for a draw or an interrupted battle.
    pub winner: Option<usize>,
    /// Display glyph of the winner.
    pub winner_glyph: Option<char>,
    pub rounds: u32,
    pub intents_applied: u64,
    pub units_destroyed: usize,
    pub interrupted: bool,
    /// Living units per team at the end.
    pub survivors: Vec<usize>,
    pub frames: u64,
    pub elapsed_ms: u64,
    /// Final grid, one string per row.
    pub grid: Vec<String>,
}

/// Plays one battle to completion.
///
/// With a `sink`, a monitor thread draws frames into it and the controller
/// waits for the monitor to be ready before the first round.
pub fn run_battle(
    config: &SimConfig,
    battle_id: usize,
    shutdown: &ShutdownSignal,
    sink: Option<Box<dyn FrameSink>>,
) -> Result<BattleRecord, SimError> {
    config.validate()?;
    let start = Instant::now();

    let mut rng = if config.seed != 0 {
        SmallRng::seed_from_u64(config.seed)
    } else {
        SmallRng::from_entropy()
    };
    let world = SharedWorld::new(World::generate(config, &mut rng));
    let (intent_tx, intent_rx) = mpsc::sync_channel(config.intent_capacity);

    let mut leaders: Vec<LeaderLink> = Vec::with_capacity(config.teams);
    for team in 0..config.teams {
        match spawn_leader(team, &world, config, &intent_tx) {
            Ok(link) => leaders.push(link),
            Err(err) => {
                warn!(battle = battle_id, team, %err, "bootstrap failed, stopping spawned workers");
                drop(intent_tx);
                TurnController::new(world, leaders, intent_rx, config).abort();
                return Err(err);
            }
        }
    }
    drop(intent_tx);

    let mut controller = TurnController::new(world.clone(), leaders, intent_rx, config)
        .with_shutdown(shutdown.clone());
    let mut monitor = None;
    if let Some(sink) = sink {
        let (events_tx, events_rx) = mpsc::channel();
        match Monitor::spawn(world.clone(), config.render_interval(), sink, Some(events_rx)) {
            Ok((handle, ready)) => {
                controller = controller
                    .with_ready(ready, config.ready_timeout())
                    .with_events(events_tx);
                monitor = Some(handle);
            }
            Err(err) => {
                controller.abort();
                return Err(err);
            }
        }
    }

    let outcome = controller.run();
    let frames = monitor.as_mut().map_or(0, Monitor::stop);
    let outcome = outcome?;

    let world = world.read();
    for violation in world.check_invariants() {
        warn!(battle = battle_id, %violation, "world invariant violated");
    }
    let record = BattleRecord {
        battle_id,
        seed: config.seed,
        winner: outcome.winner,
        winner_glyph: outcome.winner.and_then(|t| world.team_glyph(t)),
        rounds: outcome.rounds,
        intents_applied: outcome.intents_applied,
        units_destroyed: outcome.units_destroyed,
        interrupted: outcome.interrupted,
        survivors: (0..world.teams()).map(|t| world.alive_count(t)).collect(),
        frames,
        elapsed_ms: start.elapsed().as_millis() as u64,
        grid: world
            .symbols()
            .collect::<Vec<char>>()
            .chunks(world.width())
            .map(|row| row.iter().collect())
            .collect(),
    };
    Ok(record)
}

/// Seed for the `index`-th battle of a batch; 0 stays 0 (entropy).
pub fn battle_seed(base: u64, index: usize) -> u64 {
    if base == 0 {
        0
    } else {
        base.wrapping_add(index as u64).max(1)
    }
}

/// Runs `count` battles and returns every record, in completion order.
pub fn run_battles(
    config: &SimConfig,
    count: usize,
    threads: usize,
    shutdown: &ShutdownSignal,
) -> Result<Vec<BattleRecord>, SimError> {
    let mut records = Vec::with_capacity(count);
    run_battles_with_callback(config, count, threads, shutdown, |record| records.push(record))?;
    Ok(records)
}

/// Runs `count` battles, calling `on_record` as each one finishes.
///
/// Battles already running when one fails are played to the end; the first
/// error is returned afterwards.
pub fn run_battles_with_callback<F>(
    config: &SimConfig,
    count: usize,
    threads: usize,
    shutdown: &ShutdownSignal,
    mut on_record: F,
) -> Result<(), SimError>
where
    F: FnMut(BattleRecord) + Send,
{
    config.validate()?;
    if threads <= 1 {
        for index in 0..count {
            if shutdown.is_triggered() {
                break;
            }
            let battle_config = SimConfig {
                seed: battle_seed(config.seed, index),
                ..config.clone()
            };
            let record = run_battle(&battle_config, index, shutdown, None)?;
            log_record(&record, index + 1, count);
            on_record(record);
        }
        return Ok(());
    }

    use rayon::prelude::*;

    let completed = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<Result<BattleRecord, SimError>>();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|err| SimError::Spawn {
            name: "battle-pool".to_string(),
            source: std::io::Error::other(err),
        })?;

    let mut first_error = None;
    std::thread::scope(|scope| {
        scope.spawn(|| {
            pool.install(|| {
                (0..count).into_par_iter().for_each_with(tx, |tx, index| {
                    if shutdown.is_triggered() {
                        return;
                    }
                    let battle_config = SimConfig {
                        seed: battle_seed(config.seed, index),
                        ..config.clone()
                    };
                    let result = run_battle(&battle_config, index, shutdown, None);
                    if let Ok(record) = &result {
                        let n = completed.fetch_add(1, Ordering::Relaxed) + 1;
                        log_record(record, n, count);
                    }
                    let _ = tx.send(result);
                });
            });
        });

        for result in rx {
            match result {
                Ok(record) => on_record(record),
                Err(err) => {
                    warn!(%err, "battle failed");
                    first_error.get_or_insert(err);
                }
            }
        }
    });

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn log_record(record: &BattleRecord, done: usize, count: usize) {
    match record.winner_glyph {
        Some(glyph) => info!(
            battle = record.battle_id,
            done,
            count,
            winner = %glyph,
            rounds = record.rounds,
            elapsed_ms = record.elapsed_ms,
            "battle finished"
        ),
        None => info!(
            battle = record.battle_id,
            done,
            count,
            rounds = record.rounds,
            interrupted = record.interrupted,
            "battle finished without a winner"
        ),
    }
}

/// Writes records as JSON lines.
pub fn write_jsonl<W: Write>(records: &[BattleRecord], out: &mut W) -> std::io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut *out, record)?;
        writeln!(out)?;
    }
    out.flush()
}

/// Aggregate results of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub battles: usize,
    /// Wins per team index.
    pub wins: Vec<usize>,
    pub draws: usize,
    pub interrupted: usize,
    pub avg_rounds: f64,
}

pub fn summarize(records: &[BattleRecord], teams: usize) -> BatchSummary {
    let mut summary = BatchSummary {
        battles: records.len(),
        wins: vec![0; teams],
        ..BatchSummary::default()
    };
    let mut total_rounds = 0u64;
    for record in records {
        total_rounds += u64::from(record.rounds);
        if record.interrupted {
            summary.interrupted += 1;
        }
        match record.winner {
            Some(team) if team < teams => summary.wins[team] += 1,
            Some(_) => {}
            None if !record.interrupted => summary.draws += 1,
            None => {}
        }
    }
    summary.avg_rounds = total_rounds as f64 / records.len().max(1) as f64;
    summary
}

/// Logs a batch summary.
pub fn log_summary(summary: &BatchSummary, glyphs: &[char]) {
    info!(
        battles = summary.battles,
        draws = summary.draws,
        interrupted = summary.interrupted,
        avg_rounds = summary.avg_rounds,
        "batch finished"
    );
    for (team, wins) in summary.wins.iter().enumerate() {
        let pct = 100.0 * *wins as f64 / summary.battles.max(1) as f64;
        let glyph = glyphs.get(team).copied().unwrap_or('?');
        info!(team, glyph = %glyph, wins = *wins, pct = %format!("{:.1}", pct), "team results");
    }
}
