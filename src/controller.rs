//! Turn controller.
//!
//! The controller is the only writer of the world. Each round it sends TURN
//! to every leader, then applies intents one by one as they arrive until the
//! round deadline, restores the display glyphs and checks whether a single
//! team is left. Intents still queued when the deadline passes stay in the
//! channel and are applied in the next round.
//!
//! Shutdown always goes through the END cascade: leaders forward END to
//! their units and wait for them, and the controller keeps draining the
//! intent channel until every leader has exited so that no unit stays
//! blocked on a full channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::agent::LeaderLink;
use crate::board::{Action, Command, Intent, Position, SharedWorld, UnitKey};
use crate::config::SimConfig;
use crate::error::SimError;
use crate::resolve::{attack_path, resolve_intent, Resolution};

/// Upper bound on a single wait, so an interrupt is noticed mid-round.
const SIGNAL_POLL: Duration = Duration::from_millis(50);

/// Wait between drain attempts while leaders are shutting down.
const DRAIN_POLL: Duration = Duration::from_millis(5);

/// Cooperative interrupt flag shared with whoever may stop the battle.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    WaitingForRenderReady,
    Running,
    Finished,
}

/// Something observers of a battle may want to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BattleEvent {
    RoundStarted { round: u32 },
    /// Cells crossed by a resolved attack, attacker first.
    AttackTraced { attacker: UnitKey, path: Vec<Position> },
    UnitDestroyed { unit: UnitKey },
    Winner { team: usize },
}

/// State of the battle after a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Winner(usize),
    /// No team has a living unit left.
    Annihilated,
}

/// How a battle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BattleOutcome {
    pub winner: Option<usize>,
    pub rounds: u32,
    pub intents_applied: u64,
    pub units_destroyed: usize,
    /// The battle was stopped by a shutdown signal.
    pub interrupted: bool,
}

/// Drives rounds until a team wins, the round cap is hit or a shutdown is
/// requested.
pub struct TurnController {
    world: SharedWorld,
    leaders: Vec<LeaderLink>,
    intents: Receiver<Intent>,
    ready: Option<(Receiver<()>, Duration)>,
    events: Option<Sender<BattleEvent>>,
    shutdown: ShutdownSignal,
    state: ControllerState,
    round_duration: Duration,
    damage: u32,
    max_rounds: Option<u32>,
    height: usize,
    width: usize,
    round: u32,
    intents_applied: u64,
    units_destroyed: usize,
}

impl TurnController {
    /// Creates a controller over already spawned leaders.
    pub fn new(
        world: SharedWorld,
        leaders: Vec<LeaderLink>,
        intents: Receiver<Intent>,
        config: &SimConfig,
    ) -> Self {
        let (height, width) = {
            let w = world.read();
            (w.height(), w.width())
        };
        TurnController {
            world,
            leaders,
            intents,
            ready: None,
            events: None,
            shutdown: ShutdownSignal::new(),
            state: ControllerState::WaitingForRenderReady,
            round_duration: config.round_duration(),
            damage: config.attack_damage,
            max_rounds: config.max_rounds,
            height,
            width,
            round: 0,
            intents_applied: 0,
            units_destroyed: 0,
        }
    }

    /// Makes the first round wait for a readiness message, failing after
    /// `timeout`.
    pub fn with_ready(mut self, ready: Receiver<()>, timeout: Duration) -> Self {
        self.ready = Some((ready, timeout));
        self
    }

    pub fn with_events(mut self, events: Sender<BattleEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    /// Runs the whole battle, then shuts every worker down.
    pub fn run(&mut self) -> Result<BattleOutcome, SimError> {
        if let Err(err) = self.await_ready() {
            self.shutdown_workers();
            return Err(err);
        }
        self.state = ControllerState::Running;
        info!(leaders = self.leaders.len(), "battle started");

        let mut winner = None;
        let mut interrupted = false;
        loop {
            if self.shutdown.is_triggered() {
                interrupted = true;
                break;
            }
            if self.max_rounds.is_some_and(|cap| self.round >= cap) {
                info!(rounds = self.round, "round limit reached, no winner");
                break;
            }
            match self.play_round() {
                Verdict::Continue => {}
                Verdict::Winner(team) => {
                    winner = Some(team);
                    break;
                }
                Verdict::Annihilated => {
                    info!(round = self.round, "every team was destroyed");
                    break;
                }
            }
        }
        if interrupted {
            info!(round = self.round, "battle interrupted");
        }

        let panicked = self.shutdown_workers();
        if panicked > 0 {
            return Err(SimError::WorkerPanicked(panicked));
        }
        Ok(BattleOutcome {
            winner,
            rounds: self.round,
            intents_applied: self.intents_applied,
            units_destroyed: self.units_destroyed,
            interrupted,
        })
    }

    fn await_ready(&mut self) -> Result<(), SimError> {
        self.state = ControllerState::WaitingForRenderReady;
        let Some((ready, timeout)) = self.ready.take() else {
            return Ok(());
        };
        match ready.recv_timeout(timeout) {
            Ok(()) => {
                debug!("renderer ready");
                Ok(())
            }
            Err(_) => {
                warn!(?timeout, "renderer never became ready");
                Err(SimError::RendererNotReady(timeout))
            }
        }
    }

    /// Sleeps until `deadline` in short slices, returning early on interrupt.
    fn idle_until(&self, deadline: Instant) {
        while !self.shutdown.is_triggered() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::sleep(remaining.min(SIGNAL_POLL));
        }
    }

    /// Plays one round: TURN broadcast, timed intent drain, glyph restore and
    /// win check.
    pub fn play_round(&mut self) -> Verdict {
        self.round += 1;
        let round = self.round;
        let deadline = Instant::now() + self.round_duration;
        debug!(round, "round started");
        self.emit(BattleEvent::RoundStarted { round });

        for leader in &self.leaders {
            leader.send(Command::Turn);
        }

        let mut applied = 0usize;
        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.intents.recv_timeout((deadline - now).min(SIGNAL_POLL)) {
                Ok(intent) => {
                    self.apply(intent);
                    applied += 1;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    debug!(round, "no intent producers left");
                    self.idle_until(deadline);
                    break;
                }
            }
        }

        let alive = {
            let mut world = self.world.write();
            world.restore_symbols();
            world.alive_teams()
        };
        debug!(round, applied, alive_teams = alive.len(), "round finished");

        match alive.as_slice() {
            [] => Verdict::Annihilated,
            [team] => {
                info!(round, team = *team, "team wins");
                self.emit(BattleEvent::Winner { team: *team });
                Verdict::Winner(*team)
            }
            _ => Verdict::Continue,
        }
    }

    /// Applies one intent under write access and reports its effects.
    fn apply(&mut self, intent: Intent) -> Resolution {
        let resolution = {
            let mut world = self.world.write();
            resolve_intent(&mut world, &intent, self.damage)
        };
        self.intents_applied += 1;
        log_resolution(self.round, &intent, &resolution);

        if let Some((team, command)) = resolution.destroy_notice() {
            self.units_destroyed += 1;
            match self.leaders.iter().find(|l| l.team == team) {
                Some(leader) => leader.send(command),
                None => warn!(team, "destroyed unit has no leader"),
            }
            if let Resolution::Destroyed { target } = resolution {
                self.emit(BattleEvent::UnitDestroyed { unit: target });
            }
        }

        let landed = matches!(
            resolution,
            Resolution::Missed { .. } | Resolution::Damaged { .. } | Resolution::Destroyed { .. }
        );
        if intent.action == Action::Attack && landed && self.events.is_some() {
            let path = attack_path(intent.origin, intent.target, self.height, self.width);
            self.emit(BattleEvent::AttackTraced {
                attacker: intent.unit,
                path,
            });
        }
        resolution
    }

    fn emit(&mut self, event: BattleEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                debug!("event listener gone");
                self.events = None;
            }
        }
    }

    /// Stops every worker without playing a round.
    pub fn abort(&mut self) -> usize {
        self.shutdown_workers()
    }

    /// Sends END to every leader and waits for all of them to exit.
    /// Returns the number of workers that panicked.
    fn shutdown_workers(&mut self) -> usize {
        for leader in &self.leaders {
            leader.send(Command::End);
        }
        while !self.leaders.iter().all(LeaderLink::is_finished) {
            match self.intents.recv_timeout(DRAIN_POLL) {
                Ok(intent) => debug!(%intent, "discarding intent after END"),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        let panicked: usize = self.leaders.iter_mut().map(LeaderLink::join).sum();
        self.state = ControllerState::Finished;
        debug!(panicked, "all workers stopped");
        panicked
    }
}

fn log_resolution(round: u32, intent: &Intent, resolution: &Resolution) {
    let (team, unit) = (intent.unit.team, intent.unit.id);
    let (row, col) = (intent.target.row, intent.target.col);
    match *resolution {
        Resolution::Moved { from, .. } => {
            info!(round, team, unit, from_row = from.row, from_col = from.col, row, col, "moved")
        }
        Resolution::Blocked { occupant, .. } => {
            info!(round, team, unit, row, col, occupant_team = occupant.team, "move blocked")
        }
        Resolution::Missed { .. } => info!(round, team, unit, row, col, "attack missed"),
        Resolution::Damaged { target, health } => info!(
            round,
            team,
            unit,
            row,
            col,
            target_team = target.team,
            target_unit = target.id,
            health,
            "attack hit"
        ),
        Resolution::Destroyed { target } => info!(
            round,
            team,
            unit,
            row,
            col,
            target_team = target.team,
            target_unit = target.id,
            "unit destroyed"
        ),
        Resolution::Passed => debug!(round, team, unit, "passed"),
        Resolution::Ignored(reason) => {
            debug!(round, team, unit, ?reason, %intent, "intent ignored")
        }
    }
}
