//! Team leaders.
//!
//! A leader owns the command channels of its unit agents. On every TURN it
//! runs a fixed number of dispatches, each a coin flip between MOVE and
//! ATTACK broadcast to all of its living units. DESTROY notices from the
//! controller are forwarded to the named unit, and END is passed down to
//! every unit before the leader waits for them to exit.

use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use super::unit::{Tactics, UnitAgent};
use crate::board::{Command, Intent, SharedWorld, UnitKey};
use crate::config::SimConfig;
use crate::error::SimError;

/// The leader's end of one unit agent.
#[derive(Debug)]
pub struct UnitLink {
    pub id: usize,
    commands: Sender<Command>,
    handle: Option<JoinHandle<()>>,
    retired: bool,
}

impl UnitLink {
    /// Wraps a command sender and an optional worker handle.
    pub fn new(id: usize, commands: Sender<Command>, handle: Option<JoinHandle<()>>) -> Self {
        UnitLink {
            id,
            commands,
            handle,
            retired: false,
        }
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Sends a command; a closed channel marks the unit retired.
    fn send(&mut self, command: Command) -> bool {
        if self.commands.send(command).is_err() {
            debug!(unit = self.id, ?command, "unit channel closed");
            self.retired = true;
            return false;
        }
        true
    }

    /// Waits for the worker to exit. Returns false if it panicked.
    fn join(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => handle.join().is_ok(),
            None => true,
        }
    }
}

/// What the leader loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderFlow {
    Continue,
    Stop,
}

/// Per-team dispatcher.
#[derive(Debug)]
pub struct Leader {
    team: usize,
    units: Vec<UnitLink>,
    dispatches: usize,
    rng: SmallRng,
}

impl Leader {
    /// Creates a leader over already spawned units. A `seed` of 0 draws from
    /// entropy.
    pub fn new(team: usize, units: Vec<UnitLink>, dispatches: usize, seed: u64) -> Self {
        let rng = if seed != 0 {
            SmallRng::seed_from_u64(seed)
        } else {
            SmallRng::from_entropy()
        };
        Leader {
            team,
            units,
            dispatches,
            rng,
        }
    }

    pub fn team(&self) -> usize {
        self.team
    }

    /// Ids of units that have not been destroyed.
    pub fn active_units(&self) -> Vec<usize> {
        self.units.iter().filter(|u| !u.retired).map(|u| u.id).collect()
    }

    /// Handles one command from the controller.
    pub fn handle(&mut self, command: Command) -> LeaderFlow {
        match command {
            Command::Turn => {
                self.dispatch_turn();
                LeaderFlow::Continue
            }
            Command::Destroy { unit } => {
                self.forward_destroy(unit);
                LeaderFlow::Continue
            }
            Command::End => {
                self.shutdown();
                LeaderFlow::Stop
            }
            Command::Move | Command::Attack => {
                warn!(team = self.team, ?command, "leader ignores unit-level command");
                LeaderFlow::Continue
            }
        }
    }

    fn dispatch_turn(&mut self) {
        for _ in 0..self.dispatches {
            let command = if self.rng.gen_bool(0.5) {
                Command::Attack
            } else {
                Command::Move
            };
            for unit in self.units.iter_mut().filter(|u| !u.retired) {
                debug!(team = self.team, unit = unit.id, ?command, "dispatching");
                unit.send(command);
            }
        }
    }

    fn forward_destroy(&mut self, id: usize) {
        match self.units.iter_mut().find(|u| u.id == id) {
            Some(unit) if !unit.retired => {
                info!(team = self.team, unit = id, "unit destroyed");
                unit.send(Command::Destroy { unit: id });
                unit.retired = true;
            }
            Some(_) => debug!(team = self.team, unit = id, "duplicate destroy notice"),
            None => warn!(team = self.team, unit = id, "destroy notice for unknown unit"),
        }
    }

    /// Sends END to every remaining unit and waits for all of them.
    /// Returns the number of units whose worker panicked.
    pub fn shutdown(&mut self) -> usize {
        for unit in self.units.iter_mut().filter(|u| !u.retired) {
            unit.send(Command::End);
            unit.retired = true;
        }
        let panicked = self.units.iter_mut().map(UnitLink::join).filter(|ok| !ok).count();
        if panicked > 0 {
            warn!(team = self.team, panicked, "unit workers panicked");
        }
        panicked
    }

    /// Worker loop: runs until END or until the controller disconnects.
    /// Returns the number of unit workers that panicked.
    pub fn run(mut self, commands: Receiver<Command>) -> usize {
        while let Ok(command) = commands.recv() {
            if command == Command::End {
                debug!(team = self.team, "leader exiting");
                return self.shutdown();
            }
            self.handle(command);
        }
        debug!(team = self.team, "controller disconnected, shutting down");
        self.shutdown()
    }
}

/// The controller's end of a leader.
#[derive(Debug)]
pub struct LeaderLink {
    pub team: usize,
    pub commands: Sender<Command>,
    pub handle: Option<JoinHandle<usize>>,
}

impl LeaderLink {
    /// Sends a command, logging instead of failing if the leader is gone.
    pub fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!(team = self.team, ?command, "leader channel closed");
        }
    }

    /// Waits for the leader (and transitively its units) to exit.
    /// Returns how many workers of this team panicked.
    pub fn join(&mut self) -> usize {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                warn!(team = self.team, "leader worker panicked");
                1
            }),
            None => 0,
        }
    }

    /// Returns true once the leader thread has exited (or never existed).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

fn spawn_named<T, F>(name: String, body: F) -> Result<JoinHandle<T>, SimError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|source| SimError::Spawn { name, source })
}

/// Spawns one leader thread with its unit agent threads.
///
/// If a unit thread fails to start, the units already running are told to
/// END and joined before the error is returned. If the leader thread itself
/// fails to start, dropping the leader closes every unit channel, which ends
/// those workers.
pub fn spawn_leader(
    team: usize,
    world: &SharedWorld,
    config: &SimConfig,
    intents: &SyncSender<Intent>,
) -> Result<LeaderLink, SimError> {
    let tactics = Tactics::from_config(config);
    let mut units = Vec::with_capacity(config.units_per_team);

    for id in 0..config.units_per_team {
        let key = UnitKey::new(team, id);
        let seed = config.worker_seed(((team as u64) << 32) | (id as u64 + 1));
        let agent = UnitAgent::new(key, world.clone(), tactics, seed);
        let (tx, rx) = mpsc::channel();
        let intents = intents.clone();
        match spawn_named(format!("unit-{}-{}", team, id), move || agent.run(rx, intents)) {
            Ok(handle) => units.push(UnitLink::new(id, tx, Some(handle))),
            Err(err) => {
                Leader::new(team, units, 0, 1).shutdown();
                return Err(err);
            }
        }
    }

    let (tx, rx) = mpsc::channel();
    let seed = config.worker_seed((team as u64) << 32);
    let leader = Leader::new(team, units, config.dispatches_per_turn, seed);
    let handle = spawn_named(format!("leader-{}", team), move || leader.run(rx))?;
    Ok(LeaderLink {
        team,
        commands: tx,
        handle: Some(handle),
    })
}
