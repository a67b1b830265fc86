//! Unit agents.
//!
//! One agent runs per unit. It waits for a MOVE or ATTACK command from its
//! leader, reads the world to pick a destination or a target, and sends a
//! single intent to the turn controller. It never mutates the world.

use std::sync::mpsc::{Receiver, SyncSender};

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::board::{Command, Intent, Position, SharedWorld, Unit, UnitKey, World};
use crate::config::SimConfig;

/// Lifecycle of a unit agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Waiting for a command.
    Idle,
    /// Computing an intent.
    Acting,
    /// Destroyed or shut down; the agent exits.
    Retired,
}

/// Decision parameters shared by every agent of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tactics {
    pub attack_range: usize,
    pub move_range: usize,
    pub move_attempts: usize,
}

impl Tactics {
    pub fn from_config(config: &SimConfig) -> Self {
        Tactics {
            attack_range: config.attack_range,
            move_range: config.move_range,
            move_attempts: config.move_attempts,
        }
    }
}

/// Picks a position to attack.
///
/// Enemy teams with living units are tried in random order, each once. The
/// first living unit of a team (by id) within `attack_range` is the target.
/// Returns `None` if no enemy is in range.
pub fn choose_target(
    world: &World,
    me: &Unit,
    attack_range: usize,
    rng: &mut impl Rng,
) -> Option<Position> {
    let mut enemies: Vec<usize> = (0..world.teams())
        .filter(|&t| t != me.team && world.alive_count(t) > 0)
        .collect();
    enemies.shuffle(rng);

    enemies.into_iter().find_map(|team| {
        world
            .team_units(team)
            .iter()
            .find(|u| u.alive && world.distance(me.position, u.position) <= attack_range)
            .map(|u| u.position)
    })
}

/// Picks an empty neighbouring cell to move to.
///
/// Draws a random offset in `-move_range..=move_range` on each axis and
/// keeps the first one that lands on an empty cell inside the grid. Gives up
/// and returns `None` after `attempts` draws.
pub fn choose_destination(
    world: &World,
    me: &Unit,
    move_range: usize,
    attempts: usize,
    rng: &mut impl Rng,
) -> Option<Position> {
    let reach = move_range as isize;
    for _ in 0..attempts {
        let d_row = rng.gen_range(-reach..=reach);
        let d_col = rng.gen_range(-reach..=reach);
        let Some(dest) = me.position.offset(d_row, d_col, world.height(), world.width()) else {
            continue;
        };
        if world.is_empty(dest) {
            return Some(dest);
        }
    }
    None
}

/// The decision-making half of a unit worker.
pub struct UnitAgent {
    key: UnitKey,
    world: SharedWorld,
    tactics: Tactics,
    state: AgentState,
    rng: SmallRng,
}

impl UnitAgent {
    /// Creates an idle agent. A `seed` of 0 draws from entropy.
    pub fn new(key: UnitKey, world: SharedWorld, tactics: Tactics, seed: u64) -> Self {
        let rng = if seed != 0 {
            SmallRng::seed_from_u64(seed)
        } else {
            SmallRng::from_entropy()
        };
        UnitAgent {
            key,
            world,
            tactics,
            state: AgentState::Idle,
            rng,
        }
    }

    pub fn key(&self) -> UnitKey {
        self.key
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Processes one command and returns the intent to send, if any.
    pub fn handle(&mut self, command: Command) -> Option<Intent> {
        if self.state == AgentState::Retired {
            return None;
        }
        match command {
            Command::Move | Command::Attack => {
                self.state = AgentState::Acting;
                let intent = self.decide(command);
                self.state = AgentState::Idle;
                Some(intent)
            }
            Command::Destroy { .. } | Command::End => {
                debug!(team = self.key.team, unit = self.key.id, ?command, "retiring");
                self.state = AgentState::Retired;
                None
            }
            Command::Turn => None,
        }
    }

    fn decide(&mut self, command: Command) -> Intent {
        let (team, id) = (self.key.team, self.key.id);
        let world = self.world.read();
        let Some(me) = world.unit(team, id).copied() else {
            return Intent::pass(self.key, Position::new(0, 0));
        };
        if !me.alive {
            return Intent::pass(self.key, me.position);
        }

        let chosen = if command == Command::Attack {
            choose_target(&world, &me, self.tactics.attack_range, &mut self.rng)
                .map(|target| Intent::attack(self.key, me.position, target))
        } else {
            choose_destination(
                &world,
                &me,
                self.tactics.move_range,
                self.tactics.move_attempts,
                &mut self.rng,
            )
            .map(|dest| Intent::movement(self.key, me.position, dest))
        };
        drop(world);

        match chosen {
            Some(intent) => {
                debug!(team, unit = id, %intent, "decided");
                intent
            }
            None => {
                debug!(team, unit = id, ?command, "no legal action, passing");
                Intent::pass(self.key, me.position)
            }
        }
    }

    /// Worker loop: runs until retired or until either channel closes.
    pub fn run(mut self, commands: Receiver<Command>, intents: SyncSender<Intent>) {
        let (team, unit) = (self.key.team, self.key.id);
        while let Ok(command) = commands.recv() {
            if let Some(intent) = self.handle(command) {
                if intents.send(intent).is_err() {
                    debug!(team, unit, "intent channel closed");
                    break;
                }
            }
            if self.state == AgentState::Retired {
                break;
            }
        }
        debug!(team, unit, "unit agent exiting");
    }
}
