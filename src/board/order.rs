//! Messages exchanged between the controller, leaders and unit agents.
//!
//! Commands flow down (controller -> leader -> unit) and intents flow back
//! up from units to the controller, which is the only party that mutates
//! the world.

use std::fmt;

use super::unit::{Position, UnitKey};

/// What a unit proposes to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Move,
    Attack,
    /// No legal action was found; resolving it changes nothing.
    Pass,
}

/// A unit's proposed action, adjudicated by the turn controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Intent {
    pub action: Action,
    pub origin: Position,
    pub target: Position,
    pub unit: UnitKey,
}

impl Intent {
    pub fn movement(unit: UnitKey, origin: Position, target: Position) -> Self {
        Intent {
            action: Action::Move,
            origin,
            target,
            unit,
        }
    }

    pub fn attack(unit: UnitKey, origin: Position, target: Position) -> Self {
        Intent {
            action: Action::Attack,
            origin,
            target,
            unit,
        }
    }

    pub fn pass(unit: UnitKey, origin: Position) -> Self {
        Intent {
            action: Action::Pass,
            origin,
            target: origin,
            unit,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.action {
            Action::Move => "MOVE",
            Action::Attack => "ATTACK",
            Action::Pass => "PASS",
        };
        write!(
            f,
            "{} [{}/{}] {},{} -> {},{}",
            verb,
            self.unit.team,
            self.unit.id,
            self.origin.row,
            self.origin.col,
            self.target.row,
            self.target.col
        )
    }
}

/// A directive sent to a leader or to a unit agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// A new round started (controller -> leader).
    Turn,
    /// Find and attack an enemy (leader -> unit).
    Attack,
    /// Move to a neighbouring empty cell (leader -> unit).
    Move,
    /// The named unit has been destroyed.
    Destroy { unit: usize },
    /// The battle is over; shut down.
    End,
}
