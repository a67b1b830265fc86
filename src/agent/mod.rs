//! Worker logic: team leaders and the unit agents they command.
//!
//! Both run on their own named threads and talk to the turn controller
//! through channels only. Agents read the world to decide; neither ever
//! writes it.

pub mod leader;
pub mod unit;

pub use leader::{spawn_leader, Leader, LeaderFlow, LeaderLink, UnitLink};
pub use unit::{choose_destination, choose_target, AgentState, Tactics, UnitAgent};
