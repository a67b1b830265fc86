//! Intent resolution.
//!
//! Applies unit intents to the world one at a time and computes the visual
//! trace of each attack.

pub mod combat;
pub mod trace;

pub use combat::{resolve_intent, IgnoreReason, Resolution};
pub use trace::attack_path;
