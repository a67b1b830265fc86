//! Skirmish: a concurrent team battle on a grid.
//!
//! Teams of units fight on a shared world. Every unit runs as its own agent
//! thread, every team has a leader thread dispatching orders, and a single
//! turn controller adjudicates the intents the agents send back, one round
//! at a time, until one team is left.

pub mod agent;
pub mod battle;
pub mod board;
pub mod config;
pub mod controller;
pub mod error;
pub mod monitor;
pub mod resolve;
