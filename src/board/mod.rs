//! World representation and message types.
//!
//! Contains the grid cells, units, the world model with its invariant
//! checker, the synchronised handle shared across workers, and the commands
//! and intents exchanged between them.

pub mod cell;
pub mod order;
pub mod shared;
pub mod unit;
pub mod world;

pub use cell::{
    Cell, GLYPH_DAMAGED, GLYPH_DESTROYED, GLYPH_EMPTY, GLYPH_MISS, GLYPH_TRACE, RESERVED_GLYPHS,
};
pub use order::{Action, Command, Intent};
pub use shared::{SharedWorld, Snapshot, WorldWriteGuard};
pub use unit::{chebyshev, Position, Unit, UnitKey};
pub use world::{InvariantViolation, World};
