//! Grid cells and display glyphs.
//!
//! A cell records which unit occupies it, if any, plus the glyph the
//! renderer shows. The glyph is cosmetic: it is recomputed from occupancy by
//! `World::restore_symbols` at the end of every round.

use super::unit::UnitKey;

/// Glyph of an unoccupied cell.
pub const GLYPH_EMPTY: char = '.';
/// Glyph left on a target cell hit by an attack that survived it.
pub const GLYPH_DAMAGED: char = '%';
/// Glyph left on a target cell whose unit was destroyed.
pub const GLYPH_DESTROYED: char = 'X';
/// Glyph left on an empty target cell when an attack misses.
pub const GLYPH_MISS: char = 'w';
/// Glyph drawn along the path of an attack trace.
pub const GLYPH_TRACE: char = '*';

/// Glyphs that teams may not use since cells already give them a meaning.
pub const RESERVED_GLYPHS: [char; 5] = [
    GLYPH_EMPTY,
    GLYPH_DAMAGED,
    GLYPH_DESTROYED,
    GLYPH_MISS,
    GLYPH_TRACE,
];

/// One grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// The unit standing here, or `None` if the cell is empty.
    pub occupant: Option<UnitKey>,
    /// The glyph currently displayed for this cell.
    pub symbol: char,
}

impl Cell {
    /// An empty cell showing the background glyph.
    pub const EMPTY: Cell = Cell {
        occupant: None,
        symbol: GLYPH_EMPTY,
    };

    /// Returns true if no unit occupies the cell.
    pub const fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }

    /// Team of the occupant, if any.
    pub fn team(&self) -> Option<usize> {
        self.occupant.map(|k| k.team)
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::EMPTY
    }
}
