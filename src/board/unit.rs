//! Units and grid coordinates.
//!
//! Represents a unit, its owning team, and its current position on the grid.

use serde::Serialize;

/// A (row, column) coordinate on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Returns the position shifted by (`d_row`, `d_col`), or `None` if it
    /// would leave a `height` x `width` grid.
    pub fn offset(
        self,
        d_row: isize,
        d_col: isize,
        height: usize,
        width: usize,
    ) -> Option<Position> {
        let row = self.row.checked_add_signed(d_row)?;
        let col = self.col.checked_add_signed(d_col)?;
        if row < height && col < width {
            Some(Position { row, col })
        } else {
            None
        }
    }
}

/// Chebyshev distance between two positions: `max(|drow|, |dcol|)`.
pub fn chebyshev(a: Position, b: Position) -> usize {
    a.row.abs_diff(b.row).max(a.col.abs_diff(b.col))
}

/// Identifies a unit: its team and its number within the team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UnitKey {
    pub team: usize,
    pub id: usize,
}

impl UnitKey {
    pub const fn new(team: usize, id: usize) -> Self {
        Self { team, id }
    }
}

/// A combat unit on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unit {
    pub team: usize,
    pub id: usize,
    pub position: Position,
    /// Remaining health, never below zero.
    pub health: u32,
    /// Always equal to `health > 0`.
    pub alive: bool,
}

impl Unit {
    /// Creates a living unit at full health.
    pub fn new(team: usize, id: usize, position: Position, health: u32) -> Self {
        Unit {
            team,
            id,
            position,
            health,
            alive: health > 0,
        }
    }

    pub const fn key(&self) -> UnitKey {
        UnitKey::new(self.team, self.id)
    }

    /// Removes `damage` health, clamping at zero. Returns true if the unit
    /// died from this hit.
    pub fn take_damage(&mut self, damage: u32) -> bool {
        self.health = self.health.saturating_sub(damage);
        let was_alive = self.alive;
        self.alive = self.health > 0;
        was_alive && !self.alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chebyshev_uses_larger_axis() {
        let a = Position::new(0, 0);
        assert_eq!(chebyshev(a, a), 0);
        assert_eq!(chebyshev(a, Position::new(3, 4)), 4);
        assert_eq!(chebyshev(Position::new(3, 4), a), 4);
        assert_eq!(chebyshev(Position::new(5, 1), Position::new(2, 2)), 3);
    }

    #[test]
    fn offset_stays_in_bounds() {
        let p = Position::new(0, 5);
        assert_eq!(p.offset(-1, 0, 10, 10), None);
        assert_eq!(p.offset(1, -1, 10, 10), Some(Position::new(1, 4)));
        assert_eq!(Position::new(9, 9).offset(0, 1, 10, 10), None);
    }

    #[test]
    fn damage_clamps_and_kills_once() {
        let mut unit = Unit::new(0, 0, Position::new(1, 1), 15);
        assert!(!unit.take_damage(10));
        assert_eq!(unit.health, 5);
        assert!(unit.alive);
        assert!(unit.take_damage(10));
        assert_eq!(unit.health, 0);
        assert!(!unit.alive);
        assert!(!unit.take_damage(10));
    }
}
