//! The battle world: grid cells, the unit table and per-team alive counts.
//!
//! `World` is plain data. Synchronisation is layered on top by
//! [`SharedWorld`](super::shared::SharedWorld); every mutating method here
//! must only be reached through its write guard.

use rand::seq::index::sample;
use rand::Rng;

use super::cell::{Cell, GLYPH_EMPTY};
use super::unit::{chebyshev, Position, Unit, UnitKey};
use crate::config::SimConfig;

/// A broken world invariant. Finding one always means a bug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invariant violation: {message}")]
pub struct InvariantViolation {
    pub message: String,
}

/// Grid plus unit registry.
///
/// Cells are stored row-major and units team-major, both in fixed-size
/// vectors allocated once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct World {
    height: usize,
    width: usize,
    units_per_team: usize,
    team_glyphs: Vec<char>,
    cells: Vec<Cell>,
    units: Vec<Unit>,
    alive: Vec<usize>,
}

impl World {
    /// Creates an empty world. Every unit slot starts dead at (0, 0) with an
    /// alive count of zero; use [`World::place_unit`] and
    /// [`World::set_alive_count`] to populate it.
    pub fn new(height: usize, width: usize, units_per_team: usize, team_glyphs: Vec<char>) -> Self {
        let teams = team_glyphs.len();
        let units = (0..teams)
            .flat_map(|team| {
                (0..units_per_team).map(move |id| Unit::new(team, id, Position::new(0, 0), 0))
            })
            .collect();
        World {
            height,
            width,
            units_per_team,
            team_glyphs,
            cells: vec![Cell::EMPTY; height * width],
            units,
            alive: vec![0; teams],
        }
    }

    /// Creates an empty world sized from `config`.
    pub fn empty(config: &SimConfig) -> Self {
        World::new(
            config.grid_height,
            config.grid_width,
            config.units_per_team,
            config.glyphs(),
        )
    }

    /// Creates a world with every unit at full health on a distinct,
    /// randomly chosen cell. `config` must already be validated.
    pub fn generate(config: &SimConfig, rng: &mut impl Rng) -> Self {
        let mut world = World::empty(config);
        let total = world.teams() * world.units_per_team;
        let picks = sample(rng, world.height * world.width, total);
        let mut picks = picks.into_iter();

        for team in 0..world.teams() {
            for id in 0..world.units_per_team {
                let Some(idx) = picks.next() else {
                    return world;
                };
                let pos = Position::new(idx / world.width, idx % world.width);
                world.place_unit(Unit::new(team, id, pos, config.max_health));
            }
            world.set_alive_count(team, world.units_per_team);
        }
        world
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn teams(&self) -> usize {
        self.team_glyphs.len()
    }

    pub fn units_per_team(&self) -> usize {
        self.units_per_team
    }

    /// Display glyph of a team.
    pub fn team_glyph(&self, team: usize) -> Option<char> {
        self.team_glyphs.get(team).copied()
    }

    /// Returns true if `pos` lies on the grid.
    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.height && pos.col < self.width
    }

    fn cell_index(&self, pos: Position) -> usize {
        pos.row * self.width + pos.col
    }

    fn unit_index(&self, key: UnitKey) -> Option<usize> {
        if key.team < self.teams() && key.id < self.units_per_team {
            Some(key.team * self.units_per_team + key.id)
        } else {
            None
        }
    }

    /// The cell at `pos`, or `None` off the grid.
    pub fn cell(&self, pos: Position) -> Option<&Cell> {
        if self.contains(pos) {
            Some(&self.cells[self.cell_index(pos)])
        } else {
            None
        }
    }

    /// The unit record for `team`/`id`, or `None` for unknown ids.
    pub fn unit(&self, team: usize, id: usize) -> Option<&Unit> {
        self.unit_index(UnitKey::new(team, id)).map(|i| &self.units[i])
    }

    /// All unit records of one team, living or not.
    pub fn team_units(&self, team: usize) -> &[Unit] {
        if team < self.teams() {
            let start = team * self.units_per_team;
            &self.units[start..start + self.units_per_team]
        } else {
            &[]
        }
    }

    /// Every unit record, team-major.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Number of living units of `team` (0 for unknown teams).
    pub fn alive_count(&self, team: usize) -> usize {
        self.alive.get(team).copied().unwrap_or(0)
    }

    /// Teams that still have at least one living unit.
    pub fn alive_teams(&self) -> Vec<usize> {
        (0..self.teams()).filter(|&t| self.alive_count(t) > 0).collect()
    }

    /// The displayed glyph at `pos`.
    pub fn symbol_at(&self, pos: Position) -> Option<char> {
        self.cell(pos).map(|c| c.symbol)
    }

    /// Returns true if `pos` is on the grid and unoccupied.
    pub fn is_empty(&self, pos: Position) -> bool {
        self.cell(pos).is_some_and(Cell::is_empty)
    }

    /// Chebyshev distance between two positions.
    pub fn distance(&self, a: Position, b: Position) -> usize {
        chebyshev(a, b)
    }

    /// Glyphs of every cell, row-major.
    pub fn symbols(&self) -> impl Iterator<Item = char> + '_ {
        self.cells.iter().map(|c| c.symbol)
    }

    /// Writes a unit record and mirrors it into the grid.
    ///
    /// A living unit occupies its position and shows its team glyph; the cell
    /// it previously held is vacated. A dead unit vacates its position.
    /// Unknown team/unit ids or off-grid positions are ignored and return
    /// false.
    pub fn place_unit(&mut self, unit: Unit) -> bool {
        let key = unit.key();
        let Some(idx) = self.unit_index(key) else {
            return false;
        };
        if !self.contains(unit.position) {
            return false;
        }

        let previous = self.units[idx].position;
        if previous != unit.position {
            let old = self.cell_index(previous);
            if self.cells[old].occupant == Some(key) {
                self.cells[old] = Cell::EMPTY;
            }
        }

        self.units[idx] = unit;
        let glyph = self.team_glyphs[key.team];
        let cell_idx = self.cell_index(unit.position);
        let cell = &mut self.cells[cell_idx];
        if unit.alive {
            cell.occupant = Some(key);
            cell.symbol = glyph;
        } else if cell.occupant.is_none() || cell.occupant == Some(key) {
            *cell = Cell::EMPTY;
        }
        true
    }

    /// Empties a cell.
    pub fn clear_cell(&mut self, pos: Position) {
        if self.contains(pos) {
            let idx = self.cell_index(pos);
            self.cells[idx] = Cell::EMPTY;
        }
    }

    /// Overwrites the displayed glyph of a cell without touching occupancy.
    pub fn set_symbol(&mut self, pos: Position, symbol: char) {
        if self.contains(pos) {
            let idx = self.cell_index(pos);
            self.cells[idx].symbol = symbol;
        }
    }

    pub fn set_alive_count(&mut self, team: usize, count: usize) {
        if let Some(slot) = self.alive.get_mut(team) {
            *slot = count;
        }
    }

    /// Recomputes every glyph from occupancy, dropping transient marks.
    pub fn restore_symbols(&mut self) {
        for cell in &mut self.cells {
            cell.symbol = match cell.occupant {
                Some(key) => self.team_glyphs[key.team],
                None => GLYPH_EMPTY,
            };
        }
    }

    /// Checks the grid/unit mirror and the alive counts.
    ///
    /// Returns every violation found, or an empty list.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        let mut report = |message: String| violations.push(InvariantViolation { message });

        for unit in &self.units {
            if unit.alive != (unit.health > 0) {
                report(format!(
                    "unit {}/{} alive={} with health {}",
                    unit.team, unit.id, unit.alive, unit.health
                ));
            }
            if !self.contains(unit.position) {
                report(format!(
                    "unit {}/{} is off the grid at {:?}",
                    unit.team, unit.id, unit.position
                ));
                continue;
            }
            if unit.alive {
                let occupant = self.cells[self.cell_index(unit.position)].occupant;
                if occupant != Some(unit.key()) {
                    report(format!(
                        "unit {}/{} at {:?} but cell holds {:?}",
                        unit.team, unit.id, unit.position, occupant
                    ));
                }
            }
        }

        for (idx, cell) in self.cells.iter().enumerate() {
            let Some(key) = cell.occupant else {
                continue;
            };
            let pos = Position::new(idx / self.width, idx % self.width);
            match self.unit(key.team, key.id) {
                Some(unit) if unit.alive && unit.position == pos => {}
                Some(unit) => report(format!(
                    "cell {:?} claims unit {}/{} which is at {:?} (alive={})",
                    pos, key.team, key.id, unit.position, unit.alive
                )),
                None => report(format!("cell {:?} claims unknown unit {:?}", pos, key)),
            }
        }

        for team in 0..self.teams() {
            let living = self.team_units(team).iter().filter(|u| u.alive).count();
            if living != self.alive_count(team) {
                report(format!(
                    "team {} alive count {} but {} units are alive",
                    team,
                    self.alive_count(team),
                    living
                ));
            }
        }

        violations
    }
}
