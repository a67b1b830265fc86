//! Intent adjudication.
//!
//! Applies a single MOVE or ATTACK intent to the world. The caller must hold
//! write access for the whole call so that the health change, the alive
//! count and the grid stay consistent for every reader. The resolver never
//! talks to other workers: a destroyed unit is reported through the returned
//! [`Resolution`] and the controller forwards the DESTROY notice.

use crate::board::{
    Action, Command, Intent, Position, UnitKey, World, GLYPH_DAMAGED, GLYPH_DESTROYED, GLYPH_MISS,
};

/// Why an intent was dropped without effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The acting unit id is not part of this world.
    UnknownUnit,
    /// The acting unit died before its intent was applied.
    DeadUnit,
    /// The target cell lies outside the grid.
    OffGrid,
}

/// The effect an intent had on the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The unit now stands on `to`.
    Moved { from: Position, to: Position },
    /// The destination was taken by another unit after the decision was made.
    Blocked { target: Position, occupant: UnitKey },
    /// The attack hit an empty cell.
    Missed { target: Position },
    /// The target survived with `health` remaining.
    Damaged { target: UnitKey, health: u32 },
    /// The target was destroyed.
    Destroyed { target: UnitKey },
    /// The unit chose not to act.
    Passed,
    Ignored(IgnoreReason),
}

impl Resolution {
    /// The DESTROY notice to deliver, as (team, command), if this resolution
    /// destroyed a unit.
    pub fn destroy_notice(&self) -> Option<(usize, Command)> {
        match *self {
            Resolution::Destroyed { target } => {
                Some((target.team, Command::Destroy { unit: target.id }))
            }
            _ => None,
        }
    }
}

/// Applies one intent to the world.
pub fn resolve_intent(world: &mut World, intent: &Intent, damage: u32) -> Resolution {
    let actor = intent.unit;
    let Some(unit) = world.unit(actor.team, actor.id).copied() else {
        return Resolution::Ignored(IgnoreReason::UnknownUnit);
    };
    if intent.action == Action::Pass {
        return Resolution::Passed;
    }
    if !unit.alive {
        return Resolution::Ignored(IgnoreReason::DeadUnit);
    }
    let Some(cell) = world.cell(intent.target).copied() else {
        return Resolution::Ignored(IgnoreReason::OffGrid);
    };

    match intent.action {
        Action::Move => {
            if let Some(occupant) = cell.occupant {
                if occupant != actor {
                    return Resolution::Blocked {
                        target: intent.target,
                        occupant,
                    };
                }
            }
            let mut moved = unit;
            moved.position = intent.target;
            world.place_unit(moved);
            Resolution::Moved {
                from: unit.position,
                to: intent.target,
            }
        }
        Action::Attack => {
            let Some(key) = cell.occupant else {
                world.set_symbol(intent.target, GLYPH_MISS);
                return Resolution::Missed {
                    target: intent.target,
                };
            };
            let Some(mut victim) = world.unit(key.team, key.id).copied() else {
                return Resolution::Ignored(IgnoreReason::UnknownUnit);
            };

            if victim.take_damage(damage) {
                world.place_unit(victim);
                world.set_symbol(intent.target, GLYPH_DESTROYED);
                let remaining = world.alive_count(key.team).saturating_sub(1);
                world.set_alive_count(key.team, remaining);
                Resolution::Destroyed { target: key }
            } else {
                world.place_unit(victim);
                world.set_symbol(intent.target, GLYPH_DAMAGED);
                Resolution::Damaged {
                    target: key,
                    health: victim.health,
                }
            }
        }
        Action::Pass => Resolution::Passed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Unit, GLYPH_EMPTY};

    const DAMAGE: u32 = 10;

    /// Two teams of two on a 6x6 grid.
    fn duel() -> World {
        let mut world = World::new(6, 6, 2, vec!['A', 'B']);
        world.place_unit(Unit::new(0, 0, Position::new(0, 0), 50));
        world.place_unit(Unit::new(0, 1, Position::new(0, 5), 50));
        world.place_unit(Unit::new(1, 0, Position::new(5, 5), 15));
        world.place_unit(Unit::new(1, 1, Position::new(3, 3), 50));
        world.set_alive_count(0, 2);
        world.set_alive_count(1, 2);
        world
    }

    #[test]
    fn attack_damages_target() {
        let mut world = duel();
        let intent = Intent::attack(UnitKey::new(0, 0), Position::new(0, 0), Position::new(3, 3));
        let result = resolve_intent(&mut world, &intent, DAMAGE);

        assert_eq!(
            result,
            Resolution::Damaged { target: UnitKey::new(1, 1), health: 40 }
        );
        assert_eq!(world.unit(1, 1).unwrap().health, 40);
        assert_eq!(world.symbol_at(Position::new(3, 3)), Some(GLYPH_DAMAGED));
        assert_eq!(world.symbol_at(Position::new(0, 0)), Some('A'));
        assert_eq!(world.alive_count(1), 2);
        assert!(result.destroy_notice().is_none());
    }

    #[test]
    fn lethal_attack_destroys_and_reports() {
        let mut world = duel();
        let intent = Intent::attack(UnitKey::new(0, 0), Position::new(0, 0), Position::new(5, 5));

        assert!(matches!(
            resolve_intent(&mut world, &intent, DAMAGE),
            Resolution::Damaged { health: 5, .. }
        ));
        let result = resolve_intent(&mut world, &intent, DAMAGE);

        assert_eq!(result, Resolution::Destroyed { target: UnitKey::new(1, 0) });
        assert_eq!(result.destroy_notice(), Some((1, Command::Destroy { unit: 0 })));
        let victim = world.unit(1, 0).unwrap();
        assert_eq!(victim.health, 0);
        assert!(!victim.alive);
        assert_eq!(world.alive_count(1), 1);
        assert!(world.is_empty(Position::new(5, 5)));
        assert_eq!(world.symbol_at(Position::new(5, 5)), Some(GLYPH_DESTROYED));
        assert!(world.check_invariants().is_empty());
    }

    #[test]
    fn attack_on_empty_cell_misses() {
        let mut world = duel();
        let before: Vec<_> = world.units().to_vec();
        let intent = Intent::attack(UnitKey::new(0, 0), Position::new(0, 0), Position::new(2, 2));

        assert_eq!(
            resolve_intent(&mut world, &intent, DAMAGE),
            Resolution::Missed { target: Position::new(2, 2) }
        );
        assert_eq!(world.symbol_at(Position::new(2, 2)), Some(GLYPH_MISS));
        assert_eq!(world.units(), before.as_slice());
    }

    #[test]
    fn move_relocates_unit() {
        let mut world = duel();
        let intent = Intent::movement(UnitKey::new(1, 1), Position::new(3, 3), Position::new(2, 4));

        assert_eq!(
            resolve_intent(&mut world, &intent, DAMAGE),
            Resolution::Moved { from: Position::new(3, 3), to: Position::new(2, 4) }
        );
        assert!(world.is_empty(Position::new(3, 3)));
        assert_eq!(world.symbol_at(Position::new(3, 3)), Some(GLYPH_EMPTY));
        assert_eq!(world.symbol_at(Position::new(2, 4)), Some('B'));
        assert!(world.check_invariants().is_empty());
    }

    #[test]
    fn move_onto_taken_cell_is_blocked() {
        let mut world = duel();
        // Unit 0/1 decided to move to (1,4) while it was empty; 1/1 got there first.
        let first = Intent::movement(UnitKey::new(1, 1), Position::new(3, 3), Position::new(1, 4));
        let late = Intent::movement(UnitKey::new(0, 1), Position::new(0, 5), Position::new(1, 4));
        resolve_intent(&mut world, &first, DAMAGE);

        assert_eq!(
            resolve_intent(&mut world, &late, DAMAGE),
            Resolution::Blocked { target: Position::new(1, 4), occupant: UnitKey::new(1, 1) }
        );
        assert_eq!(world.unit(0, 1).unwrap().position, Position::new(0, 5));
        assert!(world.check_invariants().is_empty());
    }

    #[test]
    fn intents_from_dead_units_are_ignored() {
        let mut world = duel();
        let kill = Intent::attack(UnitKey::new(0, 0), Position::new(0, 0), Position::new(5, 5));
        resolve_intent(&mut world, &kill, DAMAGE);
        resolve_intent(&mut world, &kill, DAMAGE);

        let posthumous =
            Intent::attack(UnitKey::new(1, 0), Position::new(5, 5), Position::new(0, 0));
        assert_eq!(
            resolve_intent(&mut world, &posthumous, DAMAGE),
            Resolution::Ignored(IgnoreReason::DeadUnit)
        );
        assert_eq!(world.unit(0, 0).unwrap().health, 50);
    }

    #[test]
    fn unknown_units_and_off_grid_targets_are_ignored() {
        let mut world = duel();
        let stranger = Intent::attack(UnitKey::new(4, 0), Position::new(0, 0), Position::new(3, 3));
        assert_eq!(
            resolve_intent(&mut world, &stranger, DAMAGE),
            Resolution::Ignored(IgnoreReason::UnknownUnit)
        );
        let wild = Intent::movement(UnitKey::new(0, 0), Position::new(0, 0), Position::new(6, 0));
        assert_eq!(
            resolve_intent(&mut world, &wild, DAMAGE),
            Resolution::Ignored(IgnoreReason::OffGrid)
        );
        assert!(world.check_invariants().is_empty());
    }

    #[test]
    fn pass_changes_nothing() {
        let mut world = duel();
        let before = world.clone();
        let intent = Intent::pass(UnitKey::new(0, 0), Position::new(0, 0));
        assert_eq!(resolve_intent(&mut world, &intent, DAMAGE), Resolution::Passed);
        assert_eq!(world, before);
    }
}
