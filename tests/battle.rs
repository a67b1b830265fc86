//! End-to-end battle scenarios.
//!
//! Scripted battles feed intents straight into the turn controller with
//! thread-less leader links, so outcomes are exact. Threaded battles run the
//! real leaders and unit agents and check the world invariants while the
//! battle is in progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use skirmish::agent::{spawn_leader, LeaderLink};
use skirmish::board::{Command, Intent, Position, SharedWorld, Unit, UnitKey, World};
use skirmish::config::SimConfig;
use skirmish::controller::{BattleEvent, TurnController, Verdict};
use skirmish::resolve::{resolve_intent, Resolution};

fn scripted_config() -> SimConfig {
    SimConfig {
        grid_height: 9,
        grid_width: 9,
        teams: 3,
        units_per_team: 3,
        max_health: 20,
        attack_damage: 10,
        round_duration_ms: 20,
        ..SimConfig::default()
    }
}

/// Team t, unit u stands at (3t + u, 3t + u).
fn scripted_world(config: &SimConfig) -> World {
    let mut world = World::empty(config);
    for team in 0..3 {
        for id in 0..3 {
            let at = 3 * team + id;
            world.place_unit(Unit::new(team, id, Position::new(at, at), config.max_health));
        }
        world.set_alive_count(team, 3);
    }
    world
}

fn fake_leaders(teams: usize) -> (Vec<LeaderLink>, Vec<Receiver<Command>>) {
    (0..teams)
        .map(|team| {
            let (tx, rx) = mpsc::channel();
            (
                LeaderLink {
                    team,
                    commands: tx,
                    handle: None,
                },
                rx,
            )
        })
        .unzip()
}

/// Sends two hits at every unit of `victim_team` from unit 0 of `shooter_team`.
fn wipe_out(tx: &SyncSender<Intent>, world: &World, shooter_team: usize, victim_team: usize) {
    let shooter = world.unit(shooter_team, 0).unwrap();
    for victim in world.team_units(victim_team) {
        for _ in 0..2 {
            tx.send(Intent::attack(shooter.key(), shooter.position, victim.position))
                .unwrap();
        }
    }
}

#[test]
fn eliminating_two_teams_yields_exactly_one_winner() {
    let config = scripted_config();
    let world = SharedWorld::new(scripted_world(&config));
    let (leaders, inboxes) = fake_leaders(3);
    let (intent_tx, intent_rx) = mpsc::sync_channel(64);
    let (events_tx, events_rx) = mpsc::channel();
    let mut controller =
        TurnController::new(world.clone(), leaders, intent_rx, &config).with_events(events_tx);

    wipe_out(&intent_tx, &world.read(), 1, 0);
    assert_eq!(controller.play_round(), Verdict::Continue);
    {
        let w = world.read();
        assert_eq!(w.alive_count(0), 0);
        assert_eq!(w.alive_count(1), 3);
        assert!(w.check_invariants().is_empty());
    }
    let destroys: Vec<Command> = inboxes[0]
        .try_iter()
        .filter(|c| matches!(c, Command::Destroy { .. }))
        .collect();
    assert_eq!(
        destroys,
        vec![
            Command::Destroy { unit: 0 },
            Command::Destroy { unit: 1 },
            Command::Destroy { unit: 2 }
        ]
    );

    wipe_out(&intent_tx, &world.read(), 2, 1);
    let outcome = controller.run().unwrap();
    assert_eq!(outcome.winner, Some(2));
    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.units_destroyed, 6);

    let winners: Vec<BattleEvent> = events_rx
        .try_iter()
        .filter(|e| matches!(e, BattleEvent::Winner { .. }))
        .collect();
    assert_eq!(winners, vec![BattleEvent::Winner { team: 2 }]);
    for inbox in &inboxes {
        assert_eq!(inbox.try_iter().last(), Some(Command::End));
    }
}

#[test]
fn round_without_intents_only_restores_glyphs() {
    let config = scripted_config();
    let world = SharedWorld::new(scripted_world(&config));
    world.write().set_symbol(Position::new(0, 8), 'w');
    world.write().set_symbol(Position::new(4, 4), '%');
    let before: Vec<usize> = (0..3).map(|t| world.read().alive_count(t)).collect();

    let (leaders, _inboxes) = fake_leaders(3);
    let (_intent_tx, intent_rx) = mpsc::sync_channel(4);
    let mut controller = TurnController::new(world.clone(), leaders, intent_rx, &config);
    assert_eq!(controller.play_round(), Verdict::Continue);

    let w = world.read();
    assert_eq!(w.symbol_at(Position::new(0, 8)), Some('.'));
    assert_eq!(w.symbol_at(Position::new(4, 4)), Some('B'));
    let after: Vec<usize> = (0..3).map(|t| w.alive_count(t)).collect();
    assert_eq!(before, after);
}

#[test]
fn racing_moves_never_share_a_cell() {
    let config = scripted_config();
    let mut world = scripted_world(&config);
    // (0,0) and (1,1) both decided to step onto the empty (0,1).
    let first = Intent::movement(UnitKey::new(0, 0), Position::new(0, 0), Position::new(0, 1));
    let second = Intent::movement(UnitKey::new(0, 1), Position::new(1, 1), Position::new(0, 1));

    assert!(matches!(resolve_intent(&mut world, &first, 10), Resolution::Moved { .. }));
    assert_eq!(
        resolve_intent(&mut world, &second, 10),
        Resolution::Blocked {
            target: Position::new(0, 1),
            occupant: UnitKey::new(0, 0)
        }
    );
    assert!(world.check_invariants().is_empty());
    assert_eq!(world.unit(0, 1).unwrap().position, Position::new(1, 1));
    assert_eq!(world.cell(Position::new(0, 0)).unwrap().occupant, None);
}

#[test]
fn intents_from_destroyed_units_are_ignored() {
    let config = scripted_config();
    let world = SharedWorld::new(scripted_world(&config));
    let (leaders, _inboxes) = fake_leaders(3);
    let (intent_tx, intent_rx) = mpsc::sync_channel(16);
    let mut controller = TurnController::new(world.clone(), leaders, intent_rx, &config);

    let victim = UnitKey::new(1, 0);
    let shooter = UnitKey::new(0, 0);
    for _ in 0..2 {
        intent_tx
            .send(Intent::attack(shooter, Position::new(0, 0), Position::new(3, 3)))
            .unwrap();
    }
    // Decided before its death arrived.
    intent_tx
        .send(Intent::attack(victim, Position::new(3, 3), Position::new(0, 0)))
        .unwrap();
    controller.play_round();

    let w = world.read();
    assert_eq!(w.unit(0, 0).unwrap().health, 20);
    assert!(!w.unit(1, 0).unwrap().alive);
    assert!(w.check_invariants().is_empty());
}

/// Wires real leader and unit threads around a generated world.
fn threaded_battle(seed: u64) -> (SharedWorld, TurnController) {
    let config = SimConfig {
        grid_height: 8,
        grid_width: 8,
        teams: 3,
        units_per_team: 3,
        round_duration_ms: 10,
        max_rounds: Some(500),
        seed,
        ..SimConfig::default()
    };
    let world = SharedWorld::new(World::generate(&config, &mut SmallRng::seed_from_u64(seed)));
    let (intent_tx, intent_rx) = mpsc::sync_channel(config.intent_capacity);
    let leaders = (0..config.teams)
        .map(|team| spawn_leader(team, &world, &config, &intent_tx).unwrap())
        .collect();
    let controller = TurnController::new(world.clone(), leaders, intent_rx, &config);
    (world, controller)
}

#[test]
fn threaded_battles_keep_the_world_consistent() {
    for seed in [1, 2, 3] {
        let (world, mut controller) = threaded_battle(seed);
        let done = Arc::new(AtomicBool::new(false));
        let checker = {
            let world = world.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut checks = 0u32;
                while !done.load(Ordering::SeqCst) {
                    let violations = world.read().check_invariants();
                    assert!(violations.is_empty(), "{:?}", violations);
                    checks += 1;
                    thread::sleep(Duration::from_millis(1));
                }
                checks
            })
        };

        let outcome = controller.run().unwrap();
        done.store(true, Ordering::SeqCst);
        assert!(checker.join().unwrap() > 0);

        let w = world.read();
        assert!(w.check_invariants().is_empty());
        let alive = w.alive_teams();
        match outcome.winner {
            Some(team) => assert_eq!(alive, vec![team]),
            None => assert_ne!(alive.len(), 1),
        }
        let destroyed = w.units().iter().filter(|u| !u.alive).count();
        assert_eq!(destroyed, outcome.units_destroyed);
    }
}
