//! Periodic battle display.
//!
//! The monitor thread never locks the world. Every interval it takes a
//! [`Snapshot`] from the published glyph mirror, overlays every attack trace
//! it heard about since the previous frame, and hands the resulting [`Frame`] to a
//! [`FrameSink`]. It signals readiness once before its first frame and stops
//! by itself after rendering a frame with a single surviving team.

use std::fmt;
use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

use crate::board::{Position, SharedWorld, Snapshot, GLYPH_TRACE};
use crate::controller::BattleEvent;
use crate::error::SimError;

/// One rendered picture of the battle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub round: u32,
    pub snapshot: Snapshot,
}

impl Frame {
    /// Builds a frame, drawing each trace over the cells strictly between the
    /// attacker and its target so both endpoints keep their own glyph.
    pub fn new(round: u32, mut snapshot: Snapshot, traces: &[Vec<Position>]) -> Self {
        for trace in traces.iter().filter(|t| t.len() > 2) {
            for pos in &trace[1..trace.len() - 1] {
                if pos.row < snapshot.height && pos.col < snapshot.width {
                    snapshot.glyphs[pos.row * snapshot.width + pos.col] = GLYPH_TRACE;
                }
            }
        }
        Frame { round, snapshot }
    }

    pub fn sole_survivor(&self) -> Option<usize> {
        self.snapshot.sole_survivor()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "round {}", self.round)?;
        write!(f, "{}", self.snapshot)?;
        let alive: Vec<String> = self.snapshot.alive.iter().map(|n| n.to_string()).collect();
        writeln!(f, "alive {}", alive.join("/"))
    }
}

/// Destination of rendered frames.
pub trait FrameSink: Send {
    fn refresh(&mut self, frame: &Frame) -> io::Result<()>;
}

/// Writes every frame as text, separated by a blank line.
pub struct TextSink<W> {
    out: W,
}

impl<W: Write + Send> TextSink<W> {
    pub fn new(out: W) -> Self {
        TextSink { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> FrameSink for TextSink<W> {
    fn refresh(&mut self, frame: &Frame) -> io::Result<()> {
        writeln!(self.out, "{}", frame)?;
        self.out.flush()
    }
}

/// Handle to a running monitor thread.
pub struct Monitor {
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<u64>>,
}

impl Monitor {
    /// Starts the monitor. The returned receiver yields one message when the
    /// monitor is about to draw its first frame.
    pub fn spawn(
        world: SharedWorld,
        interval: Duration,
        mut sink: Box<dyn FrameSink>,
        events: Option<Receiver<BattleEvent>>,
    ) -> Result<(Monitor, Receiver<()>), SimError> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<()>();

        let worker = thread::Builder::new()
            .name("monitor".to_string())
            .spawn(move || {
                let mut round = 0;
                let mut traces = Vec::new();
                let mut frames = 0u64;
                let _ = ready_tx.send(());
                loop {
                    if let Some(events) = &events {
                        for event in events.try_iter() {
                            match event {
                                BattleEvent::RoundStarted { round: r } => round = r,
                                BattleEvent::AttackTraced { path, .. } => traces.push(path),
                                BattleEvent::UnitDestroyed { .. }
                                | BattleEvent::Winner { .. } => {}
                            }
                        }
                    }
                    let frame = Frame::new(round, world.snapshot(), &traces);
                    traces.clear();
                    if let Err(err) = sink.refresh(&frame) {
                        warn!(%err, "frame sink failed, monitor stopping");
                        break;
                    }
                    frames += 1;
                    if let Some(team) = frame.sole_survivor() {
                        debug!(team, "one team left, monitor stopping");
                        break;
                    }
                    match stop_rx.recv_timeout(interval) {
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                }
                frames
            })
            .map_err(|source| SimError::Spawn {
                name: "monitor".to_string(),
                source,
            })?;

        let monitor = Monitor {
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        };
        Ok((monitor, ready_rx))
    }

    /// Stops the monitor and returns how many frames it drew.
    pub fn stop(&mut self) -> u64 {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        match self.worker.take() {
            Some(worker) => worker.join().unwrap_or_else(|_| {
                warn!("monitor thread panicked");
                0
            }),
            None => 0,
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::board::{Unit, UnitKey, World};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Frame>>>);

    impl FrameSink for Recorder {
        fn refresh(&mut self, frame: &Frame) -> io::Result<()> {
            self.0.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    fn two_teams(alive_b: bool) -> World {
        let mut world = World::new(3, 4, 1, vec!['A', 'B']);
        world.place_unit(Unit::new(0, 0, Position::new(0, 0), 50));
        world.set_alive_count(0, 1);
        if alive_b {
            world.place_unit(Unit::new(1, 0, Position::new(2, 3), 50));
            world.set_alive_count(1, 1);
        }
        world
    }

    #[test]
    fn trace_overlay_keeps_endpoints() {
        let snapshot = SharedWorld::new(two_teams(true)).snapshot();
        let path = vec![
            Position::new(0, 0),
            Position::new(1, 1),
            Position::new(1, 2),
            Position::new(2, 3),
        ];
        let frame = Frame::new(4, snapshot, &[path]);
        assert_eq!(frame.snapshot.glyph(0, 0), Some('A'));
        assert_eq!(frame.snapshot.glyph(1, 1), Some(GLYPH_TRACE));
        assert_eq!(frame.snapshot.glyph(1, 2), Some(GLYPH_TRACE));
        assert_eq!(frame.snapshot.glyph(2, 3), Some('B'));
    }

    #[test]
    fn every_trace_since_last_frame_is_drawn() {
        let snapshot = SharedWorld::new(two_teams(true)).snapshot();
        let first = vec![Position::new(0, 0), Position::new(0, 1), Position::new(0, 2)];
        let second = vec![Position::new(2, 3), Position::new(2, 2), Position::new(2, 1)];
        let frame = Frame::new(1, snapshot, &[first, second]);
        assert_eq!(frame.snapshot.glyph(0, 1), Some(GLYPH_TRACE));
        assert_eq!(frame.snapshot.glyph(2, 2), Some(GLYPH_TRACE));
        assert_eq!(frame.snapshot.glyph(0, 2), Some('.'));
        assert_eq!(frame.snapshot.glyph(2, 1), Some('.'));
    }

    #[test]
    fn monitor_draws_all_traces_heard_between_frames() {
        let recorder = Recorder::default();
        let world = SharedWorld::new(two_teams(true));
        let (events_tx, events_rx) = mpsc::channel();
        for path in [
            vec![Position::new(0, 0), Position::new(0, 1), Position::new(0, 2)],
            vec![Position::new(2, 3), Position::new(1, 3), Position::new(0, 3)],
        ] {
            events_tx
                .send(BattleEvent::AttackTraced {
                    attacker: UnitKey::new(0, 0),
                    path,
                })
                .unwrap();
        }
        let sink = Box::new(recorder.clone());
        let (mut monitor, _ready) =
            Monitor::spawn(world, Duration::from_secs(60), sink, Some(events_rx)).unwrap();
        assert_eq!(monitor.stop(), 1);
        let first = recorder.0.lock().unwrap()[0].clone();
        assert_eq!(first.snapshot.glyph(0, 1), Some(GLYPH_TRACE));
        assert_eq!(first.snapshot.glyph(1, 3), Some(GLYPH_TRACE));
    }

    #[test]
    fn frame_text_has_header_grid_and_counts() {
        let frame = Frame::new(2, SharedWorld::new(two_teams(true)).snapshot(), &[]);
        assert_eq!(frame.to_string(), "round 2\nA...\n....\n...B\nalive 1/1\n");
    }

    #[test]
    fn text_sink_writes_frames() {
        let frame = Frame::new(1, SharedWorld::new(two_teams(true)).snapshot(), &[]);
        let mut sink = TextSink::new(Vec::new());
        sink.refresh(&frame).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.starts_with("round 1\nA..."));
    }

    #[test]
    fn monitor_signals_ready_and_stops_on_request() {
        let recorder = Recorder::default();
        let world = SharedWorld::new(two_teams(true));
        let sink = Box::new(recorder.clone());
        let (mut monitor, ready) =
            Monitor::spawn(world, Duration::from_millis(1), sink, None).unwrap();
        ready.recv_timeout(Duration::from_secs(5)).unwrap();
        thread::sleep(Duration::from_millis(20));
        let frames = monitor.stop();
        assert!(frames >= 1);
        assert_eq!(recorder.0.lock().unwrap().len() as u64, frames);
    }

    #[test]
    fn monitor_stops_by_itself_with_one_team_left() {
        let recorder = Recorder::default();
        let world = SharedWorld::new(two_teams(false));
        let sink = Box::new(recorder.clone());
        let (mut monitor, _ready) =
            Monitor::spawn(world, Duration::from_secs(60), sink, None).unwrap();
        assert_eq!(monitor.stop(), 1);
        assert_eq!(recorder.0.lock().unwrap()[0].sole_survivor(), Some(0));
    }

    #[test]
    fn monitor_follows_round_events() {
        let recorder = Recorder::default();
        let world = SharedWorld::new(two_teams(true));
        let (events_tx, events_rx) = mpsc::channel();
        events_tx.send(BattleEvent::RoundStarted { round: 7 }).unwrap();
        let sink = Box::new(recorder.clone());
        let (mut monitor, ready) =
            Monitor::spawn(world, Duration::from_millis(1), sink, Some(events_rx)).unwrap();
        ready.recv_timeout(Duration::from_secs(5)).unwrap();
        thread::sleep(Duration::from_millis(20));
        monitor.stop();
        assert!(recorder.0.lock().unwrap().iter().any(|f| f.round == 7));
    }
}
