//! Synchronised access to the world.
//!
//! `SharedWorld` is a cloneable handle given to every worker. Agents and
//! leaders read through [`SharedWorld::read`], the controller mutates through
//! [`SharedWorld::write`]. A pending writer closes a turnstile that new
//! readers must pass, so a steady stream of readers cannot starve it.
//!
//! The renderer does not lock at all. Each write guard publishes the glyph
//! grid and the alive counts into atomic mirrors when it is released, and
//! [`SharedWorld::snapshot`] reads those mirrors. A snapshot can mix two
//! consecutive writes; that is accepted since frames are refreshed
//! continuously.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::cell::GLYPH_EMPTY;
use super::world::World;

struct Inner {
    world: RwLock<World>,
    turnstile: Mutex<()>,
    height: usize,
    width: usize,
    glyphs: Vec<AtomicU32>,
    alive: Vec<AtomicUsize>,
}

impl Inner {
    fn publish(&self, world: &World) {
        for (slot, symbol) in self.glyphs.iter().zip(world.symbols()) {
            slot.store(symbol as u32, Ordering::Relaxed);
        }
        for (team, slot) in self.alive.iter().enumerate() {
            slot.store(world.alive_count(team), Ordering::Relaxed);
        }
    }
}

/// Handle to the world shared by the controller, leaders, agents and the
/// renderer.
#[derive(Clone)]
pub struct SharedWorld {
    inner: Arc<Inner>,
}

impl fmt::Debug for SharedWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedWorld")
            .field("height", &self.inner.height)
            .field("width", &self.inner.width)
            .finish_non_exhaustive()
    }
}

impl SharedWorld {
    pub fn new(world: World) -> Self {
        let height = world.height();
        let width = world.width();
        let glyphs = (0..height * width)
            .map(|_| AtomicU32::new(GLYPH_EMPTY as u32))
            .collect();
        let alive = (0..world.teams()).map(|_| AtomicUsize::new(0)).collect();
        let inner = Inner {
            world: RwLock::new(world),
            turnstile: Mutex::new(()),
            height,
            width,
            glyphs,
            alive,
        };
        {
            let world = inner.world.read().unwrap_or_else(PoisonError::into_inner);
            inner.publish(&world);
        }
        SharedWorld { inner: Arc::new(inner) }
    }

    /// Acquires shared read access. Blocks while a writer holds or is
    /// waiting for the world.
    pub fn read(&self) -> RwLockReadGuard<'_, World> {
        drop(self.inner.turnstile.lock().unwrap_or_else(PoisonError::into_inner));
        self.inner.world.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Acquires exclusive write access. New readers are held back from the
    /// moment this is called until the returned guard is dropped.
    pub fn write(&self) -> WorldWriteGuard<'_> {
        let gate = self.inner.turnstile.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = self.inner.world.write().unwrap_or_else(PoisonError::into_inner);
        drop(gate);
        WorldWriteGuard {
            guard,
            inner: &self.inner,
        }
    }

    /// Reads the last published glyph grid and alive counts without locking.
    pub fn snapshot(&self) -> Snapshot {
        let glyphs = self
            .inner
            .glyphs
            .iter()
            .map(|g| char::from_u32(g.load(Ordering::Relaxed)).unwrap_or(GLYPH_EMPTY))
            .collect();
        let alive = self
            .inner
            .alive
            .iter()
            .map(|a| a.load(Ordering::Relaxed))
            .collect();
        Snapshot {
            height: self.inner.height,
            width: self.inner.width,
            glyphs,
            alive,
        }
    }

    /// Consumes the handle and returns the world if no other handle is left.
    pub fn try_unwrap(self) -> Result<World, SharedWorld> {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => Ok(inner.world.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(inner) => Err(SharedWorld { inner }),
        }
    }
}

/// Exclusive access to the world. Publishes the renderer mirrors on drop.
pub struct WorldWriteGuard<'a> {
    guard: RwLockWriteGuard<'a, World>,
    inner: &'a Inner,
}

impl Deref for WorldWriteGuard<'_> {
    type Target = World;

    fn deref(&self) -> &World {
        &self.guard
    }
}

impl DerefMut for WorldWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut World {
        &mut self.guard
    }
}

impl Drop for WorldWriteGuard<'_> {
    fn drop(&mut self) {
        self.inner.publish(&self.guard);
    }
}

/// A lock-free copy of what the renderer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub height: usize,
    pub width: usize,
    /// Cell glyphs, row-major.
    pub glyphs: Vec<char>,
    /// Alive count per team.
    pub alive: Vec<usize>,
}

impl Snapshot {
    /// Glyph at (`row`, `col`).
    pub fn glyph(&self, row: usize, col: usize) -> Option<char> {
        if row < self.height && col < self.width {
            self.glyphs.get(row * self.width + col).copied()
        } else {
            None
        }
    }

    /// Iterates over the rows of the grid.
    pub fn rows(&self) -> impl Iterator<Item = &[char]> {
        self.glyphs.chunks(self.width.max(1))
    }

    /// The only team with living units, if exactly one remains.
    pub fn sole_survivor(&self) -> Option<usize> {
        let mut alive = self.alive.iter().enumerate().filter(|(_, n)| **n > 0);
        match (alive.next(), alive.next()) {
            (Some((team, _)), None) => Some(team),
            _ => None,
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let line: String = row.iter().collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
