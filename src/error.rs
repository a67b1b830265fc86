//! Fatal simulation errors.

use std::time::Duration;

use crate::config::ConfigError;

/// Errors that abort a battle.
///
/// Anything recoverable (a closed channel to a retired unit, a stale intent)
/// is logged and handled where it happens; only failures that leave the
/// battle unable to continue surface here.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to spawn worker thread '{name}': {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },

    #[error("renderer did not report ready within {0:?}")]
    RendererNotReady(Duration),

    #[error("{0} worker(s) panicked")]
    WorkerPanicked(usize),
}
