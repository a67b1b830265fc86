//! Simulation configuration.
//!
//! Every constant the battle depends on lives in [`SimConfig`] so that it can
//! be injected from a JSON file, overridden from the command line, or shrunk
//! in tests. Defaults reproduce the classic 20x20, three-team setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::board::cell::RESERVED_GLYPHS;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("grid must be at least 1x1, got {height}x{width}")]
    EmptyGrid { height: usize, width: usize },

    #[error("at least 2 teams are required, got {0}")]
    TooFewTeams(usize),

    #[error("units_per_team must be positive")]
    NoUnits,

    #[error("{units} units do not fit on a grid of {cells} cells")]
    Overcrowded { units: usize, cells: usize },

    #[error("{0} overflows")]
    TooLarge(&'static str),

    #[error("{0} must be positive")]
    ZeroValue(&'static str),

    #[error("{teams} teams need {teams} glyphs, only {glyphs} configured")]
    MissingGlyphs { teams: usize, glyphs: usize },

    #[error("team glyph '{0}' collides with a reserved cell glyph")]
    ReservedGlyph(char),

    #[error("team glyph '{0}' is used by more than one team")]
    DuplicateGlyph(char),
}

/// Tunable constants for one battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of grid rows.
    pub grid_height: usize,
    /// Number of grid columns.
    pub grid_width: usize,
    /// Number of competing teams.
    pub teams: usize,
    /// Units spawned for every team.
    pub units_per_team: usize,
    /// Health a unit starts with.
    pub max_health: u32,
    /// Health removed by one successful attack.
    pub attack_damage: u32,
    /// Maximum Chebyshev distance an attack can reach.
    pub attack_range: usize,
    /// Maximum step per axis for a single move.
    pub move_range: usize,
    /// Length of one round in milliseconds.
    pub round_duration_ms: u64,
    /// Commands a leader dispatches to its units per turn.
    pub dispatches_per_turn: usize,
    /// Capacity of the bounded intent channel.
    pub intent_capacity: usize,
    /// Random destinations tried before a unit gives up moving.
    pub move_attempts: usize,
    /// Optional cap on the number of rounds before a draw is declared.
    pub max_rounds: Option<u32>,
    /// How long the controller waits for the renderer to become ready.
    pub ready_timeout_ms: u64,
    /// Interval between two renderer frames in milliseconds.
    pub render_interval_ms: u64,
    /// One display glyph per team, in team order.
    pub team_glyphs: String,
    /// Random seed (0 = use entropy).
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            grid_height: 20,
            grid_width: 20,
            teams: 3,
            units_per_team: 3,
            max_health: 50,
            attack_damage: 10,
            attack_range: 20,
            move_range: 1,
            round_duration_ms: 5000,
            dispatches_per_turn: 2,
            intent_capacity: 10,
            move_attempts: 32,
            max_rounds: None,
            ready_timeout_ms: 5000,
            render_interval_ms: 10,
            team_glyphs: "ABCDEFGHIJKLMNOPQRSTUVWYZ".to_string(),
            seed: 0,
        }
    }
}

impl SimConfig {
    /// Checks that the configuration describes a playable battle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_height == 0 || self.grid_width == 0 {
            return Err(ConfigError::EmptyGrid {
                height: self.grid_height,
                width: self.grid_width,
            });
        }
        if self.teams < 2 {
            return Err(ConfigError::TooFewTeams(self.teams));
        }
        if self.units_per_team == 0 {
            return Err(ConfigError::NoUnits);
        }
        let Some(units) = self.teams.checked_mul(self.units_per_team) else {
            return Err(ConfigError::TooLarge("teams * units_per_team"));
        };
        let Some(cells) = self.grid_height.checked_mul(self.grid_width) else {
            return Err(ConfigError::TooLarge("grid_height * grid_width"));
        };
        if units > cells {
            return Err(ConfigError::Overcrowded { units, cells });
        }

        let positive = [
            ("max_health", self.max_health as u64),
            ("attack_damage", self.attack_damage as u64),
            ("move_range", self.move_range as u64),
            ("round_duration_ms", self.round_duration_ms),
            ("dispatches_per_turn", self.dispatches_per_turn as u64),
            ("intent_capacity", self.intent_capacity as u64),
            ("move_attempts", self.move_attempts as u64),
            ("ready_timeout_ms", self.ready_timeout_ms),
            ("render_interval_ms", self.render_interval_ms),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::ZeroValue(name));
        }

        let glyphs: Vec<char> = self.team_glyphs.chars().collect();
        if glyphs.len() < self.teams {
            return Err(ConfigError::MissingGlyphs {
                teams: self.teams,
                glyphs: glyphs.len(),
            });
        }
        for (i, &g) in glyphs.iter().take(self.teams).enumerate() {
            if RESERVED_GLYPHS.contains(&g) {
                return Err(ConfigError::ReservedGlyph(g));
            }
            if glyphs[..i].contains(&g) {
                return Err(ConfigError::DuplicateGlyph(g));
            }
        }
        Ok(())
    }

    /// Glyphs of the configured teams, in team order.
    pub fn glyphs(&self) -> Vec<char> {
        self.team_glyphs.chars().take(self.teams).collect()
    }

    /// The round timer length.
    pub fn round_duration(&self) -> Duration {
        Duration::from_millis(self.round_duration_ms)
    }

    /// The renderer refresh interval.
    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    /// How long to wait for the renderer before giving up.
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Derives a per-worker seed, or 0 when the battle runs on entropy.
    pub fn worker_seed(&self, salt: u64) -> u64 {
        if self.seed == 0 {
            0
        } else {
            self.seed
                .wrapping_mul(0x9E37_79B9_7F4A_7C15)
                .wrapping_add(salt)
                .max(1)
        }
    }
}

/// Parses a configuration from a JSON string. Missing fields take defaults.
pub fn parse_config(json: &str) -> Result<SimConfig, ConfigError> {
    let config: SimConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Loads a configuration from a JSON file on disk.
pub fn load_config(path: &Path) -> Result<SimConfig, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&data)
}

/// Command-line overrides shared by the binaries.
///
/// A config file, when given, replaces the defaults; individual flags then
/// override single fields of it.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Grid rows
    #[arg(long)]
    pub height: Option<usize>,

    /// Grid columns
    #[arg(long)]
    pub width: Option<usize>,

    /// Number of teams
    #[arg(short, long)]
    pub teams: Option<usize>,

    /// Units per team
    #[arg(short, long)]
    pub units: Option<usize>,

    /// Starting health of every unit
    #[arg(long)]
    pub health: Option<u32>,

    /// Damage dealt by one attack
    #[arg(long)]
    pub damage: Option<u32>,

    /// Maximum attack distance
    #[arg(long)]
    pub attack_range: Option<usize>,

    /// Round length in milliseconds
    #[arg(long)]
    pub round_ms: Option<u64>,

    /// Stop after this many rounds without a winner
    #[arg(long)]
    pub max_rounds: Option<u32>,

    /// Random seed (0 = entropy)
    #[arg(short, long)]
    pub seed: Option<u64>,
}

impl ConfigOverrides {
    /// Builds the effective, validated configuration.
    pub fn resolve(&self) -> Result<SimConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => SimConfig::default(),
        };
        if let Some(v) = self.height {
            config.grid_height = v;
        }
        if let Some(v) = self.width {
            config.grid_width = v;
        }
        if let Some(v) = self.teams {
            config.teams = v;
        }
        if let Some(v) = self.units {
            config.units_per_team = v;
        }
        if let Some(v) = self.health {
            config.max_health = v;
        }
        if let Some(v) = self.damage {
            config.attack_damage = v;
        }
        if let Some(v) = self.attack_range {
            config.attack_range = v;
        }
        if let Some(v) = self.round_ms {
            config.round_duration_ms = v;
        }
        if self.max_rounds.is_some() {
            config.max_rounds = self.max_rounds;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        config.validate()?;
        Ok(config)
    }
}
