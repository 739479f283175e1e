use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::constants::{
    ATTACK_COOLDOWN_SECS, COUNTDOWN_SECS, FIRST_SPAWN_DELAY_SECS, GAME_DURATION_SECS,
    MISS_COOLDOWN_SECS, MONSTER_DECAY_SECS, MONSTER_SPEED,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read rules file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse rules file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid rule `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Timings of one session. Every field can be overridden from a JSON file;
/// missing fields keep their defaults.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameRules {
    pub countdown_secs: f64,
    pub first_spawn_delay_secs: f64,
    pub game_duration_secs: f64,
    pub attack_cooldown_secs: f64,
    pub miss_cooldown_secs: f64,
    pub monster_speed: f64,
    pub monster_decay_secs: f64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            countdown_secs: COUNTDOWN_SECS,
            first_spawn_delay_secs: FIRST_SPAWN_DELAY_SECS,
            game_duration_secs: GAME_DURATION_SECS,
            attack_cooldown_secs: ATTACK_COOLDOWN_SECS,
            miss_cooldown_secs: MISS_COOLDOWN_SECS,
            monster_speed: MONSTER_SPEED,
            monster_decay_secs: MONSTER_DECAY_SECS,
        }
    }
}

impl GameRules {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let rules: GameRules = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        rules.validate()?;
        Ok(rules)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn with_duration(mut self, game_duration_secs: f64) -> Self {
        self.game_duration_secs = game_duration_secs;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("countdownSecs", self.countdown_secs),
            ("firstSpawnDelaySecs", self.first_spawn_delay_secs),
            ("gameDurationSecs", self.game_duration_secs),
            ("attackCooldownSecs", self.attack_cooldown_secs),
            ("missCooldownSecs", self.miss_cooldown_secs),
            ("monsterSpeed", self.monster_speed),
            ("monsterDecaySecs", self.monster_decay_secs),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("expected a finite non-negative number, got {value}"),
                });
            }
        }
        if self.miss_cooldown_secs < self.attack_cooldown_secs {
            return Err(ConfigError::Invalid {
                field: "missCooldownSecs",
                reason: "a miss must cool down at least as long as a hit".to_string(),
            });
        }
        Ok(())
    }
}
