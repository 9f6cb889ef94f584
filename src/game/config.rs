//! Game Configuration
//!
//! Every tunable of the simulation lives in [`GameConfig`]. The defaults
//! describe a two-player match; a JSON document may override any subset.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Errors produced while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is outside its allowed range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was refused
        reason: &'static str,
    },
}

/// Size of the rectangular play field. The origin is the bottom-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    /// Width in world units
    pub width: f64,
    /// Height in world units
    pub height: f64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// Mass and radius of one kind of field object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BodyConfig {
    /// Signed mass
    pub mass: f64,
    /// Collision radius
    pub radius: f64,
}

/// Full simulation configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Play field dimensions
    pub field: FieldConfig,
    /// Global gravity constant for the inverse-square force
    pub gravity_constant: f64,
    /// Number of players the referee waits for before starting
    pub num_players: usize,
    /// Arsenal capacity ceiling
    pub max_arsenal: u32,
    /// Arsenal units regained per second
    pub arsenal_recharge_rate: f64,
    /// Bullet mass; also the arsenal cost of one shot
    pub bullet_mass: u32,
    /// Bullet collision radius
    pub bullet_radius: f64,
    /// Target body
    pub target: BodyConfig,
    /// Owned targets spawned per player
    pub targets_per_player: usize,
    /// Obstacle body (mass must be negative)
    pub obstacle: BodyConfig,
    /// Obstacles spawned by StartGame
    pub obstacle_count: usize,
    /// Muzzle speed of every cannon
    pub muzzle_speed: f64,
    /// Distance from the cannon to a freshly fired bullet
    pub muzzle_offset: f64,
    /// Inset of edge-placed tokens from the field border
    pub edge_margin: f64,
    /// Seconds between referee SyncWorlds broadcasts (0 disables)
    pub sync_interval: f64,
    /// Seconds between AI shots
    pub ai_fire_interval: f64,
    /// Max AI aim error in degrees
    pub ai_aim_jitter: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            field: FieldConfig::default(),
            gravity_constant: 50.0,
            num_players: 2,
            max_arsenal: 10,
            arsenal_recharge_rate: 2.0,
            bullet_mass: 1,
            bullet_radius: 4.0,
            target: BodyConfig {
                mass: 20.0,
                radius: 16.0,
            },
            targets_per_player: 2,
            obstacle: BodyConfig {
                mass: -30.0,
                radius: 20.0,
            },
            obstacle_count: 2,
            muzzle_speed: 300.0,
            muzzle_offset: 12.0,
            edge_margin: 30.0,
            sync_interval: 1.0,
            ai_fire_interval: 0.25,
            ai_aim_jitter: 2.0,
        }
    }
}

impl GameConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &'static str) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { field, reason })
        }

        if !(self.field.width > 0.0 && self.field.height > 0.0) {
            return invalid("field", "width and height must be positive");
        }
        if self.num_players == 0 {
            return invalid("num_players", "at least one player is required");
        }
        if self.bullet_mass == 0 {
            return invalid("bullet_mass", "must be positive");
        }
        if self.bullet_mass > self.max_arsenal {
            return invalid("bullet_mass", "must not exceed max_arsenal");
        }
        if !(self.obstacle.mass < 0.0) {
            return invalid("obstacle.mass", "must be negative");
        }
        if !(self.target.mass > 0.0) {
            return invalid("target.mass", "must be positive");
        }
        if !(self.bullet_radius > 0.0 && self.target.radius > 0.0 && self.obstacle.radius > 0.0) {
            return invalid("radius", "all radii must be positive");
        }
        if self.arsenal_recharge_rate < 0.0 || self.sync_interval < 0.0 || self.ai_fire_interval < 0.0 {
            return invalid("rates", "rates and intervals must not be negative");
        }
        if self.edge_margin < 0.0 || self.edge_margin * 2.0 >= self.field.width.min(self.field.height) {
            return invalid("edge_margin", "must fit inside the field");
        }
        Ok(())
    }

    /// Bullet mass as a physics scalar.
    #[inline]
    pub fn bullet_body(&self) -> BodyConfig {
        BodyConfig {
            mass: self.bullet_mass as f64,
            radius: self.bullet_radius,
        }
    }
}
