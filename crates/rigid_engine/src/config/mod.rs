//! Configuration system
//!
//! Every tuned constant of the simulation lives here rather than as a literal
//! in the code that uses it. Files are TOML or RON, picked by extension.

pub use serde::{Serialize, Deserialize};

use crate::foundation::math::Vec3;
use crate::physics::body::floor::ControlPolicyTable;
use crate::physics::shape::instance::DEFAULT_SKIN_MARGIN;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        Self::load_from_str(&contents, path)
    }

    /// Parse configuration text, using `path` only to pick the format
    fn load_from_str(contents: &str, path: &str) -> Result<Self, ConfigError> {
        if path.ends_with(".toml") {
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Serialize configuration text, using `path` only to pick the format
    fn save_to_string(&self, path: &str) -> Result<String, ConfigError> {
        if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = self.save_to_string(path)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is outside its legal range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Shape instance defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeConfig {
    /// Contact generation margin given to newly created instances
    pub default_skin_margin: f32,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            default_skin_margin: DEFAULT_SKIN_MARGIN,
        }
    }
}

/// Capsule character controller tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerControllerConfig {
    /// Minimum `normal . up` for a contact to count as floor
    pub floor_slope_cos: f32,
    /// Ratio between the capsule's waist radius and its end-cap radius
    pub waist_scale: f32,
    /// Fraction of the heading error closed per tick
    pub heading_gain: f32,
    /// Upper bound on the commanded yaw rate, radians per second
    pub max_turn_rate: f32,
    /// Intent speeds are clamped to this magnitude
    pub max_speed: f32,
    /// Friction returned for steep (wall) contacts
    pub wall_friction: f32,
    /// Grounded / airborne control multipliers and friction
    pub policy: ControlPolicyTable,
}

impl Default for PlayerControllerConfig {
    fn default() -> Self {
        Self {
            // 45 degree climb slope
            floor_slope_cos: std::f32::consts::FRAC_1_SQRT_2,
            waist_scale: 3.0,
            heading_gain: 0.5,
            max_turn_rate: 4.0 * std::f32::consts::PI,
            max_speed: 50.0,
            wall_friction: 0.0,
            policy: ControlPolicyTable::default(),
        }
    }
}

impl PlayerControllerConfig {
    /// Check every value is within its legal range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.floor_slope_cos > 0.0 && self.floor_slope_cos <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "floor_slope_cos must be in (0, 1], got {}",
                self.floor_slope_cos
            )));
        }
        if !(self.waist_scale >= 1.0 && self.waist_scale.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "waist_scale must be >= 1, got {}",
                self.waist_scale
            )));
        }
        if !(self.heading_gain > 0.0 && self.heading_gain <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "heading_gain must be in (0, 1], got {}",
                self.heading_gain
            )));
        }
        if !(self.max_turn_rate > 0.0 && self.max_speed > 0.0) {
            return Err(ConfigError::Invalid(
                "max_turn_rate and max_speed must be positive".to_string(),
            ));
        }
        if !(self.wall_friction >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "wall_friction must be non-negative, got {}",
                self.wall_friction
            )));
        }
        self.policy.validate().map_err(ConfigError::Invalid)
    }
}

/// Top-level simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Fixed simulation step in seconds
    pub timestep: f32,
    /// Maximum fixed steps run by one `update` call
    pub max_substeps: u32,
    /// Threads used for the per-body input pass (1 = inline)
    pub worker_threads: usize,
    /// World gravity
    pub gravity: Vec3,
    /// Shape instance defaults
    pub shape: ShapeConfig,
    /// Player controller tuning
    pub player: PlayerControllerConfig,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            max_substeps: 4,
            worker_threads: 1,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            shape: ShapeConfig::default(),
            player: PlayerControllerConfig::default(),
        }
    }
}

impl Config for PhysicsConfig {}

impl PhysicsConfig {
    /// Check every value is within its legal range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.timestep > 0.0 && self.timestep.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "timestep must be positive, got {}",
                self.timestep
            )));
        }
        if self.max_substeps == 0 || self.worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "max_substeps and worker_threads must be at least 1".to_string(),
            ));
        }
        if !self.gravity.iter().all(|c| c.is_finite()) {
            return Err(ConfigError::Invalid("gravity must be finite".to_string()));
        }
        if !(self.shape.default_skin_margin >= 0.0 && self.shape.default_skin_margin.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "default_skin_margin must be non-negative, got {}",
                self.shape.default_skin_margin
            )));
        }
        self.player.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PhysicsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = PhysicsConfig::default();
        config.player.policy.airborne.control_authority = 0.2;
        config.worker_threads = 3;

        let text = config.save_to_string("physics.toml").unwrap();
        let loaded = PhysicsConfig::load_from_str(&text, "physics.toml").unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_partial_document_uses_defaults() {
        let loaded = PhysicsConfig::load_from_str("(timestep: 0.01)", "physics.ron").unwrap();
        assert_eq!(loaded.timestep, 0.01);
        assert_eq!(loaded.player, PlayerControllerConfig::default());
    }

    #[test]
    fn test_unsupported_extension() {
        let result = PhysicsConfig::load_from_str("", "physics.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PhysicsConfig::default();
        config.timestep = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PhysicsConfig::default();
        config.player.floor_slope_cos = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = PhysicsConfig::default();
        config.player.policy.airborne.control_authority = 2.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
