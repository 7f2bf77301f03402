//! Data-driven engine configuration.
//!
//! Every tunable used by the systems lives here so balance changes never
//! require recompilation. Each section defaults independently, which lets a
//! TOML file override a single knob without restating the rest.

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Position, ValidationMode};

/// Errors raised while loading or validating an [`EngineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration text was not valid TOML for the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value parsed correctly but lies outside its permitted range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Explanation of the constraint that was violated.
        reason: &'static str,
    },
}

/// Complete set of engine tunables.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Broad-phase grid settings.
    pub spatial: SpatialConfig,
    /// Placement rule settings.
    pub placement: PlacementConfig,
    /// Stability cache and scheduling settings.
    pub stability: StabilityConfig,
    /// Zone partitioning settings.
    pub zones: ZoneConfig,
    /// Damage and collapse settings.
    pub damage: DamageConfig,
}

impl EngineConfig {
    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Checks that every value lies within its permitted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.spatial.cell_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "spatial.cell_size",
                reason: "must be positive",
            });
        }
        if self.placement.min_distance_from_barn > self.placement.max_distance_from_barn {
            return Err(ConfigError::Invalid {
                field: "placement.min_distance_from_barn",
                reason: "must not exceed max_distance_from_barn",
            });
        }
        if self.placement.min_piece_spacing < 0.0 {
            return Err(ConfigError::Invalid {
                field: "placement.min_piece_spacing",
                reason: "must not be negative",
            });
        }
        if !(self.zones.zone_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "zones.zone_size",
                reason: "must be positive",
            });
        }
        if !(0.0..=1.0).contains(&self.damage.cascade_damage_fraction) {
            return Err(ConfigError::Invalid {
                field: "damage.cascade_damage_fraction",
                reason: "must lie within [0, 1]",
            });
        }
        Ok(())
    }
}

/// Settings of the broad-phase spatial hash.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    /// Side length of a grid cell in world units.
    pub cell_size: f32,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self { cell_size: 10.0 }
    }
}

/// Settings of the placement rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Location of the barn every piece is measured against.
    pub anchor: Position,
    /// Smallest permitted planar distance from the anchor (inclusive).
    pub min_distance_from_barn: f32,
    /// Largest permitted planar distance from the anchor (inclusive).
    pub max_distance_from_barn: f32,
    /// Pieces closer than this to an existing piece are blocked.
    pub min_piece_spacing: f32,
    /// Horizontal reach of the potential-support search.
    pub support_search_radius: f32,
    /// Vertical reach of the potential-support search.
    pub support_search_height: f32,
    /// Validator mode selected at startup.
    pub mode: ValidationMode,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            anchor: Position::default(),
            min_distance_from_barn: 3.0,
            max_distance_from_barn: 60.0,
            min_piece_spacing: 1.0,
            support_search_radius: 2.5,
            support_search_height: 3.0,
            mode: ValidationMode::Heuristic,
        }
    }
}

/// Settings of the stability cache and update scheduler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Age in milliseconds after which a cached value counts as a miss.
    pub max_cache_age_ms: u64,
    /// Upper bound on the number of cached values.
    pub max_cache_size: usize,
    /// Per-frame recomputation budget in milliseconds.
    pub default_budget_ms: u64,
}

impl StabilityConfig {
    /// Maximum cache age as a [`Duration`].
    #[must_use]
    pub fn max_cache_age(&self) -> Duration {
        Duration::from_millis(self.max_cache_age_ms)
    }

    /// Per-frame budget as a [`Duration`].
    #[must_use]
    pub fn default_budget(&self) -> Duration {
        Duration::from_millis(self.default_budget_ms)
    }
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            max_cache_age_ms: 1_000,
            max_cache_size: 1_000,
            default_budget_ms: 2,
        }
    }
}

/// Settings of the zone partitioning used to scope recomputation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Side length of a zone in world units.
    pub zone_size: f32,
    /// Number of zone rings around the player kept active.
    pub active_zone_radius: u32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            zone_size: 50.0,
            active_zone_radius: 2,
        }
    }
}

/// Settings of damage propagation and collapse effects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageConfig {
    /// Neighbours within this planar distance of a destroyed entity are weakened.
    pub cascade_radius: f32,
    /// Fraction of a neighbour's maximum health dealt as structural damage.
    pub cascade_damage_fraction: f32,
    /// Length of a collapse animation in milliseconds.
    pub collapse_duration_ms: u64,
    /// Delay in milliseconds before a detached piece is destroyed.
    pub collapse_delay_ms: u64,
}

impl DamageConfig {
    /// Collapse animation length as a [`Duration`].
    #[must_use]
    pub fn collapse_duration(&self) -> Duration {
        Duration::from_millis(self.collapse_duration_ms)
    }

    /// Detached-piece destruction delay as a [`Duration`].
    #[must_use]
    pub fn collapse_delay(&self) -> Duration {
        Duration::from_millis(self.collapse_delay_ms)
    }
}

impl Default for DamageConfig {
    fn default() -> Self {
        Self {
            cascade_radius: 3.0,
            cascade_damage_fraction: 0.25,
            collapse_duration_ms: 1_200,
            collapse_delay_ms: 400,
        }
    }
}
