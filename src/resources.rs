//! Global resources for the projectile system.

use std::collections::BTreeMap;
use std::fmt;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::services::TimeProvider;
use crate::types::{CollisionMask, ProjectileId, VisualHandle};

/// Global configuration for the projectile system.
///
/// # Fields
/// * `default_lifetime` - Lifetime (scaled seconds) for projectiles spawned without one
/// * `collision_mask` - Layers projectiles collide with
/// * `bounce` - Corner resolution and exclusion tuning
/// * `recall` - Boomerang steering tuning
/// * `hitscan` - Ray range and delay for hitscan laws
/// * `debug_draw` - Whether the debug plugin draws gizmos
///
/// # Example
/// ```
/// use bevy_bullet_time::resources::ProjectileConfig;
///
/// let config = ProjectileConfig::from_ron("(default_lifetime: 3.0, bounce: (max_corner_iterations: 6))")
///     .expect("valid config");
/// assert_eq!(config.bounce.max_corner_iterations, 6);
/// assert_eq!(config.recall, Default::default());
/// ```
#[derive(Resource, Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[reflect(Resource)]
#[serde(default)]
pub struct ProjectileConfig {
    pub default_lifetime: f32,
    pub collision_mask: CollisionMask,
    pub bounce: BounceConfig,
    pub recall: RecallConfig,
    pub hitscan: HitscanConfig,
    pub debug_draw: bool,
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            default_lifetime: 6.0,
            collision_mask: CollisionMask::ALL,
            bounce: BounceConfig::default(),
            recall: RecallConfig::default(),
            hitscan: HitscanConfig::default(),
            debug_draw: false,
        }
    }
}

/// Bounce resolution tuning.
///
/// None of these have a principled derivation; they are exposed so each game
/// can tune them against its own level geometry.
#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BounceConfig {
    /// Distance from the exclusion point a projectile must exceed (while not
    /// overlapping) before the collider becomes eligible again
    pub min_safe_distance: f32,
    /// Upper bound on reflections while resolving one corner
    pub max_corner_iterations: u32,
    /// Push along the surface normal after a reflection
    pub separation_offset: f32,
    /// Extra radius added to the contact query
    pub contact_skin: f32,
}

impl Default for BounceConfig {
    fn default() -> Self {
        Self {
            min_safe_distance: 0.5,
            max_corner_iterations: 4,
            separation_offset: 0.05,
            contact_skin: 0.02,
        }
    }
}

/// Recall (boomerang) tuning.
#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    /// Minimum blend toward the owner per tick, in `(0, 1]`
    pub turn_rate: f32,
    /// Speed multiplier applied when the recall starts
    pub speed_multiplier: f32,
    /// Distance to the owner at which the projectile is caught
    pub completion_distance: f32,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            turn_rate: 0.2,
            speed_multiplier: 2.0,
            completion_distance: 1.0,
        }
    }
}

/// Hitscan tuning.
#[derive(Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitscanConfig {
    /// Maximum ray length
    pub range: f32,
    /// Scaled seconds a delayed hitscan waits before casting
    pub delay: f32,
}

impl Default for HitscanConfig {
    fn default() -> Self {
        Self {
            range: 120.0,
            delay: 0.15,
        }
    }
}

/// Invalid projectile configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The RON text could not be parsed
    Parse(String),
    /// A field is outside its valid range
    OutOfRange { field: &'static str, value: f32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(message) => write!(f, "failed to parse projectile config: {message}"),
            Self::OutOfRange { field, value } => {
                write!(f, "projectile config field `{field}` out of range: {value}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl ProjectileConfig {
    /// Parses a RON document and validates it.
    ///
    /// Missing fields keep their defaults.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every tuning value against its valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(field: &'static str, value: f32, valid: bool) -> Result<(), ConfigError> {
            if valid && value.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange { field, value })
            }
        }

        check("default_lifetime", self.default_lifetime, self.default_lifetime > 0.0)?;
        check(
            "bounce.min_safe_distance",
            self.bounce.min_safe_distance,
            self.bounce.min_safe_distance >= 0.0,
        )?;
        check(
            "bounce.max_corner_iterations",
            self.bounce.max_corner_iterations as f32,
            self.bounce.max_corner_iterations >= 1,
        )?;
        check(
            "bounce.separation_offset",
            self.bounce.separation_offset,
            self.bounce.separation_offset >= 0.0,
        )?;
        check("bounce.contact_skin", self.bounce.contact_skin, self.bounce.contact_skin >= 0.0)?;
        check(
            "recall.turn_rate",
            self.recall.turn_rate,
            self.recall.turn_rate > 0.0 && self.recall.turn_rate <= 1.0,
        )?;
        check(
            "recall.speed_multiplier",
            self.recall.speed_multiplier,
            self.recall.speed_multiplier > 0.0,
        )?;
        check(
            "recall.completion_distance",
            self.recall.completion_distance,
            self.recall.completion_distance > 0.0,
        )?;
        check("hitscan.range", self.hitscan.range, self.hitscan.range > 0.0)?;
        check("hitscan.delay", self.hitscan.delay, self.hitscan.delay >= 0.0)?;
        Ok(())
    }
}

/// Global time-dilation scalar, written by the game every frame.
///
/// The value is driven by the player's movement; this crate only reads it.
///
/// # Example
/// ```
/// use bevy_bullet_time::resources::TimeDilation;
/// use bevy_bullet_time::services::TimeProvider;
///
/// let dilation = TimeDilation::new(0.5);
/// assert_eq!(dilation.effective_time_scale(0.0), 0.5);
/// assert_eq!(dilation.effective_time_scale(0.5), 0.25);
/// ```
#[derive(Resource, Reflect, Clone, Copy, Debug, PartialEq)]
#[reflect(Resource)]
pub struct TimeDilation {
    /// Global scale `g`; 1.0 is real time
    pub global_scale: f32,
}

impl Default for TimeDilation {
    fn default() -> Self {
        Self { global_scale: 1.0 }
    }
}

impl TimeDilation {
    pub fn new(global_scale: f32) -> Self {
        Self {
            global_scale: global_scale.max(0.0),
        }
    }
}

impl TimeProvider for TimeDilation {
    /// `g · (1 − r)` with `r` clamped to `[0, 1]`.
    fn effective_time_scale(&self, resistance: f32) -> f32 {
        self.global_scale.max(0.0) * (1.0 - resistance.clamp(0.0, 1.0))
    }
}

/// Id-indexed table of tracer registrations.
///
/// The VFX layer reads this table to know which projectiles currently need a
/// tracer; projectiles themselves only keep the [`VisualHandle`].
#[derive(Resource, Default, Debug)]
pub struct TracerRegistry {
    next_handle: u64,
    entries: BTreeMap<VisualHandle, ProjectileId>,
}

impl TracerRegistry {
    pub fn register(&mut self, projectile: ProjectileId) -> VisualHandle {
        self.next_handle += 1;
        let handle = VisualHandle(self.next_handle);
        self.entries.insert(handle, projectile);
        handle
    }

    /// Releases a registration. Unknown handles are ignored.
    pub fn unregister(&mut self, handle: VisualHandle) -> bool {
        self.entries.remove(&handle).is_some()
    }

    pub fn projectile_of(&self, handle: VisualHandle) -> Option<ProjectileId> {
        self.entries.get(&handle).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VisualHandle, ProjectileId)> + '_ {
        self.entries.iter().map(|(handle, id)| (*handle, *id))
    }
}
