//! Common types and enums for the projectile system.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Plain integer handle of a projectile owned by the simulation.
///
/// Collaborators (tracers, audio, UI) only ever see this id; they never hold a
/// reference back into the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Reflect)]
pub struct ProjectileId(pub u64);

/// Handle of a collider returned by spatial queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Reflect)]
pub struct ColliderId(pub u64);

impl ColliderId {
    /// Collider handle for an ECS entity that carries the collider.
    pub fn from_entity(entity: Entity) -> Self {
        Self(entity.to_bits())
    }
}

/// Handle of the shooter that owns a projectile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Reflect)]
pub struct OwnerId(pub u64);

impl OwnerId {
    /// Owner handle for a shooter entity.
    pub fn from_entity(entity: Entity) -> Self {
        Self(entity.to_bits())
    }
}

/// Registration handle handed out by a [`VisualSink`](crate::services::VisualSink).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Reflect)]
pub struct VisualHandle(pub u64);

/// Layer bits used to filter spatial queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Reflect, Serialize, Deserialize)]
pub struct CollisionMask(pub u32);

impl CollisionMask {
    /// Matches every layer.
    pub const ALL: Self = Self(u32::MAX);
    /// Matches nothing.
    pub const NONE: Self = Self(0);
}

impl Default for CollisionMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Rule governing how a projectile's speed evolves over its lifetime.
///
/// # Example
/// ```
/// use bevy_bullet_time::types::TravelLaw;
///
/// assert!(TravelLaw::DelayedHitscan.is_hitscan());
/// assert!(!TravelLaw::PulseSpeed.is_hitscan());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Reflect, Serialize, Deserialize)]
pub enum TravelLaw {
    /// Resolved instantly at fire with a single ray
    Hitscan,
    /// Fixed at the minimum speed
    #[default]
    ConstantSlow,
    /// Fixed at the maximum speed
    ConstantFast,
    /// Starts slow, accelerates linearly up to the maximum
    SlowAccelerate,
    /// Starts fast, decelerates linearly down to the minimum
    FastDecelerate,
    /// Eases from minimum to maximum over `curve_time`
    CurveAccelerate,
    /// Oscillates between minimum and maximum
    PulseSpeed,
    /// Waits for a short delay, then behaves as [`TravelLaw::Hitscan`]
    DelayedHitscan,
}

impl TravelLaw {
    /// Whether the law resolves with a ray instead of continuous motion.
    pub fn is_hitscan(self) -> bool {
        matches!(self, Self::Hitscan | Self::DelayedHitscan)
    }
}

/// Speed parameters consumed by the travel laws.
///
/// # Fields
/// * `min_speed` - Lower speed bound (units/s)
/// * `max_speed` - Upper speed bound (units/s)
/// * `accel_rate` - Acceleration used by [`TravelLaw::SlowAccelerate`] (units/s²)
/// * `decel_rate` - Deceleration used by [`TravelLaw::FastDecelerate`] (units/s²)
/// * `curve_time` - Seconds for [`TravelLaw::CurveAccelerate`] to reach `max_speed`
/// * `pulse_frequency` - Oscillations per second for [`TravelLaw::PulseSpeed`]
#[derive(Clone, Copy, Debug, PartialEq, Reflect, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedProfile {
    pub min_speed: f32,
    pub max_speed: f32,
    pub accel_rate: f32,
    pub decel_rate: f32,
    pub curve_time: f32,
    pub pulse_frequency: f32,
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self {
            min_speed: 12.0,
            max_speed: 40.0,
            accel_rate: 30.0,
            decel_rate: 30.0,
            curve_time: 0.6,
            pulse_frequency: 1.5,
        }
    }
}

/// Side a projectile (or a target) fights for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Reflect, Serialize, Deserialize)]
pub enum Faction {
    #[default]
    Player,
    Enemy,
}

/// Homing state of a player projectile being called back.
#[derive(Clone, Copy, Debug, PartialEq, Default, Reflect)]
pub enum RecallState {
    #[default]
    Inactive,
    /// Steering toward the owner's last known position
    Recalling { target: Vec3 },
}

impl RecallState {
    pub fn is_recalling(&self) -> bool {
        matches!(self, Self::Recalling { .. })
    }
}

/// Lifecycle state of a projectile.
///
/// `Unfired → Fired → {Bouncing, Piercing, Recalling} → Terminal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Reflect)]
pub enum LifecycleState {
    /// Following the emitter's muzzle, no collision
    #[default]
    Unfired,
    /// Travelling, no surface contact yet
    Fired,
    /// Bounced off at least one surface
    Bouncing,
    /// Passed through at least one target
    Piercing,
    /// Homing back to the owner
    Recalling,
    /// Absorbing end state
    Terminal,
}

/// Why a projectile left the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Reflect)]
pub enum TerminationReason {
    /// Non-piercing projectile hit a damageable target
    TargetHit,
    /// Piercing budget dropped to zero
    PiercingExhausted,
    /// `age` reached `max_lifetime`
    LifetimeExceeded,
    /// Collision after the last allowed bounce
    BounceBudgetExceeded,
    /// Recalled projectile reached its owner
    RecallCompleted,
    /// Hitscan ray stopped on a surface or target
    HitscanResolved,
    /// Hitscan ray reached its range without hitting anything
    HitscanMissed,
    /// A collision could not be resolved into a valid state
    Unresolvable,
    /// Destroyed from outside the simulation
    Cancelled,
}

impl TerminationReason {
    /// Whether an explosive projectile detonates when it ends this way.
    pub fn detonates(self) -> bool {
        matches!(
            self,
            Self::TargetHit
                | Self::PiercingExhausted
                | Self::LifetimeExceeded
                | Self::BounceBudgetExceeded
                | Self::HitscanResolved
        )
    }

    /// Whether the end is visible as an impact at the projectile's position.
    pub fn is_impact(self) -> bool {
        matches!(
            self,
            Self::TargetHit
                | Self::PiercingExhausted
                | Self::BounceBudgetExceeded
                | Self::HitscanResolved
                | Self::Unresolvable
        )
    }
}

/// Surface contact reported by a spatial query.
///
/// # Fields
/// * `point` - World-space contact point
/// * `normal` - Unit surface normal pointing away from the collider
/// * `collider` - Handle of the collider touched
/// * `distance` - Distance from the query origin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    pub point: Vec3,
    pub normal: Vec3,
    pub collider: ColliderId,
    pub distance: f32,
}

impl Contact {
    /// Normal re-normalized, or `None` when the query returned no usable normal.
    pub fn usable_normal(&self) -> Option<Vec3> {
        if !self.normal.is_finite() {
            return None;
        }
        self.normal.try_normalize()
    }
}

/// Shape swept or overlapped by shape queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum QueryShape {
    Sphere { radius: f32 },
}

/// Projectile spawn parameters builder.
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_bullet_time::types::{Faction, ProjectileSpawnParams, TravelLaw};
///
/// let params = ProjectileSpawnParams::new(Vec3::ZERO, Vec3::X, TravelLaw::ConstantFast)
///     .with_damage(20.0)
///     .with_bounces(3, 0.2)
///     .with_piercing(2.0)
///     .with_faction(Faction::Enemy);
/// assert_eq!(params.max_bounces, 3);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectileSpawnParams {
    pub origin: Vec3,
    pub direction: Vec3,
    pub travel_law: TravelLaw,
    pub speed_profile: SpeedProfile,
    pub damage: f32,
    pub knockback_force: f32,
    pub faction: Faction,
    pub owner: Option<OwnerId>,
    pub max_bounces: u32,
    pub bounce_energy_loss: f32,
    pub piercing_budget: f32,
    pub explosion: Option<(f32, f32)>,
    pub time_resistance: f32,
    pub radius: f32,
    pub spin_rate: f32,
    /// `None` uses the configured default lifetime
    pub max_lifetime: Option<f32>,
}

impl Default for ProjectileSpawnParams {
    fn default() -> Self {
        Self {
            origin: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            travel_law: TravelLaw::ConstantSlow,
            speed_profile: SpeedProfile::default(),
            damage: 10.0,
            knockback_force: 2.0,
            faction: Faction::Player,
            owner: None,
            max_bounces: 0,
            bounce_energy_loss: 0.0,
            piercing_budget: 0.0,
            explosion: None,
            time_resistance: 0.0,
            radius: 0.1,
            spin_rate: 0.0,
            max_lifetime: None,
        }
    }
}

impl ProjectileSpawnParams {
    /// Creates parameters for a projectile leaving `origin` along `direction`.
    ///
    /// The direction is normalized; a zero direction falls back to -Z.
    pub fn new(origin: Vec3, direction: Vec3, travel_law: TravelLaw) -> Self {
        Self {
            origin,
            direction: direction.try_normalize().unwrap_or(Vec3::NEG_Z),
            travel_law,
            ..Default::default()
        }
    }

    pub fn with_speed_profile(mut self, profile: SpeedProfile) -> Self {
        self.speed_profile = profile;
        self
    }

    pub fn with_damage(mut self, damage: f32) -> Self {
        self.damage = damage;
        self
    }

    pub fn with_knockback(mut self, force: f32) -> Self {
        self.knockback_force = force;
        self
    }

    pub fn with_faction(mut self, faction: Faction) -> Self {
        self.faction = faction;
        self
    }

    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Allows `max_bounces` bounces, each keeping `1 - energy_loss` of the speed.
    pub fn with_bounces(mut self, max_bounces: u32, energy_loss: f32) -> Self {
        self.max_bounces = max_bounces;
        self.bounce_energy_loss = energy_loss.clamp(0.0, 1.0);
        self
    }

    pub fn with_piercing(mut self, budget: f32) -> Self {
        self.piercing_budget = budget.max(0.0);
        self
    }

    /// Makes the projectile explode on impact with linear damage falloff.
    pub fn with_explosion(mut self, radius: f32, damage: f32) -> Self {
        self.explosion = Some((radius.max(0.0), damage.max(0.0)));
        self
    }

    pub fn with_time_resistance(mut self, resistance: f32) -> Self {
        self.time_resistance = resistance.clamp(0.0, 1.0);
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius.max(0.0);
        self
    }

    pub fn with_spin(mut self, rate: f32) -> Self {
        self.spin_rate = rate;
        self
    }

    pub fn with_lifetime(mut self, seconds: f32) -> Self {
        self.max_lifetime = Some(seconds);
        self
    }
}
