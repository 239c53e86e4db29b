//! The projectile record owned by the simulation.

use bevy::prelude::*;

use crate::exclusion::ExclusionSet;
use crate::resources::ProjectileConfig;
use crate::systems::trajectory;
use crate::types::{
    Faction, LifecycleState, OwnerId, ProjectileId, ProjectileSpawnParams, RecallState,
    SpeedProfile, TravelLaw, VisualHandle,
};

/// A single projectile tracked by the simulation.
///
/// Projectiles are plain data: the simulation owns them in an id-indexed map
/// and every collaborator only ever sees the [`ProjectileId`].
///
/// # Fields
/// * `position` / `direction` / `speed` - Kinematic state; `direction` is unit length
/// * `rotation` - Visual orientation derived from `direction` and `spin_angle`
/// * `age` / `max_lifetime` - Scaled seconds alive and the expiry bound
/// * `bounce_count` / `max_bounces` - Bounces taken and allowed
/// * `bounce_energy_loss` - Fraction of speed lost per bounce
/// * `piercing_budget` - Remaining piercing capacity
/// * `exclusion_set` - Colliders temporarily immune to resolution
/// * `visual` - Tracer registration, `None` until the end of the spawn tick
#[derive(Clone, Debug)]
pub struct Projectile {
    pub id: ProjectileId,
    pub position: Vec3,
    pub direction: Vec3,
    pub speed: f32,
    pub rotation: Quat,
    pub travel_law: TravelLaw,
    pub speed_profile: SpeedProfile,
    pub age: f32,
    pub max_lifetime: f32,
    pub bounce_count: u32,
    pub max_bounces: u32,
    pub bounce_energy_loss: f32,
    pub piercing_budget: f32,
    pub is_explosive: bool,
    pub explosion_radius: f32,
    pub explosion_damage: f32,
    pub damage: f32,
    pub knockback_force: f32,
    pub owner_faction: Faction,
    pub owner: Option<OwnerId>,
    pub time_resistance: f32,
    pub recall_state: RecallState,
    pub exclusion_set: ExclusionSet,
    pub fired: bool,
    pub state: LifecycleState,
    /// Collision sphere radius
    pub radius: f32,
    /// Roll about the forward axis (rad/s at time scale 1)
    pub spin_rate: f32,
    pub spin_angle: f32,
    /// Scaled seconds spent waiting by a delayed hitscan
    pub hitscan_delay_elapsed: f32,
    /// Set on the first confirmed target hit; hit projectiles cannot be recalled
    pub has_hit: bool,
    pub visual: Option<VisualHandle>,
}

impl Projectile {
    /// Builds an unfired projectile from spawn parameters.
    ///
    /// # Arguments
    /// * `id` - Id allocated by the simulation
    /// * `params` - Spawn parameters
    /// * `config` - Supplies the lifetime when `params` has none
    pub fn from_params(id: ProjectileId, params: &ProjectileSpawnParams, config: &ProjectileConfig) -> Self {
        let direction = params.direction.try_normalize().unwrap_or(Vec3::NEG_Z);
        let (is_explosive, explosion_radius, explosion_damage) = match params.explosion {
            Some((radius, damage)) if radius > 0.0 => (true, radius, damage),
            _ => (false, 0.0, 0.0),
        };

        Self {
            id,
            position: params.origin,
            direction,
            speed: 0.0,
            rotation: trajectory::orient(direction, 0.0),
            travel_law: params.travel_law,
            speed_profile: params.speed_profile,
            age: 0.0,
            max_lifetime: params
                .max_lifetime
                .filter(|lifetime| *lifetime > 0.0)
                .unwrap_or(config.default_lifetime),
            bounce_count: 0,
            max_bounces: params.max_bounces,
            bounce_energy_loss: params.bounce_energy_loss.clamp(0.0, 1.0),
            piercing_budget: params.piercing_budget.max(0.0),
            is_explosive,
            explosion_radius,
            explosion_damage,
            damage: params.damage,
            knockback_force: params.knockback_force,
            owner_faction: params.faction,
            owner: params.owner,
            time_resistance: params.time_resistance.clamp(0.0, 1.0),
            recall_state: RecallState::Inactive,
            exclusion_set: ExclusionSet::new(),
            fired: false,
            state: LifecycleState::Unfired,
            radius: params.radius.max(0.0),
            spin_rate: params.spin_rate,
            spin_angle: 0.0,
            hitscan_delay_elapsed: 0.0,
            has_hit: false,
            visual: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state == LifecycleState::Terminal
    }

    /// Fired and not yet terminated.
    pub fn is_active(&self) -> bool {
        self.fired && !self.is_terminal()
    }

    pub fn is_recalling(&self) -> bool {
        self.recall_state.is_recalling()
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position).with_rotation(self.rotation)
    }

    /// Unscaled velocity; multiply by the effective time scale for actual motion.
    pub fn velocity(&self) -> Vec3 {
        self.direction * self.speed
    }

    /// Only player projectiles that are in flight and have not hit anything
    /// can be called back.
    pub fn can_recall(&self) -> bool {
        self.owner_faction == Faction::Player
            && self.owner.is_some()
            && self.is_active()
            && !self.has_hit
            && !self.is_recalling()
            && !self.travel_law.is_hitscan()
    }

    /// State a projectile settles in when nothing more specific applies.
    pub(crate) fn in_flight_state(&self) -> LifecycleState {
        if self.bounce_count > 0 {
            LifecycleState::Bouncing
        } else {
            LifecycleState::Fired
        }
    }
}
