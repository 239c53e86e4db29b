//! Events for the projectile system.
//!
//! The simulation records [`ProjectileEvent`]s in an outbox; the Bevy layer
//! drains it once per tick and re-publishes each entry as a typed message.
//!
//! Note: In Bevy 0.18, buffered events use the `Message` trait instead of `Event`.

use bevy::ecs::message::Message;
use bevy::prelude::*;

use crate::types::{
    ColliderId, OwnerId, ProjectileId, ProjectileSpawnParams, TerminationReason, TravelLaw,
};

/// Everything observable that happened to a projectile during a tick.
#[derive(Clone, Debug, PartialEq)]
pub enum ProjectileEvent {
    Fired {
        id: ProjectileId,
        position: Vec3,
        direction: Vec3,
        travel_law: TravelLaw,
    },
    Hit {
        id: ProjectileId,
        collider: ColliderId,
        point: Vec3,
        damage: f32,
    },
    /// A target refused the damage
    Prevented {
        id: ProjectileId,
        collider: ColliderId,
    },
    Ricochet {
        id: ProjectileId,
        collider: ColliderId,
        point: Vec3,
        normal: Vec3,
        bounce_count: u32,
    },
    Penetration {
        id: ProjectileId,
        collider: ColliderId,
        point: Vec3,
        remaining_budget: f32,
    },
    Explosion {
        id: ProjectileId,
        center: Vec3,
        radius: f32,
        targets_hit: usize,
    },
    RecallStarted {
        id: ProjectileId,
        owner: OwnerId,
    },
    RecallCancelled {
        id: ProjectileId,
    },
    Terminated {
        id: ProjectileId,
        reason: TerminationReason,
        position: Vec3,
    },
}

impl ProjectileEvent {
    pub fn projectile(&self) -> ProjectileId {
        match self {
            Self::Fired { id, .. }
            | Self::Hit { id, .. }
            | Self::Prevented { id, .. }
            | Self::Ricochet { id, .. }
            | Self::Penetration { id, .. }
            | Self::Explosion { id, .. }
            | Self::RecallStarted { id, .. }
            | Self::RecallCancelled { id }
            | Self::Terminated { id, .. } => *id,
        }
    }
}

/// Request to spawn a projectile.
///
/// # Fields
/// * `params` - Spawn parameters; set `owner` to have an unfired projectile
///   follow that shooter's muzzle
/// * `hold` - Spawn unfired and wait for [`ReleaseProjectiles`]
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_bullet_time::events::FireProjectile;
/// use bevy_bullet_time::types::{ProjectileSpawnParams, TravelLaw};
///
/// let shot = FireProjectile::new(
///     ProjectileSpawnParams::new(Vec3::ZERO, Vec3::NEG_Z, TravelLaw::ConstantFast).with_bounces(2, 0.1),
/// );
/// assert!(!shot.hold);
/// let charged = shot.held();
/// assert!(charged.hold);
/// ```
#[derive(Message, Clone, Debug)]
pub struct FireProjectile {
    pub params: ProjectileSpawnParams,
    pub hold: bool,
}

impl FireProjectile {
    pub fn new(params: ProjectileSpawnParams) -> Self {
        Self { params, hold: false }
    }

    /// Spawns unfired instead of firing right away.
    pub fn held(mut self) -> Self {
        self.hold = true;
        self
    }
}

/// Fires every held projectile of `owner`.
#[derive(Message, Clone, Copy, Debug)]
pub struct ReleaseProjectiles {
    pub owner: Entity,
}

/// Calls every recallable projectile of `owner` back.
#[derive(Message, Clone, Copy, Debug)]
pub struct RecallProjectiles {
    pub owner: Entity,
}

/// Removes a projectile immediately, without explosion.
#[derive(Message, Clone, Copy, Debug)]
pub struct DestroyProjectile {
    pub id: ProjectileId,
}

/// A projectile left the muzzle.
#[derive(Message, Clone, Copy, Debug)]
pub struct ProjectileFired {
    pub projectile: ProjectileId,
    pub position: Vec3,
    pub direction: Vec3,
    pub travel_law: TravelLaw,
}

/// A projectile damaged a target directly.
///
/// `target` is `None` if the collider no longer maps to a live entity.
#[derive(Message, Clone, Copy, Debug)]
pub struct HitEvent {
    pub projectile: ProjectileId,
    pub target: Option<Entity>,
    pub point: Vec3,
    pub damage: f32,
}

/// A target refused a projectile's damage; the projectile carried on.
#[derive(Message, Clone, Copy, Debug)]
pub struct HitPreventedEvent {
    pub projectile: ProjectileId,
    pub target: Option<Entity>,
}

/// A projectile bounced off level geometry.
#[derive(Message, Clone, Copy, Debug)]
pub struct RicochetEvent {
    pub projectile: ProjectileId,
    pub surface: Option<Entity>,
    pub point: Vec3,
    pub normal: Vec3,
    pub bounce_count: u32,
}

/// A projectile passed through a target.
#[derive(Message, Clone, Copy, Debug)]
pub struct PenetrationEvent {
    pub projectile: ProjectileId,
    pub target: Option<Entity>,
    pub point: Vec3,
    pub remaining_budget: f32,
}

/// An explosive projectile detonated.
#[derive(Message, Clone, Copy, Debug)]
pub struct ExplosionEvent {
    pub projectile: ProjectileId,
    pub center: Vec3,
    pub radius: f32,
    pub targets_hit: usize,
}

/// A projectile started or stopped homing back to its owner.
#[derive(Message, Clone, Copy, Debug)]
pub struct RecallEvent {
    pub projectile: ProjectileId,
    /// `false` when the recall was cancelled because the owner vanished
    pub started: bool,
}

/// A projectile left the simulation.
#[derive(Message, Clone, Copy, Debug)]
pub struct ProjectileTerminated {
    pub projectile: ProjectileId,
    pub reason: TerminationReason,
    pub position: Vec3,
}

/// Request for an impact flash, for the VFX layer to render.
#[derive(Message, Clone, Copy, Debug)]
pub struct ImpactEffect {
    pub point: Vec3,
    pub color: Color,
    pub duration: f32,
}

/// Request for an explosion effect, for the VFX layer to render.
#[derive(Message, Clone, Copy, Debug)]
pub struct ExplosionEffect {
    pub point: Vec3,
    pub radius: f32,
}

/// Sound cue, for the audio layer to play.
#[derive(Message, Clone, Copy, Debug)]
pub struct AudioCue {
    pub cue: &'static str,
    pub position: Option<Vec3>,
}
