//! Collaborator interfaces consumed by the projectile simulation.
//!
//! The simulation never reaches for global services. Every tick it is handed a
//! [`Collaborators`] bundle; the Bevy layer builds one from ECS queries and
//! avian3d, tests build one from in-memory fakes.

use bevy::prelude::*;

use crate::types::{
    ColliderId, CollisionMask, Contact, Faction, OwnerId, ProjectileId, QueryShape, VisualHandle,
};

/// Source of the global time-dilation scalar.
pub trait TimeProvider {
    /// Motion multiplier for an entity with the given resistance in `[0, 1]`.
    fn effective_time_scale(&self, resistance: f32) -> f32;

    /// `dt` scaled by [`TimeProvider::effective_time_scale`].
    fn adjusted_delta(&self, dt: f32, resistance: f32) -> f32 {
        dt * self.effective_time_scale(resistance)
    }
}

/// Ray and shape queries against the world.
pub trait SpatialQuery {
    /// First contact along a ray, if any.
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        mask: CollisionMask,
    ) -> Option<Contact>;

    /// Every contact overlapping `shape` placed at `transform`, nearest first.
    fn shapecast(&self, shape: &QueryShape, transform: &Transform, mask: CollisionMask) -> Vec<Contact>;
}

/// Something that can take damage.
pub trait Damageable {
    /// Applies `amount` damage.
    ///
    /// Returns `false` when the damage was prevented; the caller must then
    /// keep going as if nothing was hit.
    fn take_damage(&mut self, amount: f32) -> bool;
}

/// Something a piercing projectile can pass through.
pub trait Piercable {
    /// Piercing budget consumed by passing through this target.
    fn piercability(&self) -> f32;
}

/// Something that can be pushed.
pub trait Knockbackable {
    fn apply_knockback(&mut self, direction: Vec3, force: f32);
}

/// A damageable entity projectiles can hit.
pub trait CombatTarget: Damageable + Piercable + Knockbackable {
    fn faction(&self) -> Faction;
}

/// Resolves collider handles to combat targets.
pub trait TargetLookup {
    /// The target behind `collider`, or `None` for plain level geometry.
    fn target_mut(&mut self, collider: ColliderId) -> Option<&mut dyn CombatTarget>;

    fn target_position(&self, collider: ColliderId) -> Option<Vec3>;

    /// Colliders of every target within `radius` of `center`.
    fn targets_in_radius(&self, center: Vec3, radius: f32) -> Vec<ColliderId>;
}

/// Access to the shooters that own projectiles.
pub trait OwnerLookup {
    fn owner_position(&self, owner: OwnerId) -> Option<Vec3>;

    /// World transform of the owner's muzzle; forward is the firing direction.
    fn muzzle_transform(&self, owner: OwnerId) -> Option<Transform>;

    /// The owner's own collider, excluded from its projectiles at fire.
    fn owner_collider(&self, owner: OwnerId) -> Option<ColliderId>;

    /// Returns ammunition to the owner. `false` if the owner is gone.
    fn credit_ammo(&mut self, owner: OwnerId, amount: u32) -> bool;
}

/// Visual effects collaborator.
///
/// The sink owns the id-indexed registration table; projectiles keep only the
/// returned [`VisualHandle`].
pub trait VisualSink {
    fn register(&mut self, projectile: ProjectileId) -> VisualHandle;
    fn unregister(&mut self, handle: VisualHandle);
    fn create_impact(&mut self, point: Vec3, color: Color, duration: f32);
    fn create_explosion(&mut self, point: Vec3, radius: f32);
}

/// Audio collaborator.
pub trait AudioSink {
    fn play(&mut self, cue: &'static str, position: Option<Vec3>);
}

/// Cue names sent to the [`AudioSink`].
pub mod cues {
    pub const FIRE: &str = "projectile_fire";
    pub const BOUNCE: &str = "projectile_bounce";
    pub const HIT: &str = "projectile_hit";
    pub const PIERCE: &str = "projectile_pierce";
    pub const EXPLOSION: &str = "projectile_explosion";
    pub const RECALL: &str = "projectile_recall";
    pub const RECALL_CATCH: &str = "projectile_recall_catch";
}

/// Services injected into one simulation call.
///
/// `spatial` is optional: without it projectiles still fly, but nothing
/// collides and hitscans always miss.
pub struct Collaborators<'a> {
    pub time: &'a dyn TimeProvider,
    pub spatial: Option<&'a dyn SpatialQuery>,
    pub targets: &'a mut dyn TargetLookup,
    pub owners: &'a mut dyn OwnerLookup,
    pub visuals: &'a mut dyn VisualSink,
    pub audio: &'a mut dyn AudioSink,
}

/// World without any combat targets.
#[derive(Default)]
pub struct NoTargets;

impl TargetLookup for NoTargets {
    fn target_mut(&mut self, _collider: ColliderId) -> Option<&mut dyn CombatTarget> {
        None
    }

    fn target_position(&self, _collider: ColliderId) -> Option<Vec3> {
        None
    }

    fn targets_in_radius(&self, _center: Vec3, _radius: f32) -> Vec<ColliderId> {
        Vec::new()
    }
}

/// World without shooters; unfired projectiles stay where they were spawned.
#[derive(Default)]
pub struct NoOwners;

impl OwnerLookup for NoOwners {
    fn owner_position(&self, _owner: OwnerId) -> Option<Vec3> {
        None
    }

    fn muzzle_transform(&self, _owner: OwnerId) -> Option<Transform> {
        None
    }

    fn owner_collider(&self, _owner: OwnerId) -> Option<ColliderId> {
        None
    }

    fn credit_ammo(&mut self, _owner: OwnerId, _amount: u32) -> bool {
        false
    }
}

/// Drops every visual request.
#[derive(Default)]
pub struct SilentVisuals {
    next_handle: u64,
}

impl VisualSink for SilentVisuals {
    fn register(&mut self, _projectile: ProjectileId) -> VisualHandle {
        self.next_handle += 1;
        VisualHandle(self.next_handle)
    }

    fn unregister(&mut self, _handle: VisualHandle) {}

    fn create_impact(&mut self, _point: Vec3, _color: Color, _duration: f32) {}

    fn create_explosion(&mut self, _point: Vec3, _radius: f32) {}
}

/// Drops every audio cue.
#[derive(Default)]
pub struct SilentAudio;

impl AudioSink for SilentAudio {
    fn play(&mut self, _cue: &'static str, _position: Option<Vec3>) {}
}
