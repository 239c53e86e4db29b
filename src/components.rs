//! Core components for the projectile system.
//!
//! Projectiles themselves are not entities; they live in the
//! [`ProjectileSimulation`](crate::systems::lifecycle::ProjectileSimulation).
//! These components mark the entities projectiles interact with.

use bevy::prelude::*;

use crate::services::{CombatTarget, Damageable, Knockbackable, Piercable};
use crate::types::Faction;

/// Something projectiles can damage.
///
/// The entity carrying this component must also carry the collider that
/// spatial queries report for it.
///
/// # Fields
/// * `health` / `max_health` - Remaining and maximum hit points
/// * `piercability` - Piercing budget consumed by passing through
/// * `faction` - Side the target fights for
/// * `invulnerable` - Refuses all damage while set
/// * `pending_knockback` - Impulse accumulated this tick, for the game's
///   movement code to consume
///
/// # Example
/// ```
/// use bevy_bullet_time::components::ProjectileTarget;
/// use bevy_bullet_time::services::Damageable;
/// use bevy_bullet_time::types::Faction;
///
/// let mut grunt = ProjectileTarget::new(50.0).with_faction(Faction::Enemy);
/// assert!(grunt.take_damage(20.0));
/// assert_eq!(grunt.health, 30.0);
///
/// grunt.invulnerable = true;
/// assert!(!grunt.take_damage(20.0));
/// assert_eq!(grunt.health, 30.0);
/// ```
#[derive(Component, Reflect, Clone, Debug)]
#[reflect(Component)]
pub struct ProjectileTarget {
    pub health: f32,
    pub max_health: f32,
    pub piercability: f32,
    pub faction: Faction,
    pub invulnerable: bool,
    pub pending_knockback: Vec3,
}

impl Default for ProjectileTarget {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl ProjectileTarget {
    /// Creates an enemy-side target with `health` hit points and unit piercability.
    pub fn new(health: f32) -> Self {
        Self {
            health,
            max_health: health,
            piercability: 1.0,
            faction: Faction::Enemy,
            invulnerable: false,
            pending_knockback: Vec3::ZERO,
        }
    }

    pub fn with_faction(mut self, faction: Faction) -> Self {
        self.faction = faction;
        self
    }

    pub fn with_piercability(mut self, piercability: f32) -> Self {
        self.piercability = piercability.max(0.0);
        self
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Takes the accumulated knockback, leaving zero behind.
    pub fn take_knockback(&mut self) -> Vec3 {
        std::mem::take(&mut self.pending_knockback)
    }
}

impl Damageable for ProjectileTarget {
    fn take_damage(&mut self, amount: f32) -> bool {
        if self.invulnerable {
            return false;
        }
        self.health = (self.health - amount).max(0.0);
        true
    }
}

impl Piercable for ProjectileTarget {
    fn piercability(&self) -> f32 {
        self.piercability
    }
}

impl Knockbackable for ProjectileTarget {
    fn apply_knockback(&mut self, direction: Vec3, force: f32) {
        self.pending_knockback += direction * force;
    }
}

impl CombatTarget for ProjectileTarget {
    fn faction(&self) -> Faction {
        self.faction
    }
}

/// An entity that fires projectiles and can catch recalled ones.
///
/// # Fields
/// * `ammo` / `max_ammo` - Current and maximum ammunition
/// * `muzzle_offset` - Muzzle position in the shooter's local space
/// * `faction` - Faction stamped on projectiles fired by this shooter
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_bullet_time::components::Shooter;
///
/// let mut shooter = Shooter::new(3).with_muzzle_offset(Vec3::new(0.0, 1.5, -0.5));
/// shooter.ammo = 2;
/// assert!(shooter.credit(5));
/// assert_eq!(shooter.ammo, 3);
/// ```
#[derive(Component, Reflect, Clone, Debug)]
#[reflect(Component)]
pub struct Shooter {
    pub ammo: u32,
    pub max_ammo: u32,
    pub muzzle_offset: Vec3,
    pub faction: Faction,
}

impl Default for Shooter {
    fn default() -> Self {
        Self::new(6)
    }
}

impl Shooter {
    pub fn new(max_ammo: u32) -> Self {
        Self {
            ammo: max_ammo,
            max_ammo,
            muzzle_offset: Vec3::ZERO,
            faction: Faction::Player,
        }
    }

    pub fn with_muzzle_offset(mut self, offset: Vec3) -> Self {
        self.muzzle_offset = offset;
        self
    }

    pub fn with_faction(mut self, faction: Faction) -> Self {
        self.faction = faction;
        self
    }

    /// Adds ammunition up to `max_ammo`.
    ///
    /// # Returns
    /// `true` if anything was added
    pub fn credit(&mut self, amount: u32) -> bool {
        let before = self.ammo;
        self.ammo = self.ammo.saturating_add(amount).min(self.max_ammo);
        self.ammo != before
    }

    /// Spends one round. `false` when empty.
    pub fn consume(&mut self) -> bool {
        if self.ammo == 0 {
            return false;
        }
        self.ammo -= 1;
        true
    }

    /// World-space muzzle; forward is the shooter's forward.
    pub fn muzzle(&self, transform: &GlobalTransform) -> Transform {
        let (_, rotation, _) = transform.to_scale_rotation_translation();
        Transform::from_translation(transform.transform_point(self.muzzle_offset)).with_rotation(rotation)
    }
}
