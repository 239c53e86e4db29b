//! Combat effects - damage, piercing, explosions and recall.

use bevy::prelude::*;

use crate::projectile::Projectile;
use crate::resources::RecallConfig;
use crate::services::{CombatTarget, TargetLookup};
use crate::systems::trajectory;
use crate::types::{ColliderId, Faction, LifecycleState, RecallState, TerminationReason};

/// Below this dot product the recall steering is treated as a U-turn.
const ANTIPARALLEL_DOT: f32 = -0.99;

/// Result of a projectile touching a combat target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HitOutcome {
    /// Faction rule forbids the hit; the contact is ignored
    Ignored,
    /// The target refused the damage; the projectile carries on unaffected
    Prevented,
    /// Damage applied and the projectile passed through
    Pierced { remaining: f32 },
    /// Damage applied and the projectile must terminate
    Stopped(TerminationReason),
}

/// Damage dealt to one target by an explosion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExplosionHit {
    pub collider: ColliderId,
    pub distance: f32,
    pub damage: f32,
    /// `false` when the target refused the damage
    pub applied: bool,
}

/// Whether a projectile fired by `attacker` may damage `target`.
///
/// Player shots never hurt player-side targets; every other pairing applies,
/// including enemy friendly fire.
///
/// # Example
/// ```
/// use bevy_bullet_time::systems::combat::can_damage;
/// use bevy_bullet_time::types::Faction;
///
/// assert!(can_damage(Faction::Player, Faction::Enemy));
/// assert!(can_damage(Faction::Enemy, Faction::Enemy));
/// assert!(!can_damage(Faction::Player, Faction::Player));
/// ```
pub fn can_damage(attacker: Faction, target: Faction) -> bool {
    !(attacker == Faction::Player && target == Faction::Player)
}

/// Applies a direct hit on `target`.
///
/// Every outcome except [`HitOutcome::Stopped`] excludes the collider, so the
/// same overlap is not re-evaluated every tick. The caller terminates on
/// `Stopped`.
///
/// # Arguments
/// * `projectile` - Projectile that touched the target
/// * `collider` - Target's collider
/// * `target` - The target itself
pub fn apply_hit(projectile: &mut Projectile, collider: ColliderId, target: &mut dyn CombatTarget) -> HitOutcome {
    let position = projectile.position;

    if !can_damage(projectile.owner_faction, target.faction()) {
        projectile.exclusion_set.insert(collider, position);
        return HitOutcome::Ignored;
    }

    if !target.take_damage(projectile.damage) {
        projectile.exclusion_set.insert(collider, position);
        return HitOutcome::Prevented;
    }

    projectile.has_hit = true;
    target.apply_knockback(projectile.direction, projectile.knockback_force);

    if projectile.piercing_budget <= 0.0 {
        return HitOutcome::Stopped(TerminationReason::TargetHit);
    }

    projectile.piercing_budget = (projectile.piercing_budget - target.piercability()).max(0.0);
    projectile.exclusion_set.insert(collider, position);

    if projectile.piercing_budget <= 0.0 {
        HitOutcome::Stopped(TerminationReason::PiercingExhausted)
    } else {
        projectile.state = LifecycleState::Piercing;
        HitOutcome::Pierced {
            remaining: projectile.piercing_budget,
        }
    }
}

/// Linear falloff factor in `[0, 1]` for a target `distance` from the centre.
///
/// # Example
/// ```
/// use bevy_bullet_time::systems::combat::explosion_falloff;
///
/// assert_eq!(explosion_falloff(2.5, 5.0), 0.5);
/// assert_eq!(explosion_falloff(7.0, 5.0), 0.0);
/// ```
pub fn explosion_falloff(distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 {
        return 0.0;
    }
    (1.0 - distance / radius).max(0.0)
}

/// Detonates an explosive projectile at its current position.
///
/// Every target in range that the faction rule allows takes
/// `explosion_damage · falloff` and is knocked outward by
/// `knockback_force · falloff`.
///
/// # Returns
/// One entry per target that received a non-zero share
pub fn detonate(projectile: &Projectile, targets: &mut dyn TargetLookup) -> Vec<ExplosionHit> {
    let center = projectile.position;
    let radius = projectile.explosion_radius;
    let mut hits = Vec::new();

    for collider in targets.targets_in_radius(center, radius) {
        let Some(position) = targets.target_position(collider) else {
            continue;
        };
        let distance = position.distance(center);
        let falloff = explosion_falloff(distance, radius);
        if falloff <= 0.0 {
            continue;
        }
        let Some(target) = targets.target_mut(collider) else {
            continue;
        };
        if !can_damage(projectile.owner_faction, target.faction()) {
            continue;
        }

        let damage = projectile.explosion_damage * falloff;
        let applied = target.take_damage(damage);
        if applied {
            let outward = (position - center).try_normalize().unwrap_or(Vec3::Y);
            target.apply_knockback(outward, projectile.knockback_force * falloff);
        }
        hits.push(ExplosionHit {
            collider,
            distance,
            damage,
            applied,
        });
    }

    hits
}

/// Starts calling a projectile back to `owner_position`.
///
/// The speed multiplier is applied once, here. Exclusions are dropped since
/// recalling projectiles do not collide.
pub fn begin_recall(projectile: &mut Projectile, owner_position: Vec3, config: &RecallConfig) {
    projectile.recall_state = RecallState::Recalling {
        target: owner_position,
    };
    projectile.state = LifecycleState::Recalling;
    projectile.speed = projectile.speed.max(projectile.speed_profile.min_speed) * config.speed_multiplier;
    projectile.exclusion_set.clear();
}

/// Result of one recall steering step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RecallStep {
    /// Still on the way
    Homing,
    /// Reached the owner this tick
    Completed,
    /// Owner is gone; the projectile is back in normal flight
    Cancelled,
}

/// Steers and moves a recalling projectile for one tick.
///
/// The blend toward the owner never drops below `2 · step / distance`, so the
/// projectile cannot orbit an owner it is close to. Completion is checked on
/// the whole step segment, so a fast projectile cannot skip past the owner.
///
/// # Arguments
/// * `projectile` - Recalling projectile
/// * `owner_position` - Owner's position this tick, `None` if the owner is gone
/// * `time_scale` - Effective time scale for the projectile
/// * `dt` - Unscaled tick delta
/// * `config` - Recall tuning
pub fn steer_recall(
    projectile: &mut Projectile,
    owner_position: Option<Vec3>,
    time_scale: f32,
    dt: f32,
    config: &RecallConfig,
) -> RecallStep {
    let Some(target) = owner_position else {
        projectile.recall_state = RecallState::Inactive;
        projectile.state = projectile.in_flight_state();
        return RecallStep::Cancelled;
    };
    projectile.recall_state = RecallState::Recalling { target };

    let to_target = target - projectile.position;
    let distance = to_target.length();
    if distance <= config.completion_distance {
        return RecallStep::Completed;
    }

    let step = projectile.speed * time_scale * dt;
    let mut desired = to_target / distance;
    if projectile.direction.dot(desired) < ANTIPARALLEL_DOT {
        desired = (desired + projectile.direction.any_orthonormal_vector())
            .try_normalize()
            .unwrap_or(desired);
    }
    let turn = config.turn_rate.max((2.0 * step / distance).min(1.0));
    projectile.direction = projectile
        .direction
        .lerp(desired, turn)
        .try_normalize()
        .unwrap_or(desired);

    let displacement = projectile.direction * step;
    let start = projectile.position;
    let length_sq = displacement.length_squared();
    let t = if length_sq > 0.0 {
        ((target - start).dot(displacement) / length_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = start + displacement * t;

    trajectory::spin(projectile, time_scale, dt);
    if closest.distance(target) <= config.completion_distance {
        projectile.position = closest;
        return RecallStep::Completed;
    }

    projectile.position = start + displacement;
    RecallStep::Homing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ProjectileConfig;
    use crate::services::{Damageable, Knockbackable, Piercable};
    use crate::types::{OwnerId, ProjectileId, ProjectileSpawnParams, TravelLaw};

    struct Dummy {
        faction: Faction,
        health: f32,
        blocks: bool,
        piercability: f32,
        pushed: Vec3,
    }

    impl Dummy {
        fn enemy() -> Self {
            Self {
                faction: Faction::Enemy,
                health: 100.0,
                blocks: false,
                piercability: 1.0,
                pushed: Vec3::ZERO,
            }
        }
    }

    impl Damageable for Dummy {
        fn take_damage(&mut self, amount: f32) -> bool {
            if self.blocks {
                return false;
            }
            self.health -= amount;
            true
        }
    }

    impl Piercable for Dummy {
        fn piercability(&self) -> f32 {
            self.piercability
        }
    }

    impl Knockbackable for Dummy {
        fn apply_knockback(&mut self, direction: Vec3, force: f32) {
            self.pushed += direction * force;
        }
    }

    impl CombatTarget for Dummy {
        fn faction(&self) -> Faction {
            self.faction
        }
    }

    fn projectile(params: ProjectileSpawnParams) -> Projectile {
        let mut p = Projectile::from_params(ProjectileId(1), &params, &ProjectileConfig::default());
        p.fired = true;
        p.state = LifecycleState::Fired;
        p.speed = 10.0;
        p
    }

    fn params() -> ProjectileSpawnParams {
        ProjectileSpawnParams::new(Vec3::ZERO, Vec3::X, TravelLaw::ConstantSlow)
    }

    #[test]
    fn test_non_piercing_hit_stops() {
        let mut p = projectile(params().with_damage(25.0));
        let mut target = Dummy::enemy();

        let outcome = apply_hit(&mut p, ColliderId(4), &mut target);

        assert_eq!(outcome, HitOutcome::Stopped(TerminationReason::TargetHit));
        assert_eq!(target.health, 75.0);
        assert!(target.pushed.x > 0.0);
        assert!(p.has_hit);
    }

    #[test]
    fn test_piercing_budget_two_targets() {
        let mut p = projectile(params().with_piercing(2.0));
        let mut first = Dummy::enemy();
        let mut second = Dummy::enemy();
        second.piercability = 1.5;

        let outcome = apply_hit(&mut p, ColliderId(1), &mut first);
        assert_eq!(outcome, HitOutcome::Pierced { remaining: 1.0 });
        assert_eq!(p.state, LifecycleState::Piercing);
        assert!(p.exclusion_set.contains(ColliderId(1)));

        let outcome = apply_hit(&mut p, ColliderId(2), &mut second);
        assert_eq!(outcome, HitOutcome::Stopped(TerminationReason::PiercingExhausted));
        assert_eq!(p.piercing_budget, 0.0);
    }

    #[test]
    fn test_prevented_damage_continues() {
        let mut p = projectile(params());
        let mut target = Dummy::enemy();
        target.blocks = true;

        let outcome = apply_hit(&mut p, ColliderId(4), &mut target);

        assert_eq!(outcome, HitOutcome::Prevented);
        assert!(!p.has_hit);
        assert_eq!(p.direction, Vec3::X);
        assert_eq!(p.speed, 10.0);
        assert!(p.exclusion_set.contains(ColliderId(4)));
    }

    #[test]
    fn test_player_friendly_fire_ignored() {
        let mut p = projectile(params());
        let mut ally = Dummy::enemy();
        ally.faction = Faction::Player;

        assert_eq!(apply_hit(&mut p, ColliderId(4), &mut ally), HitOutcome::Ignored);
        assert_eq!(ally.health, 100.0);
    }

    #[test]
    fn test_falloff_is_linear() {
        assert_eq!(explosion_falloff(0.0, 5.0), 1.0);
        assert_eq!(100.0 * explosion_falloff(2.5, 5.0), 50.0);
        assert_eq!(explosion_falloff(5.0, 5.0), 0.0);
        assert_eq!(explosion_falloff(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_begin_recall_multiplies_speed_once() {
        let mut p = projectile(params().with_owner(OwnerId(1)));
        let config = RecallConfig::default();

        begin_recall(&mut p, Vec3::new(-10.0, 0.0, 0.0), &config);

        assert_eq!(p.state, LifecycleState::Recalling);
        assert_eq!(p.speed, 10.0 * config.speed_multiplier);
        assert!(p.is_recalling());
    }

    #[test]
    fn test_recall_cancels_without_owner() {
        let mut p = projectile(params().with_owner(OwnerId(1)));
        begin_recall(&mut p, Vec3::NEG_X, &RecallConfig::default());

        let step = steer_recall(&mut p, None, 1.0, 0.016, &RecallConfig::default());

        assert_eq!(step, RecallStep::Cancelled);
        assert_eq!(p.state, LifecycleState::Fired);
        assert!(!p.is_recalling());
    }

    #[test]
    fn test_recall_turns_around_and_completes() {
        let config = RecallConfig::default();
        let mut p = projectile(params().with_owner(OwnerId(1)));
        p.position = Vec3::new(20.0, 0.0, 0.0);
        let owner = Vec3::ZERO;
        begin_recall(&mut p, owner, &config);

        let mut completed = false;
        for _ in 0..600 {
            if steer_recall(&mut p, Some(owner), 1.0, 1.0 / 60.0, &config) == RecallStep::Completed {
                completed = true;
                break;
            }
        }

        assert!(completed);
    }

    #[test]
    fn test_recall_completes_when_step_passes_owner() {
        let config = RecallConfig::default();
        let mut p = projectile(params().with_owner(OwnerId(1)));
        p.direction = Vec3::NEG_X;
        p.position = Vec3::new(3.0, 0.0, 0.0);
        p.speed = 600.0;
        begin_recall(&mut p, Vec3::ZERO, &config);

        let step = steer_recall(&mut p, Some(Vec3::ZERO), 1.0, 1.0 / 60.0, &config);

        assert_eq!(step, RecallStep::Completed);
        assert!(p.position.length() <= config.completion_distance);
    }
}
