//! Trajectory laws - speed evolution, motion and orientation.
//!
//! Everything here is a pure function of the projectile and the scaled time
//! step, so the same code drives the Bevy systems, the tests and the bench.

use std::f32::consts::TAU;

use bevy::prelude::*;

use crate::projectile::Projectile;
use crate::types::{SpeedProfile, TravelLaw};

/// Cubic ease-out on `[0, 1]`; inputs outside the range are clamped.
///
/// # Example
/// ```
/// use bevy_bullet_time::systems::trajectory::ease_out_cubic;
///
/// assert_eq!(ease_out_cubic(0.0), 0.0);
/// assert_eq!(ease_out_cubic(1.0), 1.0);
/// assert_eq!(ease_out_cubic(0.5), 0.875);
/// ```
pub fn ease_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(3)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Speed a projectile leaves the muzzle with.
pub fn initial_speed(law: TravelLaw, profile: &SpeedProfile) -> f32 {
    match law {
        TravelLaw::ConstantFast | TravelLaw::FastDecelerate => profile.max_speed,
        _ => profile.min_speed,
    }
}

/// Fraction of the law's speed a projectile keeps after its bounces so far.
pub fn retained_energy(projectile: &Projectile) -> f32 {
    (1.0 - projectile.bounce_energy_loss).powi(projectile.bounce_count as i32)
}

/// Applies the projectile's travel law for one tick.
///
/// `adjusted_dt` is the time-scaled delta; `age` must already include it.
/// Speeds and bounds are scaled by [`retained_energy`], so bounce losses
/// survive laws that recompute speed from scratch. Hitscan laws have no
/// continuous speed and are left untouched.
pub fn update_speed(projectile: &mut Projectile, adjusted_dt: f32) {
    let profile = projectile.speed_profile;
    let retained = retained_energy(projectile);
    match projectile.travel_law {
        TravelLaw::ConstantSlow => projectile.speed = profile.min_speed * retained,
        TravelLaw::ConstantFast => projectile.speed = profile.max_speed * retained,
        TravelLaw::SlowAccelerate => {
            projectile.speed =
                (projectile.speed + profile.accel_rate * adjusted_dt).min(profile.max_speed * retained);
        }
        TravelLaw::FastDecelerate => {
            projectile.speed =
                (projectile.speed - profile.decel_rate * adjusted_dt).max(profile.min_speed * retained);
        }
        TravelLaw::CurveAccelerate => {
            let t = if profile.curve_time > 0.0 {
                projectile.age / profile.curve_time
            } else {
                1.0
            };
            projectile.speed = lerp(profile.min_speed, profile.max_speed, ease_out_cubic(t)) * retained;
        }
        TravelLaw::PulseSpeed => {
            let phase = 0.5 + 0.5 * (projectile.age * profile.pulse_frequency * TAU).sin();
            projectile.speed = lerp(profile.min_speed, profile.max_speed, phase) * retained;
        }
        TravelLaw::Hitscan | TravelLaw::DelayedHitscan => {}
    }
}

/// Tentative displacement for one tick.
///
/// # Arguments
/// * `projectile` - Projectile to move
/// * `time_scale` - Effective time scale for the projectile's resistance
/// * `dt` - Unscaled tick delta
///
/// # Returns
/// `direction · speed · time_scale · dt`; the caller decides how much of it
/// survives collision handling.
pub fn advance(projectile: &Projectile, time_scale: f32, dt: f32) -> Vec3 {
    projectile.direction * projectile.speed * time_scale * dt
}

/// Advances the roll angle and re-derives the orientation.
pub fn spin(projectile: &mut Projectile, time_scale: f32, dt: f32) {
    projectile.spin_angle = (projectile.spin_angle + projectile.spin_rate * time_scale * dt) % TAU;
    projectile.rotation = orient(projectile.direction, projectile.spin_angle);
}

/// Orientation looking along `direction`, rolled by `spin_angle`.
pub fn orient(direction: Vec3, spin_angle: f32) -> Quat {
    let forward = direction.try_normalize().unwrap_or(Vec3::NEG_Z);
    let up = if forward.cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    Transform::IDENTITY.looking_to(forward, up).rotation * Quat::from_rotation_z(spin_angle)
}
