use bevy::prelude::*;

use crate::resources::ProjectileConfig;
use crate::systems::lifecycle::ProjectileSimulation;
use crate::types::{LifecycleState, RecallState};

/// Draw debug gizmos for projectiles.
///
/// Draws each live projectile as a sphere coloured by state, its velocity,
/// a line back to every exclusion point, and its recall target.
pub fn draw_projectile_debug(
    mut gizmos: Gizmos,
    simulation: Res<ProjectileSimulation>,
    config: Res<ProjectileConfig>,
) {
    if !config.debug_draw {
        return;
    }

    for projectile in simulation.iter() {
        let color = match projectile.state {
            LifecycleState::Unfired => Color::srgb(0.5, 0.5, 0.5),
            LifecycleState::Fired => Color::srgb(1.0, 0.0, 0.0),
            LifecycleState::Bouncing => Color::srgb(1.0, 0.8, 0.0),
            LifecycleState::Piercing => Color::srgb(1.0, 0.0, 1.0),
            LifecycleState::Recalling => Color::srgb(0.0, 0.8, 1.0),
            LifecycleState::Terminal => continue,
        };
        gizmos.sphere(projectile.position, projectile.radius.max(0.05), color);

        // Scaled down for visibility
        let end = projectile.position + projectile.velocity() * 0.05;
        gizmos.line(projectile.position, end, Color::srgb(0.0, 1.0, 0.0));

        for entry in projectile.exclusion_set.iter() {
            gizmos.line(projectile.position, entry.position, Color::srgb(0.4, 0.4, 1.0));
        }

        if let RecallState::Recalling { target } = projectile.recall_state {
            gizmos.line(projectile.position, target, Color::srgb(0.0, 1.0, 1.0));
        }
    }
}
