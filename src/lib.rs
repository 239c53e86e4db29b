//! # Bevy Bullet Time
//!
//! Projectile simulation plugin for Bevy 0.18, built for games where the world's
//! time scale follows the player.
//!
//! ## Features
//! - Eight travel laws: hitscan, delayed hitscan, constant, accelerating,
//!   decelerating, eased and pulsing speed
//! - Every projectile consumes the global time-dilation scalar, blended by
//!   its own resistance
//! - Bounce resolution that handles corners without tunneling or double bounces
//! - Piercing, explosive falloff, knockback and faction rules
//! - Boomerang recall that returns ammunition to the shooter
//! - Engine-agnostic core: the simulation only talks to collaborator traits,
//!   so it runs headless in tests and benches
//!
//! ## Quick Start
//! ```rust,no_run
//! use bevy::prelude::*;
//! use bevy_bullet_time::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(DefaultPlugins)
//!         .add_plugins(BulletTimePluginGroup)
//!         .run();
//! }
//!
//! fn shoot(mut fire: MessageWriter<FireProjectile>) {
//!     fire.write(FireProjectile::new(
//!         ProjectileSpawnParams::new(Vec3::ZERO, Vec3::NEG_Z, TravelLaw::SlowAccelerate).with_bounces(3, 0.2),
//!     ));
//! }
//! ```

pub mod components;
pub mod events;
pub mod exclusion;
pub mod projectile;
pub mod resources;
pub mod services;
pub mod systems;
pub mod types;

pub mod prelude {
    pub use crate::components::*;
    pub use crate::events::*;
    pub use crate::projectile::Projectile;
    pub use crate::resources::*;
    pub use crate::services::{Collaborators, SpatialQuery, TimeProvider};
    pub use crate::systems::lifecycle::ProjectileSimulation;
    pub use crate::types::*;
    pub use crate::BulletTimePluginGroup;
    pub use crate::{BulletTimeCorePlugin, BulletTimeDebugPlugin};
    pub use bevy::ecs::message::{MessageReader, MessageWriter};
}

use bevy::prelude::*;

/// Main plugin group that includes all projectile subsystems.
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_bullet_time::prelude::*;
///
/// let mut app = App::new();
/// app.add_plugins(MinimalPlugins).add_plugins(BulletTimePluginGroup);
/// ```
#[derive(Default)]
pub struct BulletTimePluginGroup;

impl PluginGroup for BulletTimePluginGroup {
    fn build(self) -> bevy::app::PluginGroupBuilder {
        bevy::app::PluginGroupBuilder::start::<Self>()
            .add(BulletTimeCorePlugin)
            .add(BulletTimeDebugPlugin)
    }
}

/// Core simulation plugin.
///
/// Registers types, resources and messages, and runs the simulation once per
/// `FixedUpdate` tick.
///
/// # Systems
/// - `step_projectile_simulation` - Applies commands and steps the simulation
///   against avian3d (only while its `SpatialQueryPipeline` exists)
/// - `step_projectile_simulation_without_spatial` - Same, with no world to hit
/// - `publish_projectile_events` - Re-publishes the simulation's events as messages
pub struct BulletTimeCorePlugin;

impl Plugin for BulletTimeCorePlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<components::ProjectileTarget>()
            .register_type::<components::Shooter>()
            .register_type::<resources::ProjectileConfig>()
            .register_type::<resources::TimeDilation>()
            .init_resource::<resources::ProjectileConfig>()
            .init_resource::<resources::TimeDilation>()
            .init_resource::<resources::TracerRegistry>()
            .init_resource::<systems::lifecycle::ProjectileSimulation>()
            .init_resource::<systems::bridge::ColliderIndex>()
            .add_message::<events::FireProjectile>()
            .add_message::<events::ReleaseProjectiles>()
            .add_message::<events::RecallProjectiles>()
            .add_message::<events::DestroyProjectile>()
            .add_message::<events::ProjectileFired>()
            .add_message::<events::HitEvent>()
            .add_message::<events::HitPreventedEvent>()
            .add_message::<events::RicochetEvent>()
            .add_message::<events::PenetrationEvent>()
            .add_message::<events::ExplosionEvent>()
            .add_message::<events::RecallEvent>()
            .add_message::<events::ProjectileTerminated>()
            .add_message::<events::ImpactEffect>()
            .add_message::<events::ExplosionEffect>()
            .add_message::<events::AudioCue>();

        #[cfg(feature = "dim3")]
        {
            use avian3d::prelude::SpatialQueryPipeline;
            app.add_systems(
                FixedUpdate,
                (
                    (
                        systems::bridge::step_projectile_simulation
                            .run_if(resource_exists::<SpatialQueryPipeline>),
                        systems::bridge::step_projectile_simulation_without_spatial
                            .run_if(not(resource_exists::<SpatialQueryPipeline>)),
                    ),
                    systems::bridge::publish_projectile_events,
                )
                    .chain(),
            );
        }

        #[cfg(not(feature = "dim3"))]
        app.add_systems(
            FixedUpdate,
            (
                systems::bridge::step_projectile_simulation_without_spatial,
                systems::bridge::publish_projectile_events,
            )
                .chain(),
        );
    }
}

/// Debug plugin for projectile visualization.
///
/// Draws gizmos while [`ProjectileConfig::debug_draw`](resources::ProjectileConfig) is set.
pub struct BulletTimeDebugPlugin;

impl Plugin for BulletTimeDebugPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, systems::debug::draw_projectile_debug);
    }
}
