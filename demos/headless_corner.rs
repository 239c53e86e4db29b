//! Headless run: a bouncing projectile fired into a floor/wall corner.
//!
//! Drives the engine-agnostic simulation from a fixed-step system against an
//! in-memory room, logging every event until the projectile is gone.

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy_bullet_time::events::ProjectileEvent;
use bevy_bullet_time::prelude::*;
use bevy_bullet_time::services::{NoOwners, NoTargets, SilentAudio, SilentVisuals};
use std::time::Duration;

fn main() {
    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(1.0 / 60.0))))
        .add_plugins(LogPlugin::default())
        .insert_resource(Time::<Fixed>::from_hz(60.0))
        .insert_resource(ProjectileConfig::default())
        .insert_resource(TimeDilation::new(0.5))
        .init_resource::<ProjectileSimulation>()
        .insert_resource(Corner {
            wall_x: 6.0,
            max_ticks: 600,
        })
        .add_systems(Startup, fire_into_corner)
        .add_systems(FixedUpdate, step_room)
        .run();
}

/// Floor at `y = 0` meeting a wall at `x = wall_x`.
#[derive(Resource)]
struct Corner {
    wall_x: f32,
    max_ticks: u32,
}

impl Corner {
    fn planes(&self) -> [(ColliderId, Vec3, Vec3); 2] {
        [
            (ColliderId(1), Vec3::ZERO, Vec3::Y),
            (ColliderId(2), Vec3::new(self.wall_x, 0.0, 0.0), Vec3::NEG_X),
        ]
    }
}

impl SpatialQuery for Corner {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, _mask: CollisionMask) -> Option<Contact> {
        self.planes()
            .into_iter()
            .filter_map(|(collider, point, normal)| {
                let approach = direction.dot(normal);
                let height = (origin - point).dot(normal);
                if approach >= 0.0 || height < 0.0 {
                    return None;
                }
                let distance = height / -approach;
                (distance <= max_distance).then(|| Contact {
                    point: origin + direction * distance,
                    normal,
                    collider,
                    distance,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn shapecast(&self, shape: &QueryShape, transform: &Transform, _mask: CollisionMask) -> Vec<Contact> {
        let QueryShape::Sphere { radius } = *shape;
        let center = transform.translation;
        let mut contacts: Vec<Contact> = self
            .planes()
            .into_iter()
            .filter_map(|(collider, point, normal)| {
                let height = (center - point).dot(normal);
                (height <= radius).then(|| Contact {
                    point: center - normal * height,
                    normal,
                    collider,
                    distance: height.max(0.0),
                })
            })
            .collect();
        contacts.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        contacts
    }
}

fn fire_into_corner(
    mut simulation: ResMut<ProjectileSimulation>,
    config: Res<ProjectileConfig>,
    time: Res<TimeDilation>,
    corner: Res<Corner>,
) {
    let (mut targets, mut owners) = (NoTargets, NoOwners);
    let (mut visuals, mut audio) = (SilentVisuals::default(), SilentAudio);
    let mut collab = Collaborators {
        time: &*time,
        spatial: Some(&*corner),
        targets: &mut targets,
        owners: &mut owners,
        visuals: &mut visuals,
        audio: &mut audio,
    };

    let params = ProjectileSpawnParams::new(
        Vec3::new(2.0, 1.0, 0.0),
        Vec3::new(1.0, -1.0, 0.0),
        TravelLaw::ConstantFast,
    )
    .with_bounces(4, 0.3)
    .with_lifetime(6.0);
    let id = simulation.launch(params, &config, &mut collab);
    info!("[SETUP] Fired {:?} into the corner at x = {}", id, corner.wall_x);
}

fn step_room(
    mut simulation: ResMut<ProjectileSimulation>,
    config: Res<ProjectileConfig>,
    time: Res<TimeDilation>,
    corner: Res<Corner>,
    mut ticks: Local<u32>,
    mut exit: MessageWriter<AppExit>,
) {
    let (mut targets, mut owners) = (NoTargets, NoOwners);
    let (mut visuals, mut audio) = (SilentVisuals::default(), SilentAudio);
    let mut collab = Collaborators {
        time: &*time,
        spatial: Some(&*corner),
        targets: &mut targets,
        owners: &mut owners,
        visuals: &mut visuals,
        audio: &mut audio,
    };

    simulation.step(1.0 / 60.0, &config, &mut collab);
    *ticks += 1;

    for event in simulation.drain_events() {
        match event {
            ProjectileEvent::Ricochet {
                collider,
                point,
                normal,
                bounce_count,
                ..
            } => info!(
                "[TICK {}] Bounce #{} off {:?} at {:.2} (normal {:.2})",
                *ticks, bounce_count, collider, point, normal
            ),
            ProjectileEvent::Terminated { reason, position, .. } => {
                info!("[TICK {}] Terminated: {:?} at {:.2}", *ticks, reason, position)
            }
            other => debug!("[TICK {}] {:?}", *ticks, other),
        }
    }

    if let Some(projectile) = simulation.iter().next() {
        if *ticks % 30 == 0 {
            info!(
                "[TICK {}] position {:.2}, speed {:.2}, bounces {}",
                *ticks, projectile.position, projectile.speed, projectile.bounce_count
            );
        }
    }

    if simulation.is_empty() || *ticks >= corner.max_ticks {
        info!("[FINISHED] Simulation complete after {} ticks.", *ticks);
        exit.write(AppExit::Success);
    }
}
