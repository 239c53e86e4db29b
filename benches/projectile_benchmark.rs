//! Benchmark for projectile simulation performance.

use bevy::prelude::*;
use bevy_bullet_time::prelude::*;
use bevy_bullet_time::services::{NoOwners, NoTargets, SilentAudio, SilentVisuals};
use bevy_bullet_time::systems::collision;
use bevy_bullet_time::systems::trajectory;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

/// Closed cube of half-extent `half`, walls facing inward.
struct BoxRoom {
    half: f32,
}

impl BoxRoom {
    fn walls(&self) -> [(u64, Vec3); 6] {
        [
            (1, Vec3::X),
            (2, Vec3::NEG_X),
            (3, Vec3::Y),
            (4, Vec3::NEG_Y),
            (5, Vec3::Z),
            (6, Vec3::NEG_Z),
        ]
    }

    fn height(&self, position: Vec3, normal: Vec3) -> f32 {
        position.dot(normal) + self.half
    }
}

impl SpatialQuery for BoxRoom {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, _mask: CollisionMask) -> Option<Contact> {
        self.walls()
            .into_iter()
            .filter_map(|(id, normal)| {
                let approach = direction.dot(normal);
                if approach >= 0.0 {
                    return None;
                }
                let distance = self.height(origin, normal) / -approach;
                (0.0..=max_distance).contains(&distance).then(|| Contact {
                    point: origin + direction * distance,
                    normal,
                    collider: ColliderId(id),
                    distance,
                })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn shapecast(&self, shape: &QueryShape, transform: &Transform, _mask: CollisionMask) -> Vec<Contact> {
        let QueryShape::Sphere { radius } = *shape;
        let position = transform.translation;
        self.walls()
            .into_iter()
            .filter_map(|(id, normal)| {
                let height = self.height(position, normal);
                (height <= radius).then(|| Contact {
                    point: position - normal * height,
                    normal,
                    collider: ColliderId(id),
                    distance: height.max(0.0),
                })
            })
            .collect()
    }
}

fn direction_for(i: usize) -> Vec3 {
    let t = i as f32 * 0.618_034;
    Vec3::new(t.sin(), (t * 1.7).cos(), (t * 2.3).sin())
        .try_normalize()
        .unwrap_or(Vec3::X)
}

fn benchmark_simulation_step(c: &mut Criterion) {
    let config = ProjectileConfig::default();
    let time = TimeDilation::new(0.5);
    let room = BoxRoom { half: 20.0 };

    let mut group = c.benchmark_group("Simulation Step");

    for projectile_count in [100, 1000, 10000].iter() {
        let mut simulation = ProjectileSimulation::default();
        let (mut targets, mut owners) = (NoTargets, NoOwners);
        let (mut visuals, mut audio) = (SilentVisuals::default(), SilentAudio);
        let mut collab = Collaborators {
            time: &time,
            spatial: Some(&room),
            targets: &mut targets,
            owners: &mut owners,
            visuals: &mut visuals,
            audio: &mut audio,
        };

        for i in 0..*projectile_count {
            let params = ProjectileSpawnParams::new(Vec3::ZERO, direction_for(i), TravelLaw::PulseSpeed)
                .with_bounces(u32::MAX, 0.0)
                .with_lifetime(f32::MAX);
            simulation.launch(params, &config, &mut collab);
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(projectile_count),
            projectile_count,
            |b, &_count| {
                b.iter(|| {
                    simulation.step(1.0 / 60.0, &config, &mut collab);
                    simulation.drain_events().count()
                });
            },
        );
    }

    group.finish();
}

fn benchmark_corner_resolution(c: &mut Criterion) {
    let config = ProjectileConfig::default();
    let params = ProjectileSpawnParams::new(Vec3::ZERO, Vec3::new(1.0, -1.0, 1.0), TravelLaw::ConstantFast)
        .with_bounces(8, 0.1);
    let contacts = [
        Contact {
            point: Vec3::new(0.0, -0.1, 0.0),
            normal: Vec3::Y,
            collider: ColliderId(1),
            distance: 0.1,
        },
        Contact {
            point: Vec3::new(0.1, 0.0, 0.0),
            normal: Vec3::NEG_X,
            collider: ColliderId(2),
            distance: 0.1,
        },
        Contact {
            point: Vec3::new(0.0, 0.0, 0.1),
            normal: Vec3::NEG_Z,
            collider: ColliderId(3),
            distance: 0.1,
        },
    ];

    c.bench_function("Three-Wall Corner", |b| {
        b.iter(|| {
            let mut projectile = Projectile::from_params(ProjectileId(1), &params, &config);
            collision::resolve_collision(&mut projectile, &contacts[0], &contacts, &config.bounce, None)
        });
    });
}

fn benchmark_travel_laws(c: &mut Criterion) {
    let config = ProjectileConfig::default();
    let laws = [
        TravelLaw::ConstantSlow,
        TravelLaw::SlowAccelerate,
        TravelLaw::FastDecelerate,
        TravelLaw::CurveAccelerate,
        TravelLaw::PulseSpeed,
    ];
    let mut projectiles: Vec<Projectile> = (0..1000)
        .map(|i| {
            let params = ProjectileSpawnParams::new(Vec3::ZERO, Vec3::X, laws[i % laws.len()]);
            Projectile::from_params(ProjectileId(i as u64), &params, &config)
        })
        .collect();

    c.bench_function("Travel Laws x1000", |b| {
        b.iter(|| {
            for projectile in projectiles.iter_mut() {
                projectile.age += 1.0 / 60.0;
                trajectory::update_speed(projectile, 1.0 / 60.0);
                projectile.position += trajectory::advance(projectile, 1.0, 1.0 / 60.0);
            }
        });
    });
}

criterion_group!(
    benches,
    benchmark_simulation_step,
    benchmark_corner_resolution,
    benchmark_travel_laws
);
criterion_main!(benches);
