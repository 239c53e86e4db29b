//! Bounce scenarios: reflection law, energy loss, bounce budget and corners.

mod common;

use bevy::prelude::*;
use bevy_bullet_time::events::ProjectileEvent;
use bevy_bullet_time::prelude::*;
use bevy_bullet_time::systems::collision::reflect;
use common::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, UnitSphere};

fn random_unit(rng: &mut StdRng) -> Vec3 {
    let [x, y, z]: [f32; 3] = UnitSphere.sample(rng);
    Vec3::new(x, y, z).normalize()
}

/// Walls at x = -5 and x = 5, facing each other.
fn corridor() -> Scenario {
    let mut scenario = Scenario::default();
    scenario.world.add_plane(1, Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
    scenario.world.add_plane(2, Vec3::new(5.0, 0.0, 0.0), Vec3::NEG_X);
    scenario
}

#[test]
fn test_reflection_law_holds_for_random_surfaces() {
    let mut rng = StdRng::seed_from_u64(0xB0B);

    for _ in 0..500 {
        let direction = random_unit(&mut rng);
        let mut normal = random_unit(&mut rng);
        if direction.dot(normal) > 0.0 {
            normal = -normal;
        }
        if direction.dot(normal).abs() < 1e-3 {
            continue;
        }

        let reflected = reflect(direction, normal);

        assert!((reflected.length() - 1.0).abs() < 1e-4);
        assert!((reflected.dot(normal) + direction.dot(normal)).abs() < 1e-4);
        let tangent_in = direction - direction.dot(normal) * normal;
        let tangent_out = reflected - reflected.dot(normal) * normal;
        assert!((tangent_in - tangent_out).length() < 1e-4);
    }
}

#[test]
fn test_floor_bounce_mirrors_direction() {
    let mut scenario = Scenario::default();
    scenario.world.add_plane(1, Vec3::ZERO, Vec3::Y);
    let id = scenario.launch(
        ProjectileSpawnParams::new(Vec3::new(0.0, 2.0, 0.0), Vec3::new(1.0, -1.0, 0.0), TravelLaw::ConstantSlow)
            .with_bounces(2, 0.0),
    );

    for _ in 0..60 {
        scenario.step();
        if scenario.ricochets_of(id) > 0 {
            break;
        }
    }

    assert_eq!(scenario.ricochets_of(id), 1);
    let projectile = scenario.simulation.get(id).unwrap();
    let expected = Vec3::new(1.0, 1.0, 0.0).normalize();
    assert!((projectile.direction - expected).length() < 1e-4);
    assert!(projectile.position.y > 0.0);
    assert_eq!(projectile.state, LifecycleState::Bouncing);
    assert!(projectile.exclusion_set.contains(ColliderId(1)));
}

#[test]
fn test_speed_decays_geometrically_per_bounce() {
    let mut scenario = corridor();
    let loss = 0.25;
    let id = scenario.launch(
        ProjectileSpawnParams::new(Vec3::ZERO, Vec3::X, TravelLaw::ConstantFast)
            .with_bounces(3, loss)
            .with_lifetime(30.0),
    );
    let initial = scenario.simulation.get(id).unwrap().speed;

    let mut last_speed = initial;
    for _ in 0..600 {
        scenario.step();
        let Some(projectile) = scenario.simulation.get(id) else {
            break;
        };
        let expected = initial * (1.0 - loss).powi(projectile.bounce_count as i32);
        assert!((projectile.speed - expected).abs() < 1e-3);
        assert!(projectile.speed <= last_speed + 1e-4);
        assert!(projectile.position.x.abs() <= 5.0);
        last_speed = projectile.speed;
    }

    assert_eq!(scenario.ricochets_of(id), 3);
}

#[test]
fn test_collision_after_last_bounce_terminates() {
    let mut scenario = corridor();
    let id = scenario.launch(
        ProjectileSpawnParams::new(Vec3::ZERO, Vec3::X, TravelLaw::ConstantFast)
            .with_bounces(2, 0.1)
            .with_lifetime(30.0),
    );

    let ticks = scenario.run_until_gone(id, 600);

    assert!(ticks.is_some());
    assert_eq!(scenario.ricochets_of(id), 2);
    let (reason, position) = scenario.termination_of(id).unwrap();
    assert_eq!(reason, TerminationReason::BounceBudgetExceeded);
    assert!((position.x - 4.9).abs() < 1e-3);
    assert_eq!(scenario.visuals.impacts.len(), 1);
}

#[test]
fn test_zero_bounce_projectile_stops_at_first_wall() {
    let mut scenario = corridor();
    let id = scenario.launch(ProjectileSpawnParams::new(Vec3::ZERO, Vec3::NEG_X, TravelLaw::ConstantFast));

    scenario.run_until_gone(id, 120);

    assert_eq!(scenario.ricochets_of(id), 0);
    assert_eq!(
        scenario.termination_of(id).map(|(reason, _)| reason),
        Some(TerminationReason::BounceBudgetExceeded)
    );
}

#[test]
fn test_concave_corner_is_one_bounce_without_tunneling() {
    let mut scenario = Scenario::default();
    scenario.world.add_plane(1, Vec3::ZERO, Vec3::Y);
    scenario.world.add_plane(2, Vec3::new(3.0, 0.0, 0.0), Vec3::NEG_X);
    let id = scenario.launch(
        ProjectileSpawnParams::new(Vec3::new(2.0, 1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), TravelLaw::ConstantSlow)
            .with_bounces(5, 0.5)
            .with_lifetime(3.0),
    );

    for _ in 0..120 {
        scenario.step();
        let Some(projectile) = scenario.simulation.get(id) else {
            break;
        };
        assert!(projectile.position.x <= 3.0, "tunneled through the wall");
        assert!(projectile.position.y >= 0.0, "tunneled through the floor");
    }

    assert_eq!(scenario.ricochets_of(id), 1);
    let projectile = scenario.simulation.get(id).unwrap();
    assert_eq!(projectile.bounce_count, 1);
    assert!((projectile.speed - 6.0).abs() < 1e-4);
    let expected = Vec3::new(-1.0, 1.0, 0.0).normalize();
    assert!((projectile.direction - expected).length() < 1e-3);
}

#[test]
fn test_acute_wedge_terminates_within_iteration_bound() {
    let mut scenario = Scenario::default();
    scenario.world.add_plane(1, Vec3::ZERO, Vec3::Y);
    // Leans back over the floor, closing a 73 degree wedge at (3, 0, 0).
    scenario
        .world
        .add_plane(2, Vec3::new(3.0, 0.0, 0.0), Vec3::new(-1.0, -0.3, 0.0));
    let id = scenario.launch(
        ProjectileSpawnParams::new(Vec3::new(0.0, 0.5, 0.0), Vec3::new(3.0, -0.5, 0.0), TravelLaw::ConstantFast)
            .with_bounces(8, 0.2)
            .with_lifetime(2.0),
    );

    let ticks = scenario.run_until_gone(id, 600);

    assert!(ticks.is_some());
    assert!(scenario.termination_of(id).is_some());
}

#[test]
fn test_reported_collision_without_overlap_data_uses_event_normal() {
    let mut scenario = Scenario {
        spatial_enabled: false,
        ..Default::default()
    };
    let id = scenario.launch(
        ProjectileSpawnParams::new(Vec3::ZERO, Vec3::X, TravelLaw::ConstantSlow).with_bounces(1, 0.0),
    );
    let contact = Contact {
        point: Vec3::new(0.1, 0.0, 0.0),
        normal: Vec3::NEG_X,
        collider: ColliderId(9),
        distance: 0.1,
    };

    let accepted = scenario.with(|sim, config, collab| sim.report_collision(id, contact, config, collab));

    assert!(accepted);
    let projectile = scenario.simulation.get(id).unwrap();
    assert_eq!(projectile.direction, Vec3::NEG_X);
    assert_eq!(projectile.bounce_count, 1);
    assert!(scenario.events.iter().any(|event| matches!(
        event,
        ProjectileEvent::Ricochet { collider: ColliderId(9), .. }
    )));

    // Same collider again is excluded and ignored.
    let again = scenario.with(|sim, config, collab| sim.report_collision(id, contact, config, collab));
    assert!(again);
    assert_eq!(scenario.simulation.get(id).unwrap().bounce_count, 1);
}

#[test]
fn test_reported_collision_without_normal_is_unresolvable() {
    let mut scenario = Scenario {
        spatial_enabled: false,
        ..Default::default()
    };
    let id = scenario.launch(
        ProjectileSpawnParams::new(Vec3::ZERO, Vec3::X, TravelLaw::ConstantSlow).with_bounces(3, 0.0),
    );
    let contact = Contact {
        point: Vec3::ZERO,
        normal: Vec3::ZERO,
        collider: ColliderId(4),
        distance: 0.0,
    };

    scenario.with(|sim, config, collab| sim.report_collision(id, contact, config, collab));

    assert!(scenario.simulation.get(id).is_none());
    assert_eq!(
        scenario.termination_of(id).map(|(reason, _)| reason),
        Some(TerminationReason::Unresolvable)
    );
}

#[test]
fn test_report_collision_rejects_unfired_projectile() {
    let mut scenario = Scenario::default();
    let id = scenario
        .simulation
        .spawn(ProjectileSpawnParams::default(), &scenario.config);
    let contact = Contact {
        point: Vec3::ZERO,
        normal: Vec3::Y,
        collider: ColliderId(1),
        distance: 0.0,
    };

    let accepted = scenario.with(|sim, config, collab| sim.report_collision(id, contact, config, collab));

    assert!(!accepted);
    assert_eq!(scenario.simulation.get(id).unwrap().state, LifecycleState::Unfired);
}
