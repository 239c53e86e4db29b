//! In-memory world used by the scenario tests: infinite planes for level
//! geometry, spheres for targets, and collaborators that record what the
//! simulation asked of them.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use bevy::prelude::*;
use bevy_bullet_time::events::ProjectileEvent;
use bevy_bullet_time::prelude::*;
use bevy_bullet_time::services::{
    AudioSink, CombatTarget, Damageable, Knockbackable, OwnerLookup, Piercable, TargetLookup, VisualSink,
};

pub const DT: f32 = 1.0 / 60.0;

/// Solid half-space behind `normal`.
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub id: u64,
    pub point: Vec3,
    pub normal: Vec3,
}

#[derive(Clone, Copy, Debug)]
pub struct Ball {
    pub id: u64,
    pub center: Vec3,
    pub radius: f32,
}

/// Level geometry. Rays starting inside a shape pass out of it unhindered.
#[derive(Default)]
pub struct MockWorld {
    pub planes: Vec<Plane>,
    pub balls: Vec<Ball>,
}

impl MockWorld {
    pub fn add_plane(&mut self, id: u64, point: Vec3, normal: Vec3) {
        self.planes.push(Plane {
            id,
            point,
            normal: normal.normalize(),
        });
    }

    pub fn add_ball(&mut self, id: u64, center: Vec3, radius: f32) {
        self.balls.push(Ball { id, center, radius });
    }
}

impl SpatialQuery for MockWorld {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, _mask: CollisionMask) -> Option<Contact> {
        let direction = direction.normalize();
        let mut best: Option<Contact> = None;
        let mut consider = |distance: f32, normal: Vec3, id: u64| {
            if distance < 0.0 || distance > max_distance {
                return;
            }
            if best.is_some_and(|b| b.distance <= distance) {
                return;
            }
            best = Some(Contact {
                point: origin + direction * distance,
                normal,
                collider: ColliderId(id),
                distance,
            });
        };

        for plane in &self.planes {
            let height = (origin - plane.point).dot(plane.normal);
            let approach = direction.dot(plane.normal);
            if height >= 0.0 && approach < 0.0 {
                consider(height / -approach, plane.normal, plane.id);
            }
        }

        for ball in &self.balls {
            let offset = origin - ball.center;
            let c = offset.length_squared() - ball.radius * ball.radius;
            if c <= 0.0 {
                continue;
            }
            let b = offset.dot(direction);
            let discriminant = b * b - c;
            if b >= 0.0 || discriminant < 0.0 {
                continue;
            }
            let distance = -b - discriminant.sqrt();
            let point = origin + direction * distance;
            consider(distance, (point - ball.center).normalize(), ball.id);
        }

        best
    }

    fn shapecast(&self, shape: &QueryShape, transform: &Transform, _mask: CollisionMask) -> Vec<Contact> {
        let QueryShape::Sphere { radius } = *shape;
        let position = transform.translation;
        let mut contacts = Vec::new();

        for plane in &self.planes {
            let height = (position - plane.point).dot(plane.normal);
            if height <= radius {
                contacts.push(Contact {
                    point: position - plane.normal * height,
                    normal: plane.normal,
                    collider: ColliderId(plane.id),
                    distance: height.max(0.0),
                });
            }
        }

        for ball in &self.balls {
            let offset = position - ball.center;
            let gap = offset.length() - ball.radius;
            if gap <= radius {
                let normal = offset.try_normalize().unwrap_or(Vec3::Y);
                contacts.push(Contact {
                    point: ball.center + normal * ball.radius,
                    normal,
                    collider: ColliderId(ball.id),
                    distance: gap.max(0.0),
                });
            }
        }

        contacts.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        contacts
    }
}

#[derive(Clone, Debug)]
pub struct MockTarget {
    pub position: Vec3,
    pub faction: Faction,
    pub health: f32,
    pub piercability: f32,
    pub blocks_damage: bool,
    pub knockback: Vec3,
    pub hits: u32,
}

impl MockTarget {
    pub fn enemy(position: Vec3) -> Self {
        Self {
            position,
            faction: Faction::Enemy,
            health: 100.0,
            piercability: 1.0,
            blocks_damage: false,
            knockback: Vec3::ZERO,
            hits: 0,
        }
    }
}

impl Damageable for MockTarget {
    fn take_damage(&mut self, amount: f32) -> bool {
        self.hits += 1;
        if self.blocks_damage {
            return false;
        }
        self.health -= amount;
        true
    }
}

impl Piercable for MockTarget {
    fn piercability(&self) -> f32 {
        self.piercability
    }
}

impl Knockbackable for MockTarget {
    fn apply_knockback(&mut self, direction: Vec3, force: f32) {
        self.knockback += direction * force;
    }
}

impl CombatTarget for MockTarget {
    fn faction(&self) -> Faction {
        self.faction
    }
}

#[derive(Default)]
pub struct MockTargets {
    pub targets: BTreeMap<ColliderId, MockTarget>,
}

impl TargetLookup for MockTargets {
    fn target_mut(&mut self, collider: ColliderId) -> Option<&mut dyn CombatTarget> {
        self.targets
            .get_mut(&collider)
            .map(|target| target as &mut dyn CombatTarget)
    }

    fn target_position(&self, collider: ColliderId) -> Option<Vec3> {
        self.targets.get(&collider).map(|target| target.position)
    }

    fn targets_in_radius(&self, center: Vec3, radius: f32) -> Vec<ColliderId> {
        self.targets
            .iter()
            .filter(|(_, target)| target.position.distance(center) <= radius)
            .map(|(collider, _)| *collider)
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct MockOwner {
    pub position: Vec3,
    pub forward: Vec3,
    pub collider: Option<ColliderId>,
    pub ammo: u32,
}

#[derive(Default)]
pub struct MockOwners {
    pub owners: BTreeMap<OwnerId, MockOwner>,
}

impl OwnerLookup for MockOwners {
    fn owner_position(&self, owner: OwnerId) -> Option<Vec3> {
        self.owners.get(&owner).map(|o| o.position)
    }

    fn muzzle_transform(&self, owner: OwnerId) -> Option<Transform> {
        self.owners
            .get(&owner)
            .map(|o| Transform::from_translation(o.position).looking_to(o.forward, Vec3::Y))
    }

    fn owner_collider(&self, owner: OwnerId) -> Option<ColliderId> {
        self.owners.get(&owner).and_then(|o| o.collider)
    }

    fn credit_ammo(&mut self, owner: OwnerId, amount: u32) -> bool {
        match self.owners.get_mut(&owner) {
            Some(o) => {
                o.ammo += amount;
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
pub struct RecordingVisuals {
    next: u64,
    pub live: BTreeSet<VisualHandle>,
    pub registered: Vec<ProjectileId>,
    pub unregistered: u32,
    pub impacts: Vec<Vec3>,
    pub explosions: Vec<(Vec3, f32)>,
}

impl VisualSink for RecordingVisuals {
    fn register(&mut self, projectile: ProjectileId) -> VisualHandle {
        self.next += 1;
        let handle = VisualHandle(self.next);
        self.live.insert(handle);
        self.registered.push(projectile);
        handle
    }

    fn unregister(&mut self, handle: VisualHandle) {
        assert!(self.live.remove(&handle), "handle {handle:?} released twice");
        self.unregistered += 1;
    }

    fn create_impact(&mut self, point: Vec3, _color: Color, _duration: f32) {
        self.impacts.push(point);
    }

    fn create_explosion(&mut self, point: Vec3, radius: f32) {
        self.explosions.push((point, radius));
    }
}

#[derive(Default)]
pub struct RecordingAudio {
    pub cues: Vec<&'static str>,
}

impl AudioSink for RecordingAudio {
    fn play(&mut self, cue: &'static str, _position: Option<Vec3>) {
        self.cues.push(cue);
    }
}

/// A simulation plus everything it talks to.
pub struct Scenario {
    pub world: MockWorld,
    pub targets: MockTargets,
    pub owners: MockOwners,
    pub visuals: RecordingVisuals,
    pub audio: RecordingAudio,
    pub time: TimeDilation,
    pub config: ProjectileConfig,
    pub simulation: ProjectileSimulation,
    pub spatial_enabled: bool,
    pub events: Vec<ProjectileEvent>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            world: MockWorld::default(),
            targets: MockTargets::default(),
            owners: MockOwners::default(),
            visuals: RecordingVisuals::default(),
            audio: RecordingAudio::default(),
            time: TimeDilation::new(1.0),
            config: ProjectileConfig::default(),
            simulation: ProjectileSimulation::default(),
            spatial_enabled: true,
            events: Vec::new(),
        }
    }
}

impl Scenario {
    /// Adds a target whose collider is a ball of `radius` at `position`.
    pub fn add_target(&mut self, id: u64, target: MockTarget, radius: f32) {
        self.world.add_ball(id, target.position, radius);
        self.targets.targets.insert(ColliderId(id), target);
    }

    pub fn target(&self, id: u64) -> &MockTarget {
        &self.targets.targets[&ColliderId(id)]
    }

    /// Runs `f` with a collaborator bundle over this scenario and collects
    /// the events it produced.
    pub fn with<R>(
        &mut self,
        f: impl FnOnce(&mut ProjectileSimulation, &ProjectileConfig, &mut Collaborators) -> R,
    ) -> R {
        let spatial: Option<&dyn SpatialQuery> = if self.spatial_enabled {
            Some(&self.world)
        } else {
            None
        };
        let mut collab = Collaborators {
            time: &self.time,
            spatial,
            targets: &mut self.targets,
            owners: &mut self.owners,
            visuals: &mut self.visuals,
            audio: &mut self.audio,
        };
        let result = f(&mut self.simulation, &self.config, &mut collab);
        self.events.extend(self.simulation.drain_events());
        result
    }

    pub fn launch(&mut self, params: ProjectileSpawnParams) -> ProjectileId {
        self.with(|sim, config, collab| sim.launch(params, config, collab))
    }

    pub fn step(&mut self) {
        self.with(|sim, config, collab| sim.step(DT, config, collab));
    }

    pub fn run(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Steps until `id` is gone or `max_ticks` elapse; returns ticks used.
    pub fn run_until_gone(&mut self, id: ProjectileId, max_ticks: usize) -> Option<usize> {
        for tick in 0..max_ticks {
            if self.simulation.get(id).is_none() {
                return Some(tick);
            }
            self.step();
        }
        self.simulation.get(id).is_none().then_some(max_ticks)
    }

    pub fn termination_of(&self, id: ProjectileId) -> Option<(TerminationReason, Vec3)> {
        self.events.iter().find_map(|event| match event {
            ProjectileEvent::Terminated {
                id: event_id,
                reason,
                position,
            } if *event_id == id => Some((*reason, *position)),
            _ => None,
        })
    }

    pub fn ricochets_of(&self, id: ProjectileId) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, ProjectileEvent::Ricochet { id: event_id, .. } if *event_id == id))
            .count()
    }
}
