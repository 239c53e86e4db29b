//! Bevy bridge - adapts ECS queries, avian3d and messages to the simulation.
//!
//! Each `FixedUpdate` tick builds a [`Collaborators`] bundle from the world,
//! applies queued commands, steps the [`ProjectileSimulation`], and turns the
//! effect requests it produced into messages.

#[cfg(feature = "dim3")]
use std::cell::RefCell;
use std::collections::BTreeMap;

use bevy::ecs::message::{MessageReader, MessageWriter};
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;

#[cfg(feature = "dim3")]
use avian3d::prelude::{
    Collider, ShapeCastConfig, SpatialQuery as PhysicsQuery, SpatialQueryFilter,
};

use crate::components::{ProjectileTarget, Shooter};
use crate::events::{
    AudioCue, DestroyProjectile, ExplosionEffect, ExplosionEvent, FireProjectile, HitEvent, HitPreventedEvent,
    ImpactEffect, PenetrationEvent, ProjectileEvent, ProjectileFired, ProjectileTerminated, RecallEvent, RecallProjectiles,
    ReleaseProjectiles, RicochetEvent,
};
use crate::resources::{ProjectileConfig, TimeDilation, TracerRegistry};
use crate::services::{
    AudioSink, Collaborators, CombatTarget, OwnerLookup, SpatialQuery, TargetLookup, VisualSink,
};
use crate::systems::lifecycle::ProjectileSimulation;
use crate::types::{
    ColliderId, CollisionMask, Contact, OwnerId, ProjectileId, ProjectileSpawnParams, QueryShape, VisualHandle,
};

/// Targets visible to the simulation.
pub type TargetQuery<'w, 's> =
    Query<'w, 's, (Entity, &'static GlobalTransform, &'static mut ProjectileTarget)>;

/// Shooters visible to the simulation.
pub type ShooterQuery<'w, 's> = Query<'w, 's, (Entity, &'static GlobalTransform, &'static mut Shooter)>;

/// Collider handles seen during the last tick, for turning ids back into entities.
#[derive(Resource, Default, Debug)]
pub struct ColliderIndex {
    entities: BTreeMap<ColliderId, Entity>,
}

impl ColliderIndex {
    pub fn entity(&self, collider: ColliderId) -> Option<Entity> {
        self.entities.get(&collider).copied()
    }

    pub fn insert(&mut self, entity: Entity) -> ColliderId {
        let collider = ColliderId::from_entity(entity);
        self.entities.insert(collider, entity);
        collider
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}

/// [`TargetLookup`] over the [`ProjectileTarget`] query.
pub struct EcsTargets<'q, 'w, 's> {
    query: &'q mut TargetQuery<'w, 's>,
    index: BTreeMap<ColliderId, Entity>,
}

impl<'q, 'w, 's> EcsTargets<'q, 'w, 's> {
    pub fn new(query: &'q mut TargetQuery<'w, 's>) -> Self {
        let index = query
            .iter()
            .map(|(entity, _, _)| (ColliderId::from_entity(entity), entity))
            .collect();
        Self { query, index }
    }

    fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.index.values().copied()
    }
}

impl TargetLookup for EcsTargets<'_, '_, '_> {
    fn target_mut(&mut self, collider: ColliderId) -> Option<&mut dyn CombatTarget> {
        let entity = *self.index.get(&collider)?;
        let (_, _, target) = self.query.get_mut(entity).ok()?;
        Some(target.into_inner())
    }

    fn target_position(&self, collider: ColliderId) -> Option<Vec3> {
        let entity = *self.index.get(&collider)?;
        let (_, transform, _) = self.query.get(entity).ok()?;
        Some(transform.translation())
    }

    fn targets_in_radius(&self, center: Vec3, radius: f32) -> Vec<ColliderId> {
        let radius_sq = radius * radius;
        self.query
            .iter()
            .filter(|(_, transform, _)| transform.translation().distance_squared(center) <= radius_sq)
            .map(|(entity, _, _)| ColliderId::from_entity(entity))
            .collect()
    }
}

/// [`OwnerLookup`] over the [`Shooter`] query.
///
/// The shooter entity is expected to carry its own collider.
pub struct EcsOwners<'q, 'w, 's> {
    query: &'q mut ShooterQuery<'w, 's>,
    index: BTreeMap<OwnerId, Entity>,
}

impl<'q, 'w, 's> EcsOwners<'q, 'w, 's> {
    pub fn new(query: &'q mut ShooterQuery<'w, 's>) -> Self {
        let index = query
            .iter()
            .map(|(entity, _, _)| (OwnerId::from_entity(entity), entity))
            .collect();
        Self { query, index }
    }

    /// Checks a fire request against its shooter.
    ///
    /// Requests from a [`Shooter`] spend one round and take the shooter's
    /// faction; an empty shooter drops the request. Requests without a
    /// shooter pass through unchanged.
    pub fn admit(&mut self, shot: &FireProjectile) -> Option<ProjectileSpawnParams> {
        let mut params = shot.params.clone();
        let Some(entity) = params.owner.and_then(|owner| self.index.get(&owner).copied()) else {
            return Some(params);
        };
        let (_, _, mut shooter) = self.query.get_mut(entity).ok()?;
        if !shooter.consume() {
            debug!("Shooter {:?} is out of ammo", entity);
            return None;
        }
        params.faction = shooter.faction;
        Some(params)
    }

    fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.index.values().copied()
    }
}

impl OwnerLookup for EcsOwners<'_, '_, '_> {
    fn owner_position(&self, owner: OwnerId) -> Option<Vec3> {
        let entity = *self.index.get(&owner)?;
        let (_, transform, _) = self.query.get(entity).ok()?;
        Some(transform.translation())
    }

    fn muzzle_transform(&self, owner: OwnerId) -> Option<Transform> {
        let entity = *self.index.get(&owner)?;
        let (_, transform, shooter) = self.query.get(entity).ok()?;
        Some(shooter.muzzle(transform))
    }

    fn owner_collider(&self, owner: OwnerId) -> Option<ColliderId> {
        self.index.get(&owner).copied().map(ColliderId::from_entity)
    }

    fn credit_ammo(&mut self, owner: OwnerId, amount: u32) -> bool {
        let Some(entity) = self.index.get(&owner).copied() else {
            return false;
        };
        match self.query.get_mut(entity) {
            Ok((_, _, mut shooter)) => {
                shooter.credit(amount);
                true
            }
            Err(_) => false,
        }
    }
}

/// [`VisualSink`] that keeps tracer registrations in the [`TracerRegistry`]
/// and queues effect requests as messages.
pub struct MessageVisuals<'r> {
    registry: &'r mut TracerRegistry,
    pub impacts: Vec<ImpactEffect>,
    pub explosions: Vec<ExplosionEffect>,
}

impl<'r> MessageVisuals<'r> {
    pub fn new(registry: &'r mut TracerRegistry) -> Self {
        Self {
            registry,
            impacts: Vec::new(),
            explosions: Vec::new(),
        }
    }
}

impl VisualSink for MessageVisuals<'_> {
    fn register(&mut self, projectile: ProjectileId) -> VisualHandle {
        self.registry.register(projectile)
    }

    fn unregister(&mut self, handle: VisualHandle) {
        self.registry.unregister(handle);
    }

    fn create_impact(&mut self, point: Vec3, color: Color, duration: f32) {
        self.impacts.push(ImpactEffect {
            point,
            color,
            duration,
        });
    }

    fn create_explosion(&mut self, point: Vec3, radius: f32) {
        self.explosions.push(ExplosionEffect { point, radius });
    }
}

/// [`AudioSink`] that queues cues as messages.
#[derive(Default)]
pub struct MessageAudio {
    pub cues: Vec<AudioCue>,
}

impl AudioSink for MessageAudio {
    fn play(&mut self, cue: &'static str, position: Option<Vec3>) {
        self.cues.push(AudioCue { cue, position });
    }
}

/// [`SpatialQuery`] backed by avian3d.
///
/// Every entity a query returns is remembered so published messages can name it.
#[cfg(feature = "dim3")]
pub struct AvianSpatial<'q, 'w, 's> {
    query: &'q PhysicsQuery<'w, 's>,
    seen: RefCell<BTreeMap<ColliderId, Entity>>,
}

#[cfg(feature = "dim3")]
impl<'q, 'w, 's> AvianSpatial<'q, 'w, 's> {
    pub fn new(query: &'q PhysicsQuery<'w, 's>) -> Self {
        Self {
            query,
            seen: RefCell::new(BTreeMap::new()),
        }
    }

    fn remember(&self, entity: Entity) -> ColliderId {
        let collider = ColliderId::from_entity(entity);
        self.seen.borrow_mut().insert(collider, entity);
        collider
    }

    fn into_seen(self) -> BTreeMap<ColliderId, Entity> {
        self.seen.into_inner()
    }
}

#[cfg(feature = "dim3")]
impl SpatialQuery for AvianSpatial<'_, '_, '_> {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32, mask: CollisionMask) -> Option<Contact> {
        let direction = Dir3::new(direction).ok()?;
        let filter = SpatialQueryFilter::from_mask(mask.0);
        let hit = self
            .query
            .cast_ray(origin, direction, max_distance, true, &filter)?;

        Some(Contact {
            point: origin + *direction * hit.distance,
            normal: hit.normal,
            collider: self.remember(hit.entity),
            distance: hit.distance,
        })
    }

    fn shapecast(&self, shape: &QueryShape, transform: &Transform, mask: CollisionMask) -> Vec<Contact> {
        let QueryShape::Sphere { radius } = *shape;
        let filter = SpatialQueryFilter::from_mask(mask.0);
        let origin = transform.translation;

        let mut contacts: Vec<Contact> = self
            .query
            .shape_hits(
                &Collider::sphere(radius),
                origin,
                transform.rotation,
                Dir3::NEG_Y,
                16,
                &ShapeCastConfig::from_max_distance(0.0),
                &filter,
            )
            .into_iter()
            .map(|hit| {
                let normal = if hit.normal1.length_squared() > 0.0 {
                    hit.normal1
                } else {
                    (origin - hit.point1).try_normalize().unwrap_or(Vec3::ZERO)
                };
                Contact {
                    point: hit.point1,
                    normal,
                    collider: self.remember(hit.entity),
                    distance: hit.point1.distance(origin),
                }
            })
            .collect();
        contacts.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        contacts
    }
}

/// Command and effect messages handled by the simulation step.
#[derive(SystemParam)]
pub struct ProjectileMessages<'w, 's> {
    fire: MessageReader<'w, 's, FireProjectile>,
    release: MessageReader<'w, 's, ReleaseProjectiles>,
    recall: MessageReader<'w, 's, RecallProjectiles>,
    destroy: MessageReader<'w, 's, DestroyProjectile>,
    impacts: MessageWriter<'w, ImpactEffect>,
    explosions: MessageWriter<'w, ExplosionEffect>,
    audio: MessageWriter<'w, AudioCue>,
}

/// Everything the simulation step needs apart from spatial queries.
#[derive(SystemParam)]
pub struct SimulationParams<'w, 's> {
    time: Res<'w, Time<Fixed>>,
    config: Res<'w, ProjectileConfig>,
    dilation: Res<'w, TimeDilation>,
    simulation: ResMut<'w, ProjectileSimulation>,
    registry: ResMut<'w, TracerRegistry>,
    index: ResMut<'w, ColliderIndex>,
    messages: ProjectileMessages<'w, 's>,
    targets: TargetQuery<'w, 's>,
    shooters: ShooterQuery<'w, 's>,
}

impl SimulationParams<'_, '_> {
    /// Applies queued commands, then steps the simulation once.
    fn run_tick(&mut self, spatial: Option<&dyn SpatialQuery>) {
        let dt = self.time.delta_secs();
        let config: &ProjectileConfig = &self.config;
        let dilation = *self.dilation;
        let simulation = &mut *self.simulation;

        let mut owners = EcsOwners::new(&mut self.shooters);
        let shots: Vec<(ProjectileSpawnParams, bool)> = self
            .messages
            .fire
            .read()
            .filter_map(|shot| owners.admit(shot).map(|params| (params, shot.hold)))
            .collect();

        let mut targets = EcsTargets::new(&mut self.targets);
        let mut visuals = MessageVisuals::new(&mut self.registry);
        let mut audio = MessageAudio::default();

        self.index.clear();
        for entity in targets.entities().chain(owners.entities()) {
            self.index.insert(entity);
        }

        {
            let mut collab = Collaborators {
                time: &dilation,
                spatial,
                targets: &mut targets,
                owners: &mut owners,
                visuals: &mut visuals,
                audio: &mut audio,
            };

            for (params, hold) in shots {
                if hold {
                    simulation.spawn(params, config);
                } else {
                    simulation.launch(params, config, &mut collab);
                }
            }
            for release in self.messages.release.read() {
                simulation.release(OwnerId::from_entity(release.owner), config, &mut collab);
            }
            for recall in self.messages.recall.read() {
                simulation.recall(OwnerId::from_entity(recall.owner), config, &mut collab);
            }
            for destroy in self.messages.destroy.read() {
                simulation.destroy(destroy.id, &mut collab);
            }

            simulation.step(dt, config, &mut collab);
        }

        for impact in visuals.impacts {
            self.messages.impacts.write(impact);
        }
        for explosion in visuals.explosions {
            self.messages.explosions.write(explosion);
        }
        for cue in audio.cues {
            self.messages.audio.write(cue);
        }
    }
}

/// Steps the simulation against the avian3d world.
///
/// Runs only while avian's `SpatialQueryPipeline` exists.
#[cfg(feature = "dim3")]
pub fn step_projectile_simulation(mut params: SimulationParams, physics: PhysicsQuery) {
    let spatial = AvianSpatial::new(&physics);
    params.run_tick(Some(&spatial));
    for (_, entity) in spatial.into_seen() {
        params.index.insert(entity);
    }
}

/// Steps the simulation with no world to collide with.
///
/// Projectiles still fly, age, recall and expire; hitscans always miss.
pub fn step_projectile_simulation_without_spatial(mut params: SimulationParams) {
    params.run_tick(None);
}

/// Outcome messages written by [`publish_projectile_events`].
#[derive(SystemParam)]
pub struct OutcomeWriters<'w> {
    fired: MessageWriter<'w, ProjectileFired>,
    hits: MessageWriter<'w, HitEvent>,
    prevented: MessageWriter<'w, HitPreventedEvent>,
    ricochets: MessageWriter<'w, RicochetEvent>,
    penetrations: MessageWriter<'w, PenetrationEvent>,
    explosions: MessageWriter<'w, ExplosionEvent>,
    recalls: MessageWriter<'w, RecallEvent>,
    terminated: MessageWriter<'w, ProjectileTerminated>,
}

/// Drains the simulation's outbox into typed messages.
pub fn publish_projectile_events(
    mut simulation: ResMut<ProjectileSimulation>,
    index: Res<ColliderIndex>,
    mut out: OutcomeWriters,
) {
    for event in simulation.drain_events() {
        match event {
            ProjectileEvent::Fired {
                id,
                position,
                direction,
                travel_law,
            } => {
                out.fired.write(ProjectileFired {
                    projectile: id,
                    position,
                    direction,
                    travel_law,
                });
            }
            ProjectileEvent::Hit {
                id,
                collider,
                point,
                damage,
            } => {
                out.hits.write(HitEvent {
                    projectile: id,
                    target: index.entity(collider),
                    point,
                    damage,
                });
            }
            ProjectileEvent::Prevented { id, collider } => {
                out.prevented.write(HitPreventedEvent {
                    projectile: id,
                    target: index.entity(collider),
                });
            }
            ProjectileEvent::Ricochet {
                id,
                collider,
                point,
                normal,
                bounce_count,
            } => {
                out.ricochets.write(RicochetEvent {
                    projectile: id,
                    surface: index.entity(collider),
                    point,
                    normal,
                    bounce_count,
                });
            }
            ProjectileEvent::Penetration {
                id,
                collider,
                point,
                remaining_budget,
            } => {
                out.penetrations.write(PenetrationEvent {
                    projectile: id,
                    target: index.entity(collider),
                    point,
                    remaining_budget,
                });
            }
            ProjectileEvent::Explosion {
                id,
                center,
                radius,
                targets_hit,
            } => {
                out.explosions.write(ExplosionEvent {
                    projectile: id,
                    center,
                    radius,
                    targets_hit,
                });
            }
            ProjectileEvent::RecallStarted { id, .. } => {
                out.recalls.write(RecallEvent {
                    projectile: id,
                    started: true,
                });
            }
            ProjectileEvent::RecallCancelled { id } => {
                out.recalls.write(RecallEvent {
                    projectile: id,
                    started: false,
                });
            }
            ProjectileEvent::Terminated { id, reason, position } => {
                out.terminated.write(ProjectileTerminated {
                    projectile: id,
                    reason,
                    position,
                });
            }
        }
    }
}
