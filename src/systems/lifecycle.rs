//! Projectile lifecycle - ownership, per-tick update and termination.

use std::collections::{BTreeMap, VecDeque};

use bevy::prelude::*;

use crate::events::ProjectileEvent;
use crate::projectile::Projectile;
use crate::resources::ProjectileConfig;
use crate::services::{cues, Collaborators, OwnerLookup};
use crate::systems::collision::{self, CollisionOutcome, Detection};
use crate::systems::combat::{self, HitOutcome, RecallStep};
use crate::systems::trajectory;
use crate::types::{
    ColliderId, Contact, LifecycleState, OwnerId, ProjectileId, ProjectileSpawnParams, QueryShape,
    RecallState, TerminationReason, TravelLaw,
};

/// Ray segments a hitscan may walk through excluded, pierced or ignored hits.
const MAX_HITSCAN_SEGMENTS: usize = 8;

/// Restart distance past a hit a hitscan ray continues through.
const HITSCAN_SKIP: f32 = 1e-3;

/// Seconds an impact flash stays visible.
const IMPACT_DURATION: f32 = 0.2;

/// Work postponed to the end of the tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeferredTask {
    RegisterVisual(ProjectileId),
}

/// Owns every live projectile and advances them once per tick.
///
/// Projectiles are keyed by id in a `BTreeMap`, so every tick visits them in
/// creation order. Collaborators are passed in per call and never stored.
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_bullet_time::prelude::*;
/// use bevy_bullet_time::services::{NoOwners, NoTargets, SilentAudio, SilentVisuals};
///
/// let config = ProjectileConfig::default();
/// let time = TimeDilation::new(1.0);
/// let (mut targets, mut owners) = (NoTargets, NoOwners);
/// let (mut visuals, mut audio) = (SilentVisuals::default(), SilentAudio);
/// let mut collab = Collaborators {
///     time: &time,
///     spatial: None,
///     targets: &mut targets,
///     owners: &mut owners,
///     visuals: &mut visuals,
///     audio: &mut audio,
/// };
///
/// let mut simulation = ProjectileSimulation::default();
/// let params = ProjectileSpawnParams::new(Vec3::ZERO, Vec3::X, TravelLaw::ConstantSlow);
/// let id = simulation.launch(params, &config, &mut collab);
/// simulation.step(0.1, &config, &mut collab);
///
/// let projectile = simulation.get(id).unwrap();
/// assert!((projectile.position.x - 1.2).abs() < 1e-4);
/// ```
#[derive(Resource, Default)]
pub struct ProjectileSimulation {
    projectiles: BTreeMap<ProjectileId, Projectile>,
    next_id: u64,
    deferred: VecDeque<DeferredTask>,
    events: Vec<ProjectileEvent>,
    scratch: Vec<ProjectileId>,
}

/// Borrowed state threaded through one projectile update.
pub(crate) struct TickContext<'t, 'a> {
    pub config: &'t ProjectileConfig,
    pub collab: &'t mut Collaborators<'a>,
    pub events: &'t mut Vec<ProjectileEvent>,
}

impl ProjectileSimulation {
    /// Creates an unfired projectile.
    ///
    /// Its tracer is registered at the end of the current tick, and only if
    /// the projectile is still alive by then.
    pub fn spawn(&mut self, params: ProjectileSpawnParams, config: &ProjectileConfig) -> ProjectileId {
        self.next_id += 1;
        let id = ProjectileId(self.next_id);
        self.projectiles
            .insert(id, Projectile::from_params(id, &params, config));
        self.deferred.push_back(DeferredTask::RegisterVisual(id));
        debug!("Spawned projectile {:?} ({:?})", id, params.travel_law);
        id
    }

    /// Fires an unfired projectile.
    ///
    /// # Returns
    /// `false` if the projectile does not exist or was already fired
    pub fn fire(&mut self, id: ProjectileId, config: &ProjectileConfig, collab: &mut Collaborators) -> bool {
        let Some(projectile) = self.projectiles.get_mut(&id) else {
            return false;
        };
        if projectile.state != LifecycleState::Unfired {
            return false;
        }

        let mut ctx = TickContext {
            config,
            collab,
            events: &mut self.events,
        };
        fire_projectile(projectile, &mut ctx);
        self.sweep();
        true
    }

    /// Spawns and fires in one call.
    pub fn launch(
        &mut self,
        params: ProjectileSpawnParams,
        config: &ProjectileConfig,
        collab: &mut Collaborators,
    ) -> ProjectileId {
        let id = self.spawn(params, config);
        self.fire(id, config, collab);
        id
    }

    /// Fires every unfired projectile held by `owner`.
    pub fn release(&mut self, owner: OwnerId, config: &ProjectileConfig, collab: &mut Collaborators) -> usize {
        let held: Vec<ProjectileId> = self
            .projectiles
            .values()
            .filter(|p| p.owner == Some(owner) && p.state == LifecycleState::Unfired)
            .map(|p| p.id)
            .collect();
        held.into_iter()
            .filter(|id| self.fire(*id, config, collab))
            .count()
    }

    /// Calls every recallable projectile of `owner` back.
    ///
    /// # Returns
    /// Number of projectiles now recalling; 0 if the owner cannot be found
    pub fn recall(&mut self, owner: OwnerId, config: &ProjectileConfig, collab: &mut Collaborators) -> usize {
        let Some(owner_position) = collab.owners.owner_position(owner) else {
            return 0;
        };

        let mut recalled = 0;
        for projectile in self.projectiles.values_mut() {
            if projectile.owner != Some(owner) || !projectile.can_recall() {
                continue;
            }
            combat::begin_recall(projectile, owner_position, &config.recall);
            collab.audio.play(cues::RECALL, Some(projectile.position));
            self.events.push(ProjectileEvent::RecallStarted {
                id: projectile.id,
                owner,
            });
            recalled += 1;
        }
        if recalled > 0 {
            debug!("Recalling {} projectile(s) to {:?}", recalled, owner);
        }
        recalled
    }

    /// Removes a projectile immediately. No explosion, no impact.
    ///
    /// Safe to call any number of times; only the first call does anything.
    pub fn destroy(&mut self, id: ProjectileId, collab: &mut Collaborators) -> bool {
        let Some(mut projectile) = self.projectiles.remove(&id) else {
            return false;
        };
        let was_live = !projectile.is_terminal();
        terminate(&mut projectile, TerminationReason::Cancelled, collab, &mut self.events);
        was_live
    }

    /// Advances every projectile by one tick of `dt` unscaled seconds, then
    /// discards terminated projectiles and runs deferred tasks.
    pub fn step(&mut self, dt: f32, config: &ProjectileConfig, collab: &mut Collaborators) {
        let mut ids = std::mem::take(&mut self.scratch);
        ids.clear();
        ids.extend(self.projectiles.keys().copied());

        {
            let mut ctx = TickContext {
                config,
                collab: &mut *collab,
                events: &mut self.events,
            };
            for id in &ids {
                if let Some(projectile) = self.projectiles.get_mut(id) {
                    step_projectile(projectile, dt, &mut ctx);
                }
            }
        }

        self.sweep();
        self.run_deferred(collab);
        self.scratch = ids;
    }

    /// Feeds a collision reported from outside the per-tick sweep.
    ///
    /// # Returns
    /// `false` if the projectile is unknown, unfired, terminated or recalling
    pub fn report_collision(
        &mut self,
        id: ProjectileId,
        contact: Contact,
        config: &ProjectileConfig,
        collab: &mut Collaborators,
    ) -> bool {
        let Some(projectile) = self.projectiles.get_mut(&id) else {
            return false;
        };
        if !projectile.is_active() || projectile.is_recalling() {
            return false;
        }

        let contacts = collab
            .spatial
            .map(|spatial| {
                spatial.shapecast(
                    &QueryShape::Sphere {
                        radius: projectile.radius + config.bounce.contact_skin,
                    },
                    &projectile.transform(),
                    config.collision_mask,
                )
            })
            .unwrap_or_default();
        let detection = Detection {
            position: projectile.position,
            event: Some(contact),
            contacts,
        };

        let mut ctx = TickContext {
            config,
            collab,
            events: &mut self.events,
        };
        handle_contacts(projectile, detection, &mut ctx);
        self.sweep();
        true
    }

    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }

    /// Takes every event recorded since the last drain, in order.
    pub fn drain_events(&mut self) -> impl Iterator<Item = ProjectileEvent> + '_ {
        self.events.drain(..)
    }

    fn sweep(&mut self) {
        self.projectiles.retain(|_, projectile| !projectile.is_terminal());
    }

    fn run_deferred(&mut self, collab: &mut Collaborators) {
        while let Some(task) = self.deferred.pop_front() {
            match task {
                DeferredTask::RegisterVisual(id) => {
                    let Some(projectile) = self.projectiles.get_mut(&id) else {
                        continue;
                    };
                    if projectile.visual.is_none() {
                        projectile.visual = Some(collab.visuals.register(id));
                    }
                }
            }
        }
    }
}

/// Slaves an unfired projectile to its owner's muzzle.
fn follow_muzzle(projectile: &mut Projectile, owners: &dyn OwnerLookup) {
    let Some(muzzle) = projectile.owner.and_then(|owner| owners.muzzle_transform(owner)) else {
        return;
    };
    projectile.position = muzzle.translation;
    projectile.direction = muzzle.forward().as_vec3();
    projectile.rotation = trajectory::orient(projectile.direction, projectile.spin_angle);
}

fn fire_projectile(projectile: &mut Projectile, ctx: &mut TickContext) {
    follow_muzzle(projectile, &*ctx.collab.owners);
    if let Some(collider) = projectile
        .owner
        .and_then(|owner| ctx.collab.owners.owner_collider(owner))
    {
        projectile.exclusion_set.insert(collider, projectile.position);
    }

    projectile.fired = true;
    projectile.state = LifecycleState::Fired;
    projectile.age = 0.0;
    projectile.speed = trajectory::initial_speed(projectile.travel_law, &projectile.speed_profile);
    trajectory::update_speed(projectile, 0.0);
    projectile.rotation = trajectory::orient(projectile.direction, projectile.spin_angle);

    ctx.collab.audio.play(cues::FIRE, Some(projectile.position));
    ctx.events.push(ProjectileEvent::Fired {
        id: projectile.id,
        position: projectile.position,
        direction: projectile.direction,
        travel_law: projectile.travel_law,
    });
    debug!("Fired projectile {:?} from {}", projectile.id, projectile.position);

    let instant = projectile.travel_law == TravelLaw::Hitscan
        || (projectile.travel_law == TravelLaw::DelayedHitscan && ctx.config.hitscan.delay <= 0.0);
    if instant {
        resolve_hitscan(projectile, ctx);
    }
}

fn step_projectile(projectile: &mut Projectile, dt: f32, ctx: &mut TickContext) {
    match projectile.state {
        LifecycleState::Terminal => return,
        LifecycleState::Unfired => {
            follow_muzzle(projectile, &*ctx.collab.owners);
            return;
        }
        _ => {}
    }

    let time_scale = ctx.collab.time.effective_time_scale(projectile.time_resistance);
    let adjusted_dt = ctx.collab.time.adjusted_delta(dt, projectile.time_resistance);

    if projectile.travel_law.is_hitscan() {
        projectile.hitscan_delay_elapsed += adjusted_dt;
        if projectile.travel_law == TravelLaw::Hitscan
            || projectile.hitscan_delay_elapsed >= ctx.config.hitscan.delay
        {
            resolve_hitscan(projectile, ctx);
        }
        return;
    }

    projectile.age += adjusted_dt;

    if projectile.is_recalling() {
        step_recall(projectile, time_scale, dt, ctx);
        return;
    }

    if projectile.age >= projectile.max_lifetime {
        terminate(
            projectile,
            TerminationReason::LifetimeExceeded,
            ctx.collab,
            ctx.events,
        );
        return;
    }

    trajectory::update_speed(projectile, adjusted_dt);
    let displacement = trajectory::advance(projectile, time_scale, dt);
    trajectory::spin(projectile, time_scale, dt);

    let Some(spatial) = ctx.collab.spatial else {
        projectile.position += displacement;
        return;
    };

    let detection = collision::detect_contacts(
        projectile,
        displacement,
        &ctx.config.bounce,
        spatial,
        ctx.config.collision_mask,
    );
    projectile.position = detection.position;
    collision::prune_exclusions(projectile, &detection.contacts, &ctx.config.bounce);
    handle_contacts(projectile, detection, ctx);
}

fn step_recall(projectile: &mut Projectile, time_scale: f32, dt: f32, ctx: &mut TickContext) {
    let owner_position = projectile
        .owner
        .and_then(|owner| ctx.collab.owners.owner_position(owner));

    match combat::steer_recall(projectile, owner_position, time_scale, dt, &ctx.config.recall) {
        RecallStep::Homing => {}
        RecallStep::Cancelled => {
            warn!("Owner of recalling projectile {:?} is gone, cancelling recall", projectile.id);
            ctx.events.push(ProjectileEvent::RecallCancelled { id: projectile.id });
        }
        RecallStep::Completed => {
            if let Some(owner) = projectile.owner {
                ctx.collab.owners.credit_ammo(owner, 1);
            }
            ctx.collab.audio.play(cues::RECALL_CATCH, Some(projectile.position));
            terminate(
                projectile,
                TerminationReason::RecallCompleted,
                ctx.collab,
                ctx.events,
            );
        }
    }
}

/// Reacts to the contacts found for a projectile: targets first, then surfaces.
fn handle_contacts(projectile: &mut Projectile, detection: Detection, ctx: &mut TickContext) {
    let Detection { event, contacts, .. } = detection;

    let mut target_contacts: Vec<Contact> = Vec::new();
    for contact in event.iter().chain(contacts.iter()) {
        let is_target = ctx.collab.targets.target_position(contact.collider).is_some();
        let seen = target_contacts.iter().any(|c| c.collider == contact.collider);
        if is_target && !seen && !projectile.exclusion_set.contains(contact.collider) {
            target_contacts.push(*contact);
        }
    }

    for contact in target_contacts {
        if projectile.is_terminal() {
            return;
        }
        let outcome = match ctx.collab.targets.target_mut(contact.collider) {
            Some(target) => combat::apply_hit(projectile, contact.collider, target),
            None => continue,
        };
        record_hit(projectile, &contact, outcome, ctx);
    }
    if projectile.is_terminal() {
        return;
    }

    let config = ctx.config;
    let outcome = {
        let targets = &*ctx.collab.targets;
        let is_surface = |collider: ColliderId| targets.target_position(collider).is_none();

        let surfaces: Vec<Contact> = contacts
            .iter()
            .filter(|contact| is_surface(contact.collider))
            .copied()
            .collect();
        let surface_event = event
            .filter(|contact| is_surface(contact.collider))
            .or_else(|| nearest_opposing(projectile, &surfaces));
        let Some(surface_event) = surface_event else {
            return;
        };

        let spatial = ctx.collab.spatial;
        let shape = QueryShape::Sphere {
            radius: projectile.radius + config.bounce.contact_skin,
        };
        let requery = |position: Vec3| -> Vec<Contact> {
            spatial
                .map(|spatial| {
                    spatial
                        .shapecast(&shape, &Transform::from_translation(position), config.collision_mask)
                        .into_iter()
                        .filter(|contact| is_surface(contact.collider))
                        .collect()
                })
                .unwrap_or_default()
        };
        let requery: Option<&dyn Fn(Vec3) -> Vec<Contact>> = match spatial {
            Some(_) => Some(&requery),
            None => None,
        };

        collision::resolve_collision(projectile, &surface_event, &surfaces, &config.bounce, requery)
    };

    match outcome {
        CollisionOutcome::NoAction => {}
        CollisionOutcome::Bounced { contact, reflections } => {
            ctx.collab.audio.play(cues::BOUNCE, Some(projectile.position));
            ctx.events.push(ProjectileEvent::Ricochet {
                id: projectile.id,
                collider: contact.collider,
                point: contact.point,
                normal: contact.normal,
                bounce_count: projectile.bounce_count,
            });
            if reflections > 1 {
                debug!(
                    "Projectile {:?} resolved a corner with {} reflections",
                    projectile.id, reflections
                );
            }
        }
        CollisionOutcome::Terminate(reason) => terminate(projectile, reason, ctx.collab, ctx.events),
    }
}

/// Nearest eligible surface whose normal opposes the projectile's direction.
fn nearest_opposing(projectile: &Projectile, surfaces: &[Contact]) -> Option<Contact> {
    projectile
        .exclusion_set
        .eligible(surfaces)
        .filter(|contact| {
            contact
                .usable_normal()
                .is_some_and(|normal| projectile.direction.dot(normal) < 0.0)
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
        .copied()
}

/// Publishes the consequences of a direct hit. Returns `true` if the
/// projectile was stopped.
fn record_hit(projectile: &mut Projectile, contact: &Contact, outcome: HitOutcome, ctx: &mut TickContext) -> bool {
    let id = projectile.id;
    match outcome {
        HitOutcome::Ignored => false,
        HitOutcome::Prevented => {
            ctx.events.push(ProjectileEvent::Prevented {
                id,
                collider: contact.collider,
            });
            false
        }
        HitOutcome::Pierced { remaining } => {
            ctx.events.push(ProjectileEvent::Hit {
                id,
                collider: contact.collider,
                point: projectile.position,
                damage: projectile.damage,
            });
            ctx.events.push(ProjectileEvent::Penetration {
                id,
                collider: contact.collider,
                point: projectile.position,
                remaining_budget: remaining,
            });
            ctx.collab.audio.play(cues::PIERCE, Some(projectile.position));
            ctx.collab
                .visuals
                .create_impact(projectile.position, Color::srgb(1.0, 0.55, 0.2), IMPACT_DURATION * 0.5);
            false
        }
        HitOutcome::Stopped(reason) => {
            ctx.events.push(ProjectileEvent::Hit {
                id,
                collider: contact.collider,
                point: projectile.position,
                damage: projectile.damage,
            });
            ctx.collab.audio.play(cues::HIT, Some(projectile.position));
            let reason = if projectile.travel_law.is_hitscan() {
                TerminationReason::HitscanResolved
            } else {
                reason
            };
            terminate(projectile, reason, ctx.collab, ctx.events);
            true
        }
    }
}

/// Casts the hitscan ray and ends the projectile.
///
/// The ray walks through excluded colliders, ignored or prevented targets and
/// pierced targets, and stops on the first surface or on a stopping hit.
fn resolve_hitscan(projectile: &mut Projectile, ctx: &mut TickContext) {
    let range = ctx.config.hitscan.range;
    let mask = ctx.config.collision_mask;
    let origin = projectile.position;
    let direction = projectile.direction;

    let Some(spatial) = ctx.collab.spatial else {
        projectile.position = origin + direction * range;
        terminate(projectile, TerminationReason::HitscanMissed, ctx.collab, ctx.events);
        return;
    };

    let mut travelled = 0.0;
    for _ in 0..MAX_HITSCAN_SEGMENTS {
        let cursor = origin + direction * travelled;
        let Some(hit) = spatial.raycast(cursor, direction, range - travelled, mask) else {
            break;
        };
        let along = travelled + hit.distance;
        travelled = along + HITSCAN_SKIP;

        if projectile.exclusion_set.contains(hit.collider) {
            if travelled >= range {
                break;
            }
            continue;
        }

        projectile.position = origin + direction * along;
        let outcome = match ctx.collab.targets.target_mut(hit.collider) {
            Some(target) => combat::apply_hit(projectile, hit.collider, target),
            None => {
                terminate(projectile, TerminationReason::HitscanResolved, ctx.collab, ctx.events);
                return;
            }
        };
        if record_hit(projectile, &hit, outcome, ctx) {
            return;
        }
        if travelled >= range {
            break;
        }
    }

    projectile.position = origin + direction * range;
    let reason = if projectile.has_hit {
        TerminationReason::HitscanResolved
    } else {
        TerminationReason::HitscanMissed
    };
    terminate(projectile, reason, ctx.collab, ctx.events);
}

fn impact_color(reason: TerminationReason) -> Color {
    match reason {
        TerminationReason::TargetHit | TerminationReason::PiercingExhausted => Color::srgb(1.0, 0.3, 0.2),
        TerminationReason::Unresolvable => Color::srgb(0.6, 0.6, 0.6),
        _ => Color::srgb(1.0, 0.85, 0.4),
    }
}

/// Moves a projectile to `Terminal`, exactly once.
///
/// Detonates if the reason calls for it, shows the impact, and releases the
/// tracer registration.
pub(crate) fn terminate(
    projectile: &mut Projectile,
    reason: TerminationReason,
    collab: &mut Collaborators,
    events: &mut Vec<ProjectileEvent>,
) {
    if projectile.is_terminal() {
        return;
    }

    if projectile.is_explosive && reason.detonates() {
        let hits = combat::detonate(projectile, &mut *collab.targets);
        collab
            .visuals
            .create_explosion(projectile.position, projectile.explosion_radius);
        collab.audio.play(cues::EXPLOSION, Some(projectile.position));
        events.push(ProjectileEvent::Explosion {
            id: projectile.id,
            center: projectile.position,
            radius: projectile.explosion_radius,
            targets_hit: hits.iter().filter(|hit| hit.applied).count(),
        });
    }

    if reason.is_impact() {
        collab
            .visuals
            .create_impact(projectile.position, impact_color(reason), IMPACT_DURATION);
    }
    if let Some(handle) = projectile.visual.take() {
        collab.visuals.unregister(handle);
    }

    projectile.exclusion_set.clear();
    projectile.recall_state = RecallState::Inactive;
    projectile.state = LifecycleState::Terminal;
    events.push(ProjectileEvent::Terminated {
        id: projectile.id,
        reason,
        position: projectile.position,
    });
    debug!("Projectile {:?} terminated: {:?}", projectile.id, reason);
}
