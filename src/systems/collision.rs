//! Collision system - contact detection and bounce resolution.
//!
//! Detection sweeps a ray along the tick's motion and then overlaps a sphere
//! at the resolved position. Resolution reflects off one surface, or walks a
//! corner surface by surface, and keeps the exclusion table in sync so the
//! same wall is never bounced twice in a row.

use bevy::prelude::*;

use crate::projectile::Projectile;
use crate::resources::BounceConfig;
use crate::services::SpatialQuery;
use crate::systems::trajectory::orient;
use crate::types::{CollisionMask, Contact, LifecycleState, QueryShape, TerminationReason};

/// Excluded colliders skipped by one detection ray before giving up.
const MAX_EXCLUDED_SKIPS: usize = 4;

/// Distance a skipping ray restarts past the excluded hit.
const SKIP_EPSILON: f32 = 1e-3;

/// Result of sweeping one tick of motion through the world.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Detection {
    /// Where the projectile ends up before any collision response
    pub position: Vec3,
    /// First non-excluded contact along the motion, if any
    pub event: Option<Contact>,
    /// Everything overlapping the projectile at `position`, nearest first
    pub contacts: Vec<Contact>,
}

/// What collision resolution did to the projectile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CollisionOutcome {
    /// Nothing eligible to bounce off
    NoAction,
    /// Reflected; `contact` is the last surface used and `reflections` counts
    /// the surfaces walked (more than one for a corner)
    Bounced { contact: Contact, reflections: u32 },
    /// The projectile must terminate
    Terminate(TerminationReason),
}

/// Mirror reflection of `direction` about the plane with unit `normal`.
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_bullet_time::systems::collision::reflect;
///
/// let out = reflect(Vec3::new(1.0, -1.0, 0.0).normalize(), Vec3::Y);
/// assert!((out - Vec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-6);
/// ```
pub fn reflect(direction: Vec3, normal: Vec3) -> Vec3 {
    let reflected = direction - 2.0 * direction.dot(normal) * normal;
    reflected.try_normalize().unwrap_or(direction)
}

/// Sweeps `displacement` from the projectile's position.
///
/// The ray is `radius` longer than the motion so the sphere's leading edge is
/// covered; an accepted hit clamps the motion so the sphere stops touching the
/// surface. Excluded colliders are skipped by restarting the ray past them.
///
/// # Arguments
/// * `projectile` - Projectile being moved
/// * `displacement` - Tentative motion for this tick
/// * `config` - Supplies the contact skin for the overlap query
/// * `spatial` - World queries
/// * `mask` - Layers to test against
pub fn detect_contacts(
    projectile: &Projectile,
    displacement: Vec3,
    config: &BounceConfig,
    spatial: &dyn SpatialQuery,
    mask: CollisionMask,
) -> Detection {
    let start = projectile.position;
    let length = displacement.length();
    let mut position = start + displacement;
    let mut event = None;

    if let Some(dir) = displacement.try_normalize() {
        let reach = length + projectile.radius;
        let mut travelled = 0.0;

        for _ in 0..=MAX_EXCLUDED_SKIPS {
            let origin = start + dir * travelled;
            let Some(hit) = spatial.raycast(origin, dir, reach - travelled, mask) else {
                break;
            };
            let along = travelled + hit.distance;

            if projectile.exclusion_set.contains(hit.collider) {
                travelled = along + SKIP_EPSILON;
                if travelled >= reach {
                    break;
                }
                continue;
            }

            position = start + dir * (along - projectile.radius).clamp(0.0, length);
            event = Some(Contact {
                distance: along,
                ..hit
            });
            break;
        }
    }

    let contacts = spatial.shapecast(
        &QueryShape::Sphere {
            radius: projectile.radius + config.contact_skin,
        },
        &Transform::from_translation(position),
        mask,
    );

    Detection {
        position,
        event,
        contacts,
    }
}

/// Releases exclusion entries the projectile has left behind.
///
/// # Returns
/// Number of entries released
pub fn prune_exclusions(projectile: &mut Projectile, contacts: &[Contact], config: &BounceConfig) -> usize {
    let position = projectile.position;
    projectile.exclusion_set.prune(
        position,
        |collider| contacts.iter().any(|contact| contact.collider == collider),
        config.min_safe_distance,
    )
}

/// Resolves a collision event against the surfaces touching the projectile.
///
/// # Arguments
/// * `projectile` - Projectile that collided
/// * `event` - Contact that triggered resolution
/// * `contacts` - Surface contacts at the projectile's position; empty when no
///   overlap data is available
/// * `config` - Bounce tuning
/// * `requery` - Re-samples surface contacts at a new position during corner
///   resolution
///
/// # Returns
/// The [`CollisionOutcome`]; termination is left to the caller
pub fn resolve_collision(
    projectile: &mut Projectile,
    event: &Contact,
    contacts: &[Contact],
    config: &BounceConfig,
    requery: Option<&dyn Fn(Vec3) -> Vec<Contact>>,
) -> CollisionOutcome {
    if contacts.is_empty() {
        return resolve_fallback(projectile, event, config);
    }

    let mut merged = contacts.to_vec();
    if !merged.iter().any(|contact| contact.collider == event.collider) {
        merged.push(*event);
        merged.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    }

    let valid: Vec<Contact> = projectile
        .exclusion_set
        .eligible(&merged)
        .filter_map(|contact| {
            contact.usable_normal().map(|normal| Contact {
                normal,
                ..*contact
            })
        })
        .collect();

    match valid.as_slice() {
        [] => CollisionOutcome::NoAction,
        [single] => {
            if projectile.direction.dot(single.normal) >= 0.0 {
                projectile.exclusion_set.insert(single.collider, projectile.position);
                return CollisionOutcome::NoAction;
            }
            if !bounce_allowed(projectile) {
                return CollisionOutcome::Terminate(TerminationReason::BounceBudgetExceeded);
            }
            bounce_single(projectile, single, config);
            CollisionOutcome::Bounced {
                contact: *single,
                reflections: 1,
            }
        }
        several => {
            let opposing = several
                .iter()
                .any(|contact| projectile.direction.dot(contact.normal) < 0.0);
            if !opposing {
                let position = projectile.position;
                for contact in several {
                    projectile.exclusion_set.insert(contact.collider, position);
                }
                return CollisionOutcome::NoAction;
            }
            if !bounce_allowed(projectile) {
                return CollisionOutcome::Terminate(TerminationReason::BounceBudgetExceeded);
            }
            match bounce_corner(projectile, several, config, requery) {
                Some((contact, reflections)) => CollisionOutcome::Bounced { contact, reflections },
                None => CollisionOutcome::NoAction,
            }
        }
    }
}

/// No overlap data: bounce off the event's own normal, if it has one.
fn resolve_fallback(projectile: &mut Projectile, event: &Contact, config: &BounceConfig) -> CollisionOutcome {
    if projectile.exclusion_set.contains(event.collider) {
        return CollisionOutcome::NoAction;
    }
    let Some(normal) = event.usable_normal() else {
        warn!(
            "Projectile {:?} hit collider {:?} without a usable normal, terminating",
            projectile.id, event.collider
        );
        return CollisionOutcome::Terminate(TerminationReason::Unresolvable);
    };

    let contact = Contact { normal, ..*event };
    if projectile.direction.dot(normal) >= 0.0 {
        projectile.exclusion_set.insert(contact.collider, projectile.position);
        return CollisionOutcome::NoAction;
    }
    if !bounce_allowed(projectile) {
        return CollisionOutcome::Terminate(TerminationReason::BounceBudgetExceeded);
    }

    debug!(
        "Projectile {:?} bouncing off {:?} without overlap data",
        projectile.id, contact.collider
    );
    bounce_single(projectile, &contact, config);
    CollisionOutcome::Bounced {
        contact,
        reflections: 1,
    }
}

fn bounce_allowed(projectile: &Projectile) -> bool {
    projectile.bounce_count < projectile.max_bounces
}

/// Reflects off a single surface.
///
/// The collider is excluded keyed at the pre-offset position, then the
/// projectile is pushed off the surface by `separation_offset`.
pub fn bounce_single(projectile: &mut Projectile, contact: &Contact, config: &BounceConfig) {
    projectile.exclusion_set.insert(contact.collider, projectile.position);
    projectile.direction = reflect(projectile.direction, contact.normal);
    projectile.position += contact.normal * config.separation_offset;
    finish_bounce(projectile);
}

/// Walks a corner: reflect off the nearest opposing surface, re-sample, and
/// repeat until nothing opposes the new direction or the iteration bound is hit.
///
/// Surfaces excluded during this walk stay candidates, so an acute wedge can
/// send the projectile back off a wall it already used. The whole walk counts
/// as one bounce.
///
/// # Returns
/// The last surface reflected off and the number of reflections, or `None`
/// if no surface opposed the direction
pub fn bounce_corner(
    projectile: &mut Projectile,
    contacts: &[Contact],
    config: &BounceConfig,
    requery: Option<&dyn Fn(Vec3) -> Vec<Contact>>,
) -> Option<(Contact, u32)> {
    let excluded_before = projectile.exclusion_set.clone();
    let mut candidates = contacts.to_vec();
    let mut last = None;
    let mut reflections = 0;

    for _ in 0..config.max_corner_iterations {
        let direction = projectile.direction;
        let next = excluded_before
            .eligible(&candidates)
            .filter_map(|contact| {
                contact.usable_normal().map(|normal| Contact {
                    normal,
                    ..*contact
                })
            })
            .filter(|contact| direction.dot(contact.normal) < 0.0)
            .min_by(|a, b| a.distance.total_cmp(&b.distance));
        let Some(contact) = next else {
            break;
        };

        projectile.exclusion_set.insert(contact.collider, projectile.position);
        projectile.direction = reflect(projectile.direction, contact.normal);
        projectile.position += contact.normal * config.separation_offset;
        reflections += 1;
        last = Some(contact);

        candidates = match requery {
            Some(query) => query(projectile.position),
            None => {
                candidates.retain(|candidate| candidate.collider != contact.collider);
                candidates
            }
        };
    }

    let contact = last?;
    if reflections == config.max_corner_iterations {
        debug!(
            "Projectile {:?} hit the corner iteration bound, committing last direction",
            projectile.id
        );
    }
    finish_bounce(projectile);
    Some((contact, reflections))
}

fn finish_bounce(projectile: &mut Projectile) {
    projectile.speed *= 1.0 - projectile.bounce_energy_loss;
    projectile.bounce_count += 1;
    projectile.state = LifecycleState::Bouncing;
    projectile.rotation = orient(projectile.direction, projectile.spin_angle);
}
