//! Per-projectile table of colliders that are temporarily immune to collision
//! handling after a bounce or a hit.

use bevy::prelude::*;

use crate::types::{ColliderId, Contact};

/// One excluded collider and where the projectile was when it got excluded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExclusionEntry {
    pub collider: ColliderId,
    pub position: Vec3,
}

/// Colliders ignored by bounce and damage resolution.
///
/// An entry is released only once the projectile is both out of overlap with
/// the collider and farther than the safe distance from the recorded position.
/// There is no timer: a projectile that reverses near the same surface stays
/// immune until it has actually left.
///
/// The table holds a handful of entries at most, so it is a flat vector.
///
/// # Example
/// ```
/// use bevy::prelude::*;
/// use bevy_bullet_time::exclusion::ExclusionSet;
/// use bevy_bullet_time::types::ColliderId;
///
/// let mut set = ExclusionSet::default();
/// set.insert(ColliderId(7), Vec3::ZERO);
/// assert!(set.contains(ColliderId(7)));
///
/// // Still close to the wall: kept.
/// set.prune(Vec3::new(0.1, 0.0, 0.0), |_| false, 0.5);
/// assert!(set.contains(ColliderId(7)));
///
/// // Away and no longer touching: released.
/// set.prune(Vec3::new(2.0, 0.0, 0.0), |_| false, 0.5);
/// assert!(set.is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExclusionSet {
    entries: Vec<ExclusionEntry>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Excludes `collider`, keyed at `position`.
    ///
    /// Re-excluding a collider moves its key to the new position.
    pub fn insert(&mut self, collider: ColliderId, position: Vec3) {
        match self.entries.iter_mut().find(|entry| entry.collider == collider) {
            Some(entry) => entry.position = position,
            None => self.entries.push(ExclusionEntry { collider, position }),
        }
    }

    pub fn contains(&self, collider: ColliderId) -> bool {
        self.entries.iter().any(|entry| entry.collider == collider)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExclusionEntry> {
        self.entries.iter()
    }

    /// Contacts whose collider is not excluded.
    pub fn eligible<'a>(&'a self, contacts: &'a [Contact]) -> impl Iterator<Item = &'a Contact> + 'a {
        contacts.iter().filter(move |contact| !self.contains(contact.collider))
    }

    /// Drops every entry that is both non-overlapping and beyond
    /// `min_safe_distance` of its recorded position.
    ///
    /// # Arguments
    /// * `position` - Current projectile position
    /// * `overlapping` - Whether the projectile still touches a collider
    /// * `min_safe_distance` - Distance the projectile must put between itself
    ///   and the exclusion point
    ///
    /// # Returns
    /// Number of entries released
    pub fn prune(
        &mut self,
        position: Vec3,
        overlapping: impl Fn(ColliderId) -> bool,
        min_safe_distance: f32,
    ) -> usize {
        let before = self.entries.len();
        let safe_sq = min_safe_distance * min_safe_distance;
        self.entries.retain(|entry| {
            overlapping(entry.collider) || position.distance_squared(entry.position) <= safe_sq
        });
        before - self.entries.len()
    }
}
