//! Suppression of markers that crowd each other in the image.
//!
//! When two markers are detected with their centroids closer than a
//! threshold, overlays drawn on both would overlap and flicker between each
//! other. The resolver keeps the lower id and excludes the other one for the
//! current frame.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::marker::{Marker, MarkerKey};

/// Centroid distance, in image pixels, below which two markers conflict.
pub const DEFAULT_CONFLICT_THRESHOLD: f32 = 130.0;

/// What happens to the exclusion set between frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionPolicy {
    /// Start every frame from an empty set.
    #[default]
    ResetPerFrame,
    /// Never clear the set: once excluded, a marker (same id, same corners)
    /// stays excluded for the rest of the session. This is the historical
    /// behavior of the overlay and the set grows without bound.
    Accumulate,
}

/// Markers excluded from 3D overlay rendering.
///
/// Membership is structural (id + corners, see [`Marker`]'s `PartialEq`).
/// Insertion order is preserved for reporting.
#[derive(Clone, Debug, Default)]
pub struct ExclusionSet {
    markers: Vec<Marker>,
    keys: HashSet<MarkerKey>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `marker`; returns `false` if an equal marker is already present.
    pub fn insert(&mut self, marker: &Marker) -> bool {
        if !self.keys.insert(marker.key()) {
            return false;
        }
        self.markers.push(marker.clone());
        true
    }

    pub fn contains(&self, marker: &Marker) -> bool {
        self.keys.contains(&marker.key())
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
        self.keys.clear();
    }

    /// Excluded markers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.iter()
    }

    /// Ids of the excluded markers in insertion order.
    pub fn ids(&self) -> Vec<i32> {
        self.markers.iter().map(|m| m.id).collect()
    }
}

/// Add to `excluded` every marker that loses a pairwise conflict.
///
/// All pairs `(i, j)` with `i < j` in list order are compared. A pair is in
/// conflict when its centroid distance is strictly below `threshold`. The
/// lower id wins; on equal ids the earlier marker of the pair is the one
/// excluded. Markers already excluded still take part in later comparisons.
///
/// Returns the number of markers newly inserted.
pub fn find_conflicts(markers: &[Marker], threshold: f32, excluded: &mut ExclusionSet) -> usize {
    let mut added = 0;
    for (i, a) in markers.iter().enumerate() {
        for b in &markers[i + 1..] {
            let distance = a.centroid_distance(b);
            log::trace!(
                "centroid distance between marker {} and marker {}: {:.2}",
                a.id,
                b.id,
                distance
            );
            // NaN distances (degenerate corners) never conflict.
            if !(distance < threshold) {
                continue;
            }
            let (kept, loser) = if a.id < b.id { (a, b) } else { (b, a) };
            if excluded.insert(loser) {
                log::debug!(
                    "marker {} excluded (conflicts with marker {} at {:.1}px)",
                    loser.id,
                    kept.id,
                    distance
                );
                added += 1;
            }
        }
    }
    added
}

/// Per-session conflict resolver.
#[derive(Clone, Debug)]
pub struct ConflictResolver {
    threshold: f32,
    policy: ExclusionPolicy,
    excluded: ExclusionSet,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CONFLICT_THRESHOLD, ExclusionPolicy::default())
    }
}

impl ConflictResolver {
    pub fn new(threshold: f32, policy: ExclusionPolicy) -> Self {
        Self {
            threshold,
            policy,
            excluded: ExclusionSet::new(),
        }
    }

    #[inline]
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    #[inline]
    pub fn policy(&self) -> ExclusionPolicy {
        self.policy
    }

    /// Exclusion set produced by the last [`ConflictResolver::resolve`] call.
    #[inline]
    pub fn excluded(&self) -> &ExclusionSet {
        &self.excluded
    }

    /// Forget every exclusion, regardless of policy.
    pub fn reset(&mut self) {
        self.excluded.clear();
    }

    /// Compute the exclusion set for the current frame.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(self, markers), fields(markers = markers.len()))
    )]
    pub fn resolve(&mut self, markers: &[Marker]) -> &ExclusionSet {
        if self.policy == ExclusionPolicy::ResetPerFrame {
            self.excluded.clear();
        }
        find_conflicts(markers, self.threshold, &mut self.excluded);
        &self.excluded
    }
}
