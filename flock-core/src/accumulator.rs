use crate::{snapshot::Snapshot, types::SlotIndex};
use glam::Vec3;

/// Raw neighbor sums gathered for one agent.
///
/// - `separation_sum` - Sum of `(self - other) / max(d, epsilon)`.
/// - `alignment_sum` - Sum of neighbor velocities.
/// - `cohesion_sum` - Sum of neighbor positions.
/// - `count` - Number of neighbors that passed the radius test.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NeighborStats {
    pub separation_sum: Vec3,
    pub alignment_sum: Vec3,
    pub cohesion_sum: Vec3,
    pub count: u32,
}

/// Averaged flocking terms derived from [`NeighborStats`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SteeringTerms {
    pub separation: Vec3,
    pub alignment: Vec3,
    /// Points from the agent toward the neighborhood centroid.
    pub cohesion: Vec3,
}

impl SteeringTerms {
    pub const ZERO: Self = Self {
        separation: Vec3::ZERO,
        alignment: Vec3::ZERO,
        cohesion: Vec3::ZERO,
    };
}

impl NeighborStats {
    /// Adds one accepted neighbor.
    ///
    /// ### Parameters
    /// - `offset` - `self_position - other_position`.
    /// - `distance` - Length of `offset`.
    /// - `other_position`, `other_velocity` - Snapshot state of the neighbor.
    /// - `epsilon` - Lower bound on the distance used for separation.
    #[inline]
    pub fn add(
        &mut self,
        offset: Vec3,
        distance: f32,
        other_position: Vec3,
        other_velocity: Vec3,
        epsilon: f32,
    ) {
        self.separation_sum += offset / distance.max(epsilon);
        self.alignment_sum += other_velocity;
        self.cohesion_sum += other_position;
        self.count += 1;
    }

    #[inline]
    pub fn is_isolated(&self) -> bool {
        self.count == 0
    }

    /// Averages the sums.
    ///
    /// An isolated agent gets [`SteeringTerms::ZERO`] rather than an average
    /// over nothing; in particular its cohesion term does not point at the
    /// origin.
    pub fn terms(&self, self_position: Vec3) -> SteeringTerms {
        if self.is_isolated() {
            return SteeringTerms::ZERO;
        }
        let n = self.count as f32;
        SteeringTerms {
            separation: self.separation_sum / n,
            alignment: self.alignment_sum / n,
            cohesion: self.cohesion_sum / n - self_position,
        }
    }
}

/// Scans neighbor candidates for the agent in `slot`.
///
/// A candidate counts when its exact distance is strictly below the
/// agent's `neighbor_radius`. The agent itself is skipped by slot, not by
/// distance, so other agents sharing its exact position are still counted.
///
/// ### Parameters
/// - `snapshot` - Tick-start state of the flock.
/// - `slot` - The agent being updated.
/// - `candidates` - Coarse candidate slots, e.g. from
///   [`crate::grid::SpatialHashGrid::neighbors_of`] or `0..snapshot.len()`.
///   Each slot must appear at most once.
/// - `epsilon` - Separation distance floor.
pub fn accumulate<I>(
    snapshot: &Snapshot,
    slot: SlotIndex,
    candidates: I,
    epsilon: f32,
) -> NeighborStats
where
    I: IntoIterator<Item = SlotIndex>,
{
    let position = snapshot.position(slot);
    let radius = snapshot.params(slot).neighbor_radius;
    let radius_sq = radius * radius;

    let mut stats = NeighborStats::default();
    for other in candidates {
        if other == slot {
            continue;
        }
        let other_position = snapshot.position(other);
        let offset = position - other_position;
        let d2 = offset.length_squared();
        if d2 < radius_sq {
            stats.add(
                offset,
                d2.sqrt(),
                other_position,
                snapshot.velocity(other),
                epsilon,
            );
        }
    }
    stats
}
