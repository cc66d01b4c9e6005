//! Immutable tick-start copy of the flock.
//!
//! Positions and velocities are stored as parallel arrays indexed by
//! [`SlotIndex`]. The steering phase reads exclusively from here, so no
//! agent ever observes another agent's state from the same tick.

use crate::{
    agent::{AgentParams, AgentRecord},
    types::{AgentId, SlotIndex},
};
use glam::{Quat, Vec3};

#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    ids: Vec<AgentId>,
    positions: Vec<Vec3>,
    velocities: Vec<Vec3>,
    orientations: Vec<Quat>,
    params: Vec<AgentParams>,
}

impl Snapshot {
    /// Builds a snapshot from store records and a lookup for the current
    /// orientation of each agent.
    pub fn capture(
        records: Vec<AgentRecord>,
        mut orientation_of: impl FnMut(AgentId) -> Quat,
    ) -> Self {
        let len = records.len();
        let mut snapshot = Self {
            ids: Vec::with_capacity(len),
            positions: Vec::with_capacity(len),
            velocities: Vec::with_capacity(len),
            orientations: Vec::with_capacity(len),
            params: Vec::with_capacity(len),
        };

        for record in records {
            snapshot.ids.push(record.id);
            snapshot.positions.push(record.position);
            snapshot.velocities.push(record.velocity);
            snapshot.orientations.push(orientation_of(record.id));
            snapshot.params.push(record.params);
        }
        snapshot
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[AgentId] {
        &self.ids
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    #[inline]
    pub fn id(&self, slot: SlotIndex) -> AgentId {
        self.ids[slot]
    }

    #[inline]
    pub fn position(&self, slot: SlotIndex) -> Vec3 {
        self.positions[slot]
    }

    #[inline]
    pub fn velocity(&self, slot: SlotIndex) -> Vec3 {
        self.velocities[slot]
    }

    #[inline]
    pub fn orientation(&self, slot: SlotIndex) -> Quat {
        self.orientations[slot]
    }

    #[inline]
    pub fn params(&self, slot: SlotIndex) -> &AgentParams {
        &self.params[slot]
    }

    /// Largest neighbor radius of any agent, or `0.0` for an empty flock.
    pub fn max_neighbor_radius(&self) -> f32 {
        self.params
            .iter()
            .map(|p| p.neighbor_radius)
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SteeringWeights;

    fn record(id: AgentId, x: f32, radius: f32) -> AgentRecord {
        AgentRecord {
            id,
            position: Vec3::new(x, 0.0, 0.0),
            velocity: Vec3::Y,
            params: AgentParams {
                weights: SteeringWeights::default(),
                neighbor_radius: radius,
                max_speed: 1.0,
            },
        }
    }

    #[test]
    fn capture_preserves_record_order() {
        let snapshot = Snapshot::capture(vec![record(7, 1.0, 0.5), record(3, 2.0, 0.8)], |id| {
            if id == 3 {
                Quat::from_rotation_y(1.0)
            } else {
                Quat::IDENTITY
            }
        });

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.ids(), &[7, 3]);
        assert_eq!(snapshot.position(1), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(snapshot.orientation(0), Quat::IDENTITY);
        assert_eq!(snapshot.orientation(1), Quat::from_rotation_y(1.0));
        assert_eq!(snapshot.max_neighbor_radius(), 0.8);
    }

    #[test]
    fn empty_snapshot_has_zero_radius() {
        let snapshot = Snapshot::capture(Vec::new(), |_| Quat::IDENTITY);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.max_neighbor_radius(), 0.0);
    }
}
