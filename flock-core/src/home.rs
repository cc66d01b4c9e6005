use crate::config::AgentTemplate;
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// The point the flock is drawn toward, and the population it should have.
///
/// Owned by the host and passed into every tick; it is read-only while a
/// tick runs. `desired_count` is signed so that hosts can hand over raw
/// values; negative counts are treated as zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HomePoint {
    pub position: Vec3,
    pub desired_count: i64,
    pub template: AgentTemplate,
}

impl HomePoint {
    pub fn new(position: Vec3, desired_count: i64) -> Self {
        Self {
            position,
            desired_count,
            template: AgentTemplate::default(),
        }
    }

    pub fn with_template(mut self, template: AgentTemplate) -> Self {
        self.template = template;
        self
    }

    /// `desired_count` clamped to be non-negative.
    pub fn target_count(&self) -> usize {
        self.desired_count.max(0) as usize
    }
}

impl Default for HomePoint {
    fn default() -> Self {
        Self::new(Vec3::ZERO, 0)
    }
}
