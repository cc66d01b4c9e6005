use crate::{config::SteeringWeights, error::FlockError, types::AgentId};
use glam::{Quat, Vec3};

/// Per-agent tunables, fixed when the agent is spawned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentParams {
    pub weights: SteeringWeights,
    pub neighbor_radius: f32,
    pub max_speed: f32,
}

impl AgentParams {
    /// Checks the bounds the integrator relies on.
    ///
    /// A non-positive `max_speed` would flip the clamped velocity, and a
    /// non-positive `neighbor_radius` would never see a neighbor.
    pub fn validate(&self) -> Result<(), FlockError> {
        if !self.max_speed.is_finite() || self.max_speed <= 0.0 {
            return Err(FlockError::InvalidAgent("max_speed must be positive"));
        }
        if !self.neighbor_radius.is_finite() || self.neighbor_radius <= 0.0 {
            return Err(FlockError::InvalidAgent("neighbor_radius must be positive"));
        }
        Ok(())
    }
}

/// Full state of one boid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agent {
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Quat,
    pub params: AgentParams,
}

impl Agent {
    pub fn new(position: Vec3, velocity: Vec3, params: AgentParams) -> Self {
        Self {
            position,
            velocity,
            orientation: Quat::IDENTITY,
            params,
        }
    }
}

/// One row of the consistent read handed out by an agent store at tick start.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentRecord {
    pub id: AgentId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub params: AgentParams,
}

/// New kinematic state for one agent, written back after the parallel phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentUpdate {
    pub id: AgentId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Quat,
}
