//! Seams between the flock core and the host that owns the agents.
//!
//! The core reads the flock through [`AgentStore::snapshot`] at tick
//! start and writes it back in two ordered steps: first
//! [`AgentStore::apply_updates`], then
//! [`AgentStore::apply_structural_batch`]. Hosts must not modify agents
//! while a tick is running; that is a precondition, not something the
//! core detects.

use crate::{
    agent::{Agent, AgentRecord, AgentUpdate},
    error::FlockError,
    home::HomePoint,
    population::{StructuralBatch, StructuralOp},
    types::AgentId,
};
use glam::Quat;
use std::collections::BTreeMap;

pub trait AgentStore {
    /// Consistent read of all live agents.
    fn snapshot(&self) -> Vec<AgentRecord>;

    fn current_orientation(&self, id: AgentId) -> Quat;

    fn home_state(&self) -> HomePoint;

    fn apply_updates(&mut self, updates: &[AgentUpdate]);

    fn apply_structural_batch(&mut self, batch: StructuralBatch);
}

/// Supplies the duration of each tick.
pub trait Clock {
    fn delta_time(&self) -> f32;
}

/// A clock with a constant step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedClock(pub f32);

impl Clock for FixedClock {
    fn delta_time(&self) -> f32 {
        self.0
    }
}

/// Simple in-memory agent store.
///
/// Agents are kept ordered by id; ids grow monotonically and are never
/// reused.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    agents: BTreeMap<AgentId, Agent>,
    next_id: AgentId,
    home: HomePoint,
}

impl MemoryStore {
    pub fn new(home: HomePoint) -> Self {
        Self {
            agents: BTreeMap::new(),
            next_id: 0,
            home,
        }
    }

    /// Adds a host-created agent and returns its new id.
    ///
    /// Rejects parameters the integrator cannot honor, e.g. a negative
    /// `max_speed`.
    pub fn insert(&mut self, agent: Agent) -> Result<AgentId, FlockError> {
        agent.params.validate()?;
        Ok(self.push(agent))
    }

    fn push(&mut self, agent: Agent) -> AgentId {
        let id = self.next_id;
        self.next_id += 1;
        self.agents.insert(id, agent);
        id
    }

    pub fn remove(&mut self, id: AgentId) -> Option<Agent> {
        self.agents.remove(&id)
    }

    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(&id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn clear(&mut self) {
        self.agents.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &Agent)> {
        self.agents.iter().map(|(&id, agent)| (id, agent))
    }

    pub fn home(&self) -> &HomePoint {
        &self.home
    }

    pub fn home_mut(&mut self) -> &mut HomePoint {
        &mut self.home
    }
}

impl AgentStore for MemoryStore {
    fn snapshot(&self) -> Vec<AgentRecord> {
        self.agents
            .iter()
            .map(|(&id, agent)| AgentRecord {
                id,
                position: agent.position,
                velocity: agent.velocity,
                params: agent.params,
            })
            .collect()
    }

    fn current_orientation(&self, id: AgentId) -> Quat {
        self.agents
            .get(&id)
            .map_or(Quat::IDENTITY, |agent| agent.orientation)
    }

    fn home_state(&self) -> HomePoint {
        self.home
    }

    fn apply_updates(&mut self, updates: &[AgentUpdate]) {
        for update in updates {
            if let Some(agent) = self.agents.get_mut(&update.id) {
                agent.position = update.position;
                agent.velocity = update.velocity;
                agent.orientation = update.orientation;
            }
        }
    }

    fn apply_structural_batch(&mut self, batch: StructuralBatch) {
        for op in batch.ops {
            match op {
                StructuralOp::Spawn(spawn) => {
                    // Spawn params come from a validated template.
                    self.push(Agent::new(spawn.position, spawn.velocity, spawn.params));
                }
                StructuralOp::Despawn(id) => {
                    self.remove(id);
                }
            }
        }
    }
}
