use crate::error::FlockError;
use serde::{Deserialize, Serialize};

/// How the pull toward the home point grows with distance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomeLaw {
    /// `direction * distance`.
    #[default]
    Linear,
    /// `direction * distance^2`.
    Quadratic,
}

/// Strategy used to find neighbor candidates for each agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeighborSearch {
    /// Spatial hash grid, scanning the 3x3x3 cells around the agent.
    #[default]
    Grid,
    /// Exhaustive O(n^2) scan of the whole snapshot.
    BruteForce,
}

/// Per-simulation settings, fixed for the duration of a tick.
///
/// Neighbor recall of the grid is only complete while
/// `cell_size >= neighbor_radius` holds for every agent. A smaller cell
/// trades missed neighbors for cheaper queries.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockConfig {
    pub cell_size: f32,
    pub turn_rate: f32,
    pub separation_epsilon: f32,
    pub home_law: HomeLaw,
    pub neighbor_search: NeighborSearch,
    /// Seed for all per-agent and per-tick randomness. `None` draws one
    /// from entropy when the stepper is created.
    pub seed: Option<u64>,
}

impl Default for FlockConfig {
    fn default() -> Self {
        Self {
            cell_size: 0.5,
            turn_rate: 5.0,
            separation_epsilon: 0.001,
            home_law: HomeLaw::Linear,
            neighbor_search: NeighborSearch::Grid,
            seed: None,
        }
    }
}

impl FlockConfig {
    pub fn validate(&self) -> Result<(), FlockError> {
        if !self.cell_size.is_finite() || self.cell_size <= 0.0 {
            return Err(FlockError::InvalidConfig("cell_size must be positive"));
        }
        if !self.turn_rate.is_finite() || self.turn_rate < 0.0 {
            return Err(FlockError::InvalidConfig("turn_rate must be non-negative"));
        }
        if !self.separation_epsilon.is_finite() || self.separation_epsilon <= 0.0 {
            return Err(FlockError::InvalidConfig(
                "separation_epsilon must be positive",
            ));
        }
        Ok(())
    }
}

/// Scalar weights applied to each steering term.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SteeringWeights {
    pub separation: f32,
    pub alignment: f32,
    pub cohesion: f32,
    pub home: f32,
    pub wander: f32,
}

impl SteeringWeights {
    /// All weights zero.
    pub const ZERO: Self = Self {
        separation: 0.0,
        alignment: 0.0,
        cohesion: 0.0,
        home: 0.0,
        wander: 0.0,
    };

    fn is_valid(&self) -> bool {
        [
            self.separation,
            self.alignment,
            self.cohesion,
            self.home,
            self.wander,
        ]
        .iter()
        .all(|w| w.is_finite() && *w >= 0.0)
    }
}

impl Default for SteeringWeights {
    fn default() -> Self {
        Self {
            separation: 1.5,
            alignment: 1.0,
            cohesion: 1.0,
            home: 1.0,
            wander: 1.0,
        }
    }
}

/// Parameters for newly spawned agents.
///
/// `max_speed` of each new agent is drawn uniformly from
/// `[max_speed_min, max_speed_max]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentTemplate {
    pub weights: SteeringWeights,
    pub neighbor_radius: f32,
    pub max_speed_min: f32,
    pub max_speed_max: f32,
    /// Radius of the sphere the initial velocity is drawn from.
    pub spawn_speed: f32,
    /// Per-axis half extent of the spawn position jitter around home.
    pub spawn_jitter: f32,
}

impl Default for AgentTemplate {
    fn default() -> Self {
        Self {
            weights: SteeringWeights::default(),
            neighbor_radius: 0.5,
            max_speed_min: 1.0,
            max_speed_max: 1.4,
            spawn_speed: 1.5,
            spawn_jitter: 1.0,
        }
    }
}

impl AgentTemplate {
    pub fn validate(&self) -> Result<(), FlockError> {
        if !self.neighbor_radius.is_finite() || self.neighbor_radius <= 0.0 {
            return Err(FlockError::InvalidTemplate(
                "neighbor_radius must be positive",
            ));
        }
        if !self.max_speed_min.is_finite() || self.max_speed_min <= 0.0 {
            return Err(FlockError::InvalidTemplate("max_speed must be positive"));
        }
        if !self.max_speed_max.is_finite() || self.max_speed_max < self.max_speed_min {
            return Err(FlockError::InvalidTemplate(
                "max_speed_max must not be below max_speed_min",
            ));
        }
        if !self.weights.is_valid() {
            return Err(FlockError::InvalidTemplate(
                "weights must be finite and non-negative",
            ));
        }
        if !self.spawn_speed.is_finite() || self.spawn_speed < 0.0 {
            return Err(FlockError::InvalidTemplate(
                "spawn_speed must be non-negative",
            ));
        }
        if !self.spawn_jitter.is_finite() || self.spawn_jitter < 0.0 {
            return Err(FlockError::InvalidTemplate(
                "spawn_jitter must be non-negative",
            ));
        }
        Ok(())
    }
}
