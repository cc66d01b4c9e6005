//! Simulation phases for one flock tick.
//!
//! The update loop looks like:
//! 1. [`snapshot_phase`] - copy positions, velocities and orientations of
//!    every live agent into an immutable [`Snapshot`].
//! 2. [`grid_phase`] - bucket the snapshot positions into a
//!    [`SpatialHashGrid`] (skipped for brute-force search).
//! 3. [`steering_phase`] - for every agent in parallel: gather neighbors,
//!    combine forces, integrate. Each agent only produces its own
//!    [`AgentUpdate`].
//! 4. [`population_phase`] - single-threaded reconcile of the live count
//!    against the home point, producing one [`StructuralBatch`]. A bad
//!    agent template only cancels this tick's spawns.
//!
//! [`FlockStepper::step`] runs all four and then writes back updates
//! followed by the structural batch.

use crate::{
    accumulator::accumulate,
    agent::AgentUpdate,
    config::{FlockConfig, NeighborSearch},
    error::FlockError,
    force::{acceleration, home_force, random_unit_vector},
    grid::SpatialHashGrid,
    home::HomePoint,
    integrator::{self, Kinematics},
    population::{StructuralBatch, reconcile},
    snapshot::Snapshot,
    store::{AgentStore, Clock},
    types::{AgentId, SlotIndex},
};
use glam::Vec3;
use rand::{SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use tracing::{debug, instrument, trace, warn};

const TICK_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;
const AGENT_STREAM: u64 = 0xD1B5_4A32_D192_ED03;

/// Random source for one agent in one tick.
///
/// Depends only on `(seed, tick, id)`, never on which thread runs the
/// agent or in which order.
pub fn agent_rng(seed: u64, tick: u64, id: AgentId) -> SmallRng {
    let stream = id.wrapping_add(1).wrapping_mul(AGENT_STREAM);
    SmallRng::seed_from_u64(seed ^ tick.wrapping_mul(TICK_STREAM) ^ stream)
}

/// Random source for the population controller in one tick.
pub fn tick_rng(seed: u64, tick: u64) -> SmallRng {
    let stream = AGENT_STREAM.rotate_left(17);
    SmallRng::seed_from_u64(seed ^ tick.wrapping_mul(TICK_STREAM) ^ stream)
}

/// Reads a consistent copy of the flock from the store.
pub fn snapshot_phase(store: &impl AgentStore) -> Snapshot {
    Snapshot::capture(store.snapshot(), |id| store.current_orientation(id))
}

/// True when the grid search can miss neighbors this tick.
///
/// The 3x3x3 query only covers every agent within `cell_size`, so recall
/// is partial once some agent's `neighbor_radius` is larger. Brute-force
/// search always sees everyone.
pub fn recall_is_partial(snapshot: &Snapshot, cfg: &FlockConfig) -> bool {
    cfg.neighbor_search == NeighborSearch::Grid
        && cfg.cell_size < snapshot.max_neighbor_radius()
}

/// Builds the spatial hash for this tick.
///
/// Returns `None` when the configuration asks for brute-force search.
/// Logs a warning when [`recall_is_partial`] holds.
pub fn grid_phase(
    snapshot: &Snapshot,
    cfg: &FlockConfig,
) -> Result<Option<SpatialHashGrid>, FlockError> {
    if cfg.neighbor_search == NeighborSearch::BruteForce {
        return Ok(None);
    }

    if recall_is_partial(snapshot, cfg) {
        warn!(
            cell_size = cfg.cell_size,
            max_radius = snapshot.max_neighbor_radius(),
            "cell size below neighbor radius; grid recall is partial"
        );
    }

    let grid = SpatialHashGrid::build(snapshot.positions(), cfg.cell_size)?;
    debug!(
        entries = grid.len(),
        buckets = grid.bucket_count(),
        occupied = grid.occupied_buckets(),
        "grid built"
    );
    Ok(Some(grid))
}

/// Output of [`steering_phase`].
#[derive(Debug, Default)]
pub struct SteeringOutcome {
    /// One update per snapshot slot, in slot order.
    pub updates: Vec<AgentUpdate>,
    /// Total number of accepted (agent, neighbor) pairs.
    pub neighbor_pairs: u64,
}

/// Computes new kinematics for every agent in parallel.
///
/// Reads only `snapshot` and `grid`; each slot writes only its own
/// result, so no synchronization is needed until the final collect.
///
/// ### Parameters
/// - `snapshot` - Tick-start state.
/// - `grid` - Built grid, or `None` to scan the whole snapshot.
/// - `home` - Home point position for this tick.
/// - `cfg` - Simulation configuration.
/// - `dt` - Tick duration.
/// - `seed`, `tick` - Select the wander draws.
pub fn steering_phase(
    snapshot: &Snapshot,
    grid: Option<&SpatialHashGrid>,
    home: Vec3,
    cfg: &FlockConfig,
    dt: f32,
    seed: u64,
    tick: u64,
) -> SteeringOutcome {
    let (updates, counts): (Vec<AgentUpdate>, Vec<u32>) = (0..snapshot.len())
        .into_par_iter()
        .map(|slot| steer_one(snapshot, grid, slot, home, cfg, dt, seed, tick))
        .unzip();

    SteeringOutcome {
        updates,
        neighbor_pairs: counts.iter().map(|&n| u64::from(n)).sum(),
    }
}

#[allow(clippy::too_many_arguments)]
fn steer_one(
    snapshot: &Snapshot,
    grid: Option<&SpatialHashGrid>,
    slot: SlotIndex,
    home: Vec3,
    cfg: &FlockConfig,
    dt: f32,
    seed: u64,
    tick: u64,
) -> (AgentUpdate, u32) {
    let id = snapshot.id(slot);
    let position = snapshot.position(slot);
    let params = snapshot.params(slot);

    let stats = match grid {
        Some(grid) => accumulate(
            snapshot,
            slot,
            grid.neighbors_of(position),
            cfg.separation_epsilon,
        ),
        None => accumulate(snapshot, slot, 0..snapshot.len(), cfg.separation_epsilon),
    };

    let mut rng = agent_rng(seed, tick, id);
    let wander = random_unit_vector(&mut rng);
    let acc = acceleration(
        &stats.terms(position),
        home_force(position, home, cfg.home_law),
        wander,
        &params.weights,
    );

    let next = integrator::step(
        Kinematics {
            position,
            velocity: snapshot.velocity(slot),
            orientation: snapshot.orientation(slot),
        },
        acc,
        params.max_speed,
        dt,
        cfg.turn_rate,
    );

    let update = AgentUpdate {
        id,
        position: next.position,
        velocity: next.velocity,
        orientation: next.orientation,
    };
    (update, stats.count)
}

/// Output of [`population_phase`].
#[derive(Debug, Default)]
pub struct PopulationOutcome {
    pub batch: StructuralBatch,
    /// Why this tick's spawns were dropped, if they were.
    pub spawn_error: Option<FlockError>,
}

/// Reconciles the tick-start population with the home point.
///
/// An invalid agent template is not fatal: the missing agents are simply
/// not spawned this tick and the error is handed back for reporting.
pub fn population_phase(
    snapshot: &Snapshot,
    home: &HomePoint,
    seed: u64,
    tick: u64,
) -> PopulationOutcome {
    let mut rng = tick_rng(seed, tick);
    match reconcile(snapshot.ids(), home, &mut rng) {
        Ok(batch) => {
            if !batch.is_empty() {
                debug!(
                    spawned = batch.spawn_count(),
                    despawned = batch.despawn_count(),
                    desired = home.desired_count,
                    "population batch"
                );
            }
            PopulationOutcome {
                batch,
                spawn_error: None,
            }
        }
        Err(err) => {
            warn!(
                %err,
                desired = home.desired_count,
                live = snapshot.len(),
                "spawns skipped"
            );
            PopulationOutcome {
                batch: StructuralBatch::default(),
                spawn_error: Some(err),
            }
        }
    }
}

/// Summary of one completed tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub agents_updated: usize,
    pub spawned: usize,
    pub despawned: usize,
    pub neighbor_pairs: u64,
    /// Set when the grid could miss neighbors (see [`recall_is_partial`]).
    pub partial_recall: bool,
    /// Set when the agent template was rejected and no agents were spawned.
    pub spawn_error: Option<FlockError>,
}

/// Drives ticks against an [`AgentStore`].
#[derive(Debug, Clone)]
pub struct FlockStepper {
    cfg: FlockConfig,
    seed: u64,
    tick: u64,
}

impl FlockStepper {
    /// Validates `cfg` and fixes the random seed.
    pub fn new(cfg: FlockConfig) -> Result<Self, FlockError> {
        cfg.validate()?;
        let seed = cfg.seed.unwrap_or_else(rand::random::<u64>);
        Ok(Self { cfg, seed, tick: 0 })
    }

    pub fn config(&self) -> &FlockConfig {
        &self.cfg
    }

    /// Replaces the configuration; the seed and tick counter are kept.
    pub fn set_config(&mut self, cfg: FlockConfig) -> Result<(), FlockError> {
        cfg.validate()?;
        self.cfg = cfg;
        Ok(())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Runs one full tick.
    ///
    /// Only a bad clock value or grid build can fail a tick, and both are
    /// checked before the store is written, so on error the store is
    /// untouched and the tick counter does not advance. A rejected agent
    /// template is reported through [`TickReport::spawn_error`] instead.
    /// On success the store receives [`AgentStore::apply_updates`] and then
    /// [`AgentStore::apply_structural_batch`].
    #[instrument(skip_all, fields(tick = self.tick))]
    pub fn step<S: AgentStore>(
        &mut self,
        store: &mut S,
        clock: &impl Clock,
    ) -> Result<TickReport, FlockError> {
        let dt = clock.delta_time();
        if !dt.is_finite() || dt < 0.0 {
            return Err(FlockError::InvalidConfig(
                "delta_time must be finite and non-negative",
            ));
        }

        let home = store.home_state();
        let snapshot = snapshot_phase(store);
        trace!(agents = snapshot.len(), dt, "tick start");

        let grid = grid_phase(&snapshot, &self.cfg)?;
        let steering = steering_phase(
            &snapshot,
            grid.as_ref(),
            home.position,
            &self.cfg,
            dt,
            self.seed,
            self.tick,
        );
        let population = population_phase(&snapshot, &home, self.seed, self.tick);

        let report = TickReport {
            tick: self.tick,
            agents_updated: steering.updates.len(),
            spawned: population.batch.spawn_count(),
            despawned: population.batch.despawn_count(),
            neighbor_pairs: steering.neighbor_pairs,
            partial_recall: recall_is_partial(&snapshot, &self.cfg),
            spawn_error: population.spawn_error,
        };

        store.apply_updates(&steering.updates);
        store.apply_structural_batch(population.batch);
        self.tick += 1;

        trace!(
            updated = report.agents_updated,
            spawned = report.spawned,
            despawned = report.despawned,
            "tick complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        agent::{Agent, AgentParams},
        config::{AgentTemplate, SteeringWeights},
        store::{FixedClock, MemoryStore},
    };

    fn params(weights: SteeringWeights, max_speed: f32) -> AgentParams {
        AgentParams {
            weights,
            neighbor_radius: 0.5,
            max_speed,
        }
    }

    fn seeded() -> FlockConfig {
        FlockConfig {
            seed: Some(1234),
            ..FlockConfig::default()
        }
    }

    #[test]
    fn agent_rng_depends_on_tick_and_id_only() {
        use rand::Rng;

        let a: u64 = agent_rng(1, 2, 3).random();
        let b: u64 = agent_rng(1, 2, 3).random();
        let c: u64 = agent_rng(1, 2, 4).random();
        let d: u64 = agent_rng(1, 3, 3).random();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn steering_produces_one_update_per_slot_in_order() {
        let mut store = MemoryStore::default();
        for i in 0..10 {
            store
                .insert(Agent::new(
                    Vec3::new(i as f32 * 0.1, 0.0, 0.0),
                    Vec3::ZERO,
                    params(SteeringWeights::default(), 1.0),
                ))
                .unwrap();
        }
        let snapshot = snapshot_phase(&store);
        let cfg = seeded();
        let grid = grid_phase(&snapshot, &cfg).unwrap();

        let outcome = steering_phase(&snapshot, grid.as_ref(), Vec3::ZERO, &cfg, 0.1, 1, 0);

        assert_eq!(outcome.updates.len(), 10);
        for (slot, update) in outcome.updates.iter().enumerate() {
            assert_eq!(update.id, snapshot.id(slot));
            assert!(update.velocity.length() <= 1.0 + 1e-5);
        }
        assert!(outcome.neighbor_pairs > 0);
    }

    #[test]
    fn brute_force_skips_grid() {
        let cfg = FlockConfig {
            neighbor_search: NeighborSearch::BruteForce,
            ..seeded()
        };
        let snapshot = snapshot_phase(&MemoryStore::default());
        assert!(grid_phase(&snapshot, &cfg).unwrap().is_none());
    }

    #[test]
    fn stepper_rejects_invalid_config() {
        let cfg = FlockConfig {
            cell_size: -1.0,
            ..FlockConfig::default()
        };
        assert!(FlockStepper::new(cfg).is_err());
    }

    #[test]
    fn bad_template_skips_spawns_but_flock_keeps_moving() {
        let mut template = AgentTemplate::default();
        template.max_speed_min = 0.0;
        let home = HomePoint::new(Vec3::ZERO, 6).with_template(template);
        let mut store = MemoryStore::new(home);
        let weights = SteeringWeights {
            home: 1.0,
            ..SteeringWeights::ZERO
        };
        let id = store
            .insert(Agent::new(
                Vec3::new(5.0, 0.0, 0.0),
                Vec3::ZERO,
                params(weights, 1.0),
            ))
            .unwrap();
        let mut stepper = FlockStepper::new(seeded()).unwrap();

        let mut last_x = 5.0;
        for tick in 0..3 {
            let report = stepper.step(&mut store, &FixedClock(0.1)).unwrap();

            assert_eq!(report.tick, tick);
            assert_eq!(report.spawned, 0);
            assert_eq!(report.agents_updated, 1);
            assert!(matches!(
                report.spawn_error,
                Some(FlockError::InvalidTemplate(_))
            ));
            let x = store.get(id).unwrap().position.x;
            assert!(x < last_x, "agent should keep heading home");
            last_x = x;
        }
        assert_eq!(store.len(), 1);
        assert_eq!(stepper.tick(), 3);
    }

    #[test]
    fn bad_template_does_not_block_despawns() {
        let mut template = AgentTemplate::default();
        template.neighbor_radius = -1.0;
        let home = HomePoint::new(Vec3::ZERO, 1).with_template(template);
        let mut store = MemoryStore::new(home);
        for i in 0..3 {
            store
                .insert(Agent::new(
                    Vec3::splat(i as f32),
                    Vec3::ZERO,
                    params(SteeringWeights::default(), 1.0),
                ))
                .unwrap();
        }
        let mut stepper = FlockStepper::new(seeded()).unwrap();

        let report = stepper.step(&mut store, &FixedClock(0.1)).unwrap();

        assert_eq!(report.despawned, 2);
        assert!(report.spawn_error.is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn failed_tick_leaves_store_untouched() {
        let mut store = MemoryStore::new(HomePoint::new(Vec3::ZERO, 3));
        let id = store
            .insert(Agent::new(
                Vec3::X,
                Vec3::ONE,
                params(SteeringWeights::default(), 1.0),
            ))
            .unwrap();
        let mut stepper = FlockStepper::new(seeded()).unwrap();

        let result = stepper.step(&mut store, &FixedClock(f32::INFINITY));

        assert!(matches!(result, Err(FlockError::InvalidConfig(_))));
        assert_eq!(stepper.tick(), 0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(id).unwrap().position, Vec3::X);
    }

    #[test]
    fn recall_is_partial_only_for_small_grid_cells() {
        let mut store = MemoryStore::default();
        store
            .insert(Agent::new(
                Vec3::ZERO,
                Vec3::ZERO,
                params(SteeringWeights::default(), 1.0),
            ))
            .unwrap();
        let snapshot = snapshot_phase(&store);

        let covering = seeded();
        let small = FlockConfig {
            cell_size: 0.1,
            ..seeded()
        };
        let small_brute = FlockConfig {
            neighbor_search: NeighborSearch::BruteForce,
            ..small
        };

        assert!(!recall_is_partial(&snapshot, &covering));
        assert!(recall_is_partial(&snapshot, &small));
        assert!(!recall_is_partial(&snapshot, &small_brute));
        assert!(!recall_is_partial(&Snapshot::default(), &small));
    }

    #[test]
    fn rejects_bad_delta_time() {
        let mut store = MemoryStore::default();
        let mut stepper = FlockStepper::new(seeded()).unwrap();
        assert!(stepper.step(&mut store, &FixedClock(f32::NAN)).is_err());
        assert!(stepper.step(&mut store, &FixedClock(-0.1)).is_err());
    }

    #[test]
    fn tick_counter_advances() {
        let mut store = MemoryStore::new(HomePoint::new(Vec3::ZERO, 4));
        let mut stepper = FlockStepper::new(seeded()).unwrap();

        let first = stepper.step(&mut store, &FixedClock(0.02)).unwrap();
        let second = stepper.step(&mut store, &FixedClock(0.02)).unwrap();

        assert_eq!(first.tick, 0);
        assert_eq!(first.spawned, 4);
        assert_eq!(first.agents_updated, 0);
        assert_eq!(second.tick, 1);
        assert_eq!(second.agents_updated, 4);
        assert_eq!(second.spawned, 0);
        assert_eq!(stepper.tick(), 2);
    }
}
