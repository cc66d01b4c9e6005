//! Reconciles the live agent count with the home point's desired count.
//!
//! The controller never touches the store. It returns a
//! [`StructuralBatch`] that the host applies after the per-agent pass of
//! the tick has completed.

use crate::{
    agent::AgentParams,
    config::AgentTemplate,
    error::FlockError,
    home::HomePoint,
    types::AgentId,
};
use glam::Vec3;
use rand::Rng;

/// Everything needed to create one agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnOp {
    pub position: Vec3,
    pub velocity: Vec3,
    pub params: AgentParams,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StructuralOp {
    Spawn(SpawnOp),
    Despawn(AgentId),
}

/// All structural changes produced by one [`reconcile`] call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructuralBatch {
    pub ops: Vec<StructuralOp>,
}

impl StructuralBatch {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn spawn_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, StructuralOp::Spawn(_)))
            .count()
    }

    pub fn despawn_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, StructuralOp::Despawn(_)))
            .count()
    }

    pub fn spawns(&self) -> impl Iterator<Item = &SpawnOp> {
        self.ops.iter().filter_map(|op| match op {
            StructuralOp::Spawn(spawn) => Some(spawn),
            StructuralOp::Despawn(_) => None,
        })
    }

    pub fn despawns(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.ops.iter().filter_map(|op| match op {
            StructuralOp::Despawn(id) => Some(*id),
            StructuralOp::Spawn(_) => None,
        })
    }
}

/// Uniform point inside a ball of the given radius.
pub fn random_in_sphere(radius: f32, rng: &mut impl Rng) -> Vec3 {
    if radius <= 0.0 {
        return Vec3::ZERO;
    }
    loop {
        let p = Vec3::new(
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
        );
        if p.length_squared() <= 1.0 {
            return p * radius;
        }
    }
}

/// Draws one new agent around `home` from `template`.
///
/// The initial velocity is drawn inside a ball of radius
/// `template.spawn_speed` and then limited to the agent's own `max_speed`,
/// so a freshly spawned agent already satisfies the speed bound.
pub fn spawn_op(home: Vec3, template: &AgentTemplate, rng: &mut impl Rng) -> SpawnOp {
    let jitter = template.spawn_jitter;
    let offset = if jitter > 0.0 {
        Vec3::new(
            rng.random_range(-jitter..=jitter),
            rng.random_range(-jitter..=jitter),
            rng.random_range(-jitter..=jitter),
        )
    } else {
        Vec3::ZERO
    };

    let max_speed = if template.max_speed_max > template.max_speed_min {
        rng.random_range(template.max_speed_min..=template.max_speed_max)
    } else {
        template.max_speed_min
    };

    let velocity = random_in_sphere(template.spawn_speed, rng).clamp_length_max(max_speed);

    SpawnOp {
        position: home + offset,
        velocity,
        params: AgentParams {
            weights: template.weights,
            neighbor_radius: template.neighbor_radius,
            max_speed,
        },
    }
}

/// Produces the single batch that brings `live` to the desired count.
///
/// - More agents wanted: one [`SpawnOp`] per missing agent.
/// - Fewer wanted: the first `live.len() - desired` ids of `live` are
///   despawned.
/// - Equal: an empty batch.
///
/// A negative desired count is treated as zero. The template is only
/// validated when agents have to be spawned, and in that case there is
/// nothing to despawn, so an error never hides a despawn.
///
/// ### Parameters
/// - `live` - Ids of all agents currently alive.
/// - `home` - The home point; supplies position, desired count and template.
/// - `rng` - Source for spawn randomness.
pub fn reconcile(
    live: &[AgentId],
    home: &HomePoint,
    rng: &mut impl Rng,
) -> Result<StructuralBatch, FlockError> {
    let current = live.len();
    let desired = home.target_count();

    if desired > current {
        home.template.validate()?;
        let ops = (0..desired - current)
            .map(|_| StructuralOp::Spawn(spawn_op(home.position, &home.template, rng)))
            .collect();
        return Ok(StructuralBatch { ops });
    }

    // `desired` is clamped at zero, so the excess never exceeds `current`.
    let excess = current - desired;
    let ops = live[..excess]
        .iter()
        .map(|&id| StructuralOp::Despawn(id))
        .collect();
    Ok(StructuralBatch { ops })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    fn ids(count: u64) -> Vec<AgentId> {
        (100..100 + count).collect()
    }

    #[test]
    fn equal_counts_produce_empty_batch() {
        let mut rng = SmallRng::seed_from_u64(1);
        let home = HomePoint::new(Vec3::ZERO, 4);

        let batch = reconcile(&ids(4), &home, &mut rng).unwrap();

        assert!(batch.is_empty());
    }

    #[test]
    fn excess_agents_are_despawned() {
        let mut rng = SmallRng::seed_from_u64(1);
        let home = HomePoint::new(Vec3::ZERO, 7);
        let live = ids(10);

        let batch = reconcile(&live, &home, &mut rng).unwrap();

        assert_eq!(batch.despawn_count(), 3);
        assert_eq!(batch.spawn_count(), 0);
        let removed: Vec<AgentId> = batch.despawns().collect();
        assert_eq!(removed, vec![100, 101, 102]);
    }

    #[test]
    fn negative_desired_count_despawns_everything() {
        let mut rng = SmallRng::seed_from_u64(1);
        let home = HomePoint::new(Vec3::ZERO, -5);

        let batch = reconcile(&ids(3), &home, &mut rng).unwrap();

        assert_eq!(batch.despawn_count(), 3);
    }

    #[test]
    fn missing_agents_spawn_near_home_within_speed() {
        let mut rng = SmallRng::seed_from_u64(5);
        let center = Vec3::new(3.0, -2.0, 8.0);
        let home = HomePoint::new(center, 5);

        let batch = reconcile(&[], &home, &mut rng).unwrap();

        assert_eq!(batch.spawn_count(), 5);
        assert_eq!(batch.despawn_count(), 0);
        for spawn in batch.spawns() {
            let offset = spawn.position - center;
            assert!(offset.abs().max_element() <= 1.0);
            assert!((1.0..=1.4).contains(&spawn.params.max_speed));
            assert!(spawn.velocity.length() <= spawn.params.max_speed + 1e-5);
            assert_eq!(spawn.params.neighbor_radius, 0.5);
        }
    }

    #[test]
    fn invalid_template_is_rejected_only_when_spawning() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut template = AgentTemplate::default();
        template.neighbor_radius = -1.0;

        let grow = HomePoint::new(Vec3::ZERO, 2).with_template(template);
        assert!(matches!(
            reconcile(&[], &grow, &mut rng),
            Err(FlockError::InvalidTemplate(_))
        ));

        let shrink = HomePoint::new(Vec3::ZERO, 0).with_template(template);
        assert_eq!(reconcile(&ids(2), &shrink, &mut rng).unwrap().len(), 2);
    }

    #[test]
    fn sphere_samples_stay_inside_radius() {
        let mut rng = SmallRng::seed_from_u64(77);
        for _ in 0..200 {
            assert!(random_in_sphere(1.5, &mut rng).length() <= 1.5 + 1e-5);
        }
        assert_eq!(random_in_sphere(0.0, &mut rng), Vec3::ZERO);
    }
}
