use crate::{
    accumulator::SteeringTerms,
    config::{HomeLaw, SteeringWeights},
};
use glam::Vec3;
use rand::Rng;

/// Pull from `position` toward `home`.
///
/// Zero when the agent sits exactly on the home point.
pub fn home_force(position: Vec3, home: Vec3, law: HomeLaw) -> Vec3 {
    let to_home = home - position;
    let distance = to_home.length();
    if distance == 0.0 {
        return Vec3::ZERO;
    }
    let direction = to_home / distance;
    match law {
        HomeLaw::Linear => direction * distance,
        HomeLaw::Quadratic => direction * distance * distance,
    }
}

/// Uniformly distributed direction on the unit sphere.
pub fn random_unit_vector(rng: &mut impl Rng) -> Vec3 {
    // Uniform z and azimuth give a uniform point on the sphere.
    let z: f32 = rng.random_range(-1.0..=1.0);
    let theta: f32 = rng.random_range(0.0..std::f32::consts::TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vec3::new(r * theta.cos(), r * theta.sin(), z).normalize_or_zero()
}

/// Weighted sum of all steering contributions for one agent.
///
/// ### Parameters
/// - `terms` - Averaged neighbor terms; all zero for an isolated agent.
/// - `home` - Result of [`home_force`].
/// - `wander` - Unit direction drawn for this agent and tick.
/// - `weights` - The agent's own weights.
pub fn acceleration(
    terms: &SteeringTerms,
    home: Vec3,
    wander: Vec3,
    weights: &SteeringWeights,
) -> Vec3 {
    terms.separation * weights.separation
        + terms.alignment * weights.alignment
        + terms.cohesion * weights.cohesion
        + home * weights.home
        + wander * weights.wander
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    #[test]
    fn linear_home_force_scales_with_distance() {
        let force = home_force(Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO, HomeLaw::Linear);
        assert!((force - Vec3::new(-10.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn quadratic_home_force_squares_distance() {
        let force = home_force(Vec3::new(0.0, 3.0, 0.0), Vec3::ZERO, HomeLaw::Quadratic);
        assert!((force - Vec3::new(0.0, -9.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn home_force_is_zero_at_home() {
        let home = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(home_force(home, home, HomeLaw::Linear), Vec3::ZERO);
        assert_eq!(home_force(home, home, HomeLaw::Quadratic), Vec3::ZERO);
    }

    #[test]
    fn wander_is_unit_length_and_reproducible() {
        let mut a = SmallRng::seed_from_u64(9);
        let mut b = SmallRng::seed_from_u64(9);

        for _ in 0..100 {
            let va = random_unit_vector(&mut a);
            let vb = random_unit_vector(&mut b);
            assert_eq!(va, vb);
            assert!((va.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn isolated_agent_feels_only_home_and_wander() {
        let weights = SteeringWeights {
            separation: 3.0,
            alignment: 2.0,
            cohesion: 4.0,
            home: 0.5,
            wander: 0.25,
        };
        let home = Vec3::new(-4.0, 0.0, 0.0);
        let wander = Vec3::Z;

        let acc = acceleration(&SteeringTerms::ZERO, home, wander, &weights);

        assert_eq!(acc, Vec3::new(-2.0, 0.0, 0.25));
    }

    #[test]
    fn weights_apply_per_term() {
        let terms = SteeringTerms {
            separation: Vec3::X,
            alignment: Vec3::Y,
            cohesion: Vec3::Z,
        };
        let weights = SteeringWeights {
            separation: 2.0,
            alignment: 3.0,
            cohesion: 4.0,
            home: 0.0,
            wander: 0.0,
        };

        let acc = acceleration(&terms, Vec3::ONE, Vec3::ONE, &weights);

        assert_eq!(acc, Vec3::new(2.0, 3.0, 4.0));
    }
}
