use glam::{Mat3, Quat, Vec3};

/// World up axis used when orienting agents.
pub const WORLD_UP: Vec3 = Vec3::Y;

const PARALLEL_EPSILON: f32 = 1.0e-6;

/// Kinematic state advanced by [`step`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Kinematics {
    pub position: Vec3,
    pub velocity: Vec3,
    pub orientation: Quat,
}

/// Rotation that maps local `+Z` onto `forward` and keeps local `+Y` as
/// close to `up` as possible.
///
/// When `forward` is (anti)parallel to `up`, `+Z` is used as the reference
/// up axis instead. Returns `None` only for a zero `forward`.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Option<Quat> {
    let z = forward.try_normalize()?;
    let mut x = up.cross(z);
    if x.length_squared() <= PARALLEL_EPSILON {
        x = Vec3::Z.cross(z);
    }
    let x = x.try_normalize()?;
    let y = z.cross(x);
    Some(Quat::from_mat3(&Mat3::from_cols(x, y, z)).normalize())
}

/// Advances one agent by `dt`.
///
/// 1. `velocity += acceleration * dt`, then clamped to `max_speed`.
/// 2. `position += velocity * dt` using the clamped velocity.
/// 3. The orientation turns toward the direction of travel by
///    `clamp(dt * turn_rate, 0, 1)`; a zero velocity leaves it unchanged.
///
/// Pure in its inputs, so agents can be stepped on any thread.
pub fn step(
    state: Kinematics,
    acceleration: Vec3,
    max_speed: f32,
    dt: f32,
    turn_rate: f32,
) -> Kinematics {
    let mut velocity = state.velocity + acceleration * dt;
    let speed = velocity.length();
    if speed > max_speed && speed > 0.0 {
        velocity = velocity / speed * max_speed;
    }

    let position = state.position + velocity * dt;

    let orientation = match look_rotation(velocity, WORLD_UP) {
        Some(target) => {
            let t = (dt * turn_rate).clamp(0.0, 1.0);
            state.orientation.slerp(target, t)
        }
        None => state.orientation,
    };

    Kinematics {
        position,
        velocity,
        orientation,
    }
}
