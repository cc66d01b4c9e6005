//! Core boids flocking and population library.
//!
//! Main components:
//! - [`grid`] - spatial hash over agent positions.
//! - [`accumulator`] - per-agent separation, alignment and cohesion sums.
//! - [`force`] - home attraction, wander and the weighted steering sum.
//! - [`integrator`] - velocity, position and orientation update.
//! - [`population`] - spawn/despawn batches toward the desired count.
//! - [`phases`] - the per-tick pipeline and [`phases::FlockStepper`].
//! - [`store`] - the host-facing [`store::AgentStore`] seam and an
//!   in-memory implementation.
//! - [`config`], [`home`], [`agent`], [`snapshot`], [`types`], [`error`] -
//!   shared data types.

pub mod accumulator;
pub mod agent;
pub mod config;
pub mod error;
pub mod force;
pub mod grid;
pub mod home;
pub mod integrator;
pub mod phases;
pub mod population;
pub mod snapshot;
pub mod store;
pub mod types;
