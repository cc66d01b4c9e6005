use thiserror::Error;

/// Errors raised by the flock core.
///
/// Every variant describes input that would otherwise produce non-finite
/// simulation state or break the speed limit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlockError {
    /// The agent template cannot be used to spawn agents.
    #[error("invalid agent template: {0}")]
    InvalidTemplate(&'static str),
    /// Parameters of a host-inserted agent are unusable.
    #[error("invalid agent parameters: {0}")]
    InvalidAgent(&'static str),
    /// The per-simulation configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
