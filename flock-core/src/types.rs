/// Identifier of an agent, assigned by the agent store.
///
/// Ids are stable for the lifetime of the agent and are never reused by
/// [`crate::store::MemoryStore`].
pub type AgentId = u64;

/// Index of an agent inside a tick's [`crate::snapshot::Snapshot`].
///
/// This is only meaningful for the duration of a single tick.
pub type SlotIndex = usize;
