pub mod actor;
pub mod migration;
pub mod node;
pub mod routing;
pub mod types;
pub mod workers;

// Ring maintenance defaults
pub const SUCCESSOR_LIST_SIZE: usize = 3;
pub const MAX_SUCCESSOR_LIST_SIZE: usize = 32;
pub const STABILIZE_INTERVAL_MS: u64 = 1000;
pub const FIX_FINGERS_INTERVAL_MS: u64 = 1000;
pub const CHECK_PREDECESSOR_INTERVAL_MS: u64 = 1000;
pub const MAX_INTERVAL_MS: u64 = 60_000;

/// Hop ceiling for iterative lookups.
pub const MAX_STEPS: usize = 32;

pub(crate) const ACTOR_MAILBOX_SIZE: usize = 64;
