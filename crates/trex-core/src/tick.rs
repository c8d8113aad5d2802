use std::time::Duration;

/// Discrete time unit driving the agent. Non-negative and monotone.
pub type Tick = u64;

/// Smallest remaining slice of a tick worth spending on deliberation.
/// Below this the scheduler yields the remainder back to the clock.
pub const MIN_SLICE: Duration = Duration::from_micros(500);
