//! Clocks driving the tick loop: a deterministic stepped clock for tests and
//! a wall-clock variant for real-time execution.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::tick::Tick;

/// Wall-clock usage accumulated at tick boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockStats {
    /// Duration of the most recently completed tick.
    pub last_tick: Duration,
    /// Total duration across all completed ticks.
    pub total: Duration,
}

#[derive(Debug, Default)]
struct StatTracker {
    last_mark: Option<Instant>,
    stats: ClockStats,
}

impl StatTracker {
    /// Record a tick boundary at `now`.
    fn mark(&mut self, now: Instant) {
        if let Some(prev) = self.last_mark.replace(now) {
            let elapsed = now.duration_since(prev);
            self.stats.last_tick = elapsed;
            self.stats.total += elapsed;
        }
    }
}

/// Source of monotonically non-decreasing ticks.
///
/// `sleep` is the only blocking operation; everything else returns promptly.
pub trait Clock {
    /// Latch the clock origin. Ticks do not advance before this is called.
    fn start(&mut self) {}

    /// Current tick, advancing internal state as time (or a step budget)
    /// allows. Never decreases; may jump forward after an overrun.
    fn get_next_tick(&mut self) -> Tick;

    fn seconds_per_tick(&self) -> f64 {
        1.0
    }

    /// Time remaining before the next tick boundary; bounds deliberation.
    fn time_left(&self) -> Duration;

    /// High-resolution cooperative sleep.
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }

    fn stats(&self) -> ClockStats {
        ClockStats::default()
    }
}

/// Deterministic clock for stepping the agent on the main thread: each tick
/// value is returned for `steps_per_tick` consecutive polls, then the tick
/// increments. Advances only when polled.
#[derive(Debug)]
pub struct PseudoClock {
    tick: Tick,
    internal_ticks: u64,
    steps_per_tick: u64,
    tracker: StatTracker,
}

impl PseudoClock {
    pub fn new(steps_per_tick: u64) -> Self {
        Self {
            tick: 0,
            internal_ticks: 0,
            steps_per_tick: steps_per_tick.max(1),
            tracker: StatTracker::default(),
        }
    }

    pub fn steps_per_tick(&self) -> u64 {
        self.steps_per_tick
    }
}

impl Clock for PseudoClock {
    fn start(&mut self) {
        self.tracker.mark(Instant::now());
    }

    fn get_next_tick(&mut self) -> Tick {
        if self.internal_ticks == self.steps_per_tick {
            self.tick += 1;
            self.internal_ticks = 0;
            self.tracker.mark(Instant::now());
        }
        self.internal_ticks += 1;
        self.tick
    }

    fn time_left(&self) -> Duration {
        // The stepped clock meters deliberation by polls, not wall time:
        // every `get_next_tick` returning the same tick grants one quantum.
        Duration::from_secs(1)
    }

    fn sleep(&self, _duration: Duration) {}

    fn stats(&self) -> ClockStats {
        self.tracker.stats
    }
}

#[derive(Debug)]
struct RtState {
    started: bool,
    tick: Tick,
    next_tick_deadline: Option<Instant>,
    tracker: StatTracker,
}

/// Wall-clock driven tick source. Tick state is shared with status queries
/// from other threads, so it sits behind a mutex.
#[derive(Debug)]
pub struct RealTimeClock {
    seconds_per_tick: Duration,
    state: Mutex<RtState>,
}

impl RealTimeClock {
    pub fn new(seconds_per_tick: f64) -> Self {
        Self {
            seconds_per_tick: Duration::from_secs_f64(seconds_per_tick),
            state: Mutex::new(RtState {
                started: false,
                tick: 0,
                next_tick_deadline: None,
                tracker: StatTracker::default(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RtState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Tick as last computed, without advancing. Safe from any thread.
    pub fn current_tick(&self) -> Tick {
        self.lock().tick
    }
}

impl Clock for RealTimeClock {
    fn start(&mut self) {
        let now = Instant::now();
        let mut state = self.lock();
        state.started = true;
        state.next_tick_deadline = Some(now + self.seconds_per_tick);
        state.tracker.mark(now);
    }

    fn get_next_tick(&mut self) -> Tick {
        let now = Instant::now();
        let mut state = self.lock();
        if !state.started {
            return state.tick;
        }
        // Advance past every elapsed period; an overrun skips ticks.
        while let Some(deadline) = state.next_tick_deadline {
            if now < deadline {
                break;
            }
            state.tick += 1;
            state.next_tick_deadline = Some(deadline + self.seconds_per_tick);
            state.tracker.mark(now);
        }
        state.tick
    }

    fn seconds_per_tick(&self) -> f64 {
        self.seconds_per_tick.as_secs_f64()
    }

    fn time_left(&self) -> Duration {
        let state = self.lock();
        match state.next_tick_deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => self.seconds_per_tick,
        }
    }

    fn stats(&self) -> ClockStats {
        self.lock().tracker.stats
    }
}
