//! The agent: the tick loop and its scheduling policy.
//!
//! One thread runs everything. Each tick begins with `handle_tick_start`
//! across all reactors, then a synchronization pass in priority order
//! (producers first, so upstream observations are visible downstream within
//! the same tick), then deliberation: one `resume` quantum per clock poll,
//! round-robin among reactors reporting work, until the clock's remaining
//! budget is spent. A `false` from `synchronize` or `resume` - or a panic -
//! halts the loop for good.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use trex_core::{
    Clock, ClockStats, GoalServer, InitContext, ObserverSink, ReactorFault, Tick, MIN_SLICE,
};

use crate::dispatch::{DispatchHub, ObserverRef, ServerRef};
use crate::observability::AgentEvent;

/// Call count and wall-clock time spent in one reactor operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageStat {
    pub calls: u64,
    pub elapsed: Duration,
}

impl UsageStat {
    fn add(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.elapsed += elapsed;
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ReactorUsage {
    tick_sync: UsageStat,
    tick_search: UsageStat,
    total_sync: UsageStat,
    total_search: UsageStat,
}

/// Cooperative stop request, honored at the next tick boundary.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The process-wide coordinator: clock, reactor schedule, dispatch hub.
pub struct Agent {
    name: String,
    clock: Box<dyn Clock>,
    hub: Rc<DispatchHub>,
    /// Reactor indices, priority ascending.
    schedule: Vec<usize>,
    priorities: Vec<u64>,
    log_enabled: Vec<bool>,
    usage: Vec<ReactorUsage>,
    final_tick: Tick,
    current_tick: Option<Tick>,
    /// Tick value polled from the clock but not yet begun.
    pending_tick: Option<Tick>,
    last_flushed: Option<Tick>,
    initialized: bool,
    clock_started: bool,
    failure: Option<ReactorFault>,
    shutdown: Arc<AtomicBool>,
    resume_cursor: usize,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Agent {
    pub(crate) fn from_parts(
        name: String,
        clock: Box<dyn Clock>,
        hub: Rc<DispatchHub>,
        schedule: Vec<usize>,
        priorities: Vec<u64>,
        log_enabled: Vec<bool>,
        final_tick: Tick,
    ) -> Self {
        let usage = vec![ReactorUsage::default(); schedule.len()];
        Self {
            name,
            clock,
            hub,
            schedule,
            priorities,
            log_enabled,
            usage,
            final_tick,
            current_tick: None,
            pending_tick: None,
            last_flushed: None,
            initialized: false,
            clock_started: false,
            failure: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            resume_cursor: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn final_tick(&self) -> Tick {
        self.final_tick
    }

    /// Tick currently executing, `None` before the first one.
    pub fn current_tick(&self) -> Option<Tick> {
        self.current_tick
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn failure(&self) -> Option<&ReactorFault> {
        self.failure.as_ref()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    pub fn clock_stats(&self) -> ClockStats {
        self.clock.stats()
    }

    pub fn reactor_count(&self) -> usize {
        self.schedule.len()
    }

    /// Reactor names, priority ascending.
    pub fn schedule_names(&self) -> Vec<&str> {
        self.schedule
            .iter()
            .map(|&idx| self.hub.names[idx].as_str())
            .collect()
    }

    pub fn priority_of(&self, reactor: &str) -> Option<u64> {
        let idx = self.hub.names.iter().position(|n| n == reactor)?;
        Some(self.priorities[idx])
    }

    /// Name of the reactor owning `timeline`.
    pub fn owner_of(&self, timeline: &str) -> Option<&str> {
        self.hub
            .owner_of
            .get(timeline)
            .map(|&idx| self.hub.names[idx].as_str())
    }

    /// The full timeline-to-owner map.
    pub fn timeline_owners(&self) -> HashMap<String, String> {
        self.hub
            .owner_of
            .iter()
            .map(|(timeline, &idx)| (timeline.clone(), self.hub.names[idx].clone()))
            .collect()
    }

    /// Cumulative synchronize/resume usage for one reactor.
    pub fn usage_of(&self, reactor: &str) -> Option<(UsageStat, UsageStat)> {
        let idx = self.hub.names.iter().position(|n| n == reactor)?;
        Some((self.usage[idx].total_sync, self.usage[idx].total_search))
    }

    /// Run the tick loop until `final_tick` completes, shutdown is
    /// requested, or a reactor fails.
    pub fn run(&mut self) -> Result<(), ReactorFault> {
        info!(agent = %self.name, final_tick = self.final_tick, "tick loop starting");
        while self.step()? {}
        info!(agent = %self.name, "tick loop finished");
        Ok(())
    }

    /// Drive a single tick to completion: wait for the clock to yield a new
    /// tick value, run the tick-start and synchronization passes, then spend
    /// deliberation quanta until the clock moves past the tick. Returns
    /// `false` once `final_tick` has completed or shutdown was requested.
    pub fn step(&mut self) -> Result<bool, ReactorFault> {
        if let Some(fault) = &self.failure {
            return Err(fault.clone());
        }
        self.initialize()?;
        if !self.clock_started {
            self.clock_started = true;
            self.clock.start();
        }

        loop {
            let tick = match self.pending_tick.take() {
                Some(tick) => tick,
                None => self.clock.get_next_tick(),
            };
            if tick > self.final_tick {
                if let Some(completed) = self.current_tick {
                    self.flush_usage(completed);
                }
                return Ok(false);
            }

            let is_new_tick = self.current_tick.map_or(true, |current| tick > current);
            if !is_new_tick {
                // A quantum for a tick begun earlier (mixed run/step use).
                if self.clock.time_left() > MIN_SLICE {
                    if let Some(idx) = self.select_for_resume() {
                        if let Err(fault) = self.do_resume(idx, tick) {
                            return Err(self.fail(fault));
                        }
                        continue;
                    }
                }
                self.clock.sleep(self.clock.time_left());
                continue;
            }

            if self.shutdown.load(Ordering::Relaxed) {
                info!(agent = %self.name, tick, "shutdown requested");
                if let Some(completed) = self.current_tick {
                    self.flush_usage(completed);
                }
                return Ok(false);
            }
            if let Err(fault) = self.begin_tick(tick) {
                return Err(self.fail(fault));
            }

            // Deliberate until the clock leaves this tick.
            loop {
                let next = self.clock.get_next_tick();
                if next != tick {
                    self.pending_tick = Some(next);
                    return Ok(true);
                }
                if self.clock.time_left() > MIN_SLICE {
                    if let Some(idx) = self.select_for_resume() {
                        if let Err(fault) = self.do_resume(idx, tick) {
                            return Err(self.fail(fault));
                        }
                        continue;
                    }
                }
                self.clock.sleep(self.clock.time_left());
            }
        }
    }

    /// Wire adapters and run the `handle_init` pass, once.
    fn initialize(&mut self) -> Result<(), ReactorFault> {
        if self.initialized {
            return Ok(());
        }
        self.initialized = true;

        for pos in 0..self.schedule.len() {
            let idx = self.schedule[pos];
            let modes = self.hub.cells[idx].borrow().timeline_modes();

            let mut servers: HashMap<String, Rc<dyn GoalServer>> = HashMap::new();
            for timeline in &modes.externals {
                // Assembly guarantees the owner exists and differs from idx.
                let owner = self.hub.owner_of[timeline];
                let (latency, look_ahead) = {
                    let cell = self.hub.cells[owner].borrow();
                    (cell.latency(), cell.look_ahead())
                };
                servers.insert(
                    timeline.clone(),
                    Rc::new(ServerRef::new(
                        self.hub.clone(),
                        owner,
                        timeline.clone(),
                        latency,
                        look_ahead,
                    )),
                );
            }

            let init = InitContext {
                initial_tick: 0,
                servers_by_timeline: servers,
                observer_sink: Rc::new(ObserverRef::new(self.hub.clone(), idx))
                    as Rc<dyn ObserverSink>,
            };

            let cell = &self.hub.cells[idx];
            let result = catch_unwind(AssertUnwindSafe(|| cell.borrow_mut().handle_init(init)));
            if result.is_err() {
                return Err(self.fail(ReactorFault::Panicked {
                    reactor: self.hub.names[idx].clone(),
                    operation: "handle_init",
                    tick: 0,
                }));
            }
            debug!(reactor = %self.hub.names[idx], priority = self.priorities[idx], "initialized");
        }
        Ok(())
    }

    fn begin_tick(&mut self, tick: Tick) -> Result<(), ReactorFault> {
        if let Some(previous) = self.current_tick {
            self.flush_usage(previous);
            if tick > previous + 1 {
                warn!(agent = %self.name, from = previous, to = tick, "missed ticks");
                self.hub.emit(AgentEvent::new(
                    tick,
                    "missed_ticks",
                    format!("tick slipped from {} to {}", previous, tick),
                ));
            }
        }

        self.current_tick = Some(tick);
        self.hub.current_tick.set(tick);
        self.resume_cursor = 0;

        for &idx in &self.schedule {
            self.usage[idx].tick_sync = UsageStat::default();
            self.usage[idx].tick_search = UsageStat::default();
            let cell = &self.hub.cells[idx];
            let result =
                catch_unwind(AssertUnwindSafe(|| cell.borrow_mut().handle_tick_start(tick)));
            if result.is_err() {
                return Err(ReactorFault::Panicked {
                    reactor: self.hub.names[idx].clone(),
                    operation: "handle_tick_start",
                    tick,
                });
            }
        }

        for pos in 0..self.schedule.len() {
            let idx = self.schedule[pos];
            self.do_synchronize(idx, tick)?;
        }

        Ok(())
    }

    fn do_synchronize(&mut self, idx: usize, tick: Tick) -> Result<(), ReactorFault> {
        let cell = &self.hub.cells[idx];
        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| cell.borrow_mut().synchronize(tick)));
        let elapsed = started.elapsed();
        self.usage[idx].tick_sync.add(elapsed);
        self.usage[idx].total_sync.add(elapsed);

        match result {
            Ok(true) => Ok(()),
            Ok(false) => Err(ReactorFault::Synchronize {
                reactor: self.hub.names[idx].clone(),
                tick,
            }),
            Err(_) => Err(ReactorFault::Panicked {
                reactor: self.hub.names[idx].clone(),
                operation: "synchronize",
                tick,
            }),
        }
    }

    fn do_resume(&mut self, idx: usize, tick: Tick) -> Result<(), ReactorFault> {
        let cell = &self.hub.cells[idx];
        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(|| cell.borrow_mut().resume(tick)));
        let elapsed = started.elapsed();
        self.usage[idx].tick_search.add(elapsed);
        self.usage[idx].total_search.add(elapsed);

        match result {
            Ok(true) => Ok(()),
            Ok(false) => Err(ReactorFault::Resume {
                reactor: self.hub.names[idx].clone(),
                tick,
            }),
            Err(_) => Err(ReactorFault::Panicked {
                reactor: self.hub.names[idx].clone(),
                operation: "resume",
                tick,
            }),
        }
    }

    /// Round-robin among reactors reporting remaining work.
    fn select_for_resume(&mut self) -> Option<usize> {
        let n = self.schedule.len();
        if n == 0 {
            return None;
        }
        for offset in 0..n {
            let pos = (self.resume_cursor + offset) % n;
            let idx = self.schedule[pos];
            if self.hub.cells[idx].borrow().has_work() {
                self.resume_cursor = (pos + 1) % n;
                return Some(idx);
            }
        }
        None
    }

    /// Journal the completed tick's per-reactor usage rows, once per tick.
    fn flush_usage(&mut self, tick: Tick) {
        if self.last_flushed == Some(tick) {
            return;
        }
        self.last_flushed = Some(tick);
        for &idx in &self.schedule {
            if !self.log_enabled[idx] {
                continue;
            }
            let usage = &self.usage[idx];
            self.hub.emit(
                AgentEvent::new(tick, "tick_usage", "sync/search usage")
                    .with_reactor(self.hub.names[idx].clone())
                    .with_metadata(serde_json::json!({
                        "sync_calls": usage.tick_sync.calls,
                        "sync_us": usage.tick_sync.elapsed.as_micros() as u64,
                        "resume_calls": usage.tick_search.calls,
                        "resume_us": usage.tick_search.elapsed.as_micros() as u64,
                    })),
            );
        }
    }

    fn fail(&mut self, fault: ReactorFault) -> ReactorFault {
        warn!(agent = %self.name, %fault, "fatal reactor fault");
        self.hub.emit(AgentEvent::new(
            self.current_tick.unwrap_or(0),
            "failure",
            fault.to_string(),
        ));
        self.failure = Some(fault.clone());
        fault
    }
}
