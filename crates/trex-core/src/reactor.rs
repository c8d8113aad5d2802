//! The reactor contract: a deliberative unit owning a subset of timelines.

use std::collections::HashMap;
use std::rc::Rc;

use crate::goal::{Goal, GoalId, GoalServer};
use crate::observation::{Observation, ObserverSink};
use crate::tick::Tick;

/// Relationship of a reactor to a named timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineMode {
    /// Owned and updated by this reactor; observations originate here.
    Internal,
    /// Read-only view of another reactor's internal timeline.
    External,
    /// Declared but not connected.
    Ignore,
}

/// A reactor's timeline declaration. Must be stable for the agent's lifetime;
/// the runtime builds the ownership graph from it once at assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineModes {
    pub internals: Vec<String>,
    pub externals: Vec<String>,
    pub ignores: Vec<String>,
}

impl TimelineModes {
    pub fn internal(mut self, name: impl Into<String>) -> Self {
        self.internals.push(name.into());
        self
    }

    pub fn external(mut self, name: impl Into<String>) -> Self {
        self.externals.push(name.into());
        self
    }

    pub fn ignore(mut self, name: impl Into<String>) -> Self {
        self.ignores.push(name.into());
        self
    }

    pub fn mode_of(&self, name: &str) -> Option<TimelineMode> {
        if self.internals.iter().any(|t| t == name) {
            Some(TimelineMode::Internal)
        } else if self.externals.iter().any(|t| t == name) {
            Some(TimelineMode::External)
        } else if self.ignores.iter().any(|t| t == name) {
            Some(TimelineMode::Ignore)
        } else {
            None
        }
    }
}

/// Everything a reactor is wired with before tick 0: peers' servers for each
/// of its external timelines, and the sink it publishes its own internal
/// observations through.
pub struct InitContext {
    pub initial_tick: Tick,
    pub servers_by_timeline: HashMap<String, Rc<dyn GoalServer>>,
    pub observer_sink: Rc<dyn ObserverSink>,
}

/// A deliberative unit on the shared tick.
///
/// All methods run on the agent thread; `synchronize` and `resume` return
/// `false` only for an unrecoverable inconsistency, which the agent treats
/// as fatal.
pub trait Reactor {
    /// Unique name within the agent.
    fn name(&self) -> &str;

    /// Ticks needed to respond to a newly posted goal (dispatch-window lower
    /// bound). Must not exceed [`Reactor::look_ahead`].
    fn latency(&self) -> Tick {
        0
    }

    /// Ticks ahead this reactor is willing to commit (dispatch-window upper
    /// bound).
    fn look_ahead(&self) -> Tick {
        0
    }

    fn timeline_modes(&self) -> TimelineModes;

    /// Called once before tick 0; the reactor caches the contents of `init`.
    fn handle_init(&mut self, init: InitContext) {
        let _ = init;
    }

    /// Start of every tick, before any synchronization.
    fn handle_tick_start(&mut self, tick: Tick) {
        let _ = tick;
    }

    /// Reconcile internal state with all observations received since the
    /// previous tick and publish this tick's observations on the internal
    /// timelines.
    fn synchronize(&mut self, tick: Tick) -> bool;

    /// One bounded quantum of deliberation. May be called many times per
    /// tick, never before `synchronize` within the same tick.
    fn resume(&mut self, tick: Tick) -> bool {
        let _ = tick;
        true
    }

    /// Whether another `resume` quantum would make progress.
    fn has_work(&self) -> bool {
        false
    }

    /// An observation arrived on one of this reactor's external timelines.
    fn notify(&mut self, observation: Observation) {
        let _ = observation;
    }

    /// A goal was requested on one of this reactor's internal timelines.
    fn handle_request(&mut self, goal: Goal) {
        let _ = goal;
    }

    /// A previously requested goal was recalled.
    fn handle_recall(&mut self, goal_id: &GoalId) {
        let _ = goal_id;
    }
}
