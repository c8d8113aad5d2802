//! The in-process dispatch hub: observation fan-out and goal forwarding.
//!
//! The hub owns every reactor cell; adapter values (`ObserverRef`,
//! `ServerRef`) reference reactors by stable index and are handed out at
//! init. Everything runs on the agent thread; `RefCell` enforces the
//! one-callback-at-a-time discipline at runtime.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, warn};
use trex_core::{Goal, GoalId, GoalServer, Observation, ObserverSink, Reactor, Tick};

use crate::observability::{AgentEvent, EventSink};
use crate::wire;

pub(crate) struct DispatchHub {
    pub(crate) names: Vec<String>,
    pub(crate) cells: Vec<RefCell<Box<dyn Reactor>>>,
    /// Timeline name to owning reactor index.
    pub(crate) owner_of: HashMap<String, usize>,
    /// Timeline name to subscriber indices, priority ascending.
    pub(crate) subscribers: HashMap<String, Vec<usize>>,
    pub(crate) current_tick: Cell<Tick>,
    pub(crate) log: RefCell<Box<dyn EventSink>>,
}

impl DispatchHub {
    pub(crate) fn emit(&self, event: AgentEvent) {
        self.log.borrow_mut().emit(event);
    }
}

/// Fans a reactor's published observations out to every subscriber of the
/// timeline. Delivery is synchronous, in priority order, and at most once
/// per subscriber per observation.
pub struct ObserverRef {
    hub: Rc<DispatchHub>,
    publisher: usize,
}

impl ObserverRef {
    pub(crate) fn new(hub: Rc<DispatchHub>, publisher: usize) -> Self {
        Self { hub, publisher }
    }
}

impl ObserverSink for ObserverRef {
    fn notify(&self, observation: Observation) {
        let timeline = observation.object();
        if self.hub.owner_of.get(timeline) != Some(&self.publisher) {
            warn!(
                reactor = %self.hub.names[self.publisher],
                timeline,
                "dropping observation published on a timeline the reactor does not own"
            );
            return;
        }

        debug!(publisher = %self.hub.names[self.publisher], %observation, "publish");
        self.hub.emit(
            AgentEvent::new(
                observation.tick(),
                "observation",
                wire::observation_to_xml(&observation),
            )
            .with_reactor(self.hub.names[self.publisher].clone()),
        );

        if let Some(subs) = self.hub.subscribers.get(timeline) {
            for &idx in subs {
                self.hub.cells[idx].borrow_mut().notify(observation.clone());
            }
        }
    }
}

/// Forwards goal requests and recalls to the reactor owning one timeline.
/// Requests are journaled before delegation and carry the dispatch-window
/// lower bound implied by the owner's latency.
pub struct ServerRef {
    hub: Rc<DispatchHub>,
    owner: usize,
    timeline: String,
    latency: Tick,
    look_ahead: Tick,
}

impl ServerRef {
    pub(crate) fn new(
        hub: Rc<DispatchHub>,
        owner: usize,
        timeline: String,
        latency: Tick,
        look_ahead: Tick,
    ) -> Self {
        Self {
            hub,
            owner,
            timeline,
            latency,
            look_ahead,
        }
    }

    pub fn timeline(&self) -> &str {
        &self.timeline
    }
}

impl GoalServer for ServerRef {
    fn request(&self, mut goal: Goal) {
        let tick = self.hub.current_tick.get();
        goal.tighten_start_min(tick.saturating_add(self.latency));

        debug!(owner = %self.hub.names[self.owner], %goal, "request");
        self.hub.emit(
            AgentEvent::new(tick, "goal_requested", goal.to_string())
                .with_reactor(self.hub.names[self.owner].clone()),
        );

        self.hub.cells[self.owner].borrow_mut().handle_request(goal);
    }

    fn recall(&self, goal_id: &GoalId) {
        let tick = self.hub.current_tick.get();

        debug!(owner = %self.hub.names[self.owner], %goal_id, "recall");
        self.hub.emit(
            AgentEvent::new(tick, "goal_recalled", goal_id.to_string())
                .with_reactor(self.hub.names[self.owner].clone()),
        );

        self.hub.cells[self.owner].borrow_mut().handle_recall(goal_id);
    }

    fn latency(&self) -> Tick {
        self.latency
    }

    fn look_ahead(&self) -> Tick {
        self.look_ahead
    }
}
