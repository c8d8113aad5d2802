//! Deterministic, engine-agnostic primitives for a tick-synchronized
//! multi-reactor runtime.
//!
//! The coordination kernel (scheduling, dispatch, assembly) lives in
//! `trex-agent`; this crate holds the value types and the contracts at the
//! seams: clocks, timelines, observations, goals, and the reactor itself.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod clock;
pub mod domain;
pub mod error;
pub mod goal;
pub mod observation;
pub mod reactor;
pub mod tick;

pub use clock::{Clock, ClockStats, PseudoClock, RealTimeClock};
pub use domain::{Domain, DomainKind};
pub use error::ReactorFault;
pub use goal::{Goal, GoalId, GoalServer, TickInterval};
pub use observation::{Observation, ObserverSink, ParameterView};
pub use reactor::{InitContext, Reactor, TimelineMode, TimelineModes};
pub use tick::{Tick, MIN_SLICE};
