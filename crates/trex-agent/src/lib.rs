//! The coordination kernel of the teleo-reactive agent runtime.
//!
//! This crate assembles reactors from configuration, validates the
//! timeline ownership graph, derives the priority schedule, and runs the
//! tick loop: tick start, synchronization pass, and time-sliced
//! deliberation, with observation fan-out and goal dispatch between
//! reactors.

pub mod agent;
pub mod assembly;
pub mod config;
pub mod dispatch;
pub mod observability;
pub mod reactors;
pub mod registry;
pub mod wire;

pub use agent::{Agent, ShutdownHandle, UsageStat};
pub use assembly::{Assembly, AssemblyError};
pub use config::{AgentConfig, ReactorConfig, SearchPath};
pub use observability::{AgentEvent, EventSink, FileEventLog, NullEventSink, VecEventSink};
pub use reactors::{IdleReactor, ScriptEntry, ScriptedReactor};
pub use registry::{builtin_registry, FactoryContext, ReactorRegistry};
