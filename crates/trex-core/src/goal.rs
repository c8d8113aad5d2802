//! Goal tokens: temporally qualified requests dispatched across reactors.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Domain;
use crate::tick::Tick;

/// Closed tick interval; `Tick::MAX` is the open upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TickInterval {
    pub min: Tick,
    pub max: Tick,
}

impl TickInterval {
    pub fn new(min: Tick, max: Tick) -> Self {
        Self { min, max }
    }

    pub fn at(tick: Tick) -> Self {
        Self { min: tick, max: tick }
    }

    /// The unconstrained interval `[0, +inf]`.
    pub fn full() -> Self {
        Self { min: 0, max: Tick::MAX }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Raise the lower bound to at least `min`.
    pub fn tighten_min(&mut self, min: Tick) {
        if min > self.min {
            self.min = min;
        }
    }
}

impl fmt::Display for TickInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, ", self.min)?;
        if self.max == Tick::MAX {
            write!(f, "+inf]")
        } else {
            write!(f, "{}]", self.max)
        }
    }
}

/// Stable goal identity, unique per agent run. Persists across ticks until
/// the goal completes or is recalled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GoalId(String);

impl GoalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request targeted at a timeline owned by another reactor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Goal {
    id: GoalId,
    timeline: String,
    predicate: String,
    start: TickInterval,
    end: TickInterval,
    duration: TickInterval,
    params: Vec<(String, Domain)>,
}

impl Goal {
    /// A goal with unconstrained temporal variables.
    pub fn new(
        id: impl Into<String>,
        timeline: impl Into<String>,
        predicate: impl Into<String>,
    ) -> Self {
        Self {
            id: GoalId::new(id),
            timeline: timeline.into(),
            predicate: predicate.into(),
            start: TickInterval::full(),
            end: TickInterval::full(),
            duration: TickInterval { min: 1, max: Tick::MAX },
            params: Vec::new(),
        }
    }

    pub fn with_start(mut self, start: TickInterval) -> Self {
        self.start = start;
        self
    }

    pub fn with_end(mut self, end: TickInterval) -> Self {
        self.end = end;
        self
    }

    pub fn with_duration(mut self, duration: TickInterval) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, domain: Domain) -> Self {
        self.params.push((name.into(), domain));
        self
    }

    pub fn id(&self) -> &GoalId {
        &self.id
    }

    pub fn timeline(&self) -> &str {
        &self.timeline
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn start(&self) -> TickInterval {
        self.start
    }

    pub fn end(&self) -> TickInterval {
        self.end
    }

    pub fn duration(&self) -> TickInterval {
        self.duration
    }

    pub fn params(&self) -> &[(String, Domain)] {
        &self.params
    }

    /// Dispatch-window lower bound: a goal posted at `tick` through a server
    /// with `latency` cannot start before the owner has had time to respond.
    pub fn tighten_start_min(&mut self, min: Tick) {
        self.start.tighten_min(min);
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}.{} start={} end={} duration={}",
            self.id, self.timeline, self.predicate, self.start, self.end, self.duration
        )
    }
}

/// Owner-side adapter a client reactor dispatches goals through.
///
/// `latency` is the lower bound of the dispatch window, `look_ahead` the
/// upper bound on how far ahead the owner commits.
pub trait GoalServer {
    fn request(&self, goal: Goal);
    fn recall(&self, goal_id: &GoalId);
    fn latency(&self) -> Tick;
    fn look_ahead(&self) -> Tick;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tighten_never_lowers() {
        let mut goal = Goal::new("g1", "t", "Go").with_start(TickInterval::new(5, 20));
        goal.tighten_start_min(12);
        assert_eq!(goal.start(), TickInterval::new(12, 20));
        goal.tighten_start_min(3);
        assert_eq!(goal.start(), TickInterval::new(12, 20));
    }

    #[test]
    fn display_open_end() {
        let goal = Goal::new("g2", "nav", "At");
        assert!(goal.to_string().contains("start=[0, +inf]"));
    }
}
