//! Observations: predicates asserted on a timeline at a tick.

use std::fmt;
use std::rc::Rc;

use crate::domain::Domain;
use crate::tick::Tick;

/// Read-only view over the parameters of a live planner token.
///
/// This is the seam to the planning engine behind a reactor: a by-reference
/// observation dereferences the token's current state at call time and is
/// only valid while the token exists (at most until the subscriber's
/// `synchronize` returns in the publication tick).
pub trait ParameterView {
    fn parameter_count(&self) -> usize;
    fn parameter(&self, index: usize) -> (String, Domain);
}

#[derive(Clone)]
enum Params {
    /// Owned name/domain pairs, deep-copied at construction.
    Value(Vec<(String, Domain)>),
    /// Live view into planner state.
    Reference(Rc<dyn ParameterView>),
}

/// Immutable record of a predicate asserted on a timeline at a tick.
#[derive(Clone)]
pub struct Observation {
    tick: Tick,
    object: String,
    predicate: String,
    params: Params,
}

impl Observation {
    /// A by-value observation with no parameters; extend with [`Self::with_param`].
    pub fn new(tick: Tick, object: impl Into<String>, predicate: impl Into<String>) -> Self {
        Self {
            tick,
            object: object.into(),
            predicate: predicate.into(),
            params: Params::Value(Vec::new()),
        }
    }

    /// A by-reference observation over a live token view.
    pub fn by_reference(
        tick: Tick,
        object: impl Into<String>,
        predicate: impl Into<String>,
        view: Rc<dyn ParameterView>,
    ) -> Self {
        Self {
            tick,
            object: object.into(),
            predicate: predicate.into(),
            params: Params::Reference(view),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, domain: Domain) -> Self {
        match &mut self.params {
            Params::Value(pairs) => pairs.push((name.into(), domain)),
            Params::Reference(_) => {
                panic!("cannot append parameters to a by-reference observation")
            }
        }
        self
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Timeline the predicate is asserted on.
    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    pub fn parameter_count(&self) -> usize {
        match &self.params {
            Params::Value(pairs) => pairs.len(),
            Params::Reference(view) => view.parameter_count(),
        }
    }

    pub fn parameter(&self, index: usize) -> (String, Domain) {
        match &self.params {
            Params::Value(pairs) => pairs[index].clone(),
            Params::Reference(view) => view.parameter(index),
        }
    }

    /// Materialize all parameters, dereferencing a by-reference view.
    pub fn parameters(&self) -> Vec<(String, Domain)> {
        (0..self.parameter_count()).map(|i| self.parameter(i)).collect()
    }

    /// Deep-copy into a by-value observation with independent lifetime.
    pub fn snapshot(&self) -> Self {
        Self {
            tick: self.tick,
            object: self.object.clone(),
            predicate: self.predicate.clone(),
            params: Params::Value(self.parameters()),
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}]ON {} ASSERT {} {{",
            self.tick, self.object, self.predicate
        )?;
        for (name, domain) in self.parameters() {
            write!(f, " {}=={}", name, domain)?;
        }
        write!(f, " }}")
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Sink accepting observations destined for subscribers of a timeline.
///
/// Invoked synchronously by the publishing reactor; the runtime forwards to
/// every reactor that declared the timeline external.
pub trait ObserverSink {
    fn notify(&self, observation: Observation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct TokenStub {
        reads: Cell<u32>,
    }

    impl ParameterView for TokenStub {
        fn parameter_count(&self) -> usize {
            1
        }

        fn parameter(&self, _index: usize) -> (String, Domain) {
            self.reads.set(self.reads.get() + 1);
            ("depth".to_string(), Domain::Float(12.5))
        }
    }

    #[test]
    fn by_value_owns_its_parameters() {
        let obs = Observation::new(3, "nav", "At").with_param("x", Domain::Int(7));
        assert_eq!(obs.parameter_count(), 1);
        assert_eq!(obs.parameter(0), ("x".to_string(), Domain::Int(7)));
        assert_eq!(obs.to_string(), "[3]ON nav ASSERT At { x==7 }");
    }

    #[test]
    fn by_reference_dereferences_at_call_time() {
        let token = Rc::new(TokenStub { reads: Cell::new(0) });
        let obs = Observation::by_reference(5, "ctd", "Sampling", token.clone());
        let _ = obs.parameter(0);
        let _ = obs.parameter(0);
        assert_eq!(token.reads.get(), 2);

        let frozen = obs.snapshot();
        let _ = frozen.parameter(0);
        assert_eq!(token.reads.get(), 3, "snapshot must not read the token again");
    }
}
