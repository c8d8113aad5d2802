//! Assembly: validate a configuration and wire an [`Agent`] from it.
//!
//! No ticks run unless every check passes: reactor names are unique, every
//! internal timeline has exactly one owner, every external resolves to an
//! owner, latency never exceeds look-ahead, and the timeline graph is
//! acyclic.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info};
use trex_core::{Clock, Reactor, Tick};

use crate::agent::Agent;
use crate::config::AgentConfig;
use crate::dispatch::DispatchHub;
use crate::observability::EventSink;
use crate::registry::{FactoryContext, ReactorRegistry};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("duplicate reactor name '{0}'")]
    DuplicateReactor(String),

    #[error("unknown component '{component}' for reactor '{reactor}'")]
    UnknownComponent { reactor: String, component: String },

    #[error("failed to construct reactor '{reactor}': {source}")]
    Construction {
        reactor: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("timeline '{timeline}' declared internal by both '{first}' and '{second}'")]
    DuplicateInternal {
        timeline: String,
        first: String,
        second: String,
    },

    #[error("external timeline '{timeline}' of reactor '{reactor}' has no owner")]
    UnclaimedExternal { timeline: String, reactor: String },

    #[error("latency {latency} exceeds look-ahead {look_ahead} in reactor '{reactor}'")]
    LatencyExceedsLookAhead {
        reactor: String,
        latency: Tick,
        look_ahead: Tick,
    },

    #[error("priority cycle among reactors: {}", .cycle.join(" -> "))]
    PriorityCycle { cycle: Vec<String> },

    #[error("duplicate factory registration for component '{0}'")]
    DuplicateFactory(String),
}

/// Builds agents from configuration against a factory registry.
pub struct Assembly {
    registry: ReactorRegistry,
}

impl Assembly {
    pub fn new(registry: ReactorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ReactorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ReactorRegistry {
        &mut self.registry
    }

    /// Instantiate, validate, and wire every reactor of `config`.
    pub fn assemble(
        &self,
        config: &AgentConfig,
        clock: Box<dyn Clock>,
        log: Box<dyn EventSink>,
    ) -> Result<Agent, AssemblyError> {
        let search_path = config.search_path();

        // Instantiate reactors in configuration order.
        let mut names: Vec<String> = Vec::with_capacity(config.reactors.len());
        let mut reactors: Vec<Box<dyn Reactor>> = Vec::with_capacity(config.reactors.len());
        let mut log_enabled: Vec<bool> = Vec::with_capacity(config.reactors.len());
        for reactor_cfg in &config.reactors {
            if names.iter().any(|n| n == &reactor_cfg.name) {
                return Err(AssemblyError::DuplicateReactor(reactor_cfg.name.clone()));
            }

            let ctx = FactoryContext {
                agent: config,
                reactor: reactor_cfg,
                search_path: &search_path,
            };
            let reactor = match self.registry.create(&ctx) {
                None => {
                    return Err(AssemblyError::UnknownComponent {
                        reactor: reactor_cfg.name.clone(),
                        component: reactor_cfg.component.clone(),
                    })
                }
                Some(Err(source)) => {
                    return Err(AssemblyError::Construction {
                        reactor: reactor_cfg.name.clone(),
                        source,
                    })
                }
                Some(Ok(reactor)) => reactor,
            };

            if reactor.latency() > reactor.look_ahead() {
                return Err(AssemblyError::LatencyExceedsLookAhead {
                    reactor: reactor_cfg.name.clone(),
                    latency: reactor.latency(),
                    look_ahead: reactor.look_ahead(),
                });
            }

            debug!(reactor = %reactor_cfg.name, component = %reactor_cfg.component, "constructed");
            names.push(reactor_cfg.name.clone());
            log_enabled.push(reactor_cfg.log);
            reactors.push(reactor);
        }

        // Ownership map: every internal timeline has exactly one owner.
        let modes: Vec<_> = reactors.iter().map(|r| r.timeline_modes()).collect();
        let mut owner_of: HashMap<String, usize> = HashMap::new();
        for (idx, declared) in modes.iter().enumerate() {
            for timeline in &declared.internals {
                if let Some(&first) = owner_of.get(timeline) {
                    return Err(AssemblyError::DuplicateInternal {
                        timeline: timeline.clone(),
                        first: names[first].clone(),
                        second: names[idx].clone(),
                    });
                }
                owner_of.insert(timeline.clone(), idx);
            }
        }

        // Every external resolves to some owner; collect the reactor-level
        // dependency edges while we are at it.
        let mut deps: Vec<Vec<usize>> = vec![Vec::new(); reactors.len()];
        for (idx, declared) in modes.iter().enumerate() {
            for timeline in &declared.externals {
                match owner_of.get(timeline) {
                    Some(&owner) => {
                        if !deps[idx].contains(&owner) {
                            deps[idx].push(owner);
                        }
                    }
                    None => {
                        return Err(AssemblyError::UnclaimedExternal {
                            timeline: timeline.clone(),
                            reactor: names[idx].clone(),
                        })
                    }
                }
            }
        }

        let priorities = compute_priorities(&names, &deps)?;

        // Subscribers per timeline, priority ascending. A reactor listing
        // the same external twice still subscribes once.
        let mut subscribers: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, declared) in modes.iter().enumerate() {
            for timeline in &declared.externals {
                let subs = subscribers.entry(timeline.clone()).or_default();
                if !subs.contains(&idx) {
                    subs.push(idx);
                }
            }
        }
        for subs in subscribers.values_mut() {
            subs.sort_by_key(|&idx| (priorities[idx], idx));
        }

        // Producers before consumers.
        let mut schedule: Vec<usize> = (0..reactors.len()).collect();
        schedule.sort_by_key(|&idx| (priorities[idx], idx));

        let hub = Rc::new(DispatchHub {
            names: names.clone(),
            cells: reactors.into_iter().map(RefCell::new).collect(),
            owner_of,
            subscribers,
            current_tick: Cell::new(0),
            log: RefCell::new(log),
        });

        info!(
            agent = %config.name,
            reactors = names.len(),
            final_tick = config.final_tick,
            "assembled"
        );

        Ok(Agent::from_parts(
            config.name.clone(),
            clock,
            hub,
            schedule,
            priorities,
            log_enabled,
            config.final_tick,
        ))
    }
}

/// Iterative priority layering over the externals graph: `0` for reactors
/// with no externals, otherwise one more than the highest-priority owner
/// they observe. Stalling means a cycle; it is reported with the reactor
/// names on it.
fn compute_priorities(names: &[String], deps: &[Vec<usize>]) -> Result<Vec<u64>, AssemblyError> {
    let n = names.len();
    let mut priorities: Vec<Option<u64>> = vec![None; n];
    let mut remaining = n;

    while remaining > 0 {
        let mut progressed = false;
        for idx in 0..n {
            if priorities[idx].is_some() {
                continue;
            }
            let mut ready = true;
            let mut highest: Option<u64> = None;
            for &dep in &deps[idx] {
                match priorities[dep] {
                    Some(p) => highest = Some(highest.map_or(p, |h| h.max(p))),
                    None => {
                        ready = false;
                        break;
                    }
                }
            }
            if ready {
                priorities[idx] = Some(highest.map_or(0, |h| h + 1));
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            return Err(AssemblyError::PriorityCycle {
                cycle: extract_cycle(names, deps, &priorities),
            });
        }
    }

    Ok(priorities.into_iter().map(|p| p.unwrap_or(0)).collect())
}

/// Walk unresolved dependency edges until a reactor repeats; the repeated
/// segment is the cycle.
fn extract_cycle(names: &[String], deps: &[Vec<usize>], priorities: &[Option<u64>]) -> Vec<String> {
    let start = match priorities.iter().position(|p| p.is_none()) {
        Some(idx) => idx,
        None => return Vec::new(),
    };

    let mut path: Vec<usize> = vec![start];
    let mut current = start;
    loop {
        let next = deps[current]
            .iter()
            .copied()
            .find(|&d| priorities[d].is_none());
        let Some(next) = next else {
            return path.iter().map(|&idx| names[idx].clone()).collect();
        };
        if let Some(pos) = path.iter().position(|&idx| idx == next) {
            return path[pos..].iter().map(|&idx| names[idx].clone()).collect();
        }
        path.push(next);
        current = next;
    }
}
