//! Built-in reactor kinds.
//!
//! `scripted` plays back a configured timetable of observations on its
//! internal timelines; `idle` declares timelines and does nothing. Both are
//! registered in [`crate::builtin_registry`] and double as the reference
//! implementations of the reactor contract.

use std::rc::Rc;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use trex_core::{
    Domain, InitContext, Observation, ObserverSink, Reactor, Tick, TimelineModes,
};

use crate::registry::FactoryContext;

/// One timetable entry: publish `predicate` on `timeline` at `tick`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub tick: Tick,
    pub timeline: String,
    pub predicate: String,
    #[serde(default)]
    pub params: Vec<(String, Domain)>,
}

#[derive(Debug, Default, Deserialize)]
struct ScriptedParams {
    #[serde(default)]
    internals: Vec<String>,
    #[serde(default)]
    externals: Vec<String>,
    #[serde(default)]
    script: Vec<ScriptEntry>,
    /// Additional timetable loaded through the search path.
    #[serde(default)]
    script_file: Option<String>,
}

/// Plays back a timetable of observations during `synchronize`.
pub struct ScriptedReactor {
    name: String,
    latency: Tick,
    look_ahead: Tick,
    modes: TimelineModes,
    script: Vec<ScriptEntry>,
    sink: Option<Rc<dyn ObserverSink>>,
    inbox: Vec<Observation>,
    received: Vec<Observation>,
}

impl ScriptedReactor {
    pub fn from_config(ctx: &FactoryContext<'_>) -> anyhow::Result<Self> {
        let mut params: ScriptedParams = if ctx.reactor.params.is_null() {
            ScriptedParams::default()
        } else {
            serde_json::from_value(ctx.reactor.params.clone())
                .with_context(|| format!("bad params for scripted reactor '{}'", ctx.reactor.name))?
        };

        if let Some(file) = params.script_file.take() {
            let path = ctx
                .search_path
                .find_file(&file)
                .ok_or_else(|| anyhow!("script file '{}' not found on the search path", file))?;
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read script {}", path.display()))?;
            let mut entries: Vec<ScriptEntry> = serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse script {}", path.display()))?;
            params.script.append(&mut entries);
        }

        for entry in &params.script {
            if !params.internals.iter().any(|t| t == &entry.timeline) {
                return Err(anyhow!(
                    "script entry targets '{}', which '{}' does not own",
                    entry.timeline,
                    ctx.reactor.name
                ));
            }
        }
        params.script.sort_by_key(|entry| entry.tick);

        Ok(Self {
            name: ctx.reactor.name.clone(),
            latency: ctx.reactor.latency,
            look_ahead: ctx.reactor.look_ahead_or(ctx.agent.final_tick),
            modes: TimelineModes {
                internals: params.internals,
                externals: params.externals,
                ignores: Vec::new(),
            },
            script: params.script,
            sink: None,
            inbox: Vec::new(),
            received: Vec::new(),
        })
    }

    /// Observations consumed from external timelines so far.
    pub fn received(&self) -> &[Observation] {
        &self.received
    }
}

impl Reactor for ScriptedReactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn latency(&self) -> Tick {
        self.latency
    }

    fn look_ahead(&self) -> Tick {
        self.look_ahead
    }

    fn timeline_modes(&self) -> TimelineModes {
        self.modes.clone()
    }

    fn handle_init(&mut self, init: InitContext) {
        self.sink = Some(init.observer_sink);
    }

    fn synchronize(&mut self, tick: Tick) -> bool {
        self.received.append(&mut self.inbox);

        let Some(sink) = &self.sink else {
            return false;
        };
        for entry in self.script.iter().filter(|entry| entry.tick == tick) {
            let mut observation = Observation::new(tick, &entry.timeline, &entry.predicate);
            for (name, domain) in &entry.params {
                observation = observation.with_param(name.clone(), domain.clone());
            }
            sink.notify(observation);
        }
        true
    }

    fn notify(&mut self, observation: Observation) {
        self.inbox.push(observation);
    }
}

#[derive(Debug, Default, Deserialize)]
struct IdleParams {
    #[serde(default)]
    internals: Vec<String>,
    #[serde(default)]
    externals: Vec<String>,
    #[serde(default)]
    ignores: Vec<String>,
}

/// Declares timelines and never publishes; a topology stub.
pub struct IdleReactor {
    name: String,
    latency: Tick,
    look_ahead: Tick,
    modes: TimelineModes,
}

impl IdleReactor {
    pub fn from_config(ctx: &FactoryContext<'_>) -> anyhow::Result<Self> {
        let params: IdleParams = if ctx.reactor.params.is_null() {
            IdleParams::default()
        } else {
            serde_json::from_value(ctx.reactor.params.clone())
                .with_context(|| format!("bad params for idle reactor '{}'", ctx.reactor.name))?
        };

        Ok(Self {
            name: ctx.reactor.name.clone(),
            latency: ctx.reactor.latency,
            look_ahead: ctx.reactor.look_ahead_or(ctx.agent.final_tick),
            modes: TimelineModes {
                internals: params.internals,
                externals: params.externals,
                ignores: params.ignores,
            },
        })
    }
}

impl Reactor for IdleReactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn latency(&self) -> Tick {
        self.latency
    }

    fn look_ahead(&self) -> Tick {
        self.look_ahead
    }

    fn timeline_modes(&self) -> TimelineModes {
        self.modes.clone()
    }

    fn synchronize(&mut self, _tick: Tick) -> bool {
        true
    }
}
