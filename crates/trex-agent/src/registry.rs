//! Reactor factory registry - name to constructor, consulted at assembly.
//!
//! The table is an explicit value: assemblies and test harnesses build
//! their own, so no factory state leaks between agents.

use std::collections::HashMap;

use trex_core::Reactor;

use crate::assembly::AssemblyError;
use crate::config::{AgentConfig, ReactorConfig, SearchPath};
use crate::reactors::{IdleReactor, ScriptedReactor};

/// Everything a factory sees when constructing a reactor.
pub struct FactoryContext<'a> {
    pub agent: &'a AgentConfig,
    pub reactor: &'a ReactorConfig,
    pub search_path: &'a SearchPath,
}

type ReactorCtor = Box<dyn Fn(&FactoryContext<'_>) -> anyhow::Result<Box<dyn Reactor>>>;

/// Name to constructor table for reactor kinds.
#[derive(Default)]
pub struct ReactorRegistry {
    factories: HashMap<String, ReactorCtor>,
}

impl ReactorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under `component`. Registering the same name
    /// twice is a configuration error.
    pub fn register<F>(&mut self, component: &str, ctor: F) -> Result<(), AssemblyError>
    where
        F: Fn(&FactoryContext<'_>) -> anyhow::Result<Box<dyn Reactor>> + 'static,
    {
        if self.factories.contains_key(component) {
            return Err(AssemblyError::DuplicateFactory(component.to_string()));
        }
        self.factories.insert(component.to_string(), Box::new(ctor));
        Ok(())
    }

    pub fn contains(&self, component: &str) -> bool {
        self.factories.contains_key(component)
    }

    /// Construct a reactor for `ctx.reactor.component`; `None` if the
    /// component was never registered.
    pub fn create(&self, ctx: &FactoryContext<'_>) -> Option<anyhow::Result<Box<dyn Reactor>>> {
        self.factories
            .get(&ctx.reactor.component)
            .map(|ctor| ctor(ctx))
    }
}

/// Registry pre-populated with the built-in reactor kinds.
pub fn builtin_registry() -> ReactorRegistry {
    let mut registry = ReactorRegistry::new();
    registry.factories.insert(
        "scripted".to_string(),
        Box::new(|ctx: &FactoryContext<'_>| {
            Ok(Box::new(ScriptedReactor::from_config(ctx)?) as Box<dyn Reactor>)
        }),
    );
    registry.factories.insert(
        "idle".to_string(),
        Box::new(|ctx: &FactoryContext<'_>| {
            Ok(Box::new(IdleReactor::from_config(ctx)?) as Box<dyn Reactor>)
        }),
    );
    registry
}
