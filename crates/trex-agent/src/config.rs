//! Agent configuration loading and the include-path facility.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use trex_core::Tick;

/// Top-level agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent name, used in logs and event records.
    pub name: String,

    /// Last tick the agent executes; the run ends after it completes.
    pub final_tick: Tick,

    /// Include-path specification for component files; entries separated
    /// by `;` or `:`.
    pub search_path: Option<String>,

    /// Reactor declarations, in configuration order.
    pub reactors: Vec<ReactorConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "agent".to_string(),
            final_tick: 0,
            search_path: None,
            reactors: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn new(name: impl Into<String>, final_tick: Tick) -> Self {
        Self {
            name: name.into(),
            final_tick,
            ..Self::default()
        }
    }

    pub fn with_reactor(mut self, reactor: ReactorConfig) -> Self {
        self.reactors.push(reactor);
        self
    }

    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        Ok(config)
    }

    /// The search path for this agent, folding in the `TREX_PATH`
    /// environment variable.
    pub fn search_path(&self) -> SearchPath {
        let mut search = match &self.search_path {
            Some(spec) => SearchPath::from_spec(spec),
            None => SearchPath::default(),
        };
        if let Ok(spec) = std::env::var("TREX_PATH") {
            search.extend_from_spec(&spec);
        }
        search
    }
}

/// One reactor declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactorConfig {
    /// Unique within the agent.
    pub name: String,

    /// Factory key selecting the reactor kind.
    pub component: String,

    /// Ticks this reactor needs to respond to a newly posted goal.
    #[serde(default)]
    pub latency: Tick,

    /// Ticks ahead the reactor is willing to commit. Omitted means
    /// "to the end of the agent run".
    #[serde(default)]
    pub look_ahead: Option<Tick>,

    /// Whether per-tick usage rows are journaled for this reactor.
    #[serde(default)]
    pub log: bool,

    /// Free-form parameters consumed by the component factory.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl ReactorConfig {
    pub fn new(name: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component: component.into(),
            latency: 0,
            look_ahead: None,
            log: false,
            params: serde_json::Value::Null,
        }
    }

    pub fn with_latency(mut self, latency: Tick) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_look_ahead(mut self, look_ahead: Tick) -> Self {
        self.look_ahead = Some(look_ahead);
        self
    }

    pub fn with_log(mut self) -> Self {
        self.log = true;
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Effective look-ahead, defaulting to the agent's final tick.
    pub fn look_ahead_or(&self, final_tick: Tick) -> Tick {
        self.look_ahead.unwrap_or(final_tick)
    }
}

/// Ordered list of directories consulted when a component references an
/// external file. Path entries may be separated by `;` or `:`; both are
/// normalized to `:`.
#[derive(Debug, Clone, Default)]
pub struct SearchPath {
    entries: Vec<PathBuf>,
}

impl SearchPath {
    pub fn from_spec(spec: &str) -> Self {
        let mut search = Self::default();
        search.extend_from_spec(spec);
        search
    }

    pub fn extend_from_spec(&mut self, spec: &str) {
        for entry in Self::normalize(spec).split(':') {
            if !entry.is_empty() {
                self.entries.push(PathBuf::from(entry));
            }
        }
    }

    /// Rewrite `;` separators to `:`.
    pub fn normalize(spec: &str) -> String {
        spec.replace(';', ":")
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Resolve `name` against the working directory, then each entry in
    /// order.
    pub fn find_file(&self, name: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(name);
        if direct.is_file() {
            return Some(direct);
        }
        self.entries
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semicolons_normalize_to_colons() {
        let search = SearchPath::from_spec("/a/b;/c/d:/e");
        let entries: Vec<_> = search
            .entries()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        assert_eq!(entries, vec!["/a/b", "/c/d", "/e"]);
    }

    #[test]
    fn look_ahead_defaults_to_final_tick() {
        let cfg = ReactorConfig::new("nav", "idle");
        assert_eq!(cfg.look_ahead_or(250), 250);
        assert_eq!(cfg.with_look_ahead(5).look_ahead_or(250), 5);
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let config = AgentConfig::new("auv", 100).with_reactor(
            ReactorConfig::new("exec", "scripted")
                .with_latency(1)
                .with_look_ahead(10),
        );
        let text = serde_yaml::to_string(&config).expect("serialize");
        let back: AgentConfig = serde_yaml::from_str(&text).expect("parse");
        assert_eq!(back.name, "auv");
        assert_eq!(back.final_tick, 100);
        assert_eq!(back.reactors.len(), 1);
        assert_eq!(back.reactors[0].look_ahead, Some(10));
    }
}
