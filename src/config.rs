//! Configuration loading (spec §6 "Configuration format").
//!
//! The on-wire format is UCL upstream; this crate consumes an equivalent
//! nested TOML document instead, loaded the same way a manifest would be:
//! `toml::from_str` into a `Deserialize` struct, with a trait-abstracted
//! source so the filesystem isn't hardwired into the parser.

use crate::accumulator::{Accumulator, GroupMeta};
use crate::actions::Action;
use crate::composite::Policy;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{path}': {source}")]
    Io { path: String, source: std::io::Error },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Per-symbol config overlay (spec §6: `symbols { <name> = { score,
/// description, group, flags, one_shot, priority } }`). The symbol's *type*
/// is not configuration data — callbacks are registered in code, and this
/// struct only overlays tunables onto an already-registered name.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SymbolConfig {
    pub score: Option<f64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub one_shot: bool,
    #[serde(default)]
    pub priority: i32,
}

/// A composite definition (spec §6: `composites { <name> = { expression,
/// score, policy, group } }`).
#[derive(Debug, Clone, Deserialize)]
pub struct CompositeConfig {
    pub expression: String,
    pub score: f64,
    pub policy: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

/// A symbol-group's score-cap metadata (spec §6: `group { <name> = {
/// max_score, min_score } }`).
#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct GroupConfig {
    pub max_score: Option<f64>,
    pub min_score: Option<f64>,
}

/// The root configuration document (spec §6).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub symbols: HashMap<String, SymbolConfig>,
    #[serde(default)]
    pub composites: HashMap<String, CompositeConfig>,
    #[serde(default)]
    pub actions: HashMap<String, f64>,
    #[serde(default)]
    pub group: HashMap<String, GroupConfig>,
    #[serde(default)]
    pub grow_factor: Option<f64>,
    #[serde(default)]
    pub allow_unknown: bool,
    #[serde(default)]
    pub unknown_weight: f64,
}

impl Config {
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply the `group`/`actions`/`grow_factor` sections to a fresh
    /// per-task accumulator (spec §3 "Lifecycles": per-task state is built
    /// from the frozen, shared configuration).
    pub fn configure_accumulator(&self, accumulator: &mut Accumulator) {
        accumulator.grow_factor = self.grow_factor;
        accumulator.allow_unknown = self.allow_unknown;
        accumulator.unknown_weight = self.unknown_weight;
        for (name, group) in &self.group {
            accumulator.set_group(
                name.clone(),
                GroupMeta {
                    max_score: group.max_score,
                    min_score: group.min_score,
                },
            );
        }
        for (name, threshold) in &self.actions {
            if let Some(action) = Action::parse(name) {
                accumulator.action_map.set(action, *threshold);
            } else {
                tracing::warn!(action = name.as_str(), "unknown action name in config, ignoring");
            }
        }
    }

    /// Composite definitions with an unparseable `policy` name dropped
    /// (logged); expression parse failures are caught later by
    /// [`crate::composite::CompositeRegistry::register`].
    pub fn composite_defs(&self) -> Vec<(&str, &CompositeConfig, Policy)> {
        self.composites
            .iter()
            .filter_map(|(name, def)| match Policy::parse(&def.policy) {
                Some(policy) => Some((name.as_str(), def, policy)),
                None => {
                    tracing::warn!(composite = name.as_str(), policy = def.policy.as_str(), "unknown policy, dropping composite");
                    None
                }
            })
            .collect()
    }
}

/// Where a [`Config`] document is read from, abstracted so tests and
/// hot-reload paths don't need to hit the filesystem directly.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<String, ConfigError>;
}

/// Reads the config document from a file on disk.
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<String, ConfigError> {
        fs::read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }
}

pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    Config::from_str(&source.load()?)
}
