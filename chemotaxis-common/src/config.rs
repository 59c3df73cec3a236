use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

// Spatial environment settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EnvironmentConfig {
    /// Range of the Euclidean linking rule.
    pub linking_range: f64,
    /// Bucket size of the spatial grid. Defaults to the linking range.
    #[serde(default)]
    pub grid_cell_size: Option<f64>,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub end_time: f64,
    #[serde(default = "default_max_events")]
    pub max_events: u64,
    pub record_interval: f64,
}

// Configuration for output settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_positions: bool,
    pub save_stats: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Cell,
    Environment,
}

/// A node placed at startup.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct NodeConfig {
    pub kind: NodeKind,
    pub position: [f64; 2],
    /// Physical diameter, only meaningful for cells.
    #[serde(default)]
    pub diameter: f64,
    #[serde(default)]
    pub concentrations: BTreeMap<String, f64>,
}

/// A parameter of an already tokenised action or condition, e.g. `A`, `up`, `false`, `1`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Param {
    Bool(bool),
    Number(f64),
    Token(String),
}

impl Param {
    pub fn as_token(&self) -> Option<&str> {
        match self {
            Param::Token(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Param::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Bool(b) => write!(f, "{}", b),
            Param::Number(n) => write!(f, "{}", n),
            Param::Token(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Token(s.to_string())
    }
}

impl From<f64> for Param {
    fn from(n: f64) -> Self {
        Param::Number(n)
    }
}

impl From<bool> for Param {
    fn from(b: bool) -> Self {
        Param::Bool(b)
    }
}

/// A resolved `Name(param, ...)` entry of a reaction.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CallConfig {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimeDistributionConfig {
    Exponential { rate: f64 },
    DiracComb { rate: f64 },
}

impl Default for TimeDistributionConfig {
    fn default() -> Self {
        TimeDistributionConfig::Exponential { rate: 1.0 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ReactionConfig {
    /// Index into `nodes` of the node the reaction is attached to.
    pub node: usize,
    #[serde(default)]
    pub time_distribution: TimeDistributionConfig,
    #[serde(default)]
    pub conditions: Vec<CallConfig>,
    #[serde(default)]
    pub actions: Vec<CallConfig>,
}

// Main scenario configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ScenarioConfig {
    pub seed: u64,
    pub environment: EnvironmentConfig,
    pub timing: TimingConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub reactions: Vec<ReactionConfig>,
}

fn default_max_events() -> u64 {
    1_000_000
}

impl ScenarioConfig {
    /// Loads the scenario configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a scenario from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: ScenarioConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.environment.linking_range > 0.0) {
            anyhow::bail!("linking_range must be positive.");
        }
        if let Some(size) = self.environment.grid_cell_size {
            if !(size > 0.0) {
                anyhow::bail!("grid_cell_size must be positive.");
            }
        }
        if !(self.timing.end_time >= 0.0) {
            anyhow::bail!("end_time must not be negative.");
        }
        if !(self.timing.record_interval > 0.0) {
            anyhow::bail!("record_interval must be positive.");
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if !node.position.iter().all(|c| c.is_finite()) {
                anyhow::bail!("node {} has a non-finite position.", idx);
            }
            if !(node.diameter >= 0.0) {
                anyhow::bail!("node {} has a negative diameter.", idx);
            }
            if node.kind == NodeKind::Environment && node.diameter != 0.0 {
                anyhow::bail!("node {} is an environment node and cannot have a diameter.", idx);
            }
            if let Some((name, value)) = node.concentrations.iter().find(|(_, v)| !(**v >= 0.0)) {
                anyhow::bail!("node {} has invalid concentration {} for '{}'.", idx, value, name);
            }
        }
        for (idx, reaction) in self.reactions.iter().enumerate() {
            if reaction.node >= self.nodes.len() {
                anyhow::bail!(
                    "reaction {} refers to node {}, but only {} nodes are defined.",
                    idx,
                    reaction.node,
                    self.nodes.len()
                );
            }
        }
        Ok(())
    }

    pub fn grid_cell_size(&self) -> f64 {
        self.environment.grid_cell_size.unwrap_or(self.environment.linking_range)
    }
}
