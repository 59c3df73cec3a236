pub mod config;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{
    CallConfig, EnvironmentConfig, NodeConfig, NodeKind, OutputConfig, Param, ReactionConfig, ScenarioConfig,
    TimeDistributionConfig, TimingConfig,
};
pub use snapshot::{NodeSnapshot, Snapshot};
pub use vecmath::{Position, Vec2};
