use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::NodeKind;

/// State of one node at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Arena index of the node inside the environment.
    pub id: usize,
    pub kind: NodeKind,
    pub position: (f64, f64),
    /// Polarization of cells; `None` for environment nodes.
    pub polarization: Option<(f64, f64)>,
    pub concentrations: BTreeMap<String, f64>,
}

/// A snapshot of the simulation state at a specific time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The simulation time at which the snapshot was taken.
    pub time: f64,
    /// Number of reaction executions so far.
    pub events_executed: u64,
    /// Mean number of linked neighbors per node.
    pub mean_neighbor_count: f64,
    pub nodes: Vec<NodeSnapshot>,
}

impl Snapshot {
    /// Total amount of `species` over all nodes.
    pub fn total_concentration(&self, species: &str) -> f64 {
        self.nodes
            .iter()
            .filter_map(|n| n.concentrations.get(species))
            .sum()
    }
}
