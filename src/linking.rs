use std::fmt;

use crate::environment::Environment;
use crate::error::{Result, SimError};
use crate::node::NodeId;

/// Decides which nodes are neighbors. Neighborhoods are derived on demand, never stored.
pub trait LinkingRule: fmt::Debug {
    /// Neighbors of `center`, excluding `center` itself.
    fn compute_neighborhood(&self, center: NodeId, environment: &Environment) -> Result<Vec<NodeId>>;

    /// Largest distance at which this rule can link two nodes, if bounded. Used to size the spatial grid.
    fn max_range(&self) -> Option<f64> {
        None
    }
}

/// Links every pair of nodes at most `range` apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EuclideanDistance {
    range: f64,
}

impl EuclideanDistance {
    pub fn new(range: f64) -> Result<Self> {
        if !(range >= 0.0) || !range.is_finite() {
            return Err(SimError::invalid(format!("linking range must be a finite non-negative number, got {}", range)));
        }
        Ok(Self { range })
    }

    pub fn range(&self) -> f64 {
        self.range
    }
}

impl LinkingRule for EuclideanDistance {
    fn compute_neighborhood(&self, center: NodeId, environment: &Environment) -> Result<Vec<NodeId>> {
        let position = environment.position(center)?;
        Ok(environment.nodes_within(position, self.range, Some(center)))
    }

    fn max_range(&self) -> Option<f64> {
        Some(self.range)
    }
}

/// Isolates every node.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLinks;

impl LinkingRule for NoLinks {
    fn compute_neighborhood(&self, center: NodeId, environment: &Environment) -> Result<Vec<NodeId>> {
        environment.position(center)?;
        Ok(Vec::new())
    }
}
