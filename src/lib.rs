//! Discrete-event engine for spatial biochemistry: cells and extracellular compartments carry
//! species concentrations, cells polarize along concentration gradients of their neighborhood
//! and move without ever overlapping each other.

pub mod action;
pub mod condition;
pub mod environment;
pub mod error;
pub mod grid;
pub mod linking;
pub mod molecule;
pub mod node;
pub mod reaction;
pub mod simulation;
pub mod time_distribution;

pub use action::{Action, CellMove, ChangeConcentration, ChemotacticPolarization, Gradient};
pub use chemotaxis_common::{Param, Position, Vec2};
pub use condition::Condition;
pub use environment::{Environment, OverlapPolicy};
pub use error::{Result, SimError};
pub use linking::{EuclideanDistance, LinkingRule, NoLinks};
pub use molecule::Molecule;
pub use node::{Cell, ConcentrationStore, EnvironmentNode, Node, NodeId};
pub use reaction::Reaction;
pub use simulation::Simulation;
pub use time_distribution::{DiracComb, ExponentialTime, Time, TimeDistribution};
