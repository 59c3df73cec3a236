//! Side effects a reaction applies to its node.
//!
//! Actions are resolved from a name plus tokenised parameters (see [`Action::resolve`]) and
//! always run through the [`Environment`]'s journaled mutators, so that a failing reaction can
//! be rolled back as a whole.

use chemotaxis_common::{Param, Vec2};
use log::debug;
use std::str::FromStr;

use crate::environment::{Environment, OverlapPolicy};
use crate::error::{Result, SimError};
use crate::molecule::Molecule;
use crate::node::NodeId;

/// Which way along the gradient a cell turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gradient {
    /// Towards higher concentration.
    Up,
    /// Towards lower concentration.
    Down,
}

impl FromStr for Gradient {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "up" => Ok(Gradient::Up),
            "down" => Ok(Gradient::Down),
            other => Err(SimError::invalid(format!("unknown gradient direction '{}', expected up|down", other))),
        }
    }
}

/// Points a cell along the concentration gradient of one species across its neighbors.
#[derive(Debug, Clone, PartialEq)]
pub struct ChemotacticPolarization {
    molecule: Molecule,
    gradient: Gradient,
}

impl ChemotacticPolarization {
    pub fn new(molecule: Molecule, gradient: Gradient) -> Self {
        Self { molecule, gradient }
    }

    /// Direction the cell would take, without storing it.
    pub fn sense(&self, env: &Environment, node: NodeId) -> Result<Vec2> {
        let here = env.position(node)?;
        let mut contributions = Vec::new();
        let mut largest = 0.0f64;
        // Most attractive contributing concentration, and whether some node holding it sits on the cell.
        let mut extreme: Option<(f64, bool)> = None;

        for neighbor in env.neighbors(node)? {
            let concentration = env.node(neighbor)?.concentration(&self.molecule);
            if !(concentration > 0.0) {
                continue;
            }
            let there = env.position(neighbor)?;
            let colocated = there == here;
            extreme = match extreme {
                Some((best, on_cell)) if best == concentration => Some((best, on_cell || colocated)),
                Some((best, _)) if !self.more_attractive(concentration, best) => extreme,
                _ => Some((concentration, colocated)),
            };
            if let Some(direction) = here.direction_to(there) {
                largest = largest.max(concentration);
                contributions.push((direction, concentration));
            }
        }

        if matches!(extreme, Some((_, true))) {
            // Already sitting on the peak (or trough).
            return Ok(Vec2::zero());
        }
        // Weights are taken relative to the largest one so that huge amounts cannot overflow the sum.
        let resultant = contributions
            .into_iter()
            .fold(Vec2::zero(), |acc, (direction, concentration)| acc + direction * (concentration / largest));
        let versor = resultant.normalize_or_zero();
        Ok(match self.gradient {
            Gradient::Up => versor,
            Gradient::Down => -versor,
        })
    }

    fn more_attractive(&self, candidate: f64, best: f64) -> bool {
        match self.gradient {
            Gradient::Up => candidate > best,
            Gradient::Down => candidate < best,
        }
    }

    /// Overwrites the cell's polarization with the sensed direction.
    pub fn execute(&self, env: &mut Environment, node: NodeId) -> Result<()> {
        let versor = self.sense(env, node)?;
        env.set_polarization(node, versor)
    }
}

/// Displaces a cell along its polarization.
#[derive(Debug, Clone, PartialEq)]
pub struct CellMove {
    in_percent: bool,
    delta: f64,
    policy: OverlapPolicy,
}

impl CellMove {
    /// `delta` is an absolute step, or a percentage of the cell diameter when `in_percent` is set.
    pub fn new(in_percent: bool, delta: f64) -> Result<Self> {
        if !delta.is_finite() {
            return Err(SimError::invalid(format!("CellMove step must be finite, got {}", delta)));
        }
        Ok(Self {
            in_percent,
            delta,
            policy: OverlapPolicy::Reject,
        })
    }

    pub fn with_policy(mut self, policy: OverlapPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    fn step(&self, env: &Environment, node: NodeId) -> Result<f64> {
        let cell = env.cell(node)?;
        if !self.in_percent {
            return Ok(self.delta);
        }
        if cell.diameter() > 0.0 {
            Ok(cell.diameter() * self.delta / 100.0)
        } else {
            Err(SimError::invalid(format!(
                "CellMove in percent needs a cell with a positive diameter, {} has none",
                node
            )))
        }
    }

    pub fn execute(&self, env: &mut Environment, node: NodeId) -> Result<()> {
        let polarization = env.cell(node)?.polarization();
        let displacement = polarization * self.step(env, node)?;
        if displacement.is_zero() {
            return Ok(());
        }
        let current = env.position(node)?;
        match self.policy {
            OverlapPolicy::Reject => match env.move_node_to_position(node, current + displacement) {
                Err(SimError::Overlap { other, .. }) => {
                    debug!("{} blocked by {}, staying at {}.", node, other, current);
                    Ok(())
                }
                result => result,
            },
            OverlapPolicy::Truncate => {
                let destination = env.farthest_free_position(node, displacement)?;
                if destination == current {
                    debug!("{} fully blocked, staying at {}.", node, current);
                    return Ok(());
                }
                env.move_node_to_position(node, destination)
            }
        }
    }
}

/// Adds `delta` of a species to the node's own store.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeConcentration {
    molecule: Molecule,
    delta: f64,
}

impl ChangeConcentration {
    pub fn new(molecule: Molecule, delta: f64) -> Self {
        Self { molecule, delta }
    }

    pub fn execute(&self, env: &mut Environment, node: NodeId) -> Result<()> {
        env.add_to_concentration(node, &self.molecule, self.delta)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ChemotacticPolarization(ChemotacticPolarization),
    CellMove(CellMove),
    ChangeConcentration(ChangeConcentration),
}

impl Action {
    /// Builds an action from its name and tokenised parameters:
    ///
    /// * `ChemotacticPolarization(species, up|down)`
    /// * `CellMove(in_percent, delta[, reject|truncate])`
    /// * `ChangeBiomolConcentrationInCell(species, delta)`
    pub fn resolve(name: &str, params: &[Param]) -> Result<Self> {
        let shape_error = |expected: &str| {
            SimError::invalid(format!(
                "{} expects ({}), got ({})",
                name,
                expected,
                params.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            ))
        };
        match name {
            "ChemotacticPolarization" => match params {
                [Param::Token(species), Param::Token(direction)] => Ok(Action::ChemotacticPolarization(
                    ChemotacticPolarization::new(Molecule::new(species), direction.parse()?),
                )),
                _ => Err(shape_error("species, up|down")),
            },
            "CellMove" => match params {
                [Param::Bool(in_percent), Param::Number(delta)] => {
                    Ok(Action::CellMove(CellMove::new(*in_percent, *delta)?))
                }
                [Param::Bool(in_percent), Param::Number(delta), Param::Token(policy)] => Ok(Action::CellMove(
                    CellMove::new(*in_percent, *delta)?.with_policy(policy.parse()?),
                )),
                _ => Err(shape_error("in_percent, delta[, reject|truncate]")),
            },
            "ChangeBiomolConcentrationInCell" => match params {
                [Param::Token(species), Param::Number(delta)] => Ok(Action::ChangeConcentration(
                    ChangeConcentration::new(Molecule::new(species), *delta),
                )),
                _ => Err(shape_error("species, delta")),
            },
            other => Err(SimError::invalid(format!("unknown action '{}'", other))),
        }
    }

    /// Checks that this action can run on `node` at all.
    pub fn validate(&self, env: &Environment, node: NodeId) -> Result<()> {
        match self {
            Action::ChemotacticPolarization(_) => env.cell(node).map(|_| ()),
            Action::CellMove(action) => action.step(env, node).map(|_| ()),
            Action::ChangeConcentration(_) => env.node(node).map(|_| ()),
        }
    }

    pub fn execute(&self, env: &mut Environment, node: NodeId) -> Result<()> {
        match self {
            Action::ChemotacticPolarization(action) => action.execute(env, node),
            Action::CellMove(action) => action.execute(env, node),
            Action::ChangeConcentration(action) => action.execute(env, node),
        }
    }
}
