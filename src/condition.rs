use chemotaxis_common::{NodeKind, Param};

use crate::environment::Environment;
use crate::error::{Result, SimError};
use crate::molecule::Molecule;
use crate::node::NodeId;

/// A guard on a reaction. Each condition also contributes a factor to the reaction's propensity.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The node itself holds at least `threshold` of `molecule`.
    BiomolPresentInCell { molecule: Molecule, threshold: f64 },
    /// The environment nodes linked to the node hold, together, at least `threshold` of `molecule`.
    BiomolPresentInEnv { molecule: Molecule, threshold: f64 },
}

impl Condition {
    /// Builds a condition from its name and tokenised parameters.
    pub fn resolve(name: &str, params: &[Param]) -> Result<Self> {
        let (molecule, threshold) = molecule_and_threshold(name, params)?;
        match name {
            "BiomolPresentInCell" => Ok(Condition::BiomolPresentInCell { molecule, threshold }),
            "BiomolPresentInEnv" => Ok(Condition::BiomolPresentInEnv { molecule, threshold }),
            other => Err(SimError::invalid(format!("unknown condition '{}'", other))),
        }
    }

    fn observed_amount(&self, env: &Environment, node: NodeId) -> Result<f64> {
        match self {
            Condition::BiomolPresentInCell { molecule, .. } => Ok(env.node(node)?.concentration(molecule)),
            Condition::BiomolPresentInEnv { molecule, .. } => {
                let mut total = 0.0;
                for neighbor in env.neighbors(node)? {
                    let n = env.node(neighbor)?;
                    if n.kind() == NodeKind::Environment {
                        total += n.concentration(molecule);
                    }
                }
                Ok(total)
            }
        }
    }

    fn threshold(&self) -> f64 {
        match self {
            Condition::BiomolPresentInCell { threshold, .. } | Condition::BiomolPresentInEnv { threshold, .. } => {
                *threshold
            }
        }
    }

    pub fn is_valid(&self, env: &Environment, node: NodeId) -> Result<bool> {
        Ok(self.observed_amount(env, node)? >= self.threshold())
    }

    /// Factor this condition adds to the propensity: the observed amount when valid, zero otherwise.
    pub fn propensity_contribution(&self, env: &Environment, node: NodeId) -> Result<f64> {
        let amount = self.observed_amount(env, node)?;
        Ok(if amount >= self.threshold() { amount } else { 0.0 })
    }
}

fn molecule_and_threshold(name: &str, params: &[Param]) -> Result<(Molecule, f64)> {
    let shape_error = || {
        SimError::invalid(format!(
            "{} expects (species, [threshold]), got ({})",
            name,
            params.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        ))
    };
    let molecule = match params.first().and_then(Param::as_token) {
        Some(token) => Molecule::new(token),
        None => return Err(shape_error()),
    };
    let threshold = match params.get(1) {
        None => 1.0,
        // A zero threshold would always hold while contributing a zero factor.
        Some(p) => p.as_number().filter(|t| *t > 0.0 && t.is_finite()).ok_or_else(shape_error)?,
    };
    if params.len() > 2 {
        return Err(shape_error());
    }
    Ok((molecule, threshold))
}
