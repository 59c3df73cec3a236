use chemotaxis_common::{NodeKind, Vec2};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, SimError};
use crate::molecule::Molecule;

/// Handle of a node inside an [`Environment`](crate::environment::Environment).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Non-negative amount of each species held by a node. Absent species read as 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConcentrationStore {
    values: BTreeMap<Molecule, f64>,
}

impl ConcentrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, molecule: &Molecule) -> f64 {
        self.values.get(molecule).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, molecule: &Molecule) -> bool {
        self.get(molecule) > 0.0
    }

    /// Stores `value`, returning the previous entry. Fails without changes when `value` is negative or not finite.
    pub fn set(&mut self, molecule: &Molecule, value: f64) -> Result<Option<f64>> {
        if !(value >= 0.0) || !value.is_finite() {
            return Err(SimError::NegativeConcentration {
                molecule: molecule.to_string(),
                value,
            });
        }
        Ok(self.values.insert(molecule.clone(), value))
    }

    /// Adds `delta` (which may be negative), returning the previous entry.
    pub fn add(&mut self, molecule: &Molecule, delta: f64) -> Result<Option<f64>> {
        let next = self.get(molecule) + delta;
        self.set(molecule, next)
    }

    /// Restores an entry exactly as it was, including absence.
    pub(crate) fn restore(&mut self, molecule: &Molecule, previous: Option<f64>) {
        match previous {
            Some(value) => {
                self.values.insert(molecule.clone(), value);
            }
            None => {
                self.values.remove(molecule);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Molecule, f64)> {
        self.values.iter().map(|(m, v)| (m, *v))
    }
}

/// A cell: owns a polarization versor and has a physical extent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    concentrations: ConcentrationStore,
    diameter: f64,
    polarization: Vec2,
}

impl Cell {
    /// A point-like cell (diameter 0).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_diameter(diameter: f64) -> Result<Self> {
        if !(diameter >= 0.0) || !diameter.is_finite() {
            return Err(SimError::invalid(format!("cell diameter must be non-negative, got {}", diameter)));
        }
        Ok(Cell {
            diameter,
            ..Self::default()
        })
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    /// Unit vector, or zero when no gradient was sensed.
    pub fn polarization(&self) -> Vec2 {
        self.polarization
    }

    /// Replaces the polarization. The stored value is always unit length or zero.
    pub fn set_polarization(&mut self, versor: Vec2) {
        self.polarization = versor.normalize_or_zero();
    }

    /// Sums `versor` onto the current polarization and renormalises.
    pub fn add_polarization(&mut self, versor: Vec2) {
        self.polarization = (self.polarization + versor).normalize_or_zero();
    }
}

/// An extracellular compartment fixed in space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentNode {
    concentrations: ConcentrationStore,
}

impl EnvironmentNode {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Cell(Cell),
    Environment(EnvironmentNode),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Cell(_) => NodeKind::Cell,
            Node::Environment(_) => NodeKind::Environment,
        }
    }

    /// Half the physical extent used by the no-overlap check. Environment nodes are points.
    pub fn radius(&self) -> f64 {
        match self {
            Node::Cell(cell) => cell.diameter / 2.0,
            Node::Environment(_) => 0.0,
        }
    }

    pub fn as_cell(&self) -> Option<&Cell> {
        match self {
            Node::Cell(cell) => Some(cell),
            Node::Environment(_) => None,
        }
    }

    pub fn as_cell_mut(&mut self) -> Option<&mut Cell> {
        match self {
            Node::Cell(cell) => Some(cell),
            Node::Environment(_) => None,
        }
    }

    pub fn concentrations(&self) -> &ConcentrationStore {
        match self {
            Node::Cell(cell) => &cell.concentrations,
            Node::Environment(env) => &env.concentrations,
        }
    }

    pub(crate) fn concentrations_mut(&mut self) -> &mut ConcentrationStore {
        match self {
            Node::Cell(cell) => &mut cell.concentrations,
            Node::Environment(env) => &mut env.concentrations,
        }
    }

    pub fn concentration(&self, molecule: &Molecule) -> f64 {
        self.concentrations().get(molecule)
    }

    pub fn contains(&self, molecule: &Molecule) -> bool {
        self.concentrations().contains(molecule)
    }

    pub fn set_concentration(&mut self, molecule: &Molecule, value: f64) -> Result<()> {
        self.concentrations_mut().set(molecule, value).map(|_| ())
    }

    pub fn add_to_concentration(&mut self, molecule: &Molecule, delta: f64) -> Result<()> {
        self.concentrations_mut().add(molecule, delta).map(|_| ())
    }

    /// Builder-style variant of [`Node::set_concentration`], handy while setting up scenarios.
    pub fn with_concentration(mut self, molecule: &Molecule, value: f64) -> Result<Self> {
        self.set_concentration(molecule, value)?;
        Ok(self)
    }
}

impl From<Cell> for Node {
    fn from(cell: Cell) -> Self {
        Node::Cell(cell)
    }
}

impl From<EnvironmentNode> for Node {
    fn from(node: EnvironmentNode) -> Self {
        Node::Environment(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_species_reads_as_zero() {
        let store = ConcentrationStore::new();
        assert_eq!(store.get(&Molecule::new("A")), 0.0);
        assert!(!store.contains(&Molecule::new("A")));
    }

    #[test]
    fn add_below_zero_is_rejected_and_leaves_value() {
        let a = Molecule::new("A");
        let mut node: Node = EnvironmentNode::new().into();
        node.set_concentration(&a, 2.0).unwrap();
        node.add_to_concentration(&a, -0.5).unwrap();
        assert_eq!(node.concentration(&a), 1.5);

        let err = node.add_to_concentration(&a, -3.0).unwrap_err();
        assert!(matches!(err, SimError::NegativeConcentration { .. }));
        assert_eq!(node.concentration(&a), 1.5);
        assert!(node.set_concentration(&a, f64::NAN).is_err());
    }

    #[test]
    fn restore_brings_back_absence() {
        let a = Molecule::new("A");
        let mut store = ConcentrationStore::new();
        let previous = store.set(&a, 4.0).unwrap();
        assert_eq!(previous, None);
        store.restore(&a, previous);
        assert_eq!(store.iter().count(), 0);
    }

    #[test]
    fn cell_polarization_is_unit_or_zero() {
        let mut cell = Cell::new();
        assert_eq!(cell.polarization(), Vec2::zero());
        cell.set_polarization(Vec2::new(0.0, 3.0));
        assert_eq!(cell.polarization(), Vec2::new(0.0, 1.0));
        cell.add_polarization(Vec2::new(0.0, -1.0));
        assert_eq!(cell.polarization(), Vec2::zero());
    }

    #[test]
    fn radius_is_half_the_diameter_and_zero_for_compartments() {
        let cell: Node = Cell::with_diameter(0.4).unwrap().into();
        assert_eq!(cell.radius(), 0.2);
        assert_eq!(Node::from(EnvironmentNode::new()).radius(), 0.0);
        assert!(Cell::with_diameter(-1.0).is_err());
    }
}
