use chemotaxis_common::{Position, Vec2};
use log::{debug, trace};
use std::str::FromStr;

use crate::error::{Result, SimError};
use crate::grid::SpatialGrid;
use crate::linking::LinkingRule;
use crate::molecule::Molecule;
use crate::node::{Cell, Node, NodeId};

/// What a mover does when the requested destination would overlap another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Stay at the current position.
    #[default]
    Reject,
    /// Advance along the displacement up to the first contact.
    Truncate,
}

impl FromStr for OverlapPolicy {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reject" => Ok(OverlapPolicy::Reject),
            "truncate" => Ok(OverlapPolicy::Truncate),
            other => Err(SimError::invalid(format!("unknown overlap policy '{}', expected reject|truncate", other))),
        }
    }
}

/// Attempts made to back off from a computed contact point that still overlaps after rounding.
const TRUNCATE_BACKOFF_ATTEMPTS: usize = 8;

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    position: Position,
}

/// Inverse of one mutation performed while a transaction is open.
#[derive(Debug, Clone)]
enum Undo {
    Concentration {
        node: NodeId,
        molecule: Molecule,
        previous: Option<f64>,
    },
    Polarization { node: NodeId, previous: Vec2 },
    Position { node: NodeId, previous: Position },
}

/// Owns every node together with its position, and keeps them free of overlaps.
#[derive(Debug)]
pub struct Environment {
    slots: Vec<Option<Slot>>,
    grid: SpatialGrid,
    linking_rule: Box<dyn LinkingRule>,
    /// Largest radius ever placed; bounds the overlap search.
    max_radius: f64,
    journal: Option<Vec<Undo>>,
}

fn overlaps(a: Position, a_radius: f64, b: Position, b_radius: f64) -> bool {
    let reach = a_radius + b_radius;
    reach > 0.0 && a.distance_squared(b) < reach * reach
}

impl Environment {
    /// Creates an empty environment whose grid buckets match the rule's range.
    pub fn new(linking_rule: impl LinkingRule + 'static) -> Self {
        let cell_size = linking_rule.max_range().filter(|r| *r > 0.0).unwrap_or(1.0);
        Self::with_grid_cell_size(linking_rule, cell_size)
    }

    pub fn with_grid_cell_size(linking_rule: impl LinkingRule + 'static, cell_size: f64) -> Self {
        Self {
            slots: Vec::new(),
            grid: SpatialGrid::new(cell_size),
            linking_rule: Box::new(linking_rule),
            max_radius: 0.0,
            journal: None,
        }
    }

    fn slot(&self, id: NodeId) -> Result<&Slot> {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(SimError::UnknownNode(id))
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut Slot> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(SimError::UnknownNode(id))
    }

    /// Places `node` at `position`. Nothing is committed if the placement would overlap.
    pub fn add_node(&mut self, node: impl Into<Node>, position: Position) -> Result<NodeId> {
        let node = node.into();
        if !position.is_finite() {
            return Err(SimError::invalid(format!("position {} is not finite", position)));
        }
        let id = NodeId(self.slots.len());
        let radius = node.radius();
        if let Some(other) = self.find_overlap(None, position, radius) {
            return Err(SimError::Overlap { node: id, position, other });
        }
        self.grid.insert(id, position);
        self.max_radius = self.max_radius.max(radius);
        self.slots.push(Some(Slot { node, position }));
        trace!("Placed {} at {}.", id, position);
        Ok(id)
    }

    /// Removes a node; its id becomes unknown from now on.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let slot = self
            .slots
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(SimError::UnknownNode(id))?;
        self.grid.remove(id, slot.position);
        Ok(slot.node)
    }

    pub fn node_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node, Position)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|s| (NodeId(idx), &s.node, s.position)))
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.slot(id).map(|s| &s.node)
    }

    /// Direct mutable access, bypassing transactions. Meant for scenario setup.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.slot_mut(id).map(|s| &mut s.node)
    }

    pub fn cell(&self, id: NodeId) -> Result<&Cell> {
        self.node(id)?.as_cell().ok_or(SimError::NotACell(id))
    }

    pub fn position(&self, id: NodeId) -> Result<Position> {
        self.slot(id).map(|s| s.position)
    }

    /// Neighbors of `id` under the linking rule, sorted by id.
    pub fn neighbors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut neighbors = self.linking_rule.compute_neighborhood(id, self)?;
        neighbors.retain(|n| *n != id);
        neighbors.sort_unstable();
        neighbors.dedup();
        Ok(neighbors)
    }

    /// Nodes at distance `<= range` from `position`, sorted by id.
    pub fn nodes_within(&self, position: Position, range: f64, exclude: Option<NodeId>) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.grid.for_each_candidate(exclude, position, range, |id| {
            if let Some(slot) = self.slots.get(id.0).and_then(Option::as_ref) {
                if slot.position.distance(position) <= range {
                    found.push(id);
                }
            } else {
                log::error!("Grid references {} which is not in the environment.", id);
            }
            true
        });
        found.sort_unstable();
        found
    }

    /// Lowest-id node that a body of `radius` at `position` would overlap, ignoring `exclude`.
    pub fn find_overlap(&self, exclude: Option<NodeId>, position: Position, radius: f64) -> Option<NodeId> {
        let reach = radius + self.max_radius;
        if reach <= 0.0 {
            return None;
        }
        let mut hit: Option<NodeId> = None;
        self.grid.for_each_candidate(exclude, position, reach, |id| {
            if let Some(slot) = self.slots.get(id.0).and_then(Option::as_ref) {
                if overlaps(position, radius, slot.position, slot.node.radius()) {
                    hit = Some(hit.map_or(id, |h| h.min(id)));
                }
            }
            true
        });
        hit
    }

    /// Moves `id` to `position`. On overlap the node stays where it was.
    pub fn move_node_to_position(&mut self, id: NodeId, position: Position) -> Result<()> {
        let slot = self.slot(id)?;
        let previous = slot.position;
        if !position.is_finite() {
            return Err(SimError::invalid(format!("position {} is not finite", position)));
        }
        if let Some(other) = self.find_overlap(Some(id), position, slot.node.radius()) {
            return Err(SimError::Overlap { node: id, position, other });
        }
        self.relocate(id, previous, position);
        if let Some(journal) = self.journal.as_mut() {
            journal.push(Undo::Position { node: id, previous });
        }
        Ok(())
    }

    fn relocate(&mut self, id: NodeId, from: Position, to: Position) {
        self.grid.relocate(id, from, to);
        if let Some(Some(slot)) = self.slots.get_mut(id.0) {
            slot.position = to;
        }
    }

    /// Farthest point along `displacement` that `id` can reach without overlapping anything.
    /// Returns the current position when even a partial move is blocked.
    pub fn farthest_free_position(&self, id: NodeId, displacement: Vec2) -> Result<Position> {
        let slot = self.slot(id)?;
        let start = slot.position;
        let radius = slot.node.radius();
        let target = start + displacement;
        if self.find_overlap(Some(id), target, radius).is_none() {
            return Ok(target);
        }
        let a = displacement.length_squared();
        if a == 0.0 {
            return Ok(start);
        }

        // First contact along the segment: smallest t with |start + t*d - q| = r_sum.
        let mut t_contact = 1.0f64;
        for (other, node, position) in self.iter() {
            let reach = radius + node.radius();
            if other == id || reach <= 0.0 {
                continue;
            }
            let rel = start - position;
            let b = 2.0 * rel.dot(displacement);
            let c = rel.length_squared() - reach * reach;
            let disc = b * b - 4.0 * a * c;
            // Only obstacles the path actually closes in on can stop it.
            if c < 0.0 || disc < 0.0 || b >= 0.0 {
                continue;
            }
            let t = (-b - disc.sqrt()) / (2.0 * a);
            if t >= 0.0 && t < t_contact {
                t_contact = t;
            }
        }

        let mut t = t_contact;
        let mut step = (t_contact * 1e-12).max(f64::EPSILON);
        for _ in 0..TRUNCATE_BACKOFF_ATTEMPTS {
            if t <= 0.0 {
                break;
            }
            let candidate = start + displacement * t;
            if self.find_overlap(Some(id), candidate, radius).is_none() {
                return Ok(candidate);
            }
            t -= step;
            step *= 10.0;
        }
        debug!("{} cannot advance along {} at all.", id, displacement);
        Ok(start)
    }

    /// Journaled equivalent of [`Node::set_concentration`].
    pub fn set_concentration(&mut self, id: NodeId, molecule: &Molecule, value: f64) -> Result<()> {
        let previous = self.slot_mut(id)?.node.concentrations_mut().set(molecule, value)?;
        self.record_concentration(id, molecule, previous);
        Ok(())
    }

    /// Journaled equivalent of [`Node::add_to_concentration`].
    pub fn add_to_concentration(&mut self, id: NodeId, molecule: &Molecule, delta: f64) -> Result<()> {
        let previous = self.slot_mut(id)?.node.concentrations_mut().add(molecule, delta)?;
        self.record_concentration(id, molecule, previous);
        Ok(())
    }

    fn record_concentration(&mut self, id: NodeId, molecule: &Molecule, previous: Option<f64>) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(Undo::Concentration {
                node: id,
                molecule: molecule.clone(),
                previous,
            });
        }
    }

    /// Overwrites the polarization of a cell.
    pub fn set_polarization(&mut self, id: NodeId, versor: Vec2) -> Result<()> {
        let cell = self.slot_mut(id)?.node.as_cell_mut().ok_or(SimError::NotACell(id))?;
        let previous = cell.polarization();
        cell.set_polarization(versor);
        if let Some(journal) = self.journal.as_mut() {
            journal.push(Undo::Polarization { node: id, previous });
        }
        Ok(())
    }

    /// Runs `f` so that either all of its mutations apply or, if it fails, none do.
    /// A nested call joins the enclosing transaction.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        if self.journal.is_some() {
            return f(self);
        }
        self.journal = Some(Vec::new());
        let result = f(self);
        let journal = self.journal.take().unwrap_or_default();
        if let Err(e) = &result {
            debug!("Rolling back {} change(s) after error: {}", journal.len(), e);
            self.rollback(journal);
        }
        result
    }

    fn rollback(&mut self, journal: Vec<Undo>) {
        for entry in journal.into_iter().rev() {
            match entry {
                Undo::Concentration { node, molecule, previous } => {
                    if let Ok(slot) = self.slot_mut(node) {
                        slot.node.concentrations_mut().restore(&molecule, previous);
                    }
                }
                Undo::Polarization { node, previous } => {
                    if let Some(cell) = self.slot_mut(node).ok().and_then(|s| s.node.as_cell_mut()) {
                        cell.set_polarization(previous);
                    }
                }
                Undo::Position { node, previous } => {
                    if let Ok(current) = self.position(node) {
                        self.relocate(node, current, previous);
                    }
                }
            }
        }
    }
}
