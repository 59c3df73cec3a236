use chemotaxis_common::Vec2;
use std::collections::HashMap;

use crate::node::NodeId;

const MAX_SCANNED_BUCKETS: i64 = 64;

/// Integer coordinates of a grid bucket.
pub type GridCell = (i64, i64);

/// Uniform bucket grid over the unbounded plane, used to narrow neighbor and overlap searches.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    inv_cell_size: f64,
    buckets: HashMap<GridCell, Vec<NodeId>>,
}

impl SpatialGrid {
    pub fn new(cell_size: f64) -> Self {
        // Fall back to unit buckets rather than dividing by zero.
        let cell_size = if cell_size > 0.0 && cell_size.is_finite() { cell_size } else { 1.0 };
        Self {
            inv_cell_size: 1.0 / cell_size,
            buckets: HashMap::new(),
        }
    }

    // Calculates the bucket holding a given position
    #[inline(always)]
    pub fn get_grid_cell_idx(&self, pos: Vec2) -> GridCell {
        (
            (pos.x * self.inv_cell_size).floor() as i64,
            (pos.y * self.inv_cell_size).floor() as i64,
        )
    }

    pub fn insert(&mut self, id: NodeId, pos: Vec2) {
        let cell = self.get_grid_cell_idx(pos);
        self.buckets.entry(cell).or_default().push(id);
    }

    pub fn remove(&mut self, id: NodeId, pos: Vec2) {
        let cell = self.get_grid_cell_idx(pos);
        if let Some(bucket) = self.buckets.get_mut(&cell) {
            bucket.retain(|other| *other != id);
            if bucket.is_empty() {
                self.buckets.remove(&cell);
            }
        } else {
            log::error!("{} missing from grid bucket {:?} during removal.", id, cell);
        }
    }

    pub fn relocate(&mut self, id: NodeId, from: Vec2, to: Vec2) {
        if self.get_grid_cell_idx(from) != self.get_grid_cell_idx(to) {
            self.remove(id, from);
            self.insert(id, to);
        }
    }

    /// Calls `f` for every indexed node other than `exclude` whose bucket may lie within `max_dist` of `pos`.
    /// Candidates are not distance-filtered; `f` returns `false` to stop early.
    pub fn for_each_candidate<F>(&self, exclude: Option<NodeId>, pos: Vec2, max_dist: f64, mut f: F)
    where
        F: FnMut(NodeId) -> bool,
    {
        if !(max_dist >= 0.0) {
            return;
        }
        let (cx, cy) = self.get_grid_cell_idx(pos);
        let span = (max_dist * self.inv_cell_size).ceil() as i64;

        // A huge radius covers more buckets than exist; walk the map instead.
        let scanned = span.saturating_mul(2).saturating_add(1).saturating_pow(2);
        if scanned > MAX_SCANNED_BUCKETS && scanned as usize > self.buckets.len() {
            for bucket in self.buckets.values() {
                for &id in bucket {
                    if Some(id) != exclude && !f(id) {
                        return;
                    }
                }
            }
            return;
        }

        for dy in -span..=span {
            for dx in -span..=span {
                if let Some(bucket) = self.buckets.get(&(cx.saturating_add(dx), cy.saturating_add(dy))) {
                    for &id in bucket {
                        // Don't report the node to itself
                        if Some(id) == exclude {
                            continue;
                        }
                        if !f(id) {
                            return;
                        }
                    }
                }
            }
        }
    }
}
