//! Uniform-grid spatial index for proximity queries.
//!
//! Entities are bucketed into fixed-size square cells keyed by
//! `(floor(x / cell_size), floor(y / cell_size))`. Range queries return the
//! union of all cells overlapping the query circle's bounding box, so results
//! are conservative: everything within the radius is included, plus nearby
//! items outside it. Callers that need exact distances filter afterwards.
//!
//! The monster grid owned by [`crate::GameWorld`] is rebuilt from store state
//! at the top of every fixed step rather than incrementally maintained, which
//! keeps it trivially consistent with the store.

use std::collections::HashMap;

/// Sparse uniform grid over 2D positions.
pub struct SpatialGrid<T> {
    cell_size: f32,
    cells: HashMap<(i32, i32), Vec<T>>,
    len: usize,
}

impl<T: Copy + PartialEq> SpatialGrid<T> {
    /// `cell_size` must be positive; non-positive sizes are clamped to 1.
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { 1.0 },
            cells: HashMap::new(),
            len: 0,
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn cell_for(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Insert `item` at a world position. Duplicates are the caller's
    /// responsibility.
    pub fn add(&mut self, x: f32, y: f32, item: T) {
        self.cells.entry(self.cell_for(x, y)).or_default().push(item);
        self.len += 1;
    }

    /// Remove `item` from the cell containing the given position. Returns
    /// `false` if it was not there.
    pub fn remove(&mut self, x: f32, y: f32, item: T) -> bool {
        let key = self.cell_for(x, y);
        let Some(bucket) = self.cells.get_mut(&key) else {
            return false;
        };
        let Some(index) = bucket.iter().position(|&i| i == item) else {
            return false;
        };
        bucket.swap_remove(index);
        if bucket.is_empty() {
            self.cells.remove(&key);
        }
        self.len -= 1;
        true
    }

    /// Move `item` from its old position's cell to the new one. A no-op on
    /// the bucket structure when both positions share a cell.
    pub fn update(&mut self, old_x: f32, old_y: f32, new_x: f32, new_y: f32, item: T) {
        if self.cell_for(old_x, old_y) == self.cell_for(new_x, new_y) {
            return;
        }
        if self.remove(old_x, old_y, item) {
            self.add(new_x, new_y, item);
        }
    }

    /// Everything in cells overlapping the circle at `(x, y)` with `radius`.
    /// Conservative: may include items farther than `radius` away.
    pub fn get_nearby(&self, x: f32, y: f32, radius: f32) -> Vec<T> {
        let center = self.cell_for(x, y);
        let reach = (radius.max(0.0) / self.cell_size).ceil() as i32;
        let mut found = Vec::new();
        for cx in (center.0 - reach)..=(center.0 + reach) {
            for cy in (center.1 - reach)..=(center.1 + reach) {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    found.extend_from_slice(bucket);
                }
            }
        }
        found
    }

    /// Everything in cells overlapping the axis-aligned rectangle.
    pub fn get_in_area(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<T> {
        let lo = self.cell_for(min_x, min_y);
        let hi = self.cell_for(max_x, max_y);
        let mut found = Vec::new();
        for cx in lo.0..=hi.0 {
            for cy in lo.1..=hi.1 {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    found.extend_from_slice(bucket);
                }
            }
        }
        found
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.len = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of occupied cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }
}

/// Named registry of entity grids, owned by the driver and passed to systems
/// through the tick context.
#[derive(Default)]
pub struct SpatialIndex {
    grids: HashMap<String, SpatialGrid<crate::ecs::EntityId>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) the named grid.
    pub fn create_grid(&mut self, name: &str, cell_size: f32) {
        self.grids.insert(name.to_owned(), SpatialGrid::new(cell_size));
    }

    pub fn grid(&self, name: &str) -> Option<&SpatialGrid<crate::ecs::EntityId>> {
        self.grids.get(name)
    }

    pub fn grid_mut(&mut self, name: &str) -> Option<&mut SpatialGrid<crate::ecs::EntityId>> {
        self.grids.get_mut(name)
    }

    pub fn remove_grid(&mut self, name: &str) -> bool {
        self.grids.remove(name).is_some()
    }
}
