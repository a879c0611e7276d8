//! Uniform-grid spatial index for broad-phase collision detection.
//!
//! Each placed part is registered in every cell its bounding box touches.
//! Queries never mutate the index, so candidates can be evaluated
//! speculatively before they are committed.

use std::collections::{BTreeMap, HashMap};

use crate::geometry::BoundingBox;

/// Smallest accepted cell size in mm.
pub const MIN_CELL_SIZE: f64 = 1e-3;

/// Entries covering more cells than this are kept in a separate list
/// instead of being registered cell by cell.
const MAX_CELLS_PER_ENTRY: i64 = 4096;

/// Uniform grid mapping cells to the handles whose bounding boxes touch them.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    cells: HashMap<(i32, i32), Vec<usize>>,
    boxes: BTreeMap<usize, BoundingBox>,
    oversized: Vec<usize>,
}

/// Inclusive cell range covered by a box.
#[derive(Debug, Clone, Copy)]
struct CellRange {
    min: (i32, i32),
    max: (i32, i32),
}

impl CellRange {
    fn count(&self) -> i64 {
        (self.max.0 as i64 - self.min.0 as i64 + 1) * (self.max.1 as i64 - self.min.1 as i64 + 1)
    }

    fn cells(self) -> impl Iterator<Item = (i32, i32)> {
        (self.min.0..=self.max.0).flat_map(move |cx| (self.min.1..=self.max.1).map(move |cy| (cx, cy)))
    }
}

impl SpatialIndex {
    /// Creates an empty index with the given cell size.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(MIN_CELL_SIZE),
            cells: HashMap::new(),
            boxes: BTreeMap::new(),
            oversized: Vec::new(),
        }
    }

    /// Cell edge length.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    fn cell_coord(&self, v: f64) -> i32 {
        (v / self.cell_size)
            .floor()
            .clamp(i32::MIN as f64, i32::MAX as f64) as i32
    }

    fn range(&self, bbox: &BoundingBox) -> CellRange {
        CellRange {
            min: (self.cell_coord(bbox.min_x), self.cell_coord(bbox.min_y)),
            max: (self.cell_coord(bbox.max_x), self.cell_coord(bbox.max_y)),
        }
    }

    /// Registers `handle` with its bounding box, replacing any previous entry.
    pub fn insert(&mut self, handle: usize, bbox: BoundingBox) {
        self.remove(handle);

        let range = self.range(&bbox);
        if range.count() > MAX_CELLS_PER_ENTRY {
            if let Err(pos) = self.oversized.binary_search(&handle) {
                self.oversized.insert(pos, handle);
            }
        } else {
            for cell in range.cells() {
                let bucket = self.cells.entry(cell).or_default();
                if let Err(pos) = bucket.binary_search(&handle) {
                    bucket.insert(pos, handle);
                }
            }
        }
        self.boxes.insert(handle, bbox);
    }

    /// Removes `handle`, returning its bounding box if it was present.
    pub fn remove(&mut self, handle: usize) -> Option<BoundingBox> {
        let bbox = self.boxes.remove(&handle)?;

        if let Ok(pos) = self.oversized.binary_search(&handle) {
            self.oversized.remove(pos);
            return Some(bbox);
        }

        for cell in self.range(&bbox).cells() {
            if let Some(bucket) = self.cells.get_mut(&cell) {
                if let Ok(pos) = bucket.binary_search(&handle) {
                    bucket.remove(pos);
                }
                if bucket.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        Some(bbox)
    }

    /// Handles whose bounding boxes intersect `bbox` (touching included),
    /// sorted and deduplicated.
    pub fn query(&self, bbox: &BoundingBox) -> Vec<usize> {
        let range = self.range(bbox);

        let mut found: Vec<usize> = if range.count() > self.cells.len() as i64 {
            // Walking every cell of a huge query costs more than scanning entries.
            self.boxes.keys().copied().collect()
        } else {
            range
                .cells()
                .filter_map(|cell| self.cells.get(&cell))
                .flatten()
                .copied()
                .chain(self.oversized.iter().copied())
                .collect()
        };

        found.sort_unstable();
        found.dedup();
        found.retain(|h| self.boxes.get(h).is_some_and(|b| b.intersects(bbox)));
        found
    }

    /// Bounding box registered for `handle`.
    pub fn bounding_box(&self, handle: usize) -> Option<&BoundingBox> {
        self.boxes.get(&handle)
    }

    /// Registered handles in ascending order.
    pub fn handles(&self) -> impl Iterator<Item = usize> + '_ {
        self.boxes.keys().copied()
    }

    /// Number of registered handles.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Removes every entry, keeping the cell size.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.boxes.clear();
        self.oversized.clear();
    }
}

/// Default cell size: the mean of each part's larger bounding-box side, at least 1 mm.
pub fn default_cell_size<'a>(boxes: impl IntoIterator<Item = &'a BoundingBox>) -> f64 {
    let (sum, count) = boxes
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), b| (sum + b.width().max(b.height()), n + 1));
    if count == 0 {
        return 1.0;
    }
    (sum / count as f64).max(1.0)
}
