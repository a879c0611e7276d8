//! A solution under construction: placed parts plus their spatial index.

use kerfnest_core::{PartId, PlacedPart};

use crate::catalog::{CatalogEntry, PartCatalog, PartInstance};
use crate::geometry::{BoundingBox, Polygon};
use crate::spatial_index::SpatialIndex;

/// A placed part with its sheet-frame polygon.
#[derive(Debug, Clone)]
pub struct PlacedShape {
    /// Placement value.
    pub placement: PlacedPart,
    /// Polygon in sheet coordinates.
    pub polygon: Polygon,
    /// Bounding box of `polygon`.
    pub bbox: BoundingBox,
}

impl PlacedShape {
    /// Realizes a placement of `entry`.
    pub fn new(entry: &CatalogEntry, placement: PlacedPart) -> Self {
        let polygon = entry
            .polygon_at(placement.rotation)
            .translate(placement.x, placement.y);
        let bbox = polygon.bounding_box();
        Self {
            placement,
            polygon,
            bbox,
        }
    }

    /// Catalog index and copy number.
    pub fn instance(&self) -> PartInstance {
        PartInstance {
            part_index: self.placement.part_index,
            instance: self.placement.instance,
        }
    }
}

/// Ordered placed parts indexed by a uniform grid.
///
/// Handles are positions in placement order. Each layout owns its index, so
/// parallel workers never share one.
#[derive(Debug, Clone)]
pub struct Layout {
    placed: Vec<PlacedShape>,
    index: SpatialIndex,
    placed_area: f64,
}

impl Layout {
    /// Creates an empty layout.
    pub fn new(cell_size: f64) -> Self {
        Self {
            placed: Vec::new(),
            index: SpatialIndex::new(cell_size),
            placed_area: 0.0,
        }
    }

    /// Placed parts in placement order.
    pub fn placed(&self) -> &[PlacedShape] {
        &self.placed
    }

    /// Placed part at `handle`.
    pub fn get(&self, handle: usize) -> Option<&PlacedShape> {
        self.placed.get(handle)
    }

    /// Number of placed parts.
    pub fn len(&self) -> usize {
        self.placed.len()
    }

    /// Returns true if nothing is placed.
    pub fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }

    /// Net area of all placed parts.
    pub fn placed_area(&self) -> f64 {
        self.placed_area
    }

    /// Handles whose bounding boxes touch `bbox`.
    pub fn query(&self, bbox: &BoundingBox) -> Vec<usize> {
        self.index.query(bbox)
    }

    /// Appends a placed part. Callers check collisions first.
    pub(crate) fn push(&mut self, shape: PlacedShape) -> usize {
        let handle = self.placed.len();
        self.index.insert(handle, shape.bbox);
        self.placed_area += shape.polygon.area();
        self.placed.push(shape);
        handle
    }

    /// Removes the part at `handle`; later handles shift down by one.
    pub fn remove(&mut self, handle: usize) -> Option<PlacedShape> {
        if handle >= self.placed.len() {
            return None;
        }
        let shape = self.placed.remove(handle);
        self.placed_area -= shape.polygon.area();
        self.reindex();
        Some(shape)
    }

    /// Removes several parts at once, returning them in placement order.
    pub fn remove_many(&mut self, handles: &[usize]) -> Vec<PlacedShape> {
        let mut removed = Vec::with_capacity(handles.len());
        let mut kept = Vec::with_capacity(self.placed.len());
        for (i, shape) in self.placed.drain(..).enumerate() {
            if handles.contains(&i) {
                removed.push(shape);
            } else {
                kept.push(shape);
            }
        }
        self.placed = kept;
        self.placed_area = self.placed.iter().map(|s| s.polygon.area()).sum();
        self.reindex();
        removed
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (handle, shape) in self.placed.iter().enumerate() {
            self.index.insert(handle, shape.bbox);
        }
    }

    /// Union of all placed bounding boxes.
    pub fn extent(&self) -> Option<BoundingBox> {
        self.placed
            .iter()
            .map(|s| s.bbox)
            .reduce(|a, b| a.union(&b))
    }

    /// Smallest gap from `bbox` to any placed bounding box.
    pub fn nearest_gap(&self, bbox: &BoundingBox) -> Option<f64> {
        self.placed
            .iter()
            .map(|s| s.bbox.gap_to(bbox))
            .min_by(|a, b| a.total_cmp(b))
    }

    /// Returns true if this copy is already placed.
    pub fn contains_instance(&self, instance: PartInstance) -> bool {
        self.placed.iter().any(|s| s.instance() == instance)
    }

    /// Placement values in placement order.
    pub fn placements(&self) -> Vec<PlacedPart> {
        self.placed.iter().map(|s| s.placement.clone()).collect()
    }

    /// Copies of the catalog that are not placed, in processing order.
    pub fn missing(&self, catalog: &PartCatalog) -> Vec<PartInstance> {
        catalog
            .instances()
            .into_iter()
            .filter(|i| !self.contains_instance(*i))
            .collect()
    }

    /// Ids of the given copies.
    pub fn ids_of(catalog: &PartCatalog, instances: &[PartInstance]) -> Vec<PartId> {
        instances
            .iter()
            .filter_map(|i| catalog.get(i.part_index).map(|e| e.id().clone()))
            .collect()
    }
}
