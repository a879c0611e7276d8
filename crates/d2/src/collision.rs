//! Two-phase collision detection against a [`Layout`].
//!
//! Phase one queries the layout's grid with the candidate's bounding box
//! grown by the spacing and drops neighbours whose boxes do not overlap
//! strictly. Phase two resolves each remaining neighbour exactly, either by
//! point containment in the cached no-fit region or by intersecting the
//! half-spacing-buffered outlines directly.

use kerfnest_core::PlacedPart;
use log::warn;

use crate::boolean;
use crate::catalog::PartCatalog;
use crate::config::{CollisionMode, HoleMode};
use crate::geometry::{BoundingBox, Point, Polygon, Shape, BOUNDARY_EPSILON, OVERLAP_AREA_EPSILON};
use crate::layout::{Layout, PlacedShape};
use crate::nfp::NfpEngine;

/// Decides whether candidate placements are legal.
#[derive(Debug, Clone)]
pub struct CollisionDetector {
    usable: BoundingBox,
    spacing: f64,
    hole_mode: HoleMode,
    mode: CollisionMode,
    engine: NfpEngine,
}

impl CollisionDetector {
    /// Creates a detector for a usable sheet rectangle and full part spacing.
    pub fn new(
        usable: BoundingBox,
        spacing: f64,
        hole_mode: HoleMode,
        mode: CollisionMode,
        engine: NfpEngine,
    ) -> Self {
        Self {
            usable,
            spacing,
            hole_mode,
            mode,
            engine,
        }
    }

    /// Usable sheet rectangle.
    pub fn usable(&self) -> &BoundingBox {
        &self.usable
    }

    /// Full spacing between parts.
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Exact resolution mode.
    pub fn mode(&self) -> CollisionMode {
        self.mode
    }

    /// NFP engine used in [`CollisionMode::Nfp`].
    pub fn engine(&self) -> &NfpEngine {
        &self.engine
    }

    /// Realizes a candidate placement. `None` if its part index is unknown.
    pub fn realize(&self, catalog: &PartCatalog, candidate: &PlacedPart) -> Option<PlacedShape> {
        catalog
            .entry(candidate)
            .map(|entry| PlacedShape::new(entry, candidate.clone()))
    }

    /// Returns true if the box, grown by half the spacing, lies on the usable sheet.
    pub fn fits_sheet(&self, bbox: &BoundingBox) -> bool {
        self.usable
            .contains_box(&bbox.expand(self.spacing / 2.0), BOUNDARY_EPSILON)
    }

    /// Placed parts whose spacing-grown boxes overlap the candidate box.
    pub fn neighbours(&self, bbox: &BoundingBox, layout: &Layout) -> Vec<usize> {
        let reach = bbox.expand(self.spacing);
        layout
            .query(&reach)
            .into_iter()
            .filter(|&h| {
                layout
                    .get(h)
                    .is_some_and(|s| s.bbox.overlaps_strictly(&reach, BOUNDARY_EPSILON))
            })
            .collect()
    }

    /// Returns true if `candidate` can be added to `layout`. Never mutates the layout.
    pub fn can_place(&self, catalog: &PartCatalog, candidate: &PlacedPart, layout: &Layout) -> bool {
        match self.realize(catalog, candidate) {
            Some(shape) => self.can_place_shape(catalog, &shape, layout),
            None => false,
        }
    }

    /// Like [`CollisionDetector::can_place`] for an already realized shape.
    pub fn can_place_shape(&self, catalog: &PartCatalog, shape: &PlacedShape, layout: &Layout) -> bool {
        if !self.fits_sheet(&shape.bbox) {
            return false;
        }

        let neighbours = self.neighbours(&shape.bbox, layout);
        if neighbours.is_empty() {
            return true;
        }

        match self.mode {
            CollisionMode::Nfp => neighbours.iter().all(|&h| match layout.get(h) {
                Some(placed) => !self.overlaps_by_nfp(catalog, placed, &shape.placement),
                None => true,
            }),
            CollisionMode::Direct => {
                let buffered = self.buffered(&shape.polygon);
                neighbours.iter().all(|&h| match layout.get(h) {
                    Some(placed) => !overlaps(&buffered, &self.buffered(&placed.polygon)),
                    None => true,
                })
            }
        }
    }

    /// Independent check by direct intersection of the buffered outlines,
    /// regardless of the configured mode.
    pub fn can_place_direct(&self, catalog: &PartCatalog, candidate: &PlacedPart, layout: &Layout) -> bool {
        let Some(shape) = self.realize(catalog, candidate) else {
            return false;
        };
        if !self.fits_sheet(&shape.bbox) {
            return false;
        }
        let buffered = self.buffered(&shape.polygon);
        self.neighbours(&shape.bbox, layout)
            .into_iter()
            .filter_map(|h| layout.get(h))
            .all(|placed| !overlaps(&buffered, &self.buffered(&placed.polygon)))
    }

    /// Adds a placed shape to the layout, returning its handle.
    pub fn commit(&self, shape: PlacedShape, layout: &mut Layout) -> usize {
        layout.push(shape)
    }

    /// Realizes and checks a candidate, committing it if legal.
    pub fn try_commit(&self, catalog: &PartCatalog, candidate: &PlacedPart, layout: &mut Layout) -> bool {
        match self.realize(catalog, candidate) {
            Some(shape) if self.can_place_shape(catalog, &shape, layout) => {
                self.commit(shape, layout);
                true
            }
            _ => false,
        }
    }

    fn overlaps_by_nfp(&self, catalog: &PartCatalog, placed: &PlacedShape, candidate: &PlacedPart) -> bool {
        let (Some(a), Some(b)) = (catalog.entry(&placed.placement), catalog.entry(candidate)) else {
            return true;
        };
        let nfp = self.engine.compute_signed(
            a.polygon(),
            a.signature(),
            b.polygon(),
            b.signature(),
            placed.placement.rotation,
            candidate.rotation,
        );
        let offset = Point::new(candidate.x - placed.placement.x, candidate.y - placed.placement.y);
        nfp.contains(offset)
    }

    fn buffered(&self, polygon: &Polygon) -> Vec<Shape> {
        let source = match self.hole_mode {
            HoleMode::Void => polygon.clone(),
            HoleMode::Solid if polygon.hole_count() > 0 => {
                Polygon::new(polygon.outer().iter().copied()).unwrap_or_else(|_| polygon.clone())
            }
            HoleMode::Solid => polygon.clone(),
        };
        match source.buffer(self.spacing / 2.0) {
            Ok(region) => region.into_shapes(),
            Err(e) => {
                warn!("spacing buffer failed, using the bare outline: {}", e);
                vec![source.to_shape()]
            }
        }
    }
}

fn overlaps(a: &[Shape], b: &[Shape]) -> bool {
    let (Some(ba), Some(bb)) = (bounds(a), bounds(b)) else {
        return false;
    };
    if !ba.overlaps_strictly(&bb, 0.0) {
        return false;
    }
    boolean::intersection_area(a, b) > OVERLAP_AREA_EPSILON
}

fn bounds(shapes: &[Shape]) -> Option<BoundingBox> {
    shapes
        .iter()
        .map(Shape::bounding_box)
        .reduce(|a, b| a.union(&b))
}
