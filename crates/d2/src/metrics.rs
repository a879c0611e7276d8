//! Raw layout measurements fed to the scorer.
//!
//! Machine time and cost are scoring estimates derived from the material's
//! speeds and rates, not a cut plan.

use kerfnest_core::{Error, Result, Solution};
use rstar::{RTree, RTreeObject, AABB};

use crate::catalog::PartCatalog;
use crate::constraints::Constraints;
use crate::geometry::{BoundingBox, Point};
use crate::layout::PlacedShape;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Square millimeters per square meter.
const MM2_PER_M2: f64 = 1_000_000.0;

/// Parameters of the thermal and remnant measurements.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricsConfig {
    /// Heat-affected zone radius in mm. Default 3.
    pub haz_radius: f64,
    /// Per-part heat at which thermal risk saturates. Default 2.
    pub critical_heat: f64,
    /// Narrow side a free strip needs to count as a remnant, in mm. Default 50.
    pub min_remnant_dimension: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            haz_radius: 3.0,
            critical_heat: 2.0,
            min_remnant_dimension: 50.0,
        }
    }
}

impl MetricsConfig {
    /// Sets the heat-affected zone radius.
    pub fn with_haz_radius(mut self, radius: f64) -> Self {
        self.haz_radius = radius;
        self
    }

    /// Sets the saturation heat.
    pub fn with_critical_heat(mut self, heat: f64) -> Self {
        self.critical_heat = heat;
        self
    }

    /// Sets the minimum remnant dimension.
    pub fn with_min_remnant_dimension(mut self, dimension: f64) -> Self {
        self.min_remnant_dimension = dimension;
        self
    }

    /// Rejects non-positive radius or heat and a negative remnant size.
    pub fn validate(&self) -> Result<()> {
        if !(self.haz_radius > 0.0 && self.critical_heat > 0.0) {
            return Err(Error::ConfigError(format!(
                "haz_radius ({}) and critical_heat ({}) must be positive",
                self.haz_radius, self.critical_heat
            )));
        }
        if !(self.min_remnant_dimension >= 0.0) {
            return Err(Error::ConfigError(format!(
                "min_remnant_dimension must be non-negative, got {}",
                self.min_remnant_dimension
            )));
        }
        Ok(())
    }
}

/// Measurements of one layout.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolutionMetrics {
    /// Number of placed parts.
    pub placed_count: usize,
    /// Number of unplaced copies.
    pub unplaced_count: usize,
    /// Net area of the placed parts, mm².
    pub placed_area: f64,
    /// Usable sheet area, mm².
    pub usable_area: f64,
    /// Area of every requested copy over the usable area, capped at 1.
    pub theoretical_max: f64,
    /// Placed area over usable area.
    pub utilization: f64,
    /// Length of every loop of every placed part, mm.
    pub cut_length: f64,
    /// One pierce per loop.
    pub pierce_count: usize,
    /// Holes of the placed parts.
    pub hole_count: usize,
    /// Rapid traverse from the sheet origin through the placed centroids, mm.
    pub rapid_distance: f64,
    /// Σ 4·√area over placed parts: the cut length of equal-area squares, mm.
    pub ideal_cut_length: f64,
    /// Cutting time, s.
    pub cut_time_s: f64,
    /// Rapid traverse time, s.
    pub rapid_time_s: f64,
    /// Pierce time, s.
    pub pierce_time_s: f64,
    /// Total machine time, s.
    pub machine_time_s: f64,
    /// Mean saturated neighbour heat, 0 to 1.
    pub thermal_risk: f64,
    /// Largest usable free strip as a fraction of the usable area, 0 to 1.
    pub remnant_value: f64,
    /// Sheet material cost.
    pub material_cost: f64,
    /// Machine cost.
    pub machine_cost: f64,
    /// Material plus machine cost.
    pub total_cost: f64,
}

/// A placed part's bounding box in the thermal R-tree.
struct HeatEntry {
    handle: usize,
    bbox: BoundingBox,
}

impl RTreeObject for HeatEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min_x, self.bbox.min_y],
            [self.bbox.max_x, self.bbox.max_y],
        )
    }
}

impl SolutionMetrics {
    /// Measures a returned solution.
    pub fn compute(
        solution: &Solution,
        catalog: &PartCatalog,
        constraints: &Constraints,
        config: &MetricsConfig,
    ) -> Self {
        let shapes: Vec<PlacedShape> = solution
            .placements
            .iter()
            .filter_map(|p| catalog.entry(p).map(|e| PlacedShape::new(e, p.clone())))
            .collect();
        Self::from_shapes(&shapes, solution.unplaced.len(), catalog, constraints, config)
    }

    /// Measures realized shapes directly.
    pub fn from_shapes(
        shapes: &[PlacedShape],
        unplaced_count: usize,
        catalog: &PartCatalog,
        constraints: &Constraints,
        config: &MetricsConfig,
    ) -> Self {
        let usable = constraints.usable_bounds();
        let usable_area = usable.area();
        let material = constraints.material_or_default();

        let placed_area: f64 = shapes.iter().map(|s| s.polygon.area()).sum();
        let ratio = |area: f64| if usable_area > 0.0 { area / usable_area } else { 0.0 };

        let cut_length: f64 = shapes.iter().map(|s| s.polygon.perimeter()).sum();
        let hole_count: usize = shapes.iter().map(|s| s.polygon.hole_count()).sum();
        let pierce_count = shapes.len() + hole_count;
        let ideal_cut_length: f64 = shapes.iter().map(|s| 4.0 * s.polygon.area().sqrt()).sum();

        let mut rapid_distance = 0.0;
        let mut head = Point::default();
        for s in shapes {
            let c = s.polygon.centroid();
            rapid_distance += head.distance_to(&c);
            head = c;
        }

        let cut_time_s = cut_length / material.cut_speed * 60.0;
        let rapid_time_s = rapid_distance / material.rapid_speed * 60.0;
        let pierce_time_s = pierce_count as f64 * material.pierce_time;
        let machine_time_s = cut_time_s + rapid_time_s + pierce_time_s;

        let material_cost = constraints.sheet.area() / MM2_PER_M2 * material.cost_per_m2;
        let machine_cost = machine_time_s / 3600.0 * material.machine_rate_per_hour;

        Self {
            placed_count: shapes.len(),
            unplaced_count,
            placed_area,
            usable_area,
            theoretical_max: ratio(catalog.total_area()).min(1.0),
            utilization: ratio(placed_area),
            cut_length,
            pierce_count,
            hole_count,
            rapid_distance,
            ideal_cut_length,
            cut_time_s,
            rapid_time_s,
            pierce_time_s,
            machine_time_s,
            thermal_risk: thermal_risk(shapes, config),
            remnant_value: remnant_value(shapes, &usable, config.min_remnant_dimension),
            material_cost,
            machine_cost,
            total_cost: material_cost + machine_cost,
        }
    }
}

/// Mean per-part heat, each saturated at `critical_heat` and scaled to `[0, 1]`.
///
/// A neighbour at gap `g` contributes `exp(-g² / 2r²)`. Neighbours farther
/// than `3r` contribute less than 1.2% and are not looked up.
fn thermal_risk(shapes: &[PlacedShape], config: &MetricsConfig) -> f64 {
    if shapes.is_empty() {
        return 0.0;
    }

    let r = config.haz_radius;
    let tree = RTree::bulk_load(
        shapes
            .iter()
            .enumerate()
            .map(|(handle, s)| HeatEntry {
                handle,
                bbox: s.bbox,
            })
            .collect(),
    );

    let total: f64 = shapes
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let reach = s.bbox.expand(3.0 * r);
            let envelope = AABB::from_corners([reach.min_x, reach.min_y], [reach.max_x, reach.max_y]);
            let heat: f64 = tree
                .locate_in_envelope_intersecting(&envelope)
                .filter(|e| e.handle != i)
                .map(|e| {
                    let gap = s.polygon.distance_to(&shapes[e.handle].polygon);
                    (-gap * gap / (2.0 * r * r)).exp()
                })
                .sum();
            heat.min(config.critical_heat) / config.critical_heat
        })
        .sum();

    total / shapes.len() as f64
}

/// Larger of the free top and right strips as a fraction of the usable area.
fn remnant_value(shapes: &[PlacedShape], usable: &BoundingBox, min_dimension: f64) -> f64 {
    let usable_area = usable.area();
    if usable_area <= 0.0 {
        return 0.0;
    }
    let Some(extent) = shapes.iter().map(|s| s.bbox).reduce(|a, b| a.union(&b)) else {
        return 1.0;
    };

    let strip = |w: f64, h: f64| {
        let (w, h) = (w.max(0.0), h.max(0.0));
        if w.min(h) >= min_dimension {
            w * h
        } else {
            0.0
        }
    };
    let top = strip(usable.width(), usable.max_y - extent.max_y);
    let right = strip(usable.max_x - extent.max_x, usable.height());
    (top.max(right) / usable_area).clamp(0.0, 1.0)
}
