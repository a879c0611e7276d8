//! Per-part shape descriptors used to order parts.

use crate::part::Part;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Weight of `1 - convexity` in the packing difficulty.
pub const CONVEXITY_WEIGHT: f64 = 0.25;
/// Weight of `1 - compactness`.
pub const COMPACTNESS_WEIGHT: f64 = 0.20;
/// Weight of the log aspect ratio term.
pub const ELONGATION_WEIGHT: f64 = 0.20;
/// Weight of the vertex count term.
pub const COMPLEXITY_WEIGHT: f64 = 0.10;
/// Weight of the concavity depth.
pub const CONCAVITY_WEIGHT: f64 = 0.15;
/// Weight of the hole count term.
pub const HOLE_WEIGHT: f64 = 0.10;

/// Vertex count at which the complexity term saturates.
const VERTEX_SATURATION: f64 = 50.0;
/// Hole count at which the hole term saturates.
const HOLE_SATURATION: f64 = 3.0;

/// Shape descriptors of one part.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Features {
    /// Net area.
    pub area: f64,
    /// Perimeter of all loops.
    pub perimeter: f64,
    /// Vertices over all loops.
    pub vertex_count: usize,
    /// Bounding box width.
    pub bbox_width: f64,
    /// Bounding box height.
    pub bbox_height: f64,
    /// Longer over shorter bounding box side, at least 1.
    pub aspect_ratio: f64,
    /// Area over convex hull area.
    pub convexity: f64,
    /// `4π·area / perimeter²`.
    pub compactness: f64,
    /// Number of holes.
    pub hole_count: usize,
    /// `(hull - area) / hull`.
    pub concavity_depth: f64,
    /// Weighted difficulty in `[0, 1]`; higher is harder to pack.
    pub packing_difficulty: f64,
}

/// Computes [`Features`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Creates an extractor.
    pub fn new() -> Self {
        Self
    }

    /// Descriptors of one part.
    pub fn extract(&self, part: &Part) -> Features {
        let polygon = part.polygon();
        let bb = polygon.bounding_box();

        let area = polygon.area();
        let hull = polygon.hull_area();
        let convexity = polygon.convexity();
        let compactness = polygon.compactness();
        let aspect_ratio = polygon.aspect_ratio();
        let vertex_count = polygon.vertex_count();
        let hole_count = polygon.hole_count();
        let concavity_depth = if hull > 0.0 {
            ((hull - area) / hull).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let packing_difficulty = (CONVEXITY_WEIGHT * (1.0 - convexity)
            + COMPACTNESS_WEIGHT * (1.0 - compactness)
            + ELONGATION_WEIGHT * (aspect_ratio.ln().abs() / 2.0).min(1.0)
            + COMPLEXITY_WEIGHT * (vertex_count as f64 / VERTEX_SATURATION).min(1.0)
            + CONCAVITY_WEIGHT * concavity_depth
            + HOLE_WEIGHT * (hole_count as f64 / HOLE_SATURATION).min(1.0))
        .clamp(0.0, 1.0);

        Features {
            area,
            perimeter: polygon.perimeter(),
            vertex_count,
            bbox_width: bb.width(),
            bbox_height: bb.height(),
            aspect_ratio,
            convexity,
            compactness,
            hole_count,
            concavity_depth,
            packing_difficulty,
        }
    }

    /// Descriptors of several parts, in input order.
    pub fn extract_batch(&self, parts: &[Part]) -> Vec<Features> {
        parts.iter().map(|p| self.extract(p)).collect()
    }
}

/// Compares two parts for processing: hardest first, then largest, then by id.
pub fn processing_cmp(a: (&Part, &Features), b: (&Part, &Features)) -> std::cmp::Ordering {
    b.1.packing_difficulty
        .total_cmp(&a.1.packing_difficulty)
        .then_with(|| b.1.area.total_cmp(&a.1.area))
        .then_with(|| a.0.id().cmp(b.0.id()))
}
