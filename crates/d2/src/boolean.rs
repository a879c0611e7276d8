//! Boolean overlay of shapes using `i_overlay`.
//!
//! Inputs are oriented outer-CCW/holes-CW and evaluated with the non-zero fill
//! rule, so overlapping pieces of one operand merge and holes subtract.

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;

use crate::geometry::{loop_signed_area, Point, Region, Shape};

/// Contours with less area than this are dropped from overlay output.
const SLIVER_AREA: f64 = 1e-10;

type Contour = Vec<[f64; 2]>;
type OverlayShape = Vec<Contour>;

fn to_contour(points: &[Point]) -> Contour {
    points.iter().map(|p| [p.x, p.y]).collect()
}

fn to_overlay(shapes: &[Shape]) -> Vec<OverlayShape> {
    shapes
        .iter()
        .map(|s| s.loops().map(to_contour).collect())
        .collect()
}

fn from_overlay(result: Vec<OverlayShape>) -> Region {
    let mut shapes = Vec::with_capacity(result.len());
    for overlay_shape in result {
        let mut loops = overlay_shape.into_iter().filter_map(|contour| {
            let pts: Vec<Point> = contour.into_iter().map(Point::from).collect();
            (pts.len() >= 3 && loop_signed_area(&pts).abs() > SLIVER_AREA).then_some(pts)
        });
        // The first contour of an overlay shape is its outer boundary.
        if let Some(outer) = loops.next() {
            shapes.push(Shape::new(outer, loops.collect()));
        }
    }
    Region::new(shapes)
}

fn overlay(subject: &[Shape], clip: &[Shape], rule: OverlayRule) -> Region {
    let subject = to_overlay(subject);
    let clip = to_overlay(clip);
    from_overlay(subject.overlay(&clip, rule, FillRule::NonZero))
}

/// Union of all shapes.
pub fn union(shapes: &[Shape]) -> Region {
    match shapes.len() {
        0 => Region::empty(),
        _ => overlay(shapes, &[], OverlayRule::Union),
    }
}

/// `subject` minus `clip`.
pub fn difference(subject: &[Shape], clip: &[Shape]) -> Region {
    if subject.is_empty() {
        return Region::empty();
    }
    if clip.is_empty() {
        return union(subject);
    }
    overlay(subject, clip, OverlayRule::Difference)
}

/// Intersection of two shape sets.
pub fn intersection(a: &[Shape], b: &[Shape]) -> Region {
    if a.is_empty() || b.is_empty() {
        return Region::empty();
    }
    overlay(a, b, OverlayRule::Intersect)
}

/// Area of the intersection of two shape sets.
pub fn intersection_area(a: &[Shape], b: &[Shape]) -> f64 {
    intersection(a, b).area()
}
