//! 2D geometry kernel.
//!
//! [`Polygon`] is the validated, immutable input type: an outer loop wound
//! counter-clockwise plus zero or more clockwise holes. Validation happens once
//! at construction; every transform returns a new polygon with a freshly
//! computed bounding box.
//!
//! Results of boolean operations and offsets are not guaranteed to be a single
//! simple polygon, so they are represented as a [`Region`], a list of
//! [`Shape`]s.

use std::ops::{Add, Neg, Sub};

use geo::{
    Area, Centroid, ConvexHull, Coord, Euclidean, Length, LineString, MultiPoint,
    Polygon as GeoPolygon, Simplify,
};
use kerfnest_core::robust::{
    is_ccw_robust, is_convex_robust, orient2d, segments_intersect, segments_intersect_properly,
    signed_area_robust,
};
use kerfnest_core::{Error, Result, Transform2D};

use crate::boolean;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Vertices closer than this are merged during validation.
pub const VERTEX_EPSILON: f64 = 1e-9;

/// Loops with an absolute area at or below this are degenerate.
pub const AREA_EPSILON: f64 = 1e-9;

/// Points within this distance of a loop edge are on its boundary.
pub const BOUNDARY_EPSILON: f64 = 1e-9;

/// Minimum intersection area for two shapes to count as overlapping.
pub const OVERLAP_AREA_EPSILON: f64 = 1e-6;

// ============================================================================
// Point
// ============================================================================

/// A point or vector in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Returns the point as an `(x, y)` tuple.
    #[inline]
    pub fn tuple(self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Dot product with another vector.
    #[inline]
    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the cross product with another vector.
    #[inline]
    pub fn cross(self, other: Point) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Length of the vector.
    #[inline]
    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Returns true if both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

// ============================================================================
// BoundingBox
// ============================================================================

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    /// Minimum x.
    pub min_x: f64,
    /// Minimum y.
    pub min_y: f64,
    /// Maximum x.
    pub max_x: f64,
    /// Maximum y.
    pub max_y: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from its corners.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Computes the bounding box of a set of points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bb = Self::new(first.x, first.y, first.x, first.y);
        for p in iter {
            bb.min_x = bb.min_x.min(p.x);
            bb.min_y = bb.min_y.min(p.y);
            bb.max_x = bb.max_x.max(p.x);
            bb.max_y = bb.max_y.max(p.y);
        }
        Some(bb)
    }

    /// Returns the width.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Returns the height.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Returns the area.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Returns the center.
    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Returns the lower-left corner.
    pub fn min(&self) -> Point {
        Point::new(self.min_x, self.min_y)
    }

    /// Returns the upper-right corner.
    pub fn max(&self) -> Point {
        Point::new(self.max_x, self.max_y)
    }

    /// Returns true if the boxes share at least one point.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Returns true if the boxes overlap by more than `eps` along both axes.
    pub fn overlaps_strictly(&self, other: &Self, eps: f64) -> bool {
        self.min_x < other.max_x - eps
            && self.max_x > other.min_x + eps
            && self.min_y < other.max_y - eps
            && self.max_y > other.min_y + eps
    }

    /// Returns true if the point is inside or on the box.
    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Returns true if `other` lies inside this box, allowing `eps` of slack.
    pub fn contains_box(&self, other: &Self, eps: f64) -> bool {
        other.min_x >= self.min_x - eps
            && other.min_y >= self.min_y - eps
            && other.max_x <= self.max_x + eps
            && other.max_y <= self.max_y + eps
    }

    /// Grows the box by `d` on every side.
    pub fn expand(&self, d: f64) -> Self {
        Self::new(self.min_x - d, self.min_y - d, self.max_x + d, self.max_y + d)
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &Self) -> Self {
        Self::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Shifts the box.
    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.min_x + dx, self.min_y + dy, self.max_x + dx, self.max_y + dy)
    }

    /// Euclidean gap between two boxes, 0 if they touch or overlap.
    pub fn gap_to(&self, other: &Self) -> f64 {
        let dx = (other.min_x - self.max_x).max(self.min_x - other.max_x).max(0.0);
        let dy = (other.min_y - self.max_y).max(self.min_y - other.max_y).max(0.0);
        dx.hypot(dy)
    }
}

// ============================================================================
// Loop helpers
// ============================================================================

/// Position of a point relative to a closed loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSide {
    /// Strictly inside.
    Inside,
    /// Within the tolerance of an edge.
    Boundary,
    /// Strictly outside.
    Outside,
}

/// Signed area of a loop, positive for counter-clockwise winding.
pub fn loop_signed_area(points: &[Point]) -> f64 {
    let tuples: Vec<(f64, f64)> = points.iter().map(|p| p.tuple()).collect();
    signed_area_robust(&tuples)
}

/// Perimeter of a closed loop.
pub fn loop_perimeter(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n).map(|i| points[i].distance_to(&points[(i + 1) % n])).sum()
}

/// Classifies `p` against a closed loop. Edges within `tol` count as boundary.
pub fn point_in_loop(p: Point, points: &[Point], tol: f64) -> LoopSide {
    let n = points.len();
    if n < 3 {
        return LoopSide::Outside;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let a = points[j];
        let b = points[i];
        if point_segment_distance(p, a, b) <= tol {
            return LoopSide::Boundary;
        }
        if (b.y > p.y) != (a.y > p.y) && p.x < (a.x - b.x) * (p.y - b.y) / (a.y - b.y) + b.x {
            inside = !inside;
        }
        j = i;
    }

    if inside {
        LoopSide::Inside
    } else {
        LoopSide::Outside
    }
}

/// Distance from `p` to the segment `ab`.
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq <= f64::EPSILON {
        return p.distance_to(&a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * ab.x, a.y + t * ab.y);
    p.distance_to(&proj)
}

/// Minimum distance between segments `ab` and `cd`.
pub fn segment_distance(a: Point, b: Point, c: Point, d: Point) -> f64 {
    if segments_intersect(a.tuple(), b.tuple(), c.tuple(), d.tuple()) {
        return 0.0;
    }
    point_segment_distance(a, c, d)
        .min(point_segment_distance(b, c, d))
        .min(point_segment_distance(c, a, b))
        .min(point_segment_distance(d, a, b))
}

/// Iterates the edges of a closed loop as `(start, end)` pairs.
pub fn loop_edges(points: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = points.len();
    (0..n).map(move |i| (points[i], points[(i + 1) % n]))
}

/// Reverses a loop if its winding does not match `ccw`.
pub(crate) fn oriented(mut points: Vec<Point>, ccw: bool) -> Vec<Point> {
    let tuples: Vec<(f64, f64)> = points.iter().map(|p| p.tuple()).collect();
    if is_ccw_robust(&tuples) != ccw {
        points.reverse();
    }
    points
}

/// Convex hull of a point set, counter-clockwise, without a closing vertex.
pub(crate) fn convex_hull_of_points(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let multi: MultiPoint<f64> = points
        .iter()
        .map(|p| geo::Point::new(p.x, p.y))
        .collect::<Vec<_>>()
        .into();
    let hull = multi.convex_hull();

    let mut out: Vec<Point> = hull
        .exterior()
        .coords()
        .map(|c| Point::new(c.x, c.y))
        .collect();
    if out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    oriented(out, true)
}

/// Removes the closing vertex and consecutive duplicates.
fn dedup_loop(points: Vec<Point>) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if out
            .last()
            .map_or(true, |last: &Point| last.distance_to(&p) > VERTEX_EPSILON)
        {
            out.push(p);
        }
    }
    while out.len() > 1 {
        let (first, last) = (out[0], out[out.len() - 1]);
        if first.distance_to(&last) <= VERTEX_EPSILON {
            out.pop();
        } else {
            break;
        }
    }
    out
}

/// Normalizes and validates one loop of a polygon.
fn validate_loop(points: Vec<Point>, label: &str) -> Result<Vec<Point>> {
    if points.iter().any(|p| !p.is_finite()) {
        return Err(Error::InvalidGeometry(format!(
            "{} has non-finite coordinates",
            label
        )));
    }

    let points = dedup_loop(points);
    if points.len() < 3 {
        return Err(Error::InvalidGeometry(format!(
            "{} must have at least 3 distinct vertices, got {}",
            label,
            points.len()
        )));
    }

    if loop_signed_area(&points).abs() <= AREA_EPSILON {
        return Err(Error::InvalidGeometry(format!("{} has zero area", label)));
    }

    let n = points.len();
    for i in 0..n {
        let (a, b) = (points[i], points[(i + 1) % n]);
        let c = points[(i + 2) % n];

        // Adjacent edges may only meet at their shared vertex.
        if orient2d(a.tuple(), b.tuple(), c.tuple()).is_collinear() && (b - a).dot(c - b) < 0.0 {
            return Err(Error::InvalidGeometry(format!(
                "{} folds back on itself at vertex {}",
                label,
                (i + 1) % n
            )));
        }

        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            let (c, d) = (points[j], points[(j + 1) % n]);
            if segments_intersect(a.tuple(), b.tuple(), c.tuple(), d.tuple()) {
                return Err(Error::InvalidGeometry(format!(
                    "{} is self-intersecting (edges {} and {})",
                    label, i, j
                )));
            }
        }
    }

    Ok(points)
}

fn loops_cross(a: &[Point], b: &[Point]) -> bool {
    loop_edges(a).any(|(p, q)| {
        loop_edges(b).any(|(r, s)| segments_intersect_properly(p.tuple(), q.tuple(), r.tuple(), s.tuple()))
    })
}

fn loop_bbox(points: &[Point]) -> BoundingBox {
    BoundingBox::from_points(points).unwrap_or(BoundingBox::new(0.0, 0.0, 0.0, 0.0))
}

fn to_line_string(points: &[Point]) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = points.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
    if let Some(&first) = coords.first() {
        coords.push(first);
    }
    LineString::from(coords)
}

fn from_line_string(ring: &LineString<f64>) -> Vec<Point> {
    let mut pts: Vec<Point> = ring.coords().map(|c| Point::new(c.x, c.y)).collect();
    if pts.len() > 1 && pts.first() == pts.last() {
        pts.pop();
    }
    pts
}

// ============================================================================
// Polygon
// ============================================================================

/// A validated simple polygon with optional holes.
///
/// The outer loop is counter-clockwise and every hole is clockwise.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Polygon {
    outer: Vec<Point>,
    holes: Vec<Vec<Point>>,
    bbox: BoundingBox,
    area: f64,
}

impl Polygon {
    /// Creates a polygon without holes.
    pub fn new<P: Into<Point>>(outer: impl IntoIterator<Item = P>) -> Result<Self> {
        Self::with_holes(outer, Vec::<Vec<P>>::new())
    }

    /// Creates a polygon with holes.
    ///
    /// Rejects loops with fewer than 3 distinct vertices, zero area or
    /// self-intersections, and holes that leave the outer loop or cross each
    /// other. Loops are re-oriented as needed.
    pub fn with_holes<P, H, L>(outer: impl IntoIterator<Item = P>, holes: H) -> Result<Self>
    where
        P: Into<Point>,
        H: IntoIterator<Item = L>,
        L: IntoIterator<Item = P>,
    {
        let outer = validate_loop(outer.into_iter().map(Into::into).collect(), "outer loop")?;
        let outer = oriented(outer, true);

        let mut validated: Vec<Vec<Point>> = Vec::new();
        for (idx, hole) in holes.into_iter().enumerate() {
            let label = format!("hole {}", idx);
            let hole = validate_loop(hole.into_iter().map(Into::into).collect(), &label)?;

            if hole
                .iter()
                .any(|&p| point_in_loop(p, &outer, BOUNDARY_EPSILON) == LoopSide::Outside)
                || loops_cross(&hole, &outer)
            {
                return Err(Error::InvalidGeometry(format!(
                    "{} is not inside the outer loop",
                    label
                )));
            }

            for (other_idx, other) in validated.iter().enumerate() {
                let nested = hole
                    .iter()
                    .any(|&p| point_in_loop(p, other, BOUNDARY_EPSILON) == LoopSide::Inside)
                    || other
                        .iter()
                        .any(|&p| point_in_loop(p, &hole, BOUNDARY_EPSILON) == LoopSide::Inside);
                if nested || loops_cross(&hole, other) {
                    return Err(Error::InvalidGeometry(format!(
                        "{} overlaps hole {}",
                        label, other_idx
                    )));
                }
            }

            validated.push(oriented(hole, false));
        }

        let polygon = Self::from_loops(outer, validated);
        if polygon.area <= AREA_EPSILON {
            return Err(Error::InvalidGeometry(
                "holes leave no material".to_string(),
            ));
        }
        Ok(polygon)
    }

    /// Creates an axis-aligned `width x height` rectangle at the origin.
    pub fn rectangle(width: f64, height: f64) -> Result<Self> {
        if !(width > 0.0 && height > 0.0) {
            return Err(Error::InvalidGeometry(format!(
                "rectangle dimensions must be positive, got {} x {}",
                width, height
            )));
        }
        Self::new([(0.0, 0.0), (width, 0.0), (width, height), (0.0, height)])
    }

    /// Builds a polygon from loops that are already valid and oriented.
    fn from_loops(outer: Vec<Point>, holes: Vec<Vec<Point>>) -> Self {
        let bbox = loop_bbox(&outer);
        let area = loop_signed_area(&outer).abs()
            - holes
                .iter()
                .map(|h| loop_signed_area(h).abs())
                .sum::<f64>();
        Self {
            outer,
            holes,
            bbox,
            area,
        }
    }

    /// Outer loop, counter-clockwise.
    pub fn outer(&self) -> &[Point] {
        &self.outer
    }

    /// Hole loops, clockwise.
    pub fn holes(&self) -> &[Vec<Point>] {
        &self.holes
    }

    /// Cached bounding box.
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// Net area (outer minus holes).
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Total length of all loops.
    pub fn perimeter(&self) -> f64 {
        let geo_poly = self.to_geo();
        let mut perimeter = geo_poly.exterior().length::<Euclidean>();
        for hole in geo_poly.interiors() {
            perimeter += hole.length::<Euclidean>();
        }
        perimeter
    }

    /// Area centroid.
    pub fn centroid(&self) -> Point {
        self.to_geo()
            .centroid()
            .map(|c| Point::new(c.x(), c.y()))
            .unwrap_or_else(|| self.bbox.center())
    }

    /// Convex hull of the outer loop.
    pub fn convex_hull(&self) -> Polygon {
        let hull = self.to_geo().convex_hull();
        let outer = oriented(from_line_string(hull.exterior()), true);
        Self::from_loops(outer, Vec::new())
    }

    /// Area of the outer loop's convex hull.
    pub fn hull_area(&self) -> f64 {
        self.to_geo().convex_hull().unsigned_area()
    }

    /// Ratio of area to convex hull area, in `(0, 1]`.
    pub fn convexity(&self) -> f64 {
        let hull = self.hull_area();
        if hull <= AREA_EPSILON {
            return 1.0;
        }
        (self.area / hull).clamp(0.0, 1.0)
    }

    /// Isoperimetric quotient `4*pi*area / perimeter^2`, 1 for a circle.
    pub fn compactness(&self) -> f64 {
        let p = self.perimeter();
        if p <= 0.0 {
            return 0.0;
        }
        (4.0 * std::f64::consts::PI * self.area / (p * p)).clamp(0.0, 1.0)
    }

    /// Bounding box aspect ratio, long side over short side.
    pub fn aspect_ratio(&self) -> f64 {
        let w = self.bbox.width();
        let h = self.bbox.height();
        let short = w.min(h);
        if short <= 0.0 {
            return f64::INFINITY;
        }
        w.max(h) / short
    }

    /// Returns true if the polygon has no holes and a convex outer loop.
    pub fn is_convex(&self) -> bool {
        if !self.holes.is_empty() {
            return false;
        }
        let tuples: Vec<(f64, f64)> = self.outer.iter().map(|p| p.tuple()).collect();
        is_convex_robust(&tuples)
    }

    /// Number of vertices across all loops.
    pub fn vertex_count(&self) -> usize {
        self.outer.len() + self.holes.iter().map(Vec::len).sum::<usize>()
    }

    /// Number of holes.
    pub fn hole_count(&self) -> usize {
        self.holes.len()
    }

    /// Applies a rigid transform.
    pub fn transform(&self, t: &Transform2D) -> Polygon {
        let map = |pts: &[Point]| -> Vec<Point> {
            pts.iter()
                .map(|p| {
                    let (x, y) = t.transform_point(p.x, p.y);
                    Point::new(x, y)
                })
                .collect()
        };
        Self::from_loops(map(&self.outer), self.holes.iter().map(|h| map(h)).collect())
    }

    /// Rotates by `angle_deg` counter-clockwise about `pivot`.
    pub fn rotate(&self, angle_deg: f64, pivot: Point) -> Polygon {
        let t = Transform2D::translation(-pivot.x, -pivot.y)
            .then(&Transform2D::new(pivot.x, pivot.y, angle_deg));
        self.transform(&t)
    }

    /// Rotates about the area centroid.
    pub fn rotate_about_centroid(&self, angle_deg: f64) -> Polygon {
        self.rotate(angle_deg, self.centroid())
    }

    /// Translates by `(dx, dy)`.
    pub fn translate(&self, dx: f64, dy: f64) -> Polygon {
        let shift = |pts: &[Point]| -> Vec<Point> {
            pts.iter().map(|p| Point::new(p.x + dx, p.y + dy)).collect()
        };
        Self::from_loops(
            shift(&self.outer),
            self.holes.iter().map(|h| shift(h)).collect(),
        )
    }

    /// Moves the polygon so its bounding box starts at the origin.
    pub fn normalize_to_origin(&self) -> Polygon {
        self.translate(-self.bbox.min_x, -self.bbox.min_y)
    }

    /// Scales about the origin by `k > 0`.
    pub fn scale(&self, k: f64) -> Result<Polygon> {
        if !(k > 0.0 && k.is_finite()) {
            return Err(Error::InvalidGeometry(format!(
                "scale factor must be positive, got {}",
                k
            )));
        }
        let scale = |pts: &[Point]| -> Vec<Point> {
            pts.iter().map(|p| Point::new(p.x * k, p.y * k)).collect()
        };
        Ok(Self::from_loops(
            scale(&self.outer),
            self.holes.iter().map(|h| scale(h)).collect(),
        ))
    }

    /// Douglas-Peucker simplification; the result is re-validated.
    pub fn simplify(&self, tolerance: f64) -> Result<Polygon> {
        if tolerance <= 0.0 {
            return Ok(self.clone());
        }
        let simplified = self.to_geo().simplify(&tolerance);
        Polygon::with_holes(
            from_line_string(simplified.exterior()),
            simplified
                .interiors()
                .iter()
                .map(from_line_string)
                .collect::<Vec<_>>(),
        )
    }

    /// Returns true if `p` is strictly inside the material (not in a hole, not on an edge).
    pub fn contains_point(&self, p: Point) -> bool {
        if !self.bbox.contains_point(&p) {
            return false;
        }
        if point_in_loop(p, &self.outer, BOUNDARY_EPSILON) != LoopSide::Inside {
            return false;
        }
        self.holes
            .iter()
            .all(|h| point_in_loop(p, h, BOUNDARY_EPSILON) == LoopSide::Outside)
    }

    /// Returns true if the interiors overlap with positive area.
    ///
    /// Polygons that only touch along edges or at vertices do not intersect.
    pub fn intersects(&self, other: &Polygon) -> bool {
        if !self.bbox.overlaps_strictly(&other.bbox, 0.0) {
            return false;
        }
        boolean::intersection_area(&[self.to_shape()], &[other.to_shape()]) > OVERLAP_AREA_EPSILON
    }

    /// Minimum distance between the two polygons, 0 when they touch or overlap.
    pub fn distance_to(&self, other: &Polygon) -> f64 {
        if self.intersects(other) {
            return 0.0;
        }
        let loops_a: Vec<&[Point]> = std::iter::once(self.outer.as_slice())
            .chain(self.holes.iter().map(Vec::as_slice))
            .collect();
        let loops_b: Vec<&[Point]> = std::iter::once(other.outer.as_slice())
            .chain(other.holes.iter().map(Vec::as_slice))
            .collect();

        let mut best = f64::INFINITY;
        for la in &loops_a {
            for (a, b) in loop_edges(la) {
                for lb in &loops_b {
                    for (c, d) in loop_edges(lb) {
                        best = best.min(segment_distance(a, b, c, d));
                        if best == 0.0 {
                            return 0.0;
                        }
                    }
                }
            }
        }
        best
    }

    /// Offsets the polygon outward (`offset > 0`) or inward (`offset < 0`).
    ///
    /// Outward offsets are the Minkowski sum with a regular octagon whose
    /// apothem is `offset`: the result covers the exact round offset and the
    /// bounding box grows by exactly `offset` on each side. Holes shrink
    /// accordingly and may disappear. Inward offsets are only supported for
    /// convex polygons.
    pub fn buffer(&self, offset: f64) -> Result<Region> {
        if !offset.is_finite() {
            return Err(Error::InvalidGeometry(format!(
                "buffer offset must be finite, got {}",
                offset
            )));
        }
        if offset == 0.0 {
            return Ok(Region::from_shape(self.to_shape()));
        }
        if offset > 0.0 {
            return Ok(dilate(&self.to_shape(), offset));
        }
        if !self.is_convex() {
            return Err(Error::InvalidGeometry(
                "negative buffer is only supported for convex polygons".to_string(),
            ));
        }
        shrink_convex(&self.outer, -offset).map(|outer| {
            Region::from_shape(Shape::new(outer, Vec::new()))
        })
    }

    /// Converts to an unvalidated [`Shape`].
    pub fn to_shape(&self) -> Shape {
        Shape::new(self.outer.clone(), self.holes.clone())
    }

    /// Converts to a `geo` polygon.
    pub fn to_geo(&self) -> GeoPolygon<f64> {
        GeoPolygon::new(
            to_line_string(&self.outer),
            self.holes.iter().map(|h| to_line_string(h)).collect(),
        )
    }
}

/// Regular octagon with the given apothem, centered at the origin.
pub(crate) fn octagon(apothem: f64) -> Vec<Point> {
    let step = std::f64::consts::FRAC_PI_4;
    let radius = apothem / (step / 2.0).cos();
    (0..8)
        .map(|k| {
            let a = step / 2.0 + k as f64 * step;
            Point::new(radius * a.cos(), radius * a.sin())
        })
        .collect()
}

/// Minkowski sum of a shape with a convex pattern, merged in one union.
pub(crate) fn minkowski_with_convex(shape: &Shape, pattern: &[Point]) -> Region {
    boolean::union(&minkowski_pieces(shape, pattern))
}

/// Pieces whose union is `shape + pattern` for a convex `pattern`.
///
/// Uses `S + K = (S + k) ∪ (∂S + K)` for any `k` in `K`: the shape shifted by
/// one pattern vertex plus one convex hull per boundary edge.
pub(crate) fn minkowski_pieces(shape: &Shape, pattern: &[Point]) -> Vec<Shape> {
    let mut pieces: Vec<Shape> = Vec::with_capacity(shape.vertex_count() + 1);
    let Some(&anchor) = pattern.first() else {
        return pieces;
    };
    pieces.push(shape.translate(anchor.x, anchor.y));
    pieces.extend(boundary_pieces(shape, pattern));
    pieces
}

/// One convex hull `hull(e + K)` per boundary edge `e` of `shape`.
pub(crate) fn boundary_pieces(shape: &Shape, pattern: &[Point]) -> Vec<Shape> {
    let mut pieces: Vec<Shape> = Vec::with_capacity(shape.vertex_count());
    for ring in shape.loops() {
        for (a, b) in loop_edges(ring) {
            let mut pts: Vec<Point> = Vec::with_capacity(pattern.len() * 2);
            pts.extend(pattern.iter().map(|&k| a + k));
            pts.extend(pattern.iter().map(|&k| b + k));
            let hull = convex_hull_of_points(&pts);
            if hull.len() >= 3 {
                pieces.push(Shape::new(hull, Vec::new()));
            }
        }
    }
    pieces
}

fn dilate(shape: &Shape, offset: f64) -> Region {
    minkowski_with_convex(shape, &octagon(offset))
}

/// Intersection of the inward-shifted edge half-planes of a convex CCW loop.
fn shrink_convex(outer: &[Point], distance: f64) -> Result<Vec<Point>> {
    let mut poly: Vec<Point> = outer.to_vec();
    for (a, b) in loop_edges(outer) {
        let edge = b - a;
        let len = edge.norm();
        if len <= VERTEX_EPSILON {
            continue;
        }
        let normal = Point::new(-edge.y / len, edge.x / len);
        let inside = |p: Point| (p - a).dot(normal) - distance;

        let mut next = Vec::with_capacity(poly.len() + 1);
        for (p, q) in loop_edges(&poly) {
            let (dp, dq) = (inside(p), inside(q));
            if dp >= 0.0 {
                next.push(p);
            }
            if (dp >= 0.0) != (dq >= 0.0) {
                let t = dp / (dp - dq);
                next.push(Point::new(p.x + t * (q.x - p.x), p.y + t * (q.y - p.y)));
            }
        }
        poly = next;
        if poly.len() < 3 {
            break;
        }
    }

    let poly = dedup_loop(poly);
    if poly.len() < 3 || loop_signed_area(&poly) <= AREA_EPSILON {
        return Err(Error::InvalidGeometry(format!(
            "inward offset of {} collapses the polygon",
            distance
        )));
    }
    Ok(poly)
}

// ============================================================================
// Shape and Region
// ============================================================================

/// An outer loop with holes, as produced by boolean operations.
///
/// Outer loops are counter-clockwise and holes clockwise, but shapes are not
/// otherwise validated.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Shape {
    outer: Vec<Point>,
    holes: Vec<Vec<Point>>,
    bbox: BoundingBox,
}

impl Shape {
    /// Creates a shape, normalizing loop orientation.
    pub fn new(outer: Vec<Point>, holes: Vec<Vec<Point>>) -> Self {
        let outer = oriented(outer, true);
        let holes = holes.into_iter().map(|h| oriented(h, false)).collect();
        let bbox = loop_bbox(&outer);
        Self { outer, holes, bbox }
    }

    /// Outer loop.
    pub fn outer(&self) -> &[Point] {
        &self.outer
    }

    /// Hole loops.
    pub fn holes(&self) -> &[Vec<Point>] {
        &self.holes
    }

    /// Outer loop followed by the holes.
    pub fn loops(&self) -> impl Iterator<Item = &[Point]> {
        std::iter::once(self.outer.as_slice()).chain(self.holes.iter().map(Vec::as_slice))
    }

    /// Bounding box of the outer loop.
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }

    /// Net area.
    pub fn area(&self) -> f64 {
        loop_signed_area(&self.outer).abs()
            - self
                .holes
                .iter()
                .map(|h| loop_signed_area(h).abs())
                .sum::<f64>()
    }

    /// Number of vertices across all loops.
    pub fn vertex_count(&self) -> usize {
        self.outer.len() + self.holes.iter().map(Vec::len).sum::<usize>()
    }

    /// Returns true if the outer loop is convex and there are no holes.
    pub fn is_convex(&self) -> bool {
        let tuples: Vec<(f64, f64)> = self.outer.iter().map(|p| p.tuple()).collect();
        self.holes.is_empty() && is_convex_robust(&tuples)
    }

    /// Returns true if `p` is inside by more than `tol`.
    pub fn contains_point(&self, p: Point, tol: f64) -> bool {
        if !self.bbox.expand(tol).contains_point(&p) {
            return false;
        }
        if point_in_loop(p, &self.outer, tol) != LoopSide::Inside {
            return false;
        }
        self.holes
            .iter()
            .all(|h| point_in_loop(p, h, tol) == LoopSide::Outside)
    }

    /// Translates by `(dx, dy)`.
    pub fn translate(&self, dx: f64, dy: f64) -> Shape {
        let shift = |pts: &[Point]| -> Vec<Point> {
            pts.iter().map(|p| Point::new(p.x + dx, p.y + dy)).collect()
        };
        Shape {
            outer: shift(&self.outer),
            holes: self.holes.iter().map(|h| shift(h)).collect(),
            bbox: self.bbox.translate(dx, dy),
        }
    }

    /// Reflects through the origin.
    pub fn negate(&self) -> Shape {
        // Point reflection is a rotation by 180 degrees, so winding is preserved.
        let flip = |pts: &[Point]| -> Vec<Point> { pts.iter().map(|&p| -p).collect() };
        Shape {
            outer: flip(&self.outer),
            holes: self.holes.iter().map(|h| flip(h)).collect(),
            bbox: BoundingBox::new(-self.bbox.max_x, -self.bbox.max_y, -self.bbox.min_x, -self.bbox.min_y),
        }
    }
}

/// A possibly empty union of shapes.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    shapes: Vec<Shape>,
}

impl Region {
    /// Creates an empty region.
    pub fn empty() -> Self {
        Self { shapes: Vec::new() }
    }

    /// Creates a region from shapes.
    pub fn new(shapes: Vec<Shape>) -> Self {
        Self { shapes }
    }

    /// Creates a region with a single shape.
    pub fn from_shape(shape: Shape) -> Self {
        Self {
            shapes: vec![shape],
        }
    }

    /// Creates a region covering an axis-aligned box.
    pub fn from_bbox(bb: &BoundingBox) -> Self {
        Self::from_shape(Shape::new(
            vec![
                Point::new(bb.min_x, bb.min_y),
                Point::new(bb.max_x, bb.min_y),
                Point::new(bb.max_x, bb.max_y),
                Point::new(bb.min_x, bb.max_y),
            ],
            Vec::new(),
        ))
    }

    /// Shapes in this region.
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Consumes the region, returning its shapes.
    pub fn into_shapes(self) -> Vec<Shape> {
        self.shapes
    }

    /// Returns true if the region has no shapes.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Total area.
    pub fn area(&self) -> f64 {
        self.shapes.iter().map(Shape::area).sum()
    }

    /// Bounding box of all shapes.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.shapes
            .iter()
            .map(Shape::bounding_box)
            .reduce(|a, b| a.union(&b))
    }

    /// All vertices of all loops.
    pub fn vertices(&self) -> impl Iterator<Item = Point> + '_ {
        self.shapes
            .iter()
            .flat_map(|s| s.loops().flat_map(|l| l.iter().copied()))
    }

    /// Returns true if `p` is inside some shape by more than `tol`.
    pub fn contains_point(&self, p: Point, tol: f64) -> bool {
        self.shapes.iter().any(|s| s.contains_point(p, tol))
    }

    /// Translates every shape.
    pub fn translate(&self, dx: f64, dy: f64) -> Region {
        Region::new(self.shapes.iter().map(|s| s.translate(dx, dy)).collect())
    }
}
