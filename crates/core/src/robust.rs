//! Robust geometric predicates.
//!
//! Orientation tests are the foundation of polygon validation, convexity checks
//! and ear clipping. Plain floating-point cross products give the wrong sign for
//! nearly collinear inputs, which shows up as phantom self-intersections on
//! imported drawings, so the predicates here delegate to Shewchuk's adaptive
//! precision arithmetic (the `robust` crate) whenever the fast path is unsure.
//!
//! ## Example
//!
//! ```rust
//! use kerfnest_core::robust::{orient2d, Orientation};
//!
//! let a = (0.0, 0.0);
//! let b = (1.0, 0.0);
//! let c = (0.5, 1.0);
//!
//! assert_eq!(orient2d(a, b, c), Orientation::CounterClockwise);
//! ```

use robust::{orient2d as robust_orient2d, Coord};

/// Result of an orientation test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Left turn.
    CounterClockwise,
    /// Right turn.
    Clockwise,
    /// The three points lie on one line.
    Collinear,
}

impl Orientation {
    /// Returns true for a left turn.
    #[inline]
    pub fn is_ccw(self) -> bool {
        matches!(self, Orientation::CounterClockwise)
    }

    /// Returns true for a right turn.
    #[inline]
    pub fn is_cw(self) -> bool {
        matches!(self, Orientation::Clockwise)
    }

    /// Returns true for collinear points.
    #[inline]
    pub fn is_collinear(self) -> bool {
        matches!(self, Orientation::Collinear)
    }
}

/// Exact orientation of `pc` relative to the directed line `pa -> pb`.
#[inline]
pub fn orient2d(pa: (f64, f64), pb: (f64, f64), pc: (f64, f64)) -> Orientation {
    let det = orient2d_raw(pa, pb, pc);
    if det > 0.0 {
        Orientation::CounterClockwise
    } else if det < 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::Collinear
    }
}

/// Twice the signed area of the triangle `(pa, pb, pc)`, computed exactly.
#[inline]
pub fn orient2d_raw(pa: (f64, f64), pb: (f64, f64), pc: (f64, f64)) -> f64 {
    robust_orient2d(
        Coord { x: pa.0, y: pa.1 },
        Coord { x: pb.0, y: pb.1 },
        Coord { x: pc.0, y: pc.1 },
    )
}

/// Relative error bound under which the fast cross product is trusted.
const FILTER_EPSILON: f64 = 1e-12;

/// Orientation test with a floating-point filter.
///
/// Most calls are decided by the plain cross product; only near-degenerate
/// inputs pay for the exact fallback.
#[inline]
pub fn orient2d_filtered(pa: (f64, f64), pb: (f64, f64), pc: (f64, f64)) -> Orientation {
    let acx = pa.0 - pc.0;
    let bcx = pb.0 - pc.0;
    let acy = pa.1 - pc.1;
    let bcy = pb.1 - pc.1;

    let det = acx * bcy - acy * bcx;
    let det_sum = (acx * bcy).abs() + (acy * bcx).abs();

    if det.abs() > FILTER_EPSILON * det_sum {
        return if det > 0.0 {
            Orientation::CounterClockwise
        } else {
            Orientation::Clockwise
        };
    }

    orient2d(pa, pb, pc)
}

/// Returns true if `p` lies strictly inside triangle `(a, b, c)`.
///
/// Points on an edge or at a vertex are outside. A degenerate triangle
/// contains nothing.
pub fn point_in_triangle_robust(
    p: (f64, f64),
    a: (f64, f64),
    b: (f64, f64),
    c: (f64, f64),
) -> bool {
    let o1 = orient2d(a, b, p);
    let o2 = orient2d(b, c, p);
    let o3 = orient2d(c, a, p);

    (o1.is_ccw() && o2.is_ccw() && o3.is_ccw()) || (o1.is_cw() && o2.is_cw() && o3.is_cw())
}

/// Returns true if `p` lies inside triangle `(a, b, c)` or on its boundary.
pub fn point_in_triangle_inclusive_robust(
    p: (f64, f64),
    a: (f64, f64),
    b: (f64, f64),
    c: (f64, f64),
) -> bool {
    let o1 = orient2d(a, b, p);
    let o2 = orient2d(b, c, p);
    let o3 = orient2d(c, a, p);

    let has_ccw = o1.is_ccw() || o2.is_ccw() || o3.is_ccw();
    let has_cw = o1.is_cw() || o2.is_cw() || o3.is_cw();

    !(has_ccw && has_cw)
}

/// Checks convexity of a closed vertex loop. Collinear runs are ignored.
pub fn is_convex_robust(polygon: &[(f64, f64)]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut expected: Option<Orientation> = None;

    for i in 0..n {
        let o = orient2d(polygon[i], polygon[(i + 1) % n], polygon[(i + 2) % n]);
        if o.is_collinear() {
            continue;
        }
        match expected {
            None => expected = Some(o),
            Some(e) if e != o => return false,
            _ => {}
        }
    }

    expected.is_some()
}

/// Returns true if the loop winds counter-clockwise.
///
/// Uses the turn at the lowest-leftmost vertex, which is always convex.
pub fn is_ccw_robust(polygon: &[(f64, f64)]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut min_idx = 0;
    for (i, &(x, y)) in polygon.iter().enumerate() {
        let (min_x, min_y) = polygon[min_idx];
        if y < min_y || (y == min_y && x < min_x) {
            min_idx = i;
        }
    }

    let n = polygon.len();
    let prev = polygon[(min_idx + n - 1) % n];
    let curr = polygon[min_idx];
    let next = polygon[(min_idx + 1) % n];

    match orient2d(prev, curr, next) {
        Orientation::CounterClockwise => true,
        Orientation::Clockwise => false,
        // Collinear extreme vertex: fall back to the area sign.
        Orientation::Collinear => signed_area_robust(polygon) > 0.0,
    }
}

/// Signed shoelace area with Kahan-compensated summation.
///
/// Positive for counter-clockwise loops.
pub fn signed_area_robust(polygon: &[(f64, f64)]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }

    let mut sum = 0.0;
    let mut c = 0.0;

    for i in 0..n {
        let j = (i + 1) % n;
        let term = polygon[i].0 * polygon[j].1 - polygon[j].0 * polygon[i].1;

        let y = term - c;
        let t = sum + y;
        c = (t - sum) - y;
        sum = t;
    }

    sum / 2.0
}

/// Returns true if segments `ab` and `cd` cross at a single interior point.
///
/// Touching at an endpoint and collinear overlap are not proper crossings.
pub fn segments_intersect_properly(
    a: (f64, f64),
    b: (f64, f64),
    c: (f64, f64),
    d: (f64, f64),
) -> bool {
    let o1 = orient2d(a, b, c);
    let o2 = orient2d(a, b, d);
    let o3 = orient2d(c, d, a);
    let o4 = orient2d(c, d, b);

    if o1.is_collinear() || o2.is_collinear() || o3.is_collinear() || o4.is_collinear() {
        return false;
    }

    o1 != o2 && o3 != o4
}

/// Returns true if segments `ab` and `cd` share at least one point.
pub fn segments_intersect(a: (f64, f64), b: (f64, f64), c: (f64, f64), d: (f64, f64)) -> bool {
    let o1 = orient2d(a, b, c);
    let o2 = orient2d(a, b, d);
    let o3 = orient2d(c, d, a);
    let o4 = orient2d(c, d, b);

    if o1 != o2 && o3 != o4 && !(o1.is_collinear() && o2.is_collinear()) {
        return true;
    }

    (o1.is_collinear() && on_segment(a, b, c))
        || (o2.is_collinear() && on_segment(a, b, d))
        || (o3.is_collinear() && on_segment(c, d, a))
        || (o4.is_collinear() && on_segment(c, d, b))
}

/// For a point `p` known to be collinear with `ab`, checks it lies between them.
#[inline]
fn on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    p.0 >= a.0.min(b.0) && p.0 <= a.0.max(b.0) && p.1 >= a.1.min(b.1) && p.1 <= a.1.max(b.1)
}

/// Snaps a point to the nearest intersection of a grid with the given resolution.
#[inline]
pub fn snap_to_grid(point: (f64, f64), resolution: f64) -> (f64, f64) {
    (
        (point.0 / resolution).round() * resolution,
        (point.1 / resolution).round() * resolution,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orient2d_basic() {
        let a = (0.0, 0.0);
        let b = (1.0, 0.0);
        let c = (0.5, 1.0);

        assert_eq!(orient2d(a, b, c), Orientation::CounterClockwise);
        assert_eq!(orient2d(a, c, b), Orientation::Clockwise);
        assert_eq!(orient2d((0.0, 0.0), (1.0, 1.0), (2.0, 2.0)), Orientation::Collinear);
    }

    #[test]
    fn test_orient2d_filtered_agrees() {
        let a = (0.0, 0.0);
        let b = (10.0, 0.0);
        assert_eq!(orient2d_filtered(a, b, (5.0, 10.0)), Orientation::CounterClockwise);
        assert_eq!(orient2d_filtered(a, b, (5.0, -10.0)), Orientation::Clockwise);
        assert_eq!(orient2d_filtered(a, b, (20.0, 0.0)), Orientation::Collinear);
    }

    #[test]
    fn test_point_in_triangle() {
        let a = (0.0, 0.0);
        let b = (10.0, 0.0);
        let c = (5.0, 10.0);

        assert!(point_in_triangle_robust((5.0, 3.0), a, b, c));
        assert!(!point_in_triangle_robust((5.0, 0.0), a, b, c));
        assert!(!point_in_triangle_robust((20.0, 5.0), a, b, c));

        assert!(point_in_triangle_inclusive_robust((5.0, 0.0), a, b, c));
        assert!(point_in_triangle_inclusive_robust((0.0, 0.0), a, b, c));
        assert!(!point_in_triangle_inclusive_robust((20.0, 5.0), a, b, c));
    }

    #[test]
    fn test_is_convex_robust() {
        let square = vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        assert!(is_convex_robust(&square));

        let with_collinear = vec![(0.0, 0.0), (5.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        assert!(is_convex_robust(&with_collinear));

        let l_shape = vec![
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 5.0),
            (5.0, 5.0),
            (5.0, 10.0),
            (0.0, 10.0),
        ];
        assert!(!is_convex_robust(&l_shape));
    }

    #[test]
    fn test_winding_and_area() {
        let ccw = vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        let cw: Vec<_> = ccw.iter().rev().copied().collect();

        assert!(is_ccw_robust(&ccw));
        assert!(!is_ccw_robust(&cw));
        assert!((signed_area_robust(&ccw) - 100.0).abs() < 1e-10);
        assert!((signed_area_robust(&cw) + 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_segment_intersection() {
        // Crossing diagonals
        assert!(segments_intersect_properly((0.0, 0.0), (10.0, 10.0), (0.0, 10.0), (10.0, 0.0)));
        assert!(segments_intersect((0.0, 0.0), (10.0, 10.0), (0.0, 10.0), (10.0, 0.0)));

        // Shared endpoint is not proper but does intersect
        assert!(!segments_intersect_properly((0.0, 0.0), (5.0, 5.0), (5.0, 5.0), (10.0, 0.0)));
        assert!(segments_intersect((0.0, 0.0), (5.0, 5.0), (5.0, 5.0), (10.0, 0.0)));

        // Disjoint parallel segments
        assert!(!segments_intersect((0.0, 0.0), (10.0, 0.0), (0.0, 1.0), (10.0, 1.0)));

        // Collinear overlap
        assert!(segments_intersect((0.0, 0.0), (10.0, 0.0), (5.0, 0.0), (15.0, 0.0)));
        assert!(!segments_intersect((0.0, 0.0), (4.0, 0.0), (5.0, 0.0), (15.0, 0.0)));
    }

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid((1.23, 4.56), 0.5), (1.0, 4.5));
        assert_eq!(snap_to_grid((1.23, 4.56), 1.0), (1.0, 5.0));
    }

    #[test]
    fn test_extreme_coordinates() {
        let a = (1e10, 1e10);
        let b = (1e10 + 1.0, 1e10);
        let c = (1e10 + 0.5, 1e10 + 1.0);
        assert_eq!(orient2d(a, b, c), Orientation::CounterClockwise);
    }
}
