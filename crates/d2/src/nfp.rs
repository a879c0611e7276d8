//! No-fit regions (NFP) and inner-fit rectangles.
//!
//! The NFP of a stationary part A and an orbiting part B is the set of
//! reference-point offsets `t` (B's reference point minus A's) for which
//! `B + t` overlaps A. Both parts are first dilated by half the spacing, so
//! "overlap" already includes the required gap.
//!
//! This module implements:
//! - **Convex case**: edge-merge Minkowski sum, O(n + m)
//! - **Concave case**: `A + K = (A + k) ∪ ⋃ hull(e + K)` over boundary edges,
//!   with the smaller operand ear-clipped into triangles when neither is convex,
//!   merged in a single `i_overlay` union
//! - **Holes**: positions where one part fits inside the other's hole are
//!   subtracted when holes are voids
//! - **Fallbacks**: convex hulls when triangulation fails, and a conservative
//!   bounding-box region when the computation degenerates

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::f64::consts::PI;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use kerfnest_core::robust::{is_convex_robust, orient2d, point_in_triangle_inclusive_robust};
use kerfnest_core::{normalize_degrees, Error, Result};
use log::{debug, warn};

use crate::boolean;
use crate::config::{HoleMode, NfpMethod};
use crate::geometry::{
    boundary_pieces, convex_hull_of_points, minkowski_pieces, oriented, BoundingBox, Point,
    Polygon, Region, Shape, VERTEX_EPSILON,
};

/// Points closer than this to an NFP boundary count as touching.
pub const NFP_CONTAINS_TOLERANCE: f64 = 1e-6;

/// Grid used to snap coordinates before hashing shape signatures.
const SIGNATURE_GRID: f64 = 1e-3;

// ============================================================================
// Nfp
// ============================================================================

/// How faithfully an [`Nfp`] represents the true forbidden region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NfpFidelity {
    /// Exact up to the octagonal spacing offset.
    Exact,
    /// Minkowski sum of convex hulls; a superset of the exact region.
    ConvexHull,
    /// Bounding-box region used after a failed computation.
    BoundingBox,
}

/// A forbidden region for an orbiting part's reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct Nfp {
    region: Region,
    fidelity: NfpFidelity,
}

impl Nfp {
    /// Creates an NFP from a region.
    pub fn new(region: Region, fidelity: NfpFidelity) -> Self {
        Self { region, fidelity }
    }

    /// Shapes of the region.
    pub fn shapes(&self) -> &[Shape] {
        self.region.shapes()
    }

    /// Underlying region.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Fidelity flag.
    pub fn fidelity(&self) -> NfpFidelity {
        self.fidelity
    }

    /// Returns true if placing the orbiting reference point at `offset`
    /// overlaps the stationary part. Boundary positions are touching and allowed.
    pub fn contains(&self, offset: Point) -> bool {
        self.region.contains_point(offset, NFP_CONTAINS_TOLERANCE)
    }

    /// All vertices of all loops.
    pub fn vertices(&self) -> Vec<Point> {
        self.region.vertices().collect()
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.region.shapes().iter().map(Shape::vertex_count).sum()
    }

    /// Bounding box, `None` when empty.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.region.bounding_box()
    }

    /// Region area.
    pub fn area(&self) -> f64 {
        self.region.area()
    }

    /// Returns true if the region is empty.
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }
}

// ============================================================================
// Cache keys
// ============================================================================

/// Content hash of a polygon's loops.
///
/// Coordinates are snapped to a 1e-3 grid and every loop starts at its
/// bottom-left vertex, so equal shapes hash equally regardless of part id or
/// starting vertex. Position is part of the content: the reference point is
/// the local origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeSignature(u64);

impl ShapeSignature {
    /// Computes the signature of a polygon.
    pub fn of(polygon: &Polygon) -> Self {
        let mut hasher = DefaultHasher::new();
        canonical_loop(polygon.outer()).hash(&mut hasher);

        let mut holes: Vec<Vec<(i64, i64)>> =
            polygon.holes().iter().map(|h| canonical_loop(h)).collect();
        holes.sort();
        holes.hash(&mut hasher);

        Self(hasher.finish())
    }

    /// Raw hash value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

fn canonical_loop(points: &[Point]) -> Vec<(i64, i64)> {
    let snapped: Vec<(i64, i64)> = points
        .iter()
        .map(|p| {
            (
                (p.x / SIGNATURE_GRID).round() as i64,
                (p.y / SIGNATURE_GRID).round() as i64,
            )
        })
        .collect();
    let start = snapped
        .iter()
        .enumerate()
        .min_by_key(|(_, &(x, y))| (y, x))
        .map(|(i, _)| i)
        .unwrap_or(0);
    snapped[start..]
        .iter()
        .chain(&snapped[..start])
        .copied()
        .collect()
}

/// Quantizes an angle to tenths of a degree in `[0, 3600)`.
pub fn quantize_rotation(angle_deg: f64) -> i32 {
    ((normalize_degrees(angle_deg) * 10.0).round() as i32).rem_euclid(3600)
}

/// Cache key for one NFP computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NfpCacheKey {
    /// Stationary part shape.
    pub stationary: ShapeSignature,
    /// Orbiting part shape.
    pub orbiting: ShapeSignature,
    /// Stationary rotation in tenths of a degree.
    pub rotation_a: i32,
    /// Orbiting rotation in tenths of a degree.
    pub rotation_b: i32,
    /// Spacing in micrometers.
    pub spacing: i64,
    /// Hole treatment.
    pub holes: HoleMode,
    /// Computation method.
    pub method: NfpMethod,
}

impl NfpCacheKey {
    /// Creates a key with zero spacing, void holes and the exact method.
    pub fn new(stationary: ShapeSignature, orbiting: ShapeSignature, rot_a: f64, rot_b: f64) -> Self {
        Self {
            stationary,
            orbiting,
            rotation_a: quantize_rotation(rot_a),
            rotation_b: quantize_rotation(rot_b),
            spacing: 0,
            holes: HoleMode::Void,
            method: NfpMethod::Exact,
        }
    }

    /// Sets the spacing in mm.
    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = (spacing * 1000.0).round() as i64;
        self
    }

    /// Sets the hole mode.
    pub fn with_holes(mut self, holes: HoleMode) -> Self {
        self.holes = holes;
        self
    }

    /// Sets the method.
    pub fn with_method(mut self, method: NfpMethod) -> Self {
        self.method = method;
        self
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Hit and miss counters of an [`NfpCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that computed a new entry.
    pub misses: u64,
    /// Current number of entries.
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, 0 when there were none.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe NFP cache shared by every worker of a session.
///
/// Entries are never evicted; [`NfpCache::clear`] resets the cache between
/// unrelated sessions.
#[derive(Debug, Default)]
pub struct NfpCache {
    entries: RwLock<HashMap<NfpCacheKey, Arc<Nfp>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl NfpCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached NFP for `key`, computing and storing it on a miss.
    ///
    /// If two workers race on the same key, the first stored value wins and
    /// both receive it.
    pub fn get_or_compute<F>(&self, key: NfpCacheKey, compute: F) -> Result<Arc<Nfp>>
    where
        F: FnOnce() -> Result<Nfp>,
    {
        {
            let cache = self.entries.read().map_err(|e| {
                Error::Internal(format!("Failed to acquire cache read lock: {}", e))
            })?;
            if let Some(nfp) = cache.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(nfp));
            }
        }

        let nfp = Arc::new(compute()?);
        self.misses.fetch_add(1, Ordering::Relaxed);

        let mut cache = self.entries.write().map_err(|e| {
            Error::Internal(format!("Failed to acquire cache write lock: {}", e))
        })?;
        Ok(Arc::clone(cache.entry(key).or_insert(nfp)))
    }

    /// Looks up an entry without computing.
    pub fn get(&self, key: &NfpCacheKey) -> Option<Arc<Nfp>> {
        self.entries.read().ok()?.get(key).cloned()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry and resets the counters.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.entries.write() {
            cache.clear();
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Computes and caches NFPs for one spacing, hole mode and method.
#[derive(Debug, Clone)]
pub struct NfpEngine {
    cache: Arc<NfpCache>,
    method: NfpMethod,
    hole_mode: HoleMode,
    spacing: f64,
}

impl NfpEngine {
    /// Creates an exact engine with zero spacing and void holes.
    pub fn new(cache: Arc<NfpCache>) -> Self {
        Self {
            cache,
            method: NfpMethod::Exact,
            hole_mode: HoleMode::Void,
            spacing: 0.0,
        }
    }

    /// Sets the method.
    pub fn with_method(mut self, method: NfpMethod) -> Self {
        self.method = method;
        self
    }

    /// Sets the hole mode.
    pub fn with_hole_mode(mut self, hole_mode: HoleMode) -> Self {
        self.hole_mode = hole_mode;
        self
    }

    /// Sets the full spacing between parts.
    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    /// Shared cache.
    pub fn cache(&self) -> &Arc<NfpCache> {
        &self.cache
    }

    /// Full spacing between parts.
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    /// Hole mode.
    pub fn hole_mode(&self) -> HoleMode {
        self.hole_mode
    }

    /// Method.
    pub fn method(&self) -> NfpMethod {
        self.method
    }

    /// Cache key for a pair of shapes under this engine's settings.
    pub fn key(&self, a: ShapeSignature, b: ShapeSignature, rot_a: f64, rot_b: f64) -> NfpCacheKey {
        NfpCacheKey::new(a, b, rot_a, rot_b)
            .with_spacing(self.spacing)
            .with_holes(self.hole_mode)
            .with_method(self.method)
    }

    /// Cached NFP of two local-frame polygons at the given rotations.
    pub fn compute(&self, stationary: &Polygon, orbiting: &Polygon, rot_a: f64, rot_b: f64) -> Arc<Nfp> {
        self.compute_signed(
            stationary,
            ShapeSignature::of(stationary),
            orbiting,
            ShapeSignature::of(orbiting),
            rot_a,
            rot_b,
        )
    }

    /// Like [`NfpEngine::compute`] with precomputed signatures.
    pub fn compute_signed(
        &self,
        stationary: &Polygon,
        sig_a: ShapeSignature,
        orbiting: &Polygon,
        sig_b: ShapeSignature,
        rot_a: f64,
        rot_b: f64,
    ) -> Arc<Nfp> {
        let key = self.key(sig_a, sig_b, rot_a, rot_b);
        let computed = self
            .cache
            .get_or_compute(key, || Ok(self.compute_uncached(stationary, orbiting, rot_a, rot_b)));
        match computed {
            Ok(nfp) => nfp,
            Err(e) => {
                warn!("NFP cache unavailable, computing without caching: {}", e);
                Arc::new(self.compute_uncached(stationary, orbiting, rot_a, rot_b))
            }
        }
    }

    /// Computes an NFP without the cache, substituting the bounding-box region
    /// on failure.
    pub fn compute_uncached(&self, stationary: &Polygon, orbiting: &Polygon, rot_a: f64, rot_b: f64) -> Nfp {
        let a = rotated(stationary, rot_a);
        let b = rotated(orbiting, rot_b);
        match self.try_compute_rotated(&a, &b) {
            Ok(nfp) => nfp,
            Err(e) => {
                warn!("falling back to bounding-box NFP: {}", e);
                bounding_box_nfp(&a, &b, self.spacing)
            }
        }
    }

    /// Computes an NFP of already rotated polygons, reporting degenerate cases
    /// as [`Error::NfpError`].
    pub fn try_compute_rotated(&self, a: &Polygon, b: &Polygon) -> Result<Nfp> {
        let half = self.spacing / 2.0;
        let (fill_a, holes_a) = single_shape(a.buffer(half)?, "stationary")?;
        let (fill_b, holes_b) = single_shape(b.buffer(half)?, "orbiting")?;
        // Point reflection keeps the winding counter-clockwise.
        let neg_b: Vec<Point> = fill_b.iter().map(|&p| -p).collect();

        if self.method == NfpMethod::ConvexHull {
            warn!("using convex-hull NFP approximation");
            let region = hull_sum(&fill_a, &neg_b);
            return finish(region, NfpFidelity::ConvexHull);
        }

        let (mut region, fidelity) = match minkowski_sum(&fill_a, &neg_b) {
            Some(region) => (region, NfpFidelity::Exact),
            None => {
                warn!("triangulation failed, using convex-hull NFP approximation");
                (hull_sum(&fill_a, &neg_b), NfpFidelity::ConvexHull)
            }
        };

        if self.hole_mode == HoleMode::Void && (!holes_a.is_empty() || !holes_b.is_empty()) {
            let mut pockets: Vec<Shape> = Vec::new();
            for hole in &holes_a {
                pockets.extend(containment_region(hole, &fill_b)?.into_shapes());
            }
            for hole in &holes_b {
                pockets.extend(
                    containment_region(hole, &fill_a)?
                        .shapes()
                        .iter()
                        .map(Shape::negate),
                );
            }
            if !pockets.is_empty() {
                debug!("subtracting {} hole pocket(s) from NFP", pockets.len());
                region = boolean::difference(region.shapes(), &pockets);
            }
        }

        finish(region, fidelity)
    }
}

fn rotated(polygon: &Polygon, rotation: f64) -> Polygon {
    if rotation == 0.0 {
        polygon.clone()
    } else {
        polygon.rotate(rotation, Point::default())
    }
}

fn single_shape(region: Region, label: &str) -> Result<(Vec<Point>, Vec<Vec<Point>>)> {
    let mut shapes = region.into_shapes();
    if shapes.len() != 1 {
        return Err(Error::NfpError(format!(
            "{} outline buffered into {} pieces",
            label,
            shapes.len()
        )));
    }
    let shape = shapes.remove(0);
    Ok((shape.outer().to_vec(), shape.holes().to_vec()))
}

fn finish(region: Region, fidelity: NfpFidelity) -> Result<Nfp> {
    if region.is_empty() {
        return Err(Error::NfpError("Minkowski union is empty".into()));
    }
    if region.vertices().any(|p| !p.is_finite()) {
        return Err(Error::NfpError("non-finite NFP coordinates".into()));
    }
    Ok(Nfp::new(region, fidelity))
}

/// Conservative region `[minA - maxB, maxA - minB]` grown by the spacing.
pub fn bounding_box_nfp(a: &Polygon, b: &Polygon, spacing: f64) -> Nfp {
    let (ba, bb) = (a.bounding_box(), b.bounding_box());
    let bounds = BoundingBox::new(
        ba.min_x - bb.max_x - spacing,
        ba.min_y - bb.max_y - spacing,
        ba.max_x - bb.min_x + spacing,
        ba.max_y - bb.min_y + spacing,
    );
    Nfp::new(Region::from_bbox(&bounds), NfpFidelity::BoundingBox)
}

// ============================================================================
// Minkowski sums
// ============================================================================

fn is_convex_loop(points: &[Point]) -> bool {
    let tuples: Vec<(f64, f64)> = points.iter().map(|p| p.tuple()).collect();
    is_convex_robust(&tuples)
}

/// `a + k` for simple counter-clockwise loops. `None` if a required
/// triangulation fails.
fn minkowski_sum(a: &[Point], k: &[Point]) -> Option<Region> {
    let a_convex = is_convex_loop(a);
    let k_convex = is_convex_loop(k);

    if a_convex && k_convex {
        let sum = convex_minkowski(a, k);
        return Some(Region::from_shape(Shape::new(sum, Vec::new())));
    }

    let pieces = if k_convex {
        minkowski_pieces(&Shape::new(a.to_vec(), Vec::new()), k)
    } else if a_convex {
        minkowski_pieces(&Shape::new(k.to_vec(), Vec::new()), a)
    } else {
        let (big, small) = if a.len() >= k.len() { (a, k) } else { (k, a) };
        let triangles = triangulate(small)?;
        let big = Shape::new(big.to_vec(), Vec::new());
        triangles
            .iter()
            .flat_map(|t| minkowski_pieces(&big, t))
            .collect()
    };
    Some(boolean::union(&pieces))
}

fn hull_sum(a: &[Point], k: &[Point]) -> Region {
    let sum = convex_minkowski(&convex_hull_of_points(a), &convex_hull_of_points(k));
    Region::from_shape(Shape::new(sum, Vec::new()))
}

/// Reference offsets for which `part` lies inside `hole`, as a region.
///
/// `t + part ⊆ hole` holds when one part vertex is inside the hole and the
/// part boundary does not reach the hole boundary, so the region is the
/// shifted hole minus `∂hole + (-part)`.
fn containment_region(hole: &[Point], part: &[Point]) -> Result<Region> {
    let hole = oriented(hole.to_vec(), true);
    let (Some(hole_bb), Some(part_bb)) = (
        BoundingBox::from_points(&hole),
        BoundingBox::from_points(part),
    ) else {
        return Ok(Region::empty());
    };
    if part_bb.width() > hole_bb.width() || part_bb.height() > hole_bb.height() {
        return Ok(Region::empty());
    }

    let anchor = part[0];
    let shifted = Shape::new(hole.iter().map(|&p| p - anchor).collect(), Vec::new());
    let neg_part: Vec<Point> = part.iter().map(|&p| -p).collect();
    let convex_parts = if is_convex_loop(&neg_part) {
        vec![neg_part]
    } else {
        triangulate(&neg_part)
            .ok_or_else(|| Error::NfpError("cannot triangulate part for hole pocket".into()))?
    };

    let hole_shape = Shape::new(hole, Vec::new());
    let blocked: Vec<Shape> = convex_parts
        .iter()
        .flat_map(|piece| boundary_pieces(&hole_shape, piece))
        .collect();
    Ok(boolean::difference(&[shifted], &blocked))
}

/// Minkowski sum of two convex counter-clockwise loops by merging edge vectors.
fn convex_minkowski(a: &[Point], b: &[Point]) -> Vec<Point> {
    let a = oriented(a.to_vec(), true);
    let b = oriented(b.to_vec(), true);

    let edges_a = edge_vectors(&a);
    let edges_b = edge_vectors(&b);

    let start_a = bottom_left_vertex(&a);
    let start_b = bottom_left_vertex(&b);

    let merged = merge_edge_vectors(&edges_a, start_a, &edges_b, start_b);

    let mut current = a[start_a] + b[start_b];
    let mut result = Vec::with_capacity(merged.len() + 1);
    result.push(current);
    for edge in &merged {
        current = current + *edge;
        result.push(current);
    }

    if result.len() > 1 && result[0].distance_to(&result[result.len() - 1]) < 1e-10 {
        result.pop();
    }
    result
}

fn edge_vectors(polygon: &[Point]) -> Vec<Point> {
    let n = polygon.len();
    (0..n).map(|i| polygon[(i + 1) % n] - polygon[i]).collect()
}

fn bottom_left_vertex(polygon: &[Point]) -> usize {
    let mut min_idx = 0;
    for (i, p) in polygon.iter().enumerate() {
        let m = polygon[min_idx];
        if p.y < m.y || (p.y == m.y && p.x < m.x) {
            min_idx = i;
        }
    }
    min_idx
}

fn edge_angle(v: Point) -> f64 {
    let angle = v.y.atan2(v.x);
    if angle < 0.0 {
        angle + 2.0 * PI
    } else {
        angle
    }
}

fn merge_edge_vectors(edges_a: &[Point], start_a: usize, edges_b: &[Point], start_b: usize) -> Vec<Point> {
    let (n_a, n_b) = (edges_a.len(), edges_b.len());
    let mut result = Vec::with_capacity(n_a + n_b);
    let (mut i_a, mut i_b) = (0, 0);

    while i_a < n_a || i_b < n_b {
        if i_a >= n_a {
            result.push(edges_b[(start_b + i_b) % n_b]);
            i_b += 1;
        } else if i_b >= n_b {
            result.push(edges_a[(start_a + i_a) % n_a]);
            i_a += 1;
        } else {
            let ea = edges_a[(start_a + i_a) % n_a];
            let eb = edges_b[(start_b + i_b) % n_b];
            let (angle_a, angle_b) = (edge_angle(ea), edge_angle(eb));
            if angle_a <= angle_b + 1e-10 {
                result.push(ea);
                i_a += 1;
            }
            if angle_b <= angle_a + 1e-10 {
                result.push(eb);
                i_b += 1;
            }
        }
    }
    result
}

/// Ear-clipping triangulation of a simple counter-clockwise loop.
///
/// Collinear vertices are dropped as they appear. Returns `None` when no ear
/// can be found.
fn triangulate(polygon: &[Point]) -> Option<Vec<Vec<Point>>> {
    if polygon.len() < 3 {
        return None;
    }
    if is_convex_loop(polygon) {
        return Some(vec![polygon.to_vec()]);
    }

    let mut vertices = oriented(polygon.to_vec(), true);
    let mut triangles = Vec::with_capacity(vertices.len().saturating_sub(2));

    while vertices.len() > 3 {
        let n = vertices.len();

        let collinear = (0..n).find(|&i| {
            let (prev, next) = (vertices[(i + n - 1) % n], vertices[(i + 1) % n]);
            orient2d(prev.tuple(), vertices[i].tuple(), next.tuple()).is_collinear()
        });
        if let Some(i) = collinear {
            vertices.remove(i);
            continue;
        }

        let ear = (0..n).find(|&i| is_ear(&vertices, (i + n - 1) % n, i, (i + 1) % n))?;
        let prev = (ear + n - 1) % n;
        let next = (ear + 1) % n;
        triangles.push(vec![vertices[prev], vertices[ear], vertices[next]]);
        vertices.remove(ear);
    }

    if vertices.len() == 3
        && !orient2d(vertices[0].tuple(), vertices[1].tuple(), vertices[2].tuple()).is_collinear()
    {
        triangles.push(vertices);
    }
    Some(triangles)
}

fn is_ear(vertices: &[Point], prev: usize, curr: usize, next: usize) -> bool {
    let (a, b, c) = (vertices[prev], vertices[curr], vertices[next]);
    if !orient2d(a.tuple(), b.tuple(), c.tuple()).is_ccw() {
        return false;
    }
    vertices.iter().enumerate().all(|(i, p)| {
        i == prev
            || i == curr
            || i == next
            || [a, b, c].iter().any(|v| v.distance_to(p) <= VERTEX_EPSILON)
            || !point_in_triangle_inclusive_robust(p.tuple(), a.tuple(), b.tuple(), c.tuple())
    })
}

// ============================================================================
// Inner fit
// ============================================================================

/// Axis-aligned rectangle of legal reference points for a part on the sheet.
///
/// May have zero width or height when the part fits exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InnerFit {
    /// Minimum reference x.
    pub min_x: f64,
    /// Minimum reference y.
    pub min_y: f64,
    /// Maximum reference x.
    pub max_x: f64,
    /// Maximum reference y.
    pub max_y: f64,
}

impl InnerFit {
    /// Width of the legal range.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the legal range.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Returns true if `p` is a legal reference point, allowing `eps` of slack.
    pub fn contains(&self, p: Point, eps: f64) -> bool {
        p.x >= self.min_x - eps
            && p.x <= self.max_x + eps
            && p.y >= self.min_y - eps
            && p.y <= self.max_y + eps
    }

    /// Nearest legal reference point.
    pub fn clamp(&self, p: Point) -> Point {
        Point::new(
            p.x.clamp(self.min_x, self.max_x),
            p.y.clamp(self.min_y, self.max_y),
        )
    }

    /// Distinct corners, bottom-left first.
    pub fn corners(&self) -> Vec<Point> {
        let mut corners = vec![Point::new(self.min_x, self.min_y)];
        for p in [
            Point::new(self.max_x, self.min_y),
            Point::new(self.min_x, self.max_y),
            Point::new(self.max_x, self.max_y),
        ] {
            if corners.iter().all(|c| c.distance_to(&p) > VERTEX_EPSILON) {
                corners.push(p);
            }
        }
        corners
    }

    /// As a bounding box.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }

    /// As a polygon, `None` when the range has no area.
    pub fn to_polygon(&self) -> Option<Polygon> {
        if self.width() <= VERTEX_EPSILON || self.height() <= VERTEX_EPSILON {
            return None;
        }
        Polygon::new([
            (self.min_x, self.min_y),
            (self.max_x, self.min_y),
            (self.max_x, self.max_y),
            (self.min_x, self.max_y),
        ])
        .ok()
    }
}

/// Legal reference points for `polygon` rotated by `rotation` inside `usable`,
/// keeping half the spacing clear of the sheet edge. `None` if it cannot fit.
pub fn compute_inner_fit(
    usable: &BoundingBox,
    polygon: &Polygon,
    rotation: f64,
    spacing: f64,
) -> Option<InnerFit> {
    let bb = rotated(polygon, rotation).bounding_box();
    inner_fit_for_bbox(usable, &bb, spacing)
}

/// Inner fit from a part's rotated local bounding box.
pub(crate) fn inner_fit_for_bbox(usable: &BoundingBox, bb: &BoundingBox, spacing: f64) -> Option<InnerFit> {
    let half = spacing / 2.0;
    let mut fit = InnerFit {
        min_x: usable.min_x - bb.min_x + half,
        min_y: usable.min_y - bb.min_y + half,
        max_x: usable.max_x - bb.max_x - half,
        max_y: usable.max_y - bb.max_y - half,
    };

    const SLACK: f64 = 1e-9;
    if fit.min_x > fit.max_x + SLACK || fit.min_y > fit.max_y + SLACK {
        return None;
    }
    fit.max_x = fit.max_x.max(fit.min_x);
    fit.max_y = fit.max_y.max(fit.min_y);
    Some(fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(size: f64) -> Polygon {
        Polygon::rectangle(size, size).unwrap()
    }

    fn l_shape() -> Polygon {
        Polygon::new([
            (0.0, 0.0),
            (20.0, 0.0),
            (20.0, 10.0),
            (10.0, 10.0),
            (10.0, 20.0),
            (0.0, 20.0),
        ])
        .unwrap()
    }

    fn frame() -> Polygon {
        Polygon::with_holes(
            [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)],
            vec![vec![(25.0, 25.0), (75.0, 25.0), (75.0, 75.0), (25.0, 75.0)]],
        )
        .unwrap()
    }

    fn engine() -> NfpEngine {
        NfpEngine::new(Arc::new(NfpCache::new()))
    }

    fn near_boundary(nfp: &Nfp, p: Point, tol: f64) -> bool {
        nfp.shapes().iter().any(|s| {
            s.loops().any(|l| {
                crate::geometry::loop_edges(l)
                    .any(|(a, b)| crate::geometry::point_segment_distance(p, a, b) < tol)
            })
        })
    }

    /// Compares NFP containment with direct intersection on a sample grid.
    fn assert_agrees_with_intersection(a: &Polygon, b: &Polygon, nfp: &Nfp) {
        let bb = nfp.bounding_box().unwrap().expand(3.0);
        let mut checked = 0;
        let mut y = bb.min_y + 0.37;
        while y < bb.max_y {
            let mut x = bb.min_x + 0.41;
            while x < bb.max_x {
                let p = Point::new(x, y);
                if !near_boundary(nfp, p, 0.05) {
                    let moved = b.translate(x, y);
                    assert_eq!(
                        nfp.contains(p),
                        a.intersects(&moved),
                        "disagreement at ({}, {})",
                        x,
                        y
                    );
                    checked += 1;
                }
                x += 1.7;
            }
            y += 1.7;
        }
        assert!(checked > 50);
    }

    #[test]
    fn test_nfp_two_squares() {
        let nfp = engine().compute(&square(10.0), &square(5.0), 0.0, 0.0);
        assert_eq!(nfp.fidelity(), NfpFidelity::Exact);
        assert_eq!(nfp.shapes().len(), 1);

        let bb = nfp.bounding_box().unwrap();
        assert_relative_eq!(bb.min_x, -5.0, epsilon = 1e-9);
        assert_relative_eq!(bb.max_x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(nfp.area(), 225.0, epsilon = 1e-6);

        assert!(nfp.contains(Point::new(0.0, 0.0)));
        assert!(!nfp.contains(Point::new(10.0, 0.0)));
        assert!(!nfp.contains(Point::new(-5.0, -5.0)));
        assert!(!nfp.contains(Point::new(11.0, 0.0)));
    }

    #[test]
    fn test_nfp_with_rotation() {
        let rect = Polygon::rectangle(20.0, 5.0).unwrap();
        let nfp = engine().compute(&square(10.0), &rect, 0.0, 90.0);
        // Rotated rect occupies [-5, 0] x [0, 20].
        let bb = nfp.bounding_box().unwrap();
        assert_relative_eq!(bb.min_x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(bb.max_x, 15.0, epsilon = 1e-9);
        assert_relative_eq!(bb.min_y, -20.0, epsilon = 1e-9);
        assert_relative_eq!(bb.max_y, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_concave_nfp_matches_intersection() {
        let e = engine();
        let l = l_shape();
        let sq = square(6.0);
        assert_agrees_with_intersection(&l, &sq, &e.compute_uncached(&l, &sq, 0.0, 0.0));
        assert_agrees_with_intersection(&sq, &l, &e.compute_uncached(&sq, &l, 0.0, 0.0));

        let l2 = l.rotate(180.0, Point::default());
        let nfp = e.compute_uncached(&l, &l, 0.0, 180.0);
        assert_eq!(nfp.fidelity(), NfpFidelity::Exact);
        assert_agrees_with_intersection(&l, &l2, &nfp);
    }

    #[test]
    fn test_spacing_grows_region() {
        let e = engine().with_spacing(2.0);
        let nfp = e.compute(&square(10.0), &square(10.0), 0.0, 0.0);
        let bb = nfp.bounding_box().unwrap();
        assert_relative_eq!(bb.min_x, -12.0, epsilon = 1e-6);
        assert_relative_eq!(bb.max_x, 12.0, epsilon = 1e-6);

        assert!(nfp.contains(Point::new(11.9, 0.0)));
        assert!(!nfp.contains(Point::new(12.1, 0.0)));
        assert!(nfp.contains(Point::new(11.3, 11.3)));
        assert!(!nfp.contains(Point::new(11.8, 11.8)));
    }

    #[test]
    fn test_part_inside_hole_void_and_solid() {
        let void = engine();
        let nfp = void.compute(&frame(), &square(20.0), 0.0, 0.0);
        assert!(!nfp.contains(Point::new(40.0, 40.0)));
        assert!(nfp.contains(Point::new(20.0, 40.0)));
        assert!(nfp.contains(Point::new(5.0, 5.0)));

        let solid = engine().with_hole_mode(HoleMode::Solid);
        let nfp = solid.compute(&frame(), &square(20.0), 0.0, 0.0);
        assert!(nfp.contains(Point::new(40.0, 40.0)));
    }

    #[test]
    fn test_stationary_inside_orbiting_hole() {
        let nfp = engine().compute(&square(20.0), &frame(), 0.0, 0.0);
        assert!(!nfp.contains(Point::new(-40.0, -40.0)));
        assert!(nfp.contains(Point::new(-10.0, -10.0)));

        let solid = engine().with_hole_mode(HoleMode::Solid);
        assert!(solid
            .compute(&square(20.0), &frame(), 0.0, 0.0)
            .contains(Point::new(-40.0, -40.0)));
    }

    #[test]
    fn test_convex_hull_method_is_flagged_superset() {
        let exact = engine().compute(&l_shape(), &square(5.0), 0.0, 0.0);
        let hull = engine()
            .with_method(NfpMethod::ConvexHull)
            .compute(&l_shape(), &square(5.0), 0.0, 0.0);
        assert_eq!(hull.fidelity(), NfpFidelity::ConvexHull);
        assert!(hull.area() > exact.area());
        // Inside the notch: free for the exact region, blocked by the hull.
        let notch = Point::new(14.0, 14.0);
        assert!(!exact.contains(notch));
        assert!(hull.contains(notch));
    }

    #[test]
    fn test_bounding_box_fallback() {
        let nfp = bounding_box_nfp(&square(10.0), &square(5.0), 1.0);
        assert_eq!(nfp.fidelity(), NfpFidelity::BoundingBox);
        let bb = nfp.bounding_box().unwrap();
        assert_relative_eq!(bb.min_x, -6.0);
        assert_relative_eq!(bb.max_x, 11.0);
    }

    #[test]
    fn test_cache_returns_same_instance() {
        let e = engine();
        let first = e.compute(&l_shape(), &square(5.0), 0.0, 90.0);
        let second = e.compute(&l_shape(), &square(5.0), 0.0, 90.0);
        assert!(Arc::ptr_eq(&first, &second));

        let stats = e.cache().stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
        assert_relative_eq!(stats.hit_rate(), 0.5);

        e.cache().clear();
        assert!(e.cache().is_empty());
        assert_eq!(e.cache().stats().hits, 0);
    }

    #[test]
    fn test_cache_key_distinguishes_settings() {
        let sig = ShapeSignature::of(&square(5.0));
        let base = NfpCacheKey::new(sig, sig, 0.0, 0.0);
        assert_eq!(base, NfpCacheKey::new(sig, sig, 360.0, 0.04));
        assert_ne!(base, base.with_spacing(1.0));
        assert_ne!(base, base.with_holes(HoleMode::Solid));
        assert_ne!(base, base.with_method(NfpMethod::ConvexHull));
        assert_ne!(base, NfpCacheKey::new(sig, sig, 90.0, 0.0));
    }

    #[test]
    fn test_shape_signature() {
        let a = square(10.0);
        let b = Polygon::new([(10.0, 10.0), (0.0, 10.0), (0.0, 0.0), (10.0, 0.0)]).unwrap();
        assert_eq!(ShapeSignature::of(&a), ShapeSignature::of(&b));
        assert_ne!(ShapeSignature::of(&a), ShapeSignature::of(&a.translate(1.0, 0.0)));
        assert_ne!(ShapeSignature::of(&a), ShapeSignature::of(&frame()));
    }

    #[test]
    fn test_quantize_rotation() {
        assert_eq!(quantize_rotation(0.0), 0);
        assert_eq!(quantize_rotation(359.96), 0);
        assert_eq!(quantize_rotation(-90.0), 2700);
        assert_eq!(quantize_rotation(45.04), 450);
    }

    #[test]
    fn test_triangulate_l_shape() {
        let tris = triangulate(l_shape().outer()).unwrap();
        let area: f64 = tris
            .iter()
            .map(|t| crate::geometry::loop_signed_area(t).abs())
            .sum();
        assert_relative_eq!(area, 300.0, epsilon = 1e-9);
        assert!(tris.iter().all(|t| t.len() == 3));
    }

    #[test]
    fn test_convex_minkowski_of_squares() {
        let sum = convex_minkowski(square(2.0).outer(), square(3.0).outer());
        assert_eq!(sum.len(), 4);
        assert_relative_eq!(crate::geometry::loop_signed_area(&sum), 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_inner_fit() {
        let usable = BoundingBox::new(0.0, 0.0, 100.0, 50.0);
        let rect = Polygon::rectangle(20.0, 10.0).unwrap();

        let fit = compute_inner_fit(&usable, &rect, 0.0, 0.0).unwrap();
        assert_relative_eq!(fit.max_x, 80.0);
        assert_relative_eq!(fit.max_y, 40.0);

        let fit = compute_inner_fit(&usable, &rect, 90.0, 0.0).unwrap();
        assert_relative_eq!(fit.min_x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(fit.max_x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(fit.max_y, 30.0, epsilon = 1e-9);

        let spaced = compute_inner_fit(&usable, &rect, 0.0, 2.0).unwrap();
        assert_relative_eq!(spaced.min_x, 1.0);
        assert_relative_eq!(spaced.max_x, 79.0);

        let big = Polygon::rectangle(120.0, 10.0).unwrap();
        assert!(compute_inner_fit(&usable, &big, 0.0, 0.0).is_none());

        let exact = Polygon::rectangle(100.0, 50.0).unwrap();
        let fit = compute_inner_fit(&usable, &exact, 0.0, 0.0).unwrap();
        assert_eq!(fit.corners().len(), 1);
        assert!(fit.to_polygon().is_none());
        assert!(fit.contains(Point::new(0.0, 0.0), 1e-9));
    }
}
