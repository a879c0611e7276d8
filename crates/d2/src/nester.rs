//! Candidate generation and greedy bottom-left fill.
//!
//! Every constructive strategy places parts through [`CandidateGenerator`]:
//! it enumerates reference points per allowed rotation, orders them
//! bottom-then-left, validates them through the collision detector and
//! keeps the best composite scores.

use std::collections::HashSet;

use kerfnest_core::robust::snap_to_grid;
use kerfnest_core::{BudgetTracker, PlacedPart, ProgressInfo, Result, Solution, StrategyKind};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::catalog::{CatalogEntry, PartCatalog, PartInstance};
use crate::geometry::{BoundingBox, Point, BOUNDARY_EPSILON};
use crate::layout::{Layout, PlacedShape};
use crate::nfp::{inner_fit_for_bbox, InnerFit};
use crate::strategy::{restart_seed, with_thread_pool, NestContext, PlacementStrategy};

/// Weight of the top edge height relative to the left edge in the position score.
pub const BOTTOM_WEIGHT: f64 = 10.0;

/// Resolution at which candidate reference points are deduplicated, in mm.
const DEDUP_RESOLUTION: f64 = 1e-6;

/// A validated placement with its scores.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    /// Realized placement.
    pub shape: PlacedShape,
    /// Bottom-then-left position score; lower is better.
    pub position_score: f64,
    /// Position score minus the proximity bonus; lower is better.
    pub score: f64,
}

#[derive(Debug, Clone, Copy)]
struct RawCandidate {
    position_score: f64,
    rotation_index: usize,
    point: Point,
}

/// Finds collision-free placements for one part at a time.
#[derive(Debug, Clone, Copy)]
pub struct CandidateGenerator<'a> {
    ctx: &'a NestContext,
    grid_step: f64,
    max_positions: usize,
    max_candidates: usize,
}

impl<'a> CandidateGenerator<'a> {
    /// Creates a generator at the configured resolution.
    pub fn new(ctx: &'a NestContext) -> Self {
        let config = ctx.config();
        Self {
            ctx,
            grid_step: config.grid_step,
            max_positions: config.max_search_positions,
            max_candidates: config.max_candidates,
        }
    }

    /// Overrides the grid step and the per-axis sample cap.
    pub fn with_resolution(mut self, grid_step: f64, max_positions: usize) -> Self {
        self.grid_step = grid_step;
        self.max_positions = max_positions.max(2);
        self
    }

    /// Context the generator reads from.
    pub fn context(&self) -> &'a NestContext {
        self.ctx
    }

    /// Grid step in use.
    pub fn grid_step(&self) -> f64 {
        self.grid_step
    }

    /// Best placement of `instance` over all its allowed rotations.
    pub fn best(&self, layout: &Layout, instance: PartInstance) -> Option<ScoredCandidate> {
        let entry = self.ctx.catalog().get(instance.part_index)?;
        let all: Vec<usize> = (0..entry.rotations().len()).collect();
        self.search(layout, instance, &all, 1).into_iter().next()
    }

    /// Best placement using only the given rotation indices.
    pub fn best_with_rotations(
        &self,
        layout: &Layout,
        instance: PartInstance,
        rotation_indices: &[usize],
    ) -> Option<ScoredCandidate> {
        self.search(layout, instance, rotation_indices, 1)
            .into_iter()
            .next()
    }

    /// Up to `m` best placements of `instance`, best first.
    pub fn top(&self, layout: &Layout, instance: PartInstance, m: usize) -> Vec<ScoredCandidate> {
        let Some(entry) = self.ctx.catalog().get(instance.part_index) else {
            return Vec::new();
        };
        let all: Vec<usize> = (0..entry.rotations().len()).collect();
        self.search(layout, instance, &all, m.max(1))
    }

    fn position_score(&self, bb: &BoundingBox, point: Point) -> f64 {
        let usable = self.ctx.detector().usable();
        BOTTOM_WEIGHT * (point.y + bb.max_y - usable.min_y) + (point.x + bb.min_x - usable.min_x)
    }

    fn search(
        &self,
        layout: &Layout,
        instance: PartInstance,
        rotation_indices: &[usize],
        keep: usize,
    ) -> Vec<ScoredCandidate> {
        let catalog = self.ctx.catalog();
        let Some(entry) = catalog.get(instance.part_index) else {
            return Vec::new();
        };
        let detector = self.ctx.detector();
        let compactness = self.ctx.config().compactness_weight;

        let mut raw = Vec::new();
        let mut ideal = f64::INFINITY;
        let mut seen = HashSet::new();
        for &ri in rotation_indices {
            if ri >= entry.rotations().len() {
                continue;
            }
            let bb = entry.bbox_at(ri);
            let Some(fit) = inner_fit_for_bbox(detector.usable(), &bb, detector.spacing()) else {
                continue;
            };
            ideal = ideal.min(self.position_score(&bb, Point::new(fit.min_x, fit.min_y)));
            for point in self.reference_points(layout, entry, ri, &bb, &fit) {
                let (sx, sy) = snap_to_grid((point.x, point.y), DEDUP_RESOLUTION);
                let key = (
                    ri,
                    (sx / DEDUP_RESOLUTION).round() as i64,
                    (sy / DEDUP_RESOLUTION).round() as i64,
                );
                if seen.insert(key) {
                    raw.push(RawCandidate {
                        position_score: self.position_score(&bb, point),
                        rotation_index: ri,
                        point,
                    });
                }
            }
        }

        raw.sort_by(|a, b| {
            a.position_score
                .total_cmp(&b.position_score)
                .then(a.rotation_index.cmp(&b.rotation_index))
                .then(a.point.x.total_cmp(&b.point.x))
                .then(a.point.y.total_cmp(&b.point.y))
        });

        let good_enough = ideal - compactness + self.ctx.config().good_enough_threshold;
        let limit = self.max_candidates.max(keep);
        let mut valid: Vec<(ScoredCandidate, usize)> = Vec::new();
        let mut best_score = f64::INFINITY;

        for candidate in &raw {
            // The proximity bonus never exceeds `compactness`.
            if keep == 1 && candidate.position_score - compactness >= best_score {
                break;
            }

            let placement = PlacedPart::new(
                entry.id().clone(),
                instance.part_index,
                instance.instance,
                candidate.point.x,
                candidate.point.y,
                entry.rotations()[candidate.rotation_index],
            );
            let shape = PlacedShape::new(entry, placement);
            if !detector.can_place_shape(catalog, &shape, layout) {
                continue;
            }

            let bonus = layout
                .nearest_gap(&shape.bbox)
                .map_or(0.0, |gap| compactness / (1.0 + gap.max(0.0)));
            let score = candidate.position_score - bonus;
            best_score = best_score.min(score);
            valid.push((
                ScoredCandidate {
                    shape,
                    position_score: candidate.position_score,
                    score,
                },
                candidate.rotation_index,
            ));

            if score <= good_enough || valid.len() >= limit {
                break;
            }
        }

        trace!(
            "part {} copy {}: {} raw candidates, {} valid",
            entry.id(),
            instance.instance,
            raw.len(),
            valid.len()
        );

        valid.sort_by(|(a, ra), (b, rb)| {
            a.score
                .total_cmp(&b.score)
                .then(ra.cmp(rb))
                .then(a.shape.placement.x.total_cmp(&b.shape.placement.x))
                .then(a.shape.placement.y.total_cmp(&b.shape.placement.y))
        });
        valid.truncate(keep);
        valid.into_iter().map(|(c, _)| c).collect()
    }

    /// Reference points worth testing for one rotation: the inner-fit
    /// corners, NFP vertices of placed parts, placed boxes' corners projected
    /// onto the inner fit, and a bounded grid.
    fn reference_points(
        &self,
        layout: &Layout,
        entry: &CatalogEntry,
        rotation_index: usize,
        bb: &BoundingBox,
        fit: &InnerFit,
    ) -> Vec<Point> {
        let catalog = self.ctx.catalog();
        let engine = self.ctx.engine();
        let spacing = self.ctx.detector().spacing();
        let rotation = entry.rotations()[rotation_index];

        let mut points = fit.corners();

        for placed in layout.placed() {
            let Some(stationary) = catalog.entry(&placed.placement) else {
                continue;
            };
            let nfp = engine.compute_signed(
                stationary.polygon(),
                stationary.signature(),
                entry.polygon(),
                entry.signature(),
                placed.placement.rotation,
                rotation,
            );
            let origin = Point::new(placed.placement.x, placed.placement.y);
            points.extend(
                nfp.vertices()
                    .into_iter()
                    .map(|v| origin + v)
                    .filter(|p| fit.contains(*p, BOUNDARY_EPSILON))
                    .map(|p| fit.clamp(p)),
            );

            let right = placed.bbox.max_x + spacing - bb.min_x;
            let above = placed.bbox.max_y + spacing - bb.min_y;
            let left_aligned = placed.bbox.min_x - bb.min_x;
            let bottom_aligned = placed.bbox.min_y - bb.min_y;
            for (x, y) in [
                (right, bottom_aligned),
                (left_aligned, above),
                (right, fit.min_y),
                (fit.min_x, above),
            ] {
                points.push(fit.clamp(Point::new(x, y)));
            }
        }

        let axis = |min: f64, extent: f64| -> Vec<f64> {
            if extent <= BOUNDARY_EPSILON {
                return vec![min];
            }
            let n = ((extent / self.grid_step).ceil() as usize + 1).clamp(2, self.max_positions);
            let step = extent / (n - 1) as f64;
            (0..n).map(|i| min + step * i as f64).collect()
        };
        let xs = axis(fit.min_x, fit.width());
        let ys = axis(fit.min_y, fit.height());
        for &y in &ys {
            for &x in &xs {
                points.push(Point::new(x, y));
            }
        }

        points
    }
}

/// Places `instances` in order, returning those that found no position.
///
/// With a tracker, each part costs one iteration; once the budget refuses,
/// the remaining parts are returned as unplaced.
pub fn place_sequence(
    generator: &CandidateGenerator<'_>,
    layout: &mut Layout,
    instances: &[PartInstance],
    mut tracker: Option<&mut BudgetTracker>,
) -> Vec<PartInstance> {
    let detector = generator.context().detector();
    let mut unplaced = Vec::new();

    for (i, &instance) in instances.iter().enumerate() {
        if let Some(t) = tracker.as_deref_mut() {
            if !t.tick() {
                unplaced.extend_from_slice(&instances[i..]);
                break;
            }
        }

        match generator.best(layout, instance) {
            Some(candidate) => {
                detector.commit(candidate.shape, layout);
            }
            None => {
                debug!(
                    "no valid position for part index {} copy {}",
                    instance.part_index, instance.instance
                );
                unplaced.push(instance);
            }
        }

        if let Some(t) = tracker.as_deref() {
            t.report(
                ProgressInfo::new()
                    .with_phase("bottom-left fill")
                    .with_items(layout.len(), instances.len()),
            );
        }
    }

    unplaced
}

/// The part order one bottom-left fill start places copies in.
///
/// Start 0 always uses processing order. Later starts try size-based orders
/// and then seeded shuffles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOrder {
    /// Hardest first, then largest.
    Processing,
    /// Largest area first.
    AreaDescending,
    /// Smallest area first.
    AreaAscending,
    /// Longest outline first.
    PerimeterDescending,
    /// Widest bounding box first.
    WidthDescending,
    /// Tallest bounding box first.
    HeightDescending,
    /// Processing order shuffled with the given seed.
    Shuffled(u64),
}

impl StartOrder {
    /// Deterministic orders tried before falling back to shuffles.
    const FIXED: [StartOrder; 6] = [
        StartOrder::Processing,
        StartOrder::AreaDescending,
        StartOrder::AreaAscending,
        StartOrder::PerimeterDescending,
        StartOrder::WidthDescending,
        StartOrder::HeightDescending,
    ];

    /// Order of start `index` for a run seeded with `seed`.
    pub fn for_start(index: usize, seed: u64) -> Self {
        Self::FIXED
            .get(index)
            .copied()
            .unwrap_or_else(|| StartOrder::Shuffled(restart_seed(seed, index)))
    }

    /// Reorders processing-ordered `instances`. Sorts are stable, so copies
    /// that compare equal keep their processing order.
    pub fn arrange(self, catalog: &PartCatalog, instances: &[PartInstance]) -> Vec<PartInstance> {
        let mut order = instances.to_vec();
        let key = |instance: &PartInstance| -> f64 {
            let Some(f) = catalog.get(instance.part_index).map(|e| e.features()) else {
                return 0.0;
            };
            match self {
                StartOrder::AreaDescending => -f.area,
                StartOrder::AreaAscending => f.area,
                StartOrder::PerimeterDescending => -f.perimeter,
                StartOrder::WidthDescending => -f.bbox_width,
                StartOrder::HeightDescending => -f.bbox_height,
                StartOrder::Processing | StartOrder::Shuffled(_) => 0.0,
            }
        };
        match self {
            StartOrder::Processing => {}
            StartOrder::Shuffled(seed) => order.shuffle(&mut StdRng::seed_from_u64(seed)),
            _ => order.sort_by(|a, b| key(a).total_cmp(&key(b))),
        }
        order
    }
}

/// Greedy bottom-left fill.
///
/// The first start places copies in processing order. With
/// `NestConfig::restarts > 1`, further starts with other orders run in
/// parallel on what is left of the budget, and the best refinement score
/// wins. Ties go to the lowest start index.
#[derive(Debug, Clone, Copy, Default)]
pub struct BottomLeftFill;

impl PlacementStrategy for BottomLeftFill {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BottomLeftFill
    }

    fn place(&self, ctx: &NestContext, tracker: &mut BudgetTracker) -> Result<Solution> {
        let config = ctx.config();
        let generator = CandidateGenerator::new(ctx);
        let instances = ctx.catalog().instances();

        let mut layout = ctx.new_layout();
        let mut unplaced = place_sequence(&generator, &mut layout, &instances, Some(&mut *tracker));

        let starts = config.restarts.max(1);
        if starts == 1 || instances.is_empty() || tracker.is_exhausted() {
            return Ok(ctx.finish(&layout, &unplaced, self.kind(), tracker));
        }

        let workers = tracker.split(starts - 1);
        let runs: Vec<(Layout, Vec<PartInstance>, BudgetTracker)> = with_thread_pool(config.threads, || {
            (1..starts)
                .into_par_iter()
                .zip(workers.into_par_iter())
                .map(|(index, mut worker)| {
                    let order = StartOrder::for_start(index, config.seed).arrange(ctx.catalog(), &instances);
                    let mut layout = ctx.new_layout();
                    let missed = place_sequence(&generator, &mut layout, &order, Some(&mut worker));
                    (layout, missed, worker)
                })
                .collect()
        });

        let mut best_score = ctx.refinement_score(&layout, unplaced.len());
        let mut best_index = 0;
        for (offset, (candidate, missed, worker)) in runs.into_iter().enumerate() {
            tracker.absorb(&worker);
            let score = ctx.refinement_score(&candidate, missed.len());
            if score > best_score {
                best_score = score;
                best_index = offset + 1;
                layout = candidate;
                unplaced = missed;
            }
        }
        debug!(
            "BLF starts: {}, best from start {} ({:?}) with score {:.3}",
            starts,
            best_index,
            StartOrder::for_start(best_index, config.seed),
            best_score
        );

        Ok(ctx.finish(&layout, &unplaced, self.kind(), tracker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PartCatalog;
    use crate::config::NestConfig;
    use crate::constraints::{Constraints, RotationSet, SpacingConstraints};
    use crate::geometry::Polygon;
    use crate::nfp::NfpCache;
    use crate::part::Part;
    use crate::sheet::Sheet;
    use approx::assert_relative_eq;
    use kerfnest_core::Budget;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn context(parts: Vec<Part>, sheet: Sheet, spacing: f64, rotations: RotationSet) -> NestContext {
        context_with(parts, sheet, spacing, rotations, NestConfig::default())
    }

    fn context_with(
        parts: Vec<Part>,
        sheet: Sheet,
        spacing: f64,
        rotations: RotationSet,
        config: NestConfig,
    ) -> NestContext {
        let constraints = Constraints::new(sheet)
            .with_spacing(SpacingConstraints::new(spacing, 0.0))
            .with_rotations(rotations);
        let catalog = Arc::new(PartCatalog::new(parts, &constraints).unwrap());
        NestContext::new(catalog, constraints, config, Arc::new(NfpCache::new())).unwrap()
    }

    fn crowded(config: NestConfig) -> NestContext {
        context_with(
            vec![
                Part::rectangle("wide", 90.0, 25.0).unwrap().with_quantity(3),
                Part::l_shape("L", 60.0, 50.0, 20.0, 20.0).unwrap().with_quantity(3),
                Part::rectangle("sq", 30.0, 30.0).unwrap().with_quantity(4),
            ],
            Sheet::new(200.0, 120.0).with_margin(0.0),
            1.0,
            RotationSet::new([0.0, 90.0]).unwrap(),
            config,
        )
    }

    fn total_score(ctx: &NestContext, solution: &Solution) -> f64 {
        let mut layout = ctx.new_layout();
        for placement in &solution.placements {
            let shape = ctx.detector().realize(ctx.catalog(), placement).unwrap();
            ctx.detector().commit(shape, &mut layout);
        }
        ctx.refinement_score(&layout, solution.unplaced.len())
    }

    #[test]
    fn test_first_part_goes_bottom_left() {
        let ctx = context(
            vec![Part::rectangle("r", 40.0, 20.0).unwrap()],
            Sheet::new(200.0, 100.0).with_margin(5.0),
            2.0,
            RotationSet::no_rotation(),
        );
        let generator = CandidateGenerator::new(&ctx);
        let layout = ctx.new_layout();
        let best = generator
            .best(&layout, PartInstance { part_index: 0, instance: 0 })
            .unwrap();
        assert_relative_eq!(best.shape.placement.x, 6.0, epsilon = 1e-9);
        assert_relative_eq!(best.shape.placement.y, 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rotation_lowers_the_top_edge() {
        let ctx = context(
            vec![Part::rectangle("tall", 10.0, 40.0).unwrap()],
            Sheet::new(200.0, 100.0).with_margin(0.0),
            0.0,
            RotationSet::new([0.0, 90.0]).unwrap(),
        );
        let generator = CandidateGenerator::new(&ctx);
        let best = generator
            .best(&ctx.new_layout(), PartInstance { part_index: 0, instance: 0 })
            .unwrap();
        assert_relative_eq!(best.shape.placement.rotation, 90.0);
        assert_relative_eq!(best.shape.bbox.max_y, 10.0, epsilon = 1e-9);
        assert_relative_eq!(best.shape.bbox.min_x, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_parts_pack_along_the_bottom() {
        let ctx = context(
            vec![Part::rectangle("r", 50.0, 30.0).unwrap().with_quantity(4)],
            Sheet::new(200.0, 100.0).with_margin(0.0),
            0.0,
            RotationSet::no_rotation(),
        );
        let mut tracker = BudgetTracker::unlimited();
        let solution = BottomLeftFill.place(&ctx, &mut tracker).unwrap();
        assert_eq!(solution.placements.len(), 4);
        assert!(solution.unplaced.is_empty());
        for p in &solution.placements {
            assert_relative_eq!(p.y, 0.0, epsilon = 1e-9);
        }
        assert_relative_eq!(solution.utilization, 0.30, epsilon = 1e-9);
        assert!(ctx.verify(&solution));
    }

    #[test]
    fn test_part_fills_hole_of_frame() {
        let frame = Part::new(
            "frame",
            Polygon::with_holes(
                [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)],
                vec![vec![(20.0, 20.0), (80.0, 20.0), (80.0, 80.0), (20.0, 80.0)]],
            )
            .unwrap(),
        );
        let ctx = context(
            vec![frame, Part::rectangle("small", 40.0, 40.0).unwrap()],
            Sheet::new(100.0, 100.0).with_margin(0.0),
            0.0,
            RotationSet::no_rotation(),
        );
        let mut tracker = BudgetTracker::unlimited();
        let solution = BottomLeftFill.place(&ctx, &mut tracker).unwrap();
        assert_eq!(solution.placements.len(), 2);
        let small = solution.placements.iter().find(|p| p.part_id == "small").unwrap();
        assert!(small.x >= 20.0 - 1e-6 && small.x <= 40.0 + 1e-6);
        assert!(small.y >= 20.0 - 1e-6 && small.y <= 40.0 + 1e-6);
    }

    #[test]
    fn test_top_returns_distinct_candidates() {
        let ctx = context(
            vec![Part::rectangle("r", 20.0, 20.0).unwrap().with_quantity(2)],
            Sheet::new(200.0, 100.0).with_margin(0.0),
            0.0,
            RotationSet::no_rotation(),
        );
        let generator = CandidateGenerator::new(&ctx);
        let top = generator.top(&ctx.new_layout(), PartInstance { part_index: 0, instance: 0 }, 5);
        assert_eq!(top.len(), 5);
        for w in top.windows(2) {
            assert!(w[0].score <= w[1].score);
        }
    }

    #[test]
    fn test_budget_stops_sequence() {
        let ctx = context(
            vec![Part::rectangle("r", 10.0, 10.0).unwrap().with_quantity(5)],
            Sheet::new(200.0, 100.0).with_margin(0.0),
            0.0,
            RotationSet::no_rotation(),
        );
        let mut tracker = BudgetTracker::new(Budget::iterations(2), Arc::new(AtomicBool::new(false)));
        let solution = BottomLeftFill.place(&ctx, &mut tracker).unwrap();
        assert_eq!(solution.placements.len(), 2);
        assert_eq!(solution.unplaced.len(), 3);
        assert!(solution.budget_limited);
    }

    #[test]
    fn test_oversized_part_is_unplaced() {
        let ctx = context(
            vec![Part::rectangle("big", 300.0, 50.0).unwrap()],
            Sheet::new(200.0, 100.0).with_margin(0.0),
            0.0,
            RotationSet::cardinal(),
        );
        let mut tracker = BudgetTracker::unlimited();
        let solution = BottomLeftFill.place(&ctx, &mut tracker).unwrap();
        assert!(solution.placements.is_empty());
        assert_eq!(solution.unplaced, vec!["big".to_string()]);
        assert_relative_eq!(solution.utilization, 0.0);
    }

    #[test]
    fn test_start_orders() {
        let ctx = crowded(NestConfig::default());
        let instances = ctx.catalog().instances();
        let area = |i: &PartInstance| ctx.catalog().get(i.part_index).unwrap().features().area;

        assert_eq!(StartOrder::for_start(0, 9), StartOrder::Processing);
        assert_eq!(StartOrder::for_start(2, 9), StartOrder::AreaAscending);
        assert_eq!(StartOrder::for_start(6, 9), StartOrder::Shuffled(restart_seed(9, 6)));
        assert_eq!(StartOrder::Processing.arrange(ctx.catalog(), &instances), instances);

        let ascending = StartOrder::AreaAscending.arrange(ctx.catalog(), &instances);
        for w in ascending.windows(2) {
            assert!(area(&w[0]) <= area(&w[1]));
        }

        let shuffled = StartOrder::Shuffled(3).arrange(ctx.catalog(), &instances);
        assert_eq!(shuffled, StartOrder::Shuffled(3).arrange(ctx.catalog(), &instances));
        let mut sorted = shuffled.clone();
        sorted.sort();
        let mut expected = instances.clone();
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_multi_start_never_worse_than_single() {
        let single = crowded(NestConfig::default().with_restarts(1));
        let multi = crowded(NestConfig::default().with_restarts(8));

        let one = BottomLeftFill.place(&single, &mut BudgetTracker::unlimited()).unwrap();
        let eight = BottomLeftFill.place(&multi, &mut BudgetTracker::unlimited()).unwrap();

        assert!(total_score(&multi, &eight) >= total_score(&single, &one) - 1e-6);
        assert!(multi.verify(&eight));
        assert!(!eight.budget_limited);
    }

    #[test]
    fn test_multi_start_is_deterministic() {
        let ctx = crowded(NestConfig::default().with_restarts(8).with_seed(17));
        let a = BottomLeftFill.place(&ctx, &mut BudgetTracker::unlimited()).unwrap();
        let b = BottomLeftFill.place(&ctx, &mut BudgetTracker::unlimited()).unwrap();
        assert_eq!(a.placements, b.placements);
        assert_eq!(a.unplaced, b.unplaced);
    }

    #[test]
    fn test_extra_starts_share_remaining_budget() {
        let ctx = context_with(
            vec![Part::rectangle("r", 10.0, 10.0).unwrap().with_quantity(5)],
            Sheet::new(200.0, 100.0).with_margin(0.0),
            0.0,
            RotationSet::no_rotation(),
            NestConfig::default().with_restarts(4),
        );
        let mut tracker = BudgetTracker::new(Budget::iterations(12), Arc::new(AtomicBool::new(false)));
        let solution = BottomLeftFill.place(&ctx, &mut tracker).unwrap();

        assert!(tracker.iterations() <= 12);
        assert_eq!(solution.placements.len(), 5);
        assert!(solution.budget_limited);
    }
}
