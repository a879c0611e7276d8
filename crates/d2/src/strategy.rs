//! The shared placement strategy contract and the context every strategy runs in.

use std::collections::HashSet;
use std::sync::Arc;

use kerfnest_core::{BudgetTracker, Result, Solution, StrategyKind};
use log::warn;

use crate::catalog::{PartCatalog, PartInstance};
use crate::collision::CollisionDetector;
use crate::config::NestConfig;
use crate::constraints::Constraints;
use crate::geometry::BoundingBox;
use crate::layout::Layout;
use crate::nfp::{NfpCache, NfpEngine};
use crate::scoring::MultiObjectiveScorer;
use crate::spatial_index::default_cell_size;

/// A placement algorithm.
///
/// Implementations are deterministic for a fixed [`NestConfig::seed`] under an
/// iteration budget, call [`BudgetTracker::tick`] between units of work and
/// return the best layout found once it refuses.
pub trait PlacementStrategy: Send + Sync {
    /// Which strategy this is.
    fn kind(&self) -> StrategyKind;

    /// Places the catalog's parts.
    fn place(&self, ctx: &NestContext, tracker: &mut BudgetTracker) -> Result<Solution>;
}

/// Derives the seed of restart `index` from the base seed.
pub fn restart_seed(base: u64, index: usize) -> u64 {
    base.wrapping_add((index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Runs `f` on a dedicated pool when `threads > 0`, otherwise on the global pool.
pub fn with_thread_pool<T: Send>(threads: usize, f: impl FnOnce() -> T + Send) -> T {
    if threads == 0 {
        return f();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(f),
        Err(e) => {
            warn!("could not build a {}-thread pool, using the global pool: {}", threads, e);
            f()
        }
    }
}

/// Everything a strategy reads while placing: the part arena, constraints,
/// tunables, the shared NFP engine, the collision detector and the scorer.
#[derive(Debug, Clone)]
pub struct NestContext {
    catalog: Arc<PartCatalog>,
    constraints: Constraints,
    config: NestConfig,
    engine: NfpEngine,
    detector: CollisionDetector,
    scorer: MultiObjectiveScorer,
    cell_size: f64,
}

impl NestContext {
    /// Builds a context, validating the constraints and configuration.
    pub fn new(
        catalog: Arc<PartCatalog>,
        constraints: Constraints,
        config: NestConfig,
        cache: Arc<NfpCache>,
    ) -> Result<Self> {
        constraints.validate()?;
        config.validate()?;

        let scorer = MultiObjectiveScorer::new(config.refinement_weights)?
            .with_curves(config.curves.clone())
            .with_metrics_config(config.metrics);

        let spacing = constraints.uniform_spacing();
        let engine = NfpEngine::new(cache)
            .with_method(config.nfp_method)
            .with_hole_mode(config.hole_mode)
            .with_spacing(spacing);
        let detector = CollisionDetector::new(
            constraints.usable_bounds(),
            spacing,
            config.hole_mode,
            config.collision_mode,
            engine.clone(),
        );

        let cell_size = match config.grid_cell_size {
            Some(size) => size,
            None => {
                let boxes: Vec<BoundingBox> = catalog.rotated_boxes().collect();
                default_cell_size(&boxes)
            }
        };

        Ok(Self {
            catalog,
            constraints,
            config,
            engine,
            detector,
            scorer,
            cell_size,
        })
    }

    /// Part arena.
    pub fn catalog(&self) -> &PartCatalog {
        &self.catalog
    }

    /// Sheet, spacing, rotation and material constraints.
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Tunables.
    pub fn config(&self) -> &NestConfig {
        &self.config
    }

    /// Shared NFP engine.
    pub fn engine(&self) -> &NfpEngine {
        &self.engine
    }

    /// Collision detector for the usable sheet.
    pub fn detector(&self) -> &CollisionDetector {
        &self.detector
    }

    /// Scorer built from the refinement weights.
    pub fn scorer(&self) -> &MultiObjectiveScorer {
        &self.scorer
    }

    /// Spatial grid cell size of new layouts.
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// An empty layout.
    pub fn new_layout(&self) -> Layout {
        Layout::new(self.cell_size)
    }

    /// Usable sheet area.
    pub fn usable_area(&self) -> f64 {
        self.constraints.usable_bounds().area()
    }

    /// Area of every requested copy over the usable area, capped at 1.
    pub fn theoretical_max(&self) -> f64 {
        let usable = self.usable_area();
        if usable > 0.0 {
            (self.catalog.total_area() / usable).min(1.0)
        } else {
            0.0
        }
    }

    /// Weighted refinement objective of a layout.
    pub fn refinement_score(&self, layout: &Layout, unplaced_count: usize) -> f64 {
        self.scorer
            .score_shapes(layout.placed(), unplaced_count, &self.catalog, &self.constraints)
            .total
    }

    /// Turns a finished layout into a [`Solution`].
    ///
    /// Unplaced copies are listed in processing order, whatever order the
    /// strategy gave up on them.
    pub fn finish(
        &self,
        layout: &Layout,
        unplaced: &[PartInstance],
        kind: StrategyKind,
        tracker: &BudgetTracker,
    ) -> Solution {
        let usable = self.usable_area();
        let pending: HashSet<PartInstance> = unplaced.iter().copied().collect();
        let in_order: Vec<PartInstance> = self
            .catalog
            .instances()
            .into_iter()
            .filter(|i| pending.contains(i))
            .collect();

        let mut solution = Solution::new().with_strategy(kind.name());
        solution.placements = layout.placements();
        solution.unplaced = Layout::ids_of(&self.catalog, &in_order);
        solution.utilization = if usable > 0.0 {
            (layout.placed_area() / usable).clamp(0.0, 1.0)
        } else {
            0.0
        };
        solution.theoretical_max = self.theoretical_max();
        solution.budget_limited = tracker.limited();
        solution.iterations = tracker.iterations();
        solution.computation_time_ms = tracker.elapsed_ms();
        solution
    }

    /// Replays a solution through the direct intersection check.
    ///
    /// Returns true if every placement lies on the usable sheet, no two
    /// placements overlap after spacing, and every copy is either placed once
    /// or listed as unplaced.
    pub fn verify(&self, solution: &Solution) -> bool {
        let mut layout = self.new_layout();
        for placement in &solution.placements {
            if layout.contains_instance(PartInstance {
                part_index: placement.part_index,
                instance: placement.instance,
            }) {
                return false;
            }
            if !self
                .detector
                .can_place_direct(&self.catalog, placement, &layout)
            {
                return false;
            }
            match self.detector.realize(&self.catalog, placement) {
                Some(shape) => {
                    self.detector.commit(shape, &mut layout);
                }
                None => return false,
            }
        }
        solution.placements.len() + solution.unplaced.len() == self.catalog.instance_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::SpacingConstraints;
    use crate::part::Part;
    use crate::sheet::Sheet;
    use approx::assert_relative_eq;
    use kerfnest_core::PlacedPart;

    fn context() -> NestContext {
        let constraints = Constraints::new(Sheet::new(200.0, 100.0).with_margin(0.0))
            .with_spacing(SpacingConstraints::zero());
        let parts = vec![Part::rectangle("r", 50.0, 30.0).unwrap().with_quantity(2)];
        let catalog = Arc::new(PartCatalog::new(parts, &constraints).unwrap());
        NestContext::new(catalog, constraints, NestConfig::default(), Arc::new(NfpCache::new())).unwrap()
    }

    #[test]
    fn test_restart_seeds_differ() {
        assert_ne!(restart_seed(42, 0), restart_seed(42, 1));
        assert_eq!(restart_seed(42, 0), 42);
    }

    #[test]
    fn test_context_derived_values() {
        let ctx = context();
        assert_relative_eq!(ctx.usable_area(), 20_000.0);
        assert_relative_eq!(ctx.theoretical_max(), 0.15);
        assert!(ctx.cell_size() >= 1.0);
    }

    #[test]
    fn test_context_rejects_bad_config() {
        let constraints = Constraints::new(Sheet::small_test());
        let catalog = Arc::new(PartCatalog::new(Vec::new(), &constraints).unwrap());
        let config = NestConfig::default().with_grid_step(0.0);
        assert!(NestContext::new(catalog, constraints, config, Arc::new(NfpCache::new())).is_err());
    }

    #[test]
    fn test_finish_and_verify() {
        let ctx = context();
        let mut layout = ctx.new_layout();
        let first = PlacedPart::new("r", 0, 0, 0.0, 0.0, 0.0);
        assert!(ctx.detector().try_commit(ctx.catalog(), &first, &mut layout));

        let missing = layout.missing(ctx.catalog());
        let tracker = BudgetTracker::unlimited();
        let solution = ctx.finish(&layout, &missing, StrategyKind::BottomLeftFill, &tracker);
        assert_eq!(solution.placements.len(), 1);
        assert_eq!(solution.unplaced, vec!["r".to_string()]);
        assert_relative_eq!(solution.utilization, 0.075);
        assert_eq!(solution.strategy.as_deref(), Some("blf"));
        assert!(!solution.budget_limited);
        assert!(ctx.verify(&solution));

        let mut overlapping = solution.clone();
        overlapping.unplaced.clear();
        overlapping
            .placements
            .push(PlacedPart::new("r", 0, 1, 10.0, 10.0, 0.0));
        assert!(!ctx.verify(&overlapping));
    }
}
