//! Nesting sessions and the top-level entry points.
//!
//! A [`NestingSession`] validates its parts and constraints once, then runs
//! any number of strategies against them while sharing one NFP cache.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kerfnest_core::{
    Budget, BudgetTracker, Error, ProgressCallback, Result, Solution, StrategyKind,
};
use log::{debug, info};

use crate::beam_nesting::BeamSearch;
use crate::catalog::{CatalogEntry, PartCatalog};
use crate::config::{HoleMode, NestConfig, NfpMethod};
use crate::constraints::Constraints;
use crate::ga_nesting::Genetic;
use crate::geometry::Polygon;
use crate::multipass_nesting::MultiPass;
use crate::nester::BottomLeftFill;
use crate::nfp::{Nfp, NfpCache, NfpEngine};
use crate::part::Part;
use crate::sa_nesting::SimulatedAnnealing;
use crate::scoring::{MultiObjectiveScorer, ScoreBreakdown, ScoringWeights};
use crate::strategy::{NestContext, PlacementStrategy};

/// Validated parts and constraints plus the state shared between runs.
pub struct NestingSession {
    catalog: Arc<PartCatalog>,
    constraints: Constraints,
    config: NestConfig,
    cache: Arc<NfpCache>,
    cancel: Arc<AtomicBool>,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for NestingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NestingSession")
            .field("parts", &self.catalog.len())
            .field("instances", &self.catalog.instance_count())
            .field("config", &self.config)
            .field("cached_nfps", &self.cache.len())
            .finish()
    }
}

impl NestingSession {
    /// Validates `parts` and `constraints` and builds the part catalog.
    ///
    /// # Errors
    ///
    /// Returns an input error for an invalid sheet, spacing or rotation set,
    /// a duplicate part id, or a zero quantity.
    pub fn new(parts: Vec<Part>, constraints: Constraints) -> Result<Self> {
        constraints.validate()?;
        let catalog = PartCatalog::new(parts, &constraints)?;
        debug!(
            "session: {} parts, {} copies, usable {:?}",
            catalog.len(),
            catalog.instance_count(),
            constraints.usable_bounds()
        );
        Ok(Self {
            catalog: Arc::new(catalog),
            constraints,
            config: NestConfig::default(),
            cache: Arc::new(NfpCache::new()),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
        })
    }

    /// Replaces the tunables.
    pub fn with_config(mut self, config: NestConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares an existing NFP cache, for example one warmed by an earlier session.
    pub fn with_cache(mut self, cache: Arc<NfpCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Attaches a progress callback to every run.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Validated parts with their precomputed rotations and features.
    pub fn catalog(&self) -> &PartCatalog {
        &self.catalog
    }

    /// Sheet, spacing, rotation and material constraints of every run.
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Strategy tunables.
    pub fn config(&self) -> &NestConfig {
        &self.config
    }

    /// The session's NFP cache.
    pub fn cache(&self) -> &Arc<NfpCache> {
        &self.cache
    }

    /// Flag that stops a running strategy when set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Requests cancellation of the running strategy.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    fn entry(&self, id: &str) -> Result<&CatalogEntry> {
        self.catalog
            .by_id(id)
            .map(|(_, entry)| entry)
            .ok_or_else(|| Error::ConfigError(format!("unknown part id '{}'", id)))
    }

    fn context(&self) -> Result<NestContext> {
        NestContext::new(
            Arc::clone(&self.catalog),
            self.constraints.clone(),
            self.config.clone(),
            Arc::clone(&self.cache),
        )
    }

    /// Runs `strategy` within `budget`.
    ///
    /// Parts without a valid position end up in [`Solution::unplaced`]; an
    /// expired budget or a cancellation returns the best layout so far with
    /// [`Solution::budget_limited`] set. The cancel flag is cleared when the
    /// run starts.
    pub fn nest(&self, strategy: StrategyKind, budget: Budget) -> Result<Solution> {
        let ctx = self.context()?;
        self.cancel.store(false, Ordering::Relaxed);
        let mut tracker = BudgetTracker::new(budget, Arc::clone(&self.cancel));
        if let Some(progress) = &self.progress {
            tracker = tracker.with_progress(Arc::clone(progress));
        }

        let runner: Box<dyn PlacementStrategy> = match strategy {
            StrategyKind::BottomLeftFill => Box::new(BottomLeftFill),
            StrategyKind::MultiPass => Box::new(MultiPass),
            StrategyKind::BeamSearch => Box::new(BeamSearch),
            StrategyKind::SimulatedAnnealing => Box::new(SimulatedAnnealing),
            StrategyKind::Genetic => Box::new(Genetic),
        };
        let solution = runner.place(&ctx, &mut tracker)?;
        debug_assert!(
            ctx.verify(&solution),
            "{} produced an invalid layout",
            strategy
        );

        let stats = self.cache.stats();
        info!(
            "nest[{}]: {} placed, {} unplaced, utilization {:.1}% (max {:.1}%), {} ms, {} iterations{}; NFP cache {} entries, {:.0}% hits",
            strategy,
            solution.placed_count(),
            solution.unplaced_count(),
            solution.utilization * 100.0,
            solution.theoretical_max * 100.0,
            solution.computation_time_ms,
            solution.iterations,
            if solution.budget_limited { ", budget limited" } else { "" },
            self.cache.len(),
            stats.hit_rate() * 100.0
        );
        Ok(solution)
    }

    /// Scores a solution of this session's parts.
    pub fn score(&self, solution: &Solution, weights: &ScoringWeights) -> Result<ScoreBreakdown> {
        let scorer = MultiObjectiveScorer::new(*weights)?
            .with_curves(self.config.curves.clone())
            .with_metrics_config(self.config.metrics);
        Ok(scorer.score(solution, &self.catalog, &self.constraints))
    }

    /// No-fit region of two session parts, through the session cache.
    ///
    /// The region is in the stationary part's frame and includes the
    /// session's spacing.
    pub fn compute_nfp(&self, part_a: &str, part_b: &str, rot_a: f64, rot_b: f64) -> Result<Arc<Nfp>> {
        let a = self.entry(part_a)?;
        let b = self.entry(part_b)?;
        let ctx = self.context()?;
        Ok(ctx
            .engine()
            .compute_signed(a.polygon(), a.signature(), b.polygon(), b.signature(), rot_a, rot_b))
    }
}

/// Nests `parts` on the constrained sheet with default tunables.
///
/// # Example
///
/// ```rust
/// use kerfnest_d2::{nest, Constraints, Part, RotationSet, Sheet, SpacingConstraints};
/// use kerfnest_core::{Budget, StrategyKind};
///
/// let parts = vec![Part::rectangle("panel", 50.0, 30.0).unwrap().with_quantity(4)];
/// let constraints = Constraints::new(Sheet::new(200.0, 100.0).with_margin(0.0))
///     .with_spacing(SpacingConstraints::zero())
///     .with_rotations(RotationSet::new([0.0, 90.0]).unwrap());
///
/// let solution = nest(parts, constraints, StrategyKind::BottomLeftFill, Budget::unlimited()).unwrap();
/// assert_eq!(solution.placements.len(), 4);
/// ```
pub fn nest(
    parts: Vec<Part>,
    constraints: Constraints,
    strategy: StrategyKind,
    budget: Budget,
) -> Result<Solution> {
    NestingSession::new(parts, constraints)?.nest(strategy, budget)
}

/// Scores `solution` against the parts and constraints it was nested with.
pub fn score(
    solution: &Solution,
    parts: Vec<Part>,
    constraints: Constraints,
    weights: &ScoringWeights,
) -> Result<ScoreBreakdown> {
    NestingSession::new(parts, constraints)?.score(solution, weights)
}

/// No-fit region of two polygons without spacing, holes as voids, exact method.
///
/// Each call uses a fresh cache; use [`NestingSession::compute_nfp`] to share one.
pub fn compute_nfp(part_a: &Polygon, part_b: &Polygon, rot_a: f64, rot_b: f64) -> Arc<Nfp> {
    NfpEngine::new(Arc::new(NfpCache::new()))
        .with_method(NfpMethod::Exact)
        .with_hole_mode(HoleMode::Void)
        .with_spacing(0.0)
        .compute(part_a, part_b, rot_a, rot_b)
}
