//! Engine configuration.

use kerfnest_core::{Error, GaConfig, Result, SaConfig};

use crate::metrics::MetricsConfig;
use crate::scoring::{ScoringCurves, ScoringWeights};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How no-fit regions are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NfpMethod {
    /// Exact Minkowski sums of the real outlines.
    #[default]
    Exact,
    /// Minkowski sums of convex hulls; conservative and flagged.
    ConvexHull,
}

/// How the collision detector resolves bounding-box neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CollisionMode {
    /// Reference point containment in the cached no-fit region.
    #[default]
    Nfp,
    /// Direct intersection of the buffered outlines.
    Direct,
}

/// Whether part holes may receive other parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HoleMode {
    /// Holes are empty space that smaller parts may occupy.
    #[default]
    Void,
    /// Holes are treated as solid material.
    Solid,
}

/// Configuration for a nesting run.
///
/// All early-exit thresholds live here rather than in the search loops.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NestConfig {
    /// No-fit region method.
    pub nfp_method: NfpMethod,

    /// Exact collision resolution.
    pub collision_mode: CollisionMode,

    /// Hole treatment.
    pub hole_mode: HoleMode,

    /// Spacing of the candidate sampling grid, in mm. Default 10.
    pub grid_step: f64,

    /// Cap on grid samples per axis. Default 40.
    pub max_search_positions: usize,

    /// Valid candidates examined per part before committing the best. Default 64.
    pub max_candidates: usize,

    /// A valid candidate whose score is within this of the best possible
    /// (inner-fit corner) score ends the search early. Default 0.5.
    pub good_enough_threshold: f64,

    /// Weight of the proximity bonus toward placed parts. Default 1.0.
    pub compactness_weight: f64,

    /// Partial layouts kept per beam step. Default 5.
    pub beam_width: usize,

    /// Candidates expanded per beam state. Default 20.
    pub beam_expansions: usize,

    /// Area percentile at or above which a part is large. Default 0.67.
    pub large_percentile: f64,

    /// Area percentile below which a part is small. Default 0.33.
    pub small_percentile: f64,

    /// Grid step multipliers for the large, medium and small passes.
    pub pass_step_factors: [f64; 3],

    /// Search position multipliers for the large, medium and small passes.
    pub pass_position_factors: [f64; 3],

    /// Parallel starts of bottom-left fill, simulated annealing and the genetic
    /// algorithm, each with its own order or seed. Default 4.
    pub restarts: usize,

    /// Base random seed. Default 42.
    pub seed: u64,

    /// Spatial grid cell size; derived from part sizes when `None`.
    pub grid_cell_size: Option<f64>,

    /// Worker threads for restarts (0 uses the global rayon pool).
    pub threads: usize,

    /// Objective used by SA and GA.
    pub refinement_weights: ScoringWeights,

    /// Curves used by the refinement objective.
    pub curves: ScoringCurves,

    /// Metric parameters (heat radius, remnant size).
    pub metrics: MetricsConfig,

    /// Annealing schedule.
    pub sa: SaConfig,

    /// Genetic algorithm settings.
    pub ga: GaConfig,
}

impl Default for NestConfig {
    fn default() -> Self {
        Self {
            nfp_method: NfpMethod::default(),
            collision_mode: CollisionMode::default(),
            hole_mode: HoleMode::default(),
            grid_step: 10.0,
            max_search_positions: 40,
            max_candidates: 64,
            good_enough_threshold: 0.5,
            compactness_weight: 1.0,
            beam_width: 5,
            beam_expansions: 20,
            large_percentile: 0.67,
            small_percentile: 0.33,
            pass_step_factors: [2.0, 1.4, 1.0],
            pass_position_factors: [0.6, 0.8, 1.0],
            restarts: 4,
            seed: 42,
            grid_cell_size: None,
            threads: 0,
            refinement_weights: ScoringWeights::maximize_utilization(),
            curves: ScoringCurves::default(),
            metrics: MetricsConfig::default(),
            sa: SaConfig::default()
                .with_max_iterations(400)
                .with_iterations_per_temp(10),
            ga: GaConfig::default()
                .with_population_size(24)
                .with_max_generations(60)
                .with_elite_count(2)
                .with_stagnation_limit(Some(15)),
        }
    }
}

impl NestConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the NFP method.
    pub fn with_nfp_method(mut self, method: NfpMethod) -> Self {
        self.nfp_method = method;
        self
    }

    /// Sets the collision mode.
    pub fn with_collision_mode(mut self, mode: CollisionMode) -> Self {
        self.collision_mode = mode;
        self
    }

    /// Sets the hole mode.
    pub fn with_hole_mode(mut self, mode: HoleMode) -> Self {
        self.hole_mode = mode;
        self
    }

    /// Sets the candidate grid step.
    pub fn with_grid_step(mut self, step: f64) -> Self {
        self.grid_step = step;
        self
    }

    /// Sets the per-axis cap on grid samples.
    pub fn with_max_search_positions(mut self, n: usize) -> Self {
        self.max_search_positions = n;
        self
    }

    /// Sets the number of valid candidates examined per part.
    pub fn with_max_candidates(mut self, n: usize) -> Self {
        self.max_candidates = n;
        self
    }

    /// Sets the early-exit threshold.
    pub fn with_good_enough_threshold(mut self, threshold: f64) -> Self {
        self.good_enough_threshold = threshold;
        self
    }

    /// Sets the compactness bonus weight.
    pub fn with_compactness_weight(mut self, weight: f64) -> Self {
        self.compactness_weight = weight;
        self
    }

    /// Sets beam width and expansions per state.
    pub fn with_beam(mut self, width: usize, expansions: usize) -> Self {
        self.beam_width = width;
        self.beam_expansions = expansions;
        self
    }

    /// Sets the number of parallel restarts.
    pub fn with_restarts(mut self, restarts: usize) -> Self {
        self.restarts = restarts;
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the spatial grid cell size.
    pub fn with_grid_cell_size(mut self, size: f64) -> Self {
        self.grid_cell_size = Some(size);
        self
    }

    /// Sets the worker thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Sets the refinement objective.
    pub fn with_refinement_weights(mut self, weights: ScoringWeights) -> Self {
        self.refinement_weights = weights;
        self
    }

    /// Sets the annealing configuration.
    pub fn with_sa(mut self, sa: SaConfig) -> Self {
        self.sa = sa;
        self
    }

    /// Sets the genetic algorithm configuration.
    pub fn with_ga(mut self, ga: GaConfig) -> Self {
        self.ga = ga;
        self
    }

    /// Checks every tunable.
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| -> Result<()> {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(Error::ConfigError(format!("{} must be positive, got {}", name, v)))
            }
        };

        positive("grid_step", self.grid_step)?;
        if let Some(cell) = self.grid_cell_size {
            positive("grid_cell_size", cell)?;
        }
        for f in self.pass_step_factors.iter().chain(&self.pass_position_factors) {
            positive("pass factor", *f)?;
        }
        if self.max_search_positions < 2 {
            return Err(Error::ConfigError(
                "max_search_positions must be at least 2".into(),
            ));
        }
        if self.max_candidates == 0 || self.beam_width == 0 || self.beam_expansions == 0 {
            return Err(Error::ConfigError(
                "max_candidates, beam_width and beam_expansions must be at least 1".into(),
            ));
        }
        if !(self.good_enough_threshold >= 0.0 && self.compactness_weight >= 0.0) {
            return Err(Error::ConfigError(
                "good_enough_threshold and compactness_weight must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.small_percentile)
            || !(0.0..=1.0).contains(&self.large_percentile)
            || self.small_percentile > self.large_percentile
        {
            return Err(Error::ConfigError(format!(
                "bucket percentiles must satisfy 0 <= small ({}) <= large ({}) <= 1",
                self.small_percentile, self.large_percentile
            )));
        }
        if self.ga.population_size < 2 {
            return Err(Error::ConfigError(
                "GA population must hold at least 2 individuals".into(),
            ));
        }
        if !(self.sa.cooling_rate > 0.0 && self.sa.cooling_rate < 1.0) {
            return Err(Error::ConfigError(format!(
                "SA cooling rate must be in (0, 1), got {}",
                self.sa.cooling_rate
            )));
        }
        self.refinement_weights.validate()?;
        self.metrics.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = NestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.beam_width, 5);
        assert_eq!(config.beam_expansions, 20);
        assert_eq!(config.hole_mode, HoleMode::Void);
    }

    #[test]
    fn test_builder() {
        let config = NestConfig::new()
            .with_hole_mode(HoleMode::Solid)
            .with_collision_mode(CollisionMode::Direct)
            .with_beam(3, 7)
            .with_seed(7)
            .with_grid_cell_size(25.0);
        assert_eq!(config.hole_mode, HoleMode::Solid);
        assert_eq!(config.collision_mode, CollisionMode::Direct);
        assert_eq!((config.beam_width, config.beam_expansions), (3, 7));
        assert_eq!(config.seed, 7);
        assert_eq!(config.grid_cell_size, Some(25.0));
    }

    #[test]
    fn test_validation_errors() {
        assert!(NestConfig::new().with_grid_step(0.0).validate().is_err());
        assert!(NestConfig::new().with_beam(0, 5).validate().is_err());
        assert!(NestConfig::new().with_grid_cell_size(-1.0).validate().is_err());
        assert!(NestConfig::new().with_max_search_positions(1).validate().is_err());

        let mut swapped = NestConfig::new();
        swapped.small_percentile = 0.8;
        assert!(swapped.validate().is_err());
    }
}
