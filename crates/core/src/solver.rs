//! Strategy kinds, budgets and cancellation.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Placement strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StrategyKind {
    /// Greedy Bottom-Left Fill (fast, baseline quality).
    #[default]
    BottomLeftFill,
    /// Bucketed greedy passes from large to small parts.
    MultiPass,
    /// Beam search over partial layouts.
    BeamSearch,
    /// Simulated Annealing refinement of a greedy seed.
    SimulatedAnnealing,
    /// Genetic Algorithm over part order and rotations.
    Genetic,
}

impl StrategyKind {
    /// All strategy kinds, in order of increasing cost.
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::BottomLeftFill,
        StrategyKind::MultiPass,
        StrategyKind::BeamSearch,
        StrategyKind::SimulatedAnnealing,
        StrategyKind::Genetic,
    ];

    /// Short canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::BottomLeftFill => "blf",
            StrategyKind::MultiPass => "multipass",
            StrategyKind::BeamSearch => "beam",
            StrategyKind::SimulatedAnnealing => "sa",
            StrategyKind::Genetic => "ga",
        }
    }

    /// Returns true for strategies that refine a complete seed layout.
    pub fn is_refinement(&self) -> bool {
        matches!(
            self,
            StrategyKind::SimulatedAnnealing | StrategyKind::Genetic
        )
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "blf" | "bottom_left_fill" | "greedy" => Ok(StrategyKind::BottomLeftFill),
            "multipass" | "multi_pass" => Ok(StrategyKind::MultiPass),
            "beam" | "beam_search" => Ok(StrategyKind::BeamSearch),
            "sa" | "simulated_annealing" => Ok(StrategyKind::SimulatedAnnealing),
            "ga" | "genetic" | "genetic_algorithm" => Ok(StrategyKind::Genetic),
            other => Err(Error::ConfigError(format!("unknown strategy '{}'", other))),
        }
    }
}

/// Wall-clock and iteration limits for one nesting run.
///
/// What counts as an iteration depends on the strategy: one part for greedy
/// strategies, one depth step for beam search, one move for annealing and one
/// generation for the genetic algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Budget {
    /// Wall-clock limit in milliseconds.
    pub time_limit_ms: Option<u64>,
    /// Maximum number of strategy iterations.
    pub max_iterations: Option<u64>,
}

impl Budget {
    /// A budget without limits.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// A wall-clock budget.
    pub fn time_ms(ms: u64) -> Self {
        Self {
            time_limit_ms: Some(ms),
            max_iterations: None,
        }
    }

    /// An iteration budget.
    pub fn iterations(n: u64) -> Self {
        Self {
            time_limit_ms: None,
            max_iterations: Some(n),
        }
    }

    /// Adds a wall-clock limit.
    pub fn with_time_limit(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    /// Adds an iteration limit.
    pub fn with_max_iterations(mut self, n: u64) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Returns true when neither limit is set.
    pub fn is_unlimited(&self) -> bool {
        self.time_limit_ms.is_none() && self.max_iterations.is_none()
    }
}

/// Progress callback for long-running strategies.
pub type ProgressCallback = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

/// Progress information during a nesting run.
#[derive(Debug, Clone, Default)]
pub struct ProgressInfo {
    /// Iterations consumed so far.
    pub iteration: u64,
    /// Iteration limit (0 if unknown).
    pub total_iterations: u64,
    /// Current best utilization (0.0 to 1.0).
    pub utilization: f64,
    /// Current best objective value.
    pub best_fitness: f64,
    /// Number of parts placed.
    pub items_placed: usize,
    /// Total number of part instances.
    pub total_items: usize,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: u64,
    /// Current phase description.
    pub phase: String,
    /// Whether the strategy is still running.
    pub running: bool,
}

impl ProgressInfo {
    /// Creates a new progress info with default values.
    pub fn new() -> Self {
        Self {
            running: true,
            ..Default::default()
        }
    }

    /// Sets the iteration info.
    pub fn with_iteration(mut self, current: u64, total: u64) -> Self {
        self.iteration = current;
        self.total_iterations = total;
        self
    }

    /// Sets the utilization.
    pub fn with_utilization(mut self, utilization: f64) -> Self {
        self.utilization = utilization;
        self
    }

    /// Sets the best fitness.
    pub fn with_fitness(mut self, fitness: f64) -> Self {
        self.best_fitness = fitness;
        self
    }

    /// Sets the items placed info.
    pub fn with_items(mut self, placed: usize, total: usize) -> Self {
        self.items_placed = placed;
        self.total_items = total;
        self
    }

    /// Sets the elapsed time.
    pub fn with_elapsed(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    /// Sets the phase description.
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = phase.into();
        self
    }

    /// Marks the strategy as finished.
    pub fn finished(mut self) -> Self {
        self.running = false;
        self
    }

    /// Calculates the progress fraction (0.0 to 1.0).
    pub fn progress_percent(&self) -> f64 {
        if self.total_iterations > 0 {
            (self.iteration as f64 / self.total_iterations as f64).min(1.0)
        } else {
            0.0
        }
    }
}

/// Enforces a [`Budget`] and observes a shared cancellation flag.
///
/// Strategies call [`tick`](Self::tick) before each unit of work and stop as
/// soon as it returns false. Parallel workers get their own share of the
/// budget through [`split`](Self::split) and are merged back with
/// [`absorb`](Self::absorb).
pub struct BudgetTracker {
    start: Instant,
    deadline: Option<Instant>,
    max_iterations: Option<u64>,
    iterations: u64,
    cancel: Arc<AtomicBool>,
    limited: bool,
    progress: Option<ProgressCallback>,
}

impl BudgetTracker {
    /// Creates a tracker that starts the clock now.
    pub fn new(budget: Budget, cancel: Arc<AtomicBool>) -> Self {
        let start = Instant::now();
        Self {
            start,
            deadline: budget
                .time_limit_ms
                .map(|ms| start + Duration::from_millis(ms)),
            max_iterations: budget.max_iterations,
            iterations: 0,
            cancel,
            limited: false,
            progress: None,
        }
    }

    /// Creates a tracker with no limits and a private cancel flag.
    pub fn unlimited() -> Self {
        Self::new(Budget::unlimited(), Arc::new(AtomicBool::new(false)))
    }

    /// Attaches a progress callback.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Counts one iteration if the budget still allows it.
    ///
    /// Returns false, and records that the run was limited, once the
    /// iteration limit is reached, the deadline has passed or the run was
    /// cancelled.
    pub fn tick(&mut self) -> bool {
        if self.is_exhausted() {
            self.limited = true;
            return false;
        }
        self.iterations += 1;
        true
    }

    /// Returns true if no further work is allowed. Does not count an iteration.
    pub fn is_exhausted(&self) -> bool {
        if self.cancel.load(Ordering::Relaxed) {
            return true;
        }
        if let Some(max) = self.max_iterations {
            if self.iterations >= max {
                return true;
            }
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        false
    }

    /// Returns true if the run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Records that the run stopped early without a failing `tick`.
    pub fn mark_limited(&mut self) {
        self.limited = true;
    }

    /// Returns true if the budget or a cancellation ever cut work short.
    pub fn limited(&self) -> bool {
        self.limited
    }

    /// Iterations counted so far.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Iterations still allowed, if an iteration limit is set.
    pub fn remaining_iterations(&self) -> Option<u64> {
        self.max_iterations
            .map(|max| max.saturating_sub(self.iterations))
    }

    /// Milliseconds since the tracker was created.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Creates one tracker per parallel worker.
    ///
    /// Workers share the deadline and cancel flag. The iterations still
    /// remaining here are divided between them, with the remainder going to
    /// the lowest indices, so the merged count never exceeds the limit.
    pub fn split(&self, workers: usize) -> Vec<Self> {
        let workers = workers.max(1);
        let remaining = self.remaining_iterations();
        (0..workers)
            .map(|index| {
                let share = remaining.map(|total| {
                    let base = total / workers as u64;
                    let extra = u64::from((index as u64) < total % workers as u64);
                    base + extra
                });
                Self {
                    start: self.start,
                    deadline: self.deadline,
                    max_iterations: share,
                    iterations: 0,
                    cancel: Arc::clone(&self.cancel),
                    limited: false,
                    progress: self.progress.clone(),
                }
            })
            .collect()
    }

    /// Merges a finished worker's iteration count and limit flag.
    pub fn absorb(&mut self, worker: &BudgetTracker) {
        self.iterations += worker.iterations;
        self.limited |= worker.limited;
    }

    /// Sends a progress report if a callback is attached.
    pub fn report(&self, info: ProgressInfo) {
        if let Some(callback) = &self.progress {
            callback(
                info.with_iteration(self.iterations, self.max_iterations.unwrap_or(0))
                    .with_elapsed(self.elapsed_ms()),
            );
        }
    }
}

impl fmt::Debug for BudgetTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BudgetTracker")
            .field("iterations", &self.iterations)
            .field("max_iterations", &self.max_iterations)
            .field("deadline", &self.deadline)
            .field("limited", &self.limited)
            .finish()
    }
}
