//! Simulated Annealing framework.
//!
//! The runner is generic over the problem: the nesting engine plugs in layout
//! moves, tests plug in toy permutation problems. Every proposed move consumes
//! one budget iteration, so an iteration budget makes runs reproducible for a
//! fixed seed.

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::time::{Duration, Instant};

use crate::solver::{BudgetTracker, ProgressInfo};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cooling schedule types for Simulated Annealing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoolingSchedule {
    /// Geometric cooling: T_new = T * alpha.
    #[default]
    Geometric,
    /// Linear cooling: T_new = T - delta.
    Linear,
    /// Adaptive cooling based on the acceptance rate at each level.
    Adaptive,
    /// Lundy-Mees: T_new = T / (1 + beta * T).
    LundyMees,
}

/// Configuration for Simulated Annealing.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SaConfig {
    /// Initial temperature.
    pub initial_temp: f64,
    /// Final (minimum) temperature.
    pub final_temp: f64,
    /// Cooling rate (alpha for Geometric, beta for LundyMees).
    pub cooling_rate: f64,
    /// Number of moves at each temperature level.
    pub iterations_per_temp: usize,
    /// Maximum total moves (None = temperature-based stopping only).
    pub max_iterations: Option<u64>,
    /// Cooling schedule type.
    pub cooling_schedule: CoolingSchedule,
    /// Target objective to stop early.
    pub target_fitness: Option<f64>,
    /// Enable reheating when stagnation is detected.
    pub enable_reheating: bool,
    /// Moves without improvement before reheating.
    pub reheat_threshold: u64,
    /// Reheat factor (multiplier for current temperature).
    pub reheat_factor: f64,
}

impl Default for SaConfig {
    fn default() -> Self {
        Self {
            initial_temp: 10.0,
            final_temp: 0.01,
            cooling_rate: 0.95,
            iterations_per_temp: 20,
            max_iterations: Some(2_000),
            cooling_schedule: CoolingSchedule::Geometric,
            target_fitness: None,
            enable_reheating: false,
            reheat_threshold: 200,
            reheat_factor: 2.0,
        }
    }
}

impl SaConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial temperature.
    pub fn with_initial_temp(mut self, temp: f64) -> Self {
        self.initial_temp = temp.max(0.001);
        self
    }

    /// Sets the final temperature.
    pub fn with_final_temp(mut self, temp: f64) -> Self {
        self.final_temp = temp.max(0.0001);
        self
    }

    /// Sets the cooling rate.
    pub fn with_cooling_rate(mut self, rate: f64) -> Self {
        self.cooling_rate = rate.clamp(0.001, 0.9999);
        self
    }

    /// Sets the moves per temperature level.
    pub fn with_iterations_per_temp(mut self, iterations: usize) -> Self {
        self.iterations_per_temp = iterations.max(1);
        self
    }

    /// Sets the maximum number of moves.
    pub fn with_max_iterations(mut self, iterations: u64) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    /// Sets the cooling schedule.
    pub fn with_cooling_schedule(mut self, schedule: CoolingSchedule) -> Self {
        self.cooling_schedule = schedule;
        self
    }

    /// Sets the target objective.
    pub fn with_target_fitness(mut self, fitness: f64) -> Self {
        self.target_fitness = Some(fitness);
        self
    }

    /// Enables reheating.
    pub fn with_reheating(mut self, threshold: u64, factor: f64) -> Self {
        self.enable_reheating = true;
        self.reheat_threshold = threshold;
        self.reheat_factor = factor.max(1.1);
        self
    }
}

/// A candidate solution. Higher objective values are better.
pub trait SaSolution: Clone + Send + Sync {
    /// Returns the objective value of this solution.
    fn objective(&self) -> f64;

    /// Sets the objective value.
    fn set_objective(&mut self, value: f64);
}

/// Layout moves used by the annealer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NeighborhoodOperator {
    /// Exchange the positions of two placed parts.
    Swap,
    /// Give one part a different allowed rotation.
    Rotate,
    /// Remove a few parts and place them again greedily.
    Reinsert,
    /// Nudge one part a short distance toward the bottom-left.
    Jitter,
}

impl NeighborhoodOperator {
    /// All operators.
    pub const ALL: [NeighborhoodOperator; 4] = [
        NeighborhoodOperator::Swap,
        NeighborhoodOperator::Rotate,
        NeighborhoodOperator::Reinsert,
        NeighborhoodOperator::Jitter,
    ];
}

/// Problem-specific operations for Simulated Annealing.
pub trait SaProblem: Send + Sync {
    /// The solution type for this problem.
    type Solution: SaSolution;

    /// Creates an initial solution.
    fn initial_solution<R: Rng>(&self, rng: &mut R) -> Self::Solution;

    /// Generates a neighbor using the given operator.
    ///
    /// A move that turns out to be invalid returns the input unchanged.
    fn neighbor<R: Rng>(
        &self,
        solution: &Self::Solution,
        operator: NeighborhoodOperator,
        rng: &mut R,
    ) -> Self::Solution;

    /// Evaluates the objective of a solution.
    fn evaluate(&self, solution: &mut Self::Solution);

    /// Returns the operators this problem supports.
    fn available_operators(&self) -> Vec<NeighborhoodOperator> {
        NeighborhoodOperator::ALL.to_vec()
    }
}

/// Result of a SA run.
#[derive(Debug, Clone)]
pub struct SaResult<S: SaSolution> {
    /// The best solution found.
    pub best: S,
    /// Final temperature reached.
    pub final_temperature: f64,
    /// Total moves performed.
    pub iterations: u64,
    /// Total elapsed time.
    pub elapsed: Duration,
    /// Whether the target objective was reached.
    pub target_reached: bool,
    /// Number of reheats performed.
    pub reheat_count: u32,
    /// Best objective sampled at each temperature change.
    pub history: Vec<f64>,
}

/// Simulated Annealing runner.
pub struct SaRunner<P: SaProblem> {
    config: SaConfig,
    problem: P,
}

impl<P: SaProblem> SaRunner<P> {
    /// Creates a new SA runner.
    pub fn new(config: SaConfig, problem: P) -> Self {
        Self { config, problem }
    }

    /// Returns the problem.
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// Runs one annealing chain.
    ///
    /// Stops when the temperature reaches `final_temp`, the configured move
    /// limit is hit, the target objective is reached, or `tracker` refuses
    /// another iteration.
    pub fn run_with_rng<R: Rng>(&self, rng: &mut R, tracker: &mut BudgetTracker) -> SaResult<P::Solution> {
        let start = Instant::now();
        let mut history = Vec::new();

        let mut current = self.problem.initial_solution(rng);
        self.problem.evaluate(&mut current);
        let mut best = current.clone();
        let mut best_fitness = best.objective();

        let mut temperature = self.config.initial_temp;
        let mut iteration = 0u64;
        let mut target_reached = false;
        let mut reheat_count = 0u32;
        let mut stagnation_count = 0u64;

        let operators = self.problem.available_operators();
        if operators.is_empty() {
            return SaResult {
                best,
                final_temperature: temperature,
                iterations: 0,
                elapsed: start.elapsed(),
                target_reached,
                reheat_count,
                history: vec![best_fitness],
            };
        }

        let temp_delta = if matches!(self.config.cooling_schedule, CoolingSchedule::Linear) {
            let levels = self.config.max_iterations.unwrap_or(10_000) as f64
                / self.config.iterations_per_temp as f64;
            (self.config.initial_temp - self.config.final_temp) / levels.max(1.0)
        } else {
            0.0
        };

        let mut accepted_count = 0usize;
        let mut total_count = 0usize;
        let mut budget_stop = false;

        'levels: while temperature > self.config.final_temp {
            if let Some(max) = self.config.max_iterations {
                if iteration >= max {
                    break;
                }
            }

            if let Some(target) = self.config.target_fitness {
                if best_fitness >= target {
                    target_reached = true;
                    break;
                }
            }

            for _ in 0..self.config.iterations_per_temp {
                if !tracker.tick() {
                    budget_stop = true;
                    break;
                }
                iteration += 1;
                total_count += 1;

                let operator = operators[rng.gen_range(0..operators.len())];
                let mut neighbor = self.problem.neighbor(&current, operator, rng);
                self.problem.evaluate(&mut neighbor);

                let delta = neighbor.objective() - current.objective();

                let accept = if delta >= 0.0 {
                    true
                } else {
                    rng.gen::<f64>() < (delta / temperature).exp()
                };

                if accept {
                    accepted_count += 1;
                    current = neighbor;

                    if current.objective() > best_fitness {
                        best = current.clone();
                        best_fitness = best.objective();
                        stagnation_count = 0;
                    } else {
                        stagnation_count += 1;
                    }
                } else {
                    stagnation_count += 1;
                }

                if let Some(max) = self.config.max_iterations {
                    if iteration >= max {
                        break;
                    }
                }
            }

            history.push(best_fitness);
            log::debug!(
                "SA level T={:.4}: iteration {}, best {:.3}, current {:.3}",
                temperature,
                iteration,
                best_fitness,
                current.objective()
            );
            tracker.report(
                ProgressInfo::new()
                    .with_fitness(best_fitness)
                    .with_phase("simulated annealing"),
            );

            if budget_stop {
                break 'levels;
            }

            if self.config.enable_reheating && stagnation_count >= self.config.reheat_threshold {
                temperature = (temperature * self.config.reheat_factor).min(self.config.initial_temp);
                stagnation_count = 0;
                reheat_count += 1;
            }

            temperature = self.cool_down(temperature, temp_delta, accepted_count, total_count);
            accepted_count = 0;
            total_count = 0;
        }

        history.push(best_fitness);

        SaResult {
            best,
            final_temperature: temperature,
            iterations: iteration,
            elapsed: start.elapsed(),
            target_reached,
            reheat_count,
            history,
        }
    }

    fn cool_down(&self, current_temp: f64, delta: f64, accepted: usize, total: usize) -> f64 {
        match self.config.cooling_schedule {
            CoolingSchedule::Geometric => current_temp * self.config.cooling_rate,
            CoolingSchedule::Linear => (current_temp - delta).max(self.config.final_temp * 0.5),
            CoolingSchedule::Adaptive => {
                let acceptance_rate = if total > 0 {
                    accepted as f64 / total as f64
                } else {
                    0.5
                };

                // High acceptance cools faster, low acceptance cools slower.
                let adjusted_rate = if acceptance_rate > 0.5 {
                    self.config.cooling_rate * 0.95
                } else if acceptance_rate < 0.1 {
                    self.config.cooling_rate.powf(0.5)
                } else {
                    self.config.cooling_rate
                };

                current_temp * adjusted_rate
            }
            CoolingSchedule::LundyMees => {
                current_temp / (1.0 + self.config.cooling_rate * current_temp)
            }
        }
    }

    /// Runs one seeded chain per entry of `seeds` in parallel and keeps the best.
    ///
    /// Each chain gets an equal share of the remaining budget. The best
    /// objective wins and ties go to the lowest seed index, so the outcome does
    /// not depend on thread timing. Returns `None` only when `seeds` is empty.
    pub fn run_restarts(&self, seeds: &[u64], tracker: &mut BudgetTracker) -> Option<SaResult<P::Solution>> {
        if seeds.is_empty() {
            return None;
        }
        let workers = tracker.split(seeds.len());
        let runs: Vec<(SaResult<P::Solution>, BudgetTracker)> = seeds
            .par_iter()
            .zip(workers.into_par_iter())
            .map(|(&seed, mut worker)| {
                let mut rng = StdRng::seed_from_u64(seed);
                let result = self.run_with_rng(&mut rng, &mut worker);
                (result, worker)
            })
            .collect();

        let mut best: Option<(usize, SaResult<P::Solution>)> = None;
        for (index, (result, worker)) in runs.into_iter().enumerate() {
            tracker.absorb(&worker);
            let better = match &best {
                None => true,
                Some((_, current)) => result.best.objective() > current.best.objective(),
            };
            if better {
                best = Some((index, result));
            }
        }

        if let Some((index, result)) = &best {
            log::debug!(
                "SA restarts: {} chains, best from chain {} with objective {:.3}",
                seeds.len(),
                index,
                result.best.objective()
            );
        }

        best.map(|(_, result)| result)
    }
}
