//! Genetic Algorithm framework.
//!
//! Crossover and mutation live on the [`Individual`]; the [`GaProblem`] owns
//! evaluation and population seeding. One generation consumes one budget
//! iteration.

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use std::time::{Duration, Instant};

use crate::solver::{BudgetTracker, ProgressInfo};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the genetic algorithm.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GaConfig {
    /// Population size.
    pub population_size: usize,
    /// Maximum number of generations.
    pub max_generations: u32,
    /// Crossover rate (0.0 - 1.0).
    pub crossover_rate: f64,
    /// Mutation rate (0.0 - 1.0).
    pub mutation_rate: f64,
    /// Number of elite individuals to preserve each generation.
    pub elite_count: usize,
    /// Tournament size for selection.
    pub tournament_size: usize,
    /// Target fitness to stop early (None = run all generations).
    pub target_fitness: Option<f64>,
    /// Generations without improvement before an early stop.
    pub stagnation_limit: Option<u32>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            max_generations: 500,
            crossover_rate: 0.85,
            mutation_rate: 0.05,
            elite_count: 5,
            tournament_size: 3,
            target_fitness: None,
            stagnation_limit: Some(50),
        }
    }
}

impl GaConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the population size.
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size.max(2);
        self
    }

    /// Sets the maximum generations.
    pub fn with_max_generations(mut self, gen: u32) -> Self {
        self.max_generations = gen;
        self
    }

    /// Sets the crossover rate.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the elite count.
    pub fn with_elite_count(mut self, count: usize) -> Self {
        self.elite_count = count;
        self
    }

    /// Sets the tournament size.
    pub fn with_tournament_size(mut self, size: usize) -> Self {
        self.tournament_size = size.max(1);
        self
    }

    /// Sets the target fitness.
    pub fn with_target_fitness(mut self, fitness: f64) -> Self {
        self.target_fitness = Some(fitness);
        self
    }

    /// Sets the stagnation limit.
    pub fn with_stagnation_limit(mut self, limit: Option<u32>) -> Self {
        self.stagnation_limit = limit;
        self
    }
}

/// An individual in the population. Higher fitness is better.
pub trait Individual: Clone + Send + Sync {
    /// The fitness type (usually f64).
    type Fitness: PartialOrd + Copy + Send;

    /// Returns the fitness of this individual.
    fn fitness(&self) -> Self::Fitness;

    /// Creates a random individual.
    fn random<R: Rng>(rng: &mut R) -> Self;

    /// Performs crossover with another individual.
    fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self;

    /// Mutates this individual in place.
    fn mutate<R: Rng>(&mut self, rng: &mut R);
}

/// Problem-specific GA operations.
pub trait GaProblem: Send + Sync {
    /// The individual type for this problem.
    type Individual: Individual;

    /// Evaluates the fitness of an individual.
    fn evaluate(&self, individual: &mut Self::Individual);

    /// Evaluates multiple individuals in parallel.
    fn evaluate_parallel(&self, individuals: &mut [Self::Individual]) {
        individuals.par_iter_mut().for_each(|ind| {
            self.evaluate(ind);
        });
    }

    /// Creates an initial population.
    fn initialize_population<R: Rng>(&self, size: usize, rng: &mut R) -> Vec<Self::Individual> {
        (0..size).map(|_| Self::Individual::random(rng)).collect()
    }

    /// Called after each generation.
    fn on_generation(
        &self,
        _generation: u32,
        _best: &Self::Individual,
        _population: &[Self::Individual],
    ) {
    }
}

/// Result of a GA run.
#[derive(Debug, Clone)]
pub struct GaResult<I: Individual> {
    /// The best individual found.
    pub best: I,
    /// Generations completed.
    pub generations: u32,
    /// Total elapsed time.
    pub elapsed: Duration,
    /// Whether the target fitness was reached.
    pub target_reached: bool,
    /// Best fitness per generation.
    pub history: Vec<f64>,
}

/// Genetic algorithm runner.
pub struct GaRunner<P: GaProblem> {
    config: GaConfig,
    problem: P,
}

impl<P: GaProblem> GaRunner<P>
where
    <P::Individual as Individual>::Fitness: Into<f64>,
{
    /// Creates a new GA runner.
    pub fn new(config: GaConfig, problem: P) -> Self {
        Self { config, problem }
    }

    /// Returns the problem.
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// Runs the genetic algorithm.
    ///
    /// Returns `None` if the problem produced an empty initial population.
    pub fn run_with_rng<R: Rng>(
        &self,
        rng: &mut R,
        tracker: &mut BudgetTracker,
    ) -> Option<GaResult<P::Individual>> {
        let start = Instant::now();
        let mut history = Vec::new();

        let mut population = self
            .problem
            .initialize_population(self.config.population_size, rng);
        if population.is_empty() {
            return None;
        }

        self.problem.evaluate_parallel(&mut population);
        sort_by_fitness(&mut population);

        let mut best = population[0].clone();
        let mut best_fitness: f64 = best.fitness().into();
        let mut stagnation_count = 0u32;
        let mut generation = 0u32;
        let mut target_reached = false;
        let target_size = population.len().max(2);

        while generation < self.config.max_generations {
            if let Some(target) = self.config.target_fitness {
                if best_fitness >= target {
                    target_reached = true;
                    break;
                }
            }

            if !tracker.tick() {
                break;
            }

            history.push(best_fitness);

            let elite = self.config.elite_count.min(population.len());
            let mut next: Vec<P::Individual> = population.iter().take(elite).cloned().collect();

            let mut children: Vec<P::Individual> = Vec::with_capacity(target_size - next.len());
            while children.len() < target_size - next.len() {
                let parent1 = self.tournament_select(&population, rng);
                let parent2 = self.tournament_select(&population, rng);

                let mut child = if rng.gen::<f64>() < self.config.crossover_rate {
                    parent1.crossover(parent2, rng)
                } else {
                    parent1.clone()
                };

                if rng.gen::<f64>() < self.config.mutation_rate {
                    child.mutate(rng);
                }

                children.push(child);
            }

            self.problem.evaluate_parallel(&mut children);
            next.extend(children);
            sort_by_fitness(&mut next);

            let generation_best: f64 = next[0].fitness().into();
            if generation_best > best_fitness {
                best = next[0].clone();
                best_fitness = generation_best;
                stagnation_count = 0;
            } else {
                stagnation_count += 1;
            }

            self.problem.on_generation(generation, &best, &next);
            log::debug!(
                "GA generation {}: best {:.3}, stagnation {}",
                generation,
                best_fitness,
                stagnation_count
            );
            tracker.report(
                ProgressInfo::new()
                    .with_fitness(best_fitness)
                    .with_phase("genetic algorithm"),
            );

            population = next;
            generation += 1;

            if let Some(limit) = self.config.stagnation_limit {
                if stagnation_count >= limit {
                    break;
                }
            }
        }

        history.push(best_fitness);

        Some(GaResult {
            best,
            generations: generation,
            elapsed: start.elapsed(),
            target_reached,
            history,
        })
    }

    /// Runs one seeded population per entry of `seeds` in parallel and keeps
    /// the fittest.
    ///
    /// The remaining budget is split evenly between the runs. Ties go to the
    /// lowest seed index. Returns `None` when `seeds` is empty or no run
    /// produced a population.
    pub fn run_restarts(&self, seeds: &[u64], tracker: &mut BudgetTracker) -> Option<GaResult<P::Individual>> {
        if seeds.is_empty() {
            return None;
        }
        let workers = tracker.split(seeds.len());
        let runs: Vec<(Option<GaResult<P::Individual>>, BudgetTracker)> = seeds
            .par_iter()
            .zip(workers.into_par_iter())
            .map(|(&seed, mut worker)| {
                let mut rng = StdRng::seed_from_u64(seed);
                let result = self.run_with_rng(&mut rng, &mut worker);
                (result, worker)
            })
            .collect();

        let mut best: Option<(usize, GaResult<P::Individual>)> = None;
        for (index, (result, worker)) in runs.into_iter().enumerate() {
            tracker.absorb(&worker);
            let Some(result) = result else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((_, current)) => result.best.fitness() > current.best.fitness(),
            };
            if better {
                best = Some((index, result));
            }
        }

        if let Some((index, result)) = &best {
            let fitness: f64 = result.best.fitness().into();
            log::debug!(
                "GA restarts: {} runs, best from run {} with fitness {:.3}",
                seeds.len(),
                index,
                fitness
            );
        }

        best.map(|(_, result)| result)
    }

    fn tournament_select<'a, R: Rng>(
        &self,
        population: &'a [P::Individual],
        rng: &mut R,
    ) -> &'a P::Individual {
        let mut best_idx = rng.gen_range(0..population.len());

        for _ in 1..self.config.tournament_size {
            let idx = rng.gen_range(0..population.len());
            if population[idx].fitness() > population[best_idx].fitness() {
                best_idx = idx;
            }
        }

        &population[best_idx]
    }
}

/// Stable descending sort; equal fitness keeps insertion order.
fn sort_by_fitness<I: Individual>(population: &mut [I]) {
    population.sort_by(|a, b| {
        b.fitness()
            .partial_cmp(&a.fitness())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Part order plus a rotation choice per item.
///
/// `genes` is a permutation of item indices. `rotations[item]` indexes into
/// that item's allowed rotations, of which there are `rotation_options[item]`.
#[derive(Debug, Clone)]
pub struct PermutationChromosome {
    /// Processing order of items.
    pub genes: Vec<usize>,
    /// Rotation choice per item.
    pub rotations: Vec<usize>,
    /// Number of rotation choices per item.
    pub rotation_options: Vec<usize>,
    fitness: f64,
}

impl PermutationChromosome {
    /// Creates the identity order with every item at its first rotation.
    pub fn new(rotation_options: Vec<usize>) -> Self {
        let size = rotation_options.len();
        Self {
            genes: (0..size).collect(),
            rotations: vec![0; size],
            rotation_options,
            fitness: f64::NEG_INFINITY,
        }
    }

    /// Creates a chromosome from an explicit order and rotation choice.
    pub fn from_order(genes: Vec<usize>, rotations: Vec<usize>, rotation_options: Vec<usize>) -> Self {
        Self {
            genes,
            rotations,
            rotation_options,
            fitness: f64::NEG_INFINITY,
        }
    }

    /// Creates a random chromosome.
    pub fn random_with_options<R: Rng>(rotation_options: Vec<usize>, rng: &mut R) -> Self {
        let size = rotation_options.len();
        let mut genes: Vec<usize> = (0..size).collect();
        genes.shuffle(rng);

        let rotations: Vec<usize> = rotation_options
            .iter()
            .map(|&n| rng.gen_range(0..n.max(1)))
            .collect();

        Self {
            genes,
            rotations,
            rotation_options,
            fitness: f64::NEG_INFINITY,
        }
    }

    /// Sets the fitness value.
    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
    }

    /// Returns the number of genes.
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Order crossover (OX) on the permutation, uniform crossover on rotations.
    pub fn order_crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        let n = self.genes.len();
        if n < 2 || other.genes.len() != n {
            return self.clone();
        }

        let (mut p1, mut p2) = (rng.gen_range(0..n), rng.gen_range(0..n));
        if p1 > p2 {
            std::mem::swap(&mut p1, &mut p2);
        }

        let mut child_genes = vec![usize::MAX; n];
        let mut used = vec![false; n];

        for i in p1..=p2 {
            child_genes[i] = self.genes[i];
            used[self.genes[i]] = true;
        }

        let mut j = (p2 + 1) % n;
        for i in 0..n {
            let idx = (p2 + 1 + i) % n;
            if child_genes[idx] == usize::MAX {
                while used[other.genes[j]] {
                    j = (j + 1) % n;
                }
                child_genes[idx] = other.genes[j];
                used[other.genes[j]] = true;
                j = (j + 1) % n;
            }
        }

        let rotations: Vec<usize> = self
            .rotations
            .iter()
            .zip(&other.rotations)
            .map(|(a, b)| if rng.gen() { *a } else { *b })
            .collect();

        Self {
            genes: child_genes,
            rotations,
            rotation_options: self.rotation_options.clone(),
            fitness: f64::NEG_INFINITY,
        }
    }

    /// Swap mutation.
    pub fn swap_mutate<R: Rng>(&mut self, rng: &mut R) {
        if self.genes.len() < 2 {
            return;
        }

        let i = rng.gen_range(0..self.genes.len());
        let j = rng.gen_range(0..self.genes.len());
        self.genes.swap(i, j);
        self.fitness = f64::NEG_INFINITY;
    }

    /// Picks a new rotation for one item that has more than one choice.
    pub fn rotation_mutate<R: Rng>(&mut self, rng: &mut R) {
        let candidates: Vec<usize> = (0..self.rotations.len())
            .filter(|&i| self.rotation_options.get(i).copied().unwrap_or(1) > 1)
            .collect();
        if candidates.is_empty() {
            return;
        }

        let idx = candidates[rng.gen_range(0..candidates.len())];
        self.rotations[idx] = rng.gen_range(0..self.rotation_options[idx]);
        self.fitness = f64::NEG_INFINITY;
    }

    /// Inversion mutation (reverses a segment).
    pub fn inversion_mutate<R: Rng>(&mut self, rng: &mut R) {
        let n = self.genes.len();
        if n < 2 {
            return;
        }

        let (mut p1, mut p2) = (rng.gen_range(0..n), rng.gen_range(0..n));
        if p1 > p2 {
            std::mem::swap(&mut p1, &mut p2);
        }

        self.genes[p1..=p2].reverse();
        self.fitness = f64::NEG_INFINITY;
    }
}

impl Individual for PermutationChromosome {
    type Fitness = f64;

    fn fitness(&self) -> f64 {
        self.fitness
    }

    fn random<R: Rng>(rng: &mut R) -> Self {
        // Size is problem-specific; problems seed their own populations.
        Self::random_with_options(Vec::new(), rng)
    }

    fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        self.order_crossover(other, rng)
    }

    fn mutate<R: Rng>(&mut self, rng: &mut R) {
        let roll = rng.gen::<f64>();
        if roll < 0.6 {
            self.swap_mutate(rng);
        } else if roll < 0.8 {
            self.inversion_mutate(rng);
        } else {
            self.rotation_mutate(rng);
        }
    }
}
