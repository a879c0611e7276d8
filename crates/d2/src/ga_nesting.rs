//! Genetic algorithm over placement orders.
//!
//! A chromosome is a permutation of the part copies plus a preferred rotation
//! index per copy. Decoding places the copies in chromosome order with the
//! bottom-left candidate generator, trying the preferred rotation first and
//! the remaining allowed rotations after it. Fitness is the refinement score
//! of the decoded layout.
//!
//! `NestConfig::restarts` independent populations run in parallel, each from
//! its own seed, and the fittest result is kept.

use kerfnest_core::{
    BudgetTracker, GaProblem, GaRunner, Individual, PermutationChromosome, ProgressInfo, Result,
    Solution, StrategyKind,
};
use log::info;
use rand::Rng;

use crate::catalog::PartInstance;
use crate::layout::Layout;
use crate::nester::{place_sequence, CandidateGenerator};
use crate::strategy::{restart_seed, with_thread_pool, NestContext, PlacementStrategy};

/// A decoded chromosome.
#[derive(Debug, Clone)]
pub struct Decoded {
    /// Placed parts.
    pub layout: Layout,
    /// Copies without a position.
    pub unplaced: Vec<PartInstance>,
}

/// Order-and-rotation nesting problem.
pub struct NestingGa<'a> {
    ctx: &'a NestContext,
    generator: CandidateGenerator<'a>,
    instances: Vec<PartInstance>,
    rotation_options: Vec<usize>,
}

impl<'a> NestingGa<'a> {
    /// Creates the problem for every copy in the catalog.
    pub fn new(ctx: &'a NestContext) -> Self {
        let instances = ctx.catalog().instances();
        let rotation_options = instances
            .iter()
            .map(|i| {
                ctx.catalog()
                    .get(i.part_index)
                    .map_or(1, |e| e.rotations().len().max(1))
            })
            .collect();
        Self {
            ctx,
            generator: CandidateGenerator::new(ctx),
            instances,
            rotation_options,
        }
    }

    /// Number of genes.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True when there is nothing to place.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Places the copies in chromosome order.
    pub fn decode(&self, chromosome: &PermutationChromosome) -> Decoded {
        let mut layout = self.ctx.new_layout();
        let mut unplaced = Vec::new();

        for &gene in &chromosome.genes {
            let Some(&instance) = self.instances.get(gene) else {
                continue;
            };
            let options = self.rotation_options[gene];
            let preferred = chromosome.rotations.get(gene).copied().unwrap_or(0) % options;

            let candidate = self
                .generator
                .best_with_rotations(&layout, instance, &[preferred])
                .or_else(|| {
                    let others: Vec<usize> = (0..options).filter(|&r| r != preferred).collect();
                    if others.is_empty() {
                        None
                    } else {
                        self.generator.best_with_rotations(&layout, instance, &others)
                    }
                });
            match candidate {
                Some(c) => {
                    self.ctx.detector().commit(c.shape, &mut layout);
                }
                None => unplaced.push(instance),
            }
        }

        Decoded { layout, unplaced }
    }

    /// The chromosome that reproduces a greedy bottom-left fill.
    fn greedy_chromosome(&self) -> PermutationChromosome {
        let mut layout = self.ctx.new_layout();
        place_sequence(&self.generator, &mut layout, &self.instances, None);

        let rotations = self
            .instances
            .iter()
            .map(|&instance| {
                layout
                    .placed()
                    .iter()
                    .find(|s| s.instance() == instance)
                    .and_then(|s| {
                        self.ctx
                            .catalog()
                            .entry(&s.placement)
                            .and_then(|e| e.rotation_index(s.placement.rotation))
                    })
                    .unwrap_or(0)
            })
            .collect();

        PermutationChromosome::from_order(
            (0..self.instances.len()).collect(),
            rotations,
            self.rotation_options.clone(),
        )
    }
}

impl GaProblem for NestingGa<'_> {
    type Individual = PermutationChromosome;

    fn evaluate(&self, individual: &mut PermutationChromosome) {
        let decoded = self.decode(individual);
        let fitness = self
            .ctx
            .refinement_score(&decoded.layout, decoded.unplaced.len());
        individual.set_fitness(fitness);
    }

    fn initialize_population<R: Rng>(&self, size: usize, rng: &mut R) -> Vec<PermutationChromosome> {
        if self.instances.is_empty() || size == 0 {
            return Vec::new();
        }
        let mut population = Vec::with_capacity(size);
        population.push(self.greedy_chromosome());
        while population.len() < size {
            population.push(PermutationChromosome::random_with_options(
                self.rotation_options.clone(),
                rng,
            ));
        }
        population
    }
}

/// Genetic algorithm placement.
#[derive(Debug, Clone, Copy, Default)]
pub struct Genetic;

impl PlacementStrategy for Genetic {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Genetic
    }

    fn place(&self, ctx: &NestContext, tracker: &mut BudgetTracker) -> Result<Solution> {
        let config = ctx.config();
        let problem = NestingGa::new(ctx);
        if problem.is_empty() {
            let layout = ctx.new_layout();
            return Ok(ctx.finish(&layout, &[], self.kind(), tracker));
        }
        let total = problem.len();

        let runner = GaRunner::new(config.ga.clone(), problem);
        let seeds: Vec<u64> = (0..config.restarts.max(1))
            .map(|i| restart_seed(config.seed, i))
            .collect();
        let result = with_thread_pool(config.threads, || runner.run_restarts(&seeds, &mut *tracker));

        let problem = runner.problem();
        let Some(result) = result else {
            let mut layout = ctx.new_layout();
            let unplaced = place_sequence(&problem.generator, &mut layout, &problem.instances, None);
            return Ok(ctx.finish(&layout, &unplaced, self.kind(), tracker));
        };

        let decoded = problem.decode(&result.best);
        let fitness = result.best.fitness();
        info!(
            "GA: {} runs, {} generations in the best, fitness {:.2}, {} of {} placed",
            seeds.len(),
            result.generations,
            fitness,
            decoded.layout.len(),
            total
        );
        tracker.report(
            ProgressInfo::new()
                .with_phase("genetic")
                .with_items(decoded.layout.len(), total)
                .with_fitness(fitness)
                .finished(),
        );

        Ok(ctx
            .finish(&decoded.layout, &decoded.unplaced, self.kind(), tracker)
            .with_best_fitness(fitness)
            .with_fitness_history(result.history))
    }
}
