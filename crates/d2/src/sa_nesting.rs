//! Simulated annealing over complete layouts.
//!
//! The annealer starts from a bottom-left fill and perturbs the layout
//! directly. Every move re-validates the parts it touches through the
//! collision detector; a move that cannot be completed legally returns the
//! layout unchanged.
//!
//! # Moves
//!
//! - **Swap**: exchange the bounding-box corners of two placed parts
//! - **Rotate**: give one part another allowed rotation, in place or re-placed
//! - **Reinsert**: lift one to three parts and place them again with the unplaced ones
//! - **Jitter**: nudge one part up to half a grid step toward the bottom-left

use kerfnest_core::{
    BudgetTracker, NeighborhoodOperator, Result, SaProblem, SaRunner, SaSolution, Solution,
    StrategyKind,
};
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog::PartInstance;
use crate::layout::{Layout, PlacedShape};
use crate::nester::{place_sequence, CandidateGenerator};
use crate::strategy::{restart_seed, with_thread_pool, NestContext, PlacementStrategy};

/// Most parts lifted by one reinsert move.
const MAX_REINSERT: usize = 3;

/// A complete layout as seen by the annealer.
#[derive(Debug, Clone)]
pub struct SaLayout {
    /// Placed parts.
    pub layout: Layout,
    /// Parts without a position.
    pub unplaced: Vec<PartInstance>,
    objective: f64,
}

impl SaSolution for SaLayout {
    fn objective(&self) -> f64 {
        self.objective
    }

    fn set_objective(&mut self, value: f64) {
        self.objective = value;
    }
}

/// Annealing problem over one nesting context.
pub struct LayoutAnnealer<'a> {
    ctx: &'a NestContext,
    generator: CandidateGenerator<'a>,
    seed: SaLayout,
}

impl<'a> LayoutAnnealer<'a> {
    /// Creates a problem that starts every chain from `seed`.
    pub fn new(ctx: &'a NestContext, layout: Layout, unplaced: Vec<PartInstance>) -> Self {
        Self {
            ctx,
            generator: CandidateGenerator::new(ctx),
            seed: SaLayout {
                layout,
                unplaced,
                objective: f64::NEG_INFINITY,
            },
        }
    }

    /// Tries to add `shapes` to `layout` one by one.
    fn commit_all(&self, layout: &mut Layout, shapes: Vec<PlacedShape>) -> bool {
        let detector = self.ctx.detector();
        for shape in shapes {
            if !detector.can_place_shape(self.ctx.catalog(), &shape, layout) {
                return false;
            }
            detector.commit(shape, layout);
        }
        true
    }

    /// `shape` at `rotation`, moved so that its bounding box min corner sits at `(x, y)`.
    fn moved_to_corner(&self, shape: &PlacedShape, x: f64, y: f64, rotation: f64) -> Option<PlacedShape> {
        let entry = self.ctx.catalog().entry(&shape.placement)?;
        let bb = entry.polygon_at(rotation).bounding_box();
        let placement = shape
            .placement
            .rotated_to(rotation)
            .moved_to(x - bb.min_x, y - bb.min_y);
        Some(PlacedShape::new(entry, placement))
    }

    fn swap<R: Rng>(&self, state: &SaLayout, rng: &mut R) -> Option<SaLayout> {
        let n = state.layout.len();
        if n < 2 {
            return None;
        }
        let i = rng.gen_range(0..n);
        let mut j = rng.gen_range(0..n - 1);
        if j >= i {
            j += 1;
        }

        let a = state.layout.get(i)?;
        let b = state.layout.get(j)?;
        if a.placement.part_index == b.placement.part_index
            && (a.placement.rotation - b.placement.rotation).abs() < f64::EPSILON
        {
            return None;
        }
        let new_a = self.moved_to_corner(a, b.bbox.min_x, b.bbox.min_y, a.placement.rotation)?;
        let new_b = self.moved_to_corner(b, a.bbox.min_x, a.bbox.min_y, b.placement.rotation)?;

        let mut next = state.clone();
        next.layout.remove_many(&[i, j]);
        self.commit_all(&mut next.layout, vec![new_a, new_b])
            .then_some(next)
    }

    fn rotate<R: Rng>(&self, state: &SaLayout, rng: &mut R) -> Option<SaLayout> {
        let rotatable: Vec<usize> = state
            .layout
            .placed()
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                self.ctx
                    .catalog()
                    .entry(&s.placement)
                    .is_some_and(|e| e.rotations().len() > 1)
            })
            .map(|(h, _)| h)
            .collect();
        let &handle = rotatable.choose(rng)?;
        let shape = state.layout.get(handle)?;
        let entry = self.ctx.catalog().entry(&shape.placement)?;

        let current = entry.rotation_index(shape.placement.rotation).unwrap_or(0);
        let others: Vec<usize> = (0..entry.rotations().len()).filter(|&r| r != current).collect();
        let &target = others.choose(rng)?;
        let rotation = entry.rotations()[target];

        let mut next = state.clone();
        let removed = next.layout.remove(handle)?;
        let in_place = self.moved_to_corner(&removed, removed.bbox.min_x, removed.bbox.min_y, rotation)?;
        if self.ctx.detector().can_place_shape(self.ctx.catalog(), &in_place, &next.layout) {
            self.ctx.detector().commit(in_place, &mut next.layout);
            return Some(next);
        }

        let candidate = self
            .generator
            .best_with_rotations(&next.layout, removed.instance(), &[target])?;
        self.ctx.detector().commit(candidate.shape, &mut next.layout);
        Some(next)
    }

    fn reinsert<R: Rng>(&self, state: &SaLayout, rng: &mut R) -> Option<SaLayout> {
        let n = state.layout.len();
        if n == 0 && state.unplaced.is_empty() {
            return None;
        }
        let k = rng.gen_range(1..=MAX_REINSERT).min(n);
        let handles: Vec<usize> = rand::seq::index::sample(rng, n, k).into_vec();

        let mut next = state.clone();
        let mut lifted: Vec<PartInstance> = next
            .layout
            .remove_many(&handles)
            .iter()
            .map(PlacedShape::instance)
            .collect();
        lifted.shuffle(rng);
        lifted.append(&mut next.unplaced);

        next.unplaced = place_sequence(&self.generator, &mut next.layout, &lifted, None);
        Some(next)
    }

    fn jitter<R: Rng>(&self, state: &SaLayout, rng: &mut R) -> Option<SaLayout> {
        let n = state.layout.len();
        if n == 0 {
            return None;
        }
        let handle = rng.gen_range(0..n);
        let reach = self.generator.grid_step() / 2.0;
        let dx = rng.gen_range(0.0..=reach);
        let dy = rng.gen_range(0.0..=reach);

        let shape = state.layout.get(handle)?;
        let entry = self.ctx.catalog().entry(&shape.placement)?;
        let moved = PlacedShape::new(
            entry,
            shape
                .placement
                .moved_to(shape.placement.x - dx, shape.placement.y - dy),
        );

        let mut next = state.clone();
        next.layout.remove(handle)?;
        self.commit_all(&mut next.layout, vec![moved]).then_some(next)
    }
}

impl SaProblem for LayoutAnnealer<'_> {
    type Solution = SaLayout;

    fn initial_solution<R: Rng>(&self, _rng: &mut R) -> SaLayout {
        self.seed.clone()
    }

    fn neighbor<R: Rng>(&self, solution: &SaLayout, operator: NeighborhoodOperator, rng: &mut R) -> SaLayout {
        let moved = match operator {
            NeighborhoodOperator::Swap => self.swap(solution, rng),
            NeighborhoodOperator::Rotate => self.rotate(solution, rng),
            NeighborhoodOperator::Reinsert => self.reinsert(solution, rng),
            NeighborhoodOperator::Jitter => self.jitter(solution, rng),
        };
        moved.unwrap_or_else(|| solution.clone())
    }

    fn evaluate(&self, solution: &mut SaLayout) {
        let objective = self
            .ctx
            .refinement_score(&solution.layout, solution.unplaced.len());
        solution.set_objective(objective);
    }
}

/// Simulated annealing refinement of a bottom-left fill.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedAnnealing;

impl PlacementStrategy for SimulatedAnnealing {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SimulatedAnnealing
    }

    fn place(&self, ctx: &NestContext, tracker: &mut BudgetTracker) -> Result<Solution> {
        let config = ctx.config();
        let generator = CandidateGenerator::new(ctx);
        let mut seed_layout = ctx.new_layout();
        let instances = ctx.catalog().instances();
        let seed_unplaced = place_sequence(&generator, &mut seed_layout, &instances, Some(&mut *tracker));
        let seed_score = ctx.refinement_score(&seed_layout, seed_unplaced.len());

        if seed_layout.is_empty() && seed_unplaced.is_empty() {
            return Ok(ctx.finish(&seed_layout, &seed_unplaced, self.kind(), tracker));
        }

        let runner = SaRunner::new(
            config.sa.clone(),
            LayoutAnnealer::new(ctx, seed_layout.clone(), seed_unplaced.clone()),
        );
        let seeds: Vec<u64> = (0..config.restarts.max(1))
            .map(|i| restart_seed(config.seed, i))
            .collect();
        let result = with_thread_pool(config.threads, || runner.run_restarts(&seeds, &mut *tracker));

        let Some(result) = result else {
            return Ok(ctx.finish(&seed_layout, &seed_unplaced, self.kind(), tracker));
        };
        info!(
            "SA: {} chains, seed objective {:.2}, best {:.2}, {} reheats",
            seeds.len(),
            seed_score,
            result.best.objective(),
            result.reheat_count
        );
        debug!(
            "SA best layout: {} placed, {} unplaced",
            result.best.layout.len(),
            result.best.unplaced.len()
        );

        let best = &result.best;
        Ok(ctx
            .finish(&best.layout, &best.unplaced, self.kind(), tracker)
            .with_best_fitness(best.objective())
            .with_fitness_history(result.history.clone()))
    }
}
