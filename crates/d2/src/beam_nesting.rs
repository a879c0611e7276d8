//! Beam search over partial layouts.
//!
//! Parts are taken in processing order. Each beam state is expanded with its
//! best few candidates from the shared generator, then the beam is pruned back
//! to its width by state score. Expansion of the states of one depth runs in
//! parallel; every child owns its own layout.

use kerfnest_core::{BudgetTracker, ProgressInfo, Result, Solution, StrategyKind};
use log::debug;
use rayon::prelude::*;

use crate::catalog::PartInstance;
use crate::layout::Layout;
use crate::nester::CandidateGenerator;
use crate::strategy::{NestContext, PlacementStrategy};

/// Weight of the utilization fraction in the state score.
pub const UTILIZATION_WEIGHT: f64 = 1000.0;
/// Reward per placed part.
pub const PLACED_REWARD: f64 = 5.0;
/// Penalty per part that found no position.
pub const UNPLACED_PENALTY: f64 = 10.0;
/// Penalty per unit of used height fraction.
pub const HEIGHT_PENALTY: f64 = 10.0;

/// A partial layout in the beam.
#[derive(Debug, Clone)]
pub struct BeamState {
    /// Parts placed so far.
    pub layout: Layout,
    /// Parts that found no position.
    pub unplaced: Vec<PartInstance>,
    /// State score; higher is better.
    pub score: f64,
}

impl BeamState {
    fn empty(ctx: &NestContext) -> Self {
        Self {
            layout: ctx.new_layout(),
            unplaced: Vec::new(),
            score: 0.0,
        }
    }
}

/// Running score of a partial layout.
pub fn state_score(ctx: &NestContext, layout: &Layout, unplaced: usize) -> f64 {
    let usable = ctx.constraints().usable_bounds();
    let utilization = if usable.area() > 0.0 {
        layout.placed_area() / usable.area()
    } else {
        0.0
    };
    let used_height = match layout.extent() {
        Some(extent) if usable.height() > 0.0 => {
            ((extent.max_y - usable.min_y) / usable.height()).clamp(0.0, 1.0)
        }
        _ => 0.0,
    };
    UTILIZATION_WEIGHT * utilization + PLACED_REWARD * layout.len() as f64
        - UNPLACED_PENALTY * unplaced as f64
        - HEIGHT_PENALTY * used_height
}

/// Beam search placement.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeamSearch;

impl BeamSearch {
    fn expand(
        ctx: &NestContext,
        generator: &CandidateGenerator<'_>,
        state: &BeamState,
        instance: PartInstance,
        expansions: usize,
    ) -> Vec<BeamState> {
        let candidates = generator.top(&state.layout, instance, expansions);
        if candidates.is_empty() {
            let mut child = state.clone();
            child.unplaced.push(instance);
            child.score = state_score(ctx, &child.layout, child.unplaced.len());
            return vec![child];
        }

        candidates
            .into_iter()
            .map(|candidate| {
                let mut child = state.clone();
                ctx.detector().commit(candidate.shape, &mut child.layout);
                child.score = state_score(ctx, &child.layout, child.unplaced.len());
                child
            })
            .collect()
    }
}

impl PlacementStrategy for BeamSearch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BeamSearch
    }

    fn place(&self, ctx: &NestContext, tracker: &mut BudgetTracker) -> Result<Solution> {
        let config = ctx.config();
        let generator = CandidateGenerator::new(ctx);
        let instances = ctx.catalog().instances();

        let mut beam = vec![BeamState::empty(ctx)];
        let mut remaining: &[PartInstance] = &[];

        for (depth, &instance) in instances.iter().enumerate() {
            if !tracker.tick() {
                remaining = &instances[depth..];
                debug!(
                    "beam search stopped at depth {} of {}",
                    depth,
                    instances.len()
                );
                break;
            }

            let children: Vec<Vec<BeamState>> = beam
                .par_iter()
                .map(|state| Self::expand(ctx, &generator, state, instance, config.beam_expansions))
                .collect();
            let mut next: Vec<BeamState> = children.into_iter().flatten().collect();

            // Stable sort: ties keep generation order.
            next.sort_by(|a, b| b.score.total_cmp(&a.score));
            next.truncate(config.beam_width);
            beam = next;

            if let Some(best) = beam.first() {
                tracker.report(
                    ProgressInfo::new()
                        .with_phase("beam search")
                        .with_items(best.layout.len(), instances.len())
                        .with_fitness(best.score),
                );
            }
        }

        let mut best = beam
            .into_iter()
            .next()
            .unwrap_or_else(|| BeamState::empty(ctx));
        best.unplaced.extend_from_slice(remaining);
        let score = best.score;
        Ok(ctx
            .finish(&best.layout, &best.unplaced, self.kind(), tracker)
            .with_best_fitness(score))
    }
}
