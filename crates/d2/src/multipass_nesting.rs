//! Multi-pass placement: large parts first on a coarse grid, then medium and
//! small parts on progressively finer grids, all into one layout.

use kerfnest_core::{BudgetTracker, Result, Solution, StrategyKind};
use log::debug;

use crate::catalog::{PartCatalog, PartInstance};
use crate::nester::{place_sequence, CandidateGenerator};
use crate::strategy::{NestContext, PlacementStrategy};

/// Size class of a part copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Area at or above the large percentile.
    Large,
    /// Everything in between.
    Medium,
    /// Area below the small percentile.
    Small,
}

impl Bucket {
    /// Pass order.
    pub const ALL: [Bucket; 3] = [Bucket::Large, Bucket::Medium, Bucket::Small];

    fn index(self) -> usize {
        match self {
            Bucket::Large => 0,
            Bucket::Medium => 1,
            Bucket::Small => 2,
        }
    }
}

/// Splits `instances` into size buckets, keeping their relative order.
///
/// A copy's percentile rank is the fraction of copies with strictly smaller
/// area, so copies of equal area always share a bucket.
pub fn bucket_instances(
    catalog: &PartCatalog,
    instances: &[PartInstance],
    small_percentile: f64,
    large_percentile: f64,
) -> [Vec<PartInstance>; 3] {
    let area = |i: &PartInstance| catalog.get(i.part_index).map_or(0.0, |e| e.part().area());

    let mut areas: Vec<f64> = instances.iter().map(area).collect();
    areas.sort_by(f64::total_cmp);
    let n = areas.len().max(1) as f64;

    let mut buckets: [Vec<PartInstance>; 3] = Default::default();
    for instance in instances {
        let a = area(instance);
        let rank = areas.partition_point(|&x| x < a) as f64 / n;
        let bucket = if rank >= large_percentile {
            Bucket::Large
        } else if rank < small_percentile {
            Bucket::Small
        } else {
            Bucket::Medium
        };
        buckets[bucket.index()].push(*instance);
    }
    buckets
}

/// Bucketed bottom-left fill with coarse-to-fine resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiPass;

impl PlacementStrategy for MultiPass {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MultiPass
    }

    fn place(&self, ctx: &NestContext, tracker: &mut BudgetTracker) -> Result<Solution> {
        let config = ctx.config();
        let instances = ctx.catalog().instances();
        let buckets = bucket_instances(
            ctx.catalog(),
            &instances,
            config.small_percentile,
            config.large_percentile,
        );

        let mut layout = ctx.new_layout();
        let mut leftovers = Vec::new();
        for bucket in Bucket::ALL {
            let parts = &buckets[bucket.index()];
            if parts.is_empty() {
                continue;
            }
            let i = bucket.index();
            let positions =
                (config.max_search_positions as f64 * config.pass_position_factors[i]).round() as usize;
            let generator = CandidateGenerator::new(ctx)
                .with_resolution(config.grid_step * config.pass_step_factors[i], positions);
            let missed = place_sequence(&generator, &mut layout, parts, Some(&mut *tracker));
            debug!(
                "multi-pass {:?}: {} parts, {} unplaced",
                bucket,
                parts.len(),
                missed.len()
            );
            leftovers.extend(missed);
        }

        // Earlier passes searched a coarser grid; give their misses one more try.
        let unplaced = if leftovers.is_empty() || tracker.is_exhausted() {
            leftovers
        } else {
            let generator = CandidateGenerator::new(ctx);
            place_sequence(&generator, &mut layout, &leftovers, Some(&mut *tracker))
        };

        Ok(ctx.finish(&layout, &unplaced, self.kind(), tracker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NestConfig;
    use crate::constraints::{Constraints, RotationSet, SpacingConstraints};
    use crate::nfp::NfpCache;
    use crate::part::Part;
    use crate::sheet::Sheet;
    use std::sync::Arc;

    fn context(parts: Vec<Part>) -> NestContext {
        context_on(parts, Sheet::new(300.0, 200.0).with_margin(0.0))
    }

    fn context_on(parts: Vec<Part>, sheet: Sheet) -> NestContext {
        let constraints = Constraints::new(sheet)
            .with_spacing(SpacingConstraints::new(1.0, 0.0))
            .with_rotations(RotationSet::new([0.0, 90.0]).unwrap());
        let catalog = Arc::new(PartCatalog::new(parts, &constraints).unwrap());
        NestContext::new(catalog, constraints, NestConfig::default(), Arc::new(NfpCache::new())).unwrap()
    }

    fn mixed() -> Vec<Part> {
        vec![
            Part::rectangle("big", 100.0, 80.0).unwrap().with_quantity(2),
            Part::rectangle("mid", 40.0, 30.0).unwrap().with_quantity(3),
            Part::rectangle("tiny", 10.0, 10.0).unwrap().with_quantity(4),
        ]
    }

    #[test]
    fn test_buckets_by_area() {
        let ctx = context(mixed());
        let instances = ctx.catalog().instances();
        let [large, medium, small] = bucket_instances(ctx.catalog(), &instances, 0.33, 0.67);
        let ids = |v: &[PartInstance]| -> Vec<usize> { v.iter().map(|i| i.part_index).collect() };
        assert_eq!(ids(&large), vec![0, 0]);
        assert_eq!(ids(&medium), vec![1, 1, 1]);
        assert_eq!(ids(&small), vec![2, 2, 2, 2]);
    }

    #[test]
    fn test_equal_areas_share_a_bucket() {
        let ctx = context(vec![Part::rectangle("r", 10.0, 10.0).unwrap().with_quantity(3)]);
        let instances = ctx.catalog().instances();
        let [large, medium, small] = bucket_instances(ctx.catalog(), &instances, 0.33, 0.67);
        assert_eq!(small.len(), 3);
        assert!(large.is_empty() && medium.is_empty());
    }

    #[test]
    fn test_multipass_places_everything() {
        let ctx = context(mixed());
        let mut tracker = BudgetTracker::unlimited();
        let solution = MultiPass.place(&ctx, &mut tracker).unwrap();
        assert_eq!(solution.placements.len(), 9);
        assert!(solution.unplaced.is_empty());
        assert_eq!(solution.strategy.as_deref(), Some("multipass"));
        assert_eq!(solution.placements[0].part_id, "big");
        assert!(ctx.verify(&solution));
    }

    #[test]
    fn test_unplaced_keep_processing_order() {
        let ctx = context_on(
            vec![
                Part::rectangle("big", 100.0, 80.0).unwrap().with_quantity(2),
                Part::rectangle("mid", 60.0, 60.0).unwrap(),
                Part::l_shape("hook", 40.0, 40.0, 15.0, 15.0).unwrap().with_quantity(2),
            ],
            Sheet::new(30.0, 30.0).with_margin(0.0),
        );
        let mut tracker = BudgetTracker::unlimited();
        let solution = MultiPass.place(&ctx, &mut tracker).unwrap();

        let expected: Vec<String> = ctx
            .catalog()
            .instances()
            .iter()
            .map(|i| ctx.catalog().get(i.part_index).unwrap().id().to_string())
            .collect();
        assert!(solution.placements.is_empty());
        assert_eq!(solution.unplaced, expected);
        assert_eq!(solution.unplaced[0], "hook");
    }
}
