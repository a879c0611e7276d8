//! Integration tests for kerfnest-d2.

use std::sync::Arc;
use std::time::Instant;

use approx::assert_relative_eq;
use kerfnest_d2::boolean::intersection_area;
use kerfnest_d2::{
    compute_nfp, nest, Budget, CollisionDetector, CollisionMode, Constraints, HoleMode, Layout,
    NestConfig, NestingSession, NfpCache, NfpEngine, Part, PartCatalog, PlacedPart, Point, Polygon,
    RotationSet, Sheet, Solution, SpacingConstraints, StrategyKind,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn mixed_parts() -> Vec<Part> {
    vec![
        Part::rectangle("plate", 120.0, 80.0).unwrap().with_quantity(3),
        Part::l_shape("bracket", 90.0, 70.0, 40.0, 35.0).unwrap().with_quantity(4),
        Part::circle("disc", 25.0, 24).unwrap().with_quantity(3),
        Part::new(
            "frame",
            Polygon::with_holes(
                [(0.0, 0.0), (110.0, 0.0), (110.0, 110.0), (0.0, 110.0)],
                vec![vec![(25.0, 25.0), (85.0, 25.0), (85.0, 85.0), (25.0, 85.0)]],
            )
            .unwrap(),
        ),
        Part::rectangle("tab", 30.0, 15.0).unwrap().with_quantity(6),
    ]
}

fn mixed_constraints() -> Constraints {
    Constraints::new(Sheet::small_test())
        .with_spacing(SpacingConstraints::new(0.3, 2.0))
        .with_rotations(RotationSet::cardinal())
}

fn quick_config() -> NestConfig {
    NestConfig::default()
        .with_restarts(2)
        .with_beam(3, 6)
        .with_sa(
            kerfnest_core::SaConfig::default()
                .with_max_iterations(60)
                .with_iterations_per_temp(10),
        )
        .with_ga(
            kerfnest_core::GaConfig::default()
                .with_population_size(8)
                .with_max_generations(4)
                .with_elite_count(1),
        )
}

/// Checks the sheet containment, spacing and utilization invariants directly
/// on the transformed outlines.
fn assert_layout_invariants(solution: &Solution, parts: &[Part], constraints: &Constraints) {
    let usable = constraints.usable_bounds();
    let spacing = constraints.uniform_spacing();
    let outlines: Vec<Polygon> = solution
        .placements
        .iter()
        .map(|p| {
            let part = parts.iter().find(|part| part.id() == &p.part_id).unwrap();
            part.polygon().transform(&p.to_transform())
        })
        .collect();

    for (i, outline) in outlines.iter().enumerate() {
        let bb = outline.bounding_box();
        assert!(
            bb.min_x >= usable.min_x + spacing / 2.0 - 1e-6
                && bb.min_y >= usable.min_y + spacing / 2.0 - 1e-6
                && bb.max_x <= usable.max_x - spacing / 2.0 + 1e-6
                && bb.max_y <= usable.max_y - spacing / 2.0 + 1e-6,
            "placement {} leaves the usable sheet: {:?}",
            i,
            bb
        );
        for (j, other) in outlines.iter().enumerate().skip(i + 1) {
            assert!(!outline.intersects(other), "placements {} and {} overlap", i, j);
            let gap = outline.distance_to(other);
            assert!(
                gap >= spacing - 1e-4,
                "placements {} and {} are {:.4} apart, need {}",
                i,
                j,
                gap,
                spacing
            );
        }
    }

    assert!(solution.utilization >= 0.0);
    assert!(solution.utilization <= solution.theoretical_max.min(1.0) + 1e-9);
}

mod invariant_tests {
    use super::*;

    #[test]
    fn test_every_strategy_keeps_invariants() {
        let parts = mixed_parts();
        let constraints = mixed_constraints();
        let copies: usize = 17;
        let session = NestingSession::new(parts.clone(), constraints.clone())
            .unwrap()
            .with_config(quick_config());

        for kind in StrategyKind::ALL {
            let solution = session.nest(kind, Budget::unlimited()).unwrap();
            assert_eq!(
                solution.placed_count() + solution.unplaced_count(),
                copies,
                "{} lost track of a copy",
                kind
            );
            assert!(solution.placed_count() > 0, "{} placed nothing", kind);
            assert_layout_invariants(&solution, &parts, &constraints);
        }
    }

    #[test]
    fn test_direct_collision_mode_keeps_invariants() {
        let parts = mixed_parts();
        let constraints = mixed_constraints();
        let session = NestingSession::new(parts.clone(), constraints.clone())
            .unwrap()
            .with_config(quick_config().with_collision_mode(CollisionMode::Direct));
        let solution = session
            .nest(StrategyKind::BottomLeftFill, Budget::unlimited())
            .unwrap();
        assert_layout_invariants(&solution, &parts, &constraints);
    }

    #[test]
    fn test_overfull_sheet_reports_unplaced() {
        let parts = vec![Part::rectangle("slab", 250.0, 180.0).unwrap().with_quantity(6)];
        let constraints = mixed_constraints();
        let solution = nest(
            parts.clone(),
            constraints.clone(),
            StrategyKind::MultiPass,
            Budget::unlimited(),
        )
        .unwrap();
        assert!(solution.unplaced_count() > 0);
        assert!(solution.unplaced.iter().all(|id| id == "slab"));
        assert_relative_eq!(solution.theoretical_max, 1.0);
        assert_layout_invariants(&solution, &parts, &constraints);
    }

    #[test]
    fn test_iteration_budget_is_honoured_by_every_strategy() {
        let parts = mixed_parts();
        let constraints = mixed_constraints();
        let copies: usize = 17;
        let session = NestingSession::new(parts.clone(), constraints.clone())
            .unwrap()
            .with_config(quick_config().with_restarts(3));

        for kind in StrategyKind::ALL {
            for limit in [5u64, 60] {
                let solution = session.nest(kind, Budget::iterations(limit)).unwrap();
                assert!(
                    solution.iterations <= limit,
                    "{} spent {} of {} iterations",
                    kind,
                    solution.iterations,
                    limit
                );
                assert_eq!(solution.placed_count() + solution.unplaced_count(), copies);
                if limit < copies as u64 {
                    assert!(solution.budget_limited, "{} was cut short but not flagged", kind);
                }
                assert_layout_invariants(&solution, &parts, &constraints);
            }
        }
    }

    #[test]
    fn test_unplaced_follow_processing_order() {
        let parts = vec![
            Part::rectangle("slab", 250.0, 180.0).unwrap().with_quantity(4),
            Part::l_shape("hook", 120.0, 110.0, 40.0, 40.0).unwrap().with_quantity(5),
            Part::rectangle("strip", 400.0, 30.0).unwrap().with_quantity(3),
        ];
        let constraints = mixed_constraints();
        let catalog = PartCatalog::new(parts.clone(), &constraints).unwrap();
        let rank = |id: &str| {
            catalog
                .instances()
                .iter()
                .position(|i| catalog.get(i.part_index).unwrap().id() == id)
                .unwrap()
        };
        let session = NestingSession::new(parts, constraints)
            .unwrap()
            .with_config(quick_config());

        for kind in StrategyKind::ALL {
            let solution = session.nest(kind, Budget::unlimited()).unwrap();
            assert!(solution.unplaced_count() > 0, "{} placed everything", kind);
            let ranks: Vec<usize> = solution.unplaced.iter().map(|id| rank(id)).collect();
            assert!(
                ranks.windows(2).all(|w| w[0] <= w[1]),
                "{} unplaced out of order: {:?}",
                kind,
                solution.unplaced
            );
        }
    }
}

mod nfp_agreement_tests {
    use super::*;

    fn random_polygon(rng: &mut StdRng) -> Polygon {
        match rng.gen_range(0..4) {
            0 => Polygon::rectangle(rng.gen_range(5.0..40.0), rng.gen_range(5.0..40.0)).unwrap(),
            1 => {
                let w = rng.gen_range(20.0..50.0);
                let h = rng.gen_range(20.0..50.0);
                Part::l_shape("l", w, h, w * rng.gen_range(0.2..0.7), h * rng.gen_range(0.2..0.7))
                    .unwrap()
                    .polygon()
                    .clone()
            }
            2 => Part::circle("c", rng.gen_range(5.0..20.0), rng.gen_range(5..16))
                .unwrap()
                .polygon()
                .clone(),
            _ => {
                let w = rng.gen_range(10.0..40.0);
                Polygon::new([(0.0, 0.0), (w, 0.0), (rng.gen_range(0.0..w), rng.gen_range(8.0..40.0))])
                    .unwrap()
            }
        }
    }

    #[test]
    fn test_nfp_agrees_with_direct_intersection() {
        let mut rng = StdRng::seed_from_u64(2024);
        let rotations = [0.0, 90.0, 180.0, 270.0, 30.0];
        let mut checked = 0;

        for _ in 0..25 {
            let a = random_polygon(&mut rng);
            let b = random_polygon(&mut rng);
            let rot_b = rotations[rng.gen_range(0..rotations.len())];
            let nfp = compute_nfp(&a, &b, 0.0, rot_b);
            let b_rotated = b.rotate(rot_b, Point::default());

            let reach = a.bounding_box().union(&b_rotated.bounding_box());
            for _ in 0..40 {
                let p = Point::new(
                    rng.gen_range(-reach.width()..reach.width()),
                    rng.gen_range(-reach.height()..reach.height()),
                );
                let moved = b_rotated.translate(p.x, p.y);
                let overlap = intersection_area(&[a.to_shape()], &[moved.to_shape()]);
                // Skip near-contact samples where either answer is legitimate.
                if overlap < 1e-3 && a.distance_to(&moved) < 1e-3 {
                    continue;
                }
                assert_eq!(
                    nfp.contains(p),
                    a.intersects(&moved),
                    "disagreement at {:?} (overlap {:.6})",
                    p,
                    overlap
                );
                checked += 1;
            }
        }
        assert!(checked > 500);
    }

    #[test]
    fn test_collision_modes_agree_on_random_candidates() {
        let parts = vec![
            Part::l_shape("l", 40.0, 30.0, 20.0, 15.0).unwrap(),
            Part::circle("c", 10.0, 12).unwrap().with_quantity(2),
        ];
        let constraints = Constraints::new(Sheet::new(200.0, 200.0).with_margin(0.0))
            .with_spacing(SpacingConstraints::new(0.5, 1.0))
            .with_rotations(RotationSet::cardinal());
        let catalog = PartCatalog::new(parts, &constraints).unwrap();
        let spacing = constraints.uniform_spacing();
        let detector = |mode| {
            CollisionDetector::new(
                constraints.usable_bounds(),
                spacing,
                HoleMode::Void,
                mode,
                NfpEngine::new(Arc::new(NfpCache::new())).with_spacing(spacing),
            )
        };
        let nfp_mode = detector(CollisionMode::Nfp);
        let direct_mode = detector(CollisionMode::Direct);

        let mut layout = Layout::new(40.0);
        let (l_index, _) = catalog.by_id("l").unwrap();
        assert!(nfp_mode.try_commit(
            &catalog,
            &PlacedPart::new("l", l_index, 0, 80.0, 80.0, 90.0),
            &mut layout
        ));

        let (c_index, _) = catalog.by_id("c").unwrap();
        let mut rng = StdRng::seed_from_u64(99);
        let mut blocked = 0;
        for _ in 0..300 {
            let candidate = PlacedPart::new(
                "c",
                c_index,
                0,
                rng.gen_range(30.0..130.0),
                rng.gen_range(60.0..130.0),
                0.0,
            );
            let by_nfp = nfp_mode.can_place(&catalog, &candidate, &layout);
            let direct = direct_mode.can_place(&catalog, &candidate, &layout);
            if by_nfp != direct {
                // Only contact-distance cases may differ; octagon corners
                // reach at most 1/cos(22.5°) of the spacing.
                let shape = nfp_mode.realize(&catalog, &candidate).unwrap();
                let placed = &layout.placed()[0];
                let gap = shape.polygon.distance_to(&placed.polygon);
                assert!(
                    gap > spacing - 1e-3 && gap < spacing * 1.09,
                    "modes disagree at gap {}",
                    gap
                );
            }
            if !by_nfp {
                blocked += 1;
            }
        }
        assert!(blocked > 0 && blocked < 300);
    }
}

mod cache_tests {
    use super::*;

    #[test]
    fn test_cache_is_deterministic_and_effective() {
        let cache = Arc::new(NfpCache::new());
        let engine = NfpEngine::new(Arc::clone(&cache)).with_spacing(1.0);
        let a = Part::l_shape("a", 60.0, 40.0, 25.0, 20.0).unwrap().polygon().clone();
        let b = Part::circle("b", 12.0, 48).unwrap().polygon().clone();

        let start = Instant::now();
        let first = engine.compute(&a, &b, 0.0, 90.0);
        let cold = start.elapsed();

        let start = Instant::now();
        let second = engine.compute(&a, &b, 0.0, 90.0);
        let warm = start.elapsed();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.vertices(), second.vertices());
        assert!(warm < cold, "cached lookup {:?} not faster than {:?}", warm, cold);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_session_cache_warm_start() {
        let cache = Arc::new(NfpCache::new());
        let parts = mixed_parts();
        let first = NestingSession::new(parts.clone(), mixed_constraints())
            .unwrap()
            .with_cache(Arc::clone(&cache));
        first.nest(StrategyKind::BottomLeftFill, Budget::unlimited()).unwrap();
        let entries = cache.len();
        assert!(entries > 0);

        let second = NestingSession::new(parts, mixed_constraints())
            .unwrap()
            .with_cache(Arc::clone(&cache));
        second.nest(StrategyKind::BottomLeftFill, Budget::unlimited()).unwrap();
        assert_eq!(cache.len(), entries);
        assert!(cache.stats().hits > 0);
    }
}

mod determinism_tests {
    use super::*;

    #[test]
    fn test_strategies_are_deterministic() {
        for kind in StrategyKind::ALL {
            let run = || {
                NestingSession::new(mixed_parts(), mixed_constraints())
                    .unwrap()
                    .with_config(quick_config().with_seed(7))
                    .nest(kind, Budget::iterations(400))
                    .unwrap()
            };
            let a = run();
            let b = run();
            assert_eq!(a.placements, b.placements, "{} placements differ", kind);
            assert_eq!(a.unplaced, b.unplaced, "{} unplaced lists differ", kind);
        }
    }

    #[test]
    fn test_parallel_restarts_match_single_thread() {
        let run = |threads| {
            NestingSession::new(mixed_parts(), mixed_constraints())
                .unwrap()
                .with_config(quick_config().with_threads(threads))
                .nest(StrategyKind::SimulatedAnnealing, Budget::unlimited())
                .unwrap()
        };
        let single = run(1);
        let pooled = run(3);
        assert_eq!(single.placements, pooled.placements);
    }
}

mod scenario_tests {
    use super::*;

    fn exact_constraints(sheet: Sheet) -> Constraints {
        Constraints::new(sheet)
            .with_spacing(SpacingConstraints::zero())
            .with_rotations(RotationSet::new([0.0, 90.0]).unwrap())
    }

    #[test]
    fn test_perfect_fit() {
        let parts = vec![Part::rectangle("r", 50.0, 30.0).unwrap().with_quantity(4)];
        let constraints = exact_constraints(Sheet::new(200.0, 100.0).with_margin(0.0));
        for kind in StrategyKind::ALL {
            let solution = nest(parts.clone(), constraints.clone(), kind, Budget::unlimited()).unwrap();
            assert_eq!(solution.placed_count(), 4, "{}", kind);
            assert!(solution.unplaced.is_empty());
            assert_relative_eq!(solution.utilization, 0.30, epsilon = 1e-9);
            assert_layout_invariants(&solution, &parts, &constraints);
        }
    }

    #[test]
    fn test_oversized_part() {
        let parts = vec![Part::rectangle("huge", 250.0, 50.0).unwrap()];
        let constraints = exact_constraints(Sheet::new(200.0, 100.0).with_margin(0.0))
            .with_rotations(RotationSet::no_rotation());
        for kind in StrategyKind::ALL {
            let solution = nest(parts.clone(), constraints.clone(), kind, Budget::unlimited()).unwrap();
            assert_eq!(solution.placed_count(), 0);
            assert_eq!(solution.unplaced, vec!["huge".to_string()]);
            assert_eq!(solution.utilization, 0.0);
        }
    }

    #[test]
    fn test_holed_part_void_and_solid() {
        let parts = vec![
            Part::new(
                "frame",
                Polygon::with_holes(
                    [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)],
                    vec![vec![(20.0, 20.0), (80.0, 20.0), (80.0, 80.0), (20.0, 80.0)]],
                )
                .unwrap(),
            ),
            Part::rectangle("insert", 40.0, 40.0).unwrap(),
        ];
        let constraints = exact_constraints(Sheet::new(100.0, 100.0).with_margin(0.0))
            .with_rotations(RotationSet::no_rotation());

        let run = |hole_mode| {
            NestingSession::new(parts.clone(), constraints.clone())
                .unwrap()
                .with_config(NestConfig::default().with_hole_mode(hole_mode))
                .nest(StrategyKind::BottomLeftFill, Budget::unlimited())
                .unwrap()
        };

        let void = run(HoleMode::Void);
        assert_eq!(void.placed_count(), 2);
        let insert = void.placements.iter().find(|p| p.part_id == "insert").unwrap();
        assert!(insert.x >= 20.0 - 1e-6 && insert.x + 40.0 <= 80.0 + 1e-6);
        assert!(insert.y >= 20.0 - 1e-6 && insert.y + 40.0 <= 80.0 + 1e-6);

        let solid = run(HoleMode::Solid);
        assert_eq!(solid.placed_count(), 1);
        assert_eq!(solid.unplaced, vec!["insert".to_string()]);

        // The same position checked directly in both modes.
        let catalog = PartCatalog::new(parts.clone(), &constraints).unwrap();
        for (hole_mode, expected) in [(HoleMode::Void, true), (HoleMode::Solid, false)] {
            for mode in [CollisionMode::Nfp, CollisionMode::Direct] {
                let detector = CollisionDetector::new(
                    constraints.usable_bounds(),
                    0.0,
                    hole_mode,
                    mode,
                    NfpEngine::new(Arc::new(NfpCache::new())).with_hole_mode(hole_mode),
                );
                let mut layout = Layout::new(50.0);
                assert!(detector.try_commit(
                    &catalog,
                    &PlacedPart::new("frame", 0, 0, 0.0, 0.0, 0.0),
                    &mut layout
                ));
                let inside = PlacedPart::new("insert", 1, 0, 30.0, 30.0, 0.0);
                assert_eq!(detector.can_place(&catalog, &inside, &layout), expected);
            }
        }
    }

    #[test]
    fn test_beam_budget_expiry() {
        let parts: Vec<Part> = (0..12)
            .map(|i| {
                Part::rectangle(format!("p{}", i), 20.0 + i as f64 * 3.0, 15.0 + (i % 4) as f64 * 5.0)
                    .unwrap()
                    .with_quantity(3)
            })
            .collect();
        let constraints = mixed_constraints();
        let solution = nest(
            parts.clone(),
            constraints.clone(),
            StrategyKind::BeamSearch,
            Budget::iterations(4),
        )
        .unwrap();
        assert!(solution.budget_limited);
        assert_eq!(solution.placed_count(), 4);
        assert_eq!(solution.unplaced_count(), 32);
        assert_layout_invariants(&solution, &parts, &constraints);
    }

    #[test]
    fn test_time_budget_is_honoured() {
        let parts: Vec<Part> = (0..8)
            .map(|i| Part::l_shape(format!("l{}", i), 40.0 + i as f64, 35.0, 15.0, 12.0).unwrap().with_quantity(4))
            .collect();
        let session = NestingSession::new(parts, mixed_constraints()).unwrap();
        let start = Instant::now();
        let solution = session
            .nest(StrategyKind::SimulatedAnnealing, Budget::time_ms(300))
            .unwrap();
        assert!(start.elapsed().as_millis() < 5_000);
        assert_eq!(solution.placed_count() + solution.unplaced_count(), 32);
    }
}

mod scoring_tests {
    use super::*;
    use kerfnest_d2::{score, Comparison, MultiObjectiveScorer, ScoringWeights, WeightPreset};

    #[test]
    fn test_more_placed_scores_higher() {
        let parts = vec![Part::rectangle("r", 100.0, 60.0).unwrap().with_quantity(8)];
        let constraints = mixed_constraints();
        let full = nest(parts.clone(), constraints.clone(), StrategyKind::BottomLeftFill, Budget::unlimited()).unwrap();
        let partial = nest(parts.clone(), constraints.clone(), StrategyKind::BeamSearch, Budget::iterations(2)).unwrap();
        assert!(full.placed_count() > partial.placed_count());

        let weights = ScoringWeights::preset(WeightPreset::MaximizeUtilization);
        let a = score(&full, parts.clone(), constraints.clone(), &weights).unwrap();
        let b = score(&partial, parts.clone(), constraints.clone(), &weights).unwrap();
        assert!(a.total > b.total);

        let catalog = PartCatalog::new(parts, &constraints).unwrap();
        let scorer = MultiObjectiveScorer::new(weights).unwrap();
        assert_eq!(scorer.compare(&full, &partial, &catalog, &constraints), Comparison::Better);
        assert_eq!(scorer.compare(&full, &full, &catalog, &constraints), Comparison::Equal);
    }

    #[test]
    fn test_breakdown_explains_every_objective() {
        let parts = mixed_parts();
        let solution = nest(parts.clone(), mixed_constraints(), StrategyKind::MultiPass, Budget::unlimited()).unwrap();
        let breakdown = score(&solution, parts, mixed_constraints(), &ScoringWeights::default()).unwrap();
        let report = breakdown.explain();
        for label in [
            "utilization",
            "cut_length",
            "pierce_count",
            "machine_time",
            "thermal_risk",
            "remnant_value",
            "total_cost",
        ] {
            assert!(report.contains(label), "missing {} in\n{}", label, report);
        }
        assert!(breakdown.total >= 0.0 && breakdown.total <= 100.0);
    }
}
