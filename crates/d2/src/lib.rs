//! # kerfnest 2D
//!
//! 2D polygon nesting on rectangular sheets for CNC cutting.
//!
//! Parts are polygons with optional holes. The engine places copies of them
//! on a sheet without overlap, keeping kerf and minimum-web spacing, using
//! one of several placement strategies, and scores the result against
//! manufacturing objectives.
//!
//! ## Features
//!
//! - Validated polygon geometry with holes and octagonal spacing buffers
//! - Exact no-fit regions by convex decomposition, with a shared cache
//! - Uniform-grid spatial index and NFP or direct collision checks
//! - Bottom-left fill, multi-pass, beam search, simulated annealing and
//!   genetic placement strategies
//! - Utilization, cut length, pierce, machine time, thermal, remnant and cost scoring
//!
//! ## Quick Start
//!
//! ```rust
//! use kerfnest_d2::{Constraints, NestingSession, Part, RotationSet, Sheet};
//! use kerfnest_core::{Budget, StrategyKind};
//!
//! let parts = vec![
//!     Part::rectangle("bracket", 120.0, 60.0).unwrap().with_quantity(6),
//!     Part::l_shape("corner", 80.0, 80.0, 40.0, 40.0).unwrap().with_quantity(4),
//! ];
//! let constraints = Constraints::new(Sheet::small_test())
//!     .with_rotations(RotationSet::cardinal());
//!
//! let session = NestingSession::new(parts, constraints).unwrap();
//! let solution = session
//!     .nest(StrategyKind::BeamSearch, Budget::time_ms(2_000))
//!     .unwrap();
//!
//! println!(
//!     "placed {} parts, utilization {:.1}%",
//!     solution.placements.len(),
//!     solution.utilization * 100.0
//! );
//! ```
//!
//! ## Scoring
//!
//! ```rust
//! use kerfnest_d2::{score, Constraints, Part, ScoringWeights, Sheet};
//! use kerfnest_d2::nest;
//! use kerfnest_core::{Budget, StrategyKind};
//!
//! let parts = vec![Part::rectangle("r", 100.0, 50.0).unwrap().with_quantity(3)];
//! let constraints = Constraints::new(Sheet::small_test());
//! let solution = nest(parts.clone(), constraints.clone(), StrategyKind::MultiPass, Budget::unlimited()).unwrap();
//!
//! let breakdown = score(&solution, parts, constraints, &ScoringWeights::minimize_time()).unwrap();
//! println!("{}", breakdown.explain());
//! ```

pub mod beam_nesting;
pub mod boolean;
pub mod catalog;
pub mod collision;
pub mod config;
pub mod constraints;
pub mod features;
pub mod ga_nesting;
pub mod geometry;
pub mod layout;
pub mod metrics;
pub mod multipass_nesting;
pub mod nester;
pub mod nfp;
pub mod part;
pub mod sa_nesting;
pub mod scoring;
pub mod session;
pub mod sheet;
pub mod spatial_index;
pub mod strategy;

pub use beam_nesting::BeamSearch;
pub use catalog::{CatalogEntry, PartCatalog, PartInstance};
pub use collision::CollisionDetector;
pub use config::{CollisionMode, HoleMode, NestConfig, NfpMethod};
pub use constraints::{
    Constraints, Material, MaterialLibrary, RotationConstraints, RotationSet, SpacingConstraints,
};
pub use features::{FeatureExtractor, Features};
pub use ga_nesting::Genetic;
pub use geometry::{BoundingBox, Point, Polygon, Region, Shape};
pub use layout::{Layout, PlacedShape};
pub use metrics::{MetricsConfig, SolutionMetrics};
pub use multipass_nesting::MultiPass;
pub use nester::{BottomLeftFill, CandidateGenerator, StartOrder};
pub use nfp::{
    compute_inner_fit, CacheStats, InnerFit, Nfp, NfpCache, NfpCacheKey, NfpEngine, NfpFidelity,
    ShapeSignature,
};
pub use part::Part;
pub use sa_nesting::SimulatedAnnealing;
pub use scoring::{
    Comparison, Curve, MultiObjectiveScorer, ScoreBreakdown, ScoringCurves, ScoringWeights,
    WeightPreset,
};
pub use session::{compute_nfp, nest, score, NestingSession};
pub use sheet::{Margins, Sheet};
pub use spatial_index::SpatialIndex;
pub use strategy::{NestContext, PlacementStrategy};

pub use kerfnest_core::{
    Budget, BudgetTracker, Error, ErrorKind, PartId, PlacedPart, ProgressCallback, ProgressInfo,
    Result, Solution, SolutionSummary, StrategyKind,
};
