//! # kerfnest core
//!
//! Dimension-agnostic building blocks for the kerfnest 2D nesting engine.
//!
//! ## Core Components
//!
//! - **Errors**: [`Error`], [`ErrorKind`], [`Result`]
//! - **Robust predicates**: [`robust`] orientation tests and segment checks
//! - **Transforms**: [`Transform2D`] (rotation in degrees, then translation)
//! - **Results**: [`PlacedPart`], [`Solution`], [`SolutionSummary`]
//! - **Budgets**: [`Budget`], [`BudgetTracker`], [`ProgressInfo`]
//! - **SA framework**: [`SaRunner`], [`SaProblem`]
//! - **GA framework**: [`GaRunner`], [`GaProblem`], [`PermutationChromosome`]
//!
//! ## Strategies
//!
//! The [`StrategyKind`] enum names the placement strategies the 2D engine
//! dispatches over:
//!
//! | Strategy | Speed | Quality | Description |
//! |----------|-------|---------|-------------|
//! | `BottomLeftFill` | Fast | Basic | Greedy bottom-left placement |
//! | `MultiPass` | Fast | Good | Large, medium, small buckets with refining resolution |
//! | `BeamSearch` | Medium | Good | Keeps the best K partial layouts per step |
//! | `SimulatedAnnealing` | Slow | High | Layout moves on a greedy seed |
//! | `Genetic` | Slow | High | Order and rotation chromosomes |
//!
//! ## Budgets
//!
//! ```rust
//! use kerfnest_core::{Budget, BudgetTracker};
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//!
//! let mut tracker = BudgetTracker::new(Budget::iterations(2), Arc::new(AtomicBool::new(false)));
//! assert!(tracker.tick());
//! assert!(tracker.tick());
//! assert!(!tracker.tick());
//! assert!(tracker.limited());
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod error;
pub mod ga;
pub mod placement;
pub mod result;
pub mod robust;
pub mod sa;
pub mod solver;
pub mod transform;

// Re-exports
pub use error::{Error, ErrorKind, Result};
pub use ga::{GaConfig, GaProblem, GaResult, GaRunner, Individual, PermutationChromosome};
pub use placement::{PartId, PlacedPart, PlacementStats};
pub use result::{Solution, SolutionSummary};
pub use sa::{
    CoolingSchedule, NeighborhoodOperator, SaConfig, SaProblem, SaResult, SaRunner, SaSolution,
};
pub use solver::{Budget, BudgetTracker, ProgressCallback, ProgressInfo, StrategyKind};
pub use transform::{angles_equal, normalize_degrees, Transform2D, ANGLE_TOLERANCE_DEG};
