//! Nesting result representation.

use crate::placement::{PartId, PlacedPart, PlacementStats};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Result of a nesting run.
///
/// Read-only once returned to the caller. Owns no geometry: every placement
/// refers to a part template by id and index.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Solution {
    /// Placed parts in the order they were committed.
    pub placements: Vec<PlacedPart>,

    /// Ids of part instances that could not be placed, one entry per instance.
    pub unplaced: Vec<PartId>,

    /// Placed part area divided by usable sheet area (0.0 - 1.0).
    pub utilization: f64,

    /// Total part area divided by usable sheet area, capped at 1.0.
    pub theoretical_max: f64,

    /// True when the time or iteration budget, or a cancellation, cut the search short.
    pub budget_limited: bool,

    /// Name of the strategy that produced this solution.
    pub strategy: Option<String>,

    /// Number of budget iterations consumed.
    pub iterations: u64,

    /// Computation time in milliseconds.
    pub computation_time_ms: u64,

    /// Best objective value reached by a refinement strategy.
    pub best_fitness: Option<f64>,

    /// Objective history for refinement strategies.
    pub fitness_history: Option<Vec<f64>>,
}

impl Solution {
    /// Creates a new empty solution.
    pub fn new() -> Self {
        Self {
            placements: Vec::new(),
            unplaced: Vec::new(),
            utilization: 0.0,
            theoretical_max: 0.0,
            budget_limited: false,
            strategy: None,
            iterations: 0,
            computation_time_ms: 0,
            best_fitness: None,
            fitness_history: None,
        }
    }

    /// Returns true if every part instance was placed.
    pub fn all_placed(&self) -> bool {
        self.unplaced.is_empty()
    }

    /// Returns the number of placed part instances.
    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }

    /// Returns the number of unplaced part instances.
    pub fn unplaced_count(&self) -> usize {
        self.unplaced.len()
    }

    /// Sets the strategy name.
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    /// Sets the best fitness.
    pub fn with_best_fitness(mut self, fitness: f64) -> Self {
        self.best_fitness = Some(fitness);
        self
    }

    /// Sets the fitness history.
    pub fn with_fitness_history(mut self, history: Vec<f64>) -> Self {
        self.fitness_history = Some(history);
        self
    }

    /// Removes duplicate entries from the unplaced list, keeping first occurrences.
    pub fn deduplicate_unplaced(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.unplaced.retain(|id| seen.insert(id.clone()));
    }

    /// Computes placement statistics.
    pub fn placement_stats(&self) -> PlacementStats {
        PlacementStats::from_placements(&self.placements)
    }

    /// Returns utilization as a percentage string.
    pub fn utilization_percent(&self) -> String {
        format!("{:.1}%", self.utilization * 100.0)
    }
}

impl Default for Solution {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary statistics for a solution.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolutionSummary {
    /// Total part instances requested.
    pub total_requested: usize,
    /// Total part instances placed.
    pub total_placed: usize,
    /// Utilization percentage.
    pub utilization_percent: f64,
    /// Theoretical maximum utilization percentage.
    pub theoretical_max_percent: f64,
    /// Whether the budget cut the search short.
    pub budget_limited: bool,
    /// Computation time in milliseconds.
    pub time_ms: u64,
    /// Strategy used.
    pub strategy: String,
}

impl From<&Solution> for SolutionSummary {
    fn from(solution: &Solution) -> Self {
        Self {
            total_requested: solution.placements.len() + solution.unplaced.len(),
            total_placed: solution.placements.len(),
            utilization_percent: solution.utilization * 100.0,
            theoretical_max_percent: solution.theoretical_max * 100.0,
            budget_limited: solution.budget_limited,
            time_ms: solution.computation_time_ms,
            strategy: solution
                .strategy
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solution_new() {
        let solution = Solution::new();
        assert!(solution.placements.is_empty());
        assert_eq!(solution.utilization, 0.0);
        assert!(solution.all_placed());
        assert!(!solution.budget_limited);
    }

    #[test]
    fn test_solution_with_placements() {
        let mut solution = Solution::new();
        solution
            .placements
            .push(PlacedPart::new("plate", 0, 0, 0.0, 0.0, 0.0));
        solution.utilization = 0.85;

        assert_eq!(solution.placed_count(), 1);
        assert_eq!(solution.utilization_percent(), "85.0%");
    }

    #[test]
    fn test_solution_with_unplaced() {
        let mut solution = Solution::new();
        solution.unplaced.push("G1".to_string());
        solution.unplaced.push("G2".to_string());

        assert!(!solution.all_placed());
        assert_eq!(solution.unplaced_count(), 2);
    }

    #[test]
    fn test_solution_summary() {
        let mut solution = Solution::new().with_strategy("blf");
        solution
            .placements
            .push(PlacedPart::new("plate", 0, 0, 0.0, 0.0, 0.0));
        solution.unplaced.push("gear".to_string());
        solution.utilization = 0.75;
        solution.theoretical_max = 0.9;
        solution.computation_time_ms = 100;

        let summary = SolutionSummary::from(&solution);
        assert_eq!(summary.total_requested, 2);
        assert_eq!(summary.total_placed, 1);
        assert_eq!(summary.utilization_percent, 75.0);
        assert_eq!(summary.strategy, "blf");
    }

    #[test]
    fn test_deduplicate_unplaced() {
        let mut solution = Solution::new();
        // Several instances of the same part failing to place
        solution.unplaced.push("G1".to_string());
        solution.unplaced.push("G1".to_string());
        solution.unplaced.push("G2".to_string());
        solution.unplaced.push("G1".to_string());

        solution.deduplicate_unplaced();

        assert_eq!(solution.unplaced, vec!["G1".to_string(), "G2".to_string()]);
    }
}
