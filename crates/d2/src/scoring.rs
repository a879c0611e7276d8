//! Multi-objective scoring of layouts.
//!
//! Seven sub-scores in `[0, 100]` are combined by a weighted sum. Each raw
//! metric is mapped through a piecewise-linear [`Curve`]; the curves are
//! configuration, so callers can recalibrate them without touching the scorer.

use std::fmt;
use std::str::FromStr;

use kerfnest_core::{Error, Result, Solution};

use crate::catalog::PartCatalog;
use crate::constraints::Constraints;
use crate::layout::PlacedShape;
use crate::metrics::{MetricsConfig, SolutionMetrics};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Allowed deviation of the weight sum from 1.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

/// Total score difference below which two layouts compare equal.
pub const COMPARE_TOLERANCE: f64 = 0.1;

// ============================================================================
// Curves
// ============================================================================

/// Piecewise-linear map from a raw measurement to a score.
///
/// Inputs below the first knot or above the last take that knot's score.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Curve {
    knots: Vec<(f64, f64)>,
}

impl Curve {
    /// Creates a curve from `(input, score)` knots with strictly increasing inputs.
    pub fn new(knots: impl IntoIterator<Item = (f64, f64)>) -> Result<Self> {
        let knots: Vec<(f64, f64)> = knots.into_iter().collect();
        if knots.is_empty() {
            return Err(Error::ConfigError("curve needs at least one knot".into()));
        }
        if knots.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(Error::ConfigError("curve knots must be finite".into()));
        }
        if knots.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(Error::ConfigError(
                "curve knot inputs must be strictly increasing".into(),
            ));
        }
        Ok(Self { knots })
    }

    fn from_table(knots: &[(f64, f64)]) -> Self {
        Self {
            knots: knots.to_vec(),
        }
    }

    /// Knots in input order.
    pub fn knots(&self) -> &[(f64, f64)] {
        &self.knots
    }

    /// Score of `input`.
    pub fn eval(&self, input: f64) -> f64 {
        let (first, last) = match (self.knots.first(), self.knots.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return 0.0,
        };
        if input.is_nan() {
            return 0.0;
        }
        if input <= first.0 {
            return first.1;
        }
        if input >= last.0 {
            return last.1;
        }
        for w in self.knots.windows(2) {
            let ((x0, y0), (x1, y1)) = (w[0], w[1]);
            if input <= x1 {
                let t = (input - x0) / (x1 - x0);
                return y0 + t * (y1 - y0);
            }
        }
        last.1
    }
}

/// The curves of the five measured objectives.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScoringCurves {
    /// Utilization as a percentage of the theoretical maximum.
    pub utilization: Curve,
    /// Cut length over the cut length of equal-area squares.
    pub cut_length: Curve,
    /// Pierces beyond one per part.
    pub pierce: Curve,
    /// Machine time over one minute per 1000 mm² of placed parts.
    pub machine_time: Curve,
    /// Total cost per mm² of placed parts.
    pub cost: Curve,
}

impl Default for ScoringCurves {
    fn default() -> Self {
        Self {
            utilization: Curve::from_table(&[
                (0.0, 0.0),
                (60.0, 40.0),
                (70.0, 70.0),
                (80.0, 90.0),
                (90.0, 98.0),
                (100.0, 100.0),
            ]),
            cut_length: Curve::from_table(&[(1.5, 100.0), (2.5, 60.0), (4.0, 30.0), (7.0, 0.0)]),
            pierce: Curve::from_table(&[(0.0, 100.0), (20.0, 0.0)]),
            machine_time: Curve::from_table(&[(0.8, 100.0), (1.2, 50.0), (3.2, 0.0)]),
            cost: Curve::from_table(&[(0.001, 100.0), (0.002, 50.0), (0.004, 0.0)]),
        }
    }
}

// ============================================================================
// Weights
// ============================================================================

/// Relative importance of the seven objectives. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScoringWeights {
    /// Material utilization.
    pub utilization: f64,
    /// Cut path length.
    pub cut_length: f64,
    /// Pierce count.
    pub pierce_count: f64,
    /// Machine time.
    pub machine_time: f64,
    /// Thermal risk.
    pub thermal_risk: f64,
    /// Remnant value.
    pub remnant_value: f64,
    /// Total cost.
    pub total_cost: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            utilization: 0.35,
            cut_length: 0.20,
            pierce_count: 0.15,
            machine_time: 0.15,
            thermal_risk: 0.05,
            remnant_value: 0.05,
            total_cost: 0.05,
        }
    }
}

impl ScoringWeights {
    /// Validated custom weights.
    #[allow(clippy::too_many_arguments)]
    pub fn custom(
        utilization: f64,
        cut_length: f64,
        pierce_count: f64,
        machine_time: f64,
        thermal_risk: f64,
        remnant_value: f64,
        total_cost: f64,
    ) -> Result<Self> {
        let weights = Self {
            utilization,
            cut_length,
            pierce_count,
            machine_time,
            thermal_risk,
            remnant_value,
            total_cost,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Material first.
    pub fn maximize_utilization() -> Self {
        Self {
            utilization: 0.8,
            cut_length: 0.05,
            pierce_count: 0.05,
            machine_time: 0.05,
            thermal_risk: 0.025,
            remnant_value: 0.025,
            total_cost: 0.0,
        }
    }

    /// Machine time first.
    pub fn minimize_time() -> Self {
        Self {
            utilization: 0.2,
            cut_length: 0.3,
            pierce_count: 0.2,
            machine_time: 0.25,
            thermal_risk: 0.025,
            remnant_value: 0.0,
            total_cost: 0.025,
        }
    }

    /// Balance of material and machine cost.
    pub fn maximize_profit() -> Self {
        Self {
            utilization: 0.30,
            cut_length: 0.20,
            pierce_count: 0.15,
            machine_time: 0.20,
            thermal_risk: 0.05,
            remnant_value: 0.05,
            total_cost: 0.05,
        }
    }

    /// Weights of a named preset.
    pub fn preset(preset: WeightPreset) -> Self {
        match preset {
            WeightPreset::MaximizeUtilization => Self::maximize_utilization(),
            WeightPreset::MinimizeTime => Self::minimize_time(),
            WeightPreset::MaximizeProfit => Self::maximize_profit(),
        }
    }

    fn as_array(&self) -> [f64; 7] {
        [
            self.utilization,
            self.cut_length,
            self.pierce_count,
            self.machine_time,
            self.thermal_risk,
            self.remnant_value,
            self.total_cost,
        ]
    }

    /// Sum of all weights.
    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Rejects negative weights and sums outside `1 ± 0.01`.
    pub fn validate(&self) -> Result<()> {
        if self.as_array().iter().any(|w| !(*w >= 0.0) || !w.is_finite()) {
            return Err(Error::InvalidWeights(format!(
                "weights must be finite and non-negative: {:?}",
                self
            )));
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(Error::InvalidWeights(format!(
                "weights must sum to 1.0, got {:.4}",
                sum
            )));
        }
        Ok(())
    }
}

/// Named weight presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WeightPreset {
    /// [`ScoringWeights::maximize_utilization`].
    MaximizeUtilization,
    /// [`ScoringWeights::minimize_time`].
    MinimizeTime,
    /// [`ScoringWeights::maximize_profit`].
    MaximizeProfit,
}

impl WeightPreset {
    /// Preset name.
    pub fn name(&self) -> &'static str {
        match self {
            WeightPreset::MaximizeUtilization => "maximize_utilization",
            WeightPreset::MinimizeTime => "minimize_time",
            WeightPreset::MaximizeProfit => "maximize_profit",
        }
    }
}

impl fmt::Display for WeightPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WeightPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "maximize_utilization" | "utilization" => Ok(WeightPreset::MaximizeUtilization),
            "minimize_time" | "time" => Ok(WeightPreset::MinimizeTime),
            "maximize_profit" | "profit" => Ok(WeightPreset::MaximizeProfit),
            other => Err(Error::InvalidWeights(format!("unknown weight preset '{}'", other))),
        }
    }
}

// ============================================================================
// Breakdown
// ============================================================================

/// Per-objective scores and the weighted total.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScoreBreakdown {
    /// Utilization score.
    pub utilization: f64,
    /// Cut length score.
    pub cut_length: f64,
    /// Pierce count score.
    pub pierce_count: f64,
    /// Machine time score.
    pub machine_time: f64,
    /// Thermal risk score.
    pub thermal_risk: f64,
    /// Remnant value score.
    pub remnant_value: f64,
    /// Cost score.
    pub total_cost: f64,
    /// Weighted sum, 0 to 100.
    pub total: f64,
    /// Weights used.
    pub weights: ScoringWeights,
    /// Raw measurements.
    pub metrics: SolutionMetrics,
}

impl ScoreBreakdown {
    fn objectives(&self) -> [(&'static str, f64, f64); 7] {
        let w = &self.weights;
        [
            ("utilization", self.utilization, w.utilization),
            ("cut_length", self.cut_length, w.cut_length),
            ("pierce_count", self.pierce_count, w.pierce_count),
            ("machine_time", self.machine_time, w.machine_time),
            ("thermal_risk", self.thermal_risk, w.thermal_risk),
            ("remnant_value", self.remnant_value, w.remnant_value),
            ("total_cost", self.total_cost, w.total_cost),
        ]
    }

    /// Multi-line report of every objective and the key measurements.
    pub fn explain(&self) -> String {
        let m = &self.metrics;
        let mut lines = vec![
            format!("Overall score: {:.1}/100", self.total),
            String::new(),
            "Objectives:".to_string(),
        ];
        for (name, score, weight) in self.objectives() {
            lines.push(format!(
                "  {:<14} {:5.1}/100  weight {:.3}  -> {:5.1}",
                name,
                score,
                weight,
                score * weight
            ));
        }
        lines.extend([
            String::new(),
            "Measurements:".to_string(),
            format!(
                "  utilization    {:.1}% (max {:.1}%)",
                m.utilization * 100.0,
                m.theoretical_max * 100.0
            ),
            format!("  placed         {} ({} unplaced)", m.placed_count, m.unplaced_count),
            format!("  cut length     {:.1} mm", m.cut_length),
            format!("  pierces        {}", m.pierce_count),
            format!("  machine time   {:.1} s", m.machine_time_s),
            format!("  thermal risk   {:.3}", m.thermal_risk),
            format!("  remnant        {:.1}%", m.remnant_value * 100.0),
            format!("  total cost     {:.2}", m.total_cost),
        ]);
        lines.join("\n")
    }
}

impl fmt::Display for ScoreBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.explain())
    }
}

/// Outcome of comparing two layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// The first layout scores higher.
    Better,
    /// The first layout scores lower.
    Worse,
    /// Totals are within [`COMPARE_TOLERANCE`].
    Equal,
}

// ============================================================================
// Scorer
// ============================================================================

/// Scores layouts under fixed weights and curves. Never mutates its input.
#[derive(Debug, Clone)]
pub struct MultiObjectiveScorer {
    weights: ScoringWeights,
    curves: ScoringCurves,
    metrics: MetricsConfig,
}

impl MultiObjectiveScorer {
    /// Creates a scorer, validating the weights.
    pub fn new(weights: ScoringWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self {
            weights,
            curves: ScoringCurves::default(),
            metrics: MetricsConfig::default(),
        })
    }

    /// Replaces the curves.
    pub fn with_curves(mut self, curves: ScoringCurves) -> Self {
        self.curves = curves;
        self
    }

    /// Replaces the measurement parameters.
    pub fn with_metrics_config(mut self, metrics: MetricsConfig) -> Self {
        self.metrics = metrics;
        self
    }

    /// Weights in use.
    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Scores a returned solution.
    pub fn score(&self, solution: &Solution, catalog: &PartCatalog, constraints: &Constraints) -> ScoreBreakdown {
        self.score_metrics(SolutionMetrics::compute(solution, catalog, constraints, &self.metrics))
    }

    /// Scores realized shapes, as the refinement strategies do.
    pub fn score_shapes(
        &self,
        shapes: &[PlacedShape],
        unplaced_count: usize,
        catalog: &PartCatalog,
        constraints: &Constraints,
    ) -> ScoreBreakdown {
        self.score_metrics(SolutionMetrics::from_shapes(
            shapes,
            unplaced_count,
            catalog,
            constraints,
            &self.metrics,
        ))
    }

    /// Scores precomputed measurements.
    pub fn score_metrics(&self, metrics: SolutionMetrics) -> ScoreBreakdown {
        let c = &self.curves;
        let empty = metrics.placed_count == 0;

        let utilization = if empty || metrics.theoretical_max <= 0.0 {
            0.0
        } else {
            c.utilization
                .eval(metrics.utilization / metrics.theoretical_max * 100.0)
        };

        let cut_length = if empty || metrics.ideal_cut_length <= 0.0 {
            0.0
        } else {
            c.cut_length.eval(metrics.cut_length / metrics.ideal_cut_length)
        };

        let pierce_count = if empty {
            0.0
        } else {
            let extra = metrics.pierce_count.saturating_sub(metrics.placed_count);
            c.pierce.eval(extra as f64)
        };

        let machine_time = if empty || metrics.machine_time_s <= 0.0 {
            0.0
        } else {
            let expected = (metrics.placed_area / 1000.0 * 60.0).max(1.0);
            c.machine_time.eval(metrics.machine_time_s / expected)
        };

        let thermal_risk = 100.0 * (1.0 - metrics.thermal_risk).clamp(0.0, 1.0);
        let remnant_value = 100.0 * metrics.remnant_value.clamp(0.0, 1.0);

        let total_cost = if metrics.total_cost <= 0.0 {
            50.0
        } else {
            c.cost.eval(metrics.total_cost / metrics.placed_area.max(1.0))
        };

        let w = &self.weights;
        let total = (utilization * w.utilization
            + cut_length * w.cut_length
            + pierce_count * w.pierce_count
            + machine_time * w.machine_time
            + thermal_risk * w.thermal_risk
            + remnant_value * w.remnant_value
            + total_cost * w.total_cost)
            .clamp(0.0, 100.0);

        ScoreBreakdown {
            utilization,
            cut_length,
            pierce_count,
            machine_time,
            thermal_risk,
            remnant_value,
            total_cost,
            total,
            weights: self.weights,
            metrics,
        }
    }

    /// Compares two solutions by weighted total.
    pub fn compare(
        &self,
        a: &Solution,
        b: &Solution,
        catalog: &PartCatalog,
        constraints: &Constraints,
    ) -> Comparison {
        let sa = self.score(a, catalog, constraints).total;
        let sb = self.score(b, catalog, constraints).total;
        compare_totals(sa, sb)
    }
}

/// Compares two totals with [`COMPARE_TOLERANCE`].
pub fn compare_totals(a: f64, b: f64) -> Comparison {
    if (a - b).abs() < COMPARE_TOLERANCE {
        Comparison::Equal
    } else if a > b {
        Comparison::Better
    } else {
        Comparison::Worse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::RotationSet;
    use crate::part::Part;
    use crate::sheet::Sheet;
    use approx::assert_relative_eq;
    use kerfnest_core::PlacedPart;

    fn setup() -> (PartCatalog, Constraints) {
        let constraints = Constraints::new(Sheet::new(200.0, 100.0).with_margin(0.0))
            .with_rotations(RotationSet::no_rotation());
        let parts = vec![Part::rectangle("r", 50.0, 30.0).unwrap().with_quantity(4)];
        (PartCatalog::new(parts, &constraints).unwrap(), constraints)
    }

    fn solution(n: usize) -> Solution {
        let mut s = Solution::new();
        for i in 0..n {
            s.placements
                .push(PlacedPart::new("r", 0, i, i as f64 * 50.0, 0.0, 0.0));
        }
        s
    }

    #[test]
    fn test_curve_interpolation() {
        let curve = Curve::new([(0.0, 0.0), (10.0, 100.0), (20.0, 50.0)]).unwrap();
        assert_relative_eq!(curve.eval(-5.0), 0.0);
        assert_relative_eq!(curve.eval(5.0), 50.0);
        assert_relative_eq!(curve.eval(15.0), 75.0);
        assert_relative_eq!(curve.eval(99.0), 50.0);
        assert!(Curve::new([(1.0, 0.0), (1.0, 5.0)]).is_err());
        assert!(Curve::new(Vec::new()).is_err());
    }

    #[test]
    fn test_default_utilization_curve() {
        let u = ScoringCurves::default().utilization;
        assert_relative_eq!(u.eval(80.0), 90.0);
        assert_relative_eq!(u.eval(85.0), 94.0);
        assert_relative_eq!(u.eval(100.0), 100.0);
        assert_relative_eq!(u.eval(30.0), 20.0);
    }

    #[test]
    fn test_presets_are_valid() {
        for preset in [
            WeightPreset::MaximizeUtilization,
            WeightPreset::MinimizeTime,
            WeightPreset::MaximizeProfit,
        ] {
            assert!(ScoringWeights::preset(preset).validate().is_ok(), "{}", preset);
            assert_eq!(preset.name().parse::<WeightPreset>().unwrap(), preset);
        }
        assert!(ScoringWeights::default().validate().is_ok());
        assert!("fastest".parse::<WeightPreset>().is_err());
    }

    #[test]
    fn test_invalid_weights() {
        let err = ScoringWeights::custom(0.5, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, Error::InvalidWeights(_)));
        assert!(ScoringWeights::custom(1.1, -0.1, 0.0, 0.0, 0.0, 0.0, 0.0).is_err());
        assert!(ScoringWeights::custom(0.995, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0).is_ok());
        assert!(MultiObjectiveScorer::new(ScoringWeights {
            utilization: 2.0,
            ..ScoringWeights::default()
        })
        .is_err());
    }

    #[test]
    fn test_empty_layout_rules() {
        let (catalog, constraints) = setup();
        let scorer = MultiObjectiveScorer::new(ScoringWeights::default()).unwrap();
        let b = scorer.score(&Solution::new(), &catalog, &constraints);
        assert_relative_eq!(b.utilization, 0.0);
        assert_relative_eq!(b.cut_length, 0.0);
        assert_relative_eq!(b.pierce_count, 0.0);
        assert_relative_eq!(b.machine_time, 0.0);
        assert_relative_eq!(b.thermal_risk, 100.0);
        assert_relative_eq!(b.remnant_value, 100.0);
    }

    #[test]
    fn test_more_parts_score_higher() {
        let (catalog, constraints) = setup();
        let scorer = MultiObjectiveScorer::new(ScoringWeights::maximize_utilization()).unwrap();
        let full = scorer.score(&solution(4), &catalog, &constraints);
        let half = scorer.score(&solution(2), &catalog, &constraints);

        assert_relative_eq!(full.utilization, 100.0);
        assert_relative_eq!(full.pierce_count, 100.0);
        assert!(full.total > half.total);
        assert!((0.0..=100.0).contains(&full.total));
        assert_eq!(
            scorer.compare(&solution(4), &solution(2), &catalog, &constraints),
            Comparison::Better
        );
        assert_eq!(
            scorer.compare(&solution(2), &solution(4), &catalog, &constraints),
            Comparison::Worse
        );
        assert_eq!(
            scorer.compare(&solution(3), &solution(3), &catalog, &constraints),
            Comparison::Equal
        );
    }

    #[test]
    fn test_scorer_does_not_mutate() {
        let (catalog, constraints) = setup();
        let scorer = MultiObjectiveScorer::new(ScoringWeights::default()).unwrap();
        let sol = solution(3);
        let before = sol.clone();
        let _ = scorer.score(&sol, &catalog, &constraints);
        assert_eq!(sol, before);
    }

    #[test]
    fn test_explain_lists_every_objective() {
        let (catalog, constraints) = setup();
        let scorer = MultiObjectiveScorer::new(ScoringWeights::default()).unwrap();
        let text = scorer.score(&solution(2), &catalog, &constraints).explain();
        for name in [
            "utilization",
            "cut_length",
            "pierce_count",
            "machine_time",
            "thermal_risk",
            "remnant_value",
            "total_cost",
        ] {
            assert!(text.contains(name), "missing {}", name);
        }
    }
}
