//! Placed part values.

use crate::transform::Transform2D;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a part template.
pub type PartId = String;

/// A part template positioned on the sheet.
///
/// The reference point of the part (its local origin) sits at `(x, y)` after
/// the part has been rotated by `rotation` degrees about that origin. Values
/// are never mutated once they are part of a layout; moves replace them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlacedPart {
    /// Id of the part template.
    pub part_id: PartId,

    /// Index of the template in the session's part catalog.
    pub part_index: usize,

    /// Copy number (0-based) when a part has a quantity above one.
    pub instance: usize,

    /// Reference point x.
    pub x: f64,

    /// Reference point y.
    pub y: f64,

    /// Rotation in degrees.
    pub rotation: f64,
}

impl PlacedPart {
    /// Creates a new placed part.
    pub fn new(
        part_id: impl Into<PartId>,
        part_index: usize,
        instance: usize,
        x: f64,
        y: f64,
        rotation: f64,
    ) -> Self {
        Self {
            part_id: part_id.into(),
            part_index,
            instance,
            x,
            y,
            rotation,
        }
    }

    /// Returns the rigid transform that maps local part coordinates onto the sheet.
    pub fn to_transform(&self) -> Transform2D {
        Transform2D::new(self.x, self.y, self.rotation)
    }

    /// Returns a copy moved to a new reference position.
    pub fn moved_to(&self, x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            ..self.clone()
        }
    }

    /// Returns a copy with a different rotation at the same position.
    pub fn rotated_to(&self, rotation: f64) -> Self {
        Self {
            rotation,
            ..self.clone()
        }
    }

    /// Key identifying this exact instance of a part template.
    pub fn instance_key(&self) -> (usize, usize) {
        (self.part_index, self.instance)
    }
}

/// Placement statistics for a set of placements.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlacementStats {
    /// Total number of placements.
    pub count: usize,
    /// Number of placements per rotation, keyed by tenths of a degree.
    pub rotation_distribution: std::collections::BTreeMap<i64, usize>,
    /// Number of placements per part id.
    pub part_distribution: std::collections::BTreeMap<PartId, usize>,
}

impl PlacementStats {
    /// Computes statistics from a set of placements.
    pub fn from_placements(placements: &[PlacedPart]) -> Self {
        let mut stats = Self {
            count: placements.len(),
            ..Default::default()
        };

        for p in placements {
            let tenths = (p.rotation * 10.0).round() as i64;
            *stats.rotation_distribution.entry(tenths).or_insert(0) += 1;
            *stats
                .part_distribution
                .entry(p.part_id.clone())
                .or_insert(0) += 1;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placed_part() {
        let p = PlacedPart::new("bracket", 2, 1, 10.0, 20.0, 90.0);
        assert_eq!(p.part_id, "bracket");
        assert_eq!(p.instance_key(), (2, 1));

        let t = p.to_transform();
        assert_eq!(t.tx, 10.0);
        assert_eq!(t.ty, 20.0);
        assert_eq!(t.rotation_deg, 90.0);
    }

    #[test]
    fn test_moves_produce_new_values() {
        let p = PlacedPart::new("a", 0, 0, 1.0, 2.0, 0.0);
        let moved = p.moved_to(5.0, 6.0);
        let rotated = p.rotated_to(180.0);

        assert_eq!((p.x, p.y), (1.0, 2.0));
        assert_eq!((moved.x, moved.y, moved.rotation), (5.0, 6.0, 0.0));
        assert_eq!((rotated.x, rotated.y, rotated.rotation), (1.0, 2.0, 180.0));
    }

    #[test]
    fn test_placement_stats() {
        let placements = vec![
            PlacedPart::new("a", 0, 0, 0.0, 0.0, 0.0),
            PlacedPart::new("a", 0, 1, 0.0, 0.0, 90.0),
            PlacedPart::new("b", 1, 0, 0.0, 0.0, 0.0),
        ];

        let stats = PlacementStats::from_placements(&placements);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.rotation_distribution.get(&0), Some(&2));
        assert_eq!(stats.rotation_distribution.get(&900), Some(&1));
        assert_eq!(stats.part_distribution.get("a"), Some(&2));
    }
}
