//! Part templates.

use kerfnest_core::{PartId, Result};

use crate::constraints::RotationSet;
use crate::geometry::{Point, Polygon};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An immutable part template: id, shape, quantity and optional overrides.
///
/// The polygon is stored in the part's local frame. Its origin is the
/// reference point that placements position on the sheet.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Part {
    id: PartId,
    polygon: Polygon,
    quantity: usize,
    rotations: Option<RotationSet>,
    material: Option<String>,
}

impl Part {
    /// Creates a part with quantity 1.
    pub fn new(id: impl Into<PartId>, polygon: Polygon) -> Self {
        Self {
            id: id.into(),
            polygon,
            quantity: 1,
            rotations: None,
            material: None,
        }
    }

    /// Axis-aligned rectangle with its lower-left corner at the origin.
    pub fn rectangle(id: impl Into<PartId>, width: f64, height: f64) -> Result<Self> {
        Ok(Self::new(id, Polygon::rectangle(width, height)?))
    }

    /// Regular `segments`-gon approximating a circle, inside `[0, 2r]^2`.
    pub fn circle(id: impl Into<PartId>, radius: f64, segments: usize) -> Result<Self> {
        let n = segments.max(8);
        let step = std::f64::consts::TAU / n as f64;
        let vertices = (0..n).map(|i| {
            let angle = i as f64 * step;
            Point::new(radius * angle.cos() + radius, radius * angle.sin() + radius)
        });
        Ok(Self::new(id, Polygon::new(vertices)?))
    }

    /// L-shape: a `width x height` box with the upper-right
    /// `(width - notch_width) x (height - notch_height)` corner removed.
    pub fn l_shape(
        id: impl Into<PartId>,
        width: f64,
        height: f64,
        notch_width: f64,
        notch_height: f64,
    ) -> Result<Self> {
        let polygon = Polygon::new([
            (0.0, 0.0),
            (width, 0.0),
            (width, notch_height),
            (notch_width, notch_height),
            (notch_width, height),
            (0.0, height),
        ])?;
        Ok(Self::new(id, polygon))
    }

    /// Sets the number of copies to place.
    pub fn with_quantity(mut self, n: usize) -> Self {
        self.quantity = n;
        self
    }

    /// Restricts this part to its own rotation set.
    pub fn with_rotations(mut self, rotations: RotationSet) -> Self {
        self.rotations = Some(rotations);
        self
    }

    /// Tags the part with a material name.
    pub fn with_material(mut self, material: impl Into<String>) -> Self {
        self.material = Some(material.into());
        self
    }

    /// Part id.
    pub fn id(&self) -> &PartId {
        &self.id
    }

    /// Shape in the local frame.
    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    /// Number of copies.
    pub fn quantity(&self) -> usize {
        self.quantity
    }

    /// Part-specific rotation set, if any.
    pub fn rotations(&self) -> Option<&RotationSet> {
        self.rotations.as_ref()
    }

    /// Material tag, if any.
    pub fn material(&self) -> Option<&str> {
        self.material.as_deref()
    }

    /// Net area of one copy.
    pub fn area(&self) -> f64 {
        self.polygon.area()
    }

    /// Shape rotated about the reference point.
    pub fn polygon_at(&self, rotation_deg: f64) -> Polygon {
        if rotation_deg == 0.0 {
            return self.polygon.clone();
        }
        self.polygon.rotate(rotation_deg, Point::default())
    }
}
