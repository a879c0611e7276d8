//! Rigid 2D transforms for placed parts.
//!
//! Part geometry is stored in its local frame. A placement rotates the part
//! about the local origin and then translates it, which is exactly an
//! [`Isometry2`]. Angles are carried in degrees at the API surface because that
//! is how rotation sets are specified; radians only appear at the nalgebra seam.

use nalgebra::{Isometry2, Point2, Vector2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance for comparing two rotation angles, in degrees.
pub const ANGLE_TOLERANCE_DEG: f64 = 0.1;

/// Normalizes an angle in degrees into `[0, 360)`.
pub fn normalize_degrees(angle: f64) -> f64 {
    let a = angle % 360.0;
    if a < 0.0 {
        a + 360.0
    } else {
        a
    }
}

/// Returns true if two angles describe the same rotation within [`ANGLE_TOLERANCE_DEG`].
pub fn angles_equal(a: f64, b: f64) -> bool {
    let d = (normalize_degrees(a) - normalize_degrees(b)).abs();
    d <= ANGLE_TOLERANCE_DEG || (360.0 - d) <= ANGLE_TOLERANCE_DEG
}

/// A rotation about the origin followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Transform2D {
    /// Translation in x.
    pub tx: f64,
    /// Translation in y.
    pub ty: f64,
    /// Counter-clockwise rotation in degrees.
    pub rotation_deg: f64,
}

impl Transform2D {
    /// Creates a new identity transform.
    pub fn identity() -> Self {
        Self {
            tx: 0.0,
            ty: 0.0,
            rotation_deg: 0.0,
        }
    }

    /// Creates a new transform with translation only.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            tx,
            ty,
            rotation_deg: 0.0,
        }
    }

    /// Creates a new transform with rotation only.
    pub fn rotation(rotation_deg: f64) -> Self {
        Self {
            tx: 0.0,
            ty: 0.0,
            rotation_deg,
        }
    }

    /// Creates a new transform with both rotation and translation.
    pub fn new(tx: f64, ty: f64, rotation_deg: f64) -> Self {
        Self { tx, ty, rotation_deg }
    }

    /// Converts to a nalgebra isometry.
    pub fn to_isometry(&self) -> Isometry2<f64> {
        Isometry2::new(Vector2::new(self.tx, self.ty), self.rotation_deg.to_radians())
    }

    /// Creates a transform from a nalgebra isometry.
    pub fn from_isometry(iso: &Isometry2<f64>) -> Self {
        Self {
            tx: iso.translation.x,
            ty: iso.translation.y,
            rotation_deg: normalize_degrees(iso.rotation.angle().to_degrees()),
        }
    }

    /// Transforms a single point.
    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let p = self.to_isometry().transform_point(&Point2::new(x, y));
        (p.x, p.y)
    }

    /// Transforms a slice of points.
    pub fn transform_points(&self, points: &[(f64, f64)]) -> Vec<(f64, f64)> {
        let iso = self.to_isometry();
        points
            .iter()
            .map(|&(x, y)| {
                let p = iso.transform_point(&Point2::new(x, y));
                (p.x, p.y)
            })
            .collect()
    }

    /// Composes two transforms: `self` is applied first, then `other`.
    pub fn then(&self, other: &Self) -> Self {
        Self::from_isometry(&(other.to_isometry() * self.to_isometry()))
    }

    /// Returns the inverse transform.
    pub fn inverse(&self) -> Self {
        Self::from_isometry(&self.to_isometry().inverse())
    }

    /// Checks whether this transform is the identity within `epsilon`.
    pub fn is_identity(&self, epsilon: f64) -> bool {
        self.tx.abs() < epsilon
            && self.ty.abs() < epsilon
            && angles_equal(self.rotation_deg, 0.0)
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}
