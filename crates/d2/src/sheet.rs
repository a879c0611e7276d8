//! Rectangular sheet stock.

use kerfnest_core::{Error, Result};

use crate::geometry::BoundingBox;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default margin on every side, in mm.
pub const DEFAULT_MARGIN: f64 = 5.0;

/// Unusable border on each side of a sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Margins {
    /// Top margin.
    pub top: f64,
    /// Bottom margin.
    pub bottom: f64,
    /// Left margin.
    pub left: f64,
    /// Right margin.
    pub right: f64,
}

impl Margins {
    /// Creates margins from individual sides.
    pub fn new(top: f64, bottom: f64, left: f64, right: f64) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    /// Same margin on every side.
    pub fn uniform(margin: f64) -> Self {
        Self::new(margin, margin, margin, margin)
    }

    /// No margins.
    pub fn none() -> Self {
        Self::uniform(0.0)
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(DEFAULT_MARGIN)
    }
}

/// A rectangular sheet with margins.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sheet {
    /// Sheet width in mm.
    pub width: f64,
    /// Sheet height in mm.
    pub height: f64,
    /// Margins defining the usable area.
    pub margins: Margins,
}

impl Sheet {
    /// Creates a sheet with default margins.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            margins: Margins::default(),
        }
    }

    /// Sets all margins.
    pub fn with_margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    /// Sets the same margin on every side.
    pub fn with_margin(self, margin: f64) -> Self {
        self.with_margins(Margins::uniform(margin))
    }

    /// 4' x 8' steel plate.
    pub fn standard_4x8() -> Self {
        Self::new(1220.0, 2440.0).with_margin(10.0)
    }

    /// 5' x 10' steel plate.
    pub fn standard_5x10() -> Self {
        Self::new(1524.0, 3048.0).with_margin(10.0)
    }

    /// 1 m x 2 m sheet.
    pub fn metric_1x2() -> Self {
        Self::new(1000.0, 2000.0).with_margin(10.0)
    }

    /// 1.5 m x 3 m sheet.
    pub fn metric_1_5x3() -> Self {
        Self::new(1500.0, 3000.0).with_margin(10.0)
    }

    /// Small sheet for tests and demos.
    pub fn small_test() -> Self {
        Self::new(600.0, 400.0).with_margin(5.0)
    }

    /// Full sheet area.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Sheet rectangle minus margins, with the sheet's lower-left corner at the origin.
    pub fn usable_bounds(&self) -> BoundingBox {
        BoundingBox::new(
            self.margins.left,
            self.margins.bottom,
            self.width - self.margins.right,
            self.height - self.margins.top,
        )
    }

    /// Area of the usable rectangle.
    pub fn usable_area(&self) -> f64 {
        let bb = self.usable_bounds();
        bb.width().max(0.0) * bb.height().max(0.0)
    }

    /// Checks dimensions and margins.
    pub fn validate(&self) -> Result<()> {
        if !(self.width > 0.0 && self.height > 0.0)
            || !self.width.is_finite()
            || !self.height.is_finite()
        {
            return Err(Error::InvalidSheet(format!(
                "sheet dimensions must be positive, got {} x {}",
                self.width, self.height
            )));
        }
        let m = &self.margins;
        if [m.top, m.bottom, m.left, m.right]
            .iter()
            .any(|v| *v < 0.0 || !v.is_finite())
        {
            return Err(Error::InvalidSheet("margins must be non-negative".into()));
        }
        if m.left + m.right >= self.width || m.top + m.bottom >= self.height {
            return Err(Error::InvalidSheet(format!(
                "margins leave no usable area on a {} x {} sheet",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

impl Default for Sheet {
    fn default() -> Self {
        Self::small_test()
    }
}
