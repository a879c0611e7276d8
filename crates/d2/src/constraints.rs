//! Manufacturing constraints: spacing, rotations and material.
//!
//! A [`Constraints`] bundle is validated once by the session and treated as
//! read-only afterwards.

use std::collections::BTreeMap;

use kerfnest_core::{angles_equal, normalize_degrees, Error, PartId, Result};

use crate::geometry::BoundingBox;
use crate::part::Part;
use crate::sheet::Sheet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Spacing
// ============================================================================

/// Kerf and minimum web between parts.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpacingConstraints {
    /// Width of material removed by the cutting tool, in mm.
    pub kerf_width: f64,
    /// Minimum gap of material left between parts, in mm.
    pub min_web: f64,
}

impl SpacingConstraints {
    /// Creates spacing constraints.
    pub fn new(kerf_width: f64, min_web: f64) -> Self {
        Self {
            kerf_width,
            min_web,
        }
    }

    /// No spacing at all.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Full gap required between two part outlines.
    pub fn total_spacing(&self) -> f64 {
        self.kerf_width + self.min_web
    }

    /// Outward offset applied to each part.
    pub fn offset_per_part(&self) -> f64 {
        self.total_spacing() / 2.0
    }

    /// Rejects negative or non-finite values.
    pub fn validate(&self) -> Result<()> {
        if !(self.kerf_width >= 0.0 && self.kerf_width.is_finite()) {
            return Err(Error::ConfigError(format!(
                "kerf width must be non-negative, got {}",
                self.kerf_width
            )));
        }
        if !(self.min_web >= 0.0 && self.min_web.is_finite()) {
            return Err(Error::ConfigError(format!(
                "minimum web must be non-negative, got {}",
                self.min_web
            )));
        }
        Ok(())
    }
}

impl Default for SpacingConstraints {
    fn default() -> Self {
        Self::new(0.3, 3.0)
    }
}

// ============================================================================
// Rotations
// ============================================================================

/// A non-empty set of allowed rotation angles in degrees.
///
/// Angles are normalized to `[0, 360)` and deduplicated within
/// [`kerfnest_core::ANGLE_TOLERANCE_DEG`], keeping first-seen order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RotationSet {
    angles: Vec<f64>,
}

impl RotationSet {
    /// Creates a rotation set. Returns an error if no angle remains.
    pub fn new(angles: impl IntoIterator<Item = f64>) -> Result<Self> {
        let mut normalized: Vec<f64> = Vec::new();
        for angle in angles {
            if !angle.is_finite() {
                return Err(Error::ConfigError(format!(
                    "rotation angle must be finite, got {}",
                    angle
                )));
            }
            let angle = normalize_degrees(angle);
            if !normalized.iter().any(|&a| angles_equal(a, angle)) {
                normalized.push(angle);
            }
        }
        if normalized.is_empty() {
            return Err(Error::ConfigError("rotation set is empty".into()));
        }
        Ok(Self { angles: normalized })
    }

    /// Only 0 degrees.
    pub fn no_rotation() -> Self {
        Self { angles: vec![0.0] }
    }

    /// 0, 90, 180 and 270 degrees.
    pub fn cardinal() -> Self {
        Self {
            angles: vec![0.0, 90.0, 180.0, 270.0],
        }
    }

    /// 45 degree steps.
    pub fn eight_way() -> Self {
        Self {
            angles: (0..8).map(|i| i as f64 * 45.0).collect(),
        }
    }

    /// Steps of `step_deg` degrees over the full circle.
    pub fn fine_grain(step_deg: f64) -> Result<Self> {
        if !(step_deg > 0.0 && step_deg <= 360.0) {
            return Err(Error::ConfigError(format!(
                "rotation step must be in (0, 360], got {}",
                step_deg
            )));
        }
        let count = (360.0 / step_deg).floor() as usize;
        Self::new((0..count.max(1)).map(|i| i as f64 * step_deg))
    }

    /// Allowed angles.
    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    /// Number of angles.
    pub fn len(&self) -> usize {
        self.angles.len()
    }

    /// Always false for a constructed set; kept for deserialized input.
    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }

    /// Returns true if `angle` is in the set within 0.1 degrees.
    pub fn contains(&self, angle: f64) -> bool {
        self.angles.iter().any(|&a| angles_equal(a, angle))
    }

    /// Rejects empty sets, which can only come from deserialization.
    pub fn validate(&self) -> Result<()> {
        if self.angles.is_empty() {
            return Err(Error::ConfigError("rotation set is empty".into()));
        }
        Ok(())
    }
}

impl Default for RotationSet {
    fn default() -> Self {
        Self::cardinal()
    }
}

/// Global rotation set with per-part overrides.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RotationConstraints {
    /// Rotations for parts without an override.
    pub default: RotationSet,
    /// Overrides keyed by part id.
    pub per_part: BTreeMap<PartId, RotationSet>,
}

impl RotationConstraints {
    /// Creates constraints with the given default set.
    pub fn new(default: RotationSet) -> Self {
        Self {
            default,
            per_part: BTreeMap::new(),
        }
    }

    /// Adds an override for one part.
    pub fn with_override(mut self, part_id: impl Into<PartId>, set: RotationSet) -> Self {
        self.per_part.insert(part_id.into(), set);
        self
    }

    /// Rotations allowed for `part`: its own set, then the override, then the default.
    pub fn allowed_for<'a>(&'a self, part: &'a Part) -> &'a RotationSet {
        part.rotations()
            .or_else(|| self.per_part.get(part.id()))
            .unwrap_or(&self.default)
    }

    /// Validates every set.
    pub fn validate(&self) -> Result<()> {
        self.default.validate()?;
        for (id, set) in &self.per_part {
            set.validate()
                .map_err(|_| Error::ConfigError(format!("rotation set for '{}' is empty", id)))?;
        }
        Ok(())
    }
}

// ============================================================================
// Materials
// ============================================================================

/// Cutting and cost properties of a sheet material.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Material {
    /// Material name.
    pub name: String,
    /// Thickness in mm.
    pub thickness: f64,
    /// Kerf width in mm.
    pub kerf_width: f64,
    /// Minimum web in mm.
    pub min_web: f64,
    /// Cutting speed in mm/min.
    pub cut_speed: f64,
    /// Rapid traverse speed in mm/min.
    pub rapid_speed: f64,
    /// Time per pierce in seconds.
    pub pierce_time: f64,
    /// Material cost per square meter.
    pub cost_per_m2: f64,
    /// Machine cost per hour.
    pub machine_rate_per_hour: f64,
}

impl Material {
    /// Creates a material with mild steel defaults for every property except the name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::mild_steel_3mm()
        }
    }

    /// Sets thickness.
    pub fn with_thickness(mut self, thickness: f64) -> Self {
        self.thickness = thickness;
        self
    }

    /// Sets kerf and minimum web.
    pub fn with_spacing(mut self, kerf_width: f64, min_web: f64) -> Self {
        self.kerf_width = kerf_width;
        self.min_web = min_web;
        self
    }

    /// Sets cut and rapid speeds in mm/min.
    pub fn with_speeds(mut self, cut_speed: f64, rapid_speed: f64) -> Self {
        self.cut_speed = cut_speed;
        self.rapid_speed = rapid_speed;
        self
    }

    /// Sets pierce time in seconds.
    pub fn with_pierce_time(mut self, seconds: f64) -> Self {
        self.pierce_time = seconds;
        self
    }

    /// Sets material cost per square meter.
    pub fn with_cost_per_m2(mut self, cost: f64) -> Self {
        self.cost_per_m2 = cost;
        self
    }

    /// Sets machine cost per hour.
    pub fn with_machine_rate(mut self, rate: f64) -> Self {
        self.machine_rate_per_hour = rate;
        self
    }

    #[allow(clippy::too_many_arguments)]
    fn preset(
        name: &str,
        thickness: f64,
        kerf_width: f64,
        min_web: f64,
        cut_speed: f64,
        rapid_speed: f64,
        pierce_time: f64,
        cost_per_m2: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            thickness,
            kerf_width,
            min_web,
            cut_speed,
            rapid_speed,
            pierce_time,
            cost_per_m2,
            machine_rate_per_hour: 60.0,
        }
    }

    /// 3 mm mild steel.
    pub fn mild_steel_3mm() -> Self {
        Self::preset("mild_steel_3mm", 3.0, 0.3, 3.0, 3000.0, 15000.0, 0.5, 25.0)
    }

    /// 3 mm stainless steel.
    pub fn stainless_steel_3mm() -> Self {
        Self::preset("stainless_steel_3mm", 3.0, 0.35, 4.0, 2500.0, 15000.0, 0.7, 45.0)
    }

    /// 3 mm aluminum.
    pub fn aluminum_3mm() -> Self {
        Self::preset("aluminum_3mm", 3.0, 0.25, 2.5, 3500.0, 15000.0, 0.4, 35.0)
    }

    /// 5 mm mild steel.
    pub fn mild_steel_5mm() -> Self {
        Self::preset("mild_steel_5mm", 5.0, 0.4, 5.0, 2000.0, 15000.0, 0.8, 40.0)
    }

    /// 3 mm acrylic.
    pub fn acrylic_3mm() -> Self {
        Self::preset("acrylic_3mm", 3.0, 0.15, 2.0, 4000.0, 20000.0, 0.2, 15.0)
    }

    /// Spacing implied by this material.
    pub fn spacing(&self) -> SpacingConstraints {
        SpacingConstraints::new(self.kerf_width, self.min_web)
    }

    /// Rejects non-positive speeds and negative times or costs.
    pub fn validate(&self) -> Result<()> {
        self.spacing().validate()?;
        if !(self.cut_speed > 0.0 && self.rapid_speed > 0.0) {
            return Err(Error::ConfigError(format!(
                "material '{}' needs positive cut and rapid speeds",
                self.name
            )));
        }
        if self.pierce_time < 0.0 || self.cost_per_m2 < 0.0 || self.machine_rate_per_hour < 0.0 {
            return Err(Error::ConfigError(format!(
                "material '{}' has a negative time or cost",
                self.name
            )));
        }
        Ok(())
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::mild_steel_3mm()
    }
}

/// Named materials.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaterialLibrary {
    materials: BTreeMap<String, Material>,
}

impl MaterialLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Library containing every preset.
    pub fn standard() -> Self {
        let mut lib = Self::new();
        for m in [
            Material::mild_steel_3mm(),
            Material::stainless_steel_3mm(),
            Material::aluminum_3mm(),
            Material::mild_steel_5mm(),
            Material::acrylic_3mm(),
        ] {
            lib.insert(m);
        }
        lib
    }

    /// Adds or replaces a material.
    pub fn insert(&mut self, material: Material) {
        self.materials.insert(material.name.clone(), material);
    }

    /// Looks up a material by name.
    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials.get(name)
    }

    /// Material names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.materials.keys().map(String::as_str)
    }

    /// Number of materials.
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// Returns true if the library is empty.
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

// ============================================================================
// Constraints
// ============================================================================

/// Sheet, spacing, rotations and material for one nesting run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Constraints {
    /// Sheet stock.
    pub sheet: Sheet,
    /// Spacing between parts.
    pub spacing: SpacingConstraints,
    /// Allowed rotations.
    pub rotation: RotationConstraints,
    /// Material used for scoring.
    pub material: Option<Material>,
}

impl Constraints {
    /// Creates constraints for a sheet with default spacing and rotations.
    pub fn new(sheet: Sheet) -> Self {
        Self {
            sheet,
            spacing: SpacingConstraints::default(),
            rotation: RotationConstraints::default(),
            material: None,
        }
    }

    /// Sets the spacing.
    pub fn with_spacing(mut self, spacing: SpacingConstraints) -> Self {
        self.spacing = spacing;
        self
    }

    /// Sets the rotation constraints.
    pub fn with_rotation(mut self, rotation: RotationConstraints) -> Self {
        self.rotation = rotation;
        self
    }

    /// Sets the default rotation set.
    pub fn with_rotations(mut self, set: RotationSet) -> Self {
        self.rotation.default = set;
        self
    }

    /// Sets the material; its kerf and minimum web replace the spacing.
    pub fn with_material(mut self, material: Material) -> Self {
        self.spacing = material.spacing();
        self.material = Some(material);
        self
    }

    /// Validates the sheet, spacing, rotations and material.
    pub fn validate(&self) -> Result<()> {
        self.sheet.validate()?;
        self.spacing.validate()?;
        self.rotation.validate()?;
        if let Some(material) = &self.material {
            material.validate()?;
        }
        Ok(())
    }

    /// Usable sheet rectangle.
    pub fn usable_bounds(&self) -> BoundingBox {
        self.sheet.usable_bounds()
    }

    /// Gap required between two parts; symmetric and currently part-independent.
    pub fn effective_spacing(&self, _a: &Part, _b: &Part) -> f64 {
        self.spacing.total_spacing()
    }

    /// Gap used for every pair in a session.
    pub fn uniform_spacing(&self) -> f64 {
        self.spacing.total_spacing()
    }

    /// Rotations allowed for a part.
    pub fn rotations_for<'a>(&'a self, part: &'a Part) -> &'a RotationSet {
        self.rotation.allowed_for(part)
    }

    /// Configured material, or mild steel.
    pub fn material_or_default(&self) -> Material {
        self.material.clone().unwrap_or_default()
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Self::new(Sheet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_spacing() {
        let spacing = SpacingConstraints::default();
        assert_relative_eq!(spacing.total_spacing(), 3.3);
        assert_relative_eq!(spacing.offset_per_part(), 1.65);
        assert!(SpacingConstraints::new(-0.1, 1.0).validate().is_err());
        assert!(SpacingConstraints::new(0.1, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_rotation_set_normalization() {
        let set = RotationSet::new([0.0, 360.0, -90.0, 90.0, 270.05]).unwrap();
        assert_eq!(set.angles(), &[0.0, 270.0, 90.0]);
        assert!(set.contains(270.05));
        assert!(set.contains(-270.0));
        assert!(!set.contains(180.0));
        assert!(RotationSet::new(Vec::new()).is_err());
    }

    #[test]
    fn test_rotation_presets() {
        assert_eq!(RotationSet::no_rotation().len(), 1);
        assert_eq!(RotationSet::cardinal().len(), 4);
        assert_eq!(RotationSet::eight_way().len(), 8);
        assert_eq!(RotationSet::fine_grain(10.0).unwrap().len(), 36);
        assert!(RotationSet::fine_grain(0.0).is_err());
    }

    #[test]
    fn test_rotation_lookup_order() {
        let own = Part::rectangle("own", 10.0, 10.0)
            .unwrap()
            .with_rotations(RotationSet::new([45.0]).unwrap());
        let overridden = Part::rectangle("over", 10.0, 10.0).unwrap();
        let plain = Part::rectangle("plain", 10.0, 10.0).unwrap();

        let rc = RotationConstraints::new(RotationSet::no_rotation())
            .with_override("over", RotationSet::cardinal())
            .with_override("own", RotationSet::cardinal());

        assert_eq!(rc.allowed_for(&own).angles(), &[45.0]);
        assert_eq!(rc.allowed_for(&overridden).len(), 4);
        assert_eq!(rc.allowed_for(&plain).angles(), &[0.0]);
    }

    #[test]
    fn test_material_overrides_spacing() {
        let c = Constraints::new(Sheet::small_test()).with_material(Material::stainless_steel_3mm());
        assert_relative_eq!(c.spacing.total_spacing(), 4.35);
        assert_eq!(c.material_or_default().name, "stainless_steel_3mm");
        assert_eq!(Constraints::default().material_or_default().name, "mild_steel_3mm");
    }

    #[test]
    fn test_material_library() {
        let lib = MaterialLibrary::standard();
        assert_eq!(lib.len(), 5);
        let acrylic = lib.get("acrylic_3mm").unwrap();
        assert_relative_eq!(acrylic.rapid_speed, 20000.0);
        assert!(lib.get("unobtainium").is_none());
        assert!(lib.names().all(|n| lib.get(n).is_some()));
    }

    #[test]
    fn test_constraints_validation() {
        assert!(Constraints::default().validate().is_ok());
        let bad = Constraints::new(Sheet::new(-1.0, 10.0));
        assert!(bad.validate().unwrap_err().is_input_error());
        let bad_mat = Constraints::default().with_material(Material::new("x").with_speeds(0.0, 1.0));
        assert!(bad_mat.validate().is_err());
    }
}
