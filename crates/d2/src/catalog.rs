//! Part arena shared by every strategy of a session.
//!
//! Parts are stored once, by index, together with their shape signature,
//! features and the polygons and bounding boxes for each allowed rotation.

use std::borrow::Cow;
use std::collections::HashMap;

use kerfnest_core::{angles_equal, Error, PartId, PlacedPart, Result};

use crate::constraints::Constraints;
use crate::features::{processing_cmp, FeatureExtractor, Features};
use crate::geometry::{BoundingBox, Polygon};
use crate::nfp::ShapeSignature;
use crate::part::Part;

/// One part with everything precomputed for placement.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    part: Part,
    signature: ShapeSignature,
    features: Features,
    rotations: Vec<f64>,
    rotated: Vec<Polygon>,
}

impl CatalogEntry {
    fn new(part: Part, constraints: &Constraints, extractor: &FeatureExtractor) -> Self {
        let rotations = constraints.rotations_for(&part).angles().to_vec();
        let rotated = rotations.iter().map(|&r| part.polygon_at(r)).collect();
        Self {
            signature: ShapeSignature::of(part.polygon()),
            features: extractor.extract(&part),
            rotations,
            rotated,
            part,
        }
    }

    /// Part template.
    pub fn part(&self) -> &Part {
        &self.part
    }

    /// Part id.
    pub fn id(&self) -> &PartId {
        self.part.id()
    }

    /// Local-frame polygon.
    pub fn polygon(&self) -> &Polygon {
        self.part.polygon()
    }

    /// Content hash of the local polygon.
    pub fn signature(&self) -> ShapeSignature {
        self.signature
    }

    /// Shape descriptors.
    pub fn features(&self) -> &Features {
        &self.features
    }

    /// Allowed rotations, in degrees.
    pub fn rotations(&self) -> &[f64] {
        &self.rotations
    }

    /// Polygon at the `index`-th allowed rotation.
    pub fn rotated(&self, index: usize) -> &Polygon {
        &self.rotated[index]
    }

    /// Local bounding box at the `index`-th allowed rotation.
    pub fn bbox_at(&self, index: usize) -> BoundingBox {
        self.rotated[index].bounding_box()
    }

    /// Index of `rotation` among the allowed rotations.
    pub fn rotation_index(&self, rotation: f64) -> Option<usize> {
        self.rotations.iter().position(|&r| angles_equal(r, rotation))
    }

    /// Polygon rotated by `rotation`, reusing the precomputed one when allowed.
    pub fn polygon_at(&self, rotation: f64) -> Cow<'_, Polygon> {
        match self.rotation_index(rotation) {
            Some(i) => Cow::Borrowed(&self.rotated[i]),
            None => Cow::Owned(self.part.polygon_at(rotation)),
        }
    }
}

/// One copy of a part awaiting placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartInstance {
    /// Index into the catalog.
    pub part_index: usize,
    /// Copy number, from 0.
    pub instance: usize,
}

/// Immutable arena of parts indexed by position.
#[derive(Debug, Clone)]
pub struct PartCatalog {
    entries: Vec<CatalogEntry>,
    by_id: HashMap<PartId, usize>,
}

impl PartCatalog {
    /// Builds the catalog, rejecting duplicate ids and zero quantities.
    pub fn new(parts: Vec<Part>, constraints: &Constraints) -> Result<Self> {
        let extractor = FeatureExtractor::new();
        let mut by_id = HashMap::with_capacity(parts.len());
        let mut entries = Vec::with_capacity(parts.len());

        for (index, part) in parts.into_iter().enumerate() {
            if part.quantity() == 0 {
                return Err(Error::ConfigError(format!(
                    "part '{}' has quantity 0",
                    part.id()
                )));
            }
            if let Some(set) = part.rotations() {
                set.validate()?;
            }
            if by_id.insert(part.id().clone(), index).is_some() {
                return Err(Error::ConfigError(format!(
                    "duplicate part id '{}'",
                    part.id()
                )));
            }
            entries.push(CatalogEntry::new(part, constraints, &extractor));
        }

        Ok(Self { entries, by_id })
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    /// Entry of a placement.
    pub fn entry(&self, placement: &PlacedPart) -> Option<&CatalogEntry> {
        self.entries.get(placement.part_index)
    }

    /// Index and entry of a part id.
    pub fn by_id(&self, id: &str) -> Option<(usize, &CatalogEntry)> {
        let index = *self.by_id.get(id)?;
        Some((index, &self.entries[index]))
    }

    /// All entries in input order.
    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Number of distinct parts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no parts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of copies.
    pub fn instance_count(&self) -> usize {
        self.entries.iter().map(|e| e.part.quantity()).sum()
    }

    /// Area of all copies.
    pub fn total_area(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| e.part.area() * e.part.quantity() as f64)
            .sum()
    }

    /// Every copy in processing order: hardest first, then largest, then by id
    /// and copy number.
    pub fn instances(&self) -> Vec<PartInstance> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by(|&a, &b| {
            let (ea, eb) = (&self.entries[a], &self.entries[b]);
            processing_cmp((&ea.part, &ea.features), (&eb.part, &eb.features))
        });

        order
            .into_iter()
            .flat_map(|part_index| {
                (0..self.entries[part_index].part.quantity())
                    .map(move |instance| PartInstance { part_index, instance })
            })
            .collect()
    }

    /// Bounding boxes of every part at every allowed rotation.
    pub fn rotated_boxes(&self) -> impl Iterator<Item = BoundingBox> + '_ {
        self.entries
            .iter()
            .flat_map(|e| (0..e.rotations.len()).map(move |i| e.bbox_at(i)))
    }
}
