//! Merged scene objects

use crate::processing::mask::{mask_area, Mask};
use instructify_core::BoundingBox;
use serde::{Deserialize, Serialize};

/// One merged object: label text, box, optional mask and depth layers.
///
/// `label` is the formatted string produced by the label merger, e.g.
/// `"dog (puppy, brown dog)"`. `depths` are layer indices with 0 nearest and
/// are empty when depth was not computed.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub label: String,
    pub bbox: BoundingBox,
    pub mask: Option<Mask>,
    pub depths: Vec<u32>,
}

impl SceneObject {
    pub fn new(label: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            bbox,
            mask: None,
            depths: Vec::new(),
        }
    }

    pub fn with_mask(mut self, mask: Mask) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_depths(mut self, depths: Vec<u32>) -> Self {
        self.depths = depths;
        self
    }

    /// Label text before any parenthesized alias list
    pub fn primary_label(&self) -> &str {
        self.label.split(" (").next().unwrap_or(&self.label)
    }

    /// Number of mask pixels, `None` without a mask
    pub fn mask_area(&self) -> Option<usize> {
        self.mask.as_ref().map(mask_area)
    }

    /// `(min, max)` depth layer
    pub fn depth_range(&self) -> Option<(u32, u32)> {
        let min = self.depths.iter().min()?;
        let max = self.depths.iter().max()?;
        Some((*min, *max))
    }

    /// Mean depth layer; 0 without depths
    pub fn mean_depth(&self) -> f64 {
        if self.depths.is_empty() {
            return 0.0;
        }
        self.depths.iter().map(|&d| d as f64).sum::<f64>() / self.depths.len() as f64
    }
}

/// Whether two depth ranges overlap after widening both by `grace` layers.
/// Objects without depth are compatible with everything.
pub fn depths_compatible(a: Option<(u32, u32)>, b: Option<(u32, u32)>, grace: u32) -> bool {
    match (a, b) {
        (Some((min_a, max_a)), Some((min_b, max_b))) => {
            let grace = grace as i64;
            let low = (min_a as i64).max(min_b as i64) - grace;
            let high = (max_a as i64).min(max_b as i64) + grace;
            low <= high
        }
        _ => true,
    }
}

/// Label and box of a merged object, as returned to callers for reuse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledBox {
    pub label: String,
    pub bbox: BoundingBox,
}

impl From<&SceneObject> for LabeledBox {
    fn from(object: &SceneObject) -> Self {
        Self {
            label: object.label.clone(),
            bbox: object.bbox,
        }
    }
}
