//! Configuration for instructify-scene

use crate::error::SceneError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Thresholds for the two merge passes and the label merger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Box IoU above which raw detections collapse before segmentation
    pub initial_box_iou_threshold: f64,
    /// Box IoU and mask IoU above which segmented objects collapse
    pub merge_iou_threshold: f64,
    /// Allowed edit distance as a fraction of the average label length
    pub label_distance_fraction: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            initial_box_iou_threshold: 0.95,
            merge_iou_threshold: 0.6,
            label_distance_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Boxes sent to the segmenter per call
    pub max_boxes_per_batch: usize,
    /// Longest image side handed to the models
    pub max_resolution: u32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_boxes_per_batch: 20,
            max_resolution: 1920,
        }
    }
}

/// Histogram peak analysis used to discretize depth maps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthConfig {
    pub bins: usize,
    /// Minimum peak prominence as a fraction of the histogram mass
    pub prominence_factor: f64,
    /// Minimum peak height as a fraction of the histogram mass
    pub min_size_factor: f64,
    /// Peaks whose height/valley ratio stays below this are merged away
    pub valley_threshold_ratio: f64,
    pub max_peaks_to_consider: usize,
    pub lower_percentile: f64,
    pub upper_percentile: f64,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            bins: 50,
            prominence_factor: 0.002,
            min_size_factor: 0.001,
            valley_threshold_ratio: 1.6,
            max_peaks_to_consider: 15,
            lower_percentile: 15.0,
            upper_percentile: 85.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Fraction of a mask that must fall inside another mask to be its child
    pub mask_containment_threshold: f64,
    /// Layers by which depth ranges are widened before the overlap test
    pub depth_grace: u32,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            mask_containment_threshold: 0.2,
            depth_grace: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Largest normalized gap between boxes that still counts as "close"
    pub position_threshold: f64,
    /// Groups larger than this are described as "many"
    pub max_count_claim: usize,
    /// Types that are always described as "several" when grouped
    pub uncountable: Vec<String>,
    /// Print the rounded `[x1, y1, x2, y2]` box next to each object
    pub include_box_coords: bool,
    /// Grid that coordinates and sizes are rounded to
    pub coordinate_precision: f64,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            position_threshold: 0.02,
            max_count_claim: 8,
            uncountable: ["window", "drink", "tree", "building"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            include_box_coords: false,
            coordinate_precision: 0.05,
        }
    }
}

/// Scene engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub merge: MergeConfig,
    pub segmentation: SegmentationConfig,
    pub depth: DepthConfig,
    pub hierarchy: HierarchyConfig,
    pub format: FormatConfig,
}

impl SceneConfig {
    /// Load from a TOML, YAML or JSON file and validate
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let config: SceneConfig = instructify_core::config::from_file(path)?;
        config.validate().map_err(SceneError::Config)?;
        Ok(config)
    }

    /// Apply `INSTRUCTIFY_MAX_SAM_BOXES` and `INSTRUCTIFY_MAX_RESOLUTION` when set
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(batch) = env_parse::<usize>("INSTRUCTIFY_MAX_SAM_BOXES") {
            self.segmentation.max_boxes_per_batch = batch;
        }
        if let Some(resolution) = env_parse::<u32>("INSTRUCTIFY_MAX_RESOLUTION") {
            self.segmentation.max_resolution = resolution;
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let unit_interval = [
            ("merge.initial_box_iou_threshold", self.merge.initial_box_iou_threshold),
            ("merge.merge_iou_threshold", self.merge.merge_iou_threshold),
            ("merge.label_distance_fraction", self.merge.label_distance_fraction),
            ("hierarchy.mask_containment_threshold", self.hierarchy.mask_containment_threshold),
            ("depth.prominence_factor", self.depth.prominence_factor),
            ("depth.min_size_factor", self.depth.min_size_factor),
        ];
        for (name, value) in unit_interval {
            if !(value > 0.0 && value <= 1.0) {
                return Err(format!("{} must be in (0, 1], got {}", name, value));
            }
        }

        if self.segmentation.max_boxes_per_batch == 0 {
            return Err("segmentation.max_boxes_per_batch must be non-zero".to_string());
        }
        if self.segmentation.max_resolution == 0 {
            return Err("segmentation.max_resolution must be non-zero".to_string());
        }

        if self.depth.bins < 3 {
            return Err("depth.bins must be at least 3".to_string());
        }
        if self.depth.max_peaks_to_consider < 2 {
            return Err("depth.max_peaks_to_consider must be at least 2".to_string());
        }
        if !(self.depth.valley_threshold_ratio.is_finite() && self.depth.valley_threshold_ratio > 0.0) {
            return Err("depth.valley_threshold_ratio must be positive".to_string());
        }
        let (lo, hi) = (self.depth.lower_percentile, self.depth.upper_percentile);
        if !(0.0..=100.0).contains(&lo) || !(0.0..=100.0).contains(&hi) || lo > hi {
            return Err(format!("depth percentiles out of order: {} > {}", lo, hi));
        }

        if !(self.format.position_threshold >= 0.0 && self.format.position_threshold.is_finite()) {
            return Err("format.position_threshold must be non-negative".to_string());
        }
        if !(self.format.coordinate_precision > 0.0 && self.format.coordinate_precision.is_finite()) {
            return Err("format.coordinate_precision must be positive".to_string());
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
