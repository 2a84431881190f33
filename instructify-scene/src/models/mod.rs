//! External model collaborators
//!
//! The engine never owns segmentation or depth internals; it talks to them
//! through these traits and serializes access with a [`ModelGate`].

pub mod box_mask;
pub mod gate;

pub use box_mask::BoxMaskSegmenter;
pub use gate::{GatedModel, ModelGate};

use crate::error::SceneError;
use crate::processing::mask::Mask;
use async_trait::async_trait;
use image::RgbImage;
use ndarray::Array2;

/// Pixel-space prompt box `[x1, y1, x2, y2]`
pub type PixelBox = [i64; 4];

/// Produces one binary mask per prompt box
#[async_trait]
pub trait SegmentationModel: Send + Sync {
    /// Model name for logs
    fn name(&self) -> &str;

    /// Segment `boxes` in `image`. Masks must be `(height, width)` of the image
    /// and come back in prompt order.
    async fn segment(&self, image: &RgbImage, boxes: &[PixelBox]) -> Result<Vec<Mask>, SceneError>;
}

/// Produces a dense relative depth map
#[async_trait]
pub trait DepthModel: Send + Sync {
    fn name(&self) -> &str;

    /// Per-pixel depth, `(rows, cols)`. Larger values are nearer to the camera.
    async fn estimate(&self, image: &RgbImage) -> Result<Array2<f32>, SceneError>;
}
