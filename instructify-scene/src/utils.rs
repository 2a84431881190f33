//! Image loading helpers

use crate::error::SceneError;
use image::{DynamicImage, RgbImage};
use std::path::Path;

/// Decode an image file on the blocking pool
pub async fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage, SceneError> {
    let path = path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || image::open(&path))
        .await
        .map_err(|e| SceneError::Processing(format!("Image decode task failed: {}", e)))?
        .map_err(SceneError::from)
}

/// Shrink `image` so neither side exceeds `max_side`, keeping the aspect
/// ratio. Smaller images are only converted.
pub fn fit_within(image: &DynamicImage, max_side: u32) -> RgbImage {
    if image.width() <= max_side && image.height() <= max_side {
        return image.to_rgb8();
    }
    image.thumbnail(max_side, max_side).to_rgb8()
}
