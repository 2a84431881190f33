//! Segmenter that returns each prompt box as its mask

use super::{PixelBox, SegmentationModel};
use crate::error::SceneError;
use crate::processing::mask::Mask;
use async_trait::async_trait;
use image::RgbImage;

/// Rectangular masks straight from the prompt boxes; clipped to the image
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxMaskSegmenter;

#[async_trait]
impl SegmentationModel for BoxMaskSegmenter {
    fn name(&self) -> &str {
        "box-mask"
    }

    async fn segment(&self, image: &RgbImage, boxes: &[PixelBox]) -> Result<Vec<Mask>, SceneError> {
        let (width, height) = (image.width() as i64, image.height() as i64);
        Ok(boxes
            .iter()
            .map(|&[x1, y1, x2, y2]| {
                let (x1, x2) = (x1.clamp(0, width), x2.clamp(0, width));
                let (y1, y2) = (y1.clamp(0, height), y2.clamp(0, height));
                Mask::from_shape_fn((height as usize, width as usize), |(r, c)| {
                    let (r, c) = (r as i64, c as i64);
                    r >= y1 && r < y2 && c >= x1 && c < x2
                })
            })
            .collect())
    }
}
