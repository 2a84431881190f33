//! Describe an image from a JSON annotation file
//!
//! Usage: `cargo run --example describe_scene -- <image> <annotations.json> [config]`
//!
//! The annotation file maps dataset names to `{"bboxes": [[label, x1, y1, x2, y2], ...]}`.
//! Rectangular box masks stand in for a learned segmenter.

use instructify_core::ImageAnnotations;
use instructify_scene::{format_annotation_listing, BoxMaskSegmenter, SceneConfig, SceneOrganizer};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(image), Some(annotations)) = (args.next(), args.next()) else {
        anyhow::bail!("usage: describe_scene <image> <annotations.json> [config]");
    };
    let config = match args.next() {
        Some(path) => SceneConfig::from_file(path)?,
        None => SceneConfig::default(),
    }
    .with_env_overrides();

    let annotations: ImageAnnotations = serde_json::from_str(&std::fs::read_to_string(&annotations)?)?;

    let organizer = SceneOrganizer::new(config, Arc::new(BoxMaskSegmenter))?;
    let description = organizer.image_data_conversion(&image, &annotations).await?;

    println!("{}", format_annotation_listing(&annotations));
    println!();
    println!("{}", description);
    Ok(())
}
