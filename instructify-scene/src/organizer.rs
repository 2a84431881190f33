//! Per-image scene description pipeline
//!
//! Raw detections are merged by box, segmented in batches, merged again by
//! box and mask, optionally layered by depth, nested into a containment
//! forest and rendered as text. Model calls go through single-slot gates;
//! the pure stages run on the blocking pool and may run for many images at
//! once.

use crate::config::SceneConfig;
use crate::error::SceneError;
use crate::label::{EnglishInflector, LabelInflector};
use crate::models::{DepthModel, ModelGate, PixelBox, SegmentationModel};
use crate::object::{LabeledBox, SceneObject};
use crate::processing::depth::DepthCalculator;
use crate::processing::hierarchy::Hierarchy;
use crate::processing::mask::Mask;
use crate::processing::merge::BoxMerger;
use crate::scene::HierarchyFormatter;
use crate::utils::{fit_within, load_image};
use image::{DynamicImage, RgbImage};
use instructify_core::{aggregate_detections, ImageAnnotations, RawDetection};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Rendering switches for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescribeOptions {
    /// Append coordinates and measurements to each object line
    pub include_box_label: bool,
    /// Estimate depth layers and use them for nesting and grouping
    pub depth_calculation: bool,
}

impl Default for DescribeOptions {
    fn default() -> Self {
        Self {
            include_box_label: true,
            depth_calculation: false,
        }
    }
}

/// Description plus the merged objects it was rendered from
#[derive(Debug, Clone, Default)]
pub struct OrganizedScene {
    pub description: String,
    pub objects: Vec<SceneObject>,
}

impl OrganizedScene {
    /// Masks of the merged objects, in object order
    pub fn masks(&self) -> Vec<&Mask> {
        self.objects.iter().filter_map(|o| o.mask.as_ref()).collect()
    }

    /// Labels and boxes of the merged objects
    pub fn boxes(&self) -> Vec<LabeledBox> {
        self.objects.iter().map(LabeledBox::from).collect()
    }
}

/// Turns detections for one image into a scene description
pub struct SceneOrganizer {
    config: Arc<SceneConfig>,
    segmenter: ModelGate<dyn SegmentationModel>,
    depth: Option<ModelGate<dyn DepthModel>>,
    inflector: Arc<dyn LabelInflector>,
}

impl SceneOrganizer {
    pub fn new(config: SceneConfig, segmenter: Arc<dyn SegmentationModel>) -> Result<Self, SceneError> {
        config.validate().map_err(SceneError::Config)?;
        info!("Scene organizer using segmenter '{}'", segmenter.name());
        Ok(Self {
            config: Arc::new(config),
            segmenter: ModelGate::new(segmenter),
            depth: None,
            inflector: Arc::new(EnglishInflector),
        })
    }

    pub fn with_depth_model(mut self, model: Arc<dyn DepthModel>) -> Self {
        info!("Scene organizer using depth model '{}'", model.name());
        self.depth = Some(ModelGate::new(model));
        self
    }

    pub fn with_inflector(mut self, inflector: Arc<dyn LabelInflector>) -> Self {
        self.inflector = inflector;
        self
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Describe the scene in `image_path`. Empty `detections` give an empty string.
    pub async fn organize_objects(
        &self,
        detections: &[RawDetection],
        image_path: impl AsRef<Path>,
        options: DescribeOptions,
    ) -> Result<String, SceneError> {
        Ok(self
            .organize_objects_verbose(detections, image_path, options)
            .await?
            .description)
    }

    /// Like [`organize_objects`](Self::organize_objects), also returning the
    /// merged objects with their masks and depth layers
    pub async fn organize_objects_verbose(
        &self,
        detections: &[RawDetection],
        image_path: impl AsRef<Path>,
        options: DescribeOptions,
    ) -> Result<OrganizedScene, SceneError> {
        for detection in detections {
            detection.validate()?;
        }
        if detections.is_empty() {
            return Ok(OrganizedScene::default());
        }
        let image = load_image(image_path).await?;
        self.describe(detections, &image, options).await
    }

    /// Run the pipeline on an already decoded image
    pub async fn organize_image(
        &self,
        detections: &[RawDetection],
        image: &DynamicImage,
        options: DescribeOptions,
    ) -> Result<OrganizedScene, SceneError> {
        for detection in detections {
            detection.validate()?;
        }
        if detections.is_empty() {
            return Ok(OrganizedScene::default());
        }
        self.describe(detections, image, options).await
    }

    /// Describe the boxes of every dataset annotating `image_path`, with
    /// coordinates and without depth
    pub async fn image_data_conversion(
        &self,
        image_path: impl AsRef<Path>,
        annotations: &ImageAnnotations,
    ) -> Result<String, SceneError> {
        let detections = aggregate_detections(annotations);
        debug!(
            "Aggregated {} boxes from {} datasets",
            detections.len(),
            annotations.len()
        );
        self.organize_objects(&detections, image_path, DescribeOptions::default())
            .await
    }

    async fn describe(
        &self,
        detections: &[RawDetection],
        image: &DynamicImage,
        options: DescribeOptions,
    ) -> Result<OrganizedScene, SceneError> {
        if options.depth_calculation && self.depth.is_none() {
            return Err(SceneError::Config(
                "depth calculation requested but no depth model is configured".to_string(),
            ));
        }

        let (config, inflector) = (Arc::clone(&self.config), Arc::clone(&self.inflector));
        let (source, detections) = (image.clone(), detections.to_vec());
        let (image, merged) = run_blocking("box merge", move || {
            let image = fit_within(&source, config.segmentation.max_resolution);
            let merged = BoxMerger::new(&config.merge, inflector.as_ref()).merge_boxes(&detections);
            (image, merged)
        })
        .await?;

        let prompts: Vec<PixelBox> = merged
            .iter()
            .map(|b| b.bbox.to_pixels(image.width(), image.height()))
            .collect();
        let masks = self.segment(&image, &prompts).await?;

        let depth_map = match (&self.depth, options.depth_calculation) {
            (Some(gate), true) => {
                let model = gate.enter().await?;
                Some(model.estimate(&image).await?)
            }
            _ => None,
        };

        let (config, inflector) = (Arc::clone(&self.config), Arc::clone(&self.inflector));
        run_blocking("scene layout", move || {
            let mut objects = BoxMerger::new(&config.merge, inflector.as_ref()).masked_merge(merged, masks);

            if let Some(depth_map) = depth_map {
                let layers = DepthCalculator::new(&config.depth).assign(&depth_map, &mut objects);
                debug!(
                    "Depth: {} layers",
                    layers.as_ref().map_or(0, |l| l.layer_count())
                );
            }

            let hierarchy = Hierarchy::build(objects, &config.hierarchy);
            let description = HierarchyFormatter::new(&config.format, inflector.as_ref())
                .include_box_label(options.include_box_label)
                .format(&hierarchy);

            OrganizedScene {
                description,
                objects: hierarchy.into_objects(),
            }
        })
        .await
    }

    /// Request masks in fixed-size batches while holding the segmenter
    async fn segment(&self, image: &RgbImage, prompts: &[PixelBox]) -> Result<Vec<Mask>, SceneError> {
        let expected = (image.height() as usize, image.width() as usize);
        let batch_size = self.config.segmentation.max_boxes_per_batch;
        let mut masks = Vec::with_capacity(prompts.len());

        let model = self.segmenter.enter().await?;
        for (index, batch) in prompts.chunks(batch_size).enumerate() {
            debug!("Segmenting batch {} ({} boxes)", index + 1, batch.len());
            let batch_masks = model.segment(image, batch).await?;
            if batch_masks.len() != batch.len() {
                return Err(SceneError::Model(format!(
                    "{} returned {} masks for {} boxes",
                    model.name(),
                    batch_masks.len(),
                    batch.len()
                )));
            }
            if let Some(bad) = batch_masks.iter().find(|m| m.dim() != expected) {
                return Err(SceneError::Model(format!(
                    "{} returned a {:?} mask for a {:?} image",
                    model.name(),
                    bad.dim(),
                    expected
                )));
            }
            masks.extend(batch_masks);
        }
        Ok(masks)
    }
}

/// Run a CPU-bound stage on the blocking pool
async fn run_blocking<T, F>(stage: &'static str, f: F) -> Result<T, SceneError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SceneError::Processing(format!("{} task failed: {}", stage, e)))
}
