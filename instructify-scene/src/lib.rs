//! instructify-scene: Scene Hierarchy Engine
//!
//! Turns an unordered bag of labeled boxes for one image into a deterministic
//! text description of the scene. Duplicate detections are merged, objects
//! are segmented and optionally assigned ordinal depth layers, a containment
//! forest is inferred from mask overlap, and the forest is rendered as
//! grouped, pluralized, counted text.
//!
//! Segmentation and depth estimation are external collaborators, plugged in
//! through [`SegmentationModel`] and [`DepthModel`].

pub mod config;
pub mod error;
pub mod label;
pub mod models;
pub mod object;
pub mod organizer;
pub mod processing;
pub mod scene;
mod utils;

pub use config::SceneConfig;
pub use error::SceneError;
pub use label::{EnglishInflector, LabelInflector};
pub use models::{BoxMaskSegmenter, DepthModel, ModelGate, SegmentationModel};
pub use object::{LabeledBox, SceneObject};
pub use organizer::{DescribeOptions, OrganizedScene, SceneOrganizer};
pub use processing::Hierarchy;
pub use scene::{format_annotation_listing, HierarchyFormatter};
pub use utils::{fit_within, load_image};
