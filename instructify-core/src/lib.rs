//! instructify-core: shared vocabulary for the instructify curation pipeline
//!
//! Holds the annotation data model every stage agrees on (normalized boxes,
//! raw labeled detections, per-dataset annotation dictionaries), the common
//! error type, and the configuration-file loader.

pub mod types;
pub mod error;
pub mod config;

pub use error::{Error, Result};
pub use types::{
    aggregate_detections, BoundingBox, DatasetAnnotations, ImageAnnotations, LabelField,
    RawDetection,
};
