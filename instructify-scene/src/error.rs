//! Error types for instructify-scene

use instructify_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Model error: {0}")]
    Model(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl From<SceneError> for CoreError {
    fn from(err: SceneError) -> Self {
        match err {
            SceneError::Core(inner) => inner,
            SceneError::Io(io) => CoreError::Io(io),
            SceneError::Config(msg) => CoreError::Configuration(msg),
            other => CoreError::InvalidInput(format!("Scene error: {}", other)),
        }
    }
}
