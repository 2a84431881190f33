//! Configuration file loading shared by every instructify component
//!
//! Component configs are plain serde structs; this module only knows how to
//! turn a file or string into one of them.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Parse configuration content, trying JSON, then TOML, then YAML
pub fn from_str<T: DeserializeOwned>(content: &str) -> Result<T> {
    if let Ok(config) = serde_json::from_str::<T>(content) {
        return Ok(config);
    }

    if let Ok(config) = toml::from_str::<T>(content) {
        return Ok(config);
    }

    serde_yaml::from_str::<T>(content)
        .map_err(|e| Error::Configuration(format!("unrecognized configuration format: {}", e)))
}

/// Load configuration from a file, choosing the parser by extension.
/// Files without a known extension fall back to [`from_str`].
pub fn from_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("json") => serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e))),
        Some("toml") => toml::from_str(&content)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e))),
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e))),
        _ => from_str(&content),
    }
}
