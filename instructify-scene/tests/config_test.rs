//! Configuration loading from files and the environment

use instructify_scene::config::SceneConfig;
use instructify_scene::{BoxMaskSegmenter, SceneError, SceneOrganizer};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

fn config_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_yaml_partial_sections() {
    let file = config_file(
        ".yaml",
        "merge:\n  merge_iou_threshold: 0.7\nformat:\n  include_box_coords: true\n  uncountable: [grass]\n",
    );
    let config = SceneConfig::from_file(file.path()).unwrap();
    assert_eq!(config.merge.merge_iou_threshold, 0.7);
    assert_eq!(config.merge.initial_box_iou_threshold, 0.95);
    assert!(config.format.include_box_coords);
    assert_eq!(config.format.uncountable, vec!["grass".to_string()]);
    assert_eq!(config.depth.bins, 50);
}

#[test]
fn test_load_json() {
    let file = config_file(
        ".json",
        r#"{"segmentation": {"max_boxes_per_batch": 8}, "hierarchy": {"depth_grace": 0}}"#,
    );
    let config = SceneConfig::from_file(file.path()).unwrap();
    assert_eq!(config.segmentation.max_boxes_per_batch, 8);
    assert_eq!(config.segmentation.max_resolution, 1920);
    assert_eq!(config.hierarchy.depth_grace, 0);
}

#[test]
fn test_invalid_file_values_rejected() {
    let file = config_file(".toml", "[depth]\nlower_percentile = 90.0\nupper_percentile = 10.0\n");
    match SceneConfig::from_file(file.path()) {
        Err(SceneError::Config(msg)) => assert!(msg.contains("percentile")),
        other => panic!("Expected config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_file() {
    assert!(SceneConfig::from_file("/nonexistent/scene.toml").is_err());
}

#[test]
fn test_env_overrides() {
    std::env::set_var("INSTRUCTIFY_MAX_SAM_BOXES", "4");
    std::env::set_var("INSTRUCTIFY_MAX_RESOLUTION", "not-a-number");
    let config = SceneConfig::default().with_env_overrides();
    std::env::remove_var("INSTRUCTIFY_MAX_SAM_BOXES");
    std::env::remove_var("INSTRUCTIFY_MAX_RESOLUTION");

    assert_eq!(config.segmentation.max_boxes_per_batch, 4);
    assert_eq!(config.segmentation.max_resolution, 1920);
}

#[test]
fn test_organizer_rejects_invalid_config() {
    let mut config = SceneConfig::default();
    config.hierarchy.mask_containment_threshold = 1.5;
    let result = SceneOrganizer::new(config, Arc::new(BoxMaskSegmenter));
    assert!(matches!(result, Err(SceneError::Config(_))));
}
