//! Model gate behavior under concurrent callers

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use instructify_core::{BoundingBox, RawDetection};
use instructify_scene::config::SceneConfig;
use instructify_scene::models::PixelBox;
use instructify_scene::processing::mask::Mask;
use instructify_scene::{
    BoxMaskSegmenter, DescribeOptions, ModelGate, SceneError, SceneOrganizer, SegmentationModel,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Slow segmenter that records how many calls overlap
#[derive(Default)]
struct OverlapCounter {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl SegmentationModel for OverlapCounter {
    fn name(&self) -> &str {
        "overlap"
    }

    async fn segment(&self, image: &RgbImage, boxes: &[PixelBox]) -> Result<Vec<Mask>, SceneError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        BoxMaskSegmenter.segment(image, boxes).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_images_share_one_segmenter_slot() {
    let counter = Arc::new(OverlapCounter::default());
    let mut config = SceneConfig::default();
    config.segmentation.max_boxes_per_batch = 1;
    let organizer = Arc::new(SceneOrganizer::new(config, counter.clone()).unwrap());

    let mut handles = Vec::new();
    for i in 0..6 {
        let organizer = organizer.clone();
        handles.push(tokio::spawn(async move {
            let image = DynamicImage::ImageRgb8(RgbImage::new(40, 40));
            let x1 = 0.1 * (i % 3) as f64;
            let detections = vec![
                RawDetection::new("cat", BoundingBox::new(x1, 0.1, x1 + 0.2, 0.3)),
                RawDetection::new("dog", BoundingBox::new(0.6, 0.6, 0.9, 0.9)),
            ];
            organizer
                .organize_image(&detections, &image, DescribeOptions::default())
                .await
                .map(|scene| scene.description)
        }));
    }

    for handle in handles {
        let description = handle.await.unwrap().unwrap();
        assert!(description.contains("Object Counts:"));
    }
    assert_eq!(counter.calls.load(Ordering::SeqCst), 12);
    assert_eq!(counter.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_gate_waiters_proceed_in_turn() {
    let gate = Arc::new(ModelGate::new(Arc::new(String::from("segmenter"))));
    let held = gate.enter().await.unwrap();

    let waiter = {
        let gate = gate.clone();
        tokio::spawn(async move { gate.enter().await.map(|model| model.len()) })
    };
    sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    drop(held);
    assert_eq!(waiter.await.unwrap().unwrap(), "segmenter".len());
    assert!(gate.is_idle());
}

#[tokio::test]
async fn test_closed_gate_rejects_callers() {
    let gate = ModelGate::new(Arc::new(BoxMaskSegmenter));
    gate.close();
    match gate.enter().await {
        Err(SceneError::Model(msg)) => assert!(msg.contains("closed")),
        Err(other) => panic!("Expected model error, got {}", other),
        Ok(_) => panic!("closed gate admitted a caller"),
    };
}
