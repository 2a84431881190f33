//! Duplicate detection merging
//!
//! Two passes share the same greedy clustering: the first collapses raw boxes
//! by box IoU before any masks exist, the second collapses segmented objects
//! only when both box IoU and mask IoU agree. Each cluster's label list is
//! then reduced by [`merge_labels`].

use crate::config::MergeConfig;
use crate::label::{levenshtein_distance, LabelInflector};
use crate::object::SceneObject;
use crate::processing::mask::{mask_iou, union_masks, Mask};
use instructify_core::{BoundingBox, RawDetection};
use tracing::debug;

/// A box cluster from the pre-segmentation pass; labels are merged but not yet formatted
#[derive(Debug, Clone, PartialEq)]
pub struct MergedBox {
    pub labels: Vec<String>,
    pub bbox: BoundingBox,
}

impl MergedBox {
    pub fn to_detection(&self) -> RawDetection {
        RawDetection::with_labels(self.labels.iter().cloned(), self.bbox)
    }
}

/// Greedy IoU-based merger for detections and segmented objects
pub struct BoxMerger<'a> {
    config: &'a MergeConfig,
    inflector: &'a dyn LabelInflector,
}

impl<'a> BoxMerger<'a> {
    pub fn new(config: &'a MergeConfig, inflector: &'a dyn LabelInflector) -> Self {
        Self { config, inflector }
    }

    /// Collapse raw detections whose boxes overlap above `initial_box_iou_threshold`.
    ///
    /// Each detection joins the first cluster whose running union box it
    /// overlaps; the scan repeats until no clusters merge, so running it on
    /// its own output is a no-op.
    pub fn merge_boxes(&self, detections: &[RawDetection]) -> Vec<MergedBox> {
        let threshold = self.config.initial_box_iou_threshold;
        let mut clusters: Vec<MergedBox> = Vec::with_capacity(detections.len());
        for det in detections {
            absorb(&mut clusters, det.labels.clone(), det.bbox, threshold);
        }

        loop {
            let before = clusters.len();
            let mut next: Vec<MergedBox> = Vec::with_capacity(before);
            for cluster in clusters {
                absorb(&mut next, cluster.labels, cluster.bbox, threshold);
            }
            clusters = next;
            if clusters.len() == before {
                break;
            }
        }

        for cluster in clusters.iter_mut() {
            cluster.labels = merge_labels(&cluster.labels, self.config.label_distance_fraction, self.inflector);
        }

        debug!("Box merge: {} detections -> {} boxes", detections.len(), clusters.len());
        clusters
    }

    /// Collapse segmented boxes whose box IoU and mask IoU both exceed
    /// `merge_iou_threshold`, unless their labels are singular/plural forms of
    /// each other. Merged masks are OR-ed together.
    pub fn masked_merge(&self, boxes: Vec<MergedBox>, masks: Vec<Mask>) -> Vec<SceneObject> {
        let threshold = self.config.merge_iou_threshold;
        let input_len = boxes.len();
        let mut merged: Vec<(Vec<String>, BoundingBox, Mask)> = Vec::with_capacity(input_len);

        for (candidate, mask) in boxes.into_iter().zip(masks) {
            let target = merged.iter_mut().find(|(labels, bbox, existing)| {
                !labels_are_plural_of_each_other(&candidate.labels, labels, self.inflector)
                    && candidate.bbox.iou(bbox) > threshold
                    && mask_iou(&mask, existing) > threshold
            });

            match target {
                Some((labels, bbox, existing)) => {
                    labels.extend(candidate.labels);
                    *bbox = bbox.union(&candidate.bbox);
                    *existing = union_masks(existing, &mask);
                }
                None => merged.push((candidate.labels, candidate.bbox, mask)),
            }
        }

        debug!("Masked merge: {} boxes -> {} objects", input_len, merged.len());

        merged
            .into_iter()
            .map(|(labels, bbox, mask)| {
                let labels = merge_labels(&labels, self.config.label_distance_fraction, self.inflector);
                SceneObject::new(format_labels(&labels), bbox).with_mask(mask)
            })
            .collect()
    }
}

fn absorb(clusters: &mut Vec<MergedBox>, labels: Vec<String>, bbox: BoundingBox, threshold: f64) {
    match clusters.iter_mut().find(|c| bbox.iou(&c.bbox) > threshold) {
        Some(cluster) => {
            cluster.labels.extend(labels);
            cluster.bbox = cluster.bbox.union(&bbox);
        }
        None => clusters.push(MergedBox { labels, bbox }),
    }
}

/// True if any label of one list is the plural of a label of the other
pub fn labels_are_plural_of_each_other(
    first: &[String],
    second: &[String],
    inflector: &dyn LabelInflector,
) -> bool {
    first.iter().any(|l1| {
        second.iter().any(|l2| {
            l1 != l2 && (inflector.to_plural(l1) == *l2 || inflector.to_plural(l2) == *l1)
        })
    })
}

/// Reduce a label list to distinct names.
///
/// Labels are taken in order as a base; a later label merges into the base
/// when both have the same relationship status and either one contains the
/// other (the longer text is kept) or their edit distance is within
/// `max(1, floor(distance_fraction * average_length))` (the shorter is kept).
pub fn merge_labels(labels: &[String], distance_fraction: f64, inflector: &dyn LabelInflector) -> Vec<String> {
    let mut merged = Vec::new();
    let mut remaining: Vec<String> = labels.to_vec();

    while !remaining.is_empty() {
        let mut base = remaining.remove(0);
        let base_is_relationship = inflector.is_relationship(&base);
        let mut absorbed: Vec<String> = Vec::new();

        for label in &remaining {
            if inflector.is_relationship(label) != base_is_relationship {
                continue;
            }

            let (base_len, label_len) = (base.chars().count(), label.chars().count());
            if base.contains(label.as_str()) || label.contains(base.as_str()) {
                if label_len > base_len {
                    base = label.clone();
                }
                absorbed.push(label.clone());
            } else {
                let distance = levenshtein_distance(&base, label);
                let average = (base_len + label_len) as f64 / 2.0;
                let allowed = ((distance_fraction * average) as usize).max(1);
                if distance <= allowed {
                    if label_len < base_len {
                        base = label.clone();
                    }
                    absorbed.push(label.clone());
                }
            }
        }

        remaining.retain(|label| !absorbed.contains(label));
        merged.push(base);
    }

    merged
}

/// `"primary (alias, alias)"`, or the lone label
pub fn format_labels(labels: &[String]) -> String {
    match labels {
        [] => String::new(),
        [single] => single.clone(),
        [primary, rest @ ..] => {
            let aliases: Vec<&str> = rest.iter().map(|l| l.trim()).collect();
            format!("{} ({})", primary, aliases.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::EnglishInflector;
    use crate::processing::mask::mask_area;
    use ndarray::Array2;

    fn strings(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    fn rect(r: std::ops::Range<usize>, c: std::ops::Range<usize>) -> Mask {
        Array2::from_shape_fn((20, 20), |(y, x)| r.contains(&y) && c.contains(&x))
    }

    #[test]
    fn test_merge_labels_substring_keeps_longer() {
        let merged = merge_labels(&strings(&["dog", "brown dog"]), 0.2, &EnglishInflector);
        assert_eq!(merged, strings(&["brown dog"]));
    }

    #[test]
    fn test_merge_labels_edit_distance_keeps_shorter() {
        let merged = merge_labels(&strings(&["colour", "color"]), 0.2, &EnglishInflector);
        assert_eq!(merged, strings(&["color"]));
    }

    #[test]
    fn test_merge_labels_distinct_names_survive() {
        let merged = merge_labels(&strings(&["cat", "sofa", "kitten"]), 0.2, &EnglishInflector);
        assert_eq!(merged, strings(&["cat", "sofa", "kitten"]));
    }

    #[test]
    fn test_merge_labels_relationship_kept_apart() {
        let merged = merge_labels(&strings(&["cup", "cup on top of table"]), 0.2, &EnglishInflector);
        assert_eq!(merged, strings(&["cup", "cup on top of table"]));
    }

    #[test]
    fn test_format_labels() {
        assert_eq!(format_labels(&strings(&["dog"])), "dog");
        assert_eq!(format_labels(&strings(&["dog", " puppy", "hound"])), "dog (puppy, hound)");
        assert_eq!(format_labels(&[]), "");
    }

    #[test]
    fn test_merge_boxes_empty() {
        let config = MergeConfig::default();
        let merger = BoxMerger::new(&config, &EnglishInflector);
        assert!(merger.merge_boxes(&[]).is_empty());
    }

    #[test]
    fn test_merge_boxes_unions_near_duplicates() {
        let config = MergeConfig::default();
        let merger = BoxMerger::new(&config, &EnglishInflector);
        let dets = vec![
            RawDetection::new("cat", BoundingBox::new(0.1, 0.1, 0.3, 0.3)),
            RawDetection::new("kitty cat", BoundingBox::new(0.1, 0.1, 0.3, 0.301)),
            RawDetection::new("sofa", BoundingBox::new(0.5, 0.5, 0.9, 0.9)),
        ];
        let merged = merger.merge_boxes(&dets);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].labels, strings(&["kitty cat"]));
        assert_eq!(merged[0].bbox, BoundingBox::new(0.1, 0.1, 0.3, 0.301));
        assert_eq!(merged[1].labels, strings(&["sofa"]));
    }

    #[test]
    fn test_merge_boxes_reaches_fixpoint() {
        // the third box grows the first cluster until it swallows the second
        let config = MergeConfig {
            initial_box_iou_threshold: 0.5,
            ..MergeConfig::default()
        };
        let merger = BoxMerger::new(&config, &EnglishInflector);
        let dets = vec![
            RawDetection::new("a", BoundingBox::new(0.0, 0.0, 0.6, 1.0)),
            RawDetection::new("b", BoundingBox::new(0.3, 0.0, 1.0, 1.0)),
            RawDetection::new("c", BoundingBox::new(0.0, 0.0, 0.9, 1.0)),
        ];
        let merged = merger.merge_boxes(&dets);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].bbox, BoundingBox::new(0.0, 0.0, 1.0, 1.0));

        let again = merger.merge_boxes(&merged.iter().map(MergedBox::to_detection).collect::<Vec<_>>());
        assert_eq!(again, merged);
    }

    #[test]
    fn test_masked_merge_requires_both_ious() {
        let config = MergeConfig::default();
        let merger = BoxMerger::new(&config, &EnglishInflector);
        let bbox = BoundingBox::new(0.1, 0.1, 0.5, 0.5);
        let boxes = vec![
            MergedBox { labels: strings(&["cup"]), bbox },
            MergedBox { labels: strings(&["mug"]), bbox },
            MergedBox { labels: strings(&["glass"]), bbox },
        ];
        // first two masks agree, the third barely touches them
        let masks = vec![rect(2..10, 2..10), rect(2..10, 2..9), rect(12..14, 12..14)];
        let objects = merger.masked_merge(boxes, masks);

        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].label, "cup (mug)");
        assert_eq!(objects[0].mask.as_ref().map(mask_area), Some(64));
        assert_eq!(objects[1].label, "glass");
    }

    #[test]
    fn test_masked_merge_keeps_plural_pairs_apart() {
        let config = MergeConfig::default();
        let merger = BoxMerger::new(&config, &EnglishInflector);
        let bbox = BoundingBox::new(0.1, 0.1, 0.5, 0.5);
        let boxes = vec![
            MergedBox { labels: strings(&["dog"]), bbox },
            MergedBox { labels: strings(&["dogs"]), bbox },
        ];
        let objects = merger.masked_merge(boxes, vec![rect(2..10, 2..10), rect(2..10, 2..10)]);
        assert_eq!(objects.len(), 2);
    }

    #[test]
    fn test_plural_check() {
        assert!(labels_are_plural_of_each_other(&strings(&["tree"]), &strings(&["trees"]), &EnglishInflector));
        assert!(!labels_are_plural_of_each_other(&strings(&["tree"]), &strings(&["tree"]), &EnglishInflector));
        assert!(!labels_are_plural_of_each_other(&strings(&["tree"]), &strings(&["bush"]), &EnglishInflector));
    }
}
