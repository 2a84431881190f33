use instructify_core::{BoundingBox, RawDetection};
use instructify_scene::config::{DepthConfig, HierarchyConfig, MergeConfig};
use instructify_scene::label::{to_plural, to_singular};
use instructify_scene::processing::mask::Mask;
use instructify_scene::processing::{containment_matrix, BoxMerger, DepthCalculator, Hierarchy};
use instructify_scene::{EnglishInflector, SceneObject};
use ndarray::Array2;
use proptest::prelude::*;

const GRID: usize = 20;
const LABELS: &[&str] = &["cat", "dog", "table", "cup", "person", "shirt"];

/// Box on a 20-cell grid: `(label, x1, y1, width, height)` in cells
fn grid_box() -> impl Strategy<Value = (usize, usize, usize, usize, usize)> {
    (0..LABELS.len(), 0..GRID - 1, 0..GRID - 1, 1..GRID, 1..GRID)
}

fn to_bbox(x: usize, y: usize, w: usize, h: usize) -> BoundingBox {
    let x2 = (x + w).min(GRID);
    let y2 = (y + h).min(GRID);
    BoundingBox::new(
        x as f64 / GRID as f64,
        y as f64 / GRID as f64,
        x2 as f64 / GRID as f64,
        y2 as f64 / GRID as f64,
    )
}

fn to_object((label, x, y, w, h): (usize, usize, usize, usize, usize)) -> SceneObject {
    let (x2, y2) = ((x + w).min(GRID), (y + h).min(GRID));
    let mask = Mask::from_shape_fn((GRID, GRID), |(r, c)| r >= y && r < y2 && c >= x && c < x2);
    SceneObject::new(LABELS[label], to_bbox(x, y, w, h)).with_mask(mask)
}

const MAP: usize = 40;

/// Far plane left of `split`, near plane from `split` on, plus the extreme values in two corners
fn two_plane_map(split: usize, far: f32, near: f32) -> Array2<f32> {
    let mut map = Array2::from_shape_fn((MAP, MAP), |(_, c)| if c < split { far } else { near });
    map[[0, 0]] = 0.0;
    map[[MAP - 1, MAP - 1]] = 1.0;
    map
}

/// Linear-interpolated percentile over sorted values
fn percentile(sorted: &[u32], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let (lo, hi) = (rank.floor() as usize, rank.ceil() as usize);
    sorted[lo] as f64 + (sorted[hi] as f64 - sorted[lo] as f64) * (rank - lo as f64)
}

proptest! {
    #[test]
    fn test_depth_zero_iff_mask_reaches_nearest_layer(
        split in 8..32usize,
        far in 0.2f32..0.35,
        near in 0.65f32..0.8,
        (r0, c0) in (0..MAP, 0..MAP),
        (h, w) in (1..MAP, 1..MAP),
    ) {
        let map = two_plane_map(split, far, near);
        let (r1, c1) = ((r0 + h).min(MAP), (c0 + w).min(MAP));
        let mask = Mask::from_shape_fn((MAP, MAP), |(r, c)| r >= r0 && r < r1 && c >= c0 && c < c1);
        let bbox = BoundingBox::new(
            c0 as f64 / MAP as f64,
            r0 as f64 / MAP as f64,
            c1 as f64 / MAP as f64,
            r1 as f64 / MAP as f64,
        );
        let mut objects = vec![SceneObject::new("vase", bbox).with_mask(mask.clone())];

        let config = DepthConfig::default();
        let layers = DepthCalculator::new(&config).assign(&map, &mut objects);
        let layers = match layers {
            Some(layers) => layers,
            None => return Ok(()),
        };
        prop_assert_eq!(layers.layer_count(), 2);
        let max_layer = layers.max_layer();
        let depths = &objects[0].depths;

        let mut under: Vec<u32> = mask
            .indexed_iter()
            .filter(|(_, &m)| m)
            .map(|((r, c), _)| layers.layers()[[r, c]])
            .collect();
        under.sort_unstable();
        let upper = percentile(&under, config.upper_percentile).round() as u32;

        prop_assert!(!depths.is_empty());
        prop_assert!(depths.windows(2).all(|p| p[0] < p[1]));
        prop_assert!(depths.iter().all(|&d| d <= max_layer));
        prop_assert_eq!(depths.contains(&0), upper == max_layer);

        if c0 >= split {
            prop_assert_eq!(depths.clone(), vec![0]);
        } else if c1 <= split {
            prop_assert_eq!(depths.clone(), vec![max_layer]);
        }
    }

    #[test]
    fn test_merge_boxes_idempotent(boxes in prop::collection::vec(grid_box(), 0..25)) {
        let config = MergeConfig {
            initial_box_iou_threshold: 0.5,
            ..MergeConfig::default()
        };
        let merger = BoxMerger::new(&config, &EnglishInflector);
        let detections: Vec<RawDetection> = boxes
            .iter()
            .map(|&(label, x, y, w, h)| RawDetection::new(LABELS[label], to_bbox(x, y, w, h)))
            .collect();

        let once = merger.merge_boxes(&detections);
        let again_input: Vec<RawDetection> = once.iter().map(|b| b.to_detection()).collect();
        let twice = merger.merge_boxes(&again_input);

        prop_assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(&twice) {
            prop_assert_eq!(a.bbox, b.bbox);
        }
    }

    #[test]
    fn test_containment_is_acyclic(boxes in prop::collection::vec(grid_box(), 0..15)) {
        let objects: Vec<SceneObject> = boxes.into_iter().map(to_object).collect();
        let matrix = containment_matrix(&objects, &HierarchyConfig::default());
        let n = objects.len();
        for i in 0..n {
            prop_assert!(!matrix[[i, i]]);
            for j in 0..n {
                if matrix[[i, j]] {
                    prop_assert!(!matrix[[j, i]]);
                    prop_assert!(objects[i].bbox.area() < objects[j].bbox.area());
                }
            }
        }
    }

    #[test]
    fn test_forest_covers_every_object_once(boxes in prop::collection::vec(grid_box(), 0..15)) {
        let objects: Vec<SceneObject> = boxes.into_iter().map(to_object).collect();
        let n = objects.len();
        let hierarchy = Hierarchy::build(objects, &HierarchyConfig::default());

        let mut order = hierarchy.preorder();
        order.sort_unstable();
        prop_assert_eq!(order, (0..n).collect::<Vec<_>>());

        let mut parents = vec![0usize; n];
        for id in 0..n {
            for &child in hierarchy.children(id) {
                parents[child] += 1;
            }
        }
        for &root in hierarchy.roots() {
            prop_assert_eq!(parents[root], 0);
        }
        prop_assert!(parents.iter().all(|&p| p <= 1));
    }

    #[test]
    fn test_plural_round_trip(noun in prop::sample::select(vec![
        "cat", "dog", "car", "tree", "bus", "box", "glass", "dish", "church", "baby",
        "city", "toy", "key", "potato", "knife", "leaf", "person", "child", "woman",
        "bench", "bottle", "horse", "house", "fox", "watch", "boy", "shelf", "bird",
        "ski", "taxi", "kiwi",
    ])) {
        prop_assert_eq!(to_singular(&to_plural(noun)), noun);
    }
}
