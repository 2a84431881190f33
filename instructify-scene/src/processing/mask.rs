//! Binary mask helpers
//!
//! Masks are `(rows, cols)` boolean arrays at the resolution of the image the
//! segmenter saw. Pairwise operations on masks of different shapes treat the
//! pair as disjoint.

use instructify_core::BoundingBox;
use ndarray::{Array2, Zip};

/// Per-pixel object mask
pub type Mask = Array2<bool>;

pub fn mask_area(mask: &Mask) -> usize {
    mask.iter().filter(|&&v| v).count()
}

pub fn intersection_area(a: &Mask, b: &Mask) -> usize {
    if a.dim() != b.dim() {
        return 0;
    }
    let mut count = 0;
    Zip::from(a).and(b).for_each(|&x, &y| {
        if x && y {
            count += 1;
        }
    });
    count
}

/// Intersection over union; 0 when both masks are empty
pub fn mask_iou(a: &Mask, b: &Mask) -> f64 {
    if a.dim() != b.dim() {
        return 0.0;
    }
    let mut intersection = 0usize;
    let mut union = 0usize;
    Zip::from(a).and(b).for_each(|&x, &y| {
        if x && y {
            intersection += 1;
        }
        if x || y {
            union += 1;
        }
    });
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Fraction of `inner` covered by `outer`
pub fn contained_in(inner: &Mask, outer: &Mask) -> f64 {
    let area = mask_area(inner);
    if area == 0 {
        return 0.0;
    }
    intersection_area(inner, outer) as f64 / area as f64
}

/// Pixel-wise OR; keeps `a` when shapes disagree
pub fn union_masks(a: &Mask, b: &Mask) -> Mask {
    if a.dim() != b.dim() {
        return a.clone();
    }
    Zip::from(a).and(b).map_collect(|&x, &y| x || y)
}

/// Median pixel position of the mask, normalized to `[0, 1]` in input orientation
pub fn mask_center(mask: &Mask) -> Option<(f64, f64)> {
    let (rows, cols) = mask.dim();
    let mut row_counts = vec![0usize; rows];
    let mut col_counts = vec![0usize; cols];
    for ((r, c), &v) in mask.indexed_iter() {
        if v {
            row_counts[r] += 1;
            col_counts[c] += 1;
        }
    }

    let total: usize = row_counts.iter().sum();
    if total == 0 {
        return None;
    }
    let x = median_index(&col_counts, total) / cols as f64;
    let y = median_index(&row_counts, total) / rows as f64;
    Some((x, y))
}

/// Percentage of the frame covered by the mask
pub fn pixel_percentage(mask: &Mask) -> f64 {
    if mask.is_empty() {
        return 0.0;
    }
    mask_area(mask) as f64 / mask.len() as f64 * 100.0
}

/// Rectangular mask of a normalized box; pixel bounds are truncated
pub fn box_mask(bbox: &BoundingBox, rows: usize, cols: usize) -> Mask {
    let to_col = |v: f64| ((v * cols as f64) as i64).clamp(0, cols as i64) as usize;
    let to_row = |v: f64| ((v * rows as f64) as i64).clamp(0, rows as i64) as usize;
    let (c1, c2) = (to_col(bbox.x1), to_col(bbox.x2));
    let (r1, r2) = (to_row(bbox.y1), to_row(bbox.y2));

    Array2::from_shape_fn((rows, cols), |(r, c)| r >= r1 && r < r2 && c >= c1 && c < c2)
}

/// Median of the multiset where index `i` occurs `counts[i]` times;
/// even totals average the two middle values
fn median_index(counts: &[usize], total: usize) -> f64 {
    let nth = |k: usize| -> usize {
        let mut seen = 0;
        for (i, &n) in counts.iter().enumerate() {
            seen += n;
            if seen > k {
                return i;
            }
        }
        counts.len().saturating_sub(1)
    };

    if total % 2 == 1 {
        nth(total / 2) as f64
    } else {
        (nth(total / 2 - 1) + nth(total / 2)) as f64 / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(rows: usize, cols: usize, r: std::ops::Range<usize>, c: std::ops::Range<usize>) -> Mask {
        Array2::from_shape_fn((rows, cols), |(y, x)| r.contains(&y) && c.contains(&x))
    }

    #[test]
    fn test_area_and_iou() {
        let a = rect(10, 10, 0..4, 0..4);
        let b = rect(10, 10, 2..6, 0..4);
        assert_eq!(mask_area(&a), 16);
        assert_eq!(intersection_area(&a, &b), 8);
        assert!((mask_iou(&a, &b) - 8.0 / 24.0).abs() < 1e-12);
    }

    #[test]
    fn test_iou_of_empty_masks() {
        let empty = Mask::from_elem((4, 4), false);
        assert_eq!(mask_iou(&empty, &empty), 0.0);
        assert_eq!(contained_in(&empty, &empty), 0.0);
    }

    #[test]
    fn test_shape_mismatch_is_disjoint() {
        let a = rect(10, 10, 0..4, 0..4);
        let b = rect(8, 8, 0..4, 0..4);
        assert_eq!(mask_iou(&a, &b), 0.0);
        assert_eq!(contained_in(&a, &b), 0.0);
        assert_eq!(union_masks(&a, &b), a);
    }

    #[test]
    fn test_contained_in_is_directional() {
        let small = rect(10, 10, 2..4, 2..4);
        let large = rect(10, 10, 0..8, 0..8);
        assert_eq!(contained_in(&small, &large), 1.0);
        assert!((contained_in(&large, &small) - 4.0 / 64.0).abs() < 1e-12);
    }

    #[test]
    fn test_union() {
        let a = rect(4, 4, 0..1, 0..4);
        let b = rect(4, 4, 3..4, 0..4);
        assert_eq!(mask_area(&union_masks(&a, &b)), 8);
    }

    #[test]
    fn test_center_uses_median() {
        // columns 2,3 in rows 0..4: x median 2.5, y median 1.5
        let mask = rect(10, 10, 0..4, 2..4);
        let (x, y) = mask_center(&mask).unwrap();
        assert!((x - 0.25).abs() < 1e-12);
        assert!((y - 0.15).abs() < 1e-12);
        assert!(mask_center(&Mask::from_elem((3, 3), false)).is_none());
    }

    #[test]
    fn test_pixel_percentage() {
        let mask = rect(10, 10, 0..5, 0..5);
        assert!((pixel_percentage(&mask) - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_box_mask_truncates() {
        let mask = box_mask(&BoundingBox::new(0.15, 0.0, 0.59, 0.5), 10, 10);
        // columns 1..5, rows 0..5
        assert_eq!(mask_area(&mask), 20);
        assert!(mask[[0, 1]]);
        assert!(!mask[[0, 5]]);
        assert!(!mask[[5, 1]]);
    }
}
