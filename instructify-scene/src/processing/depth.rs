//! Depth map discretization
//!
//! A dense depth map is reduced to a handful of ordinal layers by finding
//! well-separated peaks in its value histogram. Each object then receives the
//! layers under its mask, reversed so that 0 is the nearest layer.
//!
//! Depth values follow the relative-depth convention: larger values are
//! nearer to the camera.

use crate::config::DepthConfig;
use crate::object::SceneObject;
use crate::processing::mask::{box_mask, mask_area, Mask};
use image::GrayImage;
use ndarray::Array2;
use tracing::{debug, warn};

/// Per-pixel layer indices; ascending index means a larger raw depth value
#[derive(Debug, Clone, PartialEq)]
pub struct DepthLayers {
    layers: Array2<u32>,
    thresholds: Vec<f64>,
}

impl DepthLayers {
    pub fn layers(&self) -> &Array2<u32> {
        &self.layers
    }

    /// Depth values separating consecutive layers
    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn layer_count(&self) -> usize {
        self.thresholds.len() + 1
    }

    pub fn max_layer(&self) -> u32 {
        self.layers.iter().copied().max().unwrap_or(0)
    }

    /// Layer map as an 8-bit image, min-max normalized to 0..=255
    pub fn to_image(&self) -> GrayImage {
        let (rows, cols) = self.layers.dim();
        let min = self.layers.iter().copied().min().unwrap_or(0) as f64;
        let max = self.layers.iter().copied().max().unwrap_or(0) as f64;
        let span = max - min;

        GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
            let value = self.layers[[y as usize, x as usize]] as f64;
            let level = if span > 0.0 { (value - min) / span * 255.0 } else { 0.0 };
            image::Luma([level as u8])
        })
    }
}

/// Histogram of `values` over `[min, max]` with `bins` equal-width bins.
/// The last bin is closed; returns counts and the `bins + 1` edges.
fn histogram(values: &[f64], bins: usize) -> (Vec<f64>, Vec<f64>) {
    let mut low = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if low == high {
        low -= 0.5;
        high += 0.5;
    }

    let edges: Vec<f64> = (0..=bins)
        .map(|i| low + (high - low) * i as f64 / bins as f64)
        .collect();
    let scale = bins as f64 / (high - low);

    let mut counts = vec![0.0; bins];
    for &v in values {
        let mut index = (((v - low) * scale) as usize).min(bins - 1);
        // float error can land a value one bin off its edges
        if index > 0 && v < edges[index] {
            index -= 1;
        } else if index + 1 < bins && v >= edges[index + 1] {
            index += 1;
        }
        counts[index] += 1.0;
    }
    (counts, edges)
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Strict local maxima; flat plateaus report their middle sample.
/// Neither end of the signal can be a peak.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }
    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Topographic prominence of each peak
fn prominences(x: &[f64], peaks: &[usize]) -> Vec<f64> {
    peaks
        .iter()
        .map(|&peak| {
            let height = x[peak];

            let mut left_min = height;
            for &v in x[..=peak].iter().rev() {
                if v > height {
                    break;
                }
                left_min = left_min.min(v);
            }

            let mut right_min = height;
            for &v in &x[peak..] {
                if v > height {
                    break;
                }
                right_min = right_min.min(v);
            }

            height - left_min.max(right_min)
        })
        .collect()
}

/// Peak height over the higher of its neighbouring valley floors
fn relative_prominences(peaks: &[usize], hist: &[f64]) -> Vec<f64> {
    (0..peaks.len())
        .map(|i| {
            let left_min = if i > 0 {
                hist[peaks[i - 1]..peaks[i]].iter().copied().fold(f64::INFINITY, f64::min)
            } else {
                0.0
            };
            let right_min = if i + 1 < peaks.len() {
                hist[peaks[i]..peaks[i + 1]].iter().copied().fold(f64::INFINITY, f64::min)
            } else {
                0.0
            };
            hist[peaks[i]] / left_min.max(right_min).max(1e-6)
        })
        .collect()
}

/// Discretize a depth map into ordinal layers.
///
/// Returns `None` when fewer than two usable histogram peaks exist.
pub fn find_and_group_peaks(depth: &Array2<f32>, config: &DepthConfig) -> Option<DepthLayers> {
    let values: Vec<f64> = depth.iter().map(|&v| v as f64).filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }

    let (counts, edges) = histogram(&values, config.bins);
    let hist_median = match median(&counts) {
        m if m > 0.0 => m,
        _ => 1.0,
    };
    let hist: Vec<f64> = counts.iter().map(|c| c / hist_median).collect();
    let mass: f64 = hist.iter().sum();

    // A leading zero bin lets the first real bin register as a peak
    let mut padded = Vec::with_capacity(hist.len() + 1);
    padded.push(0.0);
    padded.extend_from_slice(&hist);

    let candidates = local_maxima(&padded);
    let candidate_prominences = prominences(&padded, &candidates);
    let min_prominence = mass * config.prominence_factor;
    let min_height = mass * config.min_size_factor;

    let mut peaks: Vec<(usize, f64)> = candidates
        .iter()
        .zip(&candidate_prominences)
        .filter(|(_, &p)| p >= min_prominence)
        .map(|(&i, &p)| (i - 1, p))
        .filter(|&(i, _)| hist[i] > min_height)
        .collect();

    debug!("Depth histogram: {} candidate peaks, {} kept", candidates.len(), peaks.len());
    if peaks.len() < 2 {
        return None;
    }

    if peaks.len() > config.max_peaks_to_consider {
        peaks.sort_by(|a, b| b.1.total_cmp(&a.1).then(b.0.cmp(&a.0)));
        peaks.truncate(config.max_peaks_to_consider);
        peaks.sort_by_key(|&(i, _)| i);
    }
    let mut peaks: Vec<usize> = peaks.into_iter().map(|(i, _)| i).collect();

    while peaks.len() > 2 {
        let relative = relative_prominences(&peaks, &hist);
        let (weakest, lowest) = relative
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::INFINITY), |best, (i, v)| if v < best.1 { (i, v) } else { best });
        if lowest > config.valley_threshold_ratio {
            break;
        }
        peaks.remove(weakest);
    }

    let thresholds: Vec<f64> = peaks
        .windows(2)
        .map(|pair| edges[(pair[0] + pair[1]) / 2])
        .collect();
    debug!("Depth layers: peaks at bins {:?}, thresholds {:?}", peaks, thresholds);

    let layers = depth.mapv(|v| {
        let v = v as f64;
        thresholds.iter().filter(|&&t| v > t).count() as u32
    });

    Some(DepthLayers { layers, thresholds })
}

/// numpy-style percentile with linear interpolation over sorted values
fn percentile(sorted: &[u32], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let (a, b) = (sorted[lo] as f64, sorted[hi] as f64);
    a + (b - a) * (rank - lo as f64)
}

/// Layer values under a mask; masks at a different resolution are sampled nearest-neighbour
fn layers_under_mask(mask: &Mask, layers: &Array2<u32>) -> Vec<u32> {
    let (rows, cols) = mask.dim();
    let (layer_rows, layer_cols) = layers.dim();

    if (rows, cols) == (layer_rows, layer_cols) {
        return mask
            .iter()
            .zip(layers.iter())
            .filter(|(&m, _)| m)
            .map(|(_, &l)| l)
            .collect();
    }

    mask.indexed_iter()
        .filter(|(_, &m)| m)
        .map(|((r, c), _)| {
            let lr = (r * layer_rows / rows).min(layer_rows - 1);
            let lc = (c * layer_cols / cols).min(layer_cols - 1);
            layers[[lr, lc]]
        })
        .collect()
}

/// Assigns depth layers to merged objects
pub struct DepthCalculator<'a> {
    config: &'a DepthConfig,
}

impl<'a> DepthCalculator<'a> {
    pub fn new(config: &'a DepthConfig) -> Self {
        Self { config }
    }

    /// Discretize `depth` and set each object's `depths`.
    ///
    /// Empty masks fall back to the object's box. Without usable layers every
    /// object ends up depth-less.
    pub fn assign(&self, depth: &Array2<f32>, objects: &mut [SceneObject]) -> Option<DepthLayers> {
        let grouped = find_and_group_peaks(depth, self.config);
        match &grouped {
            Some(layers) => self.assign_layers(layers, objects),
            None => {
                warn!("Depth map has no separable layers; continuing without depth");
                for object in objects.iter_mut() {
                    object.depths.clear();
                }
            }
        }
        grouped
    }

    pub fn assign_layers(&self, layers: &DepthLayers, objects: &mut [SceneObject]) {
        let map = layers.layers();
        let (rows, cols) = map.dim();
        let max_layer = layers.max_layer();

        for object in objects.iter_mut() {
            let mut values = match object.mask.as_ref().filter(|m| mask_area(m) > 0) {
                Some(mask) => layers_under_mask(mask, map),
                None => {
                    warn!("Mask of '{}' is empty, using its bounding box for depth", object.label);
                    layers_under_mask(&box_mask(&object.bbox, rows, cols), map)
                }
            };

            if values.is_empty() {
                object.depths.clear();
                continue;
            }

            values.sort_unstable();
            let lower = percentile(&values, self.config.lower_percentile).round() as u32;
            let upper = percentile(&values, self.config.upper_percentile).round() as u32;

            let mut depths: Vec<u32> = values
                .iter()
                .map(|&v| max_layer - v.clamp(lower, upper))
                .collect();
            depths.sort_unstable();
            depths.dedup();
            object.depths = depths;
        }
    }
}
