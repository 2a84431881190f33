use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Axis-aligned box in normalized image coordinates.
///
/// Input annotations put the origin at the top-left corner; the y axis is only
/// flipped when text is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build from a top-left corner plus width and height
    pub fn from_xywh(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::new(x, y, x + w, y + h)
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Geometric center `(cx, cy)` in input orientation
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Smallest box covering both boxes
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        let left = self.x1.max(other.x1);
        let top = self.y1.max(other.y1);
        let right = self.x2.min(other.x2);
        let bottom = self.y2.min(other.y2);

        if right < left || bottom < top {
            return 0.0;
        }
        (right - left) * (bottom - top)
    }

    /// Intersection over union; 0 when the union is empty
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 || !union.is_finite() {
            return 0.0;
        }
        intersection / union
    }

    /// Whether the two boxes overlap or touch
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.x1 <= other.x2 && self.x2 >= other.x1 && self.y1 <= other.y2 && self.y2 >= other.y1
    }

    /// Scale to pixel space, truncating toward zero like an integer tensor cast
    pub fn to_pixels(&self, width: u32, height: u32) -> [i64; 4] {
        let (w, h) = (width as f64, height as f64);
        [
            (self.x1 * w) as i64,
            (self.y1 * h) as i64,
            (self.x2 * w) as i64,
            (self.y2 * h) as i64,
        ]
    }

    /// Same box with the y axis flipped so 0 is the image bottom
    pub fn flipped_y(&self) -> BoundingBox {
        BoundingBox::new(self.x1, 1.0 - self.y2, self.x2, 1.0 - self.y1)
    }

    pub fn validate(&self) -> Result<()> {
        let coords = [self.x1, self.y1, self.x2, self.y2];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(Error::InvalidInput(format!("non-finite box coordinates: {}", self)));
        }
        if self.x1 >= self.x2 || self.y1 >= self.y2 {
            return Err(Error::InvalidInput(format!("degenerate box: {}", self)));
        }
        Ok(())
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.3}, {:.3}, {:.3}, {:.3}]", self.x1, self.y1, self.x2, self.y2)
    }
}

/// Label slot of a raw detection: a single name or several names sharing one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelField {
    One(String),
    Many(Vec<String>),
}

impl LabelField {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            LabelField::One(label) => vec![label],
            LabelField::Many(labels) => labels,
        }
    }
}

/// One raw labeled box as delivered by a dataset adapter.
///
/// On the wire this is the array `[label_or_label_list, x1, y1, x2, y2]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDetectionRepr", into = "RawDetectionRepr")]
pub struct RawDetection {
    pub labels: Vec<String>,
    pub bbox: BoundingBox,
}

#[derive(Clone, Serialize, Deserialize)]
struct RawDetectionRepr(LabelField, f64, f64, f64, f64);

impl From<RawDetectionRepr> for RawDetection {
    fn from(RawDetectionRepr(labels, x1, y1, x2, y2): RawDetectionRepr) -> Self {
        Self {
            labels: labels.into_vec(),
            bbox: BoundingBox::new(x1, y1, x2, y2),
        }
    }
}

impl From<RawDetection> for RawDetectionRepr {
    fn from(det: RawDetection) -> Self {
        let labels = match det.labels.len() {
            1 => LabelField::One(det.labels[0].clone()),
            _ => LabelField::Many(det.labels),
        };
        RawDetectionRepr(labels, det.bbox.x1, det.bbox.y1, det.bbox.x2, det.bbox.y2)
    }
}

impl RawDetection {
    pub fn new(label: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            labels: vec![label.into()],
            bbox,
        }
    }

    pub fn with_labels<I, S>(labels: I, bbox: BoundingBox) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            bbox,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.labels.is_empty() || self.labels.iter().all(|l| l.trim().is_empty()) {
            return Err(Error::InvalidInput(format!(
                "detection at {} has no label",
                self.bbox
            )));
        }
        self.bbox.validate()
    }
}

/// Annotations contributed by one upstream dataset for one image.
/// Fields other than `bboxes` (captions, QA pairs) are ignored here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetAnnotations {
    #[serde(default)]
    pub bboxes: Vec<RawDetection>,
}

/// Per-image annotations keyed by dataset name; iteration is ordered by name.
pub type ImageAnnotations = BTreeMap<String, DatasetAnnotations>;

/// Concatenate the boxes of every dataset, in dataset-name order
pub fn aggregate_detections(annotations: &ImageAnnotations) -> Vec<RawDetection> {
    annotations
        .values()
        .flat_map(|dataset| dataset.bboxes.iter().cloned())
        .collect()
}
