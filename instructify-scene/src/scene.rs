//! Scene description rendering
//!
//! Turns a containment forest into indented text. Siblings are ordered by
//! mask size then depth, bucketed by object type, and same-typed siblings
//! that sit close together are described as one group.
//!
//! A group whose members have children is written as a braced block. Its
//! members are indented one level below the group line and carry the same
//! `-> ` marker as any other nested line.

use crate::config::FormatConfig;
use crate::label::LabelInflector;
use crate::object::{depths_compatible, SceneObject};
use crate::processing::hierarchy::Hierarchy;
use crate::processing::mask::{mask_center, pixel_percentage};
use instructify_core::{BoundingBox, ImageAnnotations};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt::Write;

/// Depth grace used when grouping siblings
const GROUP_DEPTH_GRACE: u32 = 1;

const LISTING_PREAMBLE: &str = "Objects and text are formatted as [label, x1, y1, x2, y2] coordinates, \
where x ranges from 0 (left) to 1 (right) and y from 0 (bottom) to 1 (top). \
Where OCR results are given, it may contain errors and inconsistencies.";

/// Renders a [`Hierarchy`] as a nested description followed by object counts
pub struct HierarchyFormatter<'a> {
    config: &'a FormatConfig,
    inflector: &'a dyn LabelInflector,
    include_box_label: bool,
}

impl<'a> HierarchyFormatter<'a> {
    pub fn new(config: &'a FormatConfig, inflector: &'a dyn LabelInflector) -> Self {
        Self {
            config,
            inflector,
            include_box_label: true,
        }
    }

    /// When false, single objects render as their bare label
    pub fn include_box_label(mut self, include: bool) -> Self {
        self.include_box_label = include;
        self
    }

    pub fn format(&self, hierarchy: &Hierarchy) -> String {
        let mut text = self.format_level(hierarchy, hierarchy.roots(), 0);

        let counts = self.count_types(hierarchy);
        if !counts.is_empty() {
            text.push_str("\n\nObject Counts:");
            for (plural, count) in counts {
                let _ = write!(text, "\n\t{}: {}", plural, count);
            }
        }
        text
    }

    /// Singular object types named by a label, ignoring the alias list
    pub fn label_types(&self, label: &str) -> Vec<String> {
        let primary = label.split('(').next().unwrap_or(label);
        primary
            .split(',')
            .map(|part| self.inflector.to_singular(part.trim()))
            .collect()
    }

    /// Pluralized type counts over the whole forest in first-seen order
    fn count_types(&self, hierarchy: &Hierarchy) -> Vec<(String, usize)> {
        let mut singular: Vec<(String, usize)> = Vec::new();
        for id in hierarchy.preorder() {
            for type_ in self.label_types(&hierarchy.object(id).label) {
                match singular.iter_mut().find(|(t, _)| *t == type_) {
                    Some((_, count)) => *count += 1,
                    None => singular.push((type_, 1)),
                }
            }
        }

        let mut plural: Vec<(String, usize)> = Vec::with_capacity(singular.len());
        for (type_, count) in singular {
            let name = self.inflector.to_plural(&type_);
            match plural.iter_mut().find(|(p, _)| *p == name) {
                Some((_, total)) => *total += count,
                None => plural.push((name, count)),
            }
        }
        plural
    }

    fn format_level(&self, hierarchy: &Hierarchy, ids: &[usize], level: usize) -> String {
        if ids.is_empty() {
            return String::new();
        }

        let ordered = sort_siblings(hierarchy, ids);

        // type buckets in first-seen order; a node sits in each bucket once
        let mut buckets: Vec<(String, Vec<usize>)> = Vec::new();
        for &id in &ordered {
            for type_ in self.label_types(&hierarchy.object(id).label) {
                match buckets.iter_mut().find(|(t, _)| *t == type_) {
                    Some((_, members)) => {
                        if !members.contains(&id) {
                            members.push(id);
                        }
                    }
                    None => buckets.push((type_, vec![id])),
                }
            }
        }

        let indent = indent(level);
        let mut processed: HashSet<usize> = HashSet::with_capacity(ordered.len());
        let mut items = Vec::new();

        for (type_, members) in &buckets {
            let nodes: Vec<usize> = members
                .iter()
                .copied()
                .filter(|id| !processed.contains(id))
                .collect();

            for group in self.spatial_groups(hierarchy, &nodes) {
                if group.len() == 1 {
                    items.push(self.format_single(hierarchy, group[0], level));
                } else {
                    let plural = self.inflector.to_plural(type_);
                    let count = self.count_descriptor(hierarchy, &group, type_, &plural);

                    if group.iter().all(|&id| hierarchy.children(id).is_empty()) {
                        items.push(self.format_aggregate(hierarchy, &group, &indent, &count, &plural));
                    } else {
                        let mut block = format!("{}{} ({}) {{\n", indent, count, plural);
                        for &id in &group {
                            block.push_str(&self.format_single(hierarchy, id, level + 1));
                            block.push('\n');
                        }
                        block.push_str(&indent);
                        block.push('}');
                        items.push(block);
                    }
                }
                for id in group {
                    processed.insert(id);
                }
            }
        }

        items.join("\n\n")
    }

    /// A node joins the first group whose every member is depth-compatible
    /// and positionally close to it
    fn spatial_groups(&self, hierarchy: &Hierarchy, nodes: &[usize]) -> Vec<Vec<usize>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for &id in nodes {
            let object = hierarchy.object(id);
            let home = groups.iter_mut().find(|group| {
                group.iter().all(|&member| {
                    let other = hierarchy.object(member);
                    depths_compatible(object.depth_range(), other.depth_range(), GROUP_DEPTH_GRACE)
                        && position_close(&object.bbox, &other.bbox, self.config.position_threshold)
                })
            });
            match home {
                Some(group) => group.push(id),
                None => groups.push(vec![id]),
            }
        }
        groups
    }

    fn count_descriptor(&self, hierarchy: &Hierarchy, group: &[usize], type_: &str, plural: &str) -> String {
        if group.len() > self.config.max_count_claim {
            return "many".to_string();
        }
        if group.iter().any(|&id| hierarchy.object(id).label.contains(plural)) {
            return "several".to_string();
        }
        if self.config.uncountable.iter().any(|u| type_.contains(u.as_str())) {
            return "several".to_string();
        }
        group.len().to_string()
    }

    fn format_single(&self, hierarchy: &Hierarchy, id: usize, level: usize) -> String {
        let indent = indent(level);
        let line = self.format_node(hierarchy.object(id));
        let children = hierarchy.children(id);

        if children.is_empty() {
            format!("{}{} X", indent, line)
        } else {
            format!("{}{}, with:\n{}", indent, line, self.format_level(hierarchy, children, level + 1))
        }
    }

    /// One object line: `label [box] [X: x, Y: y, Pixel Size: p%, Relative Depths: d]`
    pub fn format_node(&self, object: &SceneObject) -> String {
        if !self.include_box_label {
            return object.label.clone();
        }

        let (x, y, size) = measurements(object);
        let mut fields = format!(
            "X: {:.2}, Y: {:.2}, Pixel Size: {:.1}%",
            self.round(x),
            self.round(y),
            self.round(size)
        );
        if !object.depths.is_empty() {
            let depths: Vec<String> = object.depths.iter().map(|d| d.to_string()).collect();
            let _ = write!(fields, ", Relative Depths: {}", depths.join(", "));
        }

        format!("{} {}[{}]", object.label, self.box_text(&object.bbox), fields)
    }

    fn format_aggregate(&self, hierarchy: &Hierarchy, group: &[usize], indent: &str, count: &str, plural: &str) -> String {
        let n = group.len() as f64;
        let (mut sum_x, mut sum_y, mut sum_size) = (0.0, 0.0, 0.0);
        for &id in group {
            let (x, y, size) = measurements(hierarchy.object(id));
            sum_x += x;
            sum_y += y;
            sum_size += size;
        }

        let region = group
            .iter()
            .map(|&id| hierarchy.object(id).bbox)
            .reduce(|a, b| a.union(&b));
        let region_text = region.map(|r| self.box_text(&r)).unwrap_or_default();

        format!(
            "{}{} ({}) {}[Average X: {:.2}, Average Y: {:.2}, Average Pixel Size: {:.1}%]",
            indent,
            count,
            plural,
            region_text,
            self.round(sum_x / n),
            self.round(sum_y / n),
            sum_size / n
        )
    }

    /// `"[x1, y1, x2, y2] "` with y flipped, or nothing when box coordinates are off
    fn box_text(&self, bbox: &BoundingBox) -> String {
        if !self.config.include_box_coords {
            return String::new();
        }
        let b = bbox.flipped_y();
        format!(
            "[{:.2}, {:.2}, {:.2}, {:.2}] ",
            self.round(b.x1),
            self.round(b.y1),
            self.round(b.x2),
            self.round(b.y2)
        )
    }

    fn round(&self, value: f64) -> f64 {
        round_to(value, self.config.coordinate_precision)
    }
}

/// Round to the nearest multiple of `precision`, ties to even
pub fn round_to(value: f64, precision: f64) -> f64 {
    // + 0.0 turns a negative zero into zero
    (value / precision).round_ties_even() * precision + 0.0
}

/// Center `(x, y)` with y flipped, and pixel percentage
fn measurements(object: &SceneObject) -> (f64, f64, f64) {
    let size = object.mask.as_ref().map(pixel_percentage).unwrap_or(0.0);
    match object.mask.as_ref().and_then(mask_center) {
        Some((x, y)) => (x, 1.0 - y, size),
        None => {
            let (cx, cy) = object.bbox.center();
            (cx, 1.0 - cy, 0.0)
        }
    }
}

fn indent(level: usize) -> String {
    let mut indent = "    ".repeat(level);
    if level > 0 {
        indent.push_str("-> ");
    }
    indent
}

/// Larger masks first, maskless objects last, then nearer first
fn sort_siblings(hierarchy: &Hierarchy, ids: &[usize]) -> Vec<usize> {
    let mut keyed: Vec<(usize, Option<usize>, f64)> = ids
        .iter()
        .map(|&id| {
            let object = hierarchy.object(id);
            (id, object.mask_area(), object.mean_depth())
        })
        .collect();

    keyed.sort_by(|a, b| {
        let by_size = match (a.1, b.1) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_size.then(a.2.total_cmp(&b.2))
    });
    keyed.into_iter().map(|(id, _, _)| id).collect()
}

/// Boxes overlap, or a pair of facing edges is within `threshold` on either axis
pub fn position_close(a: &BoundingBox, b: &BoundingBox, threshold: f64) -> bool {
    if a.overlaps(b) {
        return true;
    }
    let x_gap = (a.x1 - b.x2).abs().min((a.x2 - b.x1).abs());
    let y_gap = (a.y1 - b.y2).abs().min((a.y2 - b.y1).abs());
    x_gap <= threshold || y_gap <= threshold
}

/// List every dataset's raw boxes as `[label, x1, y1, x2, y2]` with y flipped.
///
/// Datasets without boxes are skipped; returns an empty string when nothing is listed.
pub fn format_annotation_listing(annotations: &ImageAnnotations) -> String {
    let mut lines: Vec<String> = Vec::new();
    for (dataset, data) in annotations {
        if data.bboxes.is_empty() {
            continue;
        }
        lines.push(format!("\n=== {} OCR ===", dataset));
        for det in &data.bboxes {
            let b = det.bbox.flipped_y();
            lines.push(format!(
                "[{}, {:.2}, {:.2}, {:.2}, {:.2}]",
                det.labels.join(", "),
                b.x1,
                b.y1,
                b.x2,
                b.y2
            ));
        }
    }

    if lines.is_empty() {
        return String::new();
    }
    format!("{}{}\n=== End of OCR ===", LISTING_PREAMBLE, lines.join("\n"))
}
