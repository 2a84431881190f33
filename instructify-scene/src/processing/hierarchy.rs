//! Containment forest construction
//!
//! Object `i` lies inside object `j` when enough of `i`'s mask falls inside
//! `j`'s mask, `i`'s box is strictly smaller, their primary labels differ and
//! their depth ranges are compatible. The strict area ordering makes the
//! relation acyclic, so the forest is built without cycle checks.

use crate::config::HierarchyConfig;
use crate::object::{depths_compatible, SceneObject};
use crate::processing::mask::contained_in;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

/// `M[[i, j]]` is true when object `i` is inside object `j`
pub type ContainmentMatrix = Array2<bool>;

/// Compute the containment matrix, one row per worker
pub fn containment_matrix(objects: &[SceneObject], config: &HierarchyConfig) -> ContainmentMatrix {
    let n = objects.len();
    let rows: Vec<Vec<bool>> = (0..n)
        .into_par_iter()
        .map(|i| (0..n).map(|j| is_contained(&objects[i], &objects[j], i, j, config)).collect())
        .collect();

    let mut matrix = ContainmentMatrix::from_elem((n, n), false);
    for (i, row) in rows.into_iter().enumerate() {
        for (j, cell) in row.into_iter().enumerate() {
            matrix[[i, j]] = cell;
        }
    }
    matrix
}

fn is_contained(inner: &SceneObject, outer: &SceneObject, i: usize, j: usize, config: &HierarchyConfig) -> bool {
    if i == j || inner.primary_label() == outer.primary_label() {
        return false;
    }
    if !depths_compatible(inner.depth_range(), outer.depth_range(), config.depth_grace) {
        return false;
    }
    if inner.bbox.area() >= outer.bbox.area() {
        return false;
    }

    let score = match (&inner.mask, &outer.mask) {
        (Some(a), Some(b)) => contained_in(a, b),
        _ => 0.0,
    };
    score > config.mask_containment_threshold
}

/// Containment forest over an arena of objects.
///
/// Node ids are indices into `objects`; every object is either a root or the
/// child of exactly one parent.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    objects: Vec<SceneObject>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl Hierarchy {
    /// Build the forest.
    ///
    /// Roots are the objects inside nothing, visited in ascending index order.
    /// From each root a depth-first walk claims every unclaimed object inside
    /// the current node, scanning candidates in ascending index order. An
    /// object inside several containers goes to the first one reached.
    pub fn build(objects: Vec<SceneObject>, config: &HierarchyConfig) -> Self {
        let n = objects.len();
        let matrix = containment_matrix(&objects, config);

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut roots = Vec::new();
        let mut claimed = vec![false; n];

        for root in 0..n {
            let inside_something = matrix.row(root).iter().any(|&c| c);
            if inside_something || claimed[root] {
                continue;
            }
            claimed[root] = true;
            roots.push(root);

            // (node, next candidate index)
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
            while let Some(frame) = stack.last_mut() {
                let (parent, start) = *frame;
                let next = (start..n).find(|&i| matrix[[i, parent]] && !claimed[i]);
                match next {
                    Some(child) => {
                        frame.1 = child + 1;
                        claimed[child] = true;
                        children[parent].push(child);
                        stack.push((child, 0));
                    }
                    None => {
                        stack.pop();
                    }
                }
            }
        }

        debug!("Hierarchy: {} objects, {} roots", n, roots.len());
        Self {
            objects,
            children,
            roots,
        }
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn children(&self, id: usize) -> &[usize] {
        &self.children[id]
    }

    pub fn object(&self, id: usize) -> &SceneObject {
        &self.objects[id]
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Node ids in pre-order: each root, then its subtree, children in order
    pub fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.objects.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children[id].iter().rev());
        }
        order
    }

    pub fn into_objects(self) -> Vec<SceneObject> {
        self.objects
    }
}
