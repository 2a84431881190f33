//! Scene processing passes: masks, merging, depth layers and containment

pub mod depth;
pub mod hierarchy;
pub mod mask;
pub mod merge;

pub use depth::{find_and_group_peaks, DepthCalculator, DepthLayers};
pub use hierarchy::{containment_matrix, ContainmentMatrix, Hierarchy};
pub use mask::Mask;
pub use merge::{merge_labels, BoxMerger, MergedBox};
