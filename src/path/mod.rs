//! Path post-processing.
//!
//! The solver's raw output is an iteration trace; this module turns it
//! into the artifacts downstream consumers want: a smoothed one-fusion-
//! per-column path, a dendrogram merge list, and flat cluster labels.

mod dendrogram;
mod isp;

pub use dendrogram::{cluster_labels, Dendrogram, Merge};
pub use isp::{interpolate, interpolate_carp, interpolate_cbass, InterpolatedPath};
