//! # arpath
//!
//! Algorithmic regularization paths for convex clustering (CARP) and
//! convex biclustering (CBASS).
//!
//! Instead of solving the convex clustering problem to optimality at a
//! grid of regularization levels, the kernels here take a single ADMM step
//! per level while the level grows geometrically, recording every iterate
//! at which the set of fused edges changes. The recorded path is then
//! smoothed into a monotone one-fusion-per-event sequence and read off as
//! a dendrogram.
//!
//! ```no_run
//! use arpath::{
//!     interpolate_carp, run_carp, CancelToken, CarpConfig, Dendrogram, Edge, EdgeGraph,
//! };
//!
//! # fn main() -> arpath::Result<()> {
//! // Three 1-D observations on a line, complete fusion graph.
//! let x = vec![-1.0, 0.0, 1.0];
//! let graph = EdgeGraph::new(
//!     3,
//!     1,
//!     vec![Edge::new(0, 1, 1.0), Edge::new(1, 2, 1.0), Edge::new(0, 2, 1.0)],
//! )?;
//! let v_init = vec![-1.0, -1.0, -2.0]; // D · x
//!
//! let path = run_carp(&x, &graph, &x, &v_init, &CarpConfig::new(), &CancelToken::new())?;
//! let smoothed = interpolate_carp(&path)?;
//! let dendro = Dendrogram::from_path(&graph, &smoothed)?;
//! assert_eq!(dendro.n_merges(), 2);
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod error;
pub mod graph;
pub mod path;
pub mod solver;


pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use graph::{Edge, EdgeGraph};
pub use path::{cluster_labels, Dendrogram, InterpolatedPath, Merge};
pub use path::{interpolate, interpolate_carp, interpolate_cbass};
pub use solver::{
    run_carp, run_cbass, CarpConfig, CarpPath, CbassOperators, CbassPath, MultiMergeEvent,
    Penalty, Precompute, Status, Variant,
};
