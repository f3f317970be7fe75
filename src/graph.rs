//! The fusion graph.
//!
//! A fusion graph is a weighted edge list over `n` nodes, where each node
//! owns a contiguous block of `p` entries in the stacked primal vector and
//! each edge owns a contiguous block of `p` entries in the stacked split
//! vector. For clustering the nodes are observations (columns of the data
//! matrix); for the row direction of biclustering they are variables, with
//! the roles of `n` and `p` swapped.
//!
//! Edge order is the caller's order. It is also the tie-break order when
//! several edges fuse in the same iteration, so it is part of the contract
//! rather than an implementation detail.

use std::collections::HashSet;
use std::ops::Range;

use crate::error::{Error, Result};

/// A weighted fusion edge between two node indices, `l < m`, 0-based.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Smaller endpoint.
    pub l: usize,
    /// Larger endpoint.
    pub m: usize,
    /// Strictly positive fusion weight.
    pub weight: f64,
}

impl Edge {
    /// Create an edge. Validation happens in [`EdgeGraph::new`].
    pub fn new(l: usize, m: usize, weight: f64) -> Self {
        Self { l, m, weight }
    }
}

/// Validated fusion graph with per-edge and per-endpoint index maps.
#[derive(Debug, Clone)]
pub struct EdgeGraph {
    /// Number of nodes.
    n: usize,
    /// Block length per node (and per edge difference).
    p: usize,
    /// Edges in caller order.
    edges: Vec<Edge>,
}

impl EdgeGraph {
    /// Build a fusion graph over `n` nodes with block length `p`.
    ///
    /// Requires `n >= 1`, `p >= 1`, every edge `l < m < n` with a finite
    /// weight `> 0`, and no duplicate `(l, m)` pairs. Zero-weight edges must
    /// be dropped by the caller before construction.
    pub fn new(n: usize, p: usize, edges: Vec<Edge>) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidInput {
                name: "n",
                message: "need at least one node".to_string(),
            });
        }
        if p == 0 {
            return Err(Error::InvalidInput {
                name: "p",
                message: "block length must be at least 1".to_string(),
            });
        }

        let mut seen = HashSet::with_capacity(edges.len());
        for (i, e) in edges.iter().enumerate() {
            if e.l >= e.m || e.m >= n {
                return Err(Error::InvalidInput {
                    name: "edges",
                    message: format!("edge {i} ({}, {}) violates l < m < {n}", e.l, e.m),
                });
            }
            if !(e.weight > 0.0) || !e.weight.is_finite() {
                return Err(Error::InvalidInput {
                    name: "edges",
                    message: format!("edge {i} has non-positive weight {}", e.weight),
                });
            }
            if !seen.insert((e.l, e.m)) {
                return Err(Error::InvalidInput {
                    name: "edges",
                    message: format!("duplicate edge ({}, {})", e.l, e.m),
                });
            }
        }

        Ok(Self { n, p, edges })
    }

    /// Number of nodes.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Block length per node.
    pub fn p(&self) -> usize {
        self.p
    }

    /// Number of edges.
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Edges in their fixed order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Weight of edge `i`.
    pub fn weight(&self, i: usize) -> f64 {
        self.edges[i].weight
    }

    /// Edge weights, in edge order.
    pub fn weights(&self) -> impl Iterator<Item = f64> + '_ {
        self.edges.iter().map(|e| e.weight)
    }

    /// Length of the stacked primal vector, `n * p`.
    pub fn u_len(&self) -> usize {
        self.n * self.p
    }

    /// Length of the stacked split/dual vectors, `|E| * p`.
    pub fn v_len(&self) -> usize {
        self.edges.len() * self.p
    }

    /// Range of edge `i`'s block in the stacked split vector.
    pub fn block(&self, i: usize) -> Range<usize> {
        i * self.p..(i + 1) * self.p
    }

    /// Ranges of edge `i`'s endpoint blocks in the stacked primal vector.
    pub fn endpoint_blocks(&self, i: usize) -> (Range<usize>, Range<usize>) {
        let Edge { l, m, .. } = self.edges[i];
        (l * self.p..(l + 1) * self.p, m * self.p..(m + 1) * self.p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_maps() {
        let graph = EdgeGraph::new(
            3,
            2,
            vec![Edge::new(0, 1, 1.0), Edge::new(1, 2, 0.5)],
        )
        .unwrap();

        assert_eq!(graph.u_len(), 6);
        assert_eq!(graph.v_len(), 4);
        assert_eq!(graph.block(1), 2..4);
        assert_eq!(graph.endpoint_blocks(1), (2..4, 4..6));
    }

    #[test]
    fn test_rejects_bad_edges() {
        assert!(EdgeGraph::new(3, 1, vec![Edge::new(1, 1, 1.0)]).is_err());
        assert!(EdgeGraph::new(3, 1, vec![Edge::new(2, 1, 1.0)]).is_err());
        assert!(EdgeGraph::new(3, 1, vec![Edge::new(0, 3, 1.0)]).is_err());
        assert!(EdgeGraph::new(3, 1, vec![Edge::new(0, 1, 0.0)]).is_err());
        assert!(EdgeGraph::new(3, 1, vec![Edge::new(0, 1, -2.0)]).is_err());
        assert!(EdgeGraph::new(
            3,
            1,
            vec![Edge::new(0, 1, 1.0), Edge::new(0, 1, 2.0)]
        )
        .is_err());
    }

    #[test]
    fn test_rejects_degenerate_sizes() {
        assert!(EdgeGraph::new(0, 1, vec![]).is_err());
        assert!(EdgeGraph::new(1, 0, vec![]).is_err());
        assert!(EdgeGraph::new(1, 1, vec![]).is_ok());
    }
}
