//! Dendrogram assembly from a smoothed fusion path.
//!
//! A smoothed path fuses one edge per column, but not every fused edge is
//! a merge: once two nodes already share a cluster, a later edge between
//! them closes a cycle and contributes nothing. Walking the path with a
//! union-find turns the edge sequence into the merge list of a dendrogram,
//! with the regularization level as merge height.
//!
//! Cluster ids follow the SciPy/MATLAB convention: leaves are 0..n−1 and
//! the i-th merge creates cluster n+i.

use petgraph::unionfind::UnionFind;

use crate::error::{Error, Result};
use crate::graph::EdgeGraph;
use crate::path::isp::InterpolatedPath;

/// A single merge in the dendrogram.
#[derive(Debug, Clone, Copy)]
pub struct Merge {
    /// First merged cluster id.
    pub cluster_a: usize,
    /// Second merged cluster id.
    pub cluster_b: usize,
    /// Regularization level at which the merge occurred.
    pub height: f64,
    /// Size of the resulting cluster.
    pub size: usize,
}

/// Merge history of a fusion path.
#[derive(Debug, Clone)]
pub struct Dendrogram {
    n_items: usize,
    merges: Vec<Merge>,
}

impl Dendrogram {
    /// Read the merge sequence off a smoothed path.
    ///
    /// For a fully fused path over a connected graph this yields n−1
    /// merges; disconnected graphs yield fewer, one tree per component.
    pub fn from_path(graph: &EdgeGraph, path: &InterpolatedPath) -> Result<Self> {
        let n = graph.n();
        if path.zeta_path.nrows() != graph.num_edges() {
            return Err(Error::DimensionMismatch {
                expected: graph.num_edges(),
                found: path.zeta_path.nrows(),
            });
        }

        let mut uf = UnionFind::<usize>::new(n);
        // Current cluster id and size, indexed by union-find root.
        let mut cluster_id: Vec<usize> = (0..n).collect();
        let mut cluster_size: Vec<usize> = vec![1; n];
        let mut merges = Vec::new();

        let mut prev = vec![0u8; graph.num_edges()];
        for k in 0..path.zeta_path.ncols() {
            for (i, e) in graph.edges().iter().enumerate() {
                if path.zeta_path[[i, k]] == 0 || prev[i] == 1 {
                    continue;
                }
                let root_a = uf.find(e.l);
                let root_b = uf.find(e.m);
                if root_a == root_b {
                    // Cycle-closing edge; the clusters are already one.
                    continue;
                }
                let merged_size = cluster_size[root_a] + cluster_size[root_b];
                let merge = Merge {
                    cluster_a: cluster_id[root_a],
                    cluster_b: cluster_id[root_b],
                    height: path.gamma_path[k],
                    size: merged_size,
                };
                uf.union(e.l, e.m);
                let root = uf.find(e.l);
                cluster_id[root] = n + merges.len();
                cluster_size[root] = merged_size;
                merges.push(merge);
            }
            for (i, p) in prev.iter_mut().enumerate() {
                *p = (*p).max(path.zeta_path[[i, k]]);
            }
        }

        Ok(Self { n_items: n, merges })
    }

    /// Number of original items.
    pub fn n_items(&self) -> usize {
        self.n_items
    }

    /// Number of merges recorded.
    pub fn n_merges(&self) -> usize {
        self.merges.len()
    }

    /// Merges in path order (non-decreasing height).
    pub fn merges(&self) -> impl Iterator<Item = &Merge> {
        self.merges.iter()
    }

    /// Merge heights, for cutting and plotting.
    pub fn heights(&self) -> Vec<f64> {
        self.merges.iter().map(|m| m.height).collect()
    }

    /// Cluster labels after applying every merge at height ≤ `height`.
    pub fn cut_at_height(&self, height: f64) -> Vec<usize> {
        let applied = self
            .merges
            .iter()
            .take_while(|m| m.height <= height)
            .count();
        self.cut_applying(applied)
    }

    /// Cluster labels for (at most) `k` clusters.
    ///
    /// Applies the first n−k merges; if the path never produced enough
    /// merges (a disconnected graph), more than `k` labels remain.
    pub fn cut_to_k(&self, k: usize) -> Vec<usize> {
        if k == 0 || k > self.n_items {
            return self.cut_applying(0);
        }
        self.cut_applying((self.n_items - k).min(self.merges.len()))
    }

    fn cut_applying(&self, count: usize) -> Vec<usize> {
        let mut parent: Vec<usize> = (0..self.n_items + count).collect();
        for (i, m) in self.merges.iter().take(count).enumerate() {
            let new_id = self.n_items + i;
            parent[m.cluster_a] = new_id;
            parent[m.cluster_b] = new_id;
        }

        let mut labels = Vec::with_capacity(self.n_items);
        for leaf in 0..self.n_items {
            let mut c = leaf;
            while parent[c] != c {
                c = parent[c];
            }
            labels.push(c);
        }
        renumber(labels)
    }
}

/// Flat cluster labels implied by one fusion indicator column.
///
/// Nodes joined by any fused edge share a label; untouched nodes keep
/// singleton labels. Labels are 0-based and consecutive, numbered by first
/// appearance in node order.
pub fn cluster_labels(graph: &EdgeGraph, zeta: &[u8]) -> Result<Vec<usize>> {
    if zeta.len() != graph.num_edges() {
        return Err(Error::DimensionMismatch {
            expected: graph.num_edges(),
            found: zeta.len(),
        });
    }

    let mut uf = UnionFind::<usize>::new(graph.n());
    for (i, e) in graph.edges().iter().enumerate() {
        if zeta[i] == 1 {
            uf.union(e.l, e.m);
        }
    }
    Ok(renumber(uf.into_labeling()))
}

fn renumber(raw: Vec<usize>) -> Vec<usize> {
    let mut next = 0usize;
    let mut map = std::collections::HashMap::new();
    raw.into_iter()
        .map(|r| {
            *map.entry(r).or_insert_with(|| {
                let label = next;
                next += 1;
                label
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use ndarray::{array, Array2};

    fn triangle_graph() -> EdgeGraph {
        EdgeGraph::new(
            3,
            1,
            vec![
                Edge::new(0, 1, 1.0),
                Edge::new(1, 2, 1.0),
                Edge::new(0, 2, 1.0),
            ],
        )
        .unwrap()
    }

    fn path_for(zeta: Array2<u8>, gamma: Vec<f64>) -> InterpolatedPath {
        let k = zeta.ncols();
        InterpolatedPath {
            u_path: Array2::zeros((3, k)),
            v_path: Array2::zeros((3, k)),
            zeta_path: zeta,
            gamma_path: gamma.into(),
        }
    }

    #[test]
    fn test_cycle_closing_edge_is_not_a_merge() {
        // Edges fuse one per column: (0,1), (1,2), then (0,2) which closes
        // the triangle.
        let path = path_for(
            array![[0u8, 1, 1, 1], [0, 0, 1, 1], [0, 0, 0, 1]],
            vec![0.0, 0.5, 0.8, 1.0],
        );
        let dendro = Dendrogram::from_path(&triangle_graph(), &path).unwrap();

        assert_eq!(dendro.n_items(), 3);
        assert_eq!(dendro.n_merges(), 2);
        assert_eq!(dendro.heights(), vec![0.5, 0.8]);

        let merges: Vec<_> = dendro.merges().collect();
        assert_eq!((merges[0].cluster_a, merges[0].cluster_b), (0, 1));
        // Second merge joins item 2 with the cluster created first.
        assert_eq!((merges[1].cluster_a, merges[1].cluster_b), (3, 2));
        assert_eq!(merges[1].size, 3);
    }

    #[test]
    fn test_cuts() {
        let path = path_for(
            array![[0u8, 1, 1, 1], [0, 0, 1, 1], [0, 0, 0, 1]],
            vec![0.0, 0.5, 0.8, 1.0],
        );
        let dendro = Dendrogram::from_path(&triangle_graph(), &path).unwrap();

        assert_eq!(dendro.cut_at_height(0.1), vec![0, 1, 2]);
        assert_eq!(dendro.cut_at_height(0.6), vec![0, 0, 1]);
        assert_eq!(dendro.cut_at_height(2.0), vec![0, 0, 0]);

        assert_eq!(dendro.cut_to_k(3), vec![0, 1, 2]);
        assert_eq!(dendro.cut_to_k(2), vec![0, 0, 1]);
        assert_eq!(dendro.cut_to_k(1), vec![0, 0, 0]);
    }

    #[test]
    fn test_cluster_labels_from_indicator() {
        let graph = EdgeGraph::new(
            4,
            1,
            vec![Edge::new(0, 1, 1.0), Edge::new(2, 3, 1.0)],
        )
        .unwrap();

        assert_eq!(cluster_labels(&graph, &[0, 0]).unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(cluster_labels(&graph, &[1, 0]).unwrap(), vec![0, 0, 1, 2]);
        assert_eq!(cluster_labels(&graph, &[1, 1]).unwrap(), vec![0, 0, 1, 1]);
        assert!(cluster_labels(&graph, &[1]).is_err());
    }
}
