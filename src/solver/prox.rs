//! Proximal operators for the fusion penalty.
//!
//! Both operators act in place on the stacked prox argument, one edge block
//! at a time, with the per-edge threshold σᵢ = wᵢ·γ/ρ. The group (L2)
//! variant zeroes a whole block at once — an all-or-nothing fusion — while
//! the elementwise (L1) variant can zero individual coordinates, so a block
//! only counts as fused once every coordinate has been thresholded away.
//!
//! Fusion detection downstream relies on thresholded blocks being *exactly*
//! zero, which both operators guarantee.

use crate::graph::EdgeGraph;

/// Group soft-threshold: per edge block, `y ← max(0, 1 − σᵢ/‖y‖₂)·y`.
pub(crate) fn prox_group_l2(y: &mut [f64], graph: &EdgeGraph, gamma: f64, rho: f64) {
    for i in 0..graph.num_edges() {
        let sigma = graph.weight(i) * gamma / rho;
        let block = &mut y[graph.block(i)];
        let norm = block.iter().map(|a| a * a).sum::<f64>().sqrt();
        if norm <= sigma {
            block.fill(0.0);
        } else {
            let scale = 1.0 - sigma / norm;
            for a in block.iter_mut() {
                *a *= scale;
            }
        }
    }
}

/// Elementwise soft-threshold: `yⱼ ← sign(yⱼ)·max(0, |yⱼ| − σᵢ)` within
/// each edge block.
pub(crate) fn prox_l1(y: &mut [f64], graph: &EdgeGraph, gamma: f64, rho: f64) {
    for i in 0..graph.num_edges() {
        let sigma = graph.weight(i) * gamma / rho;
        for a in &mut y[graph.block(i)] {
            let shrunk = a.abs() - sigma;
            *a = if shrunk > 0.0 { a.signum() * shrunk } else { 0.0 };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use approx::assert_abs_diff_eq;

    fn two_edge_graph(p: usize) -> EdgeGraph {
        EdgeGraph::new(
            3,
            p,
            vec![Edge::new(0, 1, 1.0), Edge::new(1, 2, 2.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_group_threshold_zeroes_small_blocks() {
        let graph = two_edge_graph(2);
        // Block 0 has norm 5, block 1 has norm 0.1.
        let mut y = vec![3.0, 4.0, 0.1, 0.0];
        prox_group_l2(&mut y, &graph, 1.0, 1.0);

        // sigma_0 = 1: shrink by (1 - 1/5).
        assert_abs_diff_eq!(y[0], 2.4, epsilon = 1e-12);
        assert_abs_diff_eq!(y[1], 3.2, epsilon = 1e-12);
        // sigma_1 = 2 > 0.1: exact zero, not merely small.
        assert_eq!(y[2], 0.0);
        assert_eq!(y[3], 0.0);
    }

    #[test]
    fn test_group_threshold_keeps_zero_blocks_zero() {
        let graph = two_edge_graph(2);
        let mut y = vec![0.0, 0.0, 0.0, 0.0];
        prox_group_l2(&mut y, &graph, 0.5, 1.0);
        assert!(y.iter().all(|&a| a == 0.0));
    }

    #[test]
    fn test_elementwise_threshold_per_coordinate() {
        let graph = two_edge_graph(3);
        let mut y = vec![-1.0, 0.2, 0.05, 1.0, -1.0, 1.0];
        prox_l1(&mut y, &graph, 0.1, 1.0);

        // sigma_0 = 0.1: large coordinates shrink, the small one vanishes.
        assert_abs_diff_eq!(y[0], -0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(y[1], 0.1, epsilon = 1e-12);
        assert_eq!(y[2], 0.0);
        // sigma_1 = 0.2.
        assert_abs_diff_eq!(y[3], 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(y[4], -0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(y[5], 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_thresholds_scale_with_gamma_over_rho() {
        let graph = two_edge_graph(1);
        let mut a = vec![1.0, 1.0];
        let mut b = vec![1.0, 1.0];
        prox_l1(&mut a, &graph, 0.4, 1.0);
        prox_l1(&mut b, &graph, 0.8, 2.0);
        assert_eq!(a, b);
    }
}
