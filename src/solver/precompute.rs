//! One-shot operator precomputation.
//!
//! The U-step solves (I + ρDᵀD)u = b every iteration, where D is the
//! |E|·p × n·p block differencing operator. D is never materialized: it is
//! applied implicitly from the edge list, and DᵀD collapses onto the node
//! index as the graph Laplacian L (the same ±1 pattern repeated across the
//! p coordinates of every block). Solving the full system is therefore
//! exactly solving the n×n matrix A = Iₙ + ρL against p right-hand sides.
//!
//! A is factored once with a sparse LU; the factor is reused by every
//! iteration of the run, which is what makes a one-step-per-level path
//! cheap in the first place.

use faer::linalg::solvers::Solve;
use faer::sparse::linalg::solvers::{Lu, SymbolicLu};
use faer::sparse::{SparseColMat, Triplet};
use faer::Mat;
use log::debug;

use crate::error::{Error, Result};
use crate::graph::EdgeGraph;

/// A fusion graph together with the factored U-step system matrix.
pub struct Precompute {
    graph: EdgeGraph,
    rho: f64,
    factor: Lu<usize, f64>,
}

impl Precompute {
    /// Assemble A = Iₙ + ρ·DᵀD and factor it.
    ///
    /// Fails with [`Error::LinAlg`] if the factorization does not go
    /// through; A is symmetric positive definite for any ρ > 0 and a
    /// well-formed edge list, so in practice this only fires on
    /// pathological weights upstream.
    pub fn factor(graph: EdgeGraph, rho: f64) -> Result<Self> {
        if !(rho > 0.0) || !rho.is_finite() {
            return Err(Error::InvalidInput {
                name: "rho",
                message: format!("augmented Lagrangian parameter must be positive, got {rho}"),
            });
        }

        let n = graph.n();
        let mut diagonal = vec![1.0f64; n];
        let mut triplets = Vec::with_capacity(n + 2 * graph.num_edges());
        for e in graph.edges() {
            diagonal[e.l] += rho;
            diagonal[e.m] += rho;
            triplets.push(Triplet::new(e.l, e.m, -rho));
            triplets.push(Triplet::new(e.m, e.l, -rho));
        }
        for (i, &d) in diagonal.iter().enumerate() {
            triplets.push(Triplet::new(i, i, d));
        }

        let a = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &triplets)
            .map_err(|e| Error::LinAlg(format!("system matrix assembly failed: {e:?}")))?;
        let symbolic = SymbolicLu::try_new(a.symbolic())
            .map_err(|e| Error::LinAlg(format!("symbolic LU failed: {e:?}")))?;
        let factor = Lu::try_new_with_symbolic(symbolic, a.as_ref())
            .map_err(|e| Error::LinAlg(format!("numeric LU failed: {e:?}")))?;

        debug!(
            "factored {n}×{n} fusion system ({} edges, rho = {rho})",
            graph.num_edges()
        );
        Ok(Self { graph, rho, factor })
    }

    /// The underlying fusion graph.
    pub fn graph(&self) -> &EdgeGraph {
        &self.graph
    }

    /// The augmented Lagrangian parameter the factor was built for.
    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// Apply D: per edge i, `out[block(i)] = u[l_i block] − u[m_i block]`.
    pub(crate) fn apply_d(&self, u: &[f64], out: &mut [f64]) {
        let p = self.graph.p();
        for i in 0..self.graph.num_edges() {
            let (bl, bm) = self.graph.endpoint_blocks(i);
            let dst = i * p;
            for k in 0..p {
                out[dst + k] = u[bl.start + k] - u[bm.start + k];
            }
        }
    }

    /// Apply Dᵀ: `out` is zeroed, then each edge block is added into its
    /// l-endpoint block and subtracted from its m-endpoint block.
    pub(crate) fn apply_dt(&self, v: &[f64], out: &mut [f64]) {
        let p = self.graph.p();
        out.fill(0.0);
        for i in 0..self.graph.num_edges() {
            let (bl, bm) = self.graph.endpoint_blocks(i);
            let src = i * p;
            for k in 0..p {
                out[bl.start + k] += v[src + k];
                out[bm.start + k] -= v[src + k];
            }
        }
    }

    /// Solve (I + ρDᵀD)·u = b for the stacked primal vector.
    ///
    /// `b` and `u_out` are node-major (node j's block at `j*p..(j+1)*p`);
    /// the solve runs the cached n×n factor over p right-hand sides.
    pub(crate) fn solve_blocks(&self, b: &[f64], u_out: &mut [f64]) {
        let n = self.graph.n();
        let p = self.graph.p();
        let mut rhs = Mat::<f64>::zeros(n, p);
        for j in 0..n {
            for k in 0..p {
                rhs[(j, k)] = b[j * p + k];
            }
        }
        self.factor.solve_in_place(rhs.as_mut());
        for j in 0..n {
            for k in 0..p {
                u_out[j * p + k] = rhs[(j, k)];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use approx::assert_abs_diff_eq;

    fn chain_graph() -> EdgeGraph {
        EdgeGraph::new(
            3,
            2,
            vec![Edge::new(0, 1, 1.0), Edge::new(1, 2, 1.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_difference_operator() {
        let pre = Precompute::factor(chain_graph(), 1.0).unwrap();
        let u = [1.0, 2.0, 10.0, 20.0, 100.0, 200.0];
        let mut v = [0.0; 4];
        pre.apply_d(&u, &mut v);
        assert_eq!(v, [-9.0, -18.0, -90.0, -180.0]);
    }

    #[test]
    fn test_transpose_is_adjoint() {
        // <Du, v> == <u, Dᵀv> for arbitrary vectors.
        let pre = Precompute::factor(chain_graph(), 1.0).unwrap();
        let u = [0.3, -1.2, 2.0, 0.7, -0.5, 1.1];
        let v = [1.0, -2.0, 0.25, 4.0];

        let mut du = [0.0; 4];
        pre.apply_d(&u, &mut du);
        let lhs: f64 = du.iter().zip(&v).map(|(a, b)| a * b).sum();

        let mut dtv = [0.0; 6];
        pre.apply_dt(&v, &mut dtv);
        let rhs: f64 = u.iter().zip(&dtv).map(|(a, b)| a * b).sum();

        assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_inverts_the_system() {
        // Verify the factor against a forward application of
        // u + rho * Dᵀ(D u), which needs no linear algebra backend.
        let rho = 2.5;
        let pre = Precompute::factor(chain_graph(), rho).unwrap();
        let u_true = [0.5, -1.0, 2.0, 3.0, -0.25, 1.5];

        let mut du = [0.0; 4];
        pre.apply_d(&u_true, &mut du);
        let mut dtdu = [0.0; 6];
        pre.apply_dt(&du, &mut dtdu);
        let b: Vec<f64> = u_true
            .iter()
            .zip(&dtdu)
            .map(|(u, d)| u + rho * d)
            .collect();

        let mut u = [0.0; 6];
        pre.solve_blocks(&b, &mut u);
        for (got, want) in u.iter().zip(u_true.iter()) {
            assert_abs_diff_eq!(got, want, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_rejects_non_positive_rho() {
        assert!(Precompute::factor(chain_graph(), 0.0).is_err());
        assert!(Precompute::factor(chain_graph(), -1.0).is_err());
    }
}
