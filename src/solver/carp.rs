//! The clustering kernel (CARP).
//!
//! One ADMM sweep per regularization level over the observation fusion
//! graph. The primal u is the stacked centroid matrix (column-major p×n),
//! the split v holds one p-block per edge with the fixed-point semantics
//! vᵢ = u_lᵢ − u_mᵢ, and the scaled dual z enforces Du = v. An edge is
//! fused exactly when its v-block is identically zero, which the proximal
//! operators produce as exact zeros rather than small numbers.

use log::debug;
use ndarray::{Array1, Array2};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::graph::EdgeGraph;
use crate::solver::buffer::PathBuffer;
use crate::solver::drive::{drive_plain, drive_viz, FusionKernel};
use crate::solver::precompute::Precompute;
use crate::solver::prox::{prox_group_l2, prox_l1};
use crate::solver::{CarpConfig, Penalty, Status, Variant};

/// A recorded clustering path.
///
/// All four path objects share the column count K: column k of `u_path`
/// (n·p rows), `v_path` (|E|·p rows), and `zeta_path` (|E| rows) is the
/// iterate recorded at level `gamma_path[k]`. Column 0 is the initial
/// iterate.
#[derive(Debug, Clone)]
pub struct CarpPath {
    /// Primal iterates, n·p × K.
    pub u_path: Array2<f64>,
    /// Split iterates, |E|·p × K.
    pub v_path: Array2<f64>,
    /// Fusion indicators, |E| × K, entries 0/1.
    pub zeta_path: Array2<u8>,
    /// Regularization level per column, non-decreasing.
    pub gamma_path: Array1<f64>,
    /// How the run ended.
    pub status: Status,
}

/// Fusion scan in natural edge order: ζᵢ = 1 iff edge i's block of `v` has
/// zero squared mass (L2) or zero absolute mass (L1). Returns the fused
/// count.
pub(crate) fn scan_fusions(
    graph: &EdgeGraph,
    penalty: Penalty,
    v: &[f64],
    zeta: &mut [u8],
) -> usize {
    let mut nzeros = 0usize;
    for i in 0..graph.num_edges() {
        let block = &v[graph.block(i)];
        let mass: f64 = match penalty {
            Penalty::L2 => block.iter().map(|a| a * a).sum(),
            Penalty::L1 => block.iter().map(|a| a.abs()).sum(),
        };
        zeta[i] = u8::from(mass == 0.0);
        nzeros += usize::from(zeta[i]);
    }
    nzeros
}

pub(crate) struct CarpSnapshot {
    u: Vec<f64>,
    v: Vec<f64>,
    z: Vec<f64>,
    zeta: Vec<u8>,
    zeta_prev: Vec<u8>,
    nzeros: usize,
    nzeros_prev: usize,
}

struct CarpKernel<'a> {
    pre: &'a Precompute,
    x: &'a [f64],
    penalty: Penalty,
    rho: f64,
    u: Vec<f64>,
    v: Vec<f64>,
    z: Vec<f64>,
    // Scratch reused every sweep.
    edge_scratch: Vec<f64>,
    du: Vec<f64>,
    rhs: Vec<f64>,
    zeta: Vec<u8>,
    zeta_prev: Vec<u8>,
    nzeros: usize,
    nzeros_prev: usize,
    u_path: PathBuffer<f64>,
    v_path: PathBuffer<f64>,
    zeta_path: PathBuffer<u8>,
    gamma_path: Vec<f64>,
}

impl<'a> CarpKernel<'a> {
    fn new(
        pre: &'a Precompute,
        x: &'a [f64],
        u_init: &[f64],
        v_init: &[f64],
        config: &CarpConfig,
    ) -> Self {
        let graph = pre.graph();
        let (u_len, v_len) = (graph.u_len(), graph.v_len());
        let num_edges = graph.num_edges();
        Self {
            pre,
            x,
            penalty: config.penalty,
            rho: config.rho,
            u: u_init.to_vec(),
            v: v_init.to_vec(),
            // The scaled dual starts at the initial split variable.
            z: v_init.to_vec(),
            edge_scratch: vec![0.0; v_len],
            du: vec![0.0; v_len],
            rhs: vec![0.0; u_len],
            // We begin with no fusions, whatever v_init looks like.
            zeta: vec![0; num_edges],
            zeta_prev: vec![0; num_edges],
            nzeros: 0,
            nzeros_prev: 0,
            u_path: PathBuffer::new(u_len, graph.n()),
            v_path: PathBuffer::new(v_len, graph.n()),
            zeta_path: PathBuffer::new(num_edges, graph.n()),
            gamma_path: Vec::new(),
        }
    }

    fn finish(self, status: Status) -> CarpPath {
        CarpPath {
            u_path: self.u_path.into_compact(),
            v_path: self.v_path.into_compact(),
            zeta_path: self.zeta_path.into_compact(),
            gamma_path: Array1::from_vec(self.gamma_path),
            status,
        }
    }
}

impl FusionKernel for CarpKernel<'_> {
    type Snapshot = CarpSnapshot;

    fn step(&mut self, gamma: f64) {
        self.zeta_prev.copy_from_slice(&self.zeta);
        self.nzeros_prev = self.nzeros;

        // U-step: (I + ρDᵀD)u = x + Dᵀ(ρv − z).
        for i in 0..self.edge_scratch.len() {
            self.edge_scratch[i] = self.rho * self.v[i] - self.z[i];
        }
        self.pre.apply_dt(&self.edge_scratch, &mut self.rhs);
        for (r, &x) in self.rhs.iter_mut().zip(self.x) {
            *r += x;
        }
        self.pre.solve_blocks(&self.rhs, &mut self.u);

        // V-step: prox of Du + z/ρ with thresholds γ·w/ρ.
        self.pre.apply_d(&self.u, &mut self.du);
        for i in 0..self.v.len() {
            self.v[i] = self.du[i] + self.z[i] / self.rho;
        }
        match self.penalty {
            Penalty::L2 => prox_group_l2(&mut self.v, self.pre.graph(), gamma, self.rho),
            Penalty::L1 => prox_l1(&mut self.v, self.pre.graph(), gamma, self.rho),
        }

        // Z-step: z ← z + ρ(Du − v).
        for i in 0..self.z.len() {
            self.z[i] += self.rho * (self.du[i] - self.v[i]);
        }

        self.nzeros = scan_fusions(self.pre.graph(), self.penalty, &self.v, &mut self.zeta);
    }

    fn finite(&self) -> bool {
        self.u.iter().all(|a| a.is_finite())
            && self.v.iter().all(|a| a.is_finite())
            && self.z.iter().all(|a| a.is_finite())
    }

    fn nzeros(&self) -> usize {
        self.nzeros
    }

    fn total_edges(&self) -> usize {
        self.pre.graph().num_edges()
    }

    fn delta(&self) -> isize {
        self.nzeros as isize - self.nzeros_prev as isize
    }

    fn zeta_changed(&self) -> bool {
        self.zeta != self.zeta_prev
    }

    fn record(&mut self, gamma: f64) {
        self.u_path.push(&self.u);
        self.v_path.push(&self.v);
        self.zeta_path.push(&self.zeta);
        self.gamma_path.push(gamma);
    }

    fn columns(&self) -> usize {
        self.gamma_path.len()
    }

    fn save(&self) -> CarpSnapshot {
        CarpSnapshot {
            u: self.u.clone(),
            v: self.v.clone(),
            z: self.z.clone(),
            zeta: self.zeta.clone(),
            zeta_prev: self.zeta_prev.clone(),
            nzeros: self.nzeros,
            nzeros_prev: self.nzeros_prev,
        }
    }

    fn restore(&mut self, snapshot: CarpSnapshot) {
        self.u = snapshot.u;
        self.v = snapshot.v;
        self.z = snapshot.z;
        self.zeta = snapshot.zeta;
        self.zeta_prev = snapshot.zeta_prev;
        self.nzeros = snapshot.nzeros;
        self.nzeros_prev = snapshot.nzeros_prev;
    }
}

/// Track the convex clustering path over `graph`.
///
/// `x` is the data as a length n·p column-major vector, `u_init`/`v_init`
/// the initial primal and split iterates (typically x and D·x). The scaled
/// dual starts at `v_init`. Returns the recorded path; setup problems are
/// the only `Err` cases, everything later is a [`Status`].
pub fn run_carp(
    x: &[f64],
    graph: &EdgeGraph,
    u_init: &[f64],
    v_init: &[f64],
    config: &CarpConfig,
    cancel: &CancelToken,
) -> Result<CarpPath> {
    config.validate()?;
    for (name, len, expected) in [
        ("x", x.len(), graph.u_len()),
        ("u_init", u_init.len(), graph.u_len()),
        ("v_init", v_init.len(), graph.v_len()),
    ] {
        if len != expected {
            debug!("{name} has length {len}, expected {expected}");
            return Err(Error::DimensionMismatch {
                expected,
                found: len,
            });
        }
    }

    let pre = Precompute::factor(graph.clone(), config.rho)?;
    debug!(
        "carp: n = {}, p = {}, |E| = {}, variant = {:?}",
        graph.n(),
        graph.p(),
        graph.num_edges(),
        config.variant
    );

    let mut kernel = CarpKernel::new(&pre, x, u_init, v_init, config);
    let status = match config.variant {
        Variant::Plain => drive_plain(&mut kernel, config, cancel),
        Variant::Viz => drive_viz(&mut kernel, config, cancel),
    };
    Ok(kernel.finish(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;

    fn single_edge_setup() -> (Vec<f64>, EdgeGraph, Vec<f64>) {
        let x = vec![-1.0, 1.0];
        let graph = EdgeGraph::new(2, 1, vec![Edge::new(0, 1, 1.0)]).unwrap();
        let v_init = vec![-2.0];
        (x, graph, v_init)
    }

    #[test]
    fn test_two_points_fuse() {
        let (x, graph, v_init) = single_edge_setup();
        let config = CarpConfig::new()
            .with_gamma_init(1e-4)
            .with_t(1.1)
            .with_burn_in(5)
            .with_keep(1)
            .with_max_iter(2000);

        let path = run_carp(&x, &graph, &x, &v_init, &config, &CancelToken::new()).unwrap();
        assert_eq!(path.status, Status::Completed);

        let k = path.gamma_path.len();
        assert_eq!(path.u_path.dim(), (2, k));
        assert_eq!(path.v_path.dim(), (1, k));
        assert_eq!(path.zeta_path.dim(), (1, k));
        // Unfused at the start, fused at the end.
        assert_eq!(path.zeta_path[[0, 0]], 0);
        assert_eq!(path.zeta_path[[0, k - 1]], 1);
        // Fused column has an exactly-zero v block.
        assert_eq!(path.v_path[[0, k - 1]], 0.0);
    }

    #[test]
    fn test_burn_in_holds_gamma() {
        let (x, graph, v_init) = single_edge_setup();
        let config = CarpConfig::new()
            .with_gamma_init(1e-6)
            .with_burn_in(10)
            .with_keep(1)
            .with_max_iter(3000);

        let path = run_carp(&x, &graph, &x, &v_init, &config, &CancelToken::new()).unwrap();
        // Columns 0..=10 are the initial iterate plus the ten burn-in steps.
        for k in 0..=10 {
            assert_eq!(path.gamma_path[k], 1e-6);
        }
        // Non-decreasing afterwards.
        for k in 1..path.gamma_path.len() {
            assert!(path.gamma_path[k] >= path.gamma_path[k - 1]);
        }
    }

    #[test]
    fn test_rejects_mismatched_dimensions() {
        let (x, graph, v_init) = single_edge_setup();
        let config = CarpConfig::new();
        let cancel = CancelToken::new();
        assert!(run_carp(&x[..1], &graph, &x, &v_init, &config, &cancel).is_err());
        assert!(run_carp(&x, &graph, &[0.0; 3], &v_init, &config, &cancel).is_err());
        assert!(run_carp(&x, &graph, &x, &[0.0; 2], &config, &cancel).is_err());
    }

    #[test]
    fn test_empty_edge_set_completes_immediately() {
        let x = vec![1.0, 2.0];
        let graph = EdgeGraph::new(2, 1, vec![]).unwrap();
        let path = run_carp(&x, &graph, &x, &[], &CarpConfig::new(), &CancelToken::new()).unwrap();
        assert_eq!(path.status, Status::Completed);
        assert_eq!(path.gamma_path.len(), 1);
        assert_eq!(path.zeta_path.dim(), (0, 1));
    }
}
