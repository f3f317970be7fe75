//! The biclustering kernel (CBASS).
//!
//! Convex biclustering is one optimization problem whose primal is the
//! p×n means matrix, with fusion penalties attached along both axes: a
//! column direction over observation pairs (blocks of length p) and a row
//! direction over variable pairs (blocks of length n, read from the
//! transposed layout). Both directions share the primal U and the γ
//! schedule; each keeps its own split/dual pair and fusion indicator.
//!
//! The U-step back-solves through the two cached direction factors,
//! U = A_row⁻¹·B·A_col⁻¹ — the left and right solves commute, and the
//! composition stands in for the exact coupled operator in the same
//! one-inexact-step-per-level spirit as the rest of the method.

use log::debug;
use ndarray::{Array1, Array2};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::graph::{Edge, EdgeGraph};
use crate::solver::buffer::PathBuffer;
use crate::solver::carp::scan_fusions;
use crate::solver::drive::{drive_plain, drive_viz, FusionKernel};
use crate::solver::precompute::Precompute;
use crate::solver::prox::{prox_group_l2, prox_l1};
use crate::solver::{CarpConfig, Penalty, Status, Variant};

/// The two pre-factored direction operators for a biclustering run.
///
/// Factoring happens once, here; [`run_cbass`] only back-solves.
pub struct CbassOperators {
    row: Precompute,
    col: Precompute,
}

impl CbassOperators {
    /// Build and factor both direction systems for a p×n data matrix.
    ///
    /// `edges_row` connects variable (row) indices `< p`; `edges_col`
    /// connects observation (column) indices `< n`.
    pub fn factor(
        n: usize,
        p: usize,
        edges_row: Vec<Edge>,
        edges_col: Vec<Edge>,
        rho: f64,
    ) -> Result<Self> {
        let row = Precompute::factor(EdgeGraph::new(p, n, edges_row)?, rho)?;
        let col = Precompute::factor(EdgeGraph::new(n, p, edges_col)?, rho)?;
        Ok(Self { row, col })
    }

    /// Row-direction (variable) operator.
    pub fn row(&self) -> &Precompute {
        &self.row
    }

    /// Column-direction (observation) operator.
    pub fn col(&self) -> &Precompute {
        &self.col
    }

    /// Number of observations.
    pub fn n(&self) -> usize {
        self.col.graph().n()
    }

    /// Number of variables.
    pub fn p(&self) -> usize {
        self.col.graph().p()
    }
}

/// A recorded biclustering path.
///
/// Shapes mirror [`CarpPath`](crate::solver::CarpPath), split per
/// direction; all six path objects share the column count K.
#[derive(Debug, Clone)]
pub struct CbassPath {
    /// Primal iterates, n·p × K, column-major p×n per column.
    pub u_path: Array2<f64>,
    /// Row-direction split iterates, |E_row|·n × K.
    pub v_path_row: Array2<f64>,
    /// Column-direction split iterates, |E_col|·p × K.
    pub v_path_col: Array2<f64>,
    /// Row-direction fusion indicators, |E_row| × K.
    pub zeta_path_row: Array2<u8>,
    /// Column-direction fusion indicators, |E_col| × K.
    pub zeta_path_col: Array2<u8>,
    /// Regularization level per column, non-decreasing.
    pub gamma_path: Array1<f64>,
    /// How the run ended.
    pub status: Status,
}

pub(crate) struct CbassSnapshot {
    u: Vec<f64>,
    ut: Vec<f64>,
    v_row: Vec<f64>,
    z_row: Vec<f64>,
    v_col: Vec<f64>,
    z_col: Vec<f64>,
    zeta_row: Vec<u8>,
    zeta_row_prev: Vec<u8>,
    zeta_col: Vec<u8>,
    zeta_col_prev: Vec<u8>,
    nzeros: usize,
    nzeros_prev: usize,
}

struct CbassKernel<'a> {
    ops: &'a CbassOperators,
    x: &'a [f64],
    penalty: Penalty,
    rho: f64,
    /// Primal, column-major p×n.
    u: Vec<f64>,
    /// The same primal transposed, row-major (kept in sync by `step`).
    ut: Vec<f64>,
    v_row: Vec<f64>,
    z_row: Vec<f64>,
    v_col: Vec<f64>,
    z_col: Vec<f64>,
    scratch_row: Vec<f64>,
    scratch_col: Vec<f64>,
    du_row: Vec<f64>,
    du_col: Vec<f64>,
    rhs: Vec<f64>,
    rhs_t: Vec<f64>,
    zeta_row: Vec<u8>,
    zeta_row_prev: Vec<u8>,
    zeta_col: Vec<u8>,
    zeta_col_prev: Vec<u8>,
    nzeros: usize,
    nzeros_prev: usize,
    u_path: PathBuffer<f64>,
    v_row_path: PathBuffer<f64>,
    v_col_path: PathBuffer<f64>,
    zeta_row_path: PathBuffer<u8>,
    zeta_col_path: PathBuffer<u8>,
    gamma_path: Vec<f64>,
}

fn transpose(src: &[f64], dst: &mut [f64], n: usize, p: usize) {
    for j in 0..n {
        for r in 0..p {
            dst[r * n + j] = src[j * p + r];
        }
    }
}

impl<'a> CbassKernel<'a> {
    fn new(ops: &'a CbassOperators, x: &'a [f64], u_init: &[f64], config: &CarpConfig) -> Self {
        let (n, p) = (ops.n(), ops.p());
        let u = u_init.to_vec();
        let mut ut = vec![0.0; n * p];
        transpose(&u, &mut ut, n, p);

        // Each direction starts at its own difference of the shared primal,
        // with the scaled dual equal to the split variable.
        let mut v_row = vec![0.0; ops.row.graph().v_len()];
        ops.row.apply_d(&ut, &mut v_row);
        let mut v_col = vec![0.0; ops.col.graph().v_len()];
        ops.col.apply_d(&u, &mut v_col);
        let z_row = v_row.clone();
        let z_col = v_col.clone();

        let events_hint = n + p;
        let (er, ec) = (ops.row.graph().num_edges(), ops.col.graph().num_edges());
        Self {
            ops,
            x,
            penalty: config.penalty,
            rho: config.rho,
            scratch_row: vec![0.0; v_row.len()],
            scratch_col: vec![0.0; v_col.len()],
            du_row: vec![0.0; v_row.len()],
            du_col: vec![0.0; v_col.len()],
            rhs: vec![0.0; n * p],
            rhs_t: vec![0.0; n * p],
            zeta_row: vec![0; er],
            zeta_row_prev: vec![0; er],
            zeta_col: vec![0; ec],
            zeta_col_prev: vec![0; ec],
            nzeros: 0,
            nzeros_prev: 0,
            u_path: PathBuffer::new(n * p, events_hint),
            v_row_path: PathBuffer::new(v_row.len(), events_hint),
            v_col_path: PathBuffer::new(v_col.len(), events_hint),
            zeta_row_path: PathBuffer::new(er, events_hint),
            zeta_col_path: PathBuffer::new(ec, events_hint),
            gamma_path: Vec::new(),
            u,
            ut,
            v_row,
            z_row,
            v_col,
            z_col,
        }
    }

    fn finish(self, status: Status) -> CbassPath {
        CbassPath {
            u_path: self.u_path.into_compact(),
            v_path_row: self.v_row_path.into_compact(),
            v_path_col: self.v_col_path.into_compact(),
            zeta_path_row: self.zeta_row_path.into_compact(),
            zeta_path_col: self.zeta_col_path.into_compact(),
            gamma_path: Array1::from_vec(self.gamma_path),
            status,
        }
    }
}

impl FusionKernel for CbassKernel<'_> {
    type Snapshot = CbassSnapshot;

    fn step(&mut self, gamma: f64) {
        let (n, p) = (self.ops.n(), self.ops.p());
        self.zeta_row_prev.copy_from_slice(&self.zeta_row);
        self.zeta_col_prev.copy_from_slice(&self.zeta_col);
        self.nzeros_prev = self.nzeros;

        // b = x + Dᵀ_col(ρv − z) + Dᵀ_row(ρv − z), assembled column-major.
        for i in 0..self.scratch_col.len() {
            self.scratch_col[i] = self.rho * self.v_col[i] - self.z_col[i];
        }
        self.ops.col.apply_dt(&self.scratch_col, &mut self.rhs);
        for i in 0..self.scratch_row.len() {
            self.scratch_row[i] = self.rho * self.v_row[i] - self.z_row[i];
        }
        self.ops.row.apply_dt(&self.scratch_row, &mut self.rhs_t);
        for j in 0..n {
            for r in 0..p {
                // Sum the two direction contributions first so a symmetric
                // problem assembles a bitwise-symmetric right-hand side.
                let coupled = self.rhs[j * p + r] + self.rhs_t[r * n + j];
                self.rhs[j * p + r] = coupled + self.x[j * p + r];
            }
        }

        // U-step through both factors: U = A_row⁻¹ · B · A_col⁻¹.
        self.ops.col.solve_blocks(&self.rhs, &mut self.u);
        transpose(&self.u, &mut self.rhs_t, n, p);
        self.ops.row.solve_blocks(&self.rhs_t, &mut self.ut);
        transpose(&self.ut, &mut self.u, p, n);

        // Column direction V/Z against the shared U.
        self.ops.col.apply_d(&self.u, &mut self.du_col);
        for i in 0..self.v_col.len() {
            self.v_col[i] = self.du_col[i] + self.z_col[i] / self.rho;
        }
        match self.penalty {
            Penalty::L2 => prox_group_l2(&mut self.v_col, self.ops.col.graph(), gamma, self.rho),
            Penalty::L1 => prox_l1(&mut self.v_col, self.ops.col.graph(), gamma, self.rho),
        }
        for i in 0..self.z_col.len() {
            self.z_col[i] += self.rho * (self.du_col[i] - self.v_col[i]);
        }

        // Row direction V/Z against the transposed view.
        self.ops.row.apply_d(&self.ut, &mut self.du_row);
        for i in 0..self.v_row.len() {
            self.v_row[i] = self.du_row[i] + self.z_row[i] / self.rho;
        }
        match self.penalty {
            Penalty::L2 => prox_group_l2(&mut self.v_row, self.ops.row.graph(), gamma, self.rho),
            Penalty::L1 => prox_l1(&mut self.v_row, self.ops.row.graph(), gamma, self.rho),
        }
        for i in 0..self.z_row.len() {
            self.z_row[i] += self.rho * (self.du_row[i] - self.v_row[i]);
        }

        self.nzeros = scan_fusions(
            self.ops.col.graph(),
            self.penalty,
            &self.v_col,
            &mut self.zeta_col,
        ) + scan_fusions(
            self.ops.row.graph(),
            self.penalty,
            &self.v_row,
            &mut self.zeta_row,
        );
    }

    fn finite(&self) -> bool {
        self.u.iter().all(|a| a.is_finite())
            && self.v_row.iter().all(|a| a.is_finite())
            && self.z_row.iter().all(|a| a.is_finite())
            && self.v_col.iter().all(|a| a.is_finite())
            && self.z_col.iter().all(|a| a.is_finite())
    }

    fn nzeros(&self) -> usize {
        self.nzeros
    }

    fn total_edges(&self) -> usize {
        self.ops.row.graph().num_edges() + self.ops.col.graph().num_edges()
    }

    fn delta(&self) -> isize {
        self.nzeros as isize - self.nzeros_prev as isize
    }

    fn zeta_changed(&self) -> bool {
        self.zeta_row != self.zeta_row_prev || self.zeta_col != self.zeta_col_prev
    }

    fn record(&mut self, gamma: f64) {
        self.u_path.push(&self.u);
        self.v_row_path.push(&self.v_row);
        self.v_col_path.push(&self.v_col);
        self.zeta_row_path.push(&self.zeta_row);
        self.zeta_col_path.push(&self.zeta_col);
        self.gamma_path.push(gamma);
    }

    fn columns(&self) -> usize {
        self.gamma_path.len()
    }

    fn save(&self) -> CbassSnapshot {
        CbassSnapshot {
            u: self.u.clone(),
            ut: self.ut.clone(),
            v_row: self.v_row.clone(),
            z_row: self.z_row.clone(),
            v_col: self.v_col.clone(),
            z_col: self.z_col.clone(),
            zeta_row: self.zeta_row.clone(),
            zeta_row_prev: self.zeta_row_prev.clone(),
            zeta_col: self.zeta_col.clone(),
            zeta_col_prev: self.zeta_col_prev.clone(),
            nzeros: self.nzeros,
            nzeros_prev: self.nzeros_prev,
        }
    }

    fn restore(&mut self, snapshot: CbassSnapshot) {
        self.u = snapshot.u;
        self.ut = snapshot.ut;
        self.v_row = snapshot.v_row;
        self.z_row = snapshot.z_row;
        self.v_col = snapshot.v_col;
        self.z_col = snapshot.z_col;
        self.zeta_row = snapshot.zeta_row;
        self.zeta_row_prev = snapshot.zeta_row_prev;
        self.zeta_col = snapshot.zeta_col;
        self.zeta_col_prev = snapshot.zeta_col_prev;
        self.nzeros = snapshot.nzeros;
        self.nzeros_prev = snapshot.nzeros_prev;
    }
}

/// Track the convex biclustering path for a p×n data matrix.
///
/// `x` and `u_init` are length n·p, column-major. Both directions start
/// from the shared `u_init`; each direction's split and dual variables are
/// initialized to its difference of the initial primal.
pub fn run_cbass(
    x: &[f64],
    ops: &CbassOperators,
    u_init: &[f64],
    config: &CarpConfig,
    cancel: &CancelToken,
) -> Result<CbassPath> {
    config.validate()?;
    let expected = ops.n() * ops.p();
    for (name, len) in [("x", x.len()), ("u_init", u_init.len())] {
        if len != expected {
            debug!("{name} has length {len}, expected {expected}");
            return Err(Error::DimensionMismatch {
                expected,
                found: len,
            });
        }
    }
    if ops.col.rho() != config.rho || ops.row.rho() != config.rho {
        return Err(Error::InvalidInput {
            name: "rho",
            message: "operators were factored for a different rho".to_string(),
        });
    }

    debug!(
        "cbass: n = {}, p = {}, |E_row| = {}, |E_col| = {}, variant = {:?}",
        ops.n(),
        ops.p(),
        ops.row.graph().num_edges(),
        ops.col.graph().num_edges(),
        config.variant
    );

    let mut kernel = CbassKernel::new(ops, x, u_init, config);
    let status = match config.variant {
        Variant::Plain => drive_plain(&mut kernel, config, cancel),
        Variant::Viz => drive_viz(&mut kernel, config, cancel),
    };
    Ok(kernel.finish(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiny_biclustering_fuses_both_directions() {
        // 2×2 matrix with identical rows: the row edge starts fused, the
        // column edge fuses along the path.
        let n = 2;
        let p = 2;
        // Columns (0, 0) and (1, 1): rows are both (0, 1).
        let x = vec![0.0, 0.0, 1.0, 1.0];
        let ops = CbassOperators::factor(
            n,
            p,
            vec![Edge::new(0, 1, 1.0)],
            vec![Edge::new(0, 1, 1.0)],
            1.0,
        )
        .unwrap();
        let config = CarpConfig::new()
            .with_gamma_init(1e-4)
            .with_t(1.1)
            .with_burn_in(5)
            .with_keep(1)
            .with_max_iter(2000);

        let path = run_cbass(&x, &ops, &x, &config, &CancelToken::new()).unwrap();
        assert_eq!(path.status, Status::Completed);

        let k = path.gamma_path.len();
        assert_eq!(path.u_path.dim(), (4, k));
        assert_eq!(path.v_path_row.dim(), (2, k));
        assert_eq!(path.v_path_col.dim(), (2, k));
        assert_eq!(path.zeta_path_row.dim(), (1, k));
        assert_eq!(path.zeta_path_col.dim(), (1, k));
        assert_eq!(path.zeta_path_row[[0, k - 1]], 1);
        assert_eq!(path.zeta_path_col[[0, k - 1]], 1);
    }

    #[test]
    fn test_rejects_rho_mismatch() {
        let ops = CbassOperators::factor(2, 2, vec![], vec![Edge::new(0, 1, 1.0)], 2.0).unwrap();
        let x = vec![0.0; 4];
        let config = CarpConfig::new(); // rho = 1.0
        assert!(run_cbass(&x, &ops, &x, &config, &CancelToken::new()).is_err());
    }

    #[test]
    fn test_factored_operators_expose_both_directions() {
        // 2 variables × 3 observations: the row operator works over the
        // transposed layout, so its node count and block length swap.
        let ops = CbassOperators::factor(
            3,
            2,
            vec![Edge::new(0, 1, 1.0)],
            vec![Edge::new(0, 2, 1.0)],
            1.5,
        )
        .unwrap();

        assert_eq!(ops.n(), 3);
        assert_eq!(ops.p(), 2);
        assert_eq!(ops.row().graph().n(), 2);
        assert_eq!(ops.row().graph().p(), 3);
        assert_eq!(ops.col().graph().n(), 3);
        assert_eq!(ops.col().graph().p(), 2);
        assert_eq!(ops.row().rho(), 1.5);
        assert_eq!(ops.col().rho(), 1.5);
    }
}
