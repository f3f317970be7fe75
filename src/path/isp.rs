//! Iterate smoothing post-processor.
//!
//! The raw path recorded by a kernel is an honest trace of the iteration:
//! keep-stride columns repeat an unchanged fusion state, a batched step can
//! fuse several edges at once, and an edge can even transiently re-unfuse
//! before settling. None of that is what a dendrogram builder wants to
//! consume. This pass turns the raw record into the canonical form:
//!
//! - **Monotone**: an edge counts as fused from its *first* zero column
//!   onward; later wobbles are ignored.
//! - **Deduplicated**: columns contributing no new fusion are dropped.
//! - **One fusion per column**: a column contributing j new edges is
//!   expanded into j output columns, one edge each in edge-index order,
//!   all carrying that column's iterate and level (piecewise-constant
//!   fill — each edge's retained U/V is the iterate at which its fusion
//!   first appeared).
//!
//! The output's fused count therefore increases by exactly 1 per
//! post-initial column, and reaches the edge count iff the kernel ran to
//! full fusion. The pass is pure: no I/O, no concurrency, no mutation of
//! its inputs.

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};
use crate::solver::{CarpPath, CbassPath};

/// A smoothed path: one fusion event per column after the initial one.
#[derive(Debug, Clone)]
pub struct InterpolatedPath {
    /// Primal snapshot per event.
    pub u_path: Array2<f64>,
    /// Split snapshot per event.
    pub v_path: Array2<f64>,
    /// Monotone fusion indicators; column sums increase by exactly 1.
    pub zeta_path: Array2<u8>,
    /// Level at which each event first appeared.
    pub gamma_path: Array1<f64>,
}

impl InterpolatedPath {
    /// Number of recorded columns (initial column included).
    pub fn len(&self) -> usize {
        self.gamma_path.len()
    }

    /// True when the path holds no columns at all (never produced by
    /// [`interpolate`], which rejects empty input).
    pub fn is_empty(&self) -> bool {
        self.gamma_path.is_empty()
    }

    /// Fused count in the final column.
    pub fn final_fusions(&self) -> usize {
        let k = self.zeta_path.ncols();
        if k == 0 {
            return 0;
        }
        self.zeta_path
            .column(k - 1)
            .iter()
            .map(|&z| usize::from(z))
            .sum()
    }
}

/// Smooth one direction of a raw path.
///
/// All four inputs must share the same column count, which must be at
/// least 1 (column 0 becomes the initial output column).
pub fn interpolate(
    u_path: &Array2<f64>,
    v_path: &Array2<f64>,
    zeta_path: &Array2<u8>,
    gamma_path: &Array1<f64>,
) -> Result<InterpolatedPath> {
    let k_raw = gamma_path.len();
    if k_raw == 0 {
        return Err(Error::InvalidInput {
            name: "gamma_path",
            message: "path holds no recorded columns".to_string(),
        });
    }
    for cols in [u_path.ncols(), v_path.ncols(), zeta_path.ncols()] {
        if cols != k_raw {
            return Err(Error::DimensionMismatch {
                expected: k_raw,
                found: cols,
            });
        }
    }

    let num_edges = zeta_path.nrows();
    let mut fused: Vec<u8> = zeta_path.column(0).to_vec();

    // (source raw column, fused set after this event)
    let mut events: Vec<(usize, Vec<u8>)> = vec![(0, fused.clone())];
    for k in 1..k_raw {
        for i in 0..num_edges {
            if zeta_path[[i, k]] == 1 && fused[i] == 0 {
                fused[i] = 1;
                events.push((k, fused.clone()));
            }
        }
    }

    let k_out = events.len();
    let mut u = Array2::zeros((u_path.nrows(), k_out));
    let mut v = Array2::zeros((v_path.nrows(), k_out));
    let mut zeta = Array2::zeros((num_edges, k_out));
    let mut gamma = Array1::zeros(k_out);
    for (out, (src, state)) in events.iter().enumerate() {
        u.column_mut(out).assign(&u_path.column(*src));
        v.column_mut(out).assign(&v_path.column(*src));
        for (i, &z) in state.iter().enumerate() {
            zeta[[i, out]] = z;
        }
        gamma[out] = gamma_path[*src];
    }

    Ok(InterpolatedPath {
        u_path: u,
        v_path: v,
        zeta_path: zeta,
        gamma_path: gamma,
    })
}

/// Smooth a clustering path.
pub fn interpolate_carp(path: &CarpPath) -> Result<InterpolatedPath> {
    interpolate(&path.u_path, &path.v_path, &path.zeta_path, &path.gamma_path)
}

/// Smooth a biclustering path, one direction at a time.
///
/// Returns `(row, col)`; both share the raw `u_path` and γ schedule but
/// are smoothed against their own fusion indicators.
pub fn interpolate_cbass(path: &CbassPath) -> Result<(InterpolatedPath, InterpolatedPath)> {
    let row = interpolate(
        &path.u_path,
        &path.v_path_row,
        &path.zeta_path_row,
        &path.gamma_path,
    )?;
    let col = interpolate(
        &path.u_path,
        &path.v_path_col,
        &path.zeta_path_col,
        &path.gamma_path,
    )?;
    Ok((row, col))
}
