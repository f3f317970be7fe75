//! The two outer loops shared by the clustering and biclustering kernels.
//!
//! A kernel owns the iterates and knows how to take one ADMM sweep at a
//! given γ, snapshot/restore itself, and append its current state to the
//! path buffers. The drivers own γ: the plain driver runs the geometric
//! schedule with `keep`-stride recording, and the back-tracking driver runs
//! the {BurnIn, Coarse, Bisect, Done} state machine that isolates one
//! fusion per committed step.

use log::{trace, warn};

use crate::cancel::CancelToken;
use crate::solver::{CarpConfig, MultiMergeEvent, Status};

/// One direction-agnostic ADMM kernel, as seen by the outer loops.
pub(crate) trait FusionKernel {
    /// Value-copy of everything a rolled-back step must restore.
    type Snapshot;

    /// One ADMM sweep (U-, V-, Z-updates plus the fusion scan) at `gamma`.
    fn step(&mut self, gamma: f64);

    /// False once any iterate holds a non-finite entry.
    fn finite(&self) -> bool;

    /// Current number of fused edges.
    fn nzeros(&self) -> usize;

    /// Total number of edges (both directions, for the coupled kernel).
    fn total_edges(&self) -> usize;

    /// Fused-count change of the most recent step.
    fn delta(&self) -> isize;

    /// True if the most recent step changed the fusion indicator at all.
    fn zeta_changed(&self) -> bool;

    /// Append the current iterate to the path buffers.
    fn record(&mut self, gamma: f64);

    /// Number of recorded path columns so far.
    fn columns(&self) -> usize;

    fn save(&self) -> Self::Snapshot;
    fn restore(&mut self, snapshot: Self::Snapshot);
}

/// Classic schedule: hold γ₀ through burn-in, then γ ← γ·t per iteration.
///
/// A step is stored iff the fusion indicator changed or the keep stride
/// fired (never twice), and γ is bumped *after* the store, so the recorded
/// γ is the one the step's prox actually used.
pub(crate) fn drive_plain<K: FusionKernel>(
    kernel: &mut K,
    config: &CarpConfig,
    cancel: &CancelToken,
) -> Status {
    let mut gamma = config.gamma_init;
    kernel.record(gamma);

    let mut iter = 0usize;
    while iter < config.max_iter && kernel.nzeros() < kernel.total_edges() {
        kernel.step(gamma);
        if !kernel.finite() {
            warn!("non-finite iterate at iteration {iter}; returning partial path");
            return Status::NumericalOverflow { iter };
        }

        if kernel.zeta_changed() || iter % config.keep == 0 {
            if kernel.zeta_changed() {
                trace!(
                    "fusion change at iteration {iter}: {}/{} edges fused",
                    kernel.nzeros(),
                    kernel.total_edges()
                );
            }
            kernel.record(gamma);
        }

        iter += 1;
        if iter >= config.burn_in {
            gamma *= config.t;
        }
        if iter % config.check_cancel_every == 0 && cancel.is_cancelled() {
            return Status::Cancelled;
        }
    }

    if kernel.nzeros() == kernel.total_edges() {
        Status::Completed
    } else {
        Status::MaxIterReached
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VizState {
    BurnIn,
    Coarse,
    Bisect,
}

/// Back-tracking schedule: every committed step is recorded, and once
/// fusions begin each committed step carries at most one new fusion.
///
/// The trial multiplier starts at `viz_t_coarse`. A trial step that fuses
/// nothing is committed outright (the warm start keeps advancing). A trial
/// that fuses ≥ 1 edges is rolled back and the multiplier refined toward 1
/// by repeated square roots — bisection in the exponent — until it reaches
/// `viz_t_switch`, at which point the trial is committed: a clean single
/// fusion, or a tagged multi-merge if even the finest granularity fuses
/// several edges at once. Rolled-back trials count toward `max_iter`.
pub(crate) fn drive_viz<K: FusionKernel>(
    kernel: &mut K,
    config: &CarpConfig,
    cancel: &CancelToken,
) -> Status {
    let mut gamma = config.gamma_init;
    kernel.record(gamma);

    let mut state = VizState::BurnIn;
    let mut multiplier = config.viz_t_coarse;
    let mut inner = 0usize;
    let mut events: Vec<MultiMergeEvent> = Vec::new();

    let mut iter = 0usize;
    while iter < config.max_iter && kernel.nzeros() < kernel.total_edges() {
        match state {
            VizState::BurnIn => {
                kernel.step(gamma);
                iter += 1;
                if !kernel.finite() {
                    return Status::NumericalOverflow { iter: iter - 1 };
                }
                kernel.record(gamma);
                if iter >= config.burn_in {
                    state = VizState::Coarse;
                    if cancel.is_cancelled() {
                        return Status::Cancelled;
                    }
                }
            }
            VizState::Coarse | VizState::Bisect => {
                let snapshot = kernel.save();
                let gamma_try = gamma * multiplier;
                kernel.step(gamma_try);
                iter += 1;
                if !kernel.finite() {
                    return Status::NumericalOverflow { iter: iter - 1 };
                }

                let delta = kernel.delta();
                if delta <= 0 {
                    // No new fusion: the trial becomes the iterate.
                    gamma = gamma_try;
                    kernel.record(gamma);
                } else if state == VizState::Coarse {
                    kernel.restore(snapshot);
                    multiplier = multiplier.sqrt();
                    inner = 0;
                    state = VizState::Bisect;
                    if cancel.is_cancelled() {
                        return Status::Cancelled;
                    }
                } else if multiplier > config.viz_t_switch && inner < config.viz_max_inner_iter {
                    kernel.restore(snapshot);
                    multiplier = multiplier.sqrt();
                    inner += 1;
                } else {
                    // Finest granularity reached (or budget exhausted):
                    // commit whatever fused.
                    gamma = gamma_try;
                    kernel.record(gamma);
                    if delta >= 2 {
                        warn!(
                            "bisection could not split {delta} simultaneous fusions at gamma = {gamma:e}"
                        );
                        events.push(MultiMergeEvent {
                            column: kernel.columns() - 1,
                            fused: delta as usize,
                        });
                    } else {
                        trace!(
                            "isolated fusion at gamma = {gamma:e} ({}/{} edges)",
                            kernel.nzeros(),
                            kernel.total_edges()
                        );
                    }
                    multiplier = config.viz_t_coarse;
                    inner = 0;
                    state = VizState::Coarse;
                    if cancel.is_cancelled() {
                        return Status::Cancelled;
                    }
                }
            }
        }

        if iter % config.check_cancel_every == 0 && cancel.is_cancelled() {
            return Status::Cancelled;
        }
    }

    if kernel.nzeros() < kernel.total_edges() {
        Status::MaxIterReached
    } else if events.is_empty() {
        Status::Completed
    } else {
        Status::MultiMerge { events }
    }
}
