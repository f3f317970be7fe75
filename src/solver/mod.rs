//! Path-tracking ADMM kernels.
//!
//! Convex clustering penalizes pairwise differences of observation
//! centroids; convex biclustering additionally penalizes differences of
//! variable centroids. Rather than solving the problem to optimality at a
//! grid of regularization levels, these kernels take **one** ADMM step per
//! level and ride the warm start while the level grows geometrically — the
//! algorithmic regularization path. Each step costs one cached back-solve
//! plus O(|E|·p) vector work, and the recorded iterates trace the entire
//! clustering hierarchy from "all separate" to "all fused".
//!
//! Two scheduling variants:
//!
//! | Variant | Schedule | Guarantee |
//! |---------|----------|-----------|
//! | Plain   | γ ← γ·t after burn-in | fast; fusions may arrive in batches |
//! | Viz     | back-tracking (coarse/bisect) | exactly one fusion per event |
//!
//! The back-tracking variant costs more steps but yields a path from which
//! a dendrogram can be read off directly; the plain variant relies on the
//! [`path`](crate::path) post-processor to split batched fusions.

mod buffer;
mod carp;
mod cbass;
mod drive;
mod precompute;
mod prox;

pub use carp::{run_carp, CarpPath};
pub use cbass::{run_cbass, CbassOperators, CbassPath};
pub use precompute::Precompute;

use crate::error::{Error, Result};

/// Fusion penalty applied to each edge difference block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    /// Elementwise soft-threshold; coordinates fuse one at a time.
    L1,
    /// Group soft-threshold; a block fuses all at once.
    L2,
}

/// Path-tracking variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Geometric schedule, `keep`-stride recording.
    Plain,
    /// Back-tracking schedule isolating one fusion per event.
    Viz,
}

/// One back-tracking event at which bisection could not isolate a single
/// fusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultiMergeEvent {
    /// Path column carrying the event.
    pub column: usize,
    /// Number of edges that fused in that single step (≥ 2).
    pub fused: usize,
}

/// How a run ended. The path returned alongside is valid in every case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// All edges fused.
    Completed,
    /// Iteration cap hit before full fusion; the partial path is usable.
    MaxIterReached,
    /// Cooperative cancellation observed.
    Cancelled,
    /// Run completed, but one or more back-tracking events merged several
    /// edges at once; those path columns are listed here.
    MultiMerge {
        /// The tagged events, in path order.
        events: Vec<MultiMergeEvent>,
    },
    /// An iterate developed a non-finite entry; the path ends at the last
    /// valid recorded iterate.
    NumericalOverflow {
        /// Iteration at which the overflow was detected.
        iter: usize,
    },
}

/// Configuration for [`run_carp`] and [`run_cbass`].
#[derive(Debug, Clone)]
pub struct CarpConfig {
    /// Initial regularization level γ₀.
    pub gamma_init: f64,
    /// Geometric multiplier applied after burn-in (plain variant).
    pub t: f64,
    /// Augmented Lagrangian parameter ρ.
    pub rho: f64,
    /// Hard iteration cap. Back-tracked trial steps count too.
    pub max_iter: usize,
    /// Iterations held at γ₀ before the schedule starts.
    pub burn_in: usize,
    /// Record every `keep`-th iteration even without a fusion change
    /// (plain variant only).
    pub keep: usize,
    /// Fusion penalty.
    pub penalty: Penalty,
    /// Scheduling variant.
    pub variant: Variant,
    /// Coarse trial multiplier for the back-tracking variant.
    pub viz_t_coarse: f64,
    /// Acceptance granularity: a trial is committed once the refined
    /// multiplier drops to this value.
    pub viz_t_switch: f64,
    /// Per-event cap on bisection refinements before the event is
    /// committed as a multi-merge.
    pub viz_max_inner_iter: usize,
    /// Cancellation poll cadence, in iterations.
    pub check_cancel_every: usize,
}

impl Default for CarpConfig {
    fn default() -> Self {
        Self {
            gamma_init: 1e-8,
            t: 1.05,
            rho: 1.0,
            max_iter: 10_000,
            burn_in: 50,
            keep: 10,
            penalty: Penalty::L2,
            variant: Variant::Plain,
            viz_t_coarse: 10.0,
            viz_t_switch: 1.01,
            viz_max_inner_iter: 50,
            check_cancel_every: 50,
        }
    }
}

impl CarpConfig {
    /// Default configuration: L2 penalty, plain schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial regularization level.
    pub fn with_gamma_init(mut self, gamma_init: f64) -> Self {
        self.gamma_init = gamma_init;
        self
    }

    /// Set the geometric schedule multiplier.
    pub fn with_t(mut self, t: f64) -> Self {
        self.t = t;
        self
    }

    /// Set the augmented Lagrangian parameter.
    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = rho;
        self
    }

    /// Set the iteration cap.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the burn-in length.
    pub fn with_burn_in(mut self, burn_in: usize) -> Self {
        self.burn_in = burn_in;
        self
    }

    /// Set the keep stride.
    pub fn with_keep(mut self, keep: usize) -> Self {
        self.keep = keep;
        self
    }

    /// Set the fusion penalty.
    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    /// Set the scheduling variant.
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// Set the coarse and switch multipliers for back-tracking.
    pub fn with_viz_multipliers(mut self, t_coarse: f64, t_switch: f64) -> Self {
        self.viz_t_coarse = t_coarse;
        self.viz_t_switch = t_switch;
        self
    }

    /// Set the per-event bisection budget.
    pub fn with_viz_max_inner_iter(mut self, budget: usize) -> Self {
        self.viz_max_inner_iter = budget;
        self
    }

    /// Set the cancellation poll cadence.
    pub fn with_check_cancel_every(mut self, cadence: usize) -> Self {
        self.check_cancel_every = cadence;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.gamma_init > 0.0) || !self.gamma_init.is_finite() {
            return Err(invalid("gamma_init", "must be positive and finite"));
        }
        if !(self.t > 1.0) || !self.t.is_finite() {
            return Err(invalid("t", "schedule multiplier must exceed 1"));
        }
        if !(self.rho > 0.0) || !self.rho.is_finite() {
            return Err(invalid("rho", "must be positive and finite"));
        }
        if self.max_iter == 0 {
            return Err(invalid("max_iter", "must be at least 1"));
        }
        if self.burn_in == 0 || self.burn_in >= self.max_iter {
            return Err(invalid("burn_in", "must lie in [1, max_iter)"));
        }
        if self.keep == 0 {
            return Err(invalid("keep", "must be at least 1"));
        }
        if !(self.viz_t_coarse > 1.0) || !self.viz_t_coarse.is_finite() {
            return Err(invalid("viz_t_coarse", "coarse multiplier must exceed 1"));
        }
        if !(self.viz_t_switch > 1.0) || self.viz_t_switch > self.viz_t_coarse {
            return Err(invalid(
                "viz_t_switch",
                "switch multiplier must lie in (1, viz_t_coarse]",
            ));
        }
        if self.viz_max_inner_iter == 0 {
            return Err(invalid("viz_max_inner_iter", "must be at least 1"));
        }
        if self.check_cancel_every == 0 {
            return Err(invalid("check_cancel_every", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(name: &'static str, message: &str) -> Error {
    Error::InvalidInput {
        name,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CarpConfig::new().validate().is_ok());
    }

    #[test]
    fn test_config_rejects_bad_parameters() {
        assert!(CarpConfig::new().with_gamma_init(0.0).validate().is_err());
        assert!(CarpConfig::new().with_t(1.0).validate().is_err());
        assert!(CarpConfig::new().with_rho(-1.0).validate().is_err());
        assert!(CarpConfig::new().with_max_iter(0).validate().is_err());
        assert!(CarpConfig::new()
            .with_max_iter(10)
            .with_burn_in(10)
            .validate()
            .is_err());
        assert!(CarpConfig::new().with_burn_in(0).validate().is_err());
        assert!(CarpConfig::new().with_keep(0).validate().is_err());
        assert!(CarpConfig::new()
            .with_viz_multipliers(10.0, 20.0)
            .validate()
            .is_err());
        assert!(CarpConfig::new()
            .with_viz_multipliers(1.0, 1.0)
            .validate()
            .is_err());
    }
}
