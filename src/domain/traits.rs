// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training loop never sees a concrete model, metrics sink or
// test harness. It only sees these three traits, so a different
// backend (or a recording fake in tests) can be dropped in without
// touching the loop.
//
//   Model     → LinearRegressor (ml/model.rs)
//   Writer    → MetricsWriter   (infra/metrics.rs)
//   Evaluator → TestRunner      (ml/evaluator.rs)
//
// Every method is fallible and every error is fatal to the loop:
// nothing here is retried.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::sample::Batch;
use crate::domain::state::CheckpointTag;

// ─── Model ────────────────────────────────────────────────────────────────────
/// Anything that can be optimised one batch at a time.
pub trait Model {
    /// Stage the next batch for `optimize_parameters`.
    fn set_input(&mut self, batch: Batch) -> Result<()>;

    /// One gradient step on the staged batch. Updates `loss()`.
    fn optimize_parameters(&mut self) -> Result<()>;

    /// Loss of the most recent optimisation step.
    fn loss(&self) -> f32;

    /// Persist model state under the given tag.
    fn save_network(&self, tag: CheckpointTag) -> Result<()>;

    /// Advance the learning-rate schedule by one epoch.
    fn update_learning_rate(&mut self) -> Result<()>;

    /// Flattened parameter tensors by name, used for weight plots.
    fn parameters(&self) -> Vec<(String, Vec<f32>)>;
}

// ─── Writer ───────────────────────────────────────────────────────────────────
/// Logging / metrics sink for a training run.
pub trait Writer {
    fn print_current_losses(
        &mut self,
        epoch:           usize,
        epoch_iter:      usize,
        loss:            f32,
        time_per_sample: f64,
        data_wait:       f64,
    ) -> Result<()>;

    fn plot_loss(
        &mut self,
        loss:         f32,
        epoch:        usize,
        epoch_iter:   usize,
        dataset_size: usize,
    ) -> Result<()>;

    /// Record one point of a scalar series keyed by epoch.
    fn plot_acc(&mut self, value: f64, epoch: usize, series: &str) -> Result<()>;

    fn plot_model_wts(&mut self, parameters: &[(String, Vec<f32>)], epoch: usize) -> Result<()>;

    /// Flush everything. Called once after the loop finishes.
    fn close(&mut self) -> Result<()>;
}

// ─── Evaluator ────────────────────────────────────────────────────────────────
/// Held-out evaluation result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalReport {
    pub mean_absolute_error: f64,
    pub sign_accuracy:       f64,
}

/// Runs the held-out evaluation for a given epoch.
pub trait Evaluator {
    fn run_test(&mut self, epoch: usize) -> Result<EvalReport>;
}
