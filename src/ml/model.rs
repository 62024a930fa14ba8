// ============================================================
// Layer 5 — Edge-Feature Regressor
// ============================================================
// A linear model over mean-pooled edge features:
//
//   edge_features [N, C, E] ──mean over E──▶ pooled [N, C]
//   prediction    = pooled · Wᵀ + b            [N, T]
//
// Trained with plain gradient descent on either MSE or L1 loss.
// The learning rate comes from the LrScheduler, which is stored
// inside the record so a checkpoint carries its schedule position.
//
// Weights start as uniform noise in ±INIT_GAIN drawn from the
// ModelInit random stream, so a seeded run is reproducible.
//
// Reference: Rust Book §10 (Traits)

use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use ndarray::{Array1, Array2, Axis, Ix3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::sample::{Batch, EDGE_FEATURES, TARGET};
use crate::domain::state::CheckpointTag;
use crate::domain::traits::Model;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::scheduler::{LrScheduler, SchedulerConfig};

const INIT_GAIN: f32 = 0.02;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    #[default]
    Mse,
    L1,
}

// ─── Record ───────────────────────────────────────────────────────────────────
/// Everything a checkpoint holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// [targets, channels]
    pub weights:   Array2<f32>,
    /// [targets]
    pub bias:      Array1<f32>,
    pub scheduler: LrScheduler,
}

impl ModelRecord {
    pub fn predict(&self, pooled: &Array2<f32>) -> Array2<f32> {
        pooled.dot(&self.weights.t()) + &self.bias
    }

    pub fn channels(&self) -> usize {
        self.weights.ncols()
    }

    pub fn outputs(&self) -> usize {
        self.weights.nrows()
    }
}

/// Split a batch into pooled inputs `[N, C]` and targets `[N, T]`.
pub fn batch_inputs(batch: &Batch) -> Result<(Array2<f32>, Array2<f32>)> {
    let features = batch
        .get(EDGE_FEATURES)
        .ok_or_else(|| anyhow!("Batch has no '{EDGE_FEATURES}' field"))?;
    let shape = features.shape().to_vec();
    let features = features
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|_| anyhow!("Expected edge features shaped [batch, channels, edges], got {shape:?}"))?;
    let pooled = features
        .mean_axis(Axis(2))
        .ok_or_else(|| anyhow!("Edge features have no edges"))?;

    let targets = batch
        .get(TARGET)
        .ok_or_else(|| anyhow!("Batch has no '{TARGET}' field"))?;
    let rows = pooled.nrows();
    if rows == 0 || targets.len() % rows != 0 {
        bail!("{} target values cannot be split across {} samples", targets.len(), rows);
    }
    let targets = Array2::from_shape_vec((rows, targets.len() / rows), targets.iter().copied().collect())?;

    Ok((pooled, targets))
}

// ─── Regressor ────────────────────────────────────────────────────────────────
pub struct LinearRegressor {
    record:      ModelRecord,
    loss_kind:   LossKind,
    input:       Option<(Array2<f32>, Array2<f32>)>,
    loss:        f32,
    checkpoints: CheckpointManager,
}

impl LinearRegressor {
    pub fn new<R: Rng>(
        channels:    usize,
        outputs:     usize,
        loss_kind:   LossKind,
        scheduler:   SchedulerConfig,
        checkpoints: CheckpointManager,
        rng:         &mut R,
    ) -> Self {
        let weights = Array2::from_shape_fn((outputs, channels), |_| rng.gen_range(-INIT_GAIN..INIT_GAIN));
        let record  = ModelRecord {
            weights,
            bias:      Array1::zeros(outputs),
            scheduler: LrScheduler::new(scheduler),
        };
        tracing::info!("Linear regressor: {} channels → {} outputs, {:?} loss", channels, outputs, loss_kind);
        Self::from_record(record, loss_kind, checkpoints)
    }

    /// Resume from a saved record.
    pub fn from_record(record: ModelRecord, loss_kind: LossKind, checkpoints: CheckpointManager) -> Self {
        Self { record, loss_kind, input: None, loss: 0.0, checkpoints }
    }

    pub fn record(&self) -> &ModelRecord {
        &self.record
    }

    pub fn learning_rate(&self) -> f64 {
        self.record.scheduler.lr()
    }
}

impl Model for LinearRegressor {
    fn set_input(&mut self, batch: Batch) -> Result<()> {
        let (pooled, targets) = batch_inputs(&batch)?;
        if pooled.ncols() != self.record.channels() {
            bail!(
                "Batch has {} feature channels, model expects {}",
                pooled.ncols(),
                self.record.channels()
            );
        }
        if targets.ncols() != self.record.outputs() {
            bail!(
                "Batch has {} targets per sample, model expects {}",
                targets.ncols(),
                self.record.outputs()
            );
        }
        self.input = Some((pooled, targets));
        Ok(())
    }

    fn optimize_parameters(&mut self) -> Result<()> {
        let (inputs, targets) = self
            .input
            .as_ref()
            .context("optimize_parameters called before set_input")?;

        let errors = self.record.predict(inputs) - targets;
        let count  = errors.len().max(1) as f32;

        // dLoss/dPrediction
        let (loss, grad) = match self.loss_kind {
            LossKind::Mse => (
                errors.mapv(|e| e * e).sum() / count,
                errors.mapv(|e| 2.0 * e / count),
            ),
            LossKind::L1 => (
                errors.mapv(f32::abs).sum() / count,
                errors.mapv(|e| if e == 0.0 { 0.0 } else { e.signum() / count }),
            ),
        };

        let grad_w = grad.t().dot(inputs);
        let grad_b = grad.sum_axis(Axis(0));
        let lr     = self.record.scheduler.lr() as f32;

        self.record.weights.scaled_add(-lr, &grad_w);
        self.record.bias.scaled_add(-lr, &grad_b);
        self.loss = loss;
        Ok(())
    }

    fn loss(&self) -> f32 {
        self.loss
    }

    fn save_network(&self, tag: CheckpointTag) -> Result<()> {
        self.checkpoints.save_network(tag, &self.record)
    }

    fn update_learning_rate(&mut self) -> Result<()> {
        let lr = self.record.scheduler.step();
        tracing::info!("learning rate = {:.7}", lr);
        Ok(())
    }

    fn parameters(&self) -> Vec<(String, Vec<f32>)> {
        vec![
            ("weights".to_string(), self.record.weights.iter().copied().collect()),
            ("bias".to_string(),    self.record.bias.iter().copied().collect()),
        ]
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::scheduler::LrPolicy;
    use ndarray::{arr1, Array3};
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::TempDir;

    fn scheduler(base_lr: f64) -> SchedulerConfig {
        SchedulerConfig {
            policy:         LrPolicy::Lambda,
            base_lr,
            epoch_count:    1,
            niter:          100,
            niter_decay:    100,
            lr_decay_iters: 50,
        }
    }

    /// Two channels, each constant across 3 edges; target = 2·x0 − x1.
    fn batch() -> Batch {
        let rows = [[1.0f32, 0.0], [0.0, 1.0], [1.0, 1.0], [2.0, 1.0]];
        let features = Array3::from_shape_fn((4, 2, 3), |(n, c, _)| rows[n][c]);
        let targets  = arr1(&rows.map(|r| 2.0 * r[0] - r[1]));

        let mut batch = Batch::new(4);
        batch.insert(EDGE_FEATURES, features.into_dyn());
        batch.insert(TARGET, targets.into_dyn());
        batch
    }

    fn regressor(tmp: &TempDir, loss: LossKind) -> LinearRegressor {
        let mut rng = StdRng::seed_from_u64(5);
        let ckpt    = CheckpointManager::new(tmp.path()).unwrap();
        LinearRegressor::new(2, 1, loss, scheduler(0.1), ckpt, &mut rng)
    }

    #[test]
    fn test_batch_inputs_pools_over_edges() {
        let (pooled, targets) = batch_inputs(&batch()).unwrap();
        assert_eq!(pooled.shape(), &[4, 2]);
        assert_eq!(targets.shape(), &[4, 1]);
        assert_eq!(pooled[[3, 0]], 2.0);
        assert_eq!(targets[[3, 0]], 3.0);
    }

    #[test]
    fn test_batch_inputs_missing_target() {
        let mut b = Batch::new(1);
        b.insert(EDGE_FEATURES, Array3::<f32>::zeros((1, 2, 3)).into_dyn());
        assert!(batch_inputs(&b).is_err());
    }

    #[test]
    fn test_mse_training_fits_linear_target() {
        let tmp       = TempDir::new().unwrap();
        let mut model = regressor(&tmp, LossKind::Mse);

        model.set_input(batch()).unwrap();
        model.optimize_parameters().unwrap();
        let first = model.loss();
        for _ in 0..3000 {
            model.optimize_parameters().unwrap();
        }

        assert!(first > 1.0);
        assert!(model.loss() < 1e-3, "loss stayed at {}", model.loss());
    }

    #[test]
    fn test_l1_training_reduces_loss() {
        let tmp       = TempDir::new().unwrap();
        let mut model = regressor(&tmp, LossKind::L1);

        model.set_input(batch()).unwrap();
        model.optimize_parameters().unwrap();
        let first = model.loss();
        for _ in 0..200 {
            model.optimize_parameters().unwrap();
        }
        assert!(model.loss() < first);
    }

    #[test]
    fn test_optimize_before_input_is_error() {
        let tmp       = TempDir::new().unwrap();
        let mut model = regressor(&tmp, LossKind::Mse);
        assert!(model.optimize_parameters().is_err());
    }

    #[test]
    fn test_channel_mismatch_is_error() {
        let tmp         = TempDir::new().unwrap();
        let mut rng     = StdRng::seed_from_u64(1);
        let ckpt        = CheckpointManager::new(tmp.path()).unwrap();
        let mut model   = LinearRegressor::new(3, 1, LossKind::Mse, scheduler(0.1), ckpt, &mut rng);
        let err         = model.set_input(batch()).unwrap_err();
        assert!(err.to_string().contains("feature channels"));
    }

    #[test]
    fn test_seeded_init_is_reproducible() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        assert_eq!(regressor(&a, LossKind::Mse).record(), regressor(&b, LossKind::Mse).record());
    }

    #[test]
    fn test_save_network_round_trips_record() {
        let tmp       = TempDir::new().unwrap();
        let mut model = regressor(&tmp, LossKind::Mse);
        model.update_learning_rate().unwrap();
        model.save_network(CheckpointTag::Latest).unwrap();

        let ckpt = CheckpointManager::new(tmp.path()).unwrap();
        let back: ModelRecord = ckpt.load_network(CheckpointTag::Latest).unwrap();
        assert_eq!(&back, model.record());
        assert_eq!(back.scheduler.steps(), 1);
    }

    #[test]
    fn test_update_learning_rate_follows_schedule() {
        let tmp         = TempDir::new().unwrap();
        let mut rng     = StdRng::seed_from_u64(0);
        let ckpt        = CheckpointManager::new(tmp.path()).unwrap();
        let cfg         = SchedulerConfig { niter: 1, niter_decay: 1, ..scheduler(1.0) };
        let mut model   = LinearRegressor::new(2, 1, LossKind::Mse, cfg, ckpt, &mut rng);

        // 1 + 0 + 1 - 1 = 1 epoch past niter → 1 - 1/2
        assert!((model.learning_rate() - 0.5).abs() < 1e-12);
        model.update_learning_rate().unwrap();
        assert_eq!(model.learning_rate(), 0.0);
    }

    #[test]
    fn test_parameters_are_named() {
        let tmp    = TempDir::new().unwrap();
        let model  = regressor(&tmp, LossKind::Mse);
        let params = model.parameters();
        assert_eq!(params[0].0, "weights");
        assert_eq!(params[0].1.len(), 2);
        assert_eq!(params[1], ("bias".to_string(), vec![0.0]));
    }
}
