// ============================================================
// Layer 5 — Held-Out Evaluation
// ============================================================
// Loads the "latest" checkpoint and scores it on the test split.
//
//   mean absolute error = mean |prediction − target|
//   sign accuracy       = fraction where prediction and target
//                         fall on the same side of zero
//
// Zero counts as positive for both sides.

use std::sync::Arc;

use anyhow::{bail, Result};
use burn::data::dataloader::DataLoader;

use crate::domain::sample::Batch;
use crate::domain::state::CheckpointTag;
use crate::domain::traits::{EvalReport, Evaluator};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{batch_inputs, ModelRecord};

pub struct TestRunner {
    checkpoints: CheckpointManager,
    loader:      Arc<dyn DataLoader<Batch>>,
}

impl TestRunner {
    pub fn new(checkpoints: CheckpointManager, loader: Arc<dyn DataLoader<Batch>>) -> Self {
        Self { checkpoints, loader }
    }
}

impl Evaluator for TestRunner {
    fn run_test(&mut self, epoch: usize) -> Result<EvalReport> {
        let record: ModelRecord = self.checkpoints.load_network(CheckpointTag::Latest)?;

        let mut abs_error  = 0.0f64;
        let mut sign_hits  = 0usize;
        let mut count      = 0usize;

        for batch in self.loader.iter() {
            let (inputs, targets) = batch_inputs(&batch)?;
            let predictions       = record.predict(&inputs);
            if predictions.shape() != targets.shape() {
                bail!(
                    "Test targets {:?} do not match predictions {:?}",
                    targets.shape(),
                    predictions.shape()
                );
            }

            for (p, t) in predictions.iter().zip(targets.iter()) {
                abs_error += (p - t).abs() as f64;
                if (*p >= 0.0) == (*t >= 0.0) {
                    sign_hits += 1;
                }
                count += 1;
            }
        }

        if count == 0 {
            bail!("Test set produced no predictions");
        }

        let report = EvalReport {
            mean_absolute_error: abs_error / count as f64,
            sign_accuracy:       sign_hits as f64 / count as f64,
        };
        tracing::info!(
            "epoch {}: test MAE = {:.5}, sign accuracy = {:.2}%",
            epoch,
            report.mean_absolute_error,
            report.sign_accuracy * 100.0
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::{build_loader, LoaderOptions};
    use crate::domain::sample::{Sample, EDGE_FEATURES, TARGET};
    use crate::ml::scheduler::{LrPolicy, LrScheduler, SchedulerConfig};
    use approx::assert_abs_diff_eq;
    use burn::data::dataset::InMemDataset;
    use ndarray::{arr1, arr2, Array1, Array2};
    use tempfile::TempDir;

    fn sample(x: f32, target: f32) -> Sample {
        Sample::new()
            .with_field(EDGE_FEATURES, Array2::from_elem((1, 4), x).into_dyn())
            .with_field(TARGET, arr1(&[target]).into_dyn())
    }

    fn loader(samples: Vec<Sample>) -> Arc<dyn DataLoader<Batch>> {
        let options = LoaderOptions { batch_size: 2, shuffle_seed: None, num_workers: 1 };
        build_loader(InMemDataset::new(samples), options)
    }

    /// Identity model: prediction = x.
    fn save_identity(ckpt: &CheckpointManager) {
        let record = ModelRecord {
            weights:   arr2(&[[1.0]]),
            bias:      Array1::zeros(1),
            scheduler: LrScheduler::new(SchedulerConfig {
                policy:         LrPolicy::Lambda,
                base_lr:        0.1,
                epoch_count:    1,
                niter:          1,
                niter_decay:    0,
                lr_decay_iters: 1,
            }),
        };
        ckpt.save_network(CheckpointTag::Latest, &record).unwrap();
    }

    #[test]
    fn test_mae_and_sign_accuracy() {
        let tmp  = TempDir::new().unwrap();
        let ckpt = CheckpointManager::new(tmp.path()).unwrap();
        save_identity(&ckpt);

        // errors: 0, 1, 2 → MAE 1; signs: hit, hit, miss
        let samples = vec![sample(1.0, 1.0), sample(-1.0, -2.0), sample(1.0, -1.0)];
        let mut runner = TestRunner::new(ckpt, loader(samples));

        let report = runner.run_test(1).unwrap();
        assert_abs_diff_eq!(report.mean_absolute_error, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(report.sign_accuracy, 2.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_missing_checkpoint_is_error() {
        let tmp        = TempDir::new().unwrap();
        let ckpt       = CheckpointManager::new(tmp.path()).unwrap();
        let mut runner = TestRunner::new(ckpt, loader(vec![sample(0.0, 0.0)]));
        assert!(runner.run_test(1).is_err());
    }

    #[test]
    fn test_empty_test_set_is_error() {
        let tmp  = TempDir::new().unwrap();
        let ckpt = CheckpointManager::new(tmp.path()).unwrap();
        save_identity(&ckpt);

        let mut runner = TestRunner::new(ckpt, loader(vec![]));
        assert!(runner.run_test(1).is_err());
    }
}
