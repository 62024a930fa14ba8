// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Drives a Model over a DataLoader for a range of epochs and
// fires the logging, checkpoint, learning-rate and evaluation
// cadences around it.
//
//   for epoch in epoch_count ..= niter + niter_decay
//       for (i, batch) in loader
//           set_input → optimize_parameters
//           i % print_freq == 0            → print + plot loss
//           (i + 1) % save_latest_freq == 0 → save "latest"
//       epoch % save_epoch_freq == 0      → save "latest", save <epoch>
//       update_learning_rate               (once per epoch)
//       verbose_plot                       → plot weights
//       epoch % run_test_freq == 0, > 0    → evaluate, plot MAE + sign acc
//
// The loop never catches a collaborator error. The first failure
// propagates out of `run` and the loop stays in its Running phase.
//
// Reference: Rust Book §10 (Generic Types and Traits)

use std::time::Instant;

use anyhow::{bail, Result};
use burn::data::dataloader::DataLoader;
use serde::{Deserialize, Serialize};

use crate::domain::sample::Batch;
use crate::domain::state::{CheckpointTag, LoopPhase, TrainingState};
use crate::domain::traits::{Evaluator, Model, Writer};

pub const TEST_MAE_SERIES:      &str = "data/test_mae";
pub const TEST_SIGN_ACC_SERIES: &str = "data/test_sign_acc";

/// The subset of the configuration the loop reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub epoch_count:      usize,
    pub niter:            usize,
    pub niter_decay:      usize,
    pub batch_size:       usize,
    pub print_freq:       usize,
    pub save_latest_freq: usize,
    pub save_epoch_freq:  usize,
    pub run_test_freq:    usize,
    pub verbose_plot:     bool,
}

impl Schedule {
    /// Last epoch, inclusive.
    pub fn last_epoch(&self) -> usize {
        self.niter + self.niter_decay
    }

    pub fn validate(&self) -> Result<()> {
        let cadences = [
            ("batch_size",       self.batch_size),
            ("print_freq",       self.print_freq),
            ("save_latest_freq", self.save_latest_freq),
            ("save_epoch_freq",  self.save_epoch_freq),
            ("run_test_freq",    self.run_test_freq),
        ];
        for (name, value) in cadences {
            if value == 0 {
                bail!("{name} must be at least 1");
            }
        }
        Ok(())
    }
}

pub struct TrainingLoop {
    schedule:     Schedule,
    dataset_size: usize,
    phase:        LoopPhase,
}

impl TrainingLoop {
    pub fn new(schedule: Schedule, dataset_size: usize) -> Result<Self> {
        schedule.validate()?;
        Ok(Self { schedule, dataset_size, phase: LoopPhase::NotStarted })
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    /// Run every epoch of the schedule. Returns the final counters.
    pub fn run<M, W, E>(
        &mut self,
        loader:    &dyn DataLoader<Batch>,
        model:     &mut M,
        writer:    &mut W,
        evaluator: &mut E,
    ) -> Result<TrainingState>
    where
        M: Model + ?Sized,
        W: Writer + ?Sized,
        E: Evaluator + ?Sized,
    {
        if self.phase != LoopPhase::NotStarted {
            bail!("Training loop has already been started");
        }

        let s          = self.schedule;
        let last_epoch = s.last_epoch();
        let mut state  = TrainingState { epoch: s.epoch_count, ..TrainingState::default() };
        self.phase     = LoopPhase::Running(state);

        tracing::info!(
            "Training epochs {}..={} over {} samples (batch size {})",
            s.epoch_count, last_epoch, self.dataset_size, s.batch_size
        );

        for epoch in s.epoch_count..=last_epoch {
            let epoch_start    = Instant::now();
            let mut data_ready = Instant::now();
            state.epoch        = epoch;
            state.epoch_iter   = 0;

            for (i, batch) in loader.iter().enumerate() {
                let iter_start = Instant::now();
                let data_wait  = iter_start.duration_since(data_ready).as_secs_f64();

                state.total_steps += s.batch_size;
                state.epoch_iter  += s.batch_size;
                self.phase         = LoopPhase::Running(state);

                model.set_input(batch)?;
                model.optimize_parameters()?;

                if i % s.print_freq == 0 {
                    let per_sample = iter_start.elapsed().as_secs_f64() / s.batch_size as f64;
                    let loss       = model.loss();
                    writer.print_current_losses(epoch, state.epoch_iter, loss, per_sample, data_wait)?;
                    writer.plot_loss(loss, epoch, state.epoch_iter, self.dataset_size)?;
                }

                if (i + 1) % s.save_latest_freq == 0 {
                    tracing::info!(
                        "saving the latest model (epoch {}, total_steps {})",
                        epoch, state.total_steps
                    );
                    model.save_network(CheckpointTag::Latest)?;
                }

                data_ready = Instant::now();
            }

            if epoch % s.save_epoch_freq == 0 {
                tracing::info!(
                    "saving the model at the end of epoch {}, iters {}",
                    epoch, state.total_steps
                );
                model.save_network(CheckpointTag::Latest)?;
                model.save_network(CheckpointTag::Epoch(epoch))?;
            }

            tracing::info!(
                "End of epoch {} / {} \t Time Taken: {} sec",
                epoch, last_epoch, epoch_start.elapsed().as_secs()
            );

            model.update_learning_rate()?;

            if s.verbose_plot {
                writer.plot_model_wts(&model.parameters(), epoch)?;
            }

            if epoch % s.run_test_freq == 0 && epoch > 0 {
                let report = evaluator.run_test(epoch)?;
                writer.plot_acc(report.mean_absolute_error, epoch, TEST_MAE_SERIES)?;
                writer.plot_acc(report.sign_accuracy,       epoch, TEST_SIGN_ACC_SERIES)?;
            }
        }

        self.phase = LoopPhase::Finished(state);
        Ok(state)
    }
}
