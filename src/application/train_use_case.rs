// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate and log the options       (Layer 2)
//   Step 2: Open the training split            (Layer 4 - data)
//   Step 3: Normalization statistics           (Layer 6 - infra)
//   Step 4: Open the test split (train stats)  (Layer 4 - data)
//   Step 5: Run directory + saved config       (Layer 6 - infra)
//   Step 6: Build the data loaders             (Layer 4 - data)
//   Step 7: Build model, writer, evaluator     (Layer 5 / 6)
//   Step 8: Run the training loop              (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §4 (Datasets and Dataloaders)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{
    dataset::{DatasetOptions, MeshDataset, StatsDataset},
    loader::{build_loader, LoaderOptions},
};
use crate::domain::sample::{EDGE_FEATURES, TARGET};
use crate::domain::state::TrainingState;
use crate::domain::traits::Writer;
use crate::infra::{
    checkpoint::{run_dir, CheckpointManager},
    context::{ExecutionContext, RngStream},
    metrics::MetricsWriter,
    stat_cache::{CachePolicy, StatCache},
};
use crate::ml::{
    evaluator::TestRunner,
    model::{LinearRegressor, LossKind},
    scheduler::{LrPolicy, SchedulerConfig},
    trainer::{Schedule, TrainingLoop},
};

pub const TRAIN_PHASE: &str = "train";
pub const TEST_PHASE:  &str = "test";

// ─── Training Configuration ──────────────────────────────────────────────────
// Every option of a training run. Saved next to the checkpoints so a
// run can be inspected (and its options reloaded) later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    // data
    pub dataroot:           String,
    pub max_dataset_size:   Option<usize>,
    pub num_aug:            usize,
    pub normalize_features: bool,
    pub stats_cache:        CachePolicy,
    pub serial_batches:     bool,
    pub num_threads:        usize,
    pub seed:               Option<u64>,

    // run layout
    pub checkpoints_dir:    String,
    pub name:               String,
    pub run_id:             String,

    // schedule
    pub batch_size:         usize,
    pub epoch_count:        usize,
    pub niter:              usize,
    pub niter_decay:        usize,
    pub print_freq:         usize,
    pub save_latest_freq:   usize,
    pub save_epoch_freq:    usize,
    pub run_test_freq:      usize,
    pub verbose_plot:       bool,

    // optimisation
    pub lr:                 f64,
    pub lr_policy:          LrPolicy,
    pub lr_decay_iters:     usize,
    pub loss:               LossKind,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            dataroot:           "datasets/meshes".to_string(),
            max_dataset_size:   None,
            num_aug:            10,
            normalize_features: true,
            stats_cache:        CachePolicy::Recompute,
            serial_batches:     false,
            num_threads:        1,
            seed:               None,

            checkpoints_dir:    "checkpoints".to_string(),
            name:               "debug".to_string(),
            run_id:             "0".to_string(),

            batch_size:         16,
            epoch_count:        1,
            niter:              100,
            niter_decay:        500,
            print_freq:         10,
            save_latest_freq:   250,
            save_epoch_freq:    1,
            run_test_freq:      1,
            verbose_plot:       false,

            lr:                 2e-4,
            lr_policy:          LrPolicy::Lambda,
            lr_decay_iters:     50,
            loss:               LossKind::Mse,
        }
    }
}

impl TrainConfig {
    /// Reject configurations the pipeline cannot run.
    pub fn validate(&self) -> Result<()> {
        self.schedule().validate()?;
        if self.num_aug == 0 {
            bail!("num_aug must be at least 1");
        }
        if self.lr_decay_iters == 0 {
            bail!("lr_decay_iters must be at least 1");
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            bail!("lr must be a positive number, got {}", self.lr);
        }
        if self.epoch_count > self.niter + self.niter_decay {
            bail!(
                "epoch_count {} is past the last epoch {}",
                self.epoch_count,
                self.niter + self.niter_decay
            );
        }
        if self.name.is_empty() || self.run_id.is_empty() {
            bail!("name and run_id must not be empty");
        }
        if self.evaluates_between_epoch_saves() {
            tracing::warn!(
                "run_test_freq {} is not a multiple of save_epoch_freq {}; \
                 evaluation may read a stale 'latest' checkpoint",
                self.run_test_freq,
                self.save_epoch_freq
            );
        }
        Ok(())
    }

    /// True when some evaluation epoch has no epoch-end save before it,
    /// so the evaluator reads whatever "latest" was written last.
    pub fn evaluates_between_epoch_saves(&self) -> bool {
        self.run_test_freq.checked_rem(self.save_epoch_freq) != Some(0)
    }

    pub fn schedule(&self) -> Schedule {
        Schedule {
            epoch_count:      self.epoch_count,
            niter:            self.niter,
            niter_decay:      self.niter_decay,
            batch_size:       self.batch_size,
            print_freq:       self.print_freq,
            save_latest_freq: self.save_latest_freq,
            save_epoch_freq:  self.save_epoch_freq,
            run_test_freq:    self.run_test_freq,
            verbose_plot:     self.verbose_plot,
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            policy:         self.lr_policy,
            base_lr:        self.lr,
            epoch_count:    self.epoch_count,
            niter:          self.niter,
            niter_decay:    self.niter_decay,
            lr_decay_iters: self.lr_decay_iters,
        }
    }

    pub fn dataset_options(&self) -> DatasetOptions {
        DatasetOptions {
            max_dataset_size:   self.max_dataset_size,
            num_aug:            self.num_aug,
            normalize_features: self.normalize_features,
        }
    }

    /// `<checkpoints_dir>/<name>/<run_id>`
    pub fn run_dir(&self) -> PathBuf {
        run_dir(&self.checkpoints_dir, &self.name, &self.run_id)
    }

    /// Log every option, sorted by name.
    fn log_options(&self) -> Result<()> {
        let value = serde_json::to_value(self)?;
        tracing::info!("------------ Options -------------");
        if let serde_json::Value::Object(map) = value {
            for (key, value) in map {
                tracing::info!("{}: {}", key, value);
            }
        }
        tracing::info!("-------------- End ----------------");
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingState> {
        let cfg = &self.config;

        // ── Step 1: Options ───────────────────────────────────────────────────
        cfg.validate()?;
        cfg.log_options()?;
        let ctx = ExecutionContext::new(cfg.seed);

        // ── Step 2: Training split ────────────────────────────────────────────
        let mut train = MeshDataset::open(&cfg.dataroot, TRAIN_PHASE, cfg.dataset_options(), &ctx)?;
        let dataset_size = train.size();
        if dataset_size == 0 {
            bail!("No training samples under '{}/{}'", cfg.dataroot, TRAIN_PHASE);
        }
        tracing::info!("#training meshes = {}", dataset_size / cfg.batch_size);

        // ── Step 3: Normalization statistics ──────────────────────────────────
        // Always from the training split; the test split reuses them.
        let stats = StatCache::new(cfg.stats_cache)
            .compute_or_load(&mut train)
            .context("Failed to compute normalization statistics")?;

        // ── Step 4: Test split ────────────────────────────────────────────────
        let test_options = DatasetOptions { num_aug: 1, ..cfg.dataset_options() };
        let mut test     = MeshDataset::open(&cfg.dataroot, TEST_PHASE, test_options, &ctx)?;
        if let Some(shape) = test.field_shape(EDGE_FEATURES) {
            if shape.first() != Some(&stats.channel_count()) {
                bail!(
                    "Test features have shape {:?}, training statistics cover {} channels",
                    shape,
                    stats.channel_count()
                );
            }
        }
        test.set_stats(stats.clone());

        // ── Step 5: Run directory ─────────────────────────────────────────────
        let checkpoints = CheckpointManager::new(cfg.run_dir())?;
        checkpoints.save_config(cfg)?;
        tracing::info!("Run directory: '{}'", checkpoints.dir().display());

        // ── Step 6: Loaders ───────────────────────────────────────────────────
        let channels = stats.channel_count();
        let outputs  = train
            .field_shape(TARGET)
            .map(|shape| shape.iter().product::<usize>())
            .context("Training samples have no target field")?;

        let train_loader = build_loader(
            train,
            LoaderOptions {
                batch_size:   cfg.batch_size,
                shuffle_seed: (!cfg.serial_batches).then(|| ctx.shuffle_seed()),
                num_workers:  cfg.num_threads,
            },
        );
        let test_loader = build_loader(
            test,
            LoaderOptions { batch_size: cfg.batch_size, shuffle_seed: None, num_workers: 1 },
        );

        // ── Step 7: Collaborators ─────────────────────────────────────────────
        let mut model = LinearRegressor::new(
            channels,
            outputs,
            cfg.loss,
            cfg.scheduler(),
            checkpoints.clone(),
            &mut ctx.rng(RngStream::ModelInit),
        );
        let mut writer    = MetricsWriter::new(checkpoints.dir())?;
        let mut evaluator = TestRunner::new(checkpoints, test_loader);

        // ── Step 8: Train ─────────────────────────────────────────────────────
        let mut training = TrainingLoop::new(cfg.schedule(), dataset_size)?;
        let state = training.run(train_loader.as_ref(), &mut model, &mut writer, &mut evaluator)?;

        tracing::info!("Finished training");
        writer.close()?;
        Ok(state)
    }
}
