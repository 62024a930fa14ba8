// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `stats`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for malformed values
//   - type conversion (string → usize, f64, enums)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::stats_use_case::StatsRequest;
use crate::application::train_use_case::TrainConfig;
use crate::infra::stat_cache::CachePolicy;
use crate::ml::model::LossKind;
use crate::ml::scheduler::LrPolicy;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the edge-feature regressor on a mesh dataset
    Train(TrainArgs),

    /// Compute (or reuse) the normalization statistic for one split
    Stats(StatsArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    // ── Data ──────────────────────────────────────────────────────────────────
    /// Dataset root with `train/` and `test/` sample directories
    #[arg(long)]
    pub dataroot: String,

    /// Cap on the number of samples per epoch
    #[arg(long)]
    pub max_dataset_size: Option<usize>,

    /// Number of augmented versions per mesh (1 disables augmentation)
    #[arg(long, default_value_t = 10)]
    pub num_aug: usize,

    /// Skip (x - mean) / std on edge features
    #[arg(long)]
    pub no_normalize_features: bool,

    /// Whether an existing statistics cache may be reused
    #[arg(long, value_enum, default_value_t = CachePolicy::Recompute)]
    pub stats_cache: CachePolicy,

    /// Take batches in dataset order instead of shuffling
    #[arg(long)]
    pub serial_batches: bool,

    /// Loader worker threads
    #[arg(long, default_value_t = 1)]
    pub num_threads: usize,

    /// Seed for augmentation, shuffling and weight init
    #[arg(long)]
    pub seed: Option<u64>,

    // ── Run layout ────────────────────────────────────────────────────────────
    #[arg(long, default_value = "checkpoints")]
    pub checkpoints_dir: String,

    /// Experiment name; groups runs under `<checkpoints_dir>/<name>`
    #[arg(long, default_value = "debug")]
    pub name: String,

    /// Run identifier; reusing one resumes appending to its logs
    #[arg(long, default_value = "0")]
    pub run_id: String,

    // ── Schedule ──────────────────────────────────────────────────────────────
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    /// First epoch to run (resume point)
    #[arg(long, default_value_t = 1)]
    pub epoch_count: usize,

    /// Epochs at the starting learning rate
    #[arg(long, default_value_t = 100)]
    pub niter: usize,

    /// Epochs over which the learning rate decays
    #[arg(long, default_value_t = 500)]
    pub niter_decay: usize,

    /// Iterations between loss reports
    #[arg(long, default_value_t = 10)]
    pub print_freq: usize,

    /// Iterations between "latest" checkpoints
    #[arg(long, default_value_t = 250)]
    pub save_latest_freq: usize,

    /// Epochs between numbered checkpoints
    #[arg(long, default_value_t = 1)]
    pub save_epoch_freq: usize,

    /// Epochs between held-out evaluations
    #[arg(long, default_value_t = 1)]
    pub run_test_freq: usize,

    /// Plot weight summaries at the end of every epoch
    #[arg(long)]
    pub verbose_plot: bool,

    // ── Optimisation ──────────────────────────────────────────────────────────
    #[arg(long, default_value_t = 2e-4)]
    pub lr: f64,

    #[arg(long, value_enum, default_value_t = LrPolicy::Lambda)]
    pub lr_policy: LrPolicy,

    /// Epochs between ×0.1 drops under the step policy
    #[arg(long, default_value_t = 50)]
    pub lr_decay_iters: usize,

    #[arg(long, value_enum, default_value_t = LossKind::Mse)]
    pub loss: LossKind,

    /// Anything clap does not recognise. Reported, not rejected.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub unknown: Vec<String>,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            dataroot:           a.dataroot,
            max_dataset_size:   a.max_dataset_size,
            num_aug:            a.num_aug,
            normalize_features: !a.no_normalize_features,
            stats_cache:        a.stats_cache,
            serial_batches:     a.serial_batches,
            num_threads:        a.num_threads,
            seed:               a.seed,
            checkpoints_dir:    a.checkpoints_dir,
            name:               a.name,
            run_id:             a.run_id,
            batch_size:         a.batch_size,
            epoch_count:        a.epoch_count,
            niter:              a.niter,
            niter_decay:        a.niter_decay,
            print_freq:         a.print_freq,
            save_latest_freq:   a.save_latest_freq,
            save_epoch_freq:    a.save_epoch_freq,
            run_test_freq:      a.run_test_freq,
            verbose_plot:       a.verbose_plot,
            lr:                 a.lr,
            lr_policy:          a.lr_policy,
            lr_decay_iters:     a.lr_decay_iters,
            loss:               a.loss,
        }
    }
}

/// All arguments for the `stats` command
#[derive(Args, Debug)]
pub struct StatsArgs {
    #[arg(long)]
    pub dataroot: String,

    /// Split to compute statistics over
    #[arg(long, default_value = "train")]
    pub phase: String,

    #[arg(long)]
    pub max_dataset_size: Option<usize>,

    #[arg(long, value_enum, default_value_t = CachePolicy::Reuse)]
    pub stats_cache: CachePolicy,
}

impl From<StatsArgs> for StatsRequest {
    fn from(a: StatsArgs) -> Self {
        StatsRequest {
            dataroot:         a.dataroot,
            phase:            a.phase,
            max_dataset_size: a.max_dataset_size,
            policy:           a.stats_cache,
        }
    }
}
