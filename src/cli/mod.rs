// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — runs the full training pipeline
//   2. `stats` — computes the normalization statistic for a split
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, StatsArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "mesh-trainer",
    version = "0.1.0",
    about = "Train a regressor on mesh edge features with cached normalization statistics."
)]
pub struct Cli {
    /// The subcommand to run (train or stats)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Stats(args) => run_stats(args),
        }
    }
}

fn run_train(mut args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let unknown = std::mem::take(&mut args.unknown);
    if !unknown.is_empty() {
        tracing::warn!("unknown arguments: {:?}", unknown);
    }

    tracing::info!("Starting training on meshes in: {}", args.dataroot);
    let use_case = TrainUseCase::new(args.into());
    let state    = use_case.execute()?;

    println!(
        "Training complete after epoch {} ({} samples seen).",
        state.epoch, state.total_steps
    );
    Ok(())
}

fn run_stats(args: StatsArgs) -> Result<()> {
    use crate::application::stats_use_case::StatsUseCase;

    let stats = StatsUseCase::new(args.into()).execute()?;

    println!("channels: {}", stats.channel_count());
    println!("mean:     {}", stats.mean());
    println!("std:      {}", stats.std());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use crate::infra::stat_cache::CachePolicy;
    use crate::ml::scheduler::LrPolicy;

    fn parse_train(args: &[&str]) -> TrainArgs {
        let argv = ["mesh-trainer", "train"].iter().chain(args.iter()).copied();
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Train(args) => args,
            other => panic!("expected train, got {other:?}"),
        }
    }

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let args = parse_train(&["--dataroot", "d"]);
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg, TrainConfig { dataroot: "d".into(), ..TrainConfig::default() });
    }

    #[test]
    fn test_train_flags_are_parsed() {
        let args = parse_train(&[
            "--dataroot", "d",
            "--lr-policy", "step",
            "--stats-cache", "reuse",
            "--seed", "3",
            "--serial-batches",
            "--no-normalize-features",
        ]);
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.lr_policy, LrPolicy::Step);
        assert_eq!(cfg.stats_cache, CachePolicy::Reuse);
        assert_eq!(cfg.seed, Some(3));
        assert!(cfg.serial_batches);
        assert!(!cfg.normalize_features);
    }

    #[test]
    fn test_unknown_trailing_arguments_are_collected() {
        let args = parse_train(&["--dataroot", "d", "--gpu_ids", "-1"]);
        assert_eq!(args.unknown, vec!["--gpu_ids", "-1"]);
    }

    #[test]
    fn test_stats_defaults_to_reuse() {
        let cli = Cli::try_parse_from(["mesh-trainer", "stats", "--dataroot", "d"]).unwrap();
        match cli.command {
            Commands::Stats(args) => {
                assert_eq!(args.phase, "train");
                assert_eq!(args.stats_cache, CachePolicy::Reuse);
            }
            other => panic!("expected stats, got {other:?}"),
        }
    }
}
