// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model state and the run configuration.
//
// Every run gets its own directory, named explicitly by the
// configuration rather than by wall-clock time:
//
//   <checkpoints_dir>/<name>/<run_id>/
//     train_config.json   ← resolved options for this run
//     latest_net.json     ← overwritten on every "latest" save
//     1_net.json          ← written once at the end of epoch 1
//     2_net.json          ← ...
//     loss_log.txt        ← written by the MetricsWriter
//     scalars.csv
//
// Records are JSON (serde_json) so a checkpoint can be inspected
// with any text tool. The manager does not know what a model
// looks like; it stores any Serialize type under a tag.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::state::CheckpointTag;

const CONFIG_FILE: &str = "train_config.json";

/// `<checkpoints_dir>/<name>/<run_id>`
pub fn run_dir(checkpoints_dir: impl AsRef<Path>, name: &str, run_id: &str) -> PathBuf {
    checkpoints_dir.as_ref().join(name).join(run_id)
}

/// Manages saving and loading of checkpoints in one run directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a manager, creating the directory (and parents) if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<tag>_net.json`
    pub fn network_path(&self, tag: CheckpointTag) -> PathBuf {
        self.dir.join(format!("{tag}_net.json"))
    }

    /// Write a model record under `tag`, replacing any previous file.
    pub fn save_network<T: Serialize>(&self, tag: CheckpointTag, record: &T) -> Result<()> {
        let path = self.network_path(tag);
        let json = serde_json::to_string(record)?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved checkpoint '{}'", path.display());
        Ok(())
    }

    pub fn load_network<T: DeserializeOwned>(&self, tag: CheckpointTag) -> Result<T> {
        let path = self.network_path(tag);

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Has it been saved yet?", path.display())
            })?;

        serde_json::from_str(&json)
            .with_context(|| format!("Checkpoint '{}' is not a valid model record", path.display()))
    }

    /// Save the resolved training configuration as pretty JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;

        Ok(serde_json::from_str(&json)?)
    }
}
