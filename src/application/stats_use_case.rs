// ============================================================
// Layer 2 — StatsUseCase
// ============================================================
// Computes (or reuses) the normalization statistic for one split
// without training anything. Handy for warming the cache before a
// long run, or for checking a dataset's channel ranges.

use anyhow::{Context, Result};

use crate::data::dataset::{DatasetOptions, MeshDataset};
use crate::domain::stats::NormalizationStats;
use crate::infra::context::ExecutionContext;
use crate::infra::stat_cache::{CachePolicy, StatCache};

#[derive(Debug, Clone)]
pub struct StatsRequest {
    pub dataroot:         String,
    pub phase:            String,
    pub max_dataset_size: Option<usize>,
    pub policy:           CachePolicy,
}

pub struct StatsUseCase {
    request: StatsRequest,
}

impl StatsUseCase {
    pub fn new(request: StatsRequest) -> Self {
        Self { request }
    }

    pub fn execute(&self) -> Result<NormalizationStats> {
        let req = &self.request;

        let options = DatasetOptions {
            max_dataset_size:   req.max_dataset_size,
            num_aug:            1,
            normalize_features: false,
        };
        let mut dataset = MeshDataset::open(&req.dataroot, &req.phase, options, &ExecutionContext::new(None))?;

        let stats = StatCache::new(req.policy)
            .compute_or_load(&mut dataset)
            .with_context(|| format!("Cannot compute statistics for '{}'", req.dataroot))?;

        tracing::info!(
            "{} channels, cache at '{}'",
            stats.channel_count(),
            StatCache::cache_path(&dataset).display()
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::{Sample, EDGE_FEATURES};
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_stats_for_split() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("train");
        fs::create_dir_all(&dir).unwrap();
        for (i, value) in [1.0f32, 3.0].into_iter().enumerate() {
            let sample = Sample::new().with_field(EDGE_FEATURES, arr2(&[[value, value]]).into_dyn());
            fs::write(dir.join(format!("{i}.json")), serde_json::to_string(&sample).unwrap()).unwrap();
        }

        let request = StatsRequest {
            dataroot:         tmp.path().display().to_string(),
            phase:            "train".into(),
            max_dataset_size: None,
            policy:           CachePolicy::Recompute,
        };
        let stats = StatsUseCase::new(request).execute().unwrap();

        assert_eq!(stats.channel_count(), 1);
        assert_abs_diff_eq!(stats.mean()[0], 2.0);
        assert_abs_diff_eq!(stats.std()[0], 0.0);
        assert!(tmp.path().join("mean_std_cache").is_file());
    }

    #[test]
    fn test_missing_split_is_error() {
        let tmp     = TempDir::new().unwrap();
        let request = StatsRequest {
            dataroot:         tmp.path().display().to_string(),
            phase:            "train".into(),
            max_dataset_size: None,
            policy:           CachePolicy::Reuse,
        };
        assert!(StatsUseCase::new(request).execute().is_err());
    }
}
