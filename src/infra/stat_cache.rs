// ============================================================
// Layer 6 — Normalization Statistics Cache
// ============================================================
// Computes the per-channel mean / std of the edge features over a
// full, un-augmented pass of a dataset and persists it next to the
// data so later runs can reuse it.
//
// Pass over the data:
//   1. Augmentation is switched off (num_aug = 1) and restored
//      afterwards, also when the pass fails.
//   2. For every sample in 0..size:
//        mean_sum += features.mean(axis = 1)
//        std_sum  += features.std(axis = 1)
//   3. Both sums are divided by the number of samples processed.
//
// The std is the mean of per-sample stds, not a pooled std over all
// edges of all samples.
//
// Persistence:
//   <dataset root>/mean_std_cache  (bincode)
//     { fingerprint, mean: [C,1], std: [C,1], ninput_channels: C }
//
// Every computed record is written first and then read back from
// disk, so the stats the caller gets are exactly what the next run
// will load.
//
// Reuse is opt-in (CachePolicy::Reuse). A cached record is only
// trusted when its fingerprint matches the current data; otherwise
// it is recomputed and overwritten.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use ndarray::{Array1, Array2, Axis, Ix2};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::data::dataset::StatsDataset;
use crate::domain::sample::EDGE_FEATURES;
use crate::domain::stats::NormalizationStats;

/// File name of the cache artifact inside the dataset root
pub const CACHE_FILE_NAME: &str = "mean_std_cache";

const PROGRESS_EVERY: usize = 500;

// ─── Errors ───────────────────────────────────────────────────────────────────
#[derive(Debug, thiserror::Error)]
pub enum StatCacheError {
    #[error("cannot access stats cache '{path}': {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed stats cache '{path}': {source}")]
    Malformed {
        path:   PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("stats cache '{path}' holds inconsistent mean/std/channel data")]
    Inconsistent { path: PathBuf },

    #[error("dataset at '{root}' has no samples to compute statistics from")]
    EmptyDataset { root: PathBuf },

    #[error("sample {index} has no '{field}' field")]
    MissingField { field: &'static str, index: usize },

    #[error("sample {index}: expected non-empty [channels, edges] features, got shape {shape:?}")]
    BadShape { index: usize, shape: Vec<usize> },

    #[error("sample {index} has non-finite edge features")]
    NonFinite { index: usize },

    #[error("statistics accumulated over {processed} samples are not finite")]
    Overflow { processed: usize },
}

// ─── Policy ───────────────────────────────────────────────────────────────────
/// Whether an existing cache artifact may be trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Always run the full pass and overwrite the artifact
    #[default]
    Recompute,
    /// Load the artifact when its fingerprint matches the data
    Reuse,
}

// ─── Persisted record ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub fingerprint:     String,
    pub mean:            Array2<f32>,
    pub std:             Array2<f32>,
    pub ninput_channels: usize,
}

impl CacheRecord {
    pub fn new(fingerprint: String, stats: &NormalizationStats) -> Self {
        Self {
            fingerprint,
            mean:            stats.mean_column(),
            std:             stats.std_column(),
            ninput_channels: stats.channel_count(),
        }
    }

    fn into_stats(self, path: &Path) -> Result<NormalizationStats, StatCacheError> {
        NormalizationStats::from_columns(&self.mean, &self.std, self.ninput_channels)
            .ok_or_else(|| StatCacheError::Inconsistent { path: path.to_path_buf() })
    }
}

/// Write a record, overwriting whatever is at `path`.
pub fn save_record(path: &Path, record: &CacheRecord) -> Result<(), StatCacheError> {
    let io_err = |source| StatCacheError::Io { path: path.to_path_buf(), source };

    let file       = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, record)
        .map_err(|e| io_err(io::Error::new(io::ErrorKind::Other, e)))?;
    writer.flush().map_err(io_err)
}

pub fn load_record(path: &Path) -> Result<CacheRecord, StatCacheError> {
    let file = File::open(path)
        .map_err(|source| StatCacheError::Io { path: path.to_path_buf(), source })?;
    bincode::deserialize_from(BufReader::new(file))
        .map_err(|source| StatCacheError::Malformed { path: path.to_path_buf(), source })
}

// ─── Augmentation guard ───────────────────────────────────────────────────────
// Holds the dataset with augmentation off; the previous setting is
// put back on drop, so early returns via `?` cannot leak it.
struct AugmentationGuard<'a, D: StatsDataset + ?Sized> {
    dataset: &'a mut D,
    saved:   usize,
}

impl<'a, D: StatsDataset + ?Sized> AugmentationGuard<'a, D> {
    fn disable(dataset: &'a mut D) -> Self {
        let saved = dataset.num_aug();
        dataset.set_num_aug(1);
        Self { dataset, saved }
    }

    fn dataset(&self) -> &D {
        self.dataset
    }
}

impl<D: StatsDataset + ?Sized> Drop for AugmentationGuard<'_, D> {
    fn drop(&mut self) {
        self.dataset.set_num_aug(self.saved);
    }
}

// ─── StatCache ────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default)]
pub struct StatCache {
    policy: CachePolicy,
}

impl StatCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self { policy }
    }

    /// `<root>/mean_std_cache` when the root directory exists,
    /// otherwise next to the first sample file.
    pub fn cache_path<D: StatsDataset + ?Sized>(dataset: &D) -> PathBuf {
        let root = dataset.root();
        if root.is_dir() {
            return root.join(CACHE_FILE_NAME);
        }
        dataset
            .sample_paths()
            .first()
            .and_then(|p| p.parent())
            .map(|dir| dir.join(CACHE_FILE_NAME))
            .unwrap_or_else(|| root.join(CACHE_FILE_NAME))
    }

    /// Produce the dataset's normalization statistic and install it on
    /// the dataset (`mean`, `std`, `channel_count`, `stats_ready`).
    pub fn compute_or_load<D: StatsDataset + ?Sized>(
        &self,
        dataset: &mut D,
    ) -> Result<NormalizationStats, StatCacheError> {
        let path = Self::cache_path(&*dataset);

        let stats = {
            let guard       = AugmentationGuard::disable(&mut *dataset);
            let fingerprint = fingerprint(guard.dataset());

            match self.reusable(&path, &fingerprint)? {
                Some(stats) => {
                    tracing::warn!("Using cached mean / std from {}", path.display());
                    stats
                }
                None => {
                    tracing::info!("Computing mean / std from train data...");
                    let stats = accumulate(guard.dataset())?;
                    save_record(&path, &CacheRecord::new(fingerprint, &stats))?;
                    tracing::info!("Saved normalization statistics: {}", path.display());

                    // Read back what was written; that is what later runs will see
                    load_record(&path)?.into_stats(&path)?
                }
            }
        };

        dataset.set_stats(stats.clone());
        Ok(stats)
    }

    fn reusable(
        &self,
        path:        &Path,
        fingerprint: &str,
    ) -> Result<Option<NormalizationStats>, StatCacheError> {
        if self.policy == CachePolicy::Recompute || !path.is_file() {
            return Ok(None);
        }

        let record = load_record(path)?;
        if record.fingerprint != fingerprint {
            tracing::warn!(
                "Stats cache '{}' does not match the current data, recomputing",
                path.display()
            );
            return Ok(None);
        }
        record.into_stats(path).map(Some)
    }
}

/// Mean of per-sample channel means and of per-sample channel stds.
fn accumulate<D: StatsDataset + ?Sized>(dataset: &D) -> Result<NormalizationStats, StatCacheError> {
    let size = dataset.size();
    let mut sums: Option<(Array1<f32>, Array1<f32>)> = None;
    let mut processed = 0usize;

    for index in 0..size {
        let Some(sample) = dataset.sample(index) else { break };
        if index % PROGRESS_EVERY == 0 {
            tracing::info!("{} of {}", index, size);
        }

        let raw = sample.get(EDGE_FEATURES).ok_or(StatCacheError::MissingField {
            field: EDGE_FEATURES,
            index,
        })?;
        let bad_shape = || StatCacheError::BadShape { index, shape: raw.shape().to_vec() };

        let features = raw.view().into_dimensionality::<Ix2>().map_err(|_| bad_shape())?;
        if features.nrows() == 0 {
            return Err(bad_shape());
        }
        if !features.iter().all(|v| v.is_finite()) {
            return Err(StatCacheError::NonFinite { index });
        }
        let mean     = features.mean_axis(Axis(1)).ok_or_else(bad_shape)?;
        let std      = features.std_axis(Axis(1), 0.0);

        match sums.as_mut() {
            None => sums = Some((mean, std)),
            Some((mean_sum, std_sum)) => {
                if mean_sum.len() != mean.len() {
                    return Err(bad_shape());
                }
                *mean_sum += &mean;
                *std_sum  += &std;
            }
        }
        processed += 1;
    }

    let (mean_sum, std_sum) = sums.ok_or_else(|| StatCacheError::EmptyDataset {
        root: dataset.root().to_path_buf(),
    })?;
    let n    = processed as f32;
    let mean = mean_sum / n;
    let std  = std_sum / n;

    // Finite inputs can still overflow f32 when summed
    if !mean.iter().chain(std.iter()).all(|v| v.is_finite()) {
        return Err(StatCacheError::Overflow { processed });
    }
    NormalizationStats::new(mean, std).ok_or(StatCacheError::Overflow { processed })
}

/// SHA-256 over the sample count and the raw features of the first
/// and last sample in range.
fn fingerprint<D: StatsDataset + ?Sized>(dataset: &D) -> String {
    let size       = dataset.size();
    let mut hasher = Sha256::new();
    hasher.update((size as u64).to_le_bytes());

    if size > 0 {
        for index in [0, size - 1] {
            let Some(sample)   = dataset.sample(index) else { continue };
            let Some(features) = sample.get(EDGE_FEATURES) else { continue };
            for dim in features.shape() {
                hasher.update((*dim as u64).to_le_bytes());
            }
            for value in features.iter() {
                hasher.update(value.to_le_bytes());
            }
        }
    }

    format!("{:x}", hasher.finalize())
}
