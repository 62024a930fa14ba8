// ============================================================
// Layer 4 — Mesh Dataset
// ============================================================
// A directory of pre-extracted mesh samples:
//
//   <dataroot>/
//     mean_std_cache        ← written by the StatCache
//     train/*.json          ← one Sample per file
//     test/*.json
//
// Files are loaded eagerly and in sorted path order, so index i
// always means the same mesh within a run.
//
// Two views of a sample:
//   sample(i)  → raw features, augmentation applied if enabled
//                (what the StatCache iterates)
//   get(i)     → sample(i) plus normalization once stats are ready
//                (what burn's DataLoader iterates)
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use anyhow::{Context, Result};
use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, Rng};
use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use crate::data::normalize::FeatureNormalizer;
use crate::domain::sample::{Sample, EDGE_FEATURES};
use crate::domain::stats::NormalizationStats;
use crate::infra::context::{ExecutionContext, RngStream};

/// Relative feature jitter applied to augmented copies
const JITTER: f32 = 0.05;

// ─── StatsDataset ─────────────────────────────────────────────────────────────
/// What the StatCache needs from a dataset.
pub trait StatsDataset {
    /// Number of samples in range (may be capped below what is on disk)
    fn size(&self) -> usize;

    /// Un-normalized sample at `index`, or `None` past the end
    fn sample(&self, index: usize) -> Option<Sample>;

    /// Directory the cache artifact is keyed on
    fn root(&self) -> &Path;

    fn sample_paths(&self) -> &[PathBuf];

    /// Augmentation setting; 1 means no augmentation
    fn num_aug(&self) -> usize;

    fn set_num_aug(&mut self, num_aug: usize);

    /// Install the computed statistic (mean, std, channel count) and
    /// mark the dataset's stats as ready.
    fn set_stats(&mut self, stats: NormalizationStats);
}

// ─── Options ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct DatasetOptions {
    pub max_dataset_size:   Option<usize>,
    pub num_aug:            usize,
    pub normalize_features: bool,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            max_dataset_size:   None,
            num_aug:            1,
            normalize_features: true,
        }
    }
}

// ─── MeshDataset ──────────────────────────────────────────────────────────────
pub struct MeshDataset {
    root:       PathBuf,
    paths:      Vec<PathBuf>,
    samples:    Vec<Sample>,
    size:       usize,
    options:    DatasetOptions,
    stats:      Option<NormalizationStats>,
    normalizer: Option<FeatureNormalizer>,
    rng:        Mutex<StdRng>,
}

impl MeshDataset {
    /// Load every `*.json` sample under `<root>/<phase>`.
    pub fn open(
        root:    impl Into<PathBuf>,
        phase:   &str,
        options: DatasetOptions,
        ctx:     &ExecutionContext,
    ) -> Result<Self> {
        let root = root.into();
        let dir  = root.join(phase);

        let mut paths = Vec::new();
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Cannot read sample directory '{}'", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let samples = paths
            .iter()
            .map(|path| load_sample(path))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!("Loaded {} samples from '{}'", samples.len(), dir.display());
        Ok(Self::from_samples(root, paths, samples, options, ctx))
    }

    /// Build from samples already in memory. `paths[i]` names where
    /// `samples[i]` came from.
    pub fn from_samples(
        root:    impl Into<PathBuf>,
        paths:   Vec<PathBuf>,
        samples: Vec<Sample>,
        options: DatasetOptions,
        ctx:     &ExecutionContext,
    ) -> Self {
        let size = options
            .max_dataset_size
            .map_or(samples.len(), |cap| cap.min(samples.len()));

        Self {
            root: root.into(),
            paths,
            samples,
            size,
            options,
            stats: None,
            normalizer: None,
            rng: Mutex::new(ctx.rng(RngStream::Augmentation)),
        }
    }

    pub fn stats(&self) -> Option<&NormalizationStats> {
        self.stats.as_ref()
    }

    pub fn stats_ready(&self) -> bool {
        self.stats.is_some()
    }

    /// Shape of the first sample's field, if any
    pub fn field_shape(&self, field: &str) -> Option<Vec<usize>> {
        self.samples.first()?.get(field).map(|a| a.shape().to_vec())
    }

    fn augment(&self, sample: &mut Sample) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);

        // Version 0 is the untouched mesh
        let version = rng.gen_range(0..self.options.num_aug);
        if version == 0 {
            return;
        }
        if let Some(features) = sample.get_mut(EDGE_FEATURES) {
            features.mapv_inplace(|v| v * (1.0 + rng.gen_range(-JITTER..JITTER)));
        }
    }
}

fn load_sample(path: &Path) -> Result<Sample> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open sample '{}'", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Cannot parse sample '{}'", path.display()))
}

impl StatsDataset for MeshDataset {
    fn size(&self) -> usize {
        self.size
    }

    fn sample(&self, index: usize) -> Option<Sample> {
        if index >= self.size {
            return None;
        }
        let mut sample = self.samples.get(index)?.clone();
        if self.options.num_aug > 1 {
            self.augment(&mut sample);
        }
        Some(sample)
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn sample_paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn num_aug(&self) -> usize {
        self.options.num_aug
    }

    fn set_num_aug(&mut self, num_aug: usize) {
        self.options.num_aug = num_aug.max(1);
    }

    fn set_stats(&mut self, stats: NormalizationStats) {
        self.normalizer = Some(FeatureNormalizer::new(&stats));
        self.stats      = Some(stats);
    }
}

// ─── Burn Dataset Trait Implementation ────────────────────────────────────────
// This is what the DataLoader pulls samples through.
impl Dataset<Sample> for MeshDataset {
    fn get(&self, index: usize) -> Option<Sample> {
        let mut sample = self.sample(index)?;
        if self.options.normalize_features {
            if let (Some(normalizer), Some(features)) =
                (&self.normalizer, sample.get_mut(EDGE_FEATURES))
            {
                normalizer.apply(features);
            }
        }
        Some(sample)
    }

    fn len(&self) -> usize {
        self.size
    }
}
