// ============================================================
// Layer 4 — Feature Normalizer
// ============================================================
// Applies (x - mean[c]) / std[c] to every edge of every channel.
//
// A channel whose std is zero (constant across the dataset) would
// divide by zero, so its divisor is replaced by 1.0: the channel is
// still centred, just not scaled.

use ndarray::{Array1, ArrayD};

use crate::domain::stats::NormalizationStats;

#[derive(Debug, Clone)]
pub struct FeatureNormalizer {
    mean:    Array1<f32>,
    divisor: Array1<f32>,
}

impl FeatureNormalizer {
    pub fn new(stats: &NormalizationStats) -> Self {
        let divisor = stats
            .std()
            .mapv(|s| if s > f32::EPSILON { s } else { 1.0 });
        Self { mean: stats.mean().clone(), divisor }
    }

    pub fn channel_count(&self) -> usize {
        self.mean.len()
    }

    /// Normalise `[channels, edges]` features in place.
    /// Rows beyond the statistic's channel count are left untouched.
    pub fn apply(&self, features: &mut ArrayD<f32>) {
        for (mut row, (&mean, &divisor)) in features
            .outer_iter_mut()
            .zip(self.mean.iter().zip(self.divisor.iter()))
        {
            row.mapv_inplace(|x| (x - mean) / divisor);
        }
    }
}
