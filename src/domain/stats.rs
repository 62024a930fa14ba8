// ============================================================
// Layer 3 — Normalization Statistics
// ============================================================
// Per-channel mean and standard deviation of the edge features,
// computed once per dataset by the StatCache and then used to
// rescale every sample before it reaches the model.
//
// Invariants (checked by the constructors):
//   mean.len() == std.len() == channel_count
//   channel_count > 0
//   std[i] >= 0
//
// A zero std is allowed. The normalizer replaces it with 1.0 at
// division time instead of rejecting the statistic here.

use ndarray::{Array1, Array2, Axis};

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationStats {
    mean:          Array1<f32>,
    std:           Array1<f32>,
    channel_count: usize,
}

impl NormalizationStats {
    /// Returns `None` when the invariants above do not hold.
    pub fn new(mean: Array1<f32>, std: Array1<f32>) -> Option<Self> {
        let channel_count = mean.len();
        if channel_count == 0 || std.len() != channel_count {
            return None;
        }
        // `!(s >= 0.0)` also rejects NaN
        if std.iter().any(|s| !(*s >= 0.0)) {
            return None;
        }
        Some(Self { mean, std, channel_count })
    }

    /// Build from the persisted `[channels, 1]` column layout.
    pub fn from_columns(
        mean:          &Array2<f32>,
        std:           &Array2<f32>,
        channel_count: usize,
    ) -> Option<Self> {
        if mean.ncols() != 1 || std.ncols() != 1 || mean.nrows() != channel_count {
            return None;
        }
        Self::new(mean.column(0).to_owned(), std.column(0).to_owned())
    }

    pub fn mean(&self) -> &Array1<f32> {
        &self.mean
    }

    pub fn std(&self) -> &Array1<f32> {
        &self.std
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Mean as a `[channels, 1]` column vector
    pub fn mean_column(&self) -> Array2<f32> {
        self.mean.clone().insert_axis(Axis(1))
    }

    /// Std as a `[channels, 1]` column vector
    pub fn std_column(&self) -> Array2<f32> {
        self.std.clone().insert_axis(Axis(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_rejects_length_mismatch() {
        assert!(NormalizationStats::new(arr1(&[0.0, 1.0]), arr1(&[1.0])).is_none());
    }

    #[test]
    fn test_rejects_empty_and_negative() {
        assert!(NormalizationStats::new(arr1(&[]), arr1(&[])).is_none());
        assert!(NormalizationStats::new(arr1(&[0.0]), arr1(&[-0.5])).is_none());
        assert!(NormalizationStats::new(arr1(&[0.0]), arr1(&[f32::NAN])).is_none());
    }

    #[test]
    fn test_zero_std_is_valid() {
        let stats = NormalizationStats::new(arr1(&[3.0, 4.0]), arr1(&[0.0, 0.0])).unwrap();
        assert_eq!(stats.channel_count(), 2);
    }

    #[test]
    fn test_column_layout_round_trip() {
        let stats = NormalizationStats::new(arr1(&[1.0, 2.0, 3.0]), arr1(&[0.1, 0.2, 0.3])).unwrap();
        let mean  = stats.mean_column();
        assert_eq!(mean.dim(), (3, 1));

        let back = NormalizationStats::from_columns(&mean, &stats.std_column(), 3).unwrap();
        assert_eq!(back, stats);
    }
}
