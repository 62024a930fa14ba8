// ============================================================
// Layer 4 — Batch Collator
// ============================================================
// Implements Burn's Batcher trait to merge a Vec<Sample> into one
// Batch keyed by field name.
//
// How batching works here:
//   Input:  N samples, each with fields f → array of shape S_f
//   Output: Batch with fields f → array of shape [N, S_f...]
//
// The field set of the FIRST sample defines the batch schema.
// Every later sample must carry the same fields with the same
// shapes; anything else is a schema error and no partial batch is
// produced. The final batch of an epoch may be shorter than the
// configured batch size and is collated like any other.
//
// Reference: Burn Book §4 (Batcher)

use burn::data::dataloader::batcher::Batcher;
use ndarray::{ArrayViewD, Axis};

use crate::domain::sample::{Batch, Sample};

#[derive(Debug, thiserror::Error)]
pub enum CollateError {
    #[error("cannot collate an empty list of samples")]
    Empty,

    #[error("sample {index} is missing field '{field}' present in the first sample")]
    MissingField { field: String, index: usize },

    #[error("field '{field}' has mismatched shapes across samples: {source}")]
    Shape {
        field:  String,
        #[source]
        source: ndarray::ShapeError,
    },
}

/// Stateless: the batch layout is fully determined by the samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchCollator;

impl BatchCollator {
    pub fn new() -> Self {
        Self
    }

    /// Stack every field of `samples` along a new leading axis,
    /// preserving sample order.
    pub fn collate(&self, samples: &[Sample]) -> Result<Batch, CollateError> {
        let first     = samples.first().ok_or(CollateError::Empty)?;
        let mut batch = Batch::new(samples.len());

        for field in first.field_names() {
            let views = samples
                .iter()
                .enumerate()
                .map(|(index, sample)| {
                    sample
                        .get(field)
                        .map(|a| a.view())
                        .ok_or_else(|| CollateError::MissingField { field: field.to_string(), index })
                })
                .collect::<Result<Vec<ArrayViewD<'_, f32>>, _>>()?;

            let stacked = ndarray::stack(Axis(0), &views)
                .map_err(|source| CollateError::Shape { field: field.to_string(), source })?;
            batch.insert(field, stacked);
        }

        Ok(batch)
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// burn's batch() cannot return an error, so a schema error becomes a
// panic on the loader thread, which aborts the run.
impl Batcher<Sample, Batch> for BatchCollator {
    fn batch(&self, items: Vec<Sample>) -> Batch {
        match self.collate(&items) {
            Ok(batch) => batch,
            Err(e)    => panic!("batch collation failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, arr1, ArrayD, IxDyn};

    fn sample(i: usize) -> Sample {
        let i = i as f32;
        Sample::new()
            .with_field("a", arr0(i).into_dyn())
            .with_field("b", arr1(&[i, i + 0.5, i + 0.25]).into_dyn())
    }

    #[test]
    fn test_stacks_scalars_and_vectors() {
        let samples: Vec<Sample> = (0..4).map(sample).collect();
        let batch = BatchCollator::new().collate(&samples).unwrap();

        assert_eq!(batch.len(), 4);
        assert_eq!(batch.get("a").unwrap().shape(), &[4]);
        assert_eq!(batch.get("b").unwrap().shape(), &[4, 3]);
    }

    #[test]
    fn test_preserves_sample_order() {
        let samples: Vec<Sample> = (0..5).map(sample).collect();
        let batch = BatchCollator::new().collate(&samples).unwrap();

        let a = batch.get("a").unwrap();
        let b = batch.get("b").unwrap();
        for i in 0..5 {
            assert_eq!(a[[i]], i as f32);
            assert_eq!(b[[i, 1]], i as f32 + 0.5);
        }
    }

    #[test]
    fn test_short_batch_keeps_input_length() {
        let batch = BatchCollator::new().collate(&[sample(7)]).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.get("b").unwrap().shape(), &[1, 3]);
    }

    #[test]
    fn test_missing_field_is_error() {
        let partial = Sample::new().with_field("a", arr0(1.0).into_dyn());
        let err = BatchCollator::new().collate(&[sample(0), partial]).unwrap_err();
        assert!(matches!(err, CollateError::MissingField { ref field, index: 1 } if field == "b"));
    }

    #[test]
    fn test_shape_mismatch_is_error() {
        let odd = Sample::new()
            .with_field("a", arr0(1.0).into_dyn())
            .with_field("b", ArrayD::zeros(IxDyn(&[2])));
        let err = BatchCollator::new().collate(&[sample(0), odd]).unwrap_err();
        assert!(matches!(err, CollateError::Shape { .. }));
    }

    #[test]
    fn test_empty_input_is_error() {
        assert!(matches!(BatchCollator::new().collate(&[]), Err(CollateError::Empty)));
    }

    #[test]
    #[should_panic(expected = "batch collation failed")]
    fn test_batcher_panics_on_schema_error() {
        let partial = Sample::new().with_field("a", arr0(1.0).into_dyn());
        let _ = BatchCollator::new().batch(vec![sample(0), partial]);
    }
}
