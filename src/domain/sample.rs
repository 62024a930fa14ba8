// ============================================================
// Layer 3 — Sample and Batch Domain Types
// ============================================================
// A Sample is one mesh's worth of numeric fields produced by the
// (external) feature extractor, e.g.
//
//   "edge_features" → [channels, edges]
//   "target"        → [outputs]
//
// A Batch is the same field map after N samples have been stacked
// along a new leading axis:
//
//   "edge_features" → [N, channels, edges]
//   "target"        → [N, outputs]
//
// BTreeMap keeps field iteration deterministic, which matters for
// anything that walks the fields in order (collation, hashing).

use std::collections::BTreeMap;

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Field holding the per-edge input features, shape `[channels, edges]`.
pub const EDGE_FEATURES: &str = "edge_features";

/// Field holding the regression targets, shape `[outputs]`.
pub const TARGET: &str = "target";

// ─── Sample ───────────────────────────────────────────────────────────────────
/// One dataset element: field name → numeric array.
/// Serialises as a plain JSON object so sample files stay readable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sample {
    fields: BTreeMap<String, ArrayD<f32>>,
}

impl Sample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy when assembling samples in tests
    pub fn with_field(mut self, name: impl Into<String>, values: ArrayD<f32>) -> Self {
        self.insert(name, values);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, values: ArrayD<f32>) {
        self.fields.insert(name.into(), values);
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ArrayD<f32>> {
        self.fields.get_mut(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ─── Batch ────────────────────────────────────────────────────────────────────
/// Stacked samples. Every array's first axis has length `len()`.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    fields: BTreeMap<String, ArrayD<f32>>,
    len:    usize,
}

impl Batch {
    /// Create an empty batch that will hold `len` samples per field
    pub fn new(len: usize) -> Self {
        Self { fields: BTreeMap::new(), len }
    }

    pub fn insert(&mut self, name: impl Into<String>, stacked: ArrayD<f32>) {
        self.fields.insert(name.into(), stacked);
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of samples stacked into this batch
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
