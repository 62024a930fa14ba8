// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between sample files on disk and batches handed to
// the training loop:
//
//   <dataroot>/<phase>/*.json
//       │
//       ▼
//   MeshDataset        → loads samples, augments, normalizes
//       │                (normalization stats come from the
//       │                 StatCache in the infra layer)
//       ▼
//   BatchCollator      → stacks samples into a Batch
//       │
//       ▼
//   DataLoader (burn)  → shuffles, batches, optional workers
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Directory-of-samples dataset implementing Burn's Dataset trait
pub mod dataset;

/// Per-channel (x - mean) / std with a zero-std guard
pub mod normalize;

/// Implements Burn's Batcher trait to stack samples into batches
pub mod collator;

/// DataLoaderBuilder wiring (batch size, shuffling, workers)
pub mod loader;
