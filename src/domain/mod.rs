// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain data types and the capability traits every other layer
// programs against.
//
// Rules for this layer:
//   - NO burn framework types allowed here
//   - NO file I/O
//   - Only structs, enums and traits (ndarray is allowed because
//     samples and statistics are numeric arrays by nature)
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Per-sample field maps and stacked batches
pub mod sample;

// Per-channel mean / standard deviation
pub mod stats;

// Loop bookkeeping: training state, phases, checkpoint tags
pub mod state;

// Model / Writer / Evaluator capability traits
pub mod traits;
