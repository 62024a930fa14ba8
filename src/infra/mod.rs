// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that touch the filesystem or process
// state:
//
//   stat_cache.rs  — Normalization statistics. Runs the full
//                    un-augmented pass over a dataset, writes
//                    the mean / std artifact and reads it back.
//
//   checkpoint.rs  — Run directories, model checkpoints and the
//                    saved training configuration.
//
//   metrics.rs     — Loss log and scalar CSV (the Writer used by
//                    real runs).
//
//   context.rs     — Explicit seeding: per-collaborator random
//                    streams derived from one optional seed.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Per-dataset mean / std computation and on-disk cache
pub mod stat_cache;

/// Model checkpoint and config saving / loading
pub mod checkpoint;

/// Loss log and scalar series writer
pub mod metrics;

/// Seeded random streams
pub mod context;
