// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// The optimisation side of a run. Nothing in here touches the
// filesystem except through the CheckpointManager.
//
//   trainer.rs    — TrainingLoop: epochs, iterations and every
//                   cadence (print, save latest, save epoch,
//                   learning-rate step, weight plots, evaluation).
//                   Talks only to the Model / Writer / Evaluator
//                   traits.
//
//   model.rs      — LinearRegressor: pooled edge features → targets,
//                   gradient descent on MSE or L1.
//
//   scheduler.rs  — lambda / step learning-rate policies.
//
//   evaluator.rs  — TestRunner: loads the "latest" checkpoint and
//                   scores it on the test split (MAE, sign accuracy).
//
// Reference: Burn Book §4 (Dataloaders)
//            Rust Book §10 (Traits)

/// Epoch / iteration driver with logging, checkpoint and test cadences
pub mod trainer;

/// Linear regressor over pooled edge features
pub mod model;

/// Learning-rate policies
pub mod scheduler;

/// Held-out evaluation against the latest checkpoint
pub mod evaluator;
