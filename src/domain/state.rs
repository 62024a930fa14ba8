// ============================================================
// Layer 3 — Training Loop Bookkeeping
// ============================================================

use std::fmt;

/// Counters advanced by the training loop.
/// `epoch_iter` and `total_steps` count samples, not batches:
/// both grow by the configured batch size per iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainingState {
    pub epoch:       usize,
    pub epoch_iter:  usize,
    pub total_steps: usize,
}

/// Lifecycle of one TrainingLoop. There is no pause state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoopPhase {
    #[default]
    NotStarted,
    Running(TrainingState),
    Finished(TrainingState),
}

/// Which checkpoint slot a save targets.
///
/// `Latest` is overwritten on every save; `Epoch(n)` is written once
/// per qualifying epoch and never touched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckpointTag {
    Latest,
    Epoch(usize),
}

impl fmt::Display for CheckpointTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointTag::Latest       => write!(f, "latest"),
            CheckpointTag::Epoch(epoch) => write!(f, "{epoch}"),
        }
    }
}
