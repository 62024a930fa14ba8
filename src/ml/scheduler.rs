// ============================================================
// Layer 5 — Learning-Rate Scheduler
// ============================================================
// Stepped once per epoch by Model::update_learning_rate.
//
// lambda: keep the base rate, then decay linearly towards zero
//   factor(e) = 1 - max(0, e + 1 + epoch_count - niter) / (niter_decay + 1)
//
// step: divide by 10 every `lr_decay_iters` epochs
//   factor(e) = 0.1 ^ (e / lr_decay_iters)
//
// `e` is the number of scheduler steps taken so far.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LrPolicy {
    #[default]
    Lambda,
    Step,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub policy:         LrPolicy,
    pub base_lr:        f64,
    pub epoch_count:    usize,
    pub niter:          usize,
    pub niter_decay:    usize,
    pub lr_decay_iters: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LrScheduler {
    config: SchedulerConfig,
    steps:  usize,
}

impl LrScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config, steps: 0 }
    }

    /// Current learning rate.
    pub fn lr(&self) -> f64 {
        self.config.base_lr * self.factor(self.steps)
    }

    /// Advance one epoch and return the new rate.
    pub fn step(&mut self) -> f64 {
        self.steps += 1;
        self.lr()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    fn factor(&self, steps: usize) -> f64 {
        let cfg = &self.config;
        match cfg.policy {
            LrPolicy::Lambda => {
                let past = (steps + 1 + cfg.epoch_count) as i64 - cfg.niter as i64;
                let decay = past.max(0) as f64 / (cfg.niter_decay + 1) as f64;
                (1.0 - decay).max(0.0)
            }
            LrPolicy::Step => {
                let drops = steps / cfg.lr_decay_iters.max(1);
                0.1f64.powi(drops as i32)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn config(policy: LrPolicy) -> SchedulerConfig {
        SchedulerConfig {
            policy,
            base_lr:        1.0,
            epoch_count:    1,
            niter:          3,
            niter_decay:    3,
            lr_decay_iters: 2,
        }
    }

    #[test]
    fn test_lambda_holds_then_decays_linearly() {
        let mut s = LrScheduler::new(config(LrPolicy::Lambda));
        // steps + 1 + epoch_count - niter stays ≤ 0 for the first two epochs
        assert_abs_diff_eq!(s.lr(), 1.0);
        assert_abs_diff_eq!(s.step(), 1.0);
        assert_abs_diff_eq!(s.step(), 0.75);
        assert_abs_diff_eq!(s.step(), 0.5);
        assert_abs_diff_eq!(s.step(), 0.25);
        assert_abs_diff_eq!(s.step(), 0.0);
        // Never negative past the end of the schedule
        assert_abs_diff_eq!(s.step(), 0.0);
        assert_eq!(s.steps(), 6);
    }

    #[test]
    fn test_step_policy_divides_by_ten() {
        let mut s = LrScheduler::new(config(LrPolicy::Step));
        assert_abs_diff_eq!(s.lr(), 1.0);
        assert_abs_diff_eq!(s.step(), 1.0);
        assert_abs_diff_eq!(s.step(), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(s.step(), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(s.step(), 0.01, epsilon = 1e-12);
    }
}
