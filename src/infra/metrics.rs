// ============================================================
// Layer 6 — Metrics Writer
// ============================================================
// The Writer implementation used by real runs. Two files in the
// run directory:
//
//   loss_log.txt — one human-readable line per loss report
//     (epoch: 3, iters: 160, time: 0.012, data: 0.004) loss: 0.23144
//
//   scalars.csv  — every plotted scalar as tag,step,value
//     data/train_loss,1760,0.231440
//     data/test_mae,3,0.118000
//     weights/weights/mean,3,0.001234
//
// Both files are opened in append mode so a resumed run with the
// same run id keeps extending the same log.
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::domain::traits::Writer;

pub const TRAIN_LOSS_SERIES: &str = "data/train_loss";

/// Writes loss lines and scalar series for one run.
pub struct MetricsWriter {
    loss_log:    BufWriter<File>,
    scalars:     BufWriter<File>,
    scalar_path: PathBuf,
}

impl MetricsWriter {
    /// Open (or create) the log files inside `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let loss_path   = dir.join("loss_log.txt");
        let scalar_path = dir.join("scalars.csv");
        let new_scalars = !scalar_path.exists();

        let mut loss_log = BufWriter::new(open_append(&loss_path)?);
        let mut scalars  = BufWriter::new(open_append(&scalar_path)?);

        writeln!(loss_log, "================ Training Loss ================")?;
        if new_scalars {
            writeln!(scalars, "tag,step,value")?;
            tracing::debug!("Created scalar CSV: '{}'", scalar_path.display());
        }

        Ok(Self { loss_log, scalars, scalar_path })
    }

    pub fn scalar_path(&self) -> &Path {
        &self.scalar_path
    }

    fn add_scalar(&mut self, tag: &str, step: usize, value: f64) -> Result<()> {
        writeln!(self.scalars, "{},{},{:.6}", tag, step, value)
            .with_context(|| format!("Cannot append to '{}'", self.scalar_path.display()))?;
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open '{}' for appending", path.display()))
}

impl Writer for MetricsWriter {
    fn print_current_losses(
        &mut self,
        epoch:           usize,
        epoch_iter:      usize,
        loss:            f32,
        time_per_sample: f64,
        data_wait:       f64,
    ) -> Result<()> {
        let line = format!(
            "(epoch: {}, iters: {}, time: {:.3}, data: {:.3}) loss: {:.5}",
            epoch, epoch_iter, time_per_sample, data_wait, loss
        );
        tracing::info!("{}", line);
        writeln!(self.loss_log, "{}", line)?;
        Ok(())
    }

    /// Global step = samples seen in earlier epochs + this epoch's count.
    fn plot_loss(
        &mut self,
        loss:         f32,
        epoch:        usize,
        epoch_iter:   usize,
        dataset_size: usize,
    ) -> Result<()> {
        let step = epoch_iter + epoch.saturating_sub(1) * dataset_size;
        self.add_scalar(TRAIN_LOSS_SERIES, step, loss as f64)
    }

    fn plot_acc(&mut self, value: f64, epoch: usize, series: &str) -> Result<()> {
        self.add_scalar(series, epoch, value)
    }

    /// Summarise each parameter tensor as mean / std / min / max.
    fn plot_model_wts(&mut self, parameters: &[(String, Vec<f32>)], epoch: usize) -> Result<()> {
        for (name, values) in parameters {
            if values.is_empty() {
                continue;
            }
            let n    = values.len() as f64;
            let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
            let var  = values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
            let min  = values.iter().copied().fold(f32::INFINITY, f32::min) as f64;
            let max  = values.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;

            self.add_scalar(&format!("weights/{name}/mean"), epoch, mean)?;
            self.add_scalar(&format!("weights/{name}/std"),  epoch, var.sqrt())?;
            self.add_scalar(&format!("weights/{name}/min"),  epoch, min)?;
            self.add_scalar(&format!("weights/{name}/max"),  epoch, max)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.loss_log.flush()?;
        self.scalars.flush()?;
        tracing::debug!("Metrics flushed to '{}'", self.scalar_path.display());
        Ok(())
    }
}
