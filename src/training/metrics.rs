//! Training metrics for monitoring MAD-GAN progress
//!
//! Loss histories are kept per iteration (the raw training signal) and per
//! epoch (averages). They are exported as CSV for external plotting.

use std::path::Path;

use crate::error::{MadGanError, Result};

/// Metrics collected during training
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingMetrics {
    /// Discriminator loss per iteration
    pub d_losses: Vec<f64>,
    /// Generator loss per iteration
    pub g_losses: Vec<f64>,
    /// Average discriminator loss per epoch
    pub epoch_d_losses: Vec<f64>,
    /// Average generator loss per epoch
    pub epoch_g_losses: Vec<f64>,
    /// KL diagnostic as (iteration, value)
    pub kl_divergences: Vec<(usize, f64)>,
}

impl TrainingMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the losses of one iteration
    pub fn record_iteration(&mut self, d_loss: f64, g_loss: f64) {
        self.d_losses.push(d_loss);
        self.g_losses.push(g_loss);
    }

    /// Record epoch averages
    pub fn record_epoch(&mut self, d_loss: f64, g_loss: f64) {
        self.epoch_d_losses.push(d_loss);
        self.epoch_g_losses.push(g_loss);
    }

    pub fn record_kl(&mut self, iteration: usize, value: f64) {
        self.kl_divergences.push((iteration, value));
    }

    /// Number of recorded iterations
    pub fn num_iterations(&self) -> usize {
        self.d_losses.len()
    }

    /// Number of recorded epochs
    pub fn num_epochs(&self) -> usize {
        self.epoch_d_losses.len()
    }

    /// Get latest discriminator loss
    pub fn latest_d_loss(&self) -> Option<f64> {
        self.d_losses.last().copied()
    }

    /// Get latest generator loss
    pub fn latest_g_loss(&self) -> Option<f64> {
        self.g_losses.last().copied()
    }

    pub fn latest_kl(&self) -> Option<f64> {
        self.kl_divergences.last().map(|&(_, v)| v)
    }

    /// Save per-iteration losses to CSV
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        writer.write_record(["iteration", "d_loss", "g_loss"])?;
        for (i, (d, g)) in self.d_losses.iter().zip(&self.g_losses).enumerate() {
            writer.write_record([i.to_string(), d.to_string(), g.to_string()])?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Load per-iteration losses from CSV
    pub fn load_csv(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut metrics = Self::new();

        for (row, result) in reader.records().enumerate() {
            let record = result?;
            let column = |i: usize| {
                record.get(i).ok_or_else(|| {
                    MadGanError::InvalidInput(format!(
                        "losses row {} has {} columns, expected iteration,d_loss,g_loss",
                        row + 1,
                        record.len()
                    ))
                })
            };
            metrics.record_iteration(column(1)?.trim().parse()?, column(2)?.trim().parse()?);
        }

        Ok(metrics)
    }
}

/// Exponential moving average tracker
#[derive(Debug)]
pub struct EMATracker {
    value: f64,
    alpha: f64,
    initialized: bool,
}

impl EMATracker {
    /// Create new EMA tracker
    ///
    /// # Arguments
    ///
    /// * `alpha` - Smoothing factor (0 < alpha <= 1). Higher = more weight on recent
    pub fn new(alpha: f64) -> Self {
        Self {
            value: 0.0,
            alpha: alpha.clamp(0.001, 1.0),
            initialized: false,
        }
    }

    /// Update with new value
    pub fn update(&mut self, new_value: f64) {
        if !self.initialized {
            self.value = new_value;
            self.initialized = true;
        } else {
            self.value = self.alpha * new_value + (1.0 - self.alpha) * self.value;
        }
    }

    /// Get current EMA value
    pub fn value(&self) -> f64 {
        self.value
    }
}
