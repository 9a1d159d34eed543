//! Training module for MAD-GAN
//!
//! This module provides:
//! - Label construction for the (k + 1)-way discriminator
//! - Generator input noise and decaying instance noise
//! - Loss routing (cross entropy or the decomposed DEGAN objectives)
//! - The training loop, per-generator sample output and metrics

mod labels;
mod losses;
mod metrics;
mod noise;
mod samples;
mod trainer;

pub use labels::{fake_labels, labels_for, GeneratorAddress};
pub use losses::{degan_discriminator_loss, degan_generator_loss, LossMode};
pub use metrics::{EMATracker, TrainingMetrics};
pub use noise::{generator_noise, InstanceNoise, InstanceNoiseConfig, NoiseDistribution};
pub use samples::{read_values_csv, tensor_values, write_generator_samples, write_values_csv};
pub use trainer::{StepLosses, Trainer, TrainingConfig};
