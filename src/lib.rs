//! # MAD-GAN: multi-agent diverse generative adversarial networks
//!
//! This crate trains a bank of generators against a single discriminator
//! that has to tell the real data apart from the output of each individual
//! generator. The generators are pushed towards different modes of the data
//! distribution, which is easy to observe on a 1-D Gaussian mixture and on
//! MNIST-like image folders.
//!
//! ## Modules
//!
//! - `data`: Gaussian mixture sampling, image folders and batching
//! - `model`: Generator bank, (k + 1)-way discriminator and weight init
//! - `training`: Labels, noise, losses and the training loop
//! - `utils`: Configuration, checkpoints, KL diagnostic and output helpers

pub mod data;
pub mod error;
pub mod model;
pub mod training;
pub mod utils;

pub use data::{samples_to_tensor, DataLoader, GaussianMixture, ImageFolder, MixtureComponent};
pub use error::{MadGanError, Result};
pub use model::{Discriminator, MadGan, ModelConfig, MultiGenerator, SampleKind};
pub use training::{LossMode, Trainer, TrainingConfig, TrainingMetrics};
pub use utils::{kl_divergence, load_checkpoint, save_checkpoint, Config, RunDirectory};
