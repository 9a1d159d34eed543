//! MAD-GAN wrapper combining the generator bank and the discriminator
//!
//! Provides convenient methods for training and generation.

use std::path::Path;

use tch::{nn, nn::OptimizerConfig, nn::VarStore, Device, Tensor};
use tracing::debug;

use super::config::ModelConfig;
use super::discriminator::Discriminator;
use super::generator::MultiGenerator;
use crate::error::Result;

/// Complete MAD-GAN model
pub struct MadGan {
    /// Generator bank
    pub generator: MultiGenerator,
    /// Shared discriminator
    pub discriminator: Discriminator,
    /// Variable store for the generators
    pub gen_vs: VarStore,
    /// Variable store for the discriminator
    pub disc_vs: VarStore,
    /// Device (CPU/GPU)
    pub device: Device,
    config: ModelConfig,
}

impl MadGan {
    /// Create a new MAD-GAN model with initialized weights
    pub fn new(config: ModelConfig, device: Device) -> Result<Self> {
        config.validate()?;

        let gen_vs = VarStore::new(device);
        let disc_vs = VarStore::new(device);

        let generator = MultiGenerator::new(&gen_vs.root(), &config);
        let discriminator = Discriminator::new(&disc_vs.root(), &config);

        let touched = config.init.apply(&gen_vs) + config.init.apply(&disc_vs);
        debug!("Initialized {} conv/batchnorm tensors", touched);

        Ok(Self {
            generator,
            discriminator,
            gen_vs,
            disc_vs,
            device,
            config,
        })
    }

    /// Generate samples from specific noise vectors (k * m rows)
    pub fn generate_from_noise(&self, noise: &Tensor) -> Tensor {
        self.generator.generate(noise)
    }

    /// Adam optimizer over the generator parameters
    pub fn gen_optimizer(&self, lr: f64, beta1: f64, beta2: f64) -> Result<nn::Optimizer> {
        Ok(adam(beta1, beta2).build(&self.gen_vs, lr)?)
    }

    /// Adam optimizer over the discriminator parameters
    pub fn disc_optimizer(&self, lr: f64, beta1: f64, beta2: f64) -> Result<nn::Optimizer> {
        Ok(adam(beta1, beta2).build(&self.disc_vs, lr)?)
    }

    /// Save both networks
    pub fn save(&self, gen_path: impl AsRef<Path>, disc_path: impl AsRef<Path>) -> Result<()> {
        self.gen_vs.save(gen_path)?;
        self.disc_vs.save(disc_path)?;
        Ok(())
    }

    /// Load both networks
    pub fn load(&mut self, gen_path: impl AsRef<Path>, disc_path: impl AsRef<Path>) -> Result<()> {
        self.gen_vs.load(gen_path)?;
        self.disc_vs.load(disc_path)?;
        Ok(())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn num_generators(&self) -> usize {
        self.config.num_generators
    }

    /// Size of the generator noise vector
    pub fn n_z(&self) -> i64 {
        self.config.n_z
    }
}

fn adam(beta1: f64, beta2: f64) -> nn::Adam {
    nn::Adam {
        beta1,
        beta2,
        wd: 0.0,
        ..Default::default()
    }
}
