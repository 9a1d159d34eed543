//! Noise sources
//!
//! Two unrelated kinds of noise are used during training:
//! - latent noise fed to the generators
//! - instance noise added to fake samples before the discriminator sees them

use serde::{Deserialize, Serialize};
use tch::{Device, Kind, Tensor};
use tracing::info;

/// Distribution of the generator input noise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseDistribution {
    /// Uniform on [-1, 1]
    #[default]
    Uniform,
    /// Standard normal
    Normal,
}

/// Draw a batch of generator input noise of shape (batch_size, n_z)
pub fn generator_noise(
    batch_size: i64,
    n_z: i64,
    distribution: NoiseDistribution,
    device: Device,
) -> Tensor {
    match distribution {
        NoiseDistribution::Uniform => {
            Tensor::rand([batch_size, n_z], (Kind::Float, device)) * 2.0 - 1.0
        }
        NoiseDistribution::Normal => Tensor::randn([batch_size, n_z], (Kind::Float, device)),
    }
}

/// Schedule for the additive instance noise
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstanceNoiseConfig {
    /// Initial standard deviation
    pub std: f64,
    /// Multiplicative decay applied on every interval
    pub decay_factor: f64,
    /// Decay interval in iterations
    pub interval: usize,
}

impl Default for InstanceNoiseConfig {
    fn default() -> Self {
        Self {
            std: 0.1,
            decay_factor: 0.98,
            interval: 1000,
        }
    }
}

/// Gaussian instance noise with a decaying standard deviation
#[derive(Debug, Clone)]
pub struct InstanceNoise {
    std: f64,
    decay_factor: f64,
    interval: usize,
}

impl InstanceNoise {
    pub fn new(config: InstanceNoiseConfig) -> Self {
        Self {
            std: config.std,
            decay_factor: config.decay_factor,
            interval: config.interval.max(1),
        }
    }

    /// Current standard deviation
    pub fn std(&self) -> f64 {
        self.std
    }

    /// Zero-mean Gaussian noise shaped like `like`
    pub fn sample_like(&self, like: &Tensor) -> Tensor {
        Tensor::randn_like(like) * self.std
    }

    /// Replay the decays of iterations `0..iters`, e.g. after a resume
    pub fn fast_forward(&mut self, iters: usize) {
        let decays = if iters == 0 {
            0
        } else {
            (iters - 1) / self.interval + 1
        };
        self.std *= self.decay_factor.powi(decays as i32);
    }

    /// Advance the schedule after iteration `iters` has drawn its noise
    ///
    /// Returns the new standard deviation when a decay happened.
    pub fn step(&mut self, iters: usize) -> Option<f64> {
        if iters % self.interval != 0 {
            return None;
        }

        self.std *= self.decay_factor;
        info!("noise std is now {}", self.std);
        Some(self.std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_noise_bounds() {
        let noise = generator_noise(256, 100, NoiseDistribution::Uniform, Device::Cpu);
        assert_eq!(noise.size(), vec![256, 100]);

        let min_val = noise.min().double_value(&[]);
        let max_val = noise.max().double_value(&[]);
        assert!(min_val >= -1.0 && max_val <= 1.0);
        // 25600 draws should not all land on one side of zero
        assert!(min_val < 0.0 && max_val > 0.0);
    }

    #[test]
    fn test_normal_noise_shape() {
        let noise = generator_noise(8, 16, NoiseDistribution::Normal, Device::Cpu);
        assert_eq!(noise.size(), vec![8, 16]);
    }

    #[test]
    fn test_instance_noise_decays_on_interval() {
        let mut noise = InstanceNoise::new(InstanceNoiseConfig {
            std: 1.0,
            decay_factor: 0.5,
            interval: 10,
        });

        assert_eq!(noise.step(0), Some(0.5));
        for iters in 1..10 {
            assert_eq!(noise.step(iters), None);
        }
        assert_eq!(noise.step(10), Some(0.25));
        assert_eq!(noise.std(), 0.25);
    }

    #[test]
    fn test_fast_forward_matches_stepping() {
        let config = InstanceNoiseConfig {
            std: 1.0,
            decay_factor: 0.9,
            interval: 4,
        };
        for iters in [0, 1, 4, 5, 9, 12] {
            let mut stepped = InstanceNoise::new(config);
            for i in 0..iters {
                stepped.step(i);
            }
            let mut jumped = InstanceNoise::new(config);
            jumped.fast_forward(iters);
            assert!((stepped.std() - jumped.std()).abs() < 1e-12, "iters = {}", iters);
        }
    }

    #[test]
    fn test_instance_noise_scale() {
        let noise = InstanceNoise::new(InstanceNoiseConfig {
            std: 0.0,
            ..Default::default()
        });
        let like = Tensor::ones([4, 1], (Kind::Float, Device::Cpu));
        let sample = noise.sample_like(&like);
        assert_eq!(sample.size(), vec![4, 1]);
        assert_eq!(sample.abs().sum(Kind::Float).double_value(&[]), 0.0);
    }
}
