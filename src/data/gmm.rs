//! 1-D Gaussian mixture dataset
//!
//! The classic MAD-GAN toy problem: five well separated modes of different
//! widths. A generator set that covers every mode is the success criterion.

use ndarray::Array1;
use rand::Rng;
use rand_distr::{Distribution, Normal, WeightedIndex};
use serde::{Deserialize, Serialize};
use tch::{Kind, Tensor};

use crate::error::{MadGanError, Result};

/// One mode of the mixture
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixtureComponent {
    pub mean: f64,
    pub std: f64,
    pub weight: f64,
}

/// Weighted mixture of 1-D Gaussians
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianMixture {
    pub components: Vec<MixtureComponent>,
}

impl Default for GaussianMixture {
    fn default() -> Self {
        let modes = [(10.0, 3.0), (20.0, 3.0), (60.0, 2.0), (80.0, 2.0), (110.0, 1.0)];
        Self {
            components: modes
                .iter()
                .map(|&(mean, std)| MixtureComponent {
                    mean,
                    std,
                    weight: 0.2,
                })
                .collect(),
        }
    }
}

impl GaussianMixture {
    pub fn new(components: Vec<MixtureComponent>) -> Self {
        Self { components }
    }

    /// Check weights and standard deviations
    pub fn validate(&self) -> Result<()> {
        if self.components.is_empty() {
            return Err(MadGanError::InvalidConfig(
                "Gaussian mixture needs at least one component".to_string(),
            ));
        }
        for (i, c) in self.components.iter().enumerate() {
            if !(c.std > 0.0) || !c.std.is_finite() {
                return Err(MadGanError::InvalidConfig(format!(
                    "component {} has invalid std {}",
                    i, c.std
                )));
            }
            if !(c.weight > 0.0) {
                return Err(MadGanError::InvalidConfig(format!(
                    "component {} has non-positive weight {}",
                    i, c.weight
                )));
            }
        }
        Ok(())
    }

    /// Draw `num_samples` points from the mixture
    pub fn sample<R: Rng + ?Sized>(&self, num_samples: usize, rng: &mut R) -> Result<Array1<f64>> {
        self.validate()?;

        let picker = WeightedIndex::new(self.components.iter().map(|c| c.weight))
            .map_err(|e| MadGanError::InvalidConfig(format!("mixture weights: {}", e)))?;
        let normals = self
            .components
            .iter()
            .map(|c| {
                Normal::new(c.mean, c.std)
                    .map_err(|e| MadGanError::InvalidConfig(format!("mixture component: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Array1::from_shape_fn(num_samples, |_| {
            normals[picker.sample(rng)].sample(rng)
        }))
    }

    /// Interval covering every mode out to `num_std` standard deviations
    pub fn support(&self, num_std: f64) -> (f64, f64) {
        let lo = self
            .components
            .iter()
            .map(|c| c.mean - num_std * c.std)
            .fold(f64::INFINITY, f64::min);
        let hi = self
            .components
            .iter()
            .map(|c| c.mean + num_std * c.std)
            .fold(f64::NEG_INFINITY, f64::max);
        (lo.floor(), hi.ceil())
    }
}

/// Convert 1-D samples into a float tensor of shape (n, 1)
pub fn samples_to_tensor(samples: &Array1<f64>) -> Tensor {
    let values: Vec<f32> = samples.iter().map(|&v| v as f32).collect();
    Tensor::from_slice(&values)
        .to_kind(Kind::Float)
        .view([-1, 1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_mixture_has_five_modes() {
        let gmm = GaussianMixture::default();
        assert_eq!(gmm.components.len(), 5);
        assert!(gmm.validate().is_ok());
    }

    #[test]
    fn test_samples_cluster_around_modes() {
        let gmm = GaussianMixture::default();
        let mut rng = StdRng::seed_from_u64(7);
        let samples = gmm.sample(5000, &mut rng).unwrap();
        assert_eq!(samples.len(), 5000);

        let mean = samples.mean().unwrap();
        // Equal weights: the mixture mean is the mean of the modes (56)
        assert!((mean - 56.0).abs() < 2.0, "mean was {}", mean);

        let (lo, hi) = gmm.support(6.0);
        assert!(samples.iter().all(|&v| v > lo && v < hi));
    }

    #[test]
    fn test_support_interval() {
        let gmm = GaussianMixture::default();
        assert_eq!(gmm.support(4.0), (-2.0, 114.0));
    }

    #[test]
    fn test_invalid_mixture_is_rejected() {
        let gmm = GaussianMixture::new(vec![MixtureComponent {
            mean: 0.0,
            std: 0.0,
            weight: 1.0,
        }]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(gmm.sample(10, &mut rng).is_err());
        assert!(GaussianMixture::new(vec![]).validate().is_err());
    }

    #[test]
    fn test_samples_to_tensor_shape() {
        let samples = Array1::from(vec![1.0, 2.0, 3.0]);
        let t = samples_to_tensor(&samples);
        assert_eq!(t.size(), vec![3, 1]);
        assert_eq!(t.double_value(&[2, 0]), 3.0);
    }
}
