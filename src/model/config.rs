//! Network configuration shared by generators and discriminator

use serde::{Deserialize, Serialize};

use super::init::WeightInit;
use crate::error::{MadGanError, Result};

/// Shape of a single sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SampleKind {
    /// Flat vector, e.g. the 1-D mixture (dim = 1)
    Vector { dim: i64 },
    /// Square image of `image_size` pixels per side
    Image { channels: i64, image_size: i64 },
}

impl SampleKind {
    /// Sample shape without the batch dimension
    pub fn shape(&self) -> Vec<i64> {
        match *self {
            Self::Vector { dim } => vec![dim],
            Self::Image {
                channels,
                image_size,
            } => vec![channels, image_size, image_size],
        }
    }
}

/// Configuration of a MAD-GAN model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Sample geometry
    pub sample: SampleKind,
    /// Size of the generator noise vector
    pub n_z: i64,
    /// Number of generators
    pub num_generators: usize,
    /// Share every generator layer except the output head
    pub sharing: bool,
    /// Negative slope of the LeakyReLU activations
    pub leaky_slope: f64,
    /// Width of the MLP hidden layers (vector samples)
    pub hidden_dim: i64,
    /// Base number of filters (image samples)
    pub base_filters: i64,
    /// Weight initialization of conv and batchnorm layers
    pub init: WeightInit,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            sample: SampleKind::Vector { dim: 1 },
            n_z: 100,
            num_generators: 3,
            sharing: false,
            leaky_slope: 0.2,
            hidden_dim: 128,
            base_filters: 64,
            init: WeightInit::default(),
        }
    }
}

impl ModelConfig {
    /// Number of discriminator classes: one per generator plus "real"
    pub fn num_classes(&self) -> i64 {
        self.num_generators as i64 + 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_generators == 0 {
            return Err(MadGanError::InvalidConfig(format!(
                "Invalid number of generators. Has to be greater than zero. You entered {}",
                self.num_generators
            )));
        }
        if self.n_z <= 0 {
            return Err(MadGanError::InvalidConfig(format!(
                "n_z has to be greater than 0. You entered {}",
                self.n_z
            )));
        }
        if !(0.0..1.0).contains(&self.leaky_slope) {
            return Err(MadGanError::InvalidConfig(format!(
                "leaky_slope has to be in [0, 1). You entered {}",
                self.leaky_slope
            )));
        }
        match self.sample {
            SampleKind::Vector { dim } if dim <= 0 => {
                return Err(MadGanError::InvalidConfig(format!(
                    "sample dimension has to be greater than 0. You entered {}",
                    dim
                )));
            }
            SampleKind::Vector { .. } if self.hidden_dim <= 0 => {
                return Err(MadGanError::InvalidConfig(format!(
                    "hidden_dim has to be greater than 0. You entered {}",
                    self.hidden_dim
                )));
            }
            SampleKind::Image {
                channels,
                image_size,
            } => {
                if channels <= 0 {
                    return Err(MadGanError::InvalidConfig(format!(
                        "num_channels has to be greater than 0. You entered {}",
                        channels
                    )));
                }
                if image_size <= 0 || image_size % 8 != 0 {
                    return Err(MadGanError::InvalidConfig(format!(
                        "image_size has to be a positive multiple of 8. You entered {}",
                        image_size
                    )));
                }
                if self.base_filters <= 0 {
                    return Err(MadGanError::InvalidConfig(format!(
                        "base_filters has to be greater than 0. You entered {}",
                        self.base_filters
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }
}
