//! Generator bank for MAD-GAN
//!
//! k generators share the same input noise. Each one is a *body* followed by
//! an output *head*. With parameter sharing a single body feeds every head,
//! otherwise each generator owns its body.
//!
//! Architectures:
//! - vector samples: MLP body `n_z -> hidden -> hidden`, linear head
//! - image samples: projection + two transposed convolutions (BatchNorm,
//!   LeakyReLU) in the body, a final transposed convolution + Tanh head

use tch::{nn, nn::ModuleT, Tensor};

use super::config::{ModelConfig, SampleKind};
use super::layers::leaky_relu;

/// All generators of a MAD-GAN model
#[derive(Debug)]
pub struct MultiGenerator {
    config: ModelConfig,
    bodies: Vec<nn::SequentialT>,
    heads: Vec<nn::SequentialT>,
}

impl MultiGenerator {
    /// Create the generator bank under `vs`
    pub fn new(vs: &nn::Path, config: &ModelConfig) -> Self {
        let num_bodies = if config.sharing {
            1
        } else {
            config.num_generators
        };

        let bodies = (0..num_bodies)
            .map(|i| body(&(vs / format!("body_{}", i)), config))
            .collect();
        let heads = (0..config.num_generators)
            .map(|g| head(&(vs / format!("head_{}", g)), config))
            .collect();

        Self {
            config: config.clone(),
            bodies,
            heads,
        }
    }

    pub fn num_generators(&self) -> usize {
        self.heads.len()
    }

    /// Run every generator on the same noise
    ///
    /// # Arguments
    ///
    /// * `noise` - Tensor of shape (m, n_z)
    /// * `train` - Whether in training mode (affects batch norm)
    ///
    /// # Returns
    ///
    /// Tensor of shape (k * m, ...) with generator g's samples in rows
    /// `g * m .. (g + 1) * m`
    pub fn forward_t(&self, noise: &Tensor, train: bool) -> Tensor {
        let outputs: Vec<Tensor> = if self.config.sharing {
            let features = self.bodies[0].forward_t(noise, train);
            self.heads
                .iter()
                .map(|head| head.forward_t(&features, train))
                .collect()
        } else {
            self.bodies
                .iter()
                .zip(&self.heads)
                .map(|(body, head)| head.forward_t(&body.forward_t(noise, train), train))
                .collect()
        };

        Tensor::cat(&outputs, 0)
    }

    /// Run a single generator
    pub fn forward_one(&self, generator: usize, noise: &Tensor, train: bool) -> Tensor {
        let body = if self.config.sharing {
            &self.bodies[0]
        } else {
            &self.bodies[generator]
        };
        self.heads[generator].forward_t(&body.forward_t(noise, train), train)
    }

    /// Generate samples in inference mode
    pub fn generate(&self, noise: &Tensor) -> Tensor {
        tch::no_grad(|| self.forward_t(noise, false))
    }
}

impl ModuleT for MultiGenerator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        MultiGenerator::forward_t(self, xs, train)
    }
}

fn body(p: &nn::Path, config: &ModelConfig) -> nn::SequentialT {
    let slope = config.leaky_slope;
    match config.sample {
        SampleKind::Vector { .. } => {
            let hidden = config.hidden_dim;
            nn::seq_t()
                .add(nn::linear(p / "fc1", config.n_z, hidden, Default::default()))
                .add_fn(move |xs| leaky_relu(xs, slope))
                .add(nn::linear(p / "fc2", hidden, hidden, Default::default()))
                .add_fn(move |xs| leaky_relu(xs, slope))
        }
        SampleKind::Image { image_size, .. } => {
            let f = config.base_filters;
            let side = image_size / 8;
            let up = nn::ConvTransposeConfig {
                stride: 2,
                padding: 1,
                ..Default::default()
            };

            nn::seq_t()
                .add(nn::linear(p / "fc", config.n_z, 4 * f * side * side, Default::default()))
                .add_fn(move |xs| xs.view([-1, 4 * f, side, side]))
                .add(nn::batch_norm2d(p / "bn0", 4 * f, Default::default()))
                .add_fn(move |xs| leaky_relu(xs, slope))
                .add(nn::conv_transpose2d(p / "convt1", 4 * f, 2 * f, 4, up))
                .add(nn::batch_norm2d(p / "bn1", 2 * f, Default::default()))
                .add_fn(move |xs| leaky_relu(xs, slope))
                .add(nn::conv_transpose2d(p / "convt2", 2 * f, f, 4, up))
                .add(nn::batch_norm2d(p / "bn2", f, Default::default()))
                .add_fn(move |xs| leaky_relu(xs, slope))
        }
    }
}

fn head(p: &nn::Path, config: &ModelConfig) -> nn::SequentialT {
    match config.sample {
        SampleKind::Vector { dim } => {
            nn::seq_t().add(nn::linear(p / "out", config.hidden_dim, dim, Default::default()))
        }
        SampleKind::Image { channels, .. } => {
            let up = nn::ConvTransposeConfig {
                stride: 2,
                padding: 1,
                ..Default::default()
            };
            nn::seq_t()
                .add(nn::conv_transpose2d(
                    p / "convt_out",
                    config.base_filters,
                    channels,
                    4,
                    up,
                ))
                .add_fn(|xs| xs.tanh())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::{nn::VarStore, Device, Kind};

    fn image_config(sharing: bool) -> ModelConfig {
        ModelConfig {
            sample: SampleKind::Image {
                channels: 1,
                image_size: 16,
            },
            n_z: 8,
            num_generators: 3,
            sharing,
            base_filters: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_vector_generator_output_shape() {
        let vs = VarStore::new(Device::Cpu);
        let config = ModelConfig {
            n_z: 10,
            hidden_dim: 16,
            ..Default::default()
        };
        let gen = MultiGenerator::new(&vs.root(), &config);

        let noise = Tensor::rand([4, 10], (Kind::Float, Device::Cpu));
        let output = gen.generate(&noise);
        assert_eq!(output.size(), vec![12, 1]);
        assert_eq!(gen.num_generators(), 3);
    }

    #[test]
    fn test_image_generator_output_shape() {
        for sharing in [false, true] {
            let vs = VarStore::new(Device::Cpu);
            let gen = MultiGenerator::new(&vs.root(), &image_config(sharing));

            let noise = Tensor::rand([2, 8], (Kind::Float, Device::Cpu));
            let output = gen.forward_t(&noise, true);
            assert_eq!(output.size(), vec![6, 1, 16, 16]);

            let max_abs = output.abs().max().double_value(&[]);
            assert!(max_abs <= 1.0);
        }
    }

    #[test]
    fn test_sharing_reduces_parameters() {
        let shared_vs = VarStore::new(Device::Cpu);
        let _shared = MultiGenerator::new(&shared_vs.root(), &image_config(true));
        let unshared_vs = VarStore::new(Device::Cpu);
        let _unshared = MultiGenerator::new(&unshared_vs.root(), &image_config(false));

        assert!(shared_vs.trainable_variables().len() < unshared_vs.trainable_variables().len());
    }

    #[test]
    fn test_forward_one_matches_slice_of_bank() {
        let vs = VarStore::new(Device::Cpu);
        let config = ModelConfig {
            n_z: 6,
            hidden_dim: 8,
            sharing: true,
            ..Default::default()
        };
        let gen = MultiGenerator::new(&vs.root(), &config);

        let noise = Tensor::rand([5, 6], (Kind::Float, Device::Cpu));
        let all = gen.generate(&noise);
        let second = tch::no_grad(|| gen.forward_one(1, &noise, false));

        let diff = (all.narrow(0, 5, 5) - second).abs().max().double_value(&[]);
        assert!(diff < 1e-6);
    }
}
