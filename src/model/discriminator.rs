//! Discriminator network for MAD-GAN
//!
//! A single (k + 1)-way classifier: classes `0..k` identify the generator
//! that produced a sample, class `k` means "real".

use tch::{nn, nn::ModuleT, Tensor};

use super::config::{ModelConfig, SampleKind};
use super::layers::leaky_relu;

/// Discriminator network
///
/// Architecture:
/// - vector samples: MLP `dim -> hidden -> hidden -> k + 1`
/// - image samples: three stride-2 convolutions (BatchNorm on the last two)
///   with LeakyReLU, flatten, linear classifier
#[derive(Debug)]
pub struct Discriminator {
    num_classes: i64,
    net: nn::SequentialT,
}

impl Discriminator {
    /// Create a new Discriminator network
    pub fn new(vs: &nn::Path, config: &ModelConfig) -> Self {
        let num_classes = config.num_classes();
        let slope = config.leaky_slope;

        let net = match config.sample {
            SampleKind::Vector { dim } => {
                let hidden = config.hidden_dim;
                nn::seq_t()
                    .add(nn::linear(vs / "fc1", dim, hidden, Default::default()))
                    .add_fn(move |xs| leaky_relu(xs, slope))
                    .add(nn::linear(vs / "fc2", hidden, hidden, Default::default()))
                    .add_fn(move |xs| leaky_relu(xs, slope))
                    .add(nn::linear(vs / "fc_out", hidden, num_classes, Default::default()))
            }
            SampleKind::Image {
                channels,
                image_size,
            } => {
                let f = config.base_filters;
                let side = image_size / 8;
                let down = nn::ConvConfig {
                    stride: 2,
                    padding: 1,
                    ..Default::default()
                };

                nn::seq_t()
                    .add(nn::conv2d(vs / "conv1", channels, f, 4, down))
                    .add_fn(move |xs| leaky_relu(xs, slope))
                    .add(nn::conv2d(vs / "conv2", f, 2 * f, 4, down))
                    .add(nn::batch_norm2d(vs / "bn2", 2 * f, Default::default()))
                    .add_fn(move |xs| leaky_relu(xs, slope))
                    .add(nn::conv2d(vs / "conv3", 2 * f, 4 * f, 4, down))
                    .add(nn::batch_norm2d(vs / "bn3", 4 * f, Default::default()))
                    .add_fn(move |xs| leaky_relu(xs, slope))
                    .add_fn(|xs| xs.flatten(1, -1))
                    .add(nn::linear(
                        vs / "fc_out",
                        4 * f * side * side,
                        num_classes,
                        Default::default(),
                    ))
            }
        };

        Self { num_classes, net }
    }

    /// Forward pass
    ///
    /// # Returns
    ///
    /// Tensor of shape (batch_size, k + 1) with class logits
    pub fn forward_t(&self, input: &Tensor, train: bool) -> Tensor {
        let batch_size = input.size()[0];
        self.net
            .forward_t(input, train)
            .view([batch_size, self.num_classes])
    }

    pub fn num_classes(&self) -> i64 {
        self.num_classes
    }
}

impl ModuleT for Discriminator {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Tensor {
        Discriminator::forward_t(self, xs, train)
    }
}
