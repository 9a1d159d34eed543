//! Small building blocks shared by the generator and discriminator

use tch::Tensor;

/// LeakyReLU with a configurable negative slope in [0, 1)
pub fn leaky_relu(xs: &Tensor, negative_slope: f64) -> Tensor {
    xs.maximum(&(xs * negative_slope))
}
