//! Loss functions for MAD-GAN training
//!
//! The discriminator is a (k + 1)-way classifier, so every loss is built on
//! softmax cross entropy over the origin classes.

use serde::{Deserialize, Serialize};
use tch::{Kind, Tensor};

const LOG_EPS: f64 = 1e-8;

/// Loss routing between the joint and the decomposed (DEGAN) objectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossMode {
    /// Cross entropy over the full label set
    #[default]
    CrossEntropy,
    /// Decomposed real/fake objectives
    Degan,
}

impl LossMode {
    pub fn from_degan_flag(degan: bool) -> Self {
        if degan {
            Self::Degan
        } else {
            Self::CrossEntropy
        }
    }

    /// Discriminator loss on real and (detached) fake logits
    pub fn discriminator_loss(
        &self,
        real_logits: &Tensor,
        fake_logits: &Tensor,
        real_labels: &Tensor,
        fake_labels: &Tensor,
    ) -> Tensor {
        match self {
            Self::CrossEntropy => {
                let logits = Tensor::cat(&[real_logits, fake_logits], 0);
                let labels = Tensor::cat(&[real_labels, fake_labels], 0);
                logits.cross_entropy_for_logits(&labels)
            }
            Self::Degan => degan_discriminator_loss(real_logits, fake_logits, real_labels, fake_labels),
        }
    }

    /// Generator loss on the discriminator's response to fresh fakes
    ///
    /// `real_labels` must address the "real" class for every fake sample.
    pub fn generator_loss(&self, fake_logits: &Tensor, real_labels: &Tensor) -> Tensor {
        match self {
            Self::CrossEntropy => fake_logits.cross_entropy_for_logits(real_labels),
            Self::Degan => degan_generator_loss(fake_logits),
        }
    }
}

/// Decomposed discriminator loss: CE(real) + CE(fake)
///
/// Each origin is averaged separately so the real term keeps its weight no
/// matter how many generators contribute fakes.
pub fn degan_discriminator_loss(
    real_logits: &Tensor,
    fake_logits: &Tensor,
    real_labels: &Tensor,
    fake_labels: &Tensor,
) -> Tensor {
    real_logits.cross_entropy_for_logits(real_labels)
        + fake_logits.cross_entropy_for_logits(fake_labels)
}

/// Decomposed generator loss: mean(log(1 - p_real(G(z))))
///
/// The "real" class is the last column of the logits.
pub fn degan_generator_loss(fake_logits: &Tensor) -> Tensor {
    let num_classes = fake_logits.size()[1];
    let p_real = fake_logits
        .softmax(-1, Kind::Float)
        .select(1, num_classes - 1);
    (-p_real + 1.0 + LOG_EPS).log().mean(Kind::Float)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::labels::{fake_labels, labels_for};
    use tch::Device;

    fn logits_for(classes: &[i64], num_classes: i64, confidence: f64) -> Tensor {
        let labels = Tensor::from_slice(classes);
        labels.one_hot(num_classes).to_kind(Kind::Float) * confidence
    }

    #[test]
    fn test_cross_entropy_losses_are_scalar() {
        let real = Tensor::randn([6, 4], (Kind::Float, Device::Cpu));
        let fake = Tensor::randn([6, 4], (Kind::Float, Device::Cpu));
        let real_labels = labels_for(3, -1, 6, Device::Cpu).unwrap();
        let fake_lbls = fake_labels(3, 2, Device::Cpu).unwrap();

        for mode in [LossMode::CrossEntropy, LossMode::Degan] {
            let d_loss = mode.discriminator_loss(&real, &fake, &real_labels, &fake_lbls);
            let g_loss = mode.generator_loss(&fake, &real_labels);
            assert_eq!(d_loss.size(), Vec::<i64>::new());
            assert_eq!(g_loss.size(), Vec::<i64>::new());
            assert!(d_loss.double_value(&[]).is_finite());
            assert!(g_loss.double_value(&[]).is_finite());
        }
    }

    #[test]
    fn test_perfect_discriminator_has_small_loss() {
        let real = logits_for(&[3, 3, 3], 4, 20.0);
        let fake = logits_for(&[0, 1, 2], 4, 20.0);
        let real_labels = labels_for(3, -1, 3, Device::Cpu).unwrap();
        let fake_lbls = fake_labels(3, 1, Device::Cpu).unwrap();

        let joint = LossMode::CrossEntropy.discriminator_loss(&real, &fake, &real_labels, &fake_lbls);
        let split = LossMode::Degan.discriminator_loss(&real, &fake, &real_labels, &fake_lbls);
        assert!(joint.double_value(&[]) < 1e-3);
        assert!(split.double_value(&[]) < 1e-3);
    }

    #[test]
    fn test_degan_generator_loss_prefers_real_looking_fakes() {
        let fooled = logits_for(&[3, 3], 4, 10.0);
        let caught = logits_for(&[0, 1], 4, 10.0);

        let fooled_loss = degan_generator_loss(&fooled).double_value(&[]);
        let caught_loss = degan_generator_loss(&caught).double_value(&[]);
        assert!(fooled_loss < caught_loss);
        assert!(caught_loss <= 0.0);
    }

    #[test]
    fn test_loss_mode_from_flag() {
        assert_eq!(LossMode::from_degan_flag(true), LossMode::Degan);
        assert_eq!(LossMode::from_degan_flag(false), LossMode::CrossEntropy);
    }
}
