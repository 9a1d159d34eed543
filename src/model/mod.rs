//! Model module containing the MAD-GAN networks
//!
//! This module provides:
//! - A bank of generators, optionally sharing all but their output layer
//! - A (k + 1)-way discriminator
//! - The MadGan wrapper owning both networks and their variable stores

mod config;
mod discriminator;
mod generator;
mod init;
mod layers;
mod madgan;

pub use config::{ModelConfig, SampleKind};
pub use discriminator::Discriminator;
pub use generator::MultiGenerator;
pub use init::WeightInit;
pub use layers::leaky_relu;
pub use madgan::MadGan;
