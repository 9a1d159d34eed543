//! Data module providing the real samples for training
//!
//! This module provides:
//! - A 1-D Gaussian mixture toy dataset
//! - An image folder dataset for MNIST-like data
//! - DataLoader for batching samples

mod gmm;
mod images;
mod loader;

pub use gmm::{samples_to_tensor, GaussianMixture, MixtureComponent};
pub use images::ImageFolder;
pub use loader::{DataLoader, DataLoaderIter};
