//! DataLoader for batching and iterating over training samples
//!
//! Supports:
//! - Random shuffling per epoch
//! - Optionally dropping the last incomplete batch
//! - Iteration over batches

use rand::seq::SliceRandom;
use tch::{Device, Tensor};

/// DataLoader over a tensor of samples (first dimension = sample index)
pub struct DataLoader {
    /// Full dataset, e.g. (N, 1) or (N, C, H, W)
    data: Tensor,
    /// Batch size
    batch_size: usize,
    /// Whether to shuffle data each epoch
    shuffle: bool,
    /// Whether to drop the last incomplete batch
    drop_last: bool,
    /// Device the batches are moved to
    device: Device,
    /// Current indices for iteration
    indices: Vec<i64>,
    /// Current position in iteration
    current_idx: usize,
}

impl DataLoader {
    /// Create a new DataLoader
    ///
    /// # Arguments
    ///
    /// * `data` - Samples stacked along the first dimension
    /// * `batch_size` - Number of samples per batch
    /// * `shuffle` - Whether to shuffle data each epoch
    /// * `drop_last` - Whether to drop incomplete final batch
    /// * `device` - Device for the produced batches
    pub fn new(data: Tensor, batch_size: usize, shuffle: bool, drop_last: bool, device: Device) -> Self {
        let num_samples = data.size()[0];
        let indices: Vec<i64> = (0..num_samples).collect();

        let mut loader = Self {
            data,
            batch_size: batch_size.max(1),
            shuffle,
            drop_last,
            device,
            indices,
            current_idx: 0,
        };

        if shuffle {
            loader.shuffle_indices();
        }

        loader
    }

    /// Get the number of batches per epoch
    pub fn num_batches(&self) -> usize {
        let num_samples = self.num_samples();
        if self.drop_last {
            num_samples / self.batch_size
        } else {
            (num_samples + self.batch_size - 1) / self.batch_size
        }
    }

    /// Get total number of samples
    pub fn num_samples(&self) -> usize {
        self.indices.len()
    }

    /// Shape of a single sample
    pub fn sample_shape(&self) -> Vec<i64> {
        self.data.size()[1..].to_vec()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Shuffle indices for a new epoch
    fn shuffle_indices(&mut self) {
        let mut rng = rand::thread_rng();
        self.indices.shuffle(&mut rng);
    }

    /// Reset for new epoch
    pub fn reset(&mut self) {
        self.current_idx = 0;
        if self.shuffle {
            self.shuffle_indices();
        }
    }

    /// Get next batch
    ///
    /// Returns None when epoch is complete
    pub fn next_batch(&mut self) -> Option<Tensor> {
        let num_samples = self.indices.len();
        let start = self.current_idx;

        if start >= num_samples {
            return None;
        }

        let end = (start + self.batch_size).min(num_samples);

        if self.drop_last && end - start < self.batch_size {
            return None;
        }

        let index = Tensor::from_slice(&self.indices[start..end]);
        let batch = self.data.index_select(0, &index).to_device(self.device);

        self.current_idx = end;
        Some(batch)
    }

    /// Iterate over all batches of a fresh epoch
    pub fn iter(&mut self) -> DataLoaderIter<'_> {
        self.reset();
        DataLoaderIter { loader: self }
    }

    /// Underlying sample tensor
    pub fn data(&self) -> &Tensor {
        &self.data
    }
}

/// Iterator adapter for DataLoader
pub struct DataLoaderIter<'a> {
    loader: &'a mut DataLoader,
}

impl<'a> Iterator for DataLoaderIter<'a> {
    type Item = Tensor;

    fn next(&mut self) -> Option<Self::Item> {
        self.loader.next_batch()
    }
}
