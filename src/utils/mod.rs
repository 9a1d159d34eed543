//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling
//! - Checkpoint save/load utilities
//! - The KL-divergence diagnostic for 1-D samples
//! - Image grid output and the results directory layout

mod checkpoint;
mod config;
mod divergence;
mod image_grid;
mod run_dir;

pub use checkpoint::{
    find_latest_checkpoint, load_checkpoint, load_checkpoint_meta, resolve_checkpoint,
    save_checkpoint, save_model, CheckpointMeta,
};
pub use config::{ensure_config_exists, Config, DataConfig, DatasetKind, ModelSection, TrainingSection};
pub use divergence::{histogram, kl_divergence, kl_divergence_bins, num_bins, value_range};
pub use image_grid::{make_grid, save_grid};
pub use run_dir::RunDirectory;
