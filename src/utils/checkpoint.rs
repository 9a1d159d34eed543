//! Checkpoint save/load utilities
//!
//! A checkpoint is a directory holding both networks, the loss history and
//! a `meta.json` with the configuration needed to rebuild the model.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tch::nn::VarStore;

use super::config::Config;
use crate::error::Result;
use crate::model::MadGan;
use crate::training::TrainingMetrics;

const GENERATOR_FILE: &str = "generator.pt";
const DISCRIMINATOR_FILE: &str = "discriminator.pt";
const META_FILE: &str = "meta.json";
const LOSSES_FILE: &str = "losses.csv";
const CHECKPOINT_PREFIX: &str = "checkpoint_epoch_";

/// Checkpoint metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Completed epochs
    pub epoch: usize,
    /// Completed iterations
    pub iteration: usize,
    /// Discriminator loss at checkpoint
    pub d_loss: f64,
    /// Generator loss at checkpoint
    pub g_loss: f64,
    /// Timestamp of checkpoint
    pub timestamp: String,
    /// Full run configuration
    pub config: Config,
}

/// Save the parameters of a variable store to a file
pub fn save_model(vs: &VarStore, path: impl AsRef<Path>) -> Result<()> {
    vs.save(path)?;
    Ok(())
}

/// Save a complete checkpoint (model + metadata)
///
/// # Returns
///
/// Path to the checkpoint directory
pub fn save_checkpoint(
    model: &MadGan,
    metrics: &TrainingMetrics,
    config: &Config,
    epoch: usize,
    dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let checkpoint_dir = dir
        .as_ref()
        .join(format!("{}{:04}", CHECKPOINT_PREFIX, epoch));
    std::fs::create_dir_all(&checkpoint_dir)?;

    save_model(&model.gen_vs, checkpoint_dir.join(GENERATOR_FILE))?;
    save_model(&model.disc_vs, checkpoint_dir.join(DISCRIMINATOR_FILE))?;

    let meta = CheckpointMeta {
        epoch,
        iteration: metrics.num_iterations(),
        d_loss: metrics.latest_d_loss().unwrap_or(0.0),
        g_loss: metrics.latest_g_loss().unwrap_or(0.0),
        timestamp: chrono::Utc::now().to_rfc3339(),
        config: config.clone(),
    };
    std::fs::write(
        checkpoint_dir.join(META_FILE),
        serde_json::to_string_pretty(&meta)?,
    )?;

    metrics.save_csv(checkpoint_dir.join(LOSSES_FILE))?;

    tracing::info!("Saved checkpoint to {}", checkpoint_dir.display());
    Ok(checkpoint_dir)
}

/// Load checkpoint metadata
pub fn load_checkpoint_meta(checkpoint_dir: impl AsRef<Path>) -> Result<CheckpointMeta> {
    let content = std::fs::read_to_string(checkpoint_dir.as_ref().join(META_FILE))?;
    Ok(serde_json::from_str(&content)?)
}

/// Load network weights and loss history into `model`
///
/// # Returns
///
/// Tuple of (metadata, metrics)
pub fn load_checkpoint(
    model: &mut MadGan,
    checkpoint_dir: impl AsRef<Path>,
) -> Result<(CheckpointMeta, TrainingMetrics)> {
    let checkpoint_dir = checkpoint_dir.as_ref();
    model.load(
        checkpoint_dir.join(GENERATOR_FILE),
        checkpoint_dir.join(DISCRIMINATOR_FILE),
    )?;

    let meta = load_checkpoint_meta(checkpoint_dir)?;

    let losses_path = checkpoint_dir.join(LOSSES_FILE);
    let metrics = if losses_path.exists() {
        TrainingMetrics::load_csv(&losses_path)?
    } else {
        TrainingMetrics::new()
    };

    tracing::info!(
        "Loaded checkpoint from {} (epoch {})",
        checkpoint_dir.display(),
        meta.epoch
    );
    Ok((meta, metrics))
}

/// Find the latest checkpoint in a directory
pub fn find_latest_checkpoint(dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut checkpoints: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())
        .ok()?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.starts_with(CHECKPOINT_PREFIX))
                .unwrap_or(false)
        })
        .map(|e| e.path())
        .collect();

    checkpoints.sort();
    checkpoints.pop()
}

/// Accept either a checkpoint directory or a directory containing checkpoints
pub fn resolve_checkpoint(path: impl AsRef<Path>) -> Option<PathBuf> {
    let path = path.as_ref();
    if path.join(META_FILE).is_file() {
        return Some(path.to_path_buf());
    }
    find_latest_checkpoint(path).or_else(|| find_latest_checkpoint(path.join("checkpoints")))
}
