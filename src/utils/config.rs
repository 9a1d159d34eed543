//! Configuration management
//!
//! Provides unified configuration for the entire MAD-GAN pipeline. A config
//! file (TOML or JSON) provides the base values and command line flags
//! override individual fields.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::divergence::num_bins;
use crate::data::GaussianMixture;
use crate::error::{MadGanError, Result};
use crate::model::{ModelConfig, SampleKind, WeightInit};
use crate::training::{InstanceNoiseConfig, LossMode, NoiseDistribution};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data configuration
    pub data: DataConfig,
    /// Model configuration
    pub model: ModelSection,
    /// Training configuration
    pub training: TrainingSection,
}

/// Which dataset to train on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// 1-D Gaussian mixture
    #[default]
    Gmm,
    /// Image folder (MNIST-like)
    Images,
}

impl DatasetKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gmm => "GMM",
            Self::Images => "MNIST",
        }
    }
}

/// Data-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Dataset kind
    pub dataset: DatasetKind,
    /// Parent directory of the class directories (images)
    pub dataroot: String,
    /// Side length images are resized to
    pub image_size: i64,
    /// Channels of the training images
    pub num_channels: i64,
    /// Batch size
    pub batch_size: usize,
    /// Number of points drawn from the mixture (gmm)
    pub gmm_samples: usize,
    /// Mixture definition (gmm)
    pub gmm: GaussianMixture,
}

/// Model-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// Size of the generator noise vector
    pub n_z: i64,
    /// Number of generators
    pub num_generators: usize,
    /// Share all generator layers except the last
    pub sharing: bool,
    /// Negative slope of the LeakyReLU activations
    pub leaky_slope: f64,
    /// Hidden width of the MLP networks (gmm)
    pub hidden_dim: i64,
    /// Base filter count of the conv networks (images)
    pub base_filters: i64,
    /// Weight initialization
    pub init: WeightInit,
}

/// Training-related configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSection {
    /// Number of epochs
    pub epochs: usize,
    /// Generator learning rate
    pub lrg: f64,
    /// Discriminator learning rate
    pub lrd: f64,
    /// Adam beta1
    pub beta1: f64,
    /// Adam beta2
    pub beta2: f64,
    /// Use the decomposed (DEGAN) losses
    pub degan: bool,
    /// Instance noise schedule
    pub noise: InstanceNoiseConfig,
    /// Distribution of the generator input noise
    pub noise_distribution: NoiseDistribution,
    /// Log and write samples every N iterations
    pub check_interval: usize,
    /// Save a checkpoint every N epochs (0 = only at the end)
    pub checkpoint_every: usize,
    /// Fixed-noise samples written per generator
    pub samples_per_generator: i64,
    /// Bin size of the KL diagnostic (gmm)
    pub kl_bin_size: f64,
    /// Train on the GPU when available
    pub gpu: bool,
    /// CUDA device index
    pub gpu_index: usize,
    /// Parent directory of the results directory
    pub out_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetKind::Gmm,
            dataroot: "./data".to_string(),
            image_size: 32,
            num_channels: 1,
            batch_size: 120,
            gmm_samples: 60_000,
            gmm: GaussianMixture::default(),
        }
    }
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
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

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            epochs: 30,
            lrg: 1e-4,
            lrd: 1e-4,
            beta1: 0.5,
            beta2: 0.999,
            degan: false,
            noise: InstanceNoiseConfig::default(),
            noise_distribution: NoiseDistribution::Uniform,
            check_interval: 500,
            checkpoint_every: 5,
            samples_per_generator: 64,
            kl_bin_size: 0.1,
            gpu: true,
            gpu_index: 0,
            out_dir: ".".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save configuration to TOML file
    pub fn save_toml(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Load by extension: `.json` is JSON, everything else TOML
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if is_json(path) {
            Self::from_json(path)
        } else {
            Self::from_toml(path)
        }
    }

    /// Save by extension: `.json` is JSON, everything else TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if is_json(path) {
            self.save_json(path)
        } else {
            self.save_toml(path)
        }
    }

    /// Get device from configuration
    pub fn get_device(&self) -> tch::Device {
        if !self.training.gpu {
            return tch::Device::Cpu;
        }
        if tch::Cuda::is_available() {
            tch::Device::Cuda(self.training.gpu_index)
        } else {
            tracing::warn!("CUDA requested but not available, falling back to CPU");
            tch::Device::Cpu
        }
    }

    /// Network configuration derived from data and model sections
    pub fn model_config(&self) -> ModelConfig {
        let sample = match self.data.dataset {
            DatasetKind::Gmm => SampleKind::Vector { dim: 1 },
            DatasetKind::Images => SampleKind::Image {
                channels: self.data.num_channels,
                image_size: self.data.image_size,
            },
        };

        ModelConfig {
            sample,
            n_z: self.model.n_z,
            num_generators: self.model.num_generators,
            sharing: self.model.sharing,
            leaky_slope: self.model.leaky_slope,
            hidden_dim: self.model.hidden_dim,
            base_filters: self.model.base_filters,
            init: self.model.init,
        }
    }

    pub fn loss_mode(&self) -> LossMode {
        LossMode::from_degan_flag(self.training.degan)
    }

    /// Name of the results directory for this run
    pub fn run_name(&self) -> String {
        format!(
            "degan-{}-{}epc={}sharing{}lrd={}lrg{}",
            self.data.dataset.name(),
            self.training.degan as u8,
            self.training.epochs,
            self.model.sharing as u8,
            self.training.lrd,
            self.training.lrg
        )
    }

    /// Validate configuration
    ///
    /// Only rejects invalid values; see [`Config::warnings`] for unusual ones.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(MadGanError::InvalidConfig(msg));

        if self.data.batch_size == 0 {
            return invalid(format!(
                "Invalid batch size. Has to be greater than zero. You entered {}",
                self.data.batch_size
            ));
        }
        if self.model.num_generators > 0 && self.data.batch_size % self.model.num_generators != 0 {
            return invalid(format!(
                "batch size {} is not divisible by the number of generators {}",
                self.data.batch_size, self.model.num_generators
            ));
        }
        if self.data.dataset == DatasetKind::Images {
            if self.data.num_channels != 1 && self.data.num_channels != 3 {
                return invalid(format!(
                    "num_channels has to be 1 or 3. You entered {}",
                    self.data.num_channels
                ));
            }
            if !Path::new(&self.data.dataroot).is_dir() {
                return Err(MadGanError::InvalidDataRoot(self.data.dataroot.clone().into()));
            }
        } else {
            self.data.gmm.validate()?;
            if self.data.gmm_samples < self.data.batch_size {
                return invalid(format!(
                    "gmm_samples ({}) has to be at least the batch size ({})",
                    self.data.gmm_samples, self.data.batch_size
                ));
            }
        }
        self.model_config().validate()?;

        let t = &self.training;
        if t.epochs == 0 {
            return invalid("Number of epochs must be > 0".to_string());
        }
        if !(t.lrg > 0.0) || !(t.lrd > 0.0) {
            return invalid(format!(
                "learning rates must be > 0. You entered lrg={} lrd={}",
                t.lrg, t.lrd
            ));
        }
        if !(0.0..1.0).contains(&t.beta1) || !(0.0..1.0).contains(&t.beta2) {
            return invalid(format!(
                "Adam betas must be in [0, 1). You entered {} and {}",
                t.beta1, t.beta2
            ));
        }
        if t.noise.interval == 0 {
            return invalid("noise degradation interval must be > 0".to_string());
        }
        if !(t.noise.decay_factor > 0.0 && t.noise.decay_factor <= 1.0) {
            return invalid(format!(
                "noise degradation factor must be in (0, 1]. You entered {}",
                t.noise.decay_factor
            ));
        }
        if !(t.noise.std >= 0.0) {
            return invalid(format!(
                "noise standard deviation must be >= 0. You entered {}",
                t.noise.std
            ));
        }
        if t.check_interval == 0 {
            return invalid("check interval must be > 0".to_string());
        }
        if t.samples_per_generator <= 0 {
            return invalid(format!(
                "samples_per_generator must be > 0. You entered {}",
                t.samples_per_generator
            ));
        }
        if self.data.dataset == DatasetKind::Gmm {
            if !(t.kl_bin_size > 0.0) {
                return invalid(format!(
                    "kl_bin_size must be > 0. You entered {}",
                    t.kl_bin_size
                ));
            }
            let (lo, hi) = self.data.gmm.support(4.0);
            num_bins(lo, hi, t.kl_bin_size)
                .map_err(|e| MadGanError::InvalidConfig(e.to_string()))?;
        }
        Ok(())
    }

    /// Unusual but legal values
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !(0.01..=0.5).contains(&self.model.leaky_slope) {
            warnings.push(format!(
                "the negative slope of the LeakyReLU activation is unusual. You entered {}",
                self.model.leaky_slope
            ));
        }
        if self.model.n_z < 64 {
            warnings.push(format!(
                "The length of the noise vector is unusually low. You entered {}",
                self.model.n_z
            ));
        }
        warnings
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Create default configuration file if it doesn't exist
pub fn ensure_config_exists(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if path.exists() {
        Config::from_file(path)
    } else {
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, TempDir};

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.data.batch_size, 120);
        assert_eq!(config.model.num_generators, 3);
        assert_eq!(config.training.noise.interval, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.training.degan = true;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"model": {{"num_generators": 4}}}}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.model.num_generators, 4);
        assert_eq!(config.model.n_z, 100);
        assert_eq!(config.data.dataset, DatasetKind::Gmm);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.data.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.batch_size = 100;
        assert!(config.validate().is_err()); // not divisible by 3

        let mut config = Config::default();
        config.model.num_generators = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.training.noise.decay_factor = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data.dataset = DatasetKind::Images;
        config.data.dataroot = "/definitely/not/here".to_string();
        assert!(matches!(config.validate(), Err(MadGanError::InvalidDataRoot(_))));
    }

    #[test]
    fn test_kl_bin_size_validation() {
        let mut config = Config::default();
        config.training.kl_bin_size = 0.0;
        assert!(matches!(config.validate(), Err(MadGanError::InvalidConfig(_))));

        config.training.kl_bin_size = 1e-20;
        assert!(matches!(config.validate(), Err(MadGanError::InvalidConfig(_))));

        config.training.kl_bin_size = 0.5;
        assert!(config.validate().is_ok());

        // no KL diagnostic on images
        config.training.kl_bin_size = 0.0;
        config.data.dataset = DatasetKind::Images;
        config.data.dataroot = std::env::temp_dir().display().to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_warnings() {
        let mut config = Config::default();
        assert!(config.warnings().is_empty());

        config.model.n_z = 16;
        config.model.leaky_slope = 0.9;
        assert_eq!(config.warnings().len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_name() {
        let mut config = Config::default();
        config.training.degan = true;
        config.training.epochs = 10;
        assert_eq!(config.run_name(), "degan-GMM-1epc=10sharing0lrd=0.0001lrg0.0001");
    }

    #[test]
    fn test_model_config_follows_dataset() {
        let mut config = Config::default();
        assert_eq!(config.model_config().sample, SampleKind::Vector { dim: 1 });

        config.data.dataset = DatasetKind::Images;
        config.data.image_size = 64;
        assert_eq!(
            config.model_config().sample,
            SampleKind::Image {
                channels: 1,
                image_size: 64
            }
        );
    }

    #[test]
    fn test_ensure_config_exists_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("madgan.toml");
        let created = ensure_config_exists(&path).unwrap();
        assert!(path.exists());
        assert_eq!(ensure_config_exists(&path).unwrap(), created);
    }
}
