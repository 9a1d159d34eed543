//! Error types for the MAD-GAN library

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, MadGanError>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum MadGanError {
    /// Generator address outside of `[-1, num_generators - 1]`
    #[error("Invalid generator number {address}. Should be in range [-1,{max_address}]")]
    InvalidGeneratorAddress { address: i64, max_address: i64 },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Data root is missing or not a directory
    #[error("the path specified in dataroot is not valid. You entered {}", .0.display())]
    InvalidDataRoot(PathBuf),

    /// No usable samples were found
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// Invalid input to a numeric utility
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Results directory already exists
    #[error("Results directory already exists: {}", .0.display())]
    RunDirectoryExists(PathBuf),

    /// libtorch error
    #[error("Torch error: {0}")]
    Tch(#[from] tch::TchError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization error
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Failed to parse a numeric field
    #[error("Failed to parse number: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),
}
