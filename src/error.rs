//! Error types for configuration validation and the correction pipeline.

use thiserror::Error;

/// Errors raised while validating a [`crate::config::CorrectorConfig`],
/// all detected before round 1 starts.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("maxIndelLength must be in [0, 4], got {0}")]
    IndelLengthOutOfRange(i32),

    #[error("fromLevel ({from}) must be <= toLevel ({to})")]
    LevelOrder { from: u32, to: u32 },

    #[error("errorRate must be in [0, 1], got {0}")]
    ErrorRateOutOfRange(f64),

    #[error("numThreads must be >= 1, got {0}")]
    ZeroThreads(usize),

    #[error("wovsum must be in [0, 1], got {0}")]
    WovsumOutOfRange(f64),
}

/// Errors raised by the correction engine itself.
#[derive(Error, Debug)]
pub enum CorrectorError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("no reads to correct")]
    EmptyInput,

    #[error("read id {0} is out of range")]
    ReadIdOutOfRange(u32),
}

pub type Result<T> = std::result::Result<T, CorrectorError>;
