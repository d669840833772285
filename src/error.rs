use thiserror::Error;

use crate::analysis::core::Region;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Analysis Error: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("Configuration Error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

// Error raised by a single analyzer invocation. Never aborts the other analyzers.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] InvalidImageError),
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("{analyzer} did not complete: {reason}")]
    TaskFailed {
        analyzer: &'static str,
        reason: String,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidImageError {
    #[error("Image has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("Expected 8-bit RGB, got {channels} channel(s) at {bits_per_channel} bits")]
    UnsupportedLayout { channels: u8, bits_per_channel: u16 },
    #[error("Region {region:?} lies outside the {width}x{height} image")]
    RegionOutOfBounds {
        region: Region,
        width: u32,
        height: u32,
    },
}

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("{field} = {value} is out of range, expected {expected}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[error("{field} must be strictly increasing, got {lower} then {upper}")]
    Unordered {
        field: &'static str,
        lower: f64,
        upper: f64,
    },
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

impl ConfigurationError {
    pub(crate) fn out_of_range(field: &'static str, value: impl Into<f64>, expected: &'static str) -> Self {
        Self::OutOfRange {
            field,
            value: value.into(),
            expected,
        }
    }
}
