pub mod analysis;
pub mod config;
pub mod error;

#[cfg(test)]
mod test_utils;

pub use self::analysis::{AnalysisConfig, AnalysisReport, CtImage, SinusAnalysisOrchestrator};
pub use self::config::Settings;
pub use self::error::{AnalysisError, AppError, ConfigurationError, InvalidImageError};
