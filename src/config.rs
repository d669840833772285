use crate::analysis::AnalysisConfig;
use crate::error::ConfigurationError;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variables starting with this override file settings,
/// e.g. `SINUS_CT_DIFFICULTY__CUTPOINTS__RESIDENT_MAX=5`.
pub const ENV_PREFIX: &str = "SINUS_CT";

/// Starting point that file and environment values are layered over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    #[default]
    Standard,
    Sensitive,
    Conservative,
}

impl Preset {
    pub fn config(self) -> AnalysisConfig {
        match self {
            Preset::Standard => AnalysisConfig::default(),
            Preset::Sensitive => AnalysisConfig::sensitive(),
            Preset::Conservative => AnalysisConfig::conservative(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub analysis: AnalysisConfig,
    pub source: Option<PathBuf>,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        Self::load_with_preset(path, Preset::Standard)
    }

    /// Preset, then the optional file (TOML, JSON or YAML by extension),
    /// then environment overrides. The merged result is validated.
    pub fn load_with_preset(path: Option<&Path>, preset: Preset) -> Result<Self, ConfigurationError> {
        let mut builder = Config::builder().add_source(Config::try_from(&preset.config())?);
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let analysis: AnalysisConfig = builder.build()?.try_deserialize()?;
        analysis.validate()?;
        debug!("Loaded analysis settings: {:?}", analysis);

        Ok(Self {
            analysis,
            source: path.map(Path::to_path_buf),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_temp(contents: &str, extension: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sinus-ct-{}.{}", uuid::Uuid::new_v4(), extension));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.analysis.difficulty, AnalysisConfig::default().difficulty);
        assert!(settings.source.is_none());
    }

    #[test]
    fn file_values_override_defaults() {
        let path = write_temp(
            "[difficulty.cutpoints]\nresident_max = 5.0\nspecialist_max = 10.0\n\n[grading]\ngrade_bands = [0.2, 0.4]\n",
            "toml",
        );
        let settings = Settings::load(Some(path.as_path())).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(settings.analysis.difficulty.cutpoints.resident_max, 5.0);
        assert_eq!(settings.analysis.difficulty.cutpoints.specialist_max, 10.0);
        assert_eq!(settings.analysis.grading.grade_bands, [0.2, 0.4]);
        // Untouched sections keep their defaults.
        assert_eq!(settings.analysis.variant, AnalysisConfig::default().variant);
        assert_eq!(settings.source, Some(path));
    }

    #[test]
    fn preset_is_the_base_layer() {
        let path = write_temp("{\"defect\": {\"min_flank_columns\": 4}}", "json");
        let settings = Settings::load_with_preset(Some(path.as_path()), Preset::Conservative).unwrap();
        fs::remove_file(&path).unwrap();

        let conservative = AnalysisConfig::conservative();
        assert_eq!(settings.analysis.variant, conservative.variant);
        assert_eq!(settings.analysis.defect.threshold, conservative.defect.threshold);
        assert_eq!(settings.analysis.defect.min_flank_columns, 4);
    }

    #[test]
    fn invalid_values_are_rejected_at_load() {
        let path = write_temp("[difficulty.cutpoints]\nresident_max = 9.0\nspecialist_max = 4.0\n", "toml");
        let err = Settings::load(Some(path.as_path())).unwrap_err();
        fs::remove_file(&path).unwrap();
        assert!(matches!(err, ConfigurationError::Unordered { .. }));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let path = std::env::temp_dir().join("sinus-ct-does-not-exist.toml");
        assert!(matches!(
            Settings::load(Some(path.as_path())),
            Err(ConfigurationError::Load(_))
        ));
    }
}
