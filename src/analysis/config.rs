use super::core::Region;
use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};

/// Configuration for the whole analysis with tunable parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub opacification: OpacificationConfig,
    pub variant: VariantDetectorConfig,
    pub grading: GradingConfig,
    pub defect: DefectDetectorConfig,
    pub difficulty: DifficultyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpacificationConfig {
    /// Luma at or above which a pixel counts as opaque (fluid or soft tissue).
    pub opacity_threshold: u8,
    /// Opaque fraction from which a region scores 1 (partial).
    pub partial_fraction: f32,
    /// Opaque fraction from which a region scores 2 (complete).
    pub total_fraction: f32,
    /// Optional frame the canonical sinus layout is laid over.
    pub roi: Option<Region>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantDetectorConfig {
    /// Detection confidence cutoff.
    pub threshold: f32,
    /// Suppression overlap.
    pub iou_threshold: f32,
    /// Luma at or below which a pixel counts as air.
    pub air_threshold: u8,
    pub min_area_fraction: f32,
    pub max_area_fraction: f32,
    pub min_aspect_ratio: f32,
    pub max_aspect_ratio: f32,
    /// Component pixels over bounding box area; rounded cells fill most of it.
    pub min_fill_ratio: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    /// Ordered cut points on the relative olfactory fossa depth:
    /// below `grade_bands[0]` is grade I, below `grade_bands[1]` grade II,
    /// anything deeper grade III.
    pub grade_bands: [f32; 2],
    /// Row-mean luma at which a row is taken to be bone.
    pub bone_threshold: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefectDetectorConfig {
    /// Detection confidence cutoff.
    pub threshold: f32,
    /// Suppression overlap.
    pub iou_threshold: f32,
    /// Luma at which a column of the skull base band holds bone.
    pub bone_threshold: u8,
    /// Gap widths, relative to the image width, that count as a defect.
    pub min_gap_fraction: f32,
    pub max_gap_fraction: f32,
    /// Bone columns required on each side of a gap.
    pub min_flank_columns: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    pub cutpoints: DifficultyCutpoints,
    pub weights: DifficultyWeights,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyCutpoints {
    /// Highest score still routed to a resident.
    pub resident_max: f32,
    /// Highest score still routed to a specialist.
    pub specialist_max: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyWeights {
    pub per_opacification_point: f32,
    pub per_variant: f32,
    pub max_counted_variants: u32,
    pub per_defect: f32,
    pub max_counted_defects: u32,
    pub per_grade_step: f32,
    /// Opacification total from which a microdebrider is recommended.
    pub heavy_opacification_total: u8,
}

impl Default for OpacificationConfig {
    fn default() -> Self {
        Self {
            opacity_threshold: 96,
            partial_fraction: 0.15,
            total_fraction: 0.85,
            roi: None,
        }
    }
}

impl Default for VariantDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            iou_threshold: 0.3,
            air_threshold: 60,
            min_area_fraction: 0.0005,
            max_area_fraction: 0.02,
            min_aspect_ratio: 0.5,
            max_aspect_ratio: 2.0,
            min_fill_ratio: 0.5,
        }
    }
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            grade_bands: [0.15, 0.35],
            bone_threshold: 180,
        }
    }
}

impl Default for DefectDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            iou_threshold: 0.3,
            bone_threshold: 180,
            min_gap_fraction: 0.01,
            max_gap_fraction: 0.12,
            min_flank_columns: 3,
        }
    }
}

impl Default for DifficultyCutpoints {
    fn default() -> Self {
        Self {
            resident_max: 4.0,
            specialist_max: 9.0,
        }
    }
}

impl Default for DifficultyWeights {
    fn default() -> Self {
        Self {
            per_opacification_point: 0.5,
            per_variant: 2.0,
            max_counted_variants: 2,
            per_defect: 4.0,
            max_counted_defects: 2,
            per_grade_step: 2.0,
            heavy_opacification_total: 10,
        }
    }
}

fn check_unit(field: &'static str, value: f32) -> Result<(), ConfigurationError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigurationError::out_of_range(field, value, "0.0..=1.0"));
    }
    Ok(())
}

fn check_non_negative(field: &'static str, value: f32) -> Result<(), ConfigurationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigurationError::out_of_range(field, value, "a finite value >= 0.0"));
    }
    Ok(())
}

fn check_increasing(field: &'static str, lower: f32, upper: f32) -> Result<(), ConfigurationError> {
    if lower >= upper {
        return Err(ConfigurationError::Unordered {
            field,
            lower: lower.into(),
            upper: upper.into(),
        });
    }
    Ok(())
}

impl OpacificationConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_unit("opacification.partial_fraction", self.partial_fraction)?;
        check_unit("opacification.total_fraction", self.total_fraction)?;
        check_increasing(
            "opacification.partial_fraction..total_fraction",
            self.partial_fraction,
            self.total_fraction,
        )?;
        if let Some(roi) = self.roi {
            if roi.is_empty() {
                return Err(ConfigurationError::out_of_range(
                    "opacification.roi.area",
                    roi.area() as f64,
                    "a non-empty region",
                ));
            }
        }
        Ok(())
    }
}

impl VariantDetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_unit("variant.threshold", self.threshold)?;
        check_unit("variant.iou_threshold", self.iou_threshold)?;
        check_unit("variant.min_area_fraction", self.min_area_fraction)?;
        check_unit("variant.max_area_fraction", self.max_area_fraction)?;
        check_increasing(
            "variant.min_area_fraction..max_area_fraction",
            self.min_area_fraction,
            self.max_area_fraction,
        )?;
        if self.min_aspect_ratio <= 0.0 {
            return Err(ConfigurationError::out_of_range(
                "variant.min_aspect_ratio",
                self.min_aspect_ratio,
                "a value > 0.0",
            ));
        }
        check_increasing(
            "variant.min_aspect_ratio..max_aspect_ratio",
            self.min_aspect_ratio,
            self.max_aspect_ratio,
        )?;
        check_unit("variant.min_fill_ratio", self.min_fill_ratio)
    }
}

impl GradingConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let [lower, upper] = self.grade_bands;
        check_non_negative("grading.grade_bands[0]", lower)?;
        check_non_negative("grading.grade_bands[1]", upper)?;
        check_increasing("grading.grade_bands", lower, upper)?;
        if self.bone_threshold == 0 {
            return Err(ConfigurationError::out_of_range(
                "grading.bone_threshold",
                self.bone_threshold,
                "1..=255",
            ));
        }
        Ok(())
    }
}

impl DefectDetectorConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        check_unit("defect.threshold", self.threshold)?;
        check_unit("defect.iou_threshold", self.iou_threshold)?;
        check_unit("defect.min_gap_fraction", self.min_gap_fraction)?;
        check_unit("defect.max_gap_fraction", self.max_gap_fraction)?;
        check_increasing(
            "defect.min_gap_fraction..max_gap_fraction",
            self.min_gap_fraction,
            self.max_gap_fraction,
        )?;
        if self.bone_threshold == 0 {
            return Err(ConfigurationError::out_of_range(
                "defect.bone_threshold",
                self.bone_threshold,
                "1..=255",
            ));
        }
        if self.min_flank_columns == 0 {
            return Err(ConfigurationError::out_of_range(
                "defect.min_flank_columns",
                self.min_flank_columns,
                "at least 1",
            ));
        }
        Ok(())
    }
}

impl DifficultyConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let DifficultyCutpoints {
            resident_max,
            specialist_max,
        } = self.cutpoints;
        check_non_negative("difficulty.cutpoints.resident_max", resident_max)?;
        check_non_negative("difficulty.cutpoints.specialist_max", specialist_max)?;
        check_increasing("difficulty.cutpoints", resident_max, specialist_max)?;

        let w = &self.weights;
        check_non_negative("difficulty.weights.per_opacification_point", w.per_opacification_point)?;
        check_non_negative("difficulty.weights.per_variant", w.per_variant)?;
        check_non_negative("difficulty.weights.per_defect", w.per_defect)?;
        check_non_negative("difficulty.weights.per_grade_step", w.per_grade_step)
    }
}

impl AnalysisConfig {
    /// Lower detection thresholds; flags more candidates for review.
    pub fn sensitive() -> Self {
        Self {
            variant: VariantDetectorConfig {
                threshold: 0.35,
                min_fill_ratio: 0.4,
                ..VariantDetectorConfig::default()
            },
            defect: DefectDetectorConfig {
                threshold: 0.35,
                bone_threshold: 160,
                ..DefectDetectorConfig::default()
            },
            ..Self::default()
        }
    }

    /// Higher detection thresholds; only strong candidates are reported.
    pub fn conservative() -> Self {
        Self {
            variant: VariantDetectorConfig {
                threshold: 0.7,
                min_fill_ratio: 0.6,
                ..VariantDetectorConfig::default()
            },
            defect: DefectDetectorConfig {
                threshold: 0.7,
                min_flank_columns: 5,
                ..DefectDetectorConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.opacification.validate()?;
        self.variant.validate()?;
        self.grading.validate()?;
        self.defect.validate()?;
        self.difficulty.validate()
    }

    pub fn with_difficulty_cutpoints(mut self, resident_max: f32, specialist_max: f32) -> Self {
        self.difficulty.cutpoints = DifficultyCutpoints {
            resident_max,
            specialist_max,
        };
        self
    }

    pub fn with_roi(mut self, roi: Region) -> Self {
        self.opacification.roi = Some(roi);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
        assert!(AnalysisConfig::sensitive().validate().is_ok());
        assert!(AnalysisConfig::conservative().validate().is_ok());
    }

    #[test]
    fn rejects_thresholds_outside_unit_range() {
        let mut config = AnalysisConfig::default();
        config.variant.iou_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::OutOfRange {
                field: "variant.iou_threshold",
                ..
            })
        ));

        let mut config = AnalysisConfig::default();
        config.defect.threshold = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unordered_cut_points() {
        let config = AnalysisConfig::default().with_difficulty_cutpoints(9.0, 4.0);
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::Unordered {
                field: "difficulty.cutpoints",
                ..
            })
        ));

        let mut config = AnalysisConfig::default();
        config.grading.grade_bands = [0.4, 0.4];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_roi() {
        let config = AnalysisConfig::default().with_roi(Region::new(0, 0, 0, 10));
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"difficulty": {"cutpoints": {"resident_max": 3.0}}}"#).unwrap();
        assert_eq!(config.difficulty.cutpoints.resident_max, 3.0);
        assert_eq!(config.difficulty.cutpoints.specialist_max, 9.0);
        assert_eq!(config.variant, VariantDetectorConfig::default());
    }
}
