//! Keros classification of the olfactory fossa depth.
//!
//! The depth is the vertical distance from the ethmoid roofs (lateral strips)
//! down to the cribriform plate (medial strip), relative to the distance
//! between the two roof strips. Ordered bands map that ratio to a grade.
use super::config::GradingConfig;
use super::core::{AnalysisOutput, CtAnalyzer, CtImage, Region};
use super::preprocessing::row_profile;
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::warn;

/// Vertical search band shared by the three strips.
const BAND_Y: (f32, f32) = (0.08, 0.37);
const RIGHT_ROOF_X: (f32, f32) = (0.38, 0.07);
const CRIBRIFORM_X: (f32, f32) = (0.47, 0.06);
const LEFT_ROOF_X: (f32, f32) = (0.55, 0.07);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KerosGrade {
    I,
    II,
    III,
}

impl KerosGrade {
    /// Steps above grade I.
    pub fn severity(self) -> u8 {
        match self {
            KerosGrade::I => 0,
            KerosGrade::II => 1,
            KerosGrade::III => 2,
        }
    }
}

impl fmt::Display for KerosGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KerosGrade::I => "I",
            KerosGrade::II => "II",
            KerosGrade::III => "III",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Landmark {
    EthmoidRoof,
    CribriformPlate,
}

/// Why the depth could not be measured. Not an error: the classifier falls
/// back to grade I and attaches this to the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MeasurementUncertain {
    LandmarkNotFound { landmark: Landmark },
    CribriformAboveRoof { roof_row: f32, cribriform_row: u32 },
    DegenerateGeometry,
}

impl fmt::Display for MeasurementUncertain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementUncertain::LandmarkNotFound { landmark } => {
                write!(f, "{:?} not found", landmark)
            }
            MeasurementUncertain::CribriformAboveRoof {
                roof_row,
                cribriform_row,
            } => write!(
                f,
                "cribriform plate (row {}) above ethmoid roof (row {:.1})",
                cribriform_row, roof_row
            ),
            MeasurementUncertain::DegenerateGeometry => f.write_str("image too small to measure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeResult {
    grade: KerosGrade,
    /// Fossa depth over roof spacing; `None` when unmeasurable.
    depth_ratio: Option<f32>,
    caveat: Option<MeasurementUncertain>,
}

impl GradeResult {
    pub fn measured(grade: KerosGrade, depth_ratio: f32) -> Self {
        Self {
            grade,
            depth_ratio: Some(depth_ratio),
            caveat: None,
        }
    }

    /// Lowest grade, flagged as a fallback.
    pub fn fallback(caveat: MeasurementUncertain) -> Self {
        Self {
            grade: KerosGrade::I,
            depth_ratio: None,
            caveat: Some(caveat),
        }
    }

    pub fn grade(&self) -> KerosGrade {
        self.grade
    }

    pub fn depth_ratio(&self) -> Option<f32> {
        self.depth_ratio
    }

    pub fn caveat(&self) -> Option<&MeasurementUncertain> {
        self.caveat.as_ref()
    }

    pub fn is_fallback(&self) -> bool {
        self.caveat.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct KerosClassifier {
    config: GradingConfig,
}

impl KerosClassifier {
    pub fn new(config: GradingConfig) -> Self {
        Self { config }
    }

    fn grade_for(&self, ratio: f32) -> KerosGrade {
        let [grade_one_max, grade_two_max] = self.config.grade_bands;
        if ratio < grade_one_max {
            KerosGrade::I
        } else if ratio < grade_two_max {
            KerosGrade::II
        } else {
            KerosGrade::III
        }
    }

    fn strip(frame: Region, (x, width): (f32, f32)) -> Region {
        let (y0, y1) = BAND_Y;
        Region::from_fractions(frame, x, y0, width, y1 - y0)
    }

    /// First row from the top of `strip` whose mean luma reaches bone.
    fn first_bone_row(&self, image: &CtImage, strip: Region) -> Option<u32> {
        row_profile(image.luma(), strip)
            .iter()
            .position(|&mean| mean >= self.config.bone_threshold as f32)
            .map(|offset| strip.y + offset as u32)
    }

    fn center_x(region: Region) -> f32 {
        region.x as f32 + region.width as f32 / 2.0
    }

    fn measure(&self, image: &CtImage) -> Result<f32, MeasurementUncertain> {
        let frame = image.frame();
        let right = Self::strip(frame, RIGHT_ROOF_X);
        let medial = Self::strip(frame, CRIBRIFORM_X);
        let left = Self::strip(frame, LEFT_ROOF_X);
        if [right, medial, left].iter().any(Region::is_empty) {
            return Err(MeasurementUncertain::DegenerateGeometry);
        }

        let spacing = Self::center_x(left) - Self::center_x(right);
        if spacing <= 0.0 {
            return Err(MeasurementUncertain::DegenerateGeometry);
        }

        let roofs: Vec<u32> = [right, left]
            .into_iter()
            .filter_map(|strip| self.first_bone_row(image, strip))
            .collect();
        if roofs.is_empty() {
            return Err(MeasurementUncertain::LandmarkNotFound {
                landmark: Landmark::EthmoidRoof,
            });
        }
        let roof_row = roofs.iter().sum::<u32>() as f32 / roofs.len() as f32;

        let cribriform_row = self
            .first_bone_row(image, medial)
            .ok_or(MeasurementUncertain::LandmarkNotFound {
                landmark: Landmark::CribriformPlate,
            })?;
        if (cribriform_row as f32) < roof_row {
            return Err(MeasurementUncertain::CribriformAboveRoof {
                roof_row,
                cribriform_row,
            });
        }

        Ok((cribriform_row as f32 - roof_row) / spacing)
    }
}

impl CtAnalyzer for KerosClassifier {
    type Output = GradeResult;

    fn analyze(&self, image: &CtImage) -> Result<AnalysisOutput<GradeResult>, AnalysisError> {
        let start_time = Instant::now();

        let (result, reasoning) = match self.measure(image) {
            Ok(ratio) => {
                let grade = self.grade_for(ratio);
                (
                    GradeResult::measured(grade, ratio),
                    format!("Keros grade {}: fossa depth ratio {:.3}", grade, ratio),
                )
            }
            Err(caveat) => {
                warn!("Keros depth unmeasurable ({}); falling back to grade I", caveat);
                let reasoning = format!("Keros grade I (fallback): {}", caveat);
                (GradeResult::fallback(caveat), reasoning)
            }
        };

        Ok(AnalysisOutput::new(result, reasoning).with_timing(start_time))
    }

    fn name(&self) -> &'static str {
        "KerosClassifier"
    }
}
