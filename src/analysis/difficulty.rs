//! Surgery difficulty: folds the four analyzer results into one tier and an
//! instrument recommendation.
use super::config::{DifficultyConfig, DifficultyCutpoints};
use super::defect_detector::DefectResult;
use super::grading::{GradeResult, KerosGrade};
use super::opacification::{OpacificationResult, MAX_TOTAL_SCORE};
use super::variant_detector::VariantDetectionResult;
use serde::Serialize;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyTier {
    Resident,
    Specialist,
    Consultant,
}

impl DifficultyTier {
    pub fn from_score(score: f32, cutpoints: &DifficultyCutpoints) -> Self {
        if score <= cutpoints.resident_max {
            DifficultyTier::Resident
        } else if score <= cutpoints.specialist_max {
            DifficultyTier::Specialist
        } else {
            DifficultyTier::Consultant
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DifficultyTier::Resident => "Resident Level",
            DifficultyTier::Specialist => "Specialist Level",
            DifficultyTier::Consultant => "Consultant Level",
        }
    }

    /// Base instrument set for the tier.
    fn base_instruments(self) -> &'static [Instrument] {
        use Instrument::*;
        match self {
            DifficultyTier::Resident => &[
                ZeroDegreeEndoscope,
                ThirtyDegreeEndoscope,
                StraightBlakesleyForceps,
                FreerElevator,
                SickleKnife,
                StraightSuction,
            ],
            DifficultyTier::Specialist => &[
                ZeroDegreeEndoscope,
                ThirtyDegreeEndoscope,
                FortyFiveDegreeEndoscope,
                StraightBlakesleyForceps,
                ThroughCuttingForceps,
                FreerElevator,
                SickleKnife,
                StraightSuction,
                CurvedSuction,
                Microdebrider,
            ],
            DifficultyTier::Consultant => &[
                ZeroDegreeEndoscope,
                ThirtyDegreeEndoscope,
                FortyFiveDegreeEndoscope,
                SeventyDegreeEndoscope,
                StraightBlakesleyForceps,
                ThroughCuttingForceps,
                FreerElevator,
                SickleKnife,
                StraightSuction,
                CurvedSuction,
                Microdebrider,
                FrontalSinusInstrumentSet,
                KerrisonRongeur,
                AngledDrill,
                BipolarCautery,
                ImageGuidedNavigation,
            ],
        }
    }
}

impl fmt::Display for DifficultyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    ZeroDegreeEndoscope,
    ThirtyDegreeEndoscope,
    FortyFiveDegreeEndoscope,
    SeventyDegreeEndoscope,
    StraightBlakesleyForceps,
    ThroughCuttingForceps,
    FreerElevator,
    SickleKnife,
    StraightSuction,
    CurvedSuction,
    Microdebrider,
    AngledBallTipSeeker,
    FrontalSinusInstrumentSet,
    KerrisonRongeur,
    AngledDrill,
    BipolarCautery,
    ImageGuidedNavigation,
    DuralRepairSet,
}

impl Instrument {
    pub fn label(self) -> &'static str {
        match self {
            Instrument::ZeroDegreeEndoscope => "0° endoscope",
            Instrument::ThirtyDegreeEndoscope => "30° endoscope",
            Instrument::FortyFiveDegreeEndoscope => "45° endoscope",
            Instrument::SeventyDegreeEndoscope => "70° endoscope",
            Instrument::StraightBlakesleyForceps => "Straight Blakesley forceps",
            Instrument::ThroughCuttingForceps => "Through-cutting forceps",
            Instrument::FreerElevator => "Freer elevator",
            Instrument::SickleKnife => "Sickle knife",
            Instrument::StraightSuction => "Straight suction",
            Instrument::CurvedSuction => "Curved suction",
            Instrument::Microdebrider => "Microdebrider",
            Instrument::AngledBallTipSeeker => "Angled ball-tip seeker",
            Instrument::FrontalSinusInstrumentSet => "Frontal sinus instrument set",
            Instrument::KerrisonRongeur => "Kerrison rongeur",
            Instrument::AngledDrill => "Angled high-speed drill",
            Instrument::BipolarCautery => "Bipolar cautery",
            Instrument::ImageGuidedNavigation => "Image-guided navigation",
            Instrument::DuralRepairSet => "Dural repair set",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Opacification,
    AnatomicalVariant,
    Grade,
    SkullBaseDefect,
}

impl InputSource {
    pub fn label(self) -> &'static str {
        match self {
            InputSource::Opacification => "opacification",
            InputSource::AnatomicalVariant => "Haller cells",
            InputSource::Grade => "Keros grade",
            InputSource::SkullBaseDefect => "skull base defect",
        }
    }
}

/// Points one input added to the score and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub source: InputSource,
    pub points: f32,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifficultyResult {
    pub tier: DifficultyTier,
    pub score: f32,
    pub recommended_instruments: Vec<Instrument>,
    pub justification: String,
    pub contributions: Vec<Contribution>,
    /// Inputs whose analyzer did not complete; they were scored as all-clear.
    pub unavailable_inputs: Vec<InputSource>,
}

/// Whatever analyzer results are available. `None` stands for an analyzer
/// that failed; it contributes its lowest-severity default.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifficultyInputs<'a> {
    pub opacification: Option<&'a OpacificationResult>,
    pub variants: Option<&'a VariantDetectionResult>,
    pub grade: Option<&'a GradeResult>,
    pub defects: Option<&'a DefectResult>,
}

impl<'a> DifficultyInputs<'a> {
    pub fn complete(
        opacification: &'a OpacificationResult,
        variants: &'a VariantDetectionResult,
        grade: &'a GradeResult,
        defects: &'a DefectResult,
    ) -> Self {
        Self {
            opacification: Some(opacification),
            variants: Some(variants),
            grade: Some(grade),
            defects: Some(defects),
        }
    }

    fn unavailable(&self) -> Vec<InputSource> {
        let mut missing = Vec::new();
        if self.opacification.is_none() {
            missing.push(InputSource::Opacification);
        }
        if self.variants.is_none() {
            missing.push(InputSource::AnatomicalVariant);
        }
        if self.grade.is_none() {
            missing.push(InputSource::Grade);
        }
        if self.defects.is_none() {
            missing.push(InputSource::SkullBaseDefect);
        }
        missing
    }
}

#[derive(Debug, Clone, Default)]
pub struct SurgeryDifficultyCalculator {
    config: DifficultyConfig,
}

impl SurgeryDifficultyCalculator {
    pub fn new(config: DifficultyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DifficultyConfig {
        &self.config
    }

    /// Pure and total: every combination of inputs yields a result, and
    /// raising any single input never lowers the tier.
    pub fn calculate(&self, inputs: &DifficultyInputs<'_>) -> DifficultyResult {
        let contributions = self.contributions(inputs);
        let score: f32 = contributions.iter().map(|c| c.points).sum();
        let tier = DifficultyTier::from_score(score, &self.config.cutpoints);
        let unavailable_inputs = inputs.unavailable();
        let recommended_instruments = self.recommend_instruments(tier, inputs);
        let justification = self.justify(tier, score, &contributions, &unavailable_inputs);

        debug!("Difficulty {:.1} -> {:?}: {}", score, tier, justification);

        DifficultyResult {
            tier,
            score,
            recommended_instruments,
            justification,
            contributions,
            unavailable_inputs,
        }
    }

    fn contributions(&self, inputs: &DifficultyInputs<'_>) -> Vec<Contribution> {
        let weights = &self.config.weights;

        let total = inputs.opacification.map_or(0, |o| o.total_score());
        let opacification = Contribution {
            source: InputSource::Opacification,
            points: total as f32 * weights.per_opacification_point,
            detail: format!("opacification {}/{}", total, MAX_TOTAL_SCORE),
        };

        let cells = inputs.variants.map_or(0, |v| v.count());
        let counted_cells = cells.min(weights.max_counted_variants as usize);
        let variants = Contribution {
            source: InputSource::AnatomicalVariant,
            points: counted_cells as f32 * weights.per_variant,
            detail: match cells {
                0 => "no Haller cells".to_string(),
                1 => "1 Haller cell".to_string(),
                n => format!("{} Haller cells", n),
            },
        };

        let grade = inputs.grade.map_or(KerosGrade::I, |g| g.grade());
        let fallback = inputs.grade.is_some_and(|g| g.is_fallback());
        let grading = Contribution {
            source: InputSource::Grade,
            points: grade.severity() as f32 * weights.per_grade_step,
            detail: if fallback {
                format!("Keros grade {} (unmeasured fallback)", grade)
            } else {
                format!("Keros grade {}", grade)
            },
        };

        let defects = inputs.defects.map_or(0, |d| d.count());
        let counted_defects = defects.min(weights.max_counted_defects as usize);
        let skull_base = Contribution {
            source: InputSource::SkullBaseDefect,
            points: counted_defects as f32 * weights.per_defect,
            detail: match defects {
                0 => "no skull base defect".to_string(),
                1 => "1 skull base defect".to_string(),
                n => format!("{} skull base defects", n),
            },
        };

        vec![opacification, variants, grading, skull_base]
    }

    /// Tier base set, then one addition per finding, without duplicates.
    fn recommend_instruments(&self, tier: DifficultyTier, inputs: &DifficultyInputs<'_>) -> Vec<Instrument> {
        let mut instruments: Vec<Instrument> = tier.base_instruments().to_vec();
        let mut add = |instrument: Instrument| {
            if !instruments.contains(&instrument) {
                instruments.push(instrument);
            }
        };

        if inputs
            .opacification
            .is_some_and(|o| o.total_score() >= self.config.weights.heavy_opacification_total)
        {
            add(Instrument::Microdebrider);
        }
        if inputs.variants.is_some_and(|v| v.detected()) {
            add(Instrument::AngledBallTipSeeker);
        }
        if inputs.grade.is_some_and(|g| g.grade() == KerosGrade::III) {
            add(Instrument::ImageGuidedNavigation);
        }
        if inputs.defects.is_some_and(|d| d.defect_detected()) {
            add(Instrument::ImageGuidedNavigation);
            add(Instrument::DuralRepairSet);
        }

        instruments
    }

    fn justify(
        &self,
        tier: DifficultyTier,
        score: f32,
        contributions: &[Contribution],
        unavailable: &[InputSource],
    ) -> String {
        let cutpoints = &self.config.cutpoints;
        let parts: Vec<String> = contributions
            .iter()
            .map(|c| format!("{} (+{:.1})", c.detail, c.points))
            .collect();

        let mut justification = format!(
            "{} (score {:.1}; resident <= {:.1} < specialist <= {:.1} < consultant): {}",
            tier.label(),
            score,
            cutpoints.resident_max,
            cutpoints.specialist_max,
            parts.join(", ")
        );

        if !unavailable.is_empty() {
            let names: Vec<&str> = unavailable.iter().map(|s| s.label()).collect();
            justification.push_str(&format!(
                "; unavailable, scored as clear: {}",
                names.join(", ")
            ));
        }
        justification
    }
}
