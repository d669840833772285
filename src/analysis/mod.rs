pub mod annotation;
pub mod config;
pub mod core;
pub mod defect_detector;
pub mod difficulty;
pub mod grading;
pub mod opacification;
pub mod orchestrator;
pub mod preprocessing;
pub mod record;
pub mod suppression;
pub mod variant_detector;

pub use self::annotation::{build_annotations, AnnotationDirective};
pub use self::config::{
    AnalysisConfig, DefectDetectorConfig, DifficultyConfig, DifficultyCutpoints, DifficultyWeights,
    GradingConfig, OpacificationConfig, VariantDetectorConfig,
};
pub use self::core::{AnalysisOutput, CtAnalyzer, CtImage, Region};
pub use self::defect_detector::{DefectResult, SkullBaseDefectDetector};
pub use self::difficulty::{
    Contribution, DifficultyInputs, DifficultyResult, DifficultyTier, InputSource, Instrument,
    SurgeryDifficultyCalculator,
};
pub use self::grading::{GradeResult, KerosClassifier, KerosGrade, Landmark, MeasurementUncertain};
pub use self::opacification::{OpacificationResult, OpacificationScorer, SinusRegion, MAX_TOTAL_SCORE};
pub use self::orchestrator::{AnalysisReport, AnalyzerOutcome, SinusAnalysisOrchestrator};
pub use self::record::{AnalysisRecord, Feedback};
pub use self::suppression::Detection;
pub use self::variant_detector::{HallerCellDetector, VariantDetectionResult};
