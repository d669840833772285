//! Runs the four analyzers over one slice and aggregates their results.
use super::{
    annotation::{build_annotations, AnnotationDirective},
    config::AnalysisConfig,
    core::{CtAnalyzer, CtImage},
    defect_detector::{DefectResult, SkullBaseDefectDetector},
    difficulty::{DifficultyInputs, DifficultyResult, SurgeryDifficultyCalculator},
    grading::{GradeResult, KerosClassifier},
    opacification::{OpacificationResult, OpacificationScorer},
    variant_detector::{HallerCellDetector, VariantDetectionResult},
};
use crate::error::{AnalysisError, ConfigurationError};
use serde::Serialize;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Instant,
};
use tokio::task::{JoinError, JoinHandle};
use tower::Service;
use tracing::{debug, info, warn};

/// What one analyzer produced, or why it did not.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalyzerOutcome<T> {
    Completed {
        result: T,
        reasoning: String,
        processing_time_us: u64,
    },
    Failed {
        analyzer: &'static str,
        error: String,
    },
}

impl<T> AnalyzerOutcome<T> {
    pub fn completed(&self) -> Option<&T> {
        match self {
            AnalyzerOutcome::Completed { result, .. } => Some(result),
            AnalyzerOutcome::Failed { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, AnalyzerOutcome::Completed { .. })
    }

    fn failed(analyzer: &'static str, error: &AnalysisError) -> Self {
        warn!("{} failed, its contribution is defaulted: {}", analyzer, error);
        AnalyzerOutcome::Failed {
            analyzer,
            error: error.to_string(),
        }
    }
}

/// Everything one analysis produced, ready for transport.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub image_width: u32,
    pub image_height: u32,
    pub opacification: AnalyzerOutcome<OpacificationResult>,
    pub variants: AnalyzerOutcome<VariantDetectionResult>,
    pub grade: AnalyzerOutcome<GradeResult>,
    pub defects: AnalyzerOutcome<DefectResult>,
    pub difficulty: DifficultyResult,
    pub annotations: Vec<AnnotationDirective>,
    pub total_time_us: u64,
}

impl AnalysisReport {
    pub fn to_document(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn failed_analyzers(&self) -> Vec<&'static str> {
        let failures = [
            failure_name(&self.opacification),
            failure_name(&self.variants),
            failure_name(&self.grade),
            failure_name(&self.defects),
        ];
        failures.into_iter().flatten().collect()
    }
}

fn failure_name<T>(outcome: &AnalyzerOutcome<T>) -> Option<&'static str> {
    match outcome {
        AnalyzerOutcome::Failed { analyzer, .. } => Some(*analyzer),
        AnalyzerOutcome::Completed { .. } => None,
    }
}

fn run<A: CtAnalyzer + ?Sized>(analyzer: &A, image: &CtImage) -> AnalyzerOutcome<A::Output> {
    match analyzer.analyze(image) {
        Ok(output) => {
            debug!(
                "{} completed in {}us: {}",
                analyzer.name(),
                output.processing_time_us,
                output.reasoning
            );
            AnalyzerOutcome::Completed {
                result: output.result,
                reasoning: output.reasoning,
                processing_time_us: output.processing_time_us,
            }
        }
        Err(e) => AnalyzerOutcome::failed(analyzer.name(), &e),
    }
}

fn spawn_analyzer<A>(analyzer: Arc<A>, image: CtImage) -> JoinHandle<AnalyzerOutcome<A::Output>>
where
    A: CtAnalyzer + 'static,
{
    tokio::task::spawn_blocking(move || run(analyzer.as_ref(), &image))
}

/// A branch that panicked or was cancelled fails on its own.
fn settle<T>(analyzer: &'static str, joined: Result<AnalyzerOutcome<T>, JoinError>) -> AnalyzerOutcome<T> {
    joined.unwrap_or_else(|e| {
        let error = AnalysisError::TaskFailed {
            analyzer,
            reason: e.to_string(),
        };
        AnalyzerOutcome::failed(analyzer, &error)
    })
}

#[derive(Debug, Clone)]
pub struct SinusAnalysisOrchestrator {
    opacification: Arc<OpacificationScorer>,
    variants: Arc<HallerCellDetector>,
    grading: Arc<KerosClassifier>,
    defects: Arc<SkullBaseDefectDetector>,
    calculator: SurgeryDifficultyCalculator,
    config: AnalysisConfig,
}

impl SinusAnalysisOrchestrator {
    /// Fails fast on invalid configuration so nothing fails mid-analysis.
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        Ok(Self {
            opacification: Arc::new(OpacificationScorer::new(config.opacification.clone())),
            variants: Arc::new(HallerCellDetector::new(config.variant.clone())),
            grading: Arc::new(KerosClassifier::new(config.grading.clone())),
            defects: Arc::new(SkullBaseDefectDetector::new(config.defect.clone())),
            calculator: SurgeryDifficultyCalculator::new(config.difficulty.clone()),
            config,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Runs the analyzers one after another on the calling thread.
    pub fn analyze(&self, image: &CtImage) -> AnalysisReport {
        let analysis_start = Instant::now();

        let opacification = run(self.opacification.as_ref(), image);
        let variants = run(self.variants.as_ref(), image);
        let grade = run(self.grading.as_ref(), image);
        let defects = run(self.defects.as_ref(), image);

        self.aggregate(image, opacification, variants, grade, defects, analysis_start)
    }

    /// Runs the analyzers on the blocking pool over the shared image and
    /// aggregates once all four have finished.
    pub async fn analyze_concurrent(&self, image: CtImage) -> AnalysisReport {
        let analysis_start = Instant::now();

        let (opacification, variants, grade, defects) = tokio::join!(
            spawn_analyzer(self.opacification.clone(), image.clone()),
            spawn_analyzer(self.variants.clone(), image.clone()),
            spawn_analyzer(self.grading.clone(), image.clone()),
            spawn_analyzer(self.defects.clone(), image.clone()),
        );

        self.aggregate(
            &image,
            settle(self.opacification.name(), opacification),
            settle(self.variants.name(), variants),
            settle(self.grading.name(), grade),
            settle(self.defects.name(), defects),
            analysis_start,
        )
    }

    fn aggregate(
        &self,
        image: &CtImage,
        opacification: AnalyzerOutcome<OpacificationResult>,
        variants: AnalyzerOutcome<VariantDetectionResult>,
        grade: AnalyzerOutcome<GradeResult>,
        defects: AnalyzerOutcome<DefectResult>,
        analysis_start: Instant,
    ) -> AnalysisReport {
        let inputs = DifficultyInputs {
            opacification: opacification.completed(),
            variants: variants.completed(),
            grade: grade.completed(),
            defects: defects.completed(),
        };
        let difficulty = self.calculator.calculate(&inputs);
        let annotations = build_annotations(inputs.opacification, inputs.variants, inputs.grade, inputs.defects);

        let (image_width, image_height) = image.dimensions();
        let total_time_us = analysis_start.elapsed().as_micros() as u64;
        info!(
            "Sinus analysis completed in {}us: {:?} (score {:.1})",
            total_time_us, difficulty.tier, difficulty.score
        );

        AnalysisReport {
            image_width,
            image_height,
            opacification,
            variants,
            grade,
            defects,
            difficulty,
            annotations,
            total_time_us,
        }
    }
}

impl Service<CtImage> for SinusAnalysisOrchestrator {
    type Response = AnalysisReport;
    type Error = AnalysisError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, image: CtImage) -> Self::Future {
        let orchestrator = self.clone();
        Box::pin(async move { Ok(orchestrator.analyze_concurrent(image).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::core::{AnalysisOutput, Region};
    use crate::analysis::difficulty::{DifficultyTier, InputSource};
    use crate::error::InvalidImageError;
    use crate::test_utils::{ct, fill_annulus, skull_base_phantom, uniform};
    use tower::ServiceExt;

    /// Skull base with a gap at x 95..105 and one Haller cell at (60, 90).
    fn abnormal_slice() -> CtImage {
        let mut img = skull_base_phantom(Some((95, 10)));
        fill_annulus(&mut img, [60.0, 90.0], 8.5, 10.5, 200);
        fill_annulus(&mut img, [60.0, 90.0], 0.0, 8.0, 20);
        ct(img)
    }

    fn orchestrator() -> SinusAnalysisOrchestrator {
        SinusAnalysisOrchestrator::new(AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn invalid_config_fails_at_construction() {
        let config = AnalysisConfig::default().with_difficulty_cutpoints(9.0, 4.0);
        assert!(matches!(
            SinusAnalysisOrchestrator::new(config),
            Err(ConfigurationError::Unordered { .. })
        ));
    }

    #[test]
    fn abnormal_slice_reports_every_finding() {
        let report = orchestrator().analyze(&abnormal_slice());

        assert!(report.failed_analyzers().is_empty());
        assert!(report.variants.completed().unwrap().detected());
        assert!(report.defects.completed().unwrap().defect_detected());
        assert_eq!(report.opacification.completed().unwrap().total_score(), 16);
        assert_eq!(report.difficulty.tier, DifficultyTier::Consultant);
        assert!(report.difficulty.unavailable_inputs.is_empty());

        let regions = report
            .annotations
            .iter()
            .filter(|d| matches!(d, AnnotationDirective::Region { .. }))
            .count();
        assert_eq!(regions, 2);
    }

    #[test]
    fn clear_slice_is_resident_level() {
        let report = orchestrator().analyze(&ct(uniform(200, 200, 20)));
        assert_eq!(report.difficulty.tier, DifficultyTier::Resident);
        assert!(!report.difficulty.recommended_instruments.is_empty());
        // No landmarks, so the grade is a flagged fallback.
        assert!(report.grade.completed().unwrap().is_fallback());
    }

    #[test]
    fn one_failing_analyzer_does_not_stop_the_others() {
        let config = AnalysisConfig::default().with_roi(Region::new(500, 500, 50, 50));
        let report = SinusAnalysisOrchestrator::new(config)
            .unwrap()
            .analyze(&abnormal_slice());

        assert_eq!(report.failed_analyzers(), vec!["OpacificationScorer"]);
        assert!(report.variants.is_completed());
        assert!(report.grade.is_completed());
        assert!(report.defects.is_completed());
        assert_eq!(report.difficulty.unavailable_inputs, vec![InputSource::Opacification]);
        // 1 cell and 1 defect still count.
        assert_eq!(report.difficulty.score, 6.0);
    }

    #[test]
    fn document_is_plain_structured_data() {
        let report = orchestrator().analyze(&abnormal_slice());
        let document = report.to_document().unwrap();

        assert_eq!(document["image_width"], 200);
        assert_eq!(document["opacification"]["status"], "completed");
        assert_eq!(document["opacification"]["result"]["total_score"], 16);
        assert_eq!(document["opacification"]["result"]["scores"]["right_frontal"], 2);
        assert_eq!(document["variants"]["result"]["detected"], true);
        assert_eq!(document["difficulty"]["tier"], "consultant");
        assert!(document["difficulty"]["recommended_instruments"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("dural_repair_set")));
    }

    #[tokio::test]
    async fn concurrent_matches_sequential() {
        let orchestrator = orchestrator();
        let image = abnormal_slice();

        let sequential = orchestrator.analyze(&image);
        let concurrent = orchestrator.analyze_concurrent(image).await;

        assert_eq!(sequential.opacification.completed(), concurrent.opacification.completed());
        assert_eq!(sequential.variants.completed(), concurrent.variants.completed());
        assert_eq!(sequential.grade.completed(), concurrent.grade.completed());
        assert_eq!(sequential.defects.completed(), concurrent.defects.completed());
        assert_eq!(sequential.difficulty, concurrent.difficulty);
        assert_eq!(sequential.annotations, concurrent.annotations);
    }

    #[tokio::test]
    async fn works_as_a_tower_service() {
        let report = orchestrator().oneshot(abnormal_slice()).await.unwrap();
        assert_eq!(report.difficulty.tier, DifficultyTier::Consultant);
    }

    struct Panicking;

    impl CtAnalyzer for Panicking {
        type Output = ();

        fn analyze(&self, _image: &CtImage) -> Result<AnalysisOutput<()>, AnalysisError> {
            panic!("analyzer panicked");
        }

        fn name(&self) -> &'static str {
            "Panicking"
        }
    }

    struct Rejecting;

    impl CtAnalyzer for Rejecting {
        type Output = ();

        fn analyze(&self, image: &CtImage) -> Result<AnalysisOutput<()>, AnalysisError> {
            let (width, height) = image.dimensions();
            Err(InvalidImageError::Empty { width, height }.into())
        }

        fn name(&self) -> &'static str {
            "Rejecting"
        }
    }

    #[tokio::test]
    async fn panicking_branch_becomes_task_failure() {
        let image = ct(uniform(10, 10, 0));
        let outcome = settle("Panicking", spawn_analyzer(Arc::new(Panicking), image).await);
        match outcome {
            AnalyzerOutcome::Failed { analyzer, error } => {
                assert_eq!(analyzer, "Panicking");
                assert!(error.contains("did not complete"));
            }
            AnalyzerOutcome::Completed { .. } => panic!("expected a failure"),
        }
    }

    #[tokio::test]
    async fn analyzer_errors_are_reported_by_name() {
        let image = ct(uniform(10, 10, 0));
        let outcome = settle("Rejecting", spawn_analyzer(Arc::new(Rejecting), image).await);
        assert!(matches!(outcome, AnalyzerOutcome::Failed { analyzer: "Rejecting", .. }));
    }
}
