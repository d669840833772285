use super::difficulty::DifficultyTier;
use super::orchestrator::AnalysisReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Reviewer feedback on a finished analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feedback {
    pub submitted_at: DateTime<Utc>,
    pub comment: String,
    /// The tier the reviewer would have assigned, if they disagree.
    pub corrected_tier: Option<DifficultyTier>,
}

impl Feedback {
    pub fn new(comment: impl Into<String>, corrected_tier: Option<DifficultyTier>) -> Self {
        Self {
            submitted_at: Utc::now(),
            comment: comment.into(),
            corrected_tier,
        }
    }
}

/// One analysed upload. Created once; afterwards only feedback is added.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRecord {
    id: Uuid,
    image_ref: String,
    created_at: DateTime<Utc>,
    report: AnalysisReport,
    feedback: Vec<Feedback>,
}

impl AnalysisRecord {
    pub fn new(image_ref: impl Into<String>, report: AnalysisReport) -> Self {
        Self {
            id: Uuid::new_v4(),
            image_ref: image_ref.into(),
            created_at: Utc::now(),
            report,
            feedback: Vec::new(),
        }
    }

    pub fn attach_feedback(&mut self, feedback: Feedback) {
        debug!("Feedback attached to analysis {}", self.id);
        self.feedback.push(feedback);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn image_ref(&self) -> &str {
        &self.image_ref
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn report(&self) -> &AnalysisReport {
        &self.report
    }

    pub fn feedback(&self) -> &[Feedback] {
        &self.feedback
    }

    /// Latest reviewer correction, if any reviewer disagreed with the tier.
    pub fn corrected_tier(&self) -> Option<DifficultyTier> {
        self.feedback.iter().rev().find_map(|f| f.corrected_tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::config::AnalysisConfig;
    use crate::analysis::orchestrator::SinusAnalysisOrchestrator;
    use crate::test_utils::{ct, uniform};

    fn record() -> AnalysisRecord {
        let report = SinusAnalysisOrchestrator::new(AnalysisConfig::default())
            .unwrap()
            .analyze(&ct(uniform(64, 64, 20)));
        AnalysisRecord::new("uploads/slice-001.png", report)
    }

    #[test]
    fn records_get_distinct_ids() {
        let a = record();
        let b = record();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.image_ref(), "uploads/slice-001.png");
        assert!(a.feedback().is_empty());
        assert!(a.created_at() <= Utc::now());
    }

    #[test]
    fn feedback_is_appended_in_order() {
        let mut record = record();
        let tier = record.report().difficulty.tier;

        record.attach_feedback(Feedback::new("agree", None));
        record.attach_feedback(Feedback::new("missed a defect", Some(DifficultyTier::Consultant)));

        assert_eq!(record.feedback().len(), 2);
        assert_eq!(record.feedback()[0].comment, "agree");
        assert_eq!(record.corrected_tier(), Some(DifficultyTier::Consultant));
        // The report itself is untouched.
        assert_eq!(record.report().difficulty.tier, tier);
    }

    #[test]
    fn serializes_with_report() {
        let mut record = record();
        record.attach_feedback(Feedback::new("ok", Some(DifficultyTier::Specialist)));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], record.id().to_string());
        assert_eq!(value["feedback"][0]["corrected_tier"], "specialist");
        assert_eq!(value["report"]["difficulty"]["tier"], "resident");
    }
}
