//! Lund-Mackay style opacification scoring over the canonical sinus layout.
use super::config::OpacificationConfig;
use super::core::{AnalysisOutput, CtAnalyzer, CtImage, Region};
use super::preprocessing::region_stats;
use crate::error::{AnalysisError, InvalidImageError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Instant;

pub const MAX_REGION_SCORE: u8 = 2;
/// Eight regions (four sinus groups per side) scored 0-2 each, so 0-16.
/// The per-side Lund-Mackay convention also scores the ostiomeatal complex
/// and reports 0-12 per side; that split is not used here.
pub const MAX_TOTAL_SCORE: u8 = MAX_REGION_SCORE * SinusRegion::ALL.len() as u8;

/// Sinus regions scored on a coronal slice. "Right" is the patient's right,
/// which sits on the image's left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinusRegion {
    RightFrontal,
    LeftFrontal,
    RightEthmoid,
    LeftEthmoid,
    RightMaxillary,
    LeftMaxillary,
    RightSphenoid,
    LeftSphenoid,
}

impl SinusRegion {
    pub const ALL: [SinusRegion; 8] = [
        SinusRegion::RightFrontal,
        SinusRegion::LeftFrontal,
        SinusRegion::RightEthmoid,
        SinusRegion::LeftEthmoid,
        SinusRegion::RightMaxillary,
        SinusRegion::LeftMaxillary,
        SinusRegion::RightSphenoid,
        SinusRegion::LeftSphenoid,
    ];

    /// `(x, y, width, height)` as fractions of the frame.
    fn layout(self) -> (f32, f32, f32, f32) {
        match self {
            SinusRegion::RightFrontal => (0.30, 0.05, 0.18, 0.15),
            SinusRegion::LeftFrontal => (0.52, 0.05, 0.18, 0.15),
            SinusRegion::RightEthmoid => (0.38, 0.25, 0.10, 0.25),
            SinusRegion::LeftEthmoid => (0.52, 0.25, 0.10, 0.25),
            SinusRegion::RightMaxillary => (0.12, 0.52, 0.26, 0.30),
            SinusRegion::LeftMaxillary => (0.62, 0.52, 0.26, 0.30),
            SinusRegion::RightSphenoid => (0.40, 0.55, 0.09, 0.15),
            SinusRegion::LeftSphenoid => (0.51, 0.55, 0.09, 0.15),
        }
    }

    /// Pixel rectangle of this sinus inside `frame`. May be empty.
    pub fn region_in(self, frame: Region) -> Region {
        let (fx, fy, fw, fh) = self.layout();
        Region::from_fractions(frame, fx, fy, fw, fh)
    }

    pub fn label(self) -> &'static str {
        match self {
            SinusRegion::RightFrontal => "right frontal",
            SinusRegion::LeftFrontal => "left frontal",
            SinusRegion::RightEthmoid => "right ethmoid",
            SinusRegion::LeftEthmoid => "left ethmoid",
            SinusRegion::RightMaxillary => "right maxillary",
            SinusRegion::LeftMaxillary => "left maxillary",
            SinusRegion::RightSphenoid => "right sphenoid",
            SinusRegion::LeftSphenoid => "left sphenoid",
        }
    }
}

/// Per-region severities (0 clear, 1 partial, 2 complete) and their sum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpacificationResult {
    scores: IndexMap<SinusRegion, u8>,
    total_score: u8,
    /// Regions that fell outside the frame and were scored 0.
    unscored: Vec<SinusRegion>,
}

impl OpacificationResult {
    /// Every region listed, in canonical order. Regions missing from
    /// `scores` are 0; values above [`MAX_REGION_SCORE`] are capped.
    pub fn from_scores(scores: impl IntoIterator<Item = (SinusRegion, u8)>) -> Self {
        let mut all: IndexMap<SinusRegion, u8> =
            SinusRegion::ALL.iter().map(|&region| (region, 0)).collect();
        for (region, score) in scores {
            all.insert(region, score.min(MAX_REGION_SCORE));
        }
        let total_score = all.values().sum();

        Self {
            scores: all,
            total_score,
            unscored: Vec::new(),
        }
    }

    /// All-clear result.
    pub fn clear() -> Self {
        Self::from_scores(std::iter::empty())
    }

    fn with_unscored(mut self, unscored: Vec<SinusRegion>) -> Self {
        self.unscored = unscored;
        self
    }

    pub fn scores(&self) -> &IndexMap<SinusRegion, u8> {
        &self.scores
    }

    pub fn score(&self, region: SinusRegion) -> u8 {
        self.scores.get(&region).copied().unwrap_or(0)
    }

    pub fn total_score(&self) -> u8 {
        self.total_score
    }

    pub fn unscored(&self) -> &[SinusRegion] {
        &self.unscored
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpacificationScorer {
    config: OpacificationConfig,
}

impl OpacificationScorer {
    pub fn new(config: OpacificationConfig) -> Self {
        Self { config }
    }

    fn severity(&self, opaque_fraction: f32) -> u8 {
        if opaque_fraction >= self.config.total_fraction {
            2
        } else if opaque_fraction >= self.config.partial_fraction {
            1
        } else {
            0
        }
    }

    /// The frame the layout is laid over: the configured ROI clipped to the
    /// image, or the whole image.
    fn frame(&self, image: &CtImage) -> Result<Region, InvalidImageError> {
        let (width, height) = image.dimensions();
        match self.config.roi {
            None => Ok(image.frame()),
            Some(roi) => roi
                .clip_to(width, height)
                .ok_or(InvalidImageError::RegionOutOfBounds {
                    region: roi,
                    width,
                    height,
                }),
        }
    }
}

impl CtAnalyzer for OpacificationScorer {
    type Output = OpacificationResult;

    fn analyze(&self, image: &CtImage) -> Result<AnalysisOutput<OpacificationResult>, AnalysisError> {
        let start_time = Instant::now();
        let frame = self.frame(image)?;

        let mut scores = Vec::with_capacity(SinusRegion::ALL.len());
        let mut unscored = Vec::new();
        let mut notes = Vec::new();

        for region in SinusRegion::ALL {
            let rect = region.region_in(frame);
            let stats = if rect.is_empty() {
                None
            } else {
                region_stats(image.luma(), rect, self.config.opacity_threshold)
            };

            match stats {
                Some(stats) => {
                    let fraction = stats.fraction_above();
                    let severity = self.severity(fraction);
                    notes.push(format!("{} {:.0}% opaque -> {}", region.label(), fraction * 100.0, severity));
                    scores.push((region, severity));
                }
                None => {
                    notes.push(format!("{} unscoreable -> 0", region.label()));
                    unscored.push(region);
                }
            }
        }

        let result = OpacificationResult::from_scores(scores).with_unscored(unscored);
        let reasoning = format!(
            "Opacification total {}/{}: {}",
            result.total_score(),
            MAX_TOTAL_SCORE,
            notes.join("; ")
        );

        Ok(AnalysisOutput::new(result, reasoning).with_timing(start_time))
    }

    fn name(&self) -> &'static str {
        "OpacificationScorer"
    }
}
