//! Overlay directives for the rendering layer. Nothing here draws.
use super::core::Region;
use super::defect_detector::DefectResult;
use super::grading::GradeResult;
use super::opacification::OpacificationResult;
use super::variant_detector::VariantDetectionResult;
use serde::Serialize;

pub const HALLER_CELL_LABEL: &str = "Haller Cell";
pub const DEFECT_LABEL: &str = "Skull Base Defect";

pub const YELLOW: [u8; 3] = [255, 255, 0];
pub const MAGENTA: [u8; 3] = [255, 0, 255];
pub const RED: [u8; 3] = [255, 0, 0];
pub const GREEN: [u8; 3] = [0, 255, 0];

const SCORE_CAPTION_ORIGIN: (u32, u32) = (10, 30);
const GRADE_CAPTION_ORIGIN: (u32, u32) = (10, 60);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnotationDirective {
    /// Hollow labelled box around a detected region.
    Region {
        region: Region,
        label: &'static str,
        color: [u8; 3],
    },
    /// Text anchored at `origin` (baseline left, pixels).
    Caption {
        origin: (u32, u32),
        text: String,
        color: [u8; 3],
    },
}

impl AnnotationDirective {
    pub fn color(&self) -> [u8; 3] {
        match self {
            AnnotationDirective::Region { color, .. } | AnnotationDirective::Caption { color, .. } => *color,
        }
    }
}

/// Boxes for every variant and defect region, then the score and grade
/// captions. Results that are missing contribute nothing.
pub fn build_annotations(
    opacification: Option<&OpacificationResult>,
    variants: Option<&VariantDetectionResult>,
    grade: Option<&GradeResult>,
    defects: Option<&DefectResult>,
) -> Vec<AnnotationDirective> {
    let mut directives = Vec::new();

    if let Some(variants) = variants {
        directives.extend(variants.locations().iter().map(|&region| AnnotationDirective::Region {
            region,
            label: HALLER_CELL_LABEL,
            color: YELLOW,
        }));
    }
    if let Some(defects) = defects {
        directives.extend(defects.locations().iter().map(|&region| AnnotationDirective::Region {
            region,
            label: DEFECT_LABEL,
            color: MAGENTA,
        }));
    }

    if let Some(opacification) = opacification {
        directives.push(AnnotationDirective::Caption {
            origin: SCORE_CAPTION_ORIGIN,
            text: format!("Lund-Mackay Score: {}", opacification.total_score()),
            color: RED,
        });
    }
    if let Some(grade) = grade {
        directives.push(AnnotationDirective::Caption {
            origin: GRADE_CAPTION_ORIGIN,
            text: format!("Keros Grade: {}", grade.grade()),
            color: GREEN,
        });
    }

    directives
}
