//! Skull base defect detection.
//!
//! The roof of the ethmoid and the cribriform plate form a continuous bright
//! line on a coronal slice. A run of columns where that line disappears,
//! with intact bone on both sides, is reported as a candidate bony defect.
use super::config::DefectDetectorConfig;
use super::core::{AnalysisOutput, CtAnalyzer, CtImage, Region};
use super::preprocessing::column_peaks;
use super::suppression::{finalize_detections, Detection};
use crate::error::AnalysisError;
use serde::Serialize;
use std::time::Instant;

/// Skull base band as `(x, y, width, height)` fractions of the image.
const SKULL_BASE_BAND: (f32, f32, f32, f32) = (0.25, 0.10, 0.50, 0.25);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefectResult {
    defect_detected: bool,
    locations: Vec<Region>,
    confidences: Vec<f32>,
}

impl DefectResult {
    pub fn from_detections(detections: Vec<Detection>) -> Self {
        let (locations, confidences) = detections
            .into_iter()
            .map(|d| (d.region, d.confidence))
            .unzip::<_, _, Vec<_>, Vec<_>>();
        Self {
            defect_detected: !locations.is_empty(),
            locations,
            confidences,
        }
    }

    /// Regions reported by another source, taken at full confidence.
    pub fn from_regions(regions: Vec<Region>) -> Self {
        Self::from_detections(regions.into_iter().map(|r| Detection::new(r, 1.0)).collect())
    }

    pub fn none() -> Self {
        Self::from_detections(Vec::new())
    }

    pub fn defect_detected(&self) -> bool {
        self.defect_detected
    }

    pub fn locations(&self) -> &[Region] {
        &self.locations
    }

    pub fn confidences(&self) -> &[f32] {
        &self.confidences
    }

    pub fn count(&self) -> usize {
        self.locations.len()
    }
}

/// A run of columns without bone, as offsets into the band.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Gap {
    start: usize,
    end: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SkullBaseDefectDetector {
    config: DefectDetectorConfig,
}

impl SkullBaseDefectDetector {
    pub fn new(config: DefectDetectorConfig) -> Self {
        Self { config }
    }

    /// Bone columns required on each side of a gap; never fewer than one.
    fn flank(&self) -> usize {
        self.config.min_flank_columns.max(1) as usize
    }

    /// Runs of non-bone columns with at least `min_flank_columns` of bone on
    /// each side.
    fn flanked_gaps(&self, is_bone: &[bool]) -> Vec<Gap> {
        let flank = self.flank();
        let mut gaps = Vec::new();
        let mut i = 0;

        while i < is_bone.len() {
            if is_bone[i] {
                i += 1;
                continue;
            }
            let start = i;
            while i < is_bone.len() && !is_bone[i] {
                i += 1;
            }
            let end = i;

            let left_ok = start >= flank && is_bone[start - flank..start].iter().all(|&b| b);
            let right_ok = end + flank <= is_bone.len() && is_bone[end..end + flank].iter().all(|&b| b);
            if left_ok && right_ok {
                gaps.push(Gap { start, end });
            }
        }
        gaps
    }

    fn gap_width_bounds(&self, image_width: u32) -> (usize, usize) {
        let min = (self.config.min_gap_fraction * image_width as f32).ceil().max(1.0) as usize;
        let max = (self.config.max_gap_fraction * image_width as f32).floor() as usize;
        (min, max)
    }

    fn candidate(&self, gap: Gap, peaks: &[(u32, u8)], band: Region, image_height: u32) -> Detection {
        let flank = self.flank();
        let flank_peaks: Vec<(u32, u8)> = peaks[gap.start - flank..gap.start]
            .iter()
            .chain(&peaks[gap.end..gap.end + flank])
            .copied()
            .collect();

        let mut rows: Vec<u32> = flank_peaks.iter().map(|&(row, _)| row).collect();
        rows.sort_unstable();
        let line_row = rows[rows.len() / 2];

        let flank_strength =
            flank_peaks.iter().map(|&(_, v)| v as f32).sum::<f32>() / flank_peaks.len() as f32 / 255.0;
        let gap_peaks = &peaks[gap.start..gap.end];
        let gap_mean = gap_peaks.iter().map(|&(_, v)| v as f32).sum::<f32>() / gap_peaks.len() as f32;
        let depth = (1.0 - gap_mean / self.config.bone_threshold as f32).clamp(0.0, 1.0);

        let half_height = ((image_height as f32 * 0.02).round() as u32).max(2);
        let region = Region::new(
            band.x + gap.start as u32,
            line_row.saturating_sub(half_height),
            (gap.end - gap.start) as u32,
            2 * half_height + 1,
        );

        Detection::new(region, 0.5 * flank_strength + 0.5 * depth)
    }
}

impl CtAnalyzer for SkullBaseDefectDetector {
    type Output = DefectResult;

    fn analyze(&self, image: &CtImage) -> Result<AnalysisOutput<DefectResult>, AnalysisError> {
        let start_time = Instant::now();
        let (width, height) = image.dimensions();
        let (fx, fy, fw, fh) = SKULL_BASE_BAND;
        let band = Region::from_fractions(image.frame(), fx, fy, fw, fh);

        let peaks = column_peaks(image.luma(), band);
        let is_bone: Vec<bool> = peaks
            .iter()
            .map(|&(_, value)| value >= self.config.bone_threshold)
            .collect();
        let (min_gap, max_gap) = self.gap_width_bounds(width);

        let gaps = self.flanked_gaps(&is_bone);
        let candidates: Vec<Detection> = gaps
            .iter()
            .filter(|gap| (min_gap..=max_gap).contains(&(gap.end - gap.start)))
            .map(|&gap| self.candidate(gap, &peaks, band, height))
            .collect();
        let candidate_count = candidates.len();

        let detections = finalize_detections(
            candidates,
            self.config.threshold,
            self.config.iou_threshold,
            width,
            height,
        );

        let bone_columns = is_bone.iter().filter(|&&b| b).count();
        let reasoning = format!(
            "Skull base scan: {}/{} bone columns, {} flanked gaps, {} of width {}..={}, {} reported",
            bone_columns,
            is_bone.len(),
            gaps.len(),
            candidate_count,
            min_gap,
            max_gap,
            detections.len()
        );
        Ok(AnalysisOutput::new(DefectResult::from_detections(detections), reasoning).with_timing(start_time))
    }

    fn name(&self) -> &'static str {
        "SkullBaseDefectDetector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ct, fill_rect, skull_base_phantom, uniform};

    fn detect(img: image::RgbImage) -> DefectResult {
        SkullBaseDefectDetector::default().analyze(&ct(img)).unwrap().result
    }

    #[test]
    fn intact_skull_base_has_no_defect() {
        let result = detect(skull_base_phantom(None));
        assert!(!result.defect_detected());
        assert!(result.locations().is_empty());
    }

    #[test]
    fn finds_gap_in_bone_line() {
        let result = detect(skull_base_phantom(Some((95, 10))));
        assert!(result.defect_detected());
        assert_eq!(result.count(), 1);

        let region = result.locations()[0];
        assert_eq!(region.x, 95);
        assert_eq!(region.width, 10);
        assert!(region.contains_point(100, 40));
        assert!(region.within(200, 200).is_ok());
        assert!(result.confidences()[0] >= 0.5);
    }

    #[test]
    fn reports_each_separate_gap() {
        let mut img = skull_base_phantom(Some((70, 6)));
        fill_rect(&mut img, Region::new(120, 39, 8, 3), 100);
        let result = detect(img);
        assert_eq!(result.count(), 2);
    }

    #[test]
    fn ignores_gaps_too_wide_to_be_a_defect() {
        let result = detect(skull_base_phantom(Some((70, 60))));
        assert!(!result.defect_detected());
    }

    #[test]
    fn ignores_single_column_noise_below_min_width() {
        let result = detect(skull_base_phantom(Some((100, 1))));
        assert!(!result.defect_detected());
    }

    #[test]
    fn no_bone_means_nothing_to_break() {
        assert!(!detect(uniform(200, 200, 100)).defect_detected());
        assert!(!detect(uniform(200, 200, 255)).defect_detected());
    }

    #[test]
    fn gap_without_flanking_bone_is_ignored() {
        let detector = SkullBaseDefectDetector::default();
        let columns = [
            false, false, true, true, true, false, false, true, true, true, false,
        ];
        let gaps = detector.flanked_gaps(&columns);
        assert_eq!(gaps, vec![Gap { start: 5, end: 7 }]);
    }

    #[test]
    fn regions_near_the_top_edge_stay_in_frame() {
        // Bone line at the very top of the band on a short image.
        let mut img = uniform(200, 12, 100);
        fill_rect(&mut img, Region::new(50, 1, 100, 1), 230);
        fill_rect(&mut img, Region::new(95, 1, 10, 1), 100);
        let result = detect(img);
        for region in result.locations() {
            assert!(region.within(200, 12).is_ok());
        }
    }

    #[test]
    fn zero_flank_columns_still_requires_bone_on_both_sides() {
        let detector = SkullBaseDefectDetector::new(DefectDetectorConfig {
            min_flank_columns: 0,
            ..DefectDetectorConfig::default()
        });
        let result = detector.analyze(&ct(skull_base_phantom(Some((95, 10))))).unwrap().result;
        assert_eq!(result.count(), 1);
        assert_eq!(result.locations()[0].x, 95);

        let gaps = detector.flanked_gaps(&[false, true, false, false, true, false]);
        assert_eq!(gaps, vec![Gap { start: 2, end: 4 }]);
    }

    #[test]
    fn defect_region_inside_frame_is_valid() {
        let result = DefectResult::from_regions(vec![Region::new(10, 10, 20, 20)]);
        assert!(result.defect_detected());
        assert_eq!(result.locations()[0].within(100, 100), Ok(Region::new(10, 10, 20, 20)));
    }
}
