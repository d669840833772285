//! Haller (infraorbital ethmoid) cell detection.
//!
//! Haller cells show up as small, rounded pockets of air walled by thin bone
//! along the floor of the orbit. The detector thresholds air inside the
//! infraorbital band, labels connected components and keeps the ones whose
//! size, shape and rim contrast fit an air cell.
use super::config::VariantDetectorConfig;
use super::core::{AnalysisOutput, CtAnalyzer, CtImage, Region};
use super::preprocessing::ring_mean;
use super::suppression::{finalize_detections, Detection};
use crate::error::AnalysisError;
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::Serialize;
use std::time::Instant;

/// Infraorbital search band as `(x, y, width, height)` fractions of the image.
const SEARCH_BAND: (f32, f32, f32, f32) = (0.15, 0.30, 0.70, 0.30);
/// Rim thickness, in pixels, used to measure wall contrast.
const RIM_PX: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantDetectionResult {
    detected: bool,
    locations: Vec<Region>,
    confidences: Vec<f32>,
}

impl VariantDetectionResult {
    pub fn from_detections(detections: Vec<Detection>) -> Self {
        let (locations, confidences) = detections
            .into_iter()
            .map(|d| (d.region, d.confidence))
            .unzip::<_, _, Vec<_>, Vec<_>>();
        Self {
            detected: !locations.is_empty(),
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

    pub fn detected(&self) -> bool {
        self.detected
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

#[derive(Debug, Clone, Copy)]
struct Component {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    pixel_count: u64,
    luma_sum: u64,
}

impl Component {
    fn new(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            pixel_count: 0,
            luma_sum: 0,
        }
    }

    fn add(&mut self, x: u32, y: u32, luma: u8) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.pixel_count += 1;
        self.luma_sum += luma as u64;
    }

    fn bounds(&self) -> Region {
        Region::new(
            self.min_x,
            self.min_y,
            self.max_x - self.min_x + 1,
            self.max_y - self.min_y + 1,
        )
    }

    fn touches(&self, band: &Region) -> bool {
        self.min_x == band.x
            || self.min_y == band.y
            || self.max_x as u64 + 1 == band.right()
            || self.max_y as u64 + 1 == band.bottom()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HallerCellDetector {
    config: VariantDetectorConfig,
}

impl HallerCellDetector {
    pub fn new(config: VariantDetectorConfig) -> Self {
        Self { config }
    }

    fn search_band(image: &CtImage) -> Region {
        let (fx, fy, fw, fh) = SEARCH_BAND;
        Region::from_fractions(image.frame(), fx, fy, fw, fh)
    }

    /// 255 where a pixel inside `band` is air, 0 elsewhere.
    fn air_mask(&self, luma: &GrayImage, band: Region) -> GrayImage {
        let mut mask = GrayImage::new(luma.width(), luma.height());
        for y in band.y..band.y + band.height {
            for x in band.x..band.x + band.width {
                if luma.get_pixel(x, y)[0] <= self.config.air_threshold {
                    mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
        mask
    }

    fn components(&self, luma: &GrayImage, band: Region) -> Vec<Component> {
        let labels = connected_components(&self.air_mask(luma, band), Connectivity::Eight, Luma([0u8]));

        let mut components: Vec<Option<Component>> = Vec::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label[0] as usize;
            if label == 0 {
                continue;
            }
            if components.len() <= label {
                components.resize(label + 1, None);
            }
            components[label]
                .get_or_insert_with(|| Component::new(x, y))
                .add(x, y, luma.get_pixel(x, y)[0]);
        }
        components.into_iter().flatten().collect()
    }

    /// Confidence in `0.0..=1.0`, or `None` when the component's size or
    /// shape rules it out.
    fn score(&self, component: &Component, luma: &GrayImage, band: &Region) -> Option<f32> {
        if component.touches(band) {
            return None;
        }

        let bounds = component.bounds();
        let image_area = luma.width() as f32 * luma.height() as f32;
        let area_fraction = component.pixel_count as f32 / image_area;
        if area_fraction < self.config.min_area_fraction || area_fraction > self.config.max_area_fraction {
            return None;
        }

        let aspect = bounds.width as f32 / bounds.height as f32;
        if aspect < self.config.min_aspect_ratio || aspect > self.config.max_aspect_ratio {
            return None;
        }

        let fill = component.pixel_count as f32 / bounds.area() as f32;
        if fill < self.config.min_fill_ratio {
            return None;
        }

        let inner_mean = component.luma_sum as f32 / component.pixel_count as f32;
        let rim_mean = ring_mean(luma, bounds, RIM_PX)?;
        let contrast = ((rim_mean - inner_mean) / 128.0).clamp(0.0, 1.0);

        Some(0.5 * fill.min(1.0) + 0.5 * contrast)
    }
}

impl CtAnalyzer for HallerCellDetector {
    type Output = VariantDetectionResult;

    fn analyze(&self, image: &CtImage) -> Result<AnalysisOutput<VariantDetectionResult>, AnalysisError> {
        let start_time = Instant::now();
        let (width, height) = image.dimensions();
        let band = Self::search_band(image);

        if band.is_empty() {
            return Ok(AnalysisOutput::new(
                VariantDetectionResult::none(),
                "Haller cell search band is empty at this image size".to_string(),
            )
            .with_timing(start_time));
        }

        let luma = image.luma();
        let components = self.components(luma, band);
        let candidates: Vec<Detection> = components
            .iter()
            .filter_map(|c| self.score(c, luma, &band).map(|conf| Detection::new(c.bounds(), conf)))
            .collect();
        let candidate_count = candidates.len();

        let detections = finalize_detections(
            candidates,
            self.config.threshold,
            self.config.iou_threshold,
            width,
            height,
        );

        let reasoning = format!(
            "Haller cell detection: {} air components, {} plausible cells, {} reported",
            components.len(),
            candidate_count,
            detections.len()
        );
        Ok(AnalysisOutput::new(VariantDetectionResult::from_detections(detections), reasoning)
            .with_timing(start_time))
    }

    fn name(&self) -> &'static str {
        "HallerCellDetector"
    }
}
