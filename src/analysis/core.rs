use crate::error::{AnalysisError, InvalidImageError};
use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::preprocessing;

/// Decoded CT slice shared read-only by every analyzer.
///
/// Cloning only bumps the reference counts, so the same pixels can be handed
/// to several worker tasks at once.
#[derive(Clone)]
pub struct CtImage {
    rgb: Arc<RgbImage>,
    luma: Arc<GrayImage>,
}

impl CtImage {
    pub fn from_rgb(rgb: RgbImage) -> Result<Self, InvalidImageError> {
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(InvalidImageError::Empty { width, height });
        }

        let luma = preprocessing::to_luma(&rgb);
        Ok(Self {
            rgb: Arc::new(rgb),
            luma: Arc::new(luma),
        })
    }

    /// Accepts only 8-bit, three channel rasters. Callers decoding other
    /// layouts convert with `DynamicImage::to_rgb8` first.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self, InvalidImageError> {
        match image {
            DynamicImage::ImageRgb8(rgb) => Self::from_rgb(rgb),
            other => {
                let color = other.color();
                let channels = color.channel_count();
                Err(InvalidImageError::UnsupportedLayout {
                    channels,
                    bits_per_channel: color.bits_per_pixel() / channels.max(1) as u16,
                })
            }
        }
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    pub fn luma(&self) -> &GrayImage {
        &self.luma
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.rgb.dimensions()
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    /// Whole-frame region.
    pub fn frame(&self) -> Region {
        Region::new(0, 0, self.width(), self.height())
    }
}

impl std::fmt::Debug for CtImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CtImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Axis-aligned pixel rectangle, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Lays a fractional rectangle over `frame`. Fractions are relative to the
    /// frame size; the result may be empty for tiny frames.
    pub fn from_fractions(frame: Region, fx: f32, fy: f32, fw: f32, fh: f32) -> Self {
        let scale = |origin: u32, extent: u32, f: f32| -> u32 {
            origin + (extent as f32 * f.clamp(0.0, 1.0)).floor() as u32
        };
        let x0 = scale(frame.x, frame.width, fx);
        let y0 = scale(frame.y, frame.height, fy);
        let x1 = scale(frame.x, frame.width, fx + fw);
        let y1 = scale(frame.y, frame.height, fy + fh);
        Self::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains_point(&self, x: u32, y: u32) -> bool {
        x >= self.x && (x as u64) < self.right() && y >= self.y && (y as u64) < self.bottom()
    }

    pub fn intersection(&self, other: &Region) -> Option<Region> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        if x1 <= x0 as u64 || y1 <= y0 as u64 {
            return None;
        }
        Some(Region::new(
            x0,
            y0,
            (x1 - x0 as u64) as u32,
            (y1 - y0 as u64) as u32,
        ))
    }

    /// Intersection over union, 0.0 for disjoint or empty regions.
    pub fn iou(&self, other: &Region) -> f32 {
        let inter = self.intersection(other).map_or(0, |r| r.area());
        let union = self.area() + other.area() - inter;
        if union == 0 {
            0.0
        } else {
            inter as f32 / union as f32
        }
    }

    /// Clips to a `width` x `height` frame. `None` when nothing is left.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Region> {
        self.intersection(&Region::new(0, 0, width, height))
    }

    /// Checks the region is non-empty and fully inside a `width` x `height` frame.
    pub fn within(self, width: u32, height: u32) -> Result<Region, InvalidImageError> {
        if self.is_empty() || self.right() > width as u64 || self.bottom() > height as u64 {
            return Err(InvalidImageError::RegionOutOfBounds {
                region: self,
                width,
                height,
            });
        }
        Ok(self)
    }
}

/// Output of one analyzer run with the reasoning behind it.
#[derive(Debug, Clone)]
pub struct AnalysisOutput<T> {
    pub result: T,
    pub reasoning: String,
    pub processing_time_us: u64,
}

impl<T> AnalysisOutput<T> {
    pub fn new(result: T, reasoning: String) -> Self {
        Self {
            result,
            reasoning,
            processing_time_us: 0,
        }
    }

    pub fn with_timing(mut self, start_time: Instant) -> Self {
        self.processing_time_us = start_time.elapsed().as_micros() as u64;
        self
    }
}

/// A single, independent analysis over a CT slice.
///
/// Implementations are pure: no shared mutable state, no I/O, and identical
/// output for identical input and configuration.
pub trait CtAnalyzer: Send + Sync {
    type Output: Send + 'static;

    fn analyze(&self, image: &CtImage) -> Result<AnalysisOutput<Self::Output>, AnalysisError>;
    fn name(&self) -> &'static str;
}
