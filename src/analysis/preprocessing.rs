//! Grayscale statistics shared by the analyzers.
use super::core::Region;
use image::{GrayImage, RgbImage};

pub fn to_luma(rgb: &RgbImage) -> GrayImage {
    image::imageops::grayscale(rgb)
}

/// Summary of the luma values inside a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionStats {
    pub pixel_count: u64,
    pub mean: f32,
    /// Pixels at or above the threshold passed to [`region_stats`].
    pub above_threshold: u64,
}

impl RegionStats {
    pub fn fraction_above(&self) -> f32 {
        if self.pixel_count == 0 {
            0.0
        } else {
            self.above_threshold as f32 / self.pixel_count as f32
        }
    }
}

/// Luma statistics over `region`, clipped to the image. `None` if the clipped
/// region holds no pixels.
pub fn region_stats(luma: &GrayImage, region: Region, threshold: u8) -> Option<RegionStats> {
    let region = region.clip_to(luma.width(), luma.height())?;

    let mut sum = 0u64;
    let mut above = 0u64;
    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            let value = luma.get_pixel(x, y)[0];
            sum += value as u64;
            if value >= threshold {
                above += 1;
            }
        }
    }

    let pixel_count = region.area();
    Some(RegionStats {
        pixel_count,
        mean: sum as f32 / pixel_count as f32,
        above_threshold: above,
    })
}

/// Mean luma of each row of `region`, top to bottom.
pub fn row_profile(luma: &GrayImage, region: Region) -> Vec<f32> {
    let Some(region) = region.clip_to(luma.width(), luma.height()) else {
        return Vec::new();
    };

    (region.y..region.y + region.height)
        .map(|y| {
            let sum: u64 = (region.x..region.x + region.width)
                .map(|x| luma.get_pixel(x, y)[0] as u64)
                .sum();
            sum as f32 / region.width as f32
        })
        .collect()
}

/// Brightest pixel of each column of `region` as `(row, value)`, left to right.
/// Ties resolve to the topmost row.
pub fn column_peaks(luma: &GrayImage, region: Region) -> Vec<(u32, u8)> {
    let Some(region) = region.clip_to(luma.width(), luma.height()) else {
        return Vec::new();
    };

    (region.x..region.x + region.width)
        .map(|x| {
            let mut best = (region.y, luma.get_pixel(x, region.y)[0]);
            for y in region.y + 1..region.y + region.height {
                let value = luma.get_pixel(x, y)[0];
                if value > best.1 {
                    best = (y, value);
                }
            }
            best
        })
        .collect()
}

/// Mean luma of the ring of `thickness` pixels just outside `region`,
/// restricted to the image.
pub fn ring_mean(luma: &GrayImage, region: Region, thickness: u32) -> Option<f32> {
    let (width, height) = luma.dimensions();
    let outer = Region::new(
        region.x.saturating_sub(thickness),
        region.y.saturating_sub(thickness),
        region.width + 2 * thickness,
        region.height + 2 * thickness,
    )
    .clip_to(width, height)?;

    let mut sum = 0u64;
    let mut count = 0u64;
    for y in outer.y..outer.y + outer.height {
        for x in outer.x..outer.x + outer.width {
            if region.contains_point(x, y) {
                continue;
            }
            sum += luma.get_pixel(x, y)[0] as u64;
            count += 1;
        }
    }

    (count > 0).then(|| sum as f32 / count as f32)
}
