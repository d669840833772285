//! Synthetic CT phantoms shared by the unit tests.

use crate::analysis::core::{CtImage, Region};
use image::{ImageBuffer, Rgb, RgbImage};

pub(crate) fn uniform(width: u32, height: u32, luma: u8) -> RgbImage {
    ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(width, height, Rgb([luma, luma, luma]))
}

pub(crate) fn fill_rect(img: &mut RgbImage, region: Region, luma: u8) {
    let Some(region) = region.clip_to(img.width(), img.height()) else {
        return;
    };
    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            img.put_pixel(x, y, Rgb([luma, luma, luma]));
        }
    }
}

/// Paints every pixel whose distance from `center` lies in `inner..=outer`.
pub(crate) fn fill_annulus(img: &mut RgbImage, center: [f32; 2], inner: f32, outer: f32, luma: u8) {
    for y in 0..img.height() {
        for x in 0..img.width() {
            let dx = x as f32 - center[0];
            let dy = y as f32 - center[1];
            let d = (dx * dx + dy * dy).sqrt();
            if d >= inner && d <= outer {
                img.put_pixel(x, y, Rgb([luma, luma, luma]));
            }
        }
    }
}

pub(crate) fn ct(rgb: RgbImage) -> CtImage {
    CtImage::from_rgb(rgb).expect("phantom is a valid image")
}

/// 200x200 soft-tissue slice with one air cell (radius 8) walled by bone,
/// centered at `center`.
pub(crate) fn air_cell_phantom(centers: &[[f32; 2]]) -> RgbImage {
    let mut img = uniform(200, 200, 110);
    for &center in centers {
        fill_annulus(&mut img, center, 8.5, 10.5, 200);
        fill_annulus(&mut img, center, 0.0, 8.0, 20);
    }
    img
}

/// 200x200 slice with a bright skull base line on rows 39..42 spanning
/// x 50..150, interrupted at `gap` (start column, width) when given.
pub(crate) fn skull_base_phantom(gap: Option<(u32, u32)>) -> RgbImage {
    let mut img = uniform(200, 200, 100);
    fill_rect(&mut img, Region::new(50, 39, 100, 3), 230);
    if let Some((start, width)) = gap {
        fill_rect(&mut img, Region::new(start, 39, width, 3), 100);
    }
    img
}

/// 200x200 slice with both ethmoid roofs on row 40 and the cribriform
/// plate `depth` rows lower.
pub(crate) fn olfactory_fossa_phantom(depth: u32) -> RgbImage {
    let mut img = uniform(200, 200, 60);
    fill_rect(&mut img, Region::new(70, 40, 22, 2), 220);
    fill_rect(&mut img, Region::new(108, 40, 22, 2), 220);
    fill_rect(&mut img, Region::new(92, 40 + depth, 16, 2), 220);
    img
}
