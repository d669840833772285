use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use sinus_ct::analysis::AnnotationDirective;

/// Outline thickness in pixels.
const STROKE: u32 = 2;

/// Draws every region directive onto a copy of `image`. Captions are left
/// to the caller; they need a font the core does not ship.
pub fn render(image: &RgbImage, directives: &[AnnotationDirective]) -> RgbImage {
    let mut canvas = image.clone();
    for directive in directives {
        if let AnnotationDirective::Region { region, color, .. } = directive {
            for inset in 0..STROKE {
                let width = region.width.saturating_sub(2 * inset);
                let height = region.height.saturating_sub(2 * inset);
                if width == 0 || height == 0 {
                    break;
                }
                let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32).of_size(width, height);
                draw_hollow_rect_mut(&mut canvas, rect, Rgb(*color));
            }
        }
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use sinus_ct::analysis::Region;

    #[test]
    fn outlines_regions_without_touching_the_source() {
        let source = RgbImage::from_pixel(50, 50, Rgb([10, 10, 10]));
        let directives = vec![
            AnnotationDirective::Region {
                region: Region::new(10, 10, 20, 20),
                label: "Skull Base Defect",
                color: [255, 0, 255],
            },
            AnnotationDirective::Caption {
                origin: (10, 30),
                text: "Lund-Mackay Score: 0".to_string(),
                color: [255, 0, 0],
            },
        ];

        let drawn = render(&source, &directives);
        assert_eq!(drawn.get_pixel(10, 10), &Rgb([255, 0, 255]));
        assert_eq!(drawn.get_pixel(11, 20), &Rgb([255, 0, 255]));
        assert_eq!(drawn.get_pixel(20, 20), &Rgb([10, 10, 10]));
        assert_eq!(source.get_pixel(10, 10), &Rgb([10, 10, 10]));
    }
}
