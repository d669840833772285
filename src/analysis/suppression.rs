use super::core::Region;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::warn;

/// A candidate region with the confidence the detector assigned to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub region: Region,
    pub confidence: f32,
}

impl Detection {
    pub fn new(region: Region, confidence: f32) -> Self {
        Self { region, confidence }
    }
}

/// Larger area first, then higher confidence, then top-to-bottom, left-to-right.
fn suppression_order(a: &Detection, b: &Detection) -> Ordering {
    b.region
        .area()
        .cmp(&a.region.area())
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| (a.region.y, a.region.x).cmp(&(b.region.y, b.region.x)))
}

/// Non-max suppression: whenever two candidates overlap by more than
/// `iou_threshold`, the larger one is kept.
pub fn suppress_overlaps(candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    let mut candidates = candidates;
    candidates.sort_by(suppression_order);

    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.region.iou(&candidate.region) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

/// Clips every region to the frame and drops those left empty.
pub fn clip_detections(detections: Vec<Detection>, width: u32, height: u32) -> Vec<Detection> {
    detections
        .into_iter()
        .filter_map(|detection| match detection.region.clip_to(width, height) {
            Some(region) if region != detection.region => {
                warn!(
                    "Clipped {:?} to {:?} inside the {}x{} frame",
                    detection.region, region, width, height
                );
                Some(Detection::new(region, detection.confidence))
            }
            Some(_) => Some(detection),
            None => {
                warn!(
                    "Dropped {:?}: no overlap with the {}x{} frame",
                    detection.region, width, height
                );
                None
            }
        })
        .collect()
}

/// Drops candidates below `threshold`, clips the rest to the frame and
/// suppresses overlaps. Output is in suppression order.
pub fn finalize_detections(
    candidates: Vec<Detection>,
    threshold: f32,
    iou_threshold: f32,
    width: u32,
    height: u32,
) -> Vec<Detection> {
    let confident = candidates
        .into_iter()
        .filter(|c| c.confidence >= threshold)
        .collect();
    suppress_overlaps(clip_detections(confident, width, height), iou_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn keeps_larger_of_overlapping_pair() {
        let small = Detection::new(Region::new(10, 10, 10, 10), 0.99);
        let large = Detection::new(Region::new(8, 8, 14, 14), 0.6);
        let kept = suppress_overlaps(vec![small, large], 0.3);
        assert_eq!(kept, vec![large]);
    }

    #[test]
    fn keeps_disjoint_candidates() {
        let a = Detection::new(Region::new(0, 0, 5, 5), 0.9);
        let b = Detection::new(Region::new(50, 50, 5, 5), 0.8);
        let kept = suppress_overlaps(vec![a, b], 0.3);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn equal_area_tie_breaks_on_confidence() {
        let weak = Detection::new(Region::new(0, 0, 10, 10), 0.6);
        let strong = Detection::new(Region::new(1, 1, 10, 10), 0.9);
        let kept = suppress_overlaps(vec![weak, strong], 0.3);
        assert_eq!(kept, vec![strong]);
    }

    #[test]
    fn no_kept_pair_overlaps_above_threshold() {
        let mut rng = StdRng::seed_from_u64(11);
        for iou_threshold in [0.0, 0.1, 0.3, 0.5] {
            let candidates: Vec<Detection> = (0..60)
                .map(|_| {
                    Detection::new(
                        Region::new(
                            rng.random_range(0..80),
                            rng.random_range(0..80),
                            rng.random_range(1..25),
                            rng.random_range(1..25),
                        ),
                        rng.random_range(0.0..1.0),
                    )
                })
                .collect();

            let kept = suppress_overlaps(candidates, iou_threshold);
            for (i, a) in kept.iter().enumerate() {
                for b in &kept[i + 1..] {
                    assert!(a.region.iou(&b.region) <= iou_threshold);
                }
            }
        }
    }

    #[test]
    fn finalize_filters_clips_and_suppresses() {
        let candidates = vec![
            Detection::new(Region::new(90, 90, 20, 20), 0.8),
            Detection::new(Region::new(120, 0, 5, 5), 0.9),
            Detection::new(Region::new(10, 10, 20, 20), 0.4),
        ];
        let kept = finalize_detections(candidates, 0.5, 0.3, 100, 100);
        assert_eq!(kept, vec![Detection::new(Region::new(90, 90, 10, 10), 0.8)]);
    }
}
