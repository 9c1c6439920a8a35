//! Translucent color overlays laid over a region by a reviewer.

use crate::core_modules::analysis::AnalysisContext;
use crate::core_modules::cad_profile::NamedColor;
use crate::core_modules::candidate::{DetectedPattern, PatternAttributes, PatternType};
use crate::core_modules::contour::mean_and_std;
use crate::core_modules::geometry::BoundingBox;
use crate::core_modules::raster::{self, HsvImage};
use crate::error::Result;
use image::GrayImage;

/// Per-channel spread at which consistency reaches zero (three channels × 50).
pub const CONSISTENCY_SPREAD: f64 = 150.0;
pub const CONSISTENCY_WEIGHT: f64 = 0.6;
pub const COVERAGE_WEIGHT: f64 = 0.4;
const OPEN_RADIUS: u8 = 1;
const CLOSE_RADIUS: u8 = 2;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<Vec<DetectedPattern>> {
    let mut found = Vec::new();
    for &color in ctx.profile.highlight_colors {
        let raw = ctx.hsv.mask(&[color.hsv_range()]);
        let mask = raster::close(&raster::open(&raw, OPEN_RADIUS), CLOSE_RADIUS);
        for outline in raster::external_contours(&mask) {
            let Some(metrics) = outline.metrics() else {
                continue;
            };
            if !ctx.profile.highlight_area.contains(metrics.area) {
                continue;
            }
            let (consistency, coverage) = region_stats(&ctx.hsv, &mask, &metrics.bounding_box);
            found.push(DetectedPattern::from_metrics(
                PatternType::HighlightOverlay,
                outline,
                &metrics,
                CONSISTENCY_WEIGHT * consistency + COVERAGE_WEIGHT * coverage,
                PatternAttributes::Highlight {
                    color,
                    color_consistency: consistency,
                    coverage,
                },
            ));
        }
    }
    Ok(found)
}

/// Color consistency over the masked pixels inside `bbox`, and the fraction of the box
/// the mask fills.
pub fn region_stats(hsv: &HsvImage, mask: &GrayImage, bbox: &BoundingBox) -> (f64, f64) {
    let x0 = bbox.x.max(0.0) as u32;
    let y0 = bbox.y.max(0.0) as u32;
    let x1 = (bbox.x_max().ceil() as u32).min(mask.width());
    let y1 = (bbox.y_max().ceil() as u32).min(mask.height());

    let mut hues = Vec::new();
    let mut sats = Vec::new();
    let mut vals = Vec::new();
    for y in y0..y1 {
        for x in x0..x1 {
            if mask.get_pixel(x, y).0[0] == 0 {
                continue;
            }
            let p = hsv.get(x, y);
            hues.push(p.hue as f64);
            sats.push(p.saturation as f64);
            vals.push(p.value as f64);
        }
    }
    if hues.is_empty() {
        return (0.0, 0.0);
    }

    let spread = mean_and_std(&hues).1 + mean_and_std(&sats).1 + mean_and_std(&vals).1;
    let consistency = (1.0 - spread / CONSISTENCY_SPREAD).clamp(0.0, 1.0);
    let box_pixels = ((x1 - x0) as f64 * (y1 - y0) as f64).max(1.0);
    let coverage = (hues.len() as f64 / box_pixels).min(1.0);
    (consistency, coverage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    #[test]
    fn solid_fill_is_fully_consistent() {
        let mut image = RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]));
        let mut mask = GrayImage::new(40, 40);
        for y in 10..30 {
            for x in 10..30 {
                image.put_pixel(x, y, Rgb([255, 230, 0]));
                mask.put_pixel(x, y, Luma([raster::MASK_ON]));
            }
        }
        let hsv = HsvImage::from_rgb(&image);
        let (consistency, coverage) = region_stats(&hsv, &mask, &BoundingBox::new(10.0, 10.0, 20.0, 20.0));
        assert_eq!(consistency, 1.0);
        assert_eq!(coverage, 1.0);
    }

    #[test]
    fn empty_mask_scores_zero() {
        let image = RgbImage::new(10, 10);
        let hsv = HsvImage::from_rgb(&image);
        let mask = GrayImage::new(10, 10);
        assert_eq!(region_stats(&hsv, &mask, &BoundingBox::new(0.0, 0.0, 10.0, 10.0)), (0.0, 0.0));
    }
}
