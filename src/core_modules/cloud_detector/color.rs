//! Marker-color and translucent-fill regions.

use super::analyze_all;
use crate::core_modules::analysis::AnalysisContext;
use crate::core_modules::cad_profile::NamedColor;
use crate::core_modules::candidate::{DetectionMethod, RawCandidate};
use crate::core_modules::pixel::HsvRange;
use crate::core_modules::raster::{self, MASK_ON};
use crate::error::Result;
use image::GrayImage;

/// Saturation/value widening per unit of sensitivity bias (0.4 · 50).
pub const RANGE_NUDGE: f64 = 20.0;
/// Lightest-gray band a translucent fill may fall in; paper white sits at or above the top.
pub const TRANSPARENCY_LOW: f64 = 225.0;
pub const TRANSPARENCY_HIGH: f64 = 250.0;
pub const TRANSPARENCY_LOW_SWING: f64 = 20.0;
/// Largest deviation from the local mean a translucent pixel may show.
pub const TRANSPARENCY_CONTRAST: f64 = 10.0;
pub const TRANSPARENCY_CONTRAST_SWING: f64 = 10.0;
const LOCAL_MEAN_RADIUS: u32 = 2;
const CLOSE_RADIUS: u8 = 2;
const OPEN_RADIUS: u8 = 1;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<Vec<RawCandidate>> {
    let mut mask = ctx.hsv.mask(&nudged_ranges(ctx.bias()));
    raster::union_into(&mut mask, &transparency_mask(&ctx.gray, ctx.bias()));
    let cleaned = raster::open(&raster::close(&mask, CLOSE_RADIUS), OPEN_RADIUS);
    Ok(analyze_all(
        DetectionMethod::Color,
        raster::external_contours(&cleaned),
        ctx,
    ))
}

pub fn nudged_ranges(bias: f64) -> Vec<HsvRange> {
    NamedColor::ALL
        .iter()
        .map(|c| c.hsv_range().nudged(bias * RANGE_NUDGE))
        .collect()
}

/// Very light, locally flat pixels: the look of a translucent overlay on white paper.
pub fn transparency_mask(gray: &GrayImage, bias: f64) -> GrayImage {
    let low = TRANSPARENCY_LOW - bias * TRANSPARENCY_LOW_SWING;
    let contrast = TRANSPARENCY_CONTRAST + bias * TRANSPARENCY_CONTRAST_SWING;
    let local_mean = raster::box_mean(gray, LOCAL_MEAN_RADIUS);

    let mut mask = GrayImage::new(gray.width(), gray.height());
    for ((out, g), m) in mask.pixels_mut().zip(gray.pixels()).zip(local_mean.pixels()) {
        let value = g.0[0] as f64;
        let flat = (value - m.0[0] as f64).abs() < contrast;
        if value >= low && value < TRANSPARENCY_HIGH && flat {
            out.0[0] = MASK_ON;
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn paper_white_is_not_translucent() {
        let gray = GrayImage::from_pixel(20, 20, Luma([255]));
        assert_eq!(raster::count_on(&transparency_mask(&gray, 0.2)), 0);
    }

    #[test]
    fn flat_light_fill_is_translucent() {
        let gray = GrayImage::from_pixel(20, 20, Luma([235]));
        assert_eq!(raster::count_on(&transparency_mask(&gray, 0.2)), 400);
    }

    #[test]
    fn higher_sensitivity_widens_ranges() {
        let narrow = nudged_ranges(-0.5);
        let wide = nudged_ranges(0.5);
        assert_eq!(narrow.len(), 6);
        assert!(wide[0].lower[1] < narrow[0].lower[1]);
        assert!(wide[0].upper[2] >= narrow[0].upper[2]);
        assert_eq!(wide[0].lower[0], narrow[0].lower[0]);
    }
}
