//! Cloud-like closed outlines in the edge map.

use super::analyze_all;
use crate::core_modules::analysis::AnalysisContext;
use crate::core_modules::candidate::{DetectionMethod, RawCandidate};
use crate::core_modules::contour::Contour;
use crate::core_modules::raster;
use crate::error::Result;

pub const BLUR_SIGMA: f32 = 1.0;
/// Canny thresholds by sensitivity tier: conservative, default, aggressive.
pub const CONSERVATIVE_THRESHOLDS: (f32, f32) = (80.0, 200.0);
pub const DEFAULT_THRESHOLDS: (f32, f32) = (50.0, 150.0);
pub const AGGRESSIVE_THRESHOLDS: (f32, f32) = (30.0, 100.0);
pub const MAX_CIRCULARITY: f64 = 0.8;
pub const MAX_SOLIDITY: f64 = 0.95;
pub const ASPECT_RANGE: (f64, f64) = (0.1, 10.0);
const CLOSE_RADIUS: u8 = 2;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<Vec<RawCandidate>> {
    let blurred = raster::gaussian_blur(&ctx.gray, BLUR_SIGMA);
    let (low, high) = thresholds(ctx.sensitivity);
    let closed = raster::close(&raster::canny(&blurred, low, high), CLOSE_RADIUS);
    let contours: Vec<Contour> = raster::external_contours(&closed)
        .into_iter()
        .filter(is_cloud_like)
        .collect();
    Ok(analyze_all(DetectionMethod::Shape, contours, ctx))
}

pub fn thresholds(sensitivity: f64) -> (f32, f32) {
    if sensitivity < 0.3 {
        CONSERVATIVE_THRESHOLDS
    } else if sensitivity < 0.7 {
        DEFAULT_THRESHOLDS
    } else {
        AGGRESSIVE_THRESHOLDS
    }
}

/// Clouds are never perfectly round, never perfectly convex and never slivers.
pub fn is_cloud_like(contour: &Contour) -> bool {
    let Some(metrics) = contour.metrics() else {
        return false;
    };
    let f = metrics.features;
    f.circularity <= MAX_CIRCULARITY
        && f.solidity <= MAX_SOLIDITY
        && (ASPECT_RANGE.0..=ASPECT_RANGE.1).contains(&f.aspect_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::Point;
    use std::f64::consts::PI;

    #[test]
    fn tiers_follow_sensitivity() {
        assert_eq!(thresholds(0.1), CONSERVATIVE_THRESHOLDS);
        assert_eq!(thresholds(0.5), DEFAULT_THRESHOLDS);
        assert_eq!(thresholds(0.7), AGGRESSIVE_THRESHOLDS);
    }

    #[test]
    fn convex_shapes_are_not_cloud_like() {
        let square = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(50.0, 0.0),
            Point::new(50.0, 50.0),
            Point::new(0.0, 50.0),
        ]);
        assert!(!is_cloud_like(&square));
    }

    #[test]
    fn star_shapes_are_cloud_like() {
        let star = Contour::new(
            (0..10)
                .map(|i| {
                    let t = PI * i as f64 / 5.0;
                    let r = if i % 2 == 0 { 60.0 } else { 30.0 };
                    Point::new(100.0 + r * t.cos(), 100.0 + r * t.sin())
                })
                .collect(),
        );
        assert!(is_cloud_like(&star));
    }
}
