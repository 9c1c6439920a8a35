//! Loops sketched by hand: no scallop rhythm and no straight edges, but a curvature
//! profile that wanders and a perimeter too long for the area it encloses.

use crate::core_modules::analysis::AnalysisContext;
use crate::core_modules::candidate::{DetectedPattern, PatternAttributes, PatternType};
use crate::core_modules::contour::{CIRCLE_COMPACTNESS, ContourMetrics, mean_and_std};
use crate::core_modules::raster;
use crate::error::Result;

pub const BILATERAL_WINDOW: u32 = 9;
pub const BILATERAL_SIGMA_COLOR: f32 = 75.0;
pub const BILATERAL_SIGMA_SPATIAL: f32 = 75.0;
/// Thin-stroke and thick-stroke Canny passes.
pub const THIN_STROKE_THRESHOLDS: (f32, f32) = (30.0, 100.0);
pub const THICK_STROKE_THRESHOLDS: (f32, f32) = (50.0, 150.0);
/// Chord offset used when sampling turn angles.
pub const CURVATURE_OFFSET: usize = 2;
/// Curvature normalizer, in radians.
pub const CURVATURE_NORMALIZER: f64 = 0.5;
/// Compactness excess that maps to a full organic score.
pub const ORGANIC_NORMALIZER: f64 = 20.0;
pub const IRREGULARITY_GATE: f64 = 0.3;
pub const SMOOTHNESS_GATE: f64 = 0.2;
pub const ORGANIC_GATE: f64 = 0.4;
pub const IRREGULARITY_WEIGHT: f64 = 0.35;
pub const SMOOTHNESS_WEIGHT: f64 = 0.25;
pub const ORGANIC_WEIGHT: f64 = 0.25;
pub const SIZE_WEIGHT: f64 = 0.15;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<Vec<DetectedPattern>> {
    let smoothed = raster::bilateral(
        &ctx.gray,
        BILATERAL_WINDOW,
        BILATERAL_SIGMA_COLOR,
        BILATERAL_SIGMA_SPATIAL,
    );
    let mut edges = raster::canny(&smoothed, THIN_STROKE_THRESHOLDS.0, THIN_STROKE_THRESHOLDS.1);
    raster::union_into(
        &mut edges,
        &raster::canny(&smoothed, THICK_STROKE_THRESHOLDS.0, THICK_STROKE_THRESHOLDS.1),
    );

    let mut found = Vec::new();
    for outline in raster::external_contours(&edges) {
        let Some(metrics) = outline.metrics() else {
            continue;
        };
        if !ctx.profile.cloud_area.contains(metrics.area) {
            continue;
        }
        let scores = FreehandScores::from_angles(&outline.turn_angles(CURVATURE_OFFSET), &metrics);
        if !scores.is_freehand() {
            continue;
        }
        let size = if ctx.profile.revision_area.contains(metrics.area) { 1.0 } else { 0.5 };
        found.push(DetectedPattern::from_metrics(
            PatternType::FreehandCloud,
            outline,
            &metrics,
            scores.confidence(size, ctx.sensitivity),
            PatternAttributes::Freehand {
                irregularity: scores.irregularity,
                smoothness: scores.smoothness,
                organic_shape: scores.organic_shape,
            },
        ));
    }
    Ok(found)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreehandScores {
    pub irregularity: f64,
    pub smoothness: f64,
    pub organic_shape: f64,
}

impl FreehandScores {
    pub fn from_angles(angles: &[f64], metrics: &ContourMetrics) -> Self {
        let (mean, std) = mean_and_std(angles);
        let perimeter = metrics.features.perimeter;
        let compactness = perimeter * perimeter / metrics.area;
        Self {
            irregularity: (std / CURVATURE_NORMALIZER).min(1.0),
            smoothness: 1.0 - (mean / CURVATURE_NORMALIZER).min(1.0),
            organic_shape: ((compactness - CIRCLE_COMPACTNESS) / ORGANIC_NORMALIZER).clamp(0.0, 1.0),
        }
    }

    pub fn is_freehand(&self) -> bool {
        (self.irregularity > IRREGULARITY_GATE && self.smoothness > SMOOTHNESS_GATE)
            || self.organic_shape > ORGANIC_GATE
    }

    pub fn confidence(&self, size: f64, sensitivity: f64) -> f64 {
        (IRREGULARITY_WEIGHT * self.irregularity
            + SMOOTHNESS_WEIGHT * self.smoothness
            + ORGANIC_WEIGHT * self.organic_shape
            + SIZE_WEIGHT * size)
            * sensitivity
    }
}
