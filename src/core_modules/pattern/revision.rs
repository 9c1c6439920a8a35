//! Scalloped revision clouds traced as closed edge loops.
//!
//! A revision cloud's outline is a chain of arcs, so its distance from the centroid
//! rises and falls in a regular rhythm. After smoothing the radial signal, the residual
//! of a scalloped loop is moderate: a clean rectangle or ellipse leaves almost nothing
//! and noise leaves a great deal.

use crate::core_modules::analysis::AnalysisContext;
use crate::core_modules::candidate::{DetectedPattern, PatternAttributes, PatternType};
use crate::core_modules::contour::{self, ContourMetrics};
use crate::core_modules::raster;
use crate::error::Result;

/// Boundary points sampled for the radial signal.
pub const RADIAL_SAMPLES: usize = 100;
/// Moving-average window over the radial signal.
pub const SMOOTHING_WINDOW: usize = 5;
/// Accepted residual std / mean radius.
pub const UNDULATION_MIN: f64 = 0.02;
pub const UNDULATION_MAX: f64 = 0.5;
/// Normalizer for the reported scallop ratio.
pub const SCALLOP_NORMALIZER: f64 = 0.5;
pub const SOLIDITY_RANGE: (f64, f64) = (0.5, 0.95);
pub const CIRCULARITY_RANGE: (f64, f64) = (0.1, 0.85);
pub const IRREGULAR_WEIGHT: f64 = 0.4;
pub const SIZE_WEIGHT: f64 = 0.3;
pub const UNDULATION_WEIGHT: f64 = 0.3;
pub const ACCEPT_CONFIDENCE: f64 = 0.6;
const CLOSE_RADIUS: u8 = 2;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<Vec<DetectedPattern>> {
    let edges = raster::canny(&ctx.gray, ctx.profile.canny_low, ctx.profile.canny_high);
    let closed = raster::close(&edges, CLOSE_RADIUS);

    let mut found = Vec::new();
    for outline in raster::external_contours(&closed) {
        let Some(metrics) = outline.metrics() else {
            continue;
        };
        if !ctx.profile.revision_area.contains(metrics.area) {
            continue;
        }
        let undulation = undulation(&outline.radial_profile(RADIAL_SAMPLES));
        let score = score(&metrics, undulation);
        if score.confidence >= ACCEPT_CONFIDENCE {
            found.push(DetectedPattern::from_metrics(
                PatternType::RevisionCloud,
                outline,
                &metrics,
                score.confidence,
                PatternAttributes::Revision {
                    scallop_ratio: (undulation / SCALLOP_NORMALIZER).min(1.0),
                    undulation,
                    is_revision_cloud: true,
                },
            ));
        }
    }
    Ok(found)
}

/// Residual standard deviation of the smoothed radial signal relative to its mean.
pub fn undulation(radii: &[f64]) -> f64 {
    let (mean, _) = contour::mean_and_std(radii);
    if mean <= 0.0 {
        return 0.0;
    }
    let smoothed = contour::circular_moving_average(radii, SMOOTHING_WINDOW);
    let residual: Vec<f64> = radii.iter().zip(&smoothed).map(|(r, s)| r - s).collect();
    let (_, residual_std) = contour::mean_and_std(&residual);
    residual_std / mean
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevisionScore {
    pub irregular: bool,
    pub undulating: bool,
    pub confidence: f64,
}

/// Scores a loop that already passed the revision size band, so the size term is
/// always earned.
pub fn score(metrics: &ContourMetrics, undulation: f64) -> RevisionScore {
    let f = &metrics.features;
    let irregular = (SOLIDITY_RANGE.0..=SOLIDITY_RANGE.1).contains(&f.solidity)
        && (CIRCULARITY_RANGE.0..=CIRCULARITY_RANGE.1).contains(&f.circularity);
    let undulating = (UNDULATION_MIN..=UNDULATION_MAX).contains(&undulation);

    let mut confidence = SIZE_WEIGHT;
    if irregular {
        confidence += IRREGULAR_WEIGHT;
    }
    if undulating {
        confidence += UNDULATION_WEIGHT;
    }
    RevisionScore {
        irregular,
        undulating,
        confidence,
    }
}
