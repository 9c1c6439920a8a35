//! Straight-edged clouds drawn as closed polylines.

use crate::core_modules::analysis::AnalysisContext;
use crate::core_modules::candidate::{DetectedPattern, PatternAttributes, PatternType};
use crate::core_modules::contour::{Contour, ContourMetrics, polygon_area};
use crate::core_modules::geometry::Point;
use crate::core_modules::raster;
use crate::error::Result;

/// How far the Canny thresholds move per unit of sensitivity bias.
pub const LOW_THRESHOLD_SWING: f64 = 40.0;
pub const HIGH_THRESHOLD_SWING: f64 = 80.0;
pub const MIN_VERTICES: usize = 3;
pub const MAX_VERTICES: usize = 12;
/// Vertex count the preference score peaks at.
pub const PREFERRED_VERTICES: f64 = 6.0;
pub const CONVEXITY_WEIGHT: f64 = 0.3;
pub const STRAIGHT_EDGE_WEIGHT: f64 = 0.4;
pub const SIZE_WEIGHT: f64 = 0.2;
pub const VERTEX_WEIGHT: f64 = 0.1;
/// Strictly above this to be reported.
pub const ACCEPT_CONFIDENCE: f64 = 0.3;
const DILATE_RADIUS: u8 = 1;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<Vec<DetectedPattern>> {
    let (low, high) = thresholds(ctx.profile.canny_low, ctx.profile.canny_high, ctx.bias());
    let edges = raster::dilate(&raster::canny(&ctx.gray, low, high), DILATE_RADIUS);

    let mut found = Vec::new();
    for outline in raster::external_contours(&edges) {
        let Some(metrics) = outline.metrics() else {
            continue;
        };
        if !ctx.profile.cloud_area.contains(metrics.area) {
            continue;
        }
        let approx = outline.approx_polygon(ctx.profile.contour_epsilon * metrics.features.perimeter);
        let vertex_count = approx.len();
        if !(MIN_VERTICES..=MAX_VERTICES).contains(&vertex_count) {
            continue;
        }
        let tolerance = ctx.profile.line_thickness as f64 + 1.0;
        let scores = PolygonScores::measure(&outline, &approx, &metrics, tolerance, ctx);
        if scores.confidence > ACCEPT_CONFIDENCE {
            found.push(DetectedPattern::from_metrics(
                PatternType::PolygonCloud,
                outline,
                &metrics,
                scores.confidence,
                PatternAttributes::Polygon {
                    vertex_count,
                    convexity: scores.convexity,
                    straight_edge_score: scores.straight_edge,
                },
            ));
        }
    }
    Ok(found)
}

/// Sensitivity-adjusted Canny thresholds. Higher sensitivity lowers both.
pub fn thresholds(base_low: f32, base_high: f32, bias: f64) -> (f32, f32) {
    let low = (base_low as f64 - bias * LOW_THRESHOLD_SWING).max(1.0);
    let high = (base_high as f64 - bias * HIGH_THRESHOLD_SWING).max(low + 1.0);
    (low as f32, high as f32)
}

pub fn vertex_preference(vertex_count: usize) -> f64 {
    (1.0 - (vertex_count as f64 - PREFERRED_VERTICES).abs() / PREFERRED_VERTICES).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PolygonScores {
    convexity: f64,
    straight_edge: f64,
    confidence: f64,
}

impl PolygonScores {
    fn measure(
        outline: &Contour,
        approx: &[Point],
        metrics: &ContourMetrics,
        tolerance: f64,
        ctx: &AnalysisContext<'_>,
    ) -> Self {
        let approx_hull = Contour::new(approx.to_vec()).hull_area();
        let convexity = if approx_hull > 0.0 {
            (polygon_area(approx) / approx_hull).min(1.0)
        } else {
            0.0
        };
        let straight_edge = outline.fraction_near_polygon(approx, tolerance);
        let size = if ctx.profile.revision_area.contains(metrics.area) { 1.0 } else { 0.5 };
        let vertex = vertex_preference(approx.len());
        let confidence = (CONVEXITY_WEIGHT * convexity
            + STRAIGHT_EDGE_WEIGHT * straight_edge
            + SIZE_WEIGHT * size
            + VERTEX_WEIGHT * vertex)
            * ctx.sensitivity;
        Self {
            convexity,
            straight_edge,
            confidence,
        }
    }
}
