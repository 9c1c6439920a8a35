// THEORY:
// The cloud detector is the general-purpose half of the engine. Three method-pure
// detectors look for regions a reviewer may have marked without assuming any CAD
// convention:
//
//   color   - the page's marker colors and near-white translucent fills
//   shape   - closed, cloud-like outlines in the edge map
//   texture - regions whose local texture differs from the surrounding drawing
//
// Every contour they trace is scored by one shared routine, `analyze_contour`, so the
// three methods speak the same confidence language and differ only by a per-method
// bonus. The detector then runs the pattern recognizer alongside its own three
// methods, pools all candidates, fuses overlapping ones through `merge` and drops what
// falls below the sensitivity-scaled floor. The result is ranked strongest first.

pub mod color;
pub mod shape;
pub mod texture;

use crate::core_modules::analysis::AnalysisContext;
use crate::core_modules::cad_profile::{CadProfile, CadSystem};
use crate::core_modules::candidate::{DetectionMethod, RawCandidate};
use crate::core_modules::contour::Contour;
use crate::core_modules::fanout::{self, DetectorJob};
use crate::core_modules::merge::{self, FusedCandidate};
use crate::core_modules::pattern::PatternRecognizer;
use tracing::debug;

pub const BASE_CONFIDENCE: f64 = 0.5;
pub const OPTIMAL_AREA_BONUS: f64 = 0.3;
pub const ACCEPTABLE_AREA_BONUS: f64 = 0.2;
pub const OTHER_AREA_BONUS: f64 = 0.1;
/// Optimal band is `[OPTIMAL_MIN_FACTOR·min, max / OPTIMAL_MAX_DIVISOR]`.
pub const OPTIMAL_MIN_FACTOR: f64 = 5.0;
pub const OPTIMAL_MAX_DIVISOR: f64 = 10.0;
/// Acceptable band is `[ACCEPTABLE_MIN_FACTOR·min, max / ACCEPTABLE_MAX_DIVISOR]`.
pub const ACCEPTABLE_MIN_FACTOR: f64 = 2.0;
pub const ACCEPTABLE_MAX_DIVISOR: f64 = 2.0;
pub const CIRCULARITY_BONUS_RANGE: (f64, f64) = (0.1, 0.6);
pub const CIRCULARITY_BONUS: f64 = 0.15;
pub const SOLIDITY_BONUS_RANGE: (f64, f64) = (0.3, 0.8);
pub const SOLIDITY_BONUS: f64 = 0.1;
pub const ASPECT_BONUS_RANGE: (f64, f64) = (0.3, 3.0);
pub const ASPECT_BONUS: f64 = 0.1;
pub const SENSITIVITY_WEIGHT: f64 = 0.2;
/// Candidates scoring below this are discarded.
pub const MIN_CANDIDATE_CONFIDENCE: f64 = 0.3;
/// Candidates covering at least this fraction of the image are page furniture.
pub const MAX_IMAGE_FRACTION: f64 = 0.9;
pub const VALID_ASPECT: (f64, f64) = (0.1, 10.0);
/// Fused results must reach `FINAL_FLOOR_FACTOR · sensitivity`.
pub const FINAL_FLOOR_FACTOR: f64 = 0.3;

/// Turns a traced contour into a scored candidate, or rejects it.
pub fn analyze_contour(
    method: DetectionMethod,
    contour: Contour,
    ctx: &AnalysisContext<'_>,
) -> Option<RawCandidate> {
    let metrics = contour.metrics()?;
    let band = ctx.profile.cloud_area;
    let area = metrics.area;
    let aspect = metrics.features.aspect_ratio;
    if !band.contains(area)
        || area >= MAX_IMAGE_FRACTION * ctx.image_area()
        || !(VALID_ASPECT.0..=VALID_ASPECT.1).contains(&aspect)
    {
        return None;
    }

    let mut confidence = BASE_CONFIDENCE;
    confidence += if area >= OPTIMAL_MIN_FACTOR * band.min && area <= band.max / OPTIMAL_MAX_DIVISOR {
        OPTIMAL_AREA_BONUS
    } else if area >= ACCEPTABLE_MIN_FACTOR * band.min && area <= band.max / ACCEPTABLE_MAX_DIVISOR {
        ACCEPTABLE_AREA_BONUS
    } else {
        OTHER_AREA_BONUS
    };

    let f = &metrics.features;
    if (CIRCULARITY_BONUS_RANGE.0..=CIRCULARITY_BONUS_RANGE.1).contains(&f.circularity) {
        confidence += CIRCULARITY_BONUS;
    }
    if (SOLIDITY_BONUS_RANGE.0..=SOLIDITY_BONUS_RANGE.1).contains(&f.solidity) {
        confidence += SOLIDITY_BONUS;
    }
    if (ASPECT_BONUS_RANGE.0..=ASPECT_BONUS_RANGE.1).contains(&aspect) {
        confidence += ASPECT_BONUS;
    }
    confidence += method.confidence_bonus();
    confidence += ctx.bias() * SENSITIVITY_WEIGHT;
    let confidence = confidence.clamp(0.0, 1.0);

    if confidence < MIN_CANDIDATE_CONFIDENCE {
        return None;
    }
    Some(RawCandidate::from_metrics(method, contour, &metrics, confidence))
}

/// Scores every contour and keeps the survivors.
pub fn analyze_all(
    method: DetectionMethod,
    contours: Vec<Contour>,
    ctx: &AnalysisContext<'_>,
) -> Vec<RawCandidate> {
    contours
        .into_iter()
        .filter_map(|c| analyze_contour(method, c, ctx))
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct CloudDetector {
    recognizer: PatternRecognizer,
}

impl CloudDetector {
    pub fn new(system: CadSystem) -> Self {
        Self {
            recognizer: PatternRecognizer::new(system),
        }
    }

    pub fn profile(&self) -> &'static CadProfile {
        self.recognizer.profile()
    }

    /// Runs the pattern recognizer and the three classical methods side by side and
    /// returns the pooled, unfused candidates in a fixed method order.
    pub fn candidates(&self, ctx: &AnalysisContext<'_>) -> Vec<RawCandidate> {
        let recognizer = self.recognizer;
        let jobs: Vec<DetectorJob<'_, RawCandidate>> = vec![
            fanout::job("pattern", move || {
                Ok(recognizer
                    .detect_in(ctx)
                    .into_iter()
                    .map(|p| p.into_candidate())
                    .collect())
            }),
            fanout::job("color", || color::detect(ctx)),
            fanout::job("shape", || shape::detect(ctx)),
            fanout::job("texture", || texture::detect(ctx)),
        ];
        fanout::run_isolated(jobs).into_iter().flatten().collect()
    }

    /// Full detection for one page: pool, fuse, floor, rank.
    pub fn detect(&self, ctx: &AnalysisContext<'_>) -> Vec<FusedCandidate> {
        let pooled = self.candidates(ctx);
        let pooled_count = pooled.len();
        let floor = FINAL_FLOOR_FACTOR * ctx.sensitivity;
        let mut fused: Vec<FusedCandidate> = merge::merge_candidates(pooled)
            .into_iter()
            .filter(|c| c.confidence >= floor)
            .collect();
        fused.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        debug!(
            cad_system = self.profile().system.as_str(),
            pooled = pooled_count,
            fused = fused.len(),
            "cloud detection finished"
        );
        fused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::Point;
    use image::RgbImage;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Contour {
        Contour::new(vec![
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
        ])
    }

    fn with_ctx<R>(sensitivity: f64, f: impl FnOnce(&AnalysisContext<'_>) -> R) -> R {
        let image = RgbImage::new(1000, 1000);
        let ctx = AnalysisContext::new(&image, CadProfile::for_system(CadSystem::Generic), sensitivity).unwrap();
        f(&ctx)
    }

    #[test]
    fn optimal_rectangle_scores_high() {
        // 100x60: area 6000 sits in the optimal band [2500, 50000].
        let candidate = with_ctx(0.5, |ctx| analyze_contour(DetectionMethod::Color, rect(10.0, 10.0, 100.0, 60.0), ctx));
        let candidate = candidate.unwrap();
        // 0.5 + 0.3 + aspect 0.1 + color 0.2, clipped.
        assert_eq!(candidate.confidence, 1.0);
        assert_eq!(candidate.method, DetectionMethod::Color);
    }

    #[test]
    fn texture_rectangle_in_acceptable_band() {
        // 50x40: area 2000 is acceptable, circularity ≈ 0.78, solidity 1.
        let candidate = with_ctx(0.5, |ctx| analyze_contour(DetectionMethod::Texture, rect(0.0, 0.0, 50.0, 40.0), ctx));
        let expected = 0.5 + 0.2 + 0.1 + 0.1;
        assert!((candidate.unwrap().confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn out_of_band_contours_are_rejected() {
        with_ctx(0.7, |ctx| {
            assert!(analyze_contour(DetectionMethod::Shape, rect(0.0, 0.0, 10.0, 10.0), ctx).is_none());
            assert!(analyze_contour(DetectionMethod::Shape, rect(0.0, 0.0, 990.0, 990.0), ctx).is_none());
            assert!(analyze_contour(DetectionMethod::Shape, rect(0.0, 0.0, 600.0, 20.0), ctx).is_none());
        });
    }

    #[test]
    fn blank_page_yields_nothing() {
        let image = RgbImage::from_pixel(160, 160, image::Rgb([128, 128, 128]));
        let ctx = AnalysisContext::new(&image, CadProfile::for_system(CadSystem::Generic), 0.7).unwrap();
        assert!(CloudDetector::new(CadSystem::Generic).detect(&ctx).is_empty());
    }
}
