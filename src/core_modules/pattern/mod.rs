// THEORY:
// The pattern recognizer looks for the marks CAD tools and reviewers actually draw,
// rather than for generic "interesting regions". It runs five specialists over the same
// prepared page, each tuned by the active `CadProfile`:
//
//   bubble    - chains of small circles
//   revision  - scalloped closed loops
//   highlight - translucent color overlays
//   polygon   - straight-edged closed polylines
//   freehand  - wandering hand-drawn loops
//
// The specialists are independent and read-only, so they run side by side through
// `fanout`; a specialist that fails contributes nothing. Their outputs are pooled, the
// strongest pattern of every overlapping cluster survives non-max suppression, and a
// sensitivity-dependent confidence floor is applied last.

pub mod bubble;
pub mod freehand;
pub mod highlight;
pub mod nms;
pub mod polygon;
pub mod revision;

use crate::core_modules::analysis::AnalysisContext;
use crate::core_modules::cad_profile::{CadProfile, CadSystem};
use crate::core_modules::candidate::DetectedPattern;
use crate::core_modules::fanout::{self, DetectorJob};
use crate::error::Result;
use image::RgbImage;
use tracing::debug;

/// Floor at sensitivity 0.
pub const CONFIDENCE_FLOOR_BASE: f64 = 0.3;
/// Added to the floor per unit of sensitivity.
pub const CONFIDENCE_FLOOR_SLOPE: f64 = 0.4;

pub fn confidence_floor(sensitivity: f64) -> f64 {
    CONFIDENCE_FLOOR_BASE + CONFIDENCE_FLOOR_SLOPE * sensitivity
}

#[derive(Debug, Clone, Copy)]
pub struct PatternRecognizer {
    profile: &'static CadProfile,
}

impl PatternRecognizer {
    pub fn new(system: CadSystem) -> Self {
        Self {
            profile: CadProfile::for_system(system),
        }
    }

    /// Resolves `key` the way callers pass it; unknown keys use the generic profile.
    pub fn for_key(key: &str) -> Self {
        Self {
            profile: CadProfile::for_key(key),
        }
    }

    pub fn profile(&self) -> &'static CadProfile {
        self.profile
    }

    /// Runs every specialist over `image`.
    pub fn detect(&self, image: &RgbImage, sensitivity: f64) -> Result<Vec<DetectedPattern>> {
        let ctx = AnalysisContext::new(image, self.profile, sensitivity)?;
        Ok(self.detect_in(&ctx))
    }

    /// Runs every specialist over an already prepared page.
    pub fn detect_in(&self, ctx: &AnalysisContext<'_>) -> Vec<DetectedPattern> {
        let jobs: Vec<DetectorJob<'_, DetectedPattern>> = vec![
            fanout::job("bubble", || bubble::detect(ctx)),
            fanout::job("revision", || revision::detect(ctx)),
            fanout::job("highlight", || highlight::detect(ctx)),
            fanout::job("polygon", || polygon::detect(ctx)),
            fanout::job("freehand", || freehand::detect(ctx)),
        ];
        let pooled: Vec<DetectedPattern> = fanout::run_isolated(jobs).into_iter().flatten().collect();
        let pooled_count = pooled.len();

        let floor = confidence_floor(ctx.sensitivity);
        let kept: Vec<DetectedPattern> = nms::suppress(pooled)
            .into_iter()
            .filter(|p| p.confidence >= floor)
            .collect();
        debug!(
            cad_system = self.profile.system.as_str(),
            pooled = pooled_count,
            kept = kept.len(),
            floor,
            "pattern recognition finished"
        );
        kept
    }
}
