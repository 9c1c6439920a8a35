// THEORY:
// The `pipeline` module is the top-level API for a single page. It hides the whole
// detection stack behind one call: hand it a rasterized page and the page's physical
// size, get back the page's clouds in page coordinates plus any warnings.
//
// Input problems never abort the call. An empty image or a zero-area page produces an
// empty result carrying a warning, and a failing detector simply contributes nothing.
// Given the same image, configuration and detection timestamp, the output is identical
// from run to run.

use crate::core_modules::analysis::AnalysisContext;
use crate::core_modules::cad_profile::{CadProfile, CadSystem};
use crate::core_modules::cloud_detector::CloudDetector;
use crate::core_modules::merge::CoordinateMapper;
use crate::error::Result;
use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, info_span, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::cloud_area::{CloudArea, ShapeType};

pub const DEFAULT_SENSITIVITY: f64 = 0.7;
pub const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 120;

/// Configuration for the detection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Which CAD convention to tune for. Unknown names resolve to `generic`.
    #[serde(deserialize_with = "cad_system_from_key")]
    pub cad_system: CadSystem,
    /// 0 favors precision, 1 favors recall.
    pub sensitivity: f64,
    /// A page still running after this long is abandoned with a warning.
    pub page_timeout_secs: u64,
    /// Upper bound on pages analyzed at once.
    pub max_parallel_pages: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            cad_system: CadSystem::Generic,
            sensitivity: DEFAULT_SENSITIVITY,
            page_timeout_secs: DEFAULT_PAGE_TIMEOUT_SECS,
            max_parallel_pages: num_cpus::get(),
        }
    }
}

fn cad_system_from_key<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<CadSystem, D::Error> {
    let key = String::deserialize(deserializer)?;
    Ok(CadSystem::from_key(&key))
}

impl DetectorConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DetectorConfig = serde_json::from_str(json)?;
        Ok(config.validated())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Brings every field into its legal range.
    pub fn validated(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.sensitivity) {
            let clamped = if self.sensitivity.is_nan() {
                DEFAULT_SENSITIVITY
            } else {
                self.sensitivity.clamp(0.0, 1.0)
            };
            warn!(requested = self.sensitivity, used = clamped, "sensitivity out of range");
            self.sensitivity = clamped;
        }
        if self.max_parallel_pages == 0 {
            warn!("max_parallel_pages of 0 raised to 1");
            self.max_parallel_pages = 1;
        }
        self
    }
}

/// One rasterized page and the physical size it was rendered from.
#[derive(Debug, Clone, Copy)]
pub struct PageInput<'a> {
    pub page_number: u32,
    pub image: &'a RgbImage,
    /// Page width and height in the page's native units (PDF points, typically).
    pub page_width: f64,
    pub page_height: f64,
    /// Stamped on every record; fix it to make the output reproducible.
    pub detected_at: DateTime<Utc>,
}

impl<'a> PageInput<'a> {
    pub fn new(page_number: u32, image: &'a RgbImage, page_width: f64, page_height: f64) -> Self {
        Self {
            page_number,
            image,
            page_width,
            page_height,
            detected_at: Utc::now(),
        }
    }

    pub fn with_detected_at(mut self, detected_at: DateTime<Utc>) -> Self {
        self.detected_at = detected_at;
        self
    }
}

/// Summary numbers for one page.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PageStats {
    pub count: usize,
    pub mean_confidence: f64,
    /// Clouds per `detection_method`.
    pub by_method: BTreeMap<String, usize>,
}

impl PageStats {
    pub fn from_clouds(clouds: &[CloudArea]) -> Self {
        let mut by_method = BTreeMap::new();
        for cloud in clouds {
            *by_method.entry(cloud.detection_method.clone()).or_insert(0) += 1;
        }
        Self {
            count: clouds.len(),
            mean_confidence: mean_confidence(clouds),
            by_method,
        }
    }
}

/// Arithmetic mean of the records' confidences; 0 for none.
pub fn mean_confidence(clouds: &[CloudArea]) -> f64 {
    if clouds.is_empty() {
        return 0.0;
    }
    clouds.iter().map(|c| c.confidence).sum::<f64>() / clouds.len() as f64
}

/// The primary output of the pipeline for a single page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub page_number: u32,
    /// Strongest first.
    pub clouds: Vec<CloudArea>,
    pub warnings: Vec<String>,
    pub stats: PageStats,
}

impl PageResult {
    fn empty(page_number: u32, warning: String) -> Self {
        Self {
            page_number,
            clouds: Vec::new(),
            warnings: vec![warning],
            stats: PageStats::default(),
        }
    }
}

/// The main, top-level struct for the detection engine.
#[derive(Debug, Clone)]
pub struct CloudPipeline {
    config: DetectorConfig,
    detector: CloudDetector,
}

impl CloudPipeline {
    pub fn new(config: DetectorConfig) -> Self {
        let config = config.validated();
        Self {
            detector: CloudDetector::new(config.cad_system),
            config,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn profile(&self) -> &'static CadProfile {
        self.detector.profile()
    }

    pub fn process_page(&self, input: &PageInput<'_>) -> PageResult {
        let page_number = input.page_number;
        let _span = info_span!("page", page = page_number).entered();

        // Stage 0: Input validation
        let mapper = match CoordinateMapper::new(
            input.page_width,
            input.page_height,
            input.image.width(),
            input.image.height(),
        ) {
            Ok(mapper) => mapper,
            Err(err) => {
                warn!(error = %err, "skipping page");
                return PageResult::empty(page_number, format!("page {page_number}: {err}"));
            }
        };
        let ctx = match AnalysisContext::new(input.image, self.profile(), self.config.sensitivity) {
            Ok(ctx) => ctx,
            Err(err) => {
                warn!(error = %err, "skipping page");
                return PageResult::empty(page_number, format!("page {page_number}: {err}"));
            }
        };

        // Stage 1: Detection and fusion
        let fused = self.detector.detect(&ctx);

        // Stage 2: Export into page coordinates
        let mut warnings = Vec::new();
        let mut clouds = Vec::with_capacity(fused.len());
        for (rank, candidate) in fused.iter().enumerate() {
            match CloudArea::from_fused(page_number, rank, candidate, &mapper, input.detected_at) {
                Ok(cloud) => clouds.push(cloud),
                Err(err) => {
                    warn!(rank, error = %err, "dropping cloud that failed to export");
                    warnings.push(format!("page {page_number}: cloud {rank} could not be exported: {err}"));
                }
            }
        }

        let stats = PageStats::from_clouds(&clouds);
        info!(
            clouds = stats.count,
            mean_confidence = stats.mean_confidence,
            "page analyzed"
        );
        PageResult {
            page_number,
            clouds,
            warnings,
            stats,
        }
    }
}

impl Default for CloudPipeline {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
