// THEORY:
// A document is a list of independent pages, so the document pipeline is a fan-out:
// every page becomes a blocking task on tokio's blocking pool, a semaphore caps how
// many run at once, and a per-page timeout abandons a page that takes too long.
// A page that never rasterized, timed out or whose task died turns into a warning.
// It is never an error for the whole document.
//
// Results are gathered in submission order and then ordered by page number, so the
// report is stable no matter which page finished first.

use crate::error::{CloudError, Result};
use crate::pipeline::{CloudArea, CloudPipeline, DetectorConfig, PageInput, PageResult, mean_confidence};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use image::RgbImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// A rasterized page, owned so it can move onto a worker thread.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page_number: u32,
    pub image: RgbImage,
    pub page_width: f64,
    pub page_height: f64,
}

/// What the rasterizer produced for one page.
#[derive(Debug, Clone)]
pub enum PageSource {
    Image(PageImage),
    Failed { page_number: u32, reason: String },
}

impl PageSource {
    pub fn page_number(&self) -> u32 {
        match self {
            PageSource::Image(page) => page.page_number,
            PageSource::Failed { page_number, .. } => *page_number,
        }
    }
}

/// Whole-document output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentReport {
    /// Ordered by page, then by rank within the page.
    pub clouds: Vec<CloudArea>,
    pub total_clouds_detected: usize,
    /// Mean confidence over every cloud; 0 when none were found.
    pub overall_confidence: f64,
    pub warnings: Vec<String>,
}

impl DocumentReport {
    /// Assembles a report from per-page outcomes in any order.
    pub fn from_outcomes(mut outcomes: Vec<(u32, std::result::Result<PageResult, String>)>) -> Self {
        outcomes.sort_by_key(|(page_number, _)| *page_number);
        let mut clouds = Vec::new();
        let mut warnings = Vec::new();
        for (_, outcome) in outcomes {
            match outcome {
                Ok(page) => {
                    clouds.extend(page.clouds);
                    warnings.extend(page.warnings);
                }
                Err(warning) => warnings.push(warning),
            }
        }
        Self {
            total_clouds_detected: clouds.len(),
            overall_confidence: mean_confidence(&clouds),
            clouds,
            warnings,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct ParallelPipeline {
    pipeline: Arc<CloudPipeline>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl ParallelPipeline {
    pub fn new(config: DetectorConfig) -> Self {
        let pipeline = CloudPipeline::new(config);
        let permits = Arc::new(Semaphore::new(pipeline.config().max_parallel_pages));
        let timeout = Duration::from_secs(pipeline.config().page_timeout_secs);
        Self {
            pipeline: Arc::new(pipeline),
            permits,
            timeout,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        self.pipeline.config()
    }

    /// Analyzes every page, stamping records with `detected_at`.
    pub async fn process_document(&self, pages: Vec<PageSource>, detected_at: DateTime<Utc>) -> DocumentReport {
        let page_count = pages.len();
        let outcomes = join_all(pages.into_iter().map(|source| async move {
            let page_number = source.page_number();
            let outcome = match source {
                PageSource::Failed { page_number, reason } => {
                    warn!(page = page_number, %reason, "page failed rasterization");
                    Err(format!("page {page_number} failed rasterization: {reason}"))
                }
                PageSource::Image(page) => self.run_page(page, detected_at).await.map_err(|err| {
                    warn!(page = page_number, error = %err, "page abandoned");
                    err.to_string()
                }),
            };
            (page_number, outcome)
        }))
        .await;

        let report = DocumentReport::from_outcomes(outcomes);
        info!(
            pages = page_count,
            clouds = report.total_clouds_detected,
            overall_confidence = report.overall_confidence,
            warnings = report.warnings.len(),
            "document analyzed"
        );
        report
    }

    async fn run_page(&self, page: PageImage, detected_at: DateTime<Utc>) -> Result<PageResult> {
        let page_number = page.page_number;
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|err| CloudError::PageTask {
                page_number,
                reason: err.to_string(),
            })?;
        let pipeline = Arc::clone(&self.pipeline);

        // The permit travels with the work, so an abandoned page keeps its slot until
        // its thread actually finishes.
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let input = PageInput {
                page_number,
                image: &page.image,
                page_width: page.page_width,
                page_height: page.page_height,
                detected_at,
            };
            pipeline.process_page(&input)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(join_err)) => Err(CloudError::PageTask {
                page_number,
                reason: join_err.to_string(),
            }),
            Err(_) => Err(CloudError::PageTimeout {
                page_number,
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}
