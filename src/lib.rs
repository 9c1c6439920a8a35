// THEORY:
// This file is the entry point for the `cloud_vision` library crate. It exposes the
// single-page `CloudPipeline`, the document-level `ParallelPipeline` and the data they
// exchange (`DetectorConfig`, `PageInput`, `PageResult`, `CloudArea`, `DocumentReport`)
// as the high-level interface. The building blocks in `core_modules` stay public for
// callers that want one detector on its own, such as the `PatternRecognizer`.
//
// The library never installs a logging subscriber; it only emits `tracing` events.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use core_modules::cad_profile::{CadProfile, CadSystem};
pub use core_modules::geometry::{BoundingBox, Point};
pub use core_modules::pattern::PatternRecognizer;
pub use error::{CloudError, Result};
pub use parallel_pipeline::{DocumentReport, PageImage, PageSource, ParallelPipeline};
pub use pipeline::{CloudArea, CloudPipeline, DetectorConfig, PageInput, PageResult, PageStats, ShapeType};
