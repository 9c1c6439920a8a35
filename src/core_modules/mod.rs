// Leaf-first: pixel and geometry primitives, then raster and contour measurement, then
// the detectors built on them, then fusion and the exported record.

pub mod pixel;
pub mod geometry;
pub mod raster;
pub mod contour;
pub mod cad_profile;
pub mod candidate;
pub mod analysis;
pub mod fanout;
pub mod pattern;
pub mod cloud_detector;
pub mod merge;
pub mod cloud_area;
