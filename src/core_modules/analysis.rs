//! The read-only views of one page that every detector works from.

use crate::core_modules::cad_profile::CadProfile;
use crate::core_modules::raster::{self, HsvImage};
use crate::error::{CloudError, Result};
use image::{GrayImage, RgbImage};

/// A page prepared for analysis: the source image plus the gray and HSV planes
/// derived from it, the active CAD profile and the clamped sensitivity.
pub struct AnalysisContext<'a> {
    pub rgb: &'a RgbImage,
    pub gray: GrayImage,
    pub hsv: HsvImage,
    pub profile: &'static CadProfile,
    pub sensitivity: f64,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(rgb: &'a RgbImage, profile: &'static CadProfile, sensitivity: f64) -> Result<Self> {
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(CloudError::EmptyImage);
        }
        Ok(Self {
            rgb,
            gray: raster::to_gray(rgb),
            hsv: HsvImage::from_rgb(rgb),
            profile,
            sensitivity: sensitivity.clamp(0.0, 1.0),
        })
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn image_area(&self) -> f64 {
        self.width() as f64 * self.height() as f64
    }

    /// `sensitivity - 0.5`, the signed offset most thresholds are nudged by.
    pub fn bias(&self) -> f64 {
        self.sensitivity - 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::cad_profile::CadSystem;

    #[test]
    fn empty_images_are_rejected() {
        let image = RgbImage::new(0, 10);
        let profile = CadProfile::for_system(CadSystem::Generic);
        assert!(matches!(
            AnalysisContext::new(&image, profile, 0.7),
            Err(CloudError::EmptyImage)
        ));
    }

    #[test]
    fn sensitivity_is_clamped() {
        let image = RgbImage::new(4, 4);
        let profile = CadProfile::for_system(CadSystem::Generic);
        let ctx = AnalysisContext::new(&image, profile, 3.0).unwrap();
        assert_eq!(ctx.sensitivity, 1.0);
        assert!((ctx.bias() - 0.5).abs() < 1e-12);
    }
}
