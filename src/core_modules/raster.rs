// THEORY:
// The `raster` module is the bridge between the raw page image and the contour-based
// analysis. Every detector follows the same shape: derive a single-channel view of the
// page (gray, HSV mask, edge map), clean the binary mask with morphology, then trace the
// outer borders. Those neighbor-aware steps live here so the detectors read as a
// sequence of named stages.
//
// All functions take the source by reference and return a fresh buffer; the shared
// page image is never mutated.

use crate::core_modules::contour::Contour;
use crate::core_modules::pixel::{Hsv, HsvRange, Pixel};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::morphology;

pub const MASK_ON: u8 = 255;

/// A page converted to 8-bit HSV, row-major.
#[derive(Debug, Clone)]
pub struct HsvImage {
    pub width: u32,
    pub height: u32,
    pixels: Vec<Hsv>,
}

impl HsvImage {
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let pixels = image.pixels().map(|p| Pixel::from(*p).to_hsv()).collect();
        Self { width, height, pixels }
    }

    pub fn get(&self, x: u32, y: u32) -> Hsv {
        self.pixels[(y * self.width + x) as usize]
    }

    /// Binary mask of pixels falling inside any of `ranges`.
    pub fn mask(&self, ranges: &[HsvRange]) -> GrayImage {
        let mut mask = GrayImage::new(self.width, self.height);
        for (out, hsv) in mask.pixels_mut().zip(self.pixels.iter()) {
            if ranges.iter().any(|r| r.contains(*hsv)) {
                out.0[0] = MASK_ON;
            }
        }
        mask
    }
}

pub fn to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (out, p) in gray.pixels_mut().zip(image.pixels()) {
        out.0[0] = Pixel::from(*p).gray();
    }
    gray
}

/// Pixel-wise maximum of two equally sized masks, written into `target`.
pub fn union_into(target: &mut GrayImage, other: &GrayImage) {
    for (t, o) in target.pixels_mut().zip(other.pixels()) {
        t.0[0] = t.0[0].max(o.0[0]);
    }
}

pub fn close(mask: &GrayImage, radius: u8) -> GrayImage {
    morphology::close(mask, Norm::LInf, radius)
}

pub fn open(mask: &GrayImage, radius: u8) -> GrayImage {
    morphology::open(mask, Norm::LInf, radius)
}

pub fn dilate(mask: &GrayImage, radius: u8) -> GrayImage {
    morphology::dilate(mask, Norm::LInf, radius)
}

pub fn canny(gray: &GrayImage, low: f32, high: f32) -> GrayImage {
    imageproc::edges::canny(gray, low, high.max(low + 1.0))
}

pub fn gaussian_blur(gray: &GrayImage, sigma: f32) -> GrayImage {
    imageproc::filter::gaussian_blur_f32(gray, sigma)
}

/// Edge-preserving smoothing over a square `window`.
pub fn bilateral(gray: &GrayImage, window: u32, sigma_color: f32, sigma_spatial: f32) -> GrayImage {
    imageproc::filter::bilateral_filter(gray, window, sigma_color, sigma_spatial)
}

pub fn box_mean(gray: &GrayImage, radius: u32) -> GrayImage {
    imageproc::filter::box_filter(gray, radius, radius)
}

/// Outer borders that are not nested inside another region.
pub fn external_contours(mask: &GrayImage) -> Vec<Contour> {
    find_contours::<u32>(mask)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter(|c| c.points.len() >= 3)
        .map(Contour::from)
        .collect()
}

/// Number of set pixels.
pub fn count_on(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] > 0).count()
}

/// Wraps a float buffer as an image so `imageproc` filters can run on it.
pub fn float_image(width: u32, height: u32, data: Vec<f32>) -> Option<ImageBuffer<Luma<f32>, Vec<f32>>> {
    ImageBuffer::from_raw(width, height, data)
}
