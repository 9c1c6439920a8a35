//! Regions whose local texture stands out from the rest of the drawing.
//!
//! Three per-pixel descriptors are blended into one response:
//!
//! * the local variance of the LBP-coded image over a square window,
//! * Gabor magnitudes over four orientations and two frequencies,
//! * the inverted local edge density (cloud interiors are mostly empty paper).
//!
//! Window statistics come from summed-area tables, so each output pixel costs a few
//! lookups regardless of the window size. The Gabor bank is applied to one stack-held
//! 7x7 neighborhood per pixel. Output rows are split into fixed tiles that rayon
//! fills in place; the source planes are only read.

use super::analyze_all;
use crate::core_modules::analysis::AnalysisContext;
use crate::core_modules::candidate::{DetectionMethod, RawCandidate};
use crate::core_modules::raster::{self, MASK_ON};
use crate::error::Result;
use image::GrayImage;
use rayon::prelude::*;
use std::f64::consts::PI;

pub const LBP_WINDOW: usize = 15;
pub const EDGE_WINDOW: usize = 15;
pub const GABOR_ORIENTATIONS: usize = 4;
/// Cycles per pixel.
pub const GABOR_FREQUENCIES: [f64; 2] = [0.1, 0.25];
pub const GABOR_SIGMA: f64 = 2.0;
pub const LBP_WEIGHT: f32 = 0.3;
pub const GABOR_WEIGHT: f32 = 0.1;
pub const EDGE_WEIGHT: f32 = 0.2;
pub const BASE_PERCENTILE: f64 = 85.0;
pub const PERCENTILE_SWING: f64 = 20.0;
/// Rows per work tile.
pub const TILE_ROWS: usize = 64;
/// Largest possible variance of 8-bit values, used to bring the LBP variance into [0, 1].
const MAX_BYTE_VARIANCE: f64 = 127.5 * 127.5;
const KERNEL_SIDE: usize = 7;
const KERNEL_RADIUS: i64 = (KERNEL_SIDE / 2) as i64;
const KERNEL_LEN: usize = KERNEL_SIDE * KERNEL_SIDE;
const FLAT_RESPONSE: f32 = 1e-6;
const OPEN_RADIUS: u8 = 1;
const CLOSE_RADIUS: u8 = 2;

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<Vec<RawCandidate>> {
    let edges = raster::canny(&ctx.gray, ctx.profile.canny_low, ctx.profile.canny_high);
    let response = combined_response(&ctx.gray, &edges);
    let Some(mask) = threshold_mask(&response, ctx.width(), ctx.height(), percentile(ctx.bias())) else {
        return Ok(Vec::new());
    };
    let cleaned = raster::close(&raster::open(&mask, OPEN_RADIUS), CLOSE_RADIUS);
    Ok(analyze_all(
        DetectionMethod::Texture,
        raster::external_contours(&cleaned),
        ctx,
    ))
}

pub fn percentile(bias: f64) -> f64 {
    (BASE_PERCENTILE + bias * PERCENTILE_SWING).clamp(0.0, 100.0)
}

/// Weighted blend of the three descriptors, row-major.
pub fn combined_response(gray: &GrayImage, edges: &GrayImage) -> Vec<f32> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let lbp = lbp_codes(gray);
    let lbp_table = SummedArea::new(&lbp, w, h);
    let edge_values: Vec<f64> = edges.as_raw().iter().map(|&e| if e > 0 { 1.0 } else { 0.0 }).collect();
    let edge_table = SummedArea::new(&edge_values, w, h);
    let bank = GaborBank::new();
    let src = gray.as_raw();

    tiled_map(w, h, |x, y| {
        let (_, lbp_var) = lbp_table.window_stats(x, y, LBP_WINDOW / 2);
        let (edge_density, _) = edge_table.window_stats(x, y, EDGE_WINDOW / 2);
        let lbp_term = (lbp_var / MAX_BYTE_VARIANCE).min(1.0) as f32;
        let edge_term = 1.0 - edge_density as f32;
        LBP_WEIGHT * lbp_term + GABOR_WEIGHT * bank.normalized_sum(src, w, h, x, y) + EDGE_WEIGHT * edge_term
    })
}

/// Pixels strictly above the `pct`-th percentile, or `None` if the response is flat.
pub fn threshold_mask(response: &[f32], width: u32, height: u32, pct: f64) -> Option<GrayImage> {
    if response.is_empty() || response.len() != width as usize * height as usize {
        return None;
    }
    let (min, max) = response
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max - min < FLAT_RESPONSE {
        return None;
    }

    let mut sorted = response.to_vec();
    let index = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    let (_, threshold, _) = sorted.select_nth_unstable_by(index, |a, b| a.total_cmp(b));
    let threshold = *threshold;

    let mut mask = GrayImage::new(width, height);
    for (out, &v) in mask.pixels_mut().zip(response) {
        if v > threshold {
            out.0[0] = MASK_ON;
        }
    }
    Some(mask)
}

/// 8-neighbor local binary pattern; borders compare against clamped neighbors.
pub fn lbp_codes(gray: &GrayImage) -> Vec<f64> {
    const OFFSETS: [(i64, i64); 8] = [(-1, -1), (0, -1), (1, -1), (1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0)];
    let (w, h) = (gray.width() as i64, gray.height() as i64);
    let src = gray.as_raw();
    let mut codes = Vec::with_capacity(src.len());
    for y in 0..h {
        for x in 0..w {
            let center = src[(y * w + x) as usize];
            let mut code = 0u8;
            for (bit, (dx, dy)) in OFFSETS.iter().enumerate() {
                let nx = (x + dx).clamp(0, w - 1);
                let ny = (y + dy).clamp(0, h - 1);
                if src[(ny * w + nx) as usize] >= center {
                    code |= 1 << bit;
                }
            }
            codes.push(code as f64);
        }
    }
    codes
}

/// Inclusive prefix sums of a plane and of its squares.
pub struct SummedArea {
    width: usize,
    height: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl SummedArea {
    pub fn new(values: &[f64], width: usize, height: usize) -> Self {
        let stride = width + 1;
        let mut sum = vec![0.0; stride * (height + 1)];
        let mut sum_sq = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..width {
                let v = values[y * width + x];
                row += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row;
                sum_sq[idx] = sum_sq[idx - stride] + row_sq;
            }
        }
        Self {
            width,
            height,
            sum,
            sum_sq,
        }
    }

    /// Mean and variance over the window of `radius` around `(x, y)`, clipped to the plane.
    pub fn window_stats(&self, x: usize, y: usize, radius: usize) -> (f64, f64) {
        let x0 = x.saturating_sub(radius);
        let y0 = y.saturating_sub(radius);
        let x1 = (x + radius + 1).min(self.width);
        let y1 = (y + radius + 1).min(self.height);
        let count = ((x1 - x0) * (y1 - y0)) as f64;
        let s = self.rect(&self.sum, x0, y0, x1, y1);
        let sq = self.rect(&self.sum_sq, x0, y0, x1, y1);
        let mean = s / count;
        (mean, (sq / count - mean * mean).max(0.0))
    }

    fn rect(&self, table: &[f64], x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        let stride = self.width + 1;
        table[y1 * stride + x1] - table[y0 * stride + x1] - table[y1 * stride + x0] + table[y0 * stride + x0]
    }
}

/// Zero-mean real Gabor kernels, each paired with the bound on its response to 8-bit input.
struct GaborBank {
    kernels: Vec<([f32; KERNEL_LEN], f32)>,
}

impl GaborBank {
    fn new() -> Self {
        let mut kernels = Vec::with_capacity(GABOR_ORIENTATIONS * GABOR_FREQUENCIES.len());
        for o in 0..GABOR_ORIENTATIONS {
            let theta = PI * o as f64 / GABOR_ORIENTATIONS as f64;
            for &freq in &GABOR_FREQUENCIES {
                kernels.push(gabor_kernel(theta, freq));
            }
        }
        Self { kernels }
    }

    /// Sum of every filter's magnitude at `(x, y)`, each scaled into [0, 1].
    fn normalized_sum(&self, src: &[u8], w: usize, h: usize, x: usize, y: usize) -> f32 {
        let mut window = [0.0f32; KERNEL_LEN];
        let (xi, yi) = (x as i64, y as i64);
        for ky in 0..KERNEL_SIDE as i64 {
            let sy = (yi + ky - KERNEL_RADIUS).clamp(0, h as i64 - 1) as usize;
            for kx in 0..KERNEL_SIDE as i64 {
                let sx = (xi + kx - KERNEL_RADIUS).clamp(0, w as i64 - 1) as usize;
                window[(ky as usize) * KERNEL_SIDE + kx as usize] = src[sy * w + sx] as f32;
            }
        }
        self.kernels
            .iter()
            .map(|(kernel, bound)| {
                let response: f32 = kernel.iter().zip(window.iter()).map(|(k, v)| k * v).sum();
                if *bound > 0.0 { response.abs() / bound } else { 0.0 }
            })
            .sum()
    }
}

fn gabor_kernel(theta: f64, frequency: f64) -> ([f32; KERNEL_LEN], f32) {
    let mut kernel = [0.0f64; KERNEL_LEN];
    let two_sigma_sq = 2.0 * GABOR_SIGMA * GABOR_SIGMA;
    for ky in 0..KERNEL_SIDE {
        for kx in 0..KERNEL_SIDE {
            let x = kx as f64 - KERNEL_RADIUS as f64;
            let y = ky as f64 - KERNEL_RADIUS as f64;
            let xr = x * theta.cos() + y * theta.sin();
            let yr = -x * theta.sin() + y * theta.cos();
            kernel[ky * KERNEL_SIDE + kx] =
                (-(xr * xr + yr * yr) / two_sigma_sq).exp() * (2.0 * PI * frequency * xr).cos();
        }
    }
    let mean = kernel.iter().sum::<f64>() / KERNEL_LEN as f64;
    let mut out = [0.0f32; KERNEL_LEN];
    for (o, k) in out.iter_mut().zip(kernel.iter()) {
        *o = (k - mean) as f32;
    }
    // A zero-mean kernel responds at most 255 · (sum of its positive taps).
    let bound = 255.0 * out.iter().filter(|k| **k > 0.0).sum::<f32>();
    (out, bound)
}

/// Fills a row-major plane by evaluating `f` at every pixel, one row tile per task.
fn tiled_map<F>(width: usize, height: usize, f: F) -> Vec<f32>
where
    F: Fn(usize, usize) -> f32 + Sync,
{
    let mut out = vec![0.0f32; width * height];
    if out.is_empty() {
        return out;
    }
    out.par_chunks_mut(TILE_ROWS * width)
        .enumerate()
        .for_each(|(tile, rows)| {
            let y0 = tile * TILE_ROWS;
            for (offset, value) in rows.iter_mut().enumerate() {
                *value = f(offset % width, y0 + offset / width);
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn uniform_page_has_a_flat_response() {
        let gray = GrayImage::from_pixel(80, 70, Luma([128]));
        let edges = GrayImage::new(80, 70);
        let response = combined_response(&gray, &edges);
        assert_eq!(response.len(), 80 * 70);
        assert!(response.iter().all(|v| *v == response[0]));
        assert!(threshold_mask(&response, 80, 70, 85.0).is_none());
    }

    #[test]
    fn summed_area_matches_direct_statistics() {
        let values: Vec<f64> = (0..30).map(|v| (v % 7) as f64).collect();
        let table = SummedArea::new(&values, 6, 5);
        let (mean, var) = table.window_stats(2, 2, 1);
        let window: Vec<f64> = (1..4).flat_map(|y| (1..4).map(move |x| (y, x))).map(|(y, x)| values[y * 6 + x]).collect();
        let direct_mean = window.iter().sum::<f64>() / 9.0;
        let direct_var = window.iter().map(|v| (v - direct_mean).powi(2)).sum::<f64>() / 9.0;
        assert!((mean - direct_mean).abs() < 1e-9);
        assert!((var - direct_var).abs() < 1e-9);
    }

    #[test]
    fn gabor_kernels_are_zero_mean() {
        let (kernel, bound) = gabor_kernel(PI / 4.0, 0.25);
        assert!(kernel.iter().sum::<f32>().abs() < 1e-4);
        assert!(bound > 0.0);
    }

    #[test]
    fn threshold_selects_the_top_tail() {
        let response: Vec<f32> = (0..100).map(|v| v as f32).collect();
        let mask = threshold_mask(&response, 10, 10, 85.0).unwrap();
        assert_eq!(raster::count_on(&mask), 15);
    }

    #[test]
    fn tiles_cover_every_row() {
        let plane = tiled_map(5, TILE_ROWS * 2 + 3, |x, y| (y * 5 + x) as f32);
        assert!(plane.iter().enumerate().all(|(i, v)| *v == i as f32));
    }

    #[test]
    fn percentile_moves_with_sensitivity() {
        assert_eq!(percentile(0.0), 85.0);
        assert_eq!(percentile(0.5), 95.0);
        assert_eq!(percentile(-0.5), 75.0);
    }
}
