//! Bubble clouds: chains of small circles drawn around a changed area.
//!
//! Circle centers are found by gradient voting: every strong-gradient pixel casts votes
//! along its gradient direction at each radius in the profile's bubble range, so the
//! boundary of a circle piles its votes up at the center. Accumulator peaks are then
//! verified against the edge map at the best-supported radius. Verified circles that
//! sit within the profile's spacing of each other are grown into groups.

use crate::core_modules::analysis::AnalysisContext;
use crate::core_modules::candidate::{DetectedPattern, PatternAttributes, PatternType};
use crate::core_modules::contour::Contour;
use crate::core_modules::geometry::Point;
use crate::core_modules::raster;
use crate::error::{CloudError, Result};
use image::GrayImage;
use std::f64::consts::PI;

/// Gradient magnitude threshold as a fraction of the strongest gradient.
pub const GRADIENT_THRESHOLD: f32 = 0.15;
/// Gaussian sigma applied to the vote accumulator.
pub const ACCUMULATOR_SIGMA: f32 = 1.5;
/// Minimum accumulator value for a peak, as a fraction of the maximum.
pub const MIN_VOTE_FRACTION: f32 = 0.25;
/// Peaks verified per page, strongest first.
pub const MAX_PEAKS: usize = 512;
/// Points sampled on a candidate circle during verification.
pub const SUPPORT_SAMPLES: usize = 64;
/// Fraction of samples that must land on an edge.
pub const MIN_SUPPORT: f64 = 0.6;
/// Smallest group that counts as a bubble cloud.
pub const MIN_GROUP_SIZE: usize = 2;
/// Group size at which confidence saturates.
pub const GROUP_SATURATION: f64 = 10.0;
/// Outline points per circle used to build the group hull.
const HULL_POINTS_PER_CIRCLE: usize = 16;

/// A verified circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
    pub support: f64,
}

pub fn detect(ctx: &AnalysisContext<'_>) -> Result<Vec<DetectedPattern>> {
    let edges = raster::canny(&ctx.gray, ctx.profile.canny_low, ctx.profile.canny_high);
    let circles = find_circles(&ctx.gray, &edges, ctx.profile.bubble_radius.min, ctx.profile.bubble_radius.max)?;
    Ok(group_circles(&circles, ctx.profile.bubble_spacing))
}

/// Detects circles with radius in `[r_min, r_max]`, strongest first.
pub fn find_circles(gray: &GrayImage, edges: &GrayImage, r_min: f64, r_max: f64) -> Result<Vec<Circle>> {
    let (w, h) = gray.dimensions();
    if w < 4 || h < 4 || r_max < r_min || r_min <= 0.0 {
        return Ok(Vec::new());
    }

    let gx = imageproc::gradients::horizontal_scharr(gray);
    let gy = imageproc::gradients::vertical_scharr(gray);
    let gx_raw = gx.as_raw();
    let gy_raw = gy.as_raw();

    let max_mag_sq = gx_raw
        .iter()
        .zip(gy_raw.iter())
        .map(|(&a, &b)| {
            let (a, b) = (a as f32, b as f32);
            a * a + b * b
        })
        .fold(0.0f32, f32::max);
    if max_mag_sq < 1e-6 {
        return Ok(Vec::new());
    }
    let threshold_sq = (GRADIENT_THRESHOLD * GRADIENT_THRESHOLD) * max_mag_sq;

    let stride = w as usize;
    let mut accum = vec![0.0f32; stride * h as usize];
    let radii: Vec<f32> = (r_min.ceil() as u32..=r_max.floor() as u32).map(|r| r as f32).collect();
    let x_limit = (w - 1) as f32;
    let y_limit = (h - 1) as f32;

    for y in 0..h as usize {
        for x in 0..stride {
            let idx = y * stride + x;
            let gxv = gx_raw[idx] as f32;
            let gyv = gy_raw[idx] as f32;
            let mag_sq = gxv * gxv + gyv * gyv;
            if mag_sq < threshold_sq {
                continue;
            }
            let inv_mag = 1.0 / mag_sq.sqrt();
            let (dx, dy) = (gxv * inv_mag, gyv * inv_mag);
            for &r in &radii {
                for sign in [1.0f32, -1.0] {
                    let vx = x as f32 + sign * dx * r;
                    let vy = y as f32 + sign * dy * r;
                    if vx >= 0.0 && vx < x_limit && vy >= 0.0 && vy < y_limit {
                        bilinear_add(&mut accum, stride, vx, vy, 1.0);
                    }
                }
            }
        }
    }

    let accum_img = raster::float_image(w, h, accum).ok_or(CloudError::BufferMismatch { width: w, height: h })?;
    let smoothed = imageproc::filter::gaussian_blur_f32(&accum_img, ACCUMULATOR_SIGMA);
    let data = smoothed.as_raw();
    let max_val = data.iter().cloned().fold(0.0f32, f32::max);
    if max_val < 1e-6 {
        return Ok(Vec::new());
    }

    let peaks = local_maxima(data, w, h, MIN_VOTE_FRACTION * max_val, r_min.max(2.0) as i32);

    let mut circles: Vec<Circle> = Vec::new();
    for (x, y, _) in peaks.into_iter().take(MAX_PEAKS) {
        let center = Point::new(x as f64, y as f64);
        let Some((radius, support)) = best_radius(edges, center, &radii) else {
            continue;
        };
        if support < MIN_SUPPORT {
            continue;
        }
        let duplicate = circles
            .iter()
            .any(|c| c.center.distance(&center) < c.radius.min(radius));
        if !duplicate {
            circles.push(Circle { center, radius, support });
        }
    }
    Ok(circles)
}

#[inline]
fn bilinear_add(accum: &mut [f32], stride: usize, x: f32, y: f32, weight: f32) {
    let x0 = x as usize;
    let y0 = y as usize;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let base = y0 * stride + x0;
    accum[base] += weight * (1.0 - fx) * (1.0 - fy);
    accum[base + 1] += weight * fx * (1.0 - fy);
    accum[base + stride] += weight * (1.0 - fx) * fy;
    accum[base + stride + 1] += weight * fx * fy;
}

/// Strict local maxima within a square window, sorted by value (ties by raster order).
fn local_maxima(data: &[f32], w: u32, h: u32, min_value: f32, radius: i32) -> Vec<(u32, u32, f32)> {
    let stride = w as i32;
    let mut peaks = Vec::new();
    for y in 0..h as i32 {
        for x in 0..stride {
            let idx = (y * stride + x) as usize;
            let val = data[idx];
            if val < min_value {
                continue;
            }
            let mut is_max = true;
            'window: for ny in (y - radius).max(0)..=(y + radius).min(h as i32 - 1) {
                for nx in (x - radius).max(0)..=(x + radius).min(stride - 1) {
                    let nidx = (ny * stride + nx) as usize;
                    if nidx == idx {
                        continue;
                    }
                    // Plateaus resolve to their first pixel in raster order.
                    if data[nidx] > val || (data[nidx] == val && nidx < idx) {
                        is_max = false;
                        break 'window;
                    }
                }
            }
            if is_max {
                peaks.push((x as u32, y as u32, val));
            }
        }
    }
    peaks.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    peaks
}

/// Radius with the highest edge support around `center`.
fn best_radius(edges: &GrayImage, center: Point, radii: &[f32]) -> Option<(f64, f64)> {
    let mut best: Option<(f64, f64)> = None;
    for &r in radii {
        let support = edge_support(edges, center, r as f64);
        if best.is_none_or(|(_, s)| support > s) {
            best = Some((r as f64, support));
        }
    }
    best
}

/// Fraction of circle samples with an edge pixel in their 3x3 neighborhood.
fn edge_support(edges: &GrayImage, center: Point, radius: f64) -> f64 {
    let (w, h) = edges.dimensions();
    let mut hits = 0usize;
    for i in 0..SUPPORT_SAMPLES {
        let t = 2.0 * PI * i as f64 / SUPPORT_SAMPLES as f64;
        let sx = (center.x + radius * t.cos()).round() as i64;
        let sy = (center.y + radius * t.sin()).round() as i64;
        let hit = (-1..=1).any(|dy| {
            (-1..=1).any(|dx| {
                let (px, py) = (sx + dx, sy + dy);
                px >= 0
                    && py >= 0
                    && px < w as i64
                    && py < h as i64
                    && edges.get_pixel(px as u32, py as u32).0[0] > 0
            })
        });
        if hit {
            hits += 1;
        }
    }
    hits as f64 / SUPPORT_SAMPLES as f64
}

/// Grows groups of circles whose centers chain together within `spacing`, then turns
/// every group of at least `MIN_GROUP_SIZE` into a bubble-cloud pattern.
pub fn group_circles(circles: &[Circle], spacing: f64) -> Vec<DetectedPattern> {
    let mut visited = vec![false; circles.len()];
    let mut patterns = Vec::new();

    for seed in 0..circles.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        let mut members = vec![seed];
        let mut queue = vec![seed];
        while let Some(current) = queue.pop() {
            for (other, circle) in circles.iter().enumerate() {
                if !visited[other] && circles[current].center.distance(&circle.center) <= spacing {
                    visited[other] = true;
                    members.push(other);
                    queue.push(other);
                }
            }
        }

        if members.len() < MIN_GROUP_SIZE {
            continue;
        }
        members.sort_unstable();
        if let Some(pattern) = group_to_pattern(circles, &members) {
            patterns.push(pattern);
        }
    }
    patterns
}

fn group_to_pattern(circles: &[Circle], members: &[usize]) -> Option<DetectedPattern> {
    let mut outline = Vec::with_capacity(members.len() * HULL_POINTS_PER_CIRCLE);
    for &m in members {
        let c = circles[m];
        for i in 0..HULL_POINTS_PER_CIRCLE {
            let t = 2.0 * PI * i as f64 / HULL_POINTS_PER_CIRCLE as f64;
            outline.push(Point::new(c.center.x + c.radius * t.cos(), c.center.y + c.radius * t.sin()));
        }
    }
    let contour = Contour::new(Contour::new(outline).convex_hull());
    let metrics = contour.metrics()?;
    let count = members.len();
    let mean_radius = members.iter().map(|&m| circles[m].radius).sum::<f64>() / count as f64;
    Some(DetectedPattern::from_metrics(
        PatternType::BubbleCloud,
        contour,
        &metrics,
        (count as f64 / GROUP_SATURATION).min(1.0),
        PatternAttributes::Bubble {
            circle_count: count,
            mean_radius,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(x: f64, y: f64, r: f64) -> Circle {
        Circle {
            center: Point::new(x, y),
            radius: r,
            support: 1.0,
        }
    }

    #[test]
    fn chained_circles_form_one_group() {
        let circles: Vec<Circle> = (0..5).map(|i| circle(50.0 + 40.0 * i as f64, 50.0, 12.0)).collect();
        let groups = group_circles(&circles, 60.0);
        assert_eq!(groups.len(), 1);
        assert!((groups[0].confidence - 0.5).abs() < 1e-12);
        assert!(matches!(groups[0].attributes, PatternAttributes::Bubble { circle_count: 5, .. }));
    }

    #[test]
    fn isolated_circles_do_not_register() {
        let circles = vec![circle(20.0, 20.0, 10.0), circle(300.0, 300.0, 10.0)];
        assert!(group_circles(&circles, 60.0).is_empty());
    }

    #[test]
    fn confidence_saturates_at_ten_members() {
        let circles: Vec<Circle> = (0..14).map(|i| circle(30.0 * i as f64, 0.0, 10.0)).collect();
        let groups = group_circles(&circles, 60.0);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].confidence, 1.0);
    }

    #[test]
    fn group_box_covers_every_circle() {
        let circles = vec![circle(40.0, 40.0, 10.0), circle(80.0, 40.0, 10.0)];
        let group = &group_circles(&circles, 60.0)[0];
        assert!(group.bounding_box.x <= 30.0 && group.bounding_box.x_max() >= 90.0);
    }

    #[test]
    fn flat_image_has_no_circles() {
        let gray = GrayImage::from_pixel(64, 64, image::Luma([128]));
        let edges = GrayImage::new(64, 64);
        assert!(find_circles(&gray, &edges, 8.0, 20.0).unwrap().is_empty());
    }
}
