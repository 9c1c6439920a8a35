//! Synthetic drawing pages for integration tests.
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use image::{Rgb, RgbImage};

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
pub const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

/// Fixed timestamp so repeated runs produce identical records.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap_or_else(Utc::now)
}

pub fn blank_page(w: u32, h: u32, color: Rgb<u8>) -> RgbImage {
    RgbImage::from_pixel(w, h, color)
}

/// Fills the `w` x `h` rectangle whose top-left corner is `(x0, y0)`.
pub fn fill_rect(img: &mut RgbImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgb<u8>) {
    for y in y0..(y0 + h).min(img.height()) {
        for x in x0..(x0 + w).min(img.width()) {
            img.put_pixel(x, y, color);
        }
    }
}

/// Strokes a circle outline: pixels within `half_width` of `radius` from `center`.
pub fn stroke_circle(img: &mut RgbImage, center: [f64; 2], radius: f64, half_width: f64, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    for y in 0..h {
        for x in 0..w {
            let dx = x as f64 - center[0];
            let dy = y as f64 - center[1];
            let d = (dx * dx + dy * dy).sqrt();
            if (d - radius).abs() <= half_width {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Strokes the closed polyline through `points`: pixels within `half_width` of any
/// segment are painted.
pub fn stroke_closed_polyline(img: &mut RgbImage, points: &[[f64; 2]], half_width: f64, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    let n = points.len();
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let x0 = (a[0].min(b[0]) - half_width).floor().max(0.0) as u32;
        let y0 = (a[1].min(b[1]) - half_width).floor().max(0.0) as u32;
        let x1 = ((a[0].max(b[0]) + half_width).ceil() as u32).min(w - 1);
        let y1 = ((a[1].max(b[1]) + half_width).ceil() as u32).min(h - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                if segment_distance([x as f64, y as f64], a, b) <= half_width {
                    img.put_pixel(x, y, color);
                }
            }
        }
    }
}

fn segment_distance(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq > 0.0 {
        (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a[0] + t * dx, a[1] + t * dy);
    ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt()
}

/// `samples` points on the closed polar curve `r = radius(t)` around `center`.
pub fn polar_loop(center: [f64; 2], samples: usize, radius: impl Fn(f64) -> f64) -> Vec<[f64; 2]> {
    (0..samples)
        .map(|i| {
            let t = 2.0 * std::f64::consts::PI * i as f64 / samples as f64;
            let r = radius(t);
            [center[0] + r * t.cos(), center[1] + r * t.sin()]
        })
        .collect()
}

/// Revision-cloud outline: `lobes` outward arcs meeting in inward cusps.
pub fn scalloped_loop(center: [f64; 2], radius: f64, lobes: usize, depth: f64) -> Vec<[f64; 2]> {
    polar_loop(center, 2000, |t| radius * (1.0 + depth * (lobes as f64 / 2.0 * t).sin().abs()))
}

/// Hand-drawn looking loop: two superimposed wobbles of different frequency.
pub fn wobbly_loop(center: [f64; 2], radius: f64) -> Vec<[f64; 2]> {
    polar_loop(center, 2000, |t| radius * (1.0 + 0.25 * (5.0 * t).sin() + 0.15 * (9.0 * t + 1.0).sin()))
}

/// Regular hexagon with a vertex pointing along +x.
pub fn hexagon(center: [f64; 2], radius: f64) -> Vec<[f64; 2]> {
    (0..6)
        .map(|i| {
            let t = std::f64::consts::PI / 3.0 * i as f64;
            [center[0] + radius * t.cos(), center[1] + radius * t.sin()]
        })
        .collect()
}

/// Ring of `count` circles of `radius` whose neighboring outlines are `gap` apart.
/// Returns the circle centers.
pub fn bubble_ring(img: &mut RgbImage, center: [f64; 2], count: usize, radius: f64, gap: f64) -> Vec<[f64; 2]> {
    let spacing = 2.0 * radius + gap;
    let ring_radius = spacing / (2.0 * (std::f64::consts::PI / count as f64).sin());
    let centers: Vec<[f64; 2]> = (0..count)
        .map(|i| {
            let t = 2.0 * std::f64::consts::PI * i as f64 / count as f64;
            [center[0] + ring_radius * t.cos(), center[1] + ring_radius * t.sin()]
        })
        .collect();
    for c in &centers {
        stroke_circle(img, *c, radius, 1.0, BLACK);
    }
    centers
}

/// White page carrying one yellow rectangle, a bubble ring and a square outline.
pub fn marked_up_page() -> RgbImage {
    let mut page = blank_page(420, 360, WHITE);
    fill_rect(&mut page, 30, 30, 50, 40, YELLOW);
    bubble_ring(&mut page, [270.0, 120.0], 8, 15.0, 20.0);
    for i in 0..90 {
        for t in 0..2 {
            page.put_pixel(40 + i, 230 + t, BLACK);
            page.put_pixel(40 + i, 318 + t, BLACK);
            page.put_pixel(40 + t, 230 + i, BLACK);
            page.put_pixel(128 + t, 230 + i, BLACK);
        }
    }
    page
}
