// THEORY:
// The `contour` module is the measuring tape of the engine. A `Contour` is an ordered,
// closed loop of boundary points traced out of a binary mask; every detector turns its
// mask into contours and then asks this module the same questions about each one:
// how big is it, how round, how concave, how wobbly is its outline.
//
// Everything here is a pure function of the point list. Degenerate loops (zero
// perimeter, zero enclosed area, zero hull) are answered with `None` from
// `Contour::metrics` so the callers can filter them before any confidence scoring.

use crate::core_modules::geometry::{BoundingBox, Point};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Circularity of a perfect circle expressed as perimeter² / area (4π).
pub const CIRCLE_COMPACTNESS: f64 = 4.0 * PI;

/// The shape features every candidate carries, whatever method found it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BaseFeatures {
    pub aspect_ratio: f64,
    pub solidity: f64,
    pub extent: f64,
    pub circularity: f64,
    pub perimeter: f64,
}

/// Everything measured about a non-degenerate contour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContourMetrics {
    pub area: f64,
    pub hull_area: f64,
    pub bounding_box: BoundingBox,
    pub centroid: Point,
    pub features: BaseFeatures,
}

/// An ordered, implicitly closed sequence of boundary points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contour {
    pub points: Vec<Point>,
}

impl Contour {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Enclosed area by the shoelace formula. 0 for fewer than 3 points.
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    /// Length of the closed outline.
    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| self.points[i].distance(&self.points[(i + 1) % n]))
            .sum()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::enclosing(&self.points)
    }

    /// Area centroid of the polygon; falls back to the vertex mean when the loop
    /// encloses no area.
    pub fn centroid(&self) -> Point {
        let n = self.points.len();
        if n == 0 {
            return Point::default();
        }
        let mut signed_area = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let p = self.points[i];
            let q = self.points[(i + 1) % n];
            let cross = p.x * q.y - q.x * p.y;
            signed_area += cross;
            cx += (p.x + q.x) * cross;
            cy += (p.y + q.y) * cross;
        }
        if signed_area.abs() < 1e-9 {
            let sx: f64 = self.points.iter().map(|p| p.x).sum();
            let sy: f64 = self.points.iter().map(|p| p.y).sum();
            return Point::new(sx / n as f64, sy / n as f64);
        }
        let six_a = 3.0 * signed_area;
        Point::new(cx / six_a, cy / six_a)
    }

    /// Convex hull by Andrew's monotone chain, counter-clockwise, no repeated points.
    pub fn convex_hull(&self) -> Vec<Point> {
        let mut points = self.points.clone();
        points.sort_by(|a, b| {
            a.x.partial_cmp(&b.x)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
        });
        points.dedup();
        if points.len() < 3 {
            return points;
        }

        let mut lower: Vec<Point> = Vec::with_capacity(points.len());
        for p in &points {
            while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
                lower.pop();
            }
            lower.push(*p);
        }
        let mut upper: Vec<Point> = Vec::with_capacity(points.len());
        for p in points.iter().rev() {
            while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
                upper.pop();
            }
            upper.push(*p);
        }
        lower.pop();
        upper.pop();
        lower.extend(upper);
        lower
    }

    pub fn hull_area(&self) -> f64 {
        polygon_area(&self.convex_hull())
    }

    /// Measures the contour, or `None` if it is degenerate.
    pub fn metrics(&self) -> Option<ContourMetrics> {
        let area = self.area();
        let perimeter = self.perimeter();
        let hull_area = self.hull_area();
        if area <= 0.0 || perimeter <= 0.0 || hull_area <= 0.0 {
            return None;
        }
        let bounding_box = self.bounding_box()?;
        let features = BaseFeatures {
            aspect_ratio: bounding_box.aspect_ratio(),
            solidity: (area / hull_area).min(1.0),
            extent: area / bounding_box.area(),
            circularity: 4.0 * PI * area / (perimeter * perimeter),
            perimeter,
        };
        Some(ContourMetrics {
            area,
            hull_area,
            bounding_box,
            centroid: self.centroid(),
            features,
        })
    }

    /// Closed-curve Douglas-Peucker simplification. The loop is split at the vertex
    /// farthest from the first point and each half is simplified on its own.
    pub fn approx_polygon(&self, epsilon: f64) -> Vec<Point> {
        let n = self.points.len();
        if n <= 3 {
            return self.points.clone();
        }
        let first = self.points[0];
        let split = (1..n)
            .max_by(|&a, &b| {
                first
                    .distance(&self.points[a])
                    .partial_cmp(&first.distance(&self.points[b]))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(n / 2);

        let mut first_half: Vec<Point> = self.points[..=split].to_vec();
        let mut second_half: Vec<Point> = self.points[split..].to_vec();
        second_half.push(first);

        first_half = douglas_peucker(&first_half, epsilon);
        second_half = douglas_peucker(&second_half, epsilon);

        // Both halves share the split vertex and the start vertex.
        first_half.pop();
        second_half.pop();
        first_half.extend(second_half);
        first_half
    }

    /// Distances from the centroid to `samples` evenly spaced boundary points.
    pub fn radial_profile(&self, samples: usize) -> Vec<f64> {
        let n = self.points.len();
        if n == 0 || samples == 0 {
            return Vec::new();
        }
        let centroid = self.centroid();
        (0..samples)
            .map(|i| self.points[i * n / samples].distance(&centroid))
            .collect()
    }

    /// Turn angle (radians, [0, π]) between the chords `p[i-offset] -> p[i]` and
    /// `p[i] -> p[i+offset]` at every boundary point.
    pub fn turn_angles(&self, offset: usize) -> Vec<f64> {
        let n = self.points.len();
        if n < 2 * offset + 1 || offset == 0 {
            return Vec::new();
        }
        let mut angles = Vec::with_capacity(n);
        for i in 0..n {
            let a = self.points[(i + n - offset) % n];
            let b = self.points[i];
            let c = self.points[(i + offset) % n];
            let (v1x, v1y) = (b.x - a.x, b.y - a.y);
            let (v2x, v2y) = (c.x - b.x, c.y - b.y);
            if (v1x == 0.0 && v1y == 0.0) || (v2x == 0.0 && v2y == 0.0) {
                continue;
            }
            let cross = v1x * v2y - v1y * v2x;
            let dot = v1x * v2x + v1y * v2y;
            angles.push(cross.abs().atan2(dot));
        }
        angles
    }

    /// Fraction of boundary points that lie within `tolerance` of an edge of `polygon`.
    pub fn fraction_near_polygon(&self, polygon: &[Point], tolerance: f64) -> f64 {
        if self.points.is_empty() || polygon.len() < 2 {
            return 0.0;
        }
        let m = polygon.len();
        let near = self
            .points
            .iter()
            .filter(|p| {
                (0..m).any(|i| segment_distance(p, &polygon[i], &polygon[(i + 1) % m]) <= tolerance)
            })
            .count();
        near as f64 / self.points.len() as f64
    }
}

impl From<imageproc::contours::Contour<u32>> for Contour {
    fn from(contour: imageproc::contours::Contour<u32>) -> Self {
        Contour::new(contour.points.into_iter().map(Point::from).collect())
    }
}

/// Shoelace area of a closed polygon.
pub fn polygon_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y;
        area -= points[j].x * points[i].y;
    }
    area.abs() / 2.0
}

fn cross(o: &Point, a: &Point, b: &Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Distance from `p` to the segment `a`-`b`.
pub fn segment_distance(p: &Point, a: &Point, b: &Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return p.distance(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    p.distance(&Point::new(a.x + t * dx, a.y + t * dy))
}

/// Open-polyline Douglas-Peucker, iterative. Endpoints are always kept.
fn douglas_peucker(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    let mut stack = vec![(0usize, points.len() - 1)];

    while let Some((start, end)) = stack.pop() {
        if end - start <= 1 {
            continue;
        }
        let mut max_dist = 0.0;
        let mut max_index = start;
        for i in (start + 1)..end {
            let dist = segment_distance(&points[i], &points[start], &points[end]);
            if dist > max_dist {
                max_dist = dist;
                max_index = i;
            }
        }
        if max_dist > epsilon {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// Circular moving average with an odd window.
pub fn circular_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 || window <= 1 {
        return values.to_vec();
    }
    let half = (window / 2) as isize;
    (0..n as isize)
        .map(|i| {
            let sum: f64 = (-half..=half)
                .map(|k| values[(i + k).rem_euclid(n as isize) as usize])
                .sum();
            sum / (2 * half + 1) as f64
        })
        .collect()
}

/// Population mean and standard deviation.
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: f64) -> Contour {
        Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(side, 0.0),
            Point::new(side, side),
            Point::new(0.0, side),
        ])
    }

    fn circle(radius: f64, samples: usize) -> Contour {
        Contour::new(
            (0..samples)
                .map(|i| {
                    let t = 2.0 * PI * i as f64 / samples as f64;
                    Point::new(50.0 + radius * t.cos(), 50.0 + radius * t.sin())
                })
                .collect(),
        )
    }

    #[test]
    fn square_metrics() {
        let m = square(10.0).metrics().unwrap();
        assert!((m.area - 100.0).abs() < 1e-9);
        assert!((m.features.perimeter - 40.0).abs() < 1e-9);
        assert!((m.features.solidity - 1.0).abs() < 1e-9);
        assert!((m.features.circularity - PI / 4.0).abs() < 1e-9);
        assert!((m.centroid.x - 5.0).abs() < 1e-9 && (m.centroid.y - 5.0).abs() < 1e-9);
    }

    #[test]
    fn circle_is_nearly_circular() {
        let m = circle(20.0, 360).metrics().unwrap();
        assert!(m.features.circularity > 0.99);
        assert!((m.features.aspect_ratio - 1.0).abs() < 0.05);
    }

    #[test]
    fn concave_shape_has_lower_solidity() {
        let l_shape = Contour::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 2.0),
            Point::new(2.0, 2.0),
            Point::new(2.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
        let m = l_shape.metrics().unwrap();
        assert!(m.features.solidity < 0.7);
    }

    #[test]
    fn degenerate_contours_have_no_metrics() {
        let line = Contour::new(vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(10.0, 0.0)]);
        assert!(line.metrics().is_none());
        assert!(Contour::default().metrics().is_none());
    }

    #[test]
    fn approx_polygon_recovers_square_corners() {
        let mut points = Vec::new();
        for i in 0..10 {
            points.push(Point::new(i as f64, 0.0));
        }
        for i in 0..10 {
            points.push(Point::new(10.0, i as f64));
        }
        for i in 0..10 {
            points.push(Point::new(10.0 - i as f64, 10.0));
        }
        for i in 0..10 {
            points.push(Point::new(0.0, 10.0 - i as f64));
        }
        let approx = Contour::new(points).approx_polygon(0.5);
        assert_eq!(approx.len(), 4);
    }

    #[test]
    fn smooth_circle_has_small_turn_angles() {
        let angles = circle(30.0, 200).turn_angles(2);
        let (mean, _) = mean_and_std(&angles);
        assert!(mean < 0.1);
    }

    #[test]
    fn moving_average_preserves_constants() {
        let smoothed = circular_moving_average(&[3.0; 7], 5);
        assert!(smoothed.iter().all(|v| (*v - 3.0).abs() < 1e-12));
    }
}
