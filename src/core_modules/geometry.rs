//! Plain 2-D geometry shared by every detector: points and axis-aligned boxes.

use serde::{Deserialize, Serialize};

/// A 2-D point in pixel (or, after mapping, page) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<imageproc::point::Point<u32>> for Point {
    fn from(p: imageproc::point::Point<u32>) -> Self {
        Point::new(p.x as f64, p.y as f64)
    }
}

/// An axis-aligned rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_corners(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        Self::new(x_min, y_min, x_max - x_min, y_max - y_min)
    }

    /// Pixel-inclusive bounds of a point set: a single point yields a 1x1 box.
    /// Returns `None` for an empty set.
    pub fn enclosing(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let (mut x_min, mut y_min, mut x_max, mut y_max) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            x_min = x_min.min(p.x);
            y_min = y_min.min(p.y);
            x_max = x_max.max(p.x);
            y_max = y_max.max(p.y);
        }
        Some(Self::new(x_min, y_min, x_max - x_min + 1.0, y_max - y_min + 1.0))
    }

    pub fn x_max(&self) -> f64 {
        self.x + self.width
    }

    pub fn y_max(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Width over height; 0 for a degenerate box.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height <= 0.0 {
            return 0.0;
        }
        self.width / self.height
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        let w = self.x_max().min(other.x_max()) - self.x.max(other.x);
        let h = self.y_max().min(other.y_max()) - self.y.max(other.y);
        if w <= 0.0 || h <= 0.0 {
            return 0.0;
        }
        w * h
    }

    /// Intersection over union; 0 when the boxes do not overlap.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let intersection = self.intersection_area(other);
        if intersection <= 0.0 {
            return 0.0;
        }
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.x_max().max(other.x_max()),
            self.y_max().max(other.y_max()),
        )
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.x && p.x <= self.x_max() && p.y >= self.y && p.y <= self.y_max()
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x_max() <= self.x_max()
            && other.y_max() <= self.y_max()
    }

    pub fn scaled(&self, scale_x: f64, scale_y: f64) -> BoundingBox {
        BoundingBox::new(
            self.x * scale_x,
            self.y * scale_y,
            self.width * scale_x,
            self.height * scale_y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_is_symmetric_and_bounded() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 10.0, 10.0);
        assert!((a.iou(&b) - b.iou(&a)).abs() < 1e-12);
        assert!((a.iou(&b) - 25.0 / 175.0).abs() < 1e-12);
        assert!((a.iou(&a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn disjoint_and_touching_boxes_have_zero_iou() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&BoundingBox::new(20.0, 20.0, 5.0, 5.0)), 0.0);
        assert_eq!(a.iou(&BoundingBox::new(10.0, 0.0, 5.0, 5.0)), 0.0);
    }

    #[test]
    fn union_contains_both_inputs() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(4.0, -3.0, 12.0, 6.0);
        let u = a.union(&b);
        assert!(u.contains_box(&a));
        assert!(u.contains_box(&b));
        assert_eq!(u, BoundingBox::new(0.0, -3.0, 16.0, 13.0));
    }

    #[test]
    fn enclosing_box_is_pixel_inclusive() {
        let points = [Point::new(2.0, 3.0), Point::new(6.0, 3.0), Point::new(4.0, 8.0)];
        let bbox = BoundingBox::enclosing(&points).unwrap();
        assert_eq!(bbox, BoundingBox::new(2.0, 3.0, 5.0, 6.0));
        assert!(points.iter().all(|p| bbox.contains_point(p)));
        assert!(BoundingBox::enclosing(&[]).is_none());
    }

    #[test]
    fn aspect_ratio_handles_degenerate_height() {
        assert_eq!(BoundingBox::new(0.0, 0.0, 4.0, 0.0).aspect_ratio(), 0.0);
        assert_eq!(BoundingBox::new(0.0, 0.0, 4.0, 2.0).aspect_ratio(), 2.0);
    }
}
