// THEORY:
// Different methods routinely find the same physical mark: a yellow highlighted cloud
// shows up in the color mask, in the edge map and as a pattern. The merge stage walks
// the pooled candidates strongest-first and grows a group around every unclaimed seed
// from the remaining candidates that overlap it by more than `MERGE_IOU_THRESHOLD`.
// A group of one passes through untouched. A larger group collapses into a single
// record whose box is the union of its members, whose confidence is the members'
// area-weighted average and whose method is tagged `merged_<seed method>`.
//
// `CoordinateMapper` then moves surviving regions from image pixels into the page's
// own units with independent X and Y scale factors.

use crate::core_modules::candidate::{DetectionMethod, PatternAttributes, RawCandidate};
use crate::core_modules::cloud_area::ShapeType;
use crate::core_modules::contour::{BaseFeatures, Contour};
use crate::core_modules::geometry::{BoundingBox, Point};
use crate::error::{CloudError, Result};
use std::fmt;

/// Members must overlap the group seed by strictly more than this.
pub const MERGE_IOU_THRESHOLD: f64 = 0.3;

/// How a fused record came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodTag {
    Single(DetectionMethod),
    /// Carries the method of the highest-confidence member.
    Merged(DetectionMethod),
}

impl MethodTag {
    pub fn method(&self) -> DetectionMethod {
        match self {
            MethodTag::Single(m) | MethodTag::Merged(m) => *m,
        }
    }

    pub fn is_merged(&self) -> bool {
        matches!(self, MethodTag::Merged(_))
    }
}

impl fmt::Display for MethodTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodTag::Single(m) => f.write_str(m.as_str()),
            MethodTag::Merged(m) => write!(f, "merged_{}", m.as_str()),
        }
    }
}

/// A candidate after cross-method fusion, still in pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    pub contour: Contour,
    pub bounding_box: BoundingBox,
    pub centroid: Point,
    pub area: f64,
    pub confidence: f64,
    pub method: MethodTag,
    pub shape_type: ShapeType,
    pub features: BaseFeatures,
    pub attributes: PatternAttributes,
    /// Identifiers of the contributing candidates; empty for singletons.
    pub members: Vec<String>,
}

impl FusedCandidate {
    fn single(candidate: RawCandidate) -> Self {
        Self {
            shape_type: ShapeType::classify(&candidate.features),
            method: MethodTag::Single(candidate.method),
            contour: candidate.contour,
            bounding_box: candidate.bounding_box,
            centroid: candidate.centroid,
            area: candidate.area,
            confidence: candidate.confidence,
            features: candidate.features,
            attributes: candidate.attributes,
            members: Vec::new(),
        }
    }
}

/// Identifier for the candidate at `rank` in strongest-first order.
pub fn member_id(candidate: &RawCandidate, rank: usize) -> String {
    format!("{}-{rank}", candidate.method.as_str())
}

/// Collapses overlapping candidates. Output keeps strongest-first seed order.
pub fn merge_candidates(mut candidates: Vec<RawCandidate>) -> Vec<FusedCandidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let ids: Vec<String> = candidates
        .iter()
        .enumerate()
        .map(|(rank, c)| member_id(c, rank))
        .collect();

    let mut consumed = vec![false; candidates.len()];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for seed in 0..candidates.len() {
        if consumed[seed] {
            continue;
        }
        consumed[seed] = true;
        let mut group = vec![seed];
        for other in seed + 1..candidates.len() {
            if !consumed[other]
                && candidates[seed].bounding_box.iou(&candidates[other].bounding_box) > MERGE_IOU_THRESHOLD
            {
                consumed[other] = true;
                group.push(other);
            }
        }
        groups.push(group);
    }

    let mut slots: Vec<Option<RawCandidate>> = candidates.into_iter().map(Some).collect();
    groups
        .into_iter()
        .filter_map(|group| {
            let members: Vec<(RawCandidate, String)> = group
                .iter()
                .filter_map(|&i| slots[i].take().map(|c| (c, ids[i].clone())))
                .collect();
            fuse_group(members)
        })
        .collect()
}

/// Fuses one group; the first member is the seed.
fn fuse_group(mut members: Vec<(RawCandidate, String)>) -> Option<FusedCandidate> {
    if members.len() <= 1 {
        return members.pop().map(|(c, _)| FusedCandidate::single(c));
    }

    let total_area: f64 = members.iter().map(|(c, _)| c.area).sum();
    let total_confidence: f64 = members.iter().map(|(c, _)| c.confidence).sum();
    let confidence = if total_area > 0.0 {
        members.iter().map(|(c, _)| c.area * c.confidence).sum::<f64>() / total_area
    } else {
        total_confidence / members.len() as f64
    };

    let bounding_box = members
        .iter()
        .skip(1)
        .fold(members[0].0.bounding_box, |acc, (c, _)| acc.union(&c.bounding_box));
    let area = members.iter().map(|(c, _)| c.area).fold(0.0, f64::max);
    let features = weighted_features(&members, total_confidence);
    let ids: Vec<String> = members.iter().map(|(_, id)| id.clone()).collect();

    let (seed, _) = members.swap_remove(0);
    Some(FusedCandidate {
        contour: seed.contour,
        centroid: bounding_box.center(),
        bounding_box,
        area,
        confidence: confidence.clamp(0.0, 1.0),
        method: MethodTag::Merged(seed.method),
        shape_type: ShapeType::Merged,
        features,
        attributes: seed.attributes,
        members: ids,
    })
}

fn weighted_features(members: &[(RawCandidate, String)], total_confidence: f64) -> BaseFeatures {
    let weight = |c: &RawCandidate| {
        if total_confidence > 0.0 {
            c.confidence / total_confidence
        } else {
            1.0 / members.len() as f64
        }
    };
    members.iter().fold(BaseFeatures::default(), |acc, (c, _)| {
        let w = weight(c);
        let f = &c.features;
        BaseFeatures {
            aspect_ratio: acc.aspect_ratio + w * f.aspect_ratio,
            solidity: acc.solidity + w * f.solidity,
            extent: acc.extent + w * f.extent,
            circularity: acc.circularity + w * f.circularity,
            perimeter: acc.perimeter + w * f.perimeter,
        }
    })
}

/// Scales pixel geometry into page units and back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    pub scale_x: f64,
    pub scale_y: f64,
    page_width: f64,
    page_height: f64,
}

impl CoordinateMapper {
    pub fn new(page_width: f64, page_height: f64, image_width: u32, image_height: u32) -> Result<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(page_width) || !valid(page_height) {
            return Err(CloudError::InvalidPageGeometry {
                width: page_width,
                height: page_height,
            });
        }
        if image_width == 0 || image_height == 0 {
            return Err(CloudError::EmptyImage);
        }
        Ok(Self {
            scale_x: page_width / image_width as f64,
            scale_y: page_height / image_height as f64,
            page_width,
            page_height,
        })
    }

    /// Pixel box to page box, clipped to the page.
    pub fn to_page(&self, pixel_box: &BoundingBox) -> BoundingBox {
        let scaled = pixel_box.scaled(self.scale_x, self.scale_y);
        BoundingBox::from_corners(
            scaled.x.clamp(0.0, self.page_width),
            scaled.y.clamp(0.0, self.page_height),
            scaled.x_max().clamp(0.0, self.page_width),
            scaled.y_max().clamp(0.0, self.page_height),
        )
    }

    pub fn point_to_page(&self, p: &Point) -> Point {
        Point::new(p.x * self.scale_x, p.y * self.scale_y)
    }

    pub fn to_pixels(&self, page_box: &BoundingBox) -> BoundingBox {
        page_box.scaled(1.0 / self.scale_x, 1.0 / self.scale_y)
    }

    pub fn point_to_pixels(&self, p: &Point) -> Point {
        Point::new(p.x / self.scale_x, p.y / self.scale_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(method: DetectionMethod, bbox: BoundingBox, confidence: f64) -> RawCandidate {
        let contour = Contour::new(vec![
            Point::new(bbox.x, bbox.y),
            Point::new(bbox.x_max(), bbox.y),
            Point::new(bbox.x_max(), bbox.y_max()),
            Point::new(bbox.x, bbox.y_max()),
        ]);
        let mut metrics = contour.metrics().unwrap();
        metrics.bounding_box = bbox;
        RawCandidate::from_metrics(method, contour, &metrics, confidence)
    }

    #[test]
    fn overlapping_methods_collapse_to_one_record() {
        let color = candidate(DetectionMethod::Color, BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.6);
        let shape = candidate(DetectionMethod::Shape, BoundingBox::new(5.0, 0.0, 100.0, 100.0), 0.8);
        let (a1, a2) = (color.area, shape.area);
        let fused = merge_candidates(vec![color, shape]);
        assert_eq!(fused.len(), 1);
        let merged = &fused[0];
        assert_eq!(merged.method.to_string(), "merged_shape");
        assert_eq!(merged.shape_type, ShapeType::Merged);
        let expected = (0.6 * a1 + 0.8 * a2) / (a1 + a2);
        assert!((merged.confidence - expected).abs() < 1e-9);
        assert_eq!(merged.bounding_box, BoundingBox::new(0.0, 0.0, 105.0, 100.0));
        assert_eq!(merged.members, vec!["shape-0".to_string(), "color-1".to_string()]);
    }

    #[test]
    fn disjoint_candidates_pass_through() {
        let a = candidate(DetectionMethod::Texture, BoundingBox::new(0.0, 0.0, 50.0, 50.0), 0.5);
        let b = candidate(DetectionMethod::Bubble, BoundingBox::new(200.0, 200.0, 50.0, 50.0), 0.9);
        let fused = merge_candidates(vec![a, b]);
        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].method, MethodTag::Single(DetectionMethod::Bubble));
        assert!(fused.iter().all(|f| f.members.is_empty() && f.shape_type != ShapeType::Merged));
    }

    #[test]
    fn merged_box_is_never_smaller_than_a_member() {
        let a = candidate(DetectionMethod::Color, BoundingBox::new(10.0, 10.0, 80.0, 60.0), 0.7);
        let b = candidate(DetectionMethod::Polygon, BoundingBox::new(20.0, 15.0, 80.0, 60.0), 0.65);
        let (box_a, box_b) = (a.bounding_box, b.bounding_box);
        let fused = merge_candidates(vec![a, b]);
        assert_eq!(fused.len(), 1);
        assert!(fused[0].bounding_box.contains_box(&box_a));
        assert!(fused[0].bounding_box.contains_box(&box_b));
    }

    #[test]
    fn mapper_rejects_degenerate_pages() {
        assert!(CoordinateMapper::new(0.0, 792.0, 100, 100).is_err());
        assert!(CoordinateMapper::new(612.0, f64::NAN, 100, 100).is_err());
        assert!(CoordinateMapper::new(612.0, 792.0, 0, 100).is_err());
    }

    #[test]
    fn mapper_scales_axes_independently() {
        let mapper = CoordinateMapper::new(612.0, 792.0, 1224, 3168).unwrap();
        let page = mapper.to_page(&BoundingBox::new(100.0, 400.0, 200.0, 800.0));
        assert_eq!(page, BoundingBox::new(50.0, 100.0, 100.0, 200.0));
        let back = mapper.to_pixels(&page);
        assert!((back.x - 100.0).abs() < 1e-9 && (back.height - 800.0).abs() < 1e-9);
        assert_eq!(mapper.point_to_page(&Point::new(1224.0, 3168.0)), Point::new(612.0, 792.0));
    }
}
