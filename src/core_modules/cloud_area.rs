// THEORY:
// A `CloudArea` is the only thing that leaves this crate. It is a self-contained,
// immutable record of one detected cloud on one page, already expressed in the page's
// own coordinate space, ready for a storage layer to persist as-is.
//
// Records must be reproducible: the same page analyzed twice has to produce the same
// bytes. The identifier is therefore a name-based (v5) UUID derived from the page
// number, the record's rank on the page, its method and its pixel box, and the
// timestamp is whatever the caller said the detection happened at.

use crate::core_modules::contour::BaseFeatures;
use crate::core_modules::geometry::{BoundingBox, Point};
use crate::core_modules::merge::{CoordinateMapper, FusedCandidate};
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Namespace for cloud identifiers.
pub const CLOUD_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6c0d_7a1e_3f52_4b8e_9a41_c2d5_e7f0_1b36);

pub const CIRCULAR_MIN_CIRCULARITY: f64 = 0.7;
pub const SQUARE_ASPECT: (f64, f64) = (0.8, 1.2);
pub const RECTANGULAR_MIN_SOLIDITY: f64 = 0.8;
pub const ELONGATED_ASPECT: (f64, f64) = (0.5, 2.0);
pub const IRREGULAR_MAX_SOLIDITY: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Circular,
    Rectangular,
    Elongated,
    Irregular,
    Freeform,
    Merged,
}

impl ShapeType {
    /// Labels a single-method region. Rules are checked in order and the first match
    /// wins; `Merged` is never produced here.
    pub fn classify(features: &BaseFeatures) -> ShapeType {
        let aspect = features.aspect_ratio;
        if features.circularity > CIRCULAR_MIN_CIRCULARITY {
            ShapeType::Circular
        } else if (SQUARE_ASPECT.0..=SQUARE_ASPECT.1).contains(&aspect)
            && features.solidity > RECTANGULAR_MIN_SOLIDITY
        {
            ShapeType::Rectangular
        } else if aspect > ELONGATED_ASPECT.1 || aspect < ELONGATED_ASPECT.0 {
            ShapeType::Elongated
        } else if features.solidity < IRREGULAR_MAX_SOLIDITY {
            ShapeType::Irregular
        } else {
            ShapeType::Freeform
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeType::Circular => "circular",
            ShapeType::Rectangular => "rectangular",
            ShapeType::Elongated => "elongated",
            ShapeType::Irregular => "irregular",
            ShapeType::Freeform => "freeform",
            ShapeType::Merged => "merged",
        }
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected cloud, in page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudArea {
    pub id: Uuid,
    pub page_number: u32,
    pub bounding_box: BoundingBox,
    pub centroid: Point,
    pub confidence: f64,
    /// `color`, `bubble`, ... or `merged_<method>` for fused records.
    pub detection_method: String,
    /// Enclosed area in source-image pixels.
    pub area: f64,
    pub shape_type: ShapeType,
    pub is_manual: bool,
    pub created_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, Value>,
}

impl CloudArea {
    /// Exports a fused candidate ranked `rank` on its page.
    pub fn from_fused(
        page_number: u32,
        rank: usize,
        fused: &FusedCandidate,
        mapper: &CoordinateMapper,
        detected_at: DateTime<Utc>,
    ) -> Result<Self> {
        let detection_method = fused.method.to_string();
        let mut metadata = BTreeMap::new();
        metadata.insert("features".to_string(), serde_json::to_value(fused.features)?);
        metadata.insert("pattern".to_string(), serde_json::to_value(&fused.attributes)?);
        metadata.insert("pixel_bbox".to_string(), serde_json::to_value(fused.bounding_box)?);
        metadata.insert(
            "detected_at".to_string(),
            Value::String(detected_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        if fused.method.is_merged() {
            metadata.insert("merged_from".to_string(), serde_json::to_value(&fused.members)?);
            metadata.insert("merged_count".to_string(), Value::from(fused.members.len()));
        }

        Ok(Self {
            id: Self::deterministic_id(page_number, rank, &detection_method, &fused.bounding_box),
            page_number,
            bounding_box: mapper.to_page(&fused.bounding_box),
            centroid: mapper.point_to_page(&fused.centroid),
            confidence: fused.confidence,
            detection_method,
            area: fused.area,
            shape_type: fused.shape_type,
            is_manual: false,
            created_at: detected_at,
            metadata,
        })
    }

    pub fn deterministic_id(page_number: u32, rank: usize, method: &str, pixel_box: &BoundingBox) -> Uuid {
        let name = format!(
            "{page_number}/{rank}/{method}/{:.3},{:.3},{:.3},{:.3}",
            pixel_box.x, pixel_box.y, pixel_box.width, pixel_box.height
        );
        Uuid::new_v5(&CLOUD_ID_NAMESPACE, name.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(aspect_ratio: f64, solidity: f64, circularity: f64) -> BaseFeatures {
        BaseFeatures {
            aspect_ratio,
            solidity,
            extent: 0.5,
            circularity,
            perimeter: 100.0,
        }
    }

    #[test]
    fn classification_follows_rule_order() {
        assert_eq!(ShapeType::classify(&features(1.0, 0.9, 0.75)), ShapeType::Circular);
        assert_eq!(ShapeType::classify(&features(1.1, 0.9, 0.5)), ShapeType::Rectangular);
        assert_eq!(ShapeType::classify(&features(3.0, 0.9, 0.3)), ShapeType::Elongated);
        assert_eq!(ShapeType::classify(&features(0.4, 0.5, 0.3)), ShapeType::Elongated);
        assert_eq!(ShapeType::classify(&features(1.5, 0.5, 0.3)), ShapeType::Irregular);
        assert_eq!(ShapeType::classify(&features(1.5, 0.7, 0.3)), ShapeType::Freeform);
    }

    #[test]
    fn square_with_low_solidity_is_not_rectangular() {
        assert_eq!(ShapeType::classify(&features(1.0, 0.5, 0.3)), ShapeType::Irregular);
    }

    #[test]
    fn ids_are_stable_and_distinct() {
        let bbox = BoundingBox::new(10.0, 20.0, 30.0, 40.0);
        let a = CloudArea::deterministic_id(1, 0, "color", &bbox);
        assert_eq!(a, CloudArea::deterministic_id(1, 0, "color", &bbox));
        assert_ne!(a, CloudArea::deterministic_id(2, 0, "color", &bbox));
        assert_ne!(a, CloudArea::deterministic_id(1, 1, "color", &bbox));
    }

    #[test]
    fn shape_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ShapeType::Freeform).unwrap(), "\"freeform\"");
    }
}
