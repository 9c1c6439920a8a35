// THEORY:
// The `candidate` module holds the transient data containers every detector produces.
// A `RawCandidate` is a single region some method believes is a revision cloud, within
// a single page, at a single moment. It knows its outline, box, area and confidence
// and carries the shape features that were measured on it; it does not know how it
// compares to other candidates. Comparison and fusion happen in `merge`.
//
// The pattern recognizer speaks in `DetectedPattern`s, which add a pattern type. The
// method-specific measurements ride along as a typed `PatternAttributes` variant rather
// than a loose string map, joined to the shared `BaseFeatures`.

use crate::core_modules::cad_profile::NamedColor;
use crate::core_modules::contour::{BaseFeatures, Contour, ContourMetrics};
use crate::core_modules::geometry::{BoundingBox, Point};
use serde::{Deserialize, Serialize};

/// Which detector produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Color,
    Shape,
    Texture,
    Bubble,
    Revision,
    Highlight,
    Polygon,
    Freehand,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Color => "color",
            DetectionMethod::Shape => "shape",
            DetectionMethod::Texture => "texture",
            DetectionMethod::Bubble => "bubble",
            DetectionMethod::Revision => "revision",
            DetectionMethod::Highlight => "highlight",
            DetectionMethod::Polygon => "polygon",
            DetectionMethod::Freehand => "freehand",
        }
    }

    /// Bonus added to classical-method confidence.
    pub fn confidence_bonus(&self) -> f64 {
        match self {
            DetectionMethod::Color => 0.2,
            DetectionMethod::Shape => 0.15,
            DetectionMethod::Texture => 0.1,
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    BubbleCloud,
    RevisionCloud,
    HighlightOverlay,
    PolygonCloud,
    FreehandCloud,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::BubbleCloud => "bubble_cloud",
            PatternType::RevisionCloud => "revision_cloud",
            PatternType::HighlightOverlay => "highlight_overlay",
            PatternType::PolygonCloud => "polygon_cloud",
            PatternType::FreehandCloud => "freehand_cloud",
        }
    }

    pub fn method(&self) -> DetectionMethod {
        match self {
            PatternType::BubbleCloud => DetectionMethod::Bubble,
            PatternType::RevisionCloud => DetectionMethod::Revision,
            PatternType::HighlightOverlay => DetectionMethod::Highlight,
            PatternType::PolygonCloud => DetectionMethod::Polygon,
            PatternType::FreehandCloud => DetectionMethod::Freehand,
        }
    }
}

/// Method-specific measurements, one variant per pattern type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PatternAttributes {
    /// Classical color/shape/texture candidates carry only the base features.
    #[default]
    Classical,
    Bubble {
        circle_count: usize,
        mean_radius: f64,
    },
    Revision {
        scallop_ratio: f64,
        undulation: f64,
        is_revision_cloud: bool,
    },
    Highlight {
        color: NamedColor,
        color_consistency: f64,
        coverage: f64,
    },
    Polygon {
        vertex_count: usize,
        convexity: f64,
        straight_edge_score: f64,
    },
    Freehand {
        irregularity: f64,
        smoothness: f64,
        organic_shape: f64,
    },
}

/// Output of one pattern sub-detector before conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedPattern {
    pub pattern_type: PatternType,
    pub contour: Contour,
    pub bounding_box: BoundingBox,
    pub area: f64,
    pub confidence: f64,
    pub centroid: Point,
    pub features: BaseFeatures,
    pub attributes: PatternAttributes,
}

impl DetectedPattern {
    pub fn from_metrics(
        pattern_type: PatternType,
        contour: Contour,
        metrics: &ContourMetrics,
        confidence: f64,
        attributes: PatternAttributes,
    ) -> Self {
        Self {
            pattern_type,
            contour,
            bounding_box: metrics.bounding_box,
            area: metrics.area,
            confidence: confidence.clamp(0.0, 1.0),
            centroid: metrics.centroid,
            features: metrics.features,
            attributes,
        }
    }

    pub fn into_candidate(self) -> RawCandidate {
        RawCandidate {
            contour: self.contour,
            bounding_box: self.bounding_box,
            area: self.area,
            confidence: self.confidence,
            method: self.pattern_type.method(),
            centroid: self.centroid,
            features: self.features,
            attributes: self.attributes,
        }
    }
}

/// A single detection from any method, in pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub contour: Contour,
    pub bounding_box: BoundingBox,
    pub area: f64,
    pub confidence: f64,
    pub method: DetectionMethod,
    pub centroid: Point,
    pub features: BaseFeatures,
    pub attributes: PatternAttributes,
}

impl RawCandidate {
    pub fn from_metrics(
        method: DetectionMethod,
        contour: Contour,
        metrics: &ContourMetrics,
        confidence: f64,
    ) -> Self {
        Self {
            contour,
            bounding_box: metrics.bounding_box,
            area: metrics.area,
            confidence: confidence.clamp(0.0, 1.0),
            method,
            centroid: metrics.centroid,
            features: metrics.features,
            attributes: PatternAttributes::Classical,
        }
    }

    /// Whether the box encloses every contour point.
    pub fn box_contains_contour(&self) -> bool {
        self.contour
            .points
            .iter()
            .all(|p| self.bounding_box.contains_point(p))
    }
}
