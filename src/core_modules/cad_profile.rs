// THEORY:
// Each drawing-authoring tool draws revision clouds its own way: AutoCAD's REVCLOUD
// produces tight arcs, MicroStation plots heavier strokes, SolidWorks exports small
// bubbles. A `CadProfile` is the immutable bundle of size, color and threshold
// parameters tuned for one of those conventions. Profiles live in a table keyed by
// `CadSystem` that is built once on first access; lookups by string resolve unknown
// keys to the generic profile instead of failing.

use crate::core_modules::pixel::HsvRange;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CadSystem {
    #[serde(rename = "autocad")]
    AutoCad,
    #[serde(rename = "microstation")]
    MicroStation,
    #[serde(rename = "solidworks")]
    SolidWorks,
    #[default]
    Generic,
}

impl CadSystem {
    pub const ALL: [CadSystem; 4] = [
        CadSystem::AutoCad,
        CadSystem::MicroStation,
        CadSystem::SolidWorks,
        CadSystem::Generic,
    ];

    /// Resolves a caller-supplied key. Unknown keys fall back to `Generic`.
    pub fn from_key(key: &str) -> Self {
        match key.trim().to_ascii_lowercase().as_str() {
            "autocad" => CadSystem::AutoCad,
            "microstation" => CadSystem::MicroStation,
            "solidworks" => CadSystem::SolidWorks,
            _ => CadSystem::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CadSystem::AutoCad => "autocad",
            CadSystem::MicroStation => "microstation",
            CadSystem::SolidWorks => "solidworks",
            CadSystem::Generic => "generic",
        }
    }
}

/// The color families reviewers use to mark drawings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamedColor {
    Yellow,
    Cyan,
    LightBlue,
    LightGray,
    LightGreen,
    Pink,
}

impl NamedColor {
    /// The six families the classical color detector unions together.
    pub const ALL: [NamedColor; 6] = [
        NamedColor::Yellow,
        NamedColor::Cyan,
        NamedColor::LightBlue,
        NamedColor::LightGray,
        NamedColor::LightGreen,
        NamedColor::Pink,
    ];

    /// Base HSV band (hue in half-degrees).
    pub fn hsv_range(&self) -> HsvRange {
        match self {
            NamedColor::Yellow => HsvRange::new([20.0, 80.0, 120.0], [35.0, 255.0, 255.0]),
            NamedColor::Cyan => HsvRange::new([80.0, 80.0, 120.0], [100.0, 255.0, 255.0]),
            NamedColor::LightBlue => HsvRange::new([100.0, 40.0, 150.0], [125.0, 180.0, 255.0]),
            NamedColor::LightGray => HsvRange::new([0.0, 0.0, 190.0], [179.0, 30.0, 235.0]),
            NamedColor::LightGreen => HsvRange::new([36.0, 40.0, 150.0], [79.0, 200.0, 255.0]),
            NamedColor::Pink => HsvRange::new([140.0, 30.0, 170.0], [175.0, 180.0, 255.0]),
        }
    }
}

/// Inclusive `[min, max]` band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Detection parameters tuned for one CAD system's cloud conventions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CadProfile {
    pub system: CadSystem,
    /// Accepted area of any cloud candidate, in px².
    pub cloud_area: Band,
    /// Expected bubble radius range, in px.
    pub bubble_radius: Band,
    /// Maximum center distance for two bubbles to belong to the same cloud.
    pub bubble_spacing: f64,
    /// Expected stroke width, in px.
    pub line_thickness: u8,
    pub highlight_colors: &'static [NamedColor],
    pub canny_low: f32,
    pub canny_high: f32,
    /// Polygon approximation tolerance as a fraction of the perimeter.
    pub contour_epsilon: f64,
    pub highlight_area: Band,
    /// Typical revision-cloud size for the convention.
    pub revision_area: Band,
}

const AUTOCAD_COLORS: &[NamedColor] = &[NamedColor::Yellow, NamedColor::Cyan, NamedColor::LightGreen];
const MICROSTATION_COLORS: &[NamedColor] = &[NamedColor::Yellow, NamedColor::LightBlue, NamedColor::Pink];
const SOLIDWORKS_COLORS: &[NamedColor] = &[NamedColor::Yellow, NamedColor::Cyan, NamedColor::Pink];
const GENERIC_COLORS: &[NamedColor] = &[
    NamedColor::Yellow,
    NamedColor::Cyan,
    NamedColor::LightBlue,
    NamedColor::LightGreen,
    NamedColor::Pink,
];

static PROFILE_TABLE: OnceLock<HashMap<CadSystem, CadProfile>> = OnceLock::new();

fn build_profile(system: CadSystem) -> CadProfile {
    match system {
        CadSystem::AutoCad => CadProfile {
            system,
            cloud_area: Band::new(800.0, 400_000.0),
            bubble_radius: Band::new(10.0, 35.0),
            bubble_spacing: 60.0,
            line_thickness: 2,
            highlight_colors: AUTOCAD_COLORS,
            canny_low: 50.0,
            canny_high: 150.0,
            contour_epsilon: 0.02,
            highlight_area: Band::new(1_000.0, 300_000.0),
            revision_area: Band::new(2_000.0, 200_000.0),
        },
        CadSystem::MicroStation => CadProfile {
            system,
            cloud_area: Band::new(1_000.0, 450_000.0),
            bubble_radius: Band::new(12.0, 40.0),
            bubble_spacing: 70.0,
            line_thickness: 3,
            highlight_colors: MICROSTATION_COLORS,
            canny_low: 40.0,
            canny_high: 120.0,
            contour_epsilon: 0.025,
            highlight_area: Band::new(1_500.0, 350_000.0),
            revision_area: Band::new(2_500.0, 250_000.0),
        },
        CadSystem::SolidWorks => CadProfile {
            system,
            cloud_area: Band::new(600.0, 350_000.0),
            bubble_radius: Band::new(8.0, 30.0),
            bubble_spacing: 50.0,
            line_thickness: 2,
            highlight_colors: SOLIDWORKS_COLORS,
            canny_low: 60.0,
            canny_high: 180.0,
            contour_epsilon: 0.015,
            highlight_area: Band::new(800.0, 250_000.0),
            revision_area: Band::new(1_500.0, 150_000.0),
        },
        CadSystem::Generic => CadProfile {
            system,
            cloud_area: Band::new(500.0, 500_000.0),
            bubble_radius: Band::new(8.0, 40.0),
            bubble_spacing: 60.0,
            line_thickness: 2,
            highlight_colors: GENERIC_COLORS,
            canny_low: 50.0,
            canny_high: 150.0,
            contour_epsilon: 0.02,
            highlight_area: Band::new(500.0, 400_000.0),
            revision_area: Band::new(1_000.0, 250_000.0),
        },
    }
}

impl CadProfile {
    pub fn for_system(system: CadSystem) -> &'static CadProfile {
        let table = PROFILE_TABLE.get_or_init(|| {
            CadSystem::ALL
                .iter()
                .map(|s| (*s, build_profile(*s)))
                .collect()
        });
        // Every variant is inserted above.
        &table[&system]
    }

    pub fn for_key(key: &str) -> &'static CadProfile {
        Self::for_system(CadSystem::from_key(key))
    }
}
