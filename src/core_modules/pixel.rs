// THEORY (1D Pixel Heuristics):
// The `Pixel` module is the most fundamental unit of the detection engine. It is a
// "dumb" data container for a single RGB pixel of a rasterized drawing plus the
// single-pixel heuristics the detectors need: Rec. 601 luminance for the grayscale
// passes and an 8-bit HSV triple for the color-range masks. Anything that needs a
// neighbor (gradients or morphology) belongs in `raster`.
//
// HSV convention:
// - Hue is stored in half-degrees, [0, 180), so it fits a byte.
// - Saturation and Value are scaled to [0, 255].
// Highlight and color ranges throughout the crate are written in this convention.
//
// Key principles:
// 1) Single-pixel scope: heuristics never read neighbors.
// 2) Integer-in, integer-out at the boundary so masks are exactly reproducible.

/// A "dumb" data container representing a single RGB pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pixel {
    /// The red channel value (0-255).
    pub red: u8,
    /// The green channel value (0-255).
    pub green: u8,
    /// The blue channel value (0-255).
    pub blue: u8,
}

/// 8-bit HSV triple: hue in [0, 180), saturation and value in [0, 255].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hsv {
    pub hue: u8,
    pub saturation: u8,
    pub value: u8,
}

impl Pixel {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Luminance estimate (Rec. 601 luma) on the 0..255 scale.
    pub fn luminance(&self) -> f64 {
        0.299_f64 * self.red as f64 + 0.587_f64 * self.green as f64 + 0.114_f64 * self.blue as f64
    }

    /// Luminance rounded into a gray byte.
    pub fn gray(&self) -> u8 {
        self.luminance().round().clamp(0.0, 255.0) as u8
    }

    /// Hue angle in degrees [0, 360) from normalized sRGB channels.
    pub fn hue_degrees(&self) -> f64 {
        let r = self.red as f64 / 255.0;
        let g = self.green as f64 / 255.0;
        let b = self.blue as f64 / 255.0;
        let maximum_channel = r.max(g.max(b));
        let minimum_channel = r.min(g.min(b));
        let chroma = maximum_channel - minimum_channel;

        if chroma <= 1e-9 {
            return 0.0;
        }

        let (base_difference, sector_offset) = if maximum_channel == r {
            (g - b, 0.0)
        } else if maximum_channel == g {
            (b - r, 2.0)
        } else {
            (r - g, 4.0)
        };

        let mut hue_degrees = (base_difference / chroma + sector_offset) * 60.0;
        if hue_degrees < 0.0 {
            hue_degrees += 360.0;
        }
        hue_degrees
    }

    /// Saturation (HSV): chroma / value, scaled to [0, 255].
    pub fn saturation_hsv(&self) -> f64 {
        let maximum_channel = self.red.max(self.green.max(self.blue)) as f64;
        if maximum_channel <= 0.0 {
            return 0.0;
        }
        let minimum_channel = self.red.min(self.green.min(self.blue)) as f64;
        (maximum_channel - minimum_channel) / maximum_channel * 255.0
    }

    /// HSV Value (V): max(R, G, B).
    pub fn value_hsv(&self) -> u8 {
        self.red.max(self.green.max(self.blue))
    }

    pub fn to_hsv(&self) -> Hsv {
        let hue = (self.hue_degrees() / 2.0).round() as u16 % 180;
        Hsv {
            hue: hue as u8,
            saturation: self.saturation_hsv().round().clamp(0.0, 255.0) as u8,
            value: self.value_hsv(),
        }
    }
}

impl From<image::Rgb<u8>> for Pixel {
    fn from(rgb: image::Rgb<u8>) -> Self {
        let [red, green, blue] = rgb.0;
        Pixel::new(red, green, blue)
    }
}

/// An inclusive box in HSV space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HsvRange {
    pub lower: [f64; 3],
    pub upper: [f64; 3],
}

impl HsvRange {
    pub const fn new(lower: [f64; 3], upper: [f64; 3]) -> Self {
        Self { lower, upper }
    }

    /// Widens (positive `delta`) or narrows the saturation and value bounds.
    /// Hue bounds are left alone.
    pub fn nudged(&self, delta: f64) -> Self {
        let mut lower = self.lower;
        let mut upper = self.upper;
        for channel in 1..3 {
            lower[channel] = (lower[channel] - delta).clamp(0.0, 255.0);
            upper[channel] = (upper[channel] + delta).clamp(0.0, 255.0);
        }
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: Hsv) -> bool {
        let values = [hsv.hue as f64, hsv.saturation as f64, hsv.value as f64];
        values
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(v, (lo, hi))| *v >= *lo && *v <= *hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_colors_map_to_half_degree_hues() {
        assert_eq!(Pixel::new(255, 0, 0).to_hsv().hue, 0);
        assert_eq!(Pixel::new(255, 255, 0).to_hsv().hue, 30);
        assert_eq!(Pixel::new(0, 255, 0).to_hsv().hue, 60);
        assert_eq!(Pixel::new(0, 255, 255).to_hsv().hue, 90);
        assert_eq!(Pixel::new(0, 0, 255).to_hsv().hue, 120);
    }

    #[test]
    fn grays_have_zero_saturation() {
        let hsv = Pixel::new(128, 128, 128).to_hsv();
        assert_eq!(hsv.saturation, 0);
        assert_eq!(hsv.value, 128);
        assert_eq!(Pixel::new(0, 0, 0).to_hsv(), Hsv::default());
    }

    #[test]
    fn yellow_is_fully_saturated() {
        let hsv = Pixel::new(255, 255, 0).to_hsv();
        assert_eq!(hsv.saturation, 255);
        assert_eq!(hsv.value, 255);
    }

    #[test]
    fn luminance_of_white_is_full_scale() {
        assert_eq!(Pixel::new(255, 255, 255).gray(), 255);
        assert_eq!(Pixel::new(0, 0, 0).gray(), 0);
    }

    #[test]
    fn nudge_widens_saturation_and_value_only() {
        let range = HsvRange::new([20.0, 100.0, 100.0], [35.0, 200.0, 200.0]);
        let wider = range.nudged(10.0);
        assert_eq!(wider.lower, [20.0, 90.0, 90.0]);
        assert_eq!(wider.upper, [35.0, 210.0, 210.0]);
        let clamped = range.nudged(200.0);
        assert_eq!(clamped.lower[1], 0.0);
        assert_eq!(clamped.upper[2], 255.0);
    }

    #[test]
    fn range_membership_is_inclusive() {
        let range = HsvRange::new([20.0, 50.0, 50.0], [35.0, 255.0, 255.0]);
        assert!(range.contains(Hsv { hue: 20, saturation: 50, value: 255 }));
        assert!(!range.contains(Hsv { hue: 36, saturation: 200, value: 200 }));
    }
}
