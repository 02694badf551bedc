//! Conversions between sRGB picker colours and CIE 1931 xy chromaticity.
//!
//! The bridge only stores chromaticity; luminance travels separately as the
//! dimming level. Going from xy back to RGB therefore has to pick a
//! brightness, see [`XY::to_rgb8`].

use serde::{Deserialize, Serialize};

/// Linear sRGB to CIE XYZ (D65).
const RGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.4124, 0.3576, 0.1805],
    [0.2126, 0.7152, 0.0722],
    [0.0193, 0.1192, 0.9505],
];

/// CIE XYZ (D65) to linear sRGB.
const XYZ_TO_RGB: [[f64; 3]; 3] = [
    [3.2406, -1.5372, -0.4986],
    [-0.9689, 1.8758, 0.0415],
    [0.0557, -0.2040, 1.0570],
];

fn mult(m: &[[f64; 3]; 3], v: [f64; 3]) -> [f64; 3] {
    m.map(|row| row[0] * v[0] + row[1] * v[1] + row[2] * v[2])
}

/// sRGB transfer function, encoded channel in 0..=1 to linear light.
pub fn gamma_expand(c: f64) -> f64 {
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

/// Inverse of [`gamma_expand`]. Negative input stays on the linear segment.
pub fn gamma_compress(c: f64) -> f64 {
    if c > 0.003_130_8 {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    } else {
        12.92 * c
    }
}

#[derive(Copy, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct XY {
    pub x: f64,
    pub y: f64,
}

impl XY {
    pub const D65_WHITE_POINT: Self = Self {
        x: 0.31271,
        y: 0.32902,
    };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Chromaticity of an 8-bit sRGB colour. `None` for pure black, which has
    /// no chromaticity.
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Option<Self> {
        let linear = [r, g, b].map(|c| gamma_expand(f64::from(c) / 255.0));
        let [cx, cy, cz] = mult(&RGB_TO_XYZ, linear);
        let sum = cx + cy + cz;
        if sum <= f64::EPSILON {
            return None;
        }
        Some(Self::new(cx / sum, cy / sum).clamped())
    }

    /// Inverse transform at luminance `Y = 1`, scaled to 0–255 but not
    /// clamped. Colours outside the sRGB gamut come back with channels below
    /// 0 or above 255; `y` must be positive.
    #[allow(non_snake_case)]
    pub fn to_rgb_unclamped(&self) -> [f64; 3] {
        let Y = 1.0;
        let X = (Y / self.y) * self.x;
        let Z = (Y / self.y) * (1.0 - self.x - self.y);
        mult(&XYZ_TO_RGB, [X, Y, Z]).map(|c| gamma_compress(c) * 255.0)
    }

    /// Displayable colour for this chromaticity at full brightness: the
    /// brightest linear channel is scaled to 1 before gamma, then every
    /// channel is clamped to 0–255.
    #[allow(non_snake_case)]
    pub fn to_rgb8(&self) -> [u8; 3] {
        if self.y <= f64::EPSILON {
            return [0, 0, 0];
        }
        let Y = 1.0;
        let X = (Y / self.y) * self.x;
        let Z = (Y / self.y) * (1.0 - self.x - self.y);
        let linear = mult(&XYZ_TO_RGB, [X, Y, Z]);
        let max = linear.iter().copied().fold(f64::MIN, f64::max);
        if !max.is_finite() || max <= 0.0 {
            return [0, 0, 0];
        }
        linear.map(|c| unit_to_u8_clamped(gamma_compress((c / max).clamp(0.0, 1.0))))
    }

    /// Projects into the unit triangle `x, y >= 0, x + y <= 1`.
    pub fn clamped(self) -> Self {
        let x = if self.x.is_finite() { self.x.clamp(0.0, 1.0) } else { 0.0 };
        let y = if self.y.is_finite() { self.y.clamp(0.0, 1.0) } else { 0.0 };
        let sum = x + y;
        if sum > 1.0 {
            Self::new(x / sum, y / sum)
        } else {
            Self::new(x, y)
        }
    }

    fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Free-function form of [`XY::from_rgb`].
pub fn rgb_to_xy(r: u8, g: u8, b: u8) -> Option<XY> {
    XY::from_rgb(r, g, b)
}

/// Free-function form of [`XY::to_rgb_unclamped`].
pub fn xy_to_rgb(xy: XY) -> [f64; 3] {
    xy.to_rgb_unclamped()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unit_to_u8_clamped(c: f64) -> u8 {
    (c * 255.0).round().clamp(0.0, 255.0) as u8
}

/// The triangle of chromaticities a light can reproduce.
#[derive(Copy, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Gamut {
    pub red: XY,
    pub green: XY,
    pub blue: XY,
}

impl Gamut {
    pub fn contains(&self, p: XY) -> bool {
        fn cross(o: XY, a: XY, b: XY) -> f64 {
            (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
        }
        let d1 = cross(self.red, self.green, p);
        let d2 = cross(self.green, self.blue, p);
        let d3 = cross(self.blue, self.red, p);
        let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
        let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
        !(has_neg && has_pos)
    }

    /// `p` itself when reachable, otherwise the nearest point on the
    /// triangle's edges.
    pub fn closest(&self, p: XY) -> XY {
        if self.contains(p) {
            return p;
        }
        [
            closest_on_segment(self.red, self.green, p),
            closest_on_segment(self.green, self.blue, p),
            closest_on_segment(self.blue, self.red, p),
        ]
        .into_iter()
        .min_by(|a, b| a.distance(&p).total_cmp(&b.distance(&p)))
        .unwrap_or(p)
    }
}

fn closest_on_segment(a: XY, b: XY, p: XY) -> XY {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 <= f64::EPSILON {
        return a;
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    XY::new(a.x + t * dx, a.y + t * dy)
}

/// Picker colour as hue (degrees), saturation and value (both 0–1).
#[derive(Copy, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Hsv {
    pub hue: f64,
    pub sat: f64,
    pub val: f64,
}

impl Hsv {
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let [r, g, b] = [r, g, b].map(|c| f64::from(c) / 255.0);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let hue = if delta <= f64::EPSILON {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        let sat = if max <= f64::EPSILON { 0.0 } else { delta / max };

        Self { hue, sat, val: max }
    }

    pub fn to_rgb8(&self) -> [u8; 3] {
        let sat = self.sat.clamp(0.0, 1.0);
        let val = self.val.clamp(0.0, 1.0);
        let c = val * sat;
        let h = self.hue.rem_euclid(360.0) / 60.0;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let m = val - c;

        let [r, g, b] = if h < 1.0 {
            [c, x, 0.0]
        } else if h < 2.0 {
            [x, c, 0.0]
        } else if h < 3.0 {
            [0.0, c, x]
        } else if h < 4.0 {
            [0.0, x, c]
        } else if h < 5.0 {
            [x, 0.0, c]
        } else {
            [c, 0.0, x]
        };
        [r + m, g + m, b + m].map(unit_to_u8_clamped)
    }

    pub fn to_xy(&self) -> Option<XY> {
        let [r, g, b] = self.to_rgb8();
        XY::from_rgb(r, g, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! compare_float {
        ($expr:expr, $value:expr, $diff:expr) => {
            let a = $expr;
            let b = $value;
            assert!((a - b).abs() < $diff, "{a} vs {b:.4}");
        };
    }

    macro_rules! compare {
        ($expr:expr, $value:expr) => {
            compare_float!($expr, $value, 1e-3)
        };
    }

    #[test]
    fn white_is_d65() {
        let xy = XY::from_rgb(255, 255, 255).unwrap();
        compare!(xy.x, XY::D65_WHITE_POINT.x);
        compare!(xy.y, XY::D65_WHITE_POINT.y);
    }

    #[test]
    fn primaries() {
        let red = XY::from_rgb(255, 0, 0).unwrap();
        compare!(red.x, 0.6401);
        compare!(red.y, 0.3300);

        let green = XY::from_rgb(0, 255, 0).unwrap();
        compare!(green.x, 0.3000);
        compare!(green.y, 0.6000);

        let blue = XY::from_rgb(0, 0, 255).unwrap();
        compare!(blue.x, 0.1500);
        compare!(blue.y, 0.0600);
    }

    #[test]
    fn black_has_no_chromaticity() {
        assert_eq!(XY::from_rgb(0, 0, 0), None);
        assert_eq!(rgb_to_xy(0, 0, 0), None);
    }

    #[test]
    fn inverse_is_not_clamped() {
        // red at Y = 1 is far brighter than sRGB red can be
        let [r, g, b] = xy_to_rgb(XY::from_rgb(255, 0, 0).unwrap());
        assert!(r > 255.0, "r = {r}");
        assert!(g.abs() < 1.0 && b.abs() < 1.0);

        // blue lands slightly outside the gamut on green
        let [_, g, b] = xy_to_rgb(XY::from_rgb(0, 0, 255).unwrap());
        assert!(g < 0.0, "g = {g}");
        assert!(b > 255.0);
    }

    #[test]
    fn white_inverse_is_full_scale() {
        let [r, g, b] = xy_to_rgb(XY::from_rgb(255, 255, 255).unwrap());
        compare_float!(r, 255.0, 0.5);
        compare_float!(g, 255.0, 0.5);
        compare_float!(b, 255.0, 0.5);
        assert_eq!(XY::D65_WHITE_POINT.to_rgb8(), [255, 255, 255]);
    }

    #[test]
    fn to_rgb8_clamps_out_of_gamut_points() {
        // outside the sRGB triangle, inside the unit triangle
        assert_eq!(XY::new(0.70, 0.29).to_rgb8()[0], 255);
        assert_eq!(XY::new(0.17, 0.70).to_rgb8()[1], 255);
        assert_eq!(XY::new(0.3, 0.0).to_rgb8(), [0, 0, 0]);
    }

    #[test]
    fn clamped_stays_in_unit_triangle() {
        assert_eq!(XY::new(-0.2, 0.5).clamped(), XY::new(0.0, 0.5));
        assert_eq!(XY::new(0.8, 0.8).clamped(), XY::new(0.5, 0.5));
        assert_eq!(XY::new(f64::NAN, 1.5).clamped(), XY::new(0.0, 1.0));
    }

    const GAMUT_C: Gamut = Gamut {
        red: XY::new(0.6915, 0.3083),
        green: XY::new(0.17, 0.7),
        blue: XY::new(0.1532, 0.0475),
    };

    #[test]
    fn gamut_contains() {
        assert!(GAMUT_C.contains(XY::D65_WHITE_POINT));
        assert!(GAMUT_C.contains(GAMUT_C.red));
        assert!(!GAMUT_C.contains(XY::new(0.05, 0.9)));
    }

    #[test]
    fn gamut_closest_projects_to_edge() {
        let inside = XY::new(0.4, 0.4);
        assert_eq!(GAMUT_C.closest(inside), inside);

        // beyond the red corner
        let p = GAMUT_C.closest(XY::new(0.75, 0.25));
        compare!(p.x, GAMUT_C.red.x);
        compare!(p.y, GAMUT_C.red.y);

        // below the blue-red edge; the edge rises towards red, so the foot
        // of the perpendicular sits left of and above the point
        let p = GAMUT_C.closest(XY::new(0.4, 0.1));
        compare!(p.x, 0.37368);
        compare!(p.y, 0.15432);
        let (blue, red) = (GAMUT_C.blue, GAMUT_C.red);
        let cross = (red.x - blue.x) * (p.y - blue.y) - (red.y - blue.y) * (p.x - blue.x);
        compare_float!(cross, 0.0, 1e-12);
        assert!(p.x > blue.x && p.x < red.x);
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(Hsv { hue: 0.0, sat: 1.0, val: 1.0 }.to_rgb8(), [255, 0, 0]);
        assert_eq!(Hsv { hue: 120.0, sat: 1.0, val: 1.0 }.to_rgb8(), [0, 255, 0]);
        assert_eq!(Hsv { hue: 240.0, sat: 1.0, val: 1.0 }.to_rgb8(), [0, 0, 255]);
        assert_eq!(Hsv { hue: 360.0, sat: 1.0, val: 1.0 }.to_rgb8(), [255, 0, 0]);
        assert_eq!(Hsv { hue: 42.0, sat: 0.0, val: 1.0 }.to_rgb8(), [255, 255, 255]);
    }

    #[test]
    fn hsv_from_rgb() {
        let hsv = Hsv::from_rgb(255, 128, 0);
        compare_float!(hsv.hue, 30.1, 0.1);
        compare!(hsv.sat, 1.0);
        compare!(hsv.val, 1.0);
        assert_eq!(hsv.to_rgb8(), [255, 128, 0]);

        let grey = Hsv::from_rgb(51, 51, 51);
        compare!(grey.sat, 0.0);
        compare!(grey.val, 0.2);
        assert_eq!(Hsv::from_rgb(0, 0, 0).to_xy(), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn chromaticity_is_inside_unit_triangle(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
                prop_assume!((r, g, b) != (0, 0, 0));
                let xy = XY::from_rgb(r, g, b).unwrap();
                prop_assert!((0.0..=1.0).contains(&xy.x), "x = {}", xy.x);
                prop_assert!((0.0..=1.0).contains(&xy.y), "y = {}", xy.y);
                prop_assert!(xy.x + xy.y <= 1.0);
            }

            #[test]
            fn full_brightness_colours_round_trip(
                a in any::<u8>(),
                b in any::<u8>(),
                c in any::<u8>(),
                channel in 0usize..3,
            ) {
                let mut rgb = [a, b, c];
                rgb[channel] = 255;
                let [r, g, b] = rgb;
                let back = XY::from_rgb(r, g, b).unwrap().to_rgb8();
                for (original, converted) in rgb.iter().zip(back) {
                    prop_assert!(
                        (i16::from(*original) - i16::from(converted)).abs() <= 1,
                        "{:?} -> {:?}", rgb, back
                    );
                }
            }

            #[test]
            fn hsv_round_trips_rgb(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
                let back = Hsv::from_rgb(r, g, b).to_rgb8();
                for (original, converted) in [r, g, b].iter().zip(back) {
                    prop_assert!((i16::from(*original) - i16::from(converted)).abs() <= 1);
                }
            }
        }
    }
}
