//! Hex color parsing and sRGB to CIE L*a*b* conversion.
//!
//! Colors are compared by the learner in Lab space so that channel distance
//! roughly follows perceived difference. Conversion uses the D65 reference
//! white and the standard sRGB companding curve.

use crate::constants::colors::{
    LAB_EPSILON, LAB_KAPPA, REF_WHITE_X, REF_WHITE_Y, REF_WHITE_Z, SENTINEL_COLORS,
};

/// 8-bit sRGB triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

/// CIE L*a*b* triple.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lab {
    /// Lightness, 0 (black) to 100 (white).
    pub l: f64,
    /// Green (negative) to red (positive) axis.
    pub a: f64,
    /// Blue (negative) to yellow (positive) axis.
    pub b: f64,
}

/// Returns `true` for values that mean "no meaningful color" (empty, black, white).
pub fn is_sentinel_color(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || SENTINEL_COLORS
            .iter()
            .any(|sentinel| sentinel.eq_ignore_ascii_case(trimmed))
}

/// Parse `#RRGGBB`, `#RGB` or `#AARRGGBB` (alpha ignored). The leading `#` is optional.
pub fn parse_hex(value: &str) -> Option<Rgb> {
    let digits = value.trim();
    let digits = digits.strip_prefix('#').unwrap_or(digits);
    if !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |start: usize| u8::from_str_radix(&digits[start..start + 2], 16).ok();
    match digits.len() {
        3 => {
            let mut expanded = [0u8; 3];
            for (slot, ch) in expanded.iter_mut().zip(digits.chars()) {
                let nibble = ch.to_digit(16)? as u8;
                *slot = nibble * 17;
            }
            Some(Rgb {
                r: expanded[0],
                g: expanded[1],
                b: expanded[2],
            })
        }
        6 => Some(Rgb {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        }),
        8 => Some(Rgb {
            r: channel(2)?,
            g: channel(4)?,
            b: channel(6)?,
        }),
        _ => None,
    }
}

/// Parse a hex color and convert it to Lab. `None` when the string is not a color.
pub fn to_lab(value: &str) -> Option<Lab> {
    parse_hex(value).map(rgb_to_lab)
}

/// sRGB to Lab under the D65 reference white.
pub fn rgb_to_lab(rgb: Rgb) -> Lab {
    let r = linearize(rgb.r);
    let g = linearize(rgb.g);
    let b = linearize(rgb.b);

    let x = (r * 0.4124 + g * 0.3576 + b * 0.1805) * 100.0;
    let y = (r * 0.2126 + g * 0.7152 + b * 0.0722) * 100.0;
    let z = (r * 0.0193 + g * 0.1192 + b * 0.9505) * 100.0;

    let fx = lab_pivot(x / REF_WHITE_X);
    let fy = lab_pivot(y / REF_WHITE_Y);
    let fz = lab_pivot(z / REF_WHITE_Z);

    Lab {
        l: (116.0 * fy - 16.0).max(0.0),
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

fn linearize(channel: u8) -> f64 {
    let value = f64::from(channel) / 255.0;
    if value > 0.04045 {
        ((value + 0.055) / 1.055).powf(2.4)
    } else {
        value / 12.92
    }
}

fn lab_pivot(t: f64) -> f64 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        (LAB_KAPPA * t + 16.0) / 116.0
    }
}
