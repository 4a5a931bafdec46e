//! Color definitions for map overlays

use crate::checks::Rule;
use crate::core::config::MapConfig;

/// RGB color, one byte per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `#rgb`
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();

        match digits.len() {
            6 => Some(Self::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            3 => {
                let short = |i: usize| channel(&digits[i..i + 1]).map(|v| v * 17);
                Some(Self::new(short(0)?, short(1)?, short(2)?))
            }
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Darken color by a factor (0.0 = black, 1.0 = unchanged)
    pub fn darken(&self, factor: f32) -> Self {
        let scale = |c: u8| (c as f32 * factor.clamp(0.0, 1.0)).round() as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

/// Color of the base "Polygons" layer
pub const BASE: Color = Color::new(0x33, 0x88, 0xff);

/// Default color for a rule's overlay
pub fn rule_color(rule: Rule) -> Color {
    match rule {
        Rule::Invalid => Color::new(0xe4, 0x1a, 0x1c),       // Red
        Rule::Duplicates => Color::new(0x98, 0x4e, 0xa3),    // Purple
        Rule::Gaps => Color::new(0xff, 0x7f, 0x00),          // Orange
        Rule::Overlaps => Color::new(0xff, 0xd9, 0x2f),      // Yellow
        Rule::CrossOverlaps => Color::new(0xf7, 0x81, 0xbf), // Pink
    }
}

/// Rule color with the configured override applied
pub fn configured_color(rule: Rule, config: &MapConfig) -> Color {
    config
        .colors
        .get(rule.key())
        .and_then(|hex| Color::from_hex(hex))
        .unwrap_or_else(|| rule_color(rule))
}
