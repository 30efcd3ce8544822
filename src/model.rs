//! Value types shared by every stage of the render core.
//!
//! Positions are percentages, never pixels: a fragment recognised on a
//! 3024×4032 photo must land in the same relative spot on an 800×1200
//! themed canvas. They are resolved against the *target* canvas only inside
//! [`crate::pipeline::compose`].

use crate::error::ConfigError;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// In-memory pixel grid (straight-alpha RGBA8) owned by one render pass.
pub type RasterBuffer = RgbaImage;

// ── Text fragments ───────────────────────────────────────────────────────

/// Coarse size hint emitted by the recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSizeClass {
    Small,
    #[default]
    Medium,
    Large,
}

/// Horizontal anchoring of a fragment relative to its resolved `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Start,
    #[default]
    Center,
    End,
}

impl TextAlign {
    /// The matching SVG `text-anchor` keyword.
    pub fn svg_anchor(self) -> &'static str {
        match self {
            TextAlign::Start => "start",
            TextAlign::Center => "middle",
            TextAlign::End => "end",
        }
    }
}

/// One recognised piece of text and its relative placement.
///
/// `y` is the text **baseline**, not the top of the glyph box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    /// Percent of canvas width from the left edge, nominally `0..=100`.
    pub x: f64,
    /// Percent of canvas height from the top edge, nominally `0..=100`.
    pub y: f64,
    #[serde(
        default,
        rename = "fontSize",
        alias = "fontSizeClass",
        alias = "font_size"
    )]
    pub font_size: FontSizeClass,
    /// Per-fragment override of the compositor's default alignment.
    /// Recognizers never send it; templates may.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<TextAlign>,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, x: f64, y: f64, font_size: FontSizeClass) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            font_size,
            align: None,
        }
    }

    pub fn with_align(mut self, align: TextAlign) -> Self {
        self.align = Some(align);
        self
    }
}

// ── Canvas ───────────────────────────────────────────────────────────────

/// Output raster dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
}

/// Longest canvas edge accepted, in pixels.
pub const MAX_CANVAS_EDGE: u32 = 16_384;

impl CanvasSpec {
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        let spec = Self { width, height };
        spec.validate()?;
        Ok(spec)
    }

    /// Both edges within `1..=MAX_CANVAS_EDGE` and the RGBA buffer
    /// addressable on this platform.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (width, height) = (self.width, self.height);
        let edge_ok = |v: u32| (1..=MAX_CANVAS_EDGE).contains(&v);
        let edges_ok = edge_ok(width) && edge_ok(height);
        let bytes = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(4));
        if !edges_ok || bytes.is_none() {
            return Err(ConfigError::InvalidCanvas { width, height });
        }
        Ok(())
    }
}

/// Where the output canvas size comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CanvasPolicy {
    /// Fixed template size, independent of the photo.
    FixedSize { width: u32, height: u32 },
    /// The source photo's natural dimensions (default).
    #[default]
    MatchSource,
}

impl CanvasPolicy {
    /// Resolve the canvas for a given source image.
    ///
    /// `max_dimension` caps the longest edge of a `MatchSource` canvas,
    /// scaling the other edge proportionally. Fixed sizes are never scaled.
    pub fn resolve(
        &self,
        source: &RasterBuffer,
        max_dimension: Option<u32>,
    ) -> Result<CanvasSpec, ConfigError> {
        match *self {
            CanvasPolicy::FixedSize { width, height } => CanvasSpec::new(width, height),
            CanvasPolicy::MatchSource => {
                let (w, h) = source.dimensions();
                if w == 0 || h == 0 {
                    return Err(ConfigError::InvalidCanvas {
                        width: w,
                        height: h,
                    });
                }
                let spec = CanvasSpec {
                    width: w,
                    height: h,
                };
                let spec = match max_dimension {
                    Some(cap) if cap > 0 && w.max(h) > cap => cap_longest_edge(spec, cap),
                    _ => spec,
                };
                spec.validate()?;
                Ok(spec)
            }
        }
    }
}

fn cap_longest_edge(spec: CanvasSpec, cap: u32) -> CanvasSpec {
    let longest = spec.width.max(spec.height) as f64;
    let scale = cap as f64 / longest;
    let scaled = |v: u32| ((v as f64 * scale).round() as u32).clamp(1, cap);
    CanvasSpec {
        width: scaled(spec.width),
        height: scaled(spec.height),
    }
}

// ── Colour ───────────────────────────────────────────────────────────────

/// RGBA8 colour, written and parsed as hex (`#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }

    /// `#rrggbb`, ignoring alpha (SVG paints carry opacity separately).
    pub fn to_hex_rgb(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "{}", self.to_hex_rgb())
        } else {
            write!(f, "{}{:02x}", self.to_hex_rgb(), self.a)
        }
    }
}

impl FromStr for Color {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || ConfigError::Invalid(format!("invalid colour '{s}'"));
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).map(|v| v * 17);
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        let parsed = match hex.len() {
            3 => (nibble(0), nibble(1), nibble(2), Ok(255)),
            4 => (nibble(0), nibble(1), nibble(2), nibble(3)),
            6 => (byte(0), byte(2), byte(4), Ok(255)),
            8 => (byte(0), byte(2), byte(4), byte(6)),
            _ => return Err(invalid()),
        };
        match parsed {
            (Ok(r), Ok(g), Ok(b), Ok(a)) => Ok(Color { r, g, b, a }),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_string()
    }
}

// ── Theme ────────────────────────────────────────────────────────────────

/// Axis of the background gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientDirection {
    /// Top-left → bottom-right.
    #[default]
    Diagonal,
    /// Top → bottom.
    Vertical,
    /// Left → right.
    Horizontal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    /// Position along the gradient axis, `0.0..=1.0` (clamped at render time).
    pub offset: f32,
    pub color: Color,
}

impl GradientStop {
    pub fn new(offset: f32, color: Color) -> Self {
        Self { offset, color }
    }
}

/// Decorative elements of a themed background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSpec {
    pub gradient_stops: Vec<GradientStop>,
    /// Distance between texture lines. `0` disables the texture.
    #[serde(default)]
    pub texture_line_spacing_px: u32,
    /// Texture line opacity, `0.0..=1.0`. `0.0` disables the texture.
    #[serde(default)]
    pub texture_opacity: f32,
    #[serde(default = "default_texture_color")]
    pub texture_color: Color,
    #[serde(default)]
    pub direction: GradientDirection,
}

fn default_texture_color() -> Color {
    Color::WHITE
}

impl ThemeSpec {
    /// A plain two-stop gradient without texture.
    pub fn two_stop(from: Color, to: Color, direction: GradientDirection) -> Self {
        Self {
            gradient_stops: vec![GradientStop::new(0.0, from), GradientStop::new(1.0, to)],
            texture_line_spacing_px: 0,
            texture_opacity: 0.0,
            texture_color: Color::WHITE,
            direction,
        }
    }

    pub fn with_texture(mut self, spacing_px: u32, opacity: f32) -> Self {
        self.texture_line_spacing_px = spacing_px;
        self.texture_opacity = opacity;
        self
    }

    /// Reject themes the renderer cannot draw.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gradient_stops.len() < 2 {
            return Err(ConfigError::InsufficientGradientStops {
                found: self.gradient_stops.len(),
            });
        }
        if let Some(index) = self
            .gradient_stops
            .iter()
            .position(|s| !s.offset.is_finite())
        {
            return Err(ConfigError::InvalidGradientStop { index });
        }
        if !(0.0..=1.0).contains(&self.texture_opacity) {
            return Err(ConfigError::InvalidTextureOpacity {
                value: self.texture_opacity,
            });
        }
        Ok(())
    }

    /// Stops with offsets clamped to `[0, 1]`, stably sorted ascending.
    pub fn normalised_stops(&self) -> Vec<GradientStop> {
        let mut stops: Vec<GradientStop> = self
            .gradient_stops
            .iter()
            .map(|s| GradientStop::new(s.offset.clamp(0.0, 1.0), s.color))
            .collect();
        stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        stops
    }

    pub fn has_texture(&self) -> bool {
        self.texture_opacity > 0.0 && self.texture_line_spacing_px > 0
    }
}

impl Default for ThemeSpec {
    /// Purple → magenta diagonal.
    fn default() -> Self {
        Self::two_stop(
            Color::rgb(0x7c, 0x3a, 0xed),
            Color::rgb(0xc0, 0x26, 0xd3),
            GradientDirection::Diagonal,
        )
    }
}

// ── Font sizes ───────────────────────────────────────────────────────────

/// Pixel font size per [`FontSizeClass`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FontSizeMap {
    pub small: f32,
    pub medium: f32,
    pub large: f32,
}

impl Default for FontSizeMap {
    fn default() -> Self {
        Self {
            small: 12.0,
            medium: 16.0,
            large: 24.0,
        }
    }
}

impl FontSizeMap {
    pub fn new(small: f32, medium: f32, large: f32) -> Result<Self, ConfigError> {
        let map = Self {
            small,
            medium,
            large,
        };
        map.validate()?;
        Ok(map)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [self.small, self.medium, self.large]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.small <= 0.0 || self.small >= self.medium || self.medium >= self.large {
            return Err(ConfigError::NonMonotonicFontSizes {
                small: self.small,
                medium: self.medium,
                large: self.large,
            });
        }
        Ok(())
    }

    pub fn resolve(&self, class: FontSizeClass) -> f32 {
        match class {
            FontSizeClass::Small => self.small,
            FontSizeClass::Medium => self.medium,
            FontSizeClass::Large => self.large,
        }
    }
}
