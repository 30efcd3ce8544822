//! Themed background synthesis: linear gradient plus optional line texture.
//!
//! Pure function of `(CanvasSpec, ThemeSpec)`: no randomness, no clock, so
//! identical inputs give byte-identical buffers. The gradient axis follows a
//! canvas `createLinearGradient` from the origin to the far corner (or edge),
//! sampled at pixel centres.

use crate::error::ConfigError;
use crate::model::{CanvasSpec, Color, GradientDirection, GradientStop, RasterBuffer, ThemeSpec};
use image::Rgba;
use tracing::debug;

/// Render a `spec.width × spec.height` background for `theme`.
///
/// # Errors
/// [`ConfigError`] for a zero-area or oversized canvas, fewer than two stops, a
/// non-finite stop offset or an out-of-range texture opacity. Nothing is
/// drawn when validation fails.
pub fn render_background(spec: &CanvasSpec, theme: &ThemeSpec) -> Result<RasterBuffer, ConfigError> {
    spec.validate()?;
    theme.validate()?;

    let stops = theme.normalised_stops();
    let (w, h) = (spec.width, spec.height);
    let axis = GradientAxis::new(theme.direction, w, h);

    let mut buffer = RasterBuffer::from_fn(w, h, |x, y| {
        sample_gradient(&stops, axis.position(x, y)).to_rgba()
    });

    if theme.has_texture() {
        draw_texture_lines(&mut buffer, theme);
    }

    debug!(
        "Rendered {}x{} background ({} stops, {:?}, texture={})",
        w,
        h,
        stops.len(),
        theme.direction,
        theme.has_texture()
    );
    Ok(buffer)
}

/// Maps a pixel to its position `t` along the gradient axis.
#[derive(Debug, Clone, Copy)]
struct GradientAxis {
    direction: GradientDirection,
    w: f32,
    h: f32,
    diag_len_sq: f32,
}

impl GradientAxis {
    fn new(direction: GradientDirection, w: u32, h: u32) -> Self {
        let (w, h) = (w as f32, h as f32);
        Self {
            direction,
            w,
            h,
            diag_len_sq: w * w + h * h,
        }
    }

    fn position(&self, x: u32, y: u32) -> f32 {
        let cx = x as f32 + 0.5;
        let cy = y as f32 + 0.5;
        match self.direction {
            GradientDirection::Horizontal => cx / self.w,
            GradientDirection::Vertical => cy / self.h,
            GradientDirection::Diagonal => (cx * self.w + cy * self.h) / self.diag_len_sq,
        }
    }
}

/// Colour at `t` for stops already clamped and sorted.
fn sample_gradient(stops: &[GradientStop], t: f32) -> Color {
    let first = stops[0];
    let last = stops[stops.len() - 1];
    if t <= first.offset {
        return first.color;
    }
    if t >= last.offset {
        return last.color;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = b.offset - a.offset;
            if span <= f32::EPSILON {
                return b.color;
            }
            return lerp_color(a.color, b.color, (t - a.offset) / span);
        }
    }
    last.color
}

fn lerp_color(a: Color, b: Color, t: f32) -> Color {
    let mix = |from: u8, to: u8| (from as f32 + (to as f32 - from as f32) * t).round() as u8;
    Color::rgba(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b), mix(a.a, b.a))
}

/// Blend a 1 px horizontal line every `texture_line_spacing_px` rows.
fn draw_texture_lines(buffer: &mut RasterBuffer, theme: &ThemeSpec) {
    let spacing = theme.texture_line_spacing_px as usize;
    let color = theme.texture_color;
    let alpha = theme.texture_opacity * (color.a as f32 / 255.0);
    let height = buffer.height();
    for y in (0..height).step_by(spacing) {
        for x in 0..buffer.width() {
            let dst = buffer.get_pixel_mut(x, y);
            *dst = blend_over(*dst, color, alpha);
        }
    }
}

/// Source-over of an opaque-coloured source at coverage `alpha`.
fn blend_over(dst: Rgba<u8>, src: Color, alpha: f32) -> Rgba<u8> {
    let inv = 1.0 - alpha;
    let [r, g, b, a] = dst.0;
    let channel = |s: u8, d: u8| (s as f32 * alpha + d as f32 * inv).round() as u8;
    let out_a = (255.0 * alpha + a as f32 * inv).round() as u8;
    Rgba([channel(src.r, r), channel(src.g, g), channel(src.b, b), out_a])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(w: u32, h: u32) -> CanvasSpec {
        CanvasSpec::new(w, h).unwrap()
    }

    #[test]
    fn oversized_canvas_errors_instead_of_allocating() {
        let huge = CanvasSpec {
            width: u32::MAX,
            height: u32::MAX,
        };
        assert!(matches!(
            render_background(&huge, &ThemeSpec::default()),
            Err(ConfigError::InvalidCanvas { .. })
        ));
    }

    fn black_to_white(direction: GradientDirection) -> ThemeSpec {
        ThemeSpec::two_stop(Color::BLACK, Color::WHITE, direction)
    }

    #[test]
    fn buffer_matches_canvas_size() {
        let bg = render_background(&spec(800, 1200), &ThemeSpec::default()).unwrap();
        assert_eq!(bg.dimensions(), (800, 1200));
    }

    #[test]
    fn rendering_is_idempotent() {
        let theme = ThemeSpec::default().with_texture(6, 0.1);
        let a = render_background(&spec(64, 48), &theme).unwrap();
        let b = render_background(&spec(64, 48), &theme).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn single_stop_is_rejected() {
        let mut theme = ThemeSpec::default();
        theme.gradient_stops.truncate(1);
        assert_eq!(
            render_background(&spec(10, 10), &theme),
            Err(ConfigError::InsufficientGradientStops { found: 1 })
        );
    }

    #[test]
    fn zero_area_canvas_is_rejected() {
        let zero = CanvasSpec {
            width: 0,
            height: 10,
        };
        assert!(matches!(
            render_background(&zero, &ThemeSpec::default()),
            Err(ConfigError::InvalidCanvas { .. })
        ));
    }

    #[test]
    fn horizontal_gradient_is_constant_per_column() {
        let bg = render_background(&spec(16, 8), &black_to_white(GradientDirection::Horizontal))
            .unwrap();
        for x in 0..16 {
            let top = bg.get_pixel(x, 0);
            for y in 1..8 {
                assert_eq!(bg.get_pixel(x, y), top);
            }
        }
        assert!(bg.get_pixel(0, 0).0[0] < bg.get_pixel(15, 0).0[0]);
    }

    #[test]
    fn vertical_gradient_is_constant_per_row() {
        let bg =
            render_background(&spec(8, 16), &black_to_white(GradientDirection::Vertical)).unwrap();
        for y in 0..16 {
            let left = bg.get_pixel(0, y);
            for x in 1..8 {
                assert_eq!(bg.get_pixel(x, y), left);
            }
        }
        assert!(bg.get_pixel(0, 0).0[0] < bg.get_pixel(0, 15).0[0]);
    }

    #[test]
    fn diagonal_runs_corner_to_corner() {
        let bg = render_background(&spec(100, 150), &ThemeSpec::default()).unwrap();
        let purple = Color::rgb(0x7c, 0x3a, 0xed);
        let magenta = Color::rgb(0xc0, 0x26, 0xd3);
        let dist = |p: &Rgba<u8>, c: Color| {
            (p.0[0] as i32 - c.r as i32).abs()
                + (p.0[1] as i32 - c.g as i32).abs()
                + (p.0[2] as i32 - c.b as i32).abs()
        };
        let tl = bg.get_pixel(0, 0);
        let br = bg.get_pixel(99, 149);
        assert!(dist(tl, purple) < dist(tl, magenta));
        assert!(dist(br, magenta) < dist(br, purple));
        assert!(dist(tl, purple) <= 3, "top-left {:?}", tl);
        assert!(dist(br, magenta) <= 3, "bottom-right {:?}", br);
    }

    #[test]
    fn unsorted_out_of_range_stops_match_normalised() {
        let messy = ThemeSpec {
            gradient_stops: vec![
                GradientStop::new(2.0, Color::WHITE),
                GradientStop::new(-1.0, Color::BLACK),
            ],
            ..black_to_white(GradientDirection::Horizontal)
        };
        let clean = black_to_white(GradientDirection::Horizontal);
        let a = render_background(&spec(32, 4), &messy).unwrap();
        let b = render_background(&spec(32, 4), &clean).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn three_stops_pass_through_middle_colour() {
        let theme = ThemeSpec {
            gradient_stops: vec![
                GradientStop::new(0.0, Color::BLACK),
                GradientStop::new(0.5, Color::rgb(255, 0, 0)),
                GradientStop::new(1.0, Color::BLACK),
            ],
            ..black_to_white(GradientDirection::Horizontal)
        };
        // Column 50 of 101 has its centre exactly at t = 0.5.
        let bg = render_background(&spec(101, 1), &theme).unwrap();
        assert_eq!(bg.get_pixel(50, 0), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn texture_lines_every_spacing_rows() {
        let theme = ThemeSpec::two_stop(Color::BLACK, Color::BLACK, GradientDirection::Vertical)
            .with_texture(4, 1.0);
        let bg = render_background(&spec(5, 13), &theme).unwrap();
        for y in 0..13 {
            let expected = if y % 4 == 0 { 255 } else { 0 };
            for x in 0..5 {
                assert_eq!(bg.get_pixel(x, y).0[0], expected, "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn zero_spacing_or_opacity_disables_texture() {
        let plain = ThemeSpec::two_stop(Color::BLACK, Color::BLACK, GradientDirection::Vertical);
        let base = render_background(&spec(4, 4), &plain).unwrap();
        for theme in [plain.clone().with_texture(0, 0.8), plain.clone().with_texture(2, 0.0)] {
            let bg = render_background(&spec(4, 4), &theme).unwrap();
            assert_eq!(bg.as_raw(), base.as_raw());
        }
    }

    #[test]
    fn partial_opacity_blends() {
        let theme = ThemeSpec::two_stop(Color::BLACK, Color::BLACK, GradientDirection::Vertical)
            .with_texture(2, 0.5);
        let bg = render_background(&spec(1, 2), &theme).unwrap();
        assert_eq!(bg.get_pixel(0, 0), &Rgba([128, 128, 128, 255]));
        assert_eq!(bg.get_pixel(0, 1), &Rgba([0, 0, 0, 255]));
    }
}
