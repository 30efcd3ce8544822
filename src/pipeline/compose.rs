//! Layout compositor: draw recognised fragments onto a themed background.
//!
//! ## Rendering path
//!
//! All fragments of one call become a single SVG text layer sized to the
//! background. `usvg` shapes it against a shared font database and `resvg`
//! rasterises it onto a transparent `tiny-skia` pixmap, which is then
//! blended over the background only where glyphs have coverage. SVG paints
//! in document order, so list order is draw order and later fragments cover
//! earlier ones. Characters XML cannot carry are dropped from the layer.
//!
//! Positions are resolved against the *background's* pixel size. There is
//! no measurement-driven layout: no wrapping, no collision avoidance.
//! Fragments outside the canvas are still emitted and simply clipped.

use crate::config::RestyleConfig;
use crate::error::{ConfigError, RenderError};
use crate::model::{Color, FontSizeMap, RasterBuffer, TextAlign, TextFragment};
use image::Rgba;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::Pixmap;
use tracing::{debug, warn};
use usvg::{fontdb, Options, Tree};

/// Line advance for explicit `\n` breaks, as a multiple of the font size.
const LINE_HEIGHT: f32 = 1.2;

/// Resolve a fragment's percentage position to canvas pixels.
///
/// `x = 0, y = 0` maps to `(0, 0)` and `x = 100, y = 100` to
/// `(width, height)`. The result is signed: noisy recognizer output may sit
/// outside the canvas and is clipped at draw time, not rejected.
pub fn resolve_position(fragment: &TextFragment, width: u32, height: u32) -> (i64, i64) {
    let px = (fragment.x / 100.0 * width as f64).round() as i64;
    let py = (fragment.y / 100.0 * height as f64).round() as i64;
    (px, py)
}

/// Draws text fragments with one fixed style.
///
/// Immutable after construction and cheap to clone; one instance can serve
/// concurrent renders.
#[derive(Clone)]
pub struct Compositor {
    fontdb: Arc<fontdb::Database>,
    font_sizes: FontSizeMap,
    foreground: Color,
    font_family: String,
    default_align: TextAlign,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("font_faces", &self.fontdb.len())
            .field("font_sizes", &self.font_sizes)
            .field("foreground", &self.foreground)
            .field("font_family", &self.font_family)
            .field("default_align", &self.default_align)
            .finish()
    }
}

impl Compositor {
    /// Build a compositor from the text settings of `config`.
    ///
    /// Loads system fonts, then the configured font file (if any) on top.
    pub fn from_config(config: &RestyleConfig) -> Result<Self, ConfigError> {
        config.font_sizes.validate()?;
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        let loaded_family = match config.font_path.as_deref() {
            Some(path) => Some(load_font_file(&mut db, path)?),
            None => None,
        };
        bind_generic_families(&mut db, loaded_family.as_deref());
        debug!("Font database ready: {} faces", db.len());
        Ok(Self {
            fontdb: Arc::new(db),
            font_sizes: config.font_sizes,
            foreground: config.foreground,
            font_family: config.font_family.clone(),
            default_align: TextAlign::Center,
        })
    }

    /// Build a compositor around an existing font database.
    pub fn with_fontdb(
        fontdb: Arc<fontdb::Database>,
        font_sizes: FontSizeMap,
        foreground: Color,
        font_family: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        font_sizes.validate()?;
        Ok(Self {
            fontdb,
            font_sizes,
            foreground,
            font_family: font_family.into(),
            default_align: TextAlign::Center,
        })
    }

    /// Number of font faces available for shaping.
    pub fn font_face_count(&self) -> usize {
        self.fontdb.len()
    }

    pub fn font_sizes(&self) -> &FontSizeMap {
        &self.font_sizes
    }

    /// Draw `fragments` in order onto a copy of `background`.
    ///
    /// An empty list (or a zero-area background) returns an identical copy.
    pub fn composite(
        &self,
        background: &RasterBuffer,
        fragments: &[TextFragment],
    ) -> Result<RasterBuffer, RenderError> {
        let (width, height) = background.dimensions();
        let drawable = fragments.iter().filter(|f| !f.text.is_empty()).count();
        if drawable == 0 || width == 0 || height == 0 {
            return Ok(background.clone());
        }
        if self.fontdb.is_empty() {
            warn!("No fonts available; {} fragments will not be visible", drawable);
        }

        let svg = self.text_layer_svg(width, height, fragments);
        let options = Options {
            fontdb: Arc::clone(&self.fontdb),
            font_family: self.font_family.clone(),
            ..Options::default()
        };
        let tree = Tree::from_str(&svg, &options)
            .map_err(|e| RenderError::TextLayer(format!("SVG parse: {e}")))?;

        let mut layer = Pixmap::new(width, height).ok_or_else(|| {
            RenderError::TextLayer(format!("cannot allocate {width}x{height} pixmap"))
        })?;
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut layer.as_mut());

        let mut out = background.clone();
        let covered = blend_layer(&mut out, &layer);
        debug!(
            "Composited {} fragments onto {}x{} ({} px covered)",
            drawable, width, height, covered
        );
        Ok(out)
    }

    /// SVG document holding one `<text>` element per non-empty fragment.
    fn text_layer_svg(&self, width: u32, height: u32, fragments: &[TextFragment]) -> String {
        let fill = self.foreground.to_hex_rgb();
        let opacity = self.foreground.a as f32 / 255.0;
        let family = escape_xml(&self.font_family);

        let mut svg = String::with_capacity(256 + fragments.len() * 160);
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = height
        );
        for fragment in fragments.iter().filter(|f| !f.text.is_empty()) {
            let (px, py) = resolve_position(fragment, width, height);
            let size = self.font_sizes.resolve(fragment.font_size);
            let anchor = fragment.align.unwrap_or(self.default_align).svg_anchor();
            let _ = write!(
                svg,
                r#"<text x="{px}" y="{py}" font-size="{size}" font-family="{family}" fill="{fill}" fill-opacity="{opacity}" text-anchor="{anchor}" xml:space="preserve">"#,
            );
            push_lines(&mut svg, &fragment.text, px, size);
            svg.push_str("</text>");
        }
        svg.push_str("</svg>");
        svg
    }
}

/// First line inline, later lines as `<tspan>`s one line-height lower.
/// Blank lines only add to the next line's offset.
fn push_lines(svg: &mut String, text: &str, px: i64, size: f32) {
    let line_height = (size * LINE_HEIGHT * 100.0).round() / 100.0;
    let mut pending_dy = 0.0;
    for (idx, line) in text.split('\n').enumerate() {
        let line = line.trim_end_matches('\r');
        if idx == 0 {
            svg.push_str(&escape_xml(line));
            continue;
        }
        pending_dy += line_height;
        if line.is_empty() {
            continue;
        }
        let _ = write!(
            svg,
            r#"<tspan x="{px}" dy="{pending_dy}">{}</tspan>"#,
            escape_xml(line)
        );
        pending_dy = 0.0;
    }
}

/// Families tried, in order, for the generic `sans-serif`/`serif` names.
const PREFERRED_FAMILIES: [&str; 6] = [
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "Arial",
    "Helvetica",
    "Roboto",
];

/// Point the generic families at faces that exist on this host.
///
/// fontdb maps `sans-serif` to "Arial" out of the box. A user-supplied
/// font file wins over system choices.
fn bind_generic_families(db: &mut fontdb::Database, preferred: Option<&str>) {
    let has_family = |db: &fontdb::Database, name: &str| {
        db.faces()
            .any(|face| face.families.iter().any(|(family, _)| family == name))
    };
    let chosen = preferred
        .map(str::to_string)
        .or_else(|| {
            PREFERRED_FAMILIES
                .iter()
                .find(|name| has_family(db, **name))
                .map(|name| name.to_string())
        })
        .or_else(|| {
            db.faces()
                .next()
                .and_then(|face| face.families.first())
                .map(|(family, _)| family.clone())
        });
    if let Some(family) = chosen {
        debug!("Generic font families resolve to '{}'", family);
        db.set_sans_serif_family(family.clone());
        db.set_serif_family(family);
    }
}

/// Load a font file and return the family name of its first face.
fn load_font_file(db: &mut fontdb::Database, path: &Path) -> Result<String, ConfigError> {
    let data = std::fs::read(path).map_err(|e| ConfigError::FontLoad {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let before = db.len();
    db.load_font_data(data);
    if db.len() == before {
        return Err(ConfigError::FontLoad {
            path: path.to_path_buf(),
            detail: "no usable font faces in file".into(),
        });
    }
    debug!("Loaded {} faces from {}", db.len() - before, path.display());
    db.faces()
        .nth(before)
        .and_then(|face| face.families.first())
        .map(|(family, _)| family.clone())
        .ok_or_else(|| ConfigError::FontLoad {
            path: path.to_path_buf(),
            detail: "font face has no family name".into(),
        })
}

/// Source-over the premultiplied text layer onto `dst`.
///
/// Pixels with zero coverage are left untouched. Returns the number of
/// pixels written.
fn blend_layer(dst: &mut RasterBuffer, layer: &Pixmap) -> usize {
    let mut covered = 0;
    for (out, src) in dst.pixels_mut().zip(layer.pixels()) {
        let sa = src.alpha();
        if sa == 0 {
            continue;
        }
        covered += 1;
        if sa == 255 {
            *out = Rgba([src.red(), src.green(), src.blue(), 255]);
            continue;
        }
        let sa = sa as f32 / 255.0;
        let inv = 1.0 - sa;
        let [r, g, b, a] = out.0;
        let da = a as f32 / 255.0;
        let out_a = sa + da * inv;
        // Source channels are premultiplied; destination is straight alpha.
        let channel = |s: u8, d: u8| {
            let premul = s as f32 + d as f32 * da * inv;
            (premul / out_a).round().clamp(0.0, 255.0) as u8
        };
        *out = Rgba([
            channel(src.red(), r),
            channel(src.green(), g),
            channel(src.blue(), b),
            (out_a * 255.0).round() as u8,
        ]);
    }
    covered
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
    out
}

/// XML 1.0 `Char` production; anything else makes usvg reject the layer.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}')
        || c >= '\u{10000}'
}
