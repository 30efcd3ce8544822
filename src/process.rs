//! The render core: source photo + fragments → themed PNG bytes.
//!
//! ```text
//! source ──► canvas (policy) ──► background (theme) ──► composite ──► PNG
//!                                                       ▲
//!                            static labels + fragments ─┘
//! ```
//!
//! Pure and synchronous. No I/O, no network, no retry. Identical inputs give
//! byte-identical output. The async entry points in [`crate::restyle`] run
//! this on a blocking thread.

use crate::config::RestyleConfig;
use crate::error::ProcessingError;
use crate::model::{CanvasPolicy, RasterBuffer, TextFragment, ThemeSpec};
use crate::pipeline::compose::Compositor;
use crate::pipeline::{encode, theme};
use std::borrow::Cow;
use std::time::Instant;
use tracing::{debug, info};

/// Reusable render core.
///
/// Construction validates the configuration and loads fonts once; each
/// [`Restyler::process`] call is then independent.
#[derive(Debug, Clone)]
pub struct Restyler {
    theme: ThemeSpec,
    canvas_policy: CanvasPolicy,
    max_canvas_dimension: Option<u32>,
    static_fragments: Vec<TextFragment>,
    compositor: Compositor,
}

impl Restyler {
    pub fn new(config: &RestyleConfig) -> Result<Self, ProcessingError> {
        config.validate()?;
        let compositor = Compositor::from_config(config)?;
        Ok(Self::with_compositor(config, compositor))
    }

    /// Build with an already-loaded compositor (shared font database).
    pub fn with_compositor(config: &RestyleConfig, compositor: Compositor) -> Self {
        Self {
            theme: config.theme.clone(),
            canvas_policy: config.canvas_policy,
            max_canvas_dimension: config.max_canvas_dimension,
            static_fragments: config.static_fragments.clone(),
            compositor,
        }
    }

    pub fn canvas_policy(&self) -> CanvasPolicy {
        self.canvas_policy
    }

    /// Restyle `source` with the configured canvas policy.
    pub fn process(
        &self,
        source: &RasterBuffer,
        fragments: &[TextFragment],
    ) -> Result<Vec<u8>, ProcessingError> {
        self.process_with_policy(source, fragments, self.canvas_policy)
    }

    /// Restyle `source`, overriding the canvas policy for this call.
    pub fn process_with_policy(
        &self,
        source: &RasterBuffer,
        fragments: &[TextFragment],
        policy: CanvasPolicy,
    ) -> Result<Vec<u8>, ProcessingError> {
        let start = Instant::now();
        let canvas = policy.resolve(source, self.max_canvas_dimension)?;
        debug!(
            "Canvas {}x{} (source {}x{}, {:?})",
            canvas.width,
            canvas.height,
            source.width(),
            source.height(),
            policy
        );

        let background = theme::render_background(&canvas, &self.theme)?;

        let composited = self
            .compositor
            .composite(&background, &self.draw_order(fragments))?;

        let png = encode::encode_png(&composited)?;
        info!(
            "Rendered {}x{} with {} fragments → {} bytes in {}ms",
            canvas.width,
            canvas.height,
            fragments.len() + self.static_fragments.len(),
            png.len(),
            start.elapsed().as_millis()
        );
        Ok(png)
    }

    /// Static labels first so recognised fragments paint over them.
    fn draw_order<'a>(&'a self, fragments: &'a [TextFragment]) -> Cow<'a, [TextFragment]> {
        if self.static_fragments.is_empty() {
            return Cow::Borrowed(fragments);
        }
        let mut all = Vec::with_capacity(self.static_fragments.len() + fragments.len());
        all.extend_from_slice(&self.static_fragments);
        all.extend_from_slice(fragments);
        Cow::Owned(all)
    }
}

/// One-shot render: build a [`Restyler`] from `config` and run it once
/// with `policy`.
///
/// Prefer [`Restyler`] when rendering many photos; it loads fonts only once.
pub fn process(
    source: &RasterBuffer,
    fragments: &[TextFragment],
    policy: CanvasPolicy,
    config: &RestyleConfig,
) -> Result<Vec<u8>, ProcessingError> {
    Restyler::new(config)?.process_with_policy(source, fragments, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, EncodeError};
    use crate::model::{Color, FontSizeClass, GradientDirection};
    use image::{GenericImageView, Rgba, RgbaImage};

    fn photo(w: u32, h: u32) -> RasterBuffer {
        RgbaImage::from_pixel(w, h, Rgba([40, 40, 40, 255]))
    }

    fn flat_config(policy: CanvasPolicy) -> RestyleConfig {
        RestyleConfig::builder()
            .canvas_policy(policy)
            .theme(ThemeSpec::two_stop(
                Color::rgb(10, 20, 30),
                Color::rgb(10, 20, 30),
                GradientDirection::Vertical,
            ))
            .build()
            .unwrap()
    }

    fn decode(png: &[u8]) -> image::DynamicImage {
        image::load_from_memory_with_format(png, image::ImageFormat::Png).unwrap()
    }

    #[test]
    fn fixed_size_canvas_ignores_source_dimensions() {
        let policy = CanvasPolicy::FixedSize {
            width: 80,
            height: 120,
        };
        let config = flat_config(policy);
        let png = process(&photo(10, 10), &[], policy, &config).unwrap();
        assert_eq!(decode(&png).dimensions(), (80, 120));
    }

    #[test]
    fn match_source_uses_photo_size() {
        let config = flat_config(CanvasPolicy::MatchSource);
        let png = process(&photo(33, 21), &[], CanvasPolicy::MatchSource, &config).unwrap();
        assert_eq!(decode(&png).dimensions(), (33, 21));
    }

    #[test]
    fn max_dimension_caps_match_source() {
        let config = RestyleConfig::builder()
            .max_canvas_dimension(50)
            .build()
            .unwrap();
        let png = process(&photo(200, 100), &[], CanvasPolicy::MatchSource, &config).unwrap();
        assert_eq!(decode(&png).dimensions(), (50, 25));
    }

    #[test]
    fn empty_fragments_render_the_background_only() {
        let config = flat_config(CanvasPolicy::MatchSource);
        let png = process(&photo(8, 8), &[], CanvasPolicy::MatchSource, &config).unwrap();
        let img = decode(&png).to_rgba8();
        assert!(img.pixels().all(|p| *p == Rgba([10, 20, 30, 255])));
    }

    #[test]
    fn output_is_deterministic() {
        let config = RestyleConfig::default();
        let restyler = Restyler::new(&config).unwrap();
        let fragments = vec![TextFragment::new("Total 100", 50.0, 50.0, FontSizeClass::Large)];
        let a = restyler.process(&photo(64, 48), &fragments).unwrap();
        let b = restyler.process(&photo(64, 48), &fragments).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn single_stop_theme_is_rejected_before_drawing() {
        let mut config = RestyleConfig::default();
        config.theme.gradient_stops.truncate(1);
        let err = process(&photo(4, 4), &[], CanvasPolicy::MatchSource, &config).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::Config(ConfigError::InsufficientGradientStops { found: 1 })
        ));
    }

    #[test]
    fn zero_area_source_fails_under_match_source() {
        let config = RestyleConfig::default();
        let err = process(&RgbaImage::new(0, 5), &[], CanvasPolicy::MatchSource, &config)
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::Config(ConfigError::InvalidCanvas { .. })
        ));
    }

    #[test]
    fn oversized_fixed_canvas_is_a_config_error() {
        let policy = CanvasPolicy::FixedSize {
            width: u32::MAX,
            height: u32::MAX,
        };
        let err = process(&photo(4, 4), &[], policy, &RestyleConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::Config(ConfigError::InvalidCanvas { .. })
        ));
        assert!(RestyleConfig::builder().canvas_policy(policy).build().is_err());
    }

    #[test]
    fn static_labels_are_drawn_before_fragments() {
        let label = TextFragment::new("PAID", 50.0, 10.0, FontSizeClass::Small);
        let config = RestyleConfig::builder()
            .static_fragments(vec![label.clone()])
            .build()
            .unwrap();
        let restyler = Restyler::new(&config).unwrap();
        let amount = TextFragment::new("Rp 50.000", 50.0, 10.0, FontSizeClass::Large);
        let order = restyler.draw_order(std::slice::from_ref(&amount));
        assert_eq!(order.as_ref(), &[label, amount.clone()]);

        let bare = Restyler::new(&RestyleConfig::default()).unwrap();
        assert!(matches!(bare.draw_order(std::slice::from_ref(&amount)), Cow::Borrowed(_)));
    }

    #[test]
    fn encode_error_is_a_processing_error() {
        let e: ProcessingError = EncodeError::ZeroArea {
            width: 0,
            height: 0,
        }
        .into();
        assert!(matches!(e, ProcessingError::Encode(_)));
    }
}
