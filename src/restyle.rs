//! End-to-end entry points: input → (recognize) → render → PNG.
//!
//! The render core is CPU-bound and runs under `spawn_blocking`; recognition
//! is the only awaited network call. When the config already carries
//! fragments the recognizer (and its API key) is never touched.

use crate::config::RestyleConfig;
use crate::error::SlipError;
use crate::model::{CanvasPolicy, TextFragment};
use crate::output::{RestyleOutput, RestyleStats};
use crate::pipeline::parse::{self, FragmentBatch};
use crate::pipeline::{encode, input, recognize};
use crate::process::Restyler;
use crate::progress::RestyleStage;
use image::DynamicImage;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Restyle a slip photo (local path or HTTP/HTTPS URL).
///
/// Uses `config.fragments` when present; otherwise asks the configured
/// vision provider for the positioned text.
///
/// # Errors
/// Input, recognizer and core failures, all fatal. Nothing partial is
/// returned.
pub async fn restyle(
    input_str: impl AsRef<str>,
    config: &RestyleConfig,
) -> Result<RestyleOutput, SlipError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting restyle: {}", input_str);

    // Fail on a bad theme before spending a download or an API call.
    config.validate()?;

    let source = load(input_str, config).await?;
    let mut stats = RestyleStats::default();

    let batch = match config.fragments.clone() {
        Some(fragments) => {
            debug!("Using {} supplied fragments", fragments.len());
            FragmentBatch::Structured(fragments)
        }
        None => recognize_fragments(&source, config, &mut stats).await?,
    };

    let mut output = render(source, batch, config.canvas_policy, config, stats).await?;
    output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Restyle complete: {}x{}, {} fragments, {}ms total",
        output.width, output.height, output.stats.fragment_count, output.stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_restyle_complete(output.png.len());
    }
    Ok(output)
}

/// Restyle with explicit fragments, skipping recognition entirely.
pub async fn restyle_with_fragments(
    input_str: impl AsRef<str>,
    fragments: Vec<TextFragment>,
    config: &RestyleConfig,
) -> Result<RestyleOutput, SlipError> {
    let mut config = config.clone();
    config.fragments = Some(fragments);
    restyle(input_str, &config).await
}

/// Restyle and write the PNG to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn restyle_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &RestyleConfig,
) -> Result<RestyleStats, SlipError> {
    let output = restyle(input_str, config).await?;
    let path = output_path.as_ref();
    let write_err = |e| SlipError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("png.tmp");
    tokio::fs::write(&tmp_path, &output.png)
        .await
        .map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }

    Ok(output.stats)
}

/// Synchronous wrapper around [`restyle`].
///
/// Creates a temporary tokio runtime internally.
pub fn restyle_sync(
    input_str: impl AsRef<str>,
    config: &RestyleConfig,
) -> Result<RestyleOutput, SlipError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SlipError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(restyle(input_str, config))
}

/// Only recognize: return the parsed fragments without rendering.
pub async fn recognize_only(
    input_str: impl AsRef<str>,
    config: &RestyleConfig,
) -> Result<FragmentBatch, SlipError> {
    let source = load(input_str.as_ref(), config).await?;
    let mut stats = RestyleStats::default();
    recognize_fragments(&source, config, &mut stats).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn load(input_str: &str, config: &RestyleConfig) -> Result<DynamicImage, SlipError> {
    let cb = config.progress_callback.as_ref();
    let start = Instant::now();
    if let Some(cb) = cb {
        cb.on_stage_start(RestyleStage::Load);
    }
    let loaded = input::resolve_input(input_str, config.download_timeout_secs).await?;
    info!(
        "Loaded {:?} image {}x{}",
        loaded.format,
        loaded.width(),
        loaded.height()
    );
    if let Some(cb) = cb {
        cb.on_stage_complete(RestyleStage::Load, start.elapsed().as_millis() as u64);
    }
    Ok(loaded.image)
}

async fn recognize_fragments(
    source: &DynamicImage,
    config: &RestyleConfig,
    stats: &mut RestyleStats,
) -> Result<FragmentBatch, SlipError> {
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_stage_start(RestyleStage::Recognize);
    }

    let provider = recognize::resolve_provider(config)?;
    let image = encode::encode_for_recognizer(source)
        .map_err(|e| SlipError::Internal(format!("Failed to encode image for recognizer: {e}")))?;
    let recognition = recognize::recognize(&provider, image, config).await?;

    stats.recognition_input_tokens = recognition.input_tokens as u64;
    stats.recognition_output_tokens = recognition.output_tokens as u64;
    stats.recognition_retries = recognition.retries;
    stats.recognize_duration_ms = recognition.duration_ms;

    let batch = parse::parse_fragments(&recognition.raw);
    if batch.is_fallback() {
        warn!("Recognizer reply was not a fragment list; drawing it as a single block");
    } else {
        debug!("Recognizer returned {} fragments", batch.len());
    }

    if let Some(cb) = cb {
        cb.on_stage_complete(RestyleStage::Recognize, recognition.duration_ms);
    }
    Ok(batch)
}

async fn render(
    source: DynamicImage,
    batch: FragmentBatch,
    policy: CanvasPolicy,
    config: &RestyleConfig,
    mut stats: RestyleStats,
) -> Result<RestyleOutput, SlipError> {
    let cb = config.progress_callback.clone();
    if let Some(ref cb) = cb {
        cb.on_stage_start(RestyleStage::Render);
    }
    let start = Instant::now();

    let fallback_used = batch.is_fallback();
    let fragments = batch.into_fragments();
    // The blocking task only needs render settings.
    let config = RestyleConfig {
        provider: None,
        progress_callback: None,
        fragments: None,
        ..config.clone()
    };

    let (png, fragments) = tokio::task::spawn_blocking(move || {
        let restyler = Restyler::new(&config)?;
        let png = restyler.process_with_policy(&source.to_rgba8(), &fragments, policy)?;
        Ok::<_, SlipError>((png, fragments))
    })
    .await
    .map_err(|e| SlipError::Internal(format!("Render task panicked: {}", e)))??;

    let (width, height) = png_dimensions(&png)?;
    let render_ms = start.elapsed().as_millis() as u64;
    if let Some(ref cb) = cb {
        cb.on_stage_complete(RestyleStage::Render, render_ms);
    }

    stats.fragment_count = fragments.len();
    stats.render_duration_ms = render_ms;

    Ok(RestyleOutput {
        png,
        width,
        height,
        fragments,
        fallback_used,
        stats,
    })
}

fn png_dimensions(png: &[u8]) -> Result<(u32, u32), SlipError> {
    let reader = image::ImageReader::with_format(std::io::Cursor::new(png), image::ImageFormat::Png);
    reader
        .into_dimensions()
        .map_err(|e| SlipError::Internal(format!("Rendered PNG is unreadable: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FontSizeClass;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn write_photo(dir: &TempDir, w: u32, h: u32) -> String {
        let path = dir.path().join("slip.png");
        RgbaImage::from_pixel(w, h, Rgba([200, 200, 200, 255]))
            .save(&path)
            .unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn supplied_fragments_skip_recognition() {
        let dir = TempDir::new().unwrap();
        let input = write_photo(&dir, 40, 30);
        let fragments = vec![TextFragment::new("Rp 50.000", 50.0, 50.0, FontSizeClass::Large)];
        let out = restyle_with_fragments(&input, fragments, &RestyleConfig::default())
            .await
            .unwrap();
        assert_eq!((out.width, out.height), (40, 30));
        assert_eq!(out.stats.fragment_count, 1);
        assert!(!out.fallback_used);
        assert_eq!(out.stats.recognition_input_tokens, 0);
    }

    #[tokio::test]
    async fn missing_input_is_file_not_found() {
        let err = restyle_with_fragments("/no/such/slip.jpg", vec![], &RestyleConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SlipError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn invalid_theme_fails_before_loading() {
        let mut config = RestyleConfig::default();
        config.theme.gradient_stops.clear();
        let err = restyle_with_fragments("/no/such/slip.jpg", vec![], &config)
            .await
            .unwrap_err();
        assert!(matches!(err, SlipError::Processing(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn restyle_to_file_writes_atomically() {
        let dir = TempDir::new().unwrap();
        let input = write_photo(&dir, 16, 16);
        let out_path = dir.path().join("out").join("themed.png");
        let config = RestyleConfig::builder().fragments(vec![]).build().unwrap();
        let stats = restyle_to_file(&input, &out_path, &config).await.unwrap();
        assert_eq!(stats.fragment_count, 0);
        assert!(out_path.exists());
        assert!(!out_path.with_extension("png.tmp").exists());
    }

    #[test]
    fn png_dimensions_reads_header() {
        let img = RgbaImage::new(7, 3);
        let png = encode::encode_png(&img).unwrap();
        assert_eq!(png_dimensions(&png).unwrap(), (7, 3));
    }
}
