//! Integration tests for slip-restyle.
//!
//! Everything here runs offline: fragments are supplied directly so the
//! recognizer is never called. The one live test is gated behind the
//! `E2E_ENABLED` environment variable and a local photo.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};
use slip_restyle::pipeline::compose::Compositor;
use slip_restyle::{
    process, restyle, restyle_to_file, restyle_with_fragments, CanvasPolicy, Color, ConfigError,
    FontSizeClass, GradientDirection, ProcessingError, RestyleConfig, Restyler, SlipError,
    TextFragment, ThemeSpec,
};
use std::path::PathBuf;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs through the test harness (`RUST_LOG=debug` to see them).
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn photo(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 90, 255]))
}

fn write_photo(dir: &TempDir, name: &str, w: u32, h: u32) -> String {
    let path = dir.path().join(name);
    photo(w, h).save(&path).unwrap();
    path.to_string_lossy().into_owned()
}

fn decode(png: &[u8]) -> RgbaImage {
    image::load_from_memory_with_format(png, ImageFormat::Png)
        .unwrap()
        .to_rgba8()
}

fn slip_fragments() -> Vec<TextFragment> {
    vec![
        TextFragment::new("Transfer Successful", 50.0, 10.0, FontSizeClass::Large),
        TextFragment::new("Rp 150.000", 50.0, 42.0, FontSizeClass::Large),
        TextFragment::new("Ref 8812 0043 1177", 50.0, 60.0, FontSizeClass::Medium),
        TextFragment::new("Keep this receipt", 50.0, 95.0, FontSizeClass::Small),
    ]
}

/// Skip text-pixel assertions on hosts without any system font.
macro_rules! skip_without_fonts {
    () => {{
        let compositor = Compositor::from_config(&RestyleConfig::default()).unwrap();
        if compositor.font_face_count() == 0 {
            println!("SKIP: no system fonts available");
            return;
        }
    }};
}

// ── Core ─────────────────────────────────────────────────────────────────────

#[test]
fn test_fixed_canvas_800x1200() {
    let policy = CanvasPolicy::FixedSize {
        width: 800,
        height: 1200,
    };
    let config = RestyleConfig::builder().canvas_policy(policy).build().unwrap();
    let png = process(&photo(300, 200), &slip_fragments(), policy, &config).unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    let img = image::load_from_memory(&png).unwrap();
    assert_eq!(img.dimensions(), (800, 1200));
}

#[test]
fn test_empty_fragments_are_byte_identical_across_calls() {
    let config = RestyleConfig::default();
    let restyler = Restyler::new(&config).unwrap();
    let source = photo(120, 90);
    let a = restyler.process(&source, &[]).unwrap();
    let b = restyler.process(&source, &[]).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_empty_fragments_equal_plain_background() {
    let theme = ThemeSpec::two_stop(
        Color::rgb(0x7c, 0x3a, 0xed),
        Color::rgb(0xc0, 0x26, 0xd3),
        GradientDirection::Diagonal,
    );
    let config = RestyleConfig::builder().theme(theme.clone()).build().unwrap();
    let png = process(&photo(64, 64), &[], CanvasPolicy::MatchSource, &config).unwrap();
    let expected = slip_restyle::pipeline::theme::render_background(
        &slip_restyle::CanvasSpec::new(64, 64).unwrap(),
        &theme,
    )
    .unwrap();
    assert_eq!(decode(&png), expected);
}

#[test]
fn test_single_gradient_stop_is_a_config_error() {
    let mut config = RestyleConfig::default();
    config.theme.gradient_stops.truncate(1);
    let err = process(&photo(10, 10), &[], CanvasPolicy::MatchSource, &config).unwrap_err();
    assert!(matches!(
        err,
        ProcessingError::Config(ConfigError::InsufficientGradientStops { found: 1 })
    ));
}

#[test]
fn test_match_source_round_trips_dimensions() {
    let config = RestyleConfig::default();
    for (w, h) in [(1, 1), (37, 211), (640, 480)] {
        let png = process(&photo(w, h), &[], CanvasPolicy::MatchSource, &config).unwrap();
        assert_eq!(decode(&png).dimensions(), (w, h));
    }
}

#[test]
fn test_fragments_outside_canvas_are_clipped_not_rejected() {
    let config = RestyleConfig::default();
    let fragments = vec![
        TextFragment::new("left", -20.0, 50.0, FontSizeClass::Medium),
        TextFragment::new("below", 50.0, 140.0, FontSizeClass::Large),
    ];
    let png = process(&photo(50, 50), &fragments, CanvasPolicy::MatchSource, &config).unwrap();
    assert_eq!(decode(&png).dimensions(), (50, 50));
}

#[test]
fn test_text_changes_pixels_near_its_anchor() {
    skip_without_fonts!();
    let theme = ThemeSpec::two_stop(Color::BLACK, Color::BLACK, GradientDirection::Vertical);
    let config = RestyleConfig::builder().theme(theme).build().unwrap();
    let fragments = vec![TextFragment::new("WWWW", 50.0, 50.0, FontSizeClass::Large)];
    let png = process(&photo(200, 100), &fragments, CanvasPolicy::MatchSource, &config).unwrap();
    let img = decode(&png);

    let lit_above_baseline = (30..50)
        .flat_map(|y| (70..130).map(move |x| (x, y)))
        .any(|(x, y)| img.get_pixel(x, y)[0] > 128);
    assert!(lit_above_baseline, "expected white glyph pixels above y=50");

    let far_corner = img.get_pixel(2, 2);
    assert_eq!(far_corner, &Rgba([0, 0, 0, 255]));
}

#[test]
fn test_total_is_centred_on_its_anchor_at_800x1200() {
    skip_without_fonts!();
    let theme = ThemeSpec::two_stop(Color::BLACK, Color::BLACK, GradientDirection::Vertical);
    let policy = CanvasPolicy::FixedSize {
        width: 800,
        height: 1200,
    };
    let config = RestyleConfig::builder().theme(theme).build().unwrap();
    let fragments = vec![TextFragment::new("TOTAL", 50.0, 50.0, FontSizeClass::Large)];
    let img = decode(&process(&photo(10, 10), &fragments, policy, &config).unwrap());

    let lit: Vec<(u32, u32)> = img
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] > 64)
        .map(|(x, y, _)| (x, y))
        .collect();
    assert!(!lit.is_empty(), "no glyph pixels drawn");
    let min_x = lit.iter().map(|p| p.0).min().unwrap();
    let max_x = lit.iter().map(|p| p.0).max().unwrap();
    let min_y = lit.iter().map(|p| p.1).min().unwrap();
    let max_y = lit.iter().map(|p| p.1).max().unwrap();

    let centre_x = (min_x + max_x) as f64 / 2.0;
    assert!((centre_x - 400.0).abs() <= 4.0, "centre x {centre_x}");
    // Capitals sit on the baseline at y = 600.
    assert!(max_y <= 601, "ink below baseline: {max_y}");
    assert!(min_y < 600);
    let ink_height = max_y - min_y + 1;
    assert!((12..=26).contains(&ink_height), "ink height {ink_height}");
}

// ── Edge entry points ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_restyle_with_fragments_from_file() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let input = write_photo(&dir, "slip.png", 90, 160);
    let out = restyle_with_fragments(&input, slip_fragments(), &RestyleConfig::default())
        .await
        .unwrap();
    assert_eq!((out.width, out.height), (90, 160));
    assert_eq!(out.fragments.len(), 4);
    assert!(!out.fallback_used);
    assert_eq!(decode(&out.png).dimensions(), (90, 160));
}

#[tokio::test]
async fn test_restyle_with_template_keeps_caller_fragment_count() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("slip.jpg");
    image::DynamicImage::ImageRgba8(photo(40, 60))
        .to_rgb8()
        .save(&path)
        .unwrap();
    let input = path.to_string_lossy().into_owned();
    let config = RestyleConfig::builder()
        .template_named("receipt-card")
        .unwrap()
        .fragments(slip_fragments())
        .build()
        .unwrap();
    let out = restyle(&input, &config).await.unwrap();
    assert_eq!(out.stats.fragment_count, 4);
}

#[tokio::test]
async fn test_restyle_to_file_leaves_no_temp_file() {
    let dir = TempDir::new().unwrap();
    let input = write_photo(&dir, "slip.png", 30, 30);
    let out_path = dir.path().join("nested").join("slip.themed.png");
    let config = RestyleConfig::builder()
        .canvas_policy(CanvasPolicy::FixedSize {
            width: 80,
            height: 120,
        })
        .fragments(slip_fragments())
        .build()
        .unwrap();
    restyle_to_file(&input, &out_path, &config).await.unwrap();

    let written = std::fs::read(&out_path).unwrap();
    assert_eq!(decode(&written).dimensions(), (80, 120));
    let leftovers: Vec<_> = std::fs::read_dir(out_path.parent().unwrap())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "temp files left: {leftovers:?}");
}

#[test]
fn test_restyle_blocks_on_current_thread() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let input = write_photo(&dir, "slip.png", 24, 24);
    let out = tokio_test::block_on(restyle_with_fragments(
        &input,
        vec![TextFragment::new("OK", 50.0, 50.0, FontSizeClass::Small)],
        &RestyleConfig::default(),
    ))
    .unwrap();
    assert_eq!((out.width, out.height), (24, 24));
}

#[tokio::test]
async fn test_non_image_input_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"definitely not pixels").unwrap();
    let err = restyle_with_fragments(path.to_str().unwrap(), vec![], &RestyleConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SlipError::NotAnImage { .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_blank_input_is_invalid() {
    let err = restyle_with_fragments("   ", vec![], &RestyleConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SlipError::InvalidInput { .. }));
}

// ── Live recognizer (opt-in) ─────────────────────────────────────────────────

#[tokio::test]
async fn test_live_recognition_on_sample_slip() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run live recognizer tests");
        return;
    }
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/slip.jpg");
    if !path.exists() {
        println!("SKIP: sample photo not found: {}", path.display());
        return;
    }
    let out = restyle(path.to_string_lossy(), &RestyleConfig::default())
        .await
        .unwrap();
    assert!(!out.fragments.is_empty());
    assert!(out.stats.recognition_output_tokens > 0);
}
