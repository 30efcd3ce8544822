//! Error types for the slip-restyle library.
//!
//! The render core and the edge around it fail in different ways:
//!
//! * [`ProcessingError`]: the **core** (theme → compose → encode) rejected
//!   its inputs or could not produce a PNG. It wraps [`ConfigError`],
//!   [`RenderError`] and [`EncodeError`] so callers match on one type.
//!   The core is deterministic: replaying the same inputs fails the same way.
//!
//! * [`SlipError`]: **fatal** edge failures of a full run (input not found,
//!   not an image, recognizer unreachable, output not writable). Returned by
//!   the `restyle*` entry points; core failures arrive as
//!   [`SlipError::Processing`].
//!
//! No variant ever carries partial output.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid theme, canvas or compositor configuration.
///
/// Detected before any pixel is drawn.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A gradient needs at least two stops to interpolate between.
    #[error("Gradient needs at least 2 stops, got {found}")]
    InsufficientGradientStops { found: usize },

    /// A stop offset is NaN or infinite and cannot be clamped.
    #[error("Gradient stop {index} has a non-finite offset")]
    InvalidGradientStop { index: usize },

    /// Texture opacity must lie in `[0, 1]`.
    #[error("Texture opacity must be within 0.0–1.0, got {value}")]
    InvalidTextureOpacity { value: f32 },

    /// Canvas with a zero or oversized edge.
    #[error("Canvas edges must be within 1..=16384 pixels, got {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },

    /// Font sizes must be positive and strictly increase small < medium < large.
    #[error("Font sizes must satisfy 0 < small < medium < large, got {small}/{medium}/{large}")]
    NonMonotonicFontSizes { small: f32, medium: f32, large: f32 },

    /// A configured font file could not be read.
    #[error("Failed to load font '{path}': {detail}")]
    FontLoad { path: PathBuf, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The text layer could not be rasterised onto the background.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Failed to rasterise text layer: {0}")]
    TextLayer(String),
}

/// The composited buffer could not be serialised to PNG.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// PNG cannot represent an image without pixels.
    #[error("Cannot encode a zero-area buffer ({width}x{height})")]
    ZeroArea { width: u32, height: u32 },

    #[error("PNG encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Single discriminated failure of [`crate::process::process`].
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// All fatal errors returned by the `restyle*` entry points.
#[derive(Debug, Error)]
pub enum SlipError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a usable path nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes are not in a raster format we can decode.
    #[error("Input is not a supported image: '{source_name}'\nFirst bytes: {magic:?}")]
    NotAnImage { source_name: String, magic: [u8; 4] },

    /// The format was recognised but decoding failed (truncated, corrupt).
    #[error("Failed to decode image '{source_name}': {detail}")]
    DecodeFailed { source_name: String, detail: String },

    // ── Recognizer errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every recognition attempt failed.
    #[error("Text recognition failed after {retries} retries: {detail}")]
    RecognitionFailed { retries: u32, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the output PNG file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Core ──────────────────────────────────────────────────────────────
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConfigError> for SlipError {
    fn from(e: ConfigError) -> Self {
        SlipError::Processing(ProcessingError::Config(e))
    }
}
