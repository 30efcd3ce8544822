//! # slip-restyle
//!
//! Re-render photos of payment slips and receipts onto a themed background,
//! keeping every piece of text where it was.
//!
//! ## Why this crate?
//!
//! A phone photo of a transfer slip is skewed, shadowed and cluttered. A
//! vision model can read the text *and* say where it sits; this crate takes
//! that positioned text and draws it again on a clean gradient canvas, so
//! the result looks designed while the layout still matches the original.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Recognize  vision LLM → positioned text (skipped if supplied)
//!  ├─ 3. Parse      tolerant JSON → fragments, or one fallback block
//!  ├─ 4. Theme      gradient + line texture at canvas size
//!  ├─ 5. Compose    fragments at percent positions, baseline y
//!  └─ 6. Encode     PNG bytes
//! ```
//!
//! Steps 4–6 are the deterministic core, exposed as [`process()`] and
//! [`Restyler`]; they never touch the network.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slip_restyle::{restyle, RestyleConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = RestyleConfig::builder().template_named("aurora")?.build()?;
//!     let output = restyle("slip.jpg", &config).await?;
//!     std::fs::write("slip.themed.png", &output.png)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slip-restyle` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod restyle;
pub mod template;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{RestyleConfig, RestyleConfigBuilder};
pub use error::{ConfigError, EncodeError, ProcessingError, RenderError, SlipError};
pub use model::{
    CanvasPolicy, CanvasSpec, Color, FontSizeClass, FontSizeMap, GradientDirection, GradientStop,
    RasterBuffer, TextAlign, TextFragment, ThemeSpec,
};
pub use output::{RestyleOutput, RestyleStats};
pub use pipeline::parse::FragmentBatch;
pub use process::{process, Restyler};
pub use progress::{NoopProgressCallback, ProgressCallback, RestyleProgressCallback, RestyleStage};
pub use restyle::{recognize_only, restyle, restyle_sync, restyle_to_file, restyle_with_fragments};
pub use template::Template;
