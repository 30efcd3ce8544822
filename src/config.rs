//! Configuration for a restyle run.
//!
//! Every knob lives in [`RestyleConfig`], built via its
//! [`RestyleConfigBuilder`]. Render settings (canvas policy, theme, font
//! sizes, colours) are plain data the caller supplies; none of them is a
//! constant inside the core. Recognizer settings only matter when fragments
//! are not supplied directly.

use crate::error::ConfigError;
use crate::model::{CanvasPolicy, CanvasSpec, Color, FontSizeMap, TextFragment, ThemeSpec};
use crate::progress::ProgressCallback;
use crate::template::Template;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for restyling one slip photo.
///
/// # Example
/// ```rust
/// use slip_restyle::{CanvasPolicy, RestyleConfig};
///
/// let config = RestyleConfig::builder()
///     .canvas_policy(CanvasPolicy::FixedSize { width: 800, height: 1200 })
///     .template_named("sunset")
///     .unwrap()
///     .build()
///     .unwrap();
/// assert_eq!(config.theme.gradient_stops.len(), 2);
/// ```
#[derive(Clone)]
pub struct RestyleConfig {
    // ── Render ───────────────────────────────────────────────────────────
    /// Canvas size source. Default: [`CanvasPolicy::MatchSource`].
    pub canvas_policy: CanvasPolicy,

    /// Caps the longest edge of a `MatchSource` canvas. Default: None.
    ///
    /// Phone photos are often 12 MP; a themed canvas that large costs
    /// ~48 MB of pixels for no visible gain.
    pub max_canvas_dimension: Option<u32>,

    /// Background theme. Default: purple → magenta diagonal.
    pub theme: ThemeSpec,

    /// Pixel size per size class. Default: 12 / 16 / 24.
    pub font_sizes: FontSizeMap,

    /// Text colour for every fragment. Default: white.
    pub foreground: Color,

    /// Font family requested for text. Default: `sans-serif`.
    pub font_family: String,

    /// Extra font file loaded on top of system fonts.
    pub font_path: Option<PathBuf>,

    /// Fixed labels drawn before the recognised fragments (template text).
    pub static_fragments: Vec<TextFragment>,

    /// Pre-recognised fragments. When set, the recognizer is skipped.
    pub fragments: Option<Vec<TextFragment>>,

    // ── Recognizer ───────────────────────────────────────────────────────
    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0 (transcription, not creativity).
    pub temperature: f32,

    /// Maximum tokens of the recognizer reply. Default: 2048.
    pub max_tokens: usize,

    /// Retries on a failed recognizer call. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per retry. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses the built-in prompt.
    pub system_prompt: Option<String>,

    /// Per-call recognizer timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    // ── Input / events ───────────────────────────────────────────────────
    /// Download timeout for URL inputs in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Stage events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RestyleConfig {
    fn default() -> Self {
        Self {
            canvas_policy: CanvasPolicy::default(),
            max_canvas_dimension: None,
            theme: ThemeSpec::default(),
            font_sizes: FontSizeMap::default(),
            foreground: Color::WHITE,
            font_family: "sans-serif".to_string(),
            font_path: None,
            static_fragments: Vec::new(),
            fragments: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 2048,
            max_retries: 2,
            retry_backoff_ms: 500,
            system_prompt: None,
            api_timeout_secs: 60,
            download_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RestyleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestyleConfig")
            .field("canvas_policy", &self.canvas_policy)
            .field("max_canvas_dimension", &self.max_canvas_dimension)
            .field("theme", &self.theme)
            .field("font_sizes", &self.font_sizes)
            .field("foreground", &self.foreground)
            .field("font_family", &self.font_family)
            .field("font_path", &self.font_path)
            .field("static_fragments", &self.static_fragments.len())
            .field("fragments", &self.fragments.as_ref().map(Vec::len))
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl RestyleConfig {
    /// Create a new builder for `RestyleConfig`.
    pub fn builder() -> RestyleConfigBuilder {
        RestyleConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check every render setting the core would otherwise reject mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.theme.validate()?;
        self.font_sizes.validate()?;
        if let CanvasPolicy::FixedSize { width, height } = self.canvas_policy {
            CanvasSpec::new(width, height)?;
        }
        if self.max_canvas_dimension == Some(0) {
            return Err(ConfigError::Invalid(
                "max canvas dimension must be ≥ 1".into(),
            ));
        }
        if self.font_family.trim().is_empty() {
            return Err(ConfigError::Invalid("font family is empty".into()));
        }
        Ok(())
    }
}

/// Builder for [`RestyleConfig`].
pub struct RestyleConfigBuilder {
    config: RestyleConfig,
}

impl fmt::Debug for RestyleConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestyleConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl RestyleConfigBuilder {
    pub fn canvas_policy(mut self, policy: CanvasPolicy) -> Self {
        self.config.canvas_policy = policy;
        self
    }

    pub fn max_canvas_dimension(mut self, px: u32) -> Self {
        self.config.max_canvas_dimension = Some(px);
        self
    }

    pub fn theme(mut self, theme: ThemeSpec) -> Self {
        self.config.theme = theme;
        self
    }

    /// Apply a template: its theme plus its static labels.
    pub fn template(mut self, template: Template) -> Self {
        self.config.theme = template.theme;
        self.config.static_fragments = template.fragments;
        self
    }

    /// Apply a built-in template by name.
    pub fn template_named(self, name: &str) -> Result<Self, ConfigError> {
        let template = Template::builtin(name).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "unknown template '{}' (available: {})",
                name,
                Template::names().join(", ")
            ))
        })?;
        Ok(self.template(template))
    }

    pub fn font_sizes(mut self, sizes: FontSizeMap) -> Self {
        self.config.font_sizes = sizes;
        self
    }

    pub fn foreground(mut self, color: Color) -> Self {
        self.config.foreground = color;
        self
    }

    pub fn font_family(mut self, family: impl Into<String>) -> Self {
        self.config.font_family = family.into();
        self
    }

    pub fn font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.font_path = Some(path.into());
        self
    }

    pub fn static_fragments(mut self, fragments: Vec<TextFragment>) -> Self {
        self.config.static_fragments = fragments;
        self
    }

    pub fn fragments(mut self, fragments: Vec<TextFragment>) -> Self {
        self.config.fragments = Some(fragments);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RestyleConfig, ConfigError> {
        self.config.validate()?;
        if self.config.max_tokens == 0 {
            return Err(ConfigError::Invalid("max tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
