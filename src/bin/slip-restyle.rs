//! CLI binary for slip-restyle.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RestyleConfig` and writes the themed PNG.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use slip_restyle::{
    recognize_only, restyle_to_file, CanvasPolicy, Color, FontSizeMap, ProgressCallback,
    RestyleConfig, RestyleProgressCallback, RestyleStage, Template, TextFragment, ThemeSpec,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that prints one line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_message(stage: RestyleStage) -> &'static str {
    match stage {
        RestyleStage::Load => "Loading photo…",
        RestyleStage::Recognize => "Reading text with the vision model…",
        RestyleStage::Render => "Rendering themed image…",
    }
}

impl RestyleProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: RestyleStage) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message(stage_message(stage));
    }

    fn on_stage_complete(&self, stage: RestyleStage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<10} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_recognition_retry(&self, attempt: u32, max_retries: u32, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} retry {}/{}  {}",
            cyan("⚠"),
            attempt,
            max_retries,
            dim(&msg)
        ));
    }

    fn on_restyle_complete(&self, _png_len: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r##"EXAMPLES:
  # Restyle with the default theme (writes slip.themed.png)
  slip-restyle slip.jpg

  # Named template, explicit output path
  slip-restyle --template receipt-card slip.jpg -o receipt.png

  # Fixed 800x1200 canvas instead of the photo's size
  slip-restyle --width 800 --height 1200 slip.jpg

  # Skip the vision model: draw your own fragments
  slip-restyle --fragments fragments.json slip.jpg

  # Only print what the vision model read
  slip-restyle --recognize-only slip.jpg

  # Custom theme from JSON
  slip-restyle --theme '{"gradientStops":[{"offset":0,"color":"#0f172a"},{"offset":1,"color":"#334155"}],"direction":"vertical"}' slip.jpg

FRAGMENT JSON:
  [{"text": "Rp 150.000", "x": 50, "y": 42, "fontSize": "large"}, ...]
  x, y are percentages of the canvas; y is the text baseline.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  SLIP_RESTYLE_PROVIDER   Override provider (openai, anthropic, gemini, ollama)
  SLIP_RESTYLE_MODEL      Override model ID
"##;

/// Re-render photos of payment slips onto a themed background.
#[derive(Parser, Debug)]
#[command(
    name = "slip-restyle",
    version,
    about = "Re-render payment slip photos onto a themed background, keeping the text layout",
    long_about = "Read the text of a payment slip or receipt photo with a vision LLM, then draw \
it again at the same relative positions on a gradient background. Supports OpenAI, Anthropic, \
Google Gemini and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image path or HTTP/HTTPS URL.
    #[arg(required_unless_present = "list_templates")]
    input: Option<String>,

    /// Output PNG path. Default: <input stem>.themed.png
    #[arg(short, long, env = "SLIP_RESTYLE_OUTPUT")]
    output: Option<PathBuf>,

    /// Built-in template name (see --list-templates).
    #[arg(long, env = "SLIP_RESTYLE_TEMPLATE", conflicts_with = "theme")]
    template: Option<String>,

    /// Theme as inline JSON or a path to a JSON file.
    #[arg(long, env = "SLIP_RESTYLE_THEME")]
    theme: Option<String>,

    /// Fragments as inline JSON or a path to a JSON file; skips recognition.
    #[arg(long, env = "SLIP_RESTYLE_FRAGMENTS")]
    fragments: Option<String>,

    /// Fixed canvas width in pixels (requires --height).
    #[arg(long, env = "SLIP_RESTYLE_WIDTH", requires = "height",
          value_parser = clap::value_parser!(u32).range(1..))]
    width: Option<u32>,

    /// Fixed canvas height in pixels (requires --width).
    #[arg(long, env = "SLIP_RESTYLE_HEIGHT", requires = "width",
          value_parser = clap::value_parser!(u32).range(1..))]
    height: Option<u32>,

    /// Cap the longest edge when matching the photo size.
    #[arg(long, env = "SLIP_RESTYLE_MAX_DIMENSION",
          value_parser = clap::value_parser!(u32).range(1..))]
    max_dimension: Option<u32>,

    /// Pixel size of "small" text.
    #[arg(long, env = "SLIP_RESTYLE_FONT_SMALL", default_value_t = 12.0)]
    font_small: f32,

    /// Pixel size of "medium" text.
    #[arg(long, env = "SLIP_RESTYLE_FONT_MEDIUM", default_value_t = 16.0)]
    font_medium: f32,

    /// Pixel size of "large" text.
    #[arg(long, env = "SLIP_RESTYLE_FONT_LARGE", default_value_t = 24.0)]
    font_large: f32,

    /// Text colour as hex (#fff, #ffffff, #ffffffcc).
    #[arg(long, env = "SLIP_RESTYLE_FOREGROUND", default_value = "#ffffff")]
    foreground: Color,

    /// Font family for all text.
    #[arg(long, env = "SLIP_RESTYLE_FONT_FAMILY", default_value = "sans-serif")]
    font_family: String,

    /// Extra font file (TTF/OTF) loaded on top of system fonts.
    #[arg(long, env = "SLIP_RESTYLE_FONT")]
    font: Option<PathBuf>,

    /// Vision model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "SLIP_RESTYLE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "SLIP_RESTYLE_PROVIDER")]
    provider: Option<String>,

    /// Retries on recognizer failure.
    #[arg(long, env = "SLIP_RESTYLE_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Recognizer call timeout in seconds.
    #[arg(long, env = "SLIP_RESTYLE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "SLIP_RESTYLE_DOWNLOAD_TIMEOUT", default_value_t = 60)]
    download_timeout: u64,

    /// Print run stats (or recognised fragments) as JSON on stdout.
    #[arg(long, env = "SLIP_RESTYLE_JSON")]
    json: bool,

    /// Print the recognised fragments and exit without rendering.
    #[arg(long)]
    recognize_only: bool,

    /// List built-in templates and exit.
    #[arg(long)]
    list_templates: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "SLIP_RESTYLE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SLIP_RESTYLE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SLIP_RESTYLE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs out
    // of its way unless asked.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.list_templates {
        for name in Template::names() {
            println!("{name}");
        }
        return Ok(());
    }

    let input = cli
        .input
        .clone()
        .context("An input image path or URL is required")?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RestyleProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Recognize-only mode ──────────────────────────────────────────────
    if cli.recognize_only {
        let batch = recognize_only(&input, &config)
            .await
            .context("Recognition failed")?;
        let fallback = batch.is_fallback();
        let fragments = batch.into_fragments();
        println!(
            "{}",
            serde_json::to_string_pretty(&fragments).context("Failed to serialise fragments")?
        );
        if fallback && !cli.quiet {
            eprintln!(
                "{} reply was not a fragment list; shown as one block",
                cyan("⚠")
            );
        }
        return Ok(());
    }

    // ── Run restyle ──────────────────────────────────────────────────────
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&input));

    let stats = restyle_to_file(&input, &output_path, &config)
        .await
        .context("Restyle failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
        );
    } else if !cli.quiet {
        eprintln!(
            "{}  {} fragments  {}ms  →  {}",
            green("✔"),
            stats.fragment_count,
            stats.total_duration_ms,
            bold(&output_path.display().to_string()),
        );
        if stats.recognition_input_tokens > 0 {
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.recognition_input_tokens.to_string()),
                dim(&stats.recognition_output_tokens.to_string()),
            );
        }
    }

    Ok(())
}

/// Map CLI args to `RestyleConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RestyleConfig> {
    let font_sizes = FontSizeMap::new(cli.font_small, cli.font_medium, cli.font_large)
        .context("Invalid font sizes")?;

    let mut builder = RestyleConfig::builder()
        .font_sizes(font_sizes)
        .foreground(cli.foreground)
        .font_family(cli.font_family.clone())
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let (Some(width), Some(height)) = (cli.width, cli.height) {
        builder = builder.canvas_policy(CanvasPolicy::FixedSize { width, height });
    }
    if let Some(max) = cli.max_dimension {
        builder = builder.max_canvas_dimension(max);
    }
    if let Some(ref name) = cli.template {
        builder = builder.template_named(name).context("Invalid --template")?;
    }
    if let Some(ref theme) = cli.theme {
        let theme: ThemeSpec = load_json(theme).await.context("Invalid --theme")?;
        builder = builder.theme(theme);
    }
    if let Some(ref fragments) = cli.fragments {
        let fragments: Vec<TextFragment> =
            load_json(fragments).await.context("Invalid --fragments")?;
        builder = builder.fragments(fragments);
    }
    if let Some(ref font) = cli.font {
        builder = builder.font_path(font);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Parse `arg` as inline JSON, or read it as a path to a JSON file.
async fn load_json<T: serde::de::DeserializeOwned>(arg: &str) -> Result<T> {
    let trimmed = arg.trim_start();
    let text = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        arg.to_string()
    } else {
        tokio::fs::read_to_string(arg)
            .await
            .with_context(|| format!("Failed to read {:?}", arg))?
    };
    serde_json::from_str(&text).context("Malformed JSON")
}

/// `<dir>/<stem>.themed.png` next to a local input, or in the working
/// directory for URLs.
fn default_output_path(input: &str) -> PathBuf {
    let is_url = input.starts_with("http://") || input.starts_with("https://");
    let name = input
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|s| s.split(['?', '#']).next().unwrap_or(s))
        .unwrap_or("");
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("slip");
    let file = format!("{stem}.themed.png");
    if is_url {
        PathBuf::from(file)
    } else {
        Path::new(input)
            .parent()
            .map(|p| p.join(&file))
            .unwrap_or_else(|| PathBuf::from(&file))
    }
}
