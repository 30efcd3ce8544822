//! Recognizer boundary: send the slip photo to a vision LLM and collect its
//! raw reply.
//!
//! This is the only stage with network I/O and the only one that retries.
//! Transient provider failures (429, 5xx, timeouts) usually clear on their
//! own; the render core, by contrast, is deterministic and never retried.
//!
//! Backoff is exponential, `retry_backoff_ms * 2^(attempt-1)`: with the
//! defaults (500 ms, 2 retries) a failing call waits 500 ms then 1 s.

use crate::config::RestyleConfig;
use crate::error::SlipError;
use crate::prompts::{DEFAULT_RECOGNITION_PROMPT, RECOGNITION_USER_HINT};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Raw recognizer reply plus usage numbers.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub raw: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u32,
    pub duration_ms: u64,
}

/// Ask the provider for the positioned text of `image`.
///
/// ## Message Layout
/// 1. **System message**: the fragment-extraction prompt (or override)
/// 2. **User message**: a short instruction plus the photo attachment
pub async fn recognize(
    provider: &Arc<dyn LLMProvider>,
    image: ImageData,
    config: &RestyleConfig,
) -> Result<Recognition, SlipError> {
    let start = Instant::now();
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_RECOGNITION_PROMPT);

    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user_with_images(RECOGNITION_USER_HINT, vec![image]),
    ];
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs.max(1));

    let mut last_err: Option<String> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = backoff_ms(config.retry_backoff_ms, attempt);
            warn!(
                "Recognition: retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            if let Some(ref cb) = config.progress_callback {
                cb.on_recognition_retry(
                    attempt,
                    config.max_retries,
                    last_err.as_deref().unwrap_or("unknown error"),
                );
            }
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                debug!(
                    "Recognition: {} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens, response.completion_tokens, duration
                );
                return Ok(Recognition {
                    raw: response.content,
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                    retries: attempt,
                    duration_ms: duration.as_millis() as u64,
                });
            }
            Ok(Err(e)) => {
                let err_msg = format!("{}", e);
                warn!("Recognition: attempt {} failed: {}", attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
            Err(_) => {
                let err_msg = format!("timed out after {}s", call_timeout.as_secs());
                warn!("Recognition: attempt {} {}", attempt + 1, err_msg);
                last_err = Some(err_msg);
            }
        }
    }

    Err(SlipError::RecognitionFailed {
        retries: config.max_retries,
        detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
    })
}

fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Build `CompletionOptions` from the restyle config.
fn build_options(config: &RestyleConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, SlipError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SlipError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Resolve the vision provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`), API key read from
///    the provider's usual environment variable.
/// 3. **Environment pair** `SLIP_RESTYLE_PROVIDER` + `SLIP_RESTYLE_MODEL`.
/// 4. **`OPENAI_API_KEY`** present → OpenAI with the configured/default model.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &RestyleConfig) -> Result<Arc<dyn LLMProvider>, SlipError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("SLIP_RESTYLE_PROVIDER"),
        std::env::var("SLIP_RESTYLE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SlipError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY, or pass --fragments.\n\
                Error: {}",
                e
            ),
        })?;

    info!("Auto-detected recognizer provider");
    Ok(llm_provider)
}
