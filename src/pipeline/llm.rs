//! Model interaction: build the vision request and call the provider.
//!
//! This module converts a prepared photo into a multimodal API call and
//! returns the raw response text. It is intentionally thin — all prompt
//! engineering lives in [`crate::prompts`] and all payload interpretation in
//! [`crate::pipeline::normalize`], so retry and timeout logic here can change
//! without touching either.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! concurrent load. Exponential backoff (`retry_backoff_ms * 2^attempt`)
//! avoids thundering-herd: with 500 ms base and 3 retries the wait sequence
//! is 500 ms → 1 s → 2 s, totalling < 4 s of back-off per photo.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::prompts::{region_context, ANALYSIS_REQUEST, DEFAULT_SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// The raw, un-normalized outcome of one model call.
#[derive(Debug, Clone)]
pub struct RawAnalysis {
    /// Verbatim model output; may be fenced, prose-wrapped, or malformed.
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub duration_ms: u64,
    pub retries: u8,
}

/// Send one photo to the model and return its raw text response.
///
/// ## Message Layout
///
/// 1. **System message** — the analysis prompt (or user-supplied override)
/// 2. **Region message** — the configured default-region assumption
/// 3. **User message** — one sentence plus the photo as a base64 attachment
///
/// Transient failures are retried with exponential backoff. The per-attempt
/// timeout counts as a failed attempt, not an immediate abort; exhaustion
/// surfaces as [`AnalysisError::ApiTimeout`] when the final attempt timed
/// out, otherwise as [`AnalysisError::Provider`].
pub async fn request_analysis(
    provider: &Arc<dyn LLMProvider>,
    image: ImageData,
    config: &AnalysisConfig,
) -> Result<RawAnalysis, AnalysisError> {
    let start = Instant::now();
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::system(region_context(&config.default_region)),
        ChatMessage::user_with_images(ANALYSIS_REQUEST, vec![image]),
    ];

    let options = build_options(config);
    let mut last_err: Option<String> = None;
    let mut last_was_timeout = false;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Analysis retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        let call = provider.chat(&messages, Some(&options));
        match timeout(Duration::from_secs(config.api_timeout_secs), call).await {
            Err(_) => {
                warn!(
                    "Attempt {} timed out after {}s",
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = Some(format!("timed out after {}s", config.api_timeout_secs));
                last_was_timeout = true;
            }
            Ok(Err(e)) => {
                let err_msg = format!("{}", e);
                warn!("Attempt {} failed — {}", attempt + 1, err_msg);
                last_err = Some(err_msg);
                last_was_timeout = false;
            }
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                debug!(
                    "Model call: {} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens, response.completion_tokens, duration
                );
                return Ok(RawAnalysis {
                    text: response.content,
                    input_tokens: response.prompt_tokens as u64,
                    output_tokens: response.completion_tokens as u64,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt as u8,
                });
            }
        }
    }

    if last_was_timeout {
        return Err(AnalysisError::ApiTimeout {
            secs: config.api_timeout_secs,
        });
    }
    Err(AnalysisError::Provider {
        retries: config.max_retries,
        detail: last_err.unwrap_or_else(|| "unknown error".to_string()),
    })
}

/// Build `CompletionOptions` from the analysis config.
fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = AnalysisConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(4096));
    }
}
