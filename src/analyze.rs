//! Analysis entry points.
//!
//! The primary operation is [`analyze`]: base64 photo in, validated
//! [`AnalysisOutput`] out. The other entry points are conveniences layered
//! on the same internal path — file and URL inputs go through the input and
//! encode stages first, `analyze_sync` wraps a runtime for blocking callers.
//!
//! Nothing here holds state between calls: the provider is resolved per call
//! (or supplied pre-built via the config), and each analysis is independent.

use crate::config::{AnalysisConfig, DEFAULT_MODEL};
use crate::error::AnalysisError;
use crate::output::{AnalysisOutput, AnalysisStats};
use crate::pipeline::{encode, input, llm, normalize};
use edgequake_llm::{ImageData, LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Analyze a base64-encoded photo.
///
/// This is the primary entry point for the library: it accepts the payload
/// exactly as a browser front-end produces it (a base64 JPEG from a canvas
/// capture) and performs no re-encoding.
///
/// # Errors
/// - [`AnalysisError::InvalidBase64`] — the payload is not base64
/// - [`AnalysisError::ResponseFormat`] / [`AnalysisError::Shape`] — the
///   model output could not be normalized into a result
/// - [`AnalysisError::Provider`] and friends — the outbound call failed
pub async fn analyze(
    image_base64: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let image = encode::image_data_from_base64(image_base64.as_ref())?;
    let provider = resolve_provider(config)?;
    run_with_provider(&provider, image, config).await
}

/// Analyze raw image bytes (any supported format).
///
/// The bytes are decoded, downscaled to the configured pixel cap, and
/// re-encoded as JPEG before upload.
pub async fn analyze_bytes(
    bytes: &[u8],
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let image = encode::prepare_image(bytes, config.max_image_pixels, config.jpeg_quality)?;
    let provider = resolve_provider(config)?;
    run_with_provider(&provider, image, config).await
}

/// Analyze a local image file.
pub async fn analyze_file(
    path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let path = path.as_ref();
    let path_str = path
        .to_str()
        .ok_or_else(|| AnalysisError::InvalidInput {
            input: path.to_string_lossy().into_owned(),
        })?;
    let bytes = input::read_local(path_str)?;
    analyze_bytes(&bytes, config).await
}

/// Analyze an image fetched from an HTTP/HTTPS URL.
pub async fn analyze_url(
    url: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let bytes = input::resolve_input(url.as_ref(), config.download_timeout_secs).await?;
    analyze_bytes(&bytes, config).await
}

/// Analyze a path-or-URL input string (the CLI's entry point).
pub async fn analyze_input(
    input_str: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let input_str = input_str.as_ref();
    let bytes = input::resolve_input(input_str, config.download_timeout_secs).await?;
    analyze_bytes(&bytes, config).await
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    image_base64: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AnalysisError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(image_base64, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Run the model call and normalization for one prepared image.
pub(crate) async fn run_with_provider(
    provider: &Arc<dyn LLMProvider>,
    image: ImageData,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let total_start = Instant::now();
    info!("Starting photo analysis");

    let raw = llm::request_analysis(provider, image, config).await?;
    debug!("Raw response: {} chars", raw.text.len());

    let result = normalize::normalize_response(&raw.text, config)?;

    let stats = AnalysisStats {
        input_tokens: raw.input_tokens,
        output_tokens: raw.output_tokens,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        llm_duration_ms: raw.duration_ms,
        retries: raw.retries,
    };

    info!(
        "Analysis complete: {} objects, {}ms total",
        result.number_of_objects_detected, stats.total_duration_ms
    );

    Ok(AnalysisOutput { result, stats })
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalysisError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// The four-level fallback chain lets library users and CLI users each set
/// exactly as much or as little as they need:
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed and
///    configured the provider entirely; we use it as-is. Useful in tests or
///    when the caller needs custom middleware (caching, rate-limiting).
///
/// 2. **Named provider + model** (`config.provider_name`) — the caller named
///    a provider (e.g. `"openai"`). The factory reads the corresponding API
///    key (`OPENAI_API_KEY`, etc.) from the environment.
///
/// 3. **Environment pair** (`CARBONLENS_LLM_PROVIDER` + `CARBONLENS_MODEL`) —
///    both set means the execution environment (shell script, CI) chose;
///    honoured before auto-detection so the choice wins even when multiple
///    API keys are present.
///
/// 4. **Full auto-detection** (`ProviderFactory::from_env`) — the factory
///    scans all known API key variables and picks the first available
///    provider, preferring OpenAI when its key is present.
pub(crate) fn resolve_provider(
    config: &AnalysisConfig,
) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    // 3) Environment pair
    if let (Ok(prov), Ok(model)) = (
        std::env::var("CARBONLENS_LLM_PROVIDER"),
        std::env::var("CARBONLENS_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    // Prefer OpenAI explicitly when an OpenAI API key is present, so users
    // with multiple provider keys get a deterministic default.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    // 4) Full auto-detection
    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalysisError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                 Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                 Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
