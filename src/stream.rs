//! Batch analysis API: emit results as each photo completes.
//!
//! ## Why stream?
//!
//! A single photo takes a handful of seconds; a folder of holiday snaps
//! takes minutes. A stream-based API lets callers display each result the
//! moment it is ready, wire up progress reporting, or write results to disk
//! incrementally instead of buffering the whole batch in memory.
//!
//! Unlike the single-shot [`crate::analyze::analyze_input`], which returns
//! only after one photo finishes, [`analyze_stream`] yields one item per
//! input as it completes. Items may arrive out of input order; each carries
//! its originating input string so callers can re-associate them. One bad
//! photo yields an `Err` item — it never aborts the rest of the batch.

use crate::analyze::{resolve_provider, run_with_provider};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::output::AnalysisOutput;
use crate::pipeline::{encode, input};
use edgequake_llm::LLMProvider;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-photo results, tagged with their input string.
pub type AnalysisStream =
    Pin<Box<dyn Stream<Item = (String, Result<AnalysisOutput, AnalysisError>)> + Send>>;

/// Analyze a batch of photos (paths and/or URLs), streaming results.
///
/// Up to `config.concurrency` model calls run at once. The provider is
/// resolved once for the whole batch.
///
/// # Returns
/// - `Ok(AnalysisStream)` — a stream of `(input, Result<AnalysisOutput, _>)`
/// - `Err(AnalysisError)` — the provider could not be resolved
pub fn analyze_stream(
    inputs: Vec<String>,
    config: &AnalysisConfig,
) -> Result<AnalysisStream, AnalysisError> {
    info!("Starting batch analysis of {} photos", inputs.len());

    let provider = resolve_provider(config)?;
    let concurrency = config.concurrency;
    let config = config.clone();

    let s = stream::iter(inputs.into_iter().map(move |input_str| {
        let provider = Arc::clone(&provider);
        let cfg = config.clone();
        async move {
            let outcome = analyze_one(&provider, &input_str, &cfg).await;
            (input_str, outcome)
        }
    }))
    .buffer_unordered(concurrency);

    Ok(Box::pin(s))
}

/// Resolve, prepare, and analyze one batch item.
async fn analyze_one(
    provider: &Arc<dyn LLMProvider>,
    input_str: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalysisError> {
    let bytes = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let image = encode::prepare_image(&bytes, config.max_image_pixels, config.jpeg_quality)?;
    run_with_provider(provider, image, config).await
}
