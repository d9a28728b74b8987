//! Error types for the carbonlens library.
//!
//! One enum, [`AnalysisError`], covers every failure the library can return.
//! The variants are grouped by the layer that produces them so callers can
//! drive differentiated UX: input problems are the user's to fix,
//! [`AnalysisError::ResponseFormat`] / [`AnalysisError::Shape`] mean the
//! model produced an unusable payload (retrying the photo may help), and the
//! provider variants mean the outbound call itself failed (network, auth,
//! quota).
//!
//! Field-level repairs — an out-of-range confidence score, a non-numeric
//! footprint magnitude, a fabricated citation URL — are deliberately NOT
//! errors. The normalizer fixes them in place and records the repair at
//! debug level; only missing *structure* aborts an analysis.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the carbonlens library.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes exist and were read, but are not a supported image format.
    #[error("'{input}' is not a supported image (JPEG or PNG expected): {detail}")]
    NotAnImage { input: String, detail: String },

    // ── Image preparation errors ──────────────────────────────────────────
    /// The supplied payload is not valid base64.
    #[error("Image payload is not valid base64: {0}")]
    InvalidBase64(String),

    /// The image bytes could not be decoded.
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    /// The image could not be re-encoded for upload.
    #[error("Failed to encode image for upload: {0}")]
    ImageEncode(String),

    // ── Model response errors ─────────────────────────────────────────────
    /// The raw model output is not, and does not contain, a JSON object of
    /// the expected shape.
    #[error(
        "Model response could not be parsed as an analysis payload: {detail}\n\
         Response began with: {snippet:?}\n\
         Retrying the photo usually resolves this."
    )]
    ResponseFormat { detail: String, snippet: String },

    /// A detected object is missing a required sub-structure entirely.
    ///
    /// Present-but-malformed fields are repaired in place; a wholly absent
    /// footprint record cannot be synthesized and aborts the analysis.
    #[error(
        "Detected object {index} ('{name}') has no {missing} record.\n\
         Partial objects are not repaired; the analysis was discarded."
    )]
    Shape {
        index: usize,
        name: String,
        missing: &'static str,
    },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model invocation failed after all retries.
    #[error("Model call failed after {retries} retries: {detail}")]
    Provider { retries: u32, detail: String },

    /// The model invocation timed out — the caller may retry.
    #[error("Model call timed out after {secs}s\nIncrease --api-timeout or try a faster model.")]
    ApiTimeout { secs: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
