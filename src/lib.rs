//! # carbonlens
//!
//! Estimate the carbon footprint of objects in a photo using Vision Language
//! Models (VLMs).
//!
//! ## Why this crate?
//!
//! Point a VLM at a photo and it will happily tell you a coffee mug emits
//! -3 kg of CO2 with confidence 1.4, citing `https://example.com/source`.
//! The model is a capable detector and a sloppy bookkeeper. This crate keeps
//! the detection and throws away the bookkeeping: every number in the raw
//! response is coerced, defaulted, and clamped by an explicit rule, every
//! derived quantity (lifetime total, tree offset) is recomputed from the
//! clamped inputs, and every citation URL is validated — so what comes out
//! is a record you can render without further checks.
//!
//! ## Pipeline Overview
//!
//! ```text
//! photo
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Encode     downscale, JPEG-encode, base64-wrap
//!  ├─ 3. VLM        one multimodal call to gpt-4.1-mini / claude / gemini / …
//!  ├─ 4. Normalize  parse, repair, clamp, derive (the core)
//!  └─ 5. Output     validated AnalysisResult + run stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use carbonlens::{analyze_file, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = AnalysisConfig::default();
//!     let output = analyze_file("desk.jpg", &config).await?;
//!     for obj in &output.result.objects {
//!         println!(
//!             "{}: {:.1} kg CO2e over its lifetime ({} trees to offset)",
//!             obj.name,
//!             obj.carbon_footprint.lifetime_total_kg_co2,
//!             obj.carbon_footprint.trees_required,
//!         );
//!     }
//!     eprintln!("tokens: {} in / {} out",
//!         output.stats.input_tokens,
//!         output.stats.output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `carbonlens` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! carbonlens = { version = "0.3", default-features = false }
//! ```
//!
//! ## Trust model
//!
//! The normalizer repairs *fields* and rejects *structure*: an out-of-range
//! score or a non-numeric magnitude is silently fixed (and logged at debug
//! level), but a response with no parseable JSON object, or an object with
//! no footprint record at all, aborts with a typed error. See
//! [`pipeline::normalize`] for the exact rules.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_bytes, analyze_file, analyze_input, analyze_sync, analyze_url};
pub use config::{AnalysisConfig, AnalysisConfigBuilder, OffsetModel, DEFAULT_MODEL};
pub use error::AnalysisError;
pub use output::{
    AnalysisOutput, AnalysisResult, AnalysisStats, CarbonFootprint, DetectedObject,
    ObjectMetadata, Source,
};
pub use pipeline::normalize::{is_standardized_human_record, normalize_response};
pub use stream::analyze_stream;
