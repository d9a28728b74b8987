//! Output types for photo carbon analysis.
//!
//! Everything here is produced exclusively by the response normalizer
//! ([`crate::pipeline::normalize`]) and is guaranteed to satisfy its
//! invariants: scores lie in `[0, 1]`, magnitudes are non-negative,
//! `lifetime_total_kg_co2` is consistent with its inputs, and
//! `number_of_objects_detected` equals `objects.len()`. An
//! [`AnalysisResult`] is immutable after construction — render it, serialise
//! it, or discard it; there is nothing to tear down.

use serde::{Deserialize, Serialize};

/// A claimed citation backing a numeric estimate.
///
/// The normalizer never emits a `Source` with an out-of-range reliability
/// score or a non-parseable URL: fabricated or placeholder URLs are dropped
/// (the field becomes `None`) rather than failing the whole object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Citation name; never empty (a placeholder is substituted if missing).
    pub name: String,
    /// Claimed reliability in `[0, 1]`.
    pub reliability_score: f64,
    /// Publication year as text; defaults to the current year when absent.
    pub year_published: String,
    /// Validated http(s) URL, absent when unparseable or a placeholder domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// DOI, passed through unvalidated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

/// Emissions estimate for one detected object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonFootprint {
    /// One-time manufacturing emissions, kg CO2e. Always ≥ 0.
    pub manufacturing_kg_co2: f64,
    /// Recurring operational emissions, kg CO2e per day. Always ≥ 0.
    pub daily_operation_kg_co2: f64,
    /// Total lifetime emissions, kg CO2e.
    ///
    /// Always derived as `manufacturing + daily_operation * 365 * lifespan`,
    /// never trusted from the model — except for the standardized-human
    /// record, where a published constant is substituted wholesale.
    pub lifetime_total_kg_co2: f64,
    /// Model confidence in `[0, 1]`.
    pub confidence_score: f64,
    /// Human-readable derivation, synthesized from the clamped inputs.
    pub calculation_basis: String,
    /// Citations, in the order the model supplied them.
    pub sources: Vec<Source>,
    /// Trees needed to offset the lifetime total. Never zero: even a
    /// negligible footprint warrants a symbolic offset of one tree.
    pub trees_required: u64,
}

/// Assumptions behind one object's estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Assumed operational lifespan in years. Always ≥ 1.
    pub assumed_lifespan_years: f64,
    pub usage_assumptions: String,
    pub data_source: String,
    pub geographical_region: String,
    /// Methodology citation, validated like any [`Source`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methodology_source: Option<Source>,
}

/// One object the model detected in the photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub name: String,
    pub carbon_footprint: CarbonFootprint,
    pub metadata: ObjectMetadata,
}

/// The validated result of one analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Detected objects, in the order the model reported them.
    pub objects: Vec<DetectedObject>,
    /// RFC 3339 normalization time. Set by the normalizer, never by the model.
    pub timestamp: String,
    /// Model-reported photo quality, defaulted when absent.
    pub image_quality: String,
    /// Always recomputed as `objects.len()`; any model-supplied count is ignored.
    pub number_of_objects_detected: usize,
    /// Region the estimates assume.
    pub default_region: String,
    /// Model identifier that produced the raw payload.
    pub model_version: String,
    /// Run-level citations, validated like per-object sources.
    pub data_sources: Vec<Source>,
}

/// Accounting for one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Tokens sent to the model (prompt + image tiles).
    pub input_tokens: u64,
    /// Tokens the model generated.
    pub output_tokens: u64,
    /// Wall-clock time for the whole call, ms.
    pub total_duration_ms: u64,
    /// Time spent inside the model call, ms.
    pub llm_duration_ms: u64,
    /// Retries the model call needed before succeeding.
    pub retries: u8,
}

/// Result + accounting, as returned by the `analyze*` entry points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub result: AnalysisResult,
    pub stats: AnalysisStats,
}
