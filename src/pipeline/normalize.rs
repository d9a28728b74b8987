//! Response normalization: untrusted model output → bounded, consistent record.
//!
//! ## Why is normalization necessary?
//!
//! Even well-prompted VLMs routinely produce payloads that are *semantically
//! plausible* but *numerically untrustworthy*:
//!
//! - Wrapping the JSON in ` ```json ... ``` ` fences or polite prose despite
//!   the prompt saying "output only the JSON object"
//! - Confidence scores of 1.4, negative manufacturing footprints, numbers
//!   delivered as strings
//! - Lifetime totals that contradict their own manufacturing and daily
//!   figures
//! - Citations pointing at `example.com` or other invented URLs
//!
//! This module is the single trust boundary between the model and the rest
//! of the application. Every scalar is coerced, defaulted, and clamped by a
//! declarative rule; every derived quantity is recomputed from the clamped
//! inputs; every citation URL is validated. Field-level repairs never fail —
//! they are logged at debug level. Only missing *structure* (no parseable
//! object, an object with no footprint record at all) aborts the analysis.
//!
//! The pass is single-shot and stateless: normalizing an already-normalized
//! payload reproduces it exactly.

use crate::config::{AnalysisConfig, OffsetModel};
use crate::error::AnalysisError;
use crate::output::{AnalysisResult, CarbonFootprint, DetectedObject, ObjectMetadata, Source};
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;
use url::Url;

// ── Canonical values ─────────────────────────────────────────────────────────

/// Lifetime emissions of an average person, kg CO2e (global average:
/// ~4.7 t/year over a ~72-year life expectancy).
const HUMAN_LIFETIME_KG_CO2: f64 = 340_000.0;
/// Daily emissions of an average person, kg CO2e.
const HUMAN_DAILY_KG_CO2: f64 = 12.8;
/// Confidence assigned to the standardized record; a published global
/// average, not a per-image guess.
const HUMAN_CONFIDENCE: f64 = 0.95;
const HUMAN_SOURCE_NAME: &str = "Global Carbon Budget — per-capita emissions";
const HUMAN_SOURCE_URL: &str = "https://globalcarbonbudget.org";
const HUMAN_SOURCE_YEAR: &str = "2023";
const HUMAN_SOURCE_RELIABILITY: f64 = 0.97;

/// Phrases in `data_source` / `geographical_region` that mark a
/// standardized-human record. Matched case-insensitively.
///
/// TODO: replace with a structured tag once the prompt can be migrated —
/// free-text matching misfires on any object whose metadata happens to
/// contain a trigger phrase.
const HUMAN_TRIGGERS: &[&str] = &[
    "standardized human",
    "standardised human",
    "global standardized",
];

/// Domains that mark a fabricated citation URL.
const PLACEHOLDER_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "placeholder.com",
    "via.placeholder.com",
    "dummyimage.com",
    "yoursource.com",
    "localhost",
];

const DEFAULT_SOURCE_NAME: &str = "Unnamed source";
const DEFAULT_USAGE: &str = "Typical daily usage";
const DEFAULT_DATA_SOURCE: &str = "Model estimate";
const DEFAULT_IMAGE_QUALITY: &str = "unspecified";
const DEFAULT_OBJECT_NAME: &str = "Unidentified object";
const DEFAULT_MODEL_VERSION: &str = "unreported";

// ── Numeric rules ────────────────────────────────────────────────────────────

/// Declarative bounds for one class of scalar field.
///
/// A field that coerces to a finite number is clamped into `[min, max]`;
/// anything else falls back to `min`. Keeping the policy in three consts
/// (rather than ad hoc branches) makes the clamp/default table auditable in
/// one glance and testable in isolation.
#[derive(Clone, Copy, Debug)]
struct NumericRule {
    min: f64,
    max: f64,
}

/// Footprint magnitudes: non-negative, unbounded above, default 0.
const MAGNITUDE: NumericRule = NumericRule {
    min: 0.0,
    max: f64::INFINITY,
};
/// Confidence / reliability scores: `[0, 1]`, default 0.
const SCORE: NumericRule = NumericRule { min: 0.0, max: 1.0 };
/// Lifespans: at least one year, default 1.
const LIFESPAN: NumericRule = NumericRule {
    min: 1.0,
    max: f64::INFINITY,
};

impl NumericRule {
    /// Coerce, default, and clamp one scalar field.
    fn apply(&self, name: &str, value: &Value) -> f64 {
        match coerce_number(value) {
            Some(n) => {
                let clamped = n.clamp(self.min, self.max);
                if clamped != n {
                    debug!(field = name, raw = n, clamped, "clamped out-of-range field");
                }
                clamped
            }
            None => {
                if !value.is_null() {
                    debug!(field = name, raw = %value, fallback = self.min, "defaulted non-numeric field");
                }
                self.min
            }
        }
    }
}

/// JSON number, or a numeric string, to a finite f64.
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

// ── Field accessors ──────────────────────────────────────────────────────────

static JSON_NULL: Value = Value::Null;

/// Key lookup that treats "absent" and "null" identically.
fn field<'a>(obj: &'a Value, key: &str) -> &'a Value {
    obj.get(key).unwrap_or(&JSON_NULL)
}

/// Non-empty trimmed text, or the fallback. Bare numbers (e.g. a year
/// supplied as `2021`) are rendered as text rather than discarded.
fn text_or(value: &Value, fallback: &str) -> String {
    match value {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => fallback.to_string(),
    }
}

/// Non-empty trimmed text, or absent.
fn opt_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

// ── Step 1: extraction ───────────────────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n(.*)\n```\s*$").unwrap());

/// Strip one outer markdown code fence, if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(trimmed),
        None => trimmed,
    }
}

/// Parse the raw model text into a JSON object.
///
/// Tries a direct parse first. On failure, falls back to the span from the
/// first `{` to the last `}` — a greedy heuristic, not a real parser (it can
/// mispair braces that appear inside string content), kept for tolerance of
/// prose-wrapped responses. If neither attempt yields a JSON *object*, the
/// payload is unusable.
pub(crate) fn extract_payload(raw: &str) -> Result<Value, AnalysisError> {
    let body = strip_code_fence(raw);

    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(body) {
        return Ok(v);
    }

    if let (Some(start), Some(end)) = (body.find('{'), body.rfind('}')) {
        if end > start {
            if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(&body[start..=end]) {
                debug!("extracted JSON object from prose-wrapped response");
                return Ok(v);
            }
        }
    }

    Err(AnalysisError::ResponseFormat {
        detail: "no parseable JSON object in model output".into(),
        snippet: snippet(raw),
    })
}

/// First 120 characters of the raw text, for error context.
fn snippet(raw: &str) -> String {
    raw.chars().take(120).collect()
}

// ── Source validation ────────────────────────────────────────────────────────

/// Validate one claimed citation. Non-object entries are dropped entirely;
/// within an object every field is repaired per-field, never fatally.
fn validate_source(value: &Value, current_year: &str) -> Option<Source> {
    if !value.is_object() {
        return None;
    }
    Some(Source {
        name: text_or(field(value, "name"), DEFAULT_SOURCE_NAME),
        reliability_score: SCORE.apply("reliability_score", field(value, "reliability_score")),
        year_published: text_or(field(value, "year_published"), current_year),
        url: opt_text(field(value, "url")).and_then(|u| validate_url(&u)),
        doi: opt_text(field(value, "doi")),
    })
}

/// Keep a citation URL only if it parses as http(s) and is not on a known
/// placeholder domain. A bad URL costs the field, never the source.
fn validate_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        debug!(url = raw, "dropped non-http citation URL");
        return None;
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    if PLACEHOLDER_DOMAINS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    {
        debug!(url = raw, "dropped placeholder citation URL");
        return None;
    }
    Some(raw.to_string())
}

fn validate_source_list(value: &Value, current_year: &str) -> Vec<Source> {
    value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|s| validate_source(s, current_year))
                .collect()
        })
        .unwrap_or_default()
}

// ── Step 2: per-object normalization ─────────────────────────────────────────

/// Metadata defaulting is strictly per-field: a wholly absent (or mistyped)
/// metadata record degrades to all-defaults rather than failing the object.
fn normalize_metadata(value: &Value, config: &AnalysisConfig, current_year: &str) -> ObjectMetadata {
    ObjectMetadata {
        assumed_lifespan_years: LIFESPAN.apply(
            "assumed_lifespan_years",
            field(value, "assumed_lifespan_years"),
        ),
        usage_assumptions: text_or(field(value, "usage_assumptions"), DEFAULT_USAGE),
        data_source: text_or(field(value, "data_source"), DEFAULT_DATA_SOURCE),
        geographical_region: text_or(
            field(value, "geographical_region"),
            &config.default_region,
        ),
        methodology_source: validate_source(field(value, "methodology_source"), current_year),
    }
}

/// Does this metadata mark a standardized-human record?
///
/// Human lifecycle emissions are not meaningfully decomposable into
/// manufacturing and operation the way manufactured goods are, so detection
/// routes the object to a fixed published record instead of the derivation
/// pipeline. The check is a free-text heuristic on two metadata fields,
/// isolated here so it can be swapped for a structured tag without touching
/// the rest of the pass.
pub fn is_standardized_human_record(metadata: &ObjectMetadata) -> bool {
    let data_source = metadata.data_source.to_lowercase();
    let region = metadata.geographical_region.to_lowercase();
    HUMAN_TRIGGERS
        .iter()
        .any(|t| data_source.contains(t) || region.contains(t))
}

/// The fixed canonical record substituted for detected people. Whatever
/// manufacturing/operation numbers the model proposed are discarded.
fn standardized_human_footprint(offset: &OffsetModel) -> CarbonFootprint {
    CarbonFootprint {
        manufacturing_kg_co2: 0.0,
        daily_operation_kg_co2: HUMAN_DAILY_KG_CO2,
        lifetime_total_kg_co2: HUMAN_LIFETIME_KG_CO2,
        confidence_score: HUMAN_CONFIDENCE,
        calculation_basis: format!(
            "Standardized global-average human record: {HUMAN_LIFETIME_KG_CO2} kg CO2e \
             over a lifetime at {HUMAN_DAILY_KG_CO2} kg CO2e/day; not derived from \
             per-image estimates."
        ),
        sources: vec![Source {
            name: HUMAN_SOURCE_NAME.to_string(),
            reliability_score: HUMAN_SOURCE_RELIABILITY,
            year_published: HUMAN_SOURCE_YEAR.to_string(),
            url: Some(HUMAN_SOURCE_URL.to_string()),
            doi: None,
        }],
        trees_required: trees_required(HUMAN_LIFETIME_KG_CO2, offset),
    }
}

/// Trees needed to offset a lifetime total.
///
/// `<= 0` yields the fixed minimum of one tree: even a negligible footprint
/// warrants a symbolic offset. Otherwise the count rounds up and is floored
/// at one — never zero once any footprint is acknowledged.
pub(crate) fn trees_required(lifetime_kg_co2: f64, offset: &OffsetModel) -> u64 {
    if lifetime_kg_co2 <= 0.0 {
        return 1;
    }
    let per_tree = offset.absorption_per_tree_kg();
    ((lifetime_kg_co2 / per_tree).ceil() as u64).max(1)
}

/// Regenerated derivation text. The model's own explanation is discarded so
/// the displayed basis always matches the clamped numbers it sits next to.
fn calculation_basis(manufacturing: f64, daily: f64, lifespan: f64) -> String {
    format!(
        "{manufacturing} kg CO2e manufacturing + {daily} kg CO2e/day \
         × 365 days × {lifespan} year(s) of use"
    )
}

/// Normalize one footprint record in the general (non-human) branch.
///
/// The lifetime total is always recomputed from the clamped inputs; whatever
/// the model claimed for it is discarded. This is the invariant the rest of
/// the application relies on.
fn normalize_footprint(
    value: &Value,
    metadata: &ObjectMetadata,
    config: &AnalysisConfig,
    current_year: &str,
) -> CarbonFootprint {
    let manufacturing = MAGNITUDE.apply("manufacturing_kg_co2", field(value, "manufacturing_kg_co2"));
    let daily = MAGNITUDE.apply(
        "daily_operation_kg_co2",
        field(value, "daily_operation_kg_co2"),
    );
    let confidence = SCORE.apply("confidence_score", field(value, "confidence_score"));
    let lifespan = metadata.assumed_lifespan_years;
    let lifetime = manufacturing + daily * 365.0 * lifespan;

    CarbonFootprint {
        manufacturing_kg_co2: manufacturing,
        daily_operation_kg_co2: daily,
        lifetime_total_kg_co2: lifetime,
        confidence_score: confidence,
        calculation_basis: calculation_basis(manufacturing, daily, lifespan),
        sources: validate_source_list(field(value, "sources"), current_year),
        trees_required: trees_required(lifetime, &config.offset),
    }
}

fn normalize_object(
    index: usize,
    value: &Value,
    config: &AnalysisConfig,
    current_year: &str,
) -> Result<DetectedObject, AnalysisError> {
    let name = text_or(field(value, "name"), DEFAULT_OBJECT_NAME);
    let metadata = normalize_metadata(field(value, "metadata"), config, current_year);

    let raw_footprint = field(value, "carbon_footprint");
    if !raw_footprint.is_object() {
        return Err(AnalysisError::Shape {
            index,
            name,
            missing: "carbon_footprint",
        });
    }

    let carbon_footprint = if is_standardized_human_record(&metadata) {
        debug!(object = %name, "substituting standardized human record");
        standardized_human_footprint(&config.offset)
    } else {
        normalize_footprint(raw_footprint, &metadata, config, current_year)
    };

    Ok(DetectedObject {
        name,
        carbon_footprint,
        metadata,
    })
}

// ── Step 3: assembly ─────────────────────────────────────────────────────────

/// Normalize a raw model response into a validated [`AnalysisResult`].
///
/// Single-pass, stateless, no I/O. Field-level problems are repaired and
/// logged; structural problems (unparseable payload, object without a
/// footprint record) abort with a typed error and no partial result.
pub fn normalize_response(
    raw: &str,
    config: &AnalysisConfig,
) -> Result<AnalysisResult, AnalysisError> {
    let payload = extract_payload(raw)?;
    let current_year = Utc::now().year().to_string();

    let raw_objects = field(&payload, "objects")
        .as_array()
        .ok_or_else(|| AnalysisError::ResponseFormat {
            detail: "payload has no 'objects' array".into(),
            snippet: snippet(raw),
        })?;

    let objects = raw_objects
        .iter()
        .enumerate()
        .map(|(i, v)| normalize_object(i, v, config, &current_year))
        .collect::<Result<Vec<_>, _>>()?;

    let meta = field(&payload, "analysis_metadata");

    // The model's own count is untrusted; log a mismatch, use the real one.
    if let Some(claimed) = coerce_number(field(meta, "number_of_objects_detected")) {
        if claimed as usize != objects.len() {
            debug!(
                claimed,
                actual = objects.len(),
                "ignored model-reported object count"
            );
        }
    }

    let number_of_objects_detected = objects.len();
    Ok(AnalysisResult {
        objects,
        timestamp: Utc::now().to_rfc3339(),
        image_quality: text_or(field(meta, "image_quality"), DEFAULT_IMAGE_QUALITY),
        number_of_objects_detected,
        default_region: text_or(field(meta, "default_region"), &config.default_region),
        model_version: text_or(
            field(meta, "model_version"),
            config.model.as_deref().unwrap_or(DEFAULT_MODEL_VERSION),
        ),
        data_sources: validate_source_list(field(meta, "data_sources"), &current_year),
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    fn mug_payload() -> String {
        json!({
            "objects": [{
                "name": "Mug",
                "carbon_footprint": {
                    "manufacturing_kg_co2": 5,
                    "daily_operation_kg_co2": 0,
                    "confidence_score": 1.4
                },
                "metadata": {
                    "assumed_lifespan_years": 2
                }
            }],
            "analysis_metadata": {}
        })
        .to_string()
    }

    // ── Extraction ──

    #[test]
    fn extracts_clean_json() {
        let v = extract_payload(r#"{"objects": []}"#).unwrap();
        assert!(v.is_object());
    }

    #[test]
    fn extracts_fenced_json() {
        let raw = "```json\n{\"objects\": []}\n```";
        let v = extract_payload(raw).unwrap();
        assert!(v.get("objects").is_some());
    }

    #[test]
    fn extracts_fence_without_language() {
        let raw = "```\n{\"objects\": []}\n```";
        assert!(extract_payload(raw).is_ok());
    }

    #[test]
    fn extracts_prose_wrapped_json() {
        let raw = format!("Here is the result: {} Thanks!", mug_payload());
        let result = normalize_response(&raw, &config()).unwrap();
        assert_eq!(result.number_of_objects_detected, 1);
    }

    #[test]
    fn rejects_free_text() {
        let err = extract_payload("Sorry, I cannot analyse this photo.").unwrap_err();
        assert!(matches!(err, AnalysisError::ResponseFormat { .. }));
    }

    #[test]
    fn rejects_bare_array() {
        let err = extract_payload("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, AnalysisError::ResponseFormat { .. }));
    }

    // ── Numeric rules ──

    #[test]
    fn coerces_numeric_strings() {
        assert_eq!(coerce_number(&json!("5.5")), Some(5.5));
        assert_eq!(coerce_number(&json!(" 7 ")), Some(7.0));
        assert_eq!(coerce_number(&json!("not-a-number")), None);
        assert_eq!(coerce_number(&json!(null)), None);
        assert_eq!(coerce_number(&json!(true)), None);
    }

    #[test]
    fn score_rule_clamps_and_defaults() {
        assert_eq!(SCORE.apply("s", &json!(1.4)), 1.0);
        assert_eq!(SCORE.apply("s", &json!(-0.2)), 0.0);
        assert_eq!(SCORE.apply("s", &json!("oops")), 0.0);
        assert_eq!(SCORE.apply("s", &json!(0.7)), 0.7);
    }

    #[test]
    fn lifespan_rule_floors_at_one() {
        assert_eq!(LIFESPAN.apply("l", &json!(0.25)), 1.0);
        assert_eq!(LIFESPAN.apply("l", &json!(null)), 1.0);
        assert_eq!(LIFESPAN.apply("l", &json!(12)), 12.0);
    }

    #[test]
    fn magnitude_rule_rejects_negatives() {
        assert_eq!(MAGNITUDE.apply("m", &json!(-3.0)), 0.0);
        assert_eq!(MAGNITUDE.apply("m", &json!(3.0)), 3.0);
    }

    // ── URL validation ──

    #[test]
    fn keeps_real_urls() {
        assert_eq!(
            validate_url("https://www.ipcc.ch/report/ar6/"),
            Some("https://www.ipcc.ch/report/ar6/".to_string())
        );
    }

    #[test]
    fn drops_placeholder_domains() {
        assert_eq!(validate_url("https://example.com/source"), None);
        assert_eq!(validate_url("https://data.example.com/x"), None);
        assert_eq!(validate_url("http://localhost:3000/api"), None);
    }

    #[test]
    fn drops_unparseable_and_non_http_urls() {
        assert_eq!(validate_url("not a url"), None);
        assert_eq!(validate_url("ftp://archive.org/data"), None);
    }

    // ── Sources ──

    #[test]
    fn source_fields_are_repaired_per_field() {
        let raw = json!({
            "reliability_score": 7,
            "url": "https://example.com/fake",
            "doi": "10.1000/xyz"
        });
        let s = validate_source(&raw, "2026").unwrap();
        assert_eq!(s.name, DEFAULT_SOURCE_NAME);
        assert_eq!(s.reliability_score, 1.0);
        assert_eq!(s.year_published, "2026");
        assert_eq!(s.url, None);
        assert_eq!(s.doi.as_deref(), Some("10.1000/xyz"));
    }

    #[test]
    fn numeric_year_is_rendered_as_text() {
        let raw = json!({"name": "LCA database", "reliability_score": 0.8, "year_published": 2021});
        let s = validate_source(&raw, "2026").unwrap();
        assert_eq!(s.year_published, "2021");
    }

    #[test]
    fn non_object_source_entries_are_dropped() {
        let list = json!(["not a source", {"name": "Real", "reliability_score": 0.5}]);
        let sources = validate_source_list(&list, "2026");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "Real");
    }

    // ── Human branch ──

    fn human_metadata() -> ObjectMetadata {
        ObjectMetadata {
            assumed_lifespan_years: 1.0,
            usage_assumptions: DEFAULT_USAGE.into(),
            data_source: DEFAULT_DATA_SOURCE.into(),
            geographical_region: "Global standardized".into(),
            methodology_source: None,
        }
    }

    #[test]
    fn human_predicate_matches_either_field() {
        let mut meta = human_metadata();
        assert!(is_standardized_human_record(&meta));

        meta.geographical_region = "EU".into();
        meta.data_source = "Standardized human average".into();
        assert!(is_standardized_human_record(&meta));

        meta.data_source = "EPA tables".into();
        assert!(!is_standardized_human_record(&meta));
    }

    #[test]
    fn human_record_replaces_supplied_numbers() {
        let raw = json!({
            "objects": [{
                "name": "Person",
                "carbon_footprint": {
                    "manufacturing_kg_co2": 999,
                    "daily_operation_kg_co2": 999,
                    "confidence_score": 0.1
                },
                "metadata": {
                    "geographical_region": "Global standardized"
                }
            }],
            "analysis_metadata": {}
        })
        .to_string();

        let result = normalize_response(&raw, &config()).unwrap();
        let fp = &result.objects[0].carbon_footprint;
        assert_eq!(fp.manufacturing_kg_co2, 0.0);
        assert_eq!(fp.daily_operation_kg_co2, HUMAN_DAILY_KG_CO2);
        assert_eq!(fp.lifetime_total_kg_co2, HUMAN_LIFETIME_KG_CO2);
        assert_eq!(fp.confidence_score, HUMAN_CONFIDENCE);
        assert_eq!(fp.sources.len(), 1);
        assert_eq!(fp.sources[0].name, HUMAN_SOURCE_NAME);
    }

    // ── Trees ──

    #[test]
    fn trees_floor_at_one() {
        let offset = OffsetModel::default();
        assert_eq!(trees_required(0.0, &offset), 1);
        assert_eq!(trees_required(-5.0, &offset), 1);
        assert_eq!(trees_required(0.001, &offset), 1);
    }

    #[test]
    fn trees_round_up() {
        let offset = OffsetModel::default(); // 880 kg per tree
        assert_eq!(trees_required(880.0, &offset), 1);
        assert_eq!(trees_required(881.0, &offset), 2);
        assert_eq!(trees_required(8800.0, &offset), 10);
    }

    // ── Full pipeline scenarios ──

    #[test]
    fn mug_scenario_clamps_and_derives() {
        let result = normalize_response(&mug_payload(), &config()).unwrap();
        assert_eq!(result.number_of_objects_detected, 1);

        let fp = &result.objects[0].carbon_footprint;
        assert_eq!(fp.confidence_score, 1.0); // clamped from 1.4
        assert_eq!(fp.lifetime_total_kg_co2, 5.0); // 5 + 0 * 365 * 2
        assert!(fp.trees_required >= 1);
    }

    #[test]
    fn lifetime_identity_holds_regardless_of_claim() {
        let raw = json!({
            "objects": [{
                "name": "Laptop",
                "carbon_footprint": {
                    "manufacturing_kg_co2": 200,
                    "daily_operation_kg_co2": 0.1,
                    "lifetime_total_kg_co2": 123456,
                    "confidence_score": 0.8
                },
                "metadata": {"assumed_lifespan_years": 4}
            }],
            "analysis_metadata": {}
        })
        .to_string();

        let result = normalize_response(&raw, &config()).unwrap();
        let fp = &result.objects[0].carbon_footprint;
        let expected = 200.0 + 0.1 * 365.0 * 4.0;
        assert_eq!(fp.lifetime_total_kg_co2, expected);
    }

    #[test]
    fn non_numeric_manufacturing_defaults_to_zero() {
        let raw = json!({
            "objects": [{
                "name": "Chair",
                "carbon_footprint": {
                    "manufacturing_kg_co2": "not-a-number",
                    "daily_operation_kg_co2": 0,
                    "confidence_score": 0.5
                },
                "metadata": {}
            }],
            "analysis_metadata": {}
        })
        .to_string();

        let result = normalize_response(&raw, &config()).unwrap();
        let fp = &result.objects[0].carbon_footprint;
        assert_eq!(fp.manufacturing_kg_co2, 0.0);
        assert_eq!(fp.lifetime_total_kg_co2, 0.0);
        assert_eq!(fp.trees_required, 1);
    }

    #[test]
    fn missing_footprint_is_a_shape_error() {
        let raw = json!({
            "objects": [{"name": "Mystery", "metadata": {}}],
            "analysis_metadata": {}
        })
        .to_string();

        let err = normalize_response(&raw, &config()).unwrap_err();
        match err {
            AnalysisError::Shape { index, missing, .. } => {
                assert_eq!(index, 0);
                assert_eq!(missing, "carbon_footprint");
            }
            other => panic!("expected Shape error, got {other:?}"),
        }
    }

    #[test]
    fn missing_metadata_degrades_to_defaults() {
        let raw = json!({
            "objects": [{
                "name": "Bottle",
                "carbon_footprint": {
                    "manufacturing_kg_co2": 1,
                    "daily_operation_kg_co2": 0,
                    "confidence_score": 0.9
                }
            }],
            "analysis_metadata": {}
        })
        .to_string();

        let result = normalize_response(&raw, &config()).unwrap();
        let meta = &result.objects[0].metadata;
        assert_eq!(meta.assumed_lifespan_years, 1.0);
        assert_eq!(meta.usage_assumptions, DEFAULT_USAGE);
        assert_eq!(meta.data_source, DEFAULT_DATA_SOURCE);
        assert_eq!(meta.geographical_region, "Global");
    }

    #[test]
    fn object_count_is_recomputed() {
        let raw = json!({
            "objects": [
                {"name": "A", "carbon_footprint": {"manufacturing_kg_co2": 1}},
                {"name": "B", "carbon_footprint": {"manufacturing_kg_co2": 2}}
            ],
            "analysis_metadata": {"number_of_objects_detected": 99}
        })
        .to_string();

        let result = normalize_response(&raw, &config()).unwrap();
        assert_eq!(result.number_of_objects_detected, 2);
        assert_eq!(result.objects.len(), 2);
    }

    #[test]
    fn scores_always_land_in_unit_interval() {
        let raw = json!({
            "objects": [{
                "name": "TV",
                "carbon_footprint": {
                    "manufacturing_kg_co2": 300,
                    "daily_operation_kg_co2": 0.5,
                    "confidence_score": -3,
                    "sources": [
                        {"name": "A", "reliability_score": 42},
                        {"name": "B", "reliability_score": "bad"}
                    ]
                },
                "metadata": {"assumed_lifespan_years": 7}
            }],
            "analysis_metadata": {
                "data_sources": [{"name": "C", "reliability_score": 1.01}]
            }
        })
        .to_string();

        let result = normalize_response(&raw, &config()).unwrap();
        let fp = &result.objects[0].carbon_footprint;
        assert!((0.0..=1.0).contains(&fp.confidence_score));
        for s in fp.sources.iter().chain(result.data_sources.iter()) {
            assert!(
                (0.0..=1.0).contains(&s.reliability_score),
                "source '{}' out of range",
                s.name
            );
        }
    }

    #[test]
    fn renormalizing_a_normalized_object_is_identity() {
        let raw = json!({
            "objects": [{
                "name": "Kettle",
                "carbon_footprint": {
                    "manufacturing_kg_co2": "12.5",
                    "daily_operation_kg_co2": 0.03,
                    "lifetime_total_kg_co2": -1,
                    "confidence_score": 2,
                    "sources": [{
                        "name": "Appliance LCA survey",
                        "reliability_score": 0.85,
                        "year_published": "2022",
                        "url": "https://www.sciencedirect.com/science/article/pii/S0000"
                    }]
                },
                "metadata": {
                    "assumed_lifespan_years": 5,
                    "usage_assumptions": "Boiled twice a day",
                    "geographical_region": "EU"
                }
            }],
            "analysis_metadata": {}
        })
        .to_string();

        let cfg = config();
        let first = normalize_response(&raw, &cfg).unwrap();

        // Feed the normalized objects back through the same rules.
        let refed = json!({
            "objects": first.objects.iter().map(|o| serde_json::to_value(o).unwrap()).collect::<Vec<_>>(),
            "analysis_metadata": {}
        })
        .to_string();
        let second = normalize_response(&refed, &cfg).unwrap();

        assert_eq!(first.objects, second.objects);
    }

    #[test]
    fn timestamp_is_set_by_the_normalizer() {
        let raw = json!({
            "objects": [],
            "analysis_metadata": {"timestamp": "1999-01-01T00:00:00Z"}
        })
        .to_string();

        let result = normalize_response(&raw, &config()).unwrap();
        assert!(!result.timestamp.starts_with("1999"));
    }

    #[test]
    fn model_version_falls_back_to_config_model() {
        let cfg = AnalysisConfig::builder().model("gpt-4.1-mini").build().unwrap();
        let raw = json!({"objects": [], "analysis_metadata": {}}).to_string();
        let result = normalize_response(&raw, &cfg).unwrap();
        assert_eq!(result.model_version, "gpt-4.1-mini");
    }

    #[test]
    fn payload_without_objects_array_is_rejected() {
        let raw = json!({"analysis_metadata": {}}).to_string();
        let err = normalize_response(&raw, &config()).unwrap_err();
        assert!(matches!(err, AnalysisError::ResponseFormat { .. }));
    }
}
