//! Prompts for VLM-based photo carbon analysis.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the payload shape or the
//!    standardized-human convention requires editing exactly one place,
//!    together with the normalizer that consumes the shape.
//!
//! 2. **Testability** — unit tests can assert the prompt names every key the
//!    normalizer expects without spinning up a real model, making prompt
//!    regressions easy to catch.
//!
//! Callers can override the default via
//! [`crate::config::AnalysisConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

/// Default system prompt for analysing a photo's carbon footprint.
///
/// The JSON shape described here is the contract the response normalizer
/// tolerates; its normalization rules repair out-of-range and mistyped
/// fields, but the keys themselves must match.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a sustainability analyst. Identify every distinct physical object in the photo and estimate its carbon footprint.

Respond with exactly one JSON object of this shape:

{
  "objects": [
    {
      "name": "<short object name>",
      "carbon_footprint": {
        "manufacturing_kg_co2": <number>,
        "daily_operation_kg_co2": <number>,
        "lifetime_total_kg_co2": <number>,
        "confidence_score": <number between 0 and 1>,
        "calculation_basis": "<one-sentence derivation>",
        "sources": [
          {
            "name": "<publication>",
            "reliability_score": <number between 0 and 1>,
            "year_published": "<YYYY>",
            "url": "<link, omit if unsure>",
            "doi": "<doi, omit if unknown>"
          }
        ]
      },
      "metadata": {
        "assumed_lifespan_years": <number, at least 1>,
        "usage_assumptions": "<how the object is typically used>",
        "data_source": "<where the figures come from>",
        "geographical_region": "<region the figures assume>",
        "methodology_source": { <same shape as a source, optional> }
      }
    }
  ],
  "analysis_metadata": {
    "image_quality": "<good | fair | poor, with a short reason>",
    "number_of_objects_detected": <integer>,
    "default_region": "<region assumed>",
    "model_version": "<your model identifier>",
    "data_sources": [ <same shape as sources> ]
  }
}

Follow these rules precisely:

1. OBJECTS
   - Report each distinct physical object once; skip walls, floors, and shadows
   - Use everyday names ("Coffee mug", not "cylindrical ceramic vessel")

2. NUMBERS
   - All emissions are kg of CO2-equivalent; never negative
   - daily_operation_kg_co2 is 0 for passive objects (furniture, books)
   - Estimate lifespans from typical product replacement cycles

3. SOURCES
   - Cite real publications (LCA databases, agency reports, peer-reviewed studies)
   - Omit the url field entirely rather than inventing a link

4. PEOPLE
   - For a detected person, set metadata.data_source to "Standardized human average"
     and metadata.geographical_region to "Global standardized"
   - Do not attempt to decompose a person's footprint into manufacturing and
     operation; the application substitutes published per-capita figures

5. OUTPUT FORMAT
   - Output ONLY the JSON object
   - Do NOT wrap it in ```json fences
   - Do NOT add commentary before or after the JSON"#;

/// User-turn text sent alongside the photo.
///
/// Vision APIs require a user turn; the image attachment carries the actual
/// content, so this stays to one sentence.
pub const ANALYSIS_REQUEST: &str =
    "Identify the objects in this photo and estimate their carbon footprints.";

/// Build the region-assumption context message.
///
/// Sent as a second system message so the region can vary per call without
/// rebuilding the main prompt.
pub fn region_context(region: &str) -> String {
    format!(
        "Unless the photo clearly indicates another region, assume \"{}\" for \
         electricity-grid intensity and usage patterns, and echo it as \
         default_region in analysis_metadata.",
        region
    )
}
