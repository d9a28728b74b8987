//! Integration tests for the response normalizer, through the public API.
//!
//! These run entirely offline: raw model responses are simulated as strings
//! and fed to `normalize_response` the same way the analysis pipeline does
//! after a live call.

use carbonlens::{
    is_standardized_human_record, normalize_response, AnalysisConfig, AnalysisError, OffsetModel,
};
use serde_json::json;

fn config() -> AnalysisConfig {
    AnalysisConfig::default()
}

/// A realistic multi-object payload with the usual model sloppiness mixed in.
fn desk_scene() -> String {
    json!({
        "objects": [
            {
                "name": "Laptop",
                "carbon_footprint": {
                    "manufacturing_kg_co2": 200,
                    "daily_operation_kg_co2": 0.08,
                    "lifetime_total_kg_co2": "wrong",
                    "confidence_score": 0.85,
                    "calculation_basis": "model's own text, to be discarded",
                    "sources": [
                        {
                            "name": "Manufacturer environmental report",
                            "reliability_score": 0.9,
                            "year_published": "2023",
                            "url": "https://www.apple.com/environment/pdf/"
                        },
                        {
                            "name": "Fabricated citation",
                            "reliability_score": 1.7,
                            "url": "https://example.com/lca"
                        }
                    ]
                },
                "metadata": {
                    "assumed_lifespan_years": 4,
                    "usage_assumptions": "8 hours of office use per day",
                    "data_source": "Manufacturer LCA",
                    "geographical_region": "EU",
                    "methodology_source": {
                        "name": "ISO 14040 LCA framework",
                        "reliability_score": 0.95,
                        "year_published": "2006"
                    }
                }
            },
            {
                "name": "Office worker",
                "carbon_footprint": {
                    "manufacturing_kg_co2": 50,
                    "daily_operation_kg_co2": 5,
                    "confidence_score": 0.3
                },
                "metadata": {
                    "data_source": "Standardized human average",
                    "geographical_region": "Global standardized"
                }
            },
            {
                "name": "Coffee mug",
                "carbon_footprint": {
                    "manufacturing_kg_co2": "2.5",
                    "daily_operation_kg_co2": null,
                    "confidence_score": 0.9
                },
                "metadata": {
                    "assumed_lifespan_years": 0.1
                }
            }
        ],
        "analysis_metadata": {
            "image_quality": "good — sharp focus, even lighting",
            "number_of_objects_detected": 7,
            "default_region": "EU",
            "model_version": "gpt-4.1-mini-2025-04-14",
            "data_sources": [
                {"name": "ecoinvent 3.10", "reliability_score": 0.95, "year_published": 2024}
            ]
        }
    })
    .to_string()
}

#[test]
fn full_scene_normalizes_every_object() {
    let result = normalize_response(&desk_scene(), &config()).unwrap();

    assert_eq!(result.number_of_objects_detected, 3);
    assert_eq!(result.objects.len(), 3);
    assert_eq!(result.default_region, "EU");
    assert_eq!(result.model_version, "gpt-4.1-mini-2025-04-14");

    // Laptop: derived lifetime, both sources kept but the fabricated URL dropped.
    let laptop = &result.objects[0];
    let fp = &laptop.carbon_footprint;
    assert_eq!(fp.lifetime_total_kg_co2, 200.0 + 0.08 * 365.0 * 4.0);
    assert_eq!(fp.sources.len(), 2);
    assert!(fp.sources[0].url.is_some());
    assert_eq!(fp.sources[1].url, None);
    assert_eq!(fp.sources[1].reliability_score, 1.0);
    assert!(laptop.metadata.methodology_source.is_some());

    // Office worker: canonical human record regardless of supplied numbers.
    let person = &result.objects[1];
    assert!(is_standardized_human_record(&person.metadata));
    assert_eq!(person.carbon_footprint.manufacturing_kg_co2, 0.0);
    assert!(person.carbon_footprint.lifetime_total_kg_co2 > 100_000.0);

    // Mug: string magnitude coerced, null defaulted, lifespan floored at 1.
    let mug = &result.objects[2];
    assert_eq!(mug.metadata.assumed_lifespan_years, 1.0);
    assert_eq!(mug.carbon_footprint.manufacturing_kg_co2, 2.5);
    assert_eq!(mug.carbon_footprint.daily_operation_kg_co2, 0.0);
    assert_eq!(mug.carbon_footprint.lifetime_total_kg_co2, 2.5);
}

#[test]
fn every_score_in_output_is_bounded() {
    let result = normalize_response(&desk_scene(), &config()).unwrap();

    for obj in &result.objects {
        let fp = &obj.carbon_footprint;
        assert!((0.0..=1.0).contains(&fp.confidence_score), "{}", obj.name);
        for s in &fp.sources {
            assert!((0.0..=1.0).contains(&s.reliability_score), "{}", s.name);
        }
        if let Some(ref m) = obj.metadata.methodology_source {
            assert!((0.0..=1.0).contains(&m.reliability_score));
        }
    }
    for s in &result.data_sources {
        assert!((0.0..=1.0).contains(&s.reliability_score));
    }
}

#[test]
fn every_tree_count_is_at_least_one() {
    let result = normalize_response(&desk_scene(), &config()).unwrap();
    for obj in &result.objects {
        assert!(obj.carbon_footprint.trees_required >= 1, "{}", obj.name);
    }
}

#[test]
fn prose_wrapped_response_normalizes_identically() {
    let clean = normalize_response(&desk_scene(), &config()).unwrap();
    let wrapped = format!(
        "Here is the carbon analysis you asked for:\n\n{}\n\nLet me know if you need anything else!",
        desk_scene()
    );
    let from_prose = normalize_response(&wrapped, &config()).unwrap();
    assert_eq!(clean.objects, from_prose.objects);
}

#[test]
fn fenced_response_normalizes_identically() {
    let clean = normalize_response(&desk_scene(), &config()).unwrap();
    let fenced = format!("```json\n{}\n```", desk_scene());
    let from_fence = normalize_response(&fenced, &config()).unwrap();
    assert_eq!(clean.objects, from_fence.objects);
}

#[test]
fn unusable_text_is_a_response_format_error() {
    let err = normalize_response("I'm sorry, I can't see any objects.", &config()).unwrap_err();
    assert!(matches!(err, AnalysisError::ResponseFormat { .. }));
}

#[test]
fn truncated_json_is_a_response_format_error() {
    // Simulates a max_tokens cutoff mid-payload.
    let full = desk_scene();
    let truncated: String = full.chars().take(full.chars().count() / 2).collect();
    let err = normalize_response(&truncated, &config()).unwrap_err();
    assert!(matches!(err, AnalysisError::ResponseFormat { .. }));
}

#[test]
fn object_without_footprint_fails_and_returns_nothing() {
    let raw = json!({
        "objects": [
            {"name": "Fine", "carbon_footprint": {"manufacturing_kg_co2": 1}},
            {"name": "Broken"}
        ],
        "analysis_metadata": {}
    })
    .to_string();

    let err = normalize_response(&raw, &config()).unwrap_err();
    match err {
        AnalysisError::Shape { index, name, .. } => {
            assert_eq!(index, 1);
            assert_eq!(name, "Broken");
        }
        other => panic!("expected Shape, got {other:?}"),
    }
}

#[test]
fn empty_object_list_is_a_valid_result() {
    let raw = json!({"objects": [], "analysis_metadata": {"image_quality": "poor — lens cap on"}})
        .to_string();
    let result = normalize_response(&raw, &config()).unwrap();
    assert_eq!(result.number_of_objects_detected, 0);
    assert_eq!(result.image_quality, "poor — lens cap on");
}

#[test]
fn custom_offset_model_changes_tree_counts() {
    // One giant tree absorbs the whole footprint.
    let generous = AnalysisConfig::builder()
        .offset(OffsetModel {
            tree_co2_absorption_per_year_kg: 1_000_000.0,
            average_tree_lifespan_years: 1.0,
        })
        .build()
        .unwrap();

    let result = normalize_response(&desk_scene(), &generous).unwrap();
    for obj in &result.objects {
        assert_eq!(obj.carbon_footprint.trees_required, 1, "{}", obj.name);
    }
}

#[test]
fn normalized_output_survives_a_serde_round_trip() {
    let result = normalize_response(&desk_scene(), &config()).unwrap();
    let json = serde_json::to_string(&result).unwrap();
    let back: carbonlens::AnalysisResult = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
}
