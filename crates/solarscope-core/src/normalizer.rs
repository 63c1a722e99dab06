//! Turns free-form vision model output into a validated [`RooftopAnalysis`].
//!
//! Models are asked for strict JSON but routinely wrap it in prose, markdown
//! fences or `//` comments, and some answer in a nested `solar_analysis`
//! layout instead of the requested flat one. Everything here is best-effort:
//! [`try_normalize`] reports what went wrong, [`normalize`] never fails and
//! hands back the placeholder record instead.

use crate::error::{NormalizeError, Result};
use crate::types::{AnalysisOutcome, RooftopAnalysis};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::{debug, warn};

pub const AREA_KEY: &str = "area_m2";
pub const ORIENTATION_KEY: &str = "orientation_deg";
pub const SHADING_KEY: &str = "shading_percent";
pub const OBSTRUCTIONS_KEY: &str = "obstructions";

const REQUIRED_KEYS: [&str; 4] = [AREA_KEY, ORIENTATION_KEY, SHADING_KEY, OBSTRUCTIONS_KEY];

// Does not understand `//` inside string values (URLs get truncated).
static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"//.*").expect("valid regex"));

/// Known layouts of a parsed model answer, tried in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// `{"solar_analysis": {"total_area": {"suitable_rooftops_area": ..}, "orientation": .., ..}}`
    SolarAnalysis(Map<String, Value>),
    /// Already uses the canonical field names
    Canonical(Map<String, Value>),
}

impl ResponseShape {
    pub fn detect(object: Map<String, Value>) -> Self {
        if object.contains_key("solar_analysis") {
            ResponseShape::SolarAnalysis(object)
        } else {
            ResponseShape::Canonical(object)
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResponseShape::SolarAnalysis(_) => "solar_analysis",
            ResponseShape::Canonical(_) => "canonical",
        }
    }

    /// Map the shape onto canonical field names. Fields are not validated yet.
    pub fn into_canonical(self) -> Result<Map<String, Value>> {
        match self {
            ResponseShape::Canonical(object) => Ok(object),
            ResponseShape::SolarAnalysis(mut object) => {
                let analysis = match object.remove("solar_analysis") {
                    Some(Value::Object(analysis)) => analysis,
                    _ => {
                        return Err(NormalizeError::invalid(
                            "solar_analysis",
                            "expected an object",
                        ))
                    }
                };

                let area = match analysis.get("total_area") {
                    None => None,
                    Some(Value::Object(total_area)) => {
                        total_area.get("suitable_rooftops_area").cloned()
                    }
                    Some(_) => {
                        return Err(NormalizeError::invalid(
                            "solar_analysis.total_area",
                            "expected an object",
                        ))
                    }
                };

                let mut canonical = Map::new();
                canonical.insert(
                    AREA_KEY.to_string(),
                    area.unwrap_or_else(|| RooftopAnalysis::PLACEHOLDER_AREA_M2.into()),
                );
                canonical.insert(
                    ORIENTATION_KEY.to_string(),
                    field_or(
                        &analysis,
                        "orientation",
                        RooftopAnalysis::PLACEHOLDER_ORIENTATION_DEG.into(),
                    ),
                );
                canonical.insert(
                    SHADING_KEY.to_string(),
                    field_or(
                        &analysis,
                        "shading_percentage",
                        RooftopAnalysis::PLACEHOLDER_SHADING_PERCENT.into(),
                    ),
                );
                canonical.insert(
                    OBSTRUCTIONS_KEY.to_string(),
                    field_or(&analysis, "obstructions", Value::Array(Vec::new())),
                );
                Ok(canonical)
            }
        }
    }
}

fn field_or(object: &Map<String, Value>, key: &str, default: Value) -> Value {
    object.get(key).cloned().unwrap_or(default)
}

/// Normalize model text, substituting the placeholder record on any failure.
pub fn normalize(raw_text: &str) -> RooftopAnalysis {
    normalize_with_source(raw_text).analysis
}

/// Like [`normalize`] but keeps track of whether the placeholder was used.
pub fn normalize_with_source(raw_text: &str) -> AnalysisOutcome {
    match try_normalize(raw_text) {
        Ok(analysis) => AnalysisOutcome::from_model(analysis),
        Err(e) => {
            warn!("Unusable model response, using placeholder data: {}", e);
            AnalysisOutcome::placeholder(e.to_string())
        }
    }
}

pub fn try_normalize(raw_text: &str) -> Result<RooftopAnalysis> {
    let candidate = extract_json_candidate(raw_text)?;
    let cleaned = strip_line_comments(candidate);

    let parsed: Value = serde_json::from_str(&cleaned)
        .map_err(|e| NormalizeError::MalformedJson(e.to_string()))?;
    let object = match parsed {
        Value::Object(object) => object,
        other => {
            return Err(NormalizeError::MalformedJson(format!(
                "expected a JSON object, found {}",
                json_type_name(&other)
            )))
        }
    };

    let shape = ResponseShape::detect(object);
    debug!("Model response matched the {} shape", shape.name());

    validate(shape.into_canonical()?)
}

/// Slice from the first `{` to the last `}`, inclusive.
pub fn extract_json_candidate(raw_text: &str) -> Result<&str> {
    let start = raw_text.find('{').ok_or(NormalizeError::NoJsonFound)?;
    match raw_text.rfind('}') {
        Some(end) if end > start => Ok(&raw_text[start..=end]),
        _ => Err(NormalizeError::NoJsonFound),
    }
}

pub fn strip_line_comments(candidate: &str) -> Cow<'_, str> {
    LINE_COMMENT.replace_all(candidate, "")
}

/// Check presence, types and ranges of the canonical fields.
pub fn validate(record: Map<String, Value>) -> Result<RooftopAnalysis> {
    let missing: Vec<String> = REQUIRED_KEYS
        .iter()
        .filter(|key| !record.contains_key(**key))
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(NormalizeError::IncompleteRecord(missing));
    }

    let area_m2 = number_field(&record, AREA_KEY)?;
    if area_m2 <= 0.0 {
        return Err(NormalizeError::invalid(AREA_KEY, "must be positive"));
    }

    // Angles wrap, so 360 and -90 are accepted as 0 and 270.
    let orientation_deg = number_field(&record, ORIENTATION_KEY)?.rem_euclid(360.0);

    let shading_percent = number_field(&record, SHADING_KEY)?;
    if !(0.0..=100.0).contains(&shading_percent) {
        return Err(NormalizeError::invalid(
            SHADING_KEY,
            format!("{} is outside 0-100", shading_percent),
        ));
    }

    let obstructions = obstructions_field(&record)?;

    Ok(RooftopAnalysis {
        area_m2,
        orientation_deg,
        shading_percent,
        obstructions,
    })
}

fn number_field(record: &Map<String, Value>, key: &str) -> Result<f64> {
    let value = match &record[key] {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| NormalizeError::invalid(key, "not representable as f64"))?,
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .map_err(|_| NormalizeError::invalid(key, format!("{:?} is not a number", s)))?,
        other => {
            return Err(NormalizeError::invalid(
                key,
                format!("expected a number, found {}", json_type_name(other)),
            ))
        }
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(NormalizeError::invalid(key, "must be finite"))
    }
}

fn obstructions_field(record: &Map<String, Value>) -> Result<Vec<String>> {
    match &record[OBSTRUCTIONS_KEY] {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(NormalizeError::invalid(
                    OBSTRUCTIONS_KEY,
                    format!("expected strings, found {}", json_type_name(other)),
                )),
            })
            .collect(),
        other => Err(NormalizeError::invalid(
            OBSTRUCTIONS_KEY,
            format!("expected an array, found {}", json_type_name(other)),
        )),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_json_with_prose() {
        let raw = "Here is the analysis:\n{\"a\": 1}\nHope this helps!";
        assert_eq!(extract_json_candidate(raw).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_json_markdown_fence() {
        let raw = "```json\n{\"a\": {\"b\": 2}}\n```";
        assert_eq!(extract_json_candidate(raw).unwrap(), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn test_extract_json_missing_braces() {
        assert_eq!(
            extract_json_candidate("no json here"),
            Err(NormalizeError::NoJsonFound)
        );
        assert_eq!(
            extract_json_candidate("} backwards {"),
            Err(NormalizeError::NoJsonFound)
        );
        assert_eq!(
            extract_json_candidate("{ never closed"),
            Err(NormalizeError::NoJsonFound)
        );
    }

    #[test]
    fn test_strip_line_comments() {
        let raw = "{\n  \"area_m2\": 120, // estimated\n  \"shading_percent\": 5\n}";
        assert_eq!(
            strip_line_comments(raw),
            "{\n  \"area_m2\": 120, \n  \"shading_percent\": 5\n}"
        );
    }

    #[test]
    fn test_strip_line_comments_truncates_urls() {
        // Known limitation: `//` inside strings is treated as a comment.
        let raw = "{\"source\": \"https://example.com\"}";
        assert_eq!(strip_line_comments(raw), "{\"source\": \"https:");
    }

    #[test]
    fn test_commented_response_normalizes() {
        let raw = r#"{
            "area_m2": 85.5, // visible flat section
            "orientation_deg": 170,
            "shading_percent": 12, // tree on the west side
            "obstructions": ["vent", "skylight"]
        }"#;
        let record = try_normalize(raw).unwrap();
        assert_eq!(record.area_m2, 85.5);
        assert_eq!(record.orientation_deg, 170.0);
        assert_eq!(record.shading_percent, 12.0);
        assert_eq!(record.obstructions, vec!["vent", "skylight"]);
    }

    #[test]
    fn test_shape_detection() {
        let nested = json!({"solar_analysis": {}});
        let flat = json!({"area_m2": 1});
        let Value::Object(nested) = nested else { unreachable!() };
        let Value::Object(flat) = flat else { unreachable!() };

        assert_eq!(ResponseShape::detect(nested).name(), "solar_analysis");
        assert_eq!(ResponseShape::detect(flat).name(), "canonical");
    }

    #[test]
    fn test_solar_analysis_defaults() {
        let record = try_normalize(r#"{"solar_analysis": {}}"#).unwrap();
        assert_eq!(record.area_m2, 100.0);
        assert_eq!(record.orientation_deg, 180.0);
        assert_eq!(record.shading_percent, 10.0);
        assert!(record.obstructions.is_empty());
    }

    #[test]
    fn test_solar_analysis_not_an_object() {
        let err = try_normalize(r#"{"solar_analysis": [1, 2]}"#).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::InvalidField { ref field, .. } if field == "solar_analysis"
        ));

        let err = try_normalize(r#"{"solar_analysis": {"total_area": 250}}"#).unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidField { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let err = try_normalize("{\"area_m2\": 100,, }").unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedJson(_)));
    }

    #[test]
    fn test_incomplete_record_names_missing_keys() {
        let err = try_normalize(r#"{"area_m2": 100, "shading_percent": 10}"#).unwrap_err();
        assert_eq!(
            err,
            NormalizeError::IncompleteRecord(vec![
                "orientation_deg".to_string(),
                "obstructions".to_string()
            ])
        );
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let raw = r#"{"area_m2": "64.0", "orientation_deg": " 90 ", "shading_percent": "15%", "obstructions": null}"#;
        let record = try_normalize(raw).unwrap();
        assert_eq!(record.area_m2, 64.0);
        assert_eq!(record.orientation_deg, 90.0);
        assert_eq!(record.shading_percent, 15.0);
        assert!(record.obstructions.is_empty());
    }

    #[test]
    fn test_orientation_wraps() {
        let raw = r#"{"area_m2": 50, "orientation_deg": 360, "shading_percent": 0, "obstructions": []}"#;
        assert_eq!(try_normalize(raw).unwrap().orientation_deg, 0.0);

        let raw = r#"{"area_m2": 50, "orientation_deg": -90, "shading_percent": 0, "obstructions": []}"#;
        assert_eq!(try_normalize(raw).unwrap().orientation_deg, 270.0);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let cases = [
            r#"{"area_m2": 0, "orientation_deg": 180, "shading_percent": 10, "obstructions": []}"#,
            r#"{"area_m2": -5, "orientation_deg": 180, "shading_percent": 10, "obstructions": []}"#,
            r#"{"area_m2": 100, "orientation_deg": 180, "shading_percent": 140, "obstructions": []}"#,
            r#"{"area_m2": 100, "orientation_deg": 180, "shading_percent": -1, "obstructions": []}"#,
        ];
        for raw in cases {
            assert!(
                matches!(try_normalize(raw), Err(NormalizeError::InvalidField { .. })),
                "expected rejection for {}",
                raw
            );
        }
    }

    #[test]
    fn test_wrong_types_rejected() {
        let cases = [
            r#"{"area_m2": "large", "orientation_deg": 180, "shading_percent": 10, "obstructions": []}"#,
            r#"{"area_m2": 100, "orientation_deg": true, "shading_percent": 10, "obstructions": []}"#,
            r#"{"area_m2": 100, "orientation_deg": 180, "shading_percent": 10, "obstructions": "chimney"}"#,
            r#"{"area_m2": 100, "orientation_deg": 180, "shading_percent": 10, "obstructions": [1, 2]}"#,
        ];
        for raw in cases {
            assert!(
                matches!(try_normalize(raw), Err(NormalizeError::InvalidField { .. })),
                "expected rejection for {}",
                raw
            );
        }
    }

    #[test]
    fn test_normalize_with_source_reports_reason() {
        let outcome = normalize_with_source("the model refused");
        assert!(outcome.used_placeholder());
        assert_eq!(outcome.analysis, RooftopAnalysis::placeholder());
        assert_eq!(
            outcome.source,
            crate::types::AnalysisSource::placeholder("no JSON object found in model response")
        );
    }
}
