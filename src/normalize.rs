// src/normalize.rs
//! Tolerant normalization of externally produced run-result JSON. Upstream
//! payloads drift between field aliases and container shapes; this module
//! maps whatever arrives onto one stable shape and never errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Free-text outcome fields of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_kw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_url: Option<String>,
}

/// Numeric-ish score fields of a run. `total_score` keeps the original JSON
/// value since upstreams send both numbers and strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedScores {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clicks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_score: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_policy_risk: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRunResult {
    pub result: NormalizedResult,
    pub scores: NormalizedScores,
}

/// Normalize a raw run-result payload. Accepts anything, including `None`
/// and non-object values, and yields an all-`None` shape for them.
pub fn normalize_run_result(raw: Option<&Value>) -> NormalizedRunResult {
    let Some(raw) = raw else {
        return NormalizedRunResult::default();
    };
    if !raw.is_object() {
        return NormalizedRunResult::default();
    }

    // Flat payloads carry the result fields at the top level.
    let result_container = match raw.get("result") {
        Some(v) if !v.is_null() => v,
        _ => raw,
    };
    let scores_container = ["scores", "score", "metrics"]
        .iter()
        .filter_map(|k| raw.get(*k))
        .find(|v| !v.is_null());

    let result = NormalizedResult {
        conversion: pick(result_container, &["conversion", "cv", "conversions"]),
        target_kw: pick(
            result_container,
            &["targetKw", "targetKW", "target_kw", "keyword", "targetKeyword", "kw"],
        ),
        reference_url: pick(
            result_container,
            &["referenceUrl", "referenceURL", "reference_url", "url", "reference"],
        ),
    };

    let scores = match scores_container {
        Some(container) => NormalizedScores {
            clicks: pick(container, &["clicks", "click"]),
            pv: pick(container, &["pv", "pageviews", "views", "impressions"]),
            total_score: pick_value(container, &["totalScore", "total_score", "score"]),
            ad_policy_risk: pick(
                container,
                &["adPolicyRisk", "ad_policy_risk", "policyRisk", "risk"],
            ),
        },
        None => NormalizedScores::default(),
    };

    NormalizedRunResult { result, scores }
}

/// First present, non-null alias whose string form is non-blank. `"0"` and
/// `0` are valid values, not absences.
fn pick(container: &Value, aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        let Some(v) = container.get(*alias) else {
            continue;
        };
        if v.is_null() {
            continue;
        }
        let s = match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if !s.trim().is_empty() {
            return Some(s);
        }
    }
    None
}

/// Like `pick` but keeps the raw JSON value.
fn pick_value(container: &Value, aliases: &[&str]) -> Option<Value> {
    for alias in aliases {
        let Some(v) = container.get(*alias) else {
            continue;
        };
        if v.is_null() {
            continue;
        }
        if let Value::String(s) = v {
            if s.trim().is_empty() {
                continue;
            }
        }
        return Some(v.clone());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn none_and_non_objects_normalize_to_empty() {
        assert_eq!(normalize_run_result(None), NormalizedRunResult::default());
        assert_eq!(
            normalize_run_result(Some(&json!("text"))),
            NormalizedRunResult::default()
        );
        assert_eq!(
            normalize_run_result(Some(&json!([1, 2]))),
            NormalizedRunResult::default()
        );
        assert_eq!(
            normalize_run_result(Some(&json!(null))),
            NormalizedRunResult::default()
        );
    }

    #[test]
    fn nested_result_container_wins() {
        let raw = json!({
            "result": { "conversion": "資料請求", "targetKw": "自動車保険 見積" },
            "conversion": "ignored"
        });
        let out = normalize_run_result(Some(&raw));
        assert_eq!(out.result.conversion.as_deref(), Some("資料請求"));
        assert_eq!(out.result.target_kw.as_deref(), Some("自動車保険 見積"));
    }

    #[test]
    fn flat_payload_falls_back_to_top_level() {
        let raw = json!({ "cv": "purchase", "kw": "pair ring", "url": "https://example.com" });
        let out = normalize_run_result(Some(&raw));
        assert_eq!(out.result.conversion.as_deref(), Some("purchase"));
        assert_eq!(out.result.target_kw.as_deref(), Some("pair ring"));
        assert_eq!(out.result.reference_url.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn scores_container_aliases_in_priority_order() {
        let raw = json!({
            "score": { "clicks": 12, "pv": "340" },
            "metrics": { "clicks": 999 }
        });
        let out = normalize_run_result(Some(&raw));
        assert_eq!(out.scores.clicks.as_deref(), Some("12"));
        assert_eq!(out.scores.pv.as_deref(), Some("340"));
    }

    #[test]
    fn zero_is_a_value_blank_is_not() {
        let raw = json!({
            "scores": { "clicks": "0", "pv": "   ", "pageviews": 5 }
        });
        let out = normalize_run_result(Some(&raw));
        assert_eq!(out.scores.clicks.as_deref(), Some("0"));
        assert_eq!(out.scores.pv.as_deref(), Some("5"));
    }

    #[test]
    fn total_score_keeps_original_json_type() {
        let raw = json!({ "scores": { "totalScore": 87 } });
        let out = normalize_run_result(Some(&raw));
        assert_eq!(out.scores.total_score, Some(json!(87)));

        let raw = json!({ "scores": { "totalScore": "B+" } });
        let out = normalize_run_result(Some(&raw));
        assert_eq!(out.scores.total_score, Some(json!("B+")));
    }

    #[test]
    fn null_aliases_are_skipped() {
        let raw = json!({
            "result": { "conversion": null, "cv": "lead" },
            "scores": { "adPolicyRisk": null, "policyRisk": "medium" }
        });
        let out = normalize_run_result(Some(&raw));
        assert_eq!(out.result.conversion.as_deref(), Some("lead"));
        assert_eq!(out.scores.ad_policy_risk.as_deref(), Some("medium"));
    }
}
