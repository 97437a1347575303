//! Record merge: fill gaps in a partial record with oracle-produced fields.
//!
//! A key from `filled` is copied only when `base` has no truthy value for it,
//! so data already present in the source is never replaced by a model guess.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::record::{PartialRecord, StartupRecord};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("{side} record is not a mapping (got {kind})")]
    NotAMapping { side: &'static str, kind: &'static str },
    #[error("merged record does not fit the startup model: {0}")]
    Model(#[from] serde_json::Error),
}

/// Scored fields guaranteed present after a merge.
const SCORED_FIELDS: [&str; 3] = ["score", "funding", "stage"];

fn scored_default(key: &str) -> Value {
    match key {
        "stage" => Value::from(""),
        _ => Value::from(0),
    }
}

/// Falsy in the document sense: null, false, zero, empty string/list/map.
pub fn is_falsy(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// Merge `filled` into `base`; truthy values in `base` win.
pub fn merge(base: &Value, filled: &Value) -> Result<PartialRecord, MergeError> {
    let base = as_mapping(base, "base")?;
    let filled = as_mapping(filled, "filled")?;
    Ok(merge_maps(base, filled))
}

pub fn merge_maps(base: &Map<String, Value>, filled: &Map<String, Value>) -> PartialRecord {
    let mut out = base.clone();

    for (key, value) in filled {
        let keep_existing = out.get(key).is_some_and(|cur| !is_falsy(cur));
        if !keep_existing {
            out.insert(key.clone(), value.clone());
        }
    }

    for key in SCORED_FIELDS {
        if out.get(key).is_none_or(Value::is_null) {
            let v = filled
                .get(key)
                .filter(|v| !v.is_null())
                .cloned()
                .unwrap_or_else(|| scored_default(key));
            out.insert(key.to_string(), v);
        }
    }

    out
}

/// Typed convenience over [`merge`].
pub fn merge_into_record(base: &StartupRecord, filled: &Value) -> Result<StartupRecord, MergeError> {
    let filled = as_mapping(filled, "filled")?;
    let merged = merge_maps(&base.to_partial(), filled);
    Ok(StartupRecord::from_partial(merged)?)
}

fn as_mapping<'a>(v: &'a Value, side: &'static str) -> Result<&'a Map<String, Value>, MergeError> {
    v.as_object().ok_or(MergeError::NotAMapping {
        side,
        kind: kind_of(v),
    })
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
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
    fn zero_funding_is_overwritten() {
        let out = merge(&json!({"funding": 0}), &json!({"funding": 500, "score": 10})).unwrap();
        assert_eq!(out["funding"], json!(500));
        assert_eq!(out["score"], json!(10));
        assert_eq!(out["stage"], json!(""));
    }

    #[test]
    fn existing_values_are_never_clobbered() {
        let base = json!({
            "Name": "Acme",
            "Description": "Rockets",
            "Industry": ["space"],
            "funding": 2_000_000
        });
        let filled = json!({
            "Name": "Acme Corp",
            "Description": "Model guess",
            "Industry": ["aerospace"],
            "funding": 10,
            "Press": "TechCrunch"
        });
        let out = merge(&base, &filled).unwrap();
        for key in ["Name", "Description", "Industry", "funding"] {
            assert_eq!(out[key], base[key], "key {key} was overwritten");
        }
        assert_eq!(out["Press"], json!("TechCrunch"));
    }

    #[test]
    fn falsy_values_are_filled() {
        let base = json!({
            "Website": null,
            "Location": "",
            "Industry": [],
            "Founder_LinkedIn": {},
            "score": 0
        });
        let filled = json!({
            "Website": "https://acme.io",
            "Location": "LA",
            "Industry": ["ai"],
            "Founder_LinkedIn": {"A": "b"},
            "score": 77
        });
        let out = merge(&base, &filled).unwrap();
        assert_eq!(out, *filled.as_object().unwrap());
    }

    #[test]
    fn scored_fields_always_present() {
        let out = merge(&json!({}), &json!({})).unwrap();
        assert_eq!(out["score"], json!(0));
        assert_eq!(out["funding"], json!(0));
        assert_eq!(out["stage"], json!(""));

        let out = merge(&json!({"stage": null}), &json!({"stage": null})).unwrap();
        assert_eq!(out["stage"], json!(""));
    }

    #[test]
    fn non_mapping_input_is_an_error() {
        let err = merge(&json!([1, 2]), &json!({})).unwrap_err();
        assert!(matches!(err, MergeError::NotAMapping { side: "base", kind: "array" }));

        let err = merge(&json!({}), &json!("text")).unwrap_err();
        assert!(matches!(err, MergeError::NotAMapping { side: "filled", .. }));
    }

    #[test]
    fn typed_merge_keeps_ground_truth() {
        let base = StartupRecord {
            name: Some("Acme".into()),
            funding: Some(0),
            ..Default::default()
        };
        let out = merge_into_record(
            &base,
            &json!({"Name": "Other", "funding": 250_000, "score": 55, "stage": "seed"}),
        )
        .unwrap();
        assert_eq!(out.name.as_deref(), Some("Acme"));
        assert_eq!(out.funding, Some(250_000));
        assert_eq!(out.score, Some(55.0));
        assert!(out.is_evaluated());
    }
}
