//! Strict output schemas sent along with every oracle prompt.

use serde_json::{json, Map, Value};

/// Named JSON-schema descriptor. `name` also namespaces cache keys.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: &'static str,
    pub schema: Value,
}

impl OutputSchema {
    /// Exactly `score:int`, `funding:int`, `stage:string`, nothing else.
    pub fn evaluation() -> Self {
        Self {
            name: "startup_evaluation",
            schema: json!({
                "type": "object",
                "properties": {
                    "score": { "type": "integer" },
                    "funding": { "type": "integer" },
                    "stage": { "type": "string" }
                },
                "required": ["score", "funding", "stage"],
                "additionalProperties": false
            }),
        }
    }

    /// Descriptive startup fields plus the scored triple.
    pub fn startup_fill() -> Self {
        let text = || json!({ "type": "string" });
        let mut props = Map::new();
        for key in [
            "Name",
            "Description",
            "Founders",
            "Website",
            "Location",
            "Early_Metrics",
            "Press",
            "Funding_Status",
            "Launch_Date",
            "stage",
        ] {
            props.insert(key.to_string(), text());
        }
        props.insert(
            "Industry".into(),
            json!({ "type": "array", "items": { "type": "string" } }),
        );
        props.insert("score".into(), json!({ "type": "integer" }));
        props.insert("funding".into(), json!({ "type": "integer" }));

        let required: Vec<Value> = props.keys().cloned().map(Value::String).collect();
        Self {
            name: "startup_fill",
            schema: json!({
                "type": "object",
                "properties": Value::Object(props),
                "required": required,
                "additionalProperties": false
            }),
        }
    }

    /// Gemini's `responseSchema` dialect: OpenAPI subset, upper-case type
    /// names, no `additionalProperties`.
    pub fn to_openapi(&self) -> Value {
        fn convert(v: &Value) -> Value {
            match v {
                Value::Object(map) => {
                    let mut out = Map::new();
                    for (k, val) in map {
                        match (k.as_str(), val) {
                            ("additionalProperties", _) => {}
                            ("type", Value::String(t)) => {
                                out.insert(k.clone(), Value::String(t.to_ascii_uppercase()));
                            }
                            _ => {
                                out.insert(k.clone(), convert(val));
                            }
                        }
                    }
                    Value::Object(out)
                }
                Value::Array(items) => Value::Array(items.iter().map(convert).collect()),
                other => other.clone(),
            }
        }
        convert(&self.schema)
    }
}
