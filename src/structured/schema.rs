//! Schema generation utilities.
//!
//! Wire records derive [`schemars::JsonSchema`]; [`schema_for`] produces the
//! full draft-07 schema used for validation, and [`provider_schema`] the
//! reduced dialect accepted as a provider `responseSchema`.

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde_json::{json, Map, Value};

use crate::types::Emotion;

/// Keywords the provider schema dialect rejects.
const STRIPPED_KEYWORDS: &[&str] = &[
    "title",
    "description",
    "$schema",
    "$id",
    "format",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "default",
    "examples",
    "additionalProperties",
    "definitions",
    "$defs",
    "$ref",
];

/// Property whose object schema lists the emotion vocabulary as number fields.
const SCORES_PROPERTY: &str = "scores";

/// Full JSON schema for `T` with every subschema inlined.
pub fn schema_for<T: JsonSchema>() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|s| {
            s.inline_subschemas = true;
        })
        .into_generator();
    let root = generator.into_root_schema_for::<T>();
    serde_json::to_value(root).unwrap_or_else(|_| json!({ "type": "object" }))
}

/// Provider-facing schema for `T`.
pub fn provider_schema<T: JsonSchema>() -> Value {
    clean_for_provider(&schema_for::<T>())
}

/// Reduce a JSON schema to the provider's supported subset.
pub fn clean_for_provider(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => clean_object(map),
        Value::Array(items) => Value::Array(items.iter().map(clean_for_provider).collect()),
        // `true` (any value) is not expressible; the only such fields are numeric.
        Value::Bool(true) => json!({ "type": "number" }),
        other => other.clone(),
    }
}

fn clean_object(map: &Map<String, Value>) -> Value {
    let mut out = Map::new();
    for (key, value) in map {
        if STRIPPED_KEYWORDS.contains(&key.as_str()) {
            continue;
        }
        match key.as_str() {
            "properties" => {
                let mut props = Map::new();
                if let Value::Object(declared) = value {
                    for (name, prop) in declared {
                        let mut cleaned = clean_for_provider(prop);
                        // untyped after stripping (e.g. `{"default": null}`)
                        if cleaned.as_object().map(|o| o.is_empty()).unwrap_or(false) {
                            cleaned = json!({ "type": "number" });
                        }
                        if name == SCORES_PROPERTY && cleaned.get("type") == Some(&json!("object")) {
                            cleaned["properties"] = emotion_number_properties();
                        }
                        props.insert(name.clone(), cleaned);
                    }
                }
                out.insert(key.clone(), Value::Object(props));
            }
            "required" => {
                let declared = map.get("properties").and_then(|p| p.as_object());
                let required: Vec<Value> = value
                    .as_array()
                    .map(|names| {
                        names
                            .iter()
                            .filter(|n| {
                                n.as_str()
                                    .map(|n| declared.map(|d| d.contains_key(n)).unwrap_or(false))
                                    .unwrap_or(false)
                            })
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                if !required.is_empty() {
                    out.insert(key.clone(), Value::Array(required));
                }
            }
            "type" => match value {
                Value::Array(types) => {
                    let concrete: Vec<&Value> = types.iter().filter(|t| t.as_str() != Some("null")).collect();
                    if concrete.len() < types.len() {
                        out.insert("nullable".into(), Value::Bool(true));
                    }
                    match concrete.as_slice() {
                        [single] => {
                            out.insert(key.clone(), (*single).clone());
                        }
                        [] => {}
                        many => {
                            out.insert(key.clone(), Value::Array(many.iter().map(|t| (*t).clone()).collect()));
                        }
                    }
                }
                other => {
                    out.insert(key.clone(), other.clone());
                }
            },
            _ => {
                out.insert(key.clone(), clean_for_provider(value));
            }
        }
    }
    Value::Object(out)
}

fn emotion_number_properties() -> Value {
    let mut props = Map::new();
    for emotion in Emotion::ALL {
        props.insert(emotion.as_str().to_string(), json!({ "type": "number" }));
    }
    Value::Object(props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Inner {
        caption: String,
    }

    /// Test record
    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Sample {
        /// The title
        title: String,
        #[serde(default)]
        scores: BTreeMap<String, Value>,
        #[serde(default)]
        confidence: Option<Value>,
        rewrite: Option<String>,
        count: u32,
        panels: Vec<Inner>,
    }

    #[test]
    fn full_schema_inlines_subschemas() {
        let schema = schema_for::<Sample>();
        assert!(schema.get("definitions").is_none());
        assert_eq!(schema["properties"]["panels"]["items"]["type"], "object");
        assert_eq!(schema["title"], "Sample");
    }

    #[test]
    fn provider_schema_is_reduced() {
        let schema = provider_schema::<Sample>();
        let text = schema.to_string();
        for banned in ["\"title\":\"Sample\"", "$schema", "description", "additionalProperties", "minimum", "format"] {
            assert!(!text.contains(banned), "{} should be stripped from {}", banned, text);
        }
        assert_eq!(schema["properties"]["rewrite"]["type"], "string");
        assert_eq!(schema["properties"]["rewrite"]["nullable"], true);
        assert_eq!(schema["properties"]["confidence"]["type"], "number");
        assert_eq!(schema["properties"]["scores"]["properties"]["calm"]["type"], "number");
        assert_eq!(
            schema["properties"]["scores"]["properties"].as_object().unwrap().len(),
            Emotion::ALL.len()
        );
        assert_eq!(schema["properties"]["panels"]["items"]["required"], json!(["caption"]));
    }

    #[test]
    fn required_is_filtered_to_declared_properties() {
        let raw = json!({
            "type": "object",
            "properties": { "a": { "type": "string" } },
            "required": ["a", "ghost"]
        });
        assert_eq!(clean_for_provider(&raw)["required"], json!(["a"]));
    }
}
