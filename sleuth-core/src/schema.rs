//! Static output schemas for structured model calls.
//!
//! Each call site declares its expected result shape once, as a `const`
//! [`OutputSchema`]. The schema renders to JSON Schema for the forced
//! `submit_result` tool and validates the arguments the model sends back.

use serde_json::{Map, Value, json};

/// The JSON type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    String,
    Boolean,
    Number,
    Integer,
    Array(&'static SchemaType),
    Object(&'static [Field]),
}

impl SchemaType {
    fn type_name(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Boolean => "boolean",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Array(_) => "array",
            SchemaType::Object(_) => "object",
        }
    }

    fn to_json(self, description: &str) -> Value {
        let mut node = match self {
            SchemaType::Array(items) => json!({
                "type": "array",
                "items": items.to_json(""),
            }),
            SchemaType::Object(fields) => object_json(fields),
            scalar => json!({ "type": scalar.type_name() }),
        };
        if !description.is_empty() {
            node["description"] = Value::String(description.to_string());
        }
        node
    }

    fn check(&self, value: &Value, path: &str) -> Result<(), String> {
        let ok = match self {
            SchemaType::String => value.is_string(),
            SchemaType::Boolean => value.is_boolean(),
            SchemaType::Number => value.is_number(),
            SchemaType::Integer => value.is_i64() || value.is_u64(),
            SchemaType::Array(items) => {
                let Some(elements) = value.as_array() else {
                    return Err(mismatch(path, self, value));
                };
                for (i, element) in elements.iter().enumerate() {
                    items.check(element, &format!("{path}[{i}]"))?;
                }
                true
            }
            SchemaType::Object(fields) => {
                let Some(map) = value.as_object() else {
                    return Err(mismatch(path, self, value));
                };
                return check_fields(fields, map, path);
            }
        };
        if ok {
            Ok(())
        } else {
            Err(mismatch(path, self, value))
        }
    }
}

/// A named property of an object schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: SchemaType,
    pub description: &'static str,
    pub required: bool,
}

impl Field {
    pub const fn required(name: &'static str, ty: SchemaType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            description,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, ty: SchemaType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            description,
            required: false,
        }
    }
}

/// The top-level shape of a structured result: always a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSchema {
    /// Short description used for the submit tool.
    pub description: &'static str,
    pub fields: &'static [Field],
}

impl OutputSchema {
    /// Render as a JSON Schema object suitable for a tool's `parameters`.
    pub fn to_json_schema(&self) -> Value {
        object_json(self.fields)
    }

    /// Validate a structured result against this schema.
    ///
    /// Unknown properties are tolerated; missing required properties and
    /// type mismatches are reported with a JSON-path-like location.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let map = value
            .as_object()
            .ok_or_else(|| format!("expected object at $, found {}", kind_of(value)))?;
        check_fields(self.fields, map, "$")
    }
}

fn object_json(fields: &[Field]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        properties.insert(field.name.to_string(), field.ty.to_json(field.description));
        if field.required {
            required.push(Value::String(field.name.to_string()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn check_fields(fields: &[Field], map: &Map<String, Value>, path: &str) -> Result<(), String> {
    for field in fields {
        let field_path = format!("{path}.{}", field.name);
        match map.get(field.name) {
            None | Some(Value::Null) if field.required => {
                return Err(format!("missing required field {field_path}"));
            }
            None | Some(Value::Null) => {}
            Some(value) => field.ty.check(value, &field_path)?,
        }
    }
    Ok(())
}

fn mismatch(path: &str, expected: &SchemaType, found: &Value) -> String {
    format!(
        "expected {} at {path}, found {}",
        expected.type_name(),
        kind_of(found)
    )
}

fn kind_of(value: &Value) -> &'static str {
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
    use pretty_assertions::assert_eq;

    const SOURCE: &[Field] = &[
        Field::required("url", SchemaType::String, ""),
        Field::optional("score", SchemaType::Number, ""),
    ];

    const TEST_SCHEMA: OutputSchema = OutputSchema {
        description: "test",
        fields: &[
            Field::required(
                "queries",
                SchemaType::Array(&SchemaType::String),
                "Search queries",
            ),
            Field::required("done", SchemaType::Boolean, ""),
            Field::optional("sources", SchemaType::Array(&SchemaType::Object(SOURCE)), ""),
        ],
    };

    #[test]
    fn test_json_schema_rendering() {
        let rendered = TEST_SCHEMA.to_json_schema();
        assert_eq!(rendered["type"], "object");
        assert_eq!(rendered["required"], json!(["queries", "done"]));
        assert_eq!(rendered["properties"]["queries"]["type"], "array");
        assert_eq!(rendered["properties"]["queries"]["items"]["type"], "string");
        assert_eq!(
            rendered["properties"]["queries"]["description"],
            "Search queries"
        );
        assert!(rendered["properties"]["done"].get("description").is_none());
        assert_eq!(
            rendered["properties"]["sources"]["items"]["required"],
            json!(["url"])
        );
    }

    #[test]
    fn test_validate_accepts_conforming_value() {
        let value = json!({
            "queries": ["a", "b"],
            "done": false,
            "sources": [{"url": "https://x.dev", "score": 0.4}],
            "extra": "ignored"
        });
        assert_eq!(TEST_SCHEMA.validate(&value), Ok(()));
    }

    #[test]
    fn test_validate_optional_may_be_absent_or_null() {
        assert!(TEST_SCHEMA.validate(&json!({"queries": [], "done": true})).is_ok());
        assert!(
            TEST_SCHEMA
                .validate(&json!({"queries": [], "done": true, "sources": null}))
                .is_ok()
        );
    }

    #[test]
    fn test_validate_reports_missing_field() {
        let err = TEST_SCHEMA.validate(&json!({"queries": []})).unwrap_err();
        assert_eq!(err, "missing required field $.done");
    }

    #[test]
    fn test_validate_reports_nested_type_mismatch() {
        let err = TEST_SCHEMA
            .validate(&json!({"queries": ["ok", 3], "done": true}))
            .unwrap_err();
        assert_eq!(err, "expected string at $.queries[1], found number");

        let err = TEST_SCHEMA
            .validate(&json!({"queries": [], "done": true, "sources": [{"score": 1}]}))
            .unwrap_err();
        assert_eq!(err, "missing required field $.sources[0].url");
    }

    #[test]
    fn test_validate_rejects_non_object() {
        let err = TEST_SCHEMA.validate(&json!(["queries"])).unwrap_err();
        assert_eq!(err, "expected object at $, found array");
    }

    #[test]
    fn test_integer_rejects_float() {
        const COUNT: OutputSchema = OutputSchema {
            description: "count",
            fields: &[Field::required("n", SchemaType::Integer, "")],
        };
        assert!(COUNT.validate(&json!({"n": 3})).is_ok());
        assert!(COUNT.validate(&json!({"n": 3.5})).is_err());
    }
}
