//! JSON Schema export functionality.
//!
//! Converts melded schemas to JSON Schema format for documentation
//! and validation purposes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::{Data, Primitive, PrimitiveKind, Struct, Value};

const MAX_DEPTH: usize = 32;

/// Simplified JSON Schema representation.
/// This is a subset of JSON Schema that captures what melding can infer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct JsonSchema {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema_uri: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<JsonSchemaType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, JsonSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Value schema of map-shaped objects
    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<Box<JsonSchema>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<serde_json::Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// For union types (oneOf)
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<JsonSchema>>,
}

/// JSON Schema type values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JsonSchemaType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonSchema {
    /// Create a new JSON Schema with the standard schema URI.
    pub fn new() -> Self {
        Self {
            schema_uri: Some(
                "https://json-schema.org/draft/2020-12/schema".to_string(),
            ),
            ..Default::default()
        }
    }

    /// Create a type-only schema.
    pub fn typed(t: JsonSchemaType) -> Self {
        Self {
            schema_type: Some(t),
            ..Default::default()
        }
    }
}

/// Convert a melded schema to JSON Schema.
pub fn to_json_schema(data: &Data) -> JsonSchema {
    let mut js = JsonSchema::new();
    convert_data(data, &mut js, 0);
    js
}

/// Convert with depth limiting.
fn convert_data(data: &Data, target: &mut JsonSchema, depth: usize) {
    if depth > MAX_DEPTH {
        target.description = Some("(depth limit reached)".to_string());
        return;
    }

    match &data.value {
        Value::Primitive(p) => convert_primitive(p, target),

        Value::Struct(Struct::Record(fields)) => {
            target.schema_type = Some(JsonSchemaType::Object);

            let mut props = BTreeMap::new();
            let mut required_fields = Vec::new();

            for (field_name, field) in fields {
                let mut field_js = JsonSchema::default();
                convert_data(field, &mut field_js, depth + 1);
                props.insert(field_name.clone(), field_js);

                // Fields that were never absent are required
                if !field.is_optional() {
                    required_fields.push(field_name.clone());
                }
            }

            if !props.is_empty() {
                target.properties = Some(props);
            }
            if !required_fields.is_empty() {
                target.required = Some(required_fields);
            }
        }

        Value::Struct(Struct::Map { value, .. }) => {
            target.schema_type = Some(JsonSchemaType::Object);
            let mut value_js = JsonSchema::default();
            convert_data(value, &mut value_js, depth + 1);
            target.additional_properties = Some(Box::new(value_js));
        }

        Value::List(list) => {
            target.schema_type = Some(JsonSchemaType::Array);
            if let Some(elem) = list.elems.first() {
                let mut item_js = JsonSchema::default();
                convert_data(elem, &mut item_js, depth + 1);
                target.items = Some(Box::new(item_js));
            }
        }

        Value::Optional(Some(inner)) => convert_data(inner, target, depth),

        Value::Optional(None) => {
            target.schema_type = Some(JsonSchemaType::Null);
        }

        Value::Union(union) => {
            let converted: Vec<JsonSchema> = union
                .options()
                .map(|(_, option)| {
                    let mut variant_js = JsonSchema::default();
                    convert_data(option, &mut variant_js, depth + 1);
                    variant_js
                })
                .collect();

            if converted.len() == 1 {
                if let Some(v) = converted.into_iter().next() {
                    let schema_uri = target.schema_uri.take();
                    *target = v;
                    target.schema_uri = schema_uri;
                }
            } else if !converted.is_empty() {
                target.one_of = Some(converted);
            }
        }
    }
}

fn convert_primitive(p: &Primitive, target: &mut JsonSchema) {
    target.schema_type = Some(match p.kind {
        PrimitiveKind::Bool => JsonSchemaType::Boolean,
        PrimitiveKind::String | PrimitiveKind::Bytes => JsonSchemaType::String,
        PrimitiveKind::Int32
        | PrimitiveKind::Int64
        | PrimitiveKind::Uint32
        | PrimitiveKind::Uint64 => JsonSchemaType::Integer,
        PrimitiveKind::Float | PrimitiveKind::Double => JsonSchemaType::Number,
    });

    target.format = match p.kind {
        PrimitiveKind::Bytes => Some("byte".to_string()),
        _ => p.formats.first().cloned(),
    };
    if let Some(fixed) = &p.fixed_values {
        target.enum_values = Some(fixed.iter().map(|v| raw_to_json(p.kind, v)).collect());
    }
    if !p.examples.is_empty() {
        target.examples = Some(p.examples.iter().map(|v| raw_to_json(p.kind, v)).collect());
    }
    if !p.type_hint.is_empty() {
        target.description = Some(p.type_hint.clone());
    }
}

/// Raw values are kept as strings; non-string kinds are re-parsed.
fn raw_to_json(kind: PrimitiveKind, raw: &str) -> serde_json::Value {
    match kind {
        PrimitiveKind::String | PrimitiveKind::Bytes => serde_json::Value::String(raw.to_string()),
        _ => serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meld::Melder;
    use serde_json::json;

    fn melded(values: &[serde_json::Value]) -> Data {
        let melder = Melder::new(Default::default());
        let mut iter = values.iter();
        let mut acc = melder.from_json(iter.next().unwrap()).unwrap();
        for v in iter {
            melder.meld(&mut acc, melder.from_json(v).unwrap()).unwrap();
        }
        acc
    }

    #[test]
    fn test_simple_object_schema() {
        let data = melded(&[json!({"id": 1, "name": "Alice", "active": true})]);
        let js = to_json_schema(&data);

        assert_eq!(js.schema_type, Some(JsonSchemaType::Object));
        let props = js.properties.unwrap();
        assert_eq!(props["id"].schema_type, Some(JsonSchemaType::Integer));
        assert_eq!(props["name"].schema_type, Some(JsonSchemaType::String));
        assert_eq!(props["active"].schema_type, Some(JsonSchemaType::Boolean));
        assert_eq!(props["id"].examples, Some(vec![json!(1)]));
    }

    #[test]
    fn test_required_excludes_optional_fields() {
        let data = melded(&[json!({"id": "u1", "age": 30}), json!({"id": "u2"})]);
        let js = to_json_schema(&data);

        assert_eq!(js.required, Some(vec!["id".to_string()]));
        let props = js.properties.unwrap();
        assert_eq!(props["age"].schema_type, Some(JsonSchemaType::Integer));
    }

    #[test]
    fn test_mixed_array_items_from_single_value() {
        let data = melded(&[json!({"items": [1, "a"]})]);
        let js = to_json_schema(&data);
        let props = js.properties.unwrap();
        let items = props["items"].items.as_ref().unwrap();

        assert_eq!(items.one_of.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn test_array_schema() {
        let data = melded(&[json!({"items": [1, 2, 3]})]);
        let js = to_json_schema(&data);
        let props = js.properties.unwrap();
        let items = &props["items"];

        assert_eq!(items.schema_type, Some(JsonSchemaType::Array));
        assert_eq!(
            items.items.as_ref().unwrap().schema_type,
            Some(JsonSchemaType::Integer)
        );
    }

    #[test]
    fn test_union_becomes_one_of() {
        let data = melded(&[json!({"v": 1}), json!({"v": "x"})]);
        let js = to_json_schema(&data);
        let props = js.properties.unwrap();
        assert_eq!(props["v"].one_of.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_map_uses_additional_properties() {
        let wide: serde_json::Map<_, _> = (0..101)
            .map(|i| (format!("k{i}"), json!(i)))
            .collect();
        let data = melded(&[serde_json::Value::Object(wide.clone()), serde_json::Value::Object(wide)]);
        let js = to_json_schema(&data);

        assert_eq!(js.schema_type, Some(JsonSchemaType::Object));
        assert!(js.properties.is_none());
        assert_eq!(
            js.additional_properties.unwrap().schema_type,
            Some(JsonSchemaType::Integer)
        );
    }

    #[test]
    fn test_format_and_enum() {
        let p = Primitive::new(PrimitiveKind::String)
            .with_format("uuid")
            .with_fixed_values(["a", "b"]);
        let js = to_json_schema(&Data::from(p));
        assert_eq!(js.format.as_deref(), Some("uuid"));
        assert_eq!(js.enum_values, Some(vec![json!("a"), json!("b")]));
    }

    #[test]
    fn test_to_json_string() {
        let data = melded(&[json!({"id": 1})]);
        let js = to_json_schema(&data);
        let json_str = serde_json::to_string_pretty(&js).unwrap();

        assert!(json_str.contains("\"type\": \"object\""));
        assert!(json_str.contains("\"$schema\""));
    }

    #[test]
    fn test_depth_limit() {
        let mut data = Data::int32();
        for _ in 0..40 {
            data = Data::list(vec![data]);
        }
        let js = to_json_schema(&data);
        let json_str = serde_json::to_string(&js).unwrap();
        assert!(json_str.contains("depth limit reached"));
    }

    #[test]
    fn test_typed_json_schema() {
        let js = JsonSchema::typed(JsonSchemaType::String);
        assert_eq!(js.schema_type, Some(JsonSchemaType::String));
        assert!(JsonSchema::default().schema_uri.is_none());
    }
}
