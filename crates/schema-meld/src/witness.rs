//! Conversion of observed API calls into schema values.
//!
//! A [`Witness`] is one concretely observed call: its request arguments
//! and response parts as raw JSON, each tagged with where it was found.
//! [`Method::from_witness`] turns it into a normalized [`Method`] ready
//! to be folded into an accumulator.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::data::{Data, Primitive, PrimitiveKind};
use crate::errors::MeldResult;
use crate::fingerprint::DataHasher;
use crate::meld::Melder;
use crate::meta::Meta;
use crate::method::Method;

/// One observed API call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Witness {
    #[serde(default)]
    pub args: Vec<Observation>,
    #[serde(default)]
    pub responses: Vec<Observation>,
}

/// A raw value seen at one location of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub meta: Meta,
    #[serde(default)]
    pub value: JsonValue,
}

impl Observation {
    pub fn new(meta: Meta, value: JsonValue) -> Self {
        Self { meta, value }
    }
}

impl Witness {
    /// Parse a witness document.
    pub fn from_slice(bytes: &[u8]) -> MeldResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn arg(mut self, meta: Meta, value: JsonValue) -> Self {
        self.args.push(Observation::new(meta, value));
        self
    }

    pub fn response(mut self, meta: Meta, value: JsonValue) -> Self {
        self.responses.push(Observation::new(meta, value));
        self
    }
}

impl<H: DataHasher> Melder<H> {
    /// Build the normalized schema of a single concrete JSON value.
    ///
    /// Every primitive keeps its raw rendering as an example, subject to
    /// the configured cap. Array items are joined into one representative
    /// element and wide objects are promoted to maps.
    pub fn from_json(&self, value: &JsonValue) -> MeldResult<Data> {
        let mut data = convert(value, self.config().max_example_values);
        self.normalize(&mut data)?;
        Ok(data)
    }
}

/// Literal conversion: one list element per array item.
fn convert(value: &JsonValue, max_examples: usize) -> Data {
    match value {
        JsonValue::Null => Data::none(),
        JsonValue::Bool(b) => leaf(Primitive::new(PrimitiveKind::Bool), b.to_string(), max_examples),
        JsonValue::Number(n) => leaf(Primitive::new(number_kind(n)), n.to_string(), max_examples),
        JsonValue::String(s) => {
            let mut primitive = Primitive::new(PrimitiveKind::String);
            primitive.formats = detect_formats(s).into_iter().map(str::to_string).collect();
            leaf(primitive, s.clone(), max_examples)
        }
        JsonValue::Array(items) => Data::list(
            items
                .iter()
                .map(|item| convert(item, max_examples))
                .collect(),
        ),
        JsonValue::Object(fields) => Data::record(
            fields
                .iter()
                .map(|(name, field)| (name.clone(), convert(field, max_examples)))
                .collect::<BTreeMap<_, _>>(),
        ),
    }
}

fn leaf(mut primitive: Primitive, raw: String, max_examples: usize) -> Data {
    if max_examples > 0 {
        primitive.examples.insert(raw);
    }
    Data::from(primitive)
}

/// Narrowest integer kind that holds `n`; `Double` for everything else.
pub(crate) fn number_kind(n: &serde_json::Number) -> PrimitiveKind {
    if let Some(i) = n.as_i64() {
        if i32::try_from(i).is_ok() {
            PrimitiveKind::Int32
        } else {
            PrimitiveKind::Int64
        }
    } else if n.is_u64() {
        PrimitiveKind::Uint64
    } else {
        PrimitiveKind::Double
    }
}

/// Well-known string formats recognised in observed values.
pub(crate) fn detect_formats(s: &str) -> Vec<&'static str> {
    let mut formats = Vec::new();
    if s.len() == 36 && Uuid::parse_str(s).is_ok() {
        formats.push("uuid");
    }
    if DateTime::parse_from_rfc3339(s).is_ok() {
        formats.push("rfc3339");
    } else if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() {
        formats.push("date");
    }
    formats
}

impl Method {
    /// Convert a witness into a method. Observations that share a
    /// location are joined into one entry.
    pub fn from_witness<H: DataHasher>(witness: &Witness, melder: &Melder<H>) -> MeldResult<Method> {
        let max_examples = melder.config().max_example_values;
        let mut method = Method::new();
        for observation in &witness.args {
            method.add_arg(melder, observed(observation, max_examples))?;
        }
        for observation in &witness.responses {
            method.add_response(melder, observed(observation, max_examples))?;
        }
        Ok(method)
    }
}

fn observed(observation: &Observation, max_examples: usize) -> Data {
    convert(&observation.value, max_examples).with_meta(observation.meta.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Struct, Value};
    use crate::errors::MeldError;
    use crate::meta::Location;
    use meld_config::MeldingConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn convert_json(value: JsonValue) -> Data {
        Melder::new(Default::default()).from_json(&value).unwrap()
    }

    fn kind(data: &Data) -> PrimitiveKind {
        data.as_primitive().unwrap().kind
    }

    #[test]
    fn test_number_kinds() {
        assert_eq!(kind(&convert_json(json!(30))), PrimitiveKind::Int32);
        assert_eq!(kind(&convert_json(json!(-5))), PrimitiveKind::Int32);
        assert_eq!(kind(&convert_json(json!(3_000_000_000i64))), PrimitiveKind::Int64);
        assert_eq!(kind(&convert_json(json!(u64::MAX))), PrimitiveKind::Uint64);
        assert_eq!(kind(&convert_json(json!(1.5))), PrimitiveKind::Double);
    }

    #[test]
    fn test_string_formats() {
        let uuid = convert_json(json!("67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert!(uuid.as_primitive().unwrap().formats.contains("uuid"));

        let ts = convert_json(json!("2024-05-01T12:00:00Z"));
        assert!(ts.as_primitive().unwrap().formats.contains("rfc3339"));

        let date = convert_json(json!("2024-05-01"));
        assert!(date.as_primitive().unwrap().formats.contains("date"));

        let plain = convert_json(json!("hello"));
        assert!(plain.as_primitive().unwrap().formats.is_empty());
    }

    #[test]
    fn test_examples_retained() {
        let data = convert_json(json!("alice"));
        assert!(data.as_primitive().unwrap().examples.contains("alice"));

        let config = MeldingConfig {
            max_example_values: 0,
            ..Default::default()
        };
        let data = Melder::new(config).from_json(&json!("alice")).unwrap();
        assert!(data.as_primitive().unwrap().examples.is_empty());
    }

    #[test]
    fn test_null_and_containers() {
        assert_eq!(convert_json(json!(null)), Data::none());

        let list = convert_json(json!([1, 2, 3]));
        let elems = &list.as_list().unwrap().elems;
        assert_eq!(elems.len(), 1);
        assert_eq!(elems[0].as_primitive().unwrap().examples.len(), 2);

        let mixed = convert_json(json!([1, "a"]));
        let elem = &mixed.as_list().unwrap().elems[0];
        assert!(elem.as_union().unwrap().potential_conflict);

        let record = convert_json(json!({"id": "u1", "age": 30}));
        let Value::Struct(Struct::Record(fields)) = &record.value else {
            panic!("expected record");
        };
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["age", "id"]);
    }

    #[test]
    fn test_witness_parses() {
        let witness = Witness::from_slice(
            br#"{
                "args": [{"meta": {"location": "query", "key": "limit"}, "value": 10}],
                "responses": [{"meta": {"location": "body", "key": "application/json", "response_code": 200}, "value": {"ok": true}}]
            }"#,
        )
        .unwrap();
        assert_eq!(witness.args[0].meta, Meta::arg(Location::Query, "limit"));
        assert_eq!(witness.responses[0].meta.response_code, Some(200));

        assert!(matches!(
            Witness::from_slice(b"{not json"),
            Err(MeldError::JsonParse(_))
        ));
    }

    #[test]
    fn test_from_witness() {
        let witness = Witness::default()
            .arg(Meta::arg(Location::Query, "limit"), json!(10))
            .arg(Meta::arg(Location::Header, "x-request-id"), json!("abc"))
            .response(Meta::response(200, Location::Body, "application/json"), json!({"id": "u1"}));

        let method = Method::from_witness(&witness, &Melder::new(Default::default())).unwrap();
        assert_eq!(method.args.len(), 2);
        assert_eq!(method.responses.len(), 1);
        assert!(method.args.values().all(|d| d.meta.is_some()));
    }

    #[test]
    fn test_from_witness_joins_repeated_locations() {
        let meta = Meta::arg(Location::Query, "tag");
        let witness = Witness::default()
            .arg(meta.clone(), json!("a"))
            .arg(meta.clone(), json!(1));

        let method = Method::from_witness(&witness, &Melder::new(Default::default())).unwrap();
        assert_eq!(method.args.len(), 1);
        let entry = method.args.values().next().unwrap();
        assert_eq!(entry.meta, Some(meta));
        assert_eq!(entry.as_union().unwrap().len(), 2);
    }

    #[test]
    fn test_wide_objects_promoted_on_conversion() {
        let wide: serde_json::Map<String, JsonValue> =
            (0..101).map(|i| (format!("k{i}"), json!(i))).collect();
        let data = convert_json(JsonValue::Object(wide));
        assert!(matches!(data.value, Value::Struct(Struct::Map { .. })));
    }

    #[test]
    fn test_converted_value_melds_with_copy_unchanged() {
        let melder = Melder::new(Default::default());
        let mut data = melder
            .from_json(&json!({"tags": [1, 2], "rows": [{"a": 1}, {"b": "x"}]}))
            .unwrap();
        let before = data.clone();

        assert!(!melder.meld(&mut data, before.clone()).unwrap());
        assert_eq!(data, before);
    }

    #[test]
    fn test_from_witness_collapses_lists() {
        let witness = Witness::default().response(
            Meta::response(200, Location::Body, "application/json"),
            json!({"tags": ["a", "b", "c"]}),
        );
        let method = Method::from_witness(&witness, &Melder::new(Default::default())).unwrap();
        let body = method.responses.values().next().unwrap();
        let Value::Struct(Struct::Record(fields)) = &body.value else {
            panic!("expected record");
        };
        assert_eq!(fields["tags"].as_list().unwrap().elems.len(), 1);
    }
}
