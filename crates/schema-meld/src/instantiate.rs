//! Choosing among union alternatives for concrete values.
//!
//! This is the consumer-side inverse of melding: given a finished schema
//! and a raw JSON value, find the alternative the value belongs to and
//! build the concrete instance.

use std::fmt::Display;

use serde_json::Value as JsonValue;
use tracing::trace;

use crate::data::{Data, Primitive, PrimitiveKind, Struct, Union, Value};
use crate::errors::{MeldError, MeldResult};
use crate::meld::make_path;
use crate::meta::Meta;
use crate::witness::detect_formats;

/// Instantiate a concrete value from the best-fitting union option.
///
/// `factory` is tried on every option in hash order. Successful candidates
/// are scored by how many non-null leaves they carry; the highest score
/// wins and ties keep the earlier option. The containing field's `meta`
/// is put on the winner.
///
/// Fails with [`MeldError::NoSuitableOption`] when every attempt failed.
pub fn instantiate_union<F, E>(union: &Union, meta: Option<&Meta>, mut factory: F) -> MeldResult<Data>
where
    F: FnMut(&Data) -> Result<Data, E>,
    E: Display,
{
    let mut best: Option<(usize, Data)> = None;

    for (hash, option) in union.options() {
        match factory(option) {
            Ok(candidate) => {
                let score = count_leaves(&candidate);
                if best.as_ref().is_none_or(|(top, _)| score > *top) {
                    best = Some((score, candidate));
                }
            }
            Err(e) => trace!(option = %hash, error = %e, "union option rejected"),
        }
    }

    let (_, mut winner) = best.ok_or(MeldError::NoSuitableOption {
        candidates: union.len(),
    })?;
    if let Some(meta) = meta {
        winner.meta = Some(meta.clone());
    }
    Ok(winner)
}

/// Number of non-null primitive leaves under `data`.
pub fn count_leaves(data: &Data) -> usize {
    match &data.value {
        Value::Primitive(_) => 1,
        Value::Struct(Struct::Record(fields)) => fields.values().map(count_leaves).sum(),
        Value::Struct(Struct::Map { key, value }) => count_leaves(key) + count_leaves(value),
        Value::List(list) => list.elems.iter().map(count_leaves).sum(),
        Value::Optional(Some(inner)) => count_leaves(inner),
        Value::Optional(None) => 0,
        Value::Union(union) => union.options().map(|(_, o)| count_leaves(o)).max().unwrap_or(0),
    }
}

/// Instantiate `value` following the schema `shape`.
///
/// Kinds, type hints and fixed values come from the shape; formats and
/// examples from the value. Records require every non-optional field
/// and reject unknown ones. Map-shaped objects come back as records with
/// their actual keys.
pub fn conform(shape: &Data, value: &JsonValue, max_examples: usize) -> MeldResult<Data> {
    let mut data = conform_at("", shape, value, max_examples)?;
    if data.meta.is_none() {
        data.meta = shape.meta.clone();
    }
    Ok(data)
}

fn conform_at(path: &str, shape: &Data, value: &JsonValue, max_examples: usize) -> MeldResult<Data> {
    match (&shape.value, value) {
        (Value::Optional(_), JsonValue::Null) => Ok(Data::none()),
        (Value::Optional(Some(inner)), value) => conform_at(path, inner, value, max_examples),
        (Value::Optional(None), value) => Err(MeldError::mismatch(path, "null", json_kind(value))),
        (Value::Union(union), value) => instantiate_union(union, None, |option| {
            conform_at(path, option, value, max_examples)
        }),
        (Value::Primitive(p), value) => conform_primitive(path, p, value, max_examples),
        (Value::Struct(Struct::Record(fields)), JsonValue::Object(object)) => {
            if let Some(unknown) = object.keys().find(|k| !fields.contains_key(*k)) {
                return Err(MeldError::mismatch(
                    &make_path(path, unknown),
                    "no such field",
                    json_kind(&object[unknown]),
                ));
            }
            let mut out = Vec::with_capacity(fields.len());
            for (name, field) in fields {
                let child = make_path(path, name);
                match object.get(name) {
                    Some(v) => out.push((name.clone(), conform_at(&child, field, v, max_examples)?)),
                    None if field.is_optional() => {}
                    None => return Err(MeldError::mismatch(&child, field.kind_name(), "missing")),
                }
            }
            Ok(Data::record(out))
        }
        (Value::Struct(Struct::Map { value: item, .. }), JsonValue::Object(object)) => {
            let mut out = Vec::with_capacity(object.len());
            for (key, v) in object {
                let child = make_path(path, key);
                out.push((key.clone(), conform_at(&child, item, v, max_examples)?));
            }
            Ok(Data::record(out))
        }
        (Value::List(list), JsonValue::Array(items)) => {
            let elems = match list.elems.first() {
                Some(elem) => items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| conform_at(&format!("{path}[{i}]"), elem, v, max_examples))
                    .collect::<MeldResult<Vec<_>>>()?,
                None if items.is_empty() => Vec::new(),
                None => return Err(MeldError::mismatch(path, "empty list", "non-empty array")),
            };
            Ok(Data::list(elems))
        }
        (shape, value) => Err(MeldError::mismatch(path, shape.kind_name(), json_kind(value))),
    }
}

fn conform_primitive(
    path: &str,
    shape: &Primitive,
    value: &JsonValue,
    max_examples: usize,
) -> MeldResult<Data> {
    let raw = match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    };
    if !fits_kind(shape.kind, value) {
        return Err(MeldError::mismatch(path, shape.kind.as_str(), json_kind(value)));
    }
    if let Some(fixed) = &shape.fixed_values {
        if !fixed.contains(&raw) {
            return Err(MeldError::mismatch(path, "one of the fixed values", raw));
        }
    }

    let mut out = Primitive::new(shape.kind);
    out.type_hint = shape.type_hint.clone();
    out.fixed_values = shape.fixed_values.clone();
    if let JsonValue::String(s) = value {
        out.formats = detect_formats(s).into_iter().map(str::to_string).collect();
    }
    if max_examples > 0 {
        out.examples.insert(raw);
    }
    Ok(Data::from(out))
}

fn fits_kind(kind: PrimitiveKind, value: &JsonValue) -> bool {
    match (kind, value) {
        (PrimitiveKind::Bool, JsonValue::Bool(_)) => true,
        (PrimitiveKind::String | PrimitiveKind::Bytes, JsonValue::String(_)) => true,
        (PrimitiveKind::Int32, JsonValue::Number(n)) => {
            n.as_i64().is_some_and(|i| i32::try_from(i).is_ok())
        }
        (PrimitiveKind::Int64, JsonValue::Number(n)) => n.as_i64().is_some(),
        (PrimitiveKind::Uint32, JsonValue::Number(n)) => {
            n.as_u64().is_some_and(|u| u32::try_from(u).is_ok())
        }
        (PrimitiveKind::Uint64, JsonValue::Number(n)) => n.as_u64().is_some(),
        (PrimitiveKind::Float | PrimitiveKind::Double, JsonValue::Number(_)) => true,
        _ => false,
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
