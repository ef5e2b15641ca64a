//! The schema value model.
//!
//! A [`Data`] is one node of a schema tree: a [`Value`] plus, for
//! top-level entries only, the [`Meta`] saying where it was observed.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::data_map::DataMap;
use crate::meta::Meta;

/// A schema node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Data {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    pub value: Value,
}

/// The shape of a schema node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Primitive(Primitive),
    Struct(Struct),
    List(List),
    /// A field that is sometimes absent; `None` when only absence was seen.
    Optional(Option<Box<Data>>),
    Union(Union),
}

/// Scalar type of a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Bool,
    Bytes,
    String,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float,
    Double,
}

impl PrimitiveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Bytes => "bytes",
            PrimitiveKind::String => "string",
            PrimitiveKind::Int32 => "int32",
            PrimitiveKind::Int64 => "int64",
            PrimitiveKind::Uint32 => "uint32",
            PrimitiveKind::Uint64 => "uint64",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A leaf value.
///
/// Two primitives have the same shape when their kind and fixed-value
/// set agree; type hints, formats and examples are annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Primitive {
    pub kind: PrimitiveKind,

    /// User-supplied type tag; empty when unknown
    #[serde(skip_serializing_if = "String::is_empty")]
    pub type_hint: String,

    /// Closed set of allowed raw values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_values: Option<BTreeSet<String>>,

    /// Declared formats such as `uuid` or `rfc3339`
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub formats: BTreeSet<String>,

    /// Retained raw example values, smallest first
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub examples: BTreeSet<String>,
}

impl Primitive {
    pub fn new(kind: PrimitiveKind) -> Self {
        Self {
            kind,
            type_hint: String::new(),
            fixed_values: None,
            formats: BTreeSet::new(),
            examples: BTreeSet::new(),
        }
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.insert(example.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.formats.insert(format.into());
        self
    }

    pub fn with_type_hint(mut self, hint: impl Into<String>) -> Self {
        self.type_hint = hint.into();
        self
    }

    pub fn with_fixed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fixed_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Structural equality: kind and fixed values, nothing else.
    pub fn same_shape(&self, other: &Primitive) -> bool {
        self.kind == other.kind && self.fixed_values == other.fixed_values
    }

    /// Add `examples`, keeping only the `max` smallest.
    pub fn absorb_examples(&mut self, examples: BTreeSet<String>, max: usize) {
        self.examples.extend(examples);
        while self.examples.len() > max {
            self.examples.pop_last();
        }
    }
}

/// A record with named fields, or a dynamic map.
///
/// A struct is never both: promotion turns a record into a map and
/// never back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Struct {
    Record(BTreeMap<String, Data>),
    Map { key: Box<Data>, value: Box<Data> },
}

impl Struct {
    pub fn is_map(&self) -> bool {
        matches!(self, Struct::Map { .. })
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, Data>> {
        match self {
            Struct::Record(fields) => Some(fields),
            Struct::Map { .. } => None,
        }
    }
}

/// A list. After melding it holds at most one element, the join of
/// every element ever observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct List {
    pub elems: Vec<Data>,
}

/// Mutually incompatible shapes observed for one field, keyed by hash.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Union {
    pub(crate) options: DataMap,

    /// Set once the union records a real structural mismatch
    pub potential_conflict: bool,
}

impl Union {
    /// Options in hash order.
    pub fn options(&self) -> impl Iterator<Item = (&str, &Data)> {
        self.options.iter()
    }

    pub fn option(&self, hash: &str) -> Option<&Data> {
        self.options.get(hash)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        Data { meta: None, value }
    }
}

impl From<Primitive> for Data {
    fn from(primitive: Primitive) -> Self {
        Data::from(Value::Primitive(primitive))
    }
}

impl Data {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Data::from(Primitive::new(kind))
    }

    pub fn string() -> Self {
        Data::primitive(PrimitiveKind::String)
    }

    pub fn int32() -> Self {
        Data::primitive(PrimitiveKind::Int32)
    }

    pub fn bool() -> Self {
        Data::primitive(PrimitiveKind::Bool)
    }

    pub fn record<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Data)>,
        S: Into<String>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Data::from(Value::Struct(Struct::Record(fields)))
    }

    pub fn list(elems: Vec<Data>) -> Self {
        Data::from(Value::List(List { elems }))
    }

    pub fn optional(inner: Data) -> Self {
        Data::from(Value::Optional(Some(Box::new(inner))))
    }

    /// An optional that has only ever been observed absent.
    pub fn none() -> Self {
        Data::from(Value::Optional(None))
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn without_meta(mut self) -> Self {
        self.meta = None;
        self
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.value, Value::Optional(_))
    }

    /// Wrap the value in an Optional unless it already is one.
    pub fn make_optional(&mut self) {
        if self.is_optional() {
            return;
        }
        let inner = std::mem::replace(&mut self.value, Value::Optional(None));
        self.value = Value::Optional(Some(Box::new(Data::from(inner))));
    }

    /// Strip Optional wrappers; `None` if the value was only ever absent.
    pub fn into_present(self) -> Option<Data> {
        let mut data = self;
        loop {
            match data.value {
                Value::Optional(Some(inner)) => data = *inner,
                Value::Optional(None) => return None,
                _ => return Some(data),
            }
        }
    }

    pub fn as_primitive(&self) -> Option<&Primitive> {
        match &self.value {
            Value::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match &self.value {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match &self.value {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_union(&self) -> Option<&Union> {
        match &self.value {
            Value::Union(u) => Some(u),
            _ => None,
        }
    }

    /// The wrapped value of an Optional.
    pub fn optional_inner(&self) -> Option<&Data> {
        match &self.value {
            Value::Optional(inner) => inner.as_deref(),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        self.value.kind_name()
    }
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Primitive(_) => "primitive",
            Value::Struct(Struct::Record(_)) => "struct",
            Value::Struct(Struct::Map { .. }) => "map",
            Value::List(_) => "list",
            Value::Optional(_) => "optional",
            Value::Union(_) => "union",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_optional_does_not_double_wrap() {
        let mut data = Data::string();
        data.make_optional();
        data.make_optional();

        let inner = data.optional_inner().unwrap();
        assert!(!inner.is_optional());
        assert_eq!(inner.as_primitive().unwrap().kind, PrimitiveKind::String);
    }

    #[test]
    fn test_make_optional_keeps_meta_outside() {
        let meta = Meta::arg(crate::meta::Location::Query, "q");
        let mut data = Data::string().with_meta(meta.clone());
        data.make_optional();

        assert_eq!(data.meta, Some(meta));
        assert_eq!(data.optional_inner().unwrap().meta, None);
    }

    #[test]
    fn test_into_present() {
        let nested = Data::optional(Data::optional(Data::int32()));
        let present = nested.into_present().unwrap();
        assert_eq!(present, Data::int32());

        assert!(Data::none().into_present().is_none());
    }

    #[test]
    fn test_absorb_examples_keeps_smallest() {
        let mut p = Primitive::new(PrimitiveKind::String).with_example("m");
        p.absorb_examples(["z".to_string(), "a".to_string()].into(), 2);
        assert_eq!(p.examples.iter().collect::<Vec<_>>(), vec!["a", "m"]);

        p.absorb_examples(["b".to_string()].into(), 2);
        assert_eq!(p.examples.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_same_shape_ignores_annotations() {
        let a = Primitive::new(PrimitiveKind::String)
            .with_format("uuid")
            .with_type_hint("user_id")
            .with_example("x");
        let b = Primitive::new(PrimitiveKind::String);
        assert!(a.same_shape(&b));

        let c = Primitive::new(PrimitiveKind::String).with_fixed_values(["on", "off"]);
        assert!(!a.same_shape(&c));
        assert!(!a.same_shape(&Primitive::new(PrimitiveKind::Int32)));
    }
}
