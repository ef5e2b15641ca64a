//! Structural hashing of schema values.
//!
//! The melding engine consumes hashing through the [`DataHasher`] trait.
//! [`Sha256Hasher`] is the stock implementation: a SHA-256 digest of the
//! value's *structure* only (variants, kinds, fixed values, field names).
//! Annotations that change with every observation (example values,
//! formats, type hints) are left out, so two observations of the same
//! shape always hash alike.

use sha2::{Digest, Sha256};

use crate::data::{Data, Struct, Value};
use crate::errors::HashError;
use crate::meta::Meta;
use crate::method::Method;

/// Deterministic content addressing of schema values.
pub trait DataHasher {
    /// Digest of a value alone. Nested field metadata is ignored.
    fn hash_value(&self, value: &Value) -> Result<String, HashError>;

    /// Digest of a top-level entry, including its field metadata.
    fn hash(&self, data: &Data) -> Result<String, HashError>;
}

/// SHA-256 structural hasher.
///
/// Digests are the first 8 bytes of the hash, hex-encoded (16 chars).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sha256Hasher;

impl DataHasher for Sha256Hasher {
    fn hash_value(&self, value: &Value) -> Result<String, HashError> {
        let mut hasher = Sha256::new();
        hash_structure(value, &mut hasher)?;
        Ok(finish(hasher))
    }

    fn hash(&self, data: &Data) -> Result<String, HashError> {
        let mut hasher = Sha256::new();
        match &data.meta {
            Some(meta) => hash_meta(meta, &mut hasher),
            None => hasher.update(b"-"),
        }
        hash_structure(&data.value, &mut hasher)?;
        Ok(finish(hasher))
    }
}

/// Compute a stable fingerprint for an endpoint's melded schema.
///
/// Entry keys are already structural digests, so the fingerprint only
/// moves when a field appears or an entry's shape changes.
pub fn compute_fingerprint(method: &Method) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"args{");
    for key in method.args.keys() {
        update_str(&mut hasher, key);
    }
    hasher.update(b"}responses{");
    for key in method.responses.keys() {
        update_str(&mut hasher, key);
    }
    hasher.update(b"}");
    finish(hasher)
}

fn finish(hasher: Sha256) -> String {
    let result = hasher.finalize();
    hex::encode(&result[..8])
}

/// Length-prefixed so that adjacent names cannot run together.
fn update_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_meta(meta: &Meta, hasher: &mut Sha256) {
    hasher.update(b"meta(");
    update_str(hasher, meta.location.as_str());
    update_str(hasher, &meta.key);
    match meta.response_code {
        Some(code) => {
            hasher.update(b"r");
            hasher.update(code.to_le_bytes());
        }
        None => hasher.update(b"a"),
    }
    hasher.update(b")");
}

/// Recursively hash the structural parts of a value.
fn hash_structure(value: &Value, hasher: &mut Sha256) -> Result<(), HashError> {
    match value {
        Value::Primitive(p) => {
            hasher.update(b"prim:");
            update_str(hasher, p.kind.as_str());
            if let Some(fixed) = &p.fixed_values {
                if fixed.is_empty() {
                    return Err(HashError::EmptyFixedValues);
                }
                hasher.update(b"enum[");
                // BTreeSet iteration is sorted
                for v in fixed {
                    update_str(hasher, v);
                }
                hasher.update(b"]");
            }
        }
        Value::Struct(Struct::Record(fields)) => {
            hasher.update(b"struct{");
            for (name, field) in fields {
                update_str(hasher, name);
                hasher.update(b":");
                hash_structure(&field.value, hasher)?;
                hasher.update(b",");
            }
            hasher.update(b"}");
        }
        Value::Struct(Struct::Map { key, value }) => {
            if !matches!(key.value, Value::Primitive(_)) {
                return Err(HashError::NonPrimitiveMapKey {
                    found: key.kind_name(),
                });
            }
            hasher.update(b"map<");
            hash_structure(&key.value, hasher)?;
            hasher.update(b",");
            hash_structure(&value.value, hasher)?;
            hasher.update(b">");
        }
        Value::List(list) => {
            hasher.update(b"list[");
            for elem in &list.elems {
                hash_structure(&elem.value, hasher)?;
                hasher.update(b"|");
            }
            hasher.update(b"]");
        }
        Value::Optional(Some(inner)) => {
            hasher.update(b"opt(");
            hash_structure(&inner.value, hasher)?;
            hasher.update(b")");
        }
        Value::Optional(None) => {
            hasher.update(b"none");
        }
        Value::Union(union) => {
            if union.is_empty() {
                return Err(HashError::EmptyUnion);
            }
            hasher.update(b"union(");
            // Sort option digests so insertion history does not matter
            let mut digests = union
                .options()
                .map(|(_, option)| {
                    let mut h = Sha256::new();
                    hash_structure(&option.value, &mut h)?;
                    Ok(finish(h))
                })
                .collect::<Result<Vec<_>, HashError>>()?;
            digests.sort_unstable();
            for digest in digests {
                update_str(hasher, &digest);
            }
            hasher.update(b")");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Primitive, PrimitiveKind};
    use crate::meta::Location;
    use crate::meld::Melder;

    fn hash(data: &Data) -> String {
        Sha256Hasher.hash_value(&data.value).unwrap()
    }

    #[test]
    fn test_hash_stability() {
        let data = Data::record([("id", Data::int32()), ("name", Data::string())]);
        assert_eq!(hash(&data), hash(&data.clone()));
    }

    #[test]
    fn test_hash_ignores_annotations() {
        let plain = Data::string();
        let annotated = Data::from(
            Primitive::new(PrimitiveKind::String)
                .with_example("alice")
                .with_format("uuid")
                .with_type_hint("user_id"),
        );
        assert_eq!(hash(&plain), hash(&annotated));
    }

    #[test]
    fn test_hash_distinguishes_structure() {
        let a = Data::record([("id", Data::int32())]);
        let b = Data::record([("name", Data::int32())]);
        let c = Data::record([("id", Data::string())]);
        assert_ne!(hash(&a), hash(&b));
        assert_ne!(hash(&a), hash(&c));
        assert_ne!(hash(&Data::int32()), hash(&Data::optional(Data::int32())));
        assert_ne!(hash(&Data::none()), hash(&Data::optional(Data::int32())));
    }

    #[test]
    fn test_hash_distinguishes_fixed_values() {
        let open = Data::string();
        let closed = Data::from(Primitive::new(PrimitiveKind::String).with_fixed_values(["a"]));
        assert_ne!(hash(&open), hash(&closed));
    }

    #[test]
    fn test_entry_hash_includes_meta() {
        let query = Data::string().with_meta(Meta::arg(Location::Query, "q"));
        let header = Data::string().with_meta(Meta::arg(Location::Header, "q"));
        let h1 = Sha256Hasher.hash(&query).unwrap();
        let h2 = Sha256Hasher.hash(&header).unwrap();
        assert_ne!(h1, h2);

        // The value digest is the same regardless of where it was seen.
        assert_eq!(hash(&query), hash(&header));
    }

    #[test]
    fn test_digest_length() {
        assert_eq!(hash(&Data::bool()).len(), 16);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let empty_fixed = Data::from(
            Primitive::new(PrimitiveKind::String).with_fixed_values(Vec::<String>::new()),
        );
        assert_eq!(
            Sha256Hasher.hash_value(&empty_fixed.value),
            Err(HashError::EmptyFixedValues)
        );

        let empty_union = Data::from(Value::Union(Default::default()));
        assert_eq!(
            Sha256Hasher.hash_value(&empty_union.value),
            Err(HashError::EmptyUnion)
        );

        let bad_map = Data::from(Value::Struct(Struct::Map {
            key: Box::new(Data::list(vec![])),
            value: Box::new(Data::string()),
        }));
        assert_eq!(
            Sha256Hasher.hash_value(&bad_map.value),
            Err(HashError::NonPrimitiveMapKey { found: "list" })
        );
    }

    #[test]
    fn test_fingerprint_tracks_keys() {
        let mut method = Method::default();
        let empty = compute_fingerprint(&method);

        method
            .add_arg(&Melder::new(Default::default()), Data::string().with_meta(Meta::arg(Location::Query, "q")))
            .unwrap();
        assert_ne!(compute_fingerprint(&method), empty);
        assert_eq!(compute_fingerprint(&method).len(), 16);
    }
}
