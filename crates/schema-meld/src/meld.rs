//! Recursive value melding.
//!
//! [`Melder::meld`] joins two schema nodes describing the same logical
//! field. The destination is mutated in place and the source is
//! consumed. Mismatched shapes are recorded as union options rather than
//! rejected, absent fields become Optional, and lists collapse to a
//! single representative element.

use std::collections::BTreeMap;

use meld_config::MeldingConfig;
use tracing::{debug, trace};

use crate::data::{Data, List, Primitive, Struct, Union, Value};
use crate::data_map::DataMap;
use crate::errors::{MeldError, MeldResult, display_path};
use crate::fingerprint::{DataHasher, Sha256Hasher};

/// How entries of a [`DataMap`] are keyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keying {
    /// Top-level entries: value plus field metadata.
    Entry,
    /// Union options: value only.
    Value,
}

/// The melding engine.
///
/// Holds the hashing service and the heuristics configuration; it is
/// stateless otherwise and can be shared by any number of accumulators.
#[derive(Debug, Clone, Default)]
pub struct Melder<H = Sha256Hasher> {
    hasher: H,
    config: MeldingConfig,
}

impl Melder<Sha256Hasher> {
    pub fn new(config: MeldingConfig) -> Self {
        Self::with_hasher(Sha256Hasher, config)
    }
}

impl<H: DataHasher> Melder<H> {
    pub fn with_hasher(hasher: H, config: MeldingConfig) -> Self {
        Self { hasher, config }
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn config(&self) -> &MeldingConfig {
        &self.config
    }

    /// Meld `src` into `dst`.
    ///
    /// Returns `true` if a new conflict was recorded along the way (a
    /// union was created or gained an option).
    ///
    /// Not atomic: `dst` is updated depth-first, so if hashing fails
    /// partway through a struct or list the error is returned with `dst`
    /// holding whatever was melded before the failure.
    pub fn meld(&self, dst: &mut Data, src: Data) -> MeldResult<bool> {
        self.meld_at("", dst, src)
    }

    /// Bring a freshly built value into melded form.
    ///
    /// Lists are collapsed to one representative element and records past
    /// the promotion thresholds become maps, so that melding the result
    /// with a copy of itself changes nothing. Returns `true` if collapsing
    /// a list recorded a conflict.
    pub fn normalize(&self, data: &mut Data) -> MeldResult<bool> {
        self.normalize_at("", data)
    }

    fn normalize_at(&self, path: &str, data: &mut Data) -> MeldResult<bool> {
        match &mut data.value {
            Value::Primitive(_) | Value::Optional(None) => Ok(false),
            Value::Optional(Some(inner)) => self.normalize_at(path, inner),
            Value::List(list) => {
                let elem_path = list_path(path);
                let mut conflict = false;
                for elem in list.elems.iter_mut() {
                    conflict |= self.normalize_at(&elem_path, elem)?;
                }
                conflict |= self.collapse_list(&elem_path, list)?;
                Ok(conflict)
            }
            Value::Struct(s) => {
                let mut conflict = false;
                match &mut *s {
                    Struct::Record(fields) => {
                        for (name, field) in fields.iter_mut() {
                            conflict |= self.normalize_at(&make_path(path, name), field)?;
                        }
                    }
                    Struct::Map { key, value } => {
                        conflict |= self.normalize_at(&map_key_path(path), key)?;
                        conflict |= self.normalize_at(&map_value_path(path), value)?;
                    }
                }
                self.maybe_promote(path, s)?;
                Ok(conflict)
            }
            Value::Union(union) => {
                let mut conflict = false;
                for option in union.options.values_mut() {
                    conflict |= self.normalize_at(path, option)?;
                }
                self.rehash(path, &mut union.options, Keying::Value)?;
                Ok(conflict)
            }
        }
    }

    pub(crate) fn meld_at(&self, path: &str, dst: &mut Data, src: Data) -> MeldResult<bool> {
        let Data {
            meta: src_meta,
            value: src_value,
        } = src;

        match src_value {
            Value::Union(src_union) => {
                if let Value::Union(dst_union) = &mut dst.value {
                    return self.merge_unions(path, dst_union, src_union);
                }
                // Make the union the destination and meld the plain value into it.
                let displaced = std::mem::replace(&mut dst.value, Value::Union(src_union));
                if dst.meta.is_none() {
                    dst.meta = src_meta;
                }
                self.meld_at(path, dst, Data::from(displaced))
            }
            Value::Optional(Some(inner)) => {
                let conflict = self.meld_at(path, dst, *inner)?;
                dst.make_optional();
                Ok(conflict)
            }
            Value::Optional(None) => {
                // Presence wins over absence.
                dst.make_optional();
                Ok(false)
            }
            concrete => self.meld_concrete(path, dst, concrete),
        }
    }

    /// `src` is a primitive, struct or list here.
    fn meld_concrete(&self, path: &str, dst: &mut Data, src: Value) -> MeldResult<bool> {
        let mismatched = match (&mut dst.value, src) {
            (Value::Optional(slot), src) => {
                return match slot {
                    Some(inner) => self.meld_at(path, inner, Data::from(src)),
                    None => {
                        *slot = Some(Box::new(Data::from(src)));
                        Ok(false)
                    }
                };
            }
            (Value::Union(union), src) => {
                return self.add_option(path, union, Data::from(src));
            }
            (Value::Struct(d), Value::Struct(s)) => return self.meld_struct(path, d, s),
            (Value::List(d), Value::List(s)) => return self.meld_list(path, d, s),
            (Value::Primitive(d), Value::Primitive(s)) => {
                match meld_primitive(d, s, self.config.max_example_values) {
                    None => return Ok(false),
                    Some(s) => Value::Primitive(s),
                }
            }
            (_, src) => src,
        };
        self.record_conflict(path, dst, Data::from(mismatched))
    }

    /// Replace `dst` with a union of `{dst, src}`, or extend it if it is
    /// one already.
    fn record_conflict(&self, path: &str, dst: &mut Data, src: Data) -> MeldResult<bool> {
        let src = src.without_meta();
        if let Value::Union(union) = &mut dst.value {
            return self.add_option(path, union, src);
        }

        // Hash both sides before touching dst so a failure leaves it intact.
        let dst_hash = self.hash_option(path, &dst.value)?;
        let src_hash = self.hash_option(path, &src.value)?;

        let displaced = std::mem::replace(&mut dst.value, Value::Optional(None));
        let mut options = DataMap::new();
        let _ = options.try_insert(dst_hash, Data::from(displaced));
        if let Err(same_shape) = options.try_insert(src_hash.clone(), src) {
            if let Some(existing) = options.get_mut(&src_hash) {
                self.meld_at(path, existing, same_shape)?;
            }
        }

        debug!(
            path = %display_path(path),
            options = options.len(),
            "recorded type conflict"
        );
        dst.value = Value::Union(Union {
            options,
            potential_conflict: true,
        });
        Ok(true)
    }

    /// Fold `option` into `union`: merge with an equal-shaped option, or
    /// with an option of the same container variant, or add it.
    fn add_option(&self, path: &str, union: &mut Union, option: Data) -> MeldResult<bool> {
        let option = option.without_meta();
        let hash = self.hash_option(path, &option.value)?;

        if let Some(existing) = union.options.get_mut(&hash) {
            self.meld_at(path, existing, option)?;
            self.rehash(path, &mut union.options, Keying::Value)?;
            return Ok(false);
        }

        // Two records (or two lists) are compatible alternatives; join them
        // instead of multiplying options.
        let compatible = union
            .options
            .iter()
            .find(|(_, existing)| same_container(&existing.value, &option.value))
            .map(|(h, _)| h.to_owned());
        if let Some(target) = compatible {
            if let Some(existing) = union.options.get_mut(&target) {
                self.meld_at(path, existing, option)?;
            }
            self.rehash(path, &mut union.options, Keying::Value)?;
            return Ok(false);
        }

        trace!(path = %display_path(path), option = %hash, "added union option");
        let _ = union.options.try_insert(hash, option);
        Ok(true)
    }

    fn merge_unions(&self, path: &str, dst: &mut Union, src: Union) -> MeldResult<bool> {
        dst.potential_conflict |= src.potential_conflict;
        let mut conflict = false;
        for (_, option) in src.options.into_entries() {
            conflict |= self.add_option(path, dst, option)?;
        }
        Ok(conflict)
    }

    fn meld_list(&self, path: &str, dst: &mut List, src: List) -> MeldResult<bool> {
        let elem_path = list_path(path);
        let mut conflict = self.collapse_list(&elem_path, dst)?;
        for elem in src.elems {
            match dst.elems.first_mut() {
                Some(representative) => {
                    conflict |= self.meld_at(&elem_path, representative, elem)?;
                }
                None => dst.elems.push(elem.without_meta()),
            }
        }
        Ok(conflict)
    }

    /// Reduce a list to one element holding the join of all of them.
    fn collapse_list(&self, elem_path: &str, list: &mut List) -> MeldResult<bool> {
        if list.elems.len() <= 1 {
            return Ok(false);
        }
        let mut conflict = false;
        let mut elems = std::mem::take(&mut list.elems).into_iter();
        if let Some(mut representative) = elems.next() {
            for elem in elems {
                conflict |= self.meld_at(elem_path, &mut representative, elem)?;
            }
            list.elems.push(representative);
        }
        Ok(conflict)
    }

    fn meld_struct(&self, path: &str, dst: &mut Struct, src: Struct) -> MeldResult<bool> {
        match src {
            Struct::Map { key, value } => {
                if !dst.is_map() {
                    self.promote(path, dst)?;
                }
                self.meld_into_map(path, dst, *key, *value)
            }
            Struct::Record(fields) if dst.is_map() => match self.record_to_map(path, fields)? {
                Some((key, value)) => self.meld_into_map(path, dst, key, value),
                None => Ok(false),
            },
            Struct::Record(fields) => self.meld_records(path, dst, fields),
        }
    }

    fn meld_into_map(&self, path: &str, dst: &mut Struct, key: Data, value: Data) -> MeldResult<bool> {
        let Struct::Map {
            key: dst_key,
            value: dst_value,
        } = dst
        else {
            return Ok(false);
        };
        let mut conflict = self.meld_at(&map_key_path(path), dst_key, key)?;
        conflict |= self.meld_at(&map_value_path(path), dst_value, value)?;
        Ok(conflict)
    }

    fn meld_records(
        &self,
        path: &str,
        dst: &mut Struct,
        src_fields: BTreeMap<String, Data>,
    ) -> MeldResult<bool> {
        let Struct::Record(dst_fields) = dst else {
            return Ok(false);
        };

        for (name, field) in dst_fields.iter_mut() {
            if !src_fields.contains_key(name) {
                field.make_optional();
            }
        }

        let mut conflict = false;
        for (name, field) in src_fields {
            let child = make_path(path, &name);
            match dst_fields.get_mut(&name) {
                Some(existing) => conflict |= self.meld_at(&child, existing, field)?,
                None => {
                    trace!(path = %child, "new optional field");
                    let mut field = field.without_meta();
                    field.make_optional();
                    dst_fields.insert(name, field);
                }
            }
        }

        self.maybe_promote(path, dst)?;
        Ok(conflict)
    }

    fn hash_option(&self, path: &str, value: &Value) -> MeldResult<String> {
        self.hasher
            .hash_value(value)
            .map_err(|e| MeldError::hash(path, e))
    }

    /// Recompute every key of `map` after its entries were mutated.
    ///
    /// Entries whose keys now coincide describe the same shape and are
    /// melded together. Keys are computed before the map is touched, so a
    /// hashing failure leaves it as it was.
    pub(crate) fn rehash(&self, path: &str, map: &mut DataMap, keying: Keying) -> MeldResult<()> {
        let keys = map
            .values()
            .map(|data| match keying {
                Keying::Entry => self.hasher.hash(data),
                Keying::Value => self.hasher.hash_value(&data.value),
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MeldError::hash(path, e))?;

        let entries = std::mem::take(map).into_entries();
        for (key, (_, data)) in keys.into_iter().zip(entries) {
            if let Err(duplicate) = map.try_insert(key.clone(), data) {
                if let Some(existing) = map.get_mut(&key) {
                    self.meld_at(path, existing, duplicate)?;
                }
            }
        }
        Ok(())
    }
}

/// Meld two primitives; hands `src` back when their shapes differ.
fn meld_primitive(dst: &mut Primitive, mut src: Primitive, max_examples: usize) -> Option<Primitive> {
    // A hint known on one side only is adopted by both.
    match (dst.type_hint.is_empty(), src.type_hint.is_empty()) {
        (true, false) => dst.type_hint = src.type_hint.clone(),
        (false, true) => src.type_hint = dst.type_hint.clone(),
        _ => {}
    }

    if !dst.same_shape(&src) {
        return Some(src);
    }

    dst.formats.extend(src.formats);
    dst.absorb_examples(src.examples, max_examples);
    None
}

fn same_container(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Struct(_), Value::Struct(_)) | (Value::List(_), Value::List(_))
    )
}

pub(crate) fn make_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{}.{}", parent, child)
    }
}

fn list_path(path: &str) -> String {
    format!("{}[]", path)
}

fn map_key_path(path: &str) -> String {
    make_path(path, "<key>")
}

pub(crate) fn map_value_path(path: &str) -> String {
    make_path(path, "<*>")
}
