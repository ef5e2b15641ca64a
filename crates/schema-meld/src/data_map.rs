//! Hash-keyed collections of schema nodes.
//!
//! Entries live in an arena; a separate `hash -> slot` table gives the
//! deterministic, sorted view. Mutating an entry makes its key stale, so
//! whoever mutates is responsible for rebuilding the table afterwards
//! (see `Melder::rehash`).

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::data::Data;

#[derive(Debug, Clone, Default)]
pub struct DataMap {
    entries: Vec<Data>,
    index: BTreeMap<String, usize>,
}

impl DataMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains_key(&self, hash: &str) -> bool {
        self.index.contains_key(hash)
    }

    pub fn get(&self, hash: &str) -> Option<&Data> {
        let slot = *self.index.get(hash)?;
        self.entries.get(slot)
    }

    pub(crate) fn get_mut(&mut self, hash: &str) -> Option<&mut Data> {
        let slot = *self.index.get(hash)?;
        self.entries.get_mut(slot)
    }

    /// Entries in slot order. Keys go stale once an entry is mutated.
    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Data> {
        self.entries.iter_mut()
    }

    /// Entries in hash order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Data)> {
        self.index
            .iter()
            .filter_map(|(hash, slot)| self.entries.get(*slot).map(|d| (hash.as_str(), d)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Data> {
        self.iter().map(|(_, d)| d)
    }

    /// Insert under `hash`, handing `data` back if the key is taken.
    pub fn try_insert(&mut self, hash: String, data: Data) -> Result<(), Data> {
        if self.index.contains_key(&hash) {
            return Err(data);
        }
        self.index.insert(hash, self.entries.len());
        self.entries.push(data);
        Ok(())
    }

    /// Consume the map, yielding entries in hash order.
    pub fn into_entries(self) -> Vec<(String, Data)> {
        let mut slots: Vec<Option<Data>> = self.entries.into_iter().map(Some).collect();
        self.index
            .into_iter()
            .filter_map(|(hash, slot)| {
                slots
                    .get_mut(slot)
                    .and_then(Option::take)
                    .map(|data| (hash, data))
            })
            .collect()
    }
}

impl PartialEq for DataMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl Serialize for DataMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (hash, data) in self.iter() {
            map.serialize_entry(hash, data)?;
        }
        map.end()
    }
}
