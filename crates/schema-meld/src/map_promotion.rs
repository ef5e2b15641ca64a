//! Record-to-map promotion.
//!
//! Records whose field set keeps growing (dynamic keys such as ids or
//! timestamps used as object keys) are turned into a `key -> value` map
//! once they cross the configured thresholds. The key is always a plain
//! string; the value is the join of every field's value. Promotion is
//! one-way.

use std::collections::BTreeMap;

use tracing::debug;

use crate::data::{Data, Struct};
use crate::errors::{MeldResult, display_path};
use crate::fingerprint::DataHasher;
use crate::meld::{Melder, map_value_path};

impl<H: DataHasher> Melder<H> {
    /// Promote `s` if it is a record past either threshold.
    pub(crate) fn maybe_promote(&self, path: &str, s: &mut Struct) -> MeldResult<()> {
        let Struct::Record(fields) = s else {
            return Ok(());
        };
        let total = fields.len();
        let optional = fields.values().filter(|f| f.is_optional()).count();
        if !self.config().map_promotion.should_promote(total, optional) {
            return Ok(());
        }

        debug!(
            path = %display_path(path),
            fields = total,
            optional_fields = optional,
            "promoting record to map"
        );
        self.promote(path, s)
    }

    /// Turn a record into a map unconditionally. Maps are left alone.
    pub(crate) fn promote(&self, path: &str, s: &mut Struct) -> MeldResult<()> {
        let Struct::Record(fields) = s else {
            return Ok(());
        };
        let fields = std::mem::take(fields);
        let (key, value) = match self.record_to_map(path, fields)? {
            Some(entry) => entry,
            // Only absent fields seen so far.
            None => (Data::string(), Data::none()),
        };
        *s = Struct::Map {
            key: Box::new(key),
            value: Box::new(value),
        };
        Ok(())
    }

    /// Join every present field value of a record into one map value.
    ///
    /// Returns `None` when the record has no present fields.
    pub(crate) fn record_to_map(
        &self,
        path: &str,
        fields: BTreeMap<String, Data>,
    ) -> MeldResult<Option<(Data, Data)>> {
        let value_path = map_value_path(path);
        let mut joined: Option<Data> = None;

        for field in fields.into_values() {
            let Some(present) = field.into_present() else {
                continue;
            };
            let present = present.without_meta();
            match joined.as_mut() {
                Some(seed) => {
                    self.meld_at(&value_path, seed, present)?;
                }
                None => joined = Some(present),
            }
        }

        Ok(joined.map(|value| (Data::string(), value)))
    }
}
