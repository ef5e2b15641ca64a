//! Matching of top-level arg/response entries across witnesses.
//!
//! Entry keys are content hashes, which differ whenever the same logical
//! field was observed with a different shape. Matching therefore goes by
//! [`Meta`]: entries with equal metadata are melded, everything else is
//! carried over untouched. The field set only grows.

use std::collections::BTreeMap;

use tracing::trace;

use crate::data_map::DataMap;
use crate::errors::MeldResult;
use crate::fingerprint::DataHasher;
use crate::meld::{Keying, Melder};
use crate::meta::Meta;

impl<H: DataHasher> Melder<H> {
    /// Meld the entries of `src` into `dst`, matching them by metadata.
    ///
    /// Melded entries are re-keyed by the hash of their new shape. If an
    /// entry fails to meld, the entries melded before it are still
    /// re-keyed before the error is returned.
    pub fn meld_top_level(&self, dst: &mut DataMap, src: DataMap) -> MeldResult<()> {
        let mut melded = false;
        let outcome = self.meld_entries(dst, src, &mut melded);
        if melded {
            let rehashed = self.rehash("", dst, Keying::Entry);
            outcome?;
            return rehashed;
        }
        outcome
    }

    fn meld_entries(&self, dst: &mut DataMap, src: DataMap, melded: &mut bool) -> MeldResult<()> {
        let by_meta: BTreeMap<Option<Meta>, String> = dst
            .iter()
            .map(|(hash, data)| (data.meta.clone(), hash.to_owned()))
            .collect();

        for (hash, data) in src.into_entries() {
            let path = entry_path(data.meta.as_ref());
            let target = by_meta
                .get(&data.meta)
                .and_then(|dst_hash| dst.get_mut(dst_hash));

            match target {
                Some(existing) => {
                    *melded = true;
                    self.meld_at(&path, existing, data)?;
                }
                None => {
                    trace!(path = %path, "new top-level entry");
                    if let Err(data) = dst.try_insert(hash.clone(), data) {
                        // Same hash under a different meta cannot happen with
                        // meta-aware hashing; meld rather than drop it.
                        if let Some(existing) = dst.get_mut(&hash) {
                            *melded = true;
                            self.meld_at(&path, existing, data)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn entry_path(meta: Option<&Meta>) -> String {
    meta.map(Meta::to_string).unwrap_or_default()
}
