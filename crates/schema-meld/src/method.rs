//! Endpoint-level schemas and the argument trust policy.

use serde::Serialize;
use tracing::debug;

use crate::data::Data;
use crate::data_map::DataMap;
use crate::errors::{MeldError, MeldResult};
use crate::fingerprint::{DataHasher, Sha256Hasher};
use crate::meld::Melder;

/// The schema of one endpoint: its request arguments and response parts,
/// each keyed by the hash of the top-level entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Method {
    pub args: DataMap,
    pub responses: DataMap,
}

impl Method {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request argument.
    ///
    /// The value is normalized first. An argument whose metadata matches
    /// an existing entry is melded into it, so each location holds one
    /// entry.
    pub fn add_arg<H: DataHasher>(&mut self, melder: &Melder<H>, data: Data) -> MeldResult<()> {
        add_entry(&mut self.args, melder, data)
    }

    /// Add a response part, joining it with an entry of equal metadata.
    pub fn add_response<H: DataHasher>(&mut self, melder: &Melder<H>, data: Data) -> MeldResult<()> {
        add_entry(&mut self.responses, melder, data)
    }

    /// Whether every response seen has a 4xx status.
    ///
    /// A method with no responses at all is not 4xx-only.
    pub fn has_4xx_only(&self) -> bool {
        !self.responses.is_empty()
            && self
                .responses
                .values()
                .all(|d| d.meta.as_ref().is_some_and(|m| m.is_4xx()))
    }
}

fn add_entry<H: DataHasher>(map: &mut DataMap, melder: &Melder<H>, mut data: Data) -> MeldResult<()> {
    let path = data.meta.as_ref().map(ToString::to_string).unwrap_or_default();
    melder.normalize(&mut data)?;
    let hash = melder.hasher().hash(&data).map_err(|e| MeldError::hash(&path, e))?;

    let mut entry = DataMap::new();
    let _ = entry.try_insert(hash, data);
    melder.meld_top_level(map, entry)
}

/// Long-lived accumulator for one endpoint.
///
/// Tracks whether every witness melded so far only ever produced 4xx
/// responses. The arguments of such witnesses are likely malformed or
/// unauthorized requests, so they give way to the arguments of the first
/// witness that got a non-4xx answer.
#[derive(Debug, Clone)]
pub struct MeldedMethod<H = Sha256Hasher> {
    method: Method,
    has_4xx_only: bool,
    melder: Melder<H>,
}

impl MeldedMethod<Sha256Hasher> {
    pub fn new(method: Method) -> Self {
        Self::with_melder(method, Melder::default())
    }
}

impl<H: DataHasher> MeldedMethod<H> {
    pub fn with_melder(method: Method, melder: Melder<H>) -> Self {
        let has_4xx_only = method.has_4xx_only();
        Self {
            method,
            has_4xx_only,
            melder,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn into_method(self) -> Method {
        self.method
    }

    pub fn has_4xx_only(&self) -> bool {
        self.has_4xx_only
    }

    pub fn melder(&self) -> &Melder<H> {
        &self.melder
    }

    /// Meld a newly observed method into the accumulator.
    ///
    /// Responses are always melded. Arguments follow the 4xx trust policy:
    /// a 4xx-only accumulator adopts the arguments of a non-4xx-only
    /// witness wholesale, and a 4xx-only witness never changes the
    /// arguments of a non-4xx-only accumulator.
    ///
    /// Not atomic: on error the accumulator may be partially updated.
    pub fn meld(&mut self, src: Method) -> MeldResult<()> {
        let src_4xx_only = src.has_4xx_only();
        let Method { args, responses } = src;

        self.melder
            .meld_top_level(&mut self.method.responses, responses)?;

        match (self.has_4xx_only, src_4xx_only) {
            (true, false) => {
                debug!(
                    discarded = self.method.args.len(),
                    adopted = args.len(),
                    "replacing arguments seen only with 4xx responses"
                );
                self.method.args = args;
                self.has_4xx_only = false;
            }
            (false, true) => {
                debug!(ignored = args.len(), "ignoring arguments of 4xx-only witness");
            }
            (dst, src) => {
                self.melder.meld_top_level(&mut self.method.args, args)?;
                self.has_4xx_only = dst && src;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Primitive, PrimitiveKind};
    use crate::meta::{Location, Meta};
    use pretty_assertions::assert_eq;

    fn method(arg_example: &str, status: u16) -> Method {
        let melder = Melder::new(Default::default());
        let mut m = Method::new();
        m.add_arg(
            &melder,
            Data::from(Primitive::new(PrimitiveKind::String).with_example(arg_example))
                .with_meta(Meta::arg(Location::Query, "a")),
        )
        .unwrap();
        m.add_response(
            &melder,
            Data::string().with_meta(Meta::response(status, Location::Body, "text/plain")),
        )
        .unwrap();
        m
    }

    fn arg_examples(m: &Method) -> Vec<String> {
        let arg = m.args.values().next().unwrap();
        arg.as_primitive().unwrap().examples.iter().cloned().collect()
    }

    #[test]
    fn test_has_4xx_only() {
        assert!(method("x", 404).has_4xx_only());
        assert!(!method("x", 200).has_4xx_only());
        assert!(!Method::new().has_4xx_only());

        let mut mixed = method("x", 404);
        mixed
            .add_response(
                &Melder::new(Default::default()),
                Data::string().with_meta(Meta::response(500, Location::Body, "text/plain")),
            )
            .unwrap();
        assert!(!mixed.has_4xx_only());
    }

    #[test]
    fn test_4xx_accumulator_adopts_good_arguments() {
        let mut acc = MeldedMethod::new(method("x", 404));
        assert!(acc.has_4xx_only());

        acc.meld(method("y", 200)).unwrap();

        assert!(!acc.has_4xx_only());
        assert_eq!(acc.method().args.len(), 1);
        assert_eq!(arg_examples(acc.method()), vec!["y"]);
        assert_eq!(acc.method().responses.len(), 2);
    }

    #[test]
    fn test_4xx_witness_arguments_are_ignored() {
        let mut acc = MeldedMethod::new(method("y", 200));
        acc.meld(method("x", 404)).unwrap();

        assert!(!acc.has_4xx_only());
        assert_eq!(arg_examples(acc.method()), vec!["y"]);
        // Responses are melded regardless.
        assert_eq!(acc.method().responses.len(), 2);
    }

    #[test]
    fn test_both_4xx_meld_arguments() {
        let mut acc = MeldedMethod::new(method("x", 404));
        acc.meld(method("y", 401)).unwrap();

        assert!(acc.has_4xx_only());
        assert_eq!(arg_examples(acc.method()), vec!["x", "y"]);
    }

    #[test]
    fn test_neither_4xx_meld_arguments() {
        let mut acc = MeldedMethod::new(method("x", 200));
        acc.meld(method("y", 201)).unwrap();

        assert!(!acc.has_4xx_only());
        assert_eq!(arg_examples(acc.method()), vec!["x", "y"]);
    }

    #[test]
    fn test_same_location_keeps_one_entry() {
        let melder = Melder::new(Default::default());
        let q = Meta::arg(Location::Query, "q");
        let mut m = Method::new();
        m.add_arg(&melder, Data::string().with_meta(q.clone())).unwrap();
        m.add_arg(&melder, Data::int32().with_meta(q.clone())).unwrap();
        assert_eq!(m.args.len(), 1);

        let mut src = Method::new();
        src.add_arg(&melder, Data::bool().with_meta(q.clone())).unwrap();
        let mut acc = MeldedMethod::new(m);
        acc.meld(src).unwrap();

        assert_eq!(acc.method().args.len(), 1);
        let entry = acc.method().args.values().next().unwrap();
        assert_eq!(entry.meta, Some(q));
        assert_eq!(entry.as_union().unwrap().len(), 3);
    }

    #[test]
    fn test_equal_shapes_keep_both_examples() {
        let melder = Melder::new(Default::default());
        let q = Meta::arg(Location::Query, "q");
        let mut m = Method::new();
        for example in ["x", "y"] {
            m.add_arg(
                &melder,
                Data::from(Primitive::new(PrimitiveKind::String).with_example(example))
                    .with_meta(q.clone()),
            )
            .unwrap();
        }
        assert_eq!(m.args.len(), 1);
        assert_eq!(arg_examples(&m), vec!["x", "y"]);
    }

    #[test]
    fn test_added_entries_are_normalized() {
        let mut m = Method::new();
        m.add_response(
            &Melder::new(Default::default()),
            Data::list(vec![Data::string(), Data::string()])
                .with_meta(Meta::response(200, Location::Body, "application/json")),
        )
        .unwrap();
        let body = m.responses.values().next().unwrap();
        assert_eq!(body.as_list().unwrap().elems.len(), 1);
    }
}
