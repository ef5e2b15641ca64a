//! Schema Meld - API schema inference by melding observed calls.
//!
//! Every observed call (a *witness*) of an endpoint is turned into a small
//! schema tree, and the trees are melded into one accumulator: the least
//! upper bound of every shape seen so far. Mismatched shapes become
//! unions, fields missing from some calls become optional, lists collapse
//! to one representative element and records with too many dynamic keys
//! are promoted to maps.
//!
//! # Features
//!
//! - **Value melding**: [`Melder::meld`] joins two schema trees in place
//! - **Top-level matching**: arg/response entries matched by [`Meta`]
//! - **Argument trust policy**: arguments of 4xx-only calls give way to good ones
//! - **Alternative selection**: [`instantiate_union`] picks the best union option
//! - **Evolution tracking**: [`EndpointSensor`] fingerprints each endpoint's schema
//! - **JSON Schema export**: converts melded schemas to JSON Schema
//!
//! # Example
//!
//! ```ignore
//! use schema_meld::{EndpointSensor, Location, Meta, Witness};
//! use serde_json::json;
//!
//! let mut sensor = EndpointSensor::enabled();
//!
//! let witness = Witness::default()
//!     .arg(Meta::arg(Location::Query, "limit"), json!(10))
//!     .response(Meta::response(200, Location::Body, "application/json"), json!({"id": "u1"}));
//! sensor.observe("GET /users", &witness)?;
//!
//! if let Some(version) = sensor.get_version("GET /users") {
//!     println!("Schema version: {}, sequence: {}", version.fingerprint, version.sequence);
//! }
//! ```

mod data;
mod data_map;
mod errors;
mod fingerprint;
mod instantiate;
mod json_schema;
mod map_promotion;
mod meld;
mod meta;
mod method;
mod schema_state;
mod sensor;
mod top_level;
mod witness;

pub use data::{Data, List, Primitive, PrimitiveKind, Struct, Union, Value};
pub use data_map::DataMap;
pub use errors::{HashError, MeldError, MeldResult};
pub use fingerprint::{DataHasher, Sha256Hasher, compute_fingerprint};
pub use instantiate::{conform, count_leaves, instantiate_union};
pub use json_schema::{JsonSchema, JsonSchemaType, to_json_schema};
pub use meld::Melder;
pub use meta::{Location, Meta};
pub use method::{MeldedMethod, Method};
pub use schema_state::{EndpointSchemaState, SchemaSnapshot, SchemaVersion};
pub use sensor::{EndpointSensor, ObserveResult};
pub use witness::{Observation, Witness};

pub use meld_config::{MapPromotionConfig, MeldingConfig, SchemaInferenceConfig};
