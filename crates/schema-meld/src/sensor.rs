use std::collections::BTreeMap;

use tracing::{debug, info, trace, warn};

use meld_config::SchemaInferenceConfig;

use crate::errors::MeldResult;
use crate::json_schema::{JsonSchema, to_json_schema};
use crate::meld::Melder;
use crate::method::{MeldedMethod, Method};
use crate::schema_state::{EndpointSchemaState, SchemaSnapshot, SchemaVersion};
use crate::witness::Witness;

/// Result of observing a witness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserveResult {
    /// Schema inference is disabled for this endpoint
    Disabled,

    /// First witness for this endpoint - schema initialized
    NewSchema { fingerprint: String, sequence: u64 },

    /// Schema changed from observing this witness
    Evolved {
        old_fingerprint: String,
        new_fingerprint: String,
        old_sequence: u64,
        new_sequence: u64,
    },

    /// Schema unchanged
    Unchanged { fingerprint: String, sequence: u64 },

    /// Witness limit reached - schema stabilized
    Stabilized { fingerprint: String, sequence: u64 },
}

/// Per-endpoint schema inference session.
///
/// Melds every witness of an endpoint into one accumulator and tracks
/// how its schema evolves. Endpoints are independent of each other; a
/// sensor itself is not shared between threads without external locking.
#[derive(Debug)]
pub struct EndpointSensor {
    /// Configuration
    config: SchemaInferenceConfig,

    /// Melding engine shared by every endpoint
    melder: Melder,

    /// Per-endpoint schema state
    endpoints: BTreeMap<String, EndpointSchemaState>,
}

impl EndpointSensor {
    pub fn new(config: SchemaInferenceConfig) -> Self {
        let melder = Melder::new(config.melding.clone());
        Self {
            config,
            melder,
            endpoints: BTreeMap::new(),
        }
    }

    /// Create a sensor with inference enabled for every endpoint.
    pub fn enabled() -> Self {
        Self::new(SchemaInferenceConfig {
            enabled: true,
            ..Default::default()
        })
    }

    /// Check if inference is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Observe a witness and update the endpoint's schema.
    ///
    /// A meld failure is returned after the witness has been counted; the
    /// accumulator may hold part of it.
    pub fn observe(&mut self, endpoint: &str, witness: &Witness) -> MeldResult<ObserveResult> {
        if !self.config.should_sense_endpoint(endpoint) {
            return Ok(ObserveResult::Disabled);
        }

        let Some(state) = self.endpoints.get_mut(endpoint) else {
            // First witness for this endpoint becomes the accumulator
            let method = Method::from_witness(witness, &self.melder)?;
            let melded = MeldedMethod::with_melder(method, self.melder.clone());
            let state = EndpointSchemaState::new(endpoint.to_string(), melded);

            info!(
                endpoint = %endpoint,
                fingerprint = %state.fingerprint,
                has_4xx_only = state.melded.has_4xx_only(),
                "new endpoint schema discovered"
            );
            let result = ObserveResult::NewSchema {
                fingerprint: state.fingerprint.clone(),
                sequence: state.sequence,
            };
            self.endpoints.insert(endpoint.to_string(), state);
            return Ok(result);
        };

        if state.stabilized {
            return Ok(ObserveResult::Stabilized {
                fingerprint: state.fingerprint.clone(),
                sequence: state.sequence,
            });
        }

        if self.config.is_saturated(state.witness_count) {
            state.mark_stabilized();
            info!(
                endpoint = %endpoint,
                witnesses = state.witness_count,
                "schema stabilized after witness limit"
            );
            return Ok(ObserveResult::Stabilized {
                fingerprint: state.fingerprint.clone(),
                sequence: state.sequence,
            });
        }

        let old_fingerprint = state.fingerprint.clone();
        let old_sequence = state.sequence;

        let melded = Method::from_witness(witness, &self.melder)
            .and_then(|method| state.melded.meld(method));
        state.record_observation();
        let evolved = state.update_fingerprint();

        if let Err(e) = melded {
            warn!(endpoint = %endpoint, error = %e, "failed to meld witness");
            return Err(e);
        }

        if evolved {
            debug!(
                endpoint = %endpoint,
                old_fp = %old_fingerprint,
                new_fp = %state.fingerprint,
                sequence = state.sequence,
                "schema evolved"
            );
            Ok(ObserveResult::Evolved {
                old_fingerprint,
                new_fingerprint: state.fingerprint.clone(),
                old_sequence,
                new_sequence: state.sequence,
            })
        } else {
            trace!(endpoint = %endpoint, witnesses = state.witness_count, "schema unchanged");
            Ok(ObserveResult::Unchanged {
                fingerprint: state.fingerprint.clone(),
                sequence: state.sequence,
            })
        }
    }

    /// Parse a JSON witness document and observe it.
    pub fn observe_json(&mut self, endpoint: &str, json: &[u8]) -> MeldResult<ObserveResult> {
        if !self.config.should_sense_endpoint(endpoint) {
            return Ok(ObserveResult::Disabled);
        }
        let witness = Witness::from_slice(json)?;
        self.observe(endpoint, &witness)
    }

    /// Get schema version info for an endpoint.
    pub fn get_version(&self, endpoint: &str) -> Option<SchemaVersion> {
        self.endpoints.get(endpoint).map(|s| s.version())
    }

    /// Get full schema snapshot for an endpoint.
    pub fn get_snapshot(&self, endpoint: &str) -> Option<SchemaSnapshot> {
        self.endpoints.get(endpoint).map(SchemaSnapshot::from)
    }

    /// Get snapshots for all endpoints.
    pub fn all_snapshots(&self) -> Vec<SchemaSnapshot> {
        self.endpoints.values().map(SchemaSnapshot::from).collect()
    }

    /// Get the melded method for an endpoint.
    pub fn get_method(&self, endpoint: &str) -> Option<&Method> {
        self.endpoints.get(endpoint).map(|s| s.method())
    }

    /// Get all endpoint names being tracked, sorted.
    pub fn endpoints(&self) -> Vec<&str> {
        self.endpoints.keys().map(|s| s.as_str()).collect()
    }

    /// Get witness count for an endpoint.
    pub fn witness_count(&self, endpoint: &str) -> u64 {
        self.endpoints
            .get(endpoint)
            .map(|s| s.witness_count)
            .unwrap_or(0)
    }

    /// Check if an endpoint's schema has stabilized.
    pub fn is_stabilized(&self, endpoint: &str) -> bool {
        self.endpoints
            .get(endpoint)
            .map(|s| s.stabilized)
            .unwrap_or(false)
    }

    /// Reset tracking for an endpoint.
    pub fn reset_endpoint(&mut self, endpoint: &str) {
        self.endpoints.remove(endpoint);
    }

    /// Reset all tracking.
    pub fn reset_all(&mut self) {
        self.endpoints.clear();
    }

    /// Get configuration.
    pub fn config(&self) -> &SchemaInferenceConfig {
        &self.config
    }

    /// Export an endpoint's schema as JSON Schema, one document per
    /// top-level field keyed by where it was observed.
    pub fn to_json_schema(&self, endpoint: &str) -> Option<BTreeMap<String, JsonSchema>> {
        self.endpoints.get(endpoint).map(|s| method_json_schemas(s.method()))
    }

    /// Export all schemas as JSON Schema.
    pub fn all_json_schemas(&self) -> BTreeMap<String, BTreeMap<String, JsonSchema>> {
        self.endpoints
            .iter()
            .map(|(endpoint, state)| (endpoint.clone(), method_json_schemas(state.method())))
            .collect()
    }
}

fn method_json_schemas(method: &Method) -> BTreeMap<String, JsonSchema> {
    method
        .args
        .values()
        .chain(method.responses.values())
        .map(|data| {
            let key = data
                .meta
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            (key, to_json_schema(data))
        })
        .collect()
}
