use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::compute_fingerprint;
use crate::method::{MeldedMethod, Method};

/// State for a single endpoint's melded schema.
#[derive(Debug, Clone)]
pub struct EndpointSchemaState {
    /// The endpoint name
    pub endpoint: String,

    /// The melded schema (mutable for incremental updates)
    pub melded: MeldedMethod,

    /// Current schema fingerprint
    pub fingerprint: String,

    /// Monotonically increasing sequence number (increments on schema change)
    pub sequence: u64,

    /// Number of witnesses observed
    pub witness_count: u64,

    /// First observation timestamp
    pub first_seen: DateTime<Utc>,

    /// Most recent observation timestamp
    pub last_seen: DateTime<Utc>,

    /// Whether schema has stabilized (stopped melding)
    pub stabilized: bool,
}

impl EndpointSchemaState {
    pub fn new(endpoint: String, melded: MeldedMethod) -> Self {
        let fingerprint = compute_fingerprint(melded.method());
        let now = Utc::now();

        Self {
            endpoint,
            melded,
            fingerprint,
            sequence: 1,
            witness_count: 1,
            first_seen: now,
            last_seen: now,
            stabilized: false,
        }
    }

    pub fn method(&self) -> &Method {
        self.melded.method()
    }

    /// Recompute the fingerprint; returns whether it changed.
    pub fn update_fingerprint(&mut self) -> bool {
        let new_fp = compute_fingerprint(self.melded.method());
        if new_fp == self.fingerprint {
            return false;
        }
        self.fingerprint = new_fp;
        self.sequence += 1;
        true
    }

    pub fn record_observation(&mut self) {
        self.witness_count += 1;
        self.last_seen = Utc::now();
    }

    pub fn mark_stabilized(&mut self) {
        self.stabilized = true;
    }

    pub fn version(&self) -> SchemaVersion {
        SchemaVersion {
            fingerprint: self.fingerprint.clone(),
            sequence: self.sequence,
        }
    }
}

/// Schema version information for event enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaVersion {
    /// Structural fingerprint of the schema
    pub fingerprint: String,

    /// Monotonic sequence number
    pub sequence: u64,
}

/// Serializable schema snapshot for persistence/API.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaSnapshot {
    /// Endpoint name
    pub endpoint: String,

    /// The melded schema
    pub method: Method,

    /// Whether only 4xx responses have been seen so far
    pub has_4xx_only: bool,

    /// Current fingerprint
    pub fingerprint: String,

    /// Sequence number
    pub sequence: u64,

    /// Number of witnesses observed
    pub witness_count: u64,

    /// First seen timestamp
    pub first_seen: DateTime<Utc>,

    /// Last seen timestamp
    pub last_seen: DateTime<Utc>,

    /// Whether melding has stopped
    pub stabilized: bool,
}

impl From<&EndpointSchemaState> for SchemaSnapshot {
    fn from(state: &EndpointSchemaState) -> Self {
        Self {
            endpoint: state.endpoint.clone(),
            method: state.method().clone(),
            has_4xx_only: state.melded.has_4xx_only(),
            fingerprint: state.fingerprint.clone(),
            sequence: state.sequence,
            witness_count: state.witness_count,
            first_seen: state.first_seen,
            last_seen: state.last_seen,
            stabilized: state.stabilized,
        }
    }
}
