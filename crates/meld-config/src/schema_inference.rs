//! Schema inference configuration.
//!
//! Controls which endpoints are sensed and the heuristics the melding
//! engine applies while folding witnesses into a schema.

use serde::{Deserialize, Serialize};

/// Record-shaped structs with more fields than this become maps.
pub const DEFAULT_MAX_STRUCT_FIELDS: usize = 100;

/// Record-shaped structs with more Optional fields than this become maps.
pub const DEFAULT_MAX_OPTIONAL_FIELDS: usize = 15;

/// Example values retained per primitive.
pub const DEFAULT_MAX_EXAMPLE_VALUES: usize = 2;

/// Witnesses melded per endpoint before the schema is frozen (0 = unlimited).
pub const DEFAULT_MAX_WITNESSES: usize = 0;

/// Schema inference configuration.
///
/// When enabled, every witness observed for a matching endpoint is
/// melded into that endpoint's accumulated schema.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchemaInferenceConfig {
    /// Master switch - disabled by default
    #[serde(default)]
    pub enabled: bool,

    /// Endpoint filtering - which endpoints to sense
    #[serde(default)]
    pub endpoints: EndpointFilter,

    /// Stop melding after this many witnesses per endpoint.
    /// Set to 0 for unlimited melding.
    #[serde(default = "default_max_witnesses")]
    pub max_witnesses: usize,

    /// Melding heuristics
    #[serde(default)]
    pub melding: MeldingConfig,
}

/// Filter which endpoints to apply schema inference to.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EndpointFilter {
    /// Endpoints to include (if empty, all endpoints are included).
    /// Supports patterns: `GET /users`, `GET /users/%`, `*`
    #[serde(default)]
    pub include: Vec<String>,

    /// Endpoints to exclude (evaluated after include).
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Heuristics used by the melding engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeldingConfig {
    /// Struct-to-map promotion thresholds.
    #[serde(default)]
    pub map_promotion: MapPromotionConfig,

    /// Maximum example values retained per primitive.
    #[serde(default = "default_max_example_values")]
    pub max_example_values: usize,
}

impl Default for MeldingConfig {
    fn default() -> Self {
        Self {
            map_promotion: MapPromotionConfig::default(),
            max_example_values: default_max_example_values(),
        }
    }
}

/// Thresholds for promoting a record-shaped struct into a dynamic map.
///
/// Promotion is one-way: once a struct becomes a map it never turns
/// back into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapPromotionConfig {
    /// Promote when the total field count exceeds this.
    #[serde(default = "default_max_fields")]
    pub max_fields: usize,

    /// Promote when the number of Optional fields exceeds this.
    #[serde(default = "default_max_optional_fields")]
    pub max_optional_fields: usize,
}

impl Default for MapPromotionConfig {
    fn default() -> Self {
        Self {
            max_fields: default_max_fields(),
            max_optional_fields: default_max_optional_fields(),
        }
    }
}

impl MapPromotionConfig {
    /// Whether a record with these field counts should become a map.
    pub fn should_promote(&self, total_fields: usize, optional_fields: usize) -> bool {
        total_fields > self.max_fields || optional_fields > self.max_optional_fields
    }
}

// Default value functions
fn default_max_fields() -> usize {
    DEFAULT_MAX_STRUCT_FIELDS
}

fn default_max_optional_fields() -> usize {
    DEFAULT_MAX_OPTIONAL_FIELDS
}

fn default_max_example_values() -> usize {
    DEFAULT_MAX_EXAMPLE_VALUES
}

fn default_max_witnesses() -> usize {
    DEFAULT_MAX_WITNESSES
}

impl SchemaInferenceConfig {
    /// Check if inference is enabled for a given endpoint.
    pub fn should_sense_endpoint(&self, endpoint: &str) -> bool {
        if !self.enabled {
            return false;
        }
        self.endpoints.matches(endpoint)
    }

    /// Check if an endpoint that has seen `witness_count` witnesses is frozen.
    pub fn is_saturated(&self, witness_count: u64) -> bool {
        self.max_witnesses > 0 && witness_count >= self.max_witnesses as u64
    }
}

impl EndpointFilter {
    /// Check if an endpoint matches the filter.
    pub fn matches(&self, endpoint: &str) -> bool {
        // If include list is empty, include all
        let included = self.include.is_empty()
            || self.include.iter().any(|p| matches_pattern(p, endpoint));

        let excluded = self.exclude.iter().any(|p| matches_pattern(p, endpoint));

        included && !excluded
    }
}

/// Simple pattern matching supporting `*` (any) and `%` / `*` suffixes (prefix).
fn matches_pattern(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('%') {
        return value.starts_with(prefix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return value.starts_with(prefix);
    }
    pattern == value
}
