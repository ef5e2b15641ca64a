//! Configuration for schema melding.
//!
//! Configuration is read from YAML, with `${VAR}` references expanded
//! from the environment before parsing.

use anyhow::{Context, Result};
use std::fs;

mod schema_inference;

pub use schema_inference::{
    DEFAULT_MAX_EXAMPLE_VALUES, DEFAULT_MAX_OPTIONAL_FIELDS, DEFAULT_MAX_STRUCT_FIELDS,
    DEFAULT_MAX_WITNESSES, EndpointFilter, MapPromotionConfig, MeldingConfig,
    SchemaInferenceConfig,
};

pub fn load_from_path(file_path: &str) -> Result<SchemaInferenceConfig> {
    let raw = fs::read_to_string(file_path)
        .with_context(|| format!("reading config {file_path}"))?;
    let with_env = shellexpand::env(&raw)
        .with_context(|| format!("expanding environment in {file_path}"))?
        .to_string();
    let cfg: SchemaInferenceConfig =
        serde_yaml::from_str(&with_env).with_context(|| "parsing yaml")?;

    Ok(cfg)
}
