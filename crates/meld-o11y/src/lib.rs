pub mod logging;

/// Top-level config for observability.
#[derive(Clone, Debug, Default)]
pub struct O11yConfig {
    pub logging: logging::Config,
}

pub fn init_all(cfg: &O11yConfig) -> Result<(), Box<dyn std::error::Error>> {
    logging::init(&cfg.logging)?;
    Ok(())
}
