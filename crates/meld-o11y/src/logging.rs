use std::sync::Once;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt};

static INIT: Once = Once::new();

#[derive(Clone, Debug)]
pub struct Config {
    /// Either a simple level like "info" or a full EnvFilter string
    /// e.g. "info,schema_meld=debug".
    pub level: Option<String>,
    /// Emit logs as JSON lines when true; otherwise pretty text.
    pub json: bool,
    /// Include file/line/target info in logs.
    pub with_targets: bool,
    /// Write through the libtest capture instead of stdout.
    pub test_writer: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: Some("info".to_owned()),
            json: true,
            with_targets: false,
            test_writer: false,
        }
    }
}

impl Config {
    /// Compact text output captured by the test harness.
    pub fn for_tests(level: &str) -> Self {
        Self {
            level: Some(level.to_owned()),
            json: false,
            with_targets: true,
            test_writer: true,
        }
    }
}

/// Install the global subscriber. Only the first call has any effect.
pub fn init(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut result: Result<(), Box<dyn std::error::Error>> = Ok(());
    INIT.call_once(|| {
        result = install(cfg);
    });
    result
}

fn install(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let _ = LogTracer::init();

    let env = std::env::var("RUST_LOG").ok();
    let level = cfg.level.clone().or(env).unwrap_or_else(|| "info".into());

    let filter = EnvFilter::try_from_env("RUST_LOG")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = match (cfg.json, cfg.test_writer) {
        (true, true) => fmt::layer()
            .with_target(cfg.with_targets)
            .with_test_writer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        (true, false) => fmt::layer()
            .with_target(cfg.with_targets)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        (false, true) => fmt::layer()
            .with_target(cfg.with_targets)
            .with_test_writer()
            .compact()
            .boxed(),
        (false, false) => fmt::layer()
            .with_target(cfg.with_targets)
            .with_ansi(true)
            .boxed(),
    };

    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
