use meld_o11y::logging::{self, Config};
use schema_meld::{Location, Meta, Witness};
use serde_json::Value;

/// Route engine logs through the test harness capture.
pub fn init_test_tracing() {
    let _ = logging::init(&Config::for_tests("debug"));
}

/// A witness with one argument and one response body.
pub fn witness(arg: Option<(&str, Value)>, status: u16, body: Value) -> Witness {
    let mut w = Witness::default();
    if let Some((name, value)) = arg {
        w = w.arg(Meta::arg(Location::Query, name), value);
    }
    w.response(Meta::response(status, Location::Body, "application/json"), body)
}
