//! Simple Key - one selector key, one handler.
//!
//! This example demonstrates:
//! - Registering a handler against a single `_act` key
//! - Dispatching a payload and reading the data portion
//!
//! Run with `RUST_LOG=keyroute=debug` to see routing decisions.

use keyroute::payload::to_payload;
use keyroute::{Dispatcher, Selector};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dis: Dispatcher<()> = Dispatcher::new();
    dis.register(Selector::new().key("_act", "data"), |ctx| {
        let value = ctx.data()["value"].as_str().unwrap_or_default();
        println!("{} simple action", value);
    })?;

    let action = to_payload(json!({"_act": "data", "value": "hello"}))?;
    dis.dispatch(&action, None)?;

    Ok(())
}
