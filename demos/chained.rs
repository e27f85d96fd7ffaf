//! Chained - a handler forwarding the original action to a sub-registry.
//!
//! The outer registry routes on `_act`; the sub-registry routes the same
//! action on `_type` and sees its own key/data split.

use std::sync::Arc;

use keyroute::payload::to_payload;
use keyroute::{Dispatcher, Selector};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let sub: Arc<Dispatcher<String>> = Arc::new(Dispatcher::with_keys(["_type"])?);
    sub.register(Selector::new().key("_type", "data"), |ctx| {
        format!("sub keys={} data={}", json!(ctx.keys()), json!(ctx.data()))
    })?;

    let main_registry: Dispatcher<Vec<String>> = Dispatcher::with_keys(["_act"])?;
    {
        let sub = sub.clone();
        main_registry.register(Selector::new().key("_act", "websocket"), move |ctx| {
            sub.dispatch(ctx.action(), None).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Sub-registry dispatch failed");
                Vec::new()
            })
        })?;
    }

    let action = to_payload(json!({"_act": "websocket", "_type": "data", "value": 42}))?;
    for line in main_registry.dispatch(&action, None)?.concat() {
        println!("{}", line);
    }

    Ok(())
}
