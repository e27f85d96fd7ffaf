//! Multi Key - two selector keys and params passed through to the handler.
//!
//! This example demonstrates:
//! - An explicit `{_act, _type}` schema
//! - Passing a sink to handlers through `params`
//! - Removing the handler once it is no longer needed

use keyroute::payload::to_payload;
use keyroute::{Dispatcher, Selector};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Stand-in for a websocket connection.
struct WebSocket {
    url: String,
}

impl WebSocket {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    fn send(&self, msg: &str) {
        println!("[{}] {}", self.url, msg);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dis: Dispatcher<(), WebSocket> = Dispatcher::with_keys(["_act", "_type"])?;

    let index = dis.register(
        Selector::new().key("_act", "websocket").key("_type", "data"),
        |ctx| {
            if let Some(ws) = ctx.params() {
                let value = ctx.data()["value"].as_str().unwrap_or_default();
                ws.send(&format!("multi key {}", value));
            }
        },
    )?;

    let websocket = WebSocket::new("ws://localhost:8080");
    let action = to_payload(json!({"_act": "websocket", "_type": "data", "value": "demo"}))?;
    dis.dispatch(&action, Some(&websocket))?;

    // We are done, remove the handler.
    dis.unregister(index)?;
    assert!(dis.dispatch(&action, Some(&websocket))?.is_empty());

    Ok(())
}
