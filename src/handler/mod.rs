//! Handler module - bindings, matching and dispatch.
//!
//! Provides:
//! - [`Dispatcher`] - stores bindings and routes payloads to them
//! - [`DispatchContext`] - what each matched handler receives
//!
//! # Example
//!
//! ```
//! use keyroute::handler::Dispatcher;
//! use keyroute::payload::{to_payload, Selector};
//! use serde_json::json;
//!
//! // Two key shapes routed through one registry
//! let dis: Dispatcher<String> = Dispatcher::new();
//! dis.register(Selector::new().key("_act", "ws").key("_type", "data"), |ctx| {
//!     format!("multi key {}", ctx.data()["value"])
//! })
//! .unwrap();
//! dis.register(Selector::new().key("_ack", "data"), |_ctx| "ack".to_string())
//!     .unwrap();
//!
//! let action = to_payload(json!({"_act": "ws", "_type": "data", "value": 1})).unwrap();
//! assert_eq!(dis.dispatch(&action, None).unwrap(), vec!["multi key 1".to_string()]);
//! ```

mod context;
mod registry;

pub use context::DispatchContext;
pub use registry::{Dispatcher, DispatcherBuilder, FnHandler, Handler, TypedHandler};
