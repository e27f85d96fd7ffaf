//! # keyroute
//!
//! Key-matched callback registry.
//!
//! Handlers are registered against a [`Selector`] of key/value pairs. A
//! dispatched payload is routed to every handler whose selector matches the
//! payload's values for those keys, in registration order.
//!
//! ## Routing
//!
//! - **Schema resolution**: the registry learns a key schema from each
//!   selector (or is given one explicitly) and picks the schema a payload
//!   satisfies
//! - **Matching**: exact value equality on every selector key, no wildcards
//! - **Context**: handlers receive the payload split into `data` and `keys`,
//!   the caller's `params`, and the original `action`
//!
//! Handler return values are opaque. Returning futures or join handles is
//! fine; awaiting them is up to the caller.
//!
//! ## Example
//!
//! ```
//! use keyroute::{Dispatcher, Selector};
//! use keyroute::payload::to_payload;
//! use serde_json::json;
//!
//! let dis: Dispatcher<String> = Dispatcher::new();
//! dis.register(Selector::new().key("_act", "data"), |ctx| {
//!     format!("H1 {}", ctx.data()["test"])
//! })
//! .unwrap();
//! dis.register(Selector::new().key("_ack", "data"), |ctx| {
//!     format!("H2 {}", ctx.data()["test"])
//! })
//! .unwrap();
//!
//! let action = to_payload(json!({"_act": "data", "test": "demo1"})).unwrap();
//! assert_eq!(dis.dispatch(&action, None).unwrap(), vec!["H1 \"demo1\"".to_string()]);
//! ```

pub mod error;
pub mod handler;
pub mod payload;
pub mod schema;

pub use error::{DispatchError, Result};
pub use handler::{DispatchContext, Dispatcher, DispatcherBuilder, Handler};
pub use payload::{Payload, Selector};
pub use schema::{KeySchema, SchemaResolution};
