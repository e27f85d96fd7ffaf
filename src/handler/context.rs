//! Dispatch context for handlers.
//!
//! Every handler matched by a dispatch receives the same [`DispatchContext`]:
//! - `data` - the payload with the resolved schema's keys removed
//! - `keys` - only the resolved schema's keys and their values
//! - `params` - the caller's auxiliary value, passed through unchanged
//! - `action` - the original payload, for chained dispatch
//!
//! # Example
//!
//! ```
//! use keyroute::{Dispatcher, Selector};
//! use keyroute::payload::to_payload;
//! use serde_json::json;
//!
//! let dis: Dispatcher<String> = Dispatcher::new();
//! dis.register(Selector::new().key("_act", "data"), |ctx| {
//!     ctx.data()["value"].as_str().unwrap_or_default().to_string()
//! })
//! .unwrap();
//!
//! let action = to_payload(json!({"_act": "data", "value": "hello"})).unwrap();
//! assert_eq!(dis.dispatch(&action, None).unwrap(), vec!["hello".to_string()]);
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::payload::{split_keys, Payload};

/// Context passed to handlers on dispatch.
#[derive(Debug)]
pub struct DispatchContext<'a, P> {
    data: Payload,
    keys: Payload,
    params: Option<&'a P>,
    action: &'a Payload,
}

impl<'a, P> DispatchContext<'a, P> {
    /// Build a context by splitting `action` around the schema's key names.
    pub fn new(action: &'a Payload, key_names: &[String], params: Option<&'a P>) -> Self {
        let (keys, data) = split_keys(action, key_names);
        tracing::trace!(?key_names, data_fields = data.len(), "Split payload");
        Self {
            data,
            keys,
            params,
            action,
        }
    }

    /// Payload fields that are not schema keys.
    #[inline]
    pub fn data(&self) -> &Payload {
        &self.data
    }

    /// Schema keys extracted from the payload.
    #[inline]
    pub fn keys(&self) -> &Payload {
        &self.keys
    }

    /// Auxiliary value supplied to `dispatch`.
    #[inline]
    pub fn params(&self) -> Option<&'a P> {
        self.params
    }

    /// The original, unmodified payload.
    #[inline]
    pub fn action(&self) -> &'a Payload {
        self.action
    }

    /// Deserialize the data portion into `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.data.clone()))?)
    }
}
