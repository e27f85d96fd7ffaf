//! Binding registry and dispatcher.
//!
//! The [`Dispatcher`] stores bindings (selector + handler) in registration
//! order and routes payloads to every binding whose selector matches.
//! Bindings are identified by their position at insertion time; removing a
//! binding shifts later positions down by one.
//!
//! # Example
//!
//! ```
//! use keyroute::{Dispatcher, Selector};
//! use keyroute::payload::to_payload;
//! use serde_json::json;
//!
//! let dis: Dispatcher<&'static str> = Dispatcher::new();
//! dis.register(Selector::new().key("_act", "data"), |_ctx| "act").unwrap();
//! dis.register(Selector::new().key("_ack", "data"), |_ctx| "ack").unwrap();
//!
//! let action = to_payload(json!({"_ack": "data", "test": "demo"})).unwrap();
//! assert_eq!(dis.dispatch(&action, None).unwrap(), vec!["ack"]);
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::DispatchContext;
use crate::error::{DispatchError, Result};
use crate::payload::{Payload, Selector};
use crate::schema::{KeySchema, SchemaResolution, SchemaSet};

/// Trait for handler functions.
pub trait Handler<R, P>: Send + Sync + 'static {
    /// Handle a matched payload.
    fn call(&self, ctx: &DispatchContext<'_, P>) -> R;
}

/// Wrapper for plain closures taking the dispatch context.
pub struct FnHandler<F> {
    handler: F,
}

impl<F> FnHandler<F> {
    /// Create a new closure handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F, R, P> Handler<R, P> for FnHandler<F>
where
    F: Fn(&DispatchContext<'_, P>) -> R + Send + Sync + 'static,
{
    #[inline]
    fn call(&self, ctx: &DispatchContext<'_, P>) -> R {
        (self.handler)(ctx)
    }
}

/// Wrapper that deserializes the data portion before calling the handler.
pub struct TypedHandler<F, T> {
    handler: F,
    _phantom: PhantomData<fn() -> T>,
}

impl<F, T> TypedHandler<F, T> {
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, O, E, P> Handler<std::result::Result<O, E>, P> for TypedHandler<F, T>
where
    F: Fn(T, &DispatchContext<'_, P>) -> std::result::Result<O, E> + Send + Sync + 'static,
    T: DeserializeOwned + 'static,
    E: From<DispatchError>,
{
    fn call(&self, ctx: &DispatchContext<'_, P>) -> std::result::Result<O, E> {
        let data: T = ctx.data_as().map_err(E::from)?;
        (self.handler)(data, ctx)
    }
}

/// A registered selector and its handler.
struct Binding<R, P> {
    selector: Selector,
    handler: Arc<dyn Handler<R, P>>,
}

struct State<R, P> {
    bindings: Vec<Binding<R, P>>,
    schemas: SchemaSet,
}

/// Handlers matched for one payload, taken while the lock was held.
struct Route<R, P> {
    key_names: Vec<String>,
    handlers: Vec<Arc<dyn Handler<R, P>>>,
}

/// Builder for a [`Dispatcher`].
///
/// ```
/// use keyroute::{Dispatcher, SchemaResolution};
///
/// let dis: Dispatcher<()> = Dispatcher::builder()
///     .keys(["_act", "_type"])
///     .strict(true)
///     .resolution(SchemaResolution::MostSpecific)
///     .build()
///     .unwrap();
/// assert_eq!(dis.explicit_keys().unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DispatcherBuilder {
    keys: Option<Vec<String>>,
    strict: bool,
    resolution: SchemaResolution,
}

impl DispatcherBuilder {
    /// Create a new builder (implicit multi-schema mode, non-strict).
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix a single explicit schema. Every selector must use exactly these keys.
    pub fn keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Fail `dispatch` with [`DispatchError::NoMatchingSchema`] instead of
    /// returning no results when a payload satisfies no schema.
    ///
    /// Default: false
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the policy for payloads satisfying several schemas.
    ///
    /// Default: [`SchemaResolution::FirstDiscovered`]
    pub fn resolution(mut self, resolution: SchemaResolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Build the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EmptySchema`] if explicit keys were given but empty.
    pub fn build<R: 'static, P: 'static>(self) -> Result<Dispatcher<R, P>> {
        let mut schemas = SchemaSet::new();
        let explicit = match self.keys {
            Some(keys) => {
                let schema = KeySchema::new(keys)?;
                debug!(keys = ?schema.keys(), "Created dispatcher with explicit schema");
                schemas.insert(schema);
                true
            }
            None => false,
        };

        Ok(Dispatcher {
            state: RwLock::new(State {
                bindings: Vec::new(),
                schemas,
            }),
            explicit,
            strict: self.strict,
            resolution: self.resolution,
        })
    }
}

/// Registry routing payloads to handlers by selector key/value pairs.
///
/// `R` is the handler return type, `P` the auxiliary params type.
///
/// # Reentrancy
///
/// All methods take `&self`. No lock is held while handlers run, so a handler
/// may register, unregister or dispatch on the same dispatcher; changes apply
/// to later dispatches only.
pub struct Dispatcher<R, P = ()> {
    state: RwLock<State<R, P>>,
    explicit: bool,
    strict: bool,
    resolution: SchemaResolution,
}

impl<R: 'static, P: 'static> Dispatcher<R, P> {
    /// Create a dispatcher that discovers schemas from registered selectors.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                bindings: Vec::new(),
                schemas: SchemaSet::new(),
            }),
            explicit: false,
            strict: false,
            resolution: SchemaResolution::default(),
        }
    }

    /// Create a dispatcher with one explicit schema.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::EmptySchema`] if `keys` is empty.
    pub fn with_keys<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DispatcherBuilder::new().keys(keys).build()
    }

    /// Register a closure handler. Returns the binding's position.
    ///
    /// Identical selectors may be registered more than once; every binding fires.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::EmptySelector`] / [`DispatchError::InvalidSelector`]
    ///   for malformed selectors
    /// - [`DispatchError::SelectorMismatch`] if the selector's keys differ from
    ///   the explicit schema
    pub fn register<F>(&self, selector: Selector, handler: F) -> Result<usize>
    where
        F: Fn(&DispatchContext<'_, P>) -> R + Send + Sync + 'static,
    {
        self.register_handler(selector, Arc::new(FnHandler::new(handler)))
    }

    /// Register a [`Handler`] implementation. Returns the binding's position.
    pub fn register_handler(
        &self,
        selector: Selector,
        handler: Arc<dyn Handler<R, P>>,
    ) -> Result<usize> {
        selector.validate()?;
        let schema = KeySchema::of_selector(&selector);

        let mut state = self.state.write();

        let discovered = if self.explicit {
            match state.schemas.iter().next() {
                Some(expected) if *expected != schema => {
                    return Err(DispatchError::SelectorMismatch {
                        expected: expected.keys().to_vec(),
                        found: schema.keys().to_vec(),
                    });
                }
                _ => false,
            }
        } else {
            let (_, discovered) = state.schemas.insert(schema.clone());
            discovered
        };

        let index = state.bindings.len();
        state.bindings.push(Binding { selector, handler });

        debug!(
            index,
            keys = ?schema.keys(),
            new_schema = discovered,
            "Registered binding"
        );
        Ok(index)
    }

    /// Remove the binding at `index`; later bindings shift down by one.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::IndexOutOfRange`] if there is no such binding.
    pub fn unregister(&self, index: usize) -> Result<()> {
        let mut state = self.state.write();
        let len = state.bindings.len();
        if index >= len {
            return Err(DispatchError::IndexOutOfRange { index, len });
        }
        state.bindings.remove(index);
        debug!(index, remaining = len - 1, "Unregistered binding");
        Ok(())
    }

    /// Check if `action` carries every key of at least one recognized schema.
    pub fn is_valid(&self, action: &Payload) -> bool {
        let state = self.state.read();
        state.schemas.resolve(action, self.resolution).is_some()
    }

    /// The schema `action` resolves to, if any.
    pub fn resolve_schema(&self, action: &Payload) -> Option<KeySchema> {
        let state = self.state.read();
        state
            .schemas
            .resolve(action, self.resolution)
            .and_then(|id| state.schemas.get(id))
            .cloned()
    }

    /// Dispatch `action` to every matching handler, in registration order.
    ///
    /// Returns the handlers' results in the same order. A payload that
    /// satisfies no schema yields an empty vector, or
    /// [`DispatchError::NoMatchingSchema`] in strict mode.
    ///
    /// Handlers run synchronously on the caller's thread; a panicking handler
    /// unwinds through this call and later handlers do not run.
    pub fn dispatch(&self, action: &Payload, params: Option<&P>) -> Result<Vec<R>> {
        let Some(route) = self.route(action)? else {
            return Ok(Vec::new());
        };

        let ctx = DispatchContext::new(action, &route.key_names, params);
        Ok(route.handlers.iter().map(|h| h.call(&ctx)).collect())
    }

    /// Number of registered bindings.
    pub fn len(&self) -> usize {
        self.state.read().bindings.len()
    }

    /// Check if no binding is registered.
    pub fn is_empty(&self) -> bool {
        self.state.read().bindings.is_empty()
    }

    /// Recognized schemas in discovery order.
    pub fn schemas(&self) -> Vec<KeySchema> {
        self.state.read().schemas.iter().cloned().collect()
    }

    /// Key names of the explicit schema, if this dispatcher has one.
    pub fn explicit_keys(&self) -> Option<Vec<String>> {
        if !self.explicit {
            return None;
        }
        self.state
            .read()
            .schemas
            .iter()
            .next()
            .map(|s| s.keys().to_vec())
    }

    /// Resolve the schema and snapshot matching handlers.
    ///
    /// `Ok(None)` means no schema matched in non-strict mode.
    fn route(&self, action: &Payload) -> Result<Option<Route<R, P>>> {
        let state = self.state.read();

        let Some(schema) = state
            .schemas
            .resolve(action, self.resolution)
            .and_then(|id| state.schemas.get(id))
        else {
            if self.strict {
                warn!(fields = action.len(), "Payload matches no recognized schema");
                return Err(DispatchError::NoMatchingSchema);
            }
            debug!(fields = action.len(), "Payload matches no recognized schema");
            return Ok(None);
        };

        let handlers: Vec<_> = state
            .bindings
            .iter()
            .filter(|b| b.selector.matches(action))
            .map(|b| Arc::clone(&b.handler))
            .collect();

        debug!(
            keys = ?schema.keys(),
            matched = handlers.len(),
            "Dispatching payload"
        );

        Ok(Some(Route {
            key_names: schema.keys().to_vec(),
            handlers,
        }))
    }
}

impl Dispatcher<()> {
    /// Create a new builder. `build` picks the result and params types.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }
}

impl<O: 'static, E: 'static, P: 'static> Dispatcher<std::result::Result<O, E>, P>
where
    E: From<DispatchError>,
{
    /// Register a handler that receives the data portion deserialized as `T`.
    ///
    /// If deserialization fails the handler is not called and its result is
    /// the decode error.
    pub fn register_typed<T, F>(&self, selector: Selector, handler: F) -> Result<usize>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T, &DispatchContext<'_, P>) -> std::result::Result<O, E> + Send + Sync + 'static,
    {
        self.register_handler(selector, Arc::new(TypedHandler::<F, T>::new(handler)))
    }

    /// Dispatch to fallible handlers, stopping at the first error.
    ///
    /// Handlers that ran before the failing one are not rolled back.
    pub fn try_dispatch(
        &self,
        action: &Payload,
        params: Option<&P>,
    ) -> std::result::Result<Vec<O>, E> {
        let Some(route) = self.route(action)? else {
            return Ok(Vec::new());
        };

        let ctx = DispatchContext::new(action, &route.key_names, params);
        route.handlers.iter().map(|h| h.call(&ctx)).collect()
    }
}

impl<R: 'static, P: 'static> Default for Dispatcher<R, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, P> fmt::Debug for Dispatcher<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Dispatcher")
            .field("bindings", &state.bindings.len())
            .field("schemas", &state.schemas)
            .field("explicit", &self.explicit)
            .field("strict", &self.strict)
            .field("resolution", &self.resolution)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::to_payload;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn payload(value: Value) -> Payload {
        to_payload(value).unwrap()
    }

    fn act(value: &str) -> Selector {
        Selector::new().key("_act", value)
    }

    #[test]
    fn test_register_returns_sequential_indices() {
        let dis: Dispatcher<u32> = Dispatcher::new();

        assert_eq!(dis.register(act("data"), |_| 0).unwrap(), 0);
        assert_eq!(dis.register(act("data"), |_| 1).unwrap(), 1);
        assert_eq!(dis.register(act("other"), |_| 2).unwrap(), 2);
        assert_eq!(dis.len(), 3);
        assert_eq!(dis.schemas().len(), 1);
    }

    #[test]
    fn test_dispatch_exact_match() {
        let dis: Dispatcher<&'static str> = Dispatcher::new();
        dis.register(act("data"), |_| "hit").unwrap();

        assert_eq!(
            dis.dispatch(&payload(json!({"_act": "data", "x": 1})), None).unwrap(),
            vec!["hit"]
        );
        assert!(dis
            .dispatch(&payload(json!({"_act": "other", "x": 1})), None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_remove_first_of_three() {
        let dis: Dispatcher<String> = Dispatcher::new();
        let value = Arc::new(AtomicUsize::new(0));

        let mut indices = Vec::new();
        for n in 0..3usize {
            let value = value.clone();
            indices.push(
                dis.register(act("data"), move |_| {
                    value.fetch_add(n + 1, Ordering::SeqCst);
                    n.to_string()
                })
                .unwrap(),
            );
        }
        assert_eq!(indices, vec![0, 1, 2]);

        dis.unregister(indices[0]).unwrap();

        let results = dis
            .dispatch(&payload(json!({"_act": "data", "test": "demo"})), None)
            .unwrap();
        assert_eq!(value.load(Ordering::SeqCst), 5);
        assert_eq!(results, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn test_unregister_out_of_range() {
        let dis: Dispatcher<()> = Dispatcher::new();
        dis.register(act("data"), |_| ()).unwrap();

        match dis.unregister(1) {
            Err(DispatchError::IndexOutOfRange { index, len }) => {
                assert_eq!(index, 1);
                assert_eq!(len, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(dis.len(), 1);
    }

    #[test]
    fn test_is_valid() {
        let dis: Dispatcher<()> = Dispatcher::new();
        assert!(!dis.is_valid(&payload(json!({"_act": "data"}))));

        dis.register(act("data"), |_| ()).unwrap();
        assert!(dis.is_valid(&payload(json!({"_act": "anything"}))));
        assert!(!dis.is_valid(&payload(json!({"_ack": "data"}))));
    }

    #[test]
    fn test_resolve_schema_follows_policy() {
        let first: Dispatcher<()> = Dispatcher::new();
        let specific: Dispatcher<()> = Dispatcher::builder()
            .resolution(SchemaResolution::MostSpecific)
            .build()
            .unwrap();

        for dis in [&first, &specific] {
            dis.register(act("ws"), |_| ()).unwrap();
            dis.register(act("ws").key("_type", "data"), |_| ()).unwrap();
            dis.register(Selector::new().key("_ack", "data"), |_| ()).unwrap();
        }

        let narrow = KeySchema::new(["_act"]).unwrap();
        let wide = KeySchema::new(["_act", "_type"]).unwrap();
        let ack = KeySchema::new(["_ack"]).unwrap();

        let both = payload(json!({"_act": "ws", "_type": "data", "x": 1}));
        assert_eq!(first.resolve_schema(&both), Some(narrow.clone()));
        assert_eq!(specific.resolve_schema(&both), Some(wide));

        let only_act = payload(json!({"_act": "ws"}));
        assert_eq!(first.resolve_schema(&only_act), Some(narrow.clone()));
        assert_eq!(specific.resolve_schema(&only_act), Some(narrow));

        let only_ack = payload(json!({"_ack": "other"}));
        assert_eq!(specific.resolve_schema(&only_ack), Some(ack));

        assert_eq!(first.resolve_schema(&payload(json!({"x": 1}))), None);
        assert_eq!(specific.resolve_schema(&payload(json!({"x": 1}))), None);
    }

    #[test]
    fn test_explicit_schema() {
        let dis: Dispatcher<()> = Dispatcher::with_keys(["_act", "_type"]).unwrap();

        assert!(dis
            .register(Selector::new().key("_type", "data").key("_act", "ws"), |_| ())
            .is_ok());
        assert!(matches!(
            dis.register(act("ws"), |_| ()),
            Err(DispatchError::SelectorMismatch { .. })
        ));
        assert_eq!(dis.len(), 1);
        assert_eq!(
            dis.explicit_keys(),
            Some(vec!["_act".to_string(), "_type".to_string()])
        );

        // Schema is known before any registration.
        let fresh: Dispatcher<()> = Dispatcher::with_keys(["_act"]).unwrap();
        assert!(fresh.is_valid(&payload(json!({"_act": 1}))));
    }

    #[test]
    fn test_explicit_schema_empty() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            Dispatcher::<(), ()>::with_keys(empty),
            Err(DispatchError::EmptySchema)
        ));
    }

    #[test]
    fn test_invalid_selectors_rejected() {
        let dis: Dispatcher<()> = Dispatcher::new();

        assert!(matches!(
            dis.register(Selector::new(), |_| ()),
            Err(DispatchError::EmptySelector)
        ));
        assert!(matches!(
            dis.register(Selector::new().key("_act", json!({"a": 1})), |_| ()),
            Err(DispatchError::InvalidSelector { .. })
        ));
        assert!(dis.is_empty());
        assert!(dis.schemas().is_empty());
    }

    #[test]
    fn test_strict_mode() {
        let dis: Dispatcher<()> = Dispatcher::builder().strict(true).build().unwrap();
        dis.register(act("data"), |_| ()).unwrap();

        assert!(matches!(
            dis.dispatch(&payload(json!({"test": 1})), None),
            Err(DispatchError::NoMatchingSchema)
        ));
        // Schema matched, no binding matched: never an error.
        assert!(dis
            .dispatch(&payload(json!({"_act": "other"})), None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_params_passed_through() {
        let dis: Dispatcher<Option<u32>, u32> = Dispatcher::new();
        dis.register(act("data"), |ctx| ctx.params().copied()).unwrap();
        dis.register(act("data"), |ctx| ctx.params().map(|p| p * 2)).unwrap();

        let action = payload(json!({"_act": "data"}));
        assert_eq!(dis.dispatch(&action, Some(&21)).unwrap(), vec![Some(21), Some(42)]);
        assert_eq!(dis.dispatch(&action, None).unwrap(), vec![None, None]);
    }

    #[test]
    fn test_typed_handler() {
        #[derive(serde::Deserialize)]
        struct Data {
            test: String,
        }

        let dis: Dispatcher<std::result::Result<String, DispatchError>> = Dispatcher::new();
        dis.register_typed(act("data"), |data: Data, ctx| {
            Ok(format!("{}:{}", ctx.keys()["_act"], data.test))
        })
        .unwrap();

        let ok = dis
            .try_dispatch(&payload(json!({"_act": "data", "test": "demo"})), None)
            .unwrap();
        assert_eq!(ok, vec!["\"data\":demo".to_string()]);

        let bad = dis.try_dispatch(&payload(json!({"_act": "data", "test": 5})), None);
        assert!(matches!(bad, Err(DispatchError::Decode(_))));
    }

    #[test]
    fn test_try_dispatch_stops_at_first_error() {
        #[derive(Debug)]
        enum AppError {
            Dispatch(DispatchError),
            Failed(usize),
        }
        impl From<DispatchError> for AppError {
            fn from(e: DispatchError) -> Self {
                AppError::Dispatch(e)
            }
        }

        let dis: Dispatcher<std::result::Result<usize, AppError>> = Dispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for n in 0..3usize {
            let calls = calls.clone();
            dis.register(act("data"), move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                if n == 1 {
                    Err(AppError::Failed(n))
                } else {
                    Ok(n)
                }
            })
            .unwrap();
        }

        let result = dis.try_dispatch(&payload(json!({"_act": "data"})), None);
        assert!(matches!(result, Err(AppError::Failed(1))));
        // The first handler ran; the third never did.
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let mismatch = dis.try_dispatch(&payload(json!({"nope": 1})), None).unwrap();
        assert!(mismatch.is_empty());
    }

    #[test]
    fn test_custom_handler_impl() {
        struct Counter(AtomicUsize);

        impl Handler<usize, ()> for Counter {
            fn call(&self, _ctx: &DispatchContext<'_, ()>) -> usize {
                self.0.fetch_add(1, Ordering::SeqCst) + 1
            }
        }

        let dis: Dispatcher<usize> = Dispatcher::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        dis.register_handler(act("data"), counter.clone()).unwrap();
        dis.register_handler(act("data"), counter).unwrap();

        assert_eq!(
            dis.dispatch(&payload(json!({"_act": "data"})), None).unwrap(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_debug_output() {
        let dis: Dispatcher<()> = Dispatcher::new();
        dis.register(act("data"), |_| ()).unwrap();
        let out = format!("{:?}", dis);
        assert!(out.contains("bindings: 1"));
    }
}
