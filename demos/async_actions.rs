//! Async Actions - handlers returning sync and async action objects.
//!
//! The dispatcher never awaits anything. Handlers return boxed actions;
//! some resolve immediately, some need the runtime. The caller runs them all.

use std::future::Future;
use std::pin::Pin;

use keyroute::payload::to_payload;
use keyroute::{Dispatcher, Selector};
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

type BoxFuture = Pin<Box<dyn Future<Output = String> + Send>>;

/// Something a handler hands back for the caller to run.
trait Action: Send {
    fn run(self: Box<Self>) -> BoxFuture;
}

#[derive(Deserialize)]
struct Data {
    test: String,
}

struct DemoAction {
    value: String,
}

impl Action for DemoAction {
    fn run(self: Box<Self>) -> BoxFuture {
        Box::pin(std::future::ready(self.value))
    }
}

struct DemoAsyncAction {
    value: String,
}

impl Action for DemoAsyncAction {
    fn run(self: Box<Self>) -> BoxFuture {
        Box::pin(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            self.value
        })
    }
}

type ActionResult = Result<Box<dyn Action>, keyroute::DispatchError>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dis: Dispatcher<ActionResult> = Dispatcher::with_keys(["_act"])?;
    let key = Selector::new().key("_act", "data");

    dis.register_typed(key.clone(), |data: Data, _ctx| {
        Ok(Box::new(DemoAction {
            value: format!("DemoAction - {}", data.test),
        }) as Box<dyn Action>)
    })?;
    dis.register_typed(key, |data: Data, _ctx| {
        Ok(Box::new(DemoAsyncAction {
            value: format!("DemoAsyncAction - {}", data.test),
        }) as Box<dyn Action>)
    })?;

    let action = to_payload(json!({"_act": "data", "test": "demo"}))?;
    let actions = dis.try_dispatch(&action, None)?;

    let mut results = Vec::new();
    for a in actions {
        results.push(a.run().await);
    }
    println!("{:?}", results);

    Ok(())
}
