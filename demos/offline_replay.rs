//! Records two requests while "offline", then replays them on reconnect.
//!
//! Run with `RUST_LOG=debug cargo run --example offline_replay`.

use retrace::supervisor::{Connectivity, RetrySupervisor};
use retrace::{Action, Config, LoggerMiddleware, SharedStore, Store, creators};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default, Serialize)]
struct Requests {
    sent: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_json_str(r#"{ "cache": { "FETCH_PROFILE": {}, "SAVE_DRAFT": {} } }"#)?;
    let store = Store::builder(config)
        .middleware(LoggerMiddleware)
        .reducer(|mut state: Requests, action: &Action| {
            if let Some(id) = action.retry_id() {
                state.sent.push(format!("{} ({id})", action.kind()));
            }
            state
        })
        .build();
    let store = SharedStore::new(store);

    let (tx, rx) = mpsc::channel(16);
    let supervisor = tokio::spawn(RetrySupervisor::new(store.clone(), Connectivity::Offline, rx).run());

    let profile = Action::new("FETCH_PROFILE").with_payload("me").with_retry_id("req-1");
    let draft = Action::new("SAVE_DRAFT")
        .with_payload(serde_json::json!({ "title": "notes" }))
        .with_retry_id("req-2");
    store.dispatch(profile.clone()).await;
    store.dispatch(draft).await;
    println!("pending while offline: {}", store.pending().await);

    tx.send(Connectivity::Online).await?;
    drop(tx);
    let retries = supervisor.await?;

    // the profile request succeeded on retry
    store.dispatch(creators::remove(&profile)).await;

    let state = store.snapshot().await;
    println!("retries: {retries}");
    println!("state: {}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
