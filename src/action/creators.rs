//! Factories for the three control actions.

use serde_json::Value;

use super::{Action, REMOVE, RESET, RETRY_ALL};

/// `{ type: RESET }` — empties the cache.
pub fn reset() -> Action {
    Action::new(RESET)
}

/// `{ type: RETRY_ALL }` — replays every cached action in insertion order.
pub fn retry_all() -> Action {
    Action::new(RETRY_ALL)
}

/// `{ type: REMOVE, payload: <target id> }`.
///
/// When `target` carries no `meta.retry.id` the payload is `null`, which
/// matches no cache entry.
///
/// # Examples
///
/// ```
/// use retrace::action::{Action, creators};
///
/// let fetch = Action::new("FETCH").with_retry_id("a");
/// let remove = creators::remove(&fetch);
/// assert_eq!(remove.payload(), &serde_json::json!("a"));
/// ```
pub fn remove(target: &Action) -> Action {
    let id = target
        .retry_id()
        .map_or(Value::Null, |id| Value::String(id.as_str().to_owned()));
    Action::new(REMOVE).with_payload(id)
}
