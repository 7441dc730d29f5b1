//! Actions — the unit of work flowing through the dispatch pipeline.
//!
//! An [`Action`] is a type tag plus an arbitrary JSON payload and optional
//! metadata. Its wire shape is:
//!
//! ```text
//! { "type": "FETCH", "payload": 1, "meta": { "retry": { "id": "a" } } }
//! ```
//!
//! The `meta.retry.id` field is the only identity the replay cache knows about.
//! It is always supplied by the caller; nothing in this crate generates ids.
//!
//! Three type tags are reserved for control actions, see [`ControlKind`]. The
//! [`creators`] submodule builds them.

pub mod creators;

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

pub use creators::{remove, reset, retry_all};

/// Reserved key used both under `meta` and as the top-level state slice.
pub const RETRY_KEY: &str = "retry";

/// Type tag of the control action that empties the cache.
pub const RESET: &str = "@@retrace/RESET";

/// Type tag of the control action that drops cached entries by id.
pub const REMOVE: &str = "@@retrace/REMOVE";

/// Type tag of the control action that replays every cached entry.
pub const RETRY_ALL: &str = "@@retrace/RETRY_ALL";

/// Caller-supplied identity of a cacheable action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Wraps a caller-chosen identifier.
    ///
    /// # Arguments
    ///
    /// - `id` — any string unique among the actions the caller expects to
    ///   remove individually, e.g. a request UUID.
    ///
    /// # Examples
    ///
    /// ```
    /// use retrace::ActionId;
    ///
    /// let id = ActionId::new("req-1");
    /// assert_eq!(id.as_str(), "req-1");
    /// ```
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ActionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The `meta.retry` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryMeta {
    pub id: ActionId,
}

/// Action metadata.
///
/// Only the `retry` key is interpreted; every other key is carried through
/// untouched so that cached actions replay exactly as they were dispatched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryMeta>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One of the three reserved control action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Reset,
    Remove,
    RetryAll,
}

impl ControlKind {
    /// Resolves a type tag to a control kind. Matching is exact.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            RESET => Some(ControlKind::Reset),
            REMOVE => Some(ControlKind::Remove),
            RETRY_ALL => Some(ControlKind::RetryAll),
            _ => None,
        }
    }
}

/// A dispatched action.
///
/// # Examples
///
/// ```
/// use retrace::action::Action;
/// use serde_json::json;
///
/// let action = Action::new("FETCH")
///     .with_payload(json!({ "page": 2 }))
///     .with_retry_id("fetch-2");
///
/// assert_eq!(action.kind(), "FETCH");
/// assert_eq!(action.retry_id().map(|id| id.as_str()), Some("fetch-2"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    kind: String,

    #[serde(default)]
    payload: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<Meta>,
}

impl Action {
    /// Creates an action with a `null` payload and no metadata.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
            meta: None,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Sets `meta.retry.id`, keeping any other metadata already present.
    #[must_use]
    pub fn with_retry_id(mut self, id: impl Into<ActionId>) -> Self {
        self.meta.get_or_insert_with(Meta::default).retry = Some(RetryMeta { id: id.into() });
        self
    }

    #[must_use]
    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    /// The caller-supplied `meta.retry.id`, if any.
    pub fn retry_id(&self) -> Option<&ActionId> {
        self.meta.as_ref()?.retry.as_ref().map(|retry| &retry.id)
    }

    /// The control kind of this action, or `None` for application actions.
    pub fn control(&self) -> Option<ControlKind> {
        ControlKind::from_tag(&self.kind)
    }

    /// Deserializes the payload into a concrete type.
    pub fn payload_as<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        T::deserialize(&self.payload)
    }
}
