//! # retrace
//!
//! A replay cache for unidirectional-data-flow stores.
//!
//! Action types named in a [`Config`] are recorded as they are dispatched.
//! A supervising component can later dispatch `RETRY_ALL` to re-issue every
//! recorded action, in order, without the application re-deriving them.
//!
//! ## Quick Start
//!
//! ```rust
//! use retrace::{Action, Config, Store, creators};
//!
//! let config = Config::new().cacheable("FETCH");
//! let mut store = Store::<()>::builder(config).build();
//!
//! let fetch = Action::new("FETCH").with_payload(1).with_retry_id("a");
//! store.dispatch(fetch.clone());
//! assert_eq!(store.pending(), 1);
//!
//! // re-issue everything, the cache itself is unchanged
//! store.dispatch(creators::retry_all());
//! assert_eq!(store.pending(), 1);
//!
//! store.dispatch(creators::remove(&fetch));
//! assert_eq!(store.pending(), 0);
//! ```

pub mod action;
pub mod cache;
pub mod config;
pub mod middleware;
pub mod store;
pub mod supervisor;

#[cfg(test)]
mod testing;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use action::{Action, ActionId, ControlKind, creators};
pub use cache::{CacheEntry, CacheState};
pub use config::{Config, ConfigError};
pub use middleware::{LoggerMiddleware, Middleware, ReplayMiddleware};
pub use store::{RootState, SharedStore, Store};
