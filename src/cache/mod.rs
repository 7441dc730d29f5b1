//! Cache state and the reducer that maintains it.
//!
//! [`reduce`] is a pure, total transition over [`CacheState`]:
//!
//! | Action               | Effect on `cache`                                 |
//! |----------------------|---------------------------------------------------|
//! | `RESET`              | replaced with an empty sequence                   |
//! | `REMOVE` with id `x` | every entry whose `meta.retry.id == x` is dropped |
//! | `RETRY_ALL`          | unchanged                                         |
//! | cacheable type       | `{ action }` appended at the tail                 |
//! | anything else        | unchanged                                         |
//!
//! Control tags are checked first, so a control tag that also appears in the
//! configuration is never cached. Entries leave the cache only through reset
//! or remove.

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::action::{Action, ActionId, ControlKind};
use crate::config::Config;

/// A cached action, stored verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub action: Action,
}

impl CacheEntry {
    pub fn new(action: Action) -> Self {
        Self { action }
    }

    pub fn into_action(self) -> Action {
        self.action
    }
}

/// Ordered cache contents, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheState {
    pub cache: Vec<CacheEntry>,
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[CacheEntry] {
        &self.cache
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// An owned copy of the entries, in order.
    pub fn snapshot(&self) -> Vec<CacheEntry> {
        self.cache.clone()
    }

    /// Ids of cached entries that carry one, in cache order.
    pub fn pending_ids(&self) -> impl Iterator<Item = &ActionId> {
        self.cache.iter().filter_map(|entry| entry.action.retry_id())
    }
}

/// Applies one action to the cache state.
///
/// # Examples
///
/// ```
/// use retrace::action::{Action, creators};
/// use retrace::cache::{CacheState, reduce};
/// use retrace::config::Config;
///
/// let config = Config::new().cacheable("FETCH");
/// let fetch = Action::new("FETCH").with_retry_id("a");
///
/// let state = reduce(CacheState::new(), &fetch, &config);
/// assert_eq!(state.len(), 1);
///
/// let state = reduce(state, &creators::remove(&fetch), &config);
/// assert!(state.is_empty());
/// ```
pub fn reduce(mut state: CacheState, action: &Action, config: &Config) -> CacheState {
    match action.control() {
        Some(ControlKind::Reset) => {
            state.cache.clear();
        }
        Some(ControlKind::Remove) => {
            // A missing or non-string id matches nothing.
            if let Some(target) = action.payload().as_str() {
                let before = state.cache.len();
                state
                    .cache
                    .retain(|entry| entry.action.retry_id().map(ActionId::as_str) != Some(target));
                let removed = before - state.cache.len();
                if removed > 1 {
                    warn!(id = target, removed, "remove matched more than one cached entry");
                }
            }
        }
        Some(ControlKind::RetryAll) => {}
        None => {
            if config.is_cacheable(action.kind()) {
                trace!(kind = action.kind(), "caching action");
                state.cache.push(CacheEntry::new(action.clone()));
            }
        }
    }
    state
}
