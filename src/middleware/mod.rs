//! Dispatch pipeline — ordered interception stages in front of the reducer.
//!
//! This module defines the core types for building an ordered middleware stack.
//! Each middleware receives an action and a cursor into the rest of the chain,
//! and decides whether and how to forward it. The chain always ends in the
//! store's terminal reducer stage.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining chain; [`Next::run`] forwards an
//!   action to the next stage, [`Next::replay`] forwards it straight to the
//!   reducer on the skip-caching path.
//! - [`Context`] — read-only view of the store state for the current dispatch.
//! - [`ReplayMiddleware`] — re-issues cached actions on `RETRY_ALL`.
//! - [`LoggerMiddleware`] — built-in dispatch logger.
//!
//! Everything here is synchronous. A dispatch, including every replay it
//! triggers, completes before control returns to the caller.

use std::sync::Arc;

use crate::action::{Action, ControlKind};
use crate::store::RootState;

/// How an action reached the terminal reducer stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Submitted through the pipeline; cacheable types are recorded.
    Dispatched,
    /// Re-issued from the cache; the cache itself is left untouched.
    Replayed,
}

/// The terminal stage of a pipeline.
pub type Terminal<'a, S> = dyn Fn(&mut RootState<S>, &Action, Delivery) + 'a;

/// A type-erased, reference-counted middleware.
pub type MiddlewareHandler<S> = Arc<dyn Middleware<S>>;

/// Per-dispatch view of the store state.
///
/// Middleware may read the state but never write it; only the terminal
/// reducer stage mutates it.
pub struct Context<'s, S> {
    state: &'s mut RootState<S>,
}

impl<'s, S> Context<'s, S> {
    // Wraps the store's root state for the duration of one dispatch.
    pub(crate) fn new(state: &'s mut RootState<S>) -> Self {
        Self { state }
    }

    /// The state as of this point in the dispatch.
    ///
    /// Reading the state after calling [`Next::run`] observes the effect of
    /// every downstream stage, including the reducer.
    ///
    /// # Returns
    ///
    /// A shared reference to the root state; middleware cannot mutate it.
    pub fn state(&self) -> &RootState<S> {
        &*self.state
    }

    fn state_mut(&mut self) -> &mut RootState<S> {
        &mut *self.state
    }
}

/// A cursor into the remaining middleware chain for a single dispatch.
///
/// Unlike a one-shot continuation, `Next` may be invoked any number of times,
/// which is how a single `RETRY_ALL` fans out into one forward per cached
/// entry.
pub struct Next<'a, S> {
    chain: &'a [MiddlewareHandler<S>],
    terminal: &'a Terminal<'a, S>,
}

impl<'a, S> Next<'a, S> {
    /// Creates a cursor positioned at the start of `chain`.
    ///
    /// # Arguments
    ///
    /// - `chain` — the ordered middleware that make up the pipeline.
    /// - `terminal` — the stage invoked once `chain` is exhausted, and
    ///   directly by [`replay`](Self::replay).
    ///
    /// # Examples
    ///
    /// ```
    /// use retrace::middleware::{Delivery, MiddlewareHandler, Next, Terminal};
    /// use retrace::{Action, RootState};
    ///
    /// let terminal: &Terminal<'_, ()> = &|_: &mut RootState<()>, _: &Action, _: Delivery| {};
    /// let chain: Vec<MiddlewareHandler<()>> = Vec::new();
    /// let next = Next::new(chain.as_slice(), terminal);
    /// # let _ = next;
    /// ```
    pub fn new(chain: &'a [MiddlewareHandler<S>], terminal: &'a Terminal<'a, S>) -> Self {
        Self { chain, terminal }
    }

    /// Forwards `action` to the next middleware, or to the terminal reducer
    /// once the chain is exhausted.
    ///
    /// May be called any number of times from one [`Middleware::handle`]
    /// invocation. The action arrives at the terminal as
    /// [`Delivery::Dispatched`], so cacheable types are recorded.
    ///
    /// # Arguments
    ///
    /// - `ctx` — the dispatch [`Context`] received by the calling middleware.
    /// - `action` — the action to forward, usually the one received.
    pub fn run(&self, ctx: &mut Context<'_, S>, action: Action) {
        match self.chain.split_first() {
            Some((head, rest)) => {
                let next = Next {
                    chain: rest,
                    terminal: self.terminal,
                };
                head.handle(ctx, action, &next);
            }
            None => (self.terminal)(ctx.state_mut(), &action, Delivery::Dispatched),
        }
    }

    /// Forwards `action` directly to the terminal reducer as a replay,
    /// skipping any remaining middleware and the caching transition.
    ///
    /// The action arrives at the terminal as [`Delivery::Replayed`]; the
    /// cache is left exactly as it was.
    ///
    /// # Arguments
    ///
    /// - `ctx` — the dispatch [`Context`] received by the calling middleware.
    /// - `action` — a previously cached action to re-issue.
    pub fn replay(&self, ctx: &mut Context<'_, S>, action: Action) {
        (self.terminal)(ctx.state_mut(), &action, Delivery::Replayed);
    }
}

/// The core trait for all pipeline middleware.
///
/// Implementors receive a [`Context`], the action, and a [`Next`] cursor.
/// They may:
///
/// - **Pass through** — call `next.run(ctx, action)`.
/// - **Swallow** — return without calling `next`.
/// - **Fan out** — call `next` several times, as [`ReplayMiddleware`] does.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync` because a store may be shared
///   across tasks through [`SharedStore`](crate::SharedStore).
/// - `handle` **must not** block or suspend; the whole dispatch, including
///   every replay, completes synchronously.
pub trait Middleware<S>: Send + Sync {
    /// Handle the action and optionally delegate to the next stage.
    ///
    /// # Arguments
    ///
    /// - `ctx` — read-only view of the root state for this dispatch; pass it
    ///   on to `next`.
    /// - `action` — the action being dispatched, owned by this stage until it
    ///   is forwarded.
    /// - `next` — cursor into the remainder of the pipeline; call
    ///   [`Next::run`] to forward, [`Next::replay`] to re-issue a cached
    ///   action without caching it again.
    fn handle(&self, ctx: &mut Context<'_, S>, action: Action, next: &Next<'_, S>);
}

/// Replays the cache on `RETRY_ALL`.
///
/// On a retry-all action it snapshots the cache, forwards every entry in
/// insertion order via [`Next::replay`], and then forwards the retry-all
/// action itself. Every other action passes through unchanged.
///
/// The store installs this as the last middleware, right before the reducer.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayMiddleware;

impl<S> Middleware<S> for ReplayMiddleware {
    /// Replay the cache snapshot on `RETRY_ALL`, then forward the action.
    ///
    /// The snapshot is taken before the first replay, so entries are issued
    /// exactly as they stood when the retry-all arrived.
    ///
    /// # Arguments
    ///
    /// - `ctx` — the dispatch [`Context`]; only read, to take the snapshot.
    /// - `action` — forwarded unchanged in every case.
    /// - `next` — the remainder of the pipeline.
    fn handle(&self, ctx: &mut Context<'_, S>, action: Action, next: &Next<'_, S>) {
        if action.control() == Some(ControlKind::RetryAll) {
            let snapshot = ctx.state().retry.snapshot();
            tracing::trace!(count = snapshot.len(), "replaying cached actions");
            for entry in snapshot {
                next.replay(ctx, entry.into_action());
            }
        }
        next.run(ctx, action);
    }
}

/// Built-in middleware that logs each dispatched action.
///
/// Emits a single `tracing::debug!` record after the downstream stages have
/// run, with the action type, its retry id, and the number of cached entries.
/// It never alters or drops the action.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggerMiddleware;

impl<S> Middleware<S> for LoggerMiddleware {
    /// Log the action type, retry id, and pending count after the reducer ran.
    ///
    /// Type and id are captured before `next` consumes the action; the
    /// pending count is read from the state once `next` returns.
    ///
    /// # Arguments
    ///
    /// - `ctx` — the dispatch [`Context`].
    /// - `action` — forwarded unchanged.
    /// - `next` — the remainder of the pipeline.
    fn handle(&self, ctx: &mut Context<'_, S>, action: Action, next: &Next<'_, S>) {
        let kind = action.kind().to_owned();
        let id = action.retry_id().map(|id| id.to_string());

        next.run(ctx, action);

        let pending = ctx.state().retry.len();
        tracing::debug!(kind = %kind, id = ?id, pending, "dispatched");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::creators;
    use crate::cache::{self, CacheEntry};
    use crate::config::Config;
    use crate::testing::capture_logs;
    use std::sync::Mutex;

    // Runs one action through `chain` with a terminal that records every
    // delivery and applies the cache reducer on dispatched actions.
    fn dispatch(
        state: &mut RootState<()>,
        chain: &[MiddlewareHandler<()>],
        config: &Config,
        seen: &Mutex<Vec<(String, Delivery)>>,
        action: Action,
    ) {
        let terminal = |root: &mut RootState<()>, action: &Action, delivery: Delivery| {
            seen.lock().unwrap().push((action.kind().to_owned(), delivery));
            if delivery == Delivery::Dispatched {
                let prev = std::mem::take(&mut root.retry);
                root.retry = cache::reduce(prev, action, config);
            }
        };
        let next = Next::new(chain, &terminal);
        let mut ctx = Context::new(state);
        next.run(&mut ctx, action);
    }

    struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl<S> Middleware<S> for Tag {
        fn handle(&self, ctx: &mut Context<'_, S>, action: Action, next: &Next<'_, S>) {
            self.1.lock().unwrap().push(self.0);
            next.run(ctx, action);
        }
    }

    struct Swallow;

    impl<S> Middleware<S> for Swallow {
        fn handle(&self, _ctx: &mut Context<'_, S>, _action: Action, _next: &Next<'_, S>) {}
    }

    #[test]
    fn empty_chain_reaches_terminal() {
        let mut state = RootState::default();
        let seen = Mutex::new(Vec::new());
        dispatch(&mut state, &[], &Config::new(), &seen, Action::new("PING"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("PING".to_owned(), Delivery::Dispatched)]
        );
    }

    #[test]
    fn middleware_runs_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let chain: Vec<MiddlewareHandler<()>> = vec![
            Arc::new(Tag("first", order.clone())),
            Arc::new(Tag("second", order.clone())),
        ];
        let mut state = RootState::default();
        let seen = Mutex::new(Vec::new());
        dispatch(&mut state, &chain, &Config::new(), &seen, Action::new("PING"));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn swallowing_middleware_stops_the_chain() {
        let chain: Vec<MiddlewareHandler<()>> = vec![Arc::new(Swallow)];
        let mut state = RootState::default();
        let seen = Mutex::new(Vec::new());
        dispatch(&mut state, &chain, &Config::new(), &seen, Action::new("PING"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn replay_forwards_snapshot_then_control() {
        let config = Config::new().cacheable("A").cacheable("B");
        let chain: Vec<MiddlewareHandler<()>> = vec![Arc::new(ReplayMiddleware)];
        let mut state = RootState::default();
        let seen = Mutex::new(Vec::new());
        dispatch(&mut state, &chain, &config, &seen, Action::new("A").with_retry_id("1"));
        dispatch(&mut state, &chain, &config, &seen, Action::new("B").with_retry_id("2"));
        seen.lock().unwrap().clear();

        dispatch(&mut state, &chain, &config, &seen, creators::retry_all());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ("A".to_owned(), Delivery::Replayed),
                ("B".to_owned(), Delivery::Replayed),
                (crate::action::RETRY_ALL.to_owned(), Delivery::Dispatched),
            ]
        );
        assert_eq!(
            state.retry.cache,
            vec![
                CacheEntry::new(Action::new("A").with_retry_id("1")),
                CacheEntry::new(Action::new("B").with_retry_id("2")),
            ]
        );
    }

    #[test]
    fn replay_skips_downstream_middleware() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let config = Config::new().cacheable("A");
        let chain: Vec<MiddlewareHandler<()>> = vec![
            Arc::new(ReplayMiddleware),
            Arc::new(Tag("after-replay", order.clone())),
        ];
        let mut state = RootState::default();
        let seen = Mutex::new(Vec::new());
        dispatch(&mut state, &chain, &config, &seen, Action::new("A"));
        order.lock().unwrap().clear();

        dispatch(&mut state, &chain, &config, &seen, creators::retry_all());

        // only the control action itself travels the rest of the chain
        assert_eq!(*order.lock().unwrap(), vec!["after-replay"]);
        assert_eq!(state.retry.len(), 1);
    }

    #[test]
    fn retry_all_on_empty_cache_forwards_control_only() {
        let chain: Vec<MiddlewareHandler<()>> = vec![Arc::new(ReplayMiddleware)];
        let mut state = RootState::default();
        let seen = Mutex::new(Vec::new());
        dispatch(&mut state, &chain, &Config::new(), &seen, creators::retry_all());
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(state.retry.is_empty());
    }

    #[test]
    fn logger_passes_through() {
        let config = Config::new().cacheable("A");
        let chain: Vec<MiddlewareHandler<()>> =
            vec![Arc::new(LoggerMiddleware), Arc::new(ReplayMiddleware)];
        let mut state = RootState::default();
        let seen = Mutex::new(Vec::new());
        let logs = capture_logs(|| {
            dispatch(&mut state, &chain, &config, &seen, Action::new("A").with_retry_id("x"));
        });
        assert_eq!(state.retry.len(), 1);
        assert_eq!(seen.lock().unwrap().len(), 1);

        assert_eq!(logs.matches("dispatched").count(), 1, "{logs}");
        assert!(logs.contains("DEBUG"), "{logs}");
        assert!(logs.contains("kind=A"), "{logs}");
        assert!(logs.contains(r#"id=Some("x")"#), "{logs}");
        // the record is emitted after the reducer ran
        assert!(logs.contains("pending=1"), "{logs}");
    }

    #[test]
    fn logger_sees_retry_all_once() {
        let config = Config::new().cacheable("A");
        let chain: Vec<MiddlewareHandler<()>> =
            vec![Arc::new(LoggerMiddleware), Arc::new(ReplayMiddleware)];
        let mut state = RootState::default();
        let seen = Mutex::new(Vec::new());
        dispatch(&mut state, &chain, &config, &seen, Action::new("A"));
        dispatch(&mut state, &chain, &config, &seen, Action::new("A"));

        let logs = capture_logs(|| {
            dispatch(&mut state, &chain, &config, &seen, creators::retry_all());
        });
        // replays bypass the logger
        assert_eq!(logs.matches("dispatched").count(), 1, "{logs}");
        assert!(logs.contains("id=None"), "{logs}");
        assert!(logs.contains("pending=2"), "{logs}");
    }
}
