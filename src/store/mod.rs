//! The host store — a single synchronous dispatch entry point over a
//! middleware pipeline and a terminal reducer.
//!
//! The root state keeps the replay cache under the reserved `retry` key next
//! to the application's own state:
//!
//! ```text
//! { "retry": { "cache": [ { "action": ... }, ... ] }, ...application fields }
//! ```
//!
//! [`ReplayMiddleware`] is always the last middleware, so every user-supplied
//! middleware sees a `RETRY_ALL` before it fans out, and none of them see the
//! replayed actions.
//!
//! [`SharedStore`] wraps a [`Store`] in an async mutex for hosts that dispatch
//! from more than one task. All dispatches still run one at a time.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::action::Action;
use crate::cache::{self, CacheState};
use crate::config::Config;
use crate::middleware::{Context, Delivery, Middleware, MiddlewareHandler, Next, ReplayMiddleware};

/// The application's reducer. Receives dispatched and replayed actions alike.
pub type Reducer<S> = Box<dyn Fn(S, &Action) -> S + Send + Sync>;

/// Root state: the replay cache slice plus the application state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RootState<S> {
    pub retry: CacheState,

    #[serde(flatten)]
    pub app: S,
}

/// Builder for [`Store`].
///
/// # Examples
///
/// ```
/// use retrace::{Action, Config, Store};
///
/// let mut store = Store::<()>::builder(Config::new().cacheable("FETCH")).build();
/// store.dispatch(Action::new("FETCH").with_retry_id("a"));
/// assert_eq!(store.pending(), 1);
/// ```
pub struct StoreBuilder<S> {
    config: Config,
    reducer: Option<Reducer<S>>,
    middlewares: Vec<MiddlewareHandler<S>>,
    initial: S,
}

impl<S> StoreBuilder<S>
where
    S: Default + 'static,
{
    fn new(config: Config) -> Self {
        Self {
            config,
            reducer: None,
            middlewares: Vec::new(),
            initial: S::default(),
        }
    }

    /// Sets the application reducer. Defaults to the identity.
    ///
    /// The reducer sees every dispatched action, every replayed action, and
    /// the control actions themselves, always after the cache slice has been
    /// updated.
    ///
    /// # Arguments
    ///
    /// - `reducer` — `(state, action) -> state`, run once per delivery.
    ///
    /// # Examples
    ///
    /// ```
    /// use retrace::{Action, Config, Store};
    ///
    /// let mut store = Store::builder(Config::new())
    ///     .reducer(|count: u32, action: &Action| {
    ///         if action.kind() == "CLICK" { count + 1 } else { count }
    ///     })
    ///     .build();
    /// store.dispatch(Action::new("CLICK"));
    /// assert_eq!(store.state().app, 1);
    /// ```
    #[must_use]
    pub fn reducer<F>(mut self, reducer: F) -> Self
    where
        F: Fn(S, &Action) -> S + Send + Sync + 'static,
    {
        self.reducer = Some(Box::new(reducer));
        self
    }

    /// Appends a middleware. Middleware run in the order they are added,
    /// all of them ahead of the replay stage.
    ///
    /// # Arguments
    ///
    /// - `middleware` — any [`Middleware`] implementation; it is stored behind
    ///   an `Arc`.
    ///
    /// # Examples
    ///
    /// ```
    /// use retrace::{Config, LoggerMiddleware, Store};
    ///
    /// let store = Store::<()>::builder(Config::new())
    ///     .middleware(LoggerMiddleware)
    ///     .build();
    /// ```
    #[must_use]
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware<S> + 'static,
    {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Sets the application state the store starts from.
    ///
    /// # Arguments
    ///
    /// - `state` — initial application slice; defaults to `S::default()`.
    ///   The cache slice always starts empty.
    #[must_use]
    pub fn initial_state(mut self, state: S) -> Self {
        self.initial = state;
        self
    }

    /// Finishes the pipeline and creates the store.
    ///
    /// [`ReplayMiddleware`] is appended after every middleware added so far,
    /// directly ahead of the terminal reducer stage.
    ///
    /// # Returns
    ///
    /// A [`Store`] with an empty cache.
    pub fn build(self) -> Store<S> {
        let mut middlewares = self.middlewares;
        middlewares.push(Arc::new(ReplayMiddleware));
        debug!(
            cacheable = self.config.cacheable_types().count(),
            middlewares = middlewares.len(),
            "store built"
        );
        let reducer: Reducer<S> = match self.reducer {
            Some(reducer) => reducer,
            None => Box::new(identity::<S>),
        };
        Store {
            state: RootState {
                retry: CacheState::new(),
                app: self.initial,
            },
            config: self.config,
            reducer,
            middlewares,
        }
    }
}

fn identity<S>(state: S, _action: &Action) -> S {
    state
}

/// A synchronous store with a replay cache.
pub struct Store<S> {
    state: RootState<S>,
    config: Config,
    reducer: Reducer<S>,
    middlewares: Vec<MiddlewareHandler<S>>,
}

impl<S> Store<S>
where
    S: Default + 'static,
{
    /// Starts building a store around `config`.
    ///
    /// # Arguments
    ///
    /// - `config` — the cacheable action types, fixed for the store's life.
    pub fn builder(config: Config) -> StoreBuilder<S> {
        StoreBuilder::new(config)
    }

    /// Runs `action` through the pipeline. Any replay it triggers has
    /// completed by the time this returns.
    ///
    /// The cache slice is written back before the application reducer runs,
    /// so a panicking reducer propagates its panic but leaves the cache
    /// intact; only the application slice falls back to `S::default()`.
    ///
    /// # Arguments
    ///
    /// - `action` — any application or control action.
    pub fn dispatch(&mut self, action: Action) {
        let Self {
            state,
            config,
            reducer,
            middlewares,
        } = self;
        let (config, reducer) = (&*config, &*reducer);

        let terminal = |root: &mut RootState<S>, action: &Action, delivery: Delivery| {
            if delivery == Delivery::Dispatched {
                let retry = std::mem::take(&mut root.retry);
                root.retry = cache::reduce(retry, action, config);
            }
            let app = std::mem::take(&mut root.app);
            root.app = reducer(app, action);
        };

        let next = Next::new(middlewares.as_slice(), &terminal);
        let mut ctx = Context::new(state);
        next.run(&mut ctx, action);
    }
}

impl<S> Store<S> {
    /// The current root state.
    ///
    /// # Returns
    ///
    /// The cache slice under [`RootState::retry`] and the application slice
    /// under [`RootState::app`].
    pub fn state(&self) -> &RootState<S> {
        &self.state
    }

    /// Number of cached actions awaiting retry.
    pub fn pending(&self) -> usize {
        self.state.retry.len()
    }
}

/// A [`Store`] shared across tasks behind a single async lock.
pub struct SharedStore<S> {
    inner: Arc<Mutex<Store<S>>>,
}

impl<S> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> SharedStore<S>
where
    S: Default + 'static,
{
    /// Moves `store` behind a shared async lock.
    ///
    /// # Arguments
    ///
    /// - `store` — a built [`Store`]; clones of the returned handle all
    ///   dispatch into it.
    pub fn new(store: Store<S>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Waits for the lock, then runs [`Store::dispatch`].
    ///
    /// Dispatches from different tasks never interleave: each one, including
    /// any replay it triggers, finishes before the next acquires the lock.
    ///
    /// # Arguments
    ///
    /// - `action` — any application or control action.
    pub async fn dispatch(&self, action: Action) {
        self.inner.lock().await.dispatch(action);
    }

    /// Runs `f` against the current state while holding the lock.
    ///
    /// # Arguments
    ///
    /// - `f` — a synchronous read of the state; no dispatch can run
    ///   concurrently with it.
    ///
    /// # Returns
    ///
    /// Whatever `f` returns.
    pub async fn with_state<R>(&self, f: impl FnOnce(&RootState<S>) -> R) -> R {
        let store = self.inner.lock().await;
        f(store.state())
    }

    /// A cloned copy of the current root state.
    pub async fn snapshot(&self) -> RootState<S>
    where
        S: Clone,
    {
        self.with_state(RootState::clone).await
    }

    /// Number of cached actions awaiting retry.
    pub async fn pending(&self) -> usize {
        self.inner.lock().await.pending()
    }
}
