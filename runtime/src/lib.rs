//! # todo-sync runtime
//!
//! Runtime implementation for todo-sync reducers.
//!
//! This crate provides the Store runtime that coordinates reducer execution
//! and effect handling.
//!
//! ## Core Components
//!
//! - **Store**: Owns state, runs the reducer, executes effects
//! - **Feedback loop**: action → reducer → effects → action
//! - **Observers**: a `watch` channel with the latest state and a `broadcast`
//!   channel with every action produced by effects
//! - **Cancellable effects**: long-lived tasks (live queries) registered by
//!   [`EffectId`] and aborted on replacement, cancellation or shutdown
//!
//! ## Example
//!
//! ```ignore
//! use todo_sync_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action
//! store.send(Action::DoSomething).await?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//!
//! // Re-render whenever state changes
//! let mut rx = store.subscribe_state();
//! while rx.changed().await.is_ok() {
//!     render(&*rx.borrow());
//! }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use todo_sync_core::effect::{Effect, EffectId};
use todo_sync_core::reducer::Reducer;
use tokio::sync::{watch, RwLock};
use tokio::task::AbortHandle;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a matching action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is received.
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel closed
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use todo_sync_runtime::StoreConfig;
///
/// let config = StoreConfig::default()
///     .with_broadcast_capacity(64)
///     .with_shutdown_timeout(Duration::from_secs(2));
/// assert_eq!(config.broadcast_capacity, 64);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Number of feedback actions buffered for slow action observers
    pub broadcast_capacity: usize,
    /// Default timeout for graceful shutdown
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Set the action broadcast capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: 16,
            default_shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the effects spawned by
/// that action. Cancellable effects are long-lived and are not tracked here;
/// they end when cancelled, replaced, or when the store shuts down.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(Action::Start).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    /// Create a handle and the tracking context used while executing effects
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };
        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (_tx, rx) = watch::channel(());
        Self {
            effects: Arc::new(AtomicUsize::new(0)),
            completion: rx,
        }
    }

    /// Number of tracked effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all tracked effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                // All senders dropped: every tracked effect has finished.
                break;
            }
        }
    }

    /// Wait for all tracked effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires before all
    /// effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: completion counter shared by every effect of one `send()`
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements the effect counter on drop
///
/// Keeps the counter accurate even if the effect panics or is aborted.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Internal: a live cancellable task
struct Registration {
    generation: u64,
    handle: AbortHandle,
}

type Registry = Mutex<HashMap<EffectId, Registration>>;

fn lock_registry(registry: &Registry) -> MutexGuard<'_, HashMap<EffectId, Registration>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Store module - The runtime for reducers
pub mod store {
    use super::{
        lock_registry, Arc, AtomicBool, AtomicCounterGuard, AtomicU64, AtomicUsize,
        DecrementGuard, Duration, Effect, EffectHandle, EffectId, EffectTracking, Ordering,
        Reducer, Registration, Registry, RwLock, StoreConfig, StoreError,
    };
    use futures::future::{self, BoxFuture, FutureExt};
    use futures::StreamExt;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::{broadcast, watch};

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    /// 5. Cancellable long-lived effects, keyed by [`EffectId`]
    ///
    /// The reducer always runs under the write lock, so every reduction is
    /// observed as a whole: the state channel only ever carries fully reduced
    /// states.
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        default_shutdown_timeout: Duration,
        /// Every action produced by an effect is broadcast here.
        action_broadcast: broadcast::Sender<A>,
        /// Latest state after each reduction.
        state_broadcast: Arc<watch::Sender<S>>,
        cancellables: Arc<Registry>,
        next_generation: Arc<AtomicU64>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
        A: Clone + Send + 'static,
        S: Clone + Send + Sync + 'static,
        E: Clone + Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a new Store with custom configuration
        #[must_use]
        pub fn with_config(
            initial_state: S,
            reducer: R,
            environment: E,
            config: StoreConfig,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));
            let (state_broadcast, _) = watch::channel(initial_state.clone());

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                default_shutdown_timeout: config.default_shutdown_timeout,
                action_broadcast,
                state_broadcast: Arc::new(state_broadcast),
                cancellables: Arc::new(Mutex::new(HashMap::new())),
                next_generation: Arc::new(AtomicU64::new(0)),
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Publishes the new state to state observers
        /// 4. Starts the returned effects; they may produce more actions
        ///
        /// `send()` returns after starting effect execution, not completion.
        /// `Cancel` and `Cancellable` effects take effect before it returns, so a
        /// replaced subscription is already detached when the caller resumes.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.commands.total").increment(1);

            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;
                tracing::trace!("Acquired write lock on state");

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                self.state_broadcast.send_replace((*state).clone());
                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            for effect in effects {
                self.execute_effect(effect, &tracking);
            }

            Ok(handle)
        }

        /// Send an action and wait for a matching feedback action
        ///
        /// Subscribes to the action broadcast before sending, so a fast effect
        /// cannot slip its result past the caller.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: no matching action within `timeout`
        /// - [`StoreError::ChannelClosed`]: the broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            let mut rx = self.action_broadcast.subscribe();

            self.send(action).await?;

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action observer lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to every action produced by effects
        ///
        /// Actions sent directly through [`Store::send`] are not broadcast.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Subscribe to state changes
        ///
        /// The receiver always holds the most recent fully reduced state; slow
        /// observers skip intermediate states ("last state wins").
        #[must_use]
        pub fn subscribe_state(&self) -> watch::Receiver<S> {
            self.state_broadcast.subscribe()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let count = store.state(|s| s.items.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Whether a cancellable effect is currently registered under `id`
        #[must_use]
        pub fn is_active(&self, id: EffectId) -> bool {
            lock_registry(&self.cancellables).contains_key(&id)
        }

        /// Number of live cancellable effects
        #[must_use]
        pub fn active_cancellables(&self) -> usize {
            lock_registry(&self.cancellables).len()
        }

        /// Abort the cancellable effect registered under `id`
        ///
        /// Returns `true` if an effect was registered.
        pub fn cancel(&self, id: EffectId) -> bool {
            let removed = lock_registry(&self.cancellables).remove(&id);
            match removed {
                Some(registration) => {
                    registration.handle.abort();
                    tracing::debug!(effect_id = %id, "Cancelled effect");
                    metrics::counter!("store.effects.cancelled").increment(1);
                    true
                },
                None => {
                    tracing::trace!(effect_id = %id, "Nothing to cancel");
                    false
                },
            }
        }

        /// Graceful shutdown with the configured default timeout
        ///
        /// # Errors
        ///
        /// See [`Store::shutdown`].
        pub async fn shutdown_default(&self) -> Result<(), StoreError> {
            self.shutdown(self.default_shutdown_timeout).await
        }

        /// Initiate graceful shutdown of the store
        ///
        /// 1. Sets the shutdown flag (rejecting new actions)
        /// 2. Aborts every cancellable effect
        /// 3. Waits for the remaining effects to complete (with timeout)
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            self.shutdown.store(true, Ordering::Release);

            let drained: Vec<_> = lock_registry(&self.cancellables).drain().collect();
            for (id, registration) in drained {
                tracing::debug!(effect_id = %id, "Aborting cancellable effect on shutdown");
                registration.handle.abort();
            }

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);
                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }
                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timeout");
                    return Err(StoreError::ShutdownTimeout(pending));
                }
                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Start a top-level effect returned by the reducer
        ///
        /// `Cancel` and `Cancellable` are handled synchronously; everything else
        /// runs on a spawned task counted by `tracking`.
        fn execute_effect(&self, effect: Effect<A>, tracking: &EffectTracking) {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                },
                Effect::Cancel(id) => {
                    self.cancel(id);
                },
                Effect::Cancellable { id, effect } => {
                    self.spawn_cancellable(id, *effect);
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                    for effect in effects {
                        self.execute_effect(effect, tracking);
                    }
                },
                other => {
                    tracking.increment();
                    self.pending_effects.fetch_add(1, Ordering::SeqCst);
                    let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));
                    let guard = DecrementGuard(tracking.clone());
                    let task = self.run(other);

                    tokio::spawn(async move {
                        let _guard = guard;
                        let _pending_guard = pending_guard;
                        task.await;
                    });
                },
            }
        }

        /// Spawn `effect` and register it under `id`, aborting any previous
        /// registration with the same id
        fn spawn_cancellable(&self, id: EffectId, effect: Effect<A>) {
            let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
            let task = self.run(effect);
            let registry = Arc::clone(&self.cancellables);

            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

            // The task removes its own entry when it ends naturally; holding the
            // lock across spawn + insert keeps that removal after the insert.
            let mut live = lock_registry(&self.cancellables);
            let join = tokio::spawn(async move {
                let _pending_guard = pending_guard;
                task.await;
                let mut live = lock_registry(&registry);
                if live.get(&id).is_some_and(|r| r.generation == generation) {
                    live.remove(&id);
                    tracing::debug!(effect_id = %id, "Cancellable effect finished");
                }
            });

            let previous = live.insert(
                id,
                Registration {
                    generation,
                    handle: join.abort_handle(),
                },
            );
            drop(live);

            if let Some(previous) = previous {
                previous.handle.abort();
                tracing::debug!(effect_id = %id, "Replaced cancellable effect");
            } else {
                tracing::debug!(effect_id = %id, "Registered cancellable effect");
            }
            metrics::counter!("store.effects.executed", "type" => "cancellable").increment(1);
        }

        /// Build the future that runs `effect` to completion, feeding produced
        /// actions back into the store
        fn run(&self, effect: Effect<A>) -> BoxFuture<'static, ()> {
            let store = self.clone();
            match effect {
                Effect::None => future::ready(()).boxed(),
                Effect::Future(fut) => {
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    async move {
                        if let Some(action) = fut.await {
                            store.feed(action).await;
                        } else {
                            tracing::trace!("Effect::Future completed with no action");
                        }
                    }
                    .boxed()
                },
                Effect::Delay { duration, action } => {
                    metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                    async move {
                        tokio::time::sleep(duration).await;
                        store.feed(*action).await;
                    }
                    .boxed()
                },
                Effect::Stream(mut stream) => {
                    metrics::counter!("store.effects.executed", "type" => "stream").increment(1);
                    async move {
                        let mut delivered = 0_u64;
                        while let Some(action) = stream.next().await {
                            delivered += 1;
                            store.feed(action).await;
                        }
                        tracing::debug!(delivered, "Effect::Stream ended");
                    }
                    .boxed()
                },
                Effect::Parallel(effects) => {
                    let tasks: Vec<_> = effects.into_iter().map(|e| store.run(e)).collect();
                    async move {
                        future::join_all(tasks).await;
                    }
                    .boxed()
                },
                Effect::Sequential(effects) => async move {
                    for effect in effects {
                        store.run(effect).await;
                    }
                }
                .boxed(),
                Effect::Cancellable { id, effect } => {
                    store.spawn_cancellable(id, *effect);
                    future::ready(()).boxed()
                },
                Effect::Cancel(id) => {
                    store.cancel(id);
                    future::ready(()).boxed()
                },
            }
        }

        /// Broadcast a feedback action and send it back through the reducer
        async fn feed(&self, action: A) {
            let _ = self.action_broadcast.send(action.clone());
            if let Err(error) = self.send(action).await {
                tracing::debug!(%error, "Dropped feedback action");
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                default_shutdown_timeout: self.default_shutdown_timeout,
                action_broadcast: self.action_broadcast.clone(),
                state_broadcast: Arc::clone(&self.state_broadcast),
                cancellables: Arc::clone(&self.cancellables),
                next_generation: Arc::clone(&self.next_generation),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
