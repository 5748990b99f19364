//! Reducer for the synchronized todo list.
//!
//! Commands are validated, then forwarded to the remote store as effects. The
//! list itself only changes when a snapshot arrives from the live query, so a
//! mutation's outcome becomes visible through the next delivery.

use crate::ordering::sort_snapshot;
use crate::remote::{StoreError, TodoRemote};
use crate::types::{
    MutationKind, SubscriptionStatus, TodoAction, TodoId, TodoItem, TodoPatch, TodoState, UserId,
};
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use todo_sync_core::{
    effect::{Effect, EffectId},
    environment::Clock,
    reducer::Reducer,
    smallvec, SmallVec,
};

/// Id of the live query effect
pub const TODOS_LIVE: EffectId = EffectId::new("todos.live");

/// Environment dependencies for the todo reducer
#[derive(Clone)]
pub struct TodoEnvironment {
    /// Clock for creation timestamps
    pub clock: Arc<dyn Clock>,
    /// Remote document store
    pub remote: Arc<dyn TodoRemote>,
}

impl TodoEnvironment {
    /// Creates a new `TodoEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, remote: Arc<dyn TodoRemote>) -> Self {
        Self { clock, remote }
    }
}

/// Reducer for one user's todo list
#[derive(Clone, Debug)]
pub struct TodoReducer;

impl TodoReducer {
    /// Creates a new `TodoReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_title(title: &str) -> Result<(), String> {
        if title.trim().is_empty() {
            return Err("Todo title cannot be empty".to_string());
        }

        Ok(())
    }

    fn validate_saved(id: &TodoId) -> Result<(), String> {
        if id.is_assigned() {
            Ok(())
        } else {
            Err("Todo has not been saved yet".to_string())
        }
    }

    fn current_user(state: &TodoState) -> Result<UserId, String> {
        state
            .user_id
            .clone()
            .ok_or_else(|| "Not subscribed to any todo list".to_string())
    }

    fn is_current_user(state: &TodoState, user_id: &UserId) -> bool {
        state.user_id.as_ref() == Some(user_id)
    }

    /// Applies an event to state
    fn apply_event(state: &mut TodoState, action: &TodoAction) {
        match action {
            TodoAction::SnapshotReceived { items, .. } => {
                state.items = sort_snapshot(items.clone());
                state.subscription = SubscriptionStatus::Live {
                    deliveries: state.subscription.deliveries() + 1,
                };
                state.last_error = None;
            },
            TodoAction::SubscriptionFailed { reason, .. } => {
                state.subscription = SubscriptionStatus::Failed {
                    reason: reason.clone(),
                };
                state.last_error = Some(reason.clone());
            },
            TodoAction::MutationSucceeded { .. } => {
                state.pending_mutations = state.pending_mutations.saturating_sub(1);
                state.last_error = None;
            },
            TodoAction::MutationFailed { kind, error } => {
                state.pending_mutations = state.pending_mutations.saturating_sub(1);
                state.last_error = Some(format!("Failed to {kind} todo: {error}"));
            },
            TodoAction::ValidationFailed { error } => {
                state.last_error = Some(error.clone());
            },
            // Commands are not applied to state
            TodoAction::Subscribe { .. }
            | TodoAction::Unsubscribe
            | TodoAction::AddTodo { .. }
            | TodoAction::ToggleTodo { .. }
            | TodoAction::EditTodo { .. }
            | TodoAction::DeleteTodo { .. }
            | TodoAction::SetFilter { .. }
            | TodoAction::SetSearch { .. } => {},
        }
    }

    fn reject(state: &mut TodoState, error: String) -> SmallVec<[Effect<TodoAction>; 4]> {
        tracing::debug!(%error, "Rejected todo command");
        Self::apply_event(state, &TodoAction::ValidationFailed { error });
        SmallVec::new()
    }

    /// Live query over `user_id`'s collection
    ///
    /// Every snapshot becomes `SnapshotReceived`; a setup failure or the store
    /// closing the query becomes `SubscriptionFailed`.
    fn live_query(env: &TodoEnvironment, user_id: UserId) -> Effect<TodoAction> {
        let remote = Arc::clone(&env.remote);

        Effect::stream(async_stream::stream! {
            match remote.subscribe(&user_id).await {
                Ok(mut snapshots) => {
                    tracing::debug!(user = %user_id, "Live query attached");
                    while let Some(items) = snapshots.next().await {
                        yield TodoAction::SnapshotReceived {
                            user_id: user_id.clone(),
                            items,
                        };
                    }
                    tracing::warn!(user = %user_id, "Live query closed by the store");
                    yield TodoAction::SubscriptionFailed {
                        user_id: user_id.clone(),
                        reason: "Live query closed".to_string(),
                    };
                },
                Err(error) => {
                    tracing::warn!(user = %user_id, %error, "Live query failed");
                    yield TodoAction::SubscriptionFailed {
                        user_id: user_id.clone(),
                        reason: error.to_string(),
                    };
                },
            }
        })
        .cancellable(TODOS_LIVE)
    }

    /// Forwards a store call and reports its outcome
    fn mutation<F>(kind: MutationKind, call: F) -> Effect<TodoAction>
    where
        F: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        Effect::future(async move {
            match call.await {
                Ok(()) => Some(TodoAction::MutationSucceeded { kind }),
                Err(error) => {
                    tracing::warn!(%kind, %error, "Todo mutation failed");
                    Some(TodoAction::MutationFailed {
                        kind,
                        error: error.to_string(),
                    })
                },
            }
        })
    }

    fn update(
        state: &mut TodoState,
        env: &TodoEnvironment,
        kind: MutationKind,
        user_id: UserId,
        id: TodoId,
        patch: TodoPatch,
    ) -> SmallVec<[Effect<TodoAction>; 4]> {
        state.pending_mutations += 1;
        let remote = Arc::clone(&env.remote);
        smallvec![Self::mutation(kind, async move {
            remote.update_fields(&user_id, &id, patch).await
        })]
    }
}

impl Default for TodoReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for TodoReducer {
    type State = TodoState;
    type Action = TodoAction;
    type Environment = TodoEnvironment;

    #[allow(clippy::too_many_lines)]
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            TodoAction::Subscribe { user_id } => {
                if user_id.is_blank() {
                    return Self::reject(state, "User id cannot be empty".to_string());
                }

                tracing::info!(user = %user_id, "Subscribing to todo list");
                state.user_id = Some(user_id.clone());
                state.items.clear();
                state.subscription = SubscriptionStatus::Subscribing;
                state.last_error = None;

                smallvec![Effect::Cancel(TODOS_LIVE), Self::live_query(env, user_id)]
            },

            TodoAction::Unsubscribe => {
                tracing::info!("Unsubscribing from todo list");
                state.user_id = None;
                state.items.clear();
                state.subscription = SubscriptionStatus::Idle;
                state.last_error = None;

                smallvec![Effect::Cancel(TODOS_LIVE)]
            },

            TodoAction::AddTodo {
                title,
                priority,
                category,
            } => {
                let validated = Self::current_user(state)
                    .and_then(|user| Self::validate_title(&title).map(|()| user));
                let user_id = match validated {
                    Ok(user_id) => user_id,
                    Err(error) => return Self::reject(state, error),
                };

                let item = TodoItem::new(title, priority, category, env.clock.now_millis());
                state.pending_mutations += 1;

                let remote = Arc::clone(&env.remote);
                smallvec![Self::mutation(MutationKind::Add, async move {
                    let id = remote.insert(&user_id, item).await?;
                    tracing::debug!(%id, "Todo stored");
                    Ok::<(), StoreError>(())
                })]
            },

            TodoAction::ToggleTodo { item } => {
                let validated = Self::current_user(state)
                    .and_then(|user| Self::validate_saved(&item.id).map(|()| user));
                match validated {
                    Ok(user_id) => Self::update(
                        state,
                        env,
                        MutationKind::Toggle,
                        user_id,
                        item.id,
                        TodoPatch::completion(!item.is_completed),
                    ),
                    Err(error) => Self::reject(state, error),
                }
            },

            TodoAction::EditTodo {
                id,
                title,
                priority,
                category,
            } => {
                let validated = Self::current_user(state).and_then(|user| {
                    Self::validate_saved(&id)?;
                    Self::validate_title(&title)?;
                    Ok(user)
                });
                match validated {
                    Ok(user_id) => Self::update(
                        state,
                        env,
                        MutationKind::Edit,
                        user_id,
                        id,
                        TodoPatch::edit(title, priority, category),
                    ),
                    Err(error) => Self::reject(state, error),
                }
            },

            TodoAction::DeleteTodo { id } => {
                let validated = Self::current_user(state)
                    .and_then(|user| Self::validate_saved(&id).map(|()| user));
                let user_id = match validated {
                    Ok(user_id) => user_id,
                    Err(error) => return Self::reject(state, error),
                };

                state.pending_mutations += 1;
                let remote = Arc::clone(&env.remote);
                smallvec![Self::mutation(MutationKind::Delete, async move {
                    remote.delete(&user_id, &id).await
                })]
            },

            TodoAction::SetFilter { filter } => {
                state.filter = filter;
                SmallVec::new()
            },

            TodoAction::SetSearch { text } => {
                state.search = text;
                SmallVec::new()
            },

            // ========== Events ==========
            TodoAction::SnapshotReceived { ref user_id, .. }
            | TodoAction::SubscriptionFailed { ref user_id, .. } => {
                if Self::is_current_user(state, user_id) {
                    Self::apply_event(state, &action);
                } else {
                    tracing::debug!(user = %user_id, "Ignoring event for a previous subscription");
                }
                SmallVec::new()
            },

            TodoAction::MutationSucceeded { .. }
            | TodoAction::MutationFailed { .. }
            | TodoAction::ValidationFailed { .. } => {
                Self::apply_event(state, &action);
                SmallVec::new()
            },
        }
    }
}
