//! Live-synchronized todo list.
//!
//! A user's todos live in a remote document store. This crate keeps the last
//! snapshot the store pushed, sorted for display, derives the filtered and
//! searched view from it, and forwards every mutation to the store. The list
//! only changes when the next snapshot arrives.
//!
//! - [`ordering`]: display order of a snapshot
//! - [`view`]: filter and search over the sorted snapshot
//! - [`remote`]: the store contract ([`TodoRemote`])
//! - [`memory`]: an in-process store for tests and demos
//! - [`reducer`]: [`TodoReducer`], run inside a `todo_sync_runtime::Store`
//!
//! # Quick Start
//!
//! ```no_run
//! use todo_sync::{memory::InMemoryTodoStore, TodoAction, TodoEnvironment, TodoReducer, TodoState, UserId};
//! use todo_sync_core::environment::SystemClock;
//! use todo_sync_runtime::Store;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let env = TodoEnvironment::new(Arc::new(SystemClock), Arc::new(InMemoryTodoStore::new()));
//! let store = Store::new(TodoState::new(), TodoReducer::new(), env);
//!
//! store.send(TodoAction::Subscribe { user_id: UserId::new("alice") }).await?;
//! store.send(TodoAction::add("Buy milk")).await?;
//!
//! let mut states = store.subscribe_state();
//! while states.changed().await.is_ok() {
//!     for item in states.borrow().derived_view() {
//!         println!("[{}] {}", if item.is_completed { "x" } else { " " }, item.title);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod memory;
pub mod ordering;
pub mod reducer;
pub mod remote;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use config::{AppConfig, ConfigError};
pub use reducer::{TodoEnvironment, TodoReducer, TODOS_LIVE};
pub use remote::{SnapshotStream, StoreError, TodoRemote};
pub use types::{
    Category, MutationKind, Priority, SubscriptionStatus, TodoAction, TodoFilter, TodoId,
    TodoItem, TodoPatch, TodoState, UserId,
};
pub use view::{derive_view, ViewSummary};
