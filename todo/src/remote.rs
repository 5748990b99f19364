//! Contract of the remote document store holding each user's todos.
//!
//! Collections live at `users/{userId}/todos/{todoId}`. The store owns ids and
//! pushes full snapshots to every live query after each change; nothing on
//! this side patches its copy locally.

use crate::types::{Category, Priority, TodoId, TodoItem, TodoPatch, UserId};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors reported by a [`TodoRemote`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// The signed-in user may not access the collection
    #[error("Permission denied for user {0}")]
    PermissionDenied(UserId),

    /// No document with this id
    #[error("Todo not found: {0}")]
    NotFound(TodoId),

    /// A field update with no fields
    #[error("Update contains no fields")]
    EmptyUpdate,

    /// Empty or whitespace user id
    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),

    /// A stored document could not be decoded
    #[error("Failed to decode document {id}: {reason}")]
    Decode {
        /// Document id
        id: String,
        /// Decoder message
        reason: String,
    },
}

/// Full snapshots of one user's collection, newest `createdAt` first
///
/// The first item is the current contents; later items follow every change.
/// Dropping the stream detaches the listener.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Vec<TodoItem>> + Send>>;

/// Boxed future returned by [`TodoRemote`] operations
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Remote todo store
///
/// Explicit boxed futures keep the trait usable as `Arc<dyn TodoRemote>`,
/// which the reducer environment captures into effects.
pub trait TodoRemote: Send + Sync {
    /// Opens a live query over the user's collection
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidUserId`] for a blank id, or whatever prevents the
    /// listener from attaching.
    fn subscribe<'a>(&'a self, user_id: &'a UserId) -> RemoteFuture<'a, SnapshotStream>;

    /// Stores a new item and returns the id the store assigned
    ///
    /// The item's own `id` is ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the write is rejected.
    fn insert<'a>(&'a self, user_id: &'a UserId, item: TodoItem) -> RemoteFuture<'a, TodoId>;

    /// Writes only the fields present in `patch`
    ///
    /// # Errors
    ///
    /// [`StoreError::EmptyUpdate`] for an empty patch,
    /// [`StoreError::NotFound`] for an unknown id.
    fn update_fields<'a>(
        &'a self,
        user_id: &'a UserId,
        id: &'a TodoId,
        patch: TodoPatch,
    ) -> RemoteFuture<'a, ()>;

    /// Deletes a document
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] for an unknown id.
    fn delete<'a>(&'a self, user_id: &'a UserId, id: &'a TodoId) -> RemoteFuture<'a, ()>;
}

/// Body of a stored todo document, as written on the wire
///
/// Missing fields decode to the model defaults; a missing `createdAt` is
/// stamped with the decode time. The document id lives outside the body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TodoDocument {
    /// `title`
    pub title: String,
    /// `isCompleted`
    pub is_completed: bool,
    /// `createdAt`, milliseconds since the Unix epoch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// `priority`
    pub priority: Priority,
    /// `category`
    pub category: Category,
}

impl TodoDocument {
    /// Attaches the document id
    ///
    /// `decoded_at` stands in for a missing creation time.
    #[must_use]
    pub fn into_item(self, id: TodoId, decoded_at: i64) -> TodoItem {
        TodoItem {
            id,
            title: self.title,
            is_completed: self.is_completed,
            created_at: self.created_at.unwrap_or(decoded_at),
            priority: self.priority,
            category: self.category,
        }
    }

    /// Decodes a raw document body
    ///
    /// # Errors
    ///
    /// [`StoreError::Decode`] when a field has the wrong type.
    pub fn decode(id: &str, body: serde_json::Value) -> Result<Self, StoreError> {
        serde_json::from_value(body).map_err(|e| StoreError::Decode {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }
}

impl From<TodoItem> for TodoDocument {
    fn from(item: TodoItem) -> Self {
        Self {
            title: item.title,
            is_completed: item.is_completed,
            created_at: Some(item.created_at),
            priority: item.priority,
            category: item.category,
        }
    }
}
