//! In-process [`TodoRemote`] used by tests and the demo binary.
//!
//! Documents are kept as raw JSON bodies so they go through the same decoding
//! a real document store would. Each user's collection publishes snapshots on
//! a `watch` channel; a live query is a receiver, so dropping the stream
//! detaches the listener. Documents without `createdAt` are stamped with the
//! store clock each time a snapshot is decoded.

use crate::remote::{RemoteFuture, SnapshotStream, StoreError, TodoDocument, TodoRemote};
use crate::types::{TodoId, TodoItem, TodoPatch, UserId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use todo_sync_core::environment::{Clock, SystemClock};
use tokio::sync::watch;

struct Collection {
    documents: BTreeMap<String, serde_json::Value>,
    snapshots: watch::Sender<Vec<TodoItem>>,
}

impl Collection {
    fn new() -> Self {
        let (snapshots, _) = watch::channel(Vec::new());
        Self {
            documents: BTreeMap::new(),
            snapshots,
        }
    }

    fn snapshot(&self, now: i64) -> Vec<TodoItem> {
        let mut items: Vec<TodoItem> = self
            .documents
            .iter()
            .filter_map(|(id, body)| match TodoDocument::decode(id, body.clone()) {
                Ok(doc) => Some(doc.into_item(TodoId::new(id.as_str()), now)),
                Err(error) => {
                    tracing::warn!(%error, "Skipping undecodable todo document");
                    None
                },
            })
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items
    }

    fn publish(&self, now: i64) {
        self.snapshots.send_replace(self.snapshot(now));
    }
}

#[derive(Default)]
struct Inner {
    collections: HashMap<UserId, Collection>,
    revoked: HashSet<UserId>,
    fail_next_mutation: Option<StoreError>,
    fail_next_subscribe: Option<StoreError>,
}

impl Inner {
    fn check_user(&self, user_id: &UserId) -> Result<(), StoreError> {
        if user_id.is_blank() {
            return Err(StoreError::InvalidUserId(user_id.to_string()));
        }
        if self.revoked.contains(user_id) {
            return Err(StoreError::PermissionDenied(user_id.clone()));
        }
        Ok(())
    }

    fn begin_mutation(&mut self, user_id: &UserId) -> Result<&mut Collection, StoreError> {
        if let Some(error) = self.fail_next_mutation.take() {
            return Err(error);
        }
        self.check_user(user_id)?;
        Ok(self
            .collections
            .entry(user_id.clone())
            .or_insert_with(Collection::new))
    }
}

/// Document store kept in memory
///
/// ```
/// use todo_sync::memory::InMemoryTodoStore;
/// use todo_sync::UserId;
///
/// let store = InMemoryTodoStore::new();
/// assert_eq!(store.listener_count(&UserId::new("alice")), 0);
/// ```
pub struct InMemoryTodoStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryTodoStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTodoStore {
    /// Creates an empty store on the system clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store that reads decode times from `clock`
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes a raw document body, bypassing validation
    ///
    /// Lets tests seed documents with missing or unknown field values.
    pub fn insert_raw(&self, user_id: &UserId, id: &str, body: serde_json::Value) {
        let now = self.clock.now_millis();
        let mut inner = self.lock();
        let collection = inner
            .collections
            .entry(user_id.clone())
            .or_insert_with(Collection::new);
        collection.documents.insert(id.to_string(), body);
        collection.publish(now);
    }

    /// Current decoded contents of a collection, newest first
    #[must_use]
    pub fn snapshot(&self, user_id: &UserId) -> Vec<TodoItem> {
        let now = self.clock.now_millis();
        self.lock()
            .collections
            .get(user_id)
            .map(|collection| collection.snapshot(now))
            .unwrap_or_default()
    }

    /// Live queries currently attached to a collection
    #[must_use]
    pub fn listener_count(&self, user_id: &UserId) -> usize {
        self.lock()
            .collections
            .get(user_id)
            .map_or(0, |collection| collection.snapshots.receiver_count())
    }

    /// Ends every live query on a collection, as a server-side close would
    pub fn close_user(&self, user_id: &UserId) {
        let now = self.clock.now_millis();
        let mut inner = self.lock();
        if let Some(collection) = inner.collections.get_mut(user_id) {
            let (fresh, _) = watch::channel(collection.snapshot(now));
            collection.snapshots = fresh;
            tracing::debug!(user = %user_id, "Closed live queries");
        }
    }

    /// Rejects every later call for `user_id` with `PermissionDenied`
    pub fn revoke_access(&self, user_id: &UserId) {
        self.lock().revoked.insert(user_id.clone());
    }

    /// Makes the next insert, update or delete fail with `error`
    pub fn fail_next_mutation(&self, error: StoreError) {
        self.lock().fail_next_mutation = Some(error);
    }

    /// Makes the next `subscribe` fail with `error`
    pub fn fail_next_subscribe(&self, error: StoreError) {
        self.lock().fail_next_subscribe = Some(error);
    }

    fn open_listener(&self, user_id: &UserId) -> Result<SnapshotStream, StoreError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_subscribe.take() {
            return Err(error);
        }
        inner.check_user(user_id)?;

        let mut rx = inner
            .collections
            .entry(user_id.clone())
            .or_insert_with(Collection::new)
            .snapshots
            .subscribe();
        tracing::debug!(user = %user_id, "Attached live query");

        Ok(Box::pin(async_stream::stream! {
            let current = rx.borrow_and_update().clone();
            yield current;
            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().clone();
                yield next;
            }
        }))
    }

    fn insert_now(&self, user_id: &UserId, item: TodoItem) -> Result<TodoId, StoreError> {
        let now = self.clock.now_millis();
        let mut inner = self.lock();
        let collection = inner.begin_mutation(user_id)?;

        let id = uuid::Uuid::new_v4().simple().to_string();
        let body = serde_json::to_value(TodoDocument::from(item)).map_err(|e| {
            StoreError::Decode {
                id: id.clone(),
                reason: e.to_string(),
            }
        })?;
        collection.documents.insert(id.clone(), body);
        collection.publish(now);

        Ok(TodoId::new(id))
    }

    fn update_now(&self, user_id: &UserId, id: &TodoId, patch: &TodoPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Err(StoreError::EmptyUpdate);
        }
        let now = self.clock.now_millis();
        let mut inner = self.lock();
        let collection = inner.begin_mutation(user_id)?;

        let Some(serde_json::Value::Object(body)) = collection.documents.get_mut(id.as_str())
        else {
            return Err(StoreError::NotFound(id.clone()));
        };
        body.extend(patch.to_fields());
        collection.publish(now);
        Ok(())
    }

    fn delete_now(&self, user_id: &UserId, id: &TodoId) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut inner = self.lock();
        let collection = inner.begin_mutation(user_id)?;

        if collection.documents.remove(id.as_str()).is_none() {
            return Err(StoreError::NotFound(id.clone()));
        }
        collection.publish(now);
        Ok(())
    }
}

impl TodoRemote for InMemoryTodoStore {
    fn subscribe<'a>(&'a self, user_id: &'a UserId) -> RemoteFuture<'a, SnapshotStream> {
        let result = self.open_listener(user_id);
        Box::pin(async move { result })
    }

    fn insert<'a>(&'a self, user_id: &'a UserId, item: TodoItem) -> RemoteFuture<'a, TodoId> {
        let result = self.insert_now(user_id, item);
        Box::pin(async move { result })
    }

    fn update_fields<'a>(
        &'a self,
        user_id: &'a UserId,
        id: &'a TodoId,
        patch: TodoPatch,
    ) -> RemoteFuture<'a, ()> {
        let result = self.update_now(user_id, id, &patch);
        Box::pin(async move { result })
    }

    fn delete<'a>(&'a self, user_id: &'a UserId, id: &'a TodoId) -> RemoteFuture<'a, ()> {
        let result = self.delete_now(user_id, id);
        Box::pin(async move { result })
    }
}
