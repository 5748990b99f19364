//! Domain types for the synchronized todo list.
//!
//! Items live in a remote document store; this crate only ever holds the last
//! snapshot it was sent. Mutations are requests to the store, never local
//! patches.

use crate::ordering;
use crate::view::{self, ViewSummary};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the signed-in user owning a todo collection
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a `UserId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when the id is empty or only whitespace
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Server-assigned document id of a todo
///
/// Empty until the store has persisted the item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    /// Creates a `TodoId` from a store-assigned id
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id of an item the store has not persisted yet
    #[must_use]
    pub const fn unassigned() -> Self {
        Self(String::new())
    }

    /// `false` until the store assigns an id
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        !self.0.is_empty()
    }

    /// Returns the id as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TodoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Priority of a todo, stored as `HIGH`, `MEDIUM` or `LOW`
///
/// Values the store holds that are none of those are kept verbatim in
/// [`Priority::Other`] and sort after `LOW`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    /// `HIGH`
    High,
    /// `MEDIUM`
    #[default]
    Medium,
    /// `LOW`
    Low,
    /// Unrecognized stored value
    Other(String),
}

impl Priority {
    /// Wire representation
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Other(raw) => raw,
        }
    }

    /// Sort rank: HIGH=0, MEDIUM=1, LOW=2, anything else 3
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
            Self::Other(_) => 3,
        }
    }

    /// Display label used by the app
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::High => "Tinggi",
            Self::Medium => "Sedang",
            Self::Low => "Rendah",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for Priority {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "HIGH" => Self::High,
            "MEDIUM" => Self::Medium,
            "LOW" => Self::Low,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for Priority {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a todo, stored as `Kerja`, `Kuliah` or `Hobby`
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Work
    #[default]
    Kerja,
    /// College
    Kuliah,
    /// Hobby
    Hobby,
    /// Unrecognized stored value
    Other(String),
}

impl Category {
    /// Wire representation (also the display label)
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Kerja => "Kerja",
            Self::Kuliah => "Kuliah",
            Self::Hobby => "Hobby",
            Self::Other(raw) => raw,
        }
    }

    /// Icon shown next to the category
    #[must_use]
    pub const fn emoji(&self) -> Option<&'static str> {
        match self {
            Self::Kerja => Some("💼"),
            Self::Kuliah => Some("📚"),
            Self::Hobby => Some("🎮"),
            Self::Other(_) => None,
        }
    }

    /// The three categories offered when creating a todo
    #[must_use]
    pub fn known() -> [Self; 3] {
        [Self::Kerja, Self::Kuliah, Self::Hobby]
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "Kerja" => Self::Kerja,
            "Kuliah" => Self::Kuliah,
            "Hobby" => Self::Hobby,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for Category {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        match category {
            Category::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single todo item as last observed from the store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    /// Store-assigned id (empty until persisted)
    pub id: TodoId,
    /// Title of the todo
    pub title: String,
    /// Completion flag, `isCompleted` on the wire
    pub is_completed: bool,
    /// Creation time in milliseconds since the Unix epoch
    pub created_at: i64,
    /// Priority
    pub priority: Priority,
    /// Category
    pub category: Category,
}

impl TodoItem {
    /// Creates a not-yet-persisted, incomplete todo
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        priority: Priority,
        category: Category,
        created_at: i64,
    ) -> Self {
        Self {
            id: TodoId::unassigned(),
            title: title.into(),
            is_completed: false,
            created_at,
            priority,
            category,
        }
    }

    /// Returns the item with the given id
    #[must_use]
    pub fn with_id(mut self, id: TodoId) -> Self {
        self.id = id;
        self
    }

    /// Returns the item with the given completion flag
    #[must_use]
    pub const fn completed(mut self, is_completed: bool) -> Self {
        self.is_completed = is_completed;
        self
    }
}

/// Which items the list shows
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TodoFilter {
    /// Every item
    #[default]
    All,
    /// Items not yet completed
    Incomplete,
    /// Items of one category
    ByCategory(Category),
}

impl TodoFilter {
    /// Whether `item` passes the filter
    #[must_use]
    pub fn matches(&self, item: &TodoItem) -> bool {
        match self {
            Self::All => true,
            Self::Incomplete => !item.is_completed,
            Self::ByCategory(category) => item.category == *category,
        }
    }
}

/// Fields of a targeted update
///
/// Only the fields that are `Some` are written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodoPatch {
    /// New title
    pub title: Option<String>,
    /// New completion flag
    pub is_completed: Option<bool>,
    /// New priority
    pub priority: Option<Priority>,
    /// New category
    pub category: Option<Category>,
}

impl TodoPatch {
    /// Patch that only sets the completion flag
    #[must_use]
    pub fn completion(is_completed: bool) -> Self {
        Self {
            is_completed: Some(is_completed),
            ..Self::default()
        }
    }

    /// Patch written by the edit screen
    #[must_use]
    pub fn edit(title: impl Into<String>, priority: Priority, category: Option<Category>) -> Self {
        Self {
            title: Some(title.into()),
            priority: Some(priority),
            category,
            ..Self::default()
        }
    }

    /// `true` if the patch writes nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.is_completed.is_none()
            && self.priority.is_none()
            && self.category.is_none()
    }

    /// Applies the patch to an item
    pub fn apply(&self, item: &mut TodoItem) {
        if let Some(title) = &self.title {
            item.title.clone_from(title);
        }
        if let Some(is_completed) = self.is_completed {
            item.is_completed = is_completed;
        }
        if let Some(priority) = &self.priority {
            item.priority = priority.clone();
        }
        if let Some(category) = &self.category {
            item.category = category.clone();
        }
    }

    /// The patch as a map of wire field names to values
    #[must_use]
    pub fn to_fields(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut fields = serde_json::Map::new();
        if let Some(title) = &self.title {
            fields.insert("title".into(), title.clone().into());
        }
        if let Some(is_completed) = self.is_completed {
            fields.insert("isCompleted".into(), is_completed.into());
        }
        if let Some(priority) = &self.priority {
            fields.insert("priority".into(), priority.as_str().into());
        }
        if let Some(category) = &self.category {
            fields.insert("category".into(), category.as_str().into());
        }
        fields
    }
}

/// Lifecycle of the live query
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// No live query
    #[default]
    Idle,
    /// Live query requested, no snapshot yet
    Subscribing,
    /// Receiving snapshots
    Live {
        /// Snapshots received since subscribing
        deliveries: u64,
    },
    /// The live query could not be established or was closed by the store
    Failed {
        /// Reason reported by the store
        reason: String,
    },
}

impl SubscriptionStatus {
    /// `true` while waiting for the first snapshot
    #[must_use]
    pub const fn is_subscribing(&self) -> bool {
        matches!(self, Self::Subscribing)
    }

    /// `true` once a snapshot has arrived
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live { .. })
    }

    /// Snapshots received in the current subscription
    #[must_use]
    pub const fn deliveries(&self) -> u64 {
        match self {
            Self::Live { deliveries } => *deliveries,
            _ => 0,
        }
    }
}

/// Store mutation forwarded by the reducer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Insert a new item
    Add,
    /// Flip the completion flag
    Toggle,
    /// Update title, priority and category
    Edit,
    /// Remove an item
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Toggle => "toggle",
            Self::Edit => "edit",
            Self::Delete => "delete",
        })
    }
}

/// View state for one user's todo list
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TodoState {
    /// User whose collection is observed
    pub user_id: Option<UserId>,
    /// Live query lifecycle
    pub subscription: SubscriptionStatus,
    /// Last observed snapshot, sorted
    pub items: Vec<TodoItem>,
    /// Active filter
    pub filter: TodoFilter,
    /// Free-text title search
    pub search: String,
    /// Last rejected command or store failure
    pub last_error: Option<String>,
    /// Mutations forwarded to the store and not yet acknowledged
    pub pending_mutations: usize,
}

impl TodoState {
    /// Creates an idle state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The items to render: filter, then search, over the last snapshot
    #[must_use]
    pub fn derived_view(&self) -> Vec<TodoItem> {
        view::derive_view(&self.items, &self.filter, &self.search)
    }

    /// Counters over the whole snapshot
    #[must_use]
    pub fn summary(&self) -> ViewSummary {
        ViewSummary::of(&self.items)
    }

    /// Returns a todo by id
    #[must_use]
    pub fn get(&self, id: &TodoId) -> Option<&TodoItem> {
        self.items.iter().find(|item| item.id == *id)
    }

    /// `true` when the stored snapshot respects the list order
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        ordering::is_sorted(&self.items)
    }
}

/// Actions of the todo reducer: commands from the UI, then feedback events
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TodoAction {
    // ========== Commands ==========
    /// Start (or restart) the live query for a user
    Subscribe {
        /// Owner of the collection
        user_id: UserId,
    },

    /// Stop the live query
    Unsubscribe,

    /// Create a todo
    AddTodo {
        /// Title, must not be blank
        title: String,
        /// Priority
        priority: Priority,
        /// Category
        category: Category,
    },

    /// Flip the completion flag of an item
    ToggleTodo {
        /// The item as currently displayed
        item: TodoItem,
    },

    /// Update title, priority and optionally category
    EditTodo {
        /// Item to update
        id: TodoId,
        /// New title, must not be blank
        title: String,
        /// New priority
        priority: Priority,
        /// New category, left untouched when `None`
        category: Option<Category>,
    },

    /// Delete an item
    DeleteTodo {
        /// Item to delete
        id: TodoId,
    },

    /// Replace the filter
    SetFilter {
        /// New filter
        filter: TodoFilter,
    },

    /// Replace the search text
    SetSearch {
        /// New search text
        text: String,
    },

    // ========== Events ==========
    /// The store delivered a full snapshot
    SnapshotReceived {
        /// Collection the snapshot belongs to
        user_id: UserId,
        /// Every item, in store order
        items: Vec<TodoItem>,
    },

    /// The live query failed or was closed
    SubscriptionFailed {
        /// Collection the query was for
        user_id: UserId,
        /// Reason reported by the store
        reason: String,
    },

    /// The store acknowledged a mutation
    MutationSucceeded {
        /// Which mutation
        kind: MutationKind,
    },

    /// The store rejected a mutation
    MutationFailed {
        /// Which mutation
        kind: MutationKind,
        /// Error reported by the store
        error: String,
    },

    /// A command was rejected before reaching the store
    ValidationFailed {
        /// Error message
        error: String,
    },
}

impl TodoAction {
    /// `AddTodo` with the default priority and category
    #[must_use]
    pub fn add(title: impl Into<String>) -> Self {
        Self::AddTodo {
            title: title.into(),
            priority: Priority::default(),
            category: Category::default(),
        }
    }

    /// `true` for actions that come from the UI
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(
            self,
            Self::Subscribe { .. }
                | Self::Unsubscribe
                | Self::AddTodo { .. }
                | Self::ToggleTodo { .. }
                | Self::EditTodo { .. }
                | Self::DeleteTodo { .. }
                | Self::SetFilter { .. }
                | Self::SetSearch { .. }
        )
    }

    /// `true` for feedback events
    #[must_use]
    pub const fn is_event(&self) -> bool {
        !self.is_command()
    }
}
