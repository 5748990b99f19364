//! End-to-end behaviour of the todo store: live query, mutations, detaching.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use todo_sync::memory::InMemoryTodoStore;
use todo_sync::{
    Category, Priority, StoreError, SubscriptionStatus, TodoAction, TodoEnvironment, TodoFilter,
    TodoId, TodoReducer, TodoState, UserId, TODOS_LIVE,
};
use todo_sync_runtime::Store;
use todo_sync_testing::{init_test_tracing, test_clock};

type TodoStore = Store<TodoState, TodoAction, TodoEnvironment, TodoReducer>;

const WAIT: Duration = Duration::from_secs(2);

fn setup() -> (TodoStore, Arc<InMemoryTodoStore>) {
    init_test_tracing();
    let remote = Arc::new(InMemoryTodoStore::new());
    let env = TodoEnvironment::new(Arc::new(test_clock()), remote.clone());
    (Store::new(TodoState::new(), TodoReducer::new(), env), remote)
}

fn alice() -> UserId {
    UserId::new("alice")
}

async fn wait_for_state<F>(store: &TodoStore, done: F) -> TodoState
where
    F: FnMut(&TodoState) -> bool,
{
    let mut states = store.subscribe_state();
    let state = tokio::time::timeout(WAIT, states.wait_for(done))
        .await
        .expect("state condition not reached in time")
        .unwrap()
        .clone();
    state
}

async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn subscribe(store: &TodoStore, user_id: UserId) -> TodoState {
    let expected = user_id.clone();
    store.send(TodoAction::Subscribe { user_id }).await.unwrap();
    wait_for_state(store, |s| {
        s.user_id.as_ref() == Some(&expected) && s.subscription.is_live()
    })
    .await
}

#[tokio::test]
async fn first_snapshot_is_sorted_for_display() {
    let (store, remote) = setup();
    remote.insert_raw(
        &alice(),
        "a",
        json!({ "title": "A", "isCompleted": false, "createdAt": 100, "priority": "HIGH" }),
    );
    remote.insert_raw(
        &alice(),
        "b",
        json!({ "title": "B", "isCompleted": false, "createdAt": 200, "priority": "LOW" }),
    );
    remote.insert_raw(
        &alice(),
        "c",
        json!({ "title": "C", "isCompleted": true, "createdAt": 300, "priority": "HIGH" }),
    );

    let state = subscribe(&store, alice()).await;

    let ids: Vec<_> = state.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    assert_eq!(state.subscription, SubscriptionStatus::Live { deliveries: 1 });
    assert!(store.is_active(TODOS_LIVE));
}

#[tokio::test]
async fn added_todo_arrives_through_the_live_query() {
    let (store, remote) = setup();
    subscribe(&store, alice()).await;

    store.send(TodoAction::add("Write report")).await.unwrap();
    let state = wait_for_state(&store, |s| s.items.len() == 1 && s.pending_mutations == 0).await;

    let item = &state.items[0];
    assert!(item.id.is_assigned());
    assert_eq!(item.title, "Write report");
    assert_eq!(item.priority, Priority::Medium);
    assert_eq!(item.category, Category::Kerja);
    assert_eq!(item.created_at, 1_735_689_600_000);
    assert_eq!(remote.snapshot(&alice()), state.items);
}

#[tokio::test]
async fn failed_add_leaves_items_and_reports_error() {
    let (store, remote) = setup();
    remote.insert_raw(&alice(), "keep", json!({ "title": "Existing", "createdAt": 1 }));
    let before = subscribe(&store, alice()).await.items;

    remote.fail_next_mutation(StoreError::Network("offline".to_string()));
    store.send(TodoAction::add("Lost")).await.unwrap();
    let state = wait_for_state(&store, |s| s.last_error.is_some()).await;

    assert_eq!(state.items, before);
    assert_eq!(state.pending_mutations, 0);
    assert_eq!(
        state.last_error.as_deref(),
        Some("Failed to add todo: Network error: offline")
    );
}

#[tokio::test]
async fn toggle_edit_and_delete_round_trip() {
    let (store, remote) = setup();
    remote.insert_raw(
        &alice(),
        "t1",
        json!({ "title": "Draft", "createdAt": 5, "priority": "LOW", "category": "Hobby" }),
    );
    let item = subscribe(&store, alice()).await.items[0].clone();

    store.send(TodoAction::ToggleTodo { item }).await.unwrap();
    wait_for_state(&store, |s| s.items.first().is_some_and(|i| i.is_completed)).await;

    store
        .send(TodoAction::EditTodo {
            id: TodoId::new("t1"),
            title: "Final".to_string(),
            priority: Priority::High,
            category: None,
        })
        .await
        .unwrap();
    let state = wait_for_state(&store, |s| s.items.first().is_some_and(|i| i.title == "Final")).await;
    assert_eq!(state.items[0].priority, Priority::High);
    assert_eq!(state.items[0].category, Category::Hobby);
    assert!(state.items[0].is_completed);

    store
        .send(TodoAction::DeleteTodo {
            id: TodoId::new("t1"),
        })
        .await
        .unwrap();
    wait_for_state(&store, |s| s.items.is_empty()).await;
}

#[tokio::test]
async fn deleting_unknown_id_is_surfaced() {
    let (store, _remote) = setup();
    subscribe(&store, alice()).await;

    store
        .send(TodoAction::DeleteTodo {
            id: TodoId::new("ghost"),
        })
        .await
        .unwrap();
    let state = wait_for_state(&store, |s| s.last_error.is_some()).await;

    assert_eq!(
        state.last_error.as_deref(),
        Some("Failed to delete todo: Todo not found: ghost")
    );
}

#[tokio::test]
async fn resubscribing_detaches_previous_listener() {
    let (store, remote) = setup();
    subscribe(&store, alice()).await;
    subscribe(&store, alice()).await;

    eventually(|| remote.listener_count(&alice()) == 1).await;

    subscribe(&store, UserId::new("bob")).await;
    eventually(|| remote.listener_count(&alice()) == 0).await;
    assert_eq!(remote.listener_count(&UserId::new("bob")), 1);
}

#[tokio::test]
async fn previous_user_changes_do_not_leak_into_new_view() {
    let (store, remote) = setup();
    subscribe(&store, alice()).await;
    subscribe(&store, UserId::new("bob")).await;
    eventually(|| remote.listener_count(&alice()) == 0).await;

    remote.insert_raw(&alice(), "x", json!({ "title": "alice only", "createdAt": 1 }));
    remote.insert_raw(&UserId::new("bob"), "y", json!({ "title": "bob's", "createdAt": 2 }));

    let state = wait_for_state(&store, |s| !s.items.is_empty()).await;
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].title, "bob's");
}

#[tokio::test]
async fn unsubscribe_and_shutdown_release_listeners() {
    let (store, remote) = setup();
    subscribe(&store, alice()).await;

    store.send(TodoAction::Unsubscribe).await.unwrap();
    assert!(!store.is_active(TODOS_LIVE));
    eventually(|| remote.listener_count(&alice()) == 0).await;

    subscribe(&store, alice()).await;
    store.shutdown(WAIT).await.unwrap();
    eventually(|| remote.listener_count(&alice()) == 0).await;
}

#[tokio::test]
async fn closed_live_query_is_reported() {
    let (store, remote) = setup();
    subscribe(&store, alice()).await;

    remote.close_user(&alice());
    let state = wait_for_state(&store, |s| {
        matches!(s.subscription, SubscriptionStatus::Failed { .. })
    })
    .await;

    assert_eq!(state.last_error.as_deref(), Some("Live query closed"));
}

#[tokio::test]
async fn subscribe_failure_is_reported() {
    let (store, remote) = setup();
    remote.revoke_access(&alice());

    store
        .send(TodoAction::Subscribe { user_id: alice() })
        .await
        .unwrap();
    let state = wait_for_state(&store, |s| {
        matches!(s.subscription, SubscriptionStatus::Failed { .. })
    })
    .await;

    assert_eq!(
        state.last_error.as_deref(),
        Some("Permission denied for user alice")
    );
}

#[tokio::test]
async fn view_filters_and_searches_live_items() {
    let (store, remote) = setup();
    remote.insert_raw(
        &alice(),
        "1",
        json!({ "title": "Final EXAM prep", "createdAt": 3, "category": "Kuliah" }),
    );
    remote.insert_raw(
        &alice(),
        "2",
        json!({ "title": "Exam budget", "createdAt": 2, "category": "Kerja" }),
    );
    remote.insert_raw(
        &alice(),
        "3",
        json!({ "title": "Lecture notes", "createdAt": 1, "category": "Kuliah" }),
    );
    subscribe(&store, alice()).await;

    store
        .send(TodoAction::SetFilter {
            filter: TodoFilter::ByCategory(Category::Kuliah),
        })
        .await
        .unwrap();
    store
        .send(TodoAction::SetSearch {
            text: "exam".to_string(),
        })
        .await
        .unwrap();

    let view = store.state(TodoState::derived_view).await;
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].id.as_str(), "1");
    assert_eq!(view, store.state(TodoState::derived_view).await);
}
