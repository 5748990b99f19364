//! Command-line walkthrough of the synchronized todo list.
//!
//! Runs against the in-memory store: subscribes, adds a few todos, toggles and
//! edits one, shows a filtered view, then fetches a quote from the configured
//! quote API.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use todo_sync::memory::InMemoryTodoStore;
use todo_sync::{
    AppConfig, Category, Priority, TodoAction, TodoEnvironment, TodoFilter, TodoReducer,
    TodoState, UserId,
};
use todo_sync_core::environment::SystemClock;
use todo_sync_quote::{QuoteAction, QuoteClient, QuoteEnvironment, QuoteFeature, QuoteReducer, QuoteState};
use todo_sync_runtime::{Store, StoreConfig};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type TodoStore = Store<TodoState, TodoAction, TodoEnvironment, TodoReducer>;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(user = %config.user_id, quote_api = %config.quote.api_url, "Starting demo");

    let remote = Arc::new(InMemoryTodoStore::new());
    let env = TodoEnvironment::new(Arc::new(SystemClock), remote);
    let store_config = StoreConfig::default().with_shutdown_timeout(config.shutdown_timeout());
    let store: TodoStore =
        Store::with_config(TodoState::new(), TodoReducer::new(), env, store_config.clone());
    let mut states = store.subscribe_state();

    let user_id = UserId::new(config.user_id.clone());
    store.send(TodoAction::Subscribe { user_id }).await?;
    settle(&mut states, |s| s.subscription.is_live()).await?;

    println!("=== Todo Sync Demo ===\n");

    for (title, priority, category) in [
        ("Kumpulkan laporan", Priority::High, Category::Kuliah),
        ("Beli kopi", Priority::Low, Category::Kerja),
        ("Main gitar", Priority::Medium, Category::Hobby),
        ("Belajar ujian", Priority::High, Category::Kuliah),
    ] {
        let expected = states.borrow().items.len() + 1;
        store
            .send(TodoAction::AddTodo {
                title: title.to_string(),
                priority,
                category,
            })
            .await?;
        settle(&mut states, |s| s.items.len() == expected).await?;
    }
    render("All todos", &states.borrow());

    let first = states
        .borrow()
        .items
        .first()
        .cloned()
        .context("Store returned an empty list")?;
    println!("\nCompleting '{}'...", first.title);
    let id = first.id.clone();
    store.send(TodoAction::ToggleTodo { item: first }).await?;
    settle(&mut states, |s| s.get(&id).is_some_and(|item| item.is_completed)).await?;

    store
        .send(TodoAction::SetFilter {
            filter: TodoFilter::Incomplete,
        })
        .await?;
    render("Incomplete", &states.borrow());

    store
        .send(TodoAction::SetSearch {
            text: "ujian".to_string(),
        })
        .await?;
    store
        .send(TodoAction::SetFilter {
            filter: TodoFilter::All,
        })
        .await?;
    render("Search 'ujian'", &states.borrow());

    store.send(TodoAction::add("   ")).await?;
    if let Some(error) = &states.borrow().last_error {
        println!("\nRejected blank title: {error}");
    }

    store.shutdown_default().await?;

    println!("\n=== Quote ===");
    let client = QuoteClient::from_config(&config.quote_config())?;
    let quotes = Store::with_config(
        QuoteFeature::default(),
        QuoteReducer::new(),
        QuoteEnvironment::new(Arc::new(client)),
        store_config,
    );
    let mut handle = quotes.send(QuoteAction::Fetch).await?;
    handle.wait_with_timeout(config.quote_config().timeout + SETTLE_TIMEOUT).await?;
    match quotes.state(|s| s.view.clone()).await {
        QuoteState::Success(quote) => println!("\"{}\"\n  - {}", quote.quote, quote.author),
        QuoteState::Error(message) => println!("Error: {message}"),
        QuoteState::Loading => println!("Still loading..."),
    }
    quotes.shutdown_default().await?;

    println!("\n=== Demo Complete ===");
    Ok(())
}

/// Waits until the published state satisfies `done`
async fn settle<F>(states: &mut watch::Receiver<TodoState>, done: F) -> anyhow::Result<()>
where
    F: FnMut(&TodoState) -> bool,
{
    tokio::time::timeout(SETTLE_TIMEOUT, states.wait_for(done))
        .await
        .context("Timed out waiting for the store")?
        .context("Store closed")?;
    Ok(())
}

fn render(heading: &str, state: &TodoState) {
    let summary = state.summary();
    println!(
        "\n{heading} ({} done / {} total)",
        summary.completed, summary.total
    );
    for item in state.derived_view() {
        let status = if item.is_completed { "✓" } else { " " };
        println!(
            "  [{status}] {} {:<24} {:<7} {}",
            item.category.emoji().unwrap_or("•"),
            item.title,
            item.priority.label(),
            item.category,
        );
    }
}
