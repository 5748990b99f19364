//! Integration tests for long-lived stream effects registered by id.
//!
//! A reducer listens to a `watch` channel owned by its environment; the
//! channel's receiver count shows whether the listening task is still alive.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;
use todo_sync_core::effect::{Effect, EffectId};
use todo_sync_core::reducer::Reducer;
use todo_sync_core::{smallvec, SmallVec};
use todo_sync_runtime::Store;
use todo_sync_testing::init_test_tracing;
use tokio::sync::watch;

const TICKS: EffectId = EffectId::new("ticks");

#[derive(Clone, Debug, Default, PartialEq)]
struct TickState {
    seen: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq)]
enum TickAction {
    Listen,
    Replay(Vec<u32>),
    Stop,
    Tick(u32),
}

#[derive(Clone)]
struct TickEnv {
    ticker: Arc<watch::Sender<u32>>,
}

#[derive(Clone)]
struct TickReducer;

impl Reducer for TickReducer {
    type State = TickState;
    type Action = TickAction;
    type Environment = TickEnv;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            TickAction::Listen => {
                let rx = env.ticker.subscribe();
                let ticks = futures::stream::unfold(rx, |mut rx| async move {
                    rx.changed().await.ok()?;
                    let value = *rx.borrow_and_update();
                    Some((TickAction::Tick(value), rx))
                });
                smallvec![Effect::stream(ticks).cancellable(TICKS)]
            },
            TickAction::Replay(values) => {
                let ticks = futures::stream::iter(values.into_iter().map(TickAction::Tick));
                smallvec![Effect::stream(ticks).cancellable(TICKS)]
            },
            TickAction::Stop => {
                smallvec![Effect::Cancel(TICKS)]
            },
            TickAction::Tick(value) => {
                state.seen.push(value);
                SmallVec::new()
            },
        }
    }
}

fn setup() -> (Store<TickState, TickAction, TickEnv, TickReducer>, Arc<watch::Sender<u32>>) {
    init_test_tracing();
    let (ticker, _) = watch::channel(0);
    let ticker = Arc::new(ticker);
    let env = TickEnv {
        ticker: Arc::clone(&ticker),
    };
    (Store::new(TickState::default(), TickReducer, env), ticker)
}

async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_stream_items_are_fed_back_in_order() {
    let (store, ticker) = setup();
    let mut states = store.subscribe_state();

    store.send(TickAction::Listen).await.unwrap();
    eventually(|| ticker.receiver_count() == 1).await;

    for value in 1..=3 {
        ticker.send_replace(value);
        tokio::time::timeout(
            Duration::from_secs(2),
            states.wait_for(|s| s.seen.last() == Some(&value)),
        )
        .await
        .unwrap()
        .unwrap();
    }

    assert_eq!(store.state(|s| s.seen.clone()).await, vec![1, 2, 3]);
    assert!(store.is_active(TICKS));
}

#[tokio::test]
async fn test_replacing_registration_aborts_previous_task() {
    let (store, ticker) = setup();

    store.send(TickAction::Listen).await.unwrap();
    store.send(TickAction::Listen).await.unwrap();
    store.send(TickAction::Listen).await.unwrap();

    assert_eq!(store.active_cancellables(), 1);
    eventually(|| ticker.receiver_count() == 1).await;
}

#[tokio::test]
async fn test_cancel_detaches_listener() {
    let (store, ticker) = setup();

    store.send(TickAction::Listen).await.unwrap();
    eventually(|| ticker.receiver_count() == 1).await;

    store.send(TickAction::Stop).await.unwrap();
    assert!(!store.is_active(TICKS));
    eventually(|| ticker.receiver_count() == 0).await;

    ticker.send_replace(9);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(store.state(|s| s.seen.is_empty()).await);
}

#[tokio::test]
async fn test_direct_cancel_reports_registration() {
    let (store, _ticker) = setup();

    store.send(TickAction::Listen).await.unwrap();
    assert!(store.cancel(TICKS));
    assert!(!store.cancel(TICKS));
}

#[tokio::test]
async fn test_finished_stream_unregisters_itself() {
    let (store, _ticker) = setup();
    let mut states = store.subscribe_state();

    store.send(TickAction::Replay(vec![4, 5])).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), states.wait_for(|s| s.seen == [4, 5]))
        .await
        .unwrap()
        .unwrap();

    eventually(|| !store.is_active(TICKS)).await;
}

#[tokio::test]
async fn test_feedback_actions_are_broadcast() {
    let (store, ticker) = setup();
    let mut actions = store.subscribe_actions();

    store.send(TickAction::Listen).await.unwrap();
    eventually(|| ticker.receiver_count() == 1).await;
    ticker.send_replace(7);

    let action = tokio::time::timeout(Duration::from_secs(2), actions.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(action, TickAction::Tick(7));
}

#[tokio::test]
async fn test_shutdown_aborts_cancellables() {
    let (store, ticker) = setup();

    store.send(TickAction::Listen).await.unwrap();
    eventually(|| ticker.receiver_count() == 1).await;

    store.shutdown(Duration::from_secs(1)).await.unwrap();

    assert_eq!(store.active_cancellables(), 0);
    eventually(|| ticker.receiver_count() == 0).await;
    assert!(store.send(TickAction::Listen).await.is_err());
}
