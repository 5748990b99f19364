//! Reducer for the quote screen.

use crate::client::QuoteSource;
use crate::types::{QuoteAction, QuoteFeature, QuoteState, FALLBACK_ERROR};
use std::sync::Arc;
use todo_sync_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};

/// Environment dependencies for the quote reducer
#[derive(Clone)]
pub struct QuoteEnvironment {
    /// Where quotes come from
    pub source: Arc<dyn QuoteSource>,
}

impl QuoteEnvironment {
    /// Creates a new `QuoteEnvironment`
    #[must_use]
    pub fn new(source: Arc<dyn QuoteSource>) -> Self {
        Self { source }
    }
}

/// Reducer for the quote screen
#[derive(Clone, Debug, Default)]
pub struct QuoteReducer;

impl QuoteReducer {
    /// Creates a new `QuoteReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reducer for QuoteReducer {
    type State = QuoteFeature;
    type Action = QuoteAction;
    type Environment = QuoteEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            QuoteAction::Fetch => {
                state.request += 1;
                state.view = QuoteState::Loading;

                let request = state.request;
                let source = Arc::clone(&env.source);
                smallvec![Effect::future(async move {
                    Some(match source.random_quote().await {
                        Ok(quote) => QuoteAction::Loaded { request, quote },
                        Err(error) => QuoteAction::Failed {
                            request,
                            message: error.to_string(),
                        },
                    })
                })]
            },

            QuoteAction::Loaded { request, quote } => {
                if request == state.request {
                    state.view = QuoteState::Success(quote);
                } else {
                    tracing::debug!(request, current = state.request, "Dropping stale quote");
                }
                SmallVec::new()
            },

            QuoteAction::Failed { request, message } => {
                if request == state.request {
                    tracing::warn!(%message, "Quote fetch failed");
                    let message = if message.trim().is_empty() {
                        FALLBACK_ERROR.to_string()
                    } else {
                        message
                    };
                    state.view = QuoteState::Error(message);
                } else {
                    tracing::debug!(request, current = state.request, "Dropping stale failure");
                }
                SmallVec::new()
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::QuoteError;
    use crate::types::Quote;
    use std::future::Future;
    use std::pin::Pin;
    use todo_sync_testing::{assertions, ReducerTest};

    struct Fixed(Result<Quote, QuoteError>);

    impl QuoteSource for Fixed {
        fn random_quote(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<Quote, QuoteError>> + Send + '_>> {
            let result = self.0.clone();
            Box::pin(async move { result })
        }
    }

    fn quote() -> Quote {
        Quote {
            id: Some(1),
            quote: "Simplicity is prerequisite for reliability.".to_string(),
            author: "Edsger W. Dijkstra".to_string(),
        }
    }

    fn env(result: Result<Quote, QuoteError>) -> QuoteEnvironment {
        QuoteEnvironment::new(Arc::new(Fixed(result)))
    }

    #[test]
    fn fetch_enters_loading() {
        let state = QuoteFeature {
            view: QuoteState::Error("old".to_string()),
            request: 3,
        };

        ReducerTest::new(QuoteReducer::new())
            .with_env(env(Ok(quote())))
            .given_state(state)
            .when_action(QuoteAction::Fetch)
            .then_state(|state| {
                assert!(state.view.is_loading());
                assert_eq!(state.request, 4);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn loaded_shows_quote() {
        let state = QuoteFeature {
            view: QuoteState::Loading,
            request: 1,
        };

        ReducerTest::new(QuoteReducer::new())
            .with_env(env(Ok(quote())))
            .given_state(state)
            .when_action(QuoteAction::Loaded {
                request: 1,
                quote: quote(),
            })
            .then_state(|state| assert_eq!(state.view, QuoteState::Success(quote())))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn stale_result_is_ignored() {
        let state = QuoteFeature {
            view: QuoteState::Loading,
            request: 2,
        };

        ReducerTest::new(QuoteReducer::new())
            .with_env(env(Ok(quote())))
            .given_state(state)
            .when_action(QuoteAction::Loaded {
                request: 1,
                quote: quote(),
            })
            .then_state(|state| assert!(state.view.is_loading()))
            .run();
    }

    #[test]
    fn empty_error_falls_back() {
        let state = QuoteFeature {
            view: QuoteState::Loading,
            request: 1,
        };

        ReducerTest::new(QuoteReducer::new())
            .with_env(env(Ok(quote())))
            .given_state(state)
            .when_action(QuoteAction::Failed {
                request: 1,
                message: String::new(),
            })
            .then_state(|state| {
                assert_eq!(state.view, QuoteState::Error("Gagal Memuat Data".to_string()));
            })
            .run();
    }

    #[tokio::test]
    async fn fetch_effect_reports_failure() {
        let env = env(Err(QuoteError::RequestFailed("offline".to_string())));
        let mut state = QuoteFeature::default();

        let mut effects = QuoteReducer::new().reduce(&mut state, QuoteAction::Fetch, &env);
        let Some(Effect::Future(fut)) = effects.pop() else {
            unreachable!("expected a future effect");
        };

        assert_eq!(
            fut.await,
            Some(QuoteAction::Failed {
                request: 1,
                message: "Request failed: offline".to_string(),
            })
        );
    }
}
