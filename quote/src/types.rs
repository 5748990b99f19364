//! Quote data and view state

use serde::{Deserialize, Serialize};

/// Message shown when a failure carries no text
pub const FALLBACK_ERROR: &str = "Gagal Memuat Data";

/// A quote as returned by `GET quotes/random`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Quote id, absent from some responses
    #[serde(default)]
    pub id: Option<u64>,
    /// Quote text
    pub quote: String,
    /// Author
    pub author: String,
}

/// What the quote screen shows
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum QuoteState {
    /// A fetch is in flight (also the initial state)
    #[default]
    Loading,
    /// Last fetch succeeded
    Success(Quote),
    /// Last fetch failed
    Error(String),
}

impl QuoteState {
    /// `true` while loading
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// The displayed quote, if any
    #[must_use]
    pub const fn quote(&self) -> Option<&Quote> {
        match self {
            Self::Success(quote) => Some(quote),
            _ => None,
        }
    }
}

/// Quote feature state: the view plus the fetch bookkeeping
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuoteFeature {
    /// What to render
    pub view: QuoteState,
    /// Incremented on every fetch; results of older fetches are dropped
    pub request: u64,
}

/// Actions of the quote reducer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuoteAction {
    /// Fetch a new random quote (also the retry action)
    Fetch,
    /// A fetch completed
    Loaded {
        /// Fetch the result belongs to
        request: u64,
        /// The quote
        quote: Quote,
    },
    /// A fetch failed
    Failed {
        /// Fetch the result belongs to
        request: u64,
        /// Error message, may be empty
        message: String,
    },
}
