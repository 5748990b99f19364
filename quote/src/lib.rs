//! Random quote client and quote screen state.
//!
//! [`QuoteClient`] calls `GET {base_url}quotes/random`; [`QuoteReducer`]
//! drives the three-state screen (loading, success, error) where a retry is
//! just another [`QuoteAction::Fetch`].
//!
//! # Example
//!
//! ```no_run
//! use todo_sync_quote::QuoteClient;
//!
//! # async fn example() -> Result<(), todo_sync_quote::QuoteError> {
//! let client = QuoteClient::new("https://dummyjson.com/");
//! let quote = client.random_quote().await?;
//! println!("\"{}\" - {}", quote.quote, quote.author);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod reducer;
pub mod types;

pub use client::{QuoteClient, QuoteConfig, QuoteSource, DEFAULT_BASE_URL};
pub use error::QuoteError;
pub use reducer::{QuoteEnvironment, QuoteReducer};
pub use types::{Quote, QuoteAction, QuoteFeature, QuoteState, FALLBACK_ERROR};
