//! External web search: the provider seam, the screening adapter that
//! retries and classifies provider answers, and the DuckDuckGo provider.

pub mod adapter;
pub mod duckduckgo;
pub mod pause;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub use adapter::{is_blocked_message, MatchedField, SearchAdapter, SearchOutcome, SearchPolicy};
pub use duckduckgo::DuckDuckGoProvider;
pub use pause::{NoPause, Pause, ThreadSleep};

/// A single web search hit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    pub title: String,
    pub body: String,
    pub url: String,
}

impl ResultItem {
    pub fn new(title: impl Into<String>, body: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            url: url.into(),
        }
    }
}

/// The external search capability.
///
/// Implementations block the calling worker thread for the duration of the
/// request. Any error is handed to the adapter, which decides between
/// "blocked" and "no hit"; implementations never retry on their own.
pub trait SearchProvider: Send + Sync {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<ResultItem>, ProviderError>;

    fn name(&self) -> &str {
        "search"
    }
}
