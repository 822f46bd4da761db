use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;
use serde::Serialize;

use crate::config::SearchConfig;
use crate::error::ProviderError;
use crate::matcher::KeywordMatcher;
use crate::search::pause::Pause;
use crate::search::{ResultItem, SearchProvider};

/// Error-text markers that mean the provider refused or rate-limited us.
const BLOCKED_MARKERS: &[&str] = &["blocked", "rate limit", "429", "too many requests"];

/// Returns true if a provider error message signals blocking.
pub fn is_blocked_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    BLOCKED_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Retry and throttling knobs for the adapter.
#[derive(Debug, Clone)]
pub struct SearchPolicy {
    /// Result count requested per query; fewer triggers a retry.
    pub target_results: usize,
    /// Retries after an under-counted answer (attempts = retries + 1).
    pub max_retries: u32,
    /// Backoff unit: attempt `n` waits `n * retry_backoff` before retrying.
    pub retry_backoff: Duration,
    pub throttle_min: Duration,
    pub throttle_max: Duration,
}

impl SearchPolicy {
    pub fn from_config(config: &SearchConfig) -> Self {
        let (throttle_min, throttle_max) = config.throttle_range();
        Self {
            target_results: config.target_results,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
            throttle_min,
            throttle_max,
        }
    }

    /// Random delay in `[throttle_min, throttle_max)`.
    pub fn jitter(&self) -> Duration {
        let min = self.throttle_min.as_millis() as u64;
        let max = self.throttle_max.as_millis() as u64;
        if min >= max {
            return self.throttle_min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..max))
    }
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

/// Which field of a result produced the keyword hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedField {
    Title,
    Body,
}

/// What one fresh lookup produced.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub results: Vec<ResultItem>,
    /// The provider refused or rate-limited the query. Never cached.
    pub blocked: bool,
    pub result_count: usize,
    /// Keywords of the first matching field, in filter order.
    pub matched_keywords: Vec<String>,
    pub matched_field: Option<MatchedField>,
    /// Provider calls made, retries included.
    pub attempts: u32,
    /// Provider error text, when the lookup ended in an error.
    pub error: Option<String>,
}

impl SearchOutcome {
    fn blocked(attempts: u32, error: String) -> Self {
        Self {
            blocked: true,
            attempts,
            error: Some(error),
            ..Default::default()
        }
    }

    fn failed(attempts: u32, error: String) -> Self {
        Self {
            attempts,
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn is_adverse(&self) -> bool {
        !self.blocked && !self.matched_keywords.is_empty()
    }
}

/// Wraps a [`SearchProvider`] with under-count retries, blocked/error
/// classification and post-query throttling.
pub struct SearchAdapter {
    provider: Arc<dyn SearchProvider>,
    matcher: Arc<KeywordMatcher>,
    policy: SearchPolicy,
    pause: Arc<dyn Pause>,
}

impl SearchAdapter {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        matcher: Arc<KeywordMatcher>,
        policy: SearchPolicy,
        pause: Arc<dyn Pause>,
    ) -> Self {
        Self {
            provider,
            matcher,
            policy,
            pause,
        }
    }

    pub fn matcher(&self) -> &KeywordMatcher {
        &self.matcher
    }

    pub fn policy(&self) -> &SearchPolicy {
        &self.policy
    }

    /// Runs one fresh lookup for `name` and throttles afterwards.
    ///
    /// Never fails: provider errors become either a blocked outcome or an
    /// empty, non-blocked one.
    pub fn query(&self, name: &str) -> SearchOutcome {
        let outcome = self.lookup(name);
        self.pause.pause(self.policy.jitter());
        outcome
    }

    fn lookup(&self, name: &str) -> SearchOutcome {
        let (results, attempts) = match self.fetch(name) {
            Ok(fetched) => fetched,
            Err((attempts, e)) => {
                let message = e.to_string();
                if is_blocked_message(&message) {
                    warn!(
                        "{} blocked the query after {} attempt(s): {}",
                        self.provider.name(),
                        attempts,
                        message
                    );
                    return SearchOutcome::blocked(attempts, message);
                }
                warn!(
                    "{} query failed after {} attempt(s), treating as no hit: {}",
                    self.provider.name(),
                    attempts,
                    message
                );
                return SearchOutcome::failed(attempts, message);
            }
        };

        debug!(
            "{} returned {} result(s) for '{}'",
            self.provider.name(),
            results.len(),
            name
        );

        let (matched_keywords, matched_field) = self.match_results(&results);
        match matched_field {
            Some(field) => debug!("Found {:?} match: {}", field, matched_keywords.join(", ")),
            None => debug!("No keyword found in search results for '{}'", name),
        }

        SearchOutcome {
            result_count: results.len(),
            results,
            blocked: false,
            matched_keywords,
            matched_field,
            attempts,
            error: None,
        }
    }

    /// Calls the provider, retrying while it under-returns. Errors are not
    /// retried.
    fn fetch(&self, name: &str) -> Result<(Vec<ResultItem>, u32), (u32, ProviderError)> {
        let target = self.policy.target_results;
        let mut attempt: u32 = 1;

        loop {
            let results = self
                .provider
                .search(name, target)
                .map_err(|e| (attempt, e))?;

            if results.len() >= target || attempt > self.policy.max_retries {
                return Ok((results, attempt));
            }

            debug!(
                "Attempt {} for '{}' returned {}/{} results, retrying",
                attempt,
                name,
                results.len(),
                target
            );
            self.pause.pause(self.policy.retry_backoff * attempt);
            attempt += 1;
        }
    }

    /// Scans results in order; the first item whose title (then body) hits
    /// any filter decides the match.
    fn match_results(&self, results: &[ResultItem]) -> (Vec<String>, Option<MatchedField>) {
        for item in results {
            let title_matches = self.matcher.find_matches(&item.title);
            if !title_matches.is_empty() {
                return (title_matches, Some(MatchedField::Title));
            }

            let body_matches = self.matcher.find_matches(&item.body);
            if !body_matches.is_empty() {
                return (body_matches, Some(MatchedField::Body));
            }
        }

        (Vec::new(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted answers, repeating the last one.
    struct ScriptedProvider {
        answers: Mutex<VecDeque<Result<Vec<ResultItem>, String>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn new(answers: Vec<Result<Vec<ResultItem>, String>>) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.into()),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    impl SearchProvider for ScriptedProvider {
        fn search(&self, _query: &str, _max: usize) -> Result<Vec<ResultItem>, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            let mut answers = self.answers.lock().unwrap();
            let answer = if answers.len() > 1 {
                answers.pop_front().unwrap()
            } else {
                answers.front().cloned().unwrap()
            };
            answer.map_err(ProviderError::Transport)
        }
    }

    #[derive(Default)]
    struct RecordingPause {
        pauses: Mutex<Vec<Duration>>,
    }

    impl Pause for RecordingPause {
        fn pause(&self, duration: Duration) {
            self.pauses.lock().unwrap().push(duration);
        }
    }

    fn items(n: usize, body: &str) -> Vec<ResultItem> {
        (0..n)
            .map(|i| ResultItem::new(format!("Result {}", i), body, format!("https://e.com/{}", i)))
            .collect()
    }

    fn policy() -> SearchPolicy {
        SearchPolicy {
            target_results: 10,
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            throttle_min: Duration::from_millis(500),
            throttle_max: Duration::from_millis(1000),
        }
    }

    fn adapter(
        provider: Arc<ScriptedProvider>,
        pause: Arc<RecordingPause>,
        filters: &[&str],
    ) -> SearchAdapter {
        SearchAdapter::new(
            provider,
            Arc::new(KeywordMatcher::new(filters)),
            policy(),
            pause,
        )
    }

    #[test]
    fn test_body_match_reports_keyword_and_count() {
        let provider = ScriptedProvider::new(vec![Ok(items(10, "linked to bribery probe"))]);
        let pause = Arc::new(RecordingPause::default());
        let outcome = adapter(provider.clone(), pause, &["bribery"]).query("Jane Doe");

        assert!(!outcome.blocked);
        assert!(outcome.is_adverse());
        assert_eq!(outcome.matched_keywords, vec!["bribery"]);
        assert_eq!(outcome.matched_field, Some(MatchedField::Body));
        assert_eq!(outcome.result_count, 10);
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_title_hit_wins_over_body_of_same_item() {
        let mut results = items(10, "nothing to see");
        results[0] = ResultItem::new("Fraud trial opens", "bribery alleged", "https://e.com");
        let provider = ScriptedProvider::new(vec![Ok(results)]);
        let outcome = adapter(
            provider,
            Arc::new(RecordingPause::default()),
            &["bribery", "fraud", "trial"],
        )
        .query("X");

        assert_eq!(outcome.matched_field, Some(MatchedField::Title));
        assert_eq!(outcome.matched_keywords, vec!["fraud", "trial"]);
    }

    #[test]
    fn test_earlier_item_wins() {
        let mut results = items(10, "clean");
        results[3].body = "embezzlement".to_string();
        results[7].title = "fraud".to_string();
        let provider = ScriptedProvider::new(vec![Ok(results)]);
        let outcome = adapter(
            provider,
            Arc::new(RecordingPause::default()),
            &["fraud", "embezzlement"],
        )
        .query("X");

        assert_eq!(outcome.matched_keywords, vec!["embezzlement"]);
        assert_eq!(outcome.matched_field, Some(MatchedField::Body));
    }

    #[test]
    fn test_no_match() {
        let provider = ScriptedProvider::new(vec![Ok(items(10, "charity gala"))]);
        let outcome = adapter(provider, Arc::new(RecordingPause::default()), &["fraud"]).query("X");

        assert!(!outcome.blocked);
        assert!(!outcome.is_adverse());
        assert!(outcome.matched_keywords.is_empty());
        assert_eq!(outcome.result_count, 10);
        assert_eq!(outcome.results.len(), 10);
    }

    #[test]
    fn test_under_count_retries_with_linear_backoff() {
        let provider = ScriptedProvider::new(vec![
            Ok(items(3, "x")),
            Ok(items(6, "x")),
            Ok(items(10, "x")),
        ]);
        let pause = Arc::new(RecordingPause::default());
        let outcome = adapter(provider.clone(), pause.clone(), &["fraud"]).query("X");

        assert_eq!(provider.calls(), 3);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.result_count, 10);

        let pauses = pause.pauses.lock().unwrap();
        assert_eq!(pauses[0], Duration::from_millis(500));
        assert_eq!(pauses[1], Duration::from_millis(1000));
        // Final pause is the post-query throttle.
        assert_eq!(pauses.len(), 3);
        assert!(pauses[2] >= Duration::from_millis(500) && pauses[2] < Duration::from_millis(1000));
    }

    #[test]
    fn test_retries_are_bounded() {
        let provider = ScriptedProvider::new(vec![Ok(items(2, "fraud"))]);
        let pause = Arc::new(RecordingPause::default());
        let outcome = adapter(provider.clone(), pause.clone(), &["fraud"]).query("X");

        assert_eq!(provider.calls(), 4);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.result_count, 2);
        assert!(outcome.is_adverse());

        let pauses = pause.pauses.lock().unwrap();
        assert_eq!(
            &pauses[..3],
            &[
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(1500)
            ]
        );
    }

    #[test]
    fn test_rate_limit_error_is_blocked() {
        let provider =
            ScriptedProvider::new(vec![Err("HTTP error 429 Too Many Requests".to_string())]);
        let outcome = adapter(provider.clone(), Arc::new(RecordingPause::default()), &["fraud"])
            .query("X");

        assert!(outcome.blocked);
        assert_eq!(outcome.result_count, 0);
        assert!(outcome.matched_keywords.is_empty());
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_other_error_is_no_hit_and_not_retried() {
        let provider = ScriptedProvider::new(vec![Err("connection reset by peer".to_string())]);
        let outcome = adapter(provider.clone(), Arc::new(RecordingPause::default()), &["fraud"])
            .query("X");

        assert!(!outcome.blocked);
        assert!(!outcome.is_adverse());
        assert_eq!(outcome.result_count, 0);
        assert_eq!(outcome.error.as_deref(), Some("Search request failed: connection reset by peer"));
        assert_eq!(provider.calls(), 1);
    }

    #[test]
    fn test_error_during_retry_is_classified() {
        let provider = ScriptedProvider::new(vec![
            Ok(items(1, "x")),
            Err("Ratelimit: request blocked".to_string()),
        ]);
        let outcome = adapter(provider.clone(), Arc::new(RecordingPause::default()), &["fraud"])
            .query("X");

        assert!(outcome.blocked);
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn test_throttle_pause_after_every_query() {
        let provider = ScriptedProvider::new(vec![Err("429".to_string())]);
        let pause = Arc::new(RecordingPause::default());
        adapter(provider, pause.clone(), &["fraud"]).query("X");
        assert_eq!(pause.pauses.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_is_blocked_message() {
        assert!(is_blocked_message("429 Too Many Requests"));
        assert!(is_blocked_message("You have been BLOCKED"));
        assert!(is_blocked_message("Search rate limit hit: 202"));
        assert!(is_blocked_message("too many requests"));
        assert!(!is_blocked_message("timed out"));
        assert!(!is_blocked_message("HTTP 500"));
    }

    #[test]
    fn test_jitter_range() {
        let policy = policy();
        for _ in 0..100 {
            let d = policy.jitter();
            assert!(d >= Duration::from_millis(500) && d < Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_jitter_with_empty_range() {
        let policy = SearchPolicy {
            throttle_min: Duration::ZERO,
            throttle_max: Duration::ZERO,
            ..policy()
        };
        assert_eq!(policy.jitter(), Duration::ZERO);
    }
}
