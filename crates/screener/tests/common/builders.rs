//! Builders for scripted search providers and test data.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use screener::error::ProviderError;
use screener::search::{Pause, ResultItem, SearchProvider};

/// One scripted provider answer.
#[derive(Debug, Clone)]
pub enum Answer {
    Items(Vec<ResultItem>),
    Error(String),
}

/// `n` neutral results whose first item carries `title` and `body`.
pub fn items(n: usize, title: &str, body: &str) -> Vec<ResultItem> {
    (0..n)
        .map(|i| {
            if i == 0 {
                ResultItem::new(title, body, format!("https://example.com/{}", i))
            } else {
                ResultItem::new(
                    format!("Unrelated headline {}", i),
                    "Nothing to see here",
                    format!("https://example.com/{}", i),
                )
            }
        })
        .collect()
}

/// A fake search provider that answers from a script and records every
/// call. Each name has a queue of answers; the last answer repeats.
pub struct ScriptedProvider {
    answers: Mutex<HashMap<String, VecDeque<Answer>>>,
    delays: HashMap<String, Duration>,
    fallback: Answer,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    /// Total number of provider calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of provider calls for one query.
    pub fn calls_for(&self, query: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.as_str() == query)
            .count()
    }

    fn next_answer(&self, query: &str) -> Answer {
        let mut answers = self.answers.lock().unwrap();
        match answers.get_mut(query) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| self.fallback.clone()),
            None => self.fallback.clone(),
        }
    }
}

impl SearchProvider for ScriptedProvider {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<ResultItem>, ProviderError> {
        self.calls.lock().unwrap().push(query.to_string());

        if let Some(delay) = self.delays.get(query) {
            std::thread::sleep(*delay);
        }

        match self.next_answer(query) {
            Answer::Items(mut items) => {
                items.truncate(max_results);
                Ok(items)
            }
            Answer::Error(message) => Err(ProviderError::Transport(message)),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Builder for `ScriptedProvider`.
pub struct ProviderBuilder {
    answers: HashMap<String, VecDeque<Answer>>,
    delays: HashMap<String, Duration>,
    fallback: Answer,
}

impl ProviderBuilder {
    /// Unknown names get ten neutral results.
    pub fn new() -> Self {
        Self {
            answers: HashMap::new(),
            delays: HashMap::new(),
            fallback: Answer::Items(items(10, "Company profile", "Registered office and officers")),
        }
    }

    /// Queue an answer with results for `name`.
    pub fn results(mut self, name: &str, results: Vec<ResultItem>) -> Self {
        self.answers
            .entry(name.to_string())
            .or_default()
            .push_back(Answer::Items(results));
        self
    }

    /// Queue a provider error for `name`.
    pub fn error(mut self, name: &str, message: &str) -> Self {
        self.answers
            .entry(name.to_string())
            .or_default()
            .push_back(Answer::Error(message.to_string()));
        self
    }

    /// Delay every answer for `name`.
    pub fn delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }

    pub fn fallback(mut self, answer: Answer) -> Self {
        self.fallback = answer;
        self
    }

    pub fn build(self) -> ScriptedProvider {
        ScriptedProvider {
            answers: Mutex::new(self.answers),
            delays: self.delays,
            fallback: self.fallback,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl Default for ProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Records requested pauses instead of sleeping.
#[derive(Default)]
pub struct RecordingPause {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPause {
    pub fn count(&self) -> usize {
        self.pauses.lock().unwrap().len()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}
