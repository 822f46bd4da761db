use std::collections::HashSet;

use log::warn;
use regex::Regex;

/// Case-insensitive, whole-word keyword matcher.
///
/// Filters are compiled once and reported in declaration order. A filter
/// listed twice is reported once.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    /// Pre-compiled `\b<filter>\b` patterns, in declaration order.
    patterns: Vec<(String, Regex)>,
}

impl KeywordMatcher {
    pub fn new<I, S>(filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut patterns = Vec::new();

        for filter in filters {
            let filter = filter.as_ref();
            if filter.trim().is_empty() || !seen.insert(filter.to_string()) {
                continue;
            }

            let pattern = format!(r"(?i)\b{}\b", regex::escape(filter));
            match Regex::new(&pattern) {
                Ok(regex) => patterns.push((filter.to_string(), regex)),
                Err(e) => warn!("Skipping keyword filter '{}': {}", filter, e),
            }
        }

        Self { patterns }
    }

    /// Returns every filter that occurs in `text` as a whole word.
    pub fn find_matches(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        self.patterns
            .iter()
            .filter(|(_, regex)| regex.is_match(text))
            .map(|(filter, _)| filter.clone())
            .collect()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|(_, regex)| regex.is_match(text))
    }

    pub fn filters(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(filter, _)| filter.as_str())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// One-shot form of [`KeywordMatcher::find_matches`].
pub fn match_keywords<S: AsRef<str>>(text: &str, filters: &[S]) -> Vec<String> {
    KeywordMatcher::new(filters).find_matches(text)
}
