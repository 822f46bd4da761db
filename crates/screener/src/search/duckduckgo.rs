use std::time::Duration;

use log::debug;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::config::SearchConfig;
use crate::error::ProviderError;
use crate::search::{ResultItem, SearchProvider};

const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = concat!("screener/", env!("CARGO_PKG_VERSION"));

/// Markers of DuckDuckGo's bot-challenge page, which is served with 200.
const CHALLENGE_MARKERS: &[&str] = &["anomaly-modal", "challenge-form"];

/// Web search through DuckDuckGo's HTML endpoint.
pub struct DuckDuckGoProvider {
    client: Client,
    endpoint: String,
    region: String,
    title_re: Regex,
    href_re: Regex,
    snippet_re: Regex,
    tag_re: Regex,
}

impl DuckDuckGoProvider {
    pub fn new(config: &SearchConfig) -> Result<Self, ProviderError> {
        Self::with_endpoint(DEFAULT_ENDPOINT, &config.region, config.timeout())
    }

    pub fn with_endpoint(
        endpoint: &str,
        region: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            region: region.to_string(),
            title_re: compile(r#"(?s)<a([^>]*class="[^"]*result__a[^"]*"[^>]*)>(.*?)</a>"#)?,
            href_re: compile(r#"href="([^"]*)""#)?,
            snippet_re: compile(
                r#"(?s)<(a|div|td)[^>]*class="[^"]*result__snippet[^"]*"[^>]*>(.*?)</(?:a|div|td)>"#,
            )?,
            tag_re: compile(r"(?s)<[^>]*>")?,
        })
    }

    /// Extracts result items from a DuckDuckGo HTML results page.
    fn parse_results(&self, html: &str, max_results: usize) -> Vec<ResultItem> {
        let titles: Vec<(usize, String, String)> = self
            .title_re
            .captures_iter(html)
            .filter_map(|caps| {
                let start = caps.get(0)?.start();
                let href = self
                    .href_re
                    .captures(caps.get(1)?.as_str())
                    .and_then(|h| h.get(1))
                    .map(|h| resolve_redirect(&decode_entities(h.as_str())))
                    .unwrap_or_default();
                let title = self.clean_text(caps.get(2)?.as_str());
                Some((start, href, title))
            })
            .collect();

        let snippets: Vec<(usize, String)> = self
            .snippet_re
            .captures_iter(html)
            .filter_map(|caps| {
                let start = caps.get(0)?.start();
                Some((start, self.clean_text(caps.get(2)?.as_str())))
            })
            .collect();

        let mut results = Vec::new();
        for (i, (start, url, title)) in titles.iter().enumerate() {
            if is_ad(url) {
                continue;
            }
            let next_start = titles.get(i + 1).map(|t| t.0).unwrap_or(usize::MAX);
            let body = snippets
                .iter()
                .find(|(pos, _)| pos > start && *pos < next_start)
                .map(|(_, text)| text.clone())
                .unwrap_or_default();

            results.push(ResultItem::new(title.clone(), body, url.clone()));
            if results.len() >= max_results {
                break;
            }
        }

        results
    }

    fn clean_text(&self, fragment: &str) -> String {
        let stripped = self.tag_re.replace_all(fragment, "");
        decode_entities(stripped.trim())
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl SearchProvider for DuckDuckGoProvider {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<ResultItem>, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("q", query), ("kl", self.region.as_str())])
            .send()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ProviderError::RateLimited("429 Too Many Requests".to_string()))
            }
            // DuckDuckGo answers 202 instead of results when it throttles.
            StatusCode::ACCEPTED => {
                return Err(ProviderError::RateLimited(
                    "DuckDuckGo answered 202 Accepted".to_string(),
                ))
            }
            StatusCode::FORBIDDEN => {
                return Err(ProviderError::Status {
                    status: status.as_u16(),
                    message: "request blocked".to_string(),
                })
            }
            s if !s.is_success() => {
                return Err(ProviderError::Status {
                    status: s.as_u16(),
                    message: s.canonical_reason().unwrap_or("unexpected status").to_string(),
                })
            }
            _ => {}
        }

        let html = response
            .text()
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if CHALLENGE_MARKERS.iter().any(|m| html.contains(m)) {
            return Err(ProviderError::RateLimited(
                "blocked by DuckDuckGo bot challenge".to_string(),
            ));
        }

        let results = self.parse_results(&html, max_results);
        debug!("DuckDuckGo parsed {} result(s)", results.len());
        Ok(results)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}

fn compile(pattern: &str) -> Result<Regex, ProviderError> {
    Regex::new(pattern).map_err(|e| ProviderError::Parse(format!("invalid pattern: {}", e)))
}

/// Unwraps DuckDuckGo's `/l/?uddg=<target>` redirect links.
fn resolve_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    if let Ok(url) = reqwest::Url::parse(&absolute) {
        if url.path().starts_with("/l/") {
            if let Some((_, target)) = url.query_pairs().find(|(k, _)| k == "uddg") {
                return target.into_owned();
            }
        }
    }

    absolute
}

fn is_ad(url: &str) -> bool {
    url.contains("duckduckgo.com/y.js")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
