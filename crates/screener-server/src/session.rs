//! Cookie-keyed sessions and the per-session filter overrides.

use std::convert::Infallible;
use std::time::Duration;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use log::warn;
use moka::sync::Cache;

pub const SESSION_COOKIE: &str = "screener_session";

/// The caller's session, taken from the `screener_session` cookie or newly
/// issued when the cookie is absent or malformed.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub is_new: bool,
}

impl Session {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match session_cookie(headers) {
            Some(id) => Self { id, is_new: false },
            None => Self {
                id: uuid::Uuid::new_v4().to_string(),
                is_new: true,
            },
        }
    }

    /// Adds the `Set-Cookie` header for a newly issued session.
    pub fn attach(&self, response: &mut Response) {
        if !self.is_new {
            return;
        }
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, self.id
        );
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!("Could not encode session cookie: {}", e),
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Session::from_headers(&parts.headers))
    }
}

/// Session id from the request cookies. Only well-formed ids are accepted.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| uuid::Uuid::parse_str(value.trim()).ok())
        .map(|id| id.to_string())
}

/// Most sessions whose filter overrides are kept at once.
pub const MAX_FILTER_SESSIONS: u64 = 10_000;

/// Overrides of sessions idle this long are dropped.
pub const FILTER_SESSION_IDLE: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-session keyword filter overrides.
///
/// Bounded by entry count and idle time; a session whose override has been
/// evicted falls back to the configured default list.
pub struct FilterStore {
    overrides: Cache<String, Vec<String>>,
}

impl FilterStore {
    pub fn new() -> Self {
        Self::with_limits(MAX_FILTER_SESSIONS, FILTER_SESSION_IDLE)
    }

    pub fn with_limits(max_sessions: u64, idle: Duration) -> Self {
        Self {
            overrides: Cache::builder()
                .max_capacity(max_sessions)
                .time_to_idle(idle)
                .build(),
        }
    }

    pub fn get(&self, session_id: &str) -> Option<Vec<String>> {
        self.overrides.get(session_id)
    }

    pub fn set(&self, session_id: &str, filters: Vec<String>) {
        self.overrides.insert(session_id.to_string(), filters);
    }

    /// Number of sessions currently holding an override.
    pub fn len(&self) -> u64 {
        self.overrides.run_pending_tasks();
        self.overrides.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new()
    }
}
