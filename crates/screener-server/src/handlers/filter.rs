//! GET/POST /api/filter: the keyword filter list for the caller's session.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::info;
use serde::{Deserialize, Serialize};

use screener::config::normalize_filters;

use crate::error::ApiError;
use crate::session::Session;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub filter: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FilterResponse {
    pub status: &'static str,
    pub filter: Vec<String>,
    /// `session` when the list is the caller's override, else `default`.
    pub source: &'static str,
}

pub async fn get_filter(State(state): State<SharedState>, session: Session) -> Response {
    let (filter, source) = match state.filters.get(&session.id) {
        Some(filter) => (filter, "session"),
        None => (state.config.filters.clone(), "default"),
    };

    let mut response = Json(FilterResponse {
        status: "success",
        filter,
        source,
    })
    .into_response();
    session.attach(&mut response);
    response
}

pub async fn set_filter(
    State(state): State<SharedState>,
    session: Session,
    body: Result<Json<FilterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    let filter = normalize_filters(&request.filter);

    info!("Session filter updated: {} keyword(s)", filter.len());
    state.filters.set(&session.id, filter.clone());

    let mut response = Json(FilterResponse {
        status: "success",
        filter,
        source: "session",
    })
    .into_response();
    session.attach(&mut response);
    Ok(response)
}
