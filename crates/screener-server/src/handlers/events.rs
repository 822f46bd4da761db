//! GET /api/events: server-sent stream of job progress events.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// Only stream events of this job.
    pub job_id: Option<String>,
}

pub async fn events(
    State(state): State<SharedState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(event) => {
            if let Some(ref job_id) = query.job_id {
                if &event.job_id != job_id {
                    return None;
                }
            }
            let json = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().event("job").data(json)))
        }
        // Lagged: the store stays authoritative, so missed events are skipped
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
