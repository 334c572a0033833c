//! Live snapshot streams over Server-Sent Events.
//!
//! Every stream sends the current snapshot immediately, then re-reads and
//! re-sends it whenever a relevant [`ChangeEvent`] is published. A lagging
//! subscriber skips the missed events and resyncs with a fresh snapshot.

use std::convert::Infallible;
use std::future::Future;

use axum::response::Sse;
use axum::response::sse::{Event, KeepAlive};
use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::error::AppError;
use crate::services::events::ChangeEvent;
use crate::state::AppState;

/// Build an SSE response that pushes `load(state)` on every relevant change.
pub fn snapshot_stream<T, F, Fut, R>(
    state: AppState,
    relevant: R,
    load: F,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize,
    F: Fn(AppState) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, AppError>> + Send,
    R: Fn(&ChangeEvent) -> bool + Send + 'static,
{
    // Subscribe before the first read so no change slips between them.
    let mut changes = state.feed().subscribe();

    let stream = async_stream::stream! {
        yield Ok(snapshot_event(load(state.clone()).await));

        loop {
            match changes.recv().await {
                Ok(event) if relevant(&event) => {}
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "live stream lagged, resyncing");
                }
                Err(RecvError::Closed) => break,
            }
            yield Ok(snapshot_event(load(state.clone()).await));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn snapshot_event<T: Serialize>(snapshot: Result<T, AppError>) -> Event {
    match snapshot {
        Ok(value) => {
            let json = serde_json::to_string(&value).unwrap_or_else(|e| {
                tracing::error!(error = %e, "failed to serialize snapshot");
                "null".to_string()
            });
            Event::default().event("snapshot").data(json)
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to load snapshot");
            Event::default()
                .event("error")
                .data(r#"{"error":"Snapshot unavailable"}"#)
        }
    }
}
