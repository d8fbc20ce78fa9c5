use crate::api::error::AppError;
use crate::models::UploadRecord;
use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
};
use futures::{Stream, StreamExt};

#[utoipa::path(
    get,
    path = "/progress/{id}",
    params(
        ("id" = String, Path, description = "Upload ID returned by POST /upload")
    ),
    responses(
        (status = 200, description = "Server-sent events, one UploadRecord per tick", body = UploadRecord, content_type = "text/event-stream"),
        (status = 404, description = "No upload with this ID")
    ),
    tag = "files"
)]
pub async fn progress_feed(
    State(state): State<crate::AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let subscription = state.broadcaster.subscribe(&id)?;

    tracing::info!("📡 Progress feed opened for {}", subscription.upload_id());

    let events = subscription
        .into_stream()
        .map(|snapshot| Event::default().event("message").json_data(snapshot));

    Ok(Sse::new(events))
}
