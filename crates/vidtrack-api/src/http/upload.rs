//! `POST /upload`: persist the video, run the pipeline, return its URL.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State},
};
use tracing::{error, info};
use vidtrack_pipeline::UploadRecord;

use crate::http::constants::FILE_FIELD;
use crate::http::errors::ApiError;
use crate::models::UploadResponse;
use crate::state::ApiState;

pub(crate) async fn upload(
    State(state): State<Arc<ApiState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let record = persist_first_file(&state, &mut multipart).await?;
    state.metrics().add_upload_bytes(record.bytes);
    info!(job_id = %record.job_id, bytes = record.bytes, "upload persisted");

    // The job runs on its own task so a disconnecting client does not abort it.
    let pipeline = state.pipeline.clone();
    let outcome = tokio::spawn(async move { pipeline.process(&record).await })
        .await
        .map_err(|err| {
            error!(error = %err, "pipeline task aborted");
            ApiError::internal("processing task aborted")
        })??;

    Ok(Json(UploadResponse {
        video_url: outcome.video_url,
    }))
}

async fn persist_first_file(
    state: &ApiState,
    multipart: &mut Multipart,
) -> Result<UploadRecord, ApiError> {
    let layout = state.pipeline.layout();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::multipart(&err))?
    {
        if field.file_name().is_none() && field.name() != Some(FILE_FIELD) {
            continue;
        }
        let mut sink = layout.begin_upload(layout.allocate()).await?;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| ApiError::multipart(&err))?
        {
            sink.write_chunk(&chunk).await?;
        }
        return Ok(sink.finish().await?);
    }
    Err(ApiError::bad_request("missing file field"))
}
