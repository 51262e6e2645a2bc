//! Client-facing API error wrapper rendering `{"error": message}`.

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use vidtrack_pipeline::PipelineError;

use crate::models::ErrorBody;

/// Error returned by handlers.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    message: String,
}

impl ApiError {
    const fn new(status: StatusCode, message: String) -> Self {
        Self { status, message }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message.into())
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into())
    }

    pub(crate) fn multipart(err: &MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::EmptyUpload { .. } => Self::bad_request("Uploaded file is empty"),
            other => Self::internal(other.client_message()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn pipeline_errors_map_to_status_and_message() {
        let err = ApiError::from(PipelineError::NoRunFound {
            scratch: PathBuf::from("runs"),
            selector: "latest".into(),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "No tracking output found");

        let err = ApiError::from(PipelineError::EmptyUpload {
            path: PathBuf::from("uploads/a.mp4"),
        });
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = ApiError::from(PipelineError::Transcode {
            status: Some(1),
            diagnostics: "Invalid data found when processing input".into(),
        });
        assert_eq!(
            err.message,
            "Transcoding failed: Invalid data found when processing input"
        );
    }

    #[test]
    fn response_uses_error_body() {
        let response = ApiError::bad_request("missing file field").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
