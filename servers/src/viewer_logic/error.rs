use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lib_common::ViewerError;
use serde_json::json;
use tracing::{error, warn};

/// Handler error, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub struct AppError(pub ViewerError);

impl From<ViewerError> for AppError {
    fn from(e: ViewerError) -> Self {
        AppError(e)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ViewerError::NotFound(_) => StatusCode::NOT_FOUND,
            ViewerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ViewerError::Signing(_) | ViewerError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            ViewerError::Parse { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "Request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
