use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use parley_core::ParleyError;
use tracing::error;

/// Error returned by controllers, rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError(pub ParleyError);

impl From<ParleyError> for ApiError {
    fn from(err: ParleyError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// HTTP status the wrapped error maps to.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ParleyError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ParleyError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self.0 {
            ParleyError::Validation(msg) => msg.clone(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let not_found = ApiError(ParleyError::SessionNotFound("abc".into()));
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let invalid = ApiError(ParleyError::Validation("bad".into()));
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let upstream = ApiError(ParleyError::Upstream("down".into()));
        assert_eq!(upstream.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_not_found_detail_names_session() {
        let response = ApiError(ParleyError::SessionNotFound("abc".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
