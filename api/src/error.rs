//! HTTP error mapping: validation → 400, unknown keys → 404, rest → 500

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use engine::error::EngineError;
use serde_json::json;

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<EngineError>() {
            Some(engine_err) => Self::from_engine(engine_err),
            None => Self::internal(err.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self::from_engine(&err)
    }
}

impl ApiError {
    fn from_engine(err: &EngineError) -> Self {
        match err {
            EngineError::Validation(_)
            | EngineError::UnsupportedTimeframe(_)
            | EngineError::UnknownStrategy(_)
            | EngineError::StrategyParse { .. } => Self::bad_request(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_the_right_status() {
        let err: ApiError = EngineError::Validation("bad".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = EngineError::UnknownStrategy("x".into()).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err: ApiError = EngineError::Cancelled.into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
