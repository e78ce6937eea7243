//! Mapping of pipeline errors onto HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::analysis::AnalyzeError;
use crate::scoring::ScoreError;
use crate::simulate::SimulationError;
use crate::suggest::SuggestError;
use crate::topology::TopologyError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] TopologyError),

    #[error(transparent)]
    Precondition(#[from] SuggestError),

    #[error(transparent)]
    Scoring(#[from] ScoreError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl From<AnalyzeError> for ApiError {
    fn from(err: AnalyzeError) -> Self {
        match err {
            AnalyzeError::Validation(e) => ApiError::Validation(e),
            AnalyzeError::Simulation(e) => ApiError::Simulation(e),
            AnalyzeError::Scoring(e) => ApiError::Scoring(e),
            AnalyzeError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Precondition(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Scoring(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Simulation(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(TopologyError::TooFewNodes { count: 1 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(SuggestError::Precondition("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AnalyzeError::Scoring(ScoreError::ModelUnavailable {
                path: "m.json".into(),
                reason: "gone".into(),
            }))
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(SimulationError::Timeout { secs: 3 }).status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
