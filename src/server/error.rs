//! Error type returned by every REST handler.
//!
//! [`ServerError`] implements [`IntoResponse`] so failures become a JSON body
//! `{"error": "..."}` with a matching status code. Store and I/O details are
//! logged and replaced by a generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::errors::{AiError, SpreadsheetError, StoreError};

#[derive(Debug, Error)]
pub enum ServerError {
    /// The AI provider call failed; the message is shown to the dashboard
    #[error("AI update failed: {0}")]
    Ai(#[from] AiError),

    /// The uploaded workbook could not be imported
    #[error("{0}")]
    Spreadsheet(#[from] SpreadsheetError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Spreadsheet(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ServerError::Ai(e) => {
                error!(error = %e, "AI provider error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ServerError::Store(e) => {
                error!(error = %e, "store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        let e = match e.downcast::<AiError>() {
            Ok(ai) => return ServerError::Ai(ai),
            Err(e) => e,
        };
        let e = match e.downcast::<SpreadsheetError>() {
            Ok(sheet) => return ServerError::Spreadsheet(sheet),
            Err(e) => e,
        };
        match e.downcast::<StoreError>() {
            Ok(store) => ServerError::Store(store),
            Err(e) => {
                error!(error = ?e, "converting anyhow error to ServerError::Internal");
                ServerError::Internal(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::AiSource;

    #[test]
    fn test_anyhow_errors_keep_their_kind() {
        let err = ServerError::from(anyhow::Error::from(SpreadsheetError::Empty));
        assert!(matches!(err, ServerError::Spreadsheet(SpreadsheetError::Empty)));

        let err = ServerError::from(anyhow::Error::from(AiError::MissingApiKey(AiSource::Gemini)));
        assert!(matches!(err, ServerError::Ai(AiError::MissingApiKey(_))));

        let err = ServerError::from(anyhow::anyhow!("boom"));
        assert!(matches!(err, ServerError::Internal(_)));
    }

    #[test]
    fn test_status_codes() {
        let response = ServerError::BadRequest("no file".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ServerError::Ai(AiError::KillSwitch).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
