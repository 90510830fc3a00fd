//! # Error Types Module
//!
//! Structured error types for the price sources (AI providers, spreadsheets)
//! and for the JSON store. Bot handlers turn these into a single localized
//! failure message; the REST layer maps them onto `ServerError`.

use thiserror::Error;

use crate::settings::AiSource;

/// Errors raised while generating prices through an AI provider
#[derive(Debug, Error)]
pub enum AiError {
    /// No API key in the stored settings nor in the environment
    #[error("API key for {0} is missing")]
    MissingApiKey(AiSource),
    /// The admin kill switch blocks every AI call
    #[error("AI updates are disabled by the kill switch")]
    KillSwitch,
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The provider answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Api { status: u16, body: String },
    /// The provider answered without any text content
    #[error("empty response from AI provider")]
    EmptyResponse,
    /// The text could not be parsed as a car catalog
    #[error("invalid JSON response from AI: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The catalog parsed but contains no brands
    #[error("AI response contains no prices")]
    NoPrices,
}

/// Errors raised while importing a spreadsheet
#[derive(Debug, Error)]
pub enum SpreadsheetError {
    /// The workbook could not be opened
    #[error("cannot open workbook: {0}")]
    Open(String),
    /// The workbook has no worksheet
    #[error("workbook contains no sheet")]
    NoSheet,
    /// The first sheet has no data rows
    #[error("spreadsheet is empty")]
    Empty,
    /// A required header is absent
    #[error("missing column: {0}")]
    MissingColumn(&'static str),
    /// A numeric cell could not be parsed
    #[error("invalid number {value:?} in column {column} on row {row}")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },
}

/// Errors raised by the JSON store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on data file: {0}")]
    Io(#[from] std::io::Error),
    #[error("data file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot persist data file: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("data file writer stopped: {0}")]
    Writer(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_formatting() {
        let err = AiError::MissingApiKey(AiSource::DeepSeek);
        assert_eq!(err.to_string(), "API key for DEEPSEEK is missing");

        let err = SpreadsheetError::MissingColumn("Brand");
        assert_eq!(err.to_string(), "missing column: Brand");

        let err = SpreadsheetError::InvalidNumber {
            row: 3,
            column: "Price",
            value: "abc".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid number \"abc\" in column Price on row 3"
        );
    }
}
