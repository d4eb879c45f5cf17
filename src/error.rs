//! Error handling.

use axum::{
    extract::rejection::JsonRejection,
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use strum_macros::Display;
use thiserror::Error;
use tracing::{event, Level};

/// Calls made to the Horreum backend.
///
/// The `Display` form is the stable code used to key alerts and error responses, so that
/// repeated identical failures replace each other rather than stacking up.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendOperation {
    /// Label sets (fingerprints) of a test
    FetchFingerprints,
    /// Timeseries datapoints of change detection variables
    FetchTimeseries,
    /// Detected changes of change detection variables
    FetchAnnotations,
    /// Timestamps of the most recent datapoints
    FetchLastDatapoints,
    /// Autocompletion of run search queries
    FetchSuggestions,
}

impl BackendOperation {
    /// Human readable description of the operation.
    pub fn description(self) -> &'static str {
        match self {
            Self::FetchFingerprints => "fetch fingerprints",
            Self::FetchTimeseries => "fetch timeseries",
            Self::FetchAnnotations => "fetch change annotations",
            Self::FetchLastDatapoints => "fetch most recent datapoints",
            Self::FetchSuggestions => "fetch suggestions",
        }
    }
}

/// Horreum explorer error type
///
/// This type encapsulates the various errors that may occur.
/// Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum ExplorerError {
    /// The Horreum backend could not be reached or its response could not be decoded
    #[error("failed to {}", .operation.description())]
    BackendRequest {
        operation: BackendOperation,
        #[source]
        source: reqwest::Error,
    },

    /// The Horreum backend responded with an unsuccessful status
    #[error(
        "Horreum backend responded with {status} when attempting to {}",
        .operation.description()
    )]
    BackendStatus {
        operation: BackendOperation,
        status: StatusCode,
    },

    /// Error joining a path onto the Horreum backend URL
    #[error("invalid Horreum backend URL")]
    BackendUrl(#[from] url::ParseError),

    /// Fingerprint is not valid JSON
    #[error("fingerprint is not valid JSON")]
    FingerprintParse(#[from] serde_json::Error),

    /// Fingerprint is valid JSON but not an object
    #[error("fingerprint must be a JSON object, not {kind}")]
    FingerprintNotObject { kind: &'static str },

    /// Error deserialising request data
    #[error("request data is not valid")]
    RequestDataJsonRejection(#[from] JsonRejection),

    /// Error validating request data (single error)
    #[error("request data is not valid")]
    RequestDataValidationSingle(#[from] validator::ValidationError),

    /// Error validating request data (multiple errors)
    #[error("request data is not valid")]
    RequestDataValidation(#[from] validator::ValidationErrors),
}

impl ExplorerError {
    /// Stable code identifying the kind of failure.
    pub fn code(&self) -> String {
        match self {
            Self::BackendRequest { operation, .. } | Self::BackendStatus { operation, .. } => {
                operation.to_string()
            }
            Self::BackendUrl(_) => "BACKEND_URL".to_string(),
            Self::FingerprintParse(_) | Self::FingerprintNotObject { .. } => {
                "FINGERPRINT_PARSE".to_string()
            }
            Self::RequestDataJsonRejection(_)
            | Self::RequestDataValidationSingle(_)
            | Self::RequestDataValidation(_) => "INVALID_REQUEST".to_string(),
        }
    }
}

impl IntoResponse for ExplorerError {
    /// Convert from an `ExplorerError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Stable error code
    code: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new(error: &ExplorerError) -> Self {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody {
            message,
            code: error.code(),
            caused_by,
        }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `status`: HTTP status of the response
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new(status: StatusCode, error: &ExplorerError) -> Self {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }
}

impl From<ExplorerError> for ErrorResponse {
    /// Convert from an `ExplorerError` into an `ErrorResponse`.
    fn from(error: ExplorerError) -> Self {
        let status = match &error {
            // Bad request
            ExplorerError::FingerprintParse(_)
            | ExplorerError::FingerprintNotObject { .. }
            | ExplorerError::RequestDataJsonRejection(_)
            | ExplorerError::RequestDataValidationSingle(_)
            | ExplorerError::RequestDataValidation(_) => StatusCode::BAD_REQUEST,

            // Pass through the caller's own access problems, anything else is our upstream failing.
            ExplorerError::BackendStatus { status, .. }
                if [
                    StatusCode::UNAUTHORIZED,
                    StatusCode::FORBIDDEN,
                    StatusCode::NOT_FOUND,
                ]
                .contains(status) =>
            {
                *status
            }
            ExplorerError::BackendStatus { .. } => StatusCode::BAD_GATEWAY,
            ExplorerError::BackendRequest { .. } => StatusCode::BAD_GATEWAY,

            // Internal server error
            ExplorerError::BackendUrl(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let response = Self::new(status, &error);

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}
