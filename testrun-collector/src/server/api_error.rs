// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use std::fmt;
use testrun_metadata::{ApiErrorBody, ErrorKind};
use testrun_store::StoreError;
use tracing::{debug, error};

/// Body fields that hold identifiers. A malformed value in one of these is
/// reported as `invalid_identifier` rather than `invalid_request`.
static IDENTIFIER_FIELDS: &[&str] = &["run_id", "test_id", "test_run_id"];

/// A failed request, as seen by API clients.
#[derive(Debug)]
pub(crate) struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        let kind = error.kind();
        if kind == ErrorKind::StorageUnavailable {
            // Storage details stay in the log.
            error!(error = %DisplayErrorChain(&error), "failed to persist record");
        }
        Self::new(kind, error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_code(self.kind);
        debug!(kind = %self.kind, %status, message = %self.message, "request failed");
        (status, Json(ApiErrorBody::new(self.kind, self.message))).into_response()
    }
}

/// The HTTP status for each error classification.
pub(crate) fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest | ErrorKind::InvalidIdentifier => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::DuplicateKey | ErrorKind::AlreadyFinished => StatusCode::CONFLICT,
        ErrorKind::UnknownRun => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Parses a JSON request body, keeping track of which field was bad.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let de = &mut serde_json::Deserializer::from_slice(body);
    serde_path_to_error::deserialize(de).map_err(|error| {
        let path = error.path().to_string();
        let inner = error.into_inner();
        if inner.is_data() && IDENTIFIER_FIELDS.contains(&path.as_str()) {
            ApiError::new(
                ErrorKind::InvalidIdentifier,
                format!("`{path}` is not a well-formed identifier: {inner}"),
            )
        } else if path == "." {
            ApiError::invalid_request(format!("invalid request body: {inner}"))
        } else {
            ApiError::invalid_request(format!("invalid value for `{path}`: {inner}"))
        }
    })
}

struct DisplayErrorChain<'a>(&'a (dyn std::error::Error + 'static));

impl fmt::Display for DisplayErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(error) = source {
            write!(f, ": {error}")?;
            source = error.source();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use testrun_metadata::CreateTestRequest;

    #[test_case(ErrorKind::InvalidRequest, 400)]
    #[test_case(ErrorKind::InvalidIdentifier, 400)]
    #[test_case(ErrorKind::NotFound, 404)]
    #[test_case(ErrorKind::DuplicateKey, 409)]
    #[test_case(ErrorKind::AlreadyFinished, 409)]
    #[test_case(ErrorKind::UnknownRun, 422)]
    #[test_case(ErrorKind::StorageUnavailable, 503)]
    fn status_codes(kind: ErrorKind, expected: u16) {
        assert_eq!(status_code(kind).as_u16(), expected);
    }

    #[test_case(
        r#"{"test_id": "nope", "test_name": "t", "timestamp": "2024-04-27T10:00:00", "test_run_id": "nope"}"#,
        ErrorKind::InvalidIdentifier
        ; "malformed id"
    )]
    #[test_case(
        r#"{"test_id": "4e5ba1f6-9d2c-4d7e-8d6a-1e2f3a4b5c6d", "test_name": "t", "timestamp": "yesterday", "test_run_id": "4e5ba1f6-9d2c-4d7e-8d6a-1e2f3a4b5c6d"}"#,
        ErrorKind::InvalidRequest
        ; "malformed timestamp"
    )]
    #[test_case(r#"{"test_name": "t"}"#, ErrorKind::InvalidRequest ; "missing field")]
    #[test_case("not json", ErrorKind::InvalidRequest ; "not json")]
    fn body_errors(body: &str, expected: ErrorKind) {
        let error = parse_body::<CreateTestRequest>(body.as_bytes()).unwrap_err();
        assert_eq!(error.kind, expected, "message: {}", error.message);
    }
}
