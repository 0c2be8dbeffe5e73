// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and response bodies for the collector's HTTP API.

use crate::{
    ids::{RunId, TestId},
    parameters::TestParameters,
    records::{TestRecord, TestRunRecord},
    status::TestStatus,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /runs`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateRunRequest {
    /// The new run's identifier.
    pub run_id: RunId,
    /// When the run started.
    #[serde(with = "crate::timestamp")]
    pub start_time: DateTime<FixedOffset>,
}

/// Body of `POST /runs/{run_id}/finish`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinishRunRequest {
    /// The run's identifier. If present, it must match the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// When the run finished.
    #[serde(with = "crate::timestamp")]
    pub finish_time: DateTime<FixedOffset>,
}

/// Body of `POST /tests`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateTestRequest {
    /// The new test's identifier.
    pub test_id: TestId,
    /// The test's name.
    pub test_name: String,
    /// The parameters the test was invoked with.
    #[serde(default)]
    pub test_parameters: TestParameters,
    /// When the test started.
    #[serde(with = "crate::timestamp")]
    pub timestamp: DateTime<FixedOffset>,
    /// The run the test belongs to.
    pub test_run_id: RunId,
}

/// Body of `POST /tests/{test_id}/finish`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinishTestRequest {
    /// The test's identifier. If present, it must match the path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<TestId>,
    /// The test's outcome.
    pub test_status: TestStatus,
    /// How long the test took, in seconds.
    #[serde(default)]
    pub duration: Option<f64>,
    /// The error message, for failure-class outcomes.
    #[serde(default)]
    pub error_exception: Option<String>,
}

/// Response of `GET /runs/{run_id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestsForRun {
    /// The run that was asked for.
    pub run_id: RunId,
    /// Every test recorded against the run.
    pub tests: Vec<TestRecord>,
}

/// Response of `GET /full-report`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FullReport {
    /// Every run, ordered by start time.
    pub runs: Vec<TestRunRecord>,
    /// Every test.
    pub tests: Vec<TestRecord>,
}

/// Response of `GET /health`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Always `"ok"` when the collector answers.
    pub status: String,
    /// The collector's version.
    pub version: String,
}

/// The classification of a failed request.
///
/// Clients rely on this rather than on the message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A record with the same identifier already exists.
    DuplicateKey,
    /// The referenced record does not exist.
    NotFound,
    /// A test referenced a run that does not exist.
    UnknownRun,
    /// The record has already reached its terminal state.
    AlreadyFinished,
    /// An identifier was not a well-formed UUID.
    InvalidIdentifier,
    /// The request was malformed.
    InvalidRequest,
    /// The store could not persist or read records.
    StorageUnavailable,
}

impl ErrorKind {
    /// Returns the wire representation of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DuplicateKey => "duplicate_key",
            Self::NotFound => "not_found",
            Self::UnknownRun => "unknown_run",
            Self::AlreadyFinished => "already_finished",
            Self::InvalidIdentifier => "invalid_identifier",
            Self::InvalidRequest => "invalid_request",
            Self::StorageUnavailable => "storage_unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The body of every error response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Details about the error.
    pub error: ApiErrorDetail,
}

/// The details inside an [`ApiErrorBody`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// The error's classification.
    pub kind: ErrorKind,
    /// A human-readable message.
    pub message: String,
}

impl ApiErrorBody {
    /// Creates a new error body.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                kind,
                message: message.into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn create_test_request_defaults_parameters() {
        let run_id = RunId::new_v4();
        let test_id = TestId::new_v4();
        let body = format!(
            r#"{{"test_id": "{test_id}", "test_name": "t", "timestamp": "2024-04-27T10:00:00.123", "test_run_id": "{run_id}"}}"#
        );
        let request: CreateTestRequest = serde_json::from_str(&body).expect("valid request");
        assert_eq!(request.test_id, test_id);
        assert_eq!(request.test_run_id, run_id);
        assert!(request.test_parameters.is_empty());
    }

    #[test]
    fn finish_test_request_optional_fields() {
        let request: FinishTestRequest =
            serde_json::from_str(r#"{"test_status": "PASSED"}"#).expect("valid request");
        assert_eq!(
            request,
            FinishTestRequest {
                test_id: None,
                test_status: TestStatus::Passed,
                duration: None,
                error_exception: None,
            }
        );

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("test_id").is_none());
    }

    #[test_case(ErrorKind::DuplicateKey, "duplicate_key" ; "duplicate key")]
    #[test_case(ErrorKind::UnknownRun, "unknown_run" ; "unknown run")]
    #[test_case(ErrorKind::StorageUnavailable, "storage_unavailable" ; "storage unavailable")]
    fn error_kind_wire_names(kind: ErrorKind, expected: &str) {
        assert_eq!(kind.as_str(), expected);
        assert_eq!(
            serde_json::to_value(kind).unwrap(),
            serde_json::Value::String(expected.to_owned())
        );
    }

    #[test]
    fn error_body_shape() {
        let body = ApiErrorBody::new(ErrorKind::NotFound, "test not found");
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(
            json,
            r#"{"error":{"kind":"not_found","message":"test not found"}}"#
        );
    }
}
