// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::status::TestStatus;
use thiserror::Error;

/// An identifier could not be parsed as a UUID.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("`{input}` is not a well-formed identifier: {reason}")]
pub struct IdentifierParseError {
    input: String,
    reason: String,
}

impl IdentifierParseError {
    pub(crate) fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Error returned while parsing a [`TestStatus`] value from a string.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error(
    "unrecognized value for test status: {input}\n(known values: {})",
    TestStatus::variants().join(", "),
)]
pub struct TestStatusParseError {
    input: String,
}

impl TestStatusParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// Error returned while parsing a timestamp.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("`{input}` is not an ISO-8601 timestamp")]
pub struct TimestampParseError {
    input: String,
}

impl TimestampParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}
