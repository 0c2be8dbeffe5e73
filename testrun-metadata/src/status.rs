// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::TestStatusParseError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

/// The terminal outcome of a single test.
///
/// A test has no status while it is running; it transitions exactly once to one
/// of these values when it finishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(test, derive(test_strategy::Arbitrary))]
pub enum TestStatus {
    /// The test passed.
    Passed,
    /// The test ran and failed.
    Failed,
    /// The test was skipped, or failed in a way that was expected.
    Skipped,
    /// The test could not run to completion because its setup or teardown broke.
    Error,
    /// The test finished without any recorded outcome.
    Unknown,
}

impl TestStatus {
    /// Returns the string values accepted by [`FromStr`].
    pub fn variants() -> &'static [&'static str] {
        &["PASSED", "FAILED", "SKIPPED", "ERROR", "UNKNOWN"]
    }

    /// Returns the wire representation of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
            Self::Error => "ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns true if this status represents a failure-class outcome.
    ///
    /// Only failure-class outcomes carry an error message.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = TestStatusParseError;

    // Matching is case-insensitive: some emitters send "Passed" or "passed".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim().to_ascii_uppercase().as_str() {
            "PASSED" => Self::Passed,
            "FAILED" => Self::Failed,
            "SKIPPED" => Self::Skipped,
            "ERROR" => Self::Error,
            "UNKNOWN" => Self::Unknown,
            _ => return Err(TestStatusParseError::new(s)),
        };
        Ok(status)
    }
}

impl Serialize for TestStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TestStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
