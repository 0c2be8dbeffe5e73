// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ids::{RunId, TestId},
    parameters::TestParameters,
    status::TestStatus,
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A persisted test run.
///
/// A run is open until its `end_time` is set, which happens at most once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestRunRecord {
    /// The run's identifier.
    pub run_id: RunId,
    /// When the run started.
    pub start_time: DateTime<FixedOffset>,
    /// When the run finished, or `None` while it is still open.
    pub end_time: Option<DateTime<FixedOffset>>,
}

impl TestRunRecord {
    /// Creates a new, open run.
    pub fn new(run_id: RunId, start_time: DateTime<FixedOffset>) -> Self {
        Self {
            run_id,
            start_time,
            end_time: None,
        }
    }

    /// Returns true if the run has not finished yet.
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Returns the run's wall-clock duration in seconds, if it has finished.
    pub fn duration_secs(&self) -> Option<f64> {
        self.end_time
            .map(|end_time| (end_time - self.start_time).as_seconds_f64())
    }
}

/// A persisted test.
///
/// Field names on the wire follow the collector's request fields, so a record
/// reads back with the same names it was reported with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    /// The test's identifier.
    pub test_id: TestId,
    /// The test's name.
    pub test_name: String,
    /// The parameters the test was invoked with. Never contains NaN.
    pub test_parameters: TestParameters,
    /// When the test started.
    pub timestamp: DateTime<FixedOffset>,
    /// The run this test belongs to.
    #[serde(rename = "test_run_id")]
    pub run_id: RunId,
    /// The test's outcome, or `None` while it is still running.
    #[serde(rename = "test_status")]
    pub status: Option<TestStatus>,
    /// How long the test took, in seconds.
    pub duration: Option<f64>,
    /// The error message for failure-class outcomes.
    #[serde(rename = "error_exception")]
    pub error_message: Option<String>,
}

impl TestRecord {
    /// Creates a new, unfinished test.
    pub fn new(
        test_id: TestId,
        test_name: impl Into<String>,
        test_parameters: TestParameters,
        timestamp: DateTime<FixedOffset>,
        run_id: RunId,
    ) -> Self {
        Self {
            test_id,
            test_name: test_name.into(),
            test_parameters,
            timestamp,
            run_id,
            status: None,
            duration: None,
            error_message: None,
        }
    }

    /// Returns true if the test has a terminal status.
    pub fn is_finished(&self) -> bool {
        self.status.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 4, 27, hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn run_duration() {
        let mut run = TestRunRecord::new(RunId::new_v4(), at(10));
        assert!(run.is_open());
        assert_eq!(run.duration_secs(), None);

        run.end_time = Some(at(11));
        assert!(!run.is_open());
        assert_eq!(run.duration_secs(), Some(3600.0));
    }

    #[test]
    fn test_record_uses_wire_names() {
        let run_id = RunId::new_v4();
        let mut test = TestRecord::new(
            TestId::new_v4(),
            "login_test",
            TestParameters::new(),
            at(10),
            run_id,
        );
        test.status = Some(TestStatus::Failed);
        test.duration = Some(0.42);
        test.error_message = Some("assert False".to_owned());

        let json = serde_json::to_value(&test).unwrap();
        assert_eq!(json["test_run_id"], run_id.to_string());
        assert_eq!(json["test_status"], "FAILED");
        assert_eq!(json["error_exception"], "assert False");
        assert_eq!(json["duration"], 0.42);

        let back: TestRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, test);
    }
}
