// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::outcome::{OutcomeAccumulator, PhaseReport};
use chrono::{DateTime, FixedOffset};
use testrun_metadata::{RunId, TestId};

/// State for one test session, returned by
/// [`Reporter::start_session`](crate::Reporter::start_session).
///
/// Passed back to the reporter for every test in the session and consumed by
/// [`Reporter::finish_session`](crate::Reporter::finish_session).
#[derive(Debug)]
pub struct SessionContext {
    run_id: RunId,
    started_at: DateTime<FixedOffset>,
}

impl SessionContext {
    pub(crate) fn new(run_id: RunId, started_at: DateTime<FixedOffset>) -> Self {
        Self { run_id, started_at }
    }

    /// The run this session reports to.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// When the session started.
    pub fn started_at(&self) -> DateTime<FixedOffset> {
        self.started_at
    }
}

/// State for one test, returned by
/// [`Reporter::start_test`](crate::Reporter::start_test).
///
/// Phase results are recorded here and sent once, when the context is consumed
/// by [`Reporter::finish_test`](crate::Reporter::finish_test). The context
/// cannot be cloned, so a test cannot be finished twice.
#[derive(Debug)]
pub struct TestContext {
    test_id: TestId,
    run_id: RunId,
    test_name: String,
    outcome: OutcomeAccumulator,
}

impl TestContext {
    pub(crate) fn new(test_id: TestId, run_id: RunId, test_name: String) -> Self {
        Self {
            test_id,
            run_id,
            test_name,
            outcome: OutcomeAccumulator::new(),
        }
    }

    /// The test's identifier.
    pub fn test_id(&self) -> TestId {
        self.test_id
    }

    /// The run the test belongs to.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The test's name.
    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /// Records the result of one phase. Nothing is sent until the test
    /// finishes.
    pub fn record_phase(&mut self, report: PhaseReport) {
        self.outcome.record(report);
    }

    pub(crate) fn into_outcome(self) -> (TestId, String, OutcomeAccumulator) {
        (self.test_id, self.test_name, self.outcome)
    }
}
