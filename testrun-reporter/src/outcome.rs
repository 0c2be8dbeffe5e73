// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning per-phase results into a single test outcome.
//!
//! A test runner reports up to three phases per test: setup, call and
//! teardown. [`OutcomeAccumulator`] collects those reports and
//! [`OutcomeAccumulator::classify`] maps them to one [`TestStatus`]:
//!
//! | Recorded phase outcomes               | Status    |
//! |---------------------------------------|-----------|
//! | setup skipped                         | `SKIPPED` |
//! | setup failed                          | `ERROR`   |
//! | call passed, teardown not failed      | `PASSED`  |
//! | call failed, expected failure         | `SKIPPED` |
//! | call failed                           | `FAILED`  |
//! | call skipped                          | `SKIPPED` |
//! | call passed, teardown failed          | `ERROR`   |
//! | no call, teardown failed              | `ERROR`   |
//! | nothing else recorded                 | `UNKNOWN` |
//!
//! Rows are checked top to bottom. The duration is the call phase's when the
//! call ran, otherwise the sum of the recorded phases.

use std::time::Duration;
use testrun_metadata::TestStatus;

/// A phase of a single test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Fixtures and other preparation.
    Setup,
    /// The test body.
    Call,
    /// Cleanup after the test body.
    Teardown,
}

/// The result of one phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseResult {
    /// The phase completed successfully.
    Passed,
    /// The phase raised an error.
    Failed,
    /// The phase asked for the test to be skipped.
    Skipped,
}

/// What a test runner reported about one phase.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseReport {
    /// Which phase this is.
    pub phase: Phase,
    /// How the phase ended.
    pub result: PhaseResult,
    /// How long the phase took.
    pub duration: Duration,
    /// The failure's message, if any.
    pub message: Option<String>,
    /// True if the test was marked as expected to fail.
    pub expected_failure: bool,
}

impl PhaseReport {
    /// Creates a report with no message that was not expected to fail.
    pub fn new(phase: Phase, result: PhaseResult, duration: Duration) -> Self {
        Self {
            phase,
            result,
            duration,
            message: None,
            expected_failure: false,
        }
    }

    /// Attaches a failure message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Marks the test as expected to fail.
    pub fn expected_failure(mut self) -> Self {
        self.expected_failure = true;
        self
    }
}

/// The classified outcome of a test.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedOutcome {
    /// The test's status.
    pub status: TestStatus,
    /// How long the test took, in seconds.
    pub duration: Option<f64>,
    /// The message from the phase that caused a failure-class status.
    pub error_message: Option<String>,
}

/// Collects phase reports for one test.
///
/// A later report for the same phase replaces the earlier one.
#[derive(Clone, Debug, Default)]
pub struct OutcomeAccumulator {
    setup: Option<PhaseReport>,
    call: Option<PhaseReport>,
    teardown: Option<PhaseReport>,
}

impl OutcomeAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a phase report.
    pub fn record(&mut self, report: PhaseReport) {
        let slot = match report.phase {
            Phase::Setup => &mut self.setup,
            Phase::Call => &mut self.call,
            Phase::Teardown => &mut self.teardown,
        };
        *slot = Some(report);
    }

    /// Returns true if no phase has been recorded.
    pub fn is_empty(&self) -> bool {
        self.setup.is_none() && self.call.is_none() && self.teardown.is_none()
    }

    /// Maps the recorded phases to a single outcome.
    pub fn classify(&self) -> ClassifiedOutcome {
        let (status, error_message) = self.status();
        ClassifiedOutcome {
            status,
            duration: self.duration(),
            error_message: error_message.filter(|_| status.is_failure()),
        }
    }

    fn status(&self) -> (TestStatus, Option<String>) {
        let failed_teardown = self
            .teardown
            .as_ref()
            .filter(|teardown| teardown.result == PhaseResult::Failed);

        if let Some(setup) = &self.setup {
            match setup.result {
                PhaseResult::Skipped => return (TestStatus::Skipped, None),
                PhaseResult::Failed => return (TestStatus::Error, setup.message.clone()),
                PhaseResult::Passed => {}
            }
        }

        match &self.call {
            Some(call) => match call.result {
                PhaseResult::Failed if call.expected_failure => (TestStatus::Skipped, None),
                PhaseResult::Failed => (TestStatus::Failed, call.message.clone()),
                PhaseResult::Skipped => (TestStatus::Skipped, None),
                PhaseResult::Passed => match failed_teardown {
                    Some(teardown) => (TestStatus::Error, teardown.message.clone()),
                    None => (TestStatus::Passed, None),
                },
            },
            None => match failed_teardown {
                Some(teardown) => (TestStatus::Error, teardown.message.clone()),
                None => (TestStatus::Unknown, None),
            },
        }
    }

    fn duration(&self) -> Option<f64> {
        if let Some(call) = &self.call {
            return Some(call.duration.as_secs_f64());
        }
        [&self.setup, &self.teardown]
            .into_iter()
            .flatten()
            .map(|report| report.duration)
            .reduce(|a, b| a + b)
            .map(|total| total.as_secs_f64())
    }
}
