// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use testrun_metadata::{
    CreateRunRequest, CreateTestRequest, FinishRunRequest, FinishTestRequest, RunId, TestId,
};

/// A lifecycle event sent to the collector.
#[derive(Clone, Debug, PartialEq)]
pub enum ReporterEvent {
    /// A session started.
    CreateRun(CreateRunRequest),
    /// A session ended.
    FinishRun {
        /// The run that ended.
        run_id: RunId,
        /// The request body.
        request: FinishRunRequest,
    },
    /// A test started.
    CreateTest(CreateTestRequest),
    /// A test ended.
    FinishTest {
        /// The test that ended.
        test_id: TestId,
        /// The request body.
        request: FinishTestRequest,
    },
}

impl ReporterEvent {
    /// The collector route this event is posted to, relative to the base URL.
    pub fn path(&self) -> String {
        match self {
            Self::CreateRun(_) => "/runs".to_owned(),
            Self::FinishRun { run_id, .. } => format!("/runs/{run_id}/finish"),
            Self::CreateTest(_) => "/tests".to_owned(),
            Self::FinishTest { test_id, .. } => format!("/tests/{test_id}/finish"),
        }
    }

    /// A short name for log messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRun(_) => "create-run",
            Self::FinishRun { .. } => "finish-run",
            Self::CreateTest(_) => "create-test",
            Self::FinishTest { .. } => "finish-test",
        }
    }
}

impl fmt::Display for ReporterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateRun(request) => write!(f, "create-run {}", request.run_id),
            Self::FinishRun { run_id, .. } => write!(f, "finish-run {run_id}"),
            Self::CreateTest(request) => {
                write!(f, "create-test {} ({})", request.test_id, request.test_name)
            }
            Self::FinishTest { test_id, request } => {
                write!(f, "finish-test {test_id} ({})", request.test_status)
            }
        }
    }
}
