// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    config::{ReporterConfig, ReporterConfigError},
    context::{SessionContext, TestContext},
    delivery::{Delivery, DeliveryStats, EventSink, HttpSink},
    events::ReporterEvent,
};
use chrono::{DateTime, FixedOffset, Local};
use std::time::Duration;
use testrun_metadata::{
    CreateRunRequest, CreateTestRequest, FinishRunRequest, FinishTestRequest, RunId, TestId,
    TestParameters,
};
use tracing::{debug, info, warn};

const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Reports test lifecycle events to a collector.
///
/// A reporter is either enabled, with a delivery thread behind it, or
/// disabled. When disabled every method does nothing and the `start_*`
/// methods return `None`, so callers skip the rest of that scope.
///
/// The expected call sequence for a session is:
///
/// 1. [`start_session`](Self::start_session) once.
/// 2. For each test: [`start_test`](Self::start_test), then
///    [`TestContext::record_phase`] for each phase, then
///    [`finish_test`](Self::finish_test).
/// 3. [`finish_session`](Self::finish_session) once.
///
/// Delivery failures never surface here: they are logged and counted in
/// [`stats`](Self::stats).
#[derive(Debug)]
pub struct Reporter {
    delivery: Option<Delivery>,
    flush_timeout: Duration,
}

impl Reporter {
    /// Creates a reporter that does nothing.
    pub fn disabled() -> Self {
        Self {
            delivery: None,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        }
    }

    /// Creates a reporter from configuration.
    pub fn from_config(config: &ReporterConfig) -> Result<Self, ReporterConfigError> {
        if !config.reporting_enabled {
            debug!("test reporting is disabled");
            return Ok(Self::disabled());
        }
        let api_url = config
            .reporting_api_url
            .as_deref()
            .ok_or(ReporterConfigError::MissingApiUrl)?;
        if config.queue_capacity == 0 {
            return Err(ReporterConfigError::ZeroQueueCapacity);
        }

        info!(api_url, "reporting test results");
        let sink = HttpSink::new(
            api_url,
            config.reporting_auth_token.as_deref(),
            config.request_timeout,
        );
        Ok(Self::with_sink(Box::new(sink), config.queue_capacity))
    }

    /// Creates an enabled reporter that sends events to `sink`.
    pub fn with_sink(sink: Box<dyn EventSink>, queue_capacity: usize) -> Self {
        Self {
            delivery: Some(Delivery::spawn(sink, queue_capacity.max(1))),
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
        }
    }

    /// Sets how long [`finish_session`](Self::finish_session) waits for queued
    /// events to be sent.
    pub fn set_flush_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.flush_timeout = timeout;
        self
    }

    /// Returns true if events are being sent.
    pub fn is_enabled(&self) -> bool {
        self.delivery.is_some()
    }

    /// Returns delivery counts, or `None` if reporting is disabled.
    pub fn stats(&self) -> Option<DeliveryStats> {
        self.delivery.as_ref().map(Delivery::stats)
    }

    /// Starts a session, creating a new run.
    pub fn start_session(&self) -> Option<SessionContext> {
        let delivery = self.delivery.as_ref()?;
        let run_id = RunId::new_v4();
        let start_time = now();

        delivery.send(ReporterEvent::CreateRun(CreateRunRequest { run_id, start_time }));
        debug!(%run_id, "started test session");
        Some(SessionContext::new(run_id, start_time))
    }

    /// Starts a test within a session.
    ///
    /// NaN values in `parameters` are sent as null.
    pub fn start_test(
        &self,
        session: &SessionContext,
        test_name: impl Into<String>,
        parameters: TestParameters,
    ) -> Option<TestContext> {
        let delivery = self.delivery.as_ref()?;
        let test_id = TestId::new_v4();
        let test_name = test_name.into();
        let run_id = session.run_id();

        delivery.send(ReporterEvent::CreateTest(CreateTestRequest {
            test_id,
            test_name: test_name.clone(),
            test_parameters: parameters.normalized(),
            timestamp: now(),
            test_run_id: run_id,
        }));
        Some(TestContext::new(test_id, run_id, test_name))
    }

    /// Finishes a test, sending its classified outcome.
    pub fn finish_test(&self, test: TestContext) {
        let Some(delivery) = &self.delivery else {
            return;
        };
        let (test_id, test_name, outcome) = test.into_outcome();
        if outcome.is_empty() {
            warn!(%test_id, %test_name, "test finished without any recorded phase");
        }
        let outcome = outcome.classify();

        debug!(%test_id, %test_name, status = %outcome.status, "finished test");
        delivery.send(ReporterEvent::FinishTest {
            test_id,
            request: FinishTestRequest {
                test_id: Some(test_id),
                test_status: outcome.status,
                duration: outcome.duration,
                error_exception: outcome.error_message,
            },
        });
    }

    /// Finishes a session, then waits for queued events to be sent.
    ///
    /// Returns false if some events were still queued when the flush timeout
    /// elapsed.
    pub fn finish_session(&self, session: SessionContext) -> bool {
        let Some(delivery) = &self.delivery else {
            return true;
        };
        let run_id = session.run_id();
        delivery.send(ReporterEvent::FinishRun {
            run_id,
            request: FinishRunRequest {
                run_id: Some(run_id),
                finish_time: now(),
            },
        });

        let drained = delivery.flush(self.flush_timeout);
        let stats = delivery.stats();
        if drained {
            debug!(%run_id, ?stats, "finished test session");
        } else {
            warn!(
                %run_id,
                timeout = ?self.flush_timeout,
                ?stats,
                "timed out waiting for test events to be delivered",
            );
        }
        drained
    }
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}
