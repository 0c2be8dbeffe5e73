// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use pretty_assertions::assert_eq;
use std::{
    sync::{
        Arc, Mutex,
        mpsc::{self, Receiver},
    },
    time::Duration,
};
use testrun_metadata::{ErrorKind, ParamValue, TestParameters, TestStatus};
use testrun_reporter::{
    DeliveryError, EventSink, Phase, PhaseReport, PhaseResult, Reporter, ReporterConfig,
    ReporterEvent,
};

#[derive(Clone, Default)]
struct RecordingSink {
    events: Arc<Mutex<Vec<ReporterEvent>>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<ReporterEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn deliver(&mut self, event: &ReporterEvent) -> Result<(), DeliveryError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct RejectingSink;

impl EventSink for RejectingSink {
    fn deliver(&mut self, _event: &ReporterEvent) -> Result<(), DeliveryError> {
        Err(DeliveryError::Rejected {
            status: 503,
            kind: Some(ErrorKind::StorageUnavailable),
            message: "record storage is unavailable".to_owned(),
        })
    }
}

/// Blocks on the first delivery until released.
struct GatedSink {
    gate: Option<Receiver<()>>,
}

impl EventSink for GatedSink {
    fn deliver(&mut self, _event: &ReporterEvent) -> Result<(), DeliveryError> {
        if let Some(gate) = self.gate.take() {
            _ = gate.recv();
        }
        Ok(())
    }
}

fn passed_call() -> PhaseReport {
    PhaseReport::new(Phase::Call, PhaseResult::Passed, Duration::from_millis(420))
}

#[test]
fn disabled_reporter_emits_nothing() {
    let reporter = Reporter::disabled();
    assert!(!reporter.is_enabled());
    assert!(reporter.start_session().is_none());
    assert_eq!(reporter.stats(), None);

    let config = ReporterConfig::default();
    let reporter = Reporter::from_config(&config).expect("disabled config is valid");
    assert!(!reporter.is_enabled());
}

#[test]
fn session_events_arrive_in_order() {
    let sink = RecordingSink::default();
    let reporter = Reporter::with_sink(Box::new(sink.clone()), 64);

    let session = reporter.start_session().expect("reporter is enabled");
    let mut first = reporter
        .start_test(&session, "test_first", TestParameters::new())
        .expect("reporter is enabled");
    first.record_phase(PhaseReport::new(Phase::Setup, PhaseResult::Passed, Duration::ZERO));
    first.record_phase(passed_call());
    first.record_phase(PhaseReport::new(Phase::Teardown, PhaseResult::Passed, Duration::ZERO));
    let first_id = first.test_id();
    reporter.finish_test(first);

    let mut second = reporter
        .start_test(&session, "test_second", TestParameters::new())
        .expect("reporter is enabled");
    second.record_phase(
        PhaseReport::new(Phase::Call, PhaseResult::Failed, Duration::from_millis(5))
            .with_message("assert 1 == 2"),
    );
    let second_id = second.test_id();
    reporter.finish_test(second);

    let run_id = session.run_id();
    assert!(reporter.finish_session(session), "queue drains");

    let events = sink.events();
    let names: Vec<_> = events.iter().map(ReporterEvent::name).collect();
    assert_eq!(
        names,
        vec![
            "create-run",
            "create-test",
            "finish-test",
            "create-test",
            "finish-test",
            "finish-run"
        ]
    );

    let ReporterEvent::CreateRun(create_run) = &events[0] else {
        panic!("first event is create-run");
    };
    assert_eq!(create_run.run_id, run_id);

    let ReporterEvent::CreateTest(create_first) = &events[1] else {
        panic!("second event is create-test");
    };
    assert_eq!(create_first.test_id, first_id);
    assert_eq!(create_first.test_run_id, run_id);
    assert_eq!(create_first.test_name, "test_first");

    let ReporterEvent::FinishTest { test_id, request } = &events[2] else {
        panic!("third event is finish-test");
    };
    assert_eq!(*test_id, first_id);
    assert_eq!(request.test_status, TestStatus::Passed);
    assert_eq!(request.duration, Some(0.42));
    assert_eq!(request.error_exception, None);

    let ReporterEvent::FinishTest { test_id, request } = &events[4] else {
        panic!("fifth event is finish-test");
    };
    assert_eq!(*test_id, second_id);
    assert_eq!(request.test_status, TestStatus::Failed);
    assert_eq!(request.error_exception.as_deref(), Some("assert 1 == 2"));

    let ReporterEvent::FinishRun { run_id: finished, request } = &events[5] else {
        panic!("last event is finish-run");
    };
    assert_eq!(*finished, run_id);
    assert!(request.finish_time >= create_run.start_time);

    let stats = reporter.stats().expect("reporter is enabled");
    assert_eq!(stats.delivered, 6);
    assert_eq!(stats.failed, 0);
}

#[test]
fn parameters_are_normalized_before_sending() {
    let sink = RecordingSink::default();
    let reporter = Reporter::with_sink(Box::new(sink.clone()), 8);
    let session = reporter.start_session().unwrap();

    let mut parameters = TestParameters::new();
    parameters.insert("ratio", f64::NAN);
    parameters.insert("name", "edge");
    let test = reporter.start_test(&session, "test_ratio", parameters).unwrap();
    reporter.finish_test(test);
    reporter.finish_session(session);

    let events = sink.events();
    let ReporterEvent::CreateTest(request) = &events[1] else {
        panic!("second event is create-test");
    };
    assert_eq!(request.test_parameters.get("ratio"), Some(&ParamValue::Null));
    assert_eq!(request.test_parameters.get("name"), Some(&ParamValue::from("edge")));

    // No phases were recorded.
    let ReporterEvent::FinishTest { request, .. } = &events[2] else {
        panic!("third event is finish-test");
    };
    assert_eq!(request.test_status, TestStatus::Unknown);
    assert_eq!(request.duration, None);
}

#[test]
fn delivery_failures_are_counted_not_raised() {
    let reporter = Reporter::with_sink(Box::new(RejectingSink), 8);
    let session = reporter.start_session().unwrap();
    let mut test = reporter
        .start_test(&session, "test_x", TestParameters::new())
        .unwrap();
    test.record_phase(passed_call());
    reporter.finish_test(test);
    assert!(reporter.finish_session(session));

    let stats = reporter.stats().unwrap();
    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.failed, 4);
    assert_eq!(stats.dropped, 0);
}

#[test]
fn full_queue_drops_events_without_blocking() {
    let (release, gate) = mpsc::channel();
    let mut reporter = Reporter::with_sink(Box::new(GatedSink { gate: Some(gate) }), 1);
    reporter.set_flush_timeout(Duration::from_secs(5));

    let session = reporter.start_session().unwrap();
    for n in 0..3 {
        let test = reporter
            .start_test(&session, format!("test_{n}"), TestParameters::new())
            .unwrap();
        drop(test);
    }

    // At most one event is being delivered and one is queued.
    let stats = reporter.stats().unwrap();
    assert!(stats.dropped >= 2, "stats: {stats:?}");

    release.send(()).unwrap();
    assert!(reporter.finish_session(session));
}
