// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A reporter talking to a real collector over HTTP.

use pretty_assertions::assert_eq;
use std::{sync::Arc, time::Duration};
use testrun_metadata::{ParamValue, TestParameters, TestStatus};
use testrun_reporter::{Phase, PhaseReport, PhaseResult, Reporter, ReporterConfig};
use testrun_store::RunStore;
use tokio::sync::oneshot;

#[test]
fn reporter_session_is_recorded() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap();
    let store = Arc::new(RunStore::in_memory());

    let listener = runtime
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = runtime.spawn(testrun_collector::serve(listener, store.clone(), async move {
        _ = stopped.await;
    }));

    let config = ReporterConfig {
        reporting_enabled: true,
        reporting_api_url: Some(format!("http://{addr}")),
        reporting_auth_token: Some("secret".to_owned()),
        ..ReporterConfig::default()
    };
    let reporter = Reporter::from_config(&config).unwrap();

    let session = reporter.start_session().unwrap();
    let run_id = session.run_id();

    let mut passing = reporter
        .start_test(&session, "test_passes", TestParameters::new())
        .unwrap();
    passing.record_phase(PhaseReport::new(
        Phase::Call,
        PhaseResult::Passed,
        Duration::from_millis(420),
    ));
    reporter.finish_test(passing);

    let mut params = TestParameters::new();
    params.insert("ratio", f64::NAN);
    let mut broken = reporter.start_test(&session, "test_fixture", params).unwrap();
    broken.record_phase(
        PhaseReport::new(Phase::Setup, PhaseResult::Failed, Duration::from_millis(3))
            .with_message("fixture raised"),
    );
    reporter.finish_test(broken);

    assert!(reporter.finish_session(session), "all events delivered");
    let stats = reporter.stats().unwrap();
    assert_eq!((stats.delivered, stats.failed, stats.dropped), (6, 0, 0));

    let run = store.get_run(&run_id.to_string()).unwrap();
    assert!(!run.is_open());

    let tests = store.tests_for_run(run_id);
    let mut outcomes: Vec<_> = tests
        .iter()
        .map(|test| (test.test_name.as_str(), test.status, test.duration))
        .collect();
    outcomes.sort_by_key(|(name, _, _)| *name);
    assert_eq!(
        outcomes,
        vec![
            ("test_fixture", Some(TestStatus::Error), Some(0.003)),
            ("test_passes", Some(TestStatus::Passed), Some(0.42)),
        ]
    );

    let broken = tests
        .iter()
        .find(|test| test.test_name == "test_fixture")
        .unwrap();
    assert_eq!(broken.error_message.as_deref(), Some("fixture raised"));
    assert_eq!(broken.test_parameters.get("ratio"), Some(&ParamValue::Null));

    stop.send(()).unwrap();
    runtime.block_on(server).unwrap().unwrap();
}

#[test]
fn unreachable_collector_does_not_fail_the_session() {
    let config = ReporterConfig {
        reporting_enabled: true,
        // Nothing listens on the discard port.
        reporting_api_url: Some("http://127.0.0.1:9".to_owned()),
        request_timeout: Duration::from_millis(200),
        ..ReporterConfig::default()
    };
    let reporter = Reporter::from_config(&config).unwrap();

    let session = reporter.start_session().unwrap();
    let test = reporter
        .start_test(&session, "test_offline", TestParameters::new())
        .unwrap();
    reporter.finish_test(test);
    assert!(reporter.finish_session(session));

    let stats = reporter.stats().unwrap();
    assert_eq!(stats.delivered, 0);
    assert_eq!(stats.failed, 4);
}
