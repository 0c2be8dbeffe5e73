// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    AppState,
    api_error::{ApiError, parse_body},
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, Uri},
};
use testrun_metadata::{
    CreateRunRequest, CreateTestRequest, ErrorKind, FinishRunRequest, FinishTestRequest,
    FullReport, HealthStatus, TestRecord, TestRunRecord, TestsForRun, parse_run_id, parse_test_id,
};
use testrun_store::{NewTest, RunStore, StoreError, TestOutcome};
use tracing::error;

type ApiResult<T> = Result<T, ApiError>;

/// Runs a store mutation on the blocking pool.
async fn mutate<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&RunStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || f(&store)).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(join_error) => {
            error!(error = %join_error, "store mutation task failed");
            Err(ApiError::new(
                ErrorKind::StorageUnavailable,
                "record storage is unavailable",
            ))
        }
    }
}

pub(super) async fn create_run(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<TestRunRecord>)> {
    let CreateRunRequest { run_id, start_time } = parse_body(&body)?;
    let record = mutate(&state, move |store| store.create_run(run_id, start_time)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(super) async fn finish_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<TestRunRecord>> {
    let run_id = parse_run_id(&run_id).map_err(StoreError::from)?;
    let FinishRunRequest {
        run_id: body_run_id,
        finish_time,
    } = parse_body(&body)?;
    if let Some(body_run_id) = body_run_id.filter(|id| *id != run_id) {
        return Err(ApiError::invalid_request(format!(
            "body run_id `{body_run_id}` does not match path run_id `{run_id}`"
        )));
    }

    let record = mutate(&state, move |store| store.finish_run(run_id, finish_time)).await?;
    Ok(Json(record))
}

pub(super) async fn create_test(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<TestRecord>)> {
    let CreateTestRequest {
        test_id,
        test_name,
        test_parameters,
        timestamp,
        test_run_id,
    } = parse_body(&body)?;

    let new_test = NewTest {
        test_id,
        test_name,
        test_parameters,
        timestamp,
        run_id: test_run_id,
    };
    let record = mutate(&state, move |store| store.create_test(new_test)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(super) async fn finish_test(
    State(state): State<AppState>,
    Path(test_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<TestRecord>> {
    let test_id = parse_test_id(&test_id).map_err(StoreError::from)?;
    let FinishTestRequest {
        test_id: body_test_id,
        test_status,
        duration,
        error_exception,
    } = parse_body(&body)?;
    if let Some(body_test_id) = body_test_id.filter(|id| *id != test_id) {
        return Err(ApiError::invalid_request(format!(
            "body test_id `{body_test_id}` does not match path test_id `{test_id}`"
        )));
    }

    let outcome = TestOutcome {
        status: test_status,
        duration,
        error_message: error_exception,
    };
    let record = mutate(&state, move |store| store.finish_test(test_id, outcome)).await?;
    Ok(Json(record))
}

pub(super) async fn tests_for_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<TestsForRun>> {
    let run_id = parse_run_id(&run_id).map_err(StoreError::from)?;
    let tests = state.store.tests_for_run(run_id);
    Ok(Json(TestsForRun { run_id, tests }))
}

pub(super) async fn full_report(State(state): State<AppState>) -> Json<FullReport> {
    Json(state.store.full_report())
}

pub(super) async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    })
}

pub(super) async fn fallback(uri: Uri) -> ApiError {
    ApiError::new(ErrorKind::NotFound, format!("no route for `{}`", uri.path()))
}
