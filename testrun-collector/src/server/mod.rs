// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The collector's HTTP API.
//!
//! Handlers are thin: they parse the request, call into the [`RunStore`] and
//! map store errors to statuses. Mutations write the journal synchronously,
//! so they run on the blocking pool; reads only touch memory and stay on the
//! worker threads.

mod api_error;
mod routes;

use axum::{
    Router,
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use std::{future::Future, io, sync::Arc};
use testrun_store::RunStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, trace};

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    store: Arc<RunStore>,
}

/// Builds the router serving `store`.
pub fn router(store: Arc<RunStore>) -> Router {
    Router::new()
        .route("/runs", post(routes::create_run))
        .route("/runs/{run_id}", get(routes::tests_for_run))
        .route("/runs/{run_id}/finish", post(routes::finish_run))
        .route("/tests", post(routes::create_test))
        .route("/tests/{test_id}/finish", post(routes::finish_test))
        .route("/full-report", get(routes::full_report))
        .route("/health", get(routes::health))
        .fallback(routes::fallback)
        .with_state(AppState { store })
        .layer(middleware::from_fn(note_bearer_token))
        .layer(TraceLayer::new_for_http())
}

/// Serves the API on `listener` until `shutdown` resolves, then waits for
/// in-flight requests to finish.
pub async fn serve(
    listener: TcpListener,
    store: Arc<RunStore>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "collector listening");
    }
    axum::serve(listener, router(store))
        .with_graceful_shutdown(shutdown)
        .await
}

// Tokens are accepted but not validated.
async fn note_bearer_token(request: Request, next: Next) -> Response {
    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Bearer "));
    trace!(bearer, path = request.uri().path(), "received request");
    next.run(request).await
}
