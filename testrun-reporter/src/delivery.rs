// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fire-and-forget event delivery.
//!
//! Events are queued on a bounded channel and sent by a single background
//! thread, so events from one session reach the collector in the order they
//! were produced. Nothing here ever returns a delivery failure to the caller:
//! failures are logged and counted.

use crate::events::ReporterEvent;
use debug_ignore::DebugIgnore;
use serde::Serialize;
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
        mpsc::{self, Receiver, SyncSender, TrySendError},
    },
    thread,
    time::{Duration, Instant},
};
use testrun_metadata::{ApiErrorBody, ErrorKind};
use thiserror::Error;
use tracing::{debug, warn};

/// Somewhere reporter events can be sent.
pub trait EventSink: Send {
    /// Delivers one event.
    fn deliver(&mut self, event: &ReporterEvent) -> Result<(), DeliveryError>;
}

/// An error that occurred while delivering an event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeliveryError {
    /// The request could not be sent or no response was received.
    #[error("request to {url} failed")]
    Transport {
        /// The request URL.
        url: String,
        /// The underlying error.
        #[source]
        error: Box<ureq::Error>,
    },

    /// The collector answered with a non-success status.
    #[error(
        "collector rejected request with status {status}{}: {message}",
        .kind.map(|kind| format!(" ({kind})")).unwrap_or_default(),
    )]
    Rejected {
        /// The HTTP status code.
        status: u16,
        /// The error classification, if the body had one.
        kind: Option<ErrorKind>,
        /// The error message, or the raw body.
        message: String,
    },
}

/// Sends events to a collector over HTTP.
#[derive(Debug)]
pub struct HttpSink {
    agent: DebugIgnore<ureq::Agent>,
    base_url: String,
    auth_header: DebugIgnore<Option<String>>,
}

impl HttpSink {
    /// Creates a sink posting to `base_url`.
    pub fn new(base_url: &str, auth_token: Option<&str>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent: DebugIgnore(agent),
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth_header: DebugIgnore(auth_token.map(|token| format!("Bearer {token}"))),
        }
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<(), DeliveryError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.agent.post(url.as_str());
        if let Some(auth_header) = &*self.auth_header {
            request = request.header("Authorization", auth_header);
        }

        let mut response = request
            .send_json(body)
            .map_err(|error| DeliveryError::Transport {
                url: url.clone(),
                error: Box::new(error),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.body_mut().read_to_string().unwrap_or_default();
        let (kind, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(error_body) => (Some(error_body.error.kind), error_body.error.message),
            Err(_) => (None, body),
        };
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            kind,
            message,
        })
    }
}

impl EventSink for HttpSink {
    fn deliver(&mut self, event: &ReporterEvent) -> Result<(), DeliveryError> {
        let path = event.path();
        match event {
            ReporterEvent::CreateRun(request) => self.post(&path, request),
            ReporterEvent::FinishRun { request, .. } => self.post(&path, request),
            ReporterEvent::CreateTest(request) => self.post(&path, request),
            ReporterEvent::FinishTest { request, .. } => self.post(&path, request),
        }
    }
}

/// Counts of what happened to queued events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Events the collector accepted.
    pub delivered: u64,
    /// Events that could not be delivered.
    pub failed: u64,
    /// Events dropped because the queue was full.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct AtomicStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl AtomicStats {
    fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

enum Message {
    Event(ReporterEvent),
    Flush(SyncSender<()>),
}

/// A handle to the background delivery thread.
///
/// Dropping the handle lets the thread finish whatever is queued and exit
/// without waiting for it.
#[derive(Debug)]
pub struct Delivery {
    sender: DebugIgnore<SyncSender<Message>>,
    stats: Arc<AtomicStats>,
}

impl Delivery {
    /// Spawns the delivery thread.
    pub fn spawn(sink: Box<dyn EventSink>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        let stats = Arc::new(AtomicStats::default());
        let worker_stats = stats.clone();
        let spawned = thread::Builder::new()
            .name("testrun-delivery".to_owned())
            .spawn(move || run_worker(sink, receiver, &worker_stats));
        if let Err(error) = spawned {
            // The receiver went away with the closure, so every send will be
            // counted as dropped.
            warn!(%error, "failed to spawn delivery thread, events will be dropped");
        }

        Self {
            sender: DebugIgnore(sender),
            stats,
        }
    }

    /// Queues an event without blocking. If the queue is full the event is
    /// dropped with a warning.
    pub fn send(&self, event: ReporterEvent) {
        let Err(error) = self.sender.try_send(Message::Event(event)) else {
            return;
        };
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        let (reason, message) = match error {
            TrySendError::Full(message) => ("delivery queue is full", message),
            TrySendError::Disconnected(message) => ("delivery thread has exited", message),
        };
        if let Message::Event(event) = message {
            warn!(%event, reason, "dropping reporter event");
        }
    }

    /// Waits until every event queued so far has been handled, or until
    /// `timeout` elapses. Returns true if the queue drained in time.
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (ack_sender, ack_receiver) = mpsc::sync_channel(1);

        let mut message = Message::Flush(ack_sender);
        loop {
            match self.sender.try_send(message) {
                Ok(()) => break,
                Err(TrySendError::Full(returned)) => {
                    if Instant::now() >= deadline {
                        return false;
                    }
                    message = returned;
                    thread::sleep(Duration::from_millis(5));
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        ack_receiver.recv_timeout(remaining).is_ok()
    }

    /// Returns delivery counts so far.
    pub fn stats(&self) -> DeliveryStats {
        self.stats.snapshot()
    }
}

fn run_worker(mut sink: Box<dyn EventSink>, receiver: Receiver<Message>, stats: &AtomicStats) {
    for message in receiver {
        match message {
            Message::Event(event) => match sink.deliver(&event) {
                Ok(()) => {
                    stats.delivered.fetch_add(1, Ordering::Relaxed);
                    debug!(%event, "delivered event");
                }
                Err(error) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(%event, error = %DisplayErrorChain(&error), "failed to deliver event");
                }
            },
            Message::Flush(ack) => {
                // The flusher may have given up already.
                _ = ack.send(());
            }
        }
    }
}

struct DisplayErrorChain<'a>(&'a (dyn std::error::Error + 'static));

impl std::fmt::Display for DisplayErrorChain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(error) = source {
            write!(f, ": {error}")?;
            source = error.source();
        }
        Ok(())
    }
}
