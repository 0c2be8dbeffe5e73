// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The testrun collector: an HTTP service that records test runs and tests.
//!
//! This crate is mainly a binary; the library exists so the command-line
//! interface and the HTTP router can be exercised from tests.

mod config;
mod dispatch;
mod errors;
mod output;
mod server;
mod show;

pub use config::{CollectorConfig, CollectorConfigError, DEFAULT_COLLECTOR_CONFIG, LoadedConfig};
pub use dispatch::CollectorApp;
#[doc(hidden)]
pub use errors::ExpectedError;
pub use output::{LOG_ENV, OutputContext};
pub use server::{router, serve};
