// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! The test-runner side of testrun.
//!
//! A test-runner integration calls into a [`Reporter`] from its lifecycle
//! hooks. The reporter turns those calls into collector events and delivers
//! them in the background, so that a slow or unreachable collector never fails
//! or stalls the test run.
//!
//! ```no_run
//! use std::time::Duration;
//! use testrun_metadata::TestParameters;
//! use testrun_reporter::{Phase, PhaseReport, PhaseResult, Reporter, ReporterConfig};
//!
//! let config = ReporterConfig::load(None)?;
//! let reporter = Reporter::from_config(&config)?;
//!
//! if let Some(session) = reporter.start_session() {
//!     if let Some(mut test) = reporter.start_test(&session, "login_test", TestParameters::new()) {
//!         test.record_phase(PhaseReport::new(
//!             Phase::Call,
//!             PhaseResult::Passed,
//!             Duration::from_millis(420),
//!         ));
//!         reporter.finish_test(test);
//!     }
//!     reporter.finish_session(session);
//! }
//! # Ok::<(), testrun_reporter::ReporterConfigError>(())
//! ```

mod config;
mod context;
mod delivery;
mod events;
mod outcome;
mod reporter;

pub use config::*;
pub use context::*;
pub use delivery::*;
pub use events::*;
pub use outcome::*;
pub use reporter::*;
