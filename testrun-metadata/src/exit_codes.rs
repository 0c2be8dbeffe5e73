// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `testrun-collector` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum TestrunExitCode {}

impl TestrunExitCode {
    /// No errors occurred and the collector exited normally.
    pub const OK: i32 = 0;

    /// A user issue happened while setting up a collector invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// The record store could not be opened, read or written.
    pub const STORE_ERROR: i32 = 97;

    /// The HTTP server could not bind its listen address or failed while serving.
    pub const SERVER_ERROR: i32 = 98;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
