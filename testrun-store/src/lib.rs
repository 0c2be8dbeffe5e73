// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! The record store behind the testrun collector.
//!
//! [`RunStore`] holds test runs and the tests that belong to them. It accepts
//! lifecycle events from many concurrent reporters, each of which may arrive
//! late, twice, or never. Every mutation is a single-record transaction; see
//! [`StoreError`] for how conflicting or dangling events are reported.
//!
//! A store is either purely in-memory ([`RunStore::in_memory`]) or backed by a
//! directory ([`RunStore::open`]) holding a journal and a compressed snapshot.

mod errors;
mod journal;
mod snapshot;
mod store;

pub use errors::*;
pub use store::*;
