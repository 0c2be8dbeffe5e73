// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Data model shared between the testrun reporter and collector.
//!
//! This crate contains the identifiers, records and request/response bodies
//! exchanged over the wire, along with the documented exit codes for the
//! collector binary. Both the client side (which emits lifecycle events) and the
//! server side (which persists them) depend on it, so that the two always agree
//! on the shape of the data.

mod api;
mod errors;
mod exit_codes;
mod ids;
mod parameters;
mod records;
mod status;
pub mod timestamp;

pub use api::*;
pub use errors::*;
pub use exit_codes::*;
pub use ids::*;
pub use parameters::*;
pub use records::*;
pub use status::*;
