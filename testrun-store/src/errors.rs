// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the run store.

use camino::Utf8PathBuf;
use std::{fmt, io};
use testrun_metadata::{ErrorKind, IdentifierParseError, RunId};
use thiserror::Error;

/// The kind of record an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordKind {
    /// A test run.
    Run,
    /// A single test.
    Test,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => write!(f, "test run"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// An error returned by a run store operation.
///
/// Mutations that fail never partially apply.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// A record with this identifier already exists.
    #[error("{entity} `{id}` already exists")]
    DuplicateKey {
        /// The kind of record.
        entity: RecordKind,
        /// The duplicated identifier.
        id: String,
    },

    /// The record does not exist.
    #[error("{entity} `{id}` not found")]
    NotFound {
        /// The kind of record.
        entity: RecordKind,
        /// The identifier that was looked up.
        id: String,
    },

    /// A test referenced a run that does not exist.
    #[error("test run `{run_id}` does not exist")]
    UnknownRun {
        /// The referenced run.
        run_id: RunId,
    },

    /// The record has already reached its terminal state.
    #[error("{entity} `{id}` has already finished")]
    AlreadyFinished {
        /// The kind of record.
        entity: RecordKind,
        /// The record's identifier.
        id: String,
    },

    /// An identifier was not well-formed.
    #[error(transparent)]
    InvalidIdentifier(#[from] IdentifierParseError),

    /// The request was malformed.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the request.
        message: String,
    },

    /// The store could not persist the mutation.
    #[error("record storage is unavailable")]
    StorageUnavailable(#[source] JournalError),
}

impl StoreError {
    pub(crate) fn duplicate(entity: RecordKind, id: impl fmt::Display) -> Self {
        Self::DuplicateKey {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn not_found(entity: RecordKind, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn already_finished(entity: RecordKind, id: impl fmt::Display) -> Self {
        Self::AlreadyFinished {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns the wire classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateKey { .. } => ErrorKind::DuplicateKey,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UnknownRun { .. } => ErrorKind::UnknownRun,
            Self::AlreadyFinished { .. } => ErrorKind::AlreadyFinished,
            Self::InvalidIdentifier(_) => ErrorKind::InvalidIdentifier,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
        }
    }
}

/// An error that occurred while reading or writing the store's files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JournalError {
    /// The store directory could not be created.
    #[error("error creating store directory `{path}`")]
    DirCreate {
        /// The directory.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The lock file could not be opened or locked.
    #[error("error acquiring lock on `{path}`")]
    Lock {
        /// The lock file.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// Another process holds the store lock.
    #[error("store at `{path}` is in use by another process (timed out after {timeout_secs}s)")]
    Locked {
        /// The lock file.
        path: Utf8PathBuf,
        /// How long we waited for the lock.
        timeout_secs: u64,
    },

    /// The journal could not be read or opened.
    #[error("error reading journal `{path}`")]
    Read {
        /// The journal file.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A journal line other than the last could not be parsed.
    #[error("journal `{path}` is corrupt at line {line}")]
    Parse {
        /// The journal file.
        path: Utf8PathBuf,
        /// The 1-based line number.
        line: usize,
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// A journal entry could not be applied on top of the loaded records.
    #[error("journal `{path}` entry {seq} could not be replayed")]
    Replay {
        /// The journal file.
        path: Utf8PathBuf,
        /// The entry's sequence number.
        seq: u64,
        /// Why the entry was rejected.
        #[source]
        error: Box<StoreError>,
    },

    /// A journal entry could not be serialized.
    #[error("error encoding journal entry")]
    Encode {
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// A journal entry could not be written.
    #[error("error writing journal `{path}`")]
    Write {
        /// The journal file.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The snapshot could not be opened or decompressed.
    #[error("error reading snapshot `{path}`")]
    SnapshotRead {
        /// The snapshot file.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The snapshot could not be deserialized.
    #[error("error deserializing snapshot `{path}`")]
    SnapshotDeserialize {
        /// The snapshot file.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The snapshot was written by a newer version.
    #[error(
        "snapshot `{path}` has format version {file_version}, \
         but this version only supports up to {max_supported_version}"
    )]
    SnapshotVersion {
        /// The snapshot file.
        path: Utf8PathBuf,
        /// The version found in the file.
        file_version: u32,
        /// The newest version this build understands.
        max_supported_version: u32,
    },

    /// The snapshot could not be written.
    #[error("error writing snapshot `{path}`")]
    SnapshotWrite {
        /// The snapshot file.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: atomicwrites::Error<io::Error>,
    },
}
