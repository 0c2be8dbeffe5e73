// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compressed point-in-time snapshots of every record.

use crate::errors::JournalError;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::{fs::File, io};
use testrun_metadata::{TestRecord, TestRunRecord};

pub(crate) static SNAPSHOT_FILE_NAME: &str = "records.json.zst";

/// The current format version of the snapshot file.
///
/// Bump this when making incompatible changes to the snapshot layout.
pub(crate) const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub(crate) format_version: u32,
    /// Journal entries up to and including this sequence number are already
    /// reflected in this snapshot.
    pub(crate) last_seq: u64,
    #[serde(default)]
    pub(crate) runs: Vec<TestRunRecord>,
    #[serde(default)]
    pub(crate) tests: Vec<TestRecord>,
}

impl Snapshot {
    pub(crate) fn new(last_seq: u64, runs: Vec<TestRunRecord>, tests: Vec<TestRecord>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            last_seq,
            runs,
            tests,
        }
    }
}

/// Reads the snapshot in `store_dir`, if there is one.
pub(crate) fn read_snapshot(store_dir: &Utf8Path) -> Result<Option<Snapshot>, JournalError> {
    let path = store_dir.join(SNAPSHOT_FILE_NAME);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(JournalError::SnapshotRead { path, error }),
    };

    let decoder = zstd::stream::Decoder::new(file).map_err(|error| JournalError::SnapshotRead {
        path: path.clone(),
        error,
    })?;
    let snapshot: Snapshot =
        serde_json::from_reader(decoder).map_err(|error| JournalError::SnapshotDeserialize {
            path: path.clone(),
            error,
        })?;

    if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
        return Err(JournalError::SnapshotVersion {
            path,
            file_version: snapshot.format_version,
            max_supported_version: SNAPSHOT_FORMAT_VERSION,
        });
    }
    Ok(Some(snapshot))
}

/// Atomically replaces the snapshot in `store_dir`.
pub(crate) fn write_snapshot(store_dir: &Utf8Path, snapshot: &Snapshot) -> Result<(), JournalError> {
    let path = store_dir.join(SNAPSHOT_FILE_NAME);

    atomicwrites::AtomicFile::new(&path, atomicwrites::AllowOverwrite)
        .write(|file| {
            let mut encoder = zstd::stream::Encoder::new(file, 3)?;
            serde_json::to_writer(&mut encoder, snapshot)?;
            encoder.finish()?;
            Ok(())
        })
        .map_err(|error| JournalError::SnapshotWrite { path, error })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use chrono::{FixedOffset, TimeZone};
    use testrun_metadata::RunId;

    #[test]
    fn missing_snapshot_is_none() {
        let dir = Utf8TempDir::new().unwrap();
        assert!(read_snapshot(dir.path()).unwrap().is_none());
    }

    #[test]
    fn write_then_read() {
        let dir = Utf8TempDir::new().unwrap();
        let start_time = FixedOffset::east_opt(-5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 4, 27, 10, 0, 0)
            .unwrap();
        let run = TestRunRecord::new(RunId::new_v4(), start_time);
        write_snapshot(dir.path(), &Snapshot::new(9, vec![run.clone()], Vec::new())).unwrap();

        let snapshot = read_snapshot(dir.path()).unwrap().expect("snapshot was written");
        assert_eq!(snapshot.last_seq, 9);
        assert_eq!(snapshot.runs, vec![run]);
        assert!(snapshot.tests.is_empty());
    }

    #[test]
    fn newer_format_is_rejected() {
        let dir = Utf8TempDir::new().unwrap();
        let mut snapshot = Snapshot::new(0, Vec::new(), Vec::new());
        snapshot.format_version = SNAPSHOT_FORMAT_VERSION + 1;
        write_snapshot(dir.path(), &snapshot).unwrap();

        let error = read_snapshot(dir.path()).unwrap_err();
        assert!(
            matches!(error, JournalError::SnapshotVersion { file_version, .. } if file_version == SNAPSHOT_FORMAT_VERSION + 1),
            "unexpected error: {error:?}"
        );
    }
}
