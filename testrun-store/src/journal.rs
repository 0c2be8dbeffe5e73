// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The append-only mutation journal.
//!
//! Every successful mutation is written to `journal.jsonl` as one JSON object
//! per line before it becomes visible in memory. Each line carries a sequence
//! number so that entries already folded into a snapshot can be skipped on
//! replay.

use crate::errors::JournalError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
};
use testrun_metadata::{RunId, TestId, TestRecord, TestRunRecord, TestStatus};
use tracing::warn;

pub(crate) static JOURNAL_FILE_NAME: &str = "journal.jsonl";

/// A single mutation, as recorded in the journal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub(crate) enum JournalEntry {
    RunCreated {
        run: TestRunRecord,
    },
    RunFinished {
        run_id: RunId,
        end_time: chrono::DateTime<chrono::FixedOffset>,
    },
    TestCreated {
        test: TestRecord,
    },
    TestFinished {
        test_id: TestId,
        status: TestStatus,
        duration: Option<f64>,
        error_message: Option<String>,
    },
}

#[derive(Serialize)]
struct JournalLineRef<'a> {
    seq: u64,
    entry: &'a JournalEntry,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JournalLine {
    pub(crate) seq: u64,
    pub(crate) entry: JournalEntry,
}

#[derive(Debug)]
pub(crate) struct Journal {
    path: Utf8PathBuf,
    file: File,
    len: u64,
    next_seq: u64,
}

impl Journal {
    /// Reads every complete entry from the journal in `store_dir`, then opens
    /// it for appending.
    ///
    /// A final line without a trailing newline is the remnant of an
    /// interrupted write: it is dropped with a warning and the file is
    /// truncated to the last complete entry. A newline-terminated line that
    /// does not parse is corruption and an error, wherever it appears.
    pub(crate) fn open(store_dir: &Utf8Path) -> Result<(Self, Vec<JournalLine>), JournalError> {
        let path = store_dir.join(JOURNAL_FILE_NAME);
        let contents = match std::fs::read(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(JournalError::Read { path, error }),
        };

        let (lines, valid_len) = parse_lines(&path, &contents)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|error| JournalError::Read {
                path: path.clone(),
                error,
            })?;
        if valid_len < contents.len() {
            warn!(
                journal = %path,
                discarded_bytes = contents.len() - valid_len,
                "ignoring incomplete final journal entry",
            );
            file.set_len(valid_len as u64)
                .map_err(|error| JournalError::Write {
                    path: path.clone(),
                    error,
                })?;
        }

        let next_seq = lines.last().map_or(1, |line| line.seq + 1);
        let journal = Self {
            path,
            file,
            len: valid_len as u64,
            next_seq,
        };
        Ok((journal, lines))
    }

    pub(crate) fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The sequence number of the most recently written entry, or 0.
    pub(crate) fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }

    /// Ensures the next entry is numbered after `seq`.
    pub(crate) fn advance_past(&mut self, seq: u64) {
        self.next_seq = self.next_seq.max(seq + 1);
    }

    /// Appends an entry, returning its sequence number.
    ///
    /// On failure the file is cut back to its previous length so that a
    /// partial line never precedes later entries.
    pub(crate) fn append(&mut self, entry: &JournalEntry) -> Result<u64, JournalError> {
        let seq = self.next_seq;
        let mut line = serde_json::to_vec(&JournalLineRef { seq, entry })
            .map_err(|error| JournalError::Encode { error })?;
        line.push(b'\n');

        if let Err(error) = self.file.write_all(&line) {
            if let Err(truncate_error) = self.file.set_len(self.len) {
                warn!(
                    journal = %self.path,
                    error = %truncate_error,
                    "failed to roll back partial journal write",
                );
            }
            return Err(JournalError::Write {
                path: self.path.clone(),
                error,
            });
        }

        self.len += line.len() as u64;
        self.next_seq += 1;
        Ok(seq)
    }

    /// Reopens the file without write access, so that appends and truncation
    /// fail.
    #[cfg(test)]
    pub(crate) fn reopen_read_only(&mut self) {
        self.file = File::open(&self.path).expect("journal file exists");
    }

    /// Removes every entry. Sequence numbers keep counting up.
    pub(crate) fn truncate(&mut self) -> Result<(), JournalError> {
        self.file
            .set_len(0)
            .map_err(|error| JournalError::Write {
                path: self.path.clone(),
                error,
            })?;
        self.len = 0;
        Ok(())
    }
}

fn parse_lines(path: &Utf8Path, contents: &[u8]) -> Result<(Vec<JournalLine>, usize), JournalError> {
    let mut lines = Vec::new();
    let mut valid_len = 0;
    let mut rest = contents;
    let mut line_number = 0;

    while !rest.is_empty() {
        line_number += 1;
        let (line, consumed, terminated) = match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => (&rest[..pos], pos + 1, true),
            None => (rest, rest.len(), false),
        };

        if terminated && line.iter().all(u8::is_ascii_whitespace) {
            valid_len += consumed;
            rest = &rest[consumed..];
            continue;
        }

        if !terminated {
            // Torn final line.
            break;
        }
        match serde_json::from_slice::<JournalLine>(line) {
            Ok(parsed) => {
                lines.push(parsed);
                valid_len += consumed;
            }
            Err(error) => {
                return Err(JournalError::Parse {
                    path: path.to_owned(),
                    line: line_number,
                    error,
                });
            }
        }
        rest = &rest[consumed..];
    }

    Ok((lines, valid_len))
}
