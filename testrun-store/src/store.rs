// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The run store.
//!
//! The store is a directory containing:
//!
//! - A lock file held for as long as the store is open.
//! - An append-only journal of mutations (`journal.jsonl`).
//! - A zstd-compressed snapshot of every record (`records.json.zst`), written
//!   by compaction.
//!
//! In memory, runs and tests live in concurrent maps with one mutex per
//! record. Mutations on different records run in parallel; mutations on the
//! same record serialize, so that exactly one of two racing finishes wins.
//!
//! Lock order is: run record, test index shard, test record, journal.

use crate::{
    errors::{JournalError, RecordKind, StoreError},
    journal::{Journal, JournalEntry},
    snapshot::{Snapshot, read_snapshot, write_snapshot},
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, FixedOffset};
use dashmap::{DashMap, mapref::entry::Entry};
use debug_ignore::DebugIgnore;
use itertools::Itertools;
use std::{
    fs::{File, TryLockError},
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    thread,
    time::{Duration, Instant},
};
use testrun_metadata::{
    FullReport, RunId, TestId, TestParameters, TestRecord, TestRunRecord, TestStatus,
    parse_run_id,
};
use tracing::{debug, info, warn};

static STORE_LOCK_FILE_NAME: &str = "store.lock";

/// The fields needed to create a test.
#[derive(Clone, Debug)]
pub struct NewTest {
    /// The test's identifier.
    pub test_id: TestId,
    /// The test's name.
    pub test_name: String,
    /// The test's parameters. NaN values are replaced with null on insertion.
    pub test_parameters: TestParameters,
    /// When the test started.
    pub timestamp: DateTime<FixedOffset>,
    /// The run the test belongs to.
    pub run_id: RunId,
}

/// The terminal outcome recorded by [`RunStore::finish_test`].
#[derive(Clone, Debug)]
pub struct TestOutcome {
    /// The test's status.
    pub status: TestStatus,
    /// How long the test took, in seconds. Must be finite and non-negative.
    pub duration: Option<f64>,
    /// The error message. Only kept for failure-class statuses.
    pub error_message: Option<String>,
}

/// Record counts for a store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreCounts {
    /// The number of runs.
    pub runs: usize,
    /// The number of tests.
    pub tests: usize,
}

#[derive(Debug)]
struct RunEntry {
    record: TestRunRecord,
    // Secondary index for listing a run's tests.
    tests: Vec<TestId>,
}

#[derive(Debug)]
struct Persistence {
    store_dir: Utf8PathBuf,
    // Held for RAII lock semantics; the lock is released when the store is dropped.
    #[expect(dead_code, reason = "held for the store's lifetime")]
    lock_file: DebugIgnore<File>,
    journal: Mutex<Journal>,
}

/// Stores test runs and tests.
///
/// All operations take `&self` and may be called concurrently.
#[derive(Debug)]
pub struct RunStore {
    runs: DashMap<RunId, Arc<Mutex<RunEntry>>>,
    tests: DashMap<TestId, Arc<Mutex<TestRecord>>>,
    // Mutations and reads hold this shared; reset and compaction hold it
    // exclusively so they see (and replace) a consistent state.
    maintenance: RwLock<()>,
    persistence: Option<Persistence>,
}

impl RunStore {
    /// Creates an empty store that keeps records in memory only.
    pub fn in_memory() -> Self {
        Self {
            runs: DashMap::new(),
            tests: DashMap::new(),
            maintenance: RwLock::new(()),
            persistence: None,
        }
    }

    /// Opens the store in `store_dir`, creating the directory if needed.
    ///
    /// Loads the snapshot if there is one, then replays the journal on top of
    /// it. The store stays locked against other processes until dropped.
    pub fn open(store_dir: &Utf8Path) -> Result<Self, JournalError> {
        std::fs::create_dir_all(store_dir).map_err(|error| JournalError::DirCreate {
            path: store_dir.to_owned(),
            error,
        })?;

        let lock_file = acquire_store_lock(store_dir)?;
        let snapshot = read_snapshot(store_dir)?;
        let (mut journal, lines) = Journal::open(store_dir)?;

        let mut store = Self::in_memory();
        let mut last_seq = 0;
        if let Some(snapshot) = snapshot {
            last_seq = snapshot.last_seq;
            store
                .restore(snapshot)
                .map_err(|error| JournalError::Replay {
                    path: journal.path().to_owned(),
                    seq: last_seq,
                    error: Box::new(error),
                })?;
        }

        let mut replayed = 0;
        for line in lines {
            if line.seq <= last_seq {
                continue;
            }
            store
                .apply(line.entry)
                .map_err(|error| JournalError::Replay {
                    path: journal.path().to_owned(),
                    seq: line.seq,
                    error: Box::new(error),
                })?;
            replayed += 1;
        }
        journal.advance_past(last_seq);

        let counts = store.counts();
        info!(
            store_dir = %store_dir,
            runs = counts.runs,
            tests = counts.tests,
            replayed,
            "opened run store",
        );

        store.persistence = Some(Persistence {
            store_dir: store_dir.to_owned(),
            lock_file: DebugIgnore(lock_file),
            journal: Mutex::new(journal),
        });
        Ok(store)
    }

    /// Returns the directory backing this store, or `None` for an in-memory
    /// store.
    pub fn store_dir(&self) -> Option<&Utf8Path> {
        self.persistence
            .as_ref()
            .map(|persistence| persistence.store_dir.as_path())
    }

    /// Creates a new, open run.
    pub fn create_run(
        &self,
        run_id: RunId,
        start_time: DateTime<FixedOffset>,
    ) -> Result<TestRunRecord, StoreError> {
        let _gate = read(&self.maintenance);
        let record = TestRunRecord::new(run_id, start_time);

        // The vacant entry keeps its shard locked until the journal write
        // settles, so a racing create of the same run sees it as occupied.
        match self.runs.entry(run_id) {
            Entry::Occupied(_) => return Err(StoreError::duplicate(RecordKind::Run, run_id)),
            Entry::Vacant(vacant) => {
                self.journal(JournalEntry::RunCreated {
                    run: record.clone(),
                })?;
                vacant.insert(Arc::new(Mutex::new(RunEntry {
                    record: record.clone(),
                    tests: Vec::new(),
                })));
            }
        }

        debug!(%run_id, "created run");
        Ok(record)
    }

    /// Marks a run as finished.
    ///
    /// An end time earlier than the run's start time is clamped to the start
    /// time.
    pub fn finish_run(
        &self,
        run_id: RunId,
        end_time: DateTime<FixedOffset>,
    ) -> Result<TestRunRecord, StoreError> {
        let _gate = read(&self.maintenance);
        let entry = self
            .run_entry(run_id)
            .ok_or_else(|| StoreError::not_found(RecordKind::Run, run_id))?;
        let mut entry = lock(&entry);

        if !entry.record.is_open() {
            return Err(StoreError::already_finished(RecordKind::Run, run_id));
        }

        let end_time = if end_time < entry.record.start_time {
            warn!(
                %run_id,
                start_time = %entry.record.start_time,
                %end_time,
                "run finish time precedes its start time, clamping to start time",
            );
            entry.record.start_time
        } else {
            end_time
        };

        self.journal(JournalEntry::RunFinished { run_id, end_time })?;
        entry.record.end_time = Some(end_time);

        debug!(%run_id, "finished run");
        Ok(entry.record.clone())
    }

    /// Creates a new, unfinished test in an existing run.
    ///
    /// Tests may be added to runs that have already finished. An existing
    /// `test_id` is reported as a duplicate even if `run_id` is unknown.
    pub fn create_test(&self, new_test: NewTest) -> Result<TestRecord, StoreError> {
        let _gate = read(&self.maintenance);
        let NewTest {
            test_id,
            test_name,
            test_parameters,
            timestamp,
            run_id,
        } = new_test;

        if self.tests.contains_key(&test_id) {
            return Err(StoreError::duplicate(RecordKind::Test, test_id));
        }
        let run_entry = self
            .run_entry(run_id)
            .ok_or(StoreError::UnknownRun { run_id })?;
        let mut run_entry = lock(&run_entry);

        let record = TestRecord::new(
            test_id,
            test_name,
            test_parameters.normalized(),
            timestamp,
            run_id,
        );
        match self.tests.entry(test_id) {
            Entry::Occupied(_) => return Err(StoreError::duplicate(RecordKind::Test, test_id)),
            Entry::Vacant(vacant) => {
                self.journal(JournalEntry::TestCreated {
                    test: record.clone(),
                })?;
                vacant.insert(Arc::new(Mutex::new(record.clone())));
            }
        }
        run_entry.tests.push(test_id);

        debug!(%test_id, %run_id, test_name = %record.test_name, "created test");
        Ok(record)
    }

    /// Records a test's terminal outcome.
    pub fn finish_test(
        &self,
        test_id: TestId,
        outcome: TestOutcome,
    ) -> Result<TestRecord, StoreError> {
        let TestOutcome {
            status,
            duration,
            mut error_message,
        } = outcome;

        if let Some(duration) = duration
            && (!duration.is_finite() || duration < 0.0)
        {
            return Err(StoreError::InvalidRequest {
                message: format!(
                    "duration must be a non-negative number of seconds, got {duration}"
                ),
            });
        }
        if !status.is_failure() && error_message.take().is_some() {
            debug!(%test_id, %status, "dropping error message for non-failure status");
        }

        let _gate = read(&self.maintenance);
        let test = self
            .test_entry(test_id)
            .ok_or_else(|| StoreError::not_found(RecordKind::Test, test_id))?;
        let mut test = lock(&test);

        if test.is_finished() {
            return Err(StoreError::already_finished(RecordKind::Test, test_id));
        }

        self.journal(JournalEntry::TestFinished {
            test_id,
            status,
            duration,
            error_message: error_message.clone(),
        })?;
        test.status = Some(status);
        test.duration = duration;
        test.error_message = error_message;

        debug!(%test_id, %status, "finished test");
        Ok(test.clone())
    }

    /// Lists the tests of a run, given its identifier as a string.
    ///
    /// An unknown run has no tests, so this returns an empty list rather than
    /// an error. Only a malformed identifier is an error.
    pub fn list_tests_by_run(&self, run_id: &str) -> Result<Vec<TestRecord>, StoreError> {
        let run_id = parse_run_id(run_id)?;
        Ok(self.tests_for_run(run_id))
    }

    /// Lists the tests of a run, ordered by timestamp then identifier.
    pub fn tests_for_run(&self, run_id: RunId) -> Vec<TestRecord> {
        let _gate = read(&self.maintenance);
        let Some(run_entry) = self.run_entry(run_id) else {
            return Vec::new();
        };
        let test_ids = lock(&run_entry).tests.clone();

        test_ids
            .iter()
            .filter_map(|test_id| self.test_entry(*test_id))
            .map(|test| lock(&test).clone())
            .sorted_by(test_order)
            .collect()
    }

    /// Lists every test, ordered by timestamp then identifier.
    pub fn list_all_tests(&self) -> Vec<TestRecord> {
        let _gate = read(&self.maintenance);
        self.all_tests()
    }

    /// Lists every run, ordered by start time then identifier.
    pub fn list_runs(&self) -> Vec<TestRunRecord> {
        let _gate = read(&self.maintenance);
        self.all_runs()
    }

    /// Looks up a run, given its identifier as a string.
    pub fn get_run(&self, run_id: &str) -> Result<TestRunRecord, StoreError> {
        let run_id = parse_run_id(run_id)?;
        let _gate = read(&self.maintenance);
        self.run_entry(run_id)
            .map(|entry| lock(&entry).record.clone())
            .ok_or_else(|| StoreError::not_found(RecordKind::Run, run_id))
    }

    /// Returns every run and every test.
    ///
    /// The two lists are read under the same maintenance gate, but concurrent
    /// mutations may still land between them.
    pub fn full_report(&self) -> FullReport {
        let _gate = read(&self.maintenance);
        FullReport {
            runs: self.all_runs(),
            tests: self.all_tests(),
        }
    }

    /// Returns the number of runs and tests.
    pub fn counts(&self) -> StoreCounts {
        StoreCounts {
            runs: self.runs.len(),
            tests: self.tests.len(),
        }
    }

    /// Deletes every run and test.
    pub fn reset(&self) -> Result<StoreCounts, StoreError> {
        let _gate = write(&self.maintenance);
        let removed = self.counts();

        let journal = match &self.persistence {
            Some(persistence) => {
                let journal = lock(&persistence.journal);
                let empty = Snapshot::new(journal.last_seq(), Vec::new(), Vec::new());
                write_snapshot(&persistence.store_dir, &empty)
                    .map_err(StoreError::StorageUnavailable)?;
                Some(journal)
            }
            None => None,
        };

        // The empty snapshot supersedes every journal entry, so the records are
        // gone on disk from here on even if truncation fails.
        self.runs.clear();
        self.tests.clear();
        if let Some(mut journal) = journal {
            journal.truncate().map_err(StoreError::StorageUnavailable)?;
        }

        info!(runs = removed.runs, tests = removed.tests, "reset run store");
        Ok(removed)
    }

    /// Writes every record to a fresh snapshot and empties the journal.
    ///
    /// For an in-memory store this does nothing beyond returning the counts.
    pub fn compact(&self) -> Result<StoreCounts, StoreError> {
        let _gate = write(&self.maintenance);
        let counts = self.counts();

        if let Some(persistence) = &self.persistence {
            let mut journal = lock(&persistence.journal);
            let snapshot = Snapshot::new(journal.last_seq(), self.all_runs(), self.all_tests());
            write_snapshot(&persistence.store_dir, &snapshot)
                .map_err(StoreError::StorageUnavailable)?;
            journal.truncate().map_err(StoreError::StorageUnavailable)?;
            info!(
                store_dir = %persistence.store_dir,
                runs = counts.runs,
                tests = counts.tests,
                last_seq = snapshot.last_seq,
                "compacted run store",
            );
        }
        Ok(counts)
    }

    // ---
    // Helper methods
    // ---

    fn journal(&self, entry: JournalEntry) -> Result<(), StoreError> {
        if let Some(persistence) = &self.persistence {
            lock(&persistence.journal)
                .append(&entry)
                .map_err(StoreError::StorageUnavailable)?;
        }
        Ok(())
    }

    fn run_entry(&self, run_id: RunId) -> Option<Arc<Mutex<RunEntry>>> {
        self.runs.get(&run_id).map(|entry| Arc::clone(entry.value()))
    }

    fn test_entry(&self, test_id: TestId) -> Option<Arc<Mutex<TestRecord>>> {
        self.tests.get(&test_id).map(|test| Arc::clone(test.value()))
    }

    fn all_runs(&self) -> Vec<TestRunRecord> {
        // Collect first so no map shard stays locked while records are.
        let entries: Vec<_> = self
            .runs
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        entries
            .iter()
            .map(|entry| lock(entry).record.clone())
            .sorted_by(|a, b| {
                a.start_time
                    .cmp(&b.start_time)
                    .then_with(|| a.run_id.cmp(&b.run_id))
            })
            .collect()
    }

    fn all_tests(&self) -> Vec<TestRecord> {
        let tests: Vec<_> = self
            .tests
            .iter()
            .map(|test| Arc::clone(test.value()))
            .collect();
        tests
            .iter()
            .map(|test| lock(test).clone())
            .sorted_by(test_order)
            .collect()
    }

    fn restore(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        for run in snapshot.runs {
            self.create_run(run.run_id, run.start_time)?;
            if let Some(end_time) = run.end_time {
                self.finish_run(run.run_id, end_time)?;
            }
        }
        for test in snapshot.tests {
            let TestRecord {
                test_id,
                test_name,
                test_parameters,
                timestamp,
                run_id,
                status,
                duration,
                error_message,
            } = test;
            self.create_test(NewTest {
                test_id,
                test_name,
                test_parameters,
                timestamp,
                run_id,
            })?;
            if let Some(status) = status {
                self.finish_test(
                    test_id,
                    TestOutcome {
                        status,
                        duration,
                        error_message,
                    },
                )?;
            }
        }
        Ok(())
    }

    fn apply(&self, entry: JournalEntry) -> Result<(), StoreError> {
        match entry {
            JournalEntry::RunCreated { run } => {
                self.create_run(run.run_id, run.start_time)?;
            }
            JournalEntry::RunFinished { run_id, end_time } => {
                self.finish_run(run_id, end_time)?;
            }
            JournalEntry::TestCreated { test } => {
                self.create_test(NewTest {
                    test_id: test.test_id,
                    test_name: test.test_name,
                    test_parameters: test.test_parameters,
                    timestamp: test.timestamp,
                    run_id: test.run_id,
                })?;
            }
            JournalEntry::TestFinished {
                test_id,
                status,
                duration,
                error_message,
            } => {
                self.finish_test(
                    test_id,
                    TestOutcome {
                        status,
                        duration,
                        error_message,
                    },
                )?;
            }
        }
        Ok(())
    }
}

// Records are validated before any field is written, so data behind a poisoned
// lock is still consistent.

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn test_order(a: &TestRecord, b: &TestRecord) -> std::cmp::Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.test_id.cmp(&b.test_id))
}

/// Acquires the store's lock file, retrying for a short while.
///
/// This handles brief contention with a collector that is shutting down, as
/// well as filesystems where locking may not work properly (e.g., NFS).
fn acquire_store_lock(store_dir: &Utf8Path) -> Result<File, JournalError> {
    const LOCK_TIMEOUT: Duration = Duration::from_secs(2);
    const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);

    let path = store_dir.join(STORE_LOCK_FILE_NAME);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(|error| JournalError::Lock {
            path: path.clone(),
            error,
        })?;

    let start = Instant::now();
    loop {
        match file.try_lock() {
            Ok(()) => return Ok(file),
            Err(TryLockError::WouldBlock) => {
                if start.elapsed() >= LOCK_TIMEOUT {
                    return Err(JournalError::Locked {
                        path,
                        timeout_secs: LOCK_TIMEOUT.as_secs(),
                    });
                }
                thread::sleep(LOCK_RETRY_INTERVAL);
            }
            Err(TryLockError::Error(error)) => {
                return Err(JournalError::Lock { path, error });
            }
        }
    }
}
