// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable listing of stored records.

use crate::output::StdoutStyles;
use itertools::Itertools;
use owo_colors::OwoColorize;
use std::io::{self, Write};
use testrun_metadata::{FullReport, TestRecord, TestStatus, timestamp};

/// Writes every run, each followed by its tests.
pub(crate) fn write_report(
    report: &FullReport,
    styles: &StdoutStyles,
    mut out: impl Write,
) -> io::Result<()> {
    if report.runs.is_empty() {
        writeln!(out, "no runs recorded")?;
        return Ok(());
    }

    let mut tests_by_run = report
        .tests
        .iter()
        .into_group_map_by(|test| test.run_id);

    writeln!(
        out,
        "{} ({} runs, {} tests)",
        "test runs".style(styles.heading),
        report.runs.len(),
        report.tests.len(),
    )?;
    for run in &report.runs {
        write!(
            out,
            "\n{}  started {}",
            run.run_id.style(styles.id),
            timestamp::format(&run.start_time),
        )?;
        match (run.end_time, run.duration_secs()) {
            (Some(end_time), Some(duration)) => writeln!(
                out,
                ", finished {} ({duration:.3}s)",
                timestamp::format(&end_time)
            )?,
            _ => writeln!(out, ", {}", "still open".style(styles.open))?,
        }

        let tests = tests_by_run.remove(&run.run_id).unwrap_or_default();
        if tests.is_empty() {
            writeln!(out, "    (no tests)")?;
        }
        for test in tests {
            write_test(test, styles, &mut out)?;
        }
    }
    Ok(())
}

fn write_test(test: &TestRecord, styles: &StdoutStyles, out: &mut impl Write) -> io::Result<()> {
    let status = match test.status {
        Some(status) => {
            let style = match status {
                TestStatus::Passed => styles.passed,
                TestStatus::Failed | TestStatus::Error => styles.failed,
                TestStatus::Skipped | TestStatus::Unknown => styles.skipped,
            };
            format!("{:>8}", status.as_str()).style(style).to_string()
        }
        None => format!("{:>8}", "RUNNING").style(styles.open).to_string(),
    };
    write!(out, "  {status} {}", test.test_name)?;
    if !test.test_parameters.is_empty() {
        let params = test
            .test_parameters
            .iter()
            .map(|(name, value)| {
                let value = serde_json::to_string(value).unwrap_or_default();
                format!("{name}={value}")
            })
            .join(", ");
        write!(out, "[{params}]")?;
    }
    if let Some(duration) = test.duration {
        write!(out, " ({duration:.3}s)")?;
    }
    writeln!(out, " {}", test.test_id.style(styles.id))?;
    if let Some(message) = &test.error_message {
        for line in message.lines() {
            writeln!(out, "        | {line}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use testrun_metadata::{RunId, TestId, TestParameters, TestRunRecord};

    fn report() -> FullReport {
        let run_id: RunId = "0f3e3c8e-5d1a-4f6b-9a43-2c7a5d6e8f90".parse().unwrap();
        let start = DateTime::parse_from_rfc3339("2024-04-27T10:00:00Z").unwrap();
        let mut run = TestRunRecord::new(run_id, start);
        run.end_time = Some(DateTime::parse_from_rfc3339("2024-04-27T10:00:02.5Z").unwrap());

        let mut params = TestParameters::new();
        params.insert("n", 3_i64);
        let mut failed = TestRecord::new(
            "6a1b6c2d-7e8f-4a9b-8c0d-1e2f3a4b5c6d".parse::<TestId>().unwrap(),
            "test_division".to_owned(),
            params,
            start,
            run_id,
        );
        failed.status = Some(TestStatus::Failed);
        failed.duration = Some(0.25);
        failed.error_message = Some("ZeroDivisionError\nat line 3".to_owned());

        let running = TestRecord::new(
            "7b2c7d3e-8f90-4b1c-9d2e-3f4a5b6c7d8e".parse::<TestId>().unwrap(),
            "test_slow".to_owned(),
            TestParameters::new(),
            start,
            run_id,
        );

        FullReport {
            runs: vec![run],
            tests: vec![failed, running],
        }
    }

    #[test]
    fn plain_listing() {
        let mut out = Vec::new();
        write_report(&report(), &StdoutStyles::default(), &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.starts_with("test runs (1 runs, 2 tests)\n"), "{out}");
        assert!(out.contains("finished 2024-04-27T10:00:02.500+00:00 (2.500s)"), "{out}");
        assert!(out.contains("  FAILED test_division[n=3] (0.250s)"), "{out}");
        assert!(out.contains("        | ZeroDivisionError\n        | at line 3\n"), "{out}");
        assert!(out.contains(" RUNNING test_slow 7b2c7d3e"), "{out}");
    }

    #[test]
    fn empty_listing() {
        let mut out = Vec::new();
        write_report(&FullReport::default(), &StdoutStyles::default(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "no runs recorded\n");
    }
}
