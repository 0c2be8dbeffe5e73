// Copyright (c) The testrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::IdentifierParseError;
use newtype_uuid::{TypedUuid, TypedUuidKind, TypedUuidTag};

/// Marker kind for test run identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TestRunKind {}

impl TypedUuidKind for TestRunKind {
    #[inline]
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("test_run");
        TAG
    }
}

/// Marker kind for test identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TestKind {}

impl TypedUuidKind for TestKind {
    #[inline]
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("test");
        TAG
    }
}

/// The identifier of a test run.
///
/// Run identifiers are generated by the client at the start of a session and
/// are the natural key of a run.
pub type RunId = TypedUuid<TestRunKind>;

/// The identifier of a single test execution within a run.
pub type TestId = TypedUuid<TestKind>;

/// Parses a run identifier, keeping the rejected input around for error messages.
pub fn parse_run_id(input: &str) -> Result<RunId, IdentifierParseError> {
    input
        .trim()
        .parse::<RunId>()
        .map_err(|error| IdentifierParseError::new(input, error.to_string()))
}

/// Parses a test identifier, keeping the rejected input around for error messages.
pub fn parse_test_id(input: &str) -> Result<TestId, IdentifierParseError> {
    input
        .trim()
        .parse::<TestId>()
        .map_err(|error| IdentifierParseError::new(input, error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn run_id_round_trips_through_display() {
        let run_id = RunId::new_v4();
        let parsed = parse_run_id(&run_id.to_string()).expect("displayed run ID parses");
        assert_eq!(parsed, run_id);
    }

    #[test_case("not-a-uuid" ; "words")]
    #[test_case("" ; "empty")]
    #[test_case("550e8400-e29b-41d4-a716" ; "truncated")]
    #[test_case("missing-run" ; "placeholder name")]
    fn malformed_ids_are_rejected(input: &str) {
        let error = parse_run_id(input).expect_err("input is not a UUID");
        assert_eq!(error.input(), input);

        let error = parse_test_id(input).expect_err("input is not a UUID");
        assert_eq!(error.input(), input);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let test_id = TestId::new_v4();
        let parsed = parse_test_id(&format!("  {test_id}\n")).expect("padded test ID parses");
        assert_eq!(parsed, test_id);
    }
}
