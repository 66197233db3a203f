//! Deciding whether a captured test run passed.
//!
//! The decision relies only on three markers printed by the on-device test
//! framework's simple printing event handler. If that output format changes,
//! these markers need to follow.

use std::fmt;

use log::{info, Level};

use crate::error::{Error, FailureReason, Result};
use crate::utils::{find, log_lines};

// =============================================================================
// Public Interface
// =============================================================================

/// Printed once when the test binary starts running its tests.
pub const TESTS_STARTING_MARKER: &[u8] = b"[==========] Running all tests.";
/// Printed once all tests have run.
pub const TESTS_DONE_MARKER: &[u8] = b"[==========] Done running all tests.";
/// Printed for every failing test.
pub const TEST_FAILURE_MARKER: &[u8] = b"[  FAILED  ]";

/// Final outcome of a test run.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Verdict {
    Pass,
    Fail(FailureReason),
}

impl Verdict {
    pub fn passed(self) -> bool {
        self == Verdict::Pass
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS"),
            Verdict::Fail(reason) => write!(f, "FAIL ({})", reason),
        }
    }
}

/// Checks the captured output of a test run.
///
/// The checks go from least to most progress: a run that never started is
/// reported as such even if the output also lacks the completion marker, and
/// a run that did not complete is reported as such even if a failure was
/// already printed.
pub fn check_test_output(test_output: &[u8]) -> Result<()> {
    if find(test_output, TESTS_STARTING_MARKER).is_none() {
        return Err(Error::testing(FailureReason::StartNotFound));
    }

    if find(test_output, TESTS_DONE_MARKER).is_none() {
        log_lines(Level::Info, test_output);
        return Err(Error::testing(FailureReason::DidNotComplete));
    }

    if find(test_output, TEST_FAILURE_MARKER).is_some() {
        log_lines(Level::Info, test_output);
        return Err(Error::testing(FailureReason::TestsFailed));
    }

    log_lines(Level::Debug, test_output);
    info!("Test passed!");
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
