//! Error taxonomy for a device test run.
//!
//! Two tiers exist. [`Error::DeviceNotFound`] means there is no hardware to
//! test against and is fatal for the caller. [`Error::TestingFailure`] covers
//! everything that can go wrong once a board has been picked; the orchestrator
//! turns it into a failed [`Verdict`](crate::Verdict) instead of propagating it.

use std::fmt;

use thiserror::Error;

// =============================================================================
// Public Interface
// =============================================================================

/// The specific reason attached to a [`Error::TestingFailure`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FailureReason {
    /// The flash tool exited with a non-zero status while programming.
    FlashFailed,
    /// The flash tool exited with a non-zero status while resetting.
    ResetFailed,
    /// The serial port could not be opened.
    PortOpenFailed,
    /// Nothing at all was read from the device after the reset.
    DeviceSilent,
    /// An I/O error happened while talking to the serial port.
    SerialIo,
    /// The test start marker never showed up in the captured output.
    StartNotFound,
    /// The tests started but the completion marker never showed up.
    DidNotComplete,
    /// The tests completed and at least one of them failed.
    TestsFailed,
}

impl FailureReason {
    /// Human readable description, used when logging and reporting.
    pub fn message(self) -> &'static str {
        match self {
            FailureReason::FlashFailed => "Failed to flash target device",
            FailureReason::ResetFailed => "Failed to reset target device",
            FailureReason::PortOpenFailed => "Failed to open device",
            FailureReason::DeviceSilent => "Device not producing output",
            FailureReason::SerialIo => "Serial communication with device failed",
            FailureReason::StartNotFound => "Failed to find test start",
            FailureReason::DidNotComplete => "Tests did not complete",
            FailureReason::TestsFailed => "Test suite had one or more failures",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// No board is attached, or none could be discovered.
    #[error("{0}")]
    DeviceNotFound(String),

    /// A step of the test run failed after a board was selected.
    #[error("{reason}{}", with_detail(.detail))]
    TestingFailure {
        reason: FailureReason,
        /// Optional free-text diagnostic, e.g. the underlying I/O error.
        detail: Option<String>,
    },
}

impl Error {
    pub(crate) fn testing(reason: FailureReason) -> Self {
        Error::TestingFailure {
            reason,
            detail: None,
        }
    }

    pub(crate) fn testing_with(reason: FailureReason, detail: impl fmt::Display) -> Self {
        Error::TestingFailure {
            reason,
            detail: Some(detail.to_string()),
        }
    }

    /// `true` for errors that mean the environment is not set up for testing,
    /// as opposed to a test run that went wrong.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DeviceNotFound(_))
    }

    /// The failure reason, when this is a [`Error::TestingFailure`].
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            Error::TestingFailure { reason, .. } => Some(*reason),
            Error::DeviceNotFound(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Private stuff
// =============================================================================

fn with_detail(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(": {}", detail),
        None => String::new(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn display_without_detail() {
    let err = Error::testing(FailureReason::StartNotFound);
    assert_eq!(err.to_string(), "Failed to find test start");
}

#[test]
fn display_with_detail() {
    let err = Error::testing_with(FailureReason::PortOpenFailed, "No such file or directory");
    assert_eq!(
        err.to_string(),
        "Failed to open device: No such file or directory"
    );
}

#[test]
fn only_device_not_found_is_fatal() {
    assert!(Error::DeviceNotFound("none".into()).is_fatal());
    assert!(!Error::testing(FailureReason::FlashFailed).is_fatal());
    assert_eq!(Error::DeviceNotFound("none".into()).reason(), None);
    assert_eq!(
        Error::testing(FailureReason::TestsFailed).reason(),
        Some(FailureReason::TestsFailed)
    );
}
