//! Events for the device test state machine.
//!
//! This modules is private and restricted to the
//! [`device_test`](crate::device_test) scope.
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use crate::boards::Target;
use crate::results::Verdict;

// =============================================================================
// Crate-Public Interface
// =============================================================================

// BoardSelectedEvent ==========================================================

/// Event fired once the board to test on is known, either from the settings
/// or from discovery. Triggers the transition to the `Flash` state.
#[derive(Debug)]
pub(crate) struct BoardSelectedEvent {
    pub target: Target,
}

// NoDeviceEvent ===============================================================

/// Event fired when no board was given and none could be discovered. There is
/// no state to go to from here: the run is aborted with an error.
#[derive(Debug)]
pub(crate) struct NoDeviceEvent {
    pub message: String,
}

// FlashedEvent ================================================================

/// Event fired after the test binary was programmed into the board. Triggers
/// the transition to the `Capture` state.
#[derive(Debug)]
pub(crate) struct FlashedEvent {
    pub target: Target,
}

// CapturedEvent ===============================================================

/// Event fired when the device went quiet after the reset. Carries the
/// normalized output to the `Classify` state.
#[derive(Debug)]
pub(crate) struct CapturedEvent {
    pub output: Vec<u8>,
}

// DoneEvent ===================================================================

/// Event fired when the verdict is known, either from classification or
/// because one of the steps failed. Triggers the transition to the `Done`
/// state.
#[derive(Debug)]
pub(crate) struct DoneEvent {
    pub verdict: Verdict,
}

// ExitEvent ===================================================================

/// The last event of a run. The state machine event loop terminates and hands
/// the verdict back to the caller.
#[derive(Debug)]
pub(crate) struct ExitEvent {
    pub verdict: Verdict,
}

// Events enum ==================================================================

/// Events that can be triggered within the device test state machine.
#[derive(Debug)]
pub(crate) enum Event {
    BoardSelected(BoardSelectedEvent),
    NoDevice(NoDeviceEvent),
    Flashed(FlashedEvent),
    Captured(CapturedEvent),
    Done(DoneEvent),
    Exit(ExitEvent),
}
