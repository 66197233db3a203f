//! States for the device test state machine.
//!
//! This modules is private and restricted to the
//! [`device_test`](crate::device_test) scope.
//!
//! Refer to the [`state_machine`](super::state_machine) module for an overview
//! of states, events and transitions.

use std::mem;

use log::{debug, error, info};

use super::events::*;
use super::TestBench;
use crate::boards::{select_target, Target};
use crate::error::{Error, FailureReason};
use crate::results::{check_test_output, Verdict};
use crate::serial_capture::capture_test_output;
use crate::settings::Settings;

// =============================================================================
// Crate-Public Interface
// =============================================================================

/// Trait adding the ability for a state to be `run` after a transition into it.
pub(crate) trait Runnable {
    /// A state implements this method so it can be `run` after the state
    /// machine transitions into it.
    ///
    /// During this call, the state does its share of the test run and requests
    /// the transition to the next state by returning the appropriate `event`.
    fn run(&mut self, settings: &Settings, bench: &TestBench) -> Event;
}

// Select State ================================================================

/// The initial state, picking the board to test on.
///
///  * **`BoardSelectedEvent` => `FlashState`** when the settings name a board
///    or discovery found one,
///  * **`NoDeviceEvent`** when there is no board at all.
#[derive(Debug)]
pub(crate) struct SelectState {}
impl Runnable for SelectState {
    fn run(&mut self, settings: &Settings, bench: &TestBench) -> Event {
        debug!("=> Select");
        match select_target(
            settings.stlink_serial.as_deref(),
            settings.port.as_deref(),
            bench.detector.as_ref(),
        ) {
            Ok(target) => Event::BoardSelected(BoardSelectedEvent { target }),
            Err(err) => fail(err),
        }
    }
}

// Flash State =================================================================

/// Programs the test binary into the selected board.
///
///  * **`FlashedEvent` => `CaptureState`** on success,
///  * **`DoneEvent` => `DoneState`** with a failed verdict otherwise.
#[derive(Debug)]
pub(crate) struct FlashState {
    pub target: Target,
}
impl Runnable for FlashState {
    fn run(&mut self, settings: &Settings, bench: &TestBench) -> Event {
        debug!("=> Flash");
        debug!("Launching test binary {}", settings.binary.display());
        match bench
            .flash_tool
            .flash(&settings.binary, self.target.stlink_serial.as_deref())
        {
            Ok(()) => Event::Flashed(FlashedEvent {
                target: mem::take(&mut self.target),
            }),
            Err(err) => fail(err),
        }
    }
}

// Capture State ===============================================================

/// Opens the board's serial port, resets the board and records its output.
///
/// The serial port only lives for the duration of this state and is closed
/// on every way out of it.
///
///  * **`CapturedEvent` => `ClassifyState`** once the device went quiet,
///  * **`DoneEvent` => `DoneState`** with a failed verdict if the port could
///    not be used, the reset failed or the device never said anything.
#[derive(Debug)]
pub(crate) struct CaptureState {
    pub target: Target,
}
impl Runnable for CaptureState {
    fn run(&mut self, settings: &Settings, bench: &TestBench) -> Event {
        debug!("=> Capture");
        info!("Running test");

        let port = match &self.target.port {
            Some(port) => port,
            None => {
                return fail(Error::testing_with(
                    FailureReason::PortOpenFailed,
                    "no serial port specified",
                ))
            }
        };
        let mut transport = match bench
            .connector
            .open(port, settings.baud_rate, settings.test_timeout)
        {
            Ok(transport) => transport,
            Err(err) => return fail(err),
        };

        match capture_test_output(
            transport.as_mut(),
            bench.flash_tool.as_ref(),
            self.target.stlink_serial.as_deref(),
            settings.test_timeout,
        ) {
            Ok(output) => Event::Captured(CapturedEvent { output }),
            Err(err) => fail(err),
        }
    }
}

// Classify State ==============================================================

/// Looks for the test markers in the captured output.
///
///  * **`DoneEvent` => `DoneState`** always, with the verdict.
#[derive(Debug)]
pub(crate) struct ClassifyState {
    pub output: Vec<u8>,
}
impl Runnable for ClassifyState {
    fn run(&mut self, _settings: &Settings, _bench: &TestBench) -> Event {
        debug!("=> Classify");
        match check_test_output(&self.output) {
            Ok(()) => Event::Done(DoneEvent {
                verdict: Verdict::Pass,
            }),
            Err(err) => fail(err),
        }
    }
}

// Done State ==================================================================

/// Reached once the verdict is known.
///
/// Like in any other state, `run` is called once after the transition, and it
/// then triggers the [`ExitEvent`] causing the event loop to terminate.
#[derive(Debug, Copy, Clone)]
pub(crate) struct DoneState {
    pub verdict: Verdict,
    /// When `true` instructs the state machine to exit its event loop.
    pub should_exit: bool,
}
impl Runnable for DoneState {
    fn run(&mut self, _settings: &Settings, _bench: &TestBench) -> Event {
        debug!("=> Done: {}", self.verdict);
        Event::Exit(ExitEvent {
            verdict: self.verdict,
        })
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// Turns a failed step into the event ending the run. Testing failures end
/// with a failed verdict; a missing device aborts the run.
fn fail(err: Error) -> Event {
    error!("{}", err);
    match err {
        Error::TestingFailure { reason, .. } => Event::Done(DoneEvent {
            verdict: Verdict::Fail(reason),
        }),
        Error::DeviceNotFound(message) => Event::NoDevice(NoDeviceEvent { message }),
    }
}
