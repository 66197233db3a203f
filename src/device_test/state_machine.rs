//! Device test state machine.
//!
//! The run is strictly linear and never goes back to an earlier state. Any
//! step failing after the board was selected short-circuits to `Done` with a
//! failed verdict. Not finding a board leaves the machine through the
//! `NoDevice` event, which the event loop reports as an error.
//!
//! ```text
//!             START
//!               |
//!               v
//!          .--------.   NoDevice
//!          | Select |-------------> Err(DeviceNotFound)
//!          '--------'
//!               | BoardSelected
//!               v
//!          .--------.
//!          | Flash  |-----------------.
//!          '--------'                 |
//!               | Flashed             |
//!               v                     |
//!          .---------.                |
//!          | Capture |----------------|
//!          '---------'                |
//!               | Captured            | Done (FAIL)
//!               v                     |
//!          .----------.               |
//!          | Classify |---------------|
//!          '----------'               |
//!               | Done (PASS/FAIL)    |
//!               v                     |
//!          .--------.                 |
//!          |  Done  |<----------------'
//!          '--------'
//!               |
//!               v
//!          Ok(Verdict)
//! ```

use super::events::*;
use super::states::*;
use super::TestBench;
use crate::error::{Error, Result};
use crate::results::Verdict;
use crate::settings::Settings;

// =============================================================================
// Public Interface
// =============================================================================

/// A single test run against one board. Use the `factory()` function to get
/// an instance then run it by calling its `run()` method.
pub struct DeviceTest {
    settings: Settings,
    bench: TestBench,
    sm: TestStates,
}
impl DeviceTest {
    /// The event loop runs until the `Done` state is reached and its
    /// `should_exit` flag is set, then returns the verdict.
    ///
    /// The only error returned is [`Error::DeviceNotFound`]. Everything that
    /// goes wrong once a board is selected is logged and reported as a failed
    /// verdict.
    pub fn run(&mut self) -> Result<Verdict> {
        loop {
            self.sm = self.sm.step(&self.settings, &self.bench)?;
            if let TestStates::Done(state) = &self.sm {
                if state.should_exit {
                    return Ok(state.verdict);
                }
            }
        }
    }
}

/// Factory function for the device test state machine.
pub fn factory(settings: Settings, bench: TestBench) -> DeviceTest {
    DeviceTest {
        settings,
        bench,
        // The machine naturally starts in the `Select` state.
        sm: TestStates::Select(SelectState {}),
    }
}

// =============================================================================
// Private stuff
// =============================================================================

/// Wraps the states into a simple enum, which can also be used for pattern
/// matching during state transitions.
#[derive(Debug)]
enum TestStates {
    Select(SelectState),
    Flash(FlashState),
    Capture(CaptureState),
    Classify(ClassifyState),
    Done(DoneState),
}
impl TestStates {
    /// The unit of work in the state machine event loop. It runs the current
    /// state and decides the next one from the event it returns. State
    /// transitions from events are implemented using the rust `From`/`Into`
    /// pattern, so an unexpected transition does not compile.
    fn step(&mut self, settings: &Settings, bench: &TestBench) -> Result<Self> {
        let next = match self {
            TestStates::Select(state) => {
                let event = state.run(settings, bench);
                match event {
                    Event::BoardSelected(ev) => TestStates::Flash(ev.into()),
                    Event::NoDevice(ev) => return Err(Error::DeviceNotFound(ev.message)),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            TestStates::Flash(state) => {
                let event = state.run(settings, bench);
                match event {
                    Event::Flashed(ev) => TestStates::Capture(ev.into()),
                    Event::Done(ev) => TestStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            TestStates::Capture(state) => {
                let event = state.run(settings, bench);
                match event {
                    Event::Captured(ev) => TestStates::Classify(ev.into()),
                    Event::Done(ev) => TestStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            TestStates::Classify(state) => {
                let event = state.run(settings, bench);
                match event {
                    Event::Done(ev) => TestStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
            TestStates::Done(state) => {
                let event = state.run(settings, bench);
                match event {
                    Event::Exit(ev) => TestStates::Done(ev.into()),
                    _ => unreachable!("illegal event {:#?} at current state {:#?}", event, state),
                }
            }
        };
        Ok(next)
    }
}

// -----------------------------------------------------------------------------
// State from Event transitions
// -----------------------------------------------------------------------------

impl From<BoardSelectedEvent> for FlashState {
    fn from(event: BoardSelectedEvent) -> FlashState {
        FlashState {
            target: event.target,
        }
    }
}

impl From<FlashedEvent> for CaptureState {
    fn from(event: FlashedEvent) -> CaptureState {
        CaptureState {
            target: event.target,
        }
    }
}

impl From<CapturedEvent> for ClassifyState {
    fn from(event: CapturedEvent) -> ClassifyState {
        ClassifyState {
            output: event.output,
        }
    }
}

impl From<DoneEvent> for DoneState {
    fn from(event: DoneEvent) -> DoneState {
        DoneState {
            verdict: event.verdict,
            should_exit: false,
        }
    }
}
impl From<ExitEvent> for DoneState {
    fn from(event: ExitEvent) -> DoneState {
        DoneState {
            verdict: event.verdict,
            should_exit: true,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
