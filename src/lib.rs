//! Flashtest runs an on-device unit test binary on an attached microcontroller
//! board and tells whether it passed, without anybody watching a terminal.
//!
//! A run goes through four steps:
//!
//! * **select** the board, either the one given explicitly or the first
//!   attached STM32F3 Discovery found over USB,
//! * **flash** the test binary with OpenOCD,
//! * **capture** the serial output after resetting the board, for as long as
//!   the device keeps talking,
//! * **classify** the output by looking for the test start, completion and
//!   failure markers printed by the test framework.
//!
//! The run is implemented as a state machine in terms of **states** and
//! **transitions** between them, with the following characteristics:
//!
//! * Can only be in one state at any time.
//! * Each state can have its own associated data if needed.
//! * Transitions between states are triggered via typed **events** and follow
//!   defined semantics.
//! * Only explicitly defined transitions are permitted, and as many errors as
//!   possible are detected at **compile-time**.
//! * Data is transferred from one state to the next by attaching it to the
//!   transition event.
//!
//! The implementation of state transitions leverages `rust`'s `From` and `Into`
//! pattern. Only transitions for which the `From` trait is implemented are
//! authorized and any other transition would be detected at compile-time as an
//! error.
//!
//! Logging goes through the [`log`](https://docs.rs/log) facade; installing a
//! logger is left to the binary.

mod boards;
mod device_test;
mod error;
mod flash_tool;
mod results;
mod serial_capture;
mod settings;
mod utils;

pub use boards::{
    select_target, Board, BoardDetector, StLinkDetector, Target, DISCOVERY_PRODUCT_ID,
    ST_VENDOR_ID,
};
pub use device_test::{factory, DeviceTest, TestBench};
pub use error::{Error, FailureReason, Result};
pub use flash_tool::{
    FlashTool, OpenOcd, GDB_PORT_ENV, INSTALL_DIR_ENV, OPENOCD_PATH_ENV, STLINK_SERIAL_ENV,
};
pub use results::{
    check_test_output, Verdict, TESTS_DONE_MARKER, TESTS_STARTING_MARKER, TEST_FAILURE_MARKER,
};
pub use serial_capture::{
    capture_test_output, strip_carriage_returns, trim_to_last_run, SerialConnector,
    SerialTransport, SystemSerialConnector, DRAIN_TIMEOUT,
};
pub use settings::{
    Settings, SettingsBuilder, DEFAULT_BAUD_RATE, DEFAULT_OPENOCD_CONFIG, DEFAULT_TEST_TIMEOUT,
};

/// Flashes, runs and checks an on-device test binary on real hardware.
///
/// Returns `Ok(true)` when the tests passed and `Ok(false)` when anything
/// went wrong after a board was selected. Not finding any board is an
/// [`Error::DeviceNotFound`].
pub fn run_device_test(settings: Settings) -> Result<bool> {
    let bench = TestBench::system(&settings);
    let verdict = factory(settings, bench).run()?;
    Ok(verdict.passed())
}
