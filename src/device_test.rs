//! Device test orchestration.
//!
//! A test run goes through board selection, flashing, output capture and
//! classification, strictly in that order. Every step after board selection
//! that fails ends the run with a failed [`Verdict`](crate::Verdict); not
//! finding a board at all is reported as an error to the caller instead.
//!
//! **Example** - Running a test binary on the first attached board:
//! ```no_run
//! use flashtest::{self as ft, TestBench};
//!
//! let settings = ft::SettingsBuilder::new("out/stm32f3/test.elf").finalize();
//! let bench = TestBench::system(&settings);
//! let mut test = ft::factory(settings, bench);
//! match test.run() {
//!     Ok(verdict) => println!("{}", verdict),
//!     Err(err) => eprintln!("{}", err),
//! }
//! ```

mod events;
mod state_machine;
mod states;

use crate::boards::{BoardDetector, StLinkDetector};
use crate::flash_tool::{FlashTool, OpenOcd};
use crate::serial_capture::{SerialConnector, SystemSerialConnector};
use crate::settings::Settings;

pub use state_machine::{factory, DeviceTest};

/// The external collaborators a test run talks to.
pub struct TestBench {
    pub detector: Box<dyn BoardDetector>,
    pub flash_tool: Box<dyn FlashTool>,
    pub connector: Box<dyn SerialConnector>,
}

impl TestBench {
    /// Real hardware: ST-Link discovery over USB, OpenOCD located through the
    /// environment and the host's serial ports.
    pub fn system(settings: &Settings) -> Self {
        TestBench {
            detector: Box::new(StLinkDetector),
            flash_tool: Box::new(OpenOcd::from_env(settings.openocd_config.clone())),
            connector: Box::new(SystemSerialConnector),
        }
    }
}
