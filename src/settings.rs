//! Settings for a single device test run.
//!
//! Use the [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
//! pattern to set the configurable values. Once finalized, the settings are
//! never mutated during the run.

use std::path::PathBuf;
use std::time::Duration;

// =============================================================================
// Public Interface
// =============================================================================

/// Path to the OpenOCD configuration shipped with `flashtest`, used when none
/// is given explicitly.
pub const DEFAULT_OPENOCD_CONFIG: &str =
    concat!(env!("CARGO_MANIFEST_DIR"), "/config/openocd_stm32f3xx.cfg");

/// Default baud rate of the test binary's serial console.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default maximum silence on the serial line before a test is considered
/// finished or unresponsive.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Groups all settings of a test run and acts as a
/// [builder](https://doc.rust-lang.org/1.0.0/style/ownership/builders.html)
/// for the settings.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    /// The test binary to be flashed to the device.
    pub binary: PathBuf,
    /// OpenOCD configuration file used for flashing and resetting.
    pub openocd_config: PathBuf,
    /// Serial number of the ST-Link to use. When neither this nor `port` is
    /// set, the board is discovered automatically.
    pub stlink_serial: Option<String>,
    /// The serial port name, usually the device path.
    pub port: Option<String>,
    /// The baud rate in symbols-per-second.
    pub baud_rate: u32,
    /// Per-read timeout on the serial port.
    pub test_timeout: Duration,

    /// Restrict creation of `Settings` instances unless through the
    /// `SettingsBuilder`.
    #[doc(hidden)]
    _private_use_builder: (),
}

/// The builder for the `Settings` values.
///
/// Only the test binary is mandatory, all other values have defaults that will
/// be used if not explicitly set.
///
/// **Example**
///
/// ```ignore
/// let settings = SettingsBuilder::new("out/test.elf").port("/dev/ttyACM0").finalize();
/// ```
pub struct SettingsBuilder {
    settings: Settings,
}
impl SettingsBuilder {
    /// Start building the settings for the given test binary using default
    /// values and automatic board discovery.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        SettingsBuilder {
            settings: Settings {
                binary: binary.into(),
                openocd_config: PathBuf::from(DEFAULT_OPENOCD_CONFIG),
                stlink_serial: None,
                port: None,
                baud_rate: DEFAULT_BAUD_RATE,
                test_timeout: DEFAULT_TEST_TIMEOUT,
                _private_use_builder: (),
            },
        }
    }

    /// Set the path to the OpenOCD configuration file
    pub fn openocd_config(mut self, config: impl Into<PathBuf>) -> Self {
        self.settings.openocd_config = config.into();
        self
    }

    /// Set the serial number of the ST-Link debug adapter
    pub fn stlink_serial<'a>(mut self, serial: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.stlink_serial = Some(serial.into().into_owned());
        self
    }

    /// Set the path to the serial port
    pub fn port<'a>(mut self, port: impl Into<std::borrow::Cow<'a, str>>) -> Self {
        self.settings.port = Some(port.into().into_owned());
        self
    }

    /// Set the baud rate in symbols-per-second
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.settings.baud_rate = baud_rate;
        self
    }

    /// Set the per-read timeout on the serial port
    pub fn test_timeout(mut self, timeout: Duration) -> Self {
        self.settings.test_timeout = timeout;
        self
    }

    pub fn finalize(self) -> Settings {
        self.settings
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn all_default() {
    let settings = SettingsBuilder::new("test.elf").finalize();
    assert_eq!(
        settings,
        Settings {
            binary: PathBuf::from("test.elf"),
            openocd_config: PathBuf::from(DEFAULT_OPENOCD_CONFIG),
            stlink_serial: None,
            port: None,
            baud_rate: 115_200,
            test_timeout: Duration::from_secs(2),
            _private_use_builder: (),
        }
    )
}

#[test]
fn default_config_is_bundled() {
    assert!(DEFAULT_OPENOCD_CONFIG.ends_with("config/openocd_stm32f3xx.cfg"));
    assert!(std::path::Path::new(DEFAULT_OPENOCD_CONFIG).is_file());
}

#[test]
fn openocd_config() {
    let settings = SettingsBuilder::new("test.elf")
        .openocd_config("/etc/openocd/board.cfg")
        .finalize();
    assert_eq!(settings.openocd_config, PathBuf::from("/etc/openocd/board.cfg"));
}

#[test]
fn stlink_serial() {
    let settings = SettingsBuilder::new("test.elf")
        .stlink_serial("066DFF535752877067043931")
        .finalize();
    assert_eq!(
        settings.stlink_serial.as_deref(),
        Some("066DFF535752877067043931")
    );
}

#[test]
fn port() {
    let settings = SettingsBuilder::new("test.elf").port("/dev/ttyACM0").finalize();
    assert_eq!(settings.port.unwrap(), "/dev/ttyACM0");
}

#[test]
fn baud_rate() {
    let baud_rate = 9_600;
    let settings = SettingsBuilder::new("test.elf").baud_rate(baud_rate).finalize();
    assert_eq!(settings.baud_rate, baud_rate);
}

#[test]
fn test_timeout() {
    let timeout = Duration::from_millis(500);
    let settings = SettingsBuilder::new("test.elf").test_timeout(timeout).finalize();
    assert_eq!(settings.test_timeout, timeout);
}
