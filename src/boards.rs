//! Board discovery and selection.
//!
//! A board is identified by the serial number of its on-board debug adapter
//! (used to pin the flash tool to one adapter when several are attached) and
//! the path of its USB serial port (used to read the test output).

use log::{debug, warn};
use serialport::{available_ports, SerialPortType};

use crate::error::{Error, Result};

// =============================================================================
// Public Interface
// =============================================================================

/// USB vendor id of STMicroelectronics.
pub const ST_VENDOR_ID: u16 = 0x0483;
/// USB product id of the ST-Link/V2-1 found on the STM32F3 Discovery.
pub const DISCOVERY_PRODUCT_ID: u16 = 0x374b;

/// An attached board as reported by a [`BoardDetector`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Board {
    /// Serial number of the debug adapter.
    pub serial_number: String,
    /// Device path of the board's serial port.
    pub port: String,
}

/// Source of the boards currently attached to the host.
pub trait BoardDetector {
    /// Returns the attached boards. The order is stable for a given set of
    /// boards and an empty list means nothing is attached.
    fn detect_boards(&self) -> Vec<Board>;
}

/// Detects STM32F3 Discovery boards through the USB identity of their
/// ST-Link serial port.
#[derive(Debug, Default, Copy, Clone)]
pub struct StLinkDetector;

impl BoardDetector for StLinkDetector {
    fn detect_boards(&self) -> Vec<Board> {
        let mut boards = vec![];
        match available_ports() {
            Ok(ports) => {
                for p in ports {
                    if let SerialPortType::UsbPort(info) = p.port_type {
                        if info.vid == ST_VENDOR_ID && info.pid == DISCOVERY_PRODUCT_ID {
                            boards.push(Board {
                                serial_number: info.serial_number.unwrap_or_default(),
                                port: p.port_name,
                            });
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Could not enumerate serial ports: {}", e);
            }
        }
        boards
    }
}

/// The identity of the board a test run is going to use.
///
/// Either field may be missing when only part of the identity was given
/// explicitly.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Target {
    pub stlink_serial: Option<String>,
    pub port: Option<String>,
}

/// Picks the board to test on.
///
/// An explicit serial number or port always wins and no discovery happens.
/// Otherwise the first board reported by `detector` is used, and having no
/// board at all is a [`Error::DeviceNotFound`].
pub fn select_target(
    stlink_serial: Option<&str>,
    port: Option<&str>,
    detector: &dyn BoardDetector,
) -> Result<Target> {
    if stlink_serial.is_some() || port.is_some() {
        return Ok(Target {
            stlink_serial: stlink_serial.map(str::to_owned),
            port: port.map(str::to_owned),
        });
    }

    debug!("Attempting to automatically detect dev board");
    let boards = detector.detect_boards();
    match boards.into_iter().next() {
        Some(board) => {
            debug!("Using board {} on {}", board.serial_number, board.port);
            Ok(Target {
                stlink_serial: Some(board.serial_number),
                port: Some(board.port),
            })
        }
        None => Err(Error::DeviceNotFound("Could not find an attached device".into())),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct FixedBoards {
        boards: Vec<Board>,
        queried: Cell<bool>,
    }
    impl FixedBoards {
        fn new(boards: Vec<Board>) -> Self {
            FixedBoards {
                boards,
                queried: Cell::new(false),
            }
        }
    }
    impl BoardDetector for FixedBoards {
        fn detect_boards(&self) -> Vec<Board> {
            self.queried.set(true);
            self.boards.clone()
        }
    }

    fn board(serial: &str, port: &str) -> Board {
        Board {
            serial_number: serial.into(),
            port: port.into(),
        }
    }

    #[test]
    fn picks_first_detected_board() {
        let detector = FixedBoards::new(vec![
            board("AAA", "/dev/ttyACM0"),
            board("BBB", "/dev/ttyACM1"),
        ]);
        let target = select_target(None, None, &detector).unwrap();
        assert_eq!(target.stlink_serial.as_deref(), Some("AAA"));
        assert_eq!(target.port.as_deref(), Some("/dev/ttyACM0"));
        assert!(detector.queried.get());
    }

    #[test]
    fn no_board_is_device_not_found() {
        let detector = FixedBoards::new(vec![]);
        let err = select_target(None, None, &detector).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, Error::DeviceNotFound(_)));
    }

    #[test]
    fn explicit_port_skips_discovery() {
        let detector = FixedBoards::new(vec![board("AAA", "/dev/ttyACM0")]);
        let target = select_target(None, Some("/dev/ttyUSB3"), &detector).unwrap();
        assert_eq!(target.stlink_serial, None);
        assert_eq!(target.port.as_deref(), Some("/dev/ttyUSB3"));
        assert!(!detector.queried.get());
    }

    #[test]
    fn explicit_serial_skips_discovery() {
        let detector = FixedBoards::new(vec![]);
        let target = select_target(Some("CCC"), None, &detector).unwrap();
        assert_eq!(target.stlink_serial.as_deref(), Some("CCC"));
        assert_eq!(target.port, None);
        assert!(!detector.queried.get());
    }
}
