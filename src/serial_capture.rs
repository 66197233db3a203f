//! Capturing the test binary's output from the board's serial port.
//!
//! There is no overall timeout on a test run. Instead the capture keeps
//! reading lines as long as the device keeps talking, and stops once it stays
//! silent for a full read timeout. As soon as the completion marker has been
//! seen, the read timeout drops to [`DRAIN_TIMEOUT`] since only the summary
//! lines are left to come.

use std::io::{self, Read};
use std::time::{Duration, Instant};

use log::{debug, info, trace};
use serialport::{ClearBuffer, SerialPort};

use crate::error::{Error, FailureReason, Result};
use crate::flash_tool::FlashTool;
use crate::results::{TESTS_DONE_MARKER, TESTS_STARTING_MARKER};
use crate::utils::{log_hex_dump, rfind};

// =============================================================================
// Public Interface
// =============================================================================

/// Read timeout used after the completion marker has been seen.
pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);

/// A byte stream from the device with per-read timeouts.
pub trait SerialTransport {
    /// Discards anything already received but not read yet.
    fn clear_input(&mut self) -> io::Result<()>;

    /// Reads into `buf`, waiting at most `timeout` for data to arrive. Returns
    /// `0` when the timeout elapsed with nothing received.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

impl SerialTransport for Box<dyn SerialPort> {
    fn clear_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.set_timeout(timeout)?;
        match self.read(buf) {
            Ok(count) => Ok(count),
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// Opens the serial transport of a board.
pub trait SerialConnector {
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialTransport>>;
}

/// [`SerialConnector`] for the serial ports of the host system.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemSerialConnector;

impl SerialConnector for SystemSerialConnector {
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialTransport>> {
        let port = serialport::new(port, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| Error::testing_with(FailureReason::PortOpenFailed, e))?;
        debug!(
            "Connected to {} at {} baud",
            port.name().unwrap_or_default(),
            baud_rate
        );
        Ok(Box::new(port))
    }
}

/// Resets the device and records its serial output until it goes quiet.
///
/// Input already buffered on `transport` is dropped first, then the device is
/// reset through `flash_tool` so the capture starts together with the test
/// binary. The returned buffer has carriage returns removed and starts at the
/// last test start marker, if any.
pub fn capture_test_output(
    transport: &mut dyn SerialTransport,
    flash_tool: &dyn FlashTool,
    stlink_serial: Option<&str>,
    timeout: Duration,
) -> Result<Vec<u8>> {
    transport.clear_input().map_err(serial_io)?;
    flash_tool.reset(stlink_serial)?;

    let mut serial_data = Vec::new();

    // The first read waits for the device to boot.
    let mut first = [0u8; 1];
    let count = transport.read_timeout(&mut first, timeout).map_err(serial_io)?;
    if count == 0 {
        return Err(Error::testing(FailureReason::DeviceSilent));
    }
    serial_data.extend_from_slice(&first[..count]);

    let mut timeout = timeout;
    loop {
        let line = read_line(transport, timeout).map_err(serial_io)?;
        if line.is_empty() {
            break;
        }
        serial_data.extend_from_slice(&line);
        if rfind(&serial_data, TESTS_DONE_MARKER).is_some() {
            // One summary line left if all tests agree, two if mixed.
            timeout = DRAIN_TIMEOUT;
        }
    }
    info!("Captured {} bytes of test output", serial_data.len());
    log_hex_dump(&serial_data);

    Ok(trim_to_last_run(strip_carriage_returns(serial_data)))
}

/// Removes every `\r` from the captured output.
pub fn strip_carriage_returns(mut data: Vec<u8>) -> Vec<u8> {
    data.retain(|b| *b != b'\r');
    data
}

/// Drops everything before the last test start marker. Output without a start
/// marker is returned unchanged.
pub fn trim_to_last_run(mut data: Vec<u8>) -> Vec<u8> {
    if let Some(start) = rfind(&data, TESTS_STARTING_MARKER) {
        if start > 0 {
            trace!("Dropping {} bytes preceding the last test run", start);
            data.drain(..start);
        }
    }
    data
}

// =============================================================================
// Private stuff
// =============================================================================

/// Reads up to and including the next `\n`. The timeout bounds the whole line;
/// whatever arrived when it elapses is returned, which is empty if the device
/// stayed silent. A timeout too large to be a point in time means no deadline.
fn read_line(transport: &mut dyn SerialTransport, timeout: Duration) -> io::Result<Vec<u8>> {
    let deadline = Instant::now().checked_add(timeout);
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => timeout,
        };
        if remaining == Duration::from_secs(0) {
            break;
        }
        if transport.read_timeout(&mut byte, remaining)? == 0 {
            break;
        }
        line.push(byte[0]);
        if byte[0] == b'\n' {
            break;
        }
    }
    Ok(line)
}

fn serial_io(err: io::Error) -> Error {
    Error::testing_with(FailureReason::SerialIo, err)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::path::Path;
    use std::rc::Rc;

    use super::*;
    use crate::utils::find;

    /// Replays scripted reads. `None` stands for a read that timed out.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub reads: VecDeque<Option<Vec<u8>>>,
        pub cleared: bool,
        pub timeouts: Vec<Duration>,
        pub fail_reads: bool,
        /// Shared with [`RecordingFlashTool::calls`] to check call order.
        pub calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(chunks: &[&[u8]]) -> Self {
            ScriptedTransport {
                reads: chunks.iter().map(|c| Some(c.to_vec())).collect(),
                ..Default::default()
            }
        }
    }

    impl SerialTransport for ScriptedTransport {
        fn clear_input(&mut self) -> io::Result<()> {
            self.cleared = true;
            self.calls.borrow_mut().push("clear");
            Ok(())
        }

        fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
            if self.fail_reads {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            self.timeouts.push(timeout);
            self.calls.borrow_mut().push("read");
            match self.reads.pop_front() {
                Some(Some(mut chunk)) => {
                    let count = std::cmp::min(buf.len(), chunk.len());
                    buf[..count].copy_from_slice(&chunk[..count]);
                    if count < chunk.len() {
                        chunk.drain(..count);
                        self.reads.push_front(Some(chunk));
                    }
                    Ok(count)
                }
                Some(None) | None => Ok(0),
            }
        }
    }

    /// Records calls and fails the ones it is told to.
    #[derive(Default, Clone)]
    pub(crate) struct RecordingFlashTool {
        pub resets: Rc<Cell<usize>>,
        pub flashes: Rc<Cell<usize>>,
        pub serials: Rc<RefCell<Vec<Option<String>>>>,
        pub fail_reset: bool,
        pub fail_flash: bool,
        pub calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl FlashTool for RecordingFlashTool {
        fn reset(&self, stlink_serial: Option<&str>) -> Result<()> {
            self.resets.set(self.resets.get() + 1);
            self.calls.borrow_mut().push("reset");
            self.serials.borrow_mut().push(stlink_serial.map(str::to_owned));
            if self.fail_reset {
                return Err(Error::testing(FailureReason::ResetFailed));
            }
            Ok(())
        }

        fn flash(&self, _binary: &Path, stlink_serial: Option<&str>) -> Result<()> {
            self.flashes.set(self.flashes.get() + 1);
            self.calls.borrow_mut().push("flash");
            self.serials.borrow_mut().push(stlink_serial.map(str::to_owned));
            if self.fail_flash {
                return Err(Error::testing(FailureReason::FlashFailed));
            }
            Ok(())
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(2);

    fn capture(transport: &mut ScriptedTransport) -> Result<Vec<u8>> {
        capture_test_output(transport, &RecordingFlashTool::default(), None, TIMEOUT)
    }

    #[test]
    fn clears_input_and_resets_before_reading() {
        let mut transport = ScriptedTransport::new(&[b"x\n"]);
        let tool = RecordingFlashTool::default();
        transport.calls = tool.calls.clone();
        capture_test_output(&mut transport, &tool, Some("0670FF48"), TIMEOUT).unwrap();
        assert!(transport.cleared);
        assert_eq!(tool.resets.get(), 1);
        assert_eq!(tool.flashes.get(), 0);
        assert_eq!(*tool.serials.borrow(), vec![Some("0670FF48".to_owned())]);
        assert_eq!(tool.calls.borrow()[..3], ["clear", "reset", "read"]);
    }

    #[test]
    fn unbounded_timeout_does_not_overflow() {
        let mut transport = ScriptedTransport::new(&[
            b"[==========] Running all tests.\n",
            b"[ RUN      ] Foo.Bar\n",
        ]);
        let output = capture_test_output(
            &mut transport,
            &RecordingFlashTool::default(),
            None,
            Duration::MAX,
        )
        .unwrap();
        assert_eq!(
            output,
            b"[==========] Running all tests.\n[ RUN      ] Foo.Bar\n".to_vec()
        );
        assert!(transport.timeouts.iter().all(|t| *t == Duration::MAX));
    }

    #[test]
    fn silent_device_fails() {
        let mut transport = ScriptedTransport::default();
        let err = capture(&mut transport).unwrap_err();
        assert_eq!(err.reason(), Some(FailureReason::DeviceSilent));
    }

    #[test]
    fn reset_failure_stops_capture() {
        let mut transport = ScriptedTransport::new(&[b"never read\n"]);
        let tool = RecordingFlashTool {
            fail_reset: true,
            ..Default::default()
        };
        let err = capture_test_output(&mut transport, &tool, None, TIMEOUT).unwrap_err();
        assert_eq!(err.reason(), Some(FailureReason::ResetFailed));
        assert_eq!(transport.reads.len(), 1);
    }

    #[test]
    fn read_error_is_serial_io() {
        let mut transport = ScriptedTransport {
            fail_reads: true,
            ..Default::default()
        };
        let err = capture(&mut transport).unwrap_err();
        assert_eq!(err.reason(), Some(FailureReason::SerialIo));
    }

    #[test]
    fn reads_until_silence() {
        let mut transport = ScriptedTransport::new(&[
            b"[==========] Running all tests.\r\n",
            b"[ RUN      ] Foo.Bar\r\n",
        ]);
        transport.reads.push_back(None);
        transport.reads.push_back(Some(b"after silence\n".to_vec()));
        let output = capture(&mut transport).unwrap();
        assert_eq!(
            output,
            b"[==========] Running all tests.\n[ RUN      ] Foo.Bar\n".to_vec()
        );
        // The line after the silent read was never consumed.
        assert_eq!(transport.reads.len(), 1);
    }

    #[test]
    fn done_marker_shortens_timeout() {
        let mut transport = ScriptedTransport::new(&[
            b"[==========] Running all tests.\n",
            b"[==========] Done running all tests.\n",
            b"[  PASSED  ] 1 test(s).\n",
        ]);
        capture(&mut transport).unwrap();
        assert_eq!(transport.timeouts.first(), Some(&TIMEOUT));
        assert!(*transport.timeouts.last().unwrap() <= DRAIN_TIMEOUT);
        assert!(transport.timeouts.iter().all(|t| *t <= TIMEOUT));
    }

    #[test]
    fn timeout_stays_long_without_done_marker() {
        let mut transport = ScriptedTransport::new(&[b"[==========] Running all tests.\n"]);
        capture(&mut transport).unwrap();
        assert!(transport.timeouts.iter().all(|t| *t > DRAIN_TIMEOUT));
    }

    #[test]
    fn partial_last_line_is_kept() {
        let mut transport = ScriptedTransport::new(&[b"boot\n", b"no newline"]);
        let output = capture(&mut transport).unwrap();
        assert_eq!(output, b"boot\nno newline".to_vec());
    }

    #[test]
    fn capture_starts_at_last_run() {
        let mut transport = ScriptedTransport::new(&[
            b"[==========] Running all tests.\n",
            b"garbage from a previous boot\n",
            b"[==========] Running all tests.\n",
            b"[==========] Done running all tests.\n",
        ]);
        let output = capture(&mut transport).unwrap();
        assert_eq!(
            output,
            b"[==========] Running all tests.\n[==========] Done running all tests.\n".to_vec()
        );
    }

    #[test]
    fn strip_removes_all_carriage_returns() {
        assert_eq!(
            strip_carriage_returns(b"a\r\nb\rc\r\r".to_vec()),
            b"a\nbc".to_vec()
        );
    }

    #[test]
    fn trim_without_start_marker_is_identity() {
        let data = b"some boot noise\n".to_vec();
        assert_eq!(trim_to_last_run(data.clone()), data);
        assert_eq!(trim_to_last_run(Vec::new()), Vec::<u8>::new());
    }

    #[test]
    fn trim_is_idempotent() {
        let data = b"noise\n[==========] Running all tests.\nA\n[==========] Running all tests.\nB\n"
            .to_vec();
        let once = trim_to_last_run(data);
        assert!(once.starts_with(TESTS_STARTING_MARKER));
        assert_eq!(find(&once[1..], TESTS_STARTING_MARKER), None);
        assert_eq!(trim_to_last_run(once.clone()), once);
    }
}
