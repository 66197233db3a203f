//! Logging of opaque text produced by the flash tool or the device.

use hexplay::HexViewBuilder;
use log::{log, log_enabled, trace, Level};

/// Logs `output` line by line at the given level, replacing invalid UTF-8.
pub(crate) fn log_lines(level: Level, output: &[u8]) {
    if !log_enabled!(level) {
        return;
    }
    for line in String::from_utf8_lossy(output).lines() {
        log!(level, "{}", line);
    }
}

/// Dumps the raw bytes in a hex table when trace logging is on.
pub(crate) fn log_hex_dump(data: &[u8]) {
    if log_enabled!(Level::Trace) {
        let view = HexViewBuilder::new(data)
            .address_offset(0)
            .row_width(16)
            .finish();
        trace!("\n{}", view);
    }
}
