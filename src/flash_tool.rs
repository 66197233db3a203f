//! Flashing and resetting the target through an external on-chip debugger.
//!
//! The only implementation drives [OpenOCD](https://openocd.org) as a
//! subprocess. Its output is treated as opaque log text and only the exit
//! status decides success or failure. Nothing is retried: a failing flash tool
//! almost always means a disconnected or misconfigured board.

use std::env;
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use log::{debug, info, Level};

use crate::error::{Error, FailureReason, Result};
use crate::utils::log_lines;

// =============================================================================
// Public Interface
// =============================================================================

/// Environment variable pointing at the install directory that contains the
/// OpenOCD scripts under `share/openocd/scripts`.
pub const INSTALL_DIR_ENV: &str = "PW_PIGWEED_CIPD_INSTALL_DIR";
/// Environment variable overriding the OpenOCD executable.
pub const OPENOCD_PATH_ENV: &str = "OPENOCD_PATH";
/// Passed to OpenOCD to pin it to one ST-Link when several are attached.
pub const STLINK_SERIAL_ENV: &str = "PW_STLINK_SERIAL";
/// Passed to OpenOCD to turn off its GDB server.
pub const GDB_PORT_ENV: &str = "PW_GDB_PORT";

/// Resets or programs the target device.
pub trait FlashTool {
    /// Resets the device and lets it run.
    fn reset(&self, stlink_serial: Option<&str>) -> Result<()>;

    /// Programs `binary` into the device, then resets it.
    fn flash(&self, binary: &Path, stlink_serial: Option<&str>) -> Result<()>;
}

/// [`FlashTool`] backed by the `openocd` executable.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OpenOcd {
    program: PathBuf,
    scripts_dir: PathBuf,
    config: PathBuf,
}

impl OpenOcd {
    /// Locates OpenOCD and its scripts from the environment and uses the given
    /// configuration file.
    pub fn from_env(config: impl Into<PathBuf>) -> Self {
        let program = env::var_os(OPENOCD_PATH_ENV).unwrap_or_else(|| OsString::from("openocd"));
        let install_dir = env::var_os(INSTALL_DIR_ENV).unwrap_or_default();
        OpenOcd::new(
            program,
            Path::new(&install_dir).join("share").join("openocd").join("scripts"),
            config,
        )
    }

    pub fn new(
        program: impl Into<PathBuf>,
        scripts_dir: impl Into<PathBuf>,
        config: impl Into<PathBuf>,
    ) -> Self {
        OpenOcd {
            program: program.into(),
            scripts_dir: scripts_dir.into(),
            config: config.into(),
        }
    }

    /// Builds the OpenOCD invocation running each of `commands` in order.
    ///
    /// The child inherits the current environment, with the GDB port disabled
    /// so that independent processes can each drive their own board.
    pub fn command(&self, commands: &[&str], stlink_serial: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-s").arg(&self.scripts_dir);
        cmd.arg("-f").arg(&self.config);
        for c in commands {
            cmd.arg("-c").arg(c);
        }
        if let Some(serial) = stlink_serial {
            cmd.env(STLINK_SERIAL_ENV, serial);
        }
        cmd.env(GDB_PORT_ENV, "disabled");
        cmd
    }

    fn invoke(&self, cmd: Command, reason: FailureReason) -> Result<()> {
        debug!("Running {:?}", cmd);
        let (status, output) = run_combined(cmd)
            .map_err(|e| Error::testing_with(reason, format!("{:?}: {}", self.program, e)))?;

        if !status.success() {
            log_lines(Level::Error, &output);
            return Err(Error::testing_with(reason, status));
        }

        log_lines(Level::Debug, &output);
        Ok(())
    }
}

/// Runs `cmd` to completion with stdout and stderr sharing one pipe, so the
/// returned output keeps the order in which the child wrote it.
fn run_combined(mut cmd: Command) -> io::Result<(ExitStatus, Vec<u8>)> {
    let (mut reader, writer) = io::pipe()?;
    cmd.stdin(Stdio::null())
        .stdout(writer.try_clone()?)
        .stderr(writer);
    let mut child = cmd.spawn()?;
    // The command still holds the write ends; the read below only sees EOF
    // once they are gone.
    drop(cmd);

    let mut output = Vec::new();
    let read = reader.read_to_end(&mut output);
    let status = child.wait()?;
    read?;
    Ok((status, output))
}

impl FlashTool for OpenOcd {
    fn reset(&self, stlink_serial: Option<&str>) -> Result<()> {
        debug!("Resetting device");
        let cmd = self.command(&["init", "reset run", "exit"], stlink_serial);
        self.invoke(cmd, FailureReason::ResetFailed)?;
        debug!("Successfully reset device");
        Ok(())
    }

    fn flash(&self, binary: &Path, stlink_serial: Option<&str>) -> Result<()> {
        info!("Flashing firmware to device");
        let program = format!("program {} reset exit", binary.display());
        let cmd = self.command(&[&program], stlink_serial);
        self.invoke(cmd, FailureReason::FlashFailed)?;
        debug!("Successfully flashed firmware to device");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
