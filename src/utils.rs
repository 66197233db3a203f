//! Helper functions shared by the test run stages.

mod bytes;
mod output;

pub(crate) use bytes::{find, rfind};
pub(crate) use output::{log_hex_dump, log_lines};
