//! Disk temperatures from the hddtemp daemon.
//!
//! This module provides:
//! - `parser`: the hddtemp line-protocol parser
//! - `transport`: TCP access to the daemon
//! - `poller`: the periodic loop that republishes readings

pub mod parser;
pub mod poller;
pub mod transport;

use std::io;

pub use parser::{parse_record, parse_response, HddTempRecord, ParseError, ParsedResponse};
pub use poller::HddTempPoller;
pub use transport::{Dialer, Exchange, TcpDialer};

/// Default address of the hddtemp daemon.
pub const DEFAULT_HDDTEMP_ADDRESS: &str = "localhost:7634";

/// Errors that abort one hddtemp poll cycle.
#[derive(Debug, thiserror::Error)]
pub enum HddTempError {
    #[error("error connecting to hddtemp address '{address}': {source}")]
    Connection {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("error reading from hddtemp socket: {0}")]
    Io(#[source] io::Error),

    #[error("error parsing output from hddtemp: {0}")]
    Parse(#[from] ParseError),
}
