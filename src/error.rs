use std::io;
use std::net::SocketAddr;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("error resolving address '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("resolving host '{host}' returned no results")]
    NoAddresses { host: String },

    #[error("failed connecting to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed connecting to any address of host '{host}'")]
    Exhausted { host: String },

    #[error("failed writing to '{peer}': {source}")]
    Write {
        peer: String,
        #[source]
        source: io::Error,
    },

    #[error("failed reading from '{peer}': {source}")]
    Read {
        peer: String,
        #[source]
        source: io::Error,
    },

    #[error("'{peer}' closed the connection")]
    ConnectionClosed { peer: String },

    #[error("{call} returned error: {source}")]
    LocalJournal {
        call: &'static str,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Errors after which the connect sequence is not restarted.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Error::Resolve { .. } | Error::NoAddresses { .. } | Error::Exhausted { .. }
        )
    }

    pub(crate) fn local_journal(call: &'static str, rc: i32) -> Self {
        Error::LocalJournal {
            call,
            source: io::Error::from_raw_os_error(rc.saturating_abs()),
        }
    }
}
