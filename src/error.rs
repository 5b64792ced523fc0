use std::io;
use std::net::SocketAddr;

use embedded_hal::digital::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to listen for remote bitbang connections on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("remote bitbang socket error: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported remote bitbang command {0:#04x}")]
    UnsupportedCommand(u8),

    #[error("unexpected reply {0:#04x} to a TDO read")]
    UnexpectedReply(u8),

    #[error("remote bitbang peer closed the connection")]
    Disconnected,

    #[error("port {0} is out of range")]
    InvalidPort(u32),

    #[error("invalid value {value:?} for {var}")]
    Config { var: &'static str, value: String },

    #[error("failed to drive JTAG pin: {0}")]
    Pin(ErrorKind),

    #[error("{bits} bits requested from a {len} byte buffer")]
    ShortBuffer { bits: u8, len: usize },
}

pub type Result<T> = core::result::Result<T, Error>;
