use std::env;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::{Error, Result};

/// Address to bind instead of every interface
pub const BIND_VAR: &str = "SIM_JTAG_BIND";
/// When true, ticks don't wait for the debugger to send a command
pub const POLL_VAR: &str = "SIM_JTAG_POLL";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: IpAddr,
    /// TCP port to listen on, 0 picks a free one
    pub port: u16,
    /// Stall each tick until the debugger has sent a command.  This keeps the simulated clock in
    /// lock step with the debugger.
    pub wait_for_command: bool,
    /// A quit from the debugger finishes the simulation.  Otherwise the bridge goes back to
    /// waiting for the next connection.
    pub quit_ends_session: bool,
    pub recv_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            wait_for_command: true,
            quit_ends_session: true,
            recv_buffer: 4096,
        }
    }
}

impl Config {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Default config on `port`, adjusted by `SIM_JTAG_BIND` and `SIM_JTAG_POLL`
    pub fn from_env(port: u16) -> Result<Self> {
        Self::from_lookup(port, |var| env::var(var).ok())
    }

    fn from_lookup(port: u16, lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self> {
        let mut config = Self::with_port(port);

        if let Some(value) = lookup(BIND_VAR) {
            config.bind_addr = value.trim().parse().map_err(|_| Error::Config {
                var: BIND_VAR,
                value,
            })?;
        }

        if let Some(value) = lookup(POLL_VAR) {
            config.wait_for_command = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => false,
                "0" | "false" | "no" | "" => true,
                _ => return Err(Error::Config { var: POLL_VAR, value }),
            };
        }

        Ok(config)
    }
}
