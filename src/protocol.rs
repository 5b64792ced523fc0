//! The remote bitbang wire protocol.  Every request from the debugger is a single ASCII byte; the
//! only reply the bridge ever sends is the TDO level, `'0'` or `'1'`, in answer to `R`.
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Turn the activity LED on (`B`) or off (`b`)
    Blink(bool),
    /// Sample TDO and send it back
    Read,
    /// The debugger is done with this session
    Quit,
    /// Set TCK, TMS and TDI in one go
    Write { tck: bool, tms: bool, tdi: bool },
    /// Set the reset lines.  `true` means the reset is asserted.
    Reset { trst: bool, srst: bool },
}

impl Command {
    pub fn decode(byte: u8) -> Result<Self> {
        let cmd = match byte {
            b'B' => Command::Blink(true),
            b'b' => Command::Blink(false),
            b'R' => Command::Read,
            b'Q' => Command::Quit,
            b'0'..=b'7' => {
                let bits = byte - b'0';
                Command::Write {
                    tck: bits & 4 != 0,
                    tms: bits & 2 != 0,
                    tdi: bits & 1 != 0,
                }
            }
            b'r'..=b'u' => {
                let bits = byte - b'r';
                Command::Reset {
                    trst: bits & 2 != 0,
                    srst: bits & 1 != 0,
                }
            }
            _ => return Err(Error::UnsupportedCommand(byte)),
        };
        Ok(cmd)
    }

    pub fn encode(self) -> u8 {
        match self {
            Command::Blink(true) => b'B',
            Command::Blink(false) => b'b',
            Command::Read => b'R',
            Command::Quit => b'Q',
            Command::Write { tck, tms, tdi } => {
                b'0' + ((tck as u8) << 2 | (tms as u8) << 1 | tdi as u8)
            }
            Command::Reset { trst, srst } => b'r' + ((trst as u8) << 1 | srst as u8),
        }
    }
}

pub fn encode_tdo(tdo: bool) -> u8 {
    if tdo {
        b'1'
    } else {
        b'0'
    }
}

pub fn decode_tdo(byte: u8) -> Result<bool> {
    match byte {
        b'0' => Ok(false),
        b'1' => Ok(true),
        _ => Err(Error::UnexpectedReply(byte)),
    }
}
