//! This crate connects a JTAG debugger to a simulated chip.  A hardware simulation has no JTAG
//! cable to plug into, so instead the simulation calls into this crate once per clock, and a
//! debugger such as OpenOCD drives the JTAG pins over TCP using the remote bitbang protocol.
//!
//! The `bridge` module is the server side.  `RemoteBitbang` listens for the debugger and, on each
//! tick, executes one of its commands: pin writes, TDO reads, resets, and finally quit, which
//! ends the simulation.  The levels it wants on TCK, TMS, TDI and TRSTn are driven through any
//! `embedded-hal` `OutputPin`; for a simulator, `pins::SignalLine` turns the simulator's signal
//! bytes into such pins.
//!
//! Harnesses written in C or SystemVerilog DPI use the functions in `ffi`.  `jtag_tick` keeps
//! the traditional one-call-per-clock interface, with the bridge created on the first call;
//! `jtag_open` / `jtag_handle_tick` / `jtag_close` make the lifetime explicit instead.
//!
//! The other end of the wire is here too.  `cable::remote_bitbang::RemoteBitbangClient`
//! implements the `Cable` trait over the same protocol, and `statemachine::JtagSM` keeps track of
//! the TAP state on top of any `Cable`, so you can read and write the instruction and data
//! registers of a simulated TAP from Rust.
//!
//! # Example
//! ```no_run
//! use sim_jtag::bridge::RemoteBitbang;
//! use sim_jtag::pins::{JtagPins, SignalLine};
//!
//! let mut bridge = RemoteBitbang::open(9823)?;
//! let (mut tck, mut tms, mut tdi, mut trstn) = (0u8, 0u8, 0u8, 0u8);
//! let mut tdo = false;
//! while !bridge.done() {
//!     let mut pins = JtagPins::new(
//!         SignalLine::new(&mut tck),
//!         SignalLine::new(&mut tms),
//!         SignalLine::new(&mut tdi),
//!         SignalLine::new(&mut trstn),
//!     );
//!     bridge.tick(&mut pins, tdo)?;
//!     // ...clock the simulated design with the new pin values and sample its TDO...
//!     # tdo = !tdo;
//! }
//! println!("exit code {}", bridge.exit_code());
//! # Ok::<(), sim_jtag::Error>(())
//! ```

pub mod bridge;
pub mod cable;
pub mod config;
pub mod error;
#[cfg(feature = "ffi")]
pub mod ffi;
pub mod pins;
pub mod protocol;
pub mod statemachine;

pub use bridge::{status_word, RemoteBitbang};
pub use config::Config;
pub use error::{Error, Result};
