//! C entry points for simulator harnesses.  `jtag_tick` is the drop-in for harnesses that call a
//! single function every clock; new harnesses should `jtag_open` a handle once and pass it to
//! `jtag_handle_tick`.
use core::ffi::c_int;
use core::ptr;

use log::{error, warn};
use parking_lot::Mutex;

use crate::bridge::{status_word, RemoteBitbang};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pins::{JtagPins, SignalLine};

/// What a tick reports when there is no bridge to drive: finished, exit code 1
const FAILED: c_int = status_word(true, 1);

struct Session {
    bridge: RemoteBitbang,
    port: u32,
    warned: bool,
}

static SESSION: Mutex<Option<Session>> = Mutex::new(None);

fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn open(port: u32) -> Result<RemoteBitbang> {
    let port = u16::try_from(port).map_err(|_| Error::InvalidPort(port))?;
    RemoteBitbang::with_config(Config::from_env(port)?)
}

/// Run one tick of `bridge` against the pins behind the pointers
///
/// # Safety
///
/// Each pointer must be null or valid for reads and writes for the duration of the call.
unsafe fn tick_pins(
    bridge: &mut RemoteBitbang,
    tck: *mut u8,
    tms: *mut u8,
    tdi: *mut u8,
    trstn: *mut u8,
    tdo: u8,
) -> c_int {
    let lines = (
        SignalLine::from_ptr(tck),
        SignalLine::from_ptr(tms),
        SignalLine::from_ptr(tdi),
        SignalLine::from_ptr(trstn),
    );
    let (Some(tck), Some(tms), Some(tdi), Some(trstn)) = lines else {
        error!("jtag tick called with a null pin pointer");
        return FAILED;
    };

    let mut pins = JtagPins::new(tck, tms, tdi, trstn);
    if let Err(e) = bridge.tick(&mut pins, tdo != 0) {
        error!("jtag tick failed: {}", e);
    }
    bridge.status()
}

/// Drive the process-wide bridge for one clock.  The bridge is created on the first call,
/// listening on `jtag_port`; the port passed to later calls is ignored.
///
/// Returns 0 while the debugger session runs, `(exit_code << 1) | 1` once it is over.
///
/// # Safety
///
/// The pin pointers must be null or valid for reads and writes for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn jtag_tick(
    jtag_tck: *mut u8,
    jtag_tms: *mut u8,
    jtag_tdi: *mut u8,
    jtag_trstn: *mut u8,
    jtag_tdo: u8,
    jtag_port: u32,
) -> c_int {
    let mut session = SESSION.lock();

    if session.is_none() {
        init_logging();
        match open(jtag_port) {
            Ok(bridge) => {
                *session = Some(Session {
                    bridge,
                    port: jtag_port,
                    warned: false,
                })
            }
            Err(e) => {
                error!("failed to start JTAG remote bitbang bridge: {}", e);
                return FAILED;
            }
        }
    }

    let Some(session) = session.as_mut() else {
        return FAILED;
    };
    if jtag_port != session.port && !session.warned {
        warn!(
            "ignoring JTAG port {}, the bridge is already listening on port {}",
            jtag_port, session.port
        );
        session.warned = true;
    }

    tick_pins(&mut session.bridge, jtag_tck, jtag_tms, jtag_tdi, jtag_trstn, jtag_tdo)
}

/// Start a bridge listening on `port` (0 for any free port).  Returns null on failure.
#[no_mangle]
pub extern "C" fn jtag_open(port: u32) -> *mut RemoteBitbang {
    init_logging();
    match open(port) {
        Ok(bridge) => Box::into_raw(Box::new(bridge)),
        Err(e) => {
            error!("failed to start JTAG remote bitbang bridge: {}", e);
            ptr::null_mut()
        }
    }
}

/// Drive the bridge behind `handle` for one clock.  Same return value as `jtag_tick`.
///
/// # Safety
///
/// `handle` must be null or come from `jtag_open` and not have been closed.  The pin pointers
/// must be null or valid for reads and writes for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn jtag_handle_tick(
    handle: *mut RemoteBitbang,
    jtag_tck: *mut u8,
    jtag_tms: *mut u8,
    jtag_tdi: *mut u8,
    jtag_trstn: *mut u8,
    jtag_tdo: u8,
) -> c_int {
    match handle.as_mut() {
        Some(bridge) => tick_pins(bridge, jtag_tck, jtag_tms, jtag_tdi, jtag_trstn, jtag_tdo),
        None => {
            error!("jtag_handle_tick called without an open bridge");
            FAILED
        }
    }
}

/// The TCP port the bridge is listening on, or -1
///
/// # Safety
///
/// `handle` must be null or come from `jtag_open` and not have been closed.
#[no_mangle]
pub unsafe extern "C" fn jtag_handle_port(handle: *const RemoteBitbang) -> c_int {
    handle
        .as_ref()
        .and_then(|bridge| bridge.local_addr().ok())
        .map_or(-1, |addr| c_int::from(addr.port()))
}

/// Shut the bridge down and free it
///
/// # Safety
///
/// `handle` must be null or come from `jtag_open`, and must not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn jtag_close(handle: *mut RemoteBitbang) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}
