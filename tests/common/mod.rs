#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use sim_jtag::pins::{JtagPins, PinLevels, SignalLine};
use sim_jtag::statemachine::{JtagState, TapTracker};
use sim_jtag::{Config, RemoteBitbang};

pub const IR_LEN: usize = 5;
pub const IDCODE: u32 = 0x1234_5a6b;

pub const INSTR_IDCODE: u32 = 0b00001;
pub const INSTR_USER: u32 = 0b00010;
pub const INSTR_BYPASS: u32 = 0b11111;

/// Behavioural model of a single TAP with IDCODE, BYPASS and one 32 bit user register
pub struct SimTap {
    tracker: TapTracker,
    ir: u32,
    ir_shift: u32,
    dr_shift: u32,
    dr_len: usize,
    user: u32,
}

impl SimTap {
    pub fn new() -> Self {
        Self {
            tracker: TapTracker::new(),
            ir: INSTR_IDCODE,
            ir_shift: 0,
            dr_shift: 0,
            dr_len: 32,
            user: 0,
        }
    }

    /// Apply the pins for one cycle and return TDO
    pub fn clock(&mut self, levels: PinLevels) -> bool {
        if let Some(during) = self.tracker.observe(levels) {
            self.edge(during, levels.tdi);
        }
        if self.tracker.state() == JtagState::Reset {
            self.ir = INSTR_IDCODE;
        }

        match self.tracker.state() {
            JtagState::ShiftIR => self.ir_shift & 1 == 1,
            JtagState::ShiftDR => self.dr_shift & 1 == 1,
            _ => false,
        }
    }

    fn edge(&mut self, during: JtagState, tdi: bool) {
        match during {
            JtagState::CaptureIR => self.ir_shift = 0b00001,
            JtagState::ShiftIR => {
                self.ir_shift = (self.ir_shift >> 1) | ((tdi as u32) << (IR_LEN - 1));
            }
            JtagState::UpdateIR => self.ir = self.ir_shift,
            JtagState::CaptureDR => {
                (self.dr_shift, self.dr_len) = match self.ir {
                    INSTR_IDCODE => (IDCODE, 32),
                    INSTR_USER => (self.user, 32),
                    _ => (0, 1),
                };
            }
            JtagState::ShiftDR => {
                self.dr_shift = (self.dr_shift >> 1) | ((tdi as u32) << (self.dr_len - 1));
            }
            JtagState::UpdateDR => {
                if self.ir == INSTR_USER {
                    self.user = self.dr_shift;
                }
            }
            _ => {}
        }
    }
}

/// What the simulation looked like when the debugger let it go
pub struct Report {
    pub status: i32,
    pub cycles: u64,
    pub srst: bool,
    pub led: bool,
}

pub struct Sim {
    pub addr: SocketAddr,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Report>,
}

impl Sim {
    pub fn join(self) -> Report {
        self.handle.join().expect("simulation thread panicked")
    }

    /// End the simulation whether or not the session has finished.  A connected debugger
    /// must hang up first, since a waiting bridge blocks on it.
    pub fn stop(self) -> Report {
        self.stop.store(true, Ordering::Relaxed);
        self.join()
    }
}

pub fn local_config() -> Config {
    Config {
        bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        ..Config::default()
    }
}

/// Run a bridge and a `SimTap` in a background thread, the way an HDL simulator would
pub fn spawn(config: Config) -> Sim {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut bridge = RemoteBitbang::with_config(config).expect("open bridge");
    let addr = bridge.local_addr().expect("bridge address");
    let stop = Arc::new(AtomicBool::new(false));
    let stopped = Arc::clone(&stop);

    let handle = thread::spawn(move || {
        let mut tap = SimTap::new();
        let (mut tck, mut tms, mut tdi, mut trstn) = (0u8, 0u8, 0u8, 0u8);
        let mut tdo = false;
        let mut cycles = 0;

        while !bridge.done() && !stopped.load(Ordering::Relaxed) {
            let mut pins = JtagPins::new(
                SignalLine::new(&mut tck),
                SignalLine::new(&mut tms),
                SignalLine::new(&mut tdi),
                SignalLine::new(&mut trstn),
            );
            bridge.tick(&mut pins, tdo).expect("tick");
            tdo = tap.clock(PinLevels {
                tck: tck != 0,
                tms: tms != 0,
                tdi: tdi != 0,
                trstn: trstn != 0,
            });
            cycles += 1;

            if !bridge.is_connected() {
                thread::yield_now();
            }
        }

        Report {
            status: bridge.status(),
            cycles,
            srst: bridge.srst(),
            led: bridge.led(),
        }
    });

    Sim { addr, stop, handle }
}
