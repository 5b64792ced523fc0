//! The TAP controller state machine, from both ends of the wire.  `TapTracker` follows a TAP
//! from the levels on its pins, which is what the bridge does to report where the target is.
//! `JtagSM` is the debugger's view: it keeps track of the state it has put the chain in, and
//! gets to any requested state by the shortest TMS sequence.
use std::collections::VecDeque;

use crate::cable::Cable;
use crate::error::Result;
use crate::pins::PinLevels;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    Data,
    Instruction
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JtagState {
    Reset = 0,
    Idle = 1,
    SelectDR = 2,
    CaptureDR = 3,
    ShiftDR = 4,
    Exit1DR = 5,
    PauseDR = 6,
    Exit2DR = 7,
    UpdateDR = 8,
    SelectIR = 9,
    CaptureIR = 10,
    ShiftIR = 11,
    Exit1IR = 12,
    PauseIR = 13,
    Exit2IR = 14,
    UpdateIR = 15,
}

impl JtagState {
    /// The state after one TCK rising edge with TMS at `tms`
    pub const fn next(self, tms: bool) -> Self {
        use JtagState::*;
        match (self, tms) {
            (Reset, false) => Idle,
            (Reset, true) => Reset,
            (Idle, false) => Idle,
            (Idle, true) => SelectDR,

            (SelectDR, false) => CaptureDR,
            (SelectDR, true) => SelectIR,
            (CaptureDR, false) | (Exit2DR, false) | (ShiftDR, false) => ShiftDR,
            (CaptureDR, true) | (ShiftDR, true) => Exit1DR,
            (Exit1DR, false) | (PauseDR, false) => PauseDR,
            (Exit1DR, true) | (Exit2DR, true) => UpdateDR,
            (PauseDR, true) => Exit2DR,

            (SelectIR, false) => CaptureIR,
            (SelectIR, true) => Reset,
            (CaptureIR, false) | (Exit2IR, false) | (ShiftIR, false) => ShiftIR,
            (CaptureIR, true) | (ShiftIR, true) => Exit1IR,
            (Exit1IR, false) | (PauseIR, false) => PauseIR,
            (Exit1IR, true) | (Exit2IR, true) => UpdateIR,
            (PauseIR, true) => Exit2IR,

            (UpdateDR, false) | (UpdateIR, false) => Idle,
            (UpdateDR, true) | (UpdateIR, true) => SelectDR,
        }
    }
}

/// Follows a TAP controller by watching its pins
#[derive(Clone, Copy, Debug)]
pub struct TapTracker {
    state: JtagState,
    tck: bool,
}

impl Default for TapTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TapTracker {
    pub const fn new() -> Self {
        Self {
            state: JtagState::Reset,
            tck: false,
        }
    }

    pub fn state(&self) -> JtagState {
        self.state
    }

    /// Feed in the current pin levels.  On a rising edge of TCK the state advances, and the
    /// state the TAP was in during the edge is returned.  TRSTn low holds the TAP in Reset.
    pub fn observe(&mut self, levels: PinLevels) -> Option<JtagState> {
        let rising = levels.tck && !self.tck;
        self.tck = levels.tck;

        if !levels.trstn {
            self.state = JtagState::Reset;
            return None;
        }
        if !rising {
            return None;
        }

        let during = self.state;
        self.state = during.next(levels.tms);
        Some(during)
    }
}

/// Shortest TMS sequence from `from` to `to`.  Every state is reachable from every other, so
/// the search always succeeds.
fn tms_path(from: JtagState, to: JtagState) -> Vec<bool> {
    let mut prev: [Option<(JtagState, bool)>; 16] = [None; 16];
    let mut queue = VecDeque::from([from]);

    while let Some(state) = queue.pop_front() {
        if state == to {
            break;
        }
        for tms in [false, true] {
            let next = state.next(tms);
            if next != from && prev[next as usize].is_none() {
                prev[next as usize] = Some((state, tms));
                queue.push_back(next);
            }
        }
    }

    let mut path = Vec::new();
    let mut state = to;
    while state != from {
        match prev[state as usize] {
            Some((before, tms)) => {
                path.push(tms);
                state = before;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

pub struct JtagSM<T> {
    pub cable: T,
    state: JtagState,
}

impl<T, U> JtagSM<T>
    where T: core::ops::DerefMut<Target=U>,
          U: Cable + ?Sized
{
    /// Create a JTAG state machine using an existing `Cable`.  The chain is reset on the way.
    pub fn new(cable: T) -> Result<Self> {
        let mut sm = Self {
            cable,
            state: JtagState::Reset,
        };
        sm.mode_reset()?;
        Ok(sm)
    }

    pub fn state(&self) -> JtagState {
        self.state
    }

    /// Reset the scan chain by driving TMS high for 5 clocks
    pub fn mode_reset(&mut self) -> Result<()> {
        self.cable.change_mode(&[true; 5], true)?;
        self.state = JtagState::Reset;
        Ok(())
    }

    /// Use TMS to get into `state` by the most efficient path
    pub fn change_mode(&mut self, state: JtagState) -> Result<()> {
        if self.state == state {
            return Ok(());
        }

        let path = tms_path(self.state, state);
        log::trace!("{:?} -> {:?} via {:?}", self.state, state, path);
        self.cable.change_mode(&path, true)?;
        self.state = state;
        Ok(())
    }

    fn enter_shift(&mut self, reg: Register) -> Result<()> {
        match reg {
            Register::Data => self.change_mode(JtagState::ShiftDR),
            Register::Instruction => self.change_mode(JtagState::ShiftIR),
        }
    }

    fn left_shift(&mut self, reg: Register, pause_after: bool) {
        if pause_after {
            self.state = match reg {
                Register::Data => JtagState::PauseDR,
                Register::Instruction => JtagState::PauseIR,
            };
        }
    }

    /// Read `bits` from either the instruction or data register
    pub fn read_reg(&mut self, reg: Register, bits: usize) -> Result<Vec<u8>> {
        self.enter_shift(reg)?;
        self.cable.read_data(bits)
    }

    /// Write `data` into either the instruction or data register.  `bits` indicates how many bits
    /// of the last byte should be written (8 indicates that the entire byte should be written).
    /// The mode will either be ShiftIR / ShiftDR if `pause_after` is false, or PauseIR / PauseDR
    /// if `pause_after` is true.  This allows for setting the register with multiple calls to
    /// `write_reg`, which may be more convenient than manual bit-shifting.
    pub fn write_reg(&mut self, reg: Register, data: &[u8], bits: u8, pause_after: bool) -> Result<()> {
        self.enter_shift(reg)?;
        self.cable.write_data(data, bits, pause_after)?;
        self.left_shift(reg, pause_after);
        Ok(())
    }

    /// Similar to `write_reg` except it returns the bits that were shifted out during writing.
    pub fn read_write_reg(&mut self, reg: Register, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>> {
        self.enter_shift(reg)?;
        let out = self.cable.read_write_data(data, bits, pause_after)?;
        self.left_shift(reg, pause_after);
        Ok(out)
    }
}
