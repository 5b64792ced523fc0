//! Pin-level plumbing between the bridge and whatever is simulating the JTAG target.  A
//! simulator hands us one byte per signal; `SignalLine` dresses such a byte up as an
//! `embedded-hal` pin so the bridge can drive any `OutputPin`, simulated or not.
use core::convert::Infallible;

use embedded_hal::digital::{Error as _, ErrorType, InputPin, OutputPin, PinState, StatefulOutputPin};

use crate::error::{Error, Result};

/// Levels of the four signals the debugger drives into the target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinLevels {
    pub tck: bool,
    pub tms: bool,
    pub tdi: bool,
    pub trstn: bool,
}

impl Default for PinLevels {
    fn default() -> Self {
        Self {
            tck: true,
            tms: true,
            tdi: true,
            trstn: true,
        }
    }
}

/// A single-byte signal owned by the simulator.  Zero is low, anything else is high.
pub struct SignalLine<'a> {
    level: &'a mut u8,
}

impl<'a> SignalLine<'a> {
    pub fn new(level: &'a mut u8) -> Self {
        Self { level }
    }

    /// Wrap a pointer handed over by a C caller.  Returns `None` for null.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or valid for reads and writes for `'a`, with no other access to the
    /// byte while the line is alive.
    pub unsafe fn from_ptr(ptr: *mut u8) -> Option<Self> {
        ptr.as_mut().map(Self::new)
    }

    pub fn level(&self) -> bool {
        *self.level != 0
    }
}

impl ErrorType for SignalLine<'_> {
    type Error = Infallible;
}

impl OutputPin for SignalLine<'_> {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        *self.level = 0;
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        *self.level = 1;
        Ok(())
    }
}

impl StatefulOutputPin for SignalLine<'_> {
    fn is_set_high(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(self.level())
    }

    fn is_set_low(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(!self.level())
    }
}

impl InputPin for SignalLine<'_> {
    fn is_high(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(self.level())
    }

    fn is_low(&mut self) -> core::result::Result<bool, Self::Error> {
        Ok(!self.level())
    }
}

pub struct JtagPins<Tck, Tms, Tdi, Trst> where Tck: OutputPin, Tms: OutputPin, Tdi: OutputPin, Trst: OutputPin {
    pub tck: Tck,
    pub tms: Tms,
    pub tdi: Tdi,
    pub trstn: Trst,
}

impl<Tck, Tms, Tdi, Trst> JtagPins<Tck, Tms, Tdi, Trst> where Tck: OutputPin, Tms: OutputPin, Tdi: OutputPin, Trst: OutputPin {
    pub fn new(tck: Tck, tms: Tms, tdi: Tdi, trstn: Trst) -> Self {
        Self { tck, tms, tdi, trstn }
    }

    /// Drive every line to the level in `levels`
    pub fn drive(&mut self, levels: PinLevels) -> Result<()> {
        set(&mut self.tck, levels.tck)?;
        set(&mut self.tms, levels.tms)?;
        set(&mut self.tdi, levels.tdi)?;
        set(&mut self.trstn, levels.trstn)
    }
}

fn set<P: OutputPin>(pin: &mut P, high: bool) -> Result<()> {
    pin.set_state(PinState::from(high))
        .map_err(|e| Error::Pin(e.kind()))
}
