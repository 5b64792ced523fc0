//! The debugger's end of the wire.  Anything that can wiggle TCK/TMS/TDI and sample TDO should
//! implement the `Cable` trait; `JtagSM` builds register access on top of it.
pub mod remote_bitbang;

use crate::error::Result;

pub trait Cable {
    /// Clock out a series of TMS values to change the state of the JTAG chain.  `tdi` controls the
    /// state of the TDI line during mode changes.
    fn change_mode(&mut self, tms: &[bool], tdi: bool) -> Result<()>;
    /// Shift in bits from the TDO line.  `bits` is the total number of bits to read.  Should be
    /// called with state = ShiftIR or ShiftDR, and will remain in that state.  Should clock out
    /// all ones.
    fn read_data(&mut self, bits: usize) -> Result<Vec<u8>>;
    /// Shift out bits on the TDI line, least significant bit first.  `bits` is the number of bits
    /// to send from the last byte.  Should be called with state = ShiftIR or ShiftDR.  State
    /// won't change unless `pause_after` is true, in which case it will be PauseIR or PauseDR on
    /// exit.
    fn write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<()>;

    fn read_write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>>;
}

/// Pack sampled bits into bytes, first bit in the LSB of the first byte
pub(crate) fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut buf = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        buf[i / 8] |= (*bit as u8) << (i % 8);
    }
    buf
}
