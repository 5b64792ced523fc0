use std::io::{self, Read, Write};
use std::mem;
use std::net::{TcpStream, ToSocketAddrs};

use log::{debug, info};

use crate::cable::{pack_bits, Cable};
use crate::error::{Error, Result};
use crate::protocol::{decode_tdo, Command};

/// Drives a JTAG chain through a remote bitbang server, such as the one in `bridge`.
///
/// Commands are queued up and only hit the socket once per operation, so a whole register scan
/// costs a single round trip.
pub struct RemoteBitbangClient<S = TcpStream> where S: Read + Write {
    stream: S,
    queued: Vec<u8>,
    reads: usize,
}

impl RemoteBitbangClient<TcpStream> {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        info!("connected to remote bitbang server at {}", stream.peer_addr()?);
        Ok(Self::new(stream))
    }
}

impl<S> RemoteBitbangClient<S> where S: Read + Write {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            queued: Vec::new(),
            reads: 0,
        }
    }

    fn push(&mut self, cmd: Command) {
        if cmd == Command::Read {
            self.reads += 1;
        }
        self.queued.push(cmd.encode());
    }

    /// One TCK period: falling edge, optionally sample TDO, rising edge
    fn clock(&mut self, tms: bool, tdi: bool, sample: bool) {
        self.push(Command::Write { tck: false, tms, tdi });
        if sample {
            self.push(Command::Read);
        }
        self.push(Command::Write { tck: true, tms, tdi });
    }

    /// Send everything queued and collect the TDO samples it asked for
    fn flush(&mut self) -> Result<Vec<bool>> {
        // Whatever happens on the wire, these commands are gone
        let queued = mem::take(&mut self.queued);
        let reads = mem::replace(&mut self.reads, 0);

        self.stream.write_all(&queued)?;
        self.stream.flush()?;

        let mut replies = vec![0u8; reads];
        self.stream.read_exact(&mut replies).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::Disconnected,
            _ => Error::Io(e),
        })?;
        replies.into_iter().map(decode_tdo).collect()
    }

    fn shift(&mut self, data: &[u8], bits: u8, pause_after: bool, sample: bool) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Err(Error::ShortBuffer { bits, len: 0 });
        }

        // Constrain `bits` to be between 1 and 8
        let bits = bits.clamp(1, 8);
        let total = (data.len() - 1) * 8 + bits as usize;

        for i in 0..total {
            let tdi = (data[i / 8] >> (i % 8)) & 1 == 1;
            // TMS on the last bit takes us to Exit1
            let tms = pause_after && i + 1 == total;
            self.clock(tms, tdi, sample);
        }
        if pause_after {
            self.clock(false, true, false);
        }

        let tdo = self.flush()?;
        Ok(pack_bits(&tdo))
    }

    pub fn blink(&mut self, on: bool) -> Result<()> {
        self.push(Command::Blink(on));
        self.flush().map(drop)
    }

    /// Set the reset lines, `true` meaning asserted
    pub fn reset(&mut self, trst: bool, srst: bool) -> Result<()> {
        self.push(Command::Reset { trst, srst });
        self.flush().map(drop)
    }

    /// End the session.  The server closes the connection after this.
    pub fn quit(mut self) -> Result<()> {
        debug!("asking remote bitbang server to quit");
        self.push(Command::Quit);
        self.flush().map(drop)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S> Cable for RemoteBitbangClient<S> where S: Read + Write {
    fn change_mode(&mut self, tms: &[bool], tdi: bool) -> Result<()> {
        for t in tms {
            self.clock(*t, tdi, false);
        }
        self.flush().map(drop)
    }

    fn read_data(&mut self, bits: usize) -> Result<Vec<u8>> {
        for _ in 0..bits {
            self.clock(false, true, true);
        }
        let tdo = self.flush()?;
        Ok(pack_bits(&tdo))
    }

    fn write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<()> {
        self.shift(data, bits, pause_after, false).map(drop)
    }

    fn read_write_data(&mut self, data: &[u8], bits: u8, pause_after: bool) -> Result<Vec<u8>> {
        self.shift(data, bits, pause_after, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Records what the client sends and plays back canned TDO replies
    struct Wire {
        sent: Vec<u8>,
        replies: Cursor<Vec<u8>>,
    }

    impl Wire {
        fn new(replies: &[u8]) -> Self {
            Self {
                sent: Vec::new(),
                replies: Cursor::new(replies.to_vec()),
            }
        }
    }

    impl Read for Wire {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.replies.read(buf)
        }
    }

    impl Write for Wire {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.sent.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// A `Wire` whose first write fails
    struct FailsOnce {
        wire: Wire,
        failed: bool,
    }

    impl Read for FailsOnce {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.wire.read(buf)
        }
    }

    impl Write for FailsOnce {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            self.wire.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_write_does_not_leak_into_next_operation() {
        let stream = FailsOnce {
            wire: Wire::new(b"1"),
            failed: false,
        };
        let mut client = RemoteBitbangClient::new(stream);
        assert!(matches!(client.read_data(2), Err(Error::Io(_))));

        assert_eq!(client.read_data(1).unwrap(), vec![1]);
        assert_eq!(client.into_inner().wire.sent, b"1R5");
    }

    #[test]
    fn change_mode_clocks_each_tms_bit() {
        let mut client = RemoteBitbangClient::new(Wire::new(b""));
        client.change_mode(&[true, false], true).unwrap();
        assert_eq!(client.into_inner().sent, b"3715");
    }

    #[test]
    fn read_data_samples_between_edges() {
        let mut client = RemoteBitbangClient::new(Wire::new(b"101"));
        assert_eq!(client.read_data(3).unwrap(), vec![0b101]);
        assert_eq!(client.into_inner().sent, b"1R51R51R5");
    }

    #[test]
    fn write_with_pause_raises_tms_on_last_bit() {
        let mut client = RemoteBitbangClient::new(Wire::new(b""));
        client.write_data(&[0b10], 2, true).unwrap();
        // bit0 = 0, bit1 = 1 with TMS, then one more clock into Pause
        assert_eq!(client.into_inner().sent, b"043715");
    }

    #[test]
    fn read_write_returns_sampled_bits() {
        let mut client = RemoteBitbangClient::new(Wire::new(b"01100000"));
        let out = client.read_write_data(&[0xff], 8, false).unwrap();
        assert_eq!(out, vec![0b0000_0110]);
    }

    #[test]
    fn empty_write_is_an_error() {
        let mut client = RemoteBitbangClient::new(Wire::new(b""));
        assert!(matches!(
            client.write_data(&[], 8, false),
            Err(Error::ShortBuffer { len: 0, .. })
        ));
    }

    #[test]
    fn missing_reply_means_disconnected() {
        let mut client = RemoteBitbangClient::new(Wire::new(b"1"));
        assert!(matches!(client.read_data(2), Err(Error::Disconnected)));
    }

    #[test]
    fn garbage_reply_is_rejected() {
        let mut client = RemoteBitbangClient::new(Wire::new(b"x"));
        assert!(matches!(client.read_data(1), Err(Error::UnexpectedReply(b'x'))));
    }

    #[test]
    fn housekeeping_commands() {
        let mut client = RemoteBitbangClient::new(Wire::new(b""));
        client.blink(true).unwrap();
        client.reset(true, false).unwrap();
        client.blink(false).unwrap();
        assert_eq!(client.into_inner().sent, b"Btb");
    }
}
