//! The remote bitbang server.  A debugger such as OpenOCD connects over TCP and sends one byte per
//! pin change; the simulation calls `tick` once per clock, and each tick executes at most one of
//! those commands against the simulated pins.
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;

use embedded_hal::digital::OutputPin;
use log::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::pins::{JtagPins, PinLevels};
use crate::protocol::{encode_tdo, Command};
use crate::statemachine::{JtagState, TapTracker};

/// Pack the session state the way the simulation harness expects it: zero while running,
/// otherwise bit 0 set and the exit code in the bits above it.
pub const fn status_word(done: bool, exit_code: i32) -> i32 {
    if done {
        (exit_code << 1) | 1
    } else {
        0
    }
}

struct Client {
    stream: TcpStream,
    peer: SocketAddr,
    buf: Box<[u8]>,
    start: usize,
    end: usize,
}

impl Client {
    fn new(stream: TcpStream, peer: SocketAddr, config: &Config) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        stream.set_nonblocking(!config.wait_for_command)?;
        Ok(Self {
            stream,
            peer,
            buf: vec![0; config.recv_buffer.max(1)].into_boxed_slice(),
            start: 0,
            end: 0,
        })
    }

    /// The next command byte, if the debugger has sent one
    fn next_byte(&mut self) -> Result<Option<u8>> {
        if self.start == self.end {
            let n = match self.stream.read(&mut self.buf) {
                Ok(0) => return Err(Error::Disconnected),
                Ok(n) => n,
                Err(e) if is_transient(&e) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            self.start = 0;
            self.end = n;
        }

        let byte = self.buf[self.start];
        self.start += 1;
        Ok(Some(byte))
    }

    fn send(&mut self, byte: u8) -> Result<()> {
        loop {
            match self.stream.write(&[byte]) {
                Ok(0) => return Err(Error::Disconnected),
                Ok(_) => return Ok(()),
                Err(e) if is_transient(&e) => thread::yield_now(),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted)
}

pub struct RemoteBitbang {
    config: Config,
    listener: TcpListener,
    client: Option<Client>,
    levels: PinLevels,
    srst: bool,
    led: bool,
    tracker: TapTracker,
    quit: bool,
    exit_code: i32,
}

impl RemoteBitbang {
    /// Listen on `port` on every interface.  Port 0 picks a free port, see `local_addr`.
    pub fn open(port: u16) -> Result<Self> {
        Self::with_config(Config::with_port(port))
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let addr = SocketAddr::new(config.bind_addr, config.port);
        let listener = TcpListener::bind(addr).map_err(|source| Error::Bind { addr, source })?;
        listener.set_nonblocking(true)?;
        info!("Listening for remote bitbang connections on {}", listener.local_addr()?);

        Ok(Self {
            config,
            listener,
            client: None,
            levels: PinLevels::default(),
            srst: false,
            led: false,
            tracker: TapTracker::new(),
            quit: false,
            exit_code: 0,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Levels the debugger currently wants on TCK, TMS, TDI and TRSTn
    pub fn levels(&self) -> PinLevels {
        self.levels
    }

    /// Whether the debugger is holding the system reset
    pub fn srst(&self) -> bool {
        self.srst
    }

    pub fn led(&self) -> bool {
        self.led
    }

    /// Where the target's TAP should be, judging by the pins driven so far
    pub fn tap_state(&self) -> JtagState {
        self.tracker.state()
    }

    /// The session has finished and the simulation should stop
    pub fn done(&self) -> bool {
        self.quit
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn status(&self) -> i32 {
        status_word(self.quit, self.exit_code)
    }

    /// Run one simulation cycle with `tdo` sampled from the target, returning the levels to put
    /// on the pins.  Without a client this only polls for a new connection.  With one, a single
    /// command is executed; if `wait_for_command` is set this blocks until the debugger sends
    /// one.
    pub fn step(&mut self, tdo: bool) -> Result<PinLevels> {
        if self.quit {
            return Ok(self.levels);
        }

        if self.client.is_some() {
            self.serve(tdo);
        } else {
            self.accept()?;
        }
        Ok(self.levels)
    }

    /// `step`, then drive the result onto `pins`
    pub fn tick<Tck, Tms, Tdi, Trst>(&mut self, pins: &mut JtagPins<Tck, Tms, Tdi, Trst>, tdo: bool) -> Result<()>
        where Tck: OutputPin, Tms: OutputPin, Tdi: OutputPin, Trst: OutputPin
    {
        let stepped = self.step(tdo);
        pins.drive(self.levels)?;
        stepped.map(drop)
    }

    fn accept(&mut self) -> Result<()> {
        let (stream, peer) = match self.listener.accept() {
            Ok(conn) => conn,
            Err(e) if is_transient(&e) || e.kind() == io::ErrorKind::ConnectionAborted => {
                return Ok(());
            }
            Err(e) => {
                error!("remote bitbang failed to accept a connection: {}", e);
                self.finish(1);
                return Err(e.into());
            }
        };

        match Client::new(stream, peer, &self.config) {
            Ok(client) => {
                info!("remote bitbang client connected from {}", peer);
                self.client = Some(client);
            }
            Err(e) => warn!("dropping remote bitbang client {}: {}", peer, e),
        }
        Ok(())
    }

    fn serve(&mut self, tdo: bool) {
        let Some(client) = self.client.as_mut() else {
            return;
        };

        let byte = match client.next_byte() {
            Ok(Some(byte)) => byte,
            Ok(None) => return,
            Err(e) => return self.disconnect(e),
        };

        match Command::decode(byte) {
            Ok(cmd) => self.execute(cmd, tdo),
            Err(e) => warn!("remote bitbang got {}", e),
        }
    }

    fn execute(&mut self, cmd: Command, tdo: bool) {
        match cmd {
            Command::Blink(on) => self.led = on,
            Command::Read => {
                let sent = match self.client.as_mut() {
                    Some(client) => client.send(encode_tdo(tdo)),
                    None => Ok(()),
                };
                if let Err(e) = sent {
                    self.disconnect(e);
                }
            }
            Command::Quit => {
                info!("Remote end disconnected");
                self.client = None;
                if self.config.quit_ends_session {
                    self.finish(0);
                }
            }
            Command::Write { tck, tms, tdi } => {
                self.levels.tck = tck;
                self.levels.tms = tms;
                self.levels.tdi = tdi;
                self.track();
            }
            Command::Reset { trst, srst } => {
                if srst != self.srst {
                    debug!("system reset {}", if srst { "asserted" } else { "released" });
                }
                self.levels.trstn = !trst;
                self.srst = srst;
                self.track();
            }
        }
    }

    fn track(&mut self) {
        if let Some(during) = self.tracker.observe(self.levels) {
            let now = self.tracker.state();
            if now != during {
                trace!("TAP {:?} -> {:?}", during, now);
            }
        }
    }

    fn disconnect(&mut self, reason: Error) {
        if let Some(client) = self.client.take() {
            match reason {
                Error::Disconnected => info!("remote bitbang client {} disconnected", client.peer),
                e => warn!("dropping remote bitbang client {}: {}", client.peer, e),
            }
        }
    }

    fn finish(&mut self, exit_code: i32) {
        self.quit = true;
        self.exit_code = exit_code;
    }
}
