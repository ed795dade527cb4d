//! Connecting to the relay on behalf of an accepted client.

use std::{
    io::{self, Read, Write},
    net::{SocketAddr, TcpStream},
    time::{Duration, Instant},
};

use crate::{
    auth::authenticate,
    command::{read_command, write_command, Command},
    error::{DialError, FrameError, SetupError},
    server::ServerInfo,
};

/// Bound on authentication plus setup with the extended ORPort
pub const RELAY_SETUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Tell the relay who is connecting and over which transport.
///
/// Sends USERADDR, TRANSPORT and DONE, then expects OKAY. DENY and any other
/// reply fail the setup.
pub fn setup<S: Read + Write>(stream: &mut S, addr: &str, method_name: &str) -> Result<(), SetupError> {
    write_command(stream, Command::USERADDR, addr.as_bytes())?;
    write_command(stream, Command::TRANSPORT, method_name.as_bytes())?;
    write_command(stream, Command::DONE, &[])?;
    stream.flush().map_err(FrameError::from)?;

    let reply = read_command(stream)?;
    match reply.command {
        Command::OKAY => Ok(()),
        Command::DENY => Err(SetupError::Denied),
        Command(code) => Err(SetupError::UnexpectedCommand(code)),
    }
}

/// Socket wrapper enforcing an absolute deadline on every read and write.
struct Deadline<'a> {
    stream:   &'a TcpStream,
    deadline: Instant,
}

impl<'a> Deadline<'a> {
    fn new(stream: &'a TcpStream, timeout: Duration) -> Self {
        Self {
            stream,
            deadline: Instant::now() + timeout,
        }
    }

    fn remaining(&self) -> io::Result<Duration> {
        self.deadline
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
            .ok_or_else(deadline_exceeded)
    }
}

fn deadline_exceeded() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "relay setup deadline exceeded")
}

// Socket timeouts surface as WouldBlock on Unix.
fn map_timeout(err: io::Error) -> io::Error {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => deadline_exceeded(),
        _ => err,
    }
}

impl Read for Deadline<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.set_read_timeout(Some(self.remaining()?))?;
        let mut stream = self.stream;
        stream.read(buf).map_err(map_timeout)
    }
}

impl Write for Deadline<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.set_write_timeout(Some(self.remaining()?))?;
        let mut stream = self.stream;
        stream.write(buf).map_err(map_timeout)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut stream = self.stream;
        stream.flush()
    }
}

fn connect(addr: SocketAddr) -> Result<TcpStream, DialError> {
    TcpStream::connect(addr).map_err(|source| DialError::Connect { addr, source })
}

/// Open a relay connection for a client at `addr` using `method_name`.
///
/// With an extended ORPort and cookie configured, the connection is
/// authenticated and set up within [`RELAY_SETUP_TIMEOUT`] before it is
/// returned. Otherwise the plain ORPort is dialed. The socket is closed on
/// any failure.
pub fn dial_or(info: &ServerInfo, addr: &str, method_name: &str) -> Result<TcpStream, DialError> {
    let (ext_addr, cookie) = match (info.extended_or_addr, info.auth_cookie.as_ref()) {
        (Some(ext_addr), Some(cookie)) => (ext_addr, cookie),
        _ => {
            let or_addr = info.or_addr.ok_or(DialError::NoRelay)?;
            tracing::debug!("Connecting to ORPort {} for {}", or_addr, addr);
            return connect(or_addr);
        }
    };

    tracing::debug!("Connecting to extended ORPort {} for {}", ext_addr, addr);
    let stream = connect(ext_addr)?;

    let mut timed = Deadline::new(&stream, RELAY_SETUP_TIMEOUT);
    let result = authenticate(&mut timed, cookie)
        .map_err(DialError::from)
        .and_then(|()| setup(&mut timed, addr, method_name).map_err(DialError::from));
    if let Err(e) = &result {
        tracing::warn!("Extended ORPort {} refused {} ({}): {}", ext_addr, addr, method_name, e);
    }
    result?;

    stream.set_read_timeout(None)?;
    stream.set_write_timeout(None)?;
    tracing::debug!("Extended ORPort connection ready for {}", addr);
    Ok(stream)
}
