use std::{
    fs::File,
    io::{self, Stdout, Write},
    net::SocketAddr,
    sync::{Mutex, PoisonError},
};

use crate::{
    args::Args,
    error::{Error, NegotiationError},
    line::format_line,
};

/// Destination for managed-transport control lines.
///
/// Every line is written whole and flushed under a single lock, so lines
/// from concurrent callers never interleave. There is no retry: a failed
/// write or flush is returned to the caller.
#[derive(Debug)]
pub struct ControlChannel<W: Write = Stdout> {
    out: Mutex<W>,
}

impl ControlChannel<Stdout> {
    /// A channel writing to the process's standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl Default for ControlChannel<Stdout> {
    fn default() -> Self {
        Self::stdout()
    }
}

impl<W: Write> ControlChannel<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write one control line and flush it.
    pub fn emit<S: AsRef<str>>(&self, keyword: &str, args: &[S]) -> io::Result<()> {
        let mut line = format_line(keyword, args);
        tracing::debug!(target: "ptlink::control", "{}", line);
        line.push('\n');

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(line.as_bytes())?;
        out.flush()
    }

    /// Emit the line for `err` and hand back the error to propagate.
    ///
    /// If the line itself cannot be written, the write failure is returned
    /// instead.
    pub fn fail(&self, err: NegotiationError) -> Error {
        match self.emit(err.keyword(), err.args().as_slice()) {
            Ok(()) => Error::Negotiation(err),
            Err(e) => Error::Control(e),
        }
    }

    /// `VERSION <version>`
    pub fn version(&self, version: &str) -> io::Result<()> {
        self.emit("VERSION", &[version])
    }

    /// `CMETHOD <name> <proto> <addr>`; `proto` is e.g. `socks5`.
    pub fn cmethod(&self, name: &str, proto: &str, addr: SocketAddr) -> io::Result<()> {
        let addr = addr.to_string();
        self.emit("CMETHOD", &[name, proto, addr.as_str()])
    }

    /// Emit `CMETHOD-ERROR` and return it as an error.
    pub fn cmethod_error(&self, name: &str, message: &str) -> Error {
        self.fail(NegotiationError::ClientMethod {
            method:  name.to_string(),
            message: message.to_string(),
        })
    }

    pub fn cmethods_done(&self) -> io::Result<()> {
        self.emit("CMETHODS", &["DONE"])
    }

    /// `SMETHOD <name> <addr>`
    pub fn smethod(&self, name: &str, addr: SocketAddr) -> io::Result<()> {
        let addr = addr.to_string();
        self.emit("SMETHOD", &[name, addr.as_str()])
    }

    /// `SMETHOD <name> <addr> ARGS:<args>`, advertising options to clients.
    pub fn smethod_args(&self, name: &str, addr: SocketAddr, args: &Args) -> io::Result<()> {
        let addr = addr.to_string();
        let token = format!("ARGS:{}", args.encode());
        self.emit("SMETHOD", &[name, addr.as_str(), token.as_str()])
    }

    /// Emit `SMETHOD-ERROR` and return it as an error.
    pub fn smethod_error(&self, name: &str, message: &str) -> Error {
        self.fail(NegotiationError::ServerMethod {
            method:  name.to_string(),
            message: message.to_string(),
        })
    }

    pub fn smethods_done(&self) -> io::Result<()> {
        self.emit("SMETHODS", &["DONE"])
    }
}

/// A file writer whose `flush` also commits data to stable storage.
///
/// Use it when control lines are redirected to a regular file rather than a
/// pipe.
#[derive(Debug)]
pub struct SyncFile(File);

impl SyncFile {
    pub fn new(file: File) -> Self {
        Self(file)
    }
}

impl Write for SyncFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.0.sync_data()
    }
}
