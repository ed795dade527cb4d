//! Extended ORPort command framing.
//!
//! Format:
//! ```text
//! +---------+---------+----------+
//! | command | length  |   body   |
//! +---------+---------+----------+
//! |  u16be  |  u16be  | Variable |
//! +---------+---------+----------+
//! ```

use std::{
    fmt,
    io::{Read, Write},
};

use crate::error::FrameError;

/// Largest body a single command can carry.
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

const HEADER_LEN: usize = 4;

/// A 16-bit command code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command(pub u16);

impl Command {
    pub const DONE: Command = Command(0x0000);
    pub const USERADDR: Command = Command(0x0001);
    pub const TRANSPORT: Command = Command(0x0002);
    pub const OKAY: Command = Command(0x1000);
    pub const DENY: Command = Command(0x1001);
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::DONE => f.write_str("DONE"),
            Self::USERADDR => f.write_str("USERADDR"),
            Self::TRANSPORT => f.write_str("TRANSPORT"),
            Self::OKAY => f.write_str("OKAY"),
            Self::DENY => f.write_str("DENY"),
            Command(code) => write!(f, "0x{code:04x}"),
        }
    }
}

/// A decoded command and its body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCommand {
    pub command: Command,
    pub body:    Vec<u8>,
}

/// Encode a command to its wire form.
pub fn encode_command(command: Command, body: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u16::try_from(body.len()).map_err(|_| FrameError::BodyTooLong(body.len()))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
    buf.extend_from_slice(&command.0.to_be_bytes());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(body);
    Ok(buf)
}

/// Encode and send a command in a single write.
pub fn write_command<W: Write>(
    writer: &mut W,
    command: Command,
    body: &[u8],
) -> Result<(), FrameError> {
    let buf = encode_command(command, body)?;
    writer.write_all(&buf)?;
    Ok(())
}

/// Read exactly one command. A short read at any point is an error.
pub fn read_command<R: Read>(reader: &mut R) -> Result<RelayCommand, FrameError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header)?;
    let command = Command(u16::from_be_bytes([header[0], header[1]]));
    let len = u16::from_be_bytes([header[2], header[3]]) as usize;

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(RelayCommand { command, body })
}
