//! Extended ORPort authentication cookie.
//!
//! The cookie file is exactly 64 bytes: the fixed 32-byte header
//! [`COOKIE_HEADER`] followed by the 32-byte secret.

use std::{
    fmt,
    fs::File,
    io::{self, Read},
    path::Path,
};

use subtle::ConstantTimeEq;
use thiserror::Error;

/// Length of the secret carried by a cookie file
pub const COOKIE_LEN: usize = 32;

const HEADER_LEN: usize = 32;

/// Fixed header at the start of every cookie file
pub const COOKIE_HEADER: &[u8; HEADER_LEN] = b"! Extended ORPort Auth Cookie !\n";

const COOKIE_FILE_LEN: usize = HEADER_LEN + COOKIE_LEN;

/// Reasons a cookie file is rejected
#[derive(Debug, Error)]
pub enum CookieError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("file is shorter than 64 bytes")]
    TooShort,
    #[error("file is longer than 64 bytes")]
    TooLong,
    #[error("missing auth cookie header")]
    BadHeader,
    #[error("cookie must be 32 bytes, got {0}")]
    BadLength(usize),
}

/// The 32-byte shared secret proving access to the cookie file
#[derive(Clone, PartialEq, Eq)]
pub struct AuthCookie([u8; COOKIE_LEN]);

impl AuthCookie {
    /// Wraps an exact-length secret
    pub fn new(bytes: [u8; COOKIE_LEN]) -> Self {
        Self(bytes)
    }

    /// Wraps a secret from a slice, rejecting any other length
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CookieError> {
        let bytes: [u8; COOKIE_LEN] = bytes
            .try_into()
            .map_err(|_| CookieError::BadLength(bytes.len()))?;
        Ok(Self(bytes))
    }

    /// Read and validate a cookie from a stream holding the full file contents.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self, CookieError> {
        let mut buf = [0u8; COOKIE_FILE_LEN];
        reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => CookieError::TooShort,
            _ => CookieError::Io(e),
        })?;

        // The file has to end right here.
        let mut extra = [0u8; 1];
        loop {
            match reader.read(&mut extra) {
                Ok(0) => break,
                Ok(_) => return Err(CookieError::TooLong),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CookieError::Io(e)),
            }
        }

        let (header, secret) = buf.split_at(HEADER_LEN);
        if !bool::from(header.ct_eq(&COOKIE_HEADER[..])) {
            return Err(CookieError::BadHeader);
        }
        Self::from_slice(secret)
    }

    /// Open `path` and read the cookie it contains.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CookieError> {
        let file = File::open(path.as_ref())?;
        Self::read_from(file)
    }

    pub fn as_bytes(&self) -> &[u8; COOKIE_LEN] {
        &self.0
    }
}

impl fmt::Debug for AuthCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthCookie(..)")
    }
}
