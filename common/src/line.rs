//! Managed-transport control lines.
//!
//! A control line is an unescaped keyword followed by any number of escaped
//! arguments, separated by single spaces. Escaped arguments never contain a
//! raw `\0`, a raw newline, or a byte above 127.

use std::fmt::{self, Write as _};

use thiserror::Error;

/// Errors produced while reversing argument escaping
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnescapeError {
    /// A backslash was the final character of the input
    #[error("terminal backslash in {0:?}")]
    TerminalBackslash(String),
    /// A backslash was followed by a character with no escape meaning
    #[error("unknown escape \\{escape} in {input:?}")]
    UnknownEscape {
        /// The character following the backslash
        escape: char,
        /// The full argument being unescaped
        input:  String,
    },
    /// A `\x` escape was not followed by two hex digits
    #[error("bad \\x escape in {0:?}")]
    BadHex(String),
    /// The unescaped bytes were not valid UTF-8
    #[error("unescaped argument is not valid UTF-8")]
    InvalidUtf8,
}

/// Escape raw bytes for use as a control-line argument.
pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\\' => out.push_str("\\\\"),
            1..=127 => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out
}

/// Escape a string for use as a control-line argument.
pub fn escape(s: &str) -> String {
    escape_bytes(s.as_bytes())
}

/// Reverse [`escape_bytes`], returning the original bytes.
pub fn unescape_bytes(s: &str) -> Result<Vec<u8>, UnescapeError> {
    let raw = s.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }
        match raw.get(i + 1) {
            None => return Err(UnescapeError::TerminalBackslash(s.to_string())),
            Some(b'n') => {
                out.push(b'\n');
                i += 2;
            }
            Some(b'\\') => {
                out.push(b'\\');
                i += 2;
            }
            Some(b'x') => {
                let hex = raw
                    .get(i + 2..i + 4)
                    .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| UnescapeError::BadHex(s.to_string()))?;
                out.push(hex);
                i += 4;
            }
            Some(&other) => {
                return Err(UnescapeError::UnknownEscape {
                    escape: other as char,
                    input:  s.to_string(),
                });
            }
        }
    }
    Ok(out)
}

/// Reverse [`escape`], returning the original string.
pub fn unescape(s: &str) -> Result<String, UnescapeError> {
    String::from_utf8(unescape_bytes(s)?).map_err(|_| UnescapeError::InvalidUtf8)
}

/// Format a control line without its terminating newline.
pub fn format_line<S: AsRef<str>>(keyword: &str, args: &[S]) -> String {
    let mut line = String::from(keyword);
    for arg in args {
        line.push(' ');
        line.push_str(&escape(arg.as_ref()));
    }
    line
}

/// A parsed or to-be-emitted control line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlLine {
    /// Unescaped keyword, e.g. `SMETHOD`
    pub keyword: String,
    /// Arguments in their unescaped form
    pub args:    Vec<String>,
}

impl ControlLine {
    /// Creates a control line from a keyword and arguments
    pub fn new<K, I, S>(keyword: K, args: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keyword: keyword.into(),
            args:    args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a single line as written by [`format_line`]. A trailing newline
    /// is tolerated. Spaces are not escaped on the wire, so an argument that
    /// contained one comes back as two.
    pub fn parse(line: &str) -> Result<Self, UnescapeError> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let mut parts = line.split(' ');
        let keyword = parts.next().unwrap_or_default().to_string();
        let args = parts.map(unescape).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keyword, args })
    }
}

impl fmt::Display for ControlLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_line(&self.keyword, &self.args))
    }
}
