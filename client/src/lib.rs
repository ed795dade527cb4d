//! ptlink Client Library
//!
//! Client-side managed transport negotiation. The controlling process tells
//! the transport which methods to run through environment variables; this
//! crate reads them, answers with a `VERSION` line, and returns the methods
//! to launch.
//!
//! # Example
//!
//! ```no_run
//! use ptlink_client::{client_setup, ControlChannel, ProcessEnv};
//!
//! # fn main() -> Result<(), ptlink_client::Error> {
//! let control = ControlChannel::stdout();
//! let info = client_setup(&ProcessEnv, &control, &["trebuchet"])?;
//!
//! for name in &info.method_names {
//!     // Start a listener, then report it.
//!     let addr = "127.0.0.1:1080".parse().unwrap();
//!     control.cmethod(name, "socks5", addr)?;
//! }
//! control.cmethods_done()?;
//! # Ok(())
//! # }
//! ```

mod client;

pub use client::*;
// Re-export important types from ptlink-common for convenience
pub use ptlink_common::{ControlChannel, Error, NegotiationError, ProcessEnv};
