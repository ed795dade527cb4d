//! ptlink Server Library
//!
//! Server-side managed transport negotiation and the relay connection it
//! leads to. [`server_setup`] reads the controller's environment and
//! returns where to listen and how to reach the relay; [`dial_or`] opens
//! the relay connection for each accepted client, authenticating to the
//! extended ORPort with SAFE_COOKIE when one is configured.
//!
//! # Example
//!
//! ```no_run
//! use std::net::TcpListener;
//!
//! use ptlink_server::{dial_or, server_setup, ControlChannel, ProcessEnv};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let control = ControlChannel::stdout();
//! let info = server_setup(&ProcessEnv, &control, &["trebuchet"])?;
//!
//! for bindaddr in &info.bindaddrs {
//!     let listener = TcpListener::bind(bindaddr.addr)?;
//!     control.smethod(&bindaddr.method_name, listener.local_addr()?)?;
//! }
//! control.smethods_done()?;
//!
//! // For each accepted connection:
//! let relay = dial_or(&info, "203.0.113.5:41000", "trebuchet")?;
//! # drop(relay);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod command;
pub mod dial;
pub mod error;
mod server;

pub use auth::authenticate;
pub use command::{read_command, write_command, Command, RelayCommand};
pub use dial::{dial_or, setup, RELAY_SETUP_TIMEOUT};
pub use error::{AuthError, DialError, FrameError, SetupError};
pub use server::*;
// Re-export important types from ptlink-common for convenience
pub use ptlink_common::{AuthCookie, ControlChannel, Error, NegotiationError, ProcessEnv};
