//! ptlink Common Library
//!
//! This crate provides the protocol pieces shared by the ptlink client and
//! server negotiation flows. It includes:
//!
//! - Control-line escaping, formatting and parsing
//! - The control channel that serializes lines to the controlling process
//! - Per-transport option sets and the `TOR_PT_SERVER_TRANSPORT_OPTIONS` parser
//! - Extended ORPort auth cookie loading
//! - Strict literal-IP address resolution
//! - Environment access and the shared version-negotiation step
//!
//! # Features
//!
//! - **Fail closed**: every malformed input is an error, never a partial result
//! - **Testable negotiation**: environment and output are injected, not global
//! - **Constant-time secrets**: the cookie header is compared with `subtle`

/// Strict `host:port` resolution
pub mod addr;

/// Ordered multimap of transport options
pub mod args;

/// Environment variable names and access
pub mod config;

/// Control channel to the controlling process
pub mod control;

/// Auth cookie file loading
pub mod cookie;

pub mod error;

/// Control-line encoding and decoding
pub mod line;

/// Version check and transport filtering
pub mod negotiate;

// Re-export commonly used types for convenience
pub use addr::{resolve_addr, AddrError};
pub use args::{parse_server_transport_options, Args, ArgsError};
pub use config::{EnvSource, ProcessEnv};
pub use control::{ControlChannel, SyncFile};
pub use cookie::{AuthCookie, CookieError, COOKIE_HEADER, COOKIE_LEN};
pub use error::{Error, NegotiationError, Result};
pub use line::{escape, format_line, unescape, ControlLine, UnescapeError};
pub use negotiate::{managed_transport_version, TransportFilter, TRANSPORT_VERSION};
