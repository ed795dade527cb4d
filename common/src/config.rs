use std::{collections::HashMap, env};

use crate::error::NegotiationError;

/// Protocol versions offered by the controlling process
pub const MANAGED_TRANSPORT_VER: &str = "TOR_PT_MANAGED_TRANSPORT_VER";
/// Client transports the controlling process wants launched
pub const CLIENT_TRANSPORTS: &str = "TOR_PT_CLIENT_TRANSPORTS";
/// Comma-separated `method-ADDRESS` bind requests
pub const SERVER_BINDADDR: &str = "TOR_PT_SERVER_BINDADDR";
/// Server transports the controlling process wants launched
pub const SERVER_TRANSPORTS: &str = "TOR_PT_SERVER_TRANSPORTS";
/// Per-method options, `method:key=value;...`
pub const SERVER_TRANSPORT_OPTIONS: &str = "TOR_PT_SERVER_TRANSPORT_OPTIONS";
/// Plain relay address
pub const ORPORT: &str = "TOR_PT_ORPORT";
/// Relay address requiring SAFE_COOKIE authentication
pub const EXTENDED_SERVER_PORT: &str = "TOR_PT_EXTENDED_SERVER_PORT";
/// Path of the 64-byte authentication cookie file
pub const AUTH_COOKIE_FILE: &str = "TOR_PT_AUTH_COOKIE_FILE";

/// A source of configuration variables.
///
/// Negotiation reads its inputs through this trait so tests can supply a
/// plain map instead of touching the process environment.
pub trait EnvSource {
    /// The raw value of `key`, if set
    fn var(&self, key: &str) -> Option<String>;
}

/// The environment of the current process
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

/// The value of `key`; an empty value counts as unset.
pub fn get_env<E: EnvSource + ?Sized>(env: &E, key: &str) -> Option<String> {
    env.var(key).filter(|v| !v.is_empty())
}

/// The value of `key`, or an `ENV-ERROR` naming the missing variable.
pub fn get_env_required<E: EnvSource + ?Sized>(
    env: &E,
    key: &str,
) -> Result<String, NegotiationError> {
    get_env(env, key)
        .ok_or_else(|| NegotiationError::env(format!("no {key} environment variable")))
}
