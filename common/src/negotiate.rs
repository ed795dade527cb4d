//! Negotiation steps shared by the client and server flows.

use crate::{
    config::{get_env_required, EnvSource, MANAGED_TRANSPORT_VER},
    error::NegotiationError,
};

/// The only managed-transport protocol version understood here
pub const TRANSPORT_VERSION: &str = "1";

/// Pick the supported version out of `TOR_PT_MANAGED_TRANSPORT_VER`.
pub fn managed_transport_version<E: EnvSource + ?Sized>(
    env: &E,
) -> Result<&'static str, NegotiationError> {
    let offered = get_env_required(env, MANAGED_TRANSPORT_VER)?;
    if offered.split(',').any(|v| v == TRANSPORT_VERSION) {
        Ok(TRANSPORT_VERSION)
    } else {
        Err(NegotiationError::version("no-version"))
    }
}

/// The set of transports the controlling process asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFilter {
    /// `*`: every transport
    All,
    /// An explicit comma-separated list
    Only(Vec<String>),
}

impl TransportFilter {
    pub fn parse(value: &str) -> Self {
        if value == "*" {
            Self::All
        } else {
            Self::Only(value.split(',').map(str::to_string).collect())
        }
    }

    pub fn allows(&self, method_name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.iter().any(|n| n == method_name),
        }
    }

    /// Keep the members of `method_names` this filter allows, in the order
    /// they were given.
    pub fn select<S: AsRef<str>>(&self, method_names: &[S]) -> Vec<String> {
        method_names
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| self.allows(name))
            .map(str::to_string)
            .collect()
    }
}
