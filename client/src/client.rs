use std::io::Write;

use ptlink_common::{
    config::{get_env_required, EnvSource, CLIENT_TRANSPORTS},
    control::ControlChannel,
    error::{NegotiationError, Result},
    negotiate::{managed_transport_version, TransportFilter},
};

/// Outcome of client negotiation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Transports to launch, in the order the caller supports them
    pub method_names: Vec<String>,
}

/// Intersect `method_names` with `TOR_PT_CLIENT_TRANSPORTS`.
///
/// The caller's order is kept; `*` selects every method.
pub fn client_transports<E, S>(
    env: &E,
    method_names: &[S],
) -> std::result::Result<Vec<String>, NegotiationError>
where
    E: EnvSource + ?Sized,
    S: AsRef<str>,
{
    let requested = get_env_required(env, CLIENT_TRANSPORTS)?;
    Ok(TransportFilter::parse(&requested).select(method_names))
}

/// Run client negotiation.
///
/// Writes `VERSION` on success of the version step. Any failure is written
/// to `control` as its error line before being returned. After this returns,
/// the caller launches each transport and reports it with
/// [`ControlChannel::cmethod`] or [`ControlChannel::cmethod_error`],
/// finishing with [`ControlChannel::cmethods_done`].
pub fn client_setup<E, W, S>(
    env: &E,
    control: &ControlChannel<W>,
    method_names: &[S],
) -> Result<ClientInfo>
where
    E: EnvSource + ?Sized,
    W: Write,
    S: AsRef<str>,
{
    let version = managed_transport_version(env).map_err(|e| control.fail(e))?;
    control.version(version)?;

    let method_names = client_transports(env, method_names).map_err(|e| control.fail(e))?;
    tracing::info!("Client transports selected: {:?}", method_names);

    Ok(ClientInfo { method_names })
}
