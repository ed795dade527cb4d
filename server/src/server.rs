use std::{collections::HashMap, io::Write, net::SocketAddr};

use ptlink_common::{
    addr::resolve_addr,
    args::{parse_server_transport_options, Args},
    config::{
        get_env, get_env_required, EnvSource, AUTH_COOKIE_FILE, EXTENDED_SERVER_PORT, ORPORT,
        SERVER_BINDADDR, SERVER_TRANSPORTS, SERVER_TRANSPORT_OPTIONS,
    },
    control::ControlChannel,
    cookie::AuthCookie,
    error::{NegotiationError, Result},
    negotiate::{managed_transport_version, TransportFilter},
};

/// A listening address the controller asked a transport to use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindaddr {
    pub method_name: String,
    pub addr:        SocketAddr,
    /// Options from `TOR_PT_SERVER_TRANSPORT_OPTIONS`, empty if none given
    pub options:     Args,
}

/// Outcome of server negotiation.
///
/// At least one of `or_addr` or (`extended_or_addr` and `auth_cookie`) is
/// always set.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    pub bindaddrs:        Vec<Bindaddr>,
    /// Plain ORPort
    pub or_addr:          Option<SocketAddr>,
    /// Extended ORPort, requiring SAFE_COOKIE authentication
    pub extended_or_addr: Option<SocketAddr>,
    pub auth_cookie:      Option<AuthCookie>,
}

/// Resolve `TOR_PT_SERVER_BINDADDR`, keeping only entries whose method is
/// requested by the controller and supported by the caller.
pub fn server_bindaddrs<E, S>(
    env: &E,
    method_names: &[S],
) -> std::result::Result<Vec<Bindaddr>, NegotiationError>
where
    E: EnvSource + ?Sized,
    S: AsRef<str>,
{
    let options = match get_env(env, SERVER_TRANSPORT_OPTIONS) {
        Some(raw) => parse_server_transport_options(&raw).map_err(|err| {
            NegotiationError::env(format!("{SERVER_TRANSPORT_OPTIONS}: {raw:?}: {err}"))
        })?,
        None => HashMap::new(),
    };

    let mut bindaddrs = Vec::new();
    for entry in get_env_required(env, SERVER_BINDADDR)?.split(',') {
        let (method_name, addr) = entry.split_once('-').ok_or_else(|| {
            NegotiationError::env(format!("{SERVER_BINDADDR}: {entry:?}: doesn't contain \"-\""))
        })?;
        let addr = resolve_addr(addr)
            .map_err(|err| NegotiationError::env(format!("{SERVER_BINDADDR}: {entry:?}: {err}")))?;
        bindaddrs.push(Bindaddr {
            method_name: method_name.to_string(),
            addr,
            options: options.get(method_name).cloned().unwrap_or_default(),
        });
    }

    let filter = TransportFilter::parse(&get_env_required(env, SERVER_TRANSPORTS)?);
    bindaddrs.retain(|b| {
        filter.allows(&b.method_name)
            && method_names.iter().any(|name| name.as_ref() == b.method_name)
    });
    Ok(bindaddrs)
}

/// Resolve an optional relay address variable.
fn relay_addr<E: EnvSource + ?Sized>(
    env: &E,
    key: &str,
) -> std::result::Result<Option<SocketAddr>, NegotiationError> {
    get_env(env, key)
        .map(|value| {
            resolve_addr(&value)
                .map_err(|err| NegotiationError::env(format!("cannot resolve {key} {value:?}: {err}")))
        })
        .transpose()
}

fn load_auth_cookie<E: EnvSource + ?Sized>(
    env: &E,
) -> std::result::Result<Option<AuthCookie>, NegotiationError> {
    get_env(env, AUTH_COOKIE_FILE)
        .map(|path| {
            AuthCookie::load(&path).map_err(|err| {
                NegotiationError::env(format!("error reading {AUTH_COOKIE_FILE} {path:?}: {err}"))
            })
        })
        .transpose()
}

fn relay_info<E: EnvSource + ?Sized>(
    env: &E,
    bindaddrs: Vec<Bindaddr>,
) -> std::result::Result<ServerInfo, NegotiationError> {
    let or_addr = relay_addr(env, ORPORT)?;
    let extended_or_addr = relay_addr(env, EXTENDED_SERVER_PORT)?;
    let auth_cookie = match extended_or_addr {
        Some(_) => load_auth_cookie(env)?,
        None => None,
    };

    if or_addr.is_none() && auth_cookie.is_none() {
        return Err(NegotiationError::env(format!(
            "need {ORPORT} or {EXTENDED_SERVER_PORT} environment variable"
        )));
    }

    Ok(ServerInfo {
        bindaddrs,
        or_addr,
        extended_or_addr,
        auth_cookie,
    })
}

/// Run server negotiation.
///
/// Writes `VERSION` once the version is agreed. Any later failure is written
/// to `control` as an error line and returned. The caller then listens on
/// each bindaddr, reports it with [`ControlChannel::smethod`] (or
/// [`ControlChannel::smethod_args`] / [`ControlChannel::smethod_error`]) and
/// finishes with [`ControlChannel::smethods_done`].
pub fn server_setup<E, W, S>(
    env: &E,
    control: &ControlChannel<W>,
    method_names: &[S],
) -> Result<ServerInfo>
where
    E: EnvSource + ?Sized,
    W: Write,
    S: AsRef<str>,
{
    let version = managed_transport_version(env).map_err(|e| control.fail(e))?;
    control.version(version)?;

    let bindaddrs = server_bindaddrs(env, method_names).map_err(|e| control.fail(e))?;
    let info = relay_info(env, bindaddrs).map_err(|e| control.fail(e))?;

    tracing::info!(
        "Server transports selected: {:?}",
        info.bindaddrs.iter().map(|b| b.method_name.as_str()).collect::<Vec<_>>()
    );
    tracing::info!(
        "Relay: ORPort {:?}, extended ORPort {:?}, cookie {}",
        info.or_addr,
        info.extended_or_addr,
        if info.auth_cookie.is_some() { "loaded" } else { "absent" }
    );
    Ok(info)
}
