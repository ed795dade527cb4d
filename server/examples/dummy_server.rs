//! A server transport that does nothing to the traffic.
//!
//! Listens on every bindaddr the controller hands out and relays each
//! accepted connection unchanged to the relay, through the extended ORPort
//! when one is configured. Logs go to stderr; stdout carries control lines.

use std::{
    io,
    net::{Shutdown, TcpListener, TcpStream},
    sync::Arc,
    thread,
};

use anyhow::{Context, Result};
use ptlink_server::{dial_or, server_setup, ControlChannel, ProcessEnv, ServerInfo};
use tracing::{info, warn};

const METHOD_NAMES: &[&str] = &["dummy"];

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let control = ControlChannel::stdout();
    let info = server_setup(&ProcessEnv, &control, METHOD_NAMES)
        .context("Server negotiation failed")?;
    let info = Arc::new(info);

    let mut handles = Vec::new();
    for bindaddr in &info.bindaddrs {
        let listener = match TcpListener::bind(bindaddr.addr) {
            Ok(listener) => listener,
            Err(e) => {
                let err = control.smethod_error(&bindaddr.method_name, &e.to_string());
                warn!("{}", err);
                continue;
            }
        };
        let addr = listener.local_addr()?;
        if bindaddr.options.is_empty() {
            control.smethod(&bindaddr.method_name, addr)?;
        } else {
            control.smethod_args(&bindaddr.method_name, addr, &bindaddr.options)?;
        }
        info!("{} listening on {}", bindaddr.method_name, addr);

        let info = Arc::clone(&info);
        let method_name = bindaddr.method_name.clone();
        handles.push(thread::spawn(move || accept_loop(listener, info, method_name)));
    }
    control.smethods_done()?;

    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}

fn accept_loop(listener: TcpListener, info: Arc<ServerInfo>, method_name: String) {
    for conn in listener.incoming() {
        match conn {
            Ok(conn) => {
                let info = Arc::clone(&info);
                let method_name = method_name.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_connection(conn, &info, &method_name) {
                        warn!("Connection failed: {:#}", e);
                    }
                });
            }
            Err(e) => warn!("Accept error: {}", e),
        }
    }
}

fn handle_connection(conn: TcpStream, info: &ServerInfo, method_name: &str) -> Result<()> {
    let peer = conn.peer_addr()?.to_string();
    let relay = dial_or(info, &peer, method_name)
        .with_context(|| format!("Failed to reach relay for {peer}"))?;
    info!("Relaying {} over {}", peer, method_name);
    copy_loop(conn, relay)
}

/// Copy in both directions until either side closes.
fn copy_loop(a: TcpStream, b: TcpStream) -> Result<()> {
    let (mut a_read, mut b_write) = (a.try_clone()?, b.try_clone()?);
    let upstream = thread::spawn(move || {
        let _ = io::copy(&mut a_read, &mut b_write);
        let _ = b_write.shutdown(Shutdown::Write);
    });

    let (mut b_read, mut a_write) = (b, a);
    let _ = io::copy(&mut b_read, &mut a_write);
    let _ = a_write.shutdown(Shutdown::Write);
    let _ = upstream.join();
    Ok(())
}
