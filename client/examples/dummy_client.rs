//! A transport that does nothing to the traffic.
//!
//! Negotiates with the controller, opens a SOCKS4 listener for each
//! requested method and relays every connection unchanged to the address
//! the SOCKS request names. Logs go to stderr; stdout carries control lines.

use std::{
    io::{self, Read, Write},
    net::{Ipv4Addr, Shutdown, SocketAddr, SocketAddrV4, TcpListener, TcpStream},
    thread,
};

use anyhow::{bail, Context, Result};
use ptlink_client::{client_setup, ControlChannel, ProcessEnv};
use tracing::{info, warn};

const METHOD_NAMES: &[&str] = &["dummy"];

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let control = ControlChannel::stdout();
    let client = client_setup(&ProcessEnv, &control, METHOD_NAMES)
        .context("Client negotiation failed")?;

    let mut handles = Vec::new();
    for name in &client.method_names {
        let listener = match TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener,
            Err(e) => {
                let err = control.cmethod_error(name, &e.to_string());
                warn!("{}", err);
                continue;
            }
        };
        let addr = listener.local_addr()?;
        control.cmethod(name, "socks4", addr)?;
        info!("{} listening on {}", name, addr);
        handles.push(thread::spawn(move || accept_loop(listener)));
    }
    control.cmethods_done()?;

    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}

fn accept_loop(listener: TcpListener) {
    for conn in listener.incoming() {
        match conn {
            Ok(conn) => {
                thread::spawn(move || {
                    if let Err(e) = handle_connection(conn) {
                        warn!("Connection failed: {:#}", e);
                    }
                });
            }
            Err(e) => warn!("Accept error: {}", e),
        }
    }
}

/// Read a SOCKS4 CONNECT request and return its target.
fn read_socks4_request(conn: &mut TcpStream) -> Result<SocketAddr> {
    let mut header = [0u8; 8];
    conn.read_exact(&mut header).context("Short SOCKS request")?;
    if header[0] != 4 || header[1] != 1 {
        bail!("Unsupported SOCKS request {:02x} {:02x}", header[0], header[1]);
    }
    let port = u16::from_be_bytes([header[2], header[3]]);
    let ip = Ipv4Addr::new(header[4], header[5], header[6], header[7]);

    // Skip the null-terminated user id.
    let mut byte = [0u8; 1];
    loop {
        conn.read_exact(&mut byte).context("Short SOCKS user id")?;
        if byte[0] == 0 {
            break;
        }
    }
    Ok(SocketAddrV4::new(ip, port).into())
}

fn handle_connection(mut local: TcpStream) -> Result<()> {
    let target = read_socks4_request(&mut local)?;
    let remote = match TcpStream::connect(target) {
        Ok(remote) => remote,
        Err(e) => {
            local.write_all(&[0, 0x5b, 0, 0, 0, 0, 0, 0])?;
            return Err(e).with_context(|| format!("Failed to connect to {target}"));
        }
    };
    local.write_all(&[0, 0x5a, 0, 0, 0, 0, 0, 0])?;
    info!("Relaying to {}", target);
    copy_loop(local, remote)
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
