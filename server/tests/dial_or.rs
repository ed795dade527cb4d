use std::{
    io::{self, Read, Write},
    net::{SocketAddr, TcpListener},
    thread::{self, JoinHandle},
};

use ptlink_server::{
    auth::{compute_client_hash, compute_server_hash, AUTH_TYPE_SAFE_COOKIE},
    dial_or, read_command, write_command, AuthCookie, AuthError, Command, DialError, ServerInfo,
    SetupError,
};

const SERVER_NONCE: [u8; 32] = [0x42; 32];

fn cookie() -> AuthCookie {
    AuthCookie::new([0x17; 32])
}

/// What the fake relay saw from the transport
#[derive(Debug, Default)]
struct Transcript {
    authenticated: bool,
    commands:      Vec<(Command, Vec<u8>)>,
}

/// Accept one connection and play the extended ORPort side with `cookie`,
/// answering the setup with `verdict`.
fn fake_extended_orport(
    cookie: AuthCookie,
    verdict: Command,
) -> (SocketAddr, JoinHandle<io::Result<Transcript>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = thread::spawn(move || {
        let (mut conn, _) = listener.accept()?;
        let mut transcript = Transcript::default();

        conn.write_all(&[3, AUTH_TYPE_SAFE_COOKIE, 0])?;
        let mut method = [0u8; 1];
        conn.read_exact(&mut method)?;
        assert_eq!(method[0], AUTH_TYPE_SAFE_COOKIE);

        let mut client_nonce = [0u8; 32];
        conn.read_exact(&mut client_nonce)?;
        let server_hash = compute_server_hash(&cookie, &client_nonce, &SERVER_NONCE);
        conn.write_all(&server_hash)?;
        conn.write_all(&SERVER_NONCE)?;

        let mut client_hash = [0u8; 32];
        conn.read_exact(&mut client_hash)?;
        let expected = compute_client_hash(&cookie, &client_nonce, &SERVER_NONCE);
        transcript.authenticated = client_hash == expected;
        conn.write_all(&[transcript.authenticated as u8])?;
        if !transcript.authenticated {
            return Ok(transcript);
        }

        loop {
            let cmd = read_command(&mut conn).map_err(io::Error::other)?;
            let done = cmd.command == Command::DONE;
            transcript.commands.push((cmd.command, cmd.body));
            if done {
                break;
            }
        }
        write_command(&mut conn, verdict, b"").map_err(io::Error::other)?;

        // Echo one message once the relay link is up.
        let mut buf = [0u8; 5];
        if conn.read_exact(&mut buf).is_ok() {
            conn.write_all(&buf)?;
        }
        Ok(transcript)
    });

    (addr, handle)
}

fn extended_info(addr: SocketAddr, cookie: AuthCookie) -> ServerInfo {
    ServerInfo {
        extended_or_addr: Some(addr),
        auth_cookie: Some(cookie),
        ..Default::default()
    }
}

#[test]
fn test_authenticated_dial() {
    let (addr, relay) = fake_extended_orport(cookie(), Command::OKAY);
    let info = extended_info(addr, cookie());

    let mut stream = dial_or(&info, "198.51.100.7:4433", "trebuchet").unwrap();
    assert_eq!(stream.read_timeout().unwrap(), None);
    assert_eq!(stream.write_timeout().unwrap(), None);

    stream.write_all(b"hello").unwrap();
    let mut echoed = [0u8; 5];
    stream.read_exact(&mut echoed).unwrap();
    assert_eq!(&echoed, b"hello");

    let transcript = relay.join().unwrap().unwrap();
    assert!(transcript.authenticated);
    assert_eq!(
        transcript.commands,
        vec![
            (Command::USERADDR, b"198.51.100.7:4433".to_vec()),
            (Command::TRANSPORT, b"trebuchet".to_vec()),
            (Command::DONE, Vec::new()),
        ]
    );
}

#[test]
fn test_relay_denies() {
    let (addr, relay) = fake_extended_orport(cookie(), Command::DENY);
    let info = extended_info(addr, cookie());

    let err = dial_or(&info, "198.51.100.7:4433", "trebuchet").unwrap_err();
    assert!(matches!(err, DialError::Setup(SetupError::Denied)));
    assert!(relay.join().unwrap().unwrap().authenticated);
}

#[test]
fn test_wrong_cookie() {
    let (addr, relay) = fake_extended_orport(AuthCookie::new([0x99; 32]), Command::OKAY);
    let info = extended_info(addr, cookie());

    let err = dial_or(&info, "198.51.100.7:4433", "trebuchet").unwrap_err();
    assert!(matches!(err, DialError::Auth(AuthError::ServerHashMismatch)));
    // The transport hangs up without sending its hash.
    assert!(relay.join().unwrap().is_err());
}

#[test]
fn test_direct_orport() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let info = ServerInfo {
        or_addr: Some(listener.local_addr().unwrap()),
        ..Default::default()
    };
    let relay = thread::spawn(move || {
        let (mut conn, _) = listener.accept().unwrap();
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).unwrap();
        buf
    });

    let mut stream = dial_or(&info, "198.51.100.7:4433", "trebuchet").unwrap();
    stream.write_all(b"ping").unwrap();
    // No handshake on the plain ORPort: the first bytes are ours.
    assert_eq!(&relay.join().unwrap(), b"ping");
}

#[test]
fn test_cookie_without_extended_orport_dials_orport() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let info = ServerInfo {
        or_addr: Some(listener.local_addr().unwrap()),
        auth_cookie: Some(cookie()),
        ..Default::default()
    };
    let relay = thread::spawn(move || listener.accept().map(|_| ()));

    dial_or(&info, "198.51.100.7:4433", "trebuchet").unwrap();
    relay.join().unwrap().unwrap();
}

#[test]
fn test_connect_refused() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let info = ServerInfo {
        or_addr: Some(addr),
        ..Default::default()
    };

    let err = dial_or(&info, "198.51.100.7:4433", "trebuchet").unwrap_err();
    assert!(matches!(err, DialError::Connect { addr: a, .. } if a == addr));
}
