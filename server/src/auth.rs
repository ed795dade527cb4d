//! Extended ORPort SAFE_COOKIE authentication.
//!
//! Exchange, after the relay lists its supported methods:
//! ```text
//! relay  -> us : auth types, terminated by 0x00
//! us     -> relay : 0x01 (SAFE_COOKIE)
//! us     -> relay : client nonce (32)
//! relay  -> us : server hash (32) | server nonce (32)
//! us     -> relay : client hash (32)
//! relay  -> us : status (1), 1 = success
//! ```

use std::io::{Read, Write};

use hmac::{
    digest::{Key, KeyInit},
    Hmac, Mac,
};
use ptlink_common::{AuthCookie, COOKIE_LEN};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::AuthError;

/// Method id of SAFE_COOKIE, the only method supported
pub const AUTH_TYPE_SAFE_COOKIE: u8 = 1;

pub const NONCE_LEN: usize = 32;
pub const HASH_LEN: usize = 32;

const SERVER_HASH_CONTEXT: &[u8] = b"ExtORPort authentication server-to-client hash";
const CLIENT_HASH_CONTEXT: &[u8] = b"ExtORPort authentication client-to-server hash";

type HmacSha256 = Hmac<Sha256>;

fn compute_hash(
    cookie: &AuthCookie,
    context: &[u8],
    client_nonce: &[u8; NONCE_LEN],
    server_nonce: &[u8; NONCE_LEN],
) -> [u8; HASH_LEN] {
    // HMAC zero-pads keys shorter than the block, so this keys with the cookie.
    let mut key = Key::<HmacSha256>::default();
    key[..COOKIE_LEN].copy_from_slice(cookie.as_bytes());
    let mut mac = <HmacSha256 as KeyInit>::new(&key);
    mac.update(context);
    mac.update(client_nonce);
    mac.update(server_nonce);

    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// The hash the relay must present to prove it knows the cookie.
pub fn compute_server_hash(
    cookie: &AuthCookie,
    client_nonce: &[u8; NONCE_LEN],
    server_nonce: &[u8; NONCE_LEN],
) -> [u8; HASH_LEN] {
    compute_hash(cookie, SERVER_HASH_CONTEXT, client_nonce, server_nonce)
}

/// The hash we present to prove we know the cookie.
pub fn compute_client_hash(
    cookie: &AuthCookie,
    client_nonce: &[u8; NONCE_LEN],
    server_nonce: &[u8; NONCE_LEN],
) -> [u8; HASH_LEN] {
    compute_hash(cookie, CLIENT_HASH_CONTEXT, client_nonce, server_nonce)
}

/// Read the relay's offered auth types up to the terminating zero byte.
fn read_auth_types<S: Read>(stream: &mut S) -> Result<[bool; 256], AuthError> {
    let mut offered = [false; 256];
    for _ in 0..256 {
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte)?;
        if byte[0] == 0 {
            return Ok(offered);
        }
        offered[byte[0] as usize] = true;
    }
    Err(AuthError::NoTerminator)
}

fn random_nonce() -> Result<[u8; NONCE_LEN], AuthError> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| AuthError::Nonce(e.to_string()))?;
    Ok(nonce)
}

/// Authenticate to the relay on `stream` with SAFE_COOKIE.
pub fn authenticate<S: Read + Write>(stream: &mut S, cookie: &AuthCookie) -> Result<(), AuthError> {
    authenticate_with_nonce(stream, cookie, random_nonce)
}

/// Runs the handshake with a caller-supplied nonce source, which is only
/// invoked once SAFE_COOKIE has been selected.
pub(crate) fn authenticate_with_nonce<S, F>(
    stream: &mut S,
    cookie: &AuthCookie,
    make_nonce: F,
) -> Result<(), AuthError>
where
    S: Read + Write,
    F: FnOnce() -> Result<[u8; NONCE_LEN], AuthError>,
{
    let offered = read_auth_types(stream)?;
    if !offered[AUTH_TYPE_SAFE_COOKIE as usize] {
        return Err(AuthError::MethodNotOffered);
    }
    stream.write_all(&[AUTH_TYPE_SAFE_COOKIE])?;

    let client_nonce = make_nonce()?;
    stream.write_all(&client_nonce)?;
    stream.flush()?;
    tracing::debug!("Sent SAFE_COOKIE client nonce");

    let mut server_hash = [0u8; HASH_LEN];
    let mut server_nonce = [0u8; NONCE_LEN];
    stream.read_exact(&mut server_hash)?;
    stream.read_exact(&mut server_nonce)?;

    let expected = compute_server_hash(cookie, &client_nonce, &server_nonce);
    if !bool::from(server_hash[..].ct_eq(&expected[..])) {
        return Err(AuthError::ServerHashMismatch);
    }

    let client_hash = compute_client_hash(cookie, &client_nonce, &server_nonce);
    stream.write_all(&client_hash)?;
    stream.flush()?;

    let mut status = [0u8; 1];
    stream.read_exact(&mut status)?;
    if status[0] != 1 {
        return Err(AuthError::Rejected(status[0]));
    }

    tracing::debug!("SAFE_COOKIE authentication succeeded");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{self, Cursor};

    use super::*;

    /// In-memory stream replaying a fixed relay script and recording writes
    pub(crate) struct Scripted {
        pub input:  Cursor<Vec<u8>>,
        pub output: Vec<u8>,
    }

    impl Scripted {
        pub(crate) fn new(input: Vec<u8>) -> Self {
            Self {
                input:  Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn cookie() -> AuthCookie {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        AuthCookie::new(bytes)
    }

    const CLIENT_NONCE: [u8; NONCE_LEN] = [0xaa; NONCE_LEN];
    const SERVER_NONCE: [u8; NONCE_LEN] = [0x55; NONCE_LEN];

    fn fixed_nonce() -> Result<[u8; NONCE_LEN], AuthError> {
        Ok(CLIENT_NONCE)
    }

    fn no_nonce() -> Result<[u8; NONCE_LEN], AuthError> {
        panic!("nonce must not be generated");
    }

    /// Relay script for a handshake with the given server hash and status
    fn relay_script(auth_types: &[u8], server_hash: &[u8], status: Option<u8>) -> Vec<u8> {
        let mut script = auth_types.to_vec();
        script.extend_from_slice(server_hash);
        script.extend_from_slice(&SERVER_NONCE);
        script.extend(status);
        script
    }

    #[test]
    fn test_reference_vectors() {
        let server_hash = compute_server_hash(&cookie(), &CLIENT_NONCE, &SERVER_NONCE);
        assert_eq!(
            hex::encode(server_hash),
            "66d0cc27562f57b8ee73def896c815f4cec0c2b82e48888abf342523fdc8fdbd"
        );
        let client_hash = compute_client_hash(&cookie(), &CLIENT_NONCE, &SERVER_NONCE);
        assert_eq!(
            hex::encode(client_hash),
            "7d8dabf4f71fa0644473b25716ee9c968a699b79de922cdf2d04839674a3c5ec"
        );
    }

    #[test]
    fn test_padded_key_matches_cookie_key() {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(cookie().as_bytes()).unwrap();
        mac.update(SERVER_HASH_CONTEXT);
        mac.update(&CLIENT_NONCE);
        mac.update(&SERVER_NONCE);
        let direct = mac.finalize().into_bytes();
        assert_eq!(
            direct.as_slice(),
            compute_server_hash(&cookie(), &CLIENT_NONCE, &SERVER_NONCE).as_slice()
        );
    }

    #[test]
    fn test_successful_handshake() {
        let server_hash = compute_server_hash(&cookie(), &CLIENT_NONCE, &SERVER_NONCE);
        let mut stream = Scripted::new(relay_script(&[3, 1, 2, 0], &server_hash, Some(1)));
        authenticate_with_nonce(&mut stream, &cookie(), fixed_nonce).unwrap();

        let client_hash = compute_client_hash(&cookie(), &CLIENT_NONCE, &SERVER_NONCE);
        let mut expected = vec![AUTH_TYPE_SAFE_COOKIE];
        expected.extend_from_slice(&CLIENT_NONCE);
        expected.extend_from_slice(&client_hash);
        assert_eq!(stream.output, expected);
    }

    #[test]
    fn test_random_nonce_differs() {
        assert_ne!(random_nonce().unwrap(), random_nonce().unwrap());
    }

    #[test]
    fn test_method_not_offered() {
        let mut stream = Scripted::new(vec![2, 3, 0]);
        let err = authenticate_with_nonce(&mut stream, &cookie(), no_nonce).unwrap_err();
        assert!(matches!(err, AuthError::MethodNotOffered));
        assert!(stream.output.is_empty());
    }

    #[test]
    fn test_no_terminator() {
        let mut stream = Scripted::new(vec![1; 256]);
        let err = authenticate_with_nonce(&mut stream, &cookie(), no_nonce).unwrap_err();
        assert!(matches!(err, AuthError::NoTerminator));

        // 255 types then a terminator is fine up to the selection step.
        let mut types = vec![7u8; 255];
        types.push(0);
        let mut stream = Scripted::new(types);
        let err = authenticate_with_nonce(&mut stream, &cookie(), no_nonce).unwrap_err();
        assert!(matches!(err, AuthError::MethodNotOffered));
    }

    #[test]
    fn test_truncated_auth_types() {
        let mut stream = Scripted::new(vec![1, 2]);
        let err = authenticate_with_nonce(&mut stream, &cookie(), no_nonce).unwrap_err();
        assert!(matches!(err, AuthError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_server_hash_mismatch_sends_no_client_hash() {
        let mut bad_hash = compute_server_hash(&cookie(), &CLIENT_NONCE, &SERVER_NONCE);
        bad_hash[HASH_LEN - 1] ^= 1;
        let mut stream = Scripted::new(relay_script(&[1, 0], &bad_hash, Some(1)));
        let err = authenticate_with_nonce(&mut stream, &cookie(), fixed_nonce).unwrap_err();
        assert!(matches!(err, AuthError::ServerHashMismatch));
        assert_eq!(stream.output.len(), 1 + NONCE_LEN);
    }

    #[test]
    fn test_wrong_cookie_rejected() {
        let other = AuthCookie::new([0xff; 32]);
        let server_hash = compute_server_hash(&other, &CLIENT_NONCE, &SERVER_NONCE);
        let mut stream = Scripted::new(relay_script(&[1, 0], &server_hash, Some(1)));
        let err = authenticate_with_nonce(&mut stream, &cookie(), fixed_nonce).unwrap_err();
        assert!(matches!(err, AuthError::ServerHashMismatch));
    }

    #[test]
    fn test_status_rejected() {
        let server_hash = compute_server_hash(&cookie(), &CLIENT_NONCE, &SERVER_NONCE);
        let mut stream = Scripted::new(relay_script(&[1, 0], &server_hash, Some(0)));
        let err = authenticate_with_nonce(&mut stream, &cookie(), fixed_nonce).unwrap_err();
        assert!(matches!(err, AuthError::Rejected(0)));
    }

    #[test]
    fn test_missing_status() {
        let server_hash = compute_server_hash(&cookie(), &CLIENT_NONCE, &SERVER_NONCE);
        let mut stream = Scripted::new(relay_script(&[1, 0], &server_hash, None));
        let err = authenticate_with_nonce(&mut stream, &cookie(), fixed_nonce).unwrap_err();
        assert!(matches!(err, AuthError::Io(_)));
    }
}
