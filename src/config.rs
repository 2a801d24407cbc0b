//! Defaults shared by the server and client binaries.

/// Frames larger than this are rejected with `SessionError::Oversized`.
pub const MAX_FRAME_LEN: u32 = 64 * 1024;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5000;

pub const DEFAULT_PRIVATE_KEY_PATH: &str = "server_private_key.pem";
pub const DEFAULT_CERT_PATH: &str = "server.crt";

pub const RSA_KEY_BITS: usize = 2048;

/// ASCII info string fixed by the wire protocol; both sides must use
/// this exact string or key derivation silently diverges.
pub const HKDF_INFO: &[u8] = b"handshake data";
