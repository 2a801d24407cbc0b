//! Ephemeral ECDH (P-256) + HKDF-SHA256 -> the two AES-128 session keys.
//!
//! Each side generates a fresh `EphemeralSecret` per connection, exchanges
//! SubjectPublicKeyInfo PEM (not raw SEC1 bytes — the wire format in the
//! handshake JSON carries PEM), and calls `derive_keys` once both public
//! keys and the server's salt are known.

use hkdf::Hkdf;
use p256::ecdh::EphemeralSecret;
use p256::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use p256::PublicKey;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::config::HKDF_INFO;
use crate::error::SessionError;

pub struct SessionKeyPair {
    pub key_c2s: [u8; 16],
    pub key_s2c: [u8; 16],
}

/// Generates a fresh ephemeral keypair, returning the secret and its
/// public half PEM-encoded (SubjectPublicKeyInfo).
pub fn generate_ephemeral_keypair() -> (EphemeralSecret, String) {
    let secret = EphemeralSecret::random(&mut OsRng);
    let public = PublicKey::from(&secret);
    let pem = public
        .to_public_key_pem(LineEnding::LF)
        .expect("P-256 public key PEM encoding cannot fail");
    (secret, pem)
}

/// Raw ECDH agreement. Fails if `peer_pk_pem` doesn't parse as a valid
/// SubjectPublicKeyInfo PEM or doesn't land on the P-256 curve.
pub fn agree(sk: &EphemeralSecret, peer_pk_pem: &str) -> Result<[u8; 32], SessionError> {
    let peer_pub = PublicKey::from_public_key_pem(peer_pk_pem)
        .map_err(|e| SessionError::crypto(format!("invalid peer ECDH public key: {e}")))?;
    let shared = sk.diffie_hellman(&peer_pub);
    let mut out = [0u8; 32];
    out.copy_from_slice(shared.raw_secret_bytes().as_slice());
    Ok(out)
}

/// HKDF-SHA256 over `shared_secret` with `salt`, fixed `info` string,
/// 32-byte output split into the two directional 16-byte keys.
pub fn derive_keys(mut shared_secret: [u8; 32], salt: &[u8; 16]) -> SessionKeyPair {
    let hk = Hkdf::<Sha256>::new(Some(salt), &shared_secret);
    let mut okm = [0u8; 32];
    hk.expand(HKDF_INFO, &mut okm)
        .expect("HKDF-SHA256 output length 32 is always valid");
    shared_secret.zeroize();

    let mut key_c2s = [0u8; 16];
    let mut key_s2c = [0u8; 16];
    key_c2s.copy_from_slice(&okm[..16]);
    key_s2c.copy_from_slice(&okm[16..]);
    okm.zeroize();

    SessionKeyPair { key_c2s, key_s2c }
}
