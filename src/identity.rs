//! Process-wide server identity: RSA private key, its public half, and
//! the self-signed certificate the client pins at startup.
//!
//! Loaded once at server startup and never mutated afterward — no lock
//! needed, mirroring the teacher's treatment of its own config/keying
//! data as plain owned values passed by reference.

use anyhow::{Context, Result};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};

pub struct ServerIdentity {
    pub private_key: RsaPrivateKey,
    pub public_key: RsaPublicKey,
    pub cert_pem: String,
}

impl ServerIdentity {
    /// Loads `private_key_path` (PKCS#8 PEM, unencrypted) and
    /// `cert_path` (PEM). Startup failure here is fatal to the process
    /// per spec error class 6 — callers should exit non-zero.
    pub fn load(private_key_path: &str, cert_path: &str) -> Result<Self> {
        let key_pem = std::fs::read_to_string(private_key_path).with_context(|| {
            format!("reading RSA private key from {private_key_path} (run `keygen` first)")
        })?;
        let private_key = RsaPrivateKey::from_pkcs8_pem(&key_pem)
            .with_context(|| format!("parsing PKCS#8 RSA private key from {private_key_path}"))?;
        let public_key = RsaPublicKey::from(&private_key);

        let cert_pem = std::fs::read_to_string(cert_path)
            .with_context(|| format!("reading server certificate from {cert_path}"))?;

        Ok(Self {
            private_key,
            public_key,
            cert_pem,
        })
    }
}

/// Client-side pinning: the trusted certificate carries the RSA public
/// key used to verify the server's handshake signature. Parsing the
/// cert further (chain, validity window) is out of scope — this is a
/// self-signed pin, not a CA-validated chain.
pub struct TrustedServer {
    pub public_key: RsaPublicKey,
}

impl TrustedServer {
    pub fn load_pinned(cert_path: &str) -> Result<Self> {
        let cert_pem = std::fs::read_to_string(cert_path).with_context(|| {
            format!("reading pinned server certificate from {cert_path} (required to verify the server's identity)")
        })?;
        let public_key = crate::cert::public_key_from_cert_pem(&cert_pem)
            .context("extracting RSA public key from pinned certificate")?;
        Ok(Self { public_key })
    }
}
