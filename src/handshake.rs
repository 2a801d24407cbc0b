//! Handshake engine (C3): client-hello / server-response, RSA-PSS
//! signature over the transcript, and key installation.
//!
//! Transcript scope is deliberately the narrow one from the open
//! question: `transcript = pk_C_pem` only. The stronger variant
//! (`pk_C_pem || pk_S_pem || client_id || salt`) is explicitly optional
//! and would break wire compatibility with the fixed `data_to_sign`
//! layout below, so this implementation does not add it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::crypto::{self, SessionKeyPair};
use crate::error::SessionError;
use crate::identity::{ServerIdentity, TrustedServer};
use crate::net;
use crate::protocol::{HandshakeResponse, HandshakeResponseTag, Hello, HelloTag};
use crate::session::ClientId;

pub struct HandshakeOutcome {
    pub client_id: ClientId,
    pub display_name: String,
    pub keys: SessionKeyPair,
}

/// `pk_S_pem || ascii(client_id) || transcript || salt`, fixed by the
/// wire protocol — both sides must build this identically or the
/// signature never verifies.
fn data_to_sign(pk_s_pem: &str, client_id: ClientId, transcript: &[u8], salt: &[u8; 16]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(pk_s_pem.len() + 20 + transcript.len() + salt.len());
    buf.extend_from_slice(pk_s_pem.as_bytes());
    buf.extend_from_slice(client_id.to_string().as_bytes());
    buf.extend_from_slice(transcript);
    buf.extend_from_slice(salt);
    buf
}

/// Relay side of the handshake. `client_id` must already have been
/// allocated from the registry's monotonic counter — no session exists
/// yet when this returns `Err`, so the caller never has cleanup to do.
pub async fn server_handshake<S>(
    stream: &mut S,
    identity: &ServerIdentity,
    client_id: ClientId,
) -> Result<HandshakeOutcome, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = net::read_frame(stream).await?;
    let hello: Hello = serde_json::from_slice(&frame)
        .map_err(|e| SessionError::protocol(format!("malformed hello: {e}")))?;
    let HelloTag::Hello = hello.kind;

    let (sk_s, pk_s_pem) = crypto::generate_ephemeral_keypair();
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);

    let transcript = hello.public_key.as_bytes();
    let to_sign = data_to_sign(&pk_s_pem, client_id, transcript, &salt);
    let signature = crypto::sign_transcript(&identity.private_key, &to_sign);

    let response = HandshakeResponse {
        kind: HandshakeResponseTag::HandshakeResponse,
        client_id,
        public_key: pk_s_pem,
        salt: STANDARD.encode(salt),
        signature: STANDARD.encode(signature),
        cert: identity.cert_pem.clone(),
    };
    let body = serde_json::to_vec(&response)
        .map_err(|e| SessionError::protocol(format!("failed to encode handshake response: {e}")))?;
    net::write_frame(stream, &body).await?;

    let shared_secret = crypto::agree(&sk_s, &hello.public_key)?;
    let keys = crypto::derive_keys(shared_secret, &salt);

    Ok(HandshakeOutcome {
        client_id,
        display_name: hello.name,
        keys,
    })
}

/// Client side. A `Err` here is fatal to the process per spec — there
/// is no fallback path and no session is ever registered. Callers must
/// not retry; they should report the error and exit.
pub async fn client_handshake<S>(
    stream: &mut S,
    trusted: &TrustedServer,
    display_name: &str,
) -> Result<HandshakeOutcome, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (sk_c, pk_c_pem) = crypto::generate_ephemeral_keypair();
    let hello = Hello {
        kind: HelloTag::Hello,
        name: display_name.to_string(),
        public_key: pk_c_pem.clone(),
    };
    let body = serde_json::to_vec(&hello)
        .map_err(|e| SessionError::protocol(format!("failed to encode hello: {e}")))?;
    net::write_frame(stream, &body).await?;

    let frame = net::read_frame(stream).await?;
    let response: HandshakeResponse = serde_json::from_slice(&frame)
        .map_err(|e| SessionError::protocol(format!("malformed handshake response: {e}")))?;
    let HandshakeResponseTag::HandshakeResponse = response.kind;

    let salt_bytes = STANDARD
        .decode(&response.salt)
        .map_err(|e| SessionError::crypto(format!("malformed salt encoding: {e}")))?;
    let salt: [u8; 16] = salt_bytes
        .try_into()
        .map_err(|_| SessionError::crypto("salt is not 16 bytes"))?;
    let signature = STANDARD
        .decode(&response.signature)
        .map_err(|e| SessionError::crypto(format!("malformed signature encoding: {e}")))?;

    let transcript = pk_c_pem.as_bytes();
    let to_sign = data_to_sign(&response.public_key, response.client_id, transcript, &salt);
    crypto::verify_transcript(&trusted.public_key, &to_sign, &signature)?;

    let shared_secret = crypto::agree(&sk_c, &response.public_key)?;
    let keys = crypto::derive_keys(shared_secret, &salt);

    Ok(HandshakeOutcome {
        client_id: response.client_id,
        display_name: display_name.to_string(),
        keys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::RsaPrivateKey;

    fn test_identity() -> (ServerIdentity, TrustedServer) {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let public_key = rsa::RsaPublicKey::from(&private_key);
        let key_pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let cert_pem = crate::cert::build_self_signed_cert(&key_pem, "test-relay").unwrap();

        let identity = ServerIdentity {
            private_key,
            public_key,
            cert_pem,
        };
        let trusted = TrustedServer {
            public_key: identity.public_key.clone(),
        };
        (identity, trusted)
    }

    #[tokio::test]
    async fn handshake_derives_identical_keys_on_both_sides() {
        let (identity, trusted) = test_identity();
        let (mut client_stream, mut server_stream) = tokio::io::duplex(1 << 16);

        let server_task = tokio::spawn(async move { server_handshake(&mut server_stream, &identity, 1).await });
        let client_outcome = client_handshake(&mut client_stream, &trusted, "alice").await.unwrap();
        let server_outcome = server_task.await.unwrap().unwrap();

        assert_eq!(client_outcome.keys.key_c2s, server_outcome.keys.key_c2s);
        assert_eq!(client_outcome.keys.key_s2c, server_outcome.keys.key_s2c);
        assert_eq!(client_outcome.client_id, server_outcome.client_id);
        assert_eq!(server_outcome.display_name, "alice");
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected_by_client() {
        let (identity, trusted) = test_identity();
        let (mut client_stream, mut server_stream) = tokio::io::duplex(1 << 16);

        tokio::spawn(async move {
            // Hand-roll the server side so the signature can be corrupted
            // before it reaches the wire.
            let frame = net::read_frame(&mut server_stream).await.unwrap();
            let hello: Hello = serde_json::from_slice(&frame).unwrap();

            let (sk_s, pk_s_pem) = crypto::generate_ephemeral_keypair();
            let mut salt = [0u8; 16];
            OsRng.fill_bytes(&mut salt);
            let to_sign = data_to_sign(&pk_s_pem, 1, hello.public_key.as_bytes(), &salt);
            let mut signature = crypto::sign_transcript(&identity.private_key, &to_sign);
            let last = signature.len() - 1;
            signature[last] ^= 0x01;

            let response = HandshakeResponse {
                kind: HandshakeResponseTag::HandshakeResponse,
                client_id: 1,
                public_key: pk_s_pem,
                salt: STANDARD.encode(salt),
                signature: STANDARD.encode(signature),
                cert: identity.cert_pem.clone(),
            };
            let body = serde_json::to_vec(&response).unwrap();
            net::write_frame(&mut server_stream, &body).await.unwrap();
            let _ = sk_s;
        });

        let result = client_handshake(&mut client_stream, &trusted, "alice").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn malformed_hello_is_rejected_by_server() {
        let (identity, _trusted) = test_identity();
        let (mut client_stream, mut server_stream) = tokio::io::duplex(1 << 16);

        let writer = tokio::spawn(async move {
            net::write_frame(&mut client_stream, br#"{"type":"not_hello"}"#).await.unwrap();
        });
        let result = server_handshake(&mut server_stream, &identity, 1).await;
        assert!(result.is_err());
        writer.await.unwrap();
    }
}
