//! RSA-PSS signatures over the handshake transcript.
//!
//! The teacher pack only ever uses RSA for OAEP key-wrap (`rsa_kem.rs`);
//! this spec calls for a *signature* over a transcript instead, so this
//! module reuses the teacher's `rsa`-crate dependency and PEM/DER habits
//! but goes through `rsa::pss` rather than `rsa::Oaep`.

use rand::rngs::OsRng;
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::SessionError;

/// RSA-PSS, MGF1-SHA256, maximum salt length: `modulus_len - digest_len - 2`,
/// the standard bound (RFC 8017 §9.1.1) rather than the digest-sized
/// default most RSA crates pick, to match `padding.PSS.MAX_LENGTH`.
fn max_pss_salt_len(public: &RsaPublicKey) -> usize {
    public.size() - Sha256::output_size() - 2
}

pub fn sign_transcript(private: &RsaPrivateKey, data: &[u8]) -> Vec<u8> {
    let public = RsaPublicKey::from(private);
    let salt_len = max_pss_salt_len(&public);
    let signing_key = SigningKey::<Sha256>::new_with_salt_len(private.clone(), salt_len);
    let signature = signing_key.sign_with_rng(&mut OsRng, data);
    signature.to_bytes().to_vec()
}

pub fn verify_transcript(
    public: &RsaPublicKey,
    data: &[u8],
    signature_bytes: &[u8],
) -> Result<(), SessionError> {
    let salt_len = max_pss_salt_len(public);
    let verifying_key = VerifyingKey::<Sha256>::new_with_salt_len(public.clone(), salt_len);
    let signature = Signature::try_from(signature_bytes)
        .map_err(|e| SessionError::crypto(format!("malformed RSA-PSS signature: {e}")))?;
    verifying_key
        .verify(data, &signature)
        .map_err(|e| SessionError::crypto(format!("RSA-PSS verification failed: {e}")))
}
