//! AES-128-GCM seal/open with the wire frame layout fixed by the wire
//! protocol: `nonce(12) || sender_id(16) || target_id(16) || seq(8) || ciphertext+tag`.
//!
//! IDs are encoded as full 128-bit big-endian integers even though the
//! relay only ever issues small values, so this module takes `u128`
//! rather than the `u64`/`ClientId` the rest of the crate uses.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::SessionError;

const NONCE_LEN: usize = 12;
const ID_LEN: usize = 16;
const SEQ_LEN: usize = 8;
const HEADER_LEN: usize = NONCE_LEN + ID_LEN + ID_LEN + SEQ_LEN; // 52

pub struct OpenedFrame {
    pub plaintext: Vec<u8>,
    pub sender_id: u128,
    pub target_id: u128,
    pub seq: u64,
}

/// Seals `plaintext` under `key`, binding `(sender_id, target_id, seq)`
/// into the GCM tag as associated data. Returns the full wire frame.
pub fn seal(
    key: &[u8; 16],
    plaintext: &[u8],
    sender_id: u128,
    target_id: u128,
    seq: u64,
) -> Result<Vec<u8>, SessionError> {
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut aad = [0u8; ID_LEN + ID_LEN + SEQ_LEN];
    aad[..ID_LEN].copy_from_slice(&sender_id.to_be_bytes());
    aad[ID_LEN..2 * ID_LEN].copy_from_slice(&target_id.to_be_bytes());
    aad[2 * ID_LEN..].copy_from_slice(&seq.to_be_bytes());

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad: &aad })
        .map_err(|_| SessionError::crypto("AES-GCM seal failed"))?;

    let mut frame = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    frame.extend_from_slice(&nonce_bytes);
    frame.extend_from_slice(&aad);
    frame.extend_from_slice(&ciphertext);
    Ok(frame)
}

/// Inverse of [`seal`]. Rejects frames shorter than the 52-byte header
/// and frames whose GCM tag doesn't verify under `key`.
pub fn open(key: &[u8; 16], frame: &[u8]) -> Result<OpenedFrame, SessionError> {
    if frame.len() < HEADER_LEN {
        return Err(SessionError::crypto(format!(
            "frame body too short: {} bytes, need at least {HEADER_LEN}",
            frame.len()
        )));
    }

    let nonce_bytes = &frame[..NONCE_LEN];
    let sender_bytes = &frame[NONCE_LEN..NONCE_LEN + ID_LEN];
    let target_bytes = &frame[NONCE_LEN + ID_LEN..NONCE_LEN + 2 * ID_LEN];
    let seq_bytes = &frame[NONCE_LEN + 2 * ID_LEN..HEADER_LEN];
    let aad = &frame[NONCE_LEN..HEADER_LEN];
    let ciphertext = &frame[HEADER_LEN..];

    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| SessionError::crypto("AES-GCM tag verification failed"))?;

    Ok(OpenedFrame {
        plaintext,
        sender_id: u128::from_be_bytes(sender_bytes.try_into().unwrap()),
        target_id: u128::from_be_bytes(target_bytes.try_into().unwrap()),
        seq: u64::from_be_bytes(seq_bytes.try_into().unwrap()),
    })
}
