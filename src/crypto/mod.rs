// src/crypto/mod.rs

pub mod aead;
pub mod ecdh;
pub mod rsa_sign;

pub use aead::{open, seal, OpenedFrame};
pub use ecdh::{agree, derive_keys, generate_ephemeral_keypair, SessionKeyPair};
pub use rsa_sign::{sign_transcript, verify_transcript};
