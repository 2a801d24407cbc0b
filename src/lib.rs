//! Secure chat relay: authenticated ECDHE+RSA-PSS handshake, framed
//! AES-128-GCM transport, and a concurrent session registry for
//! directed messaging between many clients through a central relay.

pub mod cert;
pub mod client_logic;
pub mod config;
pub mod crypto;
pub mod dispatcher;
pub mod error;
pub mod handshake;
pub mod identity;
pub mod net;
pub mod protocol;
pub mod registry;
pub mod session;
