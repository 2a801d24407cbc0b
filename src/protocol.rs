//! Control-plane JSON payloads. Two frames of every connection are raw
//! JSON (the handshake); everything after that is one of these types,
//! serialized, then AEAD-sealed by `crypto::aead`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    #[serde(rename = "type")]
    pub kind: HelloTag,
    pub name: String,
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HelloTag {
    #[serde(rename = "hello")]
    Hello,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeResponse {
    #[serde(rename = "type")]
    pub kind: HandshakeResponseTag,
    pub client_id: u64,
    pub public_key: String,
    pub salt: String,
    pub signature: String,
    pub cert: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HandshakeResponseTag {
    #[serde(rename = "handshake_response")]
    HandshakeResponse,
}

/// Decrypted plaintext payloads exchanged once the session is live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Payload {
    #[serde(rename = "send_message")]
    SendMessage { target_id: u64, message: String },

    #[serde(rename = "get_online_clients")]
    GetOnlineClients,

    #[serde(rename = "message")]
    Message {
        from_id: u64,
        from_name: String,
        message: String,
    },

    #[serde(rename = "online_clients")]
    OnlineClients { clients: Vec<DirectoryEntry> },

    #[serde(rename = "client_joined")]
    ClientJoined { client_id: u64, client_name: String },

    #[serde(rename = "client_left")]
    ClientLeft { client_id: u64 },

    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: u64,
    pub name: String,
}
