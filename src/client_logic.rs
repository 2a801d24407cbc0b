//! Client session logic (C7): the endpoint's own handshake-derived
//! state, a reader task that decrypts with `K_s2c`, and a command
//! interpreter driving the writer side with `K_c2s`.
//!
//! Grounded in the original `client.py`'s `send_messages` loop,
//! expressed as an async stdin-line loop the way the teacher pulls
//! frames in its own read loops.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;

use crate::crypto;
use crate::error::SessionError;
use crate::net;
use crate::protocol::{DirectoryEntry, Payload};
use crate::session::ClientId;

struct EndpointSend<W> {
    writer: W,
    key_c2s: [u8; 16],
    seq_send: u64,
}

/// Client-side mirror of `Session`: this endpoint's own id, keys, and
/// its half of the send-side counter. The reader task keeps its own
/// `seq_recv` locally since it is the sole reader.
pub struct Endpoint<W> {
    pub client_id: ClientId,
    send: Mutex<EndpointSend<W>>,
}

impl<W: AsyncWrite + Unpin> Endpoint<W> {
    pub fn new(client_id: ClientId, key_c2s: [u8; 16], writer: W) -> Arc<Self> {
        Arc::new(Self {
            client_id,
            send: Mutex::new(EndpointSend {
                writer,
                key_c2s,
                seq_send: 0,
            }),
        })
    }

    async fn send_sealed(&self, plaintext: &[u8], target_id: u128) -> Result<(), SessionError> {
        let mut guard = self.send.lock().await;
        let seq = guard.seq_send + 1;
        let frame = crypto::seal(&guard.key_c2s, plaintext, self.client_id as u128, target_id, seq)?;
        net::write_frame(&mut guard.writer, &frame).await?;
        guard.seq_send = seq;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ListOnline,
    Send { target_id: ClientId, text: String },
    Quit,
    Unrecognized(String),
}

/// Parses one line of user input. Unknown input is not an error — it's
/// handed back as `Unrecognized` so the caller can print a hint and
/// keep the loop running.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line == "/sair" {
        return Command::Quit;
    }
    if line == "/listar" {
        return Command::ListOnline;
    }
    if let Some(rest) = line.strip_prefix("/enviar ") {
        let mut parts = rest.splitn(2, ' ');
        if let (Some(id_str), Some(text)) = (parts.next(), parts.next()) {
            if let Ok(target_id) = id_str.parse::<ClientId>() {
                return Command::Send {
                    target_id,
                    text: text.to_string(),
                };
            }
        }
    }
    Command::Unrecognized(line.to_string())
}

/// Sends the payload for a parsed command. `/sair` and unrecognized
/// input never reach here — callers handle those directly in the
/// command loop.
pub async fn dispatch_command<W: AsyncWrite + Unpin>(
    endpoint: &Endpoint<W>,
    command: &Command,
) -> Result<(), SessionError> {
    match command {
        Command::ListOnline => {
            let body = serde_json::to_vec(&Payload::GetOnlineClients).expect("serializing a unit payload cannot fail");
            endpoint.send_sealed(&body, endpoint.client_id as u128).await
        }
        Command::Send { target_id, text } => {
            let payload = Payload::SendMessage {
                target_id: *target_id,
                message: text.clone(),
            };
            let body = serde_json::to_vec(&payload).expect("serializing send_message cannot fail");
            endpoint.send_sealed(&body, *target_id as u128).await
        }
        Command::Quit | Command::Unrecognized(_) => Ok(()),
    }
}

/// What the reader surfaces to the UI layer; kept separate from
/// `protocol::Payload` so a future UI doesn't need to match on the
/// wire-format variants it can never receive (`hello`, `send_message`, …).
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Message { from_id: ClientId, from_name: String, message: String },
    OnlineClients(Vec<DirectoryEntry>),
    Error(String),
}

/// Reads and decrypts frames with `key_s2c` until the connection
/// closes or a fatal error occurs, handing each decrypted payload to
/// `on_message`. Enforces the same strict sequence-monotonicity and
/// AAD-binding checks the relay enforces on its side.
pub async fn run_reader<R, F>(mut reader: R, key_s2c: [u8; 16], client_id: ClientId, mut on_message: F) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
    F: FnMut(Notification),
{
    let mut seq_recv: u64 = 0;

    loop {
        let frame = net::read_frame(&mut reader).await?;
        let opened = crypto::open(&key_s2c, &frame)?;

        if opened.target_id != client_id as u128 {
            return Err(SessionError::protocol("AAD target_id does not match this endpoint"));
        }
        if opened.seq <= seq_recv {
            return Err(SessionError::Replay {
                seq: opened.seq,
                last: seq_recv,
            });
        }
        seq_recv = opened.seq;

        let payload: Payload = serde_json::from_slice(&opened.plaintext)
            .map_err(|e| SessionError::protocol(format!("malformed payload JSON: {e}")))?;

        match payload {
            Payload::Message { from_id, from_name, message } => {
                on_message(Notification::Message { from_id, from_name, message });
            }
            Payload::OnlineClients { clients } => {
                on_message(Notification::OnlineClients(clients));
            }
            Payload::Error { message } => {
                on_message(Notification::Error(message));
            }
            other => {
                return Err(SessionError::protocol(format!(
                    "unexpected payload type from relay: {other:?}"
                )))
            }
        }
    }
}
