//! Message dispatcher (C6): the relay's per-session receive loop.
//! Decrypts inbound frames on this session, routes by payload type,
//! re-encrypts onto whichever session the routed message targets.
//!
//! The dispatcher never forwards inbound ciphertext — every outbound
//! frame is freshly sealed under the destination's own `K_s2c`, since
//! the two directions never share a key.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::crypto;
use crate::error::SessionError;
use crate::net;
use crate::protocol::Payload;
use crate::registry::Registry;
use crate::session::{SessionHandle, SERVER_ORIGIN_ID};

/// Runs until the connection closes or a fatal error occurs. Both
/// outcomes mean the same thing to the caller: remove this session
/// from the registry. The `Err` variant exists so the caller can
/// choose whether to log it (a clean EOF and a replay violation are
/// both `Err` here; only the registry cleanup is unconditional).
pub async fn run_session<R, W>(
    mut reader: R,
    session: Arc<SessionHandle<W>>,
    registry: Arc<Registry<W>>,
) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut seq_recv: u64 = 0;

    loop {
        let frame = net::read_frame(&mut reader).await?;
        let opened = crypto::open(&session.key_c2s, &frame)?;

        if opened.sender_id != session.client_id as u128 {
            return Err(SessionError::protocol(
                "AAD sender_id does not match the session it arrived on",
            ));
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

        dispatch(payload, &session, &registry).await?;
    }
}

async fn dispatch<W: AsyncWrite + Unpin>(
    payload: Payload,
    session: &Arc<SessionHandle<W>>,
    registry: &Registry<W>,
) -> Result<(), SessionError> {
    match payload {
        Payload::SendMessage { target_id, message } => match registry.lookup(target_id).await {
            Some(target) => {
                let routed = Payload::Message {
                    from_id: session.client_id,
                    from_name: session.display_name.clone(),
                    message,
                };
                let body = serde_json::to_vec(&routed)
                    .map_err(|e| SessionError::protocol(format!("failed to encode routed message: {e}")))?;
                target.send_sealed(&body, session.client_id as u128).await?;
            }
            None => {
                let reply = Payload::Error {
                    message: format!("{target_id} not online"),
                };
                let body = serde_json::to_vec(&reply)
                    .map_err(|e| SessionError::protocol(format!("failed to encode error reply: {e}")))?;
                session.send_sealed(&body, SERVER_ORIGIN_ID as u128).await?;
            }
        },

        Payload::GetOnlineClients => {
            let clients = registry.snapshot_directory(session.client_id).await;
            let reply = Payload::OnlineClients { clients };
            let body = serde_json::to_vec(&reply)
                .map_err(|e| SessionError::protocol(format!("failed to encode directory reply: {e}")))?;
            session.send_sealed(&body, SERVER_ORIGIN_ID as u128).await?;
        }

        other => {
            return Err(SessionError::protocol(format!(
                "unexpected payload type from client: {other:?}"
            )))
        }
    }
    Ok(())
}
