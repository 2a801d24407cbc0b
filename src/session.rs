//! Per-connection session state (C4), split into an owned receive half
//! and a shared, lock-guarded send half — see the design note in
//! SPEC_FULL.md §4.4/§9: the receive task is the sole writer of
//! `seq_recv` and needs no lock for it; any task that wants to send to
//! this client (the dispatcher routing a peer message, or the
//! session's own directory/error replies) takes `send` and must hold
//! it across both sequence assignment and the frame write so the two
//! never interleave with another sender.

use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::Mutex;

use crate::crypto;
use crate::error::SessionError;
use crate::net;

pub type ClientId = u64;

/// Id `0` is reserved for server-originated messages (directory, errors).
pub const SERVER_ORIGIN_ID: ClientId = 0;

struct SendHalf<W> {
    writer: W,
    key_s2c: [u8; 16],
    seq_send: u64,
}

/// Shared, reference-counted handle the registry hands out. Cloning is
/// cheap (`Arc`); every clone sends through the same lock and socket.
pub struct SessionHandle<W = OwnedWriteHalf> {
    pub client_id: ClientId,
    pub display_name: String,
    pub key_c2s: [u8; 16],
    send: Mutex<SendHalf<W>>,
}

impl<W: AsyncWrite + Unpin> SessionHandle<W> {
    pub fn new(
        client_id: ClientId,
        display_name: String,
        key_c2s: [u8; 16],
        key_s2c: [u8; 16],
        writer: W,
    ) -> Arc<Self> {
        Arc::new(Self {
            client_id,
            display_name,
            key_c2s,
            send: Mutex::new(SendHalf {
                writer,
                key_s2c,
                seq_send: 0,
            }),
        })
    }

    /// Assigns the next sequence number, seals `plaintext` under this
    /// session's `K_s2c` with the given AAD ids, and writes the frame —
    /// all under one lock, so the invariant "emitted seq is exactly
    /// previous + 1" holds no matter how many tasks call this
    /// concurrently.
    pub async fn send_sealed(
        &self,
        plaintext: &[u8],
        sender_id: u128,
    ) -> Result<(), SessionError> {
        let mut guard = self.send.lock().await;
        let seq = guard.seq_send + 1;
        let frame = crypto::seal(
            &guard.key_s2c,
            plaintext,
            sender_id,
            self.client_id as u128,
            seq,
        )?;
        net::write_frame(&mut guard.writer, &frame).await?;
        guard.seq_send = seq;
        Ok(())
    }

    #[cfg(test)]
    pub async fn current_seq_send(&self) -> u64 {
        self.send.lock().await.seq_send
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn concurrent_sends_assign_strictly_increasing_sequence_numbers() {
        let (client, mut server) = tokio::io::duplex(1 << 20);
        let handle = SessionHandle::new(2, "bob".into(), [0u8; 16], [1u8; 16], client);

        // Drain frames on the "server" side so writes never block.
        let drain = tokio::spawn(async move {
            loop {
                if net::read_frame(&mut server).await.is_err() {
                    break;
                }
            }
        });

        let seen = Arc::new(AtomicU64::new(0));
        let mut tasks = Vec::new();
        for _ in 0..20 {
            let handle = Arc::clone(&handle);
            let seen = Arc::clone(&seen);
            tasks.push(tokio::spawn(async move {
                handle.send_sealed(b"hi", 0).await.unwrap();
                seen.fetch_add(1, Ordering::SeqCst);
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(seen.load(Ordering::SeqCst), 20);
        assert_eq!(handle.current_seq_send().await, 20);
        drop(handle);
        let _ = drain.await;
    }
}
