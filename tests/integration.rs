//! End-to-end scenarios over real loopback TCP, exercising the relay
//! exactly as `bin/server.rs`/`bin/client.rs` wire it together: accept
//! loop, handshake, registry, dispatcher, and the client's reader/
//! writer halves.

use std::sync::Arc;

use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use tokio::net::{TcpListener, TcpStream};

use secure_chat_relay::cert::build_self_signed_cert;
use secure_chat_relay::client_logic::{dispatch_command, run_reader, Command, Endpoint, Notification};
use secure_chat_relay::dispatcher::run_session;
use secure_chat_relay::handshake::{client_handshake, server_handshake, HandshakeOutcome};
use secure_chat_relay::identity::{ServerIdentity, TrustedServer};
use secure_chat_relay::net;
use secure_chat_relay::registry::Registry;
use secure_chat_relay::session::SessionHandle;

fn build_identity() -> (ServerIdentity, TrustedServer) {
    let private_key = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
    let public_key = rsa::RsaPublicKey::from(&private_key);
    let key_pem = private_key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
    let cert_pem = build_self_signed_cert(&key_pem, "test-relay").unwrap();

    let trusted = TrustedServer {
        public_key: public_key.clone(),
    };
    let identity = ServerIdentity {
        private_key,
        public_key,
        cert_pem,
    };
    (identity, trusted)
}

/// Spawns an accept loop on an ephemeral port, mirroring `bin/server.rs`.
/// Returns the bound address and the registry (so tests can assert on
/// live sessions if they need to).
async fn spawn_relay(identity: ServerIdentity) -> (String, Arc<Registry<tokio::net::tcp::OwnedWriteHalf>>) {
    let identity = Arc::new(identity);
    let registry: Arc<Registry<tokio::net::tcp::OwnedWriteHalf>> = Arc::new(Registry::new());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let registry_for_loop = Arc::clone(&registry);
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let identity = Arc::clone(&identity);
            let registry = Arc::clone(&registry_for_loop);
            let client_id = registry.allocate_id();
            tokio::spawn(async move {
                let mut stream = stream;
                let outcome = match server_handshake(&mut stream, &identity, client_id).await {
                    Ok(o) => o,
                    Err(_) => return,
                };
                let (read_half, write_half) = stream.into_split();
                let session = SessionHandle::new(
                    outcome.client_id,
                    outcome.display_name,
                    outcome.keys.key_c2s,
                    outcome.keys.key_s2c,
                    write_half,
                );
                registry.insert(Arc::clone(&session)).await;
                let _ = run_session(read_half, Arc::clone(&session), Arc::clone(&registry)).await;
                registry.remove(session.client_id).await;
            });
        }
    });

    (addr, registry)
}

struct ConnectedClient {
    outcome: HandshakeOutcome,
    endpoint: Arc<Endpoint<tokio::net::tcp::OwnedWriteHalf>>,
    read_half: tokio::net::tcp::OwnedReadHalf,
}

async fn connect(addr: &str, trusted: &TrustedServer, name: &str) -> ConnectedClient {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let outcome = client_handshake(&mut stream, trusted, name).await.unwrap();
    let (read_half, write_half) = stream.into_split();
    let endpoint = Endpoint::new(outcome.client_id, outcome.keys.key_c2s, write_half);
    ConnectedClient {
        outcome,
        endpoint,
        read_half,
    }
}

#[tokio::test]
async fn directed_message_is_delivered_with_expected_sequence_and_sender() {
    let (identity, trusted) = build_identity();
    let (addr, _registry) = spawn_relay(identity).await;

    let alice = connect(&addr, &trusted, "alice").await;
    let bob = connect(&addr, &trusted, "bob").await;
    assert_eq!(alice.outcome.client_id, 1);
    assert_eq!(bob.outcome.client_id, 2);

    dispatch_command(
        &alice.endpoint,
        &Command::Send {
            target_id: bob.outcome.client_id,
            text: "hello".into(),
        },
    )
    .await
    .unwrap();

    let mut bob_read = bob.read_half;
    let key_s2c = bob.outcome.keys.key_s2c;
    let frame = net::read_frame(&mut bob_read).await.unwrap();
    let opened = secure_chat_relay::crypto::open(&key_s2c, &frame).unwrap();
    assert_eq!(opened.seq, 1);
    assert_eq!(opened.sender_id, alice.outcome.client_id as u128);

    let received = String::from_utf8(opened.plaintext).unwrap();
    assert!(received.contains("\"from_id\":1"));
    assert!(received.contains("hello"));
}

#[tokio::test]
async fn replayed_frame_is_rejected_and_closes_the_session() {
    let (identity, trusted) = build_identity();
    let (addr, _registry) = spawn_relay(identity).await;

    let alice = connect(&addr, &trusted, "alice").await;
    let bob = connect(&addr, &trusted, "bob").await;

    dispatch_command(
        &alice.endpoint,
        &Command::Send {
            target_id: bob.outcome.client_id,
            text: "hi".into(),
        },
    )
    .await
    .unwrap();

    let mut bob_read = bob.read_half;
    let key_s2c = bob.outcome.keys.key_s2c;
    let frame = net::read_frame(&mut bob_read).await.unwrap();

    // Feed the identical frame back through bob's own reader: same
    // seq twice must be rejected.
    let (fake_relay, fake_conn) = tokio::io::duplex(4096);
    let mut fake_relay = fake_relay;
    net::write_frame(&mut fake_relay, &frame).await.unwrap();
    net::write_frame(&mut fake_relay, &frame).await.unwrap();
    drop(fake_relay);

    let result = run_reader(fake_conn, key_s2c, bob.outcome.client_id, |_| {}).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn unknown_target_gets_an_error_reply_and_session_stays_open() {
    let (identity, trusted) = build_identity();
    let (addr, _registry) = spawn_relay(identity).await;

    let alice = connect(&addr, &trusted, "alice").await;

    dispatch_command(
        &alice.endpoint,
        &Command::Send {
            target_id: 999,
            text: "hi".into(),
        },
    )
    .await
    .unwrap();

    let mut alice_read = alice.read_half;
    let key_s2c = alice.outcome.keys.key_s2c;
    let frame = net::read_frame(&mut alice_read).await.unwrap();
    let opened = secure_chat_relay::crypto::open(&key_s2c, &frame).unwrap();
    let text = String::from_utf8(opened.plaintext).unwrap();
    assert!(text.contains("\"type\":\"error\""));
    assert!(text.contains("999"));

    // The session should still accept a second command after the error.
    dispatch_command(&alice.endpoint, &Command::ListOnline).await.unwrap();
    let frame2 = net::read_frame(&mut alice_read).await.unwrap();
    assert!(secure_chat_relay::crypto::open(&key_s2c, &frame2).is_ok());
}

#[tokio::test]
async fn directory_listing_excludes_the_requester() {
    let (identity, trusted) = build_identity();
    let (addr, _registry) = spawn_relay(identity).await;

    let alice = connect(&addr, &trusted, "alice").await;
    let bob = connect(&addr, &trusted, "bob").await;

    dispatch_command(&alice.endpoint, &Command::ListOnline).await.unwrap();

    let mut alice_read = alice.read_half;
    let key_s2c = alice.outcome.keys.key_s2c;
    let frame = net::read_frame(&mut alice_read).await.unwrap();
    let opened = secure_chat_relay::crypto::open(&key_s2c, &frame).unwrap();
    let text = String::from_utf8(opened.plaintext).unwrap();

    assert!(text.contains("online_clients"));
    assert!(text.contains(&format!("\"id\":{}", bob.outcome.client_id)));
    assert!(!text.contains(&format!("\"id\":{}", alice.outcome.client_id)));
}

#[tokio::test]
async fn handshake_over_real_tcp_derives_matching_keys() {
    let (identity, trusted) = build_identity();
    let (addr, _registry) = spawn_relay(identity).await;

    let alice = connect(&addr, &trusted, "alice").await;
    assert_eq!(alice.outcome.client_id, 1);

    let notification_slot: Arc<std::sync::Mutex<Option<Notification>>> = Arc::new(std::sync::Mutex::new(None));
    let slot = Arc::clone(&notification_slot);
    let key_s2c = alice.outcome.keys.key_s2c;
    let client_id = alice.outcome.client_id;
    let read_half = alice.read_half;

    tokio::spawn(async move {
        let _ = run_reader(read_half, key_s2c, client_id, move |n| {
            *slot.lock().unwrap() = Some(n);
        })
        .await;
    });

    dispatch_command(&alice.endpoint, &Command::ListOnline).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let got = notification_slot.lock().unwrap().clone();
    assert!(matches!(got, Some(Notification::OnlineClients(_))));
}
