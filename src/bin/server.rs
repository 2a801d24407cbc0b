use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use secure_chat_relay::config;
use secure_chat_relay::dispatcher::run_session;
use secure_chat_relay::handshake::server_handshake;
use secure_chat_relay::identity::ServerIdentity;
use secure_chat_relay::registry::Registry;
use secure_chat_relay::session::SessionHandle;
use tokio::net::{TcpListener, TcpStream};

#[derive(Parser, Debug)]
#[command(author, version, about = "Relay server for the secure chat protocol")]
struct Args {
    #[arg(long, default_value = config::DEFAULT_HOST)]
    host: String,

    #[arg(long, default_value_t = config::DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = config::DEFAULT_PRIVATE_KEY_PATH)]
    private_key: String,

    #[arg(long, default_value = config::DEFAULT_CERT_PATH)]
    cert: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let identity = Arc::new(
        ServerIdentity::load(&args.private_key, &args.cert)
            .context("loading server identity (run `keygen` first)")?,
    );
    let registry = Arc::new(Registry::new());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding listener on {addr}"))?;
    eprintln!("[server] listening on {addr}");

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("[server] accept failed: {e}");
                continue;
            }
        };
        stream.set_nodelay(true).ok();

        let identity = Arc::clone(&identity);
        let registry = Arc::clone(&registry);
        let client_id = registry.allocate_id();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, identity, registry, client_id).await {
                eprintln!("[server] session {client_id} ({peer_addr}) ended: {e}");
            }
        });
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    identity: Arc<ServerIdentity>,
    registry: Arc<Registry<tokio::net::tcp::OwnedWriteHalf>>,
    client_id: u64,
) -> Result<(), secure_chat_relay::error::SessionError> {
    let outcome = server_handshake(&mut stream, &identity, client_id).await?;

    let (read_half, write_half) = stream.into_split();
    let session = SessionHandle::new(
        outcome.client_id,
        outcome.display_name,
        outcome.keys.key_c2s,
        outcome.keys.key_s2c,
        write_half,
    );
    registry.insert(Arc::clone(&session)).await;

    let result = run_session(read_half, Arc::clone(&session), Arc::clone(&registry)).await;
    registry.remove(session.client_id).await;
    result
}
