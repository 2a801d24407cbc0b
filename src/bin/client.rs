use anyhow::{Context, Result};
use clap::Parser;
use secure_chat_relay::client_logic::{dispatch_command, parse_command, Command, Endpoint, Notification};
use secure_chat_relay::config;
use secure_chat_relay::handshake::client_handshake;
use secure_chat_relay::identity::TrustedServer;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about = "Client for the secure chat protocol")]
struct Args {
    #[arg(long, default_value = config::DEFAULT_HOST)]
    host: String,

    #[arg(long, default_value_t = config::DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = config::DEFAULT_CERT_PATH)]
    cert: String,

    /// Display name shown to other clients; not authenticated or unique.
    #[arg(long)]
    name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let trusted = TrustedServer::load_pinned(&args.cert)
        .context("loading pinned server certificate (copy server.crt from the relay host)")?;

    let addr = format!("{}:{}", args.host, args.port);
    let mut stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("connecting to {addr}"))?;
    stream.set_nodelay(true).ok();

    let outcome = match client_handshake(&mut stream, &trusted, &args.name).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // Per protocol: signature/authentication failure is fatal to
            // the process, no fallback path.
            eprintln!("[client] handshake failed: {e}");
            std::process::exit(1);
        }
    };
    eprintln!("[client] connected as id {}", outcome.client_id);

    let (read_half, write_half) = stream.into_split();
    let client_id = outcome.client_id;
    let key_s2c = outcome.keys.key_s2c;

    let reader_task = tokio::spawn(async move {
        let result = secure_chat_relay::client_logic::run_reader(read_half, key_s2c, client_id, |notification| {
            match notification {
                Notification::Message { from_id, from_name, message } => {
                    println!("[{from_id}] {from_name}: {message}");
                }
                Notification::OnlineClients(clients) => {
                    if clients.is_empty() {
                        println!("(no other clients online)");
                    } else {
                        for entry in clients {
                            println!("  {} - {}", entry.id, entry.name);
                        }
                    }
                }
                Notification::Error(message) => {
                    println!("(error) {message}");
                }
            }
        })
        .await;
        if let Err(e) = result {
            eprintln!("[client] connection closed: {e}");
        }
    });

    let endpoint = Endpoint::new(outcome.client_id, outcome.keys.key_c2s, write_half);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = parse_command(&line);
        match &command {
            Command::Quit => break,
            Command::Unrecognized(text) => {
                println!("unrecognized command: {text}");
                continue;
            }
            _ => {}
        }
        if let Err(e) = dispatch_command(&endpoint, &command).await {
            eprintln!("[client] send failed: {e}");
            break;
        }
    }

    reader_task.abort();
    Ok(())
}
