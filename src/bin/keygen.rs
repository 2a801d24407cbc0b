//! Generates the server's long-term RSA identity: a PKCS#8 private key
//! and a self-signed certificate over it. Not part of the cryptographic
//! core (spec.md treats key generation as an external collaborator),
//! but without it there's nothing to load at server/client startup.

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use secure_chat_relay::cert::build_self_signed_cert;
use secure_chat_relay::config;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generates server_private_key.pem and server.crt")]
struct Args {
    #[arg(long, default_value = config::DEFAULT_PRIVATE_KEY_PATH)]
    private_key: String,

    #[arg(long, default_value = config::DEFAULT_CERT_PATH)]
    cert: String,

    #[arg(long, default_value = "secure-chat-relay")]
    common_name: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let private_key =
        RsaPrivateKey::new(&mut OsRng, config::RSA_KEY_BITS).context("generating RSA private key")?;
    let key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .context("encoding private key as PKCS#8 PEM")?;

    std::fs::write(&args.private_key, key_pem.as_bytes())
        .with_context(|| format!("writing private key to {}", args.private_key))?;

    let cert_pem = build_self_signed_cert(&key_pem, &args.common_name)
        .context("building self-signed certificate")?;
    std::fs::write(&args.cert, cert_pem)
        .with_context(|| format!("writing certificate to {}", args.cert))?;

    println!("wrote {} and {}", args.private_key, args.cert);
    println!("copy {} to every client that should trust this relay", args.cert);
    Ok(())
}
