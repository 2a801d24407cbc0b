//! Length-prefixed framing: `len_be32 || body`. Used for both the two
//! raw-JSON handshake frames and every AEAD frame afterward — the codec
//! itself doesn't care which.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::MAX_FRAME_LEN;
use crate::error::SessionError;

pub async fn write_frame<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    body: &[u8],
) -> Result<(), SessionError> {
    let len = body.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(body).await?;
    Ok(())
}

pub async fn read_frame<R: tokio::io::AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Vec<u8>, SessionError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(SessionError::Truncated)
        }
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(SessionError::Oversized(len, MAX_FRAME_LEN));
    }

    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => SessionError::Truncated,
            _ => SessionError::from(e),
        })?;
    Ok(body)
}
