//! `[u32 little-endian length][UTF-8 JSON]` framing.

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::BridgeError;

/// Read one frame. `Ok(None)` on a clean end of stream before a header.
pub async fn read_frame<R, T>(reader: &mut R, max_bytes: usize) -> Result<Option<T>, BridgeError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }
    let size = u32::from_le_bytes(header) as usize;
    if size > max_bytes {
        return Err(BridgeError::FrameTooLarge {
            size,
            max: max_bytes,
        });
    }
    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await?;
    Ok(Some(serde_json::from_slice(&body)?))
}

/// Serialize and write one frame, flushing afterwards.
pub async fn write_frame<W, T>(
    writer: &mut W,
    message: &T,
    max_bytes: usize,
) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(message)?;
    if body.len() > max_bytes {
        return Err(BridgeError::FrameTooLarge {
            size: body.len(),
            max: max_bytes,
        });
    }
    writer.write_all(&(body.len() as u32).to_le_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
