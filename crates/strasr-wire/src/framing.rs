use crate::codec::Codec;
use crate::error::WireError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Write a length-prefixed message to an async writer.
///
/// Encodes `value` with `Codec::to_bytes()`, writes a 4-byte little-endian
/// length prefix, then the payload.
pub async fn write_message<T: Codec, W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    value: &T,
    max_message_size: u32,
) -> Result<(), WireError> {
    let payload = value.to_bytes();
    let len = u32::try_from(payload.len()).map_err(|_| WireError::MessageTooLarge(u32::MAX))?;

    if len > max_message_size {
        return Err(WireError::MessageTooLarge(len));
    }

    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(&payload).await?;
    Ok(())
}

/// Read a length-prefixed message from an async reader.
///
/// Returns `WireError::ConnectionClosed` on EOF at the length prefix (a clean
/// disconnect) and `WireError::MessageTooLarge` if the declared length
/// exceeds `max_message_size` (treated as a malformed frame by callers).
pub async fn read_message<T: Codec, R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_message_size: u32,
) -> Result<T, WireError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(WireError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf);
    if len > max_message_size {
        return Err(WireError::MessageTooLarge(len));
    }

    let mut payload = vec![0u8; len as usize];
    match reader.read_exact(&mut payload).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(WireError::ConnectionClosed);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(T::from_bytes(&payload)?)
}
