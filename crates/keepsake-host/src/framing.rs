//! Length-prefixed message framing
//!
//! Each message is a 4-byte native-endian length followed by that many
//! bytes of UTF-8 JSON.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("Stream ended inside a message")]
    Truncated,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read one message body. Returns `None` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R, limit: usize) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = reader.read(&mut prefix[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(FrameError::Truncated)
            };
        }
        filled += n;
    }

    let size = u32::from_ne_bytes(prefix) as usize;
    if size > limit {
        return Err(FrameError::MessageTooLarge { size, limit });
    }

    let mut body = vec![0u8; size];
    reader.read_exact(&mut body).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => FrameError::Truncated,
        _ => FrameError::Io(e),
    })?;

    Ok(Some(body))
}

pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let size = u32::try_from(body.len()).map_err(|_| FrameError::MessageTooLarge {
        size: body.len(),
        limit: u32::MAX as usize,
    })?;

    writer.write_all(&size.to_ne_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_in_sequence() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        write_frame(&mut client, br#"{"id":"1"}"#).await.unwrap();
        write_frame(&mut client, b"{}").await.unwrap();
        drop(client);

        let first = read_frame(&mut server, 1024).await.unwrap().unwrap();
        assert_eq!(first, br#"{"id":"1"}"#);
        let second = read_frame(&mut server, 1024).await.unwrap().unwrap();
        assert_eq!(second, b"{}");
        assert!(read_frame(&mut server, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let mut bytes = 2048u32.to_ne_bytes().to_vec();
        bytes.extend(std::iter::repeat(b'x').take(16));
        let mut input = bytes.as_slice();

        let err = read_frame(&mut input, 1024).await.unwrap_err();
        assert!(matches!(
            err,
            FrameError::MessageTooLarge { size: 2048, limit: 1024 }
        ));
    }

    #[tokio::test]
    async fn test_truncated_message() {
        let mut bytes = 10u32.to_ne_bytes().to_vec();
        bytes.extend_from_slice(b"abc");
        let mut input = bytes.as_slice();
        assert!(matches!(
            read_frame(&mut input, 1024).await,
            Err(FrameError::Truncated)
        ));

        let mut partial: &[u8] = &[1, 0];
        assert!(matches!(
            read_frame(&mut partial, 1024).await,
            Err(FrameError::Truncated)
        ));
    }
}
