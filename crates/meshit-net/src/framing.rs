//! Length-prefixed framing over stream links.
//!
//! Every frame is `payload_len(4 BE) || payload`. The length must be
//! positive and at most the configured cap; anything else poisons the link
//! and the caller drops it.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Write one frame and flush.
///
/// # Errors
///
/// Returns `InvalidInput` for an empty or oversized payload, otherwise any
/// underlying IO error.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8], max_frame_bytes: usize) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.is_empty() || payload.len() > max_frame_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame length {} out of range", payload.len()),
        ));
    }
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Read one frame.
///
/// Returns `Ok(None)` on a clean EOF at a frame boundary. EOF inside a
/// frame, an out-of-range length, or any other IO failure is an error; the
/// caller closes the link.
pub async fn read_frame<R>(reader: &mut R, max_frame_bytes: usize) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    if len == 0 || len > max_frame_bytes {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {len} out of range"),
        ));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshit_proto::limits::MAX_FRAME_BYTES;

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(1024);

        write_frame(&mut client, b"hello mesh", MAX_FRAME_BYTES)
            .await
            .unwrap();
        let frame = read_frame(&mut server, MAX_FRAME_BYTES).await.unwrap();
        assert_eq!(frame.unwrap(), b"hello mesh");
    }

    #[tokio::test]
    async fn test_multiple_frames_preserve_order() {
        let (mut client, mut server) = tokio::io::duplex(4096);

        for i in 0..5u8 {
            write_frame(&mut client, &[i; 10], MAX_FRAME_BYTES)
                .await
                .unwrap();
        }
        for i in 0..5u8 {
            let frame = read_frame(&mut server, MAX_FRAME_BYTES)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(frame, vec![i; 10]);
        }
    }

    #[tokio::test]
    async fn test_clean_eof_returns_none() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        assert!(read_frame(&mut server, MAX_FRAME_BYTES)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_eof_mid_frame_errors() {
        let (mut client, mut server) = tokio::io::duplex(64);
        // Announce 100 bytes but deliver only 3.
        tokio::io::AsyncWriteExt::write_u32(&mut client, 100)
            .await
            .unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut client, b"abc")
            .await
            .unwrap();
        drop(client);

        assert!(read_frame(&mut server, MAX_FRAME_BYTES).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_length_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_u32(&mut client, 0)
            .await
            .unwrap();
        assert!(read_frame(&mut server, MAX_FRAME_BYTES).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        tokio::io::AsyncWriteExt::write_u32(&mut client, (MAX_FRAME_BYTES + 1) as u32)
            .await
            .unwrap();
        assert!(read_frame(&mut server, MAX_FRAME_BYTES).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_write_rejected() {
        let (mut client, _server) = tokio::io::duplex(64);
        let oversized = vec![0u8; 32];
        assert!(write_frame(&mut client, &oversized, 16).await.is_err());
        assert!(write_frame(&mut client, &[], 16).await.is_err());
    }
}
