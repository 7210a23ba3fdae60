//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! Every request and response is JSON, prefixed with its length:
//!
//! ```text
//! [u32 big-endian payload length][JSON payload]
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted in either direction (16 MiB).
///
/// A `Sync` carries the whole backup log, so this bounds the dataset size.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("JSON encode error: {0}")]
    Encode(serde_json::Error),

    #[error("JSON decode error: {0}")]
    Decode(serde_json::Error),
}

/// Encode a value to its JSON payload.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(CodecError::Encode)
}

/// Decode a JSON payload.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}

/// Write one length-prefixed frame.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = encode(value)?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    writer.write_u32(payload.len() as u32).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, CodecError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let size = reader.read_u32().await? as usize;
    if size > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }
    let mut payload = vec![0u8; size];
    reader.read_exact(&mut payload).await?;
    decode(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use twophase_messages::{ParticipantRequest, Request, Response};
    use twophase_types::{ClientId, ClientEndpoint, MessageId, TransactionMessage};

    #[tokio::test]
    async fn test_frame_round_trip() {
        let message = TransactionMessage::put(MessageId::from_u128(1), "a", "1", ClientId::from_u128(2));
        let request = Request::from(ParticipantRequest::Put {
            message: message.clone(),
            client: ClientEndpoint::new(ClientId::from_u128(2), "127.0.0.1:9000".parse().unwrap()),
        });

        let (mut client, mut server) = tokio::io::duplex(1024);
        write_frame(&mut client, &request).await.unwrap();
        let decoded: Request = read_frame(&mut server).await.unwrap();

        match decoded {
            Request::Participant(ParticipantRequest::Put { message: got, .. }) => {
                assert_eq!(got, message);
                assert_eq!(got.value(), Some("1"));
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32((MAX_FRAME_SIZE + 1) as u32).await.unwrap();

        let result: Result<Response, _> = read_frame(&mut server).await;
        assert!(matches!(result, Err(CodecError::FrameTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_truncated_frame() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_u32(10).await.unwrap();
        client.write_all(b"{}").await.unwrap();
        drop(client);

        let result: Result<Response, _> = read_frame(&mut server).await;
        assert!(matches!(result, Err(CodecError::Io(_))));
    }

    #[test]
    fn test_invalid_json() {
        let result: Result<Response, _> = decode(b"not json");
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }
}
