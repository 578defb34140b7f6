//! # Framing
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────────┐
//! │ length: u32 (LE)     │ payload: UTF-8 JSON (length) │
//! └──────────────────────┴──────────────────────────────┘
//! ```

use std::io;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec, LengthDelimitedCodecError};

use crate::error::ControlPlaneError;
use crate::transport::BoxedStream;

/// Largest accepted payload: 16 MiB.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// A control-plane connection with framing applied.
pub type FramedConnection = Framed<BoxedStream, LengthDelimitedCodec>;

/// The length-prefix codec shared by both sides.
pub fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .little_endian()
        .length_field_length(4)
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}

pub fn framed<S>(stream: S) -> Framed<S, LengthDelimitedCodec>
where
    S: AsyncRead + AsyncWrite,
{
    Framed::new(stream, codec())
}

/// Serialize one message, send it as a frame and flush.
pub async fn send<S, T>(
    framed: &mut Framed<S, LengthDelimitedCodec>,
    message: &T,
) -> Result<(), ControlPlaneError>
where
    S: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    framed.send(Bytes::from(payload)).await.map_err(codec_error)
}

/// Receive and decode one frame.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly between
/// frames.
pub async fn receive<S, T>(
    framed: &mut Framed<S, LengthDelimitedCodec>,
) -> Result<Option<T>, ControlPlaneError>
where
    S: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match framed.next().await {
        Some(Ok(frame)) => Ok(Some(serde_json::from_slice(&frame)?)),
        Some(Err(e)) => Err(codec_error(e)),
        None => Ok(None),
    }
}

fn codec_error(err: io::Error) -> ControlPlaneError {
    let oversized = err
        .get_ref()
        .is_some_and(|inner| inner.is::<LengthDelimitedCodecError>());
    if oversized {
        ControlPlaneError::FrameTooLarge { max: MAX_FRAME_LEN }
    } else {
        ControlPlaneError::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ControlRequest;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_frames_arrive_in_order() {
        let (client, server) = tokio::io::duplex(1024);
        let (mut client, mut server) = (framed(client), framed(server));
        let id = Uuid::new_v4();

        send(&mut client, &ControlRequest::Ping).await.unwrap();
        send(&mut client, &ControlRequest::ReportStarted { component_id: id })
            .await
            .unwrap();
        drop(client);

        let first: Option<ControlRequest> = receive(&mut server).await.unwrap();
        let second: Option<ControlRequest> = receive(&mut server).await.unwrap();
        let end: Option<ControlRequest> = receive(&mut server).await.unwrap();

        assert_eq!(first, Some(ControlRequest::Ping));
        assert_eq!(second, Some(ControlRequest::ReportStarted { component_id: id }));
        assert_eq!(end, None);
    }

    #[tokio::test]
    async fn test_length_prefix_is_little_endian() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut client = framed(client);
        send(&mut client, &ControlRequest::Ping).await.unwrap();
        drop(client);

        let mut wire = Vec::new();
        server.read_to_end(&mut wire).await.unwrap();

        let payload = serde_json::to_vec(&ControlRequest::Ping).unwrap();
        assert_eq!(wire[..4], (payload.len() as u32).to_le_bytes());
        assert_eq!(wire[4..], payload[..]);
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut server = framed(server);
        let len = (MAX_FRAME_LEN as u32) + 1;
        client.write_all(&len.to_le_bytes()).await.unwrap();

        let result: Result<Option<ControlRequest>, _> = receive(&mut server).await;
        assert!(matches!(
            result,
            Err(ControlPlaneError::FrameTooLarge { max: MAX_FRAME_LEN })
        ));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_an_error() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut server = framed(server);
        client.write_all(&10u32.to_le_bytes()).await.unwrap();
        client.write_all(b"\"Pi").await.unwrap();
        drop(client);

        let result: Result<Option<ControlRequest>, _> = receive(&mut server).await;
        assert!(matches!(result, Err(ControlPlaneError::Transport(_))));
    }

    #[tokio::test]
    async fn test_garbage_payload_is_protocol_error() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut server = framed(server);
        client.write_all(&4u32.to_le_bytes()).await.unwrap();
        client.write_all(b"nope").await.unwrap();

        let result: Result<Option<ControlRequest>, _> = receive(&mut server).await;
        assert!(matches!(result, Err(ControlPlaneError::Protocol(_))));
    }
}
