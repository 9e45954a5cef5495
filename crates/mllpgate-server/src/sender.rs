//! One-shot outbound exchange: connect, send one frame, read one acknowledgment.

use bytes::BytesMut;
use mllpgate_frame::{frame_payload, END_BLOCK, START_BLOCK};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info_span, Instrument};

use crate::config::SendConfig;
use crate::error::SendError;

const READ_CAPACITY: usize = 8 * 1024;

/// Send `payload` framed to `host:port` and return the acknowledgment line.
///
/// Waits for the response without a limit; see [`send_with_config`].
pub async fn send(host: &str, port: u16, payload: impl AsRef<[u8]>) -> Result<String, SendError> {
    send_with_config(host, port, payload, &SendConfig::default()).await
}

/// Like [`send`], bounding the whole exchange by `config.timeout`.
///
/// Each call is a single attempt on a fresh connection. The first chunk of
/// response data is treated as the complete response.
pub async fn send_with_config(
    host: &str,
    port: u16,
    payload: impl AsRef<[u8]>,
    config: &SendConfig,
) -> Result<String, SendError> {
    let span = info_span!("mllp_send", host, port);
    let exchange = exchange(host, port, payload.as_ref()).instrument(span);
    match config.timeout {
        Some(limit) => tokio::time::timeout(limit, exchange)
            .await
            .map_err(|_| SendError::Timeout(limit))?,
        None => exchange.await,
    }
}

async fn exchange(host: &str, port: u16, payload: &[u8]) -> Result<String, SendError> {
    let mut stream = mllpgate_transport::connect(host, port).await?;
    stream.write_all(&frame_payload(payload)).await?;
    debug!(len = payload.len(), "message sent");

    let mut response = BytesMut::with_capacity(READ_CAPACITY);
    let read = stream.read_buf(&mut response).await?;
    if let Err(err) = stream.shutdown().await {
        debug!(error = %err, "failed ending outbound connection");
    }
    if read == 0 {
        return Err(SendError::ConnectionClosed);
    }

    let ack = extract_ack_line(&response)?;
    debug!(ack = %ack, "acknowledgment received");
    Ok(ack)
}

/// Pull the acknowledgment line out of a framed response.
///
/// The header line is discarded; the second `\r` separated line is returned
/// with the framing bytes removed.
pub fn extract_ack_line(response: &[u8]) -> Result<String, SendError> {
    let text = String::from_utf8_lossy(response);
    let text = text.replacen(char::from(START_BLOCK), "", 1);
    let line = text.split('\r').nth(1).ok_or(SendError::MalformedAck)?;
    Ok(line.replacen(char::from(END_BLOCK), "", 1))
}
