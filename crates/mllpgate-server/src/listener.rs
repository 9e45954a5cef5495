use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use mllpgate_frame::MllpCodec;
use mllpgate_hl7::{charset, Message, ACK_REJECT};
use mllpgate_transport::TcpTransport;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn, Instrument};

use crate::config::ServerConfig;
use crate::connection::{ConnectionHandle, ConnectionId};
use crate::correlator::Correlator;
use crate::error::ServerError;
use crate::event::{EventSink, IncomingMessage, ServerEvent};
use crate::registry::ConnectionRegistry;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);
const DUPLICATE_TEXT: &str = "Message already in progress";

/// State shared by the accept loop, connection tasks and the public handle.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) config: ServerConfig,
    pub(crate) correlator: Arc<Correlator>,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) events: EventSink,
    pub(crate) shutdown: CancellationToken,
    next_connection_id: AtomicU64,
}

impl Shared {
    pub(crate) fn new(config: ServerConfig, events: EventSink) -> Self {
        let correlator = Arc::new(Correlator::new(
            config.ack_timeout,
            config.timeout_ack_code(),
        ));
        let registry = ConnectionRegistry::new(config.host.clone(), config.port);
        Self {
            config,
            correlator,
            registry,
            events,
            shutdown: CancellationToken::new(),
            next_connection_id: AtomicU64::new(1),
        }
    }
}

/// Accept connections until shutdown is requested, then drop the listening socket.
pub(crate) async fn accept_loop(transport: TcpTransport, shared: Arc<Shared>) {
    loop {
        tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            accepted = transport.accept() => match accepted {
                Ok((stream, remote)) => {
                    let id = shared.next_connection_id.fetch_add(1, Ordering::Relaxed);
                    tokio::spawn(
                        serve_connection(stream, remote, id, Arc::clone(&shared)).in_current_span(),
                    );
                }
                Err(err) => {
                    warn!(error = %err, "error during MLLP connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }
    drop(transport);
    info!("stopped accepting connections");
}

async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    id: ConnectionId,
    shared: Arc<Shared>,
) {
    info!(%remote, "connected");
    let (read_half, write_half) = stream.into_split();
    let (connection, outbound) = ConnectionHandle::new(id, remote);
    let closing = shared.shutdown.child_token();

    let writer = tokio::spawn(write_acks(write_half, outbound, closing.clone()).in_current_span());

    let state = shared.registry.add(id, remote);
    shared.events.emit(ServerEvent::Connected(state));

    let peer_ended = read_frames(read_half, &connection, &closing, &shared).await;

    closing.cancel();
    if let Err(err) = writer.await {
        debug!(%remote, error = %err, "writer task ended abnormally");
    }

    info!(%remote, "closed");
    let removed = shared.registry.remove(id);
    if peer_ended {
        shared
            .events
            .emit(ServerEvent::PeerEnded(shared.registry.state()));
    }
    if let Some(state) = removed {
        shared.events.emit(ServerEvent::StateChanged(state));
    }
    shared
        .events
        .emit(ServerEvent::Disconnected(shared.registry.state()));
}

async fn read_frames(
    read_half: OwnedReadHalf,
    connection: &ConnectionHandle,
    closing: &CancellationToken,
    shared: &Shared,
) -> bool {
    let remote = connection.remote();
    let mut frames = FramedRead::new(read_half, MllpCodec::with_config(shared.config.frame_config()));

    loop {
        tokio::select! {
            _ = closing.cancelled() => {
                return await_peer_end(&mut frames, shared.config.shutdown_grace, remote).await;
            }
            next = frames.next() => match next {
                Some(Ok(raw)) => handle_frame(shared, connection, raw),
                Some(Err(err)) => {
                    warn!(%remote, error = %err, "connection error");
                    shared.events.emit(ServerEvent::Error {
                        remote,
                        error: Arc::new(err),
                    });
                    return false;
                }
                None => {
                    debug!(%remote, "peer ended connection");
                    return true;
                }
            },
        }
    }
}

/// Wait for the peer to finish its side after our end was sent.
///
/// Frames arriving meanwhile are discarded. Once the grace period passes
/// the socket is dropped regardless. Returns whether the peer ended cleanly.
async fn await_peer_end(
    frames: &mut FramedRead<OwnedReadHalf, MllpCodec>,
    grace: Duration,
    remote: SocketAddr,
) -> bool {
    let drained = tokio::time::timeout(grace, async {
        loop {
            match frames.next().await {
                Some(Ok(_)) => {}
                Some(Err(_)) => return false,
                None => return true,
            }
        }
    })
    .await;
    match drained {
        Ok(ended) => ended,
        Err(_) => {
            debug!(%remote, ?grace, "peer did not close in time, destroying socket");
            false
        }
    }
}

/// Frame and write queued acknowledgments until the connection closes.
///
/// On close, anything already queued is still written before our side of
/// the stream is shut down.
async fn write_acks(
    write_half: OwnedWriteHalf,
    mut outbound: UnboundedReceiver<Bytes>,
    closing: CancellationToken,
) {
    let mut sink = FramedWrite::new(write_half, MllpCodec::new());

    loop {
        tokio::select! {
            biased;
            next = outbound.recv() => match next {
                Some(payload) => {
                    if let Err(err) = sink.send(payload).await {
                        debug!(error = %err, "failed writing acknowledgment");
                        break;
                    }
                }
                None => break,
            },
            _ = closing.cancelled() => break,
        }
    }

    outbound.close();
    while let Ok(payload) = outbound.try_recv() {
        if sink.feed(payload).await.is_err() {
            break;
        }
    }
    if let Err(err) = sink.close().await {
        debug!(error = %err, "failed ending connection");
    }
}

/// Decode, register and announce one inbound frame.
fn handle_frame(shared: &Shared, connection: &ConnectionHandle, raw: Bytes) {
    let (text, message) = decode_message(&shared.config, &raw);
    trace!(remote = %connection.remote(), message = %text.replace('\r', "\n"), "message");

    let id = match message.control_id() {
        "" => generate_message_id(),
        id => id.to_string(),
    };

    match shared
        .correlator
        .register(&id, connection.clone(), raw.clone(), Some(message.clone()))
    {
        Ok(()) => {
            debug!(%id, remote = %connection.remote(), len = raw.len(), "message received");
            shared.events.emit(ServerEvent::Message(IncomingMessage {
                id,
                ack: shared.correlator.default_ack().to_string(),
                text,
                message,
                raw,
            }));
        }
        Err(ServerError::DuplicateInFlight { id }) => reject_duplicate(connection, &message, &id),
        Err(err) => warn!(%id, error = %err, "could not register message"),
    }
}

/// Decode with MSH-18 (or the default charset) and parse.
fn decode_message(config: &ServerConfig, raw: &[u8]) -> (String, Message) {
    let text = String::from_utf8_lossy(raw).into_owned();
    let message = Message::parse(&text);

    let label = match message.charset() {
        "" => config.default_charset.clone(),
        declared => declared.to_string(),
    };
    if charset::is_utf8(&label) {
        return (text, message);
    }

    let text = config.decoder.decode(raw, &label);
    let message = Message::parse(&text);
    (text, message)
}

/// Answer a colliding message directly, bypassing the pending table.
fn reject_duplicate(connection: &ConnectionHandle, message: &Message, id: &str) {
    warn!(id, remote = %connection.remote(), "message already in progress, rejecting");
    match message.create_response(ACK_REJECT, Some(DUPLICATE_TEXT)) {
        Ok(ack) => {
            if let Err(err) = connection.write(Bytes::from(ack.render())) {
                debug!(id, error = %err, "failed sending rejection");
            }
        }
        Err(err) => warn!(id, error = %err, "error building rejection"),
    }
}

fn generate_message_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
