use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use mllpgate_transport::TcpTransport;
use tokio::task::JoinHandle;
use tracing::{info, info_span, Instrument};

use crate::config::{SendConfig, ServerConfig};
use crate::error::{Result, SendError};
use crate::event::{EventSink, EventStream, ServerEvent};
use crate::listener::{accept_loop, Shared};
use crate::outcome::{AckOutcome, Resolution};
use crate::registry::ConnectionState;
use crate::sender;

/// A listening MLLP server.
///
/// Cloning yields another handle to the same server.
#[derive(Debug, Clone)]
pub struct MllpServer {
    shared: Arc<Shared>,
    local_addr: SocketAddr,
    acceptor: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl MllpServer {
    /// Validate the configuration, bind the listening socket and start accepting.
    ///
    /// Returns the server together with the stream of its events; the first
    /// event is always [`ServerEvent::Ready`].
    ///
    /// # Errors
    ///
    /// [`ServerError::Config`](crate::ServerError::Config) for an empty host
    /// or zero port, [`ServerError::Transport`](crate::ServerError::Transport)
    /// when the address cannot be bound.
    pub async fn bind(config: ServerConfig) -> Result<(Self, EventStream)> {
        let endpoint = config.endpoint()?;
        let span = info_span!("mllp_server", host = %endpoint.host(), port = endpoint.port());

        let transport = TcpTransport::bind(endpoint).instrument(span.clone()).await?;
        let local_addr = transport.local_addr();

        let (events, stream) = EventSink::channel();
        let shared = Arc::new(Shared::new(config, events));
        shared
            .events
            .emit(ServerEvent::Ready(shared.registry.state()));

        let acceptor = tokio::spawn(accept_loop(transport, Arc::clone(&shared)).instrument(span));

        Ok((
            Self {
                shared,
                local_addr,
                acceptor: Arc::new(Mutex::new(Some(acceptor))),
            },
            stream,
        ))
    }

    /// Acknowledge a pending message.
    ///
    /// Each message is answered at most once. A second call, or a call after
    /// the timeout already answered, yields [`Resolution::Unknown`].
    pub fn respond(&self, id: &str, outcome: AckOutcome) -> Resolution {
        self.shared.correlator.resolve(id, outcome)
    }

    /// Acknowledge with a textual reply: a two-letter status code or a
    /// complete acknowledgment.
    pub fn send_response(&self, id: &str, reply: &str) -> Resolution {
        self.respond(id, AckOutcome::from_reply(reply))
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// True while at least one inbound connection is open.
    pub fn is_connected(&self) -> bool {
        !self.shared.registry.is_empty()
    }

    /// Open remote endpoints joined by `", "`.
    pub fn current_remote(&self) -> Option<String> {
        self.shared.registry.state().remote_list()
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.registry.state()
    }

    /// Messages still waiting for an acknowledgment.
    pub fn pending_count(&self) -> usize {
        self.shared.correlator.len()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.shared.config
    }

    /// Send a message to another MLLP endpoint and return its acknowledgment line.
    pub async fn send(
        &self,
        host: &str,
        port: u16,
        payload: impl AsRef<[u8]>,
    ) -> std::result::Result<String, SendError> {
        sender::send(host, port, payload).await
    }

    pub async fn send_with_config(
        &self,
        host: &str,
        port: u16,
        payload: impl AsRef<[u8]>,
        config: &SendConfig,
    ) -> std::result::Result<String, SendError> {
        sender::send_with_config(host, port, payload, config).await
    }

    /// Stop accepting and ask every open connection to end.
    ///
    /// Returns once the listening socket is closed. Open connections get
    /// the configured grace period to close their side and are dropped
    /// afterwards, independently of this call. Closing again is a no-op.
    pub async fn close(&self) {
        let acceptor = self
            .acceptor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(acceptor) = acceptor else {
            return;
        };

        self.shared.shutdown.cancel();
        if let Err(err) = acceptor.await {
            tracing::warn!(error = %err, "accept loop ended abnormally");
        }

        info!(port = self.port(), "server closed");
        self.shared
            .events
            .emit(ServerEvent::Closed(self.shared.registry.state()));
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }
}
