use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use mllpgate_hl7::{Hl7Error, Message};
use tracing::{debug, warn};

use crate::connection::ConnectionHandle;
use crate::error::{Result, ServerError};
use crate::outcome::{AckOutcome, Resolution};
use crate::scheduler::AckTimer;

struct PendingResponse {
    connection: ConnectionHandle,
    raw: Bytes,
    message: Option<Message>,
    /// Distinguishes this entry from a later one reusing the same id.
    generation: u64,
    timer: AckTimer,
}

/// In-flight messages keyed by control id.
///
/// Each id is acknowledged at most once: whoever removes the entry first
/// (an explicit response or the timeout) writes the acknowledgment, and
/// every later attempt finds nothing.
pub struct Correlator {
    pending: Mutex<HashMap<String, PendingResponse>>,
    next_generation: AtomicU64,
    timeout: Duration,
    default_ack: String,
}

impl Correlator {
    pub fn new(timeout: Duration, default_ack: impl Into<String>) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            timeout,
            default_ack: default_ack.into(),
        }
    }

    /// Code used when the timeout answers a message.
    pub fn default_ack(&self) -> &str {
        &self.default_ack
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Record a message and start its timeout.
    ///
    /// Fails with [`ServerError::DuplicateInFlight`] when `id` is already
    /// pending; the existing entry and its timer are left untouched.
    pub fn register(
        self: &Arc<Self>,
        id: &str,
        connection: ConnectionHandle,
        raw: Bytes,
        message: Option<Message>,
    ) -> Result<()> {
        let mut pending = self.lock();
        if pending.contains_key(id) {
            return Err(ServerError::DuplicateInFlight { id: id.to_string() });
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let correlator = Arc::downgrade(self);
        let timer_id = id.to_string();
        let timer = AckTimer::start(self.timeout, move || {
            if let Some(correlator) = correlator.upgrade() {
                correlator.expire(&timer_id, generation);
            }
        });

        pending.insert(
            id.to_string(),
            PendingResponse {
                connection,
                raw,
                message,
                generation,
                timer,
            },
        );
        Ok(())
    }

    /// Acknowledge a pending message.
    ///
    /// Unknown ids are logged and reported as [`Resolution::Unknown`].
    pub fn resolve(&self, id: &str, outcome: AckOutcome) -> Resolution {
        // Held until the write is queued: an empty table means every
        // acknowledgment has reached its connection.
        let mut pending = self.lock();
        match pending.remove(id) {
            Some(entry) => self.complete(id, entry, outcome, "direct"),
            None => {
                warn!(id, mode = "direct", "response already sent, ignoring another one");
                Resolution::Unknown
            }
        }
    }

    /// Whether `id` is still waiting for an acknowledgment.
    pub fn is_pending(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    /// Original payload bytes of a pending message.
    pub fn original(&self, id: &str) -> Option<Bytes> {
        self.lock().get(id).map(|entry| entry.raw.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn expire(&self, id: &str, generation: u64) {
        let mut pending = self.lock();
        let entry = match pending.get(id) {
            Some(entry) if entry.generation == generation => pending.remove(id),
            _ => None,
        };
        match entry {
            Some(entry) => {
                self.complete(id, entry, AckOutcome::Default, "timeout");
            }
            None => debug!(id, mode = "timeout", "response already sent"),
        }
    }

    fn complete(
        &self,
        id: &str,
        entry: PendingResponse,
        outcome: AckOutcome,
        mode: &'static str,
    ) -> Resolution {
        entry.timer.cancel();

        let ack = match render_ack(outcome, entry.message.as_ref(), &self.default_ack) {
            Ok(ack) => ack,
            Err(err) => {
                warn!(id, mode, error = %err, "error building acknowledgment, nothing sent");
                return Resolution::RenderFailed;
            }
        };

        match entry.connection.write(ack) {
            Ok(()) => {
                debug!(id, mode, remote = %entry.connection.remote(), "acknowledgment queued");
                Resolution::Sent
            }
            Err(err) => {
                warn!(id, mode, error = %err, "error sending acknowledgment");
                Resolution::ConnectionGone
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingResponse>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("pending", &self.len())
            .field("timeout", &self.timeout)
            .field("default_ack", &self.default_ack)
            .finish()
    }
}

/// Compute acknowledgment bytes; first matching rule wins.
fn render_ack(
    outcome: AckOutcome,
    original: Option<&Message>,
    default_ack: &str,
) -> std::result::Result<Bytes, Hl7Error> {
    match (outcome, original) {
        (AckOutcome::Rendered(bytes), _) => Ok(bytes),
        (AckOutcome::StatusCode(code), Some(message)) => {
            Ok(Bytes::from(message.create_response(&code, None)?.render()))
        }
        (AckOutcome::Literal(text), _) => Ok(Bytes::from(text)),
        (_, original) => {
            let message = original.ok_or(Hl7Error::MissingHeader)?;
            Ok(Bytes::from(message.create_response(default_ack, None)?.render()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    const MSG: &str = "MSH|^~\\&|LAB|LABFAC|HIS|HOSP|20240101120000||ORU^R01|MSGID001|P|2.3\rPID|1";

    fn correlator(timeout_ms: u64, default_ack: &str) -> Arc<Correlator> {
        Arc::new(Correlator::new(Duration::from_millis(timeout_ms), default_ack))
    }

    fn connection() -> (ConnectionHandle, UnboundedReceiver<Bytes>) {
        ConnectionHandle::new(1, SocketAddr::from(([127, 0, 0, 1], 40000)))
    }

    fn register(correlator: &Arc<Correlator>, connection: &ConnectionHandle) -> Result<()> {
        correlator.register(
            "MSGID001",
            connection.clone(),
            Bytes::from_static(MSG.as_bytes()),
            Some(Message::parse(MSG)),
        )
    }

    fn status_line(payload: &Bytes) -> String {
        String::from_utf8_lossy(payload)
            .split('\r')
            .nth(1)
            .unwrap_or_default()
            .to_string()
    }

    #[tokio::test]
    async fn resolve_twice_writes_once() {
        let correlator = correlator(60_000, "AA");
        let (conn, mut rx) = connection();
        register(&correlator, &conn).unwrap();

        let first = correlator.resolve("MSGID001", AckOutcome::StatusCode("AA".into()));
        let second = correlator.resolve("MSGID001", AckOutcome::StatusCode("AE".into()));

        assert_eq!(first, Resolution::Sent);
        assert_eq!(second, Resolution::Unknown);
        assert_eq!(status_line(&rx.try_recv().unwrap()), "MSA|AA|MSGID001");
        assert!(rx.try_recv().is_err());
        assert!(correlator.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_sends_default_ack_once() {
        let correlator = correlator(600, "AE");
        let (conn, mut rx) = connection();
        register(&correlator, &conn).unwrap();

        tokio::time::sleep(Duration::from_millis(599)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(status_line(&rx.try_recv().unwrap()), "MSA|AE|MSGID001");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert!(!correlator.is_pending("MSGID001"));
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_resolve_cancels_timeout() {
        let correlator = correlator(600, "AE");
        let (conn, mut rx) = connection();
        register(&correlator, &conn).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(correlator.resolve("MSGID001", AckOutcome::StatusCode("AA".into())).is_sent());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(status_line(&rx.try_recv().unwrap()), "MSA|AA|MSGID001");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_after_timeout_is_unknown() {
        let correlator = correlator(600, "AA");
        let (conn, mut rx) = connection();
        register(&correlator, &conn).unwrap();

        tokio::time::sleep(Duration::from_millis(700)).await;
        let late = correlator.resolve("MSGID001", AckOutcome::StatusCode("AR".into()));

        assert_eq!(late, Resolution::Unknown);
        assert_eq!(status_line(&rx.try_recv().unwrap()), "MSA|AA|MSGID001");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_leaves_original_entry_and_timer() {
        let correlator = correlator(600, "AA");
        let (first, mut first_rx) = connection();
        let (second, mut second_rx) = ConnectionHandle::new(2, SocketAddr::from(([127, 0, 0, 1], 40001)));
        register(&correlator, &first).unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        let err = register(&correlator, &second).unwrap_err();
        assert!(matches!(err, ServerError::DuplicateInFlight { ref id } if id == "MSGID001"));

        tokio::time::sleep(Duration::from_millis(301)).await;
        assert_eq!(status_line(&first_rx.try_recv().unwrap()), "MSA|AA|MSGID001");
        assert!(second_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timer_does_not_answer_reused_id() {
        let correlator = correlator(600, "AA");
        let (conn, mut rx) = connection();
        register(&correlator, &conn).unwrap();
        assert!(correlator.resolve("MSGID001", AckOutcome::StatusCode("AA".into())).is_sent());

        tokio::time::sleep(Duration::from_millis(400)).await;
        register(&correlator, &conn).unwrap();

        // First registration's deadline passes; the second entry stays pending.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(correlator.is_pending("MSGID001"));
        assert_eq!(rx.try_recv().map(|p| status_line(&p)).unwrap(), "MSA|AA|MSGID001");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn rendered_bytes_written_verbatim() {
        let correlator = correlator(60_000, "AA");
        let (conn, mut rx) = connection();
        register(&correlator, &conn).unwrap();

        let bytes = Bytes::from_static(b"MSH|^~\\&|custom\rMSA|AE|MSGID001|bad");
        correlator.resolve("MSGID001", AckOutcome::Rendered(bytes.clone()));
        assert_eq!(rx.try_recv().unwrap(), bytes);
    }

    #[tokio::test]
    async fn literal_written_verbatim() {
        let correlator = correlator(60_000, "AA");
        let (conn, mut rx) = connection();
        register(&correlator, &conn).unwrap();

        correlator.resolve("MSGID001", AckOutcome::Literal("MSH|x\rMSA|CA|MSGID001".into()));
        assert_eq!(rx.try_recv().unwrap().as_ref(), b"MSH|x\rMSA|CA|MSGID001");
    }

    #[tokio::test]
    async fn default_outcome_uses_configured_code() {
        let correlator = correlator(60_000, "AE");
        let (conn, mut rx) = connection();
        register(&correlator, &conn).unwrap();

        correlator.resolve("MSGID001", AckOutcome::Default);
        assert_eq!(status_line(&rx.try_recv().unwrap()), "MSA|AE|MSGID001");
    }

    #[tokio::test]
    async fn render_failure_drops_ack() {
        let correlator = correlator(60_000, "AA");
        let (conn, mut rx) = connection();
        correlator
            .register("no-header", conn, Bytes::from_static(b"PID|1"), None)
            .unwrap();

        let result = correlator.resolve("no-header", AckOutcome::StatusCode("AA".into()));
        assert_eq!(result, Resolution::RenderFailed);
        assert!(rx.try_recv().is_err());
        assert!(!correlator.is_pending("no-header"));
    }

    #[tokio::test]
    async fn closed_connection_reports_gone() {
        let correlator = correlator(60_000, "AA");
        let (conn, rx) = connection();
        register(&correlator, &conn).unwrap();
        drop(rx);

        let result = correlator.resolve("MSGID001", AckOutcome::StatusCode("AA".into()));
        assert_eq!(result, Resolution::ConnectionGone);
    }

    #[tokio::test]
    async fn original_bytes_available_while_pending() {
        let correlator = correlator(60_000, "AA");
        let (conn, _rx) = connection();
        register(&correlator, &conn).unwrap();

        assert_eq!(correlator.original("MSGID001").unwrap().as_ref(), MSG.as_bytes());
        assert_eq!(correlator.len(), 1);
    }
}
