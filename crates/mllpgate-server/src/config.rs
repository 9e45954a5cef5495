use std::sync::Arc;
use std::time::Duration;

use mllpgate_frame::{FrameConfig, DEFAULT_MAX_FRAME};
use mllpgate_hl7::{BuiltinDecoder, CharsetDecoder, ACK_ACCEPT, DEFAULT_CHARSET};
use mllpgate_transport::{Endpoint, TransportError};

use crate::error::{Result, ServerError};

/// Time a message may wait for an explicit acknowledgment.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(600);

/// Time each open connection gets to finish an orderly close on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(2000);

/// Standard MLLP port.
pub const DEFAULT_PORT: u16 = 2575;

/// Server construction parameters.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host or address to bind; `"0.0.0.0"` binds every interface.
    pub host: String,
    /// Port to bind, must be greater than zero.
    pub port: u16,
    /// Fixed for the server's lifetime and applied to every message.
    pub ack_timeout: Duration,
    /// Charset assumed when MSH-18 is empty. A non-UTF-8 value sends
    /// undeclared messages through [`decoder`](Self::decoder) as well.
    pub default_charset: String,
    /// Status code sent when the timeout answers a message.
    pub timeout_ack: String,
    pub shutdown_grace: Duration,
    /// Upper bound for bytes buffered without a frame terminator.
    pub max_frame_size: usize,
    pub decoder: Arc<dyn CharsetDecoder>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            default_charset: DEFAULT_CHARSET.to_string(),
            timeout_ack: ACK_ACCEPT.to_string(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            max_frame_size: DEFAULT_MAX_FRAME,
            decoder: Arc::new(BuiltinDecoder),
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn with_default_charset(mut self, charset: impl Into<String>) -> Self {
        self.default_charset = charset.into();
        self
    }

    /// Override the timeout acknowledgment code.
    ///
    /// Values that are not exactly two characters fall back to `AA`.
    pub fn with_timeout_ack(mut self, code: impl Into<String>) -> Self {
        self.timeout_ack = code.into();
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Replace the charset decoder used for non UTF-8 messages.
    pub fn with_decoder(mut self, decoder: Arc<dyn CharsetDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// The effective timeout acknowledgment code.
    pub fn timeout_ack_code(&self) -> String {
        if self.timeout_ack.chars().count() == 2 {
            self.timeout_ack.to_uppercase()
        } else {
            ACK_ACCEPT.to_string()
        }
    }

    /// Validate host and port.
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::new(self.host.clone(), self.port).map_err(|err| match err {
            TransportError::InvalidEndpoint(reason) => ServerError::Config(reason),
            other => ServerError::Transport(other),
        })
    }

    pub(crate) fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.max_frame_size,
        }
    }
}

/// Options for one outbound exchange.
#[derive(Debug, Clone, Default)]
pub struct SendConfig {
    /// Limit for connect, write and response together. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.ack_timeout, Duration::from_millis(600));
        assert_eq!(config.default_charset, "UNICODE UTF-8");
        assert_eq!(config.timeout_ack_code(), "AA");
        assert_eq!(config.shutdown_grace, Duration::from_millis(2000));
    }

    #[test]
    fn timeout_ack_normalized() {
        assert_eq!(ServerConfig::default().with_timeout_ack("ae").timeout_ack_code(), "AE");
        assert_eq!(ServerConfig::default().with_timeout_ack("").timeout_ack_code(), "AA");
        assert_eq!(ServerConfig::default().with_timeout_ack("ERR").timeout_ack_code(), "AA");
    }

    #[test]
    fn endpoint_validation_reports_config_errors() {
        let err = ServerConfig::new("", 2575).endpoint().unwrap_err();
        assert!(matches!(err, ServerError::Config(ref m) if m == "host must be a non-empty string"));

        let err = ServerConfig::new("0.0.0.0", 0).endpoint().unwrap_err();
        assert!(matches!(err, ServerError::Config(ref m) if m == "port must be a number > 0"));
    }
}
