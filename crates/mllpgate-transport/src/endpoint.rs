use std::fmt;

use crate::error::{Result, TransportError};

/// Host value that binds every local interface.
pub const ANY_HOST: &str = "0.0.0.0";

/// A validated `host:port` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Validate and create an endpoint.
    ///
    /// The host must be non-empty and the port must be greater than zero.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(TransportError::InvalidEndpoint(
                "host must be a non-empty string".to_string(),
            ));
        }
        if port == 0 {
            return Err(TransportError::InvalidEndpoint(
                "port must be a number > 0".to_string(),
            ));
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// True when the endpoint binds every interface.
    pub fn is_any(&self) -> bool {
        self.host == ANY_HOST
    }

    /// Host label used in logs: `[any]` for the wildcard address.
    pub fn display_host(&self) -> &str {
        if self.is_any() {
            "[any]"
        } else {
            &self.host
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
