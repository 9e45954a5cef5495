use bytes::Bytes;

/// How an acknowledgment is supplied for a pending message.
///
/// Resolution order when building the acknowledgment bytes:
/// 1. `Rendered` is written as given.
/// 2. `StatusCode` builds a standard response when the original message is known.
/// 3. `Literal` is written verbatim.
/// 4. Anything else builds a standard response with the server's timeout code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// Exact acknowledgment bytes produced by the caller.
    Rendered(Bytes),
    /// Two-letter status such as `AA`, `AE` or `AR`.
    StatusCode(String),
    /// Acknowledgment text used verbatim.
    Literal(String),
    /// The server's configured default code.
    Default,
}

impl AckOutcome {
    /// Classify a textual reply: exactly two characters is a status code,
    /// anything else a literal acknowledgment.
    pub fn from_reply(reply: &str) -> Self {
        if reply.chars().count() == 2 {
            Self::StatusCode(reply.to_string())
        } else {
            Self::Literal(reply.to_string())
        }
    }
}

/// What happened to an acknowledgment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The acknowledgment was queued on the originating connection.
    Sent,
    /// No message with that id is pending; it was answered already or never arrived.
    Unknown,
    /// Building the acknowledgment failed; the peer receives nothing.
    RenderFailed,
    /// The originating connection closed before the acknowledgment was written.
    ConnectionGone,
}

impl Resolution {
    pub fn is_sent(self) -> bool {
        matches!(self, Self::Sent)
    }
}
