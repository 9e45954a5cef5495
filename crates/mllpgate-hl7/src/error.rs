/// Errors raised while reading or building HL7 messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Hl7Error {
    /// The message carries no MSH header segment.
    #[error("message has no MSH header segment")]
    MissingHeader,

    /// A field path such as `MSH-10` could not be parsed.
    #[error("invalid field path: {0}")]
    InvalidPath(String),
}

pub type Result<T> = std::result::Result<T, Hl7Error>;
