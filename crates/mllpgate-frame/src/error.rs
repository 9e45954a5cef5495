/// Errors that can occur during MLLP frame handling.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// More bytes are buffered without an end marker than the configured limit allows.
    #[error("frame too large ({size} bytes buffered, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
