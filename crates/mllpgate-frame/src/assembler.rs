use bytes::{Bytes, BytesMut};

use crate::codec::{next_frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Per-connection reassembly buffer for MLLP frames.
///
/// Handles partial reads internally: bytes are appended with
/// [`feed`](Self::feed) and every complete frame is returned in receipt
/// order. Unconsumed bytes stay buffered until the next call.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    buf: BytesMut,
    config: FrameConfig,
    /// Prefix of `buf` already searched for a frame boundary.
    scanned: usize,
    /// Size of a remainder that overflowed after frames were returned.
    overflowed: Option<usize>,
}

impl FrameAssembler {
    /// Create an assembler with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create an assembler with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            scanned: 0,
            overflowed: None,
        }
    }

    /// Append bytes and extract every frame they complete.
    ///
    /// Returns `Err(FrameError::FrameTooLarge)` when the retained remainder
    /// exceeds the configured limit. Frames completed by the same call are
    /// returned first; the error is then reported by the next call.
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        if let Some(size) = self.overflowed {
            return Err(self.too_large(size));
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }
        self.buf.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = next_frame(&mut self.buf, &mut self.scanned) {
            frames.push(frame);
        }

        if self.buf.len() > self.config.max_frame_size {
            if frames.is_empty() {
                return Err(self.too_large(self.buf.len()));
            }
            tracing::debug!(
                frames = frames.len(),
                size = self.buf.len(),
                "remainder over frame limit, reporting after completed frames"
            );
            self.overflowed = Some(self.buf.len());
        }
        Ok(frames)
    }

    fn too_large(&self, size: usize) -> FrameError {
        FrameError::FrameTooLarge {
            size,
            max: self.config.max_frame_size,
        }
    }

    /// Number of bytes waiting for a terminator.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Discard any partial frame.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
        self.overflowed = None;
    }

    /// Current assembler configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}
