use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Start-of-block marker (`VT`).
pub const START_BLOCK: u8 = 0x0B;

/// End-of-block marker (`FS`).
pub const END_BLOCK: u8 = 0x1C;

/// Carriage return terminating the end-of-block marker.
pub const CARRIAGE_RETURN: u8 = 0x0D;

/// Two-byte sequence that closes every frame.
pub const END_MARKER: [u8; 2] = [END_BLOCK, CARRIAGE_RETURN];

/// Default limit for bytes buffered without an end marker: 16 MiB.
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────────┬──────────┬──────────┐
/// │ VT (1B)  │ Payload          │ FS (1B)  │ CR (1B)  │
/// │ 0x0B     │ (any length)     │ 0x1C     │ 0x0D     │
/// └──────────┴──────────────────┴──────────┴──────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(payload.len() + 3);
    dst.put_u8(START_BLOCK);
    dst.put_slice(payload);
    dst.put_slice(&END_MARKER);
}

/// Encode a payload into a freshly allocated frame.
pub fn frame_payload(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + 3);
    encode_frame(payload, &mut buf);
    buf.freeze()
}

/// Extract the next raw frame from a buffer.
///
/// Returns `None` if the buffer doesn't hold a frame yet. On success the
/// consumed bytes are removed from the buffer.
///
/// A frame normally ends at the first `FS CR` sequence; anything up to and
/// including the first `VT` inside it is dropped. When no end marker is
/// buffered but a `VT` appears after position zero, the bytes before it are
/// returned as an unterminated frame and the buffer restarts at that `VT`.
/// This tolerates peers that omit the terminator, and can misfire when a
/// payload carries a raw `0x0B` byte.
pub fn decode_frame(src: &mut BytesMut) -> Option<Bytes> {
    next_frame(src, &mut 0)
}

/// Resumable form of [`decode_frame`].
///
/// `scanned` records how much of `src` is known to hold no frame boundary, so
/// a buffer that grows by small reads is searched once rather than from the
/// start on every call. It is reset whenever bytes are consumed.
pub(crate) fn next_frame(src: &mut BytesMut, scanned: &mut usize) -> Option<Bytes> {
    let from = (*scanned).saturating_sub(END_MARKER.len() - 1);
    if let Some(end) = find_end_marker(src, from) {
        *scanned = 0;
        let mut candidate = src.split_to(end);
        src.advance(END_MARKER.len());

        if let Some(start) = candidate.iter().position(|b| *b == START_BLOCK) {
            candidate.advance(start + 1);
        }
        return Some(candidate.freeze());
    }

    if src.first() != Some(&START_BLOCK) {
        let from = (*scanned).max(1);
        let next_start = src
            .get(from..)
            .and_then(|rest| rest.iter().position(|b| *b == START_BLOCK))
            .map(|offset| from + offset);
        if let Some(start) = next_start {
            *scanned = 0;
            tracing::debug!(len = start, "treating bytes before start marker as unterminated frame");
            return Some(src.split_to(start).freeze());
        }
    }

    *scanned = src.len();
    None
}

fn find_end_marker(src: &[u8], from: usize) -> Option<usize> {
    src.get(from..)?
        .windows(END_MARKER.len())
        .position(|window| window == END_MARKER)
        .map(|offset| from + offset)
}

/// Configuration for frame reassembly.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum bytes buffered without a complete frame. Default: 16 MiB.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME,
        }
    }
}
