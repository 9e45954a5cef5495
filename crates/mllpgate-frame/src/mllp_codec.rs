use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::assembler::FrameAssembler;
use crate::codec::{encode_frame, FrameConfig};
use crate::error::FrameError;

/// `tokio_util` codec for MLLP frames.
///
/// Decoding yields raw payloads (markers stripped) and shares its
/// reassembly rules with [`FrameAssembler`]; encoding wraps payloads in the
/// start and end markers.
#[derive(Debug, Clone, Default)]
pub struct MllpCodec {
    assembler: FrameAssembler,
    ready: VecDeque<Bytes>,
}

impl MllpCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            assembler: FrameAssembler::with_config(config),
            ready: VecDeque::new(),
        }
    }
}

impl Decoder for MllpCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.ready.is_empty() {
            let data = src.split();
            self.ready.extend(self.assembler.feed(&data)?);
        }
        Ok(self.ready.pop_front())
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        let partial = self.assembler.buffered_len();
        if partial > 0 {
            tracing::debug!(len = partial, "discarding partial frame at end of stream");
            self.assembler.clear();
        }
        Ok(None)
    }
}

impl Encoder<Bytes> for MllpCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst);
        Ok(())
    }
}
