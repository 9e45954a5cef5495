//! MLLP framing for HL7 interchange over TCP.
//!
//! Every message travels as:
//! - a start-of-block byte (`0x0B`)
//! - the payload bytes
//! - an end-of-block byte (`0x1C`) followed by a carriage return (`0x0D`)
//!
//! The [`FrameAssembler`] turns an arbitrary chunked byte stream back into
//! payloads; [`MllpCodec`] exposes the same logic as a `tokio_util` codec.

pub mod assembler;
pub mod codec;
pub mod error;
pub mod mllp_codec;

pub use assembler::FrameAssembler;
pub use codec::{
    decode_frame, encode_frame, frame_payload, FrameConfig, CARRIAGE_RETURN, DEFAULT_MAX_FRAME,
    END_BLOCK, END_MARKER, START_BLOCK,
};
pub use error::{FrameError, Result};
pub use mllp_codec::MllpCodec;
