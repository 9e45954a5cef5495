//! Minimal HL7 v2 support for the MLLP gateway.
//!
//! Only what correlation needs: reading header fields (control id,
//! character set), building acknowledgment messages addressed back to the
//! sender, and decoding payload bytes in the declared character set.

pub mod ack;
pub mod charset;
pub mod error;
pub mod message;

pub use ack::{ACK_ACCEPT, ACK_ERROR, ACK_REJECT};
pub use charset::{is_utf8, BuiltinDecoder, Charset, CharsetDecoder, DEFAULT_CHARSET};
pub use error::{Hl7Error, Result};
pub use message::{Message, Segment};
