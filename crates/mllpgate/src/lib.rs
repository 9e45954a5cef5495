//! Bidirectional MLLP gateway for HL7 v2 messaging.
//!
//! mllpgate listens for framed HL7 messages over TCP, hands each one to the
//! application, and guarantees exactly one acknowledgment per message:
//! either the one the application supplies or a default once the
//! acknowledgment timeout passes. It can also send single messages to other
//! MLLP endpoints.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP endpoints, listening and connecting
//! - [`frame`]: MLLP framing and stream reassembly
//! - [`hl7`]: The HL7 header fields and acknowledgment builder the gateway needs
//! - [`server`]: Listener, acknowledgment correlation and the outbound sender

/// Re-export transport types.
pub mod transport {
    pub use mllpgate_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use mllpgate_frame::*;
}

/// Re-export HL7 types.
pub mod hl7 {
    pub use mllpgate_hl7::*;
}

/// Re-export server types.
pub mod server {
    pub use mllpgate_server::*;
}
