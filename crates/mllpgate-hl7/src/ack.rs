use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Hl7Error, Result};
use crate::message::{Message, Segment};

/// Application accept.
pub const ACK_ACCEPT: &str = "AA";
/// Application error.
pub const ACK_ERROR: &str = "AE";
/// Application reject.
pub const ACK_REJECT: &str = "AR";

const ACK_TYPE: &str = "ACK";
const DEFAULT_PROCESSING_ID: &str = "P";
const DEFAULT_VERSION: &str = "2.3";

static CONTROL_SEQUENCE: AtomicU32 = AtomicU32::new(0);

impl Message {
    /// Build an acknowledgment addressed back to this message's sender.
    ///
    /// The header swaps sending and receiving application/facility, carries
    /// a fresh timestamp and control id and is typed `ACK`. The `MSA`
    /// segment echoes `code` and this message's control id, plus `text`
    /// when given.
    pub fn create_response(&self, code: &str, text: Option<&str>) -> Result<Message> {
        let header = self.response_header_segment()?;

        let mut msa = vec![code.to_string(), self.control_id().to_string()];
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            msa.push(text.to_string());
        }

        Ok(Message::from_segments(vec![header, Segment::new("MSA", msa)]))
    }

    /// Render only the `MSH` line of an acknowledgment for this message.
    pub fn response_header(&self) -> Result<String> {
        let header = self.response_header_segment()?;
        Ok(Message::from_segments(vec![header]).render())
    }

    fn response_header_segment(&self) -> Result<Segment> {
        if !self.has_header() {
            return Err(Hl7Error::MissingHeader);
        }

        let trigger = self.get("MSH-9.2").unwrap_or("");
        let message_type = if trigger.is_empty() {
            ACK_TYPE.to_string()
        } else {
            format!("{ACK_TYPE}^{trigger}")
        };
        let processing_id = non_empty(self.field("MSH", 11), DEFAULT_PROCESSING_ID);
        let version = non_empty(self.field("MSH", 12), DEFAULT_VERSION);
        let now = chrono::Local::now();

        Ok(Segment::new(
            "MSH",
            [
                self.encoding_characters().to_string(),
                self.field("MSH", 5).to_string(),
                self.field("MSH", 6).to_string(),
                self.field("MSH", 3).to_string(),
                self.field("MSH", 4).to_string(),
                now.format("%Y%m%d%H%M%S").to_string(),
                String::new(),
                message_type,
                next_control_id(&now),
                processing_id.to_string(),
                version.to_string(),
            ],
        ))
    }
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

fn next_control_id(now: &chrono::DateTime<chrono::Local>) -> String {
    let seq = CONTROL_SEQUENCE.fetch_add(1, Ordering::Relaxed) % 1000;
    format!("{}{seq:03}", now.format("%Y%m%d%H%M%S%3f"))
}
