use std::borrow::Cow;
use std::fmt;

use encoding_rs::{Encoding, UTF_16BE};

/// Charset label assumed when a message declares none.
pub const DEFAULT_CHARSET: &str = "UNICODE UTF-8";

/// Character sets the built-in decoder understands (HL7 table 0211 labels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Ascii,
    /// `8859/1`, decoded byte for byte rather than as windows-1252.
    Latin1,
    /// Any other `8859/N` part known to `encoding_rs`.
    Iso8859(&'static Encoding),
    Utf16Be,
}

impl Charset {
    /// Map an MSH-18 label to a known charset.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_uppercase();
        match label.as_str() {
            "" | "UNICODE UTF-8" | "UTF-8" | "UTF8" => Some(Self::Utf8),
            "ASCII" => Some(Self::Ascii),
            "8859/1" => Some(Self::Latin1),
            "UNICODE UTF-16" => Some(Self::Utf16Be),
            other => {
                let part = other.strip_prefix("8859/")?;
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                Encoding::for_label(format!("ISO-8859-{part}").as_bytes()).map(Self::Iso8859)
            }
        }
    }

    pub fn decode<'a>(&self, raw: &'a [u8]) -> Cow<'a, str> {
        match self {
            Self::Utf8 => String::from_utf8_lossy(raw),
            Self::Ascii => Cow::Owned(
                raw.iter()
                    .map(|b| {
                        if b.is_ascii() {
                            *b as char
                        } else {
                            char::REPLACEMENT_CHARACTER
                        }
                    })
                    .collect(),
            ),
            Self::Latin1 => encoding_rs::mem::decode_latin1(raw),
            Self::Iso8859(encoding) => encoding.decode_without_bom_handling(raw).0,
            Self::Utf16Be => UTF_16BE.decode_without_bom_handling(raw).0,
        }
    }
}

/// True when `label` names UTF-8, i.e. no transcoding is required.
pub fn is_utf8(label: &str) -> bool {
    matches!(Charset::from_label(label), Some(Charset::Utf8))
}

/// Turns raw payload bytes into text for a declared charset label.
pub trait CharsetDecoder: Send + Sync + fmt::Debug {
    fn decode(&self, raw: &[u8], label: &str) -> String;
}

/// Decoder covering [`Charset`]; unknown labels fall back to lossy UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinDecoder;

impl CharsetDecoder for BuiltinDecoder {
    fn decode(&self, raw: &[u8], label: &str) -> String {
        match Charset::from_label(label) {
            Some(charset) => charset.decode(raw).into_owned(),
            None => {
                tracing::debug!(charset = label, "unsupported charset, decoding as UTF-8");
                String::from_utf8_lossy(raw).into_owned()
            }
        }
    }
}
