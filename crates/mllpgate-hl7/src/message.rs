use crate::error::{Hl7Error, Result};

const DEFAULT_FIELD_SEPARATOR: char = '|';
const DEFAULT_ENCODING_CHARACTERS: &str = "^~\\&";
const HEADER: &str = "MSH";

/// One segment: the segment name followed by its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    fields: Vec<String>,
}

impl Segment {
    /// Build a segment from its name and field values.
    pub fn new<I, S>(name: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = vec![name.to_string()];
        all.extend(fields.into_iter().map(Into::into));
        Self { fields: all }
    }

    /// Segment identifier, e.g. `MSH` or `PID`.
    pub fn name(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or("")
    }

    /// Raw fields including the segment name at index 0.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// A parsed HL7 v2 message.
///
/// Parsing is deliberately shallow: segments and fields are split, nothing
/// is validated or unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    segments: Vec<Segment>,
    separator: String,
}

impl Message {
    /// Split text into segments (`\r` or `\n` terminated) and fields.
    pub fn parse(text: &str) -> Self {
        let separator = text
            .strip_prefix(HEADER)
            .and_then(|rest| rest.chars().next())
            .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
            .unwrap_or(DEFAULT_FIELD_SEPARATOR);

        let segments = text
            .split(['\r', '\n'])
            .filter(|line| !line.trim().is_empty())
            .map(|line| Segment {
                fields: line.split(separator).map(str::to_string).collect(),
            })
            .collect();

        Self {
            segments,
            separator: separator.to_string(),
        }
    }

    pub(crate) fn from_segments(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            separator: DEFAULT_FIELD_SEPARATOR.to_string(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// First segment with the given name.
    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.name() == name)
    }

    pub fn has_header(&self) -> bool {
        self.segment(HEADER).is_some()
    }

    /// Field `index` of the first `segment`, or `""` when absent.
    ///
    /// MSH numbering counts the field separator itself as MSH-1.
    pub fn field(&self, segment: &str, index: usize) -> &str {
        let Some(found) = self.segment(segment) else {
            return "";
        };
        let position = if segment == HEADER {
            match index {
                0 => return "",
                1 => return &self.separator,
                n => n - 1,
            }
        } else {
            index
        };
        found
            .fields
            .get(position)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Look up a field by path: `SEG-n` or `SEG-n.c` (1-based component).
    pub fn get(&self, path: &str) -> Result<&str> {
        let invalid = || Hl7Error::InvalidPath(path.to_string());
        let (segment, rest) = path.split_once('-').ok_or_else(invalid)?;
        let (field, component) = match rest.split_once('.') {
            Some((field, component)) => (field, Some(component)),
            None => (rest, None),
        };
        let field: usize = field.parse().map_err(|_| invalid())?;
        let value = self.field(segment, field);

        match component {
            None => Ok(value),
            Some(component) => {
                let component: usize = component.parse().map_err(|_| invalid())?;
                if component == 0 {
                    return Err(invalid());
                }
                Ok(value
                    .split(self.component_separator())
                    .nth(component - 1)
                    .unwrap_or(""))
            }
        }
    }

    /// MSH-10, the message control id.
    pub fn control_id(&self) -> &str {
        self.field(HEADER, 10)
    }

    /// MSH-18, the declared character set.
    pub fn charset(&self) -> &str {
        self.field(HEADER, 18)
    }

    /// MSH-9, the message type.
    pub fn message_type(&self) -> &str {
        self.field(HEADER, 9)
    }

    /// MSH-2, falling back to the standard `^~\&`.
    pub fn encoding_characters(&self) -> &str {
        match self.field(HEADER, 2) {
            "" => DEFAULT_ENCODING_CHARACTERS,
            chars => chars,
        }
    }

    fn component_separator(&self) -> char {
        self.encoding_characters().chars().next().unwrap_or('^')
    }

    /// Serialize segments separated by `\r`.
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.fields.join(&self.separator))
            .collect::<Vec<_>>()
            .join("\r")
    }
}
