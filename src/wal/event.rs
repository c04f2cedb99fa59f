//! Transaction log events
//!
//! Defines the structure of individual log records and their line encoding.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};

/// Field separator within a record
const FIELD_SEPARATOR: char = '\t';

/// A single mutation recorded in the transaction log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Sequence number, assigned by the writer at append time.
    /// Zero until the event has been written.
    pub sequence: u64,

    /// The kind of mutation
    pub kind: EventKind,

    pub key: String,

    /// Empty for deletes
    pub value: String,
}

/// Mutations that can be logged
///
/// The discriminants are the on-disk kind bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    Delete = 1,
    Put = 2,
}

impl EventKind {
    /// The byte written to the kind field
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for EventKind {
    type Error = u8;

    fn try_from(byte: u8) -> std::result::Result<Self, Self::Error> {
        match byte {
            1 => Ok(EventKind::Delete),
            2 => Ok(EventKind::Put),
            other => Err(other),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Delete => f.write_str("DELETE"),
            EventKind::Put => f.write_str("PUT"),
        }
    }
}

impl Event {
    /// A put event awaiting its sequence number
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            kind: EventKind::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    /// A delete event awaiting its sequence number
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            kind: EventKind::Delete,
            key: key.into(),
            value: String::new(),
        }
    }

    /// Render the event as one newline-terminated record:
    ///
    /// ```text
    /// <sequence>\t<kind>\t<key>\t<value>\n
    /// ```
    ///
    /// Backslash, tab, CR and LF inside the key or value are escaped so a
    /// record always occupies exactly one line.
    pub fn encode_line(&self) -> String {
        let key = escape(&self.key);
        let value = escape(&self.value);

        let mut line = String::with_capacity(24 + key.len() + value.len());
        line.push_str(&self.sequence.to_string());
        line.push(FIELD_SEPARATOR);
        line.push_str(&self.kind.as_byte().to_string());
        line.push(FIELD_SEPARATOR);
        line.push_str(&key);
        line.push(FIELD_SEPARATOR);
        line.push_str(&value);
        line.push('\n');
        line
    }

    /// Parse one record (without its trailing newline).
    ///
    /// `line_no` is 1-based and only used for error reporting. A delete
    /// record may omit its empty value field.
    pub fn parse_line(line: &str, line_no: u64) -> Result<Self> {
        let mut fields = line.split(FIELD_SEPARATOR);

        let sequence_field = fields.next().unwrap_or_default();
        let sequence = sequence_field.parse::<u64>().map_err(|e| {
            KvError::parse(line_no, format!("invalid sequence {:?}: {}", sequence_field, e))
        })?;

        let kind_field = fields
            .next()
            .ok_or_else(|| KvError::parse(line_no, "missing kind field"))?;
        let kind_byte = kind_field.parse::<u8>().map_err(|e| {
            KvError::parse(line_no, format!("invalid kind {:?}: {}", kind_field, e))
        })?;
        let kind = EventKind::try_from(kind_byte)
            .map_err(|b| KvError::parse(line_no, format!("unknown event kind {}", b)))?;

        let key = fields
            .next()
            .ok_or_else(|| KvError::parse(line_no, "missing key field"))?;

        let value = match (fields.next(), kind) {
            (Some(value), _) => value,
            (None, EventKind::Delete) => "",
            (None, EventKind::Put) => return Err(KvError::parse(line_no, "missing value field")),
        };

        if fields.next().is_some() {
            return Err(KvError::parse(line_no, "unexpected extra field"));
        }

        Ok(Self {
            sequence,
            kind,
            key: unescape(key, line_no)?,
            value: unescape(value, line_no)?,
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EventKind::Put => write!(f, "#{} {} {:?} = {:?}", self.sequence, self.kind, self.key, self.value),
            EventKind::Delete => write!(f, "#{} {} {:?}", self.sequence, self.kind, self.key),
        }
    }
}

// =============================================================================
// Field Escaping
// =============================================================================

fn escape(field: &str) -> Cow<'_, str> {
    if !field.contains(&['\\', '\t', '\n', '\r'][..]) {
        return Cow::Borrowed(field);
    }

    let mut out = String::with_capacity(field.len() + 8);
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn unescape(field: &str, line_no: u64) -> Result<String> {
    if !field.contains('\\') {
        return Ok(field.to_string());
    }

    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                return Err(KvError::parse(line_no, format!("unknown escape \\{}", other)));
            }
            None => return Err(KvError::parse(line_no, "dangling escape at end of field")),
        }
    }
    Ok(out)
}
