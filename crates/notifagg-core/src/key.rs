// Bucket keys and the store key space
//
// Encoded form: {recipient}:{EVENT_TYPE}:{subject}:{window}
// String fields escape '%' as %25 and ':' as %3A, so the encoding stays
// injective whatever characters the ids contain.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{EventType, KeyError, WindowId};

const SEPARATOR: char = ':';
const FIELD_COUNT: usize = 4;

/// Identity of an aggregation bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    pub recipient_id: String,
    pub event_type: EventType,
    pub subject_id: String,
    pub window: WindowId,
}

impl BucketKey {
    pub fn new(
        recipient_id: impl Into<String>,
        event_type: EventType,
        subject_id: impl Into<String>,
        window: WindowId,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            event_type,
            subject_id: subject_id.into(),
            window,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            escape(&self.recipient_id),
            self.event_type.as_str(),
            escape(&self.subject_id),
            self.window.0,
            sep = SEPARATOR,
        )
    }

    pub fn decode(encoded: &str) -> Result<Self, KeyError> {
        let parts: Vec<&str> = encoded.split(SEPARATOR).collect();
        if parts.len() != FIELD_COUNT {
            return Err(KeyError::MalformedKey {
                key: encoded.to_string(),
                expected: FIELD_COUNT,
                found: parts.len(),
            });
        }

        let window = parts[3]
            .parse::<u64>()
            .map_err(|_| KeyError::InvalidWindow(parts[3].to_string()))?;

        Ok(Self {
            recipient_id: unescape(parts[0])?,
            event_type: parts[1].parse()?,
            subject_id: unescape(parts[2])?,
            window: WindowId(window),
        })
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for BucketKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for ch in field.chars() {
        match ch {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(field: &str) -> Result<String, KeyError> {
    let mut out = String::with_capacity(field.len());
    let mut rest = field;
    while let Some(idx) = rest.find('%') {
        out.push_str(&rest[..idx]);
        let seq = rest.get(idx..idx + 3);
        match seq {
            Some("%25") => out.push('%'),
            Some("%3A") => out.push(':'),
            _ => return Err(KeyError::InvalidEscape(field.to_string())),
        }
        rest = &rest[idx + 3..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Store key layout for one deployment, namespaced by a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new("notifagg")
    }
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Set holding the distinct actors of a bucket.
    pub fn actors(&self, bucket: &BucketKey) -> String {
        format!("{}:actors:{}", self.prefix, bucket.encode())
    }

    /// Hash holding per-bucket metadata (entity id, overflow count).
    pub fn meta(&self, bucket: &BucketKey) -> String {
        format!("{}:meta:{}", self.prefix, bucket.encode())
    }

    /// Set of encoded bucket keys awaiting a flush.
    pub fn registry(&self) -> String {
        format!("{}:registry", self.prefix)
    }

    pub fn flush_lock(&self) -> String {
        format!("{}:flush-lock", self.prefix)
    }
}

/// Metadata hash field names.
pub mod meta_fields {
    pub const ENTITY_ID: &str = "entity_id";
    pub const OVERFLOW: &str = "overflow";
}
