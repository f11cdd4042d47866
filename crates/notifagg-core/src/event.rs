use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::KeyError;

/// Interaction kinds that can be aggregated into one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Like,
    Comment,
    Share,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Like => "LIKE",
            EventType::Comment => "COMMENT",
            EventType::Share => "SHARE",
        }
    }

    /// Phrase appended after the actor names, e.g. "liked your post".
    pub fn verb_phrase(&self) -> &'static str {
        match self {
            EventType::Like => "liked your post",
            EventType::Comment => "commented on your post",
            EventType::Share => "shared your post",
        }
    }

    /// Short title used for push delivery.
    pub fn push_title(&self) -> &'static str {
        match self {
            EventType::Like => "New like",
            EventType::Comment => "New comment",
            EventType::Share => "New share",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LIKE" => Ok(EventType::Like),
            "COMMENT" => Ok(EventType::Comment),
            "SHARE" => Ok(EventType::Share),
            _ => Err(KeyError::UnknownEventType(s.to_string())),
        }
    }
}

/// A raw interaction event as produced by a domain service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub recipient_id: String,
    pub actor_id: String,
    pub event_type: EventType,
    pub subject_id: String,
    pub entity_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_from_str() {
        assert_eq!("LIKE".parse::<EventType>().unwrap(), EventType::Like);
        assert_eq!("comment".parse::<EventType>().unwrap(), EventType::Comment);
        assert_eq!("Share".parse::<EventType>().unwrap(), EventType::Share);
        assert!(matches!(
            "POKE".parse::<EventType>(),
            Err(KeyError::UnknownEventType(_))
        ));
    }

    #[test]
    fn test_event_deserializes_from_camel_case() {
        let event: InteractionEvent = serde_json::from_str(
            r#"{"recipientId":"r","actorId":"a","eventType":"LIKE","subjectId":"post-7","entityId":"tenant-1"}"#,
        )
        .unwrap();
        assert_eq!(event.event_type, EventType::Like);
        assert_eq!(event.subject_id, "post-7");
    }
}
