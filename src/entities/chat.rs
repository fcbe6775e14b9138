use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// A chat payload could not be turned into a [`ChatMessage`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed chat message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// When a message was written, as carried on the wire.
///
/// Timestamps that are not RFC 3339 are kept verbatim rather than rejected, so
/// a sender with a broken clock format still gets its message displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTime {
    Parsed(DateTime<FixedOffset>),
    Unparsed(String),
}

impl MessageTime {
    pub fn parse(raw: &str) -> Self {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => Self::Parsed(parsed),
            Err(_) => Self::Unparsed(raw.to_string()),
        }
    }
}

impl From<DateTime<Utc>> for MessageTime {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::Parsed(instant.fixed_offset())
    }
}

impl fmt::Display for MessageTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Same shape as a browser's toISOString: millis and a Z suffix.
            Self::Parsed(instant) => write!(
                f,
                "{}",
                instant
                    .with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            Self::Unparsed(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for MessageTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MessageTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// The one record exchanged over the chat channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub user: String,
    pub text: String,
    pub timestamp: MessageTime,
}

impl ChatMessage {
    pub fn new(user: String, text: String, timestamp: impl Into<MessageTime>) -> Self {
        Self {
            user,
            text,
            timestamp: timestamp.into(),
        }
    }

    /// Decode a single serialized record as received from the channel.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Serialize for the outbound channel.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_browser_record() {
        let msg = ChatMessage::decode(
            r#"{"user":"alice","text":"hi","timestamp":"2024-03-05T14:07:09.250Z"}"#,
        )
        .unwrap();

        assert_eq!(msg.user, "alice");
        assert_eq!(msg.text, "hi");
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
            + chrono::Duration::milliseconds(250);
        assert_eq!(msg.timestamp, MessageTime::from(expected));
    }

    #[test]
    fn test_decode_accepts_offsets_and_extra_fields() {
        let msg = ChatMessage::decode(
            r#"{"user":"Bot","text":"x","timestamp":"2024-03-05T16:07:09.123456789+02:00","id":7}"#,
        )
        .unwrap();

        match msg.timestamp {
            MessageTime::Parsed(instant) => {
                assert_eq!(instant.offset().local_minus_utc(), 2 * 3600);
            }
            MessageTime::Unparsed(raw) => panic!("expected parsed timestamp, got {raw}"),
        }
    }

    #[test]
    fn test_unparsable_timestamp_is_kept() {
        let msg =
            ChatMessage::decode(r#"{"user":"a","text":"b","timestamp":"yesterday-ish"}"#).unwrap();
        assert_eq!(msg.timestamp, MessageTime::Unparsed("yesterday-ish".to_string()));
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let err = ChatMessage::decode(r#"{"user":"a","timestamp":"2024-03-05T14:07:09Z"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn test_wrong_types_are_rejected() {
        assert!(ChatMessage::decode(r#"{"user":1,"text":"b","timestamp":"t"}"#).is_err());
        assert!(ChatMessage::decode(r#"{"user":"a","text":"b","timestamp":null}"#).is_err());
        assert!(ChatMessage::decode("not json").is_err());
        assert!(ChatMessage::decode("").is_err());
    }

    #[test]
    fn test_encode_uses_iso_millis() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let msg = ChatMessage::new("alice".to_string(), "hi".to_string(), instant);

        assert_eq!(
            msg.encode().unwrap(),
            r#"{"user":"alice","text":"hi","timestamp":"2024-03-05T14:07:09.000Z"}"#
        );
    }
}
