/// Wire types for signed message envelopes
///
/// A message is hashed (canonical JSON, SHA-256), timestamped by the
/// timestamp authority, wrapped together with that timestamp and signed
/// as a whole by the sender. Nothing in an envelope is ever mutated
/// after signing.
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash of the chain origin, reported for users with no messages yet
pub const GENESIS_HASH: &str =
    "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Control operations carried by `Message::Control`
///
/// Unknown operation strings fail deserialization; known-but-unhandled
/// operations (reserved slots such as `Offboard`) are rejected by the
/// control processor, never silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Onboard,
    Offboard,
    HideMessage,
    Like,
    Dislike,
    Follow,
    Unfollow,
}

/// Attached media reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: String,
}

/// Parent reference for replies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRef {
    pub user: String,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlMessage {
    pub previous_message_hash: String,
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub operation: Operation,
    /// Operation payload, JSON-encoded (e.g. `{"messageHash": "0x.."}`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastMessage {
    pub previous_message_hash: String,
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medias: Option<Vec<Media>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<ReplyRef>,
}

/// Tagged message union
///
/// Closed set: new kinds extend this enum and the processor dispatch
/// in the pipeline, nothing else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    Control(ControlMessage),
    Broadcast(BroadcastMessage),
}

impl Message {
    pub fn sender(&self) -> &str {
        match self {
            Message::Control(m) => &m.sender,
            Message::Broadcast(m) => &m.sender,
        }
    }

    pub fn previous_message_hash(&self) -> &str {
        match self {
            Message::Control(m) => &m.previous_message_hash,
            Message::Broadcast(m) => &m.previous_message_hash,
        }
    }

    pub fn origin(&self) -> Option<&str> {
        match self {
            Message::Control(m) => m.origin.as_deref(),
            Message::Broadcast(m) => m.origin.as_deref(),
        }
    }

    /// True for `Control { operation: Onboard }`, the one message kind
    /// allowed through before enrollment.
    pub fn is_onboard(&self) -> bool {
        matches!(
            self,
            Message::Control(ControlMessage {
                operation: Operation::Onboard,
                ..
            })
        )
    }
}

/// Payload signed by the timestamp authority
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampData {
    /// Epoch millis, as a decimal string
    pub timestamp: String,
    /// Canonical hash of the message being stamped
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTimestamp {
    pub data: TimestampData,
    pub signature: String,
}

/// The payload the sender signs: message plus its authority timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeData {
    pub message: Message,
    pub timestamp: SignedTimestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub data: EnvelopeData,
    pub signature: String,
}

impl SignedEnvelope {
    pub fn message(&self) -> &Message {
        &self.data.message
    }

    pub fn sender(&self) -> &str {
        self.data.message.sender()
    }

    /// Content hash minted by the timestamp authority; doubles as the
    /// message's relational primary key.
    pub fn content_hash(&self) -> &str {
        &self.data.timestamp.data.hash
    }
}

/// Canonical serialization of a signable value
///
/// Canonical means the serde_json encoding of the typed value with
/// fields in declaration order; both the client and the verifier hash
/// exactly these bytes.
pub fn canonical_bytes<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(value)
}

/// Canonical hash: `0x`-prefixed hex SHA-256 of the canonical bytes
pub fn canonical_hash<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let bytes = canonical_bytes(value)?;
    Ok(hash_bytes(&bytes))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(Sha256::digest(bytes)))
}

/// One entry in an index page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRef {
    pub link: String,
    pub hash: String,
    pub metadata: RefMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefMetadata {
    pub published_at: i64,
    pub published_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// One page of a user's append log
///
/// Pages form a backward-linked list via `previous_page`; the mutable
/// pointer always resolves to the most recent page. `total_count`
/// covers the whole chain and never decreases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPage {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_page: Option<String>,
    pub total_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_broadcast() -> Message {
        Message::Broadcast(BroadcastMessage {
            previous_message_hash: GENESIS_HASH.to_string(),
            sender: "0x00112233445566778899aabbccddeeff00112233".to_string(),
            origin: None,
            content: "hello".to_string(),
            category: Some("general".to_string()),
            tags: Some(vec!["intro".to_string()]),
            medias: None,
            in_reply_to: None,
        })
    }

    #[test]
    fn test_message_roundtrip_keeps_tag() {
        let json = serde_json::to_value(sample_broadcast()).unwrap();
        assert_eq!(json["type"], "Broadcast");
        assert_eq!(json["previousMessageHash"], GENESIS_HASH);

        let back: Message = serde_json::from_value(json).unwrap();
        assert!(matches!(back, Message::Broadcast(_)));
    }

    #[test]
    fn test_unknown_operation_rejected_at_parse() {
        let json = serde_json::json!({
            "type": "Control",
            "previousMessageHash": GENESIS_HASH,
            "sender": "0x00112233445566778899aabbccddeeff00112233",
            "operation": "selfDestruct"
        });
        assert!(serde_json::from_value::<Message>(json).is_err());
    }

    #[test]
    fn test_canonical_hash_is_stable_and_content_sensitive() {
        let a = canonical_hash(&sample_broadcast()).unwrap();
        let b = canonical_hash(&sample_broadcast()).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 66);

        let mut other = sample_broadcast();
        if let Message::Broadcast(ref mut m) = other {
            m.content = "hello!".to_string();
        }
        assert_ne!(a, canonical_hash(&other).unwrap());
    }

    #[test]
    fn test_index_page_tolerates_missing_messages() {
        let page: IndexPage =
            serde_json::from_str(r#"{"totalCount": 3}"#).unwrap();
        assert!(page.messages.is_empty());
        assert_eq!(page.total_count, 3);
        assert!(page.previous_page.is_none());
    }
}
