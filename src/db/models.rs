/// Row models exposed by the relational index
use crate::envelope::Media;
use serde::Serialize;

/// A message as returned by the query engine, with joined dimensions
/// and, when requested, its reply tree
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub hash: String,
    pub sender: String,
    pub content: String,
    /// Epoch millis
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub medias: Vec<Media>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Durable permalink of the signed envelope blob
    pub url: String,
    /// Net vote score (likes minus dislikes)
    pub likes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRecord>,
    pub replies: Vec<StoredMessage>,
}

/// A user row with derived counts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub address: String,
    pub last_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_info_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<String>,
    pub followers_count: i64,
    pub messages_count: i64,
}

/// Insert payload for a new message row
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub hash: String,
    pub sender: String,
    pub content: String,
    pub timestamp: i64,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub medias: Vec<Media>,
    pub in_reply_to: Option<String>,
    pub origin: Option<String>,
    pub url: String,
}

/// Query parameters for the feed/thread engine
#[derive(Debug, Clone)]
pub struct MessageQuery {
    pub sender: Option<String>,
    pub category: Option<String>,
    pub message_hash: Option<String>,
    pub origin: Option<String>,
    /// Cursor: strictly earlier than this (timestamp, hash) pair
    pub before: Option<i64>,
    pub before_id: Option<String>,
    pub only_parent_comments: bool,
    pub include_replies: bool,
    pub only_following: bool,
    pub limit: i64,
}

impl Default for MessageQuery {
    fn default() -> Self {
        Self {
            sender: None,
            category: None,
            message_hash: None,
            origin: None,
            before: None,
            before_id: None,
            only_parent_comments: true,
            include_replies: true,
            only_following: false,
            limit: 20,
        }
    }
}
