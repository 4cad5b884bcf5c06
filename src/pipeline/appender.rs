/// Append-log writer
///
/// Each accepted envelope is stored as an immutable blob, then linked
/// into the sender's backward-chained index pages. The head page is
/// content-addressed, so every append mints a new head address and
/// re-targets the sender's mutable pointer at it. Ordering on swap:
/// pin the new head, publish the pointer, then release the stale head.
/// A crash between steps can leak a pin but never lose a message or
/// publish a dangling pointer.
use crate::{
    content_store::{join_url, ContentStore},
    envelope::{IndexPage, Message, MessageRef, RefMetadata, SignedEnvelope},
    error::{DropsError, DropsResult},
};
use std::sync::Arc;

/// What an append produced, handed to processors for follow-up work
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    /// Content address of the stored envelope blob
    pub message_address: String,
    /// Public permalink of the stored envelope blob
    pub message_url: String,
    /// Content address of the new head page
    pub page_address: String,
    /// Public URL of the sender's mutable pointer
    pub index_link: String,
}

pub struct LogAppender {
    store: Arc<dyn ContentStore>,
    /// Page capacity; a full head page rolls over into a fresh one
    max_page_messages: usize,
    /// Stamped into index entries as `publishedBy`
    service_id: String,
    /// Base URL for service permalinks on broadcast entries
    messages_base_url: Option<String>,
}

impl LogAppender {
    pub fn new(
        store: Arc<dyn ContentStore>,
        max_page_messages: usize,
        service_id: String,
        messages_base_url: Option<String>,
    ) -> Self {
        Self {
            store,
            max_page_messages,
            service_id,
            messages_base_url,
        }
    }

    /// Append one envelope to the sender's log. The caller holds the
    /// sender's append lock.
    pub async fn append(
        &self,
        sender: &str,
        envelope: &SignedEnvelope,
        published_at: i64,
    ) -> DropsResult<AppendOutcome> {
        let sender = sender.to_lowercase();

        let blob = serde_json::to_vec(envelope)
            .map_err(|e| DropsError::Internal(format!("Cannot serialize envelope: {}", e)))?;
        let message_address = self.store.put(blob).await?;
        self.store.pin(&message_address).await?;
        let message_url = self.store.content_url(&message_address);

        let head_address = self.store.resolve_pointer(&sender).await?;
        let (mut page, stale_head) = match &head_address {
            Some(address) => {
                let bytes = self.store.get(address).await?;
                let head: IndexPage = serde_json::from_slice(&bytes).map_err(|e| {
                    DropsError::Consistency(format!("Corrupt index page {}: {}", address, e))
                })?;
                if head.messages.len() >= self.max_page_messages {
                    // Roll over: the full head becomes the immutable
                    // previous page of a fresh one and keeps its pin
                    let page = IndexPage {
                        messages: Vec::new(),
                        previous_page: Some(address.clone()),
                        total_count: head.total_count,
                    };
                    (page, None)
                } else {
                    (head, Some(address.clone()))
                }
            }
            None => (
                IndexPage {
                    messages: Vec::new(),
                    previous_page: None,
                    total_count: 0,
                },
                None,
            ),
        };

        // Broadcast entries carry a service permalink; control entries
        // have no browsable page
        let permalink = match envelope.message() {
            Message::Broadcast(_) => self
                .messages_base_url
                .as_deref()
                .map(|base| join_url(base, envelope.content_hash())),
            Message::Control(_) => None,
        };
        page.messages.push(MessageRef {
            link: message_url.clone(),
            hash: envelope.content_hash().to_string(),
            metadata: RefMetadata {
                published_at,
                published_by: self.service_id.clone(),
                link: permalink,
            },
        });
        page.total_count += 1;

        let page_bytes = serde_json::to_vec(&page)
            .map_err(|e| DropsError::Internal(format!("Cannot serialize index page: {}", e)))?;
        let page_address = self.store.put(page_bytes).await?;
        self.store.pin(&page_address).await?;
        let index_link = self.store.publish_pointer(&sender, &page_address).await?;

        if let Some(stale) = stale_head {
            if let Err(e) = self.store.unpin(&stale).await {
                tracing::warn!(address = %stale, error = %e, "Failed to unpin stale index page");
            }
        }

        Ok(AppendOutcome {
            message_address,
            message_url,
            page_address,
            index_link,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_store::memory::MemoryStore;
    use crate::envelope::{
        canonical_hash, BroadcastMessage, ControlMessage, EnvelopeData, Message, Operation,
        SignedTimestamp, TimestampData, GENESIS_HASH,
    };

    fn seal(message: Message) -> SignedEnvelope {
        let hash = canonical_hash(&message).unwrap();
        SignedEnvelope {
            data: EnvelopeData {
                message,
                timestamp: SignedTimestamp {
                    data: TimestampData {
                        timestamp: "1700000000000".to_string(),
                        hash,
                    },
                    signature: "0xstub".to_string(),
                },
            },
            signature: "0xstub".to_string(),
        }
    }

    fn envelope(sender: &str, content: &str) -> SignedEnvelope {
        seal(Message::Broadcast(BroadcastMessage {
            previous_message_hash: GENESIS_HASH.to_string(),
            sender: sender.to_string(),
            origin: None,
            content: content.to_string(),
            category: None,
            tags: None,
            medias: None,
            in_reply_to: None,
        }))
    }

    fn control_envelope(sender: &str) -> SignedEnvelope {
        seal(Message::Control(ControlMessage {
            previous_message_hash: GENESIS_HASH.to_string(),
            sender: sender.to_string(),
            origin: None,
            operation: Operation::Onboard,
            data: None,
        }))
    }

    async fn head_page(store: &MemoryStore, sender: &str) -> IndexPage {
        let address = store.resolve_pointer(sender).await.unwrap().unwrap();
        serde_json::from_slice(&store.get(&address).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_sequential_appends_chain_in_order() {
        let store = Arc::new(MemoryStore::new());
        let appender = LogAppender::new(store.clone(), 100, "drops".to_string(), None);

        let mut hashes = Vec::new();
        for i in 0..5 {
            let env = envelope("0xabc", &format!("message {}", i));
            hashes.push(env.content_hash().to_string());
            appender.append("0xabc", &env, 1000 + i).await.unwrap();
        }

        let page = head_page(&store, "0xabc").await;
        assert_eq!(page.total_count, 5);
        assert!(page.previous_page.is_none());
        let page_hashes: Vec<_> = page.messages.iter().map(|m| m.hash.clone()).collect();
        assert_eq!(page_hashes, hashes);
    }

    #[tokio::test]
    async fn test_rollover_starts_a_new_page() {
        let store = Arc::new(MemoryStore::new());
        let appender = LogAppender::new(store.clone(), 3, "drops".to_string(), None);

        for i in 0..4 {
            let env = envelope("0xabc", &format!("message {}", i));
            appender.append("0xabc", &env, 1000 + i).await.unwrap();
        }

        let head = head_page(&store, "0xabc").await;
        assert_eq!(head.messages.len(), 1);
        assert_eq!(head.total_count, 4);

        let previous_address = head.previous_page.unwrap();
        let previous: IndexPage =
            serde_json::from_slice(&store.get(&previous_address).await.unwrap()).unwrap();
        assert_eq!(previous.messages.len(), 3);
        assert_eq!(previous.total_count, 3);
        // Full pages in the chain stay pinned
        assert!(store.is_pinned(&previous_address));
    }

    #[tokio::test]
    async fn test_stale_head_is_unpinned_and_new_head_pinned() {
        let store = Arc::new(MemoryStore::new());
        let appender = LogAppender::new(store.clone(), 100, "drops".to_string(), None);

        let first = appender
            .append("0xabc", &envelope("0xabc", "one"), 1000)
            .await
            .unwrap();
        assert!(store.is_pinned(&first.page_address));

        let second = appender
            .append("0xabc", &envelope("0xabc", "two"), 1001)
            .await
            .unwrap();
        assert!(store.is_pinned(&second.page_address));
        assert!(!store.is_pinned(&first.page_address));
        // Message blobs stay pinned either way
        assert!(store.is_pinned(&first.message_address));
        assert!(store.is_pinned(&second.message_address));
    }

    #[tokio::test]
    async fn test_pointer_tracks_latest_head() {
        let store = Arc::new(MemoryStore::new());
        let appender = LogAppender::new(store.clone(), 100, "drops".to_string(), None);

        let outcome = appender
            .append("0xAbC", &envelope("0xAbC", "one"), 1000)
            .await
            .unwrap();
        assert_eq!(
            store.pointer_target("0xabc").unwrap(),
            outcome.page_address
        );
        assert_eq!(outcome.index_link, "memory://name/0xabc");
    }

    #[tokio::test]
    async fn test_entry_metadata_stamps_service_identity() {
        let store = Arc::new(MemoryStore::new());
        let appender = LogAppender::new(
            store.clone(),
            100,
            "drops".to_string(),
            Some("https://drops.example/messages".to_string()),
        );

        let post = envelope("0xabc", "hello");
        appender.append("0xabc", &post, 1000).await.unwrap();
        appender
            .append("0xabc", &control_envelope("0xabc"), 1001)
            .await
            .unwrap();

        let page = head_page(&store, "0xabc").await;
        let broadcast_entry = &page.messages[0];
        assert_eq!(broadcast_entry.metadata.published_by, "drops");
        assert_eq!(
            broadcast_entry.metadata.link.as_deref(),
            Some(format!("https://drops.example/messages/{}", post.content_hash()).as_str())
        );

        // Control entries get no service permalink
        let control_entry = &page.messages[1];
        assert_eq!(control_entry.metadata.published_by, "drops");
        assert!(control_entry.metadata.link.is_none());
    }
}
