/// Broadcast message processor
///
/// Broadcasts always pass pre-processing; content is opaque at this
/// layer. After the envelope is durably appended, the relational row
/// is inserted and the sender's append marker advances.
use crate::{
    db::{messages::MessageStore, models::NewMessage, users::UserStore},
    envelope::{Message, SignedEnvelope},
    error::{DropsError, DropsResult},
    pipeline::{appender::AppendOutcome, published_at_ms, MessageProcessor},
};
use async_trait::async_trait;

pub struct BroadcastProcessor {
    messages: MessageStore,
    users: UserStore,
}

impl BroadcastProcessor {
    pub fn new(messages: MessageStore, users: UserStore) -> Self {
        Self { messages, users }
    }
}

#[async_trait]
impl MessageProcessor for BroadcastProcessor {
    async fn pre_process(&self, _envelope: &SignedEnvelope) -> DropsResult<bool> {
        Ok(true)
    }

    async fn post_process(
        &self,
        envelope: &SignedEnvelope,
        outcome: &AppendOutcome,
    ) -> DropsResult<()> {
        let broadcast = match envelope.message() {
            Message::Broadcast(m) => m,
            Message::Control(_) => {
                return Err(DropsError::Internal(
                    "Broadcast processor received a control message".to_string(),
                ))
            }
        };
        let sender = broadcast.sender.to_lowercase();

        self.messages
            .add_message(&NewMessage {
                hash: envelope.content_hash().to_string(),
                sender: sender.clone(),
                content: broadcast.content.clone(),
                timestamp: published_at_ms(envelope)?,
                category: broadcast.category.clone(),
                tags: broadcast.tags.clone().unwrap_or_default(),
                medias: broadcast.medias.clone().unwrap_or_default(),
                in_reply_to: broadcast.in_reply_to.as_ref().map(|r| r.hash.clone()),
                origin: broadcast.origin.clone(),
                url: outcome.message_url.clone(),
            })
            .await?;

        self.users
            .update_last_hash(&sender, envelope.content_hash())
            .await
    }
}
