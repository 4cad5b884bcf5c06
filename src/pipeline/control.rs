/// Control message processor
///
/// Pre-processing applies the relational effect of each operation
/// before the envelope hits durable storage, so an invalid operation
/// never pollutes the append log. Post-processing matters only for
/// Onboard, which registers the sender's discovery document once the
/// first index page exists.
use crate::{
    content_store::ContentStore,
    db::{messages::MessageStore, social::SocialStore, users::UserStore},
    discovery::DiscoveryDirectory,
    enrollment::EnrollmentChecker,
    envelope::{ControlMessage, Message, Operation, SignedEnvelope},
    error::{DropsError, DropsResult},
    pipeline::{appender::AppendOutcome, MessageProcessor},
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageTarget {
    message_hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserTarget {
    user_address: String,
}

/// What an onboarded user's discovery document points at
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDiscoveryDoc<'a> {
    index: &'a str,
    add_message_api: String,
}

pub struct ControlProcessor {
    social: SocialStore,
    messages: MessageStore,
    users: UserStore,
    enrollment: EnrollmentChecker,
    store: Arc<dyn ContentStore>,
    directory: Arc<dyn DiscoveryDirectory>,
    api_base_url: String,
}

impl ControlProcessor {
    pub fn new(
        social: SocialStore,
        messages: MessageStore,
        users: UserStore,
        enrollment: EnrollmentChecker,
        store: Arc<dyn ContentStore>,
        directory: Arc<dyn DiscoveryDirectory>,
        api_base_url: String,
    ) -> Self {
        Self {
            social,
            messages,
            users,
            enrollment,
            store,
            directory,
            api_base_url,
        }
    }

    async fn register_onboarded(
        &self,
        sender: &str,
        onboard_hash: &str,
        outcome: &AppendOutcome,
    ) -> DropsResult<()> {
        let doc = ServiceDiscoveryDoc {
            index: &outcome.index_link,
            add_message_api: format!(
                "{}/add-message",
                self.api_base_url.trim_end_matches('/')
            ),
        };
        let bytes = serde_json::to_vec(&doc)
            .map_err(|e| DropsError::Internal(format!("Cannot serialize discovery doc: {}", e)))?;
        let address = self.store.put(bytes).await?;
        self.store.pin(&address).await?;
        let storage_info_url = self.store.content_url(&address);

        self.directory.set_pointer(sender, &outcome.index_link).await?;

        // Upsert creates the user row, then the links land on it
        self.users.update_last_hash(sender, onboard_hash).await?;
        self.users
            .set_storage_links(sender, &storage_info_url, &outcome.index_link)
            .await?;

        tracing::info!(address = %sender, "User onboarded");
        Ok(())
    }
}

fn control(envelope: &SignedEnvelope) -> DropsResult<&ControlMessage> {
    match envelope.message() {
        Message::Control(m) => Ok(m),
        Message::Broadcast(_) => Err(DropsError::Internal(
            "Control processor received a broadcast message".to_string(),
        )),
    }
}

fn parse_data<T: DeserializeOwned>(message: &ControlMessage) -> DropsResult<T> {
    let raw = message.data.as_deref().ok_or_else(|| {
        DropsError::Validation("Missing operation data".to_string())
    })?;
    serde_json::from_str(raw)
        .map_err(|e| DropsError::Validation(format!("Invalid operation data: {}", e)))
}

#[async_trait]
impl MessageProcessor for ControlProcessor {
    async fn pre_process(&self, envelope: &SignedEnvelope) -> DropsResult<bool> {
        let message = control(envelope)?;
        let sender = message.sender.to_lowercase();

        match message.operation {
            Operation::Onboard => {
                // Re-onboarding a live user is a retry, not an error
                if self.enrollment.is_enrolled(&sender).await? {
                    tracing::info!(address = %sender, "Already onboarded, skipping");
                    return Ok(false);
                }
                Ok(true)
            }
            Operation::Offboard => Err(DropsError::Validation(
                "Unsupported operation: offboard".to_string(),
            )),
            Operation::HideMessage => {
                let target: MessageTarget = parse_data(message)?;
                self.messages
                    .hide_message(&sender, &target.message_hash)
                    .await?;
                Ok(true)
            }
            Operation::Like | Operation::Dislike => {
                let target: MessageTarget = parse_data(message)?;
                self.social
                    .vote(
                        &sender,
                        &target.message_hash,
                        message.operation == Operation::Like,
                    )
                    .await?;
                Ok(true)
            }
            Operation::Follow | Operation::Unfollow => {
                let target: UserTarget = parse_data(message)?;
                self.social
                    .follow(
                        &sender,
                        &target.user_address.to_lowercase(),
                        message.operation == Operation::Follow,
                    )
                    .await?;
                Ok(true)
            }
        }
    }

    async fn post_process(
        &self,
        envelope: &SignedEnvelope,
        outcome: &AppendOutcome,
    ) -> DropsResult<()> {
        let message = control(envelope)?;
        let sender = message.sender.to_lowercase();

        // Only onboard has post-storage work; it also advances the
        // append marker, which other control ops leave alone
        if message.operation == Operation::Onboard {
            self.register_onboarded(&sender, envelope.content_hash(), outcome)
                .await?;
        }
        Ok(())
    }
}
