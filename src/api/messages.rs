/// Message submission and feed endpoints
use crate::{
    context::AppContext,
    db::models::{MessageQuery, StoredMessage, UserRecord},
    envelope::SignedEnvelope,
    error::DropsResult,
};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

/// Build message routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/add-message", post(add_message))
        .route("/api/get-messages", get(get_messages))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddMessageResponse {
    success: bool,
    hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<UserRecord>,
}

async fn add_message(
    State(ctx): State<AppContext>,
    Json(envelope): Json<SignedEnvelope>,
) -> DropsResult<Json<AddMessageResponse>> {
    let sender = envelope.sender().to_lowercase();
    let outcome = ctx.pipeline.handle(envelope).await?;

    // The directory is the source of truth for profile metadata; a
    // failed refresh only delays the mirror, so it never fails the post
    if let Err(e) = refresh_profile(&ctx, &sender).await {
        tracing::warn!(address = %sender, error = %e, "Profile refresh failed");
    }

    let user = ctx.users.get_user(&sender).await?;
    Ok(Json(AddMessageResponse {
        success: true,
        hash: outcome.hash,
        url: outcome.message_url,
        user,
    }))
}

async fn refresh_profile(ctx: &AppContext, address: &str) -> DropsResult<()> {
    if let Some(profile) = ctx.directory.get_profile(address).await? {
        ctx.users.update_profile(address, &profile).await?;
    }
    Ok(())
}

/// Query parameters for get-messages, camelCase on the wire
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetMessagesParams {
    sender: Option<String>,
    category: Option<String>,
    message_hash: Option<String>,
    origin: Option<String>,
    before: Option<i64>,
    before_id: Option<String>,
    only_parent_comments: Option<bool>,
    include_replies: Option<bool>,
    only_following: Option<bool>,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct GetMessagesResponse {
    success: bool,
    messages: Vec<StoredMessage>,
}

async fn get_messages(
    State(ctx): State<AppContext>,
    Query(params): Query<GetMessagesParams>,
) -> DropsResult<Json<GetMessagesResponse>> {
    let limits = &ctx.config.limits;
    let limit = params
        .limit
        .unwrap_or(limits.default_query_limit)
        .clamp(1, limits.max_query_limit);

    let query = MessageQuery {
        sender: params.sender.map(|s| s.to_lowercase()),
        category: params.category,
        message_hash: params.message_hash,
        origin: params.origin,
        before: params.before,
        before_id: params.before_id,
        only_parent_comments: params.only_parent_comments.unwrap_or(true),
        include_replies: params.include_replies.unwrap_or(true),
        only_following: params.only_following.unwrap_or(false),
        limit,
    };

    let messages = ctx.messages.get_messages(&query, &ctx.social).await?;
    Ok(Json(GetMessagesResponse {
        success: true,
        messages,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        content_store::{memory::MemoryStore, ContentStore},
        crypto::{derive_address, sign_payload},
        db::models::NewMessage,
        discovery::{memory::MemoryDirectory, DiscoveryDirectory, ProfileMetadata},
        envelope::{
            canonical_bytes, canonical_hash, ControlMessage, EnvelopeData, Message, Operation,
            SignedTimestamp, TimestampData, GENESIS_HASH,
        },
        error::DropsError,
    };
    use k256::ecdsa::SigningKey;
    use rand::rngs::OsRng;
    use std::sync::Arc;

    async fn ctx_with(directory: Arc<dyn DiscoveryDirectory>) -> (AppContext, SigningKey) {
        let authority = SigningKey::random(&mut OsRng);
        let ctx = AppContext::for_tests(
            Arc::new(MemoryStore::new()) as Arc<dyn ContentStore>,
            directory,
            derive_address(authority.verifying_key()),
        )
        .await;
        (ctx, authority)
    }

    fn onboard_envelope(authority: &SigningKey, key: &SigningKey) -> SignedEnvelope {
        let message = Message::Control(ControlMessage {
            previous_message_hash: GENESIS_HASH.to_string(),
            sender: derive_address(key.verifying_key()),
            origin: None,
            operation: Operation::Onboard,
            data: None,
        });
        let hash = canonical_hash(&message).unwrap();
        let timestamp_data = TimestampData {
            timestamp: "1700000000000".to_string(),
            hash,
        };
        let timestamp_signature =
            sign_payload(authority, &canonical_bytes(&timestamp_data).unwrap()).unwrap();
        let data = EnvelopeData {
            message,
            timestamp: SignedTimestamp {
                data: timestamp_data,
                signature: timestamp_signature,
            },
        };
        let signature = sign_payload(key, &canonical_bytes(&data).unwrap()).unwrap();
        SignedEnvelope { data, signature }
    }

    fn flat_query(limit: Option<i64>) -> GetMessagesParams {
        GetMessagesParams {
            sender: None,
            category: None,
            message_hash: None,
            origin: None,
            before: None,
            before_id: None,
            only_parent_comments: None,
            include_replies: Some(false),
            only_following: None,
            limit,
        }
    }

    #[tokio::test]
    async fn test_add_message_mirrors_profile_from_directory() {
        let directory = Arc::new(MemoryDirectory::new());
        let key = SigningKey::random(&mut OsRng);
        let address = derive_address(key.verifying_key());
        directory.put_profile(
            &address,
            ProfileMetadata {
                name: Some("alice".to_string()),
                ..Default::default()
            },
        );
        let (ctx, authority) = ctx_with(directory).await;

        let response = add_message(
            State(ctx),
            Json(onboard_envelope(&authority, &key)),
        )
        .await
        .unwrap();

        assert!(response.0.success);
        let user = response.0.user.unwrap();
        assert_eq!(user.name.as_deref(), Some("alice"));
    }

    /// Directory wrapper whose profile lookups always fail
    struct BrokenProfiles(MemoryDirectory);

    #[async_trait::async_trait]
    impl DiscoveryDirectory for BrokenProfiles {
        async fn get_pointer(&self, address: &str) -> crate::error::DropsResult<Option<String>> {
            self.0.get_pointer(address).await
        }
        async fn set_pointer(&self, address: &str, url: &str) -> crate::error::DropsResult<()> {
            self.0.set_pointer(address, url).await
        }
        async fn get_profile(
            &self,
            _address: &str,
        ) -> crate::error::DropsResult<Option<ProfileMetadata>> {
            Err(DropsError::Storage("profile service down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_profile_refresh_failure_does_not_fail_the_post() {
        let directory = Arc::new(BrokenProfiles(MemoryDirectory::new()));
        let (ctx, authority) = ctx_with(directory).await;
        let key = SigningKey::random(&mut OsRng);

        let response = add_message(
            State(ctx.clone()),
            Json(onboard_envelope(&authority, &key)),
        )
        .await
        .unwrap();

        assert!(response.0.success);
        // The message still landed despite the failed refresh
        let address = derive_address(key.verifying_key()).to_lowercase();
        assert!(ctx.users.get_user(&address).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_query_limit_is_clamped() {
        let (mut ctx, _) = ctx_with(Arc::new(MemoryDirectory::new())).await;
        let mut config = (*ctx.config).clone();
        config.limits.default_query_limit = 2;
        config.limits.max_query_limit = 5;
        ctx.config = Arc::new(config);

        ctx.users.update_last_hash("0xa", "0x01").await.unwrap();
        for i in 0..8i64 {
            ctx.messages
                .add_message(&NewMessage {
                    hash: format!("0xm{}", i),
                    sender: "0xa".to_string(),
                    content: format!("post {}", i),
                    timestamp: 1000 + i,
                    category: None,
                    tags: Vec::new(),
                    medias: Vec::new(),
                    in_reply_to: None,
                    origin: None,
                    url: format!("memory://blob/0xm{}", i),
                })
                .await
                .unwrap();
        }

        // An oversized limit collapses to the configured maximum
        let response = get_messages(State(ctx.clone()), Query(flat_query(Some(50))))
            .await
            .unwrap();
        assert_eq!(response.0.messages.len(), 5);

        // No limit falls back to the default
        let response = get_messages(State(ctx), Query(flat_query(None)))
            .await
            .unwrap();
        assert_eq!(response.0.messages.len(), 2);
    }
}
