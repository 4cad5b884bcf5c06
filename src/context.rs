/// Application context and dependency injection
use crate::{
    config::ServerConfig,
    content_store::{ipfs::IpfsStore, ContentStore},
    crypto::{timestamp::TimestampSigner, verifier::EnvelopeVerifier},
    db,
    db::{messages::MessageStore, social::SocialStore, users::UserStore},
    discovery::{http::HttpDirectory, DiscoveryDirectory},
    enrollment::EnrollmentChecker,
    error::DropsResult,
    pipeline::{
        appender::LogAppender, broadcast::BroadcastProcessor, control::ControlProcessor,
        MessagePipeline,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub users: UserStore,
    pub messages: MessageStore,
    pub social: SocialStore,
    pub directory: Arc<dyn DiscoveryDirectory>,
    pub pipeline: Arc<MessagePipeline>,
    /// Present only when this instance also acts as the timestamp
    /// authority
    pub timestamp_signer: Option<Arc<TimestampSigner>>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> DropsResult<Self> {
        config.validate()?;

        let pool = db::create_pool(
            &config.storage.database_path,
            db::DatabaseOptions::default(),
        )
        .await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        let users = UserStore::new(pool.clone());
        let messages = MessageStore::new(pool.clone());
        let social = SocialStore::new(pool.clone());

        let store: Arc<dyn ContentStore> = Arc::new(IpfsStore::new(
            config.content.rpc_url.clone(),
            config.content.gateway_url.clone(),
            config.content.pointer_gateway_url.clone(),
        )?);
        let directory: Arc<dyn DiscoveryDirectory> =
            Arc::new(HttpDirectory::new(config.discovery.directory_url.clone())?);

        let enrollment = EnrollmentChecker::new(
            directory.clone(),
            config.content.pointer_gateway_url.clone(),
        );
        let verifier = EnvelopeVerifier::new(config.timestamp.authority_address.clone());
        let appender = LogAppender::new(
            store.clone(),
            config.limits.max_index_messages,
            config.service.service_id.clone(),
            config.service.messages_base_url.clone(),
        );

        let pipeline = Arc::new(MessagePipeline::new(
            verifier,
            enrollment.clone(),
            users.clone(),
            appender,
            BroadcastProcessor::new(messages.clone(), users.clone()),
            ControlProcessor::new(
                social.clone(),
                messages.clone(),
                users.clone(),
                enrollment,
                store,
                directory.clone(),
                config.service.api_base_url.clone(),
            ),
        ));

        let timestamp_signer = match &config.timestamp.signing_key_hex {
            Some(hex) => {
                let signer = TimestampSigner::from_hex(hex)?;
                tracing::info!(address = %signer.address(), "Timestamp signing enabled");
                Some(Arc::new(signer))
            }
            None => None,
        };

        Ok(Self {
            config: Arc::new(config),
            db: pool,
            users,
            messages,
            social,
            directory,
            pipeline,
            timestamp_signer,
        })
    }
}

#[cfg(test)]
impl AppContext {
    /// Context over in-memory collaborators and a throwaway database
    pub(crate) async fn for_tests(
        store: Arc<dyn ContentStore>,
        directory: Arc<dyn DiscoveryDirectory>,
        authority_address: String,
    ) -> Self {
        use crate::config::*;

        let config = ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 0,
                service_id: "drops".to_string(),
                api_base_url: "http://drops.test/api".to_string(),
                messages_base_url: None,
            },
            storage: StorageConfig {
                database_path: ":memory:".into(),
            },
            content: ContentConfig {
                rpc_url: "memory://rpc".to_string(),
                gateway_url: "memory://blob".to_string(),
                pointer_gateway_url: "memory://name".to_string(),
            },
            discovery: DiscoveryConfig {
                directory_url: "memory://directory".to_string(),
            },
            timestamp: TimestampConfig {
                authority_address,
                signing_key_hex: None,
            },
            limits: LimitConfig {
                max_index_messages: 100,
                default_query_limit: 20,
                max_query_limit: 100,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
            },
        };

        let pool = crate::db::test_pool().await;
        let users = UserStore::new(pool.clone());
        let messages = MessageStore::new(pool.clone());
        let social = SocialStore::new(pool.clone());

        let enrollment = EnrollmentChecker::new(
            directory.clone(),
            config.content.pointer_gateway_url.clone(),
        );
        let pipeline = Arc::new(MessagePipeline::new(
            EnvelopeVerifier::new(config.timestamp.authority_address.clone()),
            enrollment.clone(),
            users.clone(),
            LogAppender::new(
                store.clone(),
                config.limits.max_index_messages,
                config.service.service_id.clone(),
                config.service.messages_base_url.clone(),
            ),
            BroadcastProcessor::new(messages.clone(), users.clone()),
            ControlProcessor::new(
                social.clone(),
                messages.clone(),
                users.clone(),
                enrollment,
                store,
                directory.clone(),
                config.service.api_base_url.clone(),
            ),
        ));

        Self {
            config: Arc::new(config),
            db: pool,
            users,
            messages,
            social,
            directory,
            pipeline,
            timestamp_signer: None,
        }
    }
}
