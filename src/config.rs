/// Configuration management for the Drops server
use crate::error::{DropsError, DropsResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub content: ContentConfig,
    pub discovery: DiscoveryConfig,
    pub timestamp: TimestampConfig,
    pub limits: LimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Identifier stamped into index entries as `publishedBy`
    pub service_id: String,
    /// Public base URL of this API, advertised in discovery documents
    pub api_base_url: String,
    /// Public base URL for message permalinks
    pub messages_base_url: Option<String>,
}

/// Relational storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

/// Content-addressed store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// RPC endpoint of the content store daemon
    pub rpc_url: String,
    /// Gateway base URL used to build content permalinks
    pub gateway_url: String,
    /// Gateway base URL for published mutable pointers; doubles as the
    /// enrollment namespace prefix
    pub pointer_gateway_url: String,
}

/// Discovery directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub directory_url: String,
}

/// Timestamp authority configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampConfig {
    /// Address every inbound timestamp signature must recover to
    pub authority_address: String,
    /// Private key (hex) used by the local sign-timestamp endpoint
    pub signing_key_hex: Option<String>,
}

/// Query and index limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitConfig {
    /// Entries per index page before rollover
    pub max_index_messages: usize,
    pub default_query_limit: i64,
    pub max_query_limit: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> DropsResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("DROPS_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("DROPS_PORT")
            .unwrap_or_else(|_| "8310".to_string())
            .parse()
            .map_err(|_| DropsError::Validation("Invalid port number".to_string()))?;

        let service_id = env::var("DROPS_SERVICE_ID").unwrap_or_else(|_| "drops".to_string());
        let api_base_url = env::var("DROPS_API_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}/api", hostname, port));
        let messages_base_url = env::var("DROPS_MESSAGES_BASE_URL").ok();

        let database_path: PathBuf = env::var("DROPS_DATABASE_PATH")
            .unwrap_or_else(|_| "./data/drops.sqlite".to_string())
            .into();

        let rpc_url = env::var("DROPS_CONTENT_RPC_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5001".to_string());
        let gateway_url = env::var("DROPS_CONTENT_GATEWAY_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080/ipfs".to_string());
        let pointer_gateway_url = env::var("DROPS_POINTER_GATEWAY_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8080/ipns".to_string());

        let directory_url = env::var("DROPS_DISCOVERY_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8320".to_string());

        let authority_address = env::var("DROPS_TIMESTAMP_ADDRESS")
            .map_err(|_| DropsError::Validation("Timestamp authority address required".to_string()))?;
        let signing_key_hex = env::var("DROPS_TIMESTAMP_KEY").ok();

        let max_index_messages = env::var("DROPS_MAX_INDEX_MESSAGES")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);
        let default_query_limit = env::var("DROPS_DEFAULT_QUERY_LIMIT")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .unwrap_or(20);
        let max_query_limit = env::var("DROPS_MAX_QUERY_LIMIT")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                service_id,
                api_base_url,
                messages_base_url,
            },
            storage: StorageConfig { database_path },
            content: ContentConfig {
                rpc_url,
                gateway_url,
                pointer_gateway_url,
            },
            discovery: DiscoveryConfig { directory_url },
            timestamp: TimestampConfig {
                authority_address,
                signing_key_hex,
            },
            limits: LimitConfig {
                max_index_messages,
                default_query_limit,
                max_query_limit,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> DropsResult<()> {
        if self.service.hostname.is_empty() {
            return Err(DropsError::Validation("Hostname cannot be empty".to_string()));
        }

        let addr = &self.timestamp.authority_address;
        if !addr.starts_with("0x") || addr.len() != 42 {
            return Err(DropsError::Validation(
                "Timestamp authority address must be a 0x-prefixed 20-byte hex string".to_string(),
            ));
        }

        if self.limits.max_index_messages == 0 {
            return Err(DropsError::Validation(
                "Index page capacity must be at least 1".to_string(),
            ));
        }

        if self.limits.max_query_limit < self.limits.default_query_limit {
            return Err(DropsError::Validation(
                "Max query limit cannot be below the default limit".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8310,
                service_id: "drops".to_string(),
                api_base_url: "http://localhost:8310/api".to_string(),
                messages_base_url: None,
            },
            storage: StorageConfig {
                database_path: "./data/drops.sqlite".into(),
            },
            content: ContentConfig {
                rpc_url: "http://127.0.0.1:5001".to_string(),
                gateway_url: "http://127.0.0.1:8080/ipfs".to_string(),
                pointer_gateway_url: "http://127.0.0.1:8080/ipns".to_string(),
            },
            discovery: DiscoveryConfig {
                directory_url: "http://127.0.0.1:8320".to_string(),
            },
            timestamp: TimestampConfig {
                authority_address: format!("0x{}", "ab".repeat(20)),
                signing_key_hex: None,
            },
            limits: LimitConfig {
                max_index_messages: 100,
                default_query_limit: 20,
                max_query_limit: 100,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_bad_authority_address_rejected() {
        let mut config = base_config();
        config.timestamp.authority_address = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_page_capacity_rejected() {
        let mut config = base_config();
        config.limits.max_index_messages = 0;
        assert!(config.validate().is_err());
    }
}
