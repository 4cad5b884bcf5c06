/// Discovery directory collaborator
///
/// The wallet-identity side of the system: a per-address record that
/// publishes the user's index-pointer URL and profile metadata. The
/// pipeline only reads and writes the narrow interface below.
pub mod http;
pub mod memory;

use crate::error::DropsResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Profile metadata mirrored into the relational index after each
/// accepted message
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub links: Vec<String>,
    pub avatar: Option<String>,
    pub profile_image: Option<String>,
    pub background_image: Option<String>,
}

#[async_trait]
pub trait DiscoveryDirectory: Send + Sync {
    /// Published index-pointer URL for an address, if any
    async fn get_pointer(&self, address: &str) -> DropsResult<Option<String>>;

    /// Publish the index-pointer URL for an address
    async fn set_pointer(&self, address: &str, url: &str) -> DropsResult<()>;

    /// Published profile metadata for an address, if any
    async fn get_profile(&self, address: &str) -> DropsResult<Option<ProfileMetadata>>;
}
