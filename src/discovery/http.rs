/// Discovery directory over HTTP
///
/// Speaks to the external directory service:
/// `GET/PUT {base}/pointer/{address}` and `GET {base}/profile/{address}`.
use crate::{
    discovery::{DiscoveryDirectory, ProfileMetadata},
    error::{DropsError, DropsResult},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct HttpDirectory {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PointerRecord {
    url: String,
}

impl HttpDirectory {
    pub fn new(base_url: String) -> DropsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DropsError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, kind: &str, address: &str) -> String {
        format!(
            "{}{}{}/{}",
            self.base_url,
            if self.base_url.ends_with('/') { "" } else { "/" },
            kind,
            address.to_lowercase()
        )
    }
}

#[async_trait]
impl DiscoveryDirectory for HttpDirectory {
    async fn get_pointer(&self, address: &str) -> DropsResult<Option<String>> {
        let resp = self
            .client
            .get(self.endpoint("pointer", address))
            .send()
            .await
            .map_err(|e| DropsError::Storage(format!("Discovery lookup failed: {}", e)))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let record: PointerRecord = resp
            .error_for_status()
            .map_err(|e| DropsError::Storage(format!("Discovery lookup rejected: {}", e)))?
            .json()
            .await
            .map_err(|e| DropsError::Storage(format!("Discovery bad response: {}", e)))?;

        Ok(Some(record.url))
    }

    async fn set_pointer(&self, address: &str, url: &str) -> DropsResult<()> {
        self.client
            .put(self.endpoint("pointer", address))
            .json(&PointerRecord {
                url: url.to_string(),
            })
            .send()
            .await
            .map_err(|e| DropsError::Storage(format!("Discovery publish failed: {}", e)))?
            .error_for_status()
            .map_err(|e| DropsError::Storage(format!("Discovery publish rejected: {}", e)))?;
        Ok(())
    }

    async fn get_profile(&self, address: &str) -> DropsResult<Option<ProfileMetadata>> {
        let resp = self
            .client
            .get(self.endpoint("profile", address))
            .send()
            .await
            .map_err(|e| DropsError::Storage(format!("Profile lookup failed: {}", e)))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let profile: ProfileMetadata = resp
            .error_for_status()
            .map_err(|e| DropsError::Storage(format!("Profile lookup rejected: {}", e)))?
            .json()
            .await
            .map_err(|e| DropsError::Storage(format!("Profile bad response: {}", e)))?;

        Ok(Some(profile))
    }
}
