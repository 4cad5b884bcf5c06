/// Content store backed by a kubo-style IPFS RPC daemon
///
/// Blobs go through `/api/v0/add` with pinning enabled; mutable
/// pointers are IPNS names published under one daemon key per owner
/// (`user-key-<address>`), created on first use.
use crate::{
    content_store::{join_url, ContentStore},
    error::{DropsError, DropsResult},
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

pub struct IpfsStore {
    client: reqwest::Client,
    rpc_url: String,
    gateway_url: String,
    pointer_gateway_url: String,
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct KeyInfo {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct KeyListResponse {
    #[serde(rename = "Keys", default)]
    keys: Vec<KeyInfo>,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    #[serde(rename = "Path")]
    path: String,
}

impl IpfsStore {
    pub fn new(rpc_url: String, gateway_url: String, pointer_gateway_url: String) -> DropsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DropsError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rpc_url,
            gateway_url,
            pointer_gateway_url,
        })
    }

    fn rpc(&self, path: &str) -> String {
        join_url(&self.rpc_url, path)
    }

    fn key_name(owner: &str) -> String {
        format!("user-key-{}", owner.to_lowercase())
    }

    async fn find_key(&self, owner: &str) -> DropsResult<Option<String>> {
        let resp: KeyListResponse = self
            .client
            .post(self.rpc("api/v0/key/list"))
            .send()
            .await
            .map_err(|e| DropsError::Storage(format!("key/list failed: {}", e)))?
            .json()
            .await
            .map_err(|e| DropsError::Storage(format!("key/list bad response: {}", e)))?;

        let wanted = Self::key_name(owner);
        Ok(resp.keys.into_iter().find(|k| k.name == wanted).map(|k| k.id))
    }

    async fn get_or_create_key(&self, owner: &str) -> DropsResult<String> {
        if let Some(id) = self.find_key(owner).await? {
            return Ok(id);
        }

        let resp: KeyInfo = self
            .client
            .post(self.rpc("api/v0/key/gen"))
            .query(&[("arg", Self::key_name(owner).as_str())])
            .send()
            .await
            .map_err(|e| DropsError::Storage(format!("key/gen failed: {}", e)))?
            .json()
            .await
            .map_err(|e| DropsError::Storage(format!("key/gen bad response: {}", e)))?;

        Ok(resp.id)
    }
}

#[async_trait]
impl ContentStore for IpfsStore {
    async fn put(&self, bytes: Vec<u8>) -> DropsResult<String> {
        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes));

        let resp: AddResponse = self
            .client
            .post(self.rpc("api/v0/add"))
            .query(&[("pin", "false")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| DropsError::Storage(format!("add failed: {}", e)))?
            .json()
            .await
            .map_err(|e| DropsError::Storage(format!("add bad response: {}", e)))?;

        Ok(resp.hash)
    }

    async fn get(&self, address: &str) -> DropsResult<Vec<u8>> {
        let resp = self
            .client
            .post(self.rpc("api/v0/cat"))
            .query(&[("arg", address)])
            .send()
            .await
            .map_err(|e| DropsError::Storage(format!("cat failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(DropsError::NotFound(format!("Content not found: {}", address)));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| DropsError::Storage(format!("cat read failed: {}", e)))?;
        Ok(bytes.to_vec())
    }

    async fn pin(&self, address: &str) -> DropsResult<()> {
        self.client
            .post(self.rpc("api/v0/pin/add"))
            .query(&[("arg", address)])
            .send()
            .await
            .map_err(|e| DropsError::Storage(format!("pin/add failed: {}", e)))?
            .error_for_status()
            .map_err(|e| DropsError::Storage(format!("pin/add rejected: {}", e)))?;
        Ok(())
    }

    async fn unpin(&self, address: &str) -> DropsResult<()> {
        self.client
            .post(self.rpc("api/v0/pin/rm"))
            .query(&[("arg", address)])
            .send()
            .await
            .map_err(|e| DropsError::Storage(format!("pin/rm failed: {}", e)))?
            .error_for_status()
            .map_err(|e| DropsError::Storage(format!("pin/rm rejected: {}", e)))?;
        Ok(())
    }

    async fn publish_pointer(&self, owner: &str, address: &str) -> DropsResult<String> {
        let key_name = {
            // Publishing requires the key to exist; resolve creates nothing
            self.get_or_create_key(owner).await?;
            Self::key_name(owner)
        };

        let resp: PublishResponse = self
            .client
            .post(self.rpc("api/v0/name/publish"))
            .query(&[
                ("arg", format!("/ipfs/{}", address).as_str()),
                ("key", key_name.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DropsError::Storage(format!("name/publish failed: {}", e)))?
            .json()
            .await
            .map_err(|e| DropsError::Storage(format!("name/publish bad response: {}", e)))?;

        Ok(join_url(&self.pointer_gateway_url, &resp.name))
    }

    async fn resolve_pointer(&self, owner: &str) -> DropsResult<Option<String>> {
        let key_id = match self.find_key(owner).await? {
            Some(id) => id,
            None => return Ok(None),
        };

        let resp = self
            .client
            .post(self.rpc("api/v0/name/resolve"))
            .query(&[("arg", format!("/ipns/{}", key_id).as_str())])
            .send()
            .await
            .map_err(|e| DropsError::Storage(format!("name/resolve failed: {}", e)))?;

        if !resp.status().is_success() {
            // Key exists but nothing was ever published under it
            return Ok(None);
        }

        let resolved: ResolveResponse = resp
            .json()
            .await
            .map_err(|e| DropsError::Storage(format!("name/resolve bad response: {}", e)))?;

        Ok(Some(
            resolved
                .path
                .strip_prefix("/ipfs/")
                .unwrap_or(&resolved.path)
                .to_string(),
        ))
    }

    fn content_url(&self, address: &str) -> String {
        join_url(&self.gateway_url, address)
    }
}
