/// In-memory content store for tests
use crate::{
    content_store::ContentStore,
    envelope::hash_bytes,
    error::{DropsError, DropsResult},
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Content-addressed store living entirely in process memory. Content
/// addresses are the SHA-256 of the blob, so puts are idempotent like
/// the real backend.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    pins: Mutex<HashSet<String>>,
    pointers: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: is this address currently pinned?
    pub fn is_pinned(&self, address: &str) -> bool {
        self.pins.lock().unwrap().contains(address)
    }

    /// Test hook: current pointer target for an owner
    pub fn pointer_target(&self, owner: &str) -> Option<String> {
        self.pointers.lock().unwrap().get(&owner.to_lowercase()).cloned()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn put(&self, bytes: Vec<u8>) -> DropsResult<String> {
        let address = format!("mem{}", &hash_bytes(&bytes)[2..]);
        self.blobs.lock().unwrap().insert(address.clone(), bytes);
        Ok(address)
    }

    async fn get(&self, address: &str) -> DropsResult<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| DropsError::NotFound(format!("Content not found: {}", address)))
    }

    async fn pin(&self, address: &str) -> DropsResult<()> {
        if !self.blobs.lock().unwrap().contains_key(address) {
            return Err(DropsError::NotFound(format!("Content not found: {}", address)));
        }
        self.pins.lock().unwrap().insert(address.to_string());
        Ok(())
    }

    async fn unpin(&self, address: &str) -> DropsResult<()> {
        if !self.pins.lock().unwrap().remove(address) {
            return Err(DropsError::Storage(format!("Not pinned: {}", address)));
        }
        Ok(())
    }

    async fn publish_pointer(&self, owner: &str, address: &str) -> DropsResult<String> {
        let owner = owner.to_lowercase();
        self.pointers
            .lock()
            .unwrap()
            .insert(owner.clone(), address.to_string());
        Ok(format!("memory://name/{}", owner))
    }

    async fn resolve_pointer(&self, owner: &str) -> DropsResult<Option<String>> {
        Ok(self.pointers.lock().unwrap().get(&owner.to_lowercase()).cloned())
    }

    fn content_url(&self, address: &str) -> String {
        format!("memory://blob/{}", address)
    }
}
