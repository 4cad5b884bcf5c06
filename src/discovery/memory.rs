/// In-memory discovery directory for tests
use crate::{
    discovery::{DiscoveryDirectory, ProfileMetadata},
    error::DropsResult,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryDirectory {
    pointers: Mutex<HashMap<String, String>>,
    profiles: Mutex<HashMap<String, ProfileMetadata>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: seed a profile record
    pub fn put_profile(&self, address: &str, profile: ProfileMetadata) {
        self.profiles
            .lock()
            .unwrap()
            .insert(address.to_lowercase(), profile);
    }
}

#[async_trait]
impl DiscoveryDirectory for MemoryDirectory {
    async fn get_pointer(&self, address: &str) -> DropsResult<Option<String>> {
        Ok(self
            .pointers
            .lock()
            .unwrap()
            .get(&address.to_lowercase())
            .cloned())
    }

    async fn set_pointer(&self, address: &str, url: &str) -> DropsResult<()> {
        self.pointers
            .lock()
            .unwrap()
            .insert(address.to_lowercase(), url.to_string());
        Ok(())
    }

    async fn get_profile(&self, address: &str) -> DropsResult<Option<ProfileMetadata>> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .get(&address.to_lowercase())
            .cloned())
    }
}
