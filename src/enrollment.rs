/// Enrollment checker
///
/// A sender counts as enrolled only if their discovery record carries
/// an index-pointer URL inside this service's pointer namespace; an
/// absent record or a foreign URL is NotEnrolled. Every operation
/// except `Control { Onboard }` is gated on this.
use crate::{discovery::DiscoveryDirectory, error::DropsResult};
use std::sync::Arc;

#[derive(Clone)]
pub struct EnrollmentChecker {
    directory: Arc<dyn DiscoveryDirectory>,
    pointer_namespace: String,
}

impl EnrollmentChecker {
    pub fn new(directory: Arc<dyn DiscoveryDirectory>, pointer_namespace: String) -> Self {
        Self {
            directory,
            pointer_namespace,
        }
    }

    pub async fn is_enrolled(&self, address: &str) -> DropsResult<bool> {
        match self.directory.get_pointer(address).await? {
            Some(url) => Ok(url.starts_with(&self.pointer_namespace)),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::memory::MemoryDirectory;

    fn checker(dir: Arc<MemoryDirectory>) -> EnrollmentChecker {
        EnrollmentChecker::new(dir, "memory://name".to_string())
    }

    #[tokio::test]
    async fn test_absent_record_is_not_enrolled() {
        let dir = Arc::new(MemoryDirectory::new());
        assert!(!checker(dir).is_enrolled("0xabc").await.unwrap());
    }

    #[tokio::test]
    async fn test_foreign_pointer_is_not_enrolled() {
        let dir = Arc::new(MemoryDirectory::new());
        dir.set_pointer("0xabc", "https://elsewhere.example/ipns/k1")
            .await
            .unwrap();
        assert!(!checker(dir).is_enrolled("0xabc").await.unwrap());
    }

    #[tokio::test]
    async fn test_own_namespace_pointer_is_enrolled() {
        let dir = Arc::new(MemoryDirectory::new());
        dir.set_pointer("0xabc", "memory://name/0xabc").await.unwrap();
        assert!(checker(dir).is_enrolled("0xABC").await.unwrap());
    }
}
