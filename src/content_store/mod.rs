/// Content-addressed store collaborator
///
/// Narrow interface over the durable blob store: immutable
/// put/get/pin/unpin plus one mutable pointer per owner. The
/// production backend speaks a kubo-style HTTP RPC; tests use the
/// in-memory implementation.
pub mod ipfs;
pub mod memory;

use crate::error::DropsResult;
use async_trait::async_trait;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store an immutable blob, returning its content address
    async fn put(&self, bytes: Vec<u8>) -> DropsResult<String>;

    /// Fetch a blob by content address; `NotFound` if absent
    async fn get(&self, address: &str) -> DropsResult<Vec<u8>>;

    /// Protect a blob from garbage collection
    async fn pin(&self, address: &str) -> DropsResult<()>;

    /// Release a pin. Best-effort at call sites: a dangling pin is a
    /// storage-efficiency problem, not a correctness problem.
    async fn unpin(&self, address: &str) -> DropsResult<()>;

    /// Point the owner's mutable pointer at a content address,
    /// returning the public pointer URL
    async fn publish_pointer(&self, owner: &str, address: &str) -> DropsResult<String>;

    /// Resolve the owner's mutable pointer to its current target
    async fn resolve_pointer(&self, owner: &str) -> DropsResult<Option<String>>;

    /// Public permalink for a content address
    fn content_url(&self, address: &str) -> String;
}

/// Join a base URL and a path segment without doubling slashes
pub(crate) fn join_url(base: &str, segment: &str) -> String {
    format!(
        "{}{}{}",
        base,
        if base.ends_with('/') { "" } else { "/" },
        segment
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://g/ipfs", "abc"), "http://g/ipfs/abc");
        assert_eq!(join_url("http://g/ipfs/", "abc"), "http://g/ipfs/abc");
    }
}
