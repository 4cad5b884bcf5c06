/// Per-sender append serialization
///
/// One async mutex per sender address. Appends for different senders
/// proceed in parallel; appends for the same sender queue on its lock
/// so the pointer-swap read-modify-write of the append log is never
/// interleaved.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct AppendLocks {
    inner: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl AppendLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for a sender. Addresses are case-insensitive, so the
    /// key is normalized before lookup.
    pub fn for_sender(&self, address: &str) -> Arc<tokio::sync::Mutex<()>> {
        let key = address.to_lowercase();
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        // Entries only the map still references are idle; dropping them
        // here keeps the map bounded by the number of in-flight appends
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry(key).or_default().clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
