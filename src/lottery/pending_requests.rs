use crate::lottery::types::RequestHandle;
use dashmap::DashMap;
use std::sync::Arc;

/// Thread-safe registry of randomness requests awaiting fulfillment
#[derive(Clone)]
pub struct PendingRequests {
    /// Map of request handle -> round id
    pending: Arc<DashMap<RequestHandle, u64>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
        }
    }

    pub fn add_pending(&self, handle: RequestHandle, round_id: u64) {
        self.pending.insert(handle, round_id);
    }

    /// Take the request out of the registry, returning its round id
    ///
    /// Only the first call for a handle succeeds.
    pub fn complete(&self, handle: &RequestHandle) -> Option<u64> {
        self.pending.remove(handle).map(|(_, round_id)| round_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop a request so it is never fulfilled
    pub fn remove_pending(&self, handle: &RequestHandle) -> bool {
        self.pending.remove(handle).is_some()
    }
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}
