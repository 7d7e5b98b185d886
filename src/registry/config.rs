//! Registry configuration

/// Configuration for the connection registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Frames each connection may have queued before it is evicted as slow
    pub mailbox_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
        }
    }
}

impl RegistryConfig {
    /// Set the per-connection mailbox capacity (minimum 1)
    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }
}
