use std::time::Duration;

/// Submission ordering promised by a command queue.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum QueueOrdering {
    /// Operations execute in submission order; same-queue wait-lists are implicit.
    #[default]
    InOrder,
    /// No implied ordering; the host blocks on every wait-list entry before
    /// submitting the dependent operation.
    OutOfOrder,
}

/// Parameters for opening a [`Session`](super::Session).
///
/// Keep this structure small. Add flags only when a concrete backend
/// requirement exists.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Debug label attached to the logical device.
    pub label: String,

    pub ordering: QueueOrdering,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter. `None` requests everything the
    /// adapter supports, so allocation and dispatch checks see the real device.
    pub required_limits: Option<wgpu::Limits>,

    /// Upper bound for the queue probe submitted right after creation.
    pub queue_probe_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            label: "kernelrun session".to_string(),
            ordering: QueueOrdering::InOrder,
            required_features: wgpu::Features::empty(),
            required_limits: None,
            queue_probe_timeout: Duration::from_secs(5),
        }
    }
}
