use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout classes for the mission protocol.
///
/// `retry_timeout` covers the short request/response gaps during a download,
/// where we can re-request a lost item ourselves. `process_timeout` covers
/// the upload, where the autopilot may take seconds before it starts pulling
/// items and all we can do is wait.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_timeout: Duration,
    pub process_timeout: Duration,
    pub max_retries: u8,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_timeout: Duration::from_secs(1),
            process_timeout: Duration::from_secs(10),
            max_retries: 5,
        }
    }
}

pub struct EngineConfig {
    pub gcs_system_id: u8,
    pub gcs_component_id: u8,
    pub retry_policy: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gcs_system_id: 255,
            gcs_component_id: 190,
            retry_policy: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeouts_use_both_classes() {
        let policy = RetryPolicy::default();
        assert!(policy.retry_timeout < policy.process_timeout);
        assert!(policy.max_retries > 0);
    }
}
