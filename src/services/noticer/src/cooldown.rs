//! Per-endpoint rate-limit window
//!
//! Every check counts as one attempt against the endpoint's window. The first
//! attempt of a window starts the expiry clock; once more than `window_limit`
//! attempts land inside the window the endpoint is cooling down until the
//! counter expires.

use crate::config::CooldownConfig;
use crate::error::Result;
use crate::metrics::DispatchMetrics;
use crate::store::{CounterStore, TtlState};
use noticer_shared::{ChannelKind, Endpoint};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a single cooldown check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    /// Within the window limit
    Open { count: i64 },
    /// Window limit exceeded; the counter expires after `retry_after`
    CoolingDown {
        count: i64,
        retry_after: Option<Duration>,
    },
    /// Limit exceeded on a counter that had no expiry; the counter was deleted
    Repaired { count: i64 },
}

impl CooldownDecision {
    pub fn is_cooling_down(&self) -> bool {
        matches!(self, CooldownDecision::CoolingDown { .. })
    }

    pub fn count(&self) -> i64 {
        match self {
            CooldownDecision::Open { count }
            | CooldownDecision::CoolingDown { count, .. }
            | CooldownDecision::Repaired { count } => *count,
        }
    }
}

/// Rate-limit gate shared by every dispatch of one channel
#[derive(Clone)]
pub struct CooldownGate {
    store: Arc<dyn CounterStore>,
    config: CooldownConfig,
    channel: ChannelKind,
    metrics: Option<Arc<DispatchMetrics>>,
}

impl CooldownGate {
    pub fn new(store: Arc<dyn CounterStore>, config: CooldownConfig, channel: ChannelKind) -> Self {
        Self {
            store,
            config,
            channel,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<DispatchMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &CooldownConfig {
        &self.config
    }

    /// Counter key of an endpoint
    pub fn key(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.config.key_prefix, endpoint.identifier())
    }

    /// Record one attempt against the endpoint and report its window state
    pub async fn check(&self, endpoint: &Endpoint) -> Result<CooldownDecision> {
        let key = self.key(endpoint);
        let count = self
            .store
            .incr_with_window(&key, self.config.window())
            .await?;

        if count <= self.config.window_limit as i64 {
            return Ok(CooldownDecision::Open { count });
        }

        match self.store.ttl(&key).await? {
            TtlState::NoExpiry => {
                // A counter without expiry would block the endpoint forever.
                self.store.delete(&key).await?;
                warn!(
                    channel = %self.channel,
                    key = %key,
                    count,
                    "Cooldown counter had no expiry and was deleted"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_counter_repair(self.channel);
                }
                Ok(CooldownDecision::Repaired { count })
            }
            ttl => {
                let retry_after = match ttl {
                    TtlState::Expires(remaining) => Some(remaining),
                    _ => None,
                };
                debug!(
                    channel = %self.channel,
                    endpoint = %endpoint,
                    count,
                    limit = self.config.window_limit,
                    ?retry_after,
                    "Endpoint is cooling down"
                );
                Ok(CooldownDecision::CoolingDown { count, retry_after })
            }
        }
    }

    /// Whether the endpoint must be skipped for now
    pub async fn is_cooling_down(&self, endpoint: &Endpoint) -> Result<bool> {
        Ok(self.check(endpoint).await?.is_cooling_down())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn gate(store: Arc<MemoryStore>, limit: u64) -> CooldownGate {
        let config = CooldownConfig {
            key_prefix: "test.sleep.".to_string(),
            window_limit: limit,
            window_seconds: 61,
        };
        CooldownGate::new(store, config, ChannelKind::DingGroup)
    }

    #[test]
    fn test_key_uses_prefix_and_identifier() {
        let gate = gate(Arc::new(MemoryStore::new()), 19);
        assert_eq!(gate.key(&Endpoint::new("abc")), "test.sleep.abc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_then_cooling() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(store.clone(), 2);
        let endpoint = Endpoint::new("abc");

        assert_eq!(
            gate.check(&endpoint).await.unwrap(),
            CooldownDecision::Open { count: 1 }
        );
        assert_eq!(
            gate.check(&endpoint).await.unwrap(),
            CooldownDecision::Open { count: 2 }
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(
            gate.check(&endpoint).await.unwrap(),
            CooldownDecision::CoolingDown {
                count: 3,
                retry_after: Some(Duration::from_secs(60)),
            }
        );
    }

    #[tokio::test]
    async fn test_counter_without_expiry_is_repaired() {
        let store = Arc::new(MemoryStore::new());
        store.insert("test.sleep.stuck", 19, None);
        let gate = gate(store.clone(), 19);

        let decision = gate.check(&Endpoint::new("stuck")).await.unwrap();
        assert_eq!(decision, CooldownDecision::Repaired { count: 20 });
        assert!(!decision.is_cooling_down());
        assert_eq!(store.count("test.sleep.stuck"), None);
    }
}
