use std::time::Duration;

use serde::Deserialize;

use probe_api::{NamespaceName, SubscriptionSpec, SubscriptionType, TopicDomain};

use crate::ProbeError;

// ═══════════════════════════════════════════════════════════════
//  Scenario Config
// ═══════════════════════════════════════════════════════════════

/// Параметры сценария. Секция `[scenario]` конфига gc-probe.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default = "default_tenant")]
    pub tenant: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub domain: TopicDomain,
    /// Сообщений в каждом batch'е.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Сколько ждать, пока broker соберёт topic.
    #[serde(default = "default_gc_timeout_secs")]
    pub gc_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_receive_timeout_secs")]
    pub receive_timeout_secs: u64,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
    /// Имя durable подписки.
    #[serde(default = "default_subscription")]
    pub subscription: String,
    #[serde(default = "default_variants")]
    pub variants: Vec<VariantConfig>,
}

/// Один прогон сценария: тип подписки + пауза после GC.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariantConfig {
    pub subscription_type: SubscriptionType,
    /// 0 = без паузы.
    #[serde(default)]
    pub settle_ms: u64,
}

impl VariantConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

fn default_tenant() -> String {
    "localdev".into()
}
fn default_namespace() -> String {
    "test".into()
}
fn default_batch_size() -> usize {
    5
}
fn default_gc_timeout_secs() -> u64 {
    300
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_receive_timeout_secs() -> u64 {
    10
}
fn default_send_timeout_secs() -> u64 {
    30
}
fn default_subscription() -> String {
    "test-sub".into()
}
fn default_variants() -> Vec<VariantConfig> {
    vec![
        VariantConfig {
            subscription_type: SubscriptionType::Shared,
            settle_ms: 5000,
        },
        VariantConfig {
            subscription_type: SubscriptionType::Exclusive,
            settle_ms: 0,
        },
    ]
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            tenant: default_tenant(),
            namespace: default_namespace(),
            domain: TopicDomain::default(),
            batch_size: default_batch_size(),
            gc_timeout_secs: default_gc_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            receive_timeout_secs: default_receive_timeout_secs(),
            send_timeout_secs: default_send_timeout_secs(),
            subscription: default_subscription(),
            variants: default_variants(),
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<(), ProbeError> {
        let fail = |msg: &str| Err(ProbeError::Config(msg.to_string()));
        if self.batch_size == 0 {
            return fail("batch_size must be at least 1");
        }
        if self.poll_interval_ms == 0 {
            return fail("poll_interval_ms must be positive");
        }
        if self.gc_timeout_secs == 0 {
            return fail("gc_timeout_secs must be positive");
        }
        if self.receive_timeout_secs == 0 || self.send_timeout_secs == 0 {
            return fail("receive/send timeouts must be positive");
        }
        if tokio::time::Instant::now().checked_add(self.gc_timeout()).is_none() {
            return fail("gc_timeout_secs is out of range");
        }
        if self.subscription.trim().is_empty() {
            return fail("subscription name is empty");
        }
        if self.variants.is_empty() {
            return fail("no scenario variants configured");
        }
        self.namespace_name()?;
        Ok(())
    }

    pub fn namespace_name(&self) -> Result<NamespaceName, ProbeError> {
        NamespaceName::new(&self.tenant, &self.namespace).map_err(|e| ProbeError::Config(e.to_string()))
    }

    pub fn gc_timeout(&self) -> Duration {
        Duration::from_secs(self.gc_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }

    /// Durable подписка с `Earliest` для варианта.
    pub fn subscription_spec(&self, variant: &VariantConfig) -> SubscriptionSpec {
        SubscriptionSpec::durable_earliest(self.subscription.clone(), variant.subscription_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_scenario() {
        let cfg = ScenarioConfig::default();
        assert_eq!(cfg.namespace_name().unwrap().to_string(), "localdev/test");
        assert_eq!(cfg.batch_size, 5);
        assert_eq!(cfg.gc_timeout(), Duration::from_secs(300));
        assert_eq!(cfg.receive_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.subscription, "test-sub");
        assert_eq!(cfg.variants.len(), 2);
        assert_eq!(cfg.variants[0].settle(), Duration::from_secs(5));
        assert_eq!(cfg.variants[1].settle(), Duration::ZERO);
        cfg.validate().unwrap();
    }

    #[test]
    fn validation_rejects_degenerate_values() {
        let broken = [
            ScenarioConfig { batch_size: 0, ..Default::default() },
            ScenarioConfig { poll_interval_ms: 0, ..Default::default() },
            ScenarioConfig { gc_timeout_secs: 0, ..Default::default() },
            ScenarioConfig { receive_timeout_secs: 0, ..Default::default() },
            ScenarioConfig { subscription: " ".into(), ..Default::default() },
            ScenarioConfig { variants: vec![], ..Default::default() },
            ScenarioConfig { tenant: "".into(), ..Default::default() },
        ];
        for cfg in broken {
            assert!(matches!(cfg.validate(), Err(ProbeError::Config(_))), "accepted {cfg:?}");
        }
    }

    #[test]
    fn validation_rejects_out_of_range_gc_timeout() {
        let cfg = ScenarioConfig {
            gc_timeout_secs: u64::MAX,
            ..Default::default()
        };
        match cfg.validate() {
            Err(ProbeError::Config(msg)) => assert!(msg.contains("gc_timeout_secs"), "{msg}"),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn subscription_spec_is_durable_earliest() {
        let cfg = ScenarioConfig::default();
        let spec = cfg.subscription_spec(&cfg.variants[1]);
        assert_eq!(spec.name, "test-sub");
        assert_eq!(spec.sub_type, SubscriptionType::Exclusive);
        assert_eq!(spec.initial_position, probe_api::InitialPosition::Earliest);
        assert_eq!(spec.mode, probe_api::SubscriptionMode::Durable);
    }
}
