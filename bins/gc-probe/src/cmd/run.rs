use std::sync::Arc;

use bus_pulsar::PulsarBus;
use probe_api::{MessageBus, TopicAdmin};
use probe_engine::{Scenario, ScenarioConfig, ScenarioFailure, ScenarioReport, VariantConfig, ensure_fixture};

use super::config::Effective;
use super::error::CliError;

// ═══════════════════════════════════════════════════════════════
//  Main dispatch
// ═══════════════════════════════════════════════════════════════

pub async fn run(eff: &Effective) -> Result<(), CliError> {
    let admin = super::admin_client(eff)?;
    let pulsar = PulsarBus::connect(&eff.service_url).await?;
    tracing::info!(admin_url = %eff.admin_url, service_url = %pulsar.service_url(), "connected");
    let bus: Arc<dyn MessageBus> = Arc::new(pulsar);

    let outcomes = run_variants(admin, bus, &eff.scenario).await?;
    for outcome in &outcomes {
        println!("{}", outcome.summary());
    }
    verdict(&outcomes)
}

/// Результат одного варианта сценария.
pub struct VariantOutcome {
    pub variant: VariantConfig,
    pub result: Result<ScenarioReport, ScenarioFailure>,
}

impl VariantOutcome {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }

    pub fn summary(&self) -> String {
        let label = format!("{} (settle {} ms)", self.variant.subscription_type, self.variant.settle_ms);
        match &self.result {
            Ok(report) => format!(
                "PASS {label} {}: gc after {:.1}s, received {} in {:.1}s",
                report.topic,
                report.gc_wait.as_secs_f64(),
                report.received.id,
                report.elapsed.as_secs_f64(),
            ),
            Err(failure) => format!("FAIL {label} {failure}"),
        }
    }
}

/// Fixture, затем варианты по очереди, каждый на своём свежем topic'е.
///
/// Провал варианта не останавливает следующие. Ошибка fixture или
/// конфигурации прерывает всё сразу.
pub async fn run_variants(
    admin: Arc<dyn TopicAdmin>,
    bus: Arc<dyn MessageBus>,
    config: &ScenarioConfig,
) -> Result<Vec<VariantOutcome>, CliError> {
    ensure_fixture(admin.as_ref(), &config.namespace_name()?).await?;

    let mut outcomes = Vec::with_capacity(config.variants.len());
    for variant in &config.variants {
        let scenario = Scenario::new(admin.clone(), bus.clone(), config, variant)?;
        let result = scenario.run().await;
        outcomes.push(VariantOutcome {
            variant: variant.clone(),
            result,
        });
    }
    Ok(outcomes)
}

fn verdict(outcomes: &[VariantOutcome]) -> Result<(), CliError> {
    let failed = outcomes.iter().filter(|o| !o.passed()).count();
    if failed > 0 {
        return Err(CliError::VariantsFailed {
            failed,
            total: outcomes.len(),
        });
    }
    tracing::info!(variants = outcomes.len(), "all scenario variants passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use broker_memory::{MemoryBroker, MemoryBrokerConfig};
    use probe_api::SubscriptionType;
    use probe_engine::{ProbeError, ScenarioState};
    use tokio_util::sync::CancellationToken;

    use super::*;

    async fn run_against(broker: &MemoryBroker, config: &ScenarioConfig) -> Result<Vec<VariantOutcome>, CliError> {
        let gc = CancellationToken::new();
        let task = broker.spawn_gc(Duration::from_secs(1), gc.clone());
        let outcomes = run_variants(Arc::new(broker.clone()), Arc::new(broker.clone()), config).await;
        gc.cancel();
        let _ = task.await;
        outcomes
    }

    #[tokio::test(start_paused = true)]
    async fn default_variants_pass_on_healthy_broker() {
        let broker = MemoryBroker::default();
        let outcomes = run_against(&broker, &ScenarioConfig::default()).await.unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(VariantOutcome::passed));
        assert!(outcomes[0].summary().starts_with("PASS shared (settle 5000 ms) persistent://localdev/test/"));
        verdict(&outcomes).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn defective_broker_fails_every_variant() {
        let broker = MemoryBroker::new(MemoryBrokerConfig {
            deliver_after_gc: false,
            ..Default::default()
        });
        let outcomes = run_against(&broker, &ScenarioConfig::default()).await.unwrap();

        for outcome in &outcomes {
            let failure = outcome.result.as_ref().err().unwrap();
            assert_eq!(failure.to, ScenarioState::Reused);
            assert!(outcome.summary().contains("GcComplete -> Reused"), "{}", outcome.summary());
        }
        assert!(matches!(
            verdict(&outcomes),
            Err(CliError::VariantsFailed { failed: 2, total: 2 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn variants_use_distinct_topics() {
        let broker = MemoryBroker::default();
        let config = ScenarioConfig {
            variants: vec![
                VariantConfig {
                    subscription_type: SubscriptionType::Exclusive,
                    settle_ms: 0,
                };
                2
            ],
            ..Default::default()
        };
        let outcomes = run_against(&broker, &config).await.unwrap();

        let topics: Vec<_> = outcomes
            .iter()
            .map(|o| o.result.as_ref().map(|r| r.topic.to_string()).unwrap())
            .collect();
        assert_ne!(topics[0], topics[1]);
    }

    #[tokio::test]
    async fn admin_outage_aborts_before_any_variant() {
        let broker = MemoryBroker::default();
        broker.set_admin_available(false);

        let err = run_variants(
            Arc::new(broker.clone()),
            Arc::new(broker),
            &ScenarioConfig::default(),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, CliError::Probe(ProbeError::AdminUnavailable(_))));
    }
}
