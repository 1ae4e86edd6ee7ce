use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use probe_api::{MessageBus, MessageId, ReceivedMessage, SubscriptionSpec, TopicAdmin, TopicName};

use crate::config::{ScenarioConfig, VariantConfig};
use crate::driver::ExchangeDriver;
use crate::oracle::{Presence, TopicOracle};
use crate::waiter::Waiter;
use crate::ProbeError;

// ═══════════════════════════════════════════════════════════════
//  States
// ═══════════════════════════════════════════════════════════════

/// Состояния сценария. Переходы строго по порядку, без возвратов.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    /// Свежее имя, admin его не знает.
    Absent,
    /// Первый batch отправлен, topic в списке.
    Present,
    /// Broker собрал topic: его больше нет в списке.
    AwaitingGc,
    /// Settle-пауза выдержана.
    GcComplete,
    /// Сообщение получено на том же имени. Терминальное.
    Reused,
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScenarioState::Absent => "Absent",
            ScenarioState::Present => "Present",
            ScenarioState::AwaitingGc => "AwaitingGc",
            ScenarioState::GcComplete => "GcComplete",
            ScenarioState::Reused => "Reused",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ScenarioState,
    pub to: ScenarioState,
    /// От старта сценария.
    pub at: Duration,
}

// ═══════════════════════════════════════════════════════════════
//  Outcome
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub topic: TopicName,
    pub variant: VariantConfig,
    pub first_batch: Vec<MessageId>,
    pub second_batch: Vec<MessageId>,
    pub gc_wait: Duration,
    pub received: ReceivedMessage,
    pub elapsed: Duration,
    pub transitions: Vec<Transition>,
}

/// Провал сценария: на каком шаге и почему.
#[derive(Debug, thiserror::Error)]
#[error("{topic}: {} failed after {elapsed:?}: {source}", step_label(.from, .to))]
pub struct ScenarioFailure {
    pub topic: String,
    pub from: ScenarioState,
    pub to: ScenarioState,
    pub elapsed: Duration,
    #[source]
    pub source: ProbeError,
}

fn step_label(from: &ScenarioState, to: &ScenarioState) -> String {
    if from == to {
        format!("check {from}")
    } else {
        format!("{from} -> {to}")
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scenario
// ═══════════════════════════════════════════════════════════════

/// Один прогон проверки "topic пригоден после GC".
///
/// Absent → Present → AwaitingGc → GcComplete → Reused.
/// Любая ошибка завершает прогон; повторов нет, кроме polling'а в Waiter.
pub struct Scenario {
    oracle: TopicOracle,
    driver: ExchangeDriver,
    waiter: Waiter,
    subscription: SubscriptionSpec,
    batch_size: usize,
    variant: VariantConfig,
    topic: TopicName,
    state: ScenarioState,
    started: Instant,
    transitions: Vec<Transition>,
}

impl Scenario {
    /// Сценарий на свежем случайном имени topic'а.
    pub fn new(
        admin: Arc<dyn TopicAdmin>,
        bus: Arc<dyn MessageBus>,
        config: &ScenarioConfig,
        variant: &VariantConfig,
    ) -> Result<Self, ProbeError> {
        config.validate()?;
        let topic = TopicName::random(config.domain, config.namespace_name()?);
        Ok(Self {
            oracle: TopicOracle::new(admin),
            driver: ExchangeDriver::new(bus, config.send_timeout(), config.receive_timeout()),
            waiter: Waiter::new(config.gc_timeout(), config.poll_interval()),
            subscription: config.subscription_spec(variant),
            batch_size: config.batch_size,
            variant: variant.clone(),
            topic,
            state: ScenarioState::Absent,
            started: Instant::now(),
            transitions: Vec::new(),
        })
    }

    /// Подменить имя topic'а (например, чтобы проверить защиту от коллизий).
    pub fn with_topic(mut self, topic: TopicName) -> Self {
        self.topic = topic;
        self
    }

    pub fn topic(&self) -> &TopicName {
        &self.topic
    }

    pub async fn run(mut self) -> Result<ScenarioReport, ScenarioFailure> {
        self.started = Instant::now();
        tracing::info!(
            topic = %self.topic,
            sub_type = %self.variant.subscription_type,
            settle_ms = self.variant.settle_ms,
            "scenario started"
        );

        // Absent: свежее имя не должно быть известно admin'у.
        self.oracle
            .expect(&self.topic, Presence::Absent)
            .await
            .map_err(|e| self.fail(ScenarioState::Absent, e))?;

        let first_batch = self
            .produce_first_batch()
            .await
            .map_err(|e| self.fail(ScenarioState::Present, e))?;
        self.advance(ScenarioState::Present);

        let gc_wait = self
            .await_gc()
            .await
            .map_err(|e| self.fail(ScenarioState::AwaitingGc, e))?;
        self.advance(ScenarioState::AwaitingGc);

        self.settle().await;
        self.advance(ScenarioState::GcComplete);

        let exchange = self
            .driver
            .produce_and_consume_one(&self.topic, &self.subscription, self.batch_size)
            .await
            .map_err(|e| self.fail(ScenarioState::Reused, e))?;
        self.advance(ScenarioState::Reused);

        let elapsed = self.started.elapsed();
        tracing::info!(topic = %self.topic, elapsed_ms = elapsed.as_millis() as u64, "scenario passed");

        Ok(ScenarioReport {
            topic: self.topic,
            variant: self.variant,
            first_batch,
            second_batch: exchange.sent,
            gc_wait,
            received: exchange.received,
            elapsed,
            transitions: self.transitions,
        })
    }

    async fn produce_first_batch(&self) -> Result<Vec<MessageId>, ProbeError> {
        let ids = self.driver.produce_batch(&self.topic, self.batch_size).await?;
        self.oracle.expect(&self.topic, Presence::Present).await?;
        Ok(ids)
    }

    async fn await_gc(&self) -> Result<Duration, ProbeError> {
        tracing::info!(topic = %self.topic, timeout_s = self.waiter.timeout().as_secs(), "waiting for GC");
        let oracle = &self.oracle;
        let topic = &self.topic;
        let waited = self
            .waiter
            .until(
                &format!("garbage collection of {topic}"),
                move || oracle.presence(topic),
                |p| *p == Presence::Absent,
            )
            .await?;
        tracing::info!(topic = %self.topic, waited_ms = waited.as_millis() as u64, "topic garbage-collected");
        Ok(waited)
    }

    /// Эвристическая пауза: даёт broker'у дочистить метаданные.
    /// Корректность не гарантирует.
    async fn settle(&self) {
        let settle = self.variant.settle();
        if settle.is_zero() {
            return;
        }
        tracing::info!(settle_ms = self.variant.settle_ms, "settling after GC");
        tokio::time::sleep(settle).await;
    }

    fn advance(&mut self, to: ScenarioState) {
        let at = self.started.elapsed();
        tracing::debug!(topic = %self.topic, from = %self.state, %to, at_ms = at.as_millis() as u64, "transition");
        self.transitions.push(Transition {
            from: self.state,
            to,
            at,
        });
        self.state = to;
    }

    fn fail(&self, to: ScenarioState, source: ProbeError) -> ScenarioFailure {
        let failure = ScenarioFailure {
            topic: self.topic.to_string(),
            from: self.state,
            to,
            elapsed: self.started.elapsed(),
            source,
        };
        tracing::error!(error = %failure, "scenario failed");
        failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_names_the_transition() {
        let failure = ScenarioFailure {
            topic: "persistent://localdev/test/x".into(),
            from: ScenarioState::Present,
            to: ScenarioState::AwaitingGc,
            elapsed: Duration::from_secs(300),
            source: ProbeError::Config("boom".into()),
        };
        assert_eq!(
            failure.to_string(),
            "persistent://localdev/test/x: Present -> AwaitingGc failed after 300s: config: boom"
        );
    }

    #[test]
    fn initial_check_is_labelled_as_check() {
        assert_eq!(step_label(&ScenarioState::Absent, &ScenarioState::Absent), "check Absent");
    }
}
