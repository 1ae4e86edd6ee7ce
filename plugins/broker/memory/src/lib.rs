mod admin;
mod handles;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use probe_api::{
    AdminError, BusError, InitialPosition, MessageBus, MessageId, NamespaceName, SubscriptionMode,
    SubscriptionSpec, SubscriptionType, TopicAdmin, TopicConsumer, TopicName, TopicProducer,
};

pub use admin::{admin_router, serve_admin};
use handles::{MemoryConsumer, MemoryProducer};

// ═══════════════════════════════════════════════════════════════
//  MemoryBrokerConfig
// ═══════════════════════════════════════════════════════════════

fn default_inactive_after() -> Duration {
    Duration::from_secs(60)
}

fn default_clusters() -> Vec<String> {
    vec!["standalone".into()]
}

#[derive(Debug, Clone)]
pub struct MemoryBrokerConfig {
    /// Сколько topic должен простоять без активности, чтобы GC его удалил.
    pub inactive_after: Duration,
    /// `false` воспроизводит дефект: consumer на имени, которое уже
    /// собиралось GC, никогда не получает сообщений.
    pub deliver_after_gc: bool,
    pub clusters: Vec<String>,
}

impl Default for MemoryBrokerConfig {
    fn default() -> Self {
        Self {
            inactive_after: default_inactive_after(),
            deliver_after_gc: true,
            clusters: default_clusters(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Broker state
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub(crate) struct StoredMessage {
    pub(crate) id: MessageId,
    pub(crate) payload: String,
}

#[derive(Debug)]
pub(crate) struct SubscriptionState {
    pub(crate) sub_type: SubscriptionType,
    pub(crate) mode: SubscriptionMode,
    pub(crate) cursor: usize,
    pub(crate) consumers: HashSet<u64>,
}

#[derive(Debug)]
pub(crate) struct TopicState {
    pub(crate) ledger: u64,
    pub(crate) messages: Vec<StoredMessage>,
    pub(crate) subscriptions: HashMap<String, SubscriptionState>,
    pub(crate) producers: usize,
    pub(crate) last_active: Instant,
    /// Topic пересоздан после GC при `deliver_after_gc = false`.
    pub(crate) poisoned: bool,
}

impl TopicState {
    fn new(ledger: u64, poisoned: bool) -> Self {
        Self {
            ledger,
            messages: Vec::new(),
            subscriptions: HashMap::new(),
            producers: 0,
            last_active: Instant::now(),
            poisoned,
        }
    }

    fn is_collectable(&self, now: Instant, inactive_after: Duration) -> bool {
        self.producers == 0
            && self.subscriptions.is_empty()
            && now.saturating_duration_since(self.last_active) >= inactive_after
    }
}

#[derive(Debug, Default)]
pub(crate) struct BrokerState {
    /// tenant → allowed clusters.
    tenants: HashMap<String, Vec<String>>,
    namespaces: HashSet<String>,
    pub(crate) topics: BTreeMap<String, TopicState>,
    /// Имена, которые GC удалял хотя бы раз.
    collected: HashSet<String>,
    next_ledger: u64,
    next_handle: u64,
}

impl BrokerState {
    /// Найти или неявно создать topic (как делает broker при первом produce/subscribe).
    fn open_topic(&mut self, topic: &TopicName, deliver_after_gc: bool) -> Result<&mut TopicState, String> {
        let ns = topic.namespace().to_string();
        if !self.namespaces.contains(&ns) {
            return Err(format!("namespace '{ns}' does not exist"));
        }
        let next_ledger = &mut self.next_ledger;
        let collected = &self.collected;
        let state = self.topics.entry(topic.to_string()).or_insert_with_key(|name| {
            *next_ledger += 1;
            let poisoned = !deliver_after_gc && collected.contains(name);
            tracing::debug!(topic = %name, ledger = *next_ledger, poisoned, "topic created");
            TopicState::new(*next_ledger, poisoned)
        });
        Ok(state)
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

pub(crate) struct Inner {
    pub(crate) config: MemoryBrokerConfig,
    pub(crate) state: RwLock<BrokerState>,
    /// Будит ждущих consumer'ов после каждой записи.
    pub(crate) notify: Notify,
    admin_down: AtomicBool,
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBroker
// ═══════════════════════════════════════════════════════════════

/// In-memory двойник broker'а для тестов workflow.
///
/// Моделирует только то, что видно снаружи: неявное создание topic'ов,
/// admin listing, durable подписки и GC неактивных topic'ов.
/// Клонирование дешёвое — все клоны делят одно состояние.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(MemoryBrokerConfig::default())
    }
}

impl MemoryBroker {
    pub fn new(config: MemoryBrokerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: RwLock::new(BrokerState::default()),
                notify: Notify::new(),
                admin_down: AtomicBool::new(false),
            }),
        }
    }

    /// Создать tenant + namespace, игнорируя уже существующие.
    pub async fn provision(&self, namespace: &NamespaceName) {
        let mut state = self.inner.state.write().await;
        state
            .tenants
            .entry(namespace.tenant().to_string())
            .or_insert_with(|| self.inner.config.clusters.clone());
        state.namespaces.insert(namespace.to_string());
    }

    /// Эмуляция недоступного admin endpoint'а: все admin вызовы → `Unavailable`.
    pub fn set_admin_available(&self, available: bool) {
        self.inner.admin_down.store(!available, Ordering::SeqCst);
    }

    /// Один проход GC. Возвращает имена удалённых topic'ов.
    pub async fn run_gc(&self) -> Vec<String> {
        let now = Instant::now();
        let inactive_after = self.inner.config.inactive_after;
        let mut state = self.inner.state.write().await;

        let victims: Vec<String> = state
            .topics
            .iter()
            .filter(|(_, t)| t.is_collectable(now, inactive_after))
            .map(|(name, _)| name.clone())
            .collect();

        for name in &victims {
            state.topics.remove(name);
            state.collected.insert(name.clone());
            tracing::info!(topic = %name, "garbage-collected inactive topic");
        }
        victims
    }

    /// Фоновый GC: `run_gc()` каждые `interval` до отмены `shutdown`.
    pub fn spawn_gc(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let broker = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        broker.run_gc().await;
                    }
                }
            }
            tracing::debug!("memory broker GC stopped");
        })
    }

    /// Сколько сообщений хранит topic сейчас. `None` = topic'а нет.
    pub async fn message_count(&self, topic: &TopicName) -> Option<usize> {
        let state = self.inner.state.read().await;
        state.topics.get(&topic.to_string()).map(|t| t.messages.len())
    }

    /// Ledger текущего воплощения topic'а. Меняется при пересоздании после GC.
    pub async fn ledger(&self, topic: &TopicName) -> Option<u64> {
        let state = self.inner.state.read().await;
        state.topics.get(&topic.to_string()).map(|t| t.ledger)
    }

    fn check_admin(&self) -> Result<(), AdminError> {
        if self.inner.admin_down.load(Ordering::SeqCst) {
            return Err(AdminError::Unavailable("memory broker admin is down".into()));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  TopicAdmin
// ═══════════════════════════════════════════════════════════════

impl TopicAdmin for MemoryBroker {
    fn clusters(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>, AdminError>> + Send + '_>> {
        Box::pin(async move {
            self.check_admin()?;
            Ok(self.inner.config.clusters.clone())
        })
    }

    fn create_tenant<'a>(
        &'a self,
        tenant: &'a str,
        allowed_clusters: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<(), AdminError>> + Send + 'a>> {
        Box::pin(async move {
            self.check_admin()?;
            if let Some(unknown) = allowed_clusters
                .iter()
                .find(|c| !self.inner.config.clusters.contains(c))
            {
                return Err(AdminError::Rejected {
                    status: 412,
                    reason: format!("cluster '{unknown}' does not exist"),
                });
            }
            let mut state = self.inner.state.write().await;
            if state.tenants.contains_key(tenant) {
                return Err(AdminError::Conflict(format!("tenant '{tenant}'")));
            }
            state.tenants.insert(tenant.to_string(), allowed_clusters.to_vec());
            Ok(())
        })
    }

    fn create_namespace<'a>(
        &'a self,
        namespace: &'a NamespaceName,
    ) -> Pin<Box<dyn Future<Output = Result<(), AdminError>> + Send + 'a>> {
        Box::pin(async move {
            self.check_admin()?;
            let mut state = self.inner.state.write().await;
            if !state.tenants.contains_key(namespace.tenant()) {
                return Err(AdminError::NotFound(format!("tenant '{}'", namespace.tenant())));
            }
            if !state.namespaces.insert(namespace.to_string()) {
                return Err(AdminError::Conflict(format!("namespace '{namespace}'")));
            }
            Ok(())
        })
    }

    fn list_topics<'a>(
        &'a self,
        namespace: &'a NamespaceName,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, AdminError>> + Send + 'a>> {
        Box::pin(async move {
            self.check_admin()?;
            let state = self.inner.state.read().await;
            let ns = namespace.to_string();
            if !state.namespaces.contains(&ns) {
                return Err(AdminError::NotFound(format!("namespace '{ns}'")));
            }
            let suffix = format!("://{ns}/");
            Ok(state
                .topics
                .keys()
                .filter(|name| name.contains(&suffix))
                .cloned()
                .collect())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MessageBus
// ═══════════════════════════════════════════════════════════════

impl MessageBus for MemoryBroker {
    fn create_producer<'a>(
        &'a self,
        topic: &'a TopicName,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn TopicProducer>, BusError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.state.write().await;
            let t = state
                .open_topic(topic, self.inner.config.deliver_after_gc)
                .map_err(|detail| BusError::Producer {
                    topic: topic.to_string(),
                    detail,
                })?;
            t.producers += 1;
            t.last_active = Instant::now();
            Ok(Box::new(MemoryProducer::new(self.inner.clone(), topic.to_string())) as Box<dyn TopicProducer>)
        })
    }

    fn subscribe<'a>(
        &'a self,
        topic: &'a TopicName,
        spec: &'a SubscriptionSpec,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn TopicConsumer>, BusError>> + Send + 'a>> {
        Box::pin(async move {
            let err = |detail: String| BusError::Subscribe {
                topic: topic.to_string(),
                subscription: spec.name.clone(),
                detail,
            };

            let mut state = self.inner.state.write().await;
            let handle = state.next_handle();
            let t = state
                .open_topic(topic, self.inner.config.deliver_after_gc)
                .map_err(err)?;
            let end = t.messages.len();
            let sub = t
                .subscriptions
                .entry(spec.name.clone())
                .or_insert_with(|| SubscriptionState {
                    sub_type: spec.sub_type,
                    mode: spec.mode,
                    cursor: match spec.initial_position {
                        InitialPosition::Earliest => 0,
                        InitialPosition::Latest => end,
                    },
                    consumers: HashSet::new(),
                });

            if !sub.consumers.is_empty() {
                if sub.sub_type != spec.sub_type {
                    return Err(err(format!(
                        "subscription is {} but {} was requested",
                        sub.sub_type, spec.sub_type
                    )));
                }
                if sub.sub_type == SubscriptionType::Exclusive {
                    return Err(err("exclusive consumer is already connected".into()));
                }
            }
            sub.sub_type = spec.sub_type;
            sub.consumers.insert(handle);
            t.last_active = Instant::now();

            Ok(Box::new(MemoryConsumer::new(
                self.inner.clone(),
                topic.to_string(),
                spec.name.clone(),
                handle,
            )) as Box<dyn TopicConsumer>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns() -> NamespaceName {
        NamespaceName::new("localdev", "test").unwrap()
    }

    fn topic() -> TopicName {
        TopicName::random(probe_api::TopicDomain::Persistent, ns())
    }

    async fn broker() -> MemoryBroker {
        let b = MemoryBroker::new(MemoryBrokerConfig {
            inactive_after: Duration::from_secs(30),
            ..Default::default()
        });
        b.provision(&ns()).await;
        b
    }

    #[tokio::test]
    async fn tenant_and_namespace_conflict_on_second_create() {
        let b = MemoryBroker::default();
        let clusters = b.clusters().await.unwrap();
        b.create_tenant("localdev", &clusters).await.unwrap();
        assert!(matches!(
            b.create_tenant("localdev", &clusters).await,
            Err(AdminError::Conflict(_))
        ));
        b.create_namespace(&ns()).await.unwrap();
        assert!(matches!(b.create_namespace(&ns()).await, Err(AdminError::Conflict(_))));
    }

    #[tokio::test]
    async fn namespace_requires_tenant() {
        let b = MemoryBroker::default();
        assert!(matches!(b.create_namespace(&ns()).await, Err(AdminError::NotFound(_))));
        assert!(matches!(b.list_topics(&ns()).await, Err(AdminError::NotFound(_))));
    }

    #[tokio::test]
    async fn producer_creates_topic_implicitly() {
        let b = broker().await;
        let t = topic();
        assert!(b.list_topics(&ns()).await.unwrap().is_empty());

        let mut p = b.create_producer(&t).await.unwrap();
        let id = p.send("hello".into()).await.unwrap();
        p.close().await.unwrap();

        assert_eq!(id.entry, 0);
        assert_eq!(b.list_topics(&ns()).await.unwrap(), vec![t.to_string()]);
        assert_eq!(b.message_count(&t).await, Some(1));
    }

    #[tokio::test]
    async fn producer_in_missing_namespace_fails() {
        let b = MemoryBroker::default();
        let err = b.create_producer(&topic()).await.err().unwrap();
        assert!(matches!(err, BusError::Producer { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn gc_removes_only_idle_unsubscribed_topics() {
        let b = broker().await;
        let idle = topic();
        let subscribed = topic();

        let mut p = b.create_producer(&idle).await.unwrap();
        p.send("x".into()).await.unwrap();
        p.close().await.unwrap();

        let spec = SubscriptionSpec::durable_earliest("keep", SubscriptionType::Shared);
        let mut c = b.subscribe(&subscribed, &spec).await.unwrap();
        c.close().await.unwrap();

        assert!(b.run_gc().await.is_empty(), "nothing is idle yet");

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(b.run_gc().await, vec![idle.to_string()]);
        assert_eq!(b.list_topics(&ns()).await.unwrap(), vec![subscribed.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn open_producer_keeps_topic_alive() {
        let b = broker().await;
        let t = topic();
        let mut p = b.create_producer(&t).await.unwrap();

        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(b.run_gc().await.is_empty());

        p.close().await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(b.run_gc().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recreated_topic_gets_new_ledger() {
        let b = broker().await;
        let t = topic();

        let mut p = b.create_producer(&t).await.unwrap();
        p.close().await.unwrap();
        let first = b.ledger(&t).await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        b.run_gc().await;
        assert_eq!(b.ledger(&t).await, None);

        let mut p = b.create_producer(&t).await.unwrap();
        p.close().await.unwrap();
        assert!(b.ledger(&t).await.unwrap() > first);
    }

    #[tokio::test]
    async fn exclusive_subscription_refuses_second_consumer() {
        let b = broker().await;
        let t = topic();
        let spec = SubscriptionSpec::durable_earliest("sub", SubscriptionType::Exclusive);

        let mut first = b.subscribe(&t, &spec).await.unwrap();
        assert!(b.subscribe(&t, &spec).await.is_err());

        first.close().await.unwrap();
        let mut second = b.subscribe(&t, &spec).await.unwrap();
        second.close().await.unwrap();
    }

    #[tokio::test]
    async fn shared_consumers_split_one_cursor() {
        let b = broker().await;
        let t = topic();
        let spec = SubscriptionSpec::durable_earliest("sub", SubscriptionType::Shared);

        let mut p = b.create_producer(&t).await.unwrap();
        p.send("a".into()).await.unwrap();
        p.send("b".into()).await.unwrap();
        p.close().await.unwrap();

        let mut c1 = b.subscribe(&t, &spec).await.unwrap();
        let mut c2 = b.subscribe(&t, &spec).await.unwrap();
        let m1 = c1.receive().await.unwrap().unwrap();
        let m2 = c2.receive().await.unwrap().unwrap();
        assert_eq!((m1.payload.as_str(), m2.payload.as_str()), ("a", "b"));
        c1.close().await.unwrap();
        c2.close().await.unwrap();
    }

    #[tokio::test]
    async fn latest_position_skips_backlog() {
        let b = broker().await;
        let t = topic();

        let mut p = b.create_producer(&t).await.unwrap();
        p.send("old".into()).await.unwrap();

        let spec = SubscriptionSpec {
            initial_position: InitialPosition::Latest,
            ..SubscriptionSpec::durable_earliest("tail", SubscriptionType::Exclusive)
        };
        let mut c = b.subscribe(&t, &spec).await.unwrap();
        p.send("new".into()).await.unwrap();
        p.close().await.unwrap();

        assert_eq!(c.receive().await.unwrap().unwrap().payload, "new");
        c.close().await.unwrap();
    }

    #[tokio::test]
    async fn non_durable_subscription_vanishes_on_close() {
        let b = broker().await;
        let t = topic();
        let spec = SubscriptionSpec {
            mode: SubscriptionMode::NonDurable,
            ..SubscriptionSpec::durable_earliest("reader", SubscriptionType::Exclusive)
        };
        let mut c = b.subscribe(&t, &spec).await.unwrap();
        c.close().await.unwrap();

        let state = b.inner.state.read().await;
        assert!(state.topics[&t.to_string()].subscriptions.is_empty());
    }

    #[tokio::test]
    async fn receive_wakes_on_later_send() {
        let b = broker().await;
        let t = topic();
        let spec = SubscriptionSpec::durable_earliest("sub", SubscriptionType::Exclusive);
        let mut c = b.subscribe(&t, &spec).await.unwrap();

        let producer_side = b.clone();
        let t2 = t.clone();
        let send = tokio::spawn(async move {
            tokio::task::yield_now().await;
            let mut p = producer_side.create_producer(&t2).await.unwrap();
            p.send("late".into()).await.unwrap();
            p.close().await.unwrap();
        });

        let msg = c.receive().await.unwrap().unwrap();
        assert_eq!(msg.payload, "late");
        send.await.unwrap();
        c.close().await.unwrap();
    }

    #[tokio::test]
    async fn admin_outage_is_reported_as_unavailable() {
        let b = broker().await;
        b.set_admin_available(false);
        assert!(matches!(b.list_topics(&ns()).await, Err(AdminError::Unavailable(_))));
        b.set_admin_available(true);
        assert!(b.list_topics(&ns()).await.is_ok());
    }
}
