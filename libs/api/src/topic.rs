use std::future::Future;
use std::pin::Pin;

use crate::{AdminError, BusError, MessageId, NamespaceName, ReceivedMessage, SubscriptionSpec, TopicName};

// ════════════════════════════════════════════════════════════════
//  Control plane
// ════════════════════════════════════════════════════════════════

/// Admin surface broker'а: tenants, namespaces, список topic'ов.
///
/// Реализации: HTTP клиент (admin-http), in-memory broker (тесты).
/// Каждый вызов — свежий round-trip, без кэша.
pub trait TopicAdmin: Send + Sync {
    /// Список кластеров, известных broker'у.
    fn clusters(&self) -> Pin<Box<dyn Future<Output = Result<Vec<String>, AdminError>> + Send + '_>>;

    /// Создать tenant. `Conflict` если уже есть.
    fn create_tenant<'a>(
        &'a self,
        tenant: &'a str,
        allowed_clusters: &'a [String],
    ) -> Pin<Box<dyn Future<Output = Result<(), AdminError>> + Send + 'a>>;

    /// Создать namespace с политиками по умолчанию. `Conflict` если уже есть.
    fn create_namespace<'a>(
        &'a self,
        namespace: &'a NamespaceName,
    ) -> Pin<Box<dyn Future<Output = Result<(), AdminError>> + Send + 'a>>;

    /// Полные имена всех topic'ов namespace'а.
    fn list_topics<'a>(
        &'a self,
        namespace: &'a NamespaceName,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, AdminError>> + Send + 'a>>;
}

// ════════════════════════════════════════════════════════════════
//  Data plane
// ════════════════════════════════════════════════════════════════

/// Producer handle. Владелец обязан вызвать `close()` на любом пути выхода.
pub trait TopicProducer: Send {
    /// Отправить payload и дождаться подтверждения broker'а.
    fn send(&mut self, payload: String) -> Pin<Box<dyn Future<Output = Result<MessageId, BusError>> + Send + '_>>;

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>>;
}

/// Consumer handle. Владелец обязан вызвать `close()` на любом пути выхода.
pub trait TopicConsumer: Send {
    /// Следующее сообщение. Ждёт без ограничения — timeout на стороне вызывающего.
    /// `None` = поток закрыт.
    fn receive(&mut self) -> Pin<Box<dyn Future<Output = Result<Option<ReceivedMessage>, BusError>> + Send + '_>>;

    fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<(), BusError>> + Send + '_>>;
}

/// Data-plane клиент: создание producer'ов и подписок.
/// Topic создаётся broker'ом неявно при первом использовании.
pub trait MessageBus: Send + Sync {
    #[allow(clippy::type_complexity)]
    fn create_producer<'a>(
        &'a self,
        topic: &'a TopicName,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn TopicProducer>, BusError>> + Send + 'a>>;

    #[allow(clippy::type_complexity)]
    fn subscribe<'a>(
        &'a self,
        topic: &'a TopicName,
        spec: &'a SubscriptionSpec,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn TopicConsumer>, BusError>> + Send + 'a>>;
}
